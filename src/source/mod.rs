//! Stock change sources.
//!
//! The engine consumes any [`StockChangeSource`]; delivery is assumed
//! at-least-once and unordered across SKUs. Duplicates are harmless because
//! the dedup-by-active-alert invariant absorbs them.
//!
//! Two adapters are provided: an in-process channel (tests, embedding into a
//! store that emits its own commit events) and a Postgres polling adapter
//! keyed on the catalog's `updated_at` column for stores without a change
//! feed. With polling, the interval is a latency trade-off, never a
//! correctness one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::{OwnerType, StockChangeEvent};

#[async_trait]
pub trait StockChangeSource: Send {
    /// Next committed stock mutation, or `None` when the stream has ended.
    async fn next_event(&mut self) -> Option<StockChangeEvent>;
}

// =============================================================================
// Channel source
// =============================================================================

/// In-process source backed by an mpsc channel
pub struct ChannelSource {
    rx: mpsc::Receiver<StockChangeEvent>,
}

impl ChannelSource {
    /// Creates a sender/source pair. Dropping the sender ends the stream.
    pub fn channel(buffer: usize) -> (mpsc::Sender<StockChangeEvent>, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (tx, Self { rx })
    }
}

#[async_trait]
impl StockChangeSource for ChannelSource {
    async fn next_event(&mut self) -> Option<StockChangeEvent> {
        self.rx.recv().await
    }
}

// =============================================================================
// Polling source
// =============================================================================

#[derive(Debug, FromRow)]
struct CatalogRow {
    id: Uuid,
    sku: String,
    parent_item_id: Option<Uuid>,
    quantity: i32,
    low_stock_threshold: Option<i32>,
    categories: Vec<String>,
    brand: Option<String>,
    item_type: Option<String>,
    updated_at: DateTime<Utc>,
}

impl CatalogRow {
    fn into_event(self) -> StockChangeEvent {
        StockChangeEvent {
            owner_type: if self.parent_item_id.is_some() {
                OwnerType::Variant
            } else {
                OwnerType::Item
            },
            owner_id: self.id,
            sku: self.sku,
            current_stock: self.quantity,
            low_stock_threshold: self.low_stock_threshold,
            categories: self.categories,
            brand: self.brand,
            item_type: self.item_type,
            changed_at: self.updated_at,
        }
    }
}

/// Change-detection adapter polling `catalog_items.updated_at` past a
/// high-water mark.
pub struct PollingSource {
    pool: PgPool,
    interval: Duration,
    high_water: DateTime<Utc>,
    queue: VecDeque<StockChangeEvent>,
}

impl PollingSource {
    /// Starts polling from "now"; historical rows are not replayed.
    pub fn new(pool: PgPool, interval: Duration) -> Self {
        Self {
            pool,
            interval,
            high_water: Utc::now(),
            queue: VecDeque::new(),
        }
    }

    async fn poll(&mut self) {
        let rows: Result<Vec<CatalogRow>, sqlx::Error> = sqlx::query_as(
            r#"
            SELECT id, sku, parent_item_id, quantity, low_stock_threshold,
                   categories, brand, item_type, updated_at
            FROM catalog_items
            WHERE updated_at > $1
            ORDER BY updated_at
            LIMIT 500
            "#,
        )
        .bind(self.high_water)
        .fetch_all(&self.pool)
        .await;

        match rows {
            Ok(rows) => {
                for row in rows {
                    if row.updated_at > self.high_water {
                        self.high_water = row.updated_at;
                    }
                    self.queue.push_back(row.into_event());
                }
            }
            Err(e) => {
                // Transient; the next poll retries from the same mark.
                log::warn!("Catalog poll failed: {}", e);
            }
        }
    }
}

#[async_trait]
impl StockChangeSource for PollingSource {
    async fn next_event(&mut self) -> Option<StockChangeEvent> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Some(event);
            }
            tokio::time::sleep(self.interval).await;
            self.poll().await;
        }
    }
}
