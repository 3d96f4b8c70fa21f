//! Stock movement ledger access (velocity data source).
//!
//! The ledger is an external collaborator; the trait keeps the evaluator
//! testable and lets a slow backing store be swapped without touching rule
//! logic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::AppResult;
use crate::models::{normalize_sku, StockMovement};

#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Movements for a SKU recorded at or after `since`, oldest first.
    async fn movements_since(
        &self,
        sku: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<StockMovement>>;
}

/// Postgres-backed ledger over the `stock_movements` table
pub struct PgStockLedger {
    pool: PgPool,
}

impl PgStockLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StockLedger for PgStockLedger {
    async fn movements_since(
        &self,
        sku: &str,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, sku, quantity_delta, recorded_at
            FROM stock_movements
            WHERE sku = $1 AND recorded_at >= $2
            ORDER BY recorded_at
            "#,
        )
        .bind(normalize_sku(sku))
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }
}
