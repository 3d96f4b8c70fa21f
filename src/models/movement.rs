//! Stock movement ledger rows (velocity data source).

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// One signed stock mutation recorded in the historical ledger.
/// Negative deltas are sales/shrinkage, positive deltas are restocks.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StockMovement {
    pub id: i64,
    pub sku: String,
    pub quantity_delta: i32,
    pub recorded_at: DateTime<Utc>,
}
