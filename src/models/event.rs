//! Stock change events delivered by the change source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Whether the mutated record is a catalog item or one of its variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerType {
    Item,
    Variant,
}

/// Ephemeral event emitted for every committed stock-quantity or
/// stock-status mutation. Carries the metadata rule filters need so the
/// evaluator never has to call back into the catalog store.
///
/// Delivery is at-least-once and unordered across SKUs; the dedup-by-active-
/// alert invariant absorbs duplicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockChangeEvent {
    pub owner_type: OwnerType,
    pub owner_id: Uuid,
    pub sku: String,
    pub current_stock: i32,
    /// Item's own configured low-stock threshold, when one is set
    pub low_stock_threshold: Option<i32>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub brand: Option<String>,
    pub item_type: Option<String>,
    pub changed_at: DateTime<Utc>,
}

impl StockChangeEvent {
    /// Owner reference split into (item_id, variant_id), mutually exclusive.
    pub fn owner_refs(&self) -> (Option<Uuid>, Option<Uuid>) {
        match self.owner_type {
            OwnerType::Item => (Some(self.owner_id), None),
            OwnerType::Variant => (None, Some(self.owner_id)),
        }
    }
}
