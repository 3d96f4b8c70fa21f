//! Alert models for the inventory alert engine.
//!
//! This module contains the persisted alert entity, its classification and
//! lifecycle enums, the per-channel notification log used for cooldown
//! checks, and the creation DTO emitted by the rule evaluator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;

// =============================================================================
// Alert Type Enum
// =============================================================================

/// Detected inventory condition category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    LowStock,
    OutOfStock,
    HighDemand,
    RestockNeeded,
    Overstock,
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertType::LowStock => write!(f, "low_stock"),
            AlertType::OutOfStock => write!(f, "out_of_stock"),
            AlertType::HighDemand => write!(f, "high_demand"),
            AlertType::RestockNeeded => write!(f, "restock_needed"),
            AlertType::Overstock => write!(f, "overstock"),
        }
    }
}

// =============================================================================
// Priority Enum
// =============================================================================

/// Operator-facing urgency bucket, assigned by the matching rule
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AlertPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl Default for AlertPriority {
    fn default() -> Self {
        AlertPriority::Medium
    }
}

impl std::fmt::Display for AlertPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertPriority::Low => write!(f, "low"),
            AlertPriority::Medium => write!(f, "medium"),
            AlertPriority::High => write!(f, "high"),
            AlertPriority::Critical => write!(f, "critical"),
        }
    }
}

// =============================================================================
// Alert Status Enum
// =============================================================================

/// Lifecycle state of an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
    Dismissed,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::Active => write!(f, "active"),
            AlertStatus::Acknowledged => write!(f, "acknowledged"),
            AlertStatus::Resolved => write!(f, "resolved"),
            AlertStatus::Dismissed => write!(f, "dismissed"),
        }
    }
}

impl AlertStatus {
    /// Whether the state machine permits moving to `next`.
    ///
    /// `active -> {acknowledged, resolved, dismissed}`,
    /// `acknowledged -> {resolved, dismissed}`; resolved and dismissed are
    /// terminal except for purge.
    pub fn can_transition_to(self, next: AlertStatus) -> bool {
        match self {
            AlertStatus::Active => next != AlertStatus::Active,
            AlertStatus::Acknowledged => {
                matches!(next, AlertStatus::Resolved | AlertStatus::Dismissed)
            }
            AlertStatus::Resolved | AlertStatus::Dismissed => false,
        }
    }
}

// =============================================================================
// Notification Channel Enum
// =============================================================================

/// Delivery channel for alert notifications
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
    Push,
    Dashboard,
}

impl Channel {
    /// All channels in dispatch order.
    pub const ALL: [Channel; 4] = [
        Channel::Email,
        Channel::Sms,
        Channel::Push,
        Channel::Dashboard,
    ];
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Email => write!(f, "email"),
            Channel::Sms => write!(f, "sms"),
            Channel::Push => write!(f, "push"),
            Channel::Dashboard => write!(f, "dashboard"),
        }
    }
}

// =============================================================================
// Notification Log
// =============================================================================

/// Per-channel send timestamps, append-only, stored as JSONB on the alert.
///
/// The most recent timestamp per channel drives the cooldown check.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationLog(pub HashMap<Channel, Vec<DateTime<Utc>>>);

impl NotificationLog {
    /// Most recent send on the given channel, if any.
    pub fn last_sent(&self, channel: Channel) -> Option<DateTime<Utc>> {
        self.0.get(&channel).and_then(|ts| ts.last().copied())
    }

    /// Appends a send timestamp for the channel.
    pub fn record(&mut self, channel: Channel, at: DateTime<Utc>) {
        self.0.entry(channel).or_default().push(at);
    }

    /// True when no channel has ever been notified.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(|ts| ts.is_empty())
    }
}

// =============================================================================
// Estimated Impact
// =============================================================================

/// Optional business-impact estimate attached at creation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EstimatedImpact {
    #[serde(default)]
    pub potential_lost_sales: Option<i32>,
    #[serde(default)]
    pub affected_orders: Option<i32>,
    #[serde(default)]
    pub revenue_at_risk: Option<f64>,
}

// =============================================================================
// Alert Model
// =============================================================================

/// Persisted alert record.
///
/// At most one alert per `(sku, alert_type)` may be `active` at any time;
/// the invariant is enforced by a partial unique index at the storage layer.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Alert {
    pub id: Uuid,
    /// Normalized (uppercase) stock-keeping unit identifier
    pub sku: String,
    pub item_id: Option<Uuid>,
    pub variant_id: Option<Uuid>,
    pub alert_type: AlertType,
    pub priority: AlertPriority,
    /// Numeric bound that fired the rule
    pub threshold: i32,
    /// Stock snapshot at creation
    pub current_stock: i32,
    pub message: String,
    pub recommended_action: String,
    /// Derived urgency score in [1, 10]
    pub severity: i16,
    pub estimated_impact: Option<Json<EstimatedImpact>>,
    pub status: AlertStatus,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolution_notes: Option<String>,
    pub notifications: Json<NotificationLog>,
    pub auto_resolve: bool,
    pub auto_resolve_threshold: Option<i32>,
    pub suppress_until: Option<DateTime<Utc>>,
    pub suppress_similar: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Alert {
    /// Auto-resolve predicate: true iff auto-resolution is enabled, a
    /// threshold is defined, the reported stock has reached it, and the
    /// alert is still active.
    pub fn should_auto_resolve(&self, current_stock: i32) -> bool {
        self.auto_resolve
            && self.status == AlertStatus::Active
            && self
                .auto_resolve_threshold
                .is_some_and(|t| current_stock >= t)
    }
}

/// Normalizes a SKU for storage and comparison (trimmed, uppercase).
pub fn normalize_sku(sku: &str) -> String {
    sku.trim().to_uppercase()
}

// =============================================================================
// Creation DTO
// =============================================================================

/// Fields for a new alert, produced by the rule evaluator.
///
/// `message`, `recommended_action` and `severity` are synthesized by the
/// store when not supplied.
#[derive(Debug, Clone)]
pub struct AlertDraft {
    pub sku: String,
    pub item_id: Option<Uuid>,
    pub variant_id: Option<Uuid>,
    pub alert_type: AlertType,
    pub priority: AlertPriority,
    pub threshold: i32,
    pub current_stock: i32,
    pub message: Option<String>,
    pub recommended_action: Option<String>,
    pub severity: Option<i16>,
    pub estimated_impact: Option<EstimatedImpact>,
    pub auto_resolve: bool,
    pub auto_resolve_threshold: Option<i32>,
    pub suppress_until: Option<DateTime<Utc>>,
    pub suppress_similar: bool,
}
