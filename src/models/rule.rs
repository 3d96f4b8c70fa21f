//! Alert rule configuration.
//!
//! Rules are declarative condition/action pairs supplied at startup as a
//! JSON document. Conditions are explicit sum types with one evaluation
//! function per variant (see `engine::evaluator`), not free-form JSON.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::models::{AlertPriority, AlertType, Channel};

// =============================================================================
// Conditions
// =============================================================================

/// Comparison operator for the stock-level condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockOperator {
    Lte,
    Gte,
    Eq,
}

/// Aggregate movement direction for the velocity condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VelocityDirection {
    Increase,
    Decrease,
}

/// Stock-level condition: compare current stock against a fixed value or
/// against the item's own configured low-stock threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockLevelCondition {
    pub operator: StockOperator,
    #[serde(default)]
    pub value: Option<i32>,
    /// When set, resolve the comparison value from the event's
    /// `low_stock_threshold` instead of `value`.
    #[serde(default)]
    pub use_item_threshold: bool,
}

/// Stock-velocity condition over the movement ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VelocityCondition {
    pub direction: VelocityDirection,
    /// Minimum |delta| / |stock before window|, as a fraction in (0, 1].
    /// Absent means any movement in the configured direction matches.
    #[serde(default)]
    pub percent: Option<f64>,
    /// Lookback window for ledger entries
    pub timeframe_minutes: i64,
}

/// Metadata filters applied before any stock condition.
/// Empty lists match everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleFilters {
    #[serde(default)]
    pub item_types: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub brands: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleConditions {
    #[serde(default)]
    pub stock_level: Option<StockLevelCondition>,
    #[serde(default)]
    pub velocity: Option<VelocityCondition>,
    #[serde(default)]
    pub filters: RuleFilters,
}

// =============================================================================
// Actions
// =============================================================================

/// Per-channel notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSetting {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub recipients: Vec<String>,
    /// Minutes between sends on this channel; engine default applies when
    /// unset.
    #[serde(default)]
    pub cooldown_minutes: Option<i64>,
}

fn default_true() -> bool {
    true
}

/// Auto-resolution settings carried onto created alerts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoResolveSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub threshold: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleActions {
    #[serde(default = "default_true")]
    pub create_alert: bool,
    pub alert_type: AlertType,
    #[serde(default)]
    pub priority: AlertPriority,
    #[serde(default)]
    pub channels: HashMap<Channel, ChannelSetting>,
    #[serde(default)]
    pub auto_resolve: AutoResolveSettings,
    /// Suppress re-creation of similar alerts for this long after creation
    #[serde(default)]
    pub suppress_similar: bool,
    #[serde(default)]
    pub suppress_minutes: Option<i64>,
}

// =============================================================================
// Rule & Rule Set
// =============================================================================

/// One declarative alert rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub conditions: RuleConditions,
    pub actions: RuleActions,
}

/// Ordered rule collection, read-only after startup and shared across
/// evaluator workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    pub rules: Vec<AlertRule>,
}

impl RuleSet {
    /// Loads a rule set from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RuleSetError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| RuleSetError::Io(path.as_ref().display().to_string(), e))?;
        let set: RuleSet = serde_json::from_str(&raw).map_err(RuleSetError::Parse)?;
        Ok(set)
    }

    /// Built-in defaults used when no rule file is configured: low-stock
    /// against the item's own threshold, and out-of-stock at zero.
    pub fn defaults() -> Self {
        RuleSet {
            rules: vec![
                AlertRule {
                    name: "low-stock".to_string(),
                    enabled: true,
                    conditions: RuleConditions {
                        stock_level: Some(StockLevelCondition {
                            operator: StockOperator::Lte,
                            value: None,
                            use_item_threshold: true,
                        }),
                        velocity: None,
                        filters: RuleFilters::default(),
                    },
                    actions: RuleActions {
                        create_alert: true,
                        alert_type: AlertType::LowStock,
                        priority: AlertPriority::Medium,
                        channels: HashMap::new(),
                        auto_resolve: AutoResolveSettings {
                            enabled: true,
                            threshold: None,
                        },
                        suppress_similar: false,
                        suppress_minutes: None,
                    },
                },
                AlertRule {
                    name: "out-of-stock".to_string(),
                    enabled: true,
                    conditions: RuleConditions {
                        stock_level: Some(StockLevelCondition {
                            operator: StockOperator::Eq,
                            value: Some(0),
                            use_item_threshold: false,
                        }),
                        velocity: None,
                        filters: RuleFilters::default(),
                    },
                    actions: RuleActions {
                        create_alert: true,
                        alert_type: AlertType::OutOfStock,
                        priority: AlertPriority::Critical,
                        channels: HashMap::new(),
                        auto_resolve: AutoResolveSettings {
                            enabled: true,
                            threshold: Some(1),
                        },
                        suppress_similar: false,
                        suppress_minutes: None,
                    },
                },
            ],
        }
    }

    /// Enabled rules, in configured order.
    pub fn enabled(&self) -> impl Iterator<Item = &AlertRule> {
        self.rules.iter().filter(|r| r.enabled)
    }

    /// Channel settings of the first enabled rule producing this alert type.
    /// Used when re-dispatching stored alerts, which don't carry their rule.
    pub fn channels_for(&self, alert_type: AlertType) -> HashMap<Channel, ChannelSetting> {
        self.enabled()
            .find(|r| r.actions.alert_type == alert_type)
            .map(|r| r.actions.channels.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RuleSetError {
    #[error("Failed to read rule file {0}: {1}")]
    Io(String, #[source] std::io::Error),

    #[error("Invalid rule file: {0}")]
    Parse(#[source] serde_json::Error),
}
