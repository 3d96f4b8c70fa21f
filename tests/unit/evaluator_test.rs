//! Unit tests for the rule evaluator
//!
//! Uses in-memory fakes for the movement ledger and the alert index so no
//! database is needed.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use stockwatch::error::{AppError, AppResult};
use stockwatch::models::{
    AlertPriority, AlertRule, AlertType, AutoResolveSettings, OwnerType, RuleConditions,
    RuleFilters, RuleSet, StockChangeEvent, StockLevelCondition, StockMovement, StockOperator,
    VelocityCondition, VelocityDirection,
};
use stockwatch::engine::{velocity_matches, Evaluator};
use stockwatch::services::{AlertIndex, StockLedger};
use uuid::Uuid;

// =============================================================================
// Fakes
// =============================================================================

/// Canned ledger: returns the same movements for every SKU, or fails.
struct FakeLedger {
    movements: Vec<StockMovement>,
    fail: bool,
}

impl FakeLedger {
    fn empty() -> Self {
        Self {
            movements: Vec::new(),
            fail: false,
        }
    }

    fn with_deltas(deltas: &[i32]) -> Self {
        let now = Utc::now();
        let movements = deltas
            .iter()
            .enumerate()
            .map(|(i, &delta)| StockMovement {
                id: i as i64 + 1,
                sku: "WIDGET-42".to_string(),
                quantity_delta: delta,
                recorded_at: now - Duration::minutes(deltas.len() as i64 - i as i64),
            })
            .collect();
        Self {
            movements,
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            movements: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl StockLedger for FakeLedger {
    async fn movements_since(
        &self,
        _sku: &str,
        _since: DateTime<Utc>,
    ) -> AppResult<Vec<StockMovement>> {
        if self.fail {
            return Err(AppError::Internal("ledger unavailable".to_string()));
        }
        Ok(self.movements.clone())
    }
}

/// In-memory alert index keyed by (sku, alert_type).
#[derive(Default)]
struct FakeIndex {
    active: Vec<(String, AlertType)>,
    suppressed: Vec<(String, AlertType)>,
}

impl FakeIndex {
    fn with_active(sku: &str, alert_type: AlertType) -> Self {
        Self {
            active: vec![(sku.to_string(), alert_type)],
            suppressed: Vec::new(),
        }
    }

    fn with_suppressed(sku: &str, alert_type: AlertType) -> Self {
        Self {
            active: Vec::new(),
            suppressed: vec![(sku.to_string(), alert_type)],
        }
    }
}

#[async_trait]
impl AlertIndex for FakeIndex {
    async fn has_active(&self, sku: &str, alert_type: AlertType) -> AppResult<bool> {
        Ok(self
            .active
            .iter()
            .any(|(s, t)| s == sku && *t == alert_type))
    }

    async fn is_suppressed(&self, sku: &str, alert_type: AlertType) -> AppResult<bool> {
        Ok(self
            .suppressed
            .iter()
            .any(|(s, t)| s == sku && *t == alert_type))
    }
}

// =============================================================================
// Fixtures
// =============================================================================

fn test_event(current_stock: i32, low_stock_threshold: Option<i32>) -> StockChangeEvent {
    StockChangeEvent {
        owner_type: OwnerType::Item,
        owner_id: Uuid::new_v4(),
        sku: "WIDGET-42".to_string(),
        current_stock,
        low_stock_threshold,
        categories: vec!["electronics".to_string()],
        brand: Some("Acme".to_string()),
        item_type: Some("physical".to_string()),
        changed_at: Utc::now(),
    }
}

fn stock_rule(
    name: &str,
    alert_type: AlertType,
    cond: StockLevelCondition,
    filters: RuleFilters,
) -> AlertRule {
    AlertRule {
        name: name.to_string(),
        enabled: true,
        conditions: RuleConditions {
            stock_level: Some(cond),
            velocity: None,
            filters,
        },
        actions: stockwatch::models::RuleActions {
            create_alert: true,
            alert_type,
            priority: AlertPriority::Medium,
            channels: HashMap::new(),
            auto_resolve: AutoResolveSettings::default(),
            suppress_similar: false,
            suppress_minutes: None,
        },
    }
}

fn evaluator(rules: RuleSet, ledger: FakeLedger, index: FakeIndex) -> Evaluator {
    Evaluator::new(Arc::new(rules), Arc::new(ledger), Arc::new(index))
}

// =============================================================================
// Stock-level rules
// =============================================================================

#[tokio::test]
async fn test_low_stock_fires_against_item_threshold() {
    let rules = RuleSet {
        rules: vec![stock_rule(
            "low-stock",
            AlertType::LowStock,
            StockLevelCondition {
                operator: StockOperator::Lte,
                value: None,
                use_item_threshold: true,
            },
            RuleFilters::default(),
        )],
    };
    let eval = evaluator(rules, FakeLedger::empty(), FakeIndex::default());

    let requests = eval.evaluate(&test_event(3, Some(5))).await;

    assert_eq!(requests.len(), 1);
    let draft = &requests[0].draft;
    assert_eq!(draft.alert_type, AlertType::LowStock);
    assert_eq!(draft.sku, "WIDGET-42");
    assert_eq!(draft.threshold, 5);
    assert_eq!(draft.current_stock, 3);
    assert!(draft.item_id.is_some());
    assert!(draft.variant_id.is_none());
}

#[tokio::test]
async fn test_stock_above_threshold_does_not_fire() {
    let rules = RuleSet {
        rules: vec![stock_rule(
            "low-stock",
            AlertType::LowStock,
            StockLevelCondition {
                operator: StockOperator::Lte,
                value: None,
                use_item_threshold: true,
            },
            RuleFilters::default(),
        )],
    };
    let eval = evaluator(rules, FakeLedger::empty(), FakeIndex::default());

    let requests = eval.evaluate(&test_event(6, Some(5))).await;

    assert!(requests.is_empty());
}

#[tokio::test]
async fn test_active_alert_suppresses_duplicate_but_not_other_types() {
    // Default rule set: low-stock (item threshold) + out-of-stock (eq 0).
    // An existing active low_stock alert must not block the out_of_stock rule.
    let index = FakeIndex::with_active("WIDGET-42", AlertType::LowStock);
    let eval = evaluator(RuleSet::defaults(), FakeLedger::empty(), index);

    let requests = eval.evaluate(&test_event(0, Some(5))).await;

    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].draft.alert_type, AlertType::OutOfStock);
}

#[tokio::test]
async fn test_suppression_window_blocks_recreation() {
    let index = FakeIndex::with_suppressed("WIDGET-42", AlertType::LowStock);
    let rules = RuleSet {
        rules: vec![stock_rule(
            "low-stock",
            AlertType::LowStock,
            StockLevelCondition {
                operator: StockOperator::Lte,
                value: Some(5),
                use_item_threshold: false,
            },
            RuleFilters::default(),
        )],
    };
    let eval = evaluator(rules, FakeLedger::empty(), index);

    let requests = eval.evaluate(&test_event(3, None)).await;

    assert!(requests.is_empty());
}

#[tokio::test]
async fn test_misconfigured_rule_skipped_without_halting_others() {
    // First rule has neither a value nor a usable item threshold; the
    // second is well-formed and must still fire.
    let rules = RuleSet {
        rules: vec![
            stock_rule(
                "broken",
                AlertType::RestockNeeded,
                StockLevelCondition {
                    operator: StockOperator::Lte,
                    value: None,
                    use_item_threshold: false,
                },
                RuleFilters::default(),
            ),
            stock_rule(
                "out-of-stock",
                AlertType::OutOfStock,
                StockLevelCondition {
                    operator: StockOperator::Eq,
                    value: Some(0),
                    use_item_threshold: false,
                },
                RuleFilters::default(),
            ),
        ],
    };
    let eval = evaluator(rules, FakeLedger::empty(), FakeIndex::default());

    let requests = eval.evaluate(&test_event(0, None)).await;

    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].draft.alert_type, AlertType::OutOfStock);
}

#[tokio::test]
async fn test_stock_at_threshold_does_not_instantly_auto_resolve() {
    // Default low-stock rule: lte against the item threshold, auto-resolve
    // on with no explicit recovery level. An event at exactly the threshold
    // fires the rule; the recovery level must sit strictly above it, or the
    // same event would resolve the alert it just created and every
    // redelivery would mint a fresh one.
    let eval = evaluator(RuleSet::defaults(), FakeLedger::empty(), FakeIndex::default());

    let requests = eval.evaluate(&test_event(5, Some(5))).await;

    assert_eq!(requests.len(), 1);
    let draft = &requests[0].draft;
    assert_eq!(draft.alert_type, AlertType::LowStock);
    assert_eq!(draft.threshold, 5);
    assert_eq!(draft.auto_resolve_threshold, Some(6));
    assert!(draft
        .auto_resolve_threshold
        .is_some_and(|t| draft.current_stock < t));
}

#[tokio::test]
async fn test_explicit_auto_resolve_threshold_is_kept() {
    // Default out-of-stock rule configures recovery at 1 explicitly.
    let eval = evaluator(RuleSet::defaults(), FakeLedger::empty(), FakeIndex::default());

    let requests = eval.evaluate(&test_event(0, None)).await;

    assert_eq!(requests.len(), 1);
    let draft = &requests[0].draft;
    assert_eq!(draft.alert_type, AlertType::OutOfStock);
    assert_eq!(draft.auto_resolve_threshold, Some(1));
}

#[tokio::test]
async fn test_item_threshold_rule_skips_items_without_threshold() {
    let rules = RuleSet {
        rules: vec![stock_rule(
            "low-stock",
            AlertType::LowStock,
            StockLevelCondition {
                operator: StockOperator::Lte,
                value: None,
                use_item_threshold: true,
            },
            RuleFilters::default(),
        )],
    };
    let eval = evaluator(rules, FakeLedger::empty(), FakeIndex::default());

    let requests = eval.evaluate(&test_event(3, None)).await;

    assert!(requests.is_empty());
}

// =============================================================================
// Filters
// =============================================================================

#[tokio::test]
async fn test_filters_reject_non_matching_brand() {
    let rules = RuleSet {
        rules: vec![stock_rule(
            "branded-low-stock",
            AlertType::LowStock,
            StockLevelCondition {
                operator: StockOperator::Lte,
                value: Some(5),
                use_item_threshold: false,
            },
            RuleFilters {
                brands: vec!["OtherBrand".to_string()],
                ..Default::default()
            },
        )],
    };
    let eval = evaluator(rules, FakeLedger::empty(), FakeIndex::default());

    let requests = eval.evaluate(&test_event(3, None)).await;

    assert!(requests.is_empty());
}

#[tokio::test]
async fn test_filters_match_on_any_category() {
    let rules = RuleSet {
        rules: vec![stock_rule(
            "category-low-stock",
            AlertType::LowStock,
            StockLevelCondition {
                operator: StockOperator::Lte,
                value: Some(5),
                use_item_threshold: false,
            },
            RuleFilters {
                categories: vec!["toys".to_string(), "electronics".to_string()],
                ..Default::default()
            },
        )],
    };
    let eval = evaluator(rules, FakeLedger::empty(), FakeIndex::default());

    let requests = eval.evaluate(&test_event(3, None)).await;

    assert_eq!(requests.len(), 1);
}

// =============================================================================
// Velocity
// =============================================================================

fn velocity_rule(percent: Option<f64>) -> AlertRule {
    AlertRule {
        name: "high-demand".to_string(),
        enabled: true,
        conditions: RuleConditions {
            stock_level: None,
            velocity: Some(VelocityCondition {
                direction: VelocityDirection::Decrease,
                percent,
                timeframe_minutes: 60,
            }),
            filters: RuleFilters::default(),
        },
        actions: stockwatch::models::RuleActions {
            create_alert: true,
            alert_type: AlertType::HighDemand,
            priority: AlertPriority::High,
            channels: HashMap::new(),
            auto_resolve: AutoResolveSettings::default(),
            suppress_similar: false,
            suppress_minutes: None,
        },
    }
}

#[tokio::test]
async fn test_velocity_below_percent_does_not_fire() {
    // Sold 30 of a baseline of 100: 30% < 50%
    let rules = RuleSet {
        rules: vec![velocity_rule(Some(0.5))],
    };
    let eval = evaluator(rules, FakeLedger::with_deltas(&[-10, -20]), FakeIndex::default());

    let requests = eval.evaluate(&test_event(70, None)).await;

    assert!(requests.is_empty());
}

#[tokio::test]
async fn test_velocity_above_percent_fires() {
    // Sold 55 of a baseline of 100: 55% >= 50%
    let rules = RuleSet {
        rules: vec![velocity_rule(Some(0.5))],
    };
    let eval = evaluator(rules, FakeLedger::with_deltas(&[-25, -30]), FakeIndex::default());

    let requests = eval.evaluate(&test_event(45, None)).await;

    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].draft.alert_type, AlertType::HighDemand);
}

#[tokio::test]
async fn test_ledger_failure_fails_closed() {
    let rules = RuleSet {
        rules: vec![velocity_rule(None)],
    };
    let eval = evaluator(rules, FakeLedger::failing(), FakeIndex::default());

    let requests = eval.evaluate(&test_event(45, None)).await;

    assert!(requests.is_empty());
}

#[test]
fn test_velocity_wrong_direction_does_not_match() {
    let cond = VelocityCondition {
        direction: VelocityDirection::Decrease,
        percent: None,
        timeframe_minutes: 60,
    };
    let movements = vec![StockMovement {
        id: 1,
        sku: "WIDGET-42".to_string(),
        quantity_delta: 40,
        recorded_at: Utc::now(),
    }];

    assert!(!velocity_matches(&cond, &movements, 140));
}

#[test]
fn test_velocity_zero_baseline_passes() {
    // Stock went from 0 to 20: any increase from an empty baseline matches
    let cond = VelocityCondition {
        direction: VelocityDirection::Increase,
        percent: Some(0.5),
        timeframe_minutes: 60,
    };
    let movements = vec![StockMovement {
        id: 1,
        sku: "WIDGET-42".to_string(),
        quantity_delta: 20,
        recorded_at: Utc::now(),
    }];

    assert!(velocity_matches(&cond, &movements, 20));
}

#[test]
fn test_velocity_no_movements_does_not_match() {
    let cond = VelocityCondition {
        direction: VelocityDirection::Decrease,
        percent: None,
        timeframe_minutes: 60,
    };

    assert!(!velocity_matches(&cond, &[], 50));
}
