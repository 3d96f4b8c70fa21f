//! Rule evaluator: turns a stock change event into zero or more alert
//! creation requests.
//!
//! Rules are evaluated independently and in rule-set order; several rules may
//! fire for the same event because the alert type is part of the dedup key.
//! A malfunctioning rule (bad config, failed ledger query) is skipped with a
//! warning and never halts evaluation of the others.

use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{
    AlertDraft, AlertRule, Channel, ChannelSetting, RuleFilters, RuleSet, StockChangeEvent,
    StockLevelCondition, StockMovement, StockOperator, VelocityCondition, VelocityDirection,
};
use crate::services::{AlertIndex, StockLedger};

/// One matched rule's output: the alert to create plus the rule's channel
/// settings for the dispatcher.
#[derive(Debug, Clone)]
pub struct AlertCreationRequest {
    pub draft: AlertDraft,
    pub channels: HashMap<Channel, ChannelSetting>,
}

/// Outcome of the stock-level check for a single rule
enum StockCheck {
    /// Condition matched; carries the resolved comparison threshold
    Matched(i32),
    NotMatched,
    /// Rule misconfiguration, e.g. no value and no usable item threshold
    Invalid(&'static str),
}

/// Applies the metadata filters. Empty filter lists match everything.
pub fn matches_filters(filters: &RuleFilters, event: &StockChangeEvent) -> bool {
    if !filters.item_types.is_empty() {
        match &event.item_type {
            Some(t) if filters.item_types.iter().any(|f| f == t) => {}
            _ => return false,
        }
    }

    if !filters.categories.is_empty()
        && !event
            .categories
            .iter()
            .any(|c| filters.categories.iter().any(|f| f == c))
    {
        return false;
    }

    if !filters.brands.is_empty() {
        match &event.brand {
            Some(b) if filters.brands.iter().any(|f| f == b) => {}
            _ => return false,
        }
    }

    true
}

/// Resolves the comparison value and applies the operator.
fn check_stock_level(cond: &StockLevelCondition, event: &StockChangeEvent) -> StockCheck {
    let threshold = if cond.use_item_threshold {
        match event.low_stock_threshold {
            Some(t) => t,
            None => return StockCheck::Invalid("item has no low-stock threshold"),
        }
    } else {
        match cond.value {
            Some(v) => v,
            None => return StockCheck::Invalid("stock-level condition has no value"),
        }
    };

    let matched = match cond.operator {
        StockOperator::Lte => event.current_stock <= threshold,
        StockOperator::Gte => event.current_stock >= threshold,
        StockOperator::Eq => event.current_stock == threshold,
    };

    if matched {
        StockCheck::Matched(threshold)
    } else {
        StockCheck::NotMatched
    }
}

/// Aggregates ledger movements and applies the velocity condition.
///
/// The baseline is the stock level before the window
/// (`current_stock - sum(deltas)`); a zero baseline passes automatically
/// since any movement from zero is significant.
pub fn velocity_matches(
    cond: &VelocityCondition,
    movements: &[StockMovement],
    current_stock: i32,
) -> bool {
    let delta: i64 = movements.iter().map(|m| m.quantity_delta as i64).sum();

    let direction_ok = match cond.direction {
        VelocityDirection::Decrease => delta < 0,
        VelocityDirection::Increase => delta > 0,
    };
    if !direction_ok {
        return false;
    }

    match cond.percent {
        None => true,
        Some(percent) => {
            let stock_before = current_stock as i64 - delta;
            if stock_before == 0 {
                return true;
            }
            let ratio = delta.unsigned_abs() as f64 / stock_before.unsigned_abs() as f64;
            ratio >= percent
        }
    }
}

/// Evaluates the rule set against incoming stock change events.
///
/// Read-only after construction; safe to share across workers. The ledger
/// and the alert index are the only suspension points.
pub struct Evaluator {
    rules: Arc<RuleSet>,
    ledger: Arc<dyn StockLedger>,
    index: Arc<dyn AlertIndex>,
}

impl Evaluator {
    pub fn new(
        rules: Arc<RuleSet>,
        ledger: Arc<dyn StockLedger>,
        index: Arc<dyn AlertIndex>,
    ) -> Self {
        Self {
            rules,
            ledger,
            index,
        }
    }

    /// Evaluates every enabled rule against the event, in rule-set order.
    pub async fn evaluate(&self, event: &StockChangeEvent) -> Vec<AlertCreationRequest> {
        let mut requests = Vec::new();

        for rule in self.rules.enabled() {
            if let Some(request) = self.evaluate_rule(rule, event).await {
                requests.push(request);
            }
        }

        requests
    }

    /// Runs one rule through filters, stock-level, velocity and dedup checks.
    async fn evaluate_rule(
        &self,
        rule: &AlertRule,
        event: &StockChangeEvent,
    ) -> Option<AlertCreationRequest> {
        if !rule.actions.create_alert {
            return None;
        }

        if !matches_filters(&rule.conditions.filters, event) {
            return None;
        }

        let mut threshold = None;
        if let Some(cond) = &rule.conditions.stock_level {
            match check_stock_level(cond, event) {
                StockCheck::Matched(t) => threshold = Some(t),
                StockCheck::NotMatched => return None,
                StockCheck::Invalid(reason) => {
                    log::warn!("Rule '{}' skipped: {}", rule.name, reason);
                    return None;
                }
            }
        }

        if let Some(cond) = &rule.conditions.velocity {
            if cond.timeframe_minutes <= 0 {
                log::warn!(
                    "Rule '{}' skipped: velocity timeframe must be positive",
                    rule.name
                );
                return None;
            }

            let since = Utc::now() - Duration::minutes(cond.timeframe_minutes);
            // Fail closed: an unreadable ledger means this rule doesn't fire.
            let movements = match self.ledger.movements_since(&event.sku, since).await {
                Ok(m) => m,
                Err(e) => {
                    log::warn!(
                        "Rule '{}' skipped for {}: ledger query failed: {}",
                        rule.name,
                        event.sku,
                        e
                    );
                    return None;
                }
            };

            if !velocity_matches(cond, &movements, event.current_stock) {
                return None;
            }
        }

        let alert_type = rule.actions.alert_type;

        // Dedup / suppression pre-check. The store's unique index is the
        // real guard; this just avoids useless inserts. Fail closed here too.
        match self.index.is_suppressed(&event.sku, alert_type).await {
            Ok(true) => {
                log::debug!("{} alert for {} suppressed", alert_type, event.sku);
                return None;
            }
            Ok(false) => {}
            Err(e) => {
                log::warn!("Suppression lookup failed for {}: {}", event.sku, e);
                return None;
            }
        }
        match self.index.has_active(&event.sku, alert_type).await {
            Ok(true) => return None,
            Ok(false) => {}
            Err(e) => {
                log::warn!("Dedup lookup failed for {}: {}", event.sku, e);
                return None;
            }
        }

        let threshold = threshold.or(event.low_stock_threshold).unwrap_or(0);
        let (item_id, variant_id) = event.owner_refs();

        let auto_resolve = rule.actions.auto_resolve.enabled;
        // Recovery must clear the trigger strictly: at `threshold` itself the
        // creating event would resolve its own alert, and every redelivery
        // would then mint a fresh one.
        let auto_resolve_threshold = if auto_resolve {
            rule.actions
                .auto_resolve
                .threshold
                .or(Some(threshold.saturating_add(1)))
        } else {
            None
        };

        let suppress_until = if rule.actions.suppress_similar {
            rule.actions
                .suppress_minutes
                .map(|m| Utc::now() + Duration::minutes(m))
        } else {
            None
        };

        Some(AlertCreationRequest {
            draft: AlertDraft {
                sku: event.sku.clone(),
                item_id,
                variant_id,
                alert_type,
                priority: rule.actions.priority,
                threshold,
                current_stock: event.current_stock,
                message: None,
                recommended_action: None,
                severity: None,
                estimated_impact: None,
                auto_resolve,
                auto_resolve_threshold,
                suppress_until,
                suppress_similar: rule.actions.suppress_similar,
            },
            channels: rule.actions.channels.clone(),
        })
    }
}
