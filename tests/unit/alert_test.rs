//! Unit tests for the alert model: lifecycle state machine, auto-resolve
//! predicate and message synthesis.

use chrono::Utc;
use rstest::rstest;
use sqlx::types::Json;
use stockwatch::models::{
    normalize_sku, Alert, AlertPriority, AlertStatus, AlertType, NotificationLog,
};
use stockwatch::services::{default_message, default_recommended_action};
use uuid::Uuid;

// =============================================================================
// State machine
// =============================================================================

#[rstest]
#[case(AlertStatus::Active, AlertStatus::Acknowledged, true)]
#[case(AlertStatus::Active, AlertStatus::Resolved, true)]
#[case(AlertStatus::Active, AlertStatus::Dismissed, true)]
#[case(AlertStatus::Active, AlertStatus::Active, false)]
#[case(AlertStatus::Acknowledged, AlertStatus::Resolved, true)]
#[case(AlertStatus::Acknowledged, AlertStatus::Dismissed, true)]
#[case(AlertStatus::Acknowledged, AlertStatus::Active, false)]
#[case(AlertStatus::Acknowledged, AlertStatus::Acknowledged, false)]
#[case(AlertStatus::Resolved, AlertStatus::Active, false)]
#[case(AlertStatus::Resolved, AlertStatus::Acknowledged, false)]
#[case(AlertStatus::Resolved, AlertStatus::Dismissed, false)]
#[case(AlertStatus::Dismissed, AlertStatus::Active, false)]
#[case(AlertStatus::Dismissed, AlertStatus::Resolved, false)]
fn test_status_transitions(
    #[case] from: AlertStatus,
    #[case] to: AlertStatus,
    #[case] allowed: bool,
) {
    assert_eq!(from.can_transition_to(to), allowed);
}

// =============================================================================
// Auto-resolve predicate
// =============================================================================

fn test_alert(
    status: AlertStatus,
    auto_resolve: bool,
    auto_resolve_threshold: Option<i32>,
) -> Alert {
    let now = Utc::now();
    Alert {
        id: Uuid::new_v4(),
        sku: "WIDGET-42".to_string(),
        item_id: Some(Uuid::new_v4()),
        variant_id: None,
        alert_type: AlertType::LowStock,
        priority: AlertPriority::Medium,
        threshold: 5,
        current_stock: 2,
        message: default_message("WIDGET-42", 5, 2),
        recommended_action: default_recommended_action(AlertType::LowStock).to_string(),
        severity: 7,
        estimated_impact: None,
        status,
        acknowledged_at: None,
        acknowledged_by: None,
        resolved_at: None,
        resolved_by: None,
        resolution_notes: None,
        notifications: Json(NotificationLog::default()),
        auto_resolve,
        auto_resolve_threshold,
        suppress_until: None,
        suppress_similar: false,
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn test_should_auto_resolve_when_stock_recovers() {
    let alert = test_alert(AlertStatus::Active, true, Some(5));

    assert!(alert.should_auto_resolve(5));
    assert!(alert.should_auto_resolve(12));
}

#[test]
fn test_should_not_auto_resolve_below_threshold() {
    let alert = test_alert(AlertStatus::Active, true, Some(5));

    assert!(!alert.should_auto_resolve(4));
}

#[test]
fn test_should_not_auto_resolve_when_disabled() {
    let alert = test_alert(AlertStatus::Active, false, Some(5));

    assert!(!alert.should_auto_resolve(12));
}

#[test]
fn test_should_not_auto_resolve_without_threshold() {
    let alert = test_alert(AlertStatus::Active, true, None);

    assert!(!alert.should_auto_resolve(12));
}

#[rstest]
#[case(AlertStatus::Acknowledged)]
#[case(AlertStatus::Resolved)]
#[case(AlertStatus::Dismissed)]
fn test_should_not_auto_resolve_non_active(#[case] status: AlertStatus) {
    let alert = test_alert(status, true, Some(5));

    assert!(!alert.should_auto_resolve(12));
}

// =============================================================================
// Message synthesis & SKU normalization
// =============================================================================

#[test]
fn test_default_message_low_stock() {
    assert_eq!(
        default_message("WIDGET-42", 5, 2),
        "WIDGET-42 is low on stock (2 remaining, threshold 5)"
    );
}

#[test]
fn test_default_message_out_of_stock() {
    assert_eq!(default_message("WIDGET-42", 5, 0), "WIDGET-42 is out of stock");
}

#[rstest]
#[case(AlertType::OutOfStock, "Restock immediately")]
#[case(AlertType::RestockNeeded, "Reorder from supplier")]
#[case(AlertType::LowStock, "Consider restocking soon")]
fn test_default_recommended_action(#[case] alert_type: AlertType, #[case] expected: &str) {
    assert_eq!(default_recommended_action(alert_type), expected);
}

#[rstest]
#[case("widget-42", "WIDGET-42")]
#[case("  WIDGET-42  ", "WIDGET-42")]
#[case("Widget-42", "WIDGET-42")]
#[case("WIDGET-42", "WIDGET-42")]
fn test_normalize_sku(#[case] raw: &str, #[case] expected: &str) {
    assert_eq!(normalize_sku(raw), expected);
}
