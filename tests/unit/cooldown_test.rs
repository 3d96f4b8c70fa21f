//! Unit tests for notification cooldown enforcement
//!
//! Given a channel cooldown of C minutes: two sends separated by < C allow
//! exactly one transport send; separated by >= C, both are allowed.

use chrono::{Duration, Utc};
use sqlx::types::Json;
use stockwatch::models::{
    Alert, AlertPriority, AlertStatus, AlertType, Channel, NotificationLog,
};
use stockwatch::services::can_send;
use uuid::Uuid;

fn test_alert(notifications: NotificationLog) -> Alert {
    let now = Utc::now();
    Alert {
        id: Uuid::new_v4(),
        sku: "WIDGET-42".to_string(),
        item_id: Some(Uuid::new_v4()),
        variant_id: None,
        alert_type: AlertType::LowStock,
        priority: AlertPriority::Medium,
        threshold: 5,
        current_stock: 3,
        message: "WIDGET-42 is low on stock (3 remaining, threshold 5)".to_string(),
        recommended_action: "Consider restocking soon".to_string(),
        severity: 6,
        estimated_impact: None,
        status: AlertStatus::Active,
        acknowledged_at: None,
        acknowledged_by: None,
        resolved_at: None,
        resolved_by: None,
        resolution_notes: None,
        notifications: Json(notifications),
        auto_resolve: false,
        auto_resolve_threshold: None,
        suppress_until: None,
        suppress_similar: false,
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn test_first_send_always_allowed() {
    let alert = test_alert(NotificationLog::default());

    for channel in Channel::ALL {
        assert!(can_send(&alert, channel, 60, Utc::now()));
    }
}

#[test]
fn test_send_within_cooldown_blocked() {
    let now = Utc::now();
    let mut log = NotificationLog::default();
    log.record(Channel::Email, now - Duration::minutes(30));
    let alert = test_alert(log);

    assert!(!can_send(&alert, Channel::Email, 60, now));
}

#[test]
fn test_send_after_cooldown_allowed() {
    let now = Utc::now();
    let mut log = NotificationLog::default();
    log.record(Channel::Email, now - Duration::minutes(61));
    let alert = test_alert(log);

    assert!(can_send(&alert, Channel::Email, 60, now));
}

#[test]
fn test_send_at_exact_cooldown_boundary_allowed() {
    let now = Utc::now();
    let mut log = NotificationLog::default();
    log.record(Channel::Sms, now - Duration::minutes(60));
    let alert = test_alert(log);

    assert!(can_send(&alert, Channel::Sms, 60, now));
}

#[test]
fn test_cooldown_tracked_per_channel() {
    let now = Utc::now();
    let mut log = NotificationLog::default();
    log.record(Channel::Email, now - Duration::minutes(5));
    let alert = test_alert(log);

    assert!(!can_send(&alert, Channel::Email, 60, now));
    // Other channels have no history and remain allowed
    assert!(can_send(&alert, Channel::Sms, 60, now));
    assert!(can_send(&alert, Channel::Push, 60, now));
}

#[test]
fn test_most_recent_timestamp_drives_cooldown() {
    let now = Utc::now();
    let mut log = NotificationLog::default();
    log.record(Channel::Push, now - Duration::minutes(120));
    log.record(Channel::Push, now - Duration::minutes(10));
    let alert = test_alert(log);

    assert!(!can_send(&alert, Channel::Push, 60, now));
}

#[test]
fn test_notification_log_last_sent_and_empty() {
    let now = Utc::now();
    let mut log = NotificationLog::default();
    assert!(log.is_empty());
    assert_eq!(log.last_sent(Channel::Email), None);

    log.record(Channel::Email, now - Duration::minutes(2));
    log.record(Channel::Email, now);

    assert!(!log.is_empty());
    assert_eq!(log.last_sent(Channel::Email), Some(now));
}
