//! Notification dispatch using the Strategy pattern.
//!
//! Each external channel (email, SMS, push) implements [`ChannelTransport`];
//! the dispatcher fans an alert out to every enabled channel under per-channel
//! cooldown discipline and appends successful sends to the alert's
//! notification log. The dashboard channel is in-app visibility, not a
//! transport: it is always enabled and only recorded.

pub mod email;
pub mod push;
pub mod sms;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{Alert, AlertPriority, Channel, ChannelSetting};
use crate::services::AlertService;

pub use email::EmailTransport;
pub use push::PushTransport;
pub use sms::SmsTransport;

// =============================================================================
// Send request & outcome
// =============================================================================

/// Per-channel send request handed to a transport
#[derive(Debug, Clone, Serialize)]
pub struct NotifyRequest {
    pub alert_id: String,
    pub sku: String,
    pub alert_type: String,
    pub message: String,
    pub recommended_action: String,
    pub priority: AlertPriority,
    pub severity: i16,
    pub current_stock: i32,
    pub threshold: i32,
    pub recipients: Vec<String>,
    pub triggered_at: DateTime<Utc>,
}

impl NotifyRequest {
    fn for_alert(alert: &Alert, recipients: Vec<String>) -> Self {
        Self {
            alert_id: alert.id.to_string(),
            sku: alert.sku.clone(),
            alert_type: alert.alert_type.to_string(),
            message: alert.message.clone(),
            recommended_action: alert.recommended_action.clone(),
            priority: alert.priority,
            severity: alert.severity,
            current_stock: alert.current_stock,
            threshold: alert.threshold,
            recipients,
            triggered_at: alert.created_at,
        }
    }
}

/// Result of a delivery attempt
#[derive(Debug)]
pub struct SendOutcome {
    pub success: bool,
    pub http_status: Option<u16>,
    pub error_message: Option<String>,
}

impl SendOutcome {
    /// Creates a successful outcome
    pub fn success(http_status: Option<u16>) -> Self {
        Self {
            success: true,
            http_status,
            error_message: None,
        }
    }

    /// Creates a failed outcome
    pub fn failure(error_message: String, http_status: Option<u16>) -> Self {
        Self {
            success: false,
            http_status,
            error_message: Some(error_message),
        }
    }
}

// =============================================================================
// Transport trait
// =============================================================================

/// Delivery strategy for one external channel
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    /// Channel this transport serves
    fn channel(&self) -> Channel;

    /// Deliver the notification. Failures are reported, never retried here.
    async fn send(&self, request: &NotifyRequest) -> SendOutcome;
}

// =============================================================================
// Cooldown predicate
// =============================================================================

/// Whether a channel may send now: allowed when the channel has never been
/// notified for this alert, or when the cooldown has fully elapsed since the
/// most recent send.
pub fn can_send(alert: &Alert, channel: Channel, cooldown_minutes: i64, now: DateTime<Utc>) -> bool {
    match alert.notifications.last_sent(channel) {
        None => true,
        Some(last) => now - last >= Duration::minutes(cooldown_minutes),
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Fans one alert out across the configured channels.
///
/// Dispatch is idempotent: channels inside their cooldown are silently
/// skipped, and a failing transport neither blocks the other channels nor
/// rolls back the alert.
pub struct Dispatcher {
    transports: HashMap<Channel, Arc<dyn ChannelTransport>>,
    default_cooldown_minutes: i64,
}

impl Dispatcher {
    /// Production dispatcher with the real transports, configured from the
    /// environment.
    pub fn new(default_cooldown_minutes: i64) -> Self {
        let transports: Vec<Arc<dyn ChannelTransport>> = vec![
            Arc::new(EmailTransport::new()),
            Arc::new(SmsTransport::new()),
            Arc::new(PushTransport::new()),
        ];

        Self::with_transports(transports, default_cooldown_minutes)
    }

    /// Dispatcher over explicit transports (tests, embedding)
    pub fn with_transports(
        transports: Vec<Arc<dyn ChannelTransport>>,
        default_cooldown_minutes: i64,
    ) -> Self {
        Self {
            transports: transports.into_iter().map(|t| (t.channel(), t)).collect(),
            default_cooldown_minutes,
        }
    }

    /// Dispatches an alert to every enabled channel, returning the number of
    /// channels actually notified (dashboard recording included).
    ///
    /// Channel-local failures, transport or log-append alike, are logged and
    /// never stop the remaining channels.
    pub async fn dispatch(
        &self,
        pool: &PgPool,
        alert: &Alert,
        settings: &HashMap<Channel, ChannelSetting>,
    ) -> u32 {
        let now = Utc::now();
        let mut notified = 0u32;

        for channel in Channel::ALL {
            let setting = settings.get(&channel);

            // Dashboard is always on; other channels need explicit opt-in.
            if channel != Channel::Dashboard && !setting.is_some_and(|s| s.enabled) {
                continue;
            }

            let cooldown = setting
                .and_then(|s| s.cooldown_minutes)
                .unwrap_or(self.default_cooldown_minutes);

            if !can_send(alert, channel, cooldown, now) {
                log::debug!(
                    "Channel {} for alert {} within cooldown, skipping",
                    channel,
                    alert.id
                );
                continue;
            }

            if channel == Channel::Dashboard {
                // In-app visibility: recorded, nothing sent.
                match AlertService::record_notification(pool, alert.id, channel).await {
                    Ok(()) => notified += 1,
                    Err(e) => log::error!(
                        "Failed to record {} notification for alert {}: {}",
                        channel,
                        alert.id,
                        e
                    ),
                }
                continue;
            }

            let transport = match self.transports.get(&channel) {
                Some(t) => t,
                None => continue,
            };

            let recipients = setting.map(|s| s.recipients.clone()).unwrap_or_default();
            let request = NotifyRequest::for_alert(alert, recipients);

            let outcome = transport.send(&request).await;
            if outcome.success {
                // An unrecorded send may repeat after the cooldown would
                // normally apply; preferable to losing the other channels.
                match AlertService::record_notification(pool, alert.id, channel).await {
                    Ok(()) => {
                        notified += 1;
                        log::info!("Alert {} notified via {}", alert.id, channel);
                    }
                    Err(e) => log::error!(
                        "Alert {} sent via {} but the log append failed: {}",
                        alert.id,
                        channel,
                        e
                    ),
                }
            } else {
                log::error!(
                    "Failed to notify alert {} via {}: {}",
                    alert.id,
                    channel,
                    outcome
                        .error_message
                        .as_deref()
                        .unwrap_or("unknown error")
                );
            }
        }

        notified
    }
}
