//! SMS transport.
//!
//! Posts alert notifications to an HTTP SMS gateway as JSON. The gateway
//! URL and token come from the environment; recipients (phone numbers) come
//! from the matching rule.

use async_trait::async_trait;
use serde_json::json;

use super::{ChannelTransport, NotifyRequest, SendOutcome};
use crate::models::Channel;

/// HTTP SMS-gateway transport
pub struct SmsTransport {
    client: reqwest::Client,
    gateway_url: Option<String>,
    gateway_token: Option<String>,
}

impl SmsTransport {
    /// Creates an SMS transport configured from the environment
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            gateway_url: std::env::var("SMS_GATEWAY_URL")
                .ok()
                .filter(|u| validate_gateway_url(u).is_ok()),
            gateway_token: std::env::var("SMS_GATEWAY_TOKEN").ok(),
        }
    }

    /// SMS body: short, single line
    fn format_body(request: &NotifyRequest) -> String {
        format!(
            "[{}] {} (stock {}, threshold {})",
            request.priority.to_string().to_uppercase(),
            request.message,
            request.current_stock,
            request.threshold
        )
    }
}

impl Default for SmsTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Gateways must be reachable over HTTP(S)
pub fn validate_gateway_url(raw: &str) -> Result<(), String> {
    let parsed = url::Url::parse(raw).map_err(|_| format!("Invalid gateway URL: {}", raw))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(format!("Gateway URL must use HTTP or HTTPS: {}", raw));
    }
    Ok(())
}

#[async_trait]
impl ChannelTransport for SmsTransport {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    async fn send(&self, request: &NotifyRequest) -> SendOutcome {
        let gateway_url = match &self.gateway_url {
            Some(u) => u,
            None => return SendOutcome::failure("SMS gateway not configured".to_string(), None),
        };

        if request.recipients.is_empty() {
            return SendOutcome::failure("No SMS recipients configured".to_string(), None);
        }

        let payload = json!({
            "alert_id": request.alert_id,
            "to": request.recipients,
            "body": Self::format_body(request),
        });

        let mut http_request = self
            .client
            .post(gateway_url)
            .header("Content-Type", "application/json");

        if let Some(token) = &self.gateway_token {
            http_request = http_request.bearer_auth(token);
        }

        match http_request.json(&payload).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                if response.status().is_success() {
                    SendOutcome::success(Some(status))
                } else {
                    let error_body = response.text().await.unwrap_or_default();
                    let error_msg = if error_body.is_empty() {
                        format!("HTTP {}", status)
                    } else {
                        format!("HTTP {}: {}", status, error_body)
                    };
                    SendOutcome::failure(error_msg, Some(status))
                }
            }
            Err(e) => {
                let error_msg = if e.is_timeout() {
                    "Request timed out".to_string()
                } else if e.is_connect() {
                    "Connection failed".to_string()
                } else {
                    format!("Request failed: {}", e)
                };
                SendOutcome::failure(error_msg, None)
            }
        }
    }
}
