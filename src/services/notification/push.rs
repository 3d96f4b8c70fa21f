//! Push transport.
//!
//! Posts alert notifications to an HTTP push gateway as JSON, with an
//! HMAC-SHA256 signature so the gateway can verify the sender.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::sms::validate_gateway_url;
use super::{ChannelTransport, NotifyRequest, SendOutcome};
use crate::models::Channel;

type HmacSha256 = Hmac<Sha256>;

/// HTTP push-gateway transport
pub struct PushTransport {
    client: reqwest::Client,
    gateway_url: Option<String>,
    gateway_secret: Option<String>,
}

impl PushTransport {
    /// Creates a push transport configured from the environment
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            gateway_url: std::env::var("PUSH_GATEWAY_URL")
                .ok()
                .filter(|u| validate_gateway_url(u).is_ok()),
            gateway_secret: std::env::var("PUSH_GATEWAY_SECRET").ok(),
        }
    }

    /// Generates the HMAC-SHA256 signature over `timestamp.payload`
    fn generate_signature(secret: &str, timestamp: &str, payload: &[u8]) -> String {
        let signature_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
        mac.update(signature_payload.as_bytes());
        let result = mac.finalize();
        hex::encode(result.into_bytes())
    }

    /// `X-Stockwatch-Signature` header value: `sha256=<hex digest>`
    fn signature_header(secret: &str, timestamp: &str, payload: &[u8]) -> String {
        format!(
            "sha256={}",
            Self::generate_signature(secret, timestamp, payload)
        )
    }
}

impl Default for PushTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelTransport for PushTransport {
    fn channel(&self) -> Channel {
        Channel::Push
    }

    async fn send(&self, request: &NotifyRequest) -> SendOutcome {
        let gateway_url = match &self.gateway_url {
            Some(u) => u,
            None => return SendOutcome::failure("Push gateway not configured".to_string(), None),
        };

        let body = match serde_json::to_vec(request) {
            Ok(b) => b,
            Err(e) => {
                return SendOutcome::failure(format!("Failed to serialize payload: {}", e), None)
            }
        };

        let timestamp = Utc::now().timestamp().to_string();

        let mut http_request = self
            .client
            .post(gateway_url)
            .header("Content-Type", "application/json")
            .header("X-Stockwatch-Timestamp", &timestamp)
            .header("X-Stockwatch-Request-ID", &request.alert_id);

        if let Some(secret) = &self.gateway_secret {
            http_request = http_request.header(
                "X-Stockwatch-Signature",
                Self::signature_header(secret, &timestamp, &body),
            );
        }

        match http_request.body(body).send().await {
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
