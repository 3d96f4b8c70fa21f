//! Email transport.
//!
//! Sends alert notifications via SMTP using the lettre crate, with global
//! SMTP settings from the environment and recipients from the matching rule.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{ChannelTransport, NotifyRequest, SendOutcome};
use crate::models::Channel;

/// SMTP email transport
pub struct EmailTransport {
    smtp_host: Option<String>,
    smtp_port: u16,
    smtp_username: Option<String>,
    smtp_password: Option<String>,
    from_address: String,
}

impl EmailTransport {
    /// Creates an email transport with SMTP settings from the environment
    pub fn new() -> Self {
        Self {
            smtp_host: std::env::var("SMTP_HOST").ok(),
            smtp_port: std::env::var("SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .unwrap_or(587),
            smtp_username: std::env::var("SMTP_USERNAME").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| "alerts@stockwatch.local".to_string()),
        }
    }

    /// Builds the subject line, e.g. "[CRITICAL] Out Of Stock - WIDGET-42"
    fn format_subject(request: &NotifyRequest) -> String {
        format!(
            "[{}] {} - {}",
            request.priority.to_string().to_uppercase(),
            display_alert_type(&request.alert_type),
            request.sku
        )
    }

    /// Plain text email body
    fn format_text(request: &NotifyRequest) -> String {
        format!(
            r#"{message}

SKU: {sku}
Current stock: {current_stock}
Threshold: {threshold}
Severity: {severity}/10
Detected: {triggered_at}

Recommended action: {action}

--
This alert was sent by Stockwatch."#,
            message = request.message,
            sku = request.sku,
            current_stock = request.current_stock,
            threshold = request.threshold,
            severity = request.severity,
            triggered_at = request.triggered_at.format("%Y-%m-%d %H:%M UTC"),
            action = request.recommended_action,
        )
    }

    /// HTML email body
    fn format_html(request: &NotifyRequest) -> String {
        let banner_color = match request.severity {
            9..=10 => "#dc2626",
            7..=8 => "#ef4444",
            5..=6 => "#f59e0b",
            _ => "#3b82f6",
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<body style="font-family: -apple-system, 'Segoe UI', Roboto, sans-serif; margin: 0; padding: 20px; background-color: #f3f4f6;">
    <div style="max-width: 600px; margin: 0 auto; background-color: #ffffff; border-radius: 8px; overflow: hidden;">
        <div style="background-color: {banner_color}; padding: 16px 24px;">
            <h1 style="color: #ffffff; margin: 0; font-size: 18px;">{alert_type} - {sku}</h1>
        </div>
        <div style="padding: 24px;">
            <p style="margin: 0 0 16px 0; font-size: 14px; color: #374151;">{message}</p>
            <table style="width: 100%; border-collapse: collapse; font-size: 13px;">
                <tr>
                    <td style="padding: 8px 0; color: #6b7280; border-top: 1px solid #e5e7eb;">Current stock</td>
                    <td style="padding: 8px 0; color: #111827; border-top: 1px solid #e5e7eb; text-align: right;">{current_stock}</td>
                </tr>
                <tr>
                    <td style="padding: 8px 0; color: #6b7280; border-top: 1px solid #e5e7eb;">Threshold</td>
                    <td style="padding: 8px 0; color: #111827; border-top: 1px solid #e5e7eb; text-align: right;">{threshold}</td>
                </tr>
                <tr>
                    <td style="padding: 8px 0; color: #6b7280; border-top: 1px solid #e5e7eb;">Severity</td>
                    <td style="padding: 8px 0; color: #111827; border-top: 1px solid #e5e7eb; text-align: right;">{severity}/10</td>
                </tr>
            </table>
            <p style="margin: 16px 0 0 0; font-size: 13px; color: #111827;"><strong>Recommended:</strong> {action}</p>
        </div>
    </div>
</body>
</html>"#,
            banner_color = banner_color,
            alert_type = display_alert_type(&request.alert_type),
            sku = html_escape(&request.sku),
            message = html_escape(&request.message),
            current_stock = request.current_stock,
            threshold = request.threshold,
            severity = request.severity,
            action = html_escape(&request.recommended_action),
        )
    }
}

impl Default for EmailTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// "out_of_stock" -> "Out Of Stock"
fn display_alert_type(alert_type: &str) -> String {
    alert_type
        .replace('_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Simple HTML escaping for email content
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[async_trait]
impl ChannelTransport for EmailTransport {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, request: &NotifyRequest) -> SendOutcome {
        let smtp_host = match &self.smtp_host {
            Some(h) => h,
            None => return SendOutcome::failure("SMTP host not configured".to_string(), None),
        };

        if request.recipients.is_empty() {
            return SendOutcome::failure("No email recipients configured".to_string(), None);
        }

        let subject = Self::format_subject(request);
        let text_body = Self::format_text(request);
        let html_body = Self::format_html(request);

        let from: lettre::message::Mailbox = match self.from_address.parse() {
            Ok(addr) => addr,
            Err(_) => {
                return SendOutcome::failure(
                    format!("Invalid from address: {}", self.from_address),
                    None,
                )
            }
        };

        let mut sent_any = false;
        for recipient in &request.recipients {
            let to = match recipient.parse() {
                Ok(addr) => addr,
                Err(_) => {
                    log::warn!("Invalid email recipient: {}", recipient);
                    continue;
                }
            };

            let email = match Message::builder()
                .from(from.clone())
                .to(to)
                .subject(&subject)
                .multipart(
                    lettre::message::MultiPart::alternative()
                        .singlepart(
                            lettre::message::SinglePart::builder()
                                .header(ContentType::TEXT_PLAIN)
                                .body(text_body.clone()),
                        )
                        .singlepart(
                            lettre::message::SinglePart::builder()
                                .header(ContentType::TEXT_HTML)
                                .body(html_body.clone()),
                        ),
                ) {
                Ok(email) => email,
                Err(e) => {
                    return SendOutcome::failure(format!("Failed to build email: {}", e), None)
                }
            };

            // Port 465 = implicit TLS (SMTPS), anything else = STARTTLS
            let mailer_builder = if self.smtp_port == 465 {
                let tls_params = match lettre::transport::smtp::client::TlsParameters::new(
                    smtp_host.to_string(),
                ) {
                    Ok(p) => p,
                    Err(e) => {
                        return SendOutcome::failure(
                            format!("Invalid TLS parameters for SMTP host: {}", e),
                            None,
                        )
                    }
                };

                match AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host) {
                    Ok(b) => b
                        .port(self.smtp_port)
                        .tls(lettre::transport::smtp::client::Tls::Wrapper(tls_params)),
                    Err(e) => {
                        return SendOutcome::failure(format!("Invalid SMTP host: {}", e), None)
                    }
                }
            } else {
                match AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp_host) {
                    Ok(b) => b.port(self.smtp_port),
                    Err(e) => {
                        return SendOutcome::failure(format!("Invalid SMTP host: {}", e), None)
                    }
                }
            };

            let mailer = if let (Some(username), Some(password)) =
                (self.smtp_username.as_ref(), self.smtp_password.as_ref())
            {
                mailer_builder
                    .credentials(Credentials::new(username.clone(), password.clone()))
                    .build()
            } else {
                mailer_builder.build()
            };

            match mailer.send(email).await {
                Ok(_) => {
                    sent_any = true;
                    log::debug!("Alert email sent to {}", recipient);
                }
                Err(e) => {
                    return SendOutcome::failure(
                        format!("Failed to send email to {}: {}", recipient, e),
                        None,
                    )
                }
            }
        }

        if !sent_any {
            return SendOutcome::failure("No valid email recipients".to_string(), None);
        }

        SendOutcome::success(None)
    }
}
