//! Auto-resolution sweeper.
//!
//! Driven by the same change-event stream as the evaluator: whenever stock
//! for a SKU is reported, active alerts whose auto-resolve threshold has been
//! reached are resolved with the `system` actor.

use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::services::AlertService;

pub struct Sweeper;

impl Sweeper {
    /// Resolves every active alert for the SKU whose auto-resolve predicate
    /// holds at the reported stock level. Returns the count resolved.
    pub async fn reconcile(pool: &PgPool, sku: &str, current_stock: i32) -> AppResult<u32> {
        let alerts = AlertService::find_active_for_sku(pool, sku).await?;

        let mut resolved = 0u32;
        for alert in alerts {
            if !alert.should_auto_resolve(current_stock) {
                continue;
            }

            let notes = format!(
                "Stock recovered to {} (auto-resolve threshold {})",
                current_stock,
                alert.auto_resolve_threshold.unwrap_or_default()
            );

            match AlertService::resolve(pool, alert.id, "system", Some(&notes)).await {
                Ok(_) => {
                    resolved += 1;
                    log::info!(
                        "Auto-resolved {} alert {} for {} at stock {}",
                        alert.alert_type,
                        alert.id,
                        alert.sku,
                        current_stock
                    );
                }
                // An operator got there first; the alert left the active
                // state between the read and the write.
                Err(AppError::Conflict(_)) | Err(AppError::NotFound(_)) => {}
                Err(e) => {
                    log::error!("Failed to auto-resolve alert {}: {}", alert.id, e);
                }
            }
        }

        Ok(resolved)
    }
}
