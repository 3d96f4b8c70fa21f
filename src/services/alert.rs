//! Alert store: durable alert records with a lifecycle state machine.
//!
//! All mutation flows through the narrow operation set here, each a single
//! atomic write. The one-active-alert-per-(sku, alert_type) invariant is
//! enforced by a partial unique index; the INSERT simply loses the race and
//! returns `None` when a concurrent writer got there first.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    normalize_sku, Alert, AlertDraft, AlertPriority, AlertStatus, AlertType, Channel,
    EstimatedImpact,
};

// =============================================================================
// Severity & message derivation
// =============================================================================

/// Derives the 1-10 severity score from alert type, stock deficit depth and
/// estimated revenue at risk.
pub fn derive_severity(
    alert_type: AlertType,
    threshold: i32,
    current_stock: i32,
    impact: Option<&EstimatedImpact>,
) -> i16 {
    let mut score: i16 = match alert_type {
        AlertType::OutOfStock => 9,
        AlertType::RestockNeeded => 8,
        AlertType::HighDemand => 7,
        AlertType::LowStock => 6,
        AlertType::Overstock => 3,
    };

    if threshold > 0 {
        let deficit = (threshold - current_stock) as f64 / threshold as f64;
        if deficit > 0.8 {
            score += 2;
        } else if deficit > 0.5 {
            score += 1;
        }
    }

    if let Some(impact) = impact {
        if impact.revenue_at_risk.is_some_and(|r| r > 1000.0) {
            score += 1;
        }
    }

    score.clamp(1, 10)
}

/// Synthesizes a human-readable message from the stock state.
pub fn default_message(sku: &str, threshold: i32, current_stock: i32) -> String {
    if current_stock <= 0 {
        format!("{} is out of stock", sku)
    } else {
        format!(
            "{} is low on stock ({} remaining, threshold {})",
            sku, current_stock, threshold
        )
    }
}

/// Default operator guidance per alert type.
pub fn default_recommended_action(alert_type: AlertType) -> &'static str {
    match alert_type {
        AlertType::OutOfStock => "Restock immediately",
        AlertType::RestockNeeded => "Reorder from supplier",
        AlertType::HighDemand => "Review demand forecast and increase replenishment",
        AlertType::LowStock => "Consider restocking soon",
        AlertType::Overstock => "Consider promotions to reduce excess stock",
    }
}

// =============================================================================
// Dedup / suppression lookup seam
// =============================================================================

/// Read side of the store the rule evaluator depends on. A trait so the
/// evaluator can be tested without a database.
#[async_trait]
pub trait AlertIndex: Send + Sync {
    /// Is there an active alert for this `(sku, alert_type)` pair?
    async fn has_active(&self, sku: &str, alert_type: AlertType) -> AppResult<bool>;

    /// Is re-creation for this pair currently suppressed?
    async fn is_suppressed(&self, sku: &str, alert_type: AlertType) -> AppResult<bool>;
}

/// Postgres-backed index used in production
pub struct PgAlertIndex {
    pool: PgPool,
}

impl PgAlertIndex {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertIndex for PgAlertIndex {
    async fn has_active(&self, sku: &str, alert_type: AlertType) -> AppResult<bool> {
        let exists: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM alerts WHERE sku = $1 AND alert_type = $2 AND status = 'active' LIMIT 1",
        )
        .bind(sku)
        .bind(alert_type.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(exists.is_some())
    }

    async fn is_suppressed(&self, sku: &str, alert_type: AlertType) -> AppResult<bool> {
        let exists: Option<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM alerts
            WHERE sku = $1 AND alert_type = $2
              AND suppress_similar = TRUE AND suppress_until > NOW()
            LIMIT 1
            "#,
        )
        .bind(sku)
        .bind(alert_type.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(exists.is_some())
    }
}

// =============================================================================
// Alert Service
// =============================================================================

/// Optional filters for the administrative alert listing
#[derive(Debug, Default, Clone)]
pub struct AlertFilter {
    pub status: Option<AlertStatus>,
    pub sku: Option<String>,
    pub priority: Option<AlertPriority>,
    pub item_id: Option<Uuid>,
    pub variant_id: Option<Uuid>,
    pub limit: i64,
}

pub struct AlertService;

impl AlertService {
    /// Creates an alert from an evaluator draft, deriving severity, message
    /// and recommended action when the draft doesn't supply them.
    ///
    /// Returns `Ok(None)` when a concurrent writer already holds the active
    /// slot for this `(sku, alert_type)`; the losing creation is discarded
    /// silently per the dedup invariant.
    pub async fn create(pool: &PgPool, draft: AlertDraft) -> AppResult<Option<Alert>> {
        let sku = normalize_sku(&draft.sku);
        let severity = draft.severity.unwrap_or_else(|| {
            derive_severity(
                draft.alert_type,
                draft.threshold,
                draft.current_stock,
                draft.estimated_impact.as_ref(),
            )
        });
        let message = draft
            .message
            .unwrap_or_else(|| default_message(&sku, draft.threshold, draft.current_stock));
        let recommended_action = draft
            .recommended_action
            .unwrap_or_else(|| default_recommended_action(draft.alert_type).to_string());

        let alert = sqlx::query_as::<_, Alert>(
            r#"
            INSERT INTO alerts (
                sku, item_id, variant_id, alert_type, priority,
                threshold, current_stock, message, recommended_action,
                severity, estimated_impact, auto_resolve, auto_resolve_threshold,
                suppress_until, suppress_similar
            )
            VALUES ($1, $2, $3, $4::text::varchar, $5::text::varchar,
                    $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (sku, alert_type) WHERE status = 'active' DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&sku)
        .bind(draft.item_id)
        .bind(draft.variant_id)
        .bind(draft.alert_type.to_string())
        .bind(draft.priority.to_string())
        .bind(draft.threshold)
        .bind(draft.current_stock)
        .bind(&message)
        .bind(&recommended_action)
        .bind(severity)
        .bind(draft.estimated_impact.map(Json))
        .bind(draft.auto_resolve)
        .bind(draft.auto_resolve_threshold)
        .bind(draft.suppress_until)
        .bind(draft.suppress_similar)
        .fetch_optional(pool)
        .await?;

        if alert.is_none() {
            log::debug!(
                "Active {} alert for {} already exists, creation discarded",
                draft.alert_type,
                sku
            );
        }

        Ok(alert)
    }

    /// Gets an alert by ID
    pub async fn get(pool: &PgPool, id: Uuid) -> AppResult<Alert> {
        sqlx::query_as::<_, Alert>("SELECT * FROM alerts WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Alert {} not found", id)))
    }

    /// Marks an active alert as acknowledged
    pub async fn acknowledge(
        pool: &PgPool,
        id: Uuid,
        actor: &str,
        notes: Option<&str>,
    ) -> AppResult<Alert> {
        let updated = sqlx::query_as::<_, Alert>(
            r#"
            UPDATE alerts
            SET status = 'acknowledged',
                acknowledged_at = NOW(),
                acknowledged_by = $2,
                resolution_notes = COALESCE($3, resolution_notes),
                updated_at = NOW()
            WHERE id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(actor)
        .bind(notes)
        .fetch_optional(pool)
        .await?;

        match updated {
            Some(alert) => Ok(alert),
            None => Err(Self::transition_error(pool, id, AlertStatus::Acknowledged).await),
        }
    }

    /// Resolves an active or acknowledged alert
    pub async fn resolve(
        pool: &PgPool,
        id: Uuid,
        actor: &str,
        notes: Option<&str>,
    ) -> AppResult<Alert> {
        let updated = sqlx::query_as::<_, Alert>(
            r#"
            UPDATE alerts
            SET status = 'resolved',
                resolved_at = NOW(),
                resolved_by = $2,
                resolution_notes = COALESCE($3, resolution_notes),
                updated_at = NOW()
            WHERE id = $1 AND status IN ('active', 'acknowledged')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(actor)
        .bind(notes)
        .fetch_optional(pool)
        .await?;

        match updated {
            Some(alert) => Ok(alert),
            None => Err(Self::transition_error(pool, id, AlertStatus::Resolved).await),
        }
    }

    /// Dismisses an active or acknowledged alert
    pub async fn dismiss(
        pool: &PgPool,
        id: Uuid,
        actor: &str,
        reason: Option<&str>,
    ) -> AppResult<Alert> {
        let updated = sqlx::query_as::<_, Alert>(
            r#"
            UPDATE alerts
            SET status = 'dismissed',
                resolved_at = NOW(),
                resolved_by = $2,
                resolution_notes = COALESCE($3, resolution_notes),
                updated_at = NOW()
            WHERE id = $1 AND status IN ('active', 'acknowledged')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(actor)
        .bind(reason)
        .fetch_optional(pool)
        .await?;

        match updated {
            Some(alert) => Ok(alert),
            None => Err(Self::transition_error(pool, id, AlertStatus::Dismissed).await),
        }
    }

    /// Distinguishes "not found" from "invalid transition" after a
    /// conditional update matched no row.
    async fn transition_error(pool: &PgPool, id: Uuid, next: AlertStatus) -> AppError {
        match Self::get(pool, id).await {
            Ok(alert) => AppError::Conflict(format!(
                "Alert {} is {} and cannot become {}",
                id, alert.status, next
            )),
            Err(e) => e,
        }
    }

    /// Appends a send timestamp to the alert's per-channel notification log.
    /// Single atomic JSONB append, no read-modify-write.
    pub async fn record_notification(pool: &PgPool, id: Uuid, channel: Channel) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE alerts
            SET notifications = jsonb_set(
                    notifications,
                    ARRAY[$2],
                    COALESCE(notifications -> $2, '[]'::jsonb) || to_jsonb(NOW()),
                    TRUE
                ),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(channel.to_string())
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Alert {} not found", id)));
        }

        Ok(())
    }

    /// All active alerts, newest first
    pub async fn find_active(pool: &PgPool) -> AppResult<Vec<Alert>> {
        let alerts = sqlx::query_as::<_, Alert>(
            "SELECT * FROM alerts WHERE status = 'active' ORDER BY created_at DESC",
        )
        .fetch_all(pool)
        .await?;

        Ok(alerts)
    }

    /// Alerts for a SKU regardless of status
    pub async fn find_by_sku(pool: &PgPool, sku: &str) -> AppResult<Vec<Alert>> {
        let alerts = sqlx::query_as::<_, Alert>(
            "SELECT * FROM alerts WHERE sku = $1 ORDER BY created_at DESC",
        )
        .bind(normalize_sku(sku))
        .fetch_all(pool)
        .await?;

        Ok(alerts)
    }

    /// Active alerts with critical priority, most severe first
    pub async fn find_critical(pool: &PgPool) -> AppResult<Vec<Alert>> {
        let alerts = sqlx::query_as::<_, Alert>(
            r#"
            SELECT * FROM alerts
            WHERE status = 'active' AND priority = 'critical'
            ORDER BY severity DESC, created_at DESC
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(alerts)
    }

    /// Active alerts that have never been notified on any channel.
    /// The engine's periodic tick re-dispatches these, so a transport outage
    /// at creation time heals without a retry queue.
    pub async fn find_pending_notification(pool: &PgPool) -> AppResult<Vec<Alert>> {
        let alerts = sqlx::query_as::<_, Alert>(
            r#"
            SELECT * FROM alerts
            WHERE status = 'active' AND notifications = '{}'::jsonb
            ORDER BY created_at
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(alerts)
    }

    /// Active alerts for a SKU (sweeper input)
    pub async fn find_active_for_sku(pool: &PgPool, sku: &str) -> AppResult<Vec<Alert>> {
        let alerts = sqlx::query_as::<_, Alert>(
            "SELECT * FROM alerts WHERE sku = $1 AND status = 'active' ORDER BY created_at",
        )
        .bind(normalize_sku(sku))
        .fetch_all(pool)
        .await?;

        Ok(alerts)
    }

    /// Filtered listing for the administrative API
    pub async fn list(pool: &PgPool, filter: AlertFilter) -> AppResult<Vec<Alert>> {
        let limit = filter.limit.clamp(1, 500);
        let alerts = sqlx::query_as::<_, Alert>(
            r#"
            SELECT * FROM alerts
            WHERE ($1::varchar IS NULL OR status = $1)
              AND ($2::varchar IS NULL OR sku = $2)
              AND ($3::varchar IS NULL OR priority = $3)
              AND ($4::uuid IS NULL OR item_id = $4)
              AND ($5::uuid IS NULL OR variant_id = $5)
            ORDER BY created_at DESC
            LIMIT $6
            "#,
        )
        .bind(filter.status.map(|s| s.to_string()))
        .bind(filter.sku.as_deref().map(normalize_sku))
        .bind(filter.priority.map(|p| p.to_string()))
        .bind(filter.item_id)
        .bind(filter.variant_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;

        Ok(alerts)
    }

    /// Purges resolved/dismissed alerts older than the retention window.
    /// Best-effort background sweep, not a transactional guarantee.
    pub async fn cleanup_older_than(pool: &PgPool, days: i64) -> AppResult<u64> {
        let cutoff: DateTime<Utc> = Utc::now() - Duration::days(days);

        let result = sqlx::query(
            r#"
            DELETE FROM alerts
            WHERE status IN ('resolved', 'dismissed')
              AND COALESCE(resolved_at, updated_at) < $1
            "#,
        )
        .bind(cutoff)
        .execute(pool)
        .await?;

        let purged = result.rows_affected();
        if purged > 0 {
            log::info!("Purged {} alerts older than {} days", purged, days);
        }

        Ok(purged)
    }
}
