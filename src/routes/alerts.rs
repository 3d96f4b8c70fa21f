//! Administrative alert routes.
//!
//! - GET /api/alerts - List alerts (status/sku/priority/owner filters)
//! - GET /api/alerts/active - Active alerts
//! - GET /api/alerts/critical - Active critical alerts
//! - GET /api/alerts/{id} - Get one alert
//! - POST /api/alerts/{id}/acknowledge - Acknowledge
//! - POST /api/alerts/{id}/resolve - Resolve
//! - POST /api/alerts/{id}/dismiss - Dismiss
//! - POST /api/alerts/cleanup - Trigger a retention sweep

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{AlertPriority, AlertStatus};
use crate::services::{AlertFilter, AlertService};

// =============================================================================
// Listing
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<AlertStatus>,
    pub sku: Option<String>,
    pub priority: Option<AlertPriority>,
    pub item_id: Option<Uuid>,
    pub variant_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// GET /api/alerts
pub async fn list_alerts(
    pool: web::Data<DbPool>,
    query: web::Query<ListQuery>,
) -> AppResult<HttpResponse> {
    let query = query.into_inner();
    let alerts = AlertService::list(
        pool.get_ref(),
        AlertFilter {
            status: query.status,
            sku: query.sku,
            priority: query.priority,
            item_id: query.item_id,
            variant_id: query.variant_id,
            limit: query.limit,
        },
    )
    .await?;

    Ok(HttpResponse::Ok().json(alerts))
}

/// GET /api/alerts/active
pub async fn list_active(pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let alerts = AlertService::find_active(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(alerts))
}

/// GET /api/alerts/critical
pub async fn list_critical(pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let alerts = AlertService::find_critical(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(alerts))
}

/// GET /api/alerts/{id}
pub async fn get_alert(pool: web::Data<DbPool>, path: web::Path<Uuid>) -> AppResult<HttpResponse> {
    let alert = AlertService::get(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(alert))
}

// =============================================================================
// Lifecycle transitions
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct TransitionBody {
    pub actor: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DismissBody {
    pub actor: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /api/alerts/{id}/acknowledge
pub async fn acknowledge_alert(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    body: web::Json<TransitionBody>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    validate_actor(&body.actor)?;

    let alert = AlertService::acknowledge(
        pool.get_ref(),
        path.into_inner(),
        &body.actor,
        body.notes.as_deref(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(alert))
}

/// POST /api/alerts/{id}/resolve
pub async fn resolve_alert(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    body: web::Json<TransitionBody>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    validate_actor(&body.actor)?;

    let alert = AlertService::resolve(
        pool.get_ref(),
        path.into_inner(),
        &body.actor,
        body.notes.as_deref(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(alert))
}

/// POST /api/alerts/{id}/dismiss
pub async fn dismiss_alert(
    pool: web::Data<DbPool>,
    path: web::Path<Uuid>,
    body: web::Json<DismissBody>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();
    validate_actor(&body.actor)?;

    let alert = AlertService::dismiss(
        pool.get_ref(),
        path.into_inner(),
        &body.actor,
        body.reason.as_deref(),
    )
    .await?;

    Ok(HttpResponse::Ok().json(alert))
}

fn validate_actor(actor: &str) -> AppResult<()> {
    if actor.trim().is_empty() {
        return Err(AppError::Validation("actor must not be empty".to_string()));
    }
    Ok(())
}

// =============================================================================
// Cleanup
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct CleanupBody {
    #[serde(default)]
    pub retention_days: Option<i64>,
}

#[derive(Serialize)]
pub struct CleanupResponse {
    purged: u64,
    retention_days: i64,
}

/// POST /api/alerts/cleanup
pub async fn cleanup_alerts(
    pool: web::Data<DbPool>,
    config: web::Data<Config>,
    body: web::Json<CleanupBody>,
) -> AppResult<HttpResponse> {
    let retention_days = body
        .retention_days
        .unwrap_or(config.engine.retention_days);

    if retention_days < 1 {
        return Err(AppError::Validation(
            "retention_days must be at least 1".to_string(),
        ));
    }

    let purged = AlertService::cleanup_older_than(pool.get_ref(), retention_days).await?;

    Ok(HttpResponse::Ok().json(CleanupResponse {
        purged,
        retention_days,
    }))
}

// =============================================================================
// Route Configuration
// =============================================================================

/// Configure alert routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/alerts")
            .route("", web::get().to(list_alerts))
            .route("/active", web::get().to(list_active))
            .route("/critical", web::get().to(list_critical))
            .route("/cleanup", web::post().to(cleanup_alerts))
            .route("/{id}", web::get().to(get_alert))
            .route("/{id}/acknowledge", web::post().to(acknowledge_alert))
            .route("/{id}/resolve", web::post().to(resolve_alert))
            .route("/{id}/dismiss", web::post().to(dismiss_alert)),
    );
}
