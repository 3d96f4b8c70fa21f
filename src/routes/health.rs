use actix_web::{http::StatusCode, web, HttpResponse};
use serde::Serialize;

use crate::db::{self, DbPool};
use crate::models::RuleSet;

#[derive(Serialize)]
pub struct LivenessResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    status: &'static str,
    checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    database: &'static str,
    /// Enabled alert rules; a rule set with zero enabled rules means the
    /// engine is running but will never raise anything.
    rules_enabled: usize,
}

/// Liveness check - is the process running?
pub async fn liveness() -> HttpResponse {
    HttpResponse::Ok().json(LivenessResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness check - can the engine evaluate and persist alerts?
/// Returns 200 when the database responds and at least one rule is enabled,
/// 503 otherwise.
pub async fn readiness(pool: web::Data<DbPool>, rules: web::Data<RuleSet>) -> HttpResponse {
    let db_healthy = db::health_check(pool.get_ref()).await;
    let rules_enabled = rules.enabled().count();

    let ready = db_healthy && rules_enabled > 0;
    let (status, http_status) = if ready {
        ("ready", StatusCode::OK)
    } else {
        ("not_ready", StatusCode::SERVICE_UNAVAILABLE)
    };

    HttpResponse::build(http_status).json(ReadinessResponse {
        status,
        checks: ReadinessChecks {
            database: if db_healthy { "ok" } else { "error" },
            rules_enabled,
        },
    })
}
