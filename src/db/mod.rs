//! Postgres access: pool construction, migrations, and the readiness probe.

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;

/// Type alias for the PostgreSQL connection pool
pub type DbPool = PgPool;

/// Builds the connection pool the alert store, ledger and polling source
/// share. Every connection is pinned to UTC: alert timestamps, cooldown math
/// and the retention cutoff all assume it.
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(Some(config.idle_timeout))
        .max_lifetime(Some(config.max_lifetime))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                sqlx::query("SET timezone = 'UTC'").execute(&mut *conn).await?;
                sqlx::query("SET application_name = 'stockwatch'")
                    .execute(conn)
                    .await?;
                Ok(())
            })
        })
        .connect(&config.url)
        .await?;

    log::info!(
        "Database pool ready ({}-{} connections)",
        config.min_connections,
        config.max_connections
    );

    Ok(pool)
}

/// Applies pending migrations from `./migrations` at startup.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    log::info!("Database schema is up to date");
    Ok(())
}

/// Round-trip probe used by the readiness endpoint.
pub async fn health_check(pool: &DbPool) -> bool {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await
        .is_ok()
}
