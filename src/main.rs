use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use std::sync::Arc;
use tokio::sync::watch;

use stockwatch::config;
use stockwatch::db;
use stockwatch::engine::AlertEngine;
use stockwatch::models::RuleSet;
use stockwatch::routes;
use stockwatch::services::{Dispatcher, PgAlertIndex, PgStockLedger};
use stockwatch::source::PollingSource;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Load configuration
    let config = config::Config::from_env().map_err(|e| {
        log::error!("Configuration error: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    log::info!("Starting Stockwatch server on {}:{}", config.host, config.port);

    // Create database pool
    let db_pool = db::create_pool(&config.database).await.map_err(|e| {
        log::error!("Database pool error: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    // Run migrations
    db::run_migrations(&db_pool).await.map_err(|e| {
        log::error!("Migration error: {}", e);
        std::io::Error::other(e.to_string())
    })?;

    // Load the rule set (read-only after this point)
    let rules = match &config.rules_path {
        Some(path) => RuleSet::from_file(path).map_err(|e| {
            log::error!("Rule set error: {}", e);
            std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
        })?,
        None => {
            log::warn!("ALERT_RULES_PATH not set, using built-in default rules");
            RuleSet::defaults()
        }
    };
    log::info!("Loaded {} alert rules", rules.len());

    // Assemble the engine with its collaborators
    let rules = Arc::new(rules);
    let engine = AlertEngine::new(
        db_pool.clone(),
        rules.clone(),
        Arc::new(PgStockLedger::new(db_pool.clone())),
        Arc::new(PgAlertIndex::new(db_pool.clone())),
        Arc::new(Dispatcher::new(config.engine.default_cooldown_minutes)),
        config.engine.clone(),
    );

    let source = PollingSource::new(db_pool.clone(), config.engine.poll_interval);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let engine_handle = tokio::spawn(engine.run(source, shutdown_rx));

    // Clone values for the closure
    let host = config.host.clone();
    let port = config.port;
    let rules_data = web::Data::from(rules);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::ACCEPT,
                actix_web::http::header::CONTENT_TYPE,
            ])
            .max_age(3600);

        App::new()
            // Share database pool and config with all handlers
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(rules_data.clone())
            // Middleware
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .wrap(cors)
            // Health check routes
            .service(
                web::scope("/health")
                    .route("", web::get().to(routes::health::liveness))
                    .route("/ready", web::get().to(routes::health::readiness)),
            )
            // Administrative alert API
            .configure(routes::alerts::configure)
    })
    .bind((host.as_str(), port))?
    .shutdown_timeout(30)
    .run();

    // Spawn graceful shutdown handler
    let server_handle = server.handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        log::info!("Shutdown signal received, stopping server...");
        let _ = shutdown_tx.send(true);
        server_handle.stop(true).await;
    });

    let result = server.await;

    // Wait for the engine to drain in-flight evaluations
    if let Err(e) = engine_handle.await {
        log::error!("Engine task failed: {}", e);
    }

    result
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                log::error!("Failed to install Ctrl+C handler: {}", e);
                // Wait forever if signal handler fails
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
