//! The alert engine: an event-driven pipeline tying the change source, rule
//! evaluator, alert store, dispatcher and sweeper together.
//!
//! One engine instance is constructed with its collaborators injected and
//! spawns a task per incoming event, so a slow ledger query for one SKU never
//! stalls evaluation for others. Shutdown drains in-flight evaluations before
//! returning.

pub mod evaluator;
pub mod sweeper;

use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::config::EngineConfig;
use crate::models::{normalize_sku, RuleSet, StockChangeEvent};
use crate::services::{AlertIndex, AlertService, Dispatcher, StockLedger};
use crate::source::StockChangeSource;

pub use evaluator::{matches_filters, velocity_matches, AlertCreationRequest, Evaluator};
pub use sweeper::Sweeper;

pub struct AlertEngine {
    pool: PgPool,
    rules: Arc<RuleSet>,
    evaluator: Evaluator,
    dispatcher: Arc<Dispatcher>,
    config: EngineConfig,
}

impl AlertEngine {
    pub fn new(
        pool: PgPool,
        rules: Arc<RuleSet>,
        ledger: Arc<dyn StockLedger>,
        index: Arc<dyn AlertIndex>,
        dispatcher: Arc<Dispatcher>,
        config: EngineConfig,
    ) -> Arc<Self> {
        let evaluator = Evaluator::new(rules.clone(), ledger, index);
        Arc::new(Self {
            pool,
            rules,
            evaluator,
            dispatcher,
            config,
        })
    }

    /// Consumes the change stream until it ends or shutdown is signalled,
    /// then drains in-flight work.
    pub async fn run<S: StockChangeSource>(
        self: Arc<Self>,
        mut source: S,
        mut shutdown: watch::Receiver<bool>,
    ) {
        log::info!(
            "Alert engine started ({} rules, retention {} days)",
            self.rules.len(),
            self.config.retention_days
        );

        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut tick = tokio::time::interval(self.config.tick_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    log::info!("Shutdown signal received, closing change source");
                    break;
                }
                _ = tick.tick() => {
                    let engine = self.clone();
                    tasks.spawn(async move { engine.background_tick().await });
                }
                event = source.next_event() => {
                    match event {
                        Some(mut event) => {
                            event.sku = normalize_sku(&event.sku);
                            let engine = self.clone();
                            tasks.spawn(async move { engine.handle_event(event).await });
                        }
                        None => {
                            log::info!("Change source closed, stopping engine");
                            break;
                        }
                    }
                }
            }

            // Reap finished tasks so the set doesn't grow unbounded.
            while tasks.try_join_next().is_some() {}
        }

        if !tasks.is_empty() {
            log::info!("Draining {} in-flight evaluations...", tasks.len());
        }
        while tasks.join_next().await.is_some() {}

        log::info!("Alert engine stopped");
    }

    /// Full pipeline for one event: evaluate, create, dispatch, reconcile.
    /// Every failure is local to this event.
    pub async fn handle_event(&self, event: StockChangeEvent) {
        let requests = self.evaluator.evaluate(&event).await;

        for request in requests {
            let alert_type = request.draft.alert_type;
            match AlertService::create(&self.pool, request.draft).await {
                Ok(Some(alert)) => {
                    log::info!(
                        "Created {} alert {} for {} (severity {}, stock {})",
                        alert.alert_type,
                        alert.id,
                        alert.sku,
                        alert.severity,
                        alert.current_stock
                    );
                    let notified = self
                        .dispatcher
                        .dispatch(&self.pool, &alert, &request.channels)
                        .await;
                    log::debug!("Alert {} dispatched to {} channels", alert.id, notified);
                }
                // Lost the creation race; the dedup invariant wins.
                Ok(None) => {}
                Err(e) => {
                    log::error!(
                        "Failed to create {} alert for {}: {}",
                        alert_type,
                        event.sku,
                        e
                    );
                }
            }
        }

        match Sweeper::reconcile(&self.pool, &event.sku, event.current_stock).await {
            Ok(resolved) if resolved > 0 => {
                log::info!("Auto-resolved {} alerts for {}", resolved, event.sku);
            }
            Ok(_) => {}
            Err(e) => {
                log::error!("Auto-resolution sweep failed for {}: {}", event.sku, e);
            }
        }
    }

    /// Periodic housekeeping: retention purge plus re-dispatch of alerts
    /// that have never been notified (e.g. transports down at creation).
    async fn background_tick(&self) {
        if let Err(e) = AlertService::cleanup_older_than(&self.pool, self.config.retention_days).await
        {
            log::error!("Retention cleanup failed: {}", e);
        }

        let pending = match AlertService::find_pending_notification(&self.pool).await {
            Ok(alerts) => alerts,
            Err(e) => {
                log::error!("Pending-notification lookup failed: {}", e);
                return;
            }
        };

        for alert in pending {
            let channels = self.rules.channels_for(alert.alert_type);
            let notified = self.dispatcher.dispatch(&self.pool, &alert, &channels).await;
            if notified > 0 {
                log::info!("Re-dispatched alert {} to {} channels", alert.id, notified);
            }
        }
    }
}
