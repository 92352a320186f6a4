//! Composition root for the analytics core.
//!
//! [`InsightsService`] owns the change log, the metrics collector and the
//! engine, and drives the [`Scheduler`] from one background task between
//! [`init`](InsightsService::init) and [`shutdown`](InsightsService::shutdown).

use crate::changelog::{ChangeLog, ChangeStore};
use crate::clock::Clock;
use crate::config::{AnalyticsConfig, Config};
use crate::engine::AiAnalyticsEngine;
use crate::error::{Error, Result};
use crate::metrics::MetricsCollector;
use crate::scheduler::{Scheduler, TaskKind};
use crate::types::DeviceInfo;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Resolution of the scheduler clock.
const TICK: Duration = Duration::from_secs(1);

struct Running {
    shutdown_tx: watch::Sender<()>,
    handle: JoinHandle<()>,
}

pub struct InsightsService {
    change_log: Arc<ChangeLog>,
    metrics: Arc<MetricsCollector>,
    engine: Arc<AiAnalyticsEngine>,
    config: AnalyticsConfig,
    running: Mutex<Option<Running>>,
}

impl InsightsService {
    pub fn new(
        change_log: Arc<ChangeLog>,
        metrics: Arc<MetricsCollector>,
        engine: Arc<AiAnalyticsEngine>,
        config: AnalyticsConfig,
    ) -> Self {
        Self {
            change_log,
            metrics,
            engine,
            config,
            running: Mutex::new(None),
        }
    }

    /// Wire the change log, collector and engine over `store`.
    pub fn build(store: Arc<dyn ChangeStore>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        let change_log = Arc::new(ChangeLog::open(
            store,
            clock.clone(),
            config.retention.change_log,
        ));
        let metrics = Arc::new(
            MetricsCollector::new(change_log.clone(), clock.clone(), config.retention.metric_series)
                .with_device(host_device()),
        );
        let engine = Arc::new(AiAnalyticsEngine::new(
            change_log.clone(),
            metrics.clone(),
            clock,
            config,
        ));
        Self::new(change_log, metrics, engine, config.analytics.clone())
    }

    pub fn change_log(&self) -> &Arc<ChangeLog> {
        &self.change_log
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn engine(&self) -> &Arc<AiAnalyticsEngine> {
        &self.engine
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().unwrap().is_some()
    }

    /// Start the background scheduler task.
    ///
    /// Must be called from within a tokio runtime. Fails if already running.
    pub fn init(&self) -> Result<()> {
        let mut running = self.running.lock().unwrap();
        if running.is_some() {
            return Err(Error::Scheduler("insights service is already running".to_string()));
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(());
        let metrics = Arc::clone(&self.metrics);
        let engine = Arc::clone(&self.engine);
        let mut scheduler = Scheduler::new(&self.config);

        let handle = tokio::spawn(async move {
            tracing::info!("Insights scheduler started");
            let start = Instant::now();
            let mut ticker = time::interval(TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => {
                        tracing::info!("Insights scheduler shutdown signal received");
                        break;
                    }
                    _ = ticker.tick() => {
                        for task in scheduler.due(start.elapsed()) {
                            run_task(task, &metrics, &engine).await;
                        }
                    }
                }
            }
        });

        *running = Some(Running {
            shutdown_tx,
            handle,
        });
        Ok(())
    }

    /// Stop the scheduler task and wait for it to finish.
    ///
    /// A task that is mid-pass finishes that pass first.
    pub async fn shutdown(&self) -> Result<()> {
        let Some(running) = self.running.lock().unwrap().take() else {
            return Err(Error::Scheduler("insights service is not running".to_string()));
        };

        let _ = running.shutdown_tx.send(());
        running
            .handle
            .await
            .map_err(|e| Error::Scheduler(format!("scheduler task failed: {}", e)))?;
        tracing::info!("Insights scheduler stopped");
        Ok(())
    }
}

/// Device recorded on interactions made through this process.
fn host_device() -> DeviceInfo {
    DeviceInfo {
        user_agent: format!(
            "purser/{} ({}; {})",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        ),
        ..Default::default()
    }
}

async fn run_task(task: TaskKind, metrics: &MetricsCollector, engine: &AiAnalyticsEngine) {
    tracing::debug!(task = task.as_str(), "Running scheduled task");
    match task {
        TaskKind::HealthSnapshot => {
            metrics.capture_health_snapshot();
        }
        TaskKind::AnomalyDetection => {
            engine.detect_anomalies();
        }
        TaskKind::InsightGeneration => {
            engine.generate_insights();
        }
        TaskKind::RecommendationGeneration => {
            engine.generate_recommendations();
        }
        TaskKind::FullAnalysis => {
            engine.run_full_analysis().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::MemoryStore;
    use crate::clock::SystemClock;
    use crate::analytics::AnalyticsSource;
    use crate::metrics::InteractionContext;
    use crate::types::{ActionType, ChangeMethod, DeviceClass, NewChangeLogEntry};

    fn service() -> InsightsService {
        InsightsService::build(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            &Config::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_captures_health_snapshots() {
        let service = service();
        service.init().unwrap();

        time::sleep(Duration::from_secs(15)).await;
        assert!(service.metrics().health_samples().is_empty());

        time::sleep(Duration::from_secs(20)).await;
        assert_eq!(service.metrics().health_samples().len(), 1);

        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(service.metrics().health_samples().len(), 2);

        service.shutdown().await.unwrap();
        assert!(!service.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ticks_after_shutdown() {
        let service = service();
        service.init().unwrap();
        service.shutdown().await.unwrap();

        time::sleep(Duration::from_secs(120)).await;
        assert!(service.metrics().health_samples().is_empty());
    }

    #[tokio::test]
    async fn test_init_twice_is_an_error() {
        let service = service();
        service.init().unwrap();
        assert!(matches!(service.init(), Err(Error::Scheduler(_))));
        service.shutdown().await.unwrap();
        assert!(matches!(service.shutdown().await, Err(Error::Scheduler(_))));
    }

    #[test]
    fn test_build_tags_interactions_with_host_device() {
        let service = service();
        service.metrics().record_interaction(
            "open_guest_list",
            InteractionContext {
                duration_ms: 4.0,
                element: Some("guest-list".to_string()),
                error: false,
            },
        );

        let samples = service.metrics().behavior_samples();
        assert!(samples[0].device_info.user_agent.starts_with("purser/"));

        let behavior = service.metrics().behavior_analytics().unwrap();
        assert_eq!(behavior.device_breakdown[&DeviceClass::Desktop], 1);
    }

    #[tokio::test]
    async fn test_build_wires_change_log_into_engine() {
        let service = service();
        for _ in 0..3 {
            service.change_log().append(NewChangeLogEntry::new(
                ActionType::BulkOperation,
                "clear_all_assignments",
                ChangeMethod::Bulk,
                "Cleared all table assignments",
            ));
        }

        service.engine().generate_recommendations();
        let titles: Vec<String> = service
            .engine()
            .recommendations()
            .into_iter()
            .map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["Investigate Frequent Data Resets".to_string()]);
    }
}
