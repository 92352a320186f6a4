//! In-process metric series: operation performance, user interactions and
//! periodic system health.
//!
//! All three series are append-only and capped independently (drop-oldest).
//! The collector is the single writer; the scheduler calls
//! [`MetricsCollector::capture_health_snapshot`] on its health period.

use crate::analytics::aggregate::{self, BehaviorAnalytics, HealthAnalytics, PerformanceAnalytics};
use crate::analytics::AnalyticsSource;
use crate::changelog::{ChangeHistory, DEFAULT_CHANGE_LOG_LIMIT};
use crate::clock::Clock;
use crate::error::ErrorClass;
use crate::types::{DeviceInfo, PerformanceMetrics, SystemHealthMetrics, UserBehaviorMetrics};
use chrono::Duration;
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Default series cap, matching the change log.
pub const DEFAULT_SERIES_LIMIT: usize = DEFAULT_CHANGE_LOG_LIMIT;

/// Length of the click-path buffer attached to interactions.
pub const CLICK_PATH_LEN: usize = 10;

/// Performance samples averaged into a health snapshot's response time.
const HEALTH_RESPONSE_SAMPLES: usize = 10;

/// Optional details for [`MetricsCollector::record_interaction`].
#[derive(Debug, Clone, Default)]
pub struct InteractionContext {
    pub duration_ms: f64,
    /// Element descriptor appended to the click path
    pub element: Option<String>,
    pub error: bool,
}

#[derive(Default)]
struct Series {
    performance: VecDeque<PerformanceMetrics>,
    behavior: VecDeque<UserBehaviorMetrics>,
    health: VecDeque<SystemHealthMetrics>,
    click_path: VecDeque<String>,
}

struct OperationStart {
    id: String,
    started_at: chrono::DateTime<chrono::Utc>,
    instant: Instant,
    memory_before: Option<f64>,
}

pub struct MetricsCollector {
    session_id: String,
    device: DeviceInfo,
    clock: Arc<dyn Clock>,
    changes: Arc<dyn ChangeHistory>,
    series: Mutex<Series>,
    limit: usize,
    in_flight: AtomicUsize,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl MetricsCollector {
    pub fn new(changes: Arc<dyn ChangeHistory>, clock: Arc<dyn Clock>, limit: usize) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            device: DeviceInfo::default(),
            clock,
            changes,
            series: Mutex::new(Series::default()),
            limit: limit.max(1),
            in_flight: AtomicUsize::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        }
    }

    /// Device reported on every interaction sample.
    pub fn with_device(mut self, device: DeviceInfo) -> Self {
        self.device = device;
        self
    }

    /// Session id shared by every interaction recorded by this collector.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    // ============================================
    // Operation performance
    // ============================================

    /// Run `run`, recording its duration and outcome.
    ///
    /// A failure is recorded with its [`ErrorClass`] and then returned to the
    /// caller unchanged.
    pub fn record_operation<T, E, F>(
        &self,
        operation: &str,
        resources_affected: usize,
        run: F,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: ErrorClass,
    {
        let start = self.begin_operation();
        let result = run();
        let error_type = result.as_ref().err().map(|e| e.error_class());
        self.finish_operation(start, operation, resources_affected, error_type);
        result
    }

    /// Async counterpart of [`record_operation`](Self::record_operation).
    pub async fn record_operation_async<T, E, Fut>(
        &self,
        operation: &str,
        resources_affected: usize,
        run: Fut,
    ) -> std::result::Result<T, E>
    where
        Fut: Future<Output = std::result::Result<T, E>>,
        E: ErrorClass,
    {
        let start = self.begin_operation();
        let result = run.await;
        let error_type = result.as_ref().err().map(|e| e.error_class());
        self.finish_operation(start, operation, resources_affected, error_type);
        result
    }

    fn begin_operation(&self) -> OperationStart {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        OperationStart {
            id: uuid::Uuid::new_v4().to_string(),
            started_at: self.clock.now(),
            instant: Instant::now(),
            memory_before: resident_memory_mb(),
        }
    }

    fn finish_operation(
        &self,
        start: OperationStart,
        operation: &str,
        resources_affected: usize,
        error_type: Option<String>,
    ) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let elapsed = start.instant.elapsed();
        let end_time = start.started_at
            + Duration::from_std(elapsed).unwrap_or_else(|_| Duration::zero());
        let memory_usage_mb = match (start.memory_before, resident_memory_mb()) {
            (Some(before), Some(after)) => Some(after - before),
            _ => None,
        };

        let sample = PerformanceMetrics {
            operation_id: start.id,
            operation: operation.to_string(),
            start_time: start.started_at,
            end_time,
            duration_ms: elapsed.as_secs_f64() * 1000.0,
            success: error_type.is_none(),
            error_type,
            resources_affected,
            memory_usage_mb,
        };

        if sample.success {
            tracing::debug!(
                operation,
                duration_ms = sample.duration_ms,
                "Operation completed"
            );
        } else {
            tracing::warn!(
                operation,
                duration_ms = sample.duration_ms,
                error_type = sample.error_type.as_deref().unwrap_or_default(),
                "Operation failed"
            );
        }

        self.push_performance_sample(sample);
    }

    /// Append an already finalized performance sample.
    pub fn push_performance_sample(&self, sample: PerformanceMetrics) {
        let mut series = self.series.lock().unwrap();
        push_capped(&mut series.performance, sample, self.limit);
    }

    // ============================================
    // User interactions
    // ============================================

    /// Record a user interaction under this collector's session.
    pub fn record_interaction(&self, action: &str, context: InteractionContext) {
        let mut series = self.series.lock().unwrap();

        if let Some(element) = context.element {
            push_capped(&mut series.click_path, element, CLICK_PATH_LEN);
        }

        let sample = UserBehaviorMetrics {
            session_id: self.session_id.clone(),
            timestamp: self.clock.now(),
            action: action.to_string(),
            duration_ms: context.duration_ms,
            click_path: series.click_path.iter().cloned().collect(),
            error_encountered: context.error,
            device_info: self.device.clone(),
        };
        push_capped(&mut series.behavior, sample, self.limit);
    }

    /// Count a cache lookup toward the health snapshot's hit rate.
    pub fn record_cache_access(&self, hit: bool) {
        if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    // ============================================
    // System health
    // ============================================

    /// Derive and append one health snapshot.
    pub fn capture_health_snapshot(&self) -> SystemHealthMetrics {
        let now = self.clock.now();
        let cutoff = now - Duration::minutes(1);

        let recent_changes: Vec<_> = self
            .changes
            .change_history()
            .into_iter()
            .filter(|e| e.timestamp >= cutoff)
            .collect();
        let operations_per_minute = recent_changes.len() as f64;
        let error_rate = if recent_changes.is_empty() {
            0.0
        } else {
            let errors = recent_changes.iter().filter(|e| e.is_error()).count();
            errors as f64 / recent_changes.len() as f64 * 100.0
        };

        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let cache_hit_rate = if hits + misses == 0 {
            100.0
        } else {
            hits as f64 / (hits + misses) as f64 * 100.0
        };

        let mut series = self.series.lock().unwrap();

        let recent_perf: Vec<f64> = series
            .performance
            .iter()
            .rev()
            .take(HEALTH_RESPONSE_SAMPLES)
            .map(|p| p.duration_ms)
            .collect();
        let average_response_time = aggregate::mean(&recent_perf);

        let active_users = series
            .behavior
            .iter()
            .filter(|b| b.timestamp >= cutoff)
            .map(|b| b.session_id.as_str())
            .collect::<HashSet<_>>()
            .len();

        let snapshot = SystemHealthMetrics {
            timestamp: now,
            memory_usage: resident_memory_mb().unwrap_or(0.0),
            active_users,
            operations_per_minute,
            error_rate,
            average_response_time,
            database_connections: self.in_flight.load(Ordering::SeqCst),
            cache_hit_rate,
        };

        tracing::debug!(
            memory_mb = snapshot.memory_usage,
            ops_per_minute = snapshot.operations_per_minute,
            error_rate = snapshot.error_rate,
            "Captured health snapshot"
        );

        push_capped(&mut series.health, snapshot.clone(), self.limit);
        snapshot
    }

    // ============================================
    // Series access
    // ============================================

    /// Performance samples, oldest first.
    pub fn performance_samples(&self) -> Vec<PerformanceMetrics> {
        self.series.lock().unwrap().performance.iter().cloned().collect()
    }

    /// Interaction samples, oldest first.
    pub fn behavior_samples(&self) -> Vec<UserBehaviorMetrics> {
        self.series.lock().unwrap().behavior.iter().cloned().collect()
    }

    /// Health snapshots, oldest first.
    pub fn health_samples(&self) -> Vec<SystemHealthMetrics> {
        self.series.lock().unwrap().health.iter().cloned().collect()
    }
}

impl AnalyticsSource for MetricsCollector {
    fn performance_analytics(&self) -> Option<PerformanceAnalytics> {
        let samples = self.performance_samples();
        aggregate::performance_analytics(&samples, self.clock.now())
    }

    fn behavior_analytics(&self) -> Option<BehaviorAnalytics> {
        aggregate::behavior_analytics(&self.behavior_samples())
    }

    fn health_analytics(&self) -> Option<HealthAnalytics> {
        aggregate::health_analytics(&self.health_samples())
    }
}

fn push_capped<T>(series: &mut VecDeque<T>, item: T, limit: usize) {
    series.push_back(item);
    while series.len() > limit {
        series.pop_front();
    }
}

/// Resident set size of this process in MB, where the platform exposes it.
pub fn resident_memory_mb() -> Option<f64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages: f64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(pages * 4096.0 / (1024.0 * 1024.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::{ChangeLog, MemoryStore};
    use crate::clock::ManualClock;
    use crate::error::Error;
    use crate::types::{ActionType, ChangeMethod, NewChangeLogEntry};
    use chrono::Utc;

    fn setup(limit: usize) -> (MetricsCollector, Arc<ChangeLog>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let log = Arc::new(ChangeLog::open(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            DEFAULT_CHANGE_LOG_LIMIT,
        ));
        let collector = MetricsCollector::new(log.clone(), clock.clone(), limit);
        (collector, log, clock)
    }

    #[test]
    fn test_successful_operation_recorded() {
        let (collector, _, _) = setup(DEFAULT_SERIES_LIMIT);
        let value: Result<i32, Error> = collector.record_operation("guest_update", 3, || Ok(7));
        assert_eq!(value.unwrap(), 7);

        let samples = collector.performance_samples();
        assert_eq!(samples.len(), 1);
        assert!(samples[0].success);
        assert_eq!(samples[0].operation, "guest_update");
        assert_eq!(samples[0].resources_affected, 3);
        assert!(samples[0].error_type.is_none());
    }

    #[test]
    fn test_failure_recorded_then_propagated_unchanged() {
        let (collector, _, _) = setup(DEFAULT_SERIES_LIMIT);
        let result: Result<(), Error> = collector.record_operation("table_assign", 1, || {
            Err(Error::Config("table 12 is full".to_string()))
        });

        match result {
            Err(Error::Config(msg)) => assert_eq!(msg, "table 12 is full"),
            other => panic!("unexpected result: {:?}", other),
        }

        let samples = collector.performance_samples();
        assert_eq!(samples.len(), 1);
        assert!(!samples[0].success);
        assert_eq!(samples[0].error_type.as_deref(), Some("ConfigError"));
    }

    #[tokio::test]
    async fn test_async_operation_recorded() {
        let (collector, _, _) = setup(DEFAULT_SERIES_LIMIT);
        let result: Result<&str, String> = collector
            .record_operation_async("guest_import", 40, async { Err("bad csv".to_string()) })
            .await;
        assert_eq!(result.unwrap_err(), "bad csv");
        assert_eq!(
            collector.performance_samples()[0].error_type.as_deref(),
            Some("Error")
        );
    }

    #[test]
    fn test_click_path_keeps_last_ten() {
        let (collector, _, _) = setup(DEFAULT_SERIES_LIMIT);
        for i in 0..12 {
            collector.record_interaction(
                "click",
                InteractionContext {
                    element: Some(format!("button#{}", i)),
                    ..Default::default()
                },
            );
        }

        let samples = collector.behavior_samples();
        let last = samples.last().unwrap();
        assert_eq!(last.click_path.len(), CLICK_PATH_LEN);
        assert_eq!(last.click_path.first().unwrap(), "button#2");
        assert_eq!(last.click_path.last().unwrap(), "button#11");
        assert!(samples.iter().all(|s| s.session_id == collector.session_id()));
    }

    #[test]
    fn test_series_capped_independently() {
        let (collector, _, _) = setup(5);
        for _ in 0..8 {
            let _: Result<(), Error> = collector.record_operation("op", 0, || Ok(()));
            collector.record_interaction("view", InteractionContext::default());
        }
        for _ in 0..2 {
            collector.capture_health_snapshot();
        }
        assert_eq!(collector.performance_samples().len(), 5);
        assert_eq!(collector.behavior_samples().len(), 5);
        assert_eq!(collector.health_samples().len(), 2);
    }

    #[test]
    fn test_health_snapshot_uses_trailing_minute() {
        let (collector, log, clock) = setup(DEFAULT_SERIES_LIMIT);
        log.append(NewChangeLogEntry::new(
            ActionType::Create,
            "guest_create",
            ChangeMethod::Manual,
            "old entry",
        ));
        clock.advance(Duration::minutes(2));
        log.append(NewChangeLogEntry::new(
            ActionType::Update,
            "guest_update",
            ChangeMethod::Manual,
            "recent",
        ));
        log.append(NewChangeLogEntry::new(
            ActionType::System,
            "sync",
            ChangeMethod::Api,
            "failed",
        ));
        collector.record_interaction("view", InteractionContext::default());
        collector.record_cache_access(true);
        collector.record_cache_access(false);

        let snapshot = collector.capture_health_snapshot();
        assert_eq!(snapshot.operations_per_minute, 2.0);
        assert_eq!(snapshot.error_rate, 50.0);
        assert_eq!(snapshot.active_users, 1);
        assert_eq!(snapshot.cache_hit_rate, 50.0);
        assert_eq!(snapshot.database_connections, 0);
        assert_eq!(collector.health_samples(), vec![snapshot]);
    }
}
