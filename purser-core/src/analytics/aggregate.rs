//! Pure summary functions over the metric series.
//!
//! Each function is read-only and returns `None` for an empty series, which
//! the rule engine treats as "no data" and skips.

use crate::types::{DeviceClass, PerformanceMetrics, SystemHealthMetrics, UserBehaviorMetrics};
use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

const TOP_SLOWEST: usize = 10;
const TOP_ERROR_PATTERNS: usize = 10;
const TOP_ACTIONS: usize = 10;
const TOP_ERROR_PATHS: usize = 5;
const TOP_PEAK_HOURS: usize = 5;
const RECENT_SNAPSHOTS: usize = 24;
const ERROR_PATH_DEPTH: usize = 3;

// ============================================
// Performance
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPattern {
    pub operation: String,
    pub error_type: String,
    pub count: usize,
}

/// One hour of performance samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyTrend {
    /// ISO hour, `YYYY-MM-DDTHH`
    pub hour: String,
    pub average_duration: f64,
    pub count: usize,
    /// Percent of failed samples
    pub error_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceAnalytics {
    pub total_operations: usize,
    /// Percent
    pub success_rate: f64,
    pub average_duration: f64,
    pub slowest_operations: Vec<PerformanceMetrics>,
    pub error_patterns: Vec<ErrorPattern>,
    pub operation_frequency: BTreeMap<String, usize>,
    /// Trailing 24 hours, oldest bucket first
    pub hourly_trends: Vec<HourlyTrend>,
}

impl PerformanceAnalytics {
    pub fn error_rate(&self) -> f64 {
        100.0 - self.success_rate
    }
}

pub fn performance_analytics(
    samples: &[PerformanceMetrics],
    now: DateTime<Utc>,
) -> Option<PerformanceAnalytics> {
    if samples.is_empty() {
        return None;
    }

    let total = samples.len();
    let successes = samples.iter().filter(|s| s.success).count();
    let durations: Vec<f64> = samples.iter().map(|s| s.duration_ms).collect();

    let mut slowest = samples.to_vec();
    slowest.sort_by(|a, b| b.duration_ms.total_cmp(&a.duration_ms));
    slowest.truncate(TOP_SLOWEST);

    let mut pattern_counts: HashMap<(String, String), usize> = HashMap::new();
    for sample in samples.iter().filter(|s| !s.success) {
        let error_type = sample
            .error_type
            .clone()
            .unwrap_or_else(|| "Unknown".to_string());
        *pattern_counts
            .entry((sample.operation.clone(), error_type))
            .or_default() += 1;
    }
    let mut error_patterns: Vec<ErrorPattern> = pattern_counts
        .into_iter()
        .map(|((operation, error_type), count)| ErrorPattern {
            operation,
            error_type,
            count,
        })
        .collect();
    error_patterns.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.operation.cmp(&b.operation))
            .then_with(|| a.error_type.cmp(&b.error_type))
    });
    error_patterns.truncate(TOP_ERROR_PATTERNS);

    let mut operation_frequency = BTreeMap::new();
    for sample in samples {
        *operation_frequency
            .entry(sample.operation.clone())
            .or_insert(0) += 1;
    }

    Some(PerformanceAnalytics {
        total_operations: total,
        success_rate: successes as f64 / total as f64 * 100.0,
        average_duration: mean(&durations),
        slowest_operations: slowest,
        error_patterns,
        operation_frequency,
        hourly_trends: hourly_trends(samples, now),
    })
}

fn hourly_trends(samples: &[PerformanceMetrics], now: DateTime<Utc>) -> Vec<HourlyTrend> {
    let cutoff = now - Duration::hours(24);
    let mut buckets: BTreeMap<String, (f64, usize, usize)> = BTreeMap::new();

    for sample in samples.iter().filter(|s| s.start_time >= cutoff) {
        let key = sample.start_time.format("%Y-%m-%dT%H").to_string();
        let bucket = buckets.entry(key).or_insert((0.0, 0, 0));
        bucket.0 += sample.duration_ms;
        bucket.1 += 1;
        if !sample.success {
            bucket.2 += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(hour, (total_duration, count, errors))| HourlyTrend {
            hour,
            average_duration: total_duration / count as f64,
            count,
            error_rate: errors as f64 / count as f64 * 100.0,
        })
        .collect()
}

// ============================================
// Behavior
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathCount {
    pub path: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorAnalytics {
    pub total_sessions: usize,
    /// Mean of (last - first) interaction per session, ms
    pub average_session_duration: f64,
    pub top_actions: Vec<(String, usize)>,
    pub error_prone_paths: Vec<PathCount>,
    pub device_breakdown: BTreeMap<DeviceClass, usize>,
    /// (hour of day, interactions), busiest first
    pub peak_usage_hours: Vec<(u32, usize)>,
    pub total_interactions: usize,
    pub error_interactions: usize,
}

impl BehaviorAnalytics {
    /// Percent of interactions that hit an error.
    pub fn error_rate(&self) -> f64 {
        if self.total_interactions == 0 {
            return 0.0;
        }
        self.error_interactions as f64 / self.total_interactions as f64 * 100.0
    }

    /// Percent of interactions from a given device class.
    pub fn device_share(&self, class: DeviceClass) -> f64 {
        if self.total_interactions == 0 {
            return 0.0;
        }
        let count = self.device_breakdown.get(&class).copied().unwrap_or(0);
        count as f64 / self.total_interactions as f64 * 100.0
    }
}

pub fn behavior_analytics(samples: &[UserBehaviorMetrics]) -> Option<BehaviorAnalytics> {
    if samples.is_empty() {
        return None;
    }

    let mut sessions: HashMap<&str, (DateTime<Utc>, DateTime<Utc>)> = HashMap::new();
    for sample in samples {
        let span = sessions
            .entry(sample.session_id.as_str())
            .or_insert((sample.timestamp, sample.timestamp));
        span.0 = span.0.min(sample.timestamp);
        span.1 = span.1.max(sample.timestamp);
    }
    let session_durations: Vec<f64> = sessions
        .values()
        .map(|(first, last)| (*last - *first).num_milliseconds() as f64)
        .collect();

    let mut action_counts: HashMap<&str, usize> = HashMap::new();
    for sample in samples {
        *action_counts.entry(sample.action.as_str()).or_default() += 1;
    }
    let top_actions = top_n(action_counts, TOP_ACTIONS)
        .into_iter()
        .map(|(action, count)| (action.to_string(), count))
        .collect();

    let mut path_counts: HashMap<String, usize> = HashMap::new();
    for sample in samples.iter().filter(|s| s.error_encountered) {
        let skip = sample.click_path.len().saturating_sub(ERROR_PATH_DEPTH);
        let path = sample.click_path[skip..].join(" > ");
        if !path.is_empty() {
            *path_counts.entry(path).or_default() += 1;
        }
    }
    let error_prone_paths = top_n(path_counts, TOP_ERROR_PATHS)
        .into_iter()
        .map(|(path, count)| PathCount { path, count })
        .collect();

    let mut device_breakdown = BTreeMap::new();
    for sample in samples {
        let class = DeviceClass::from_user_agent(&sample.device_info.user_agent);
        *device_breakdown.entry(class).or_insert(0) += 1;
    }

    let mut hour_counts: HashMap<u32, usize> = HashMap::new();
    for sample in samples {
        *hour_counts.entry(sample.timestamp.hour()).or_default() += 1;
    }
    let peak_usage_hours = top_n(hour_counts, TOP_PEAK_HOURS);

    Some(BehaviorAnalytics {
        total_sessions: sessions.len(),
        average_session_duration: mean(&session_durations),
        top_actions,
        error_prone_paths,
        device_breakdown,
        peak_usage_hours,
        total_interactions: samples.len(),
        error_interactions: samples.iter().filter(|s| s.error_encountered).count(),
    })
}

// ============================================
// Health
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthAlert {
    pub level: AlertLevel,
    pub metric: String,
    pub message: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePoint {
    pub timestamp: DateTime<Utc>,
    pub memory_usage: f64,
    pub operations_per_minute: f64,
    pub average_response_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthAnalytics {
    pub current: SystemHealthMetrics,
    /// Trailing 24 snapshots, oldest first
    pub recent: Vec<SystemHealthMetrics>,
    pub alerts: Vec<HealthAlert>,
    pub resource_trend: Vec<ResourcePoint>,
    pub performance_score: f64,
}

pub fn health_analytics(snapshots: &[SystemHealthMetrics]) -> Option<HealthAnalytics> {
    let current = snapshots.last()?.clone();
    let skip = snapshots.len().saturating_sub(RECENT_SNAPSHOTS);
    let recent = snapshots[skip..].to_vec();

    let resource_trend = recent
        .iter()
        .map(|s| ResourcePoint {
            timestamp: s.timestamp,
            memory_usage: s.memory_usage,
            operations_per_minute: s.operations_per_minute,
            average_response_time: s.average_response_time,
        })
        .collect();

    Some(HealthAnalytics {
        alerts: health_alerts(&current),
        performance_score: performance_score(
            current.error_rate,
            current.average_response_time,
            current.memory_usage,
        ),
        current,
        recent,
        resource_trend,
    })
}

pub fn health_alerts(snapshot: &SystemHealthMetrics) -> Vec<HealthAlert> {
    let mut alerts = Vec::new();

    if snapshot.error_rate > 10.0 {
        alerts.push(HealthAlert {
            level: AlertLevel::Critical,
            metric: "error_rate".to_string(),
            message: format!("Error rate is {:.1}%", snapshot.error_rate),
            value: snapshot.error_rate,
        });
    } else if snapshot.error_rate > 5.0 {
        alerts.push(HealthAlert {
            level: AlertLevel::Warning,
            metric: "error_rate".to_string(),
            message: format!("Error rate is elevated at {:.1}%", snapshot.error_rate),
            value: snapshot.error_rate,
        });
    }

    if snapshot.average_response_time > 1000.0 {
        alerts.push(HealthAlert {
            level: AlertLevel::Critical,
            metric: "average_response_time".to_string(),
            message: format!(
                "Average response time is {:.0}ms",
                snapshot.average_response_time
            ),
            value: snapshot.average_response_time,
        });
    } else if snapshot.average_response_time > 500.0 {
        alerts.push(HealthAlert {
            level: AlertLevel::Warning,
            metric: "average_response_time".to_string(),
            message: format!(
                "Average response time is elevated at {:.0}ms",
                snapshot.average_response_time
            ),
            value: snapshot.average_response_time,
        });
    }

    if snapshot.memory_usage > 100.0 {
        alerts.push(HealthAlert {
            level: AlertLevel::Warning,
            metric: "memory_usage".to_string(),
            message: format!("Memory usage is {:.1}MB", snapshot.memory_usage),
            value: snapshot.memory_usage,
        });
    }

    alerts
}

/// `100 - 2*err - max(0,(resp-500)/10) - max(0,(mem-50)/2)`, clamped to 0..=100.
pub fn performance_score(error_rate: f64, average_response_time: f64, memory_usage: f64) -> f64 {
    let score = 100.0
        - 2.0 * error_rate
        - ((average_response_time - 500.0) / 10.0).max(0.0)
        - ((memory_usage - 50.0) / 2.0).max(0.0);
    score.clamp(0.0, 100.0)
}

// ============================================
// Shared helpers
// ============================================

/// Share of consecutive steps that rise, in percent.
///
/// A strictly increasing series is 100; flat and decreasing series are 0.
/// Fewer than two samples yield 0.
pub fn trend_direction(values: &[f64]) -> f64 {
    step_share(values, |prev, next| next > prev)
}

/// Share of consecutive steps that fall, in percent.
pub fn decline_direction(values: &[f64]) -> f64 {
    step_share(values, |prev, next| next < prev)
}

fn step_share(values: &[f64], counts: impl Fn(f64, f64) -> bool) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let steps = values
        .windows(2)
        .filter(|pair| counts(pair[0], pair[1]))
        .count();
    steps as f64 / (values.len() - 1) as f64 * 100.0
}

/// Arithmetic mean, 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Last `n` elements of `values`.
pub fn tail<T>(values: &[T], n: usize) -> &[T] {
    &values[values.len().saturating_sub(n)..]
}

/// Highest counts first, ties by key ascending.
fn top_n<K: Ord>(counts: HashMap<K, usize>, n: usize) -> Vec<(K, usize)> {
    let mut ranked: Vec<(K, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}
