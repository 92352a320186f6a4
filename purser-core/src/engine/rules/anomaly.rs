//! Built-in anomaly rules.
//!
//! Thresholds compare the current aggregate against a fixed baseline. Every
//! rule fills `baseline` and `current` with the same metric names so the
//! deviation can be read off directly.

use super::{AnalysisSnapshot, AnomalyRule, FnRule};
use crate::analytics::{aggregate, trend_direction};
use crate::types::{AnomalyType, MetricMap, NewAnomaly, Severity};

const SPIKE_THRESHOLD_MS: f64 = 2000.0;
const SPIKE_CRITICAL_MS: f64 = 5000.0;
const BASELINE_DURATION_MS: f64 = 800.0;

const ERROR_RATE_THRESHOLD: f64 = 10.0;
const ERROR_RATE_CRITICAL: f64 = 25.0;
const BASELINE_ERROR_RATE: f64 = 2.0;

const MEMORY_THRESHOLD_MB: f64 = 100.0;
const MEMORY_HIGH_MB: f64 = 200.0;
const BASELINE_MEMORY_MB: f64 = 50.0;

const TREND_WINDOW: usize = 5;
const TREND_MIN_SAMPLES: usize = 3;
const MEMORY_TREND_THRESHOLD: f64 = 50.0;

const BEHAVIOR_ERROR_THRESHOLD: f64 = 15.0;
const BEHAVIOR_ERROR_HIGH: f64 = 30.0;
const BEHAVIOR_MIN_INTERACTIONS: usize = 5;

const VOLUME_MULTIPLIER: f64 = 2.0;
const VOLUME_MIN_SNAPSHOTS: usize = 3;

const SLOW_RESPONSE_MS: f64 = 1000.0;
const BASELINE_RESPONSE_MS: f64 = 500.0;

pub fn builtin() -> Vec<AnomalyRule> {
    vec![
        Box::new(FnRule::new("anomaly.performance_spike", performance_spike)),
        Box::new(FnRule::new("anomaly.error_burst", error_burst)),
        Box::new(FnRule::new("anomaly.high_memory", high_memory)),
        Box::new(FnRule::new("anomaly.memory_trend", memory_trend)),
        Box::new(FnRule::new("anomaly.user_errors", user_errors)),
        Box::new(FnRule::new("anomaly.activity_volume", activity_volume)),
        Box::new(FnRule::new("anomaly.slow_responses", slow_responses)),
    ]
}

fn metrics(pairs: &[(&str, f64)]) -> MetricMap {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn deviation(current: f64, baseline: f64) -> f64 {
    if baseline == 0.0 {
        0.0
    } else {
        (current - baseline) / baseline * 100.0
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn performance_spike(snapshot: &AnalysisSnapshot) -> Option<NewAnomaly> {
    let perf = snapshot.performance.as_ref()?;
    let average = perf.average_duration;
    if average <= SPIKE_THRESHOLD_MS {
        return None;
    }

    Some(NewAnomaly {
        anomaly_type: AnomalyType::PerformanceSpike,
        severity: if average > SPIKE_CRITICAL_MS {
            Severity::Critical
        } else {
            Severity::High
        },
        confidence: 90.0,
        title: "Performance Spike Detected".to_string(),
        description: format!(
            "Average operation duration is {:.0}ms against an expected {:.0}ms",
            average, BASELINE_DURATION_MS
        ),
        affected_metrics: strings(&["average_duration"]),
        baseline: metrics(&[("average_duration", BASELINE_DURATION_MS)]),
        current: metrics(&[("average_duration", average)]),
        deviation: deviation(average, BASELINE_DURATION_MS),
        suggested_actions: strings(&[
            "Review the slowest recent operations",
            "Check for large bulk imports running concurrently",
            "Reduce the page size of guest list queries",
        ]),
    })
}

pub fn error_burst(snapshot: &AnalysisSnapshot) -> Option<NewAnomaly> {
    let perf = snapshot.performance.as_ref()?;
    let error_rate = perf.error_rate();
    if error_rate <= ERROR_RATE_THRESHOLD {
        return None;
    }

    let top = perf
        .error_patterns
        .first()
        .map(|p| format!(" Most frequent: {} ({}).", p.operation, p.error_type))
        .unwrap_or_default();

    Some(NewAnomaly {
        anomaly_type: AnomalyType::ErrorBurst,
        severity: if error_rate > ERROR_RATE_CRITICAL {
            Severity::Critical
        } else {
            Severity::High
        },
        confidence: 88.0,
        title: "Error Rate Spike".to_string(),
        description: format!(
            "{:.1}% of recorded operations failed.{}",
            error_rate, top
        ),
        affected_metrics: strings(&["error_rate", "success_rate"]),
        baseline: metrics(&[("error_rate", BASELINE_ERROR_RATE)]),
        current: metrics(&[("error_rate", error_rate)]),
        deviation: deviation(error_rate, BASELINE_ERROR_RATE),
        suggested_actions: strings(&[
            "Inspect the recurring error patterns",
            "Validate recent import files for malformed rows",
        ]),
    })
}

pub fn high_memory(snapshot: &AnalysisSnapshot) -> Option<NewAnomaly> {
    let memory = snapshot.health.as_ref()?.current.memory_usage;
    if memory <= MEMORY_THRESHOLD_MB {
        return None;
    }

    Some(NewAnomaly {
        anomaly_type: AnomalyType::CapacityIssue,
        severity: if memory > MEMORY_HIGH_MB {
            Severity::High
        } else {
            Severity::Medium
        },
        confidence: 85.0,
        title: "High Memory Usage Detected".to_string(),
        description: format!("Resident memory is {:.1}MB", memory),
        affected_metrics: strings(&["memory_usage"]),
        baseline: metrics(&[("memory_usage", BASELINE_MEMORY_MB)]),
        current: metrics(&[("memory_usage", memory)]),
        deviation: deviation(memory, BASELINE_MEMORY_MB),
        suggested_actions: strings(&[
            "Trim retained metric series",
            "Restart long-running sessions",
        ]),
    })
}

pub fn memory_trend(snapshot: &AnalysisSnapshot) -> Option<NewAnomaly> {
    let memory = snapshot.health_series(TREND_WINDOW, |s| s.memory_usage);
    if memory.len() < TREND_MIN_SAMPLES {
        return None;
    }
    let trend = trend_direction(&memory);
    if trend <= MEMORY_TREND_THRESHOLD {
        return None;
    }

    let first = memory[0];
    let last = memory[memory.len() - 1];

    Some(NewAnomaly {
        anomaly_type: AnomalyType::CapacityIssue,
        severity: Severity::Medium,
        confidence: 75.0,
        title: "Memory Usage Trending Upward".to_string(),
        description: format!(
            "Memory rose from {:.1}MB to {:.1}MB over the last {} snapshots",
            first,
            last,
            memory.len()
        ),
        affected_metrics: strings(&["memory_usage"]),
        baseline: metrics(&[("memory_usage", first)]),
        current: metrics(&[("memory_usage", last), ("trend_direction", trend)]),
        deviation: deviation(last, first),
        suggested_actions: strings(&[
            "Watch the next snapshots for continued growth",
            "Check for caches that are never evicted",
        ]),
    })
}

pub fn user_errors(snapshot: &AnalysisSnapshot) -> Option<NewAnomaly> {
    let behavior = snapshot.behavior.as_ref()?;
    if behavior.total_interactions < BEHAVIOR_MIN_INTERACTIONS {
        return None;
    }
    let error_rate = behavior.error_rate();
    if error_rate <= BEHAVIOR_ERROR_THRESHOLD {
        return None;
    }

    Some(NewAnomaly {
        anomaly_type: AnomalyType::UserBehaviorAnomaly,
        severity: if error_rate > BEHAVIOR_ERROR_HIGH {
            Severity::High
        } else {
            Severity::Medium
        },
        confidence: 70.0,
        title: "Elevated User Error Rate".to_string(),
        description: format!(
            "{} of {} interactions ended in an error ({:.1}%)",
            behavior.error_interactions, behavior.total_interactions, error_rate
        ),
        affected_metrics: strings(&["interaction_error_rate"]),
        baseline: metrics(&[("interaction_error_rate", BEHAVIOR_ERROR_THRESHOLD)]),
        current: metrics(&[("interaction_error_rate", error_rate)]),
        deviation: deviation(error_rate, BEHAVIOR_ERROR_THRESHOLD),
        suggested_actions: strings(&[
            "Review the error-prone click paths",
            "Add inline validation to the guest edit form",
        ]),
    })
}

pub fn activity_volume(snapshot: &AnalysisSnapshot) -> Option<NewAnomaly> {
    let health = snapshot.health.as_ref()?;
    if health.recent.len() < VOLUME_MIN_SNAPSHOTS {
        return None;
    }

    let (current, previous) = health.recent.split_last()?;
    let previous: Vec<f64> = previous.iter().map(|s| s.operations_per_minute).collect();
    let expected = aggregate::mean(&previous);
    let load = current.operations_per_minute;
    if expected <= 0.0 || load <= expected * VOLUME_MULTIPLIER {
        return None;
    }

    Some(NewAnomaly {
        anomaly_type: AnomalyType::UnusualPattern,
        severity: Severity::Medium,
        confidence: 72.0,
        title: "Unusual Activity Volume".to_string(),
        description: format!(
            "{:.0} operations in the last minute against a recent mean of {:.1}",
            load, expected
        ),
        affected_metrics: strings(&["operations_per_minute"]),
        baseline: metrics(&[("operations_per_minute", expected)]),
        current: metrics(&[("operations_per_minute", load)]),
        deviation: deviation(load, expected),
        suggested_actions: strings(&[
            "Confirm the burst matches a scheduled embarkation or import",
            "Check for scripted or repeated submissions",
        ]),
    })
}

pub fn slow_responses(snapshot: &AnalysisSnapshot) -> Option<NewAnomaly> {
    let response = snapshot.health.as_ref()?.current.average_response_time;
    if response <= SLOW_RESPONSE_MS {
        return None;
    }

    Some(NewAnomaly {
        anomaly_type: AnomalyType::PerformanceSpike,
        severity: Severity::High,
        confidence: 80.0,
        title: "Slow Response Times".to_string(),
        description: format!(
            "The last operations averaged {:.0}ms to complete",
            response
        ),
        affected_metrics: strings(&["average_response_time"]),
        baseline: metrics(&[("average_response_time", BASELINE_RESPONSE_MS)]),
        current: metrics(&[("average_response_time", response)]),
        deviation: deviation(response, BASELINE_RESPONSE_MS),
        suggested_actions: strings(&["Profile the slowest operation types"]),
    })
}
