//! Dashboard snapshot assembled by the insights engine.
//!
//! Besides the three rule-output collections, the dashboard carries a blended
//! system score, qualitative trend labels, simple extrapolated predictions and
//! the fixed model confidence figures.

use super::aggregate::{self, BehaviorAnalytics, HealthAnalytics, PerformanceAnalytics};
use crate::types::{AnomalyDetection, PredictiveInsight, SmartRecommendation};
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Samples considered by the trend labels and predictions.
const TREND_WINDOW: usize = 5;

/// Trend directions beyond this magnitude (percent) count as movement.
const TREND_THRESHOLD: f64 = 20.0;

const LOAD_GROWTH_FACTOR: f64 = 1.1;
const ERROR_DECAY_FACTOR: f64 = 0.8;
const CAPACITY_GROWTH_FACTOR: f64 = 1.15;

/// Confidence figures shown for the heuristic models.
///
/// These are fixed presentation values; nothing in the engine measures or
/// updates them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelConfidence {
    pub anomaly_detection: f64,
    pub trend_prediction: f64,
    pub recommendation_engine: f64,
    pub pattern_recognition: f64,
}

pub const MODEL_CONFIDENCE: ModelConfidence = ModelConfidence {
    anomaly_detection: 87.5,
    trend_prediction: 82.3,
    recommendation_engine: 79.8,
    pattern_recognition: 85.1,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendLabel {
    Improving,
    Stable,
    Declining,
}

impl TrendLabel {
    /// Label a series by its rising share minus its falling share.
    pub fn from_series(values: &[f64], higher_is_better: bool) -> Self {
        let net = aggregate::trend_direction(values) - aggregate::decline_direction(values);
        Self::from_direction(net, higher_is_better)
    }

    /// Interpret a net direction in `[-100, 100]` for a metric.
    ///
    /// A rising value improves metrics where higher is better and degrades
    /// the others.
    pub fn from_direction(direction: f64, higher_is_better: bool) -> Self {
        let rising = direction > TREND_THRESHOLD;
        let falling = direction < -TREND_THRESHOLD;
        match (rising, falling, higher_is_better) {
            (true, _, true) | (_, true, false) => TrendLabel::Improving,
            (true, _, false) | (_, true, true) => TrendLabel::Declining,
            _ => TrendLabel::Stable,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendLabel::Improving => "improving",
            TrendLabel::Stable => "stable",
            TrendLabel::Declining => "declining",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trends {
    /// From hourly mean durations (lower is better)
    pub performance: TrendLabel,
    /// From snapshot error rates (lower is better)
    pub error_rate: TrendLabel,
    /// From hourly operation counts (higher is better)
    pub user_engagement: TrendLabel,
    /// From snapshot memory usage (lower is better)
    pub capacity: TrendLabel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictedMetrics {
    /// Operations per minute expected over the next hour
    pub next_hour_load: f64,
    /// Hour of day (0-23)
    pub next_peak_hour: u32,
    /// Failed operations expected over the next hour
    pub expected_errors: f64,
    /// Percent of the memory budget
    pub capacity_utilization: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiInsightsDashboard {
    pub generated_at: DateTime<Utc>,
    /// Newest first
    pub insights: Vec<PredictiveInsight>,
    /// Newest first
    pub anomalies: Vec<AnomalyDetection>,
    /// Newest first
    pub recommendations: Vec<SmartRecommendation>,
    pub system_score: f64,
    pub trends: Trends,
    pub predictions: PredictedMetrics,
    pub model_confidence: ModelConfidence,
}

impl AiInsightsDashboard {
    pub fn active_anomalies(&self) -> impl Iterator<Item = &AnomalyDetection> {
        self.anomalies.iter().filter(|a| !a.auto_resolved)
    }

    pub fn pending_recommendations(&self) -> impl Iterator<Item = &SmartRecommendation> {
        self.recommendations.iter().filter(|r| !r.implemented)
    }
}

/// Mean of the available performance, behavior and health sub-scores.
///
/// Each sub-score uses the health score's penalty family. With no data at
/// all the score is 100.
pub fn system_score(
    performance: Option<&PerformanceAnalytics>,
    behavior: Option<&BehaviorAnalytics>,
    health: Option<&HealthAnalytics>,
) -> f64 {
    let mut scores = Vec::with_capacity(3);

    if let Some(perf) = performance {
        scores.push(aggregate::performance_score(
            perf.error_rate(),
            perf.average_duration,
            0.0,
        ));
    }
    if let Some(behavior) = behavior {
        scores.push((100.0 - 2.0 * behavior.error_rate()).clamp(0.0, 100.0));
    }
    if let Some(health) = health {
        scores.push(health.performance_score);
    }

    if scores.is_empty() {
        100.0
    } else {
        aggregate::mean(&scores)
    }
}

pub fn trends(performance: Option<&PerformanceAnalytics>, health: Option<&HealthAnalytics>) -> Trends {
    let hourly = performance.map(|p| p.hourly_trends.as_slice()).unwrap_or(&[]);
    let hourly = aggregate::tail(hourly, TREND_WINDOW);
    let durations: Vec<f64> = hourly.iter().map(|h| h.average_duration).collect();
    let counts: Vec<f64> = hourly.iter().map(|h| h.count as f64).collect();

    let snapshots = health.map(|h| h.recent.as_slice()).unwrap_or(&[]);
    let snapshots = aggregate::tail(snapshots, TREND_WINDOW);
    let error_rates: Vec<f64> = snapshots.iter().map(|s| s.error_rate).collect();
    let memory: Vec<f64> = snapshots.iter().map(|s| s.memory_usage).collect();

    Trends {
        performance: TrendLabel::from_series(&durations, false),
        error_rate: TrendLabel::from_series(&error_rates, false),
        user_engagement: TrendLabel::from_series(&counts, true),
        capacity: TrendLabel::from_series(&memory, false),
    }
}

pub fn predictions(
    performance: Option<&PerformanceAnalytics>,
    behavior: Option<&BehaviorAnalytics>,
    health: Option<&HealthAnalytics>,
    now: DateTime<Utc>,
    memory_budget_mb: f64,
) -> PredictedMetrics {
    let snapshots = health.map(|h| h.recent.as_slice()).unwrap_or(&[]);
    let snapshots = aggregate::tail(snapshots, TREND_WINDOW);
    let load: Vec<f64> = snapshots.iter().map(|s| s.operations_per_minute).collect();
    let memory: Vec<f64> = snapshots.iter().map(|s| s.memory_usage).collect();

    let next_peak_hour = behavior
        .and_then(|b| b.peak_usage_hours.first())
        .map(|(hour, _)| *hour)
        .unwrap_or_else(|| (now.hour() + 1) % 24);

    let hourly = performance.map(|p| p.hourly_trends.as_slice()).unwrap_or(&[]);
    let errors_per_hour: Vec<f64> = aggregate::tail(hourly, TREND_WINDOW)
        .iter()
        .map(|h| h.count as f64 * h.error_rate / 100.0)
        .collect();

    let capacity_utilization = if memory_budget_mb > 0.0 {
        (aggregate::mean(&memory) / memory_budget_mb * 100.0 * CAPACITY_GROWTH_FACTOR)
            .clamp(0.0, 100.0)
    } else {
        0.0
    };

    PredictedMetrics {
        next_hour_load: aggregate::mean(&load) * LOAD_GROWTH_FACTOR,
        next_peak_hour,
        expected_errors: aggregate::mean(&errors_per_hour) * ERROR_DECAY_FACTOR,
        capacity_utilization,
    }
}
