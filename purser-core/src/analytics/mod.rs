//! Analytics module for purser
//!
//! Provides the read-only derivations the rule engine consumes:
//! - [`aggregate`]: pure summaries over the three metric series
//! - [`dashboard`]: the dashboard snapshot types and score/trend/prediction
//!   helpers
//!
//! The engine never touches the metric series directly; it reads them through
//! [`AnalyticsSource`], which [`MetricsCollector`](crate::metrics::MetricsCollector)
//! implements.

pub mod aggregate;
pub mod dashboard;

pub use aggregate::{
    trend_direction, BehaviorAnalytics, ErrorPattern, HealthAlert, HealthAnalytics, HourlyTrend,
    PerformanceAnalytics,
};
pub use dashboard::{AiInsightsDashboard, ModelConfidence, PredictedMetrics, TrendLabel, Trends};

/// Source of aggregated metric summaries.
///
/// Each getter returns `None` when its series has no samples yet.
pub trait AnalyticsSource: Send + Sync {
    fn performance_analytics(&self) -> Option<PerformanceAnalytics>;
    fn behavior_analytics(&self) -> Option<BehaviorAnalytics>;
    fn health_analytics(&self) -> Option<HealthAnalytics>;
}
