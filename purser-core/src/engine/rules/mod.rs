//! Rule framework for the insights engine.
//!
//! A rule is a small predicate+factory: it looks at one [`AnalysisSnapshot`]
//! and either produces a new item or nothing. Rules never mutate state and
//! never fail; a missing input simply yields `None`.
//!
//! ## Adding a rule
//!
//! ```rust,ignore
//! use purser_core::engine::rules::{AnalysisSnapshot, FnRule, RuleSet};
//!
//! fn quiet_day(snapshot: &AnalysisSnapshot) -> Option<NewInsight> {
//!     // ...
//! }
//!
//! let mut rules = create_default_rules();
//! rules.register_insight(Box::new(FnRule::new("insight.quiet_day", quiet_day)));
//! ```
//!
//! Rules are evaluated in registration order.

pub mod anomaly;
pub mod insight;
pub mod recommendation;

use crate::analytics::aggregate;
use crate::analytics::{BehaviorAnalytics, HealthAnalytics, PerformanceAnalytics};
use crate::types::{
    ChangeLogEntry, NewAnomaly, NewInsight, NewRecommendation, SystemHealthMetrics,
};
use chrono::{DateTime, Duration, Utc};

/// Everything a rule may look at, assembled once per pass.
#[derive(Debug, Clone)]
pub struct AnalysisSnapshot {
    pub now: DateTime<Utc>,
    pub performance: Option<PerformanceAnalytics>,
    pub behavior: Option<BehaviorAnalytics>,
    pub health: Option<HealthAnalytics>,
    /// Change log, newest first
    pub history: Vec<ChangeLogEntry>,
}

impl AnalysisSnapshot {
    /// Change log entries within `window` of `now`.
    pub fn history_within(&self, window: Duration) -> impl Iterator<Item = &ChangeLogEntry> {
        let cutoff = self.now - window;
        self.history.iter().filter(move |e| e.timestamp >= cutoff)
    }

    /// Last `n` health snapshot values extracted by `field`, oldest first.
    pub fn health_series(&self, n: usize, field: impl Fn(&SystemHealthMetrics) -> f64) -> Vec<f64> {
        let recent = self.health.as_ref().map(|h| h.recent.as_slice()).unwrap_or(&[]);
        aggregate::tail(recent, n).iter().map(field).collect()
    }
}

/// A single rule producing items of type `T`.
pub trait Rule<T>: Send + Sync {
    /// Unique identifier.
    ///
    /// Convention: `kind.rule_name` (e.g., "anomaly.performance_spike")
    fn id(&self) -> &str;

    fn evaluate(&self, snapshot: &AnalysisSnapshot) -> Option<T>;
}

/// Rule backed by a plain function.
pub struct FnRule<T> {
    id: &'static str,
    evaluate: fn(&AnalysisSnapshot) -> Option<T>,
}

impl<T> FnRule<T> {
    pub const fn new(id: &'static str, evaluate: fn(&AnalysisSnapshot) -> Option<T>) -> Self {
        Self { id, evaluate }
    }
}

impl<T> Rule<T> for FnRule<T> {
    fn id(&self) -> &str {
        self.id
    }

    fn evaluate(&self, snapshot: &AnalysisSnapshot) -> Option<T> {
        (self.evaluate)(snapshot)
    }
}

pub type AnomalyRule = Box<dyn Rule<NewAnomaly>>;
pub type InsightRule = Box<dyn Rule<NewInsight>>;
pub type RecommendationRule = Box<dyn Rule<NewRecommendation>>;

/// Ordered rule registry, one list per output kind.
#[derive(Default)]
pub struct RuleSet {
    anomalies: Vec<AnomalyRule>,
    insights: Vec<InsightRule>,
    recommendations: Vec<RecommendationRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_anomaly(&mut self, rule: AnomalyRule) {
        tracing::debug!(rule = rule.id(), "Registered anomaly rule");
        self.anomalies.push(rule);
    }

    pub fn register_insight(&mut self, rule: InsightRule) {
        tracing::debug!(rule = rule.id(), "Registered insight rule");
        self.insights.push(rule);
    }

    pub fn register_recommendation(&mut self, rule: RecommendationRule) {
        tracing::debug!(rule = rule.id(), "Registered recommendation rule");
        self.recommendations.push(rule);
    }

    pub fn anomaly_rules(&self) -> &[AnomalyRule] {
        &self.anomalies
    }

    pub fn insight_rules(&self) -> &[InsightRule] {
        &self.insights
    }

    pub fn recommendation_rules(&self) -> &[RecommendationRule] {
        &self.recommendations
    }

    /// Identifiers of every registered rule, in evaluation order.
    pub fn rule_ids(&self) -> Vec<&str> {
        self.anomalies
            .iter()
            .map(|r| r.id())
            .chain(self.insights.iter().map(|r| r.id()))
            .chain(self.recommendations.iter().map(|r| r.id()))
            .collect()
    }
}

/// Build the rule set with every built-in rule registered.
pub fn create_default_rules() -> RuleSet {
    let mut rules = RuleSet::new();
    for rule in anomaly::builtin() {
        rules.register_anomaly(rule);
    }
    for rule in insight::builtin() {
        rules.register_insight(rule);
    }
    for rule in recommendation::builtin() {
        rules.register_recommendation(rule);
    }
    rules
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_default_rule_ids_are_unique() {
        let rules = create_default_rules();
        let mut ids = rules.rule_ids();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
        assert!(!rules.anomaly_rules().is_empty());
        assert!(!rules.insight_rules().is_empty());
        assert!(!rules.recommendation_rules().is_empty());
    }

    #[test]
    fn test_no_rule_fires_without_data() {
        let rules = create_default_rules();
        let snapshot = empty_snapshot();
        assert!(rules.anomaly_rules().iter().all(|r| r.evaluate(&snapshot).is_none()));
        assert!(rules.insight_rules().iter().all(|r| r.evaluate(&snapshot).is_none()));
        assert!(rules
            .recommendation_rules()
            .iter()
            .all(|r| r.evaluate(&snapshot).is_none()));
    }

    #[test]
    fn test_fn_rule_registration_order() {
        fn never(_: &AnalysisSnapshot) -> Option<NewInsight> {
            None
        }

        let mut rules = RuleSet::new();
        rules.register_insight(Box::new(FnRule::new("insight.a", never)));
        rules.register_insight(Box::new(FnRule::new("insight.b", never)));
        assert_eq!(rules.rule_ids(), vec!["insight.a", "insight.b"]);
    }
}
