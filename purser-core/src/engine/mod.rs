//! Insights engine
//!
//! Evaluates the registered rules against the analytics source and the change
//! log, and owns the resulting insights, anomalies and recommendations.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐
//! │  ChangeLog   │   │ MetricsCollector │
//! │ (history)    │   │ (source)         │
//! └──────┬───────┘   └────────┬─────────┘
//!        │                    │
//!        ▼                    ▼
//! ┌─────────────────────────────────────────────────┐
//! │             AiAnalyticsEngine                   │
//! │  snapshot() -> AnalysisSnapshot                 │
//! │  detect_anomalies()         anomaly rules       │
//! │  generate_insights()        insight rules       │
//! │  generate_recommendations() recommendation rules│
//! │  run_full_analysis()        all of the above    │
//! │                             + pattern mining    │
//! │                  │                              │
//! │                  ▼                              │
//! │            OutputStore  ──▶  dashboard()        │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! Every pass starts with a cleanup and is guarded by its own in-flight
//! flag: a pass requested while the same pass is still running returns
//! [`PassOutcome::Skipped`].

pub mod patterns;
pub mod rules;
pub mod store;

use crate::analytics::dashboard::{self, AiInsightsDashboard, MODEL_CONFIDENCE};
use crate::analytics::AnalyticsSource;
use crate::changelog::ChangeHistory;
use crate::clock::Clock;
use crate::config::Config;
use crate::error::Result;
use crate::types::{
    AnomalyDetection, NewAnomaly, NewInsight, NewRecommendation, PredictiveInsight,
    SmartRecommendation,
};
use patterns::Findings;
use rules::{create_default_rules, AnalysisSnapshot, RuleSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use store::{CleanupStats, OutputStore};

/// Result of one analysis pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The pass ran and added `added` new items
    Completed { added: usize },
    /// The same pass was already running
    Skipped,
}

impl PassOutcome {
    pub fn added(&self) -> usize {
        match self {
            PassOutcome::Completed { added } => *added,
            PassOutcome::Skipped => 0,
        }
    }
}

/// Clears its flag when dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn begin(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Default)]
struct PassFlags {
    anomalies: AtomicBool,
    insights: AtomicBool,
    recommendations: AtomicBool,
    patterns: AtomicBool,
    table_assignments: AtomicBool,
}

pub struct AiAnalyticsEngine {
    history: Arc<dyn ChangeHistory>,
    source: Arc<dyn AnalyticsSource>,
    clock: Arc<dyn Clock>,
    rules: RuleSet,
    store: Mutex<OutputStore>,
    flags: PassFlags,
    memory_budget_mb: f64,
}

impl AiAnalyticsEngine {
    /// Create an engine with the built-in rules.
    pub fn new(
        history: Arc<dyn ChangeHistory>,
        source: Arc<dyn AnalyticsSource>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        Self::with_rules(history, source, clock, config, create_default_rules())
    }

    pub fn with_rules(
        history: Arc<dyn ChangeHistory>,
        source: Arc<dyn AnalyticsSource>,
        clock: Arc<dyn Clock>,
        config: &Config,
        rules: RuleSet,
    ) -> Self {
        tracing::info!(rules = rules.rule_ids().len(), "Created insights engine");
        Self {
            history,
            source,
            clock,
            rules,
            store: Mutex::new(OutputStore::new(&config.retention)),
            flags: PassFlags::default(),
            memory_budget_mb: config.analytics.memory_budget_mb,
        }
    }

    /// Everything the rules look at, read once.
    pub fn snapshot(&self) -> AnalysisSnapshot {
        AnalysisSnapshot {
            now: self.clock.now(),
            performance: self.source.performance_analytics(),
            behavior: self.source.behavior_analytics(),
            health: self.source.health_analytics(),
            history: self.history.change_history(),
        }
    }

    // ============================================
    // Passes
    // ============================================

    pub fn detect_anomalies(&self) -> PassOutcome {
        let Some(_guard) = InFlight::begin(&self.flags.anomalies) else {
            tracing::debug!("Anomaly detection already running, skipping");
            return PassOutcome::Skipped;
        };
        self.cleanup();

        let snapshot = self.snapshot();
        let mut added = 0;
        for rule in self.rules.anomaly_rules() {
            if let Some(new) = rule.evaluate(&snapshot) {
                if self.add_anomaly(new).is_some() {
                    tracing::debug!(rule = rule.id(), "Anomaly rule fired");
                    added += 1;
                }
            }
        }

        tracing::info!(added, "Anomaly detection pass complete");
        PassOutcome::Completed { added }
    }

    pub fn generate_insights(&self) -> PassOutcome {
        let Some(_guard) = InFlight::begin(&self.flags.insights) else {
            tracing::debug!("Insight generation already running, skipping");
            return PassOutcome::Skipped;
        };
        self.cleanup();

        let snapshot = self.snapshot();
        let mut added = 0;
        for rule in self.rules.insight_rules() {
            if let Some(new) = rule.evaluate(&snapshot) {
                if self.add_insight(new).is_some() {
                    tracing::debug!(rule = rule.id(), "Insight rule fired");
                    added += 1;
                }
            }
        }

        tracing::info!(added, "Insight generation pass complete");
        PassOutcome::Completed { added }
    }

    pub fn generate_recommendations(&self) -> PassOutcome {
        let Some(_guard) = InFlight::begin(&self.flags.recommendations) else {
            tracing::debug!("Recommendation generation already running, skipping");
            return PassOutcome::Skipped;
        };
        self.cleanup();

        let snapshot = self.snapshot();
        let mut added = 0;
        for rule in self.rules.recommendation_rules() {
            if let Some(new) = rule.evaluate(&snapshot) {
                if self.add_recommendation(new).is_some() {
                    tracing::debug!(rule = rule.id(), "Recommendation rule fired");
                    added += 1;
                }
            }
        }

        tracing::info!(added, "Recommendation generation pass complete");
        PassOutcome::Completed { added }
    }

    /// Temporal, operation, error and workflow patterns in the change log.
    pub fn analyze_patterns(&self) -> PassOutcome {
        let Some(_guard) = InFlight::begin(&self.flags.patterns) else {
            return PassOutcome::Skipped;
        };
        self.cleanup();

        let history = self.history.change_history();
        let added = self.apply(patterns::mine_patterns(&history, self.clock.now()));
        tracing::info!(added, entries = history.len(), "Pattern analysis complete");
        PassOutcome::Completed { added }
    }

    /// Automatic assignments against the manual corrections that followed.
    pub fn analyze_table_assignments(&self) -> PassOutcome {
        let Some(_guard) = InFlight::begin(&self.flags.table_assignments) else {
            return PassOutcome::Skipped;
        };
        self.cleanup();

        let history = self.history.change_history();
        let added = self.apply(patterns::table_assignment_findings(&history));
        tracing::info!(added, "Table assignment analysis complete");
        PassOutcome::Completed { added }
    }

    /// Run every pass and analysis, then return the dashboard.
    pub async fn run_full_analysis(&self) -> AiInsightsDashboard {
        let (anomalies, insights, recommendations, patterns, tables) = tokio::join!(
            async { self.detect_anomalies() },
            async { self.generate_insights() },
            async { self.generate_recommendations() },
            async { self.analyze_patterns() },
            async { self.analyze_table_assignments() },
        );

        tracing::info!(
            anomalies = anomalies.added(),
            insights = insights.added(),
            recommendations = recommendations.added(),
            patterns = patterns.added(),
            table_assignments = tables.added(),
            "Full analysis complete"
        );
        self.dashboard()
    }

    fn apply(&self, findings: Findings) -> usize {
        let mut added = 0;
        for new in findings.anomalies {
            added += usize::from(self.add_anomaly(new).is_some());
        }
        for new in findings.insights {
            added += usize::from(self.add_insight(new).is_some());
        }
        for new in findings.recommendations {
            added += usize::from(self.add_recommendation(new).is_some());
        }
        added
    }

    // ============================================
    // Store
    // ============================================

    /// Remove expired and stale items.
    pub fn cleanup(&self) -> CleanupStats {
        let stats = self.store.lock().unwrap().cleanup(self.clock.now());
        if stats.total() > 0 {
            tracing::debug!(
                insights = stats.insights,
                anomalies = stats.anomalies,
                recommendations = stats.recommendations,
                "Cleaned up rule outputs"
            );
        }
        stats
    }

    /// Returns the new id, or `None` if a live insight has the same type and title.
    pub fn add_insight(&self, new: NewInsight) -> Option<String> {
        let title = new.title.clone();
        let id = self
            .store
            .lock()
            .unwrap()
            .add_insight(new_id(), self.clock.now(), new)?;
        tracing::info!(id = %id, title = %title, "Added insight");
        Some(id)
    }

    /// Returns the new id, or `None` if an unresolved anomaly has the same type and title.
    pub fn add_anomaly(&self, new: NewAnomaly) -> Option<String> {
        let title = new.title.clone();
        let severity = new.severity;
        let id = self
            .store
            .lock()
            .unwrap()
            .add_anomaly(new_id(), self.clock.now(), new)?;
        tracing::warn!(id = %id, title = %title, severity = severity.as_str(), "Anomaly detected");
        Some(id)
    }

    /// Returns the new id, or `None` if a pending recommendation has the same category and title.
    pub fn add_recommendation(&self, new: NewRecommendation) -> Option<String> {
        let title = new.title.clone();
        let id = self
            .store
            .lock()
            .unwrap()
            .add_recommendation(new_id(), self.clock.now(), new)?;
        tracing::info!(id = %id, title = %title, "Added recommendation");
        Some(id)
    }

    /// Mark a recommendation implemented, optionally recording its observed impact.
    ///
    /// Returns `false` (and changes nothing) for unknown ids. Calling it again
    /// with an impact records the impact measured after the first mark.
    pub fn mark_recommendation_implemented(
        &self,
        id: &str,
        impact: Option<serde_json::Value>,
    ) -> bool {
        let marked = self
            .store
            .lock()
            .unwrap()
            .mark_implemented(id, impact, self.clock.now());
        if marked {
            tracing::info!(id, "Recommendation implemented");
        } else {
            tracing::debug!(id, "No recommendation with this id");
        }
        marked
    }

    /// Returns `false` (and changes nothing) for unknown or already resolved ids.
    pub fn resolve_anomaly(&self, id: &str) -> bool {
        let resolved = self
            .store
            .lock()
            .unwrap()
            .resolve_anomaly(id, self.clock.now());
        if resolved {
            tracing::info!(id, "Anomaly resolved");
        } else {
            tracing::debug!(id, "No unresolved anomaly with this id");
        }
        resolved
    }

    /// Newest first.
    pub fn insights(&self) -> Vec<PredictiveInsight> {
        self.store.lock().unwrap().insights()
    }

    /// Newest first.
    pub fn anomalies(&self) -> Vec<AnomalyDetection> {
        self.store.lock().unwrap().anomalies()
    }

    /// Newest first.
    pub fn recommendations(&self) -> Vec<SmartRecommendation> {
        self.store.lock().unwrap().recommendations()
    }

    pub fn active_anomalies(&self) -> Vec<AnomalyDetection> {
        self.anomalies()
            .into_iter()
            .filter(|a| !a.auto_resolved)
            .collect()
    }

    pub fn pending_recommendations(&self) -> Vec<SmartRecommendation> {
        self.recommendations()
            .into_iter()
            .filter(|r| !r.implemented)
            .collect()
    }

    // ============================================
    // Dashboard
    // ============================================

    pub fn dashboard(&self) -> AiInsightsDashboard {
        let now = self.clock.now();
        let performance = self.source.performance_analytics();
        let behavior = self.source.behavior_analytics();
        let health = self.source.health_analytics();

        let (insights, anomalies, recommendations) = {
            let store = self.store.lock().unwrap();
            (store.insights(), store.anomalies(), store.recommendations())
        };

        AiInsightsDashboard {
            generated_at: now,
            insights,
            anomalies,
            recommendations,
            system_score: dashboard::system_score(
                performance.as_ref(),
                behavior.as_ref(),
                health.as_ref(),
            ),
            trends: dashboard::trends(performance.as_ref(), health.as_ref()),
            predictions: dashboard::predictions(
                performance.as_ref(),
                behavior.as_ref(),
                health.as_ref(),
                now,
                self.memory_budget_mb,
            ),
            model_confidence: MODEL_CONFIDENCE,
        }
    }

    /// Write the dashboard to `path` as pretty-printed JSON.
    pub fn export_dashboard(&self, path: &Path) -> Result<()> {
        let dashboard = self.dashboard();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&dashboard)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Exported dashboard");
        Ok(())
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::aggregate;
    use crate::analytics::{BehaviorAnalytics, HealthAnalytics, PerformanceAnalytics};
    use crate::clock::ManualClock;
    use crate::types::{
        AnomalyType, ChangeLogEntry, Effort, InsightType, PerformanceMetrics, Priority,
        RecommendationCategory, Severity, SystemHealthMetrics,
    };
    use chrono::{Duration, Utc};
    use serde_json::json;

    /// Analytics source fed directly from sample vectors.
    #[derive(Default)]
    struct FixedSource {
        performance: Mutex<Vec<PerformanceMetrics>>,
        health: Mutex<Vec<SystemHealthMetrics>>,
    }

    impl AnalyticsSource for FixedSource {
        fn performance_analytics(&self) -> Option<PerformanceAnalytics> {
            aggregate::performance_analytics(&self.performance.lock().unwrap(), Utc::now())
        }

        fn behavior_analytics(&self) -> Option<BehaviorAnalytics> {
            None
        }

        fn health_analytics(&self) -> Option<HealthAnalytics> {
            aggregate::health_analytics(&self.health.lock().unwrap())
        }
    }

    #[derive(Default)]
    struct FixedHistory(Mutex<Vec<ChangeLogEntry>>);

    impl ChangeHistory for FixedHistory {
        fn change_history(&self) -> Vec<ChangeLogEntry> {
            self.0.lock().unwrap().clone()
        }
    }

    struct Harness {
        engine: AiAnalyticsEngine,
        source: Arc<FixedSource>,
        clock: Arc<ManualClock>,
    }

    fn harness() -> Harness {
        let source = Arc::new(FixedSource::default());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = AiAnalyticsEngine::new(
            Arc::new(FixedHistory::default()),
            source.clone(),
            clock.clone(),
            &Config::default(),
        );
        Harness {
            engine,
            source,
            clock,
        }
    }

    fn perf(duration_ms: f64) -> PerformanceMetrics {
        let now = Utc::now();
        PerformanceMetrics {
            operation_id: uuid::Uuid::new_v4().to_string(),
            operation: "import_manifest".to_string(),
            start_time: now,
            end_time: now,
            duration_ms,
            success: true,
            error_type: None,
            resources_affected: 120,
            memory_usage_mb: None,
        }
    }

    fn memory(values: &[f64]) -> Vec<SystemHealthMetrics> {
        values
            .iter()
            .map(|m| SystemHealthMetrics {
                timestamp: Utc::now(),
                memory_usage: *m,
                ..Default::default()
            })
            .collect()
    }

    fn sample_insight() -> NewInsight {
        NewInsight {
            insight_type: InsightType::Behavior,
            severity: Severity::Medium,
            confidence: 64.5,
            title: "Late Dinner Demand".to_string(),
            description: "Second seating fills first".to_string(),
            prediction: "Second seating will be overbooked".to_string(),
            recommended_actions: vec!["Open a third seating".to_string()],
            timeframe: "next 3 days".to_string(),
            impact: json!({ "guests": 140 }),
            data_points: vec![1.0, 2.5, 4.0],
        }
    }

    fn sample_anomaly() -> NewAnomaly {
        let mut baseline = crate::types::MetricMap::new();
        baseline.insert("memory_usage".to_string(), 50.0);
        let mut current = crate::types::MetricMap::new();
        current.insert("memory_usage".to_string(), 180.0);
        NewAnomaly {
            anomaly_type: AnomalyType::CapacityIssue,
            severity: Severity::Medium,
            confidence: 85.0,
            title: "High Memory Usage Detected".to_string(),
            description: "Resident memory is 180MB".to_string(),
            affected_metrics: vec!["memory_usage".to_string()],
            baseline,
            current,
            deviation: 260.0,
            suggested_actions: vec!["Trim retained metric series".to_string()],
        }
    }

    fn sample_recommendation() -> NewRecommendation {
        NewRecommendation {
            category: RecommendationCategory::UserExperience,
            priority: Priority::Low,
            title: "Simplify Cabin Search".to_string(),
            description: "Cabin lookups take several clicks".to_string(),
            rationale: "Search is the most repeated action".to_string(),
            expected_benefit: "Faster check-in".to_string(),
            implementation_effort: Effort::Low,
            estimated_impact: json!({ "clicks_saved": 3 }),
            action_steps: vec!["Add a cabin number field".to_string()],
            prerequisites: vec![],
            risks: vec!["None known".to_string()],
        }
    }

    #[test]
    fn test_spike_scenario_adds_one_high_anomaly() {
        let h = harness();
        *h.source.performance.lock().unwrap() = vec![perf(2500.0); 4];

        assert_eq!(h.engine.detect_anomalies(), PassOutcome::Completed { added: 1 });
        assert_eq!(h.engine.detect_anomalies(), PassOutcome::Completed { added: 0 });

        let anomalies = h.engine.anomalies();
        assert_eq!(anomalies.len(), 1);
        let spike = &anomalies[0];
        assert_eq!(spike.anomaly_type, AnomalyType::PerformanceSpike);
        assert_eq!(spike.severity, Severity::High);
        assert_eq!(spike.current["average_duration"], 2500.0);
        assert_eq!(spike.baseline["average_duration"], 800.0);
    }

    #[test]
    fn test_memory_trend_scenario() {
        let h = harness();
        *h.source.health.lock().unwrap() = memory(&[50.0, 60.0, 70.0, 80.0, 90.0]);
        h.engine.detect_anomalies();
        h.engine.generate_insights();
        assert!(h
            .engine
            .anomalies()
            .iter()
            .any(|a| a.title == "Memory Usage Trending Upward"));
        assert!(h
            .engine
            .insights()
            .iter()
            .any(|i| i.title == "Memory Growth Forecast"));

        for series in [[70.0; 5], [90.0, 80.0, 70.0, 60.0, 50.0]] {
            let h = harness();
            *h.source.health.lock().unwrap() = memory(&series);
            h.engine.detect_anomalies();
            h.engine.generate_insights();
            assert!(h.engine.anomalies().is_empty());
            assert!(h.engine.insights().is_empty());
        }
    }

    #[test]
    fn test_dedup_law() {
        let h = harness();
        assert!(h.engine.add_anomaly(sample_anomaly()).is_some());
        assert!(h.engine.add_anomaly(sample_anomaly()).is_none());
        assert_eq!(h.engine.anomalies().len(), 1);

        assert!(h.engine.add_insight(sample_insight()).is_some());
        assert!(h.engine.add_insight(sample_insight()).is_none());
        assert_eq!(h.engine.insights().len(), 1);
    }

    #[test]
    fn test_resolve_law() {
        let h = harness();
        let id = h.engine.add_anomaly(sample_anomaly()).unwrap();

        assert!(h.engine.resolve_anomaly(&id));
        let resolved = &h.engine.anomalies()[0];
        assert!(resolved.auto_resolved);
        assert_eq!(resolved.resolved_at, Some(h.clock.now()));

        h.clock.advance(Duration::minutes(5));
        assert!(!h.engine.resolve_anomaly(&id));
        assert!(!h.engine.resolve_anomaly("no-such-id"));
        let anomalies = h.engine.anomalies();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].resolved_at, resolved.resolved_at);
        assert!(h.engine.active_anomalies().is_empty());
    }

    #[test]
    fn test_expiry_law() {
        let h = harness();
        h.engine.add_insight(sample_insight()).unwrap();
        h.clock.advance(Duration::hours(25));

        assert_eq!(h.engine.generate_insights(), PassOutcome::Completed { added: 0 });
        assert!(h.engine.insights().is_empty());
        assert!(h.engine.dashboard().insights.is_empty());
    }

    #[test]
    fn test_implement_scenario() {
        let h = harness();
        let id = h.engine.add_recommendation(sample_recommendation()).unwrap();

        assert!(h
            .engine
            .mark_recommendation_implemented(&id, Some(json!({ "success": true }))));
        let rec = &h.engine.recommendations()[0];
        assert!(rec.implemented);
        assert!(rec.implemented_at.is_some());
        assert_eq!(rec.actual_impact.as_ref().unwrap()["success"], true);

        assert!(h.engine.pending_recommendations().is_empty());
        assert_eq!(h.engine.dashboard().pending_recommendations().count(), 0);
        assert!(!h.engine.mark_recommendation_implemented("missing", None));
    }

    #[test]
    fn test_measured_impact_after_implementing() {
        let h = harness();
        let id = h.engine.add_recommendation(sample_recommendation()).unwrap();
        assert!(h.engine.mark_recommendation_implemented(&id, None));

        h.clock.advance(Duration::days(1));
        assert!(h
            .engine
            .mark_recommendation_implemented(&id, Some(json!({ "success": true }))));
        let rec = &h.engine.recommendations()[0];
        assert_eq!(rec.actual_impact, Some(json!({ "success": true })));
        assert_eq!(rec.implemented_at, Some(h.clock.now()));
    }

    #[test]
    fn test_fields_round_trip() {
        let h = harness();
        let insight = sample_insight();
        let anomaly = sample_anomaly();
        let recommendation = sample_recommendation();

        h.engine.add_insight(insight.clone()).unwrap();
        h.engine.add_anomaly(anomaly.clone()).unwrap();
        h.engine.add_recommendation(recommendation.clone()).unwrap();

        let stored = &h.engine.insights()[0];
        let now = h.clock.now();
        assert_eq!(
            *stored,
            PredictiveInsight::from_new(stored.id.clone(), now, now + Duration::hours(24), insight)
        );

        let stored = &h.engine.anomalies()[0];
        assert_eq!(*stored, AnomalyDetection::from_new(stored.id.clone(), now, anomaly));

        let stored = &h.engine.recommendations()[0];
        assert_eq!(
            *stored,
            SmartRecommendation::from_new(
                stored.id.clone(),
                now,
                now + Duration::days(7),
                recommendation
            )
        );
    }

    #[test]
    fn test_dashboard_is_idempotent() {
        let h = harness();
        h.engine.add_insight(sample_insight());
        h.engine.add_anomaly(sample_anomaly());
        h.clock.advance(Duration::seconds(1));
        h.engine.add_recommendation(sample_recommendation());

        let first = h.engine.dashboard();
        let second = h.engine.dashboard();
        assert_eq!(first, second);
        assert_eq!(first.system_score, 100.0);
        assert_eq!(first.model_confidence, MODEL_CONFIDENCE);
    }

    #[test]
    fn test_collections_newest_first() {
        let h = harness();
        let older = h.engine.add_insight(sample_insight()).unwrap();
        h.clock.advance(Duration::seconds(1));
        let mut other = sample_insight();
        other.title = "Early Breakfast Demand".to_string();
        let newer = h.engine.add_insight(other).unwrap();

        let ids: Vec<String> = h.engine.dashboard().insights.into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![newer, older]);
    }

    #[test]
    fn test_pass_skipped_while_in_flight() {
        let h = harness();
        let _guard = InFlight::begin(&h.engine.flags.anomalies).unwrap();
        assert_eq!(h.engine.detect_anomalies(), PassOutcome::Skipped);
        assert_eq!(h.engine.generate_insights(), PassOutcome::Completed { added: 0 });
    }

    #[test]
    fn test_guard_released_after_pass() {
        let h = harness();
        h.engine.detect_anomalies();
        assert!(!h.engine.flags.anomalies.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_full_analysis_runs_every_pass() {
        let h = harness();
        *h.source.performance.lock().unwrap() = vec![perf(2500.0); 4];
        *h.source.health.lock().unwrap() = memory(&[50.0, 60.0, 70.0, 80.0, 90.0]);

        let dashboard = h.engine.run_full_analysis().await;
        assert!(dashboard
            .anomalies
            .iter()
            .any(|a| a.anomaly_type == AnomalyType::PerformanceSpike));
        assert!(dashboard
            .insights
            .iter()
            .any(|i| i.title == "Memory Growth Forecast"));
        // average duration 2500ms triggers the response time recommendation
        assert!(dashboard
            .recommendations
            .iter()
            .any(|r| r.title == "Improve Operation Response Times"));
    }

    #[test]
    fn test_export_dashboard_writes_json() {
        let h = harness();
        h.engine.add_anomaly(sample_anomaly());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports").join("dashboard.json");

        h.engine.export_dashboard(&path).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["anomalies"][0]["title"], "High Memory Usage Detected");
        assert_eq!(written["model_confidence"]["anomaly_detection"], 87.5);
    }
}
