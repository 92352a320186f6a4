//! Bounded collections of rule outputs.
//!
//! Items are held oldest first so the caps can trim from the front; the
//! getters hand them out newest first.

use crate::config::RetentionConfig;
use crate::types::{
    AnomalyDetection, NewAnomaly, NewInsight, NewRecommendation, PredictiveInsight,
    SmartRecommendation,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Lifetime of an insight, in hours.
pub const INSIGHT_TTL_HOURS: i64 = 24;
/// Validity of a recommendation, in days.
pub const RECOMMENDATION_TTL_DAYS: i64 = 7;
/// Age in hours after which a resolved anomaly is purged.
pub const RESOLVED_ANOMALY_TTL_HOURS: i64 = 24;

/// Identity used to suppress repeated rule outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupKey<'a> {
    pub kind: &'a str,
    pub title: &'a str,
}

/// The one place two outputs are compared for duplication.
pub fn is_duplicate(a: DedupKey<'_>, b: DedupKey<'_>) -> bool {
    a == b
}

pub trait Deduplicate {
    fn dedup_key(&self) -> DedupKey<'_>;
}

impl Deduplicate for NewInsight {
    fn dedup_key(&self) -> DedupKey<'_> {
        DedupKey {
            kind: self.insight_type.as_str(),
            title: &self.title,
        }
    }
}

impl Deduplicate for PredictiveInsight {
    fn dedup_key(&self) -> DedupKey<'_> {
        DedupKey {
            kind: self.insight_type.as_str(),
            title: &self.title,
        }
    }
}

impl Deduplicate for NewAnomaly {
    fn dedup_key(&self) -> DedupKey<'_> {
        DedupKey {
            kind: self.anomaly_type.as_str(),
            title: &self.title,
        }
    }
}

impl Deduplicate for AnomalyDetection {
    fn dedup_key(&self) -> DedupKey<'_> {
        DedupKey {
            kind: self.anomaly_type.as_str(),
            title: &self.title,
        }
    }
}

impl Deduplicate for NewRecommendation {
    fn dedup_key(&self) -> DedupKey<'_> {
        DedupKey {
            kind: self.category.as_str(),
            title: &self.title,
        }
    }
}

impl Deduplicate for SmartRecommendation {
    fn dedup_key(&self) -> DedupKey<'_> {
        DedupKey {
            kind: self.category.as_str(),
            title: &self.title,
        }
    }
}

/// Counts of items removed by one cleanup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub insights: usize,
    pub anomalies: usize,
    pub recommendations: usize,
}

impl CleanupStats {
    pub fn total(&self) -> usize {
        self.insights + self.anomalies + self.recommendations
    }
}

pub struct OutputStore {
    insights: VecDeque<PredictiveInsight>,
    anomalies: VecDeque<AnomalyDetection>,
    recommendations: VecDeque<SmartRecommendation>,
    insight_cap: usize,
    anomaly_cap: usize,
    recommendation_cap: usize,
}

impl OutputStore {
    pub fn new(retention: &RetentionConfig) -> Self {
        Self {
            insights: VecDeque::new(),
            anomalies: VecDeque::new(),
            recommendations: VecDeque::new(),
            insight_cap: retention.insights.max(1),
            anomaly_cap: retention.anomalies.max(1),
            recommendation_cap: retention.recommendations.max(1),
        }
    }

    /// Add unless a live insight has the same key.
    ///
    /// Each add purges expired items first, so a lapsed output never blocks
    /// its successor.
    pub fn add_insight(&mut self, id: String, now: DateTime<Utc>, new: NewInsight) -> Option<String> {
        self.cleanup(now);
        let key = new.dedup_key();
        if self.insights.iter().any(|i| is_duplicate(i.dedup_key(), key)) {
            return None;
        }

        let expires_at = now + Duration::hours(INSIGHT_TTL_HOURS);
        let insight = PredictiveInsight::from_new(id.clone(), now, expires_at, new);
        self.insights.push_back(insight);
        trim(&mut self.insights, self.insight_cap);
        Some(id)
    }

    /// Add unless an unresolved anomaly has the same key.
    pub fn add_anomaly(&mut self, id: String, now: DateTime<Utc>, new: NewAnomaly) -> Option<String> {
        self.cleanup(now);
        let key = new.dedup_key();
        if self
            .anomalies
            .iter()
            .any(|a| !a.auto_resolved && is_duplicate(a.dedup_key(), key))
        {
            return None;
        }

        self.anomalies.push_back(AnomalyDetection::from_new(id.clone(), now, new));
        trim(&mut self.anomalies, self.anomaly_cap);
        Some(id)
    }

    /// Add unless a pending recommendation has the same key.
    pub fn add_recommendation(
        &mut self,
        id: String,
        now: DateTime<Utc>,
        new: NewRecommendation,
    ) -> Option<String> {
        self.cleanup(now);
        let key = new.dedup_key();
        if self
            .recommendations
            .iter()
            .any(|r| !r.implemented && is_duplicate(r.dedup_key(), key))
        {
            return None;
        }

        let valid_until = now + Duration::days(RECOMMENDATION_TTL_DAYS);
        let recommendation = SmartRecommendation::from_new(id.clone(), now, valid_until, new);
        self.recommendations.push_back(recommendation);
        trim(&mut self.recommendations, self.recommendation_cap);
        Some(id)
    }

    /// Drop expired insights, old resolved anomalies and lapsed recommendations.
    pub fn cleanup(&mut self, now: DateTime<Utc>) -> CleanupStats {
        let before = (self.insights.len(), self.anomalies.len(), self.recommendations.len());

        self.insights.retain(|i| i.expires_at > now);
        let anomaly_ttl = Duration::hours(RESOLVED_ANOMALY_TTL_HOURS);
        self.anomalies
            .retain(|a| !(a.auto_resolved && now - a.detected_at > anomaly_ttl));
        self.recommendations.retain(|r| r.valid_until > now);

        CleanupStats {
            insights: before.0 - self.insights.len(),
            anomalies: before.1 - self.anomalies.len(),
            recommendations: before.2 - self.recommendations.len(),
        }
    }

    /// Returns `false` for unknown or already resolved ids.
    pub fn resolve_anomaly(&mut self, id: &str, now: DateTime<Utc>) -> bool {
        match self.anomalies.iter_mut().find(|a| a.id == id) {
            Some(anomaly) if !anomaly.auto_resolved => {
                anomaly.auto_resolved = true;
                anomaly.resolved_at = Some(now);
                true
            }
            _ => false,
        }
    }

    /// Returns `false` for unknown ids.
    ///
    /// Marking an implemented recommendation again refreshes `implemented_at`
    /// and replaces `actual_impact` when one is given.
    pub fn mark_implemented(
        &mut self,
        id: &str,
        impact: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(rec) = self.recommendations.iter_mut().find(|r| r.id == id) else {
            return false;
        };
        rec.implemented = true;
        rec.implemented_at = Some(now);
        if impact.is_some() {
            rec.actual_impact = impact;
        }
        true
    }

    pub fn insights(&self) -> Vec<PredictiveInsight> {
        self.insights.iter().rev().cloned().collect()
    }

    pub fn anomalies(&self) -> Vec<AnomalyDetection> {
        self.anomalies.iter().rev().cloned().collect()
    }

    pub fn recommendations(&self) -> Vec<SmartRecommendation> {
        self.recommendations.iter().rev().cloned().collect()
    }
}

fn trim<T>(items: &mut VecDeque<T>, cap: usize) {
    while items.len() > cap {
        items.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnomalyType, Effort, InsightType, Priority, RecommendationCategory, Severity};
    use serde_json::json;

    fn insight(title: &str) -> NewInsight {
        NewInsight {
            insight_type: InsightType::System,
            severity: Severity::Low,
            confidence: 50.0,
            title: title.to_string(),
            description: String::new(),
            prediction: String::new(),
            recommended_actions: vec![],
            timeframe: "today".to_string(),
            impact: serde_json::json!({}),
            data_points: vec![],
        }
    }

    fn anomaly(title: &str) -> NewAnomaly {
        NewAnomaly {
            anomaly_type: AnomalyType::CapacityIssue,
            severity: Severity::Medium,
            confidence: 80.0,
            title: title.to_string(),
            description: String::new(),
            affected_metrics: vec![],
            baseline: Default::default(),
            current: Default::default(),
            deviation: 0.0,
            suggested_actions: vec![],
        }
    }

    fn recommendation(title: &str) -> NewRecommendation {
        NewRecommendation {
            category: RecommendationCategory::Performance,
            priority: Priority::Low,
            title: title.to_string(),
            description: String::new(),
            rationale: String::new(),
            expected_benefit: String::new(),
            implementation_effort: Effort::Low,
            estimated_impact: serde_json::json!({}),
            action_steps: vec![],
            prerequisites: vec![],
            risks: vec![],
        }
    }

    fn store() -> OutputStore {
        OutputStore::new(&RetentionConfig::default())
    }

    #[test]
    fn test_dedup_key_compares_kind_and_title() {
        let a = DedupKey { kind: "system", title: "Memory" };
        assert!(is_duplicate(a, DedupKey { kind: "system", title: "Memory" }));
        assert!(!is_duplicate(a, DedupKey { kind: "behavior", title: "Memory" }));
        assert!(!is_duplicate(a, DedupKey { kind: "system", title: "memory" }));
    }

    #[test]
    fn test_resolved_anomaly_no_longer_blocks() {
        let mut store = store();
        let now = Utc::now();
        let id = store.add_anomaly("a1".into(), now, anomaly("High Memory Usage Detected")).unwrap();
        assert!(store.add_anomaly("a2".into(), now, anomaly("High Memory Usage Detected")).is_none());

        assert!(store.resolve_anomaly(&id, now));
        assert!(!store.resolve_anomaly(&id, now));
        assert!(store.add_anomaly("a3".into(), now, anomaly("High Memory Usage Detected")).is_some());
        assert_eq!(store.anomalies().len(), 2);
    }

    #[test]
    fn test_implemented_recommendation_no_longer_blocks() {
        let mut store = store();
        let now = Utc::now();
        store.add_recommendation("r1".into(), now, recommendation("Cache")).unwrap();
        assert!(store.add_recommendation("r2".into(), now, recommendation("Cache")).is_none());
        assert!(store.mark_implemented("r1", None, now));
        assert!(!store.mark_implemented("missing", None, now));
        assert!(store.add_recommendation("r3".into(), now, recommendation("Cache")).is_some());
    }

    #[test]
    fn test_impact_recorded_after_first_mark() {
        let mut store = store();
        let now = Utc::now();
        store.add_recommendation("r1".into(), now, recommendation("Cache")).unwrap();

        assert!(store.mark_implemented("r1", None, now));
        assert!(store.recommendations()[0].actual_impact.is_none());

        let later = now + Duration::hours(2);
        assert!(store.mark_implemented("r1", Some(json!({ "success": true })), later));
        let rec = &store.recommendations()[0];
        assert!(rec.implemented);
        assert_eq!(rec.implemented_at, Some(later));
        assert_eq!(rec.actual_impact, Some(json!({ "success": true })));

        // A bare re-mark keeps the recorded impact
        assert!(store.mark_implemented("r1", None, later));
        assert_eq!(store.recommendations()[0].actual_impact, Some(json!({ "success": true })));
    }

    #[test]
    fn test_expired_outputs_do_not_block_new_ones() {
        let mut store = store();
        let now = Utc::now();
        store.add_insight("i1".into(), now, insight("Memory")).unwrap();
        store.add_recommendation("r1".into(), now, recommendation("Cache")).unwrap();

        let later = now + Duration::hours(25);
        assert_eq!(store.add_insight("i2".into(), later, insight("Memory")), Some("i2".to_string()));
        let ids: Vec<String> = store.insights().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["i2".to_string()]);

        let next_week = now + Duration::days(8);
        assert!(store.add_recommendation("r2".into(), next_week, recommendation("Cache")).is_some());
        assert_eq!(store.recommendations().len(), 1);
    }

    #[test]
    fn test_caps_drop_oldest() {
        let mut store = store();
        let now = Utc::now();
        for i in 0..55 {
            store.add_insight(format!("i{}", i), now, insight(&format!("Insight {}", i)));
        }
        let insights = store.insights();
        assert_eq!(insights.len(), 50);
        assert_eq!(insights[0].id, "i54");
        assert_eq!(insights[49].id, "i5");
    }

    #[test]
    fn test_cleanup_expiry_rules() {
        let mut store = store();
        let t0 = Utc::now();
        store.add_insight("i1".into(), t0, insight("Short lived")).unwrap();
        store.add_anomaly("open".into(), t0, anomaly("Open")).unwrap();
        store.add_anomaly("closed".into(), t0, anomaly("Closed")).unwrap();
        store.add_recommendation("r1".into(), t0, recommendation("Weekly")).unwrap();
        store.resolve_anomaly("closed", t0);

        assert_eq!(store.cleanup(t0 + Duration::hours(1)).total(), 0);

        let stats = store.cleanup(t0 + Duration::hours(25));
        assert_eq!(stats.insights, 1);
        assert_eq!(stats.anomalies, 1);
        assert_eq!(stats.recommendations, 0);
        assert_eq!(store.anomalies()[0].id, "open");

        let stats = store.cleanup(t0 + Duration::days(8));
        assert_eq!(stats.recommendations, 1);
        assert!(store.recommendations().is_empty());
    }
}
