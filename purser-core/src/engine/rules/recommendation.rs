//! Built-in recommendation rules.
//!
//! The table and reset rules count change log operations over the trailing
//! 24 hours; the rest read the aggregated metrics.

use super::{AnalysisSnapshot, FnRule, RecommendationRule};
use crate::types::{Effort, NewRecommendation, Priority, RecommendationCategory};
use chrono::Duration;
use serde_json::json;

const REASSIGNMENT_THRESHOLD: usize = 20;
const REASSIGNMENT_HIGH: usize = 50;
const CLEAR_ALL_THRESHOLD: usize = 2;
const SLOW_AVERAGE_MS: f64 = 1000.0;
const VERY_SLOW_AVERAGE_MS: f64 = 2000.0;
const ERROR_PATH_COUNT: usize = 3;
const LOW_HEALTH_SCORE: f64 = 60.0;
const CRITICAL_HEALTH_SCORE: f64 = 30.0;

pub fn builtin() -> Vec<RecommendationRule> {
    vec![
        Box::new(FnRule::new("recommendation.table_strategy", table_strategy)),
        Box::new(FnRule::new("recommendation.data_resets", data_resets)),
        Box::new(FnRule::new("recommendation.response_times", response_times)),
        Box::new(FnRule::new("recommendation.error_paths", error_paths)),
        Box::new(FnRule::new("recommendation.capacity", capacity)),
    ]
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn table_strategy(snapshot: &AnalysisSnapshot) -> Option<NewRecommendation> {
    let reassignments = snapshot
        .history_within(Duration::hours(24))
        .filter(|e| e.is_table_reassignment())
        .count();
    if reassignments <= REASSIGNMENT_THRESHOLD {
        return None;
    }

    Some(NewRecommendation {
        category: RecommendationCategory::TableAssignment,
        priority: if reassignments > REASSIGNMENT_HIGH {
            Priority::High
        } else {
            Priority::Medium
        },
        title: "Optimize Table Assignment Strategy".to_string(),
        description: format!(
            "{} table reassignments were made in the last 24 hours",
            reassignments
        ),
        rationale: "Frequent reassignments suggest the initial seating plan does not match guest preferences".to_string(),
        expected_benefit: "Fewer manual moves and a more stable dining plan".to_string(),
        implementation_effort: Effort::Medium,
        estimated_impact: json!({ "reassignments_24h": reassignments, "expected_reduction_pct": 40 }),
        action_steps: strings(&[
            "Group travel parties before the first assignment run",
            "Collect dining time preferences at check-in",
            "Review the tables with the most moves",
        ]),
        prerequisites: strings(&["Guest preference data available"]),
        risks: strings(&["Initial assignment may take longer"]),
    })
}

pub fn data_resets(snapshot: &AnalysisSnapshot) -> Option<NewRecommendation> {
    let resets = snapshot
        .history_within(Duration::hours(24))
        .filter(|e| e.is_clear_all())
        .count();
    if resets <= CLEAR_ALL_THRESHOLD {
        return None;
    }

    Some(NewRecommendation {
        category: RecommendationCategory::SystemOptimization,
        priority: Priority::High,
        title: "Investigate Frequent Data Resets".to_string(),
        description: format!("All assignments were cleared {} times in the last 24 hours", resets),
        rationale: "Repeated clear-all operations usually indicate a broken import or assignment workflow".to_string(),
        expected_benefit: "Less rework and no loss of confirmed seating".to_string(),
        implementation_effort: Effort::Low,
        estimated_impact: json!({ "resets_24h": resets }),
        action_steps: strings(&[
            "Ask the crew why the reset was needed",
            "Export a backup before every clear-all",
            "Fix the step that forces the reset",
        ]),
        prerequisites: vec![],
        risks: strings(&["Root cause may be outside the seating tool"]),
    })
}

pub fn response_times(snapshot: &AnalysisSnapshot) -> Option<NewRecommendation> {
    let perf = snapshot.performance.as_ref()?;
    if perf.average_duration <= SLOW_AVERAGE_MS {
        return None;
    }
    let slowest = perf
        .slowest_operations
        .first()
        .map(|s| s.operation.clone())
        .unwrap_or_default();

    Some(NewRecommendation {
        category: RecommendationCategory::Performance,
        priority: if perf.average_duration > VERY_SLOW_AVERAGE_MS {
            Priority::High
        } else {
            Priority::Medium
        },
        title: "Improve Operation Response Times".to_string(),
        description: format!(
            "Operations take {:.0}ms on average; the slowest is {}",
            perf.average_duration, slowest
        ),
        rationale: "Slow saves make crew members repeat actions and create duplicate changes".to_string(),
        expected_benefit: "Faster guest updates at the desk".to_string(),
        implementation_effort: Effort::Medium,
        estimated_impact: json!({ "average_duration_ms": perf.average_duration, "slowest_operation": slowest }),
        action_steps: strings(&[
            "Batch guest updates during imports",
            "Paginate large guest lists",
        ]),
        prerequisites: vec![],
        risks: strings(&["Batching delays individual confirmations"]),
    })
}

pub fn error_paths(snapshot: &AnalysisSnapshot) -> Option<NewRecommendation> {
    let path = snapshot.behavior.as_ref()?.error_prone_paths.first()?;
    if path.count < ERROR_PATH_COUNT {
        return None;
    }

    Some(NewRecommendation {
        category: RecommendationCategory::UserExperience,
        priority: Priority::Medium,
        title: "Streamline Error-Prone Workflow".to_string(),
        description: format!("The path \"{}\" ended in an error {} times", path.path, path.count),
        rationale: "Users repeatedly hit errors on the same sequence of steps".to_string(),
        expected_benefit: "Fewer failed edits and support requests".to_string(),
        implementation_effort: Effort::Low,
        estimated_impact: json!({ "path": path.path, "errors": path.count }),
        action_steps: strings(&[
            "Add inline validation to the last step of the path",
            "Show clearer error messages",
        ]),
        prerequisites: vec![],
        risks: vec![],
    })
}

pub fn capacity(snapshot: &AnalysisSnapshot) -> Option<NewRecommendation> {
    let score = snapshot.health.as_ref()?.performance_score;
    if score >= LOW_HEALTH_SCORE {
        return None;
    }

    Some(NewRecommendation {
        category: RecommendationCategory::CapacityPlanning,
        priority: if score < CRITICAL_HEALTH_SCORE {
            Priority::Urgent
        } else {
            Priority::High
        },
        title: "Review System Capacity".to_string(),
        description: format!("The system health score dropped to {:.0}", score),
        rationale: "Error rate, response time and memory together indicate the system is overloaded".to_string(),
        expected_benefit: "Stable performance during embarkation peaks".to_string(),
        implementation_effort: Effort::High,
        estimated_impact: json!({ "health_score": score }),
        action_steps: strings(&[
            "Lower retention limits for metric series",
            "Move imports outside peak hours",
            "Provision more memory for the host",
        ]),
        prerequisites: strings(&["Access to host configuration"]),
        risks: strings(&["Shorter retention reduces trend accuracy"]),
    })
}
