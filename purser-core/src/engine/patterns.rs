//! Change log pattern mining, run as part of a full analysis.
//!
//! Unlike the registered rules these analyses may emit several items of
//! different kinds at once, so they return [`Findings`] instead of a single
//! `Option`.

use crate::types::{
    AnomalyType, ChangeLogEntry, ChangeMethod, Effort, InsightType, MetricMap, NewAnomaly,
    NewInsight, NewRecommendation, Priority, RecommendationCategory, Severity,
};
use chrono::{DateTime, Duration, Timelike, Utc};
use serde_json::json;
use std::collections::HashMap;

const MIN_ENTRIES: usize = 10;
const CONCENTRATION_SHARE: f64 = 40.0;
const DOMINANT_SHARE: f64 = 50.0;
const SYSTEM_ERROR_COUNT: usize = 5;
const SYSTEM_ERROR_HIGH: usize = 10;
const BULK_SHARE: f64 = 30.0;
const MANUAL_FIX_RATIO: f64 = 0.5;
const MANUAL_FIX_HIGH: f64 = 1.0;

/// Items produced by one analysis.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Findings {
    pub insights: Vec<NewInsight>,
    pub anomalies: Vec<NewAnomaly>,
    pub recommendations: Vec<NewRecommendation>,
}

impl Findings {
    pub fn is_empty(&self) -> bool {
        self.insights.is_empty() && self.anomalies.is_empty() && self.recommendations.is_empty()
    }
}

fn share(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Most frequent key, ties broken by the smaller key.
fn busiest<K: Ord + Copy>(counts: &HashMap<K, usize>) -> Option<(K, usize)> {
    counts
        .iter()
        .map(|(k, c)| (*k, *c))
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
}

/// Temporal, operation, error and workflow patterns over the change log.
pub fn mine_patterns(history: &[ChangeLogEntry], now: DateTime<Utc>) -> Findings {
    let mut findings = Findings::default();

    let week: Vec<&ChangeLogEntry> = history
        .iter()
        .filter(|e| e.timestamp >= now - Duration::days(7))
        .collect();
    if week.len() >= MIN_ENTRIES {
        let mut by_hour: HashMap<u32, usize> = HashMap::new();
        for entry in &week {
            *by_hour.entry(entry.timestamp.hour()).or_default() += 1;
        }
        if let Some((hour, count)) = busiest(&by_hour) {
            let pct = share(count, week.len());
            if pct >= CONCENTRATION_SHARE {
                findings.insights.push(NewInsight {
                    insight_type: InsightType::Behavior,
                    severity: Severity::Low,
                    confidence: 80.0,
                    title: "Concentrated Activity Window".to_string(),
                    description: format!(
                        "{:.0}% of this week's changes were made during the {:02}:00 UTC hour",
                        pct, hour
                    ),
                    prediction: format!("Most changes will keep landing around {:02}:00 UTC", hour),
                    recommended_actions: vec![
                        "Schedule imports and resets outside this hour".to_string(),
                    ],
                    timeframe: "this week".to_string(),
                    impact: json!({ "hour": hour, "share": pct, "changes": count }),
                    data_points: vec![count as f64, week.len() as f64],
                });
            }
        }
    }

    if history.len() >= MIN_ENTRIES {
        let mut by_operation: HashMap<&str, usize> = HashMap::new();
        for entry in history {
            *by_operation.entry(entry.operation.as_str()).or_default() += 1;
        }
        if let Some((operation, count)) = busiest(&by_operation) {
            let pct = share(count, history.len());
            if pct > DOMINANT_SHARE {
                findings.insights.push(NewInsight {
                    insight_type: InsightType::Optimization,
                    severity: Severity::Low,
                    confidence: 84.0,
                    title: "Dominant Operation Detected".to_string(),
                    description: format!(
                        "{} accounts for {:.0}% of recorded changes",
                        operation, pct
                    ),
                    prediction: format!("{} will remain the main source of changes", operation),
                    recommended_actions: vec![format!("Add a shortcut or bulk form for {}", operation)],
                    timeframe: "ongoing".to_string(),
                    impact: json!({ "operation": operation, "share": pct }),
                    data_points: vec![count as f64],
                });
            }
        }

        let bulk = history
            .iter()
            .filter(|e| matches!(e.method, ChangeMethod::Bulk | ChangeMethod::Import))
            .count();
        let pct = share(bulk, history.len());
        if pct >= BULK_SHARE {
            findings.insights.push(NewInsight {
                insight_type: InsightType::Behavior,
                severity: Severity::Low,
                confidence: 76.0,
                title: "Bulk Workflow Preference".to_string(),
                description: format!("{:.0}% of changes arrive through bulk edits or imports", pct),
                prediction: "Manifest updates will keep arriving in batches".to_string(),
                recommended_actions: vec![
                    "Validate import files before applying them".to_string(),
                    "Keep a backup before each bulk operation".to_string(),
                ],
                timeframe: "this voyage".to_string(),
                impact: json!({ "bulk_share": pct, "bulk_changes": bulk }),
                data_points: vec![pct],
            });
        }
    }

    let errors = history
        .iter()
        .filter(|e| e.timestamp >= now - Duration::hours(24) && e.is_error())
        .count();
    if errors >= SYSTEM_ERROR_COUNT {
        let threshold = SYSTEM_ERROR_COUNT as f64;
        let mut baseline = MetricMap::new();
        baseline.insert("error_entries_24h".to_string(), threshold);
        let mut current = MetricMap::new();
        current.insert("error_entries_24h".to_string(), errors as f64);

        findings.anomalies.push(NewAnomaly {
            anomaly_type: AnomalyType::ErrorBurst,
            severity: if errors >= SYSTEM_ERROR_HIGH {
                Severity::High
            } else {
                Severity::Medium
            },
            confidence: 83.0,
            title: "Repeated System Errors".to_string(),
            description: format!("{} failed changes were logged in the last 24 hours", errors),
            affected_metrics: vec!["error_entries_24h".to_string()],
            baseline,
            current,
            deviation: (errors as f64 - threshold) / threshold * 100.0,
            suggested_actions: vec![
                "Read the error details of the latest failed changes".to_string(),
                "Check the import files that triggered them".to_string(),
            ],
        });
    }

    findings
}

/// Compare automatic assignments with the manual table changes made after
/// the first of them.
pub fn table_assignment_findings(history: &[ChangeLogEntry]) -> Findings {
    let mut findings = Findings::default();

    let auto: Vec<&ChangeLogEntry> = history.iter().filter(|e| e.is_auto_assignment()).collect();
    let Some(first_auto) = auto.iter().map(|e| e.timestamp).min() else {
        return findings;
    };
    let manual = history
        .iter()
        .filter(|e| e.timestamp > first_auto && e.is_manual_table_change())
        .count();

    let ratio = manual as f64 / auto.len() as f64;
    let accuracy = (100.0 - ratio * 100.0).clamp(0.0, 100.0);

    findings.insights.push(NewInsight {
        insight_type: InsightType::Optimization,
        severity: if ratio > MANUAL_FIX_RATIO {
            Severity::Medium
        } else {
            Severity::Low
        },
        confidence: 79.0,
        title: "Auto-Assignment Accuracy".to_string(),
        description: format!(
            "{} manual table changes followed {} automatic assignments",
            manual,
            auto.len()
        ),
        prediction: format!("About {:.0}% of automatic seatings will be kept as is", accuracy),
        recommended_actions: vec!["Review which tables are changed by hand most often".to_string()],
        timeframe: "this voyage".to_string(),
        impact: json!({ "auto_assignments": auto.len(), "manual_adjustments": manual, "accuracy": accuracy }),
        data_points: vec![auto.len() as f64, manual as f64],
    });

    if ratio > MANUAL_FIX_RATIO {
        findings.recommendations.push(NewRecommendation {
            category: RecommendationCategory::TableAssignment,
            priority: if ratio > MANUAL_FIX_HIGH {
                Priority::High
            } else {
                Priority::Medium
            },
            title: "Refine Auto-Assignment Rules".to_string(),
            description: format!(
                "Crew corrected automatic seating {:.1} times per assignment run",
                ratio
            ),
            rationale: "Frequent manual corrections mean the assignment rules miss guest constraints".to_string(),
            expected_benefit: "Fewer manual corrections after each assignment run".to_string(),
            implementation_effort: Effort::Medium,
            estimated_impact: json!({ "manual_fix_ratio": ratio, "accuracy": accuracy }),
            action_steps: vec![
                "Keep travel parties together when assigning".to_string(),
                "Respect dining time preferences".to_string(),
                "Compare corrected tables against the original run".to_string(),
            ],
            prerequisites: vec!["Guest party and preference data".to_string()],
            risks: vec!["Stricter rules may leave some guests unassigned".to_string()],
        });
    }

    findings
}
