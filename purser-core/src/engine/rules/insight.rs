//! Built-in insight rules: trend and forecast heuristics.

use super::{AnalysisSnapshot, FnRule, InsightRule};
use crate::analytics::{aggregate, trend_direction};
use crate::types::{DeviceClass, InsightType, NewInsight, Severity};
use serde_json::json;

const TREND_WINDOW: usize = 5;
const TREND_MIN_SAMPLES: usize = 3;
const RISING_TREND: f64 = 50.0;

const SLOW_HOUR_MS: f64 = 1000.0;
const PEAK_MIN_INTERACTIONS: usize = 10;
const RECURRING_ERROR_COUNT: usize = 3;
const RECURRING_ERROR_HIGH: usize = 10;
const MOBILE_SHARE_THRESHOLD: f64 = 50.0;

pub fn builtin() -> Vec<InsightRule> {
    vec![
        Box::new(FnRule::new("insight.performance_degradation", performance_degradation)),
        Box::new(FnRule::new("insight.memory_growth", memory_growth)),
        Box::new(FnRule::new("insight.peak_usage", peak_usage)),
        Box::new(FnRule::new("insight.recurring_errors", recurring_errors)),
        Box::new(FnRule::new("insight.rising_load", rising_load)),
        Box::new(FnRule::new("insight.mobile_usage", mobile_usage)),
    ]
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn performance_degradation(snapshot: &AnalysisSnapshot) -> Option<NewInsight> {
    let perf = snapshot.performance.as_ref()?;
    let durations: Vec<f64> = aggregate::tail(&perf.hourly_trends, TREND_WINDOW)
        .iter()
        .map(|h| h.average_duration)
        .collect();
    if durations.len() < TREND_MIN_SAMPLES {
        return None;
    }
    let trend = trend_direction(&durations);
    if trend <= RISING_TREND {
        return None;
    }
    let latest = *durations.last()?;

    Some(NewInsight {
        insight_type: InsightType::Performance,
        severity: if latest > SLOW_HOUR_MS {
            Severity::High
        } else {
            Severity::Medium
        },
        confidence: 78.0,
        title: "Performance Degradation Predicted".to_string(),
        description: format!(
            "Hourly operation durations have risen in {:.0}% of recent intervals",
            trend
        ),
        prediction: format!(
            "Average duration is likely to exceed {:.0}ms within the next few hours",
            latest * 1.2
        ),
        recommended_actions: strings(&[
            "Schedule bulk imports outside embarkation hours",
            "Review the slowest operation types",
        ]),
        timeframe: "next 2-4 hours".to_string(),
        impact: json!({ "metric": "average_duration", "trend_direction": trend, "latest_ms": latest }),
        data_points: durations,
    })
}

pub fn memory_growth(snapshot: &AnalysisSnapshot) -> Option<NewInsight> {
    let memory = snapshot.health_series(TREND_WINDOW, |s| s.memory_usage);
    if memory.len() < TREND_MIN_SAMPLES {
        return None;
    }
    let trend = trend_direction(&memory);
    if trend <= RISING_TREND {
        return None;
    }

    let first = memory[0];
    let last = memory[memory.len() - 1];
    let step = (last - first) / (memory.len() - 1) as f64;

    Some(NewInsight {
        insight_type: InsightType::System,
        severity: Severity::Medium,
        confidence: 74.0,
        title: "Memory Growth Forecast".to_string(),
        description: format!(
            "Memory grew from {:.1}MB to {:.1}MB across the last {} snapshots",
            first,
            last,
            memory.len()
        ),
        prediction: format!(
            "Memory usage may reach {:.1}MB within the next {} snapshots",
            last + step * TREND_WINDOW as f64,
            TREND_WINDOW
        ),
        recommended_actions: strings(&[
            "Lower the metric series retention limit",
            "Restart idle sessions",
        ]),
        timeframe: "next hour".to_string(),
        impact: json!({ "metric": "memory_usage", "capacity": true, "growth_per_snapshot_mb": step }),
        data_points: memory,
    })
}

pub fn peak_usage(snapshot: &AnalysisSnapshot) -> Option<NewInsight> {
    let behavior = snapshot.behavior.as_ref()?;
    if behavior.total_interactions < PEAK_MIN_INTERACTIONS {
        return None;
    }
    let (hour, count) = *behavior.peak_usage_hours.first()?;
    let share = count as f64 / behavior.total_interactions as f64 * 100.0;

    Some(NewInsight {
        insight_type: InsightType::Behavior,
        severity: Severity::Low,
        confidence: 82.0,
        title: "Peak Usage Window Identified".to_string(),
        description: format!(
            "{:.0}% of interactions happen between {:02}:00 and {:02}:00 UTC",
            share,
            hour,
            (hour + 1) % 24
        ),
        prediction: format!("Expect the heaviest load again around {:02}:00 UTC", hour),
        recommended_actions: strings(&[
            "Staff the purser desk for the peak window",
            "Avoid maintenance during this hour",
        ]),
        timeframe: "daily".to_string(),
        impact: json!({ "peak_hour": hour, "interactions": count, "share": share }),
        data_points: behavior
            .peak_usage_hours
            .iter()
            .map(|(_, c)| *c as f64)
            .collect(),
    })
}

pub fn recurring_errors(snapshot: &AnalysisSnapshot) -> Option<NewInsight> {
    let pattern = snapshot.performance.as_ref()?.error_patterns.first()?;
    if pattern.count < RECURRING_ERROR_COUNT {
        return None;
    }

    Some(NewInsight {
        insight_type: InsightType::Optimization,
        severity: if pattern.count >= RECURRING_ERROR_HIGH {
            Severity::High
        } else {
            Severity::Medium
        },
        confidence: 86.0,
        title: "Recurring Error Pattern".to_string(),
        description: format!(
            "{} failed {} times with {}",
            pattern.operation, pattern.count, pattern.error_type
        ),
        prediction: "The same failure will keep recurring until its cause is fixed".to_string(),
        recommended_actions: vec![
            format!("Investigate {} failures", pattern.error_type),
            format!("Add validation before {}", pattern.operation),
        ],
        timeframe: "ongoing".to_string(),
        impact: json!({
            "operation": pattern.operation,
            "error_type": pattern.error_type,
            "occurrences": pattern.count,
        }),
        data_points: vec![pattern.count as f64],
    })
}

pub fn rising_load(snapshot: &AnalysisSnapshot) -> Option<NewInsight> {
    let load = snapshot.health_series(TREND_WINDOW, |s| s.operations_per_minute);
    if load.len() < TREND_MIN_SAMPLES {
        return None;
    }
    let trend = trend_direction(&load);
    let latest = *load.last()?;
    if trend <= RISING_TREND || latest <= 0.0 {
        return None;
    }

    Some(NewInsight {
        insight_type: InsightType::System,
        severity: Severity::Low,
        confidence: 70.0,
        title: "Rising Operational Load".to_string(),
        description: format!(
            "Operations per minute increased in {:.0}% of recent snapshots",
            trend
        ),
        prediction: format!(
            "Load is expected to reach about {:.1} operations per minute",
            latest * 1.1
        ),
        recommended_actions: strings(&["Monitor response times over the next hour"]),
        timeframe: "next hour".to_string(),
        impact: json!({ "metric": "operations_per_minute", "trend_direction": trend }),
        data_points: load,
    })
}

pub fn mobile_usage(snapshot: &AnalysisSnapshot) -> Option<NewInsight> {
    let behavior = snapshot.behavior.as_ref()?;
    if behavior.total_interactions < PEAK_MIN_INTERACTIONS {
        return None;
    }
    let share = behavior.device_share(DeviceClass::Mobile);
    if share <= MOBILE_SHARE_THRESHOLD {
        return None;
    }

    Some(NewInsight {
        insight_type: InsightType::Behavior,
        severity: Severity::Low,
        confidence: 80.0,
        title: "Mobile-Heavy Usage".to_string(),
        description: format!("{:.0}% of interactions come from mobile devices", share),
        prediction: "Mobile usage will remain the dominant access mode".to_string(),
        recommended_actions: strings(&[
            "Prioritize the mobile table assignment layout",
            "Enlarge touch targets on guest cards",
        ]),
        timeframe: "this voyage".to_string(),
        impact: json!({ "mobile_share": share }),
        data_points: vec![share],
    })
}
