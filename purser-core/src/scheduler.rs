//! Single logical clock for the periodic analysis tasks.
//!
//! The scheduler itself never sleeps or spawns anything: the caller feeds it
//! the elapsed time since start and runs whatever [`Scheduler::due`] returns.

use crate::config::AnalyticsConfig;
use std::time::Duration;

/// Named background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    HealthSnapshot,
    AnomalyDetection,
    InsightGeneration,
    RecommendationGeneration,
    FullAnalysis,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::HealthSnapshot => "health_snapshot",
            TaskKind::AnomalyDetection => "anomaly_detection",
            TaskKind::InsightGeneration => "insight_generation",
            TaskKind::RecommendationGeneration => "recommendation_generation",
            TaskKind::FullAnalysis => "full_analysis",
        }
    }
}

#[derive(Debug, Clone)]
struct ScheduledTask {
    kind: TaskKind,
    /// `None` for one-shot tasks
    period: Option<Duration>,
    next_due: Duration,
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    tasks: Vec<ScheduledTask>,
}

impl Scheduler {
    pub fn new(config: &AnalyticsConfig) -> Self {
        let periodic = |kind, period: Duration| ScheduledTask {
            kind,
            period: Some(period),
            next_due: period,
        };

        Self {
            tasks: vec![
                periodic(TaskKind::HealthSnapshot, config.health_interval()),
                periodic(TaskKind::AnomalyDetection, config.anomaly_interval()),
                periodic(TaskKind::InsightGeneration, config.insight_interval()),
                periodic(TaskKind::RecommendationGeneration, config.recommendation_interval()),
                ScheduledTask {
                    kind: TaskKind::FullAnalysis,
                    period: None,
                    next_due: config.initial_delay(),
                },
            ],
        }
    }

    /// Tasks due at `elapsed`, in fixed order.
    ///
    /// Each due task runs once even if several of its periods were missed;
    /// its next deadline is the first multiple of its period after `elapsed`.
    /// One-shot tasks are dropped once returned.
    pub fn due(&mut self, elapsed: Duration) -> Vec<TaskKind> {
        let mut due = Vec::new();

        self.tasks.retain_mut(|task| {
            if task.next_due > elapsed {
                return true;
            }
            due.push(task.kind);
            match task.period {
                Some(period) if !period.is_zero() => {
                    while task.next_due <= elapsed {
                        task.next_due += period;
                    }
                    true
                }
                _ => false,
            }
        });

        due
    }

    /// Earliest pending deadline, if any task remains.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.tasks.iter().map(|t| t.next_due).min()
    }
}
