//! Integration tests for the purser analytics pipeline
//!
//! These tests wire the change log to an on-disk SQLite database and run the
//! engine over it end to end.

use chrono::{Duration, Utc};
use purser_core::changelog::{ChangeLog, ChangeStore};
use purser_core::clock::{Clock, ManualClock};
use purser_core::config::Config;
use purser_core::db::Database;
use purser_core::metrics::{InteractionContext, MetricsCollector};
use purser_core::types::{
    ActionType, AffectedGuest, ChangeMethod, FieldChange, NewChangeLogEntry, Priority,
    RecommendationCategory,
};
use purser_core::{AiAnalyticsEngine, Error, InsightsService, PassOutcome};
use std::sync::Arc;
use tempfile::TempDir;

fn open_db(dir: &TempDir) -> Arc<Database> {
    purser_core::logging::init_test();
    let db = Database::open(&dir.path().join("data.db")).expect("open db");
    db.migrate().expect("migrate");
    Arc::new(db)
}

fn reassignment(guest: &str, from: u32, to: u32) -> NewChangeLogEntry {
    NewChangeLogEntry::new(
        ActionType::Update,
        "table_reassignment",
        ChangeMethod::Manual,
        format!("Moved {} from table {} to table {}", guest, from, to),
    )
    .with_guest(AffectedGuest {
        id: guest.to_lowercase(),
        name: guest.to_string(),
        cabin: "A101".to_string(),
    })
    .with_change(FieldChange {
        field: "table".to_string(),
        old_value: serde_json::json!(from),
        new_value: serde_json::json!(to),
    })
}

// ============================================
// Change log persistence
// ============================================

#[test]
fn test_change_log_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));

    let first = {
        let log = ChangeLog::open(open_db(&dir), clock.clone(), 1000);
        log.append(reassignment("Ada", 4, 7));
        log.append(reassignment("Grace", 2, 9));
        log.read_all()
    };

    let reopened = ChangeLog::open(open_db(&dir), clock, 1000);
    assert_eq!(reopened.read_all(), first);
    assert_eq!(reopened.read_all()[0].affected_guests[0].name, "Grace");
    assert_eq!(reopened.read_all()[1].changes[0].new_value, serde_json::json!(7));
}

#[test]
fn test_clear_is_persisted() {
    let dir = TempDir::new().unwrap();
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));

    let log = ChangeLog::open(open_db(&dir), clock.clone(), 1000);
    log.append(reassignment("Ada", 1, 2));
    log.clear();

    let db = open_db(&dir);
    assert!(db.load_entries().unwrap().is_empty());
    assert!(ChangeLog::open(db, clock, 1000).is_empty());
}

#[test]
fn test_limit_applies_to_stored_history() {
    let dir = TempDir::new().unwrap();
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
    let log = ChangeLog::open(open_db(&dir), clock, 5);

    for i in 0..8 {
        log.append(reassignment(&format!("Guest{}", i), 1, 2));
    }

    let stored = open_db(&dir).load_entries().unwrap();
    assert_eq!(stored.len(), 5);
    assert_eq!(stored[0].affected_guests[0].name, "Guest7");
}

// ============================================
// Engine over the change log
// ============================================

#[tokio::test]
async fn test_reassignment_burst_recommends_strategy_review() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let service = InsightsService::build(open_db(&dir), clock.clone(), &Config::default());

    for i in 0..25 {
        service
            .change_log()
            .append(reassignment(&format!("Guest{}", i), 1, 2));
        clock.advance(Duration::minutes(1));
    }

    let dashboard = service.engine().run_full_analysis().await;
    let strategy = dashboard
        .recommendations
        .iter()
        .find(|r| r.category == RecommendationCategory::TableAssignment)
        .expect("table assignment recommendation");
    assert_eq!(strategy.title, "Optimize Table Assignment Strategy");
    assert_eq!(strategy.priority, Priority::Medium);

    // 25 reassignments is well above the dominant-operation threshold
    assert!(dashboard
        .insights
        .iter()
        .any(|i| i.title == "Dominant Operation Detected"));

    // Running again adds nothing new
    assert_eq!(
        service.engine().generate_recommendations(),
        PassOutcome::Completed { added: 0 }
    );
}

#[tokio::test]
async fn test_reassignments_age_out_of_window() {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let service = InsightsService::build(open_db(&dir), clock.clone(), &Config::default());

    for i in 0..25 {
        service
            .change_log()
            .append(reassignment(&format!("Guest{}", i), 1, 2));
    }
    clock.advance(Duration::hours(30));

    service.engine().generate_recommendations();
    assert!(service.engine().recommendations().is_empty());
}

#[test]
fn test_failed_operations_feed_error_burst() {
    let dir = TempDir::new().unwrap();
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
    let log = Arc::new(ChangeLog::open(open_db(&dir), clock.clone(), 1000));
    let metrics = Arc::new(MetricsCollector::new(log.clone(), clock.clone(), 1000));
    let config = Config::default();
    let engine = AiAnalyticsEngine::new(log.clone(), metrics.clone(), clock, &config);

    for i in 0..10 {
        let result = metrics.record_operation("import_manifest", 40, || {
            if i % 2 == 0 {
                Err(Error::Config("cabin column missing".to_string()))
            } else {
                Ok(())
            }
        });
        assert_eq!(result.is_err(), i % 2 == 0);
    }

    engine.detect_anomalies();
    let burst = engine
        .anomalies()
        .into_iter()
        .find(|a| a.title == "Error Rate Spike")
        .expect("error burst anomaly");
    assert_eq!(burst.current["error_rate"], 50.0);

    let samples = metrics.performance_samples();
    assert_eq!(samples.len(), 10);
    assert_eq!(samples[0].error_type.as_deref(), Some("ConfigError"));
}

#[test]
fn test_interactions_drive_behavior_rules() {
    let dir = TempDir::new().unwrap();
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(Utc::now()));
    let log = Arc::new(ChangeLog::open(open_db(&dir), clock.clone(), 1000));
    let metrics = Arc::new(MetricsCollector::new(log.clone(), clock.clone(), 1000));
    let engine = AiAnalyticsEngine::new(log, metrics.clone(), clock, &Config::default());

    for _ in 0..4 {
        for element in ["guest-list", "guest-card", "edit-table"] {
            metrics.record_interaction(
                "click",
                InteractionContext {
                    duration_ms: 12.0,
                    element: Some(element.to_string()),
                    error: false,
                },
            );
        }
        metrics.record_interaction(
            "save_table",
            InteractionContext {
                duration_ms: 30.0,
                element: Some("save".to_string()),
                error: true,
            },
        );
    }

    engine.generate_recommendations();
    let workflow = engine
        .recommendations()
        .into_iter()
        .find(|r| r.category == RecommendationCategory::UserExperience)
        .expect("error path recommendation");
    assert!(workflow.description.contains("guest-card > edit-table > save"));

    engine.detect_anomalies();
    assert!(engine
        .anomalies()
        .iter()
        .any(|a| a.title == "Elevated User Error Rate"));
}

#[test]
fn test_exported_dashboard_is_readable_json() {
    let dir = TempDir::new().unwrap();
    let service = InsightsService::build(
        open_db(&dir),
        Arc::new(ManualClock::new(Utc::now())),
        &Config::default(),
    );
    for _ in 0..3 {
        service.change_log().append(NewChangeLogEntry::new(
            ActionType::BulkOperation,
            "clear_all_assignments",
            ChangeMethod::Bulk,
            "Cleared every table assignment",
        ));
    }
    service.engine().generate_recommendations();

    let path = dir.path().join("dashboard.json");
    service.engine().export_dashboard(&path).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(
        json["recommendations"][0]["title"],
        "Investigate Frequent Data Resets"
    );
    assert_eq!(json["recommendations"][0]["priority"], "high");
    assert_eq!(json["system_score"], 100.0);
}
