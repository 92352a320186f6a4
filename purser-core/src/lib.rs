//! # purser-core
//!
//! Core library for purser - change analytics for a cruise ship guest
//! manifest and table plan.
//!
//! This library provides:
//! - Domain types for change log entries, metric samples and rule outputs
//! - An append-only change log persisted through SQLite
//! - A metrics collector for operations, interactions and system health
//! - Pure aggregations over the metric series
//! - A rule engine producing insights, anomalies and recommendations
//! - Configuration management and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through three layers:
//! - **Layer 0 (Record):** change log entries and metric samples (immutable)
//! - **Layer 1 (Aggregate):** summaries derived on demand (regenerable)
//! - **Layer 2 (Rule outputs):** insights, anomalies and recommendations
//!   with their own lifecycle
//!
//! ## Example
//!
//! ```rust,no_run
//! use purser_core::{Config, Database, InsightsService, SystemClock};
//! use std::sync::Arc;
//!
//! let config = Config::load().expect("failed to load config");
//!
//! let db = Database::open(&config.resolved_database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let service = InsightsService::build(Arc::new(db), Arc::new(SystemClock), &config);
//! let dashboard = service.engine().dashboard();
//! println!("system score: {:.0}", dashboard.system_score);
//! ```

// Re-export commonly used items at the crate root
pub use analytics::{AiInsightsDashboard, AnalyticsSource};
pub use changelog::{ChangeHistory, ChangeLog, ChangeStore, MemoryStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use db::Database;
pub use engine::{AiAnalyticsEngine, PassOutcome};
pub use error::{Error, ErrorClass, Result};
pub use metrics::{InteractionContext, MetricsCollector};
pub use scheduler::{Scheduler, TaskKind};
pub use service::InsightsService;
pub use types::*;

// Public modules
pub mod analytics;
pub mod changelog;
pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod scheduler;
pub mod service;
pub mod types;
