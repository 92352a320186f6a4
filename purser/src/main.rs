//! purser - change analytics for the guest manifest and table plan
//!
//! Records change log entries, runs the insights engine and exports the
//! dashboard.

mod report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use purser_core::{
    ActionType, AffectedGuest, ChangeLog, ChangeMethod, Config, Database, InsightsService,
    NewChangeLogEntry, SystemClock,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "purser")]
#[command(about = "Change analytics for the guest manifest and table plan")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record, list or clear change log entries
    Log {
        #[command(subcommand)]
        command: LogCommand,
    },

    /// Run a full analysis and print the dashboard
    Analyze {
        /// Output format: text (default) or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Run a full analysis and write the dashboard as JSON
    Export {
        /// Destination file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run the scheduler in the foreground until Ctrl+C
    Watch {
        /// Seconds between dashboard summaries
        #[arg(long, default_value_t = 30)]
        refresh_secs: u64,
    },
}

#[derive(Subcommand)]
enum LogCommand {
    /// Append an entry
    Add {
        /// CREATE, UPDATE, DELETE, BULK_OPERATION, IMPORT or SYSTEM
        #[arg(long)]
        action: ActionType,

        /// Operation name, e.g. table_reassignment
        #[arg(long)]
        operation: String,

        /// MANUAL, BULK, IMPORT, AUTO_ASSIGN or API
        #[arg(long, default_value = "MANUAL")]
        method: ChangeMethod,

        #[arg(long)]
        description: String,

        /// Affected guest as ID:NAME:CABIN (repeatable)
        #[arg(long = "guest", value_parser = parse_guest)]
        guests: Vec<AffectedGuest>,

        /// Error details, marks the entry as a failure
        #[arg(long)]
        error: Option<String>,

        #[arg(long)]
        batch_id: Option<String>,

        #[arg(long)]
        file_name: Option<String>,

        #[arg(long)]
        affected_count: Option<u32>,
    },

    /// Show the most recent entries
    List {
        /// Maximum entries to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Output format: text (default) or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Remove every entry
    Clear,
}

fn parse_guest(value: &str) -> std::result::Result<AffectedGuest, String> {
    let mut parts = value.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(id), Some(name), Some(cabin)) if !id.is_empty() => Ok(AffectedGuest {
            id: id.to_string(),
            name: name.to_string(),
            cabin: cabin.to_string(),
        }),
        _ => Err(format!("expected ID:NAME:CABIN, got '{}'", value)),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        purser_core::logging::init(&config.logging).context("failed to initialize logging")?;

    // Open database
    let db_path = config.resolved_database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    let service = InsightsService::build(Arc::new(db), Arc::new(SystemClock), &config);

    match cli.command {
        Command::Log { command } => run_log(command, service.change_log()),
        Command::Analyze { format } => {
            let dashboard = runtime()?.block_on(analyze(&service));
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&dashboard)?);
            } else {
                report::print_dashboard(&dashboard);
            }
            Ok(())
        }
        Command::Export { output } => {
            runtime()?.block_on(analyze(&service));
            service
                .engine()
                .export_dashboard(&output)
                .with_context(|| format!("failed to export dashboard to {}", output.display()))?;
            println!("Dashboard written to {}", output.display());
            Ok(())
        }
        Command::Watch { refresh_secs } => watch(&service, refresh_secs),
    }
}

fn run_log(command: LogCommand, change_log: &ChangeLog) -> Result<()> {
    match command {
        LogCommand::Add {
            action,
            operation,
            method,
            description,
            guests,
            error,
            batch_id,
            file_name,
            affected_count,
        } => {
            let mut entry = NewChangeLogEntry::new(action, operation, method, description);
            entry.affected_guests = guests;
            entry.error_details = error;
            entry.batch_id = batch_id;
            entry.file_name = file_name;
            entry.affected_count = affected_count;

            let entry = change_log.append(entry);
            println!("Recorded {} ({})", entry.id, entry.operation);
        }
        LogCommand::List { limit, format } => {
            let entries: Vec<_> = change_log.read_all().into_iter().take(limit).collect();
            if format == "json" {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("Change log is empty.");
            } else {
                report::print_entries(&entries);
            }
        }
        LogCommand::Clear => {
            let count = change_log.len();
            change_log.clear();
            println!("Cleared {} change log entries", count);
        }
    }
    Ok(())
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

async fn analyze(service: &InsightsService) -> purser_core::AiInsightsDashboard {
    service.metrics().capture_health_snapshot();
    service.engine().run_full_analysis().await
}

fn watch(service: &InsightsService, refresh_secs: u64) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        eprintln!("\nShutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")?;

    let refresh = Duration::from_secs(refresh_secs.max(1));
    println!(
        "Watch mode active (summary every {}s). Press Ctrl+C to stop.",
        refresh.as_secs()
    );
    println!();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    rt.block_on(async {
        service.init().context("failed to start insights scheduler")?;

        let mut last_summary = Instant::now();
        while running.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(200)).await;
            if last_summary.elapsed() >= refresh {
                report::print_summary(&service.engine().dashboard());
                last_summary = Instant::now();
            }
        }

        service
            .shutdown()
            .await
            .context("failed to stop insights scheduler")
    })
}
