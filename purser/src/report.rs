//! Plain text rendering for the CLI.

use purser_core::{AiInsightsDashboard, ChangeLogEntry};

pub fn print_entries(entries: &[ChangeLogEntry]) {
    for entry in entries {
        let marker = if entry.is_error() { "!" } else { "+" };
        println!(
            "[{}] {}  {:<14} {:<24} {}",
            marker,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.action_type.as_str(),
            entry.operation,
            entry.description
        );
        for guest in &entry.affected_guests {
            println!("      guest {} ({}, cabin {})", guest.id, guest.name, guest.cabin);
        }
        if let Some(ref details) = entry.error_details {
            println!("      error: {}", details);
        }
    }
}

pub fn print_summary(dashboard: &AiInsightsDashboard) {
    println!(
        "[{}] score {:.0} | {} insights | {} active anomalies | {} pending recommendations",
        dashboard.generated_at.format("%H:%M:%S"),
        dashboard.system_score,
        dashboard.insights.len(),
        dashboard.active_anomalies().count(),
        dashboard.pending_recommendations().count()
    );
}

pub fn print_dashboard(dashboard: &AiInsightsDashboard) {
    println!("System score: {:.0}/100", dashboard.system_score);
    println!();

    println!("Trends:");
    println!("  performance      {}", dashboard.trends.performance.as_str());
    println!("  error rate       {}", dashboard.trends.error_rate.as_str());
    println!("  user engagement  {}", dashboard.trends.user_engagement.as_str());
    println!("  capacity         {}", dashboard.trends.capacity.as_str());
    println!();

    let p = &dashboard.predictions;
    println!("Predictions:");
    println!("  next hour load        {:.1} ops/min", p.next_hour_load);
    println!("  next peak hour        {:02}:00 UTC", p.next_peak_hour);
    println!("  expected errors       {:.1}", p.expected_errors);
    println!("  capacity utilization  {:.0}%", p.capacity_utilization);
    println!();

    let anomalies: Vec<_> = dashboard.active_anomalies().collect();
    println!("Anomalies ({} active):", anomalies.len());
    for a in anomalies {
        println!(
            "  [{}] {} ({})",
            a.severity.as_str(),
            a.title,
            a.anomaly_type.as_str()
        );
        println!("      {}", a.description);
    }
    println!();

    println!("Insights ({}):", dashboard.insights.len());
    for i in &dashboard.insights {
        println!(
            "  [{}] {} ({:.0}% confidence)",
            i.severity.as_str(),
            i.title,
            i.confidence
        );
        println!("      {}", i.prediction);
    }
    println!();

    let pending: Vec<_> = dashboard.pending_recommendations().collect();
    println!("Recommendations ({} pending):", pending.len());
    for r in pending {
        println!("  [{}] {}", r.priority.as_str(), r.title);
        println!("      {}", r.description);
    }
}
