//! Core domain types for purser
//!
//! Three families of records flow through the crate:
//!
//! | Family | Types | Producer |
//! |--------|-------|----------|
//! | Change log | [`ChangeLogEntry`], [`NewChangeLogEntry`] | guest/table collaborators |
//! | Metric series | [`PerformanceMetrics`], [`UserBehaviorMetrics`], [`SystemHealthMetrics`] | [`MetricsCollector`](crate::metrics::MetricsCollector) |
//! | Rule outputs | [`PredictiveInsight`], [`AnomalyDetection`], [`SmartRecommendation`] | [`AiAnalyticsEngine`](crate::engine::AiAnalyticsEngine) |
//!
//! Change log entries and metric samples are immutable once appended. Rule
//! outputs have exactly one state transition each: anomalies can be resolved
//! and recommendations can be marked implemented.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named numeric readings, used for anomaly baselines and current values.
pub type MetricMap = BTreeMap<String, f64>;

// ============================================
// Change log
// ============================================

/// Kind of mutation recorded in the change log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Create,
    Update,
    Delete,
    BulkOperation,
    Import,
    System,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Create => "CREATE",
            ActionType::Update => "UPDATE",
            ActionType::Delete => "DELETE",
            ActionType::BulkOperation => "BULK_OPERATION",
            ActionType::Import => "IMPORT",
            ActionType::System => "SYSTEM",
        }
    }
}

impl std::str::FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATE" => Ok(ActionType::Create),
            "UPDATE" => Ok(ActionType::Update),
            "DELETE" => Ok(ActionType::Delete),
            "BULK_OPERATION" => Ok(ActionType::BulkOperation),
            "IMPORT" => Ok(ActionType::Import),
            "SYSTEM" => Ok(ActionType::System),
            _ => Err(format!("unknown action type: {}", s)),
        }
    }
}

/// How a change was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeMethod {
    Manual,
    Bulk,
    Import,
    AutoAssign,
    Api,
}

impl ChangeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeMethod::Manual => "MANUAL",
            ChangeMethod::Bulk => "BULK",
            ChangeMethod::Import => "IMPORT",
            ChangeMethod::AutoAssign => "AUTO_ASSIGN",
            ChangeMethod::Api => "API",
        }
    }
}

impl std::str::FromStr for ChangeMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MANUAL" => Ok(ChangeMethod::Manual),
            "BULK" => Ok(ChangeMethod::Bulk),
            "IMPORT" => Ok(ChangeMethod::Import),
            "AUTO_ASSIGN" => Ok(ChangeMethod::AutoAssign),
            "API" => Ok(ChangeMethod::Api),
            _ => Err(format!("unknown change method: {}", s)),
        }
    }
}

/// Guest touched by a change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectedGuest {
    pub id: String,
    pub name: String,
    pub cabin: String,
}

/// A single field transition within a change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old_value: serde_json::Value,
    pub new_value: serde_json::Value,
}

/// A change log record as supplied by a collaborator, before the log
/// assigns its id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewChangeLogEntry {
    pub action_type: ActionType,
    pub operation: String,
    #[serde(default)]
    pub affected_guests: Vec<AffectedGuest>,
    #[serde(default)]
    pub changes: Vec<FieldChange>,
    pub description: String,
    pub method: ChangeMethod,
    #[serde(default)]
    pub user_action: String,
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub error_details: Option<String>,
    #[serde(default)]
    pub affected_count: Option<u32>,
}

impl NewChangeLogEntry {
    /// Minimal entry with the required fields; the optional ones stay empty.
    pub fn new(
        action_type: ActionType,
        operation: impl Into<String>,
        method: ChangeMethod,
        description: impl Into<String>,
    ) -> Self {
        let operation = operation.into();
        Self {
            action_type,
            user_action: operation.clone(),
            operation,
            affected_guests: Vec::new(),
            changes: Vec::new(),
            description: description.into(),
            method,
            batch_id: None,
            file_name: None,
            error_details: None,
            affected_count: None,
        }
    }

    pub fn with_guest(mut self, guest: AffectedGuest) -> Self {
        self.affected_guests.push(guest);
        self
    }

    pub fn with_change(mut self, change: FieldChange) -> Self {
        self.changes.push(change);
        self
    }

    pub fn with_error(mut self, details: impl Into<String>) -> Self {
        self.error_details = Some(details.into());
        self
    }
}

/// Immutable audit record of a mutating guest/table action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub action_type: ActionType,
    pub operation: String,
    pub affected_guests: Vec<AffectedGuest>,
    pub changes: Vec<FieldChange>,
    pub description: String,
    pub method: ChangeMethod,
    pub user_action: String,
    pub batch_id: Option<String>,
    pub file_name: Option<String>,
    pub error_details: Option<String>,
    pub affected_count: Option<u32>,
}

impl ChangeLogEntry {
    pub fn from_new(id: String, timestamp: DateTime<Utc>, new: NewChangeLogEntry) -> Self {
        Self {
            id,
            timestamp,
            action_type: new.action_type,
            operation: new.operation,
            affected_guests: new.affected_guests,
            changes: new.changes,
            description: new.description,
            method: new.method,
            user_action: new.user_action,
            batch_id: new.batch_id,
            file_name: new.file_name,
            error_details: new.error_details,
            affected_count: new.affected_count,
        }
    }

    /// Entries that represent a failure rather than a guest mutation.
    pub fn is_error(&self) -> bool {
        self.error_details.is_some() || self.action_type == ActionType::System
    }

    /// Moving an already-seated guest to a different table.
    pub fn is_table_reassignment(&self) -> bool {
        self.operation.to_ascii_lowercase().contains("reassign")
    }

    /// Wiping every assignment or guest at once.
    pub fn is_clear_all(&self) -> bool {
        let op = self.operation.to_ascii_lowercase();
        op.contains("clear_all") || op.contains("clear all")
    }

    /// Produced by the automatic table assignment routine.
    pub fn is_auto_assignment(&self) -> bool {
        self.method == ChangeMethod::AutoAssign
            || self.operation.to_ascii_lowercase().contains("auto_assign")
    }

    /// Hand-made table change.
    pub fn is_manual_table_change(&self) -> bool {
        self.method == ChangeMethod::Manual && self.operation.to_ascii_lowercase().contains("table")
    }
}

// ============================================
// Metric series
// ============================================

/// One finalized operation measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub operation_id: String,
    pub operation: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: f64,
    pub success: bool,
    pub error_type: Option<String>,
    pub resources_affected: usize,
    /// Resident memory delta over the operation, in MB
    pub memory_usage_mb: Option<f64>,
}

/// Client device description
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub user_agent: String,
    pub screen: Option<String>,
    pub viewport: Option<String>,
}

/// Device class derived from a user agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DeviceClass {
    Desktop,
    Mobile,
    Tablet,
}

impl DeviceClass {
    /// Substring classification; "Mobile" wins over the tablet markers.
    pub fn from_user_agent(user_agent: &str) -> Self {
        if user_agent.contains("Mobile") {
            DeviceClass::Mobile
        } else if user_agent.contains("Tablet") || user_agent.contains("iPad") {
            DeviceClass::Tablet
        } else {
            DeviceClass::Desktop
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::Desktop => "Desktop",
            DeviceClass::Mobile => "Mobile",
            DeviceClass::Tablet => "Tablet",
        }
    }
}

/// One user interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBehaviorMetrics {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub duration_ms: f64,
    /// Most recent element descriptors, oldest first (at most 10)
    pub click_path: Vec<String>,
    pub error_encountered: bool,
    pub device_info: DeviceInfo,
}

/// Periodic system health reading
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SystemHealthMetrics {
    pub timestamp: DateTime<Utc>,
    /// Resident memory in MB
    pub memory_usage: f64,
    pub active_users: usize,
    pub operations_per_minute: f64,
    /// Percent of change log entries in the window that are errors
    pub error_rate: f64,
    /// Mean duration of recent operations in ms
    pub average_response_time: f64,
    pub database_connections: usize,
    /// Percent
    pub cache_hit_rate: f64,
}

// ============================================
// Rule outputs
// ============================================

/// Severity shared by insights and anomalies
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    Performance,
    Behavior,
    System,
    Optimization,
}

impl InsightType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightType::Performance => "performance",
            InsightType::Behavior => "behavior",
            InsightType::System => "system",
            InsightType::Optimization => "optimization",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    PerformanceSpike,
    ErrorBurst,
    UnusualPattern,
    CapacityIssue,
    UserBehaviorAnomaly,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::PerformanceSpike => "performance_spike",
            AnomalyType::ErrorBurst => "error_burst",
            AnomalyType::UnusualPattern => "unusual_pattern",
            AnomalyType::CapacityIssue => "capacity_issue",
            AnomalyType::UserBehaviorAnomaly => "user_behavior_anomaly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    TableAssignment,
    SystemOptimization,
    UserExperience,
    Performance,
    CapacityPlanning,
}

impl RecommendationCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationCategory::TableAssignment => "table_assignment",
            RecommendationCategory::SystemOptimization => "system_optimization",
            RecommendationCategory::UserExperience => "user_experience",
            RecommendationCategory::Performance => "performance",
            RecommendationCategory::CapacityPlanning => "capacity_planning",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Low,
    Medium,
    High,
}

/// Insight fields supplied by a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInsight {
    pub insight_type: InsightType,
    pub severity: Severity,
    pub confidence: f64,
    pub title: String,
    pub description: String,
    pub prediction: String,
    pub recommended_actions: Vec<String>,
    pub timeframe: String,
    pub impact: serde_json::Value,
    pub data_points: Vec<f64>,
}

/// Time-bound predictive statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictiveInsight {
    pub id: String,
    pub insight_type: InsightType,
    pub severity: Severity,
    pub confidence: f64,
    pub title: String,
    pub description: String,
    pub prediction: String,
    pub recommended_actions: Vec<String>,
    pub timeframe: String,
    pub impact: serde_json::Value,
    pub data_points: Vec<f64>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PredictiveInsight {
    pub fn from_new(
        id: String,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        new: NewInsight,
    ) -> Self {
        Self {
            id,
            insight_type: new.insight_type,
            severity: new.severity,
            confidence: new.confidence,
            title: new.title,
            description: new.description,
            prediction: new.prediction,
            recommended_actions: new.recommended_actions,
            timeframe: new.timeframe,
            impact: new.impact,
            data_points: new.data_points,
            created_at,
            expires_at,
        }
    }
}

/// Anomaly fields supplied by a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAnomaly {
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub confidence: f64,
    pub title: String,
    pub description: String,
    pub affected_metrics: Vec<String>,
    pub baseline: MetricMap,
    pub current: MetricMap,
    /// Percent deviation of current from baseline
    pub deviation: f64,
    pub suggested_actions: Vec<String>,
}

/// Detected deviation from an expected baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyDetection {
    pub id: String,
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub confidence: f64,
    pub title: String,
    pub description: String,
    pub detected_at: DateTime<Utc>,
    pub affected_metrics: Vec<String>,
    pub baseline: MetricMap,
    pub current: MetricMap,
    pub deviation: f64,
    pub suggested_actions: Vec<String>,
    pub auto_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl AnomalyDetection {
    pub fn from_new(id: String, detected_at: DateTime<Utc>, new: NewAnomaly) -> Self {
        Self {
            id,
            anomaly_type: new.anomaly_type,
            severity: new.severity,
            confidence: new.confidence,
            title: new.title,
            description: new.description,
            detected_at,
            affected_metrics: new.affected_metrics,
            baseline: new.baseline,
            current: new.current,
            deviation: new.deviation,
            suggested_actions: new.suggested_actions,
            auto_resolved: false,
            resolved_at: None,
        }
    }
}

/// Recommendation fields supplied by a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRecommendation {
    pub category: RecommendationCategory,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub rationale: String,
    pub expected_benefit: String,
    pub implementation_effort: Effort,
    pub estimated_impact: serde_json::Value,
    pub action_steps: Vec<String>,
    pub prerequisites: Vec<String>,
    pub risks: Vec<String>,
}

/// Actionable suggestion with an implement lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartRecommendation {
    pub id: String,
    pub category: RecommendationCategory,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub rationale: String,
    pub expected_benefit: String,
    pub implementation_effort: Effort,
    pub estimated_impact: serde_json::Value,
    pub action_steps: Vec<String>,
    pub prerequisites: Vec<String>,
    pub risks: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub implemented: bool,
    pub implemented_at: Option<DateTime<Utc>>,
    pub actual_impact: Option<serde_json::Value>,
}

impl SmartRecommendation {
    pub fn from_new(
        id: String,
        created_at: DateTime<Utc>,
        valid_until: DateTime<Utc>,
        new: NewRecommendation,
    ) -> Self {
        Self {
            id,
            category: new.category,
            priority: new.priority,
            title: new.title,
            description: new.description,
            rationale: new.rationale,
            expected_benefit: new.expected_benefit,
            implementation_effort: new.implementation_effort,
            estimated_impact: new.estimated_impact,
            action_steps: new.action_steps,
            prerequisites: new.prerequisites,
            risks: new.risks,
            created_at,
            valid_until,
            implemented: false,
            implemented_at: None,
            actual_impact: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_type_serde_names() {
        let json = serde_json::to_string(&ActionType::BulkOperation).unwrap();
        assert_eq!(json, "\"BULK_OPERATION\"");
        let method: ChangeMethod = serde_json::from_str("\"AUTO_ASSIGN\"").unwrap();
        assert_eq!(method, ChangeMethod::AutoAssign);
        assert_eq!("update".parse::<ActionType>().unwrap(), ActionType::Update);
        assert!("rename".parse::<ActionType>().is_err());
    }

    #[test]
    fn test_device_classification() {
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0) Mobile/15E148";
        let ipad = "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X)";
        let android_tablet = "Mozilla/5.0 (Linux; Android 13; Tablet) Mobile Safari";
        let mac = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_0)";

        assert_eq!(DeviceClass::from_user_agent(iphone), DeviceClass::Mobile);
        assert_eq!(DeviceClass::from_user_agent(ipad), DeviceClass::Tablet);
        assert_eq!(
            DeviceClass::from_user_agent(android_tablet),
            DeviceClass::Mobile
        );
        assert_eq!(DeviceClass::from_user_agent(mac), DeviceClass::Desktop);
    }

    #[test]
    fn test_entry_classifiers() {
        let entry = ChangeLogEntry::from_new(
            "1".to_string(),
            Utc::now(),
            NewChangeLogEntry::new(
                ActionType::Update,
                "table_reassignment",
                ChangeMethod::Manual,
                "moved guest",
            ),
        );
        assert!(entry.is_table_reassignment());
        assert!(entry.is_manual_table_change());
        assert!(!entry.is_clear_all());
        assert!(!entry.is_error());

        let reset = ChangeLogEntry::from_new(
            "2".to_string(),
            Utc::now(),
            NewChangeLogEntry::new(
                ActionType::BulkOperation,
                "CLEAR_ALL_ASSIGNMENTS",
                ChangeMethod::Bulk,
                "cleared",
            ),
        );
        assert!(reset.is_clear_all());
    }
}
