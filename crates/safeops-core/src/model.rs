use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl ApprovalStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Expired => "expired",
        }
    }

    /// Unknown tokens collapse to `Pending`.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim() {
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            "expired" => Self::Expired,
            _ => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    #[default]
    Pending,
    Running,
    Blocked,
    Completed,
    Failed,
}

impl WorkStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Blocked => "blocked",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim() {
            "running" => Self::Running,
            "blocked" => Self::Blocked,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    Sequential,
    Parallel,
}

impl RunMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
        }
    }

    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim() {
            "parallel" => Self::Parallel,
            _ => Self::Sequential,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    #[default]
    Sequential,
    Parallel,
    SelfHeal,
}

impl GroupKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::SelfHeal => "self_heal",
        }
    }

    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim() {
            "parallel" => Self::Parallel,
            "self_heal" => Self::SelfHeal,
            _ => Self::Sequential,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactType {
    Test,
    Screenshot,
    Report,
    Log,
    #[default]
    Other,
}

impl ArtifactType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Screenshot => "screenshot",
            Self::Report => "report",
            Self::Log => "log",
            Self::Other => "other",
        }
    }

    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim() {
            "test" => Self::Test,
            "screenshot" => Self::Screenshot,
            "report" => Self::Report,
            "log" => Self::Log,
            _ => Self::Other,
        }
    }
}

/// SafeOps KPI snapshot as served by `/api/safeops/kpi`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KpiSnapshot {
    pub dangerous_without_approval: u64,
    pub total_approvals: u64,
    pub pending_approvals: u64,
    /// Percentage in `[0, 100]`.
    pub ci_success_rate: f64,
    pub last_updated: String,
    pub health_score: Option<f64>,
    pub hash_drift_alert: Option<u64>,
    pub audit_failures: Option<u64>,
    pub self_heal_cycles: Option<u64>,
    pub override_alerts: Option<u64>,
}

impl KpiSnapshot {
    /// All counters at zero; used when no KPI payload has ever been obtained.
    #[must_use]
    pub fn zeroed(last_updated: impl Into<String>) -> Self {
        Self { last_updated: last_updated.into(), ..Self::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Approval {
    pub appr_id: String,
    pub task_id: String,
    pub status: ApprovalStatus,
    pub requested_by: String,
    pub approver: String,
    pub ts_req: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    pub id: String,
    pub status: String,
    pub description: String,
    pub entries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanSignal {
    pub source: String,
    pub summary: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub diff: Vec<PlanStep>,
    pub signals: Vec<PlanSignal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CiResult {
    pub operation: String,
    pub success: bool,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodexSession {
    pub session_id: String,
    pub phase: String,
    pub role: String,
    pub started_at: Option<String>,
    pub exited_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerMeta {
    pub server_version: String,
    pub uptime_seconds: u64,
}

impl ServerMeta {
    #[must_use]
    pub fn unknown() -> Self {
        Self { server_version: "n/a".to_string(), uptime_seconds: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    pub meta: ServerMeta,
    pub cli_sessions: Vec<CodexSession>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardItem {
    pub run_id: String,
    pub total: Option<f64>,
    pub tests_pass_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentInfo {
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgentsStatus {
    pub online: u64,
    pub agents: Vec<AgentInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestHistoryEntry {
    pub ts: String,
    pub operation: String,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditSummaryItem {
    pub ts: String,
    pub op: String,
    pub success: bool,
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DangerousEvent {
    pub ts: String,
    pub id: String,
    pub note: String,
    pub command: String,
    pub approvals_id: String,
    #[serde(rename = "override")]
    pub overridden: bool,
    pub result: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signoff {
    pub reviewer: String,
    pub notes: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Promotion {
    pub ts: String,
    pub stage: String,
    pub status: String,
    pub note: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReleaseStatus {
    pub kpi: Option<KpiSnapshot>,
    pub signoffs: Vec<Signoff>,
    pub promotions: Vec<Promotion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UiAuditArtifact {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UiAuditSummary {
    pub axe_issues_count: Option<u64>,
    pub lcp_ms: Option<f64>,
    pub tti_ms: Option<f64>,
    pub cls: Option<f64>,
    pub visual_diff_pct: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UiCoverage {
    pub statements_pct: Option<f64>,
    pub branches_pct: Option<f64>,
    pub functions_pct: Option<f64>,
    pub lines_pct: Option<f64>,
}

/// Everything the dashboard renders. Every field has a usable default so
/// consumers only ever need to look at `loading`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub loading: bool,
    pub last_refreshed: Option<DateTime<Utc>>,
    pub kpi: Option<KpiSnapshot>,
    pub server: Option<ServerMeta>,
    pub approvals: Vec<Approval>,
    pub plan_summary: Option<PlanSummary>,
    pub last_ci: Option<CiResult>,
    pub codex_sessions: Vec<CodexSession>,
    pub leaderboard: Vec<LeaderboardItem>,
    pub agents: Option<AgentsStatus>,
    pub test_history: Vec<TestHistoryEntry>,
    pub audit_summary: Vec<AuditSummaryItem>,
    pub dangerous_events: Vec<DangerousEvent>,
    pub release: Option<ReleaseStatus>,
    pub ui_audits: Vec<UiAuditArtifact>,
    pub ui_audit_summary: Option<UiAuditSummary>,
    pub ui_coverage: Option<UiCoverage>,
    pub competition_progress: f64,
}

impl Default for DashboardView {
    fn default() -> Self {
        Self {
            loading: true,
            last_refreshed: None,
            kpi: None,
            server: None,
            approvals: Vec::new(),
            plan_summary: None,
            last_ci: None,
            codex_sessions: Vec::new(),
            leaderboard: Vec::new(),
            agents: None,
            test_history: Vec::new(),
            audit_summary: Vec::new(),
            dangerous_events: Vec::new(),
            release: None,
            ui_audits: Vec::new(),
            ui_audit_summary: None,
            ui_coverage: None,
            competition_progress: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mission {
    pub id: String,
    pub title: String,
    pub status: WorkStatus,
    pub owner: String,
    pub run_mode: RunMode,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskGroup {
    pub id: String,
    pub mission_id: String,
    pub title: String,
    pub kind: GroupKind,
    pub status: WorkStatus,
    pub order: i64,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    pub id: String,
    pub group_id: String,
    pub title: String,
    pub status: WorkStatus,
    pub agent: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub id: String,
    pub task_id: String,
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    pub scope: String,
    pub version: String,
    pub sha: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signal {
    pub id: String,
    #[serde(rename = "type")]
    pub signal_type: String,
    pub severity: String,
    pub status: String,
    pub created_at: String,
    pub message: Option<String>,
}

/// Flattened mission/group/task/artifact tree, linked by foreign key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Hierarchy {
    pub missions: Vec<Mission>,
    pub groups: Vec<TaskGroup>,
    pub tasks: Vec<Task>,
    pub artifacts: Vec<Artifact>,
}

impl Hierarchy {
    /// Groups belonging to `mission_id`, ascending by `order`. Ties keep
    /// their input order.
    #[must_use]
    pub fn groups_for(&self, mission_id: &str) -> Vec<TaskGroup> {
        let mut groups: Vec<TaskGroup> =
            self.groups.iter().filter(|group| group.mission_id == mission_id).cloned().collect();
        groups.sort_by_key(|group| group.order);
        groups
    }

    #[must_use]
    pub fn tasks_for(&self, groups: &[TaskGroup]) -> Vec<Task> {
        self.tasks
            .iter()
            .filter(|task| groups.iter().any(|group| group.id == task.group_id))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn artifacts_for(&self, tasks: &[Task]) -> Vec<Artifact> {
        self.artifacts
            .iter()
            .filter(|artifact| tasks.iter().any(|task| task.id == artifact.task_id))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(id: &str, mission_id: &str, order: i64) -> TaskGroup {
        TaskGroup {
            id: id.to_string(),
            mission_id: mission_id.to_string(),
            title: id.to_string(),
            kind: GroupKind::Sequential,
            status: WorkStatus::Pending,
            order,
            started_at: None,
            finished_at: None,
        }
    }

    #[test]
    fn groups_for_filters_by_mission_and_sorts_by_order() {
        let hierarchy = Hierarchy {
            groups: vec![
                group("G-101", "M-001", 2),
                group("G-102", "M-001", 1),
                group("G-201", "M-002", 1),
            ],
            ..Hierarchy::default()
        };

        let ids: Vec<_> =
            hierarchy.groups_for("M-001").into_iter().map(|group| group.id).collect();
        assert_eq!(ids, vec!["G-102", "G-101"]);
    }

    #[test]
    fn tasks_and_artifacts_follow_foreign_keys() {
        let hierarchy = crate::mock::fallback_hierarchy();
        let groups = hierarchy.groups_for("M-001");
        let tasks = hierarchy.tasks_for(&groups);
        let artifacts = hierarchy.artifacts_for(&tasks);

        assert!(tasks.iter().all(|task| task.group_id == "G-102"));
        assert_eq!(tasks.len(), 2);
        assert_eq!(artifacts.len(), 2);
        assert!(artifacts.iter().all(|artifact| artifact.task_id == "T-1"));
    }

    #[test]
    fn unknown_enum_tokens_fall_back() {
        assert_eq!(ApprovalStatus::from_raw("denied"), ApprovalStatus::Pending);
        assert_eq!(WorkStatus::from_raw("archived"), WorkStatus::Pending);
        assert_eq!(RunMode::from_raw(""), RunMode::Sequential);
        assert_eq!(GroupKind::from_raw("self_heal"), GroupKind::SelfHeal);
        assert_eq!(ArtifactType::from_raw("video"), ArtifactType::Other);
    }
}
