//! Converts raw endpoint JSON into fully-populated view records.
//!
//! Every method accepts any `Value` (including `null`, arrays where objects
//! are expected, and so on) and returns a complete record. Absent or
//! mistyped fields take a default: `0` for counts, `[]` for lists, `"n/a"` for
//! text, the normalizer's clock for update times.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::approvals::parse_approvals;
use crate::model::{
    AgentInfo, AgentsStatus, Approval, Artifact, ArtifactType, AuditSummaryItem, CiResult,
    CodexSession, DangerousEvent, GroupKind, Hierarchy, KpiSnapshot, LeaderboardItem, Mission,
    PlanSignal, PlanStep, PlanSummary, Promotion, ReleaseStatus, RunMode, ServerMeta,
    ServerStatus, Signal, Signoff, Task, TaskGroup, TestHistoryEntry, UiAuditArtifact,
    UiAuditSummary, UiCoverage, WorkStatus,
};

pub const NOT_AVAILABLE: &str = "n/a";

/// Normalizes payloads against a fixed clock so repeated calls on the same
/// input produce identical output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
    now: DateTime<Utc>,
}

impl Normalizer {
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    #[must_use]
    pub fn now_iso(&self) -> String {
        self.now.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    #[must_use]
    pub fn kpi(&self, raw: &Value) -> KpiSnapshot {
        KpiSnapshot {
            dangerous_without_approval: count(raw, "dangerous_without_approval"),
            total_approvals: count(raw, "total_approvals"),
            pending_approvals: count(raw, "pending_approvals"),
            ci_success_rate: percent(raw, "ci_success_rate").unwrap_or(0.0),
            last_updated: self.timestamp(raw, "last_updated"),
            health_score: number(raw, "health_score"),
            hash_drift_alert: opt_count(raw, "hash_drift_alert"),
            audit_failures: opt_count(raw, "audit_failures"),
            self_heal_cycles: opt_count(raw, "self_heal_cycles"),
            override_alerts: opt_count(raw, "override_alerts"),
        }
    }

    /// `{ content: "<markdown table>" }` from `/api/approvals`.
    #[must_use]
    pub fn approvals(&self, raw: &Value) -> Vec<Approval> {
        field(raw, "content").and_then(Value::as_str).map(parse_approvals).unwrap_or_default()
    }

    #[must_use]
    pub fn plan_summary(&self, raw: &Value) -> PlanSummary {
        PlanSummary {
            diff: objects(raw, "diff")
                .map(|step| PlanStep {
                    id: text_or(step, "id", "step"),
                    status: text(step, "status"),
                    description: opt_text(step, "description").unwrap_or_default(),
                    entries: strings(step, "entries"),
                })
                .collect(),
            signals: objects(raw, "signals").map(plan_signal).collect(),
        }
    }

    #[must_use]
    pub fn ci_result(&self, raw: &Value) -> CiResult {
        CiResult {
            operation: text(raw, "operation"),
            success: flag(raw, "success"),
            timestamp: self.timestamp(raw, "timestamp"),
        }
    }

    #[must_use]
    pub fn server_status(&self, raw: &Value) -> ServerStatus {
        ServerStatus {
            meta: ServerMeta {
                server_version: text(raw, "server_version"),
                uptime_seconds: count(raw, "uptime_seconds"),
            },
            cli_sessions: objects(raw, "cli_sessions")
                .map(|session| CodexSession {
                    session_id: text(session, "session_id"),
                    phase: text(session, "phase"),
                    role: text(session, "role"),
                    started_at: opt_text(session, "started_at"),
                    exited_at: opt_text(session, "exited_at"),
                })
                .collect(),
        }
    }

    /// Top-level array from `/api/competitions/list`.
    #[must_use]
    pub fn leaderboard(&self, raw: &Value) -> Vec<LeaderboardItem> {
        items(raw)
            .map(|item| LeaderboardItem {
                run_id: text(item, "run_id"),
                total: number(item, "total"),
                tests_pass_rate: percent(item, "tests_pass_rate"),
            })
            .collect()
    }

    #[must_use]
    pub fn agents_status(&self, raw: &Value) -> AgentsStatus {
        AgentsStatus {
            online: count(raw, "online"),
            agents: objects(raw, "agents")
                .map(|agent| AgentInfo { name: text(agent, "name"), status: text(agent, "status") })
                .collect(),
        }
    }

    /// `{ items: [...] }` from `/api/test/history`.
    #[must_use]
    pub fn test_history(&self, raw: &Value) -> Vec<TestHistoryEntry> {
        objects(raw, "items")
            .map(|entry| TestHistoryEntry {
                ts: self.timestamp(entry, "ts"),
                operation: text(entry, "operation"),
                success: flag(entry, "success"),
            })
            .collect()
    }

    /// `{ items: [...] }` from `/api/safeops/audit_summary`.
    #[must_use]
    pub fn audit_summary(&self, raw: &Value) -> Vec<AuditSummaryItem> {
        objects(raw, "items")
            .map(|item| AuditSummaryItem {
                ts: self.timestamp(item, "ts"),
                op: text(item, "op"),
                success: flag(item, "success"),
                details: field(item, "details")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_else(Map::new),
            })
            .collect()
    }

    /// Top-level array from `/api/safeops/events`.
    #[must_use]
    pub fn dangerous_events(&self, raw: &Value) -> Vec<DangerousEvent> {
        items(raw)
            .map(|event| DangerousEvent {
                ts: self.timestamp(event, "ts"),
                id: ident(event, "id"),
                note: text(event, "note"),
                command: text(event, "command"),
                approvals_id: text(event, "approvals_id"),
                overridden: flag(event, "override"),
                result: text(event, "result"),
            })
            .collect()
    }

    #[must_use]
    pub fn release_status(&self, raw: &Value) -> ReleaseStatus {
        ReleaseStatus {
            kpi: field(raw, "kpi").filter(|kpi| kpi.is_object()).map(|kpi| self.kpi(kpi)),
            signoffs: objects(raw, "signoffs")
                .map(|entry| Signoff {
                    reviewer: text(entry, "reviewer"),
                    notes: opt_text(entry, "notes").unwrap_or_default(),
                    timestamp: self.timestamp(entry, "timestamp"),
                })
                .collect(),
            promotions: objects(raw, "promotions")
                .map(|entry| Promotion {
                    ts: self.timestamp(entry, "ts"),
                    stage: text(entry, "stage"),
                    status: text(entry, "status"),
                    note: opt_text(entry, "note").unwrap_or_default(),
                })
                .collect(),
        }
    }

    /// Top-level array from `/api/ui_audit/list`.
    #[must_use]
    pub fn ui_audits(&self, raw: &Value) -> Vec<UiAuditArtifact> {
        items(raw)
            .map(|artifact| UiAuditArtifact {
                name: text(artifact, "name"),
                path: text(artifact, "path"),
            })
            .collect()
    }

    /// Metrics may be nested under `metrics` or sit at the top level; the
    /// nested value wins when both exist.
    #[must_use]
    pub fn ui_audit_summary(&self, raw: &Value) -> UiAuditSummary {
        let nested = field(raw, "metrics").unwrap_or(&Value::Null);
        let pick = |key: &str| number(nested, key).or_else(|| number(raw, key));
        UiAuditSummary {
            axe_issues_count: opt_count(nested, "axe_issues_count")
                .or_else(|| opt_count(raw, "axe_issues_count")),
            lcp_ms: pick("lcp_ms"),
            tti_ms: pick("tti_ms"),
            cls: pick("cls"),
            visual_diff_pct: pick("visual_diff_pct"),
        }
    }

    /// Istanbul-style `{ total: { statements: { pct } , ... } }`.
    #[must_use]
    pub fn ui_coverage(&self, raw: &Value) -> UiCoverage {
        let total = field(raw, "total").unwrap_or(&Value::Null);
        let pct = |key: &str| field(total, key).and_then(|metric| percent(metric, "pct"));
        UiCoverage {
            statements_pct: pct("statements"),
            branches_pct: pct("branches"),
            functions_pct: pct("functions"),
            lines_pct: pct("lines"),
        }
    }

    /// Top-level mission array from `/api/missions`. Missions may embed
    /// `task_groups[].tasks[].artifacts[]`; nested rows inherit their parent's
    /// id as foreign key when they do not carry one.
    #[must_use]
    pub fn hierarchy(&self, raw: &Value) -> Hierarchy {
        let mut hierarchy = Hierarchy::default();
        for mission in items(raw) {
            let mission = self.mission(mission, &mut hierarchy);
            hierarchy.missions.push(mission);
        }
        hierarchy
    }

    fn mission(&self, raw: &Value, hierarchy: &mut Hierarchy) -> Mission {
        let mission = Mission {
            id: ident(raw, "id"),
            title: text(raw, "title"),
            status: WorkStatus::from_raw(&opt_text(raw, "status").unwrap_or_default()),
            owner: text(raw, "owner"),
            run_mode: RunMode::from_raw(&opt_text(raw, "run_mode").unwrap_or_default()),
            updated_at: self.timestamp(raw, "updated_at"),
        };

        for raw_group in objects(raw, "task_groups") {
            let group = task_group(raw_group, &mission.id);
            for raw_task in objects(raw_group, "tasks") {
                let task = task_row(raw_task, &group.id);
                for raw_artifact in objects(raw_task, "artifacts") {
                    hierarchy.artifacts.push(artifact_row(raw_artifact, &task.id));
                }
                hierarchy.tasks.push(task);
            }
            hierarchy.groups.push(group);
        }
        mission
    }

    /// `{ signals: [...] }` from `/api/signals`.
    #[must_use]
    pub fn signals(&self, raw: &Value) -> Vec<Signal> {
        objects(raw, "signals")
            .map(|signal| Signal {
                id: ident(signal, "id"),
                signal_type: text(signal, "type"),
                severity: text(signal, "severity"),
                status: text(signal, "status"),
                created_at: self.timestamp(signal, "created_at"),
                message: opt_text(signal, "message"),
            })
            .collect()
    }

    fn timestamp(&self, raw: &Value, key: &str) -> String {
        match field(raw, key) {
            Some(Value::String(value)) if !value.trim().is_empty() => value.clone(),
            Some(Value::Number(value)) => value
                .as_i64()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true))
                .unwrap_or_else(|| self.now_iso()),
            _ => self.now_iso(),
        }
    }
}

fn plan_signal(raw: &Value) -> PlanSignal {
    PlanSignal {
        source: text(raw, "source"),
        summary: text(raw, "summary"),
        path: text(raw, "path"),
    }
}

fn task_group(raw: &Value, mission_id: &str) -> TaskGroup {
    TaskGroup {
        id: ident(raw, "id"),
        mission_id: opt_text(raw, "mission_id").unwrap_or_else(|| mission_id.to_string()),
        title: text(raw, "title"),
        kind: GroupKind::from_raw(&opt_text(raw, "kind").unwrap_or_default()),
        status: WorkStatus::from_raw(&opt_text(raw, "status").unwrap_or_default()),
        order: field(raw, "order").and_then(Value::as_i64).unwrap_or(0),
        started_at: opt_text(raw, "started_at"),
        finished_at: opt_text(raw, "finished_at"),
    }
}

fn task_row(raw: &Value, group_id: &str) -> Task {
    Task {
        id: ident(raw, "id"),
        group_id: opt_text(raw, "group_id").unwrap_or_else(|| group_id.to_string()),
        title: text(raw, "title"),
        status: WorkStatus::from_raw(&opt_text(raw, "status").unwrap_or_default()),
        agent: text(raw, "agent"),
    }
}

fn artifact_row(raw: &Value, task_id: &str) -> Artifact {
    Artifact {
        id: ident(raw, "id"),
        task_id: opt_text(raw, "task_id").unwrap_or_else(|| task_id.to_string()),
        artifact_type: ArtifactType::from_raw(&opt_text(raw, "type").unwrap_or_default()),
        scope: text(raw, "scope"),
        version: text(raw, "version"),
        sha: opt_text(raw, "sha").or_else(|| opt_text(raw, "sha256")).unwrap_or_else(na),
        tags: strings(raw, "tags"),
    }
}

fn na() -> String {
    NOT_AVAILABLE.to_string()
}

fn field<'a>(raw: &'a Value, key: &str) -> Option<&'a Value> {
    raw.as_object()?.get(key)
}

fn items(raw: &Value) -> impl Iterator<Item = &Value> {
    raw.as_array().into_iter().flatten().filter(|item| item.is_object())
}

fn objects<'a>(raw: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    field(raw, key).map(items).into_iter().flatten()
}

fn opt_text(raw: &Value, key: &str) -> Option<String> {
    field(raw, key)
        .and_then(Value::as_str)
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
}

/// Like [`text`], but numeric identifiers are accepted as well.
fn ident(raw: &Value, key: &str) -> String {
    match field(raw, key) {
        Some(Value::Number(value)) => value.to_string(),
        _ => text(raw, key),
    }
}

fn text(raw: &Value, key: &str) -> String {
    opt_text(raw, key).unwrap_or_else(na)
}

fn text_or(raw: &Value, key: &str, fallback: &str) -> String {
    opt_text(raw, key).unwrap_or_else(|| fallback.to_string())
}

fn strings(raw: &Value, key: &str) -> Vec<String> {
    field(raw, key)
        .and_then(Value::as_array)
        .map(|values| values.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn flag(raw: &Value, key: &str) -> bool {
    field(raw, key).and_then(Value::as_bool).unwrap_or(false)
}

fn number(raw: &Value, key: &str) -> Option<f64> {
    field(raw, key).and_then(Value::as_f64).filter(|value| value.is_finite())
}

fn percent(raw: &Value, key: &str) -> Option<f64> {
    number(raw, key).map(|value| value.clamp(0.0, 100.0))
}

/// Non-negative integer view of a JSON number; negatives clamp to zero and
/// fractions truncate.
fn opt_count(raw: &Value, key: &str) -> Option<u64> {
    let value = field(raw, key)?;
    value.as_u64().or_else(|| value.as_f64().filter(|v| v.is_finite()).map(|v| v.max(0.0) as u64))
}

fn count(raw: &Value, key: &str) -> u64 {
    opt_count(raw, key).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn normalizer() -> Normalizer {
        Normalizer::at(Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap())
    }

    #[test]
    fn kpi_keeps_well_typed_fields() {
        let kpi = normalizer().kpi(&json!({
            "dangerous_without_approval": 1,
            "total_approvals": 5,
            "pending_approvals": 2,
            "ci_success_rate": 95.5,
            "last_updated": "2025-01-01T00:00:00Z",
            "hash_drift_alert": 3,
        }));

        assert_eq!(kpi.total_approvals, 5);
        assert_eq!(kpi.pending_approvals, 2);
        assert_eq!(kpi.ci_success_rate, 95.5);
        assert_eq!(kpi.last_updated, "2025-01-01T00:00:00Z");
        assert_eq!(kpi.hash_drift_alert, Some(3));
        assert_eq!(kpi.override_alerts, None);
    }

    #[test]
    fn kpi_coerces_bad_values_to_defaults() {
        let kpi = normalizer().kpi(&json!({
            "dangerous_without_approval": -4,
            "total_approvals": "seven",
            "ci_success_rate": 180,
            "last_updated": 12,
        }));

        assert_eq!(kpi.dangerous_without_approval, 0);
        assert_eq!(kpi.total_approvals, 0);
        assert_eq!(kpi.ci_success_rate, 100.0);
        assert_eq!(kpi.last_updated, "1970-01-01T00:00:00.012Z");
    }

    #[test]
    fn non_object_payloads_degrade_to_all_defaults() {
        let normalizer = normalizer();
        for raw in [Value::Null, json!(42), json!("text"), json!([1, 2, 3])] {
            let kpi = normalizer.kpi(&raw);
            assert_eq!(kpi, KpiSnapshot::zeroed("2025-01-02T03:04:05.000Z"));

            let status = normalizer.server_status(&raw);
            assert_eq!(status.meta, ServerMeta::unknown());
            assert!(status.cli_sessions.is_empty());

            assert!(normalizer.approvals(&raw).is_empty());
            assert_eq!(normalizer.plan_summary(&raw), PlanSummary::default());
            assert_eq!(normalizer.release_status(&raw), ReleaseStatus::default());
            assert_eq!(normalizer.ui_coverage(&raw), UiCoverage::default());
            assert!(normalizer.signals(&raw).is_empty());
        }
    }

    #[test]
    fn mistyped_lists_become_empty() {
        let normalizer = normalizer();
        assert!(normalizer.test_history(&json!({ "items": "nope" })).is_empty());
        assert!(normalizer.audit_summary(&json!({ "items": { "op": "x" } })).is_empty());
        assert!(normalizer.dangerous_events(&json!({ "events": [] })).is_empty());
        assert!(normalizer.leaderboard(&json!({ "run_id": "r" })).is_empty());

        let summary = normalizer.plan_summary(&json!({ "diff": 3, "signals": null }));
        assert!(summary.diff.is_empty());
        assert!(summary.signals.is_empty());
    }

    #[test]
    fn missing_strings_become_not_available() {
        let session = &normalizer().server_status(&json!({ "cli_sessions": [{}] })).cli_sessions[0];
        assert_eq!(session.session_id, NOT_AVAILABLE);
        assert_eq!(session.phase, NOT_AVAILABLE);
        assert_eq!(session.started_at, None);
    }

    #[test]
    fn ci_result_accepts_epoch_millis() {
        let ci = normalizer().ci_result(&json!({
            "operation": "pytest",
            "success": true,
            "timestamp": 1_735_689_600_000_i64,
        }));
        assert_eq!(ci.operation, "pytest");
        assert!(ci.success);
        assert_eq!(ci.timestamp, "2025-01-01T00:00:00.000Z");
    }

    #[test]
    fn ui_audit_summary_prefers_nested_metrics() {
        let summary = normalizer().ui_audit_summary(&json!({
            "metrics": { "lcp_ms": 900.0, "axe_issues_count": 2 },
            "lcp_ms": 1500.0,
            "cls": 0.02,
        }));
        assert_eq!(summary.lcp_ms, Some(900.0));
        assert_eq!(summary.axe_issues_count, Some(2));
        assert_eq!(summary.cls, Some(0.02));
        assert_eq!(summary.tti_ms, None);
    }

    #[test]
    fn coverage_reads_istanbul_totals() {
        let coverage = normalizer().ui_coverage(&json!({
            "total": { "statements": { "pct": 81.5 }, "lines": { "pct": "high" } }
        }));
        assert_eq!(coverage.statements_pct, Some(81.5));
        assert_eq!(coverage.lines_pct, None);
    }

    #[test]
    fn hierarchy_fills_defaults_and_flattens_nested_rows() {
        let hierarchy = normalizer().hierarchy(&json!([
            {
                "id": "M-1",
                "title": "X",
                "status": "running",
                "task_groups": [
                    {
                        "id": "G-1",
                        "order": 2,
                        "kind": "parallel",
                        "tasks": [
                            { "id": "T-1", "artifacts": [{ "id": "A-1", "sha256": "abc", "tags": ["ui", 3] }] }
                        ]
                    }
                ]
            },
            "not-a-mission"
        ]));

        assert_eq!(hierarchy.missions.len(), 1);
        let mission = &hierarchy.missions[0];
        assert_eq!(mission.title, "X");
        assert_eq!(mission.status, WorkStatus::Running);
        assert_eq!(mission.owner, NOT_AVAILABLE);
        assert_eq!(mission.run_mode, RunMode::Sequential);
        assert_eq!(mission.updated_at, "2025-01-02T03:04:05.000Z");

        assert_eq!(hierarchy.groups[0].mission_id, "M-1");
        assert_eq!(hierarchy.groups[0].kind, GroupKind::Parallel);
        assert_eq!(hierarchy.tasks[0].group_id, "G-1");
        assert_eq!(hierarchy.artifacts[0].task_id, "T-1");
        assert_eq!(hierarchy.artifacts[0].sha, "abc");
        assert_eq!(hierarchy.artifacts[0].tags, vec!["ui"]);
    }

    #[test]
    fn normalizing_twice_is_identical() {
        let normalizer = normalizer();
        let raw = json!({
            "kpi": { "total_approvals": 3 },
            "signoffs": [{ "reviewer": "r" }],
            "promotions": [{ "stage": "production" }, 5],
        });
        assert_eq!(normalizer.release_status(&raw), normalizer.release_status(&raw));

        let missions = json!([{ "id": "M-1" }, { "title": 4 }]);
        assert_eq!(normalizer.hierarchy(&missions), normalizer.hierarchy(&missions));
    }
}
