//! Built-in sample data shown when the backend is unreachable or empty.

use crate::model::{
    Artifact, ArtifactType, GroupKind, Hierarchy, Mission, PlanSignal, RunMode, Task, TaskGroup,
    WorkStatus,
};

#[must_use]
pub fn fallback_hierarchy() -> Hierarchy {
    Hierarchy {
        missions: vec![
            mission(
                "M-001",
                "Inbox i18n rollout",
                WorkStatus::Running,
                "Hayashi",
                RunMode::Sequential,
                "2025-11-28T07:00:00Z",
            ),
            mission(
                "M-002",
                "Self-heal hardening",
                WorkStatus::Pending,
                "Sato",
                RunMode::Parallel,
                "2025-11-27T15:30:00Z",
            ),
        ],
        groups: vec![
            TaskGroup {
                id: "G-101".to_string(),
                mission_id: "M-001".to_string(),
                title: "Gateway".to_string(),
                kind: GroupKind::Sequential,
                status: WorkStatus::Completed,
                order: 1,
                started_at: Some("2025-11-28T06:00:00Z".to_string()),
                finished_at: Some("2025-11-28T06:30:00Z".to_string()),
            },
            TaskGroup {
                id: "G-102".to_string(),
                mission_id: "M-001".to_string(),
                title: "UI Gate".to_string(),
                kind: GroupKind::Parallel,
                status: WorkStatus::Running,
                order: 2,
                started_at: Some("2025-11-28T06:40:00Z".to_string()),
                finished_at: None,
            },
            TaskGroup {
                id: "G-201".to_string(),
                mission_id: "M-002".to_string(),
                title: "Plan authoring".to_string(),
                kind: GroupKind::Sequential,
                status: WorkStatus::Pending,
                order: 1,
                started_at: None,
                finished_at: None,
            },
        ],
        tasks: vec![
            task("T-1", "G-102", "Run Playwright JA", WorkStatus::Running, "QA-Bot"),
            task("T-2", "G-102", "Run Playwright EN", WorkStatus::Pending, "QA-Bot"),
            task("T-3", "G-201", "Draft spec", WorkStatus::Pending, "Planner"),
        ],
        artifacts: vec![
            artifact("A-1", "T-1", ArtifactType::Test, "abc1234", &["playwright", "ui-audit"]),
            artifact("A-2", "T-1", ArtifactType::Screenshot, "def5678", &["ui", "manager"]),
        ],
    }
}

/// Plan signals shown while `/api/plan/summary` has reported none.
#[must_use]
pub fn fallback_plan_signals() -> Vec<PlanSignal> {
    [
        ("Git", "See artifacts/git_scan.json", "artifacts/git_scan.json"),
        (
            "Design",
            "Latest snapshot in artifacts/design_ui/design_snapshot.json",
            "artifacts/design_ui/design_snapshot.json",
        ),
        ("Web", "Snapshot in artifacts/web_verify/latest.json", "artifacts/web_verify/latest.json"),
    ]
    .into_iter()
    .map(|(source, summary, path)| PlanSignal {
        source: source.to_string(),
        summary: summary.to_string(),
        path: path.to_string(),
    })
    .collect()
}

fn mission(
    id: &str,
    title: &str,
    status: WorkStatus,
    owner: &str,
    run_mode: RunMode,
    updated_at: &str,
) -> Mission {
    Mission {
        id: id.to_string(),
        title: title.to_string(),
        status,
        owner: owner.to_string(),
        run_mode,
        updated_at: updated_at.to_string(),
    }
}

fn task(id: &str, group_id: &str, title: &str, status: WorkStatus, agent: &str) -> Task {
    Task {
        id: id.to_string(),
        group_id: group_id.to_string(),
        title: title.to_string(),
        status,
        agent: agent.to_string(),
    }
}

fn artifact(
    id: &str,
    task_id: &str,
    artifact_type: ArtifactType,
    sha: &str,
    tags: &[&str],
) -> Artifact {
    Artifact {
        id: id.to_string(),
        task_id: task_id.to_string(),
        artifact_type,
        scope: "project".to_string(),
        version: "v1.0".to_string(),
        sha: sha.to_string(),
        tags: tags.iter().map(|tag| (*tag).to_string()).collect(),
    }
}
