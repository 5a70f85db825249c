//! Values derived from the held view model for display.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::locale::{DashboardLabels, ManagerLabels};
use crate::mock::fallback_plan_signals;
use crate::model::{
    Approval, ApprovalStatus, DangerousEvent, DashboardView, Mission, PlanSignal, PlanStep,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    Success,
    Warning,
    Danger,
    Primary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeroMetric {
    pub label: &'static str,
    pub value: f64,
    pub tone: Tone,
}

#[must_use]
pub fn pending_approvals(approvals: &[Approval]) -> usize {
    approvals.iter().filter(|approval| approval.status == ApprovalStatus::Pending).count()
}

#[must_use]
pub fn override_count(events: &[DangerousEvent]) -> usize {
    events.iter().filter(|event| event.overridden).count()
}

/// The six headline tiles. The first three form the "top KPI" card.
#[must_use]
pub fn hero_metrics(view: &DashboardView) -> Vec<HeroMetric> {
    let kpi = view.kpi.as_ref();
    let ci = kpi.map_or(0.0, |kpi| kpi.ci_success_rate);
    let drift = kpi.and_then(|kpi| kpi.hash_drift_alert).unwrap_or(0);
    let dangerous = kpi.map_or(0, |kpi| kpi.dangerous_without_approval);
    let overrides = kpi
        .and_then(|kpi| kpi.override_alerts)
        .unwrap_or_else(|| override_count(&view.dangerous_events) as u64);
    let pending = pending_approvals(&view.approvals) as u64;
    let self_heal = kpi.and_then(|kpi| kpi.self_heal_cycles).unwrap_or(0);

    let alarm = |value: u64, tone: Tone| if value > 0 { tone } else { Tone::Success };
    vec![
        HeroMetric {
            label: "CI Success %",
            value: ci,
            tone: if ci >= 80.0 { Tone::Success } else { Tone::Warning },
        },
        HeroMetric {
            label: "Hash Drift Alerts",
            value: drift as f64,
            tone: alarm(drift, Tone::Danger),
        },
        HeroMetric {
            label: "Dangerous w/o Approval",
            value: dangerous as f64,
            tone: alarm(dangerous, Tone::Danger),
        },
        HeroMetric {
            label: "Override Alerts",
            value: overrides as f64,
            tone: alarm(overrides, Tone::Warning),
        },
        HeroMetric {
            label: "Approvals Pending",
            value: pending as f64,
            tone: alarm(pending, Tone::Warning),
        },
        HeroMetric { label: "Self-Heal Cycles", value: self_heal as f64, tone: Tone::Primary },
    ]
}

/// Signals reported by the plan summary, or the built-in pointers when none
/// have been reported yet.
#[must_use]
pub fn plan_signals(view: &DashboardView) -> Vec<PlanSignal> {
    match &view.plan_summary {
        Some(summary) if !summary.signals.is_empty() => summary.signals.clone(),
        _ => fallback_plan_signals(),
    }
}

#[must_use]
pub fn render_plan_diff(steps: &[PlanStep], labels: &DashboardLabels) -> String {
    if steps.is_empty() {
        return labels.no_plan_diff.to_string();
    }

    steps
        .iter()
        .map(|step| {
            let mut lines = vec![format!("# {}", step.id), format!("status: {}", step.status)];
            if !step.description.is_empty() {
                lines.push(step.description.clone());
            }
            lines.extend(step.entries.iter().map(|entry| format!("+ {entry}")));
            lines.join("\n")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Locale-independent timestamp rendering: `2025-01-01 00:00:00.000 UTC`.
/// Empty input renders as an em dash; unparseable input is echoed back.
#[must_use]
pub fn format_iso(raw: &str) -> String {
    if raw.trim().is_empty() {
        return "—".to_string();
    }
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(at) => at.with_timezone(&Utc).format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string(),
        Err(_) => raw.to_string(),
    }
}

#[must_use]
pub fn format_duration(seconds: Option<u64>) -> String {
    match seconds {
        Some(seconds) => format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60),
        None => "n/a".to_string(),
    }
}

/// Case-insensitive title search. An empty query keeps everything.
#[must_use]
pub fn filter_missions(missions: &[Mission], query: &str) -> Vec<Mission> {
    let needle = query.trim().to_lowercase();
    missions
        .iter()
        .filter(|mission| mission.title.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissionMessage {
    pub id: String,
    pub title: String,
    pub body: String,
    pub ts: String,
}

/// One update line for each of the first three missions.
#[must_use]
pub fn mission_messages(missions: &[Mission], labels: &ManagerLabels) -> Vec<MissionMessage> {
    missions
        .iter()
        .take(3)
        .enumerate()
        .map(|(index, mission)| MissionMessage {
            id: format!("msg-{}-{index}", mission.id),
            title: format!("{} - update", mission.title),
            body: format!(
                "{} @ {}",
                labels.status(mission.status),
                format_iso(&mission.updated_at)
            ),
            ts: mission.updated_at.clone(),
        })
        .collect()
}
