use safeops_core::ApprovalStatus;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/orchestrator/plan`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub task_id: String,
    pub goal: String,
    pub dry_run: bool,
}

impl PlanRequest {
    #[must_use]
    pub fn dry_run(goal: impl Into<String>, sent_at_ms: u64) -> Self {
        Self { task_id: format!("plan_{sent_at_ms}"), goal: goal.into(), dry_run: true }
    }
}

/// Body of `POST /api/safeops/guard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardRequest {
    pub dry_run: bool,
}

/// Body of `POST /api/approvals/update`; one ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalUpdate {
    pub appr_id: String,
    pub task_id: String,
    pub status: ApprovalStatus,
    pub requested_by: String,
    pub approver: String,
    pub ts_req: String,
}

/// Body of `POST /api/manual/signoff`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignoffRequest {
    pub reviewer: String,
    pub notes: String,
}

/// Body of `POST /api/agents/run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRunRequest {
    pub role: String,
    pub phase: String,
    pub dry_run: bool,
}

impl AgentRunRequest {
    #[must_use]
    pub fn self_heal() -> Self {
        Self { role: "audit".to_string(), phase: "self_heal".to_string(), dry_run: false }
    }
}

/// Body of `POST /api/orchestrator/promotion`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionRequest {
    pub task_id: String,
    pub stage: String,
    pub dry_run: bool,
}

impl PromotionRequest {
    #[must_use]
    pub fn production(dry_run: bool, sent_at_ms: u64) -> Self {
        Self {
            task_id: format!("release_{sent_at_ms}"),
            stage: "production".to_string(),
            dry_run,
        }
    }
}

/// Optional acknowledgement returned by action endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReceipt {
    #[serde(default)]
    pub session_id: Option<String>,
}

/// One event of `/api/competitions/{id}/events`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompetitionEvent {
    #[serde(default)]
    pub progress: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plan_request_wire_shape() {
        let body = serde_json::to_value(PlanRequest::dry_run("SafeOps UI plan", 42)).unwrap();
        assert_eq!(body, json!({ "task_id": "plan_42", "goal": "SafeOps UI plan", "dry_run": true }));
    }

    #[test]
    fn approval_update_uses_lowercase_status() {
        let update = ApprovalUpdate {
            appr_id: "A-1".to_string(),
            task_id: "T-1".to_string(),
            status: ApprovalStatus::Approved,
            requested_by: "alice".to_string(),
            approver: "bob".to_string(),
            ts_req: "2025-01-01T00:00:00Z".to_string(),
        };
        let body = serde_json::to_value(&update).unwrap();
        assert_eq!(body["status"], "approved");
    }

    #[test]
    fn receipts_and_events_tolerate_missing_fields() {
        let receipt: ActionReceipt = serde_json::from_str("{}").unwrap();
        assert_eq!(receipt.session_id, None);

        let event: CompetitionEvent = serde_json::from_str(r#"{"note":"tick"}"#).unwrap();
        assert_eq!(event.progress, 0.0);
    }
}
