//! User-initiated writes against the dashboard backend.

use safeops_core::{ApprovalStatus, now_ms, now_rfc3339};
use safeops_protocol::{
    ActionReceipt, AgentRunRequest, ApprovalUpdate, GuardRequest, PlanRequest, PromotionRequest,
    SignoffRequest,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::dashboard::Dashboard;
use crate::error::ActionError;

pub const DEFAULT_PLAN_GOAL: &str = "SafeOps UI plan";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// Transient outcome of an action, meant to be shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NotificationLevel::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NotificationLevel::Error, message: message.into() }
    }

    pub fn is_success(&self) -> bool {
        self.level == NotificationLevel::Success
    }
}

/// Approval ledger row as entered by an operator; the request time is
/// stamped on submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalForm {
    pub appr_id: String,
    pub task_id: String,
    pub status: ApprovalStatus,
    pub requested_by: String,
    pub approver: String,
}

impl Default for ApprovalForm {
    fn default() -> Self {
        Self {
            appr_id: String::new(),
            task_id: String::new(),
            status: ApprovalStatus::Approved,
            requested_by: String::new(),
            approver: String::new(),
        }
    }
}

impl Dashboard {
    /// Records a dry-run plan, then runs the SafeOps guard.
    pub async fn plan_and_guard(&self, goal: &str) -> Notification {
        let outcome = async {
            let plan = PlanRequest::dry_run(goal, now_ms());
            self.post("plan", "/api/orchestrator/plan", &plan).await?;
            self.post("guard", "/api/safeops/guard", &GuardRequest { dry_run: false }).await?;
            Ok::<_, ActionError>("PLAN + SafeOps Guard recorded".to_string())
        }
        .await;
        self.conclude(outcome, "PLAN or SafeOps Guard failed", true).await
    }

    pub async fn update_approval(&self, form: ApprovalForm) -> Notification {
        let outcome = async {
            let appr_id = required("appr_id", &form.appr_id)?;
            let task_id = required("task_id", &form.task_id)?;
            let update = ApprovalUpdate {
                appr_id,
                task_id,
                status: form.status,
                requested_by: form.requested_by.trim().to_string(),
                approver: form.approver.trim().to_string(),
                ts_req: now_rfc3339(),
            };
            self.post("approval update", "/api/approvals/update", &update).await?;
            Ok::<_, ActionError>("APPROVALS.md updated".to_string())
        }
        .await;
        self.conclude(outcome, "APPROVALS update failed", true).await
    }

    pub async fn manual_signoff(&self, reviewer: &str, notes: &str) -> Notification {
        let outcome = async {
            let reviewer = required("reviewer", reviewer)?;
            let request = SignoffRequest { reviewer, notes: notes.to_string() };
            self.post("sign-off", "/api/manual/signoff", &request).await?;
            Ok::<_, ActionError>("Manual sign-off recorded".to_string())
        }
        .await;
        self.conclude(outcome, "Manual sign-off failed", true).await
    }

    pub async fn self_heal(&self) -> Notification {
        let outcome = async {
            self.post("self-heal", "/api/agents/run", &AgentRunRequest::self_heal()).await?;
            Ok::<_, ActionError>("Self-Heal request sent".to_string())
        }
        .await;
        self.conclude(outcome, "Self-Heal run failed", true).await
    }

    /// Promotes to production, or rehearses it when `dry_run` is set. The
    /// dashboard is not refreshed afterwards.
    pub async fn promote(&self, dry_run: bool) -> Notification {
        let outcome = async {
            let request = PromotionRequest::production(dry_run, now_ms());
            let reply = self.post("promotion", "/api/orchestrator/promotion", &request).await?;
            let receipt: ActionReceipt = serde_json::from_value(reply).unwrap_or_default();
            Ok::<_, ActionError>(match receipt.session_id.filter(|id| !id.is_empty()) {
                Some(session) => format!("Release session: {session}"),
                None if dry_run => "Release dry-run started".to_string(),
                None => "Release started".to_string(),
            })
        }
        .await;
        let failure = if dry_run { "Release dry-run failed" } else { "Release failed" };
        self.conclude(outcome, failure, false).await
    }

    async fn post<B>(
        &self,
        action: &'static str,
        path: &str,
        body: &B,
    ) -> Result<Value, ActionError>
    where
        B: Serialize + ?Sized,
    {
        self.fetcher
            .post_json(path, body)
            .await
            .map_err(|source| ActionError::Request { action, source })
    }

    async fn conclude(
        &self,
        outcome: Result<String, ActionError>,
        failure: &str,
        refresh: bool,
    ) -> Notification {
        match outcome {
            Ok(message) => {
                info!(%message, "action succeeded");
                if refresh {
                    self.refresh().await;
                }
                Notification::success(message)
            }
            Err(err @ ActionError::MissingField(_)) => {
                warn!(error = %err, "action rejected");
                Notification::error(err.to_string())
            }
            Err(err) => {
                warn!(error = %err, "action failed");
                Notification::error(format!("{failure} ({err})"))
            }
        }
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ActionError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ActionError::MissingField(field));
    }
    Ok(value.to_string())
}
