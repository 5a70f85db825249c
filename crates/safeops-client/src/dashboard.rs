//! Periodic aggregation of the SafeOps backend into one view model.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use safeops_core::{DashboardView, KpiSnapshot, Normalizer, ServerMeta};
use safeops_protocol::CompetitionEvent;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::fetch::Fetcher;
use crate::sse::{SseHandle, consume_sse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Kpi,
    Approvals,
    PlanSummary,
    LastCi,
    OrchestratorStatus,
    Leaderboard,
    AgentsStatus,
    TestHistory,
    AuditSummary,
    DangerousEvents,
    ReleaseStatus,
    UiAuditList,
    UiAuditSummary,
    UiCoverage,
}

impl Endpoint {
    /// The batch issued by every refresh cycle.
    pub const ALL: [Endpoint; 14] = [
        Endpoint::Kpi,
        Endpoint::Approvals,
        Endpoint::PlanSummary,
        Endpoint::LastCi,
        Endpoint::OrchestratorStatus,
        Endpoint::Leaderboard,
        Endpoint::AgentsStatus,
        Endpoint::TestHistory,
        Endpoint::AuditSummary,
        Endpoint::DangerousEvents,
        Endpoint::ReleaseStatus,
        Endpoint::UiAuditList,
        Endpoint::UiAuditSummary,
        Endpoint::UiCoverage,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Self::Kpi => "/api/safeops/kpi",
            Self::Approvals => "/api/approvals",
            Self::PlanSummary => "/api/plan/summary",
            Self::LastCi => "/api/orchestrator/last-ci",
            Self::OrchestratorStatus => "/api/orchestrator/status",
            Self::Leaderboard => "/api/competitions/list",
            Self::AgentsStatus => "/api/agents/status",
            Self::TestHistory => "/api/test/history",
            Self::AuditSummary => "/api/safeops/audit_summary",
            Self::DangerousEvents => "/api/safeops/events",
            Self::ReleaseStatus => "/api/release/status",
            Self::UiAuditList => "/api/ui_audit/list",
            Self::UiAuditSummary => "/api/ui_audit/summary",
            Self::UiCoverage => "/api/ui_audit/coverage/ui",
        }
    }
}

/// The held view model plus the bookkeeping needed to merge into it.
#[derive(Debug, Default)]
pub struct DashboardState {
    view: DashboardView,
    /// Generation of the cycle that last wrote each endpoint's fields.
    applied: HashMap<Endpoint, u64>,
    unmounted: bool,
}

impl DashboardState {
    pub fn view(&self) -> &DashboardView {
        &self.view
    }

    pub fn is_mounted(&self) -> bool {
        !self.unmounted
    }

    /// Normalizes `raw` into the fields owned by `endpoint`. Returns `false`
    /// and leaves the view untouched when a newer cycle already wrote them.
    pub fn apply(
        &mut self,
        endpoint: Endpoint,
        generation: u64,
        raw: &Value,
        normalizer: &Normalizer,
    ) -> bool {
        if self.applied.get(&endpoint).is_some_and(|&latest| latest > generation) {
            debug!(endpoint = %endpoint.path(), generation, "discarding stale result");
            return false;
        }
        self.applied.insert(endpoint, generation);

        let view = &mut self.view;
        match endpoint {
            Endpoint::Kpi => view.kpi = Some(normalizer.kpi(raw)),
            Endpoint::Approvals => view.approvals = normalizer.approvals(raw),
            Endpoint::PlanSummary => view.plan_summary = Some(normalizer.plan_summary(raw)),
            Endpoint::LastCi => view.last_ci = Some(normalizer.ci_result(raw)),
            Endpoint::OrchestratorStatus => {
                let status = normalizer.server_status(raw);
                view.server = Some(status.meta);
                view.codex_sessions = status.cli_sessions;
            }
            Endpoint::Leaderboard => view.leaderboard = normalizer.leaderboard(raw),
            Endpoint::AgentsStatus => view.agents = Some(normalizer.agents_status(raw)),
            Endpoint::TestHistory => view.test_history = normalizer.test_history(raw),
            Endpoint::AuditSummary => view.audit_summary = normalizer.audit_summary(raw),
            Endpoint::DangerousEvents => view.dangerous_events = normalizer.dangerous_events(raw),
            Endpoint::ReleaseStatus => view.release = Some(normalizer.release_status(raw)),
            Endpoint::UiAuditList => view.ui_audits = normalizer.ui_audits(raw),
            Endpoint::UiAuditSummary => {
                view.ui_audit_summary = Some(normalizer.ui_audit_summary(raw));
            }
            Endpoint::UiCoverage => view.ui_coverage = Some(normalizer.ui_coverage(raw)),
        }
        true
    }

    /// Runs once the whole batch has settled.
    pub fn finish_cycle(&mut self, normalizer: &Normalizer) {
        let view = &mut self.view;
        if view.kpi.is_none() {
            view.kpi = Some(KpiSnapshot::zeroed(normalizer.now_iso()));
        }
        if view.server.is_none() {
            view.server = Some(ServerMeta::unknown());
        }
        view.last_refreshed = Some(normalizer.now());
        view.loading = false;
    }

    fn release_loading(&mut self) -> bool {
        let was_loading = self.view.loading;
        self.view.loading = false;
        was_loading
    }
}

/// Shared handle to the dashboard aggregator. Clones share state.
#[derive(Debug, Clone)]
pub struct Dashboard {
    pub(crate) fetcher: Fetcher,
    state: Arc<RwLock<DashboardState>>,
    generation: Arc<AtomicU64>,
    max_loading_wait: Duration,
    progress: Arc<watch::Sender<f64>>,
    competition: Arc<Mutex<Option<CancellationToken>>>,
}

impl Dashboard {
    pub fn new(config: &ClientConfig) -> Self {
        Self::with_state(config, Arc::new(RwLock::new(DashboardState::default())))
    }

    /// Builds an aggregator around externally owned state.
    pub fn with_state(config: &ClientConfig, state: Arc<RwLock<DashboardState>>) -> Self {
        let fetcher = Fetcher::new(
            config.dashboard_base.clone(),
            config.fetch_timeout,
            CancellationToken::new(),
        );
        let (progress, _) = watch::channel(0.0);
        Self {
            fetcher,
            state,
            generation: Arc::new(AtomicU64::new(0)),
            max_loading_wait: config.max_loading_wait,
            progress: Arc::new(progress),
            competition: Arc::new(Mutex::new(None)),
        }
    }

    pub fn state(&self) -> Arc<RwLock<DashboardState>> {
        Arc::clone(&self.state)
    }

    /// Copy of the current view, including live competition progress.
    pub async fn snapshot(&self) -> DashboardView {
        let mut view = self.state.read().await.view.clone();
        view.competition_progress = *self.progress.borrow();
        view
    }

    /// One refresh cycle: fetch every endpoint concurrently, merge what
    /// succeeded, then fill defaults and clear `loading`.
    pub async fn refresh(&self) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let loading_cap = self.spawn_loading_cap();

        let fetches = Endpoint::ALL.into_iter().map(|endpoint| {
            let fetcher = &self.fetcher;
            async move { (endpoint, fetcher.get_json(endpoint.path()).await) }
        });
        let results = join_all(fetches).await;

        let normalizer = Normalizer::at(Utc::now());
        let mut state = self.state.write().await;
        loading_cap.abort();
        if !state.is_mounted() {
            debug!(generation, "dashboard unmounted, dropping cycle results");
            return;
        }

        let mut merged = 0usize;
        let mut failed = 0usize;
        for (endpoint, result) in &results {
            match result {
                Ok(raw) => {
                    if state.apply(*endpoint, generation, raw, &normalizer) {
                        merged += 1;
                    }
                }
                Err(_) => failed += 1,
            }
        }
        state.finish_cycle(&normalizer);
        info!(generation, merged, failed, "dashboard refresh settled");
    }

    /// Refreshes now and then on every tick of `every` until unmounted. Each
    /// tick starts an independent cycle; a slow cycle does not delay the next.
    pub async fn run(&self, every: Duration) {
        let cancel = self.fetcher.cancel_token().clone();
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let dashboard = self.clone();
                    tokio::spawn(async move { dashboard.refresh().await });
                }
            }
        }
        debug!("dashboard polling stopped");
    }

    /// Cancels outstanding requests and streams. No state mutation happens
    /// after this returns.
    pub async fn unmount(&self) {
        self.state.write().await.unmounted = true;
        self.fetcher.cancel_token().cancel();
        self.stop_competition().await;
        info!("dashboard unmounted");
    }

    /// Subscribes to `/api/competitions/{id}/events`, replacing any running
    /// subscription.
    pub async fn start_competition(&self, id: &str) -> SseHandle {
        let token = self.fetcher.cancel_token().child_token();
        if let Some(previous) = self.competition.lock().await.replace(token.clone()) {
            previous.cancel();
        }
        self.progress.send_replace(0.0);

        let url = self.fetcher.url(&format!("/api/competitions/{id}/events"));
        info!(competition = %id, "starting competition stream");
        let sink = progress_sink(Arc::clone(&self.progress), token.clone());
        consume_sse(&self.fetcher, url, sink, token)
    }

    pub async fn stop_competition(&self) {
        if let Some(token) = self.competition.lock().await.take() {
            token.cancel();
        }
        self.progress.send_replace(0.0);
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<f64> {
        self.progress.subscribe()
    }

    fn spawn_loading_cap(&self) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let wait = self.max_loading_wait;
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            let mut state = state.write().await;
            if state.is_mounted() && state.release_loading() {
                debug!(wait_ms = wait.as_millis() as u64, "loading cap elapsed");
            }
        })
    }
}

/// Publishes finite progress values until `token` is cancelled. The token is
/// checked under the channel lock, after which a reset cannot be overwritten.
fn progress_sink(
    progress: Arc<watch::Sender<f64>>,
    token: CancellationToken,
) -> impl FnMut(Value) + Send + 'static {
    move |value| match serde_json::from_value::<CompetitionEvent>(value) {
        Ok(event) if event.progress.is_finite() => {
            progress.send_if_modified(|current| {
                if token.is_cancelled() {
                    return false;
                }
                *current = event.progress;
                true
            });
        }
        Ok(_) => {}
        Err(err) => debug!(error = %err, "ignoring competition event"),
    }
}
