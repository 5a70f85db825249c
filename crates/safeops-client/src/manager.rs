//! Mission manager view: live missions with a built-in fallback.

use std::sync::Arc;

use chrono::Utc;
use safeops_core::mock::fallback_hierarchy;
use safeops_core::view::{MissionMessage, filter_missions, mission_messages};
use safeops_core::{
    Artifact, Hierarchy, Lang, ManagerLabels, Mission, Normalizer, Signal, Task, TaskGroup,
    WorkStatus,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::FetchError;
use crate::fetch::Fetcher;

const MISSIONS_PATH: &str = "/api/missions";
const SIGNALS_PATH: &str = "/api/signals?limit=20";

/// Where the manager's data came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DataSource<T> {
    Live(T),
    Fallback { data: T, reason: String },
}

impl<T> DataSource<T> {
    pub fn data(&self) -> &T {
        match self {
            Self::Live(data) | Self::Fallback { data, .. } => data,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Live(_) => None,
            Self::Fallback { reason, .. } => Some(reason),
        }
    }
}

/// Live iff the request succeeded and yielded at least one mission.
pub fn decide_source(
    result: Result<Value, FetchError>,
    normalizer: &Normalizer,
) -> DataSource<Hierarchy> {
    match result {
        Ok(raw) => {
            let hierarchy = normalizer.hierarchy(&raw);
            if hierarchy.missions.is_empty() {
                DataSource::Fallback { data: fallback_hierarchy(), reason: "empty".to_string() }
            } else {
                DataSource::Live(hierarchy)
            }
        }
        Err(err) => DataSource::Fallback { data: fallback_hierarchy(), reason: err.to_string() },
    }
}

#[derive(Debug)]
struct ManagerState {
    lang: Lang,
    source: Option<DataSource<Hierarchy>>,
    signals: Vec<Signal>,
    loading: bool,
    unmounted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub running: usize,
    pub pending: usize,
    pub completed: usize,
}

impl StatusCounts {
    fn of(missions: &[Mission]) -> Self {
        let count = |status: WorkStatus| {
            missions.iter().filter(|mission| mission.status == status).count()
        };
        Self {
            running: count(WorkStatus::Running),
            pending: count(WorkStatus::Pending),
            completed: count(WorkStatus::Completed),
        }
    }
}

/// Everything the manager view renders for one search query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagerSnapshot {
    pub lang: Lang,
    pub enabled: bool,
    pub loading: bool,
    pub loaded: bool,
    pub live: bool,
    pub fallback_reason: Option<String>,
    pub show_api_alert: bool,
    pub counts: StatusCounts,
    /// Missions matching the query.
    pub missions: Vec<Mission>,
    /// First mission of the unfiltered list.
    pub selected: Option<Mission>,
    pub groups: Vec<TaskGroup>,
    pub tasks: Vec<Task>,
    pub artifacts: Vec<Artifact>,
    pub messages: Vec<MissionMessage>,
    pub signals: Vec<Signal>,
}

impl ManagerSnapshot {
    pub fn labels(&self) -> &'static ManagerLabels {
        ManagerLabels::for_lang(self.lang)
    }
}

#[derive(Debug, Clone)]
pub struct Manager {
    fetcher: Fetcher,
    enabled: bool,
    state: Arc<RwLock<ManagerState>>,
}

impl Manager {
    pub fn new(config: &ClientConfig) -> Self {
        let fetcher = Fetcher::new(
            config.missions_base.clone(),
            config.fetch_timeout,
            CancellationToken::new(),
        );
        let state = ManagerState {
            lang: config.lang,
            source: None,
            signals: Vec::new(),
            loading: false,
            unmounted: false,
        };
        Self { fetcher, enabled: config.manager_enabled, state: Arc::new(RwLock::new(state)) }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn lang(&self) -> Lang {
        self.state.read().await.lang
    }

    pub async fn set_lang(&self, code: &str) {
        self.state.write().await.lang = Lang::from_code(code);
    }

    pub async fn toggle_lang(&self) -> Lang {
        let mut state = self.state.write().await;
        state.lang = state.lang.toggled();
        state.lang
    }

    /// Fetches missions and signals concurrently and records which data
    /// source the view should use. Signal failures leave the previous list.
    pub async fn load_missions(&self) {
        if !self.enabled {
            debug!("manager disabled, skipping mission load");
            return;
        }
        {
            let mut state = self.state.write().await;
            if state.unmounted {
                return;
            }
            state.loading = true;
        }

        let (missions, signals) = tokio::join!(
            self.fetcher.get_json(MISSIONS_PATH),
            self.fetcher.get_json(SIGNALS_PATH)
        );
        let normalizer = Normalizer::at(Utc::now());
        let source = decide_source(missions, &normalizer);

        let mut state = self.state.write().await;
        if state.unmounted {
            debug!("manager unmounted, dropping mission load");
            return;
        }
        match &source {
            DataSource::Live(hierarchy) => {
                info!(missions = hierarchy.missions.len(), "loaded live missions");
            }
            DataSource::Fallback { reason, .. } => {
                warn!(%reason, "missions API unavailable, using built-in missions");
            }
        }
        state.source = Some(source);
        if let Ok(raw) = signals {
            state.signals = normalizer.signals(&raw);
        }
        state.loading = false;
    }

    pub async fn snapshot(&self, query: &str) -> ManagerSnapshot {
        let state = self.state.read().await;
        let loaded = state.source.is_some();
        let live = state.source.as_ref().is_some_and(DataSource::is_live);
        let fallback_reason =
            state.source.as_ref().and_then(DataSource::reason).map(str::to_string);

        let fallback;
        let hierarchy = match &state.source {
            Some(source) => source.data(),
            None => {
                fallback = fallback_hierarchy();
                &fallback
            }
        };

        let selected = hierarchy.missions.first().cloned();
        let groups = selected
            .as_ref()
            .map(|mission| hierarchy.groups_for(&mission.id))
            .unwrap_or_default();
        let tasks = hierarchy.tasks_for(&groups);
        let artifacts = hierarchy.artifacts_for(&tasks);

        ManagerSnapshot {
            lang: state.lang,
            enabled: self.enabled,
            loading: state.loading,
            loaded,
            live,
            fallback_reason,
            show_api_alert: loaded && !live,
            counts: StatusCounts::of(&hierarchy.missions),
            missions: filter_missions(&hierarchy.missions, query),
            messages: mission_messages(&hierarchy.missions, ManagerLabels::for_lang(state.lang)),
            selected,
            groups,
            tasks,
            artifacts,
            signals: state.signals.clone(),
        }
    }

    /// Aborts in-flight loads; later completions are discarded.
    pub async fn unmount(&self) {
        self.state.write().await.unmounted = true;
        self.fetcher.cancel_token().cancel();
        info!("manager unmounted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::{Json, Router, http::StatusCode, routing::get};
    use chrono::TimeZone;
    use serde_json::json;
    use tokio::net::TcpListener;

    async fn manager_for(router: Router) -> Manager {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Manager::new(&ClientConfig {
            missions_base: base,
            fetch_timeout: Duration::from_millis(500),
            ..ClientConfig::default()
        })
    }

    fn normalizer() -> Normalizer {
        Normalizer::at(Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap())
    }

    #[test]
    fn empty_list_falls_back_to_builtin_missions() {
        let source = decide_source(Ok(json!([])), &normalizer());
        assert!(!source.is_live());
        assert_eq!(source.reason(), Some("empty"));
        assert_eq!(source.data().missions.len(), 2);

        let source = decide_source(Ok(json!({ "missions": [] })), &normalizer());
        assert_eq!(source.reason(), Some("empty"));
    }

    #[test]
    fn errors_become_the_fallback_reason() {
        let source = decide_source(Err(FetchError::Status(503)), &normalizer());
        assert_eq!(source.reason(), Some("status 503"));
        assert_eq!(source.data(), &fallback_hierarchy());
    }

    #[test]
    fn non_empty_list_is_live_and_normalized() {
        let raw = json!([{ "id": "M-1", "title": "X", "status": "running" }]);
        let source = decide_source(Ok(raw), &normalizer());

        let DataSource::Live(hierarchy) = source else { panic!("expected live data") };
        let mission = &hierarchy.missions[0];
        assert_eq!(mission.title, "X");
        assert_eq!(mission.owner, "n/a");
        assert_eq!(mission.updated_at, "2025-01-02T03:04:05.000Z");
    }

    #[tokio::test]
    async fn live_missions_drive_the_snapshot() {
        let manager = manager_for(
            Router::new()
                .route(
                    "/api/missions",
                    get(|| async {
                        Json(json!([
                            {
                                "id": "M-9",
                                "title": "Canary rollout",
                                "status": "completed",
                                "task_groups": [
                                    { "id": "G-2", "title": "verify", "order": 2, "tasks": [] },
                                    { "id": "G-1", "title": "deploy", "order": 1, "tasks": [
                                        { "id": "T-1", "title": "ship", "artifacts": [
                                            { "id": "A-1", "type": "log" }
                                        ] }
                                    ] }
                                ]
                            },
                            { "id": "M-10", "title": "Audit sweep", "status": "pending" }
                        ]))
                    }),
                )
                .route(
                    "/api/signals",
                    get(|| async {
                        Json(json!({ "signals": [
                            { "id": 1, "type": "ci", "severity": "high", "status": "open" }
                        ] }))
                    }),
                ),
        )
        .await;

        manager.load_missions().await;
        let snapshot = manager.snapshot("audit").await;

        assert!(snapshot.live);
        assert!(!snapshot.show_api_alert);
        assert_eq!(snapshot.missions.len(), 1);
        assert_eq!(snapshot.selected.unwrap().id, "M-9");
        let group_ids: Vec<_> = snapshot.groups.iter().map(|group| group.id.as_str()).collect();
        assert_eq!(group_ids, ["G-1", "G-2"]);
        assert_eq!(snapshot.tasks[0].group_id, "G-1");
        assert_eq!(snapshot.artifacts[0].task_id, "T-1");
        assert_eq!(snapshot.signals[0].id, "1");
        assert_eq!(snapshot.counts, StatusCounts { running: 0, pending: 1, completed: 1 });
        assert_eq!(snapshot.messages[0].title, "Canary rollout - update");
    }

    #[tokio::test]
    async fn failing_api_shows_alert_over_builtin_missions() {
        let manager = manager_for(Router::new().route(
            "/api/missions",
            get(|| async { StatusCode::BAD_GATEWAY }),
        ))
        .await;

        let before = manager.snapshot("").await;
        assert!(!before.loaded);
        assert!(!before.show_api_alert);

        manager.load_missions().await;
        let snapshot = manager.snapshot("").await;

        assert!(snapshot.show_api_alert);
        assert_eq!(snapshot.fallback_reason.as_deref(), Some("status 502"));
        assert_eq!(snapshot.selected.unwrap().id, "M-001");
        let group_ids: Vec<_> = snapshot.groups.iter().map(|group| group.id.as_str()).collect();
        assert_eq!(group_ids, ["G-101", "G-102"]);
        assert!(snapshot.signals.is_empty());
    }

    #[tokio::test]
    async fn disabled_manager_never_fetches() {
        let mut manager = manager_for(Router::new()).await;
        manager.enabled = false;

        manager.load_missions().await;
        let snapshot = manager.snapshot("").await;
        assert!(!snapshot.enabled);
        assert!(!snapshot.loaded);
        assert_eq!(snapshot.labels().disabled_title, "Manager UI is turned off");
    }

    #[tokio::test]
    async fn unmount_discards_late_results_and_toggles_language() {
        let manager = manager_for(Router::new().route(
            "/api/missions",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Json(json!([{ "id": "M-1", "title": "late" }]))
            }),
        ))
        .await;

        let load = tokio::spawn({
            let manager = manager.clone();
            async move { manager.load_missions().await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        manager.unmount().await;
        load.await.unwrap();

        let snapshot = manager.snapshot("").await;
        assert!(!snapshot.loaded);
        assert_eq!(manager.toggle_lang().await, Lang::Ja);
        manager.set_lang("fr").await;
        assert_eq!(manager.lang().await, Lang::En);
    }
}
