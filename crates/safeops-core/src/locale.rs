//! English / Japanese display strings for the dashboard and the manager view.

use serde::{Deserialize, Serialize};

use crate::model::{ArtifactType, GroupKind, RunMode, WorkStatus};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    En,
    Ja,
}

impl Lang {
    /// Two-letter code lookup; anything other than `ja` resolves to English.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        if code.trim().eq_ignore_ascii_case("ja") { Self::Ja } else { Self::En }
    }

    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ja => "ja",
        }
    }

    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::En => Self::Ja,
            Self::Ja => Self::En,
        }
    }
}

#[derive(Debug)]
pub struct DashboardLabels {
    pub title: &'static str,
    pub loading: &'static str,
    pub top_kpi: &'static str,
    pub add_kpi: &'static str,
    pub ci_status: &'static str,
    pub latest_ci: &'static str,
    pub no_ci_events: &'static str,
    pub server_status: &'static str,
    pub plan_signals: &'static str,
    pub plan_diff: &'static str,
    pub no_plan_diff: &'static str,
    pub audit_summary: &'static str,
    pub no_audit_entries: &'static str,
    pub promotion: &'static str,
    pub codex_comp: &'static str,
    pub no_results: &'static str,
    pub no_artifacts: &'static str,
    pub last_updated: &'static str,
    pub uptime: &'static str,
}

impl DashboardLabels {
    #[must_use]
    pub fn for_lang(lang: Lang) -> &'static Self {
        match lang {
            Lang::En => &DASHBOARD_EN,
            Lang::Ja => &DASHBOARD_JA,
        }
    }
}

static DASHBOARD_EN: DashboardLabels = DashboardLabels {
    title: "SafeOps Orchestrator Dashboard",
    loading: "Loading SafeOps Dashboard...",
    top_kpi: "Top KPI",
    add_kpi: "Additional KPI",
    ci_status: "CI / Status",
    latest_ci: "Latest CI Run",
    no_ci_events: "No CI evidence",
    server_status: "Server Status",
    plan_signals: "PLAN & Signals",
    plan_diff: "Plan Diff",
    no_plan_diff: "No plan diff highlights recorded yet.",
    audit_summary: "Audit Summary",
    no_audit_entries: "No audit entries",
    promotion: "Promotion",
    codex_comp: "Codex / Competition",
    no_results: "No results",
    no_artifacts: "No audit artifacts",
    last_updated: "Last updated",
    uptime: "Uptime",
};

static DASHBOARD_JA: DashboardLabels = DashboardLabels {
    title: "SafeOps オーケストレーター ダッシュボード",
    loading: "SafeOps ダッシュボードを読み込み中...",
    top_kpi: "主要KPI",
    add_kpi: "追加KPI",
    ci_status: "CI / ステータス",
    latest_ci: "最新CI実行",
    no_ci_events: "CI証跡がありません",
    server_status: "サーバーステータス",
    plan_signals: "PLAN・Signals",
    plan_diff: "Plan差分",
    no_plan_diff: "差分ハイライトがまだ記録されていません。",
    audit_summary: "監査サマリ",
    no_audit_entries: "監査エントリなし",
    promotion: "プロモーション",
    codex_comp: "Codex・Competition",
    no_results: "結果なし",
    no_artifacts: "監査アーティファクトなし",
    last_updated: "最終更新",
    uptime: "稼働時間",
};

#[derive(Debug)]
pub struct StatusLabels {
    pub pending: &'static str,
    pub running: &'static str,
    pub blocked: &'static str,
    pub completed: &'static str,
    pub failed: &'static str,
}

#[derive(Debug)]
pub struct RunModeLabels {
    pub sequential: &'static str,
    pub parallel: &'static str,
}

#[derive(Debug)]
pub struct KindLabels {
    pub sequential: &'static str,
    pub parallel: &'static str,
    pub self_heal: &'static str,
}

#[derive(Debug)]
pub struct ArtifactTypeLabels {
    pub test: &'static str,
    pub screenshot: &'static str,
    pub report: &'static str,
    pub log: &'static str,
    pub other: &'static str,
}

#[derive(Debug)]
pub struct ManagerLabels {
    pub page_title: &'static str,
    pub api_alert_title: &'static str,
    pub api_alert_body: &'static str,
    pub api_alert_hint: &'static str,
    pub missions: &'static str,
    pub owner: &'static str,
    pub run_mode: &'static str,
    pub status: &'static str,
    pub updated_at: &'static str,
    pub task_groups: &'static str,
    pub kind: &'static str,
    pub started_at: &'static str,
    pub finished_at: &'static str,
    pub tasks_artifacts: &'static str,
    pub agent: &'static str,
    pub version: &'static str,
    pub sha: &'static str,
    pub tags: &'static str,
    pub external_signals: &'static str,
    pub no_signals: &'static str,
    pub latest: &'static str,
    pub disabled_title: &'static str,
    pub disabled_body: &'static str,
    pub statuses: StatusLabels,
    pub run_modes: RunModeLabels,
    pub kinds: KindLabels,
    pub artifact_types: ArtifactTypeLabels,
}

impl ManagerLabels {
    #[must_use]
    pub fn for_lang(lang: Lang) -> &'static Self {
        match lang {
            Lang::En => &MANAGER_EN,
            Lang::Ja => &MANAGER_JA,
        }
    }

    #[must_use]
    pub fn for_code(code: &str) -> &'static Self {
        Self::for_lang(Lang::from_code(code))
    }

    #[must_use]
    pub fn status(&self, status: WorkStatus) -> &'static str {
        match status {
            WorkStatus::Pending => self.statuses.pending,
            WorkStatus::Running => self.statuses.running,
            WorkStatus::Blocked => self.statuses.blocked,
            WorkStatus::Completed => self.statuses.completed,
            WorkStatus::Failed => self.statuses.failed,
        }
    }

    #[must_use]
    pub fn run_mode(&self, mode: RunMode) -> &'static str {
        match mode {
            RunMode::Sequential => self.run_modes.sequential,
            RunMode::Parallel => self.run_modes.parallel,
        }
    }

    #[must_use]
    pub fn kind(&self, kind: GroupKind) -> &'static str {
        match kind {
            GroupKind::Sequential => self.kinds.sequential,
            GroupKind::Parallel => self.kinds.parallel,
            GroupKind::SelfHeal => self.kinds.self_heal,
        }
    }

    #[must_use]
    pub fn artifact_type(&self, artifact_type: ArtifactType) -> &'static str {
        match artifact_type {
            ArtifactType::Test => self.artifact_types.test,
            ArtifactType::Screenshot => self.artifact_types.screenshot,
            ArtifactType::Report => self.artifact_types.report,
            ArtifactType::Log => self.artifact_types.log,
            ArtifactType::Other => self.artifact_types.other,
        }
    }
}

static MANAGER_EN: ManagerLabels = ManagerLabels {
    page_title: "Manager",
    api_alert_title: "Showing mock data",
    api_alert_body: "The missions API could not be reached or returned no missions.",
    api_alert_hint: "Check that the missions API is running and reachable.",
    missions: "Missions",
    owner: "Owner",
    run_mode: "Run mode",
    status: "Status",
    updated_at: "Updated at",
    task_groups: "Task groups",
    kind: "Kind",
    started_at: "Started",
    finished_at: "Finished",
    tasks_artifacts: "Tasks & artifacts",
    agent: "Agent",
    version: "Version",
    sha: "SHA",
    tags: "Tags",
    external_signals: "External signals",
    no_signals: "No signals",
    latest: "latest",
    disabled_title: "Manager UI is turned off",
    disabled_body: "Enable the manager feature flag to use this view.",
    statuses: StatusLabels {
        pending: "Pending",
        running: "Running",
        blocked: "Blocked",
        completed: "Completed",
        failed: "Failed",
    },
    run_modes: RunModeLabels { sequential: "Sequential", parallel: "Parallel" },
    kinds: KindLabels { sequential: "Sequential", parallel: "Parallel", self_heal: "Self-heal" },
    artifact_types: ArtifactTypeLabels {
        test: "Test",
        screenshot: "Screenshot",
        report: "Report",
        log: "Log",
        other: "Other",
    },
};

static MANAGER_JA: ManagerLabels = ManagerLabels {
    page_title: "マネージャー",
    api_alert_title: "モックデータを表示中",
    api_alert_body: "ミッションAPIに接続できないか、ミッションが空でした。",
    api_alert_hint: "ミッションAPIが起動していて到達可能か確認してください。",
    missions: "ミッション",
    owner: "担当",
    run_mode: "実行モード",
    status: "状態",
    updated_at: "更新日時",
    task_groups: "タスクグループ",
    kind: "種別",
    started_at: "開始",
    finished_at: "終了",
    tasks_artifacts: "タスクと成果物",
    agent: "エージェント",
    version: "バージョン",
    sha: "SHA",
    tags: "タグ",
    external_signals: "外部シグナル",
    no_signals: "シグナルなし",
    latest: "件(最新)",
    disabled_title: "マネージャーUIは無効です",
    disabled_body: "この画面を使うにはマネージャー機能フラグを有効にしてください。",
    statuses: StatusLabels {
        pending: "保留",
        running: "実行中",
        blocked: "ブロック",
        completed: "完了",
        failed: "失敗",
    },
    run_modes: RunModeLabels { sequential: "逐次", parallel: "並列" },
    kinds: KindLabels { sequential: "逐次", parallel: "並列", self_heal: "自己修復" },
    artifact_types: ArtifactTypeLabels {
        test: "テスト",
        screenshot: "スクリーンショット",
        report: "レポート",
        log: "ログ",
        other: "その他",
    },
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_codes_fall_back_to_english() {
        assert_eq!(Lang::from_code("fr"), Lang::En);
        assert_eq!(Lang::from_code(""), Lang::En);
        assert_eq!(Lang::from_code(" JA "), Lang::Ja);
        assert_eq!(ManagerLabels::for_code("de").page_title, "Manager");
    }

    #[test]
    fn japanese_tables_cover_enumerations() {
        let labels = ManagerLabels::for_code("ja");
        assert_eq!(labels.page_title, "マネージャー");
        assert_eq!(labels.kind, "種別");
        assert_eq!(labels.status(WorkStatus::Running), "実行中");
        assert_eq!(labels.artifact_type(ArtifactType::Screenshot), "スクリーンショット");
        assert_eq!(DashboardLabels::for_lang(Lang::Ja).top_kpi, "主要KPI");
    }
}
