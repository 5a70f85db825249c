use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use safeops_client::{
    ApprovalForm, ClientConfig, ConfigOverrides, DEFAULT_PLAN_GOAL, Dashboard, Manager,
    ManagerSnapshot, Notification, feature_flag,
};
use safeops_core::view::{
    format_duration, format_iso, hero_metrics, plan_signals, render_plan_diff,
};
use safeops_core::{ApprovalStatus, DashboardLabels, DashboardView, Lang};
use tokio::time::{Instant, interval_at};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "safeops", about = "SafeOps dashboard data aggregator")]
struct Cli {
    /// TOML config file; defaults to `<config dir>/safeops/config.toml` when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true, env = "SAFEOPS_API_BASE")]
    api_base: Option<String>,
    #[arg(long, global = true, env = "MISSIONS_API_BASE")]
    missions_base: Option<String>,
    #[arg(long, global = true, env = "SAFEOPS_FETCH_TIMEOUT_MS")]
    fetch_timeout_ms: Option<u64>,
    #[arg(long, global = true, env = "SAFEOPS_POLL_INTERVAL_SECS")]
    poll_interval_secs: Option<u64>,
    #[arg(long, global = true, env = "SAFEOPS_LANG")]
    lang: Option<String>,
    #[arg(long, global = true, env = "FEATURE_MANAGER_UI")]
    feature_manager_ui: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Aggregate the dashboard once, or keep polling until interrupted.
    Dashboard {
        #[arg(long)]
        once: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show missions, their task groups and external signals.
    Manager {
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long)]
        json: bool,
    },
    /// Follow a competition's progress stream.
    Competition {
        #[arg(long, default_value = "dummy")]
        id: String,
    },
    #[command(subcommand)]
    Action(ActionCommand),
}

#[derive(Debug, Subcommand)]
enum ActionCommand {
    PlanGuard {
        #[arg(long, default_value = DEFAULT_PLAN_GOAL)]
        goal: String,
    },
    Approve {
        #[arg(long)]
        appr_id: String,
        #[arg(long)]
        task_id: String,
        #[arg(long, default_value = "approved")]
        status: String,
        #[arg(long, default_value = "")]
        requested_by: String,
        #[arg(long, default_value = "")]
        approver: String,
    },
    Signoff {
        #[arg(long, default_value = "")]
        reviewer: String,
        #[arg(long, default_value = "")]
        notes: String,
    },
    SelfHeal,
    Release {
        /// Without this flag the promotion is a dry run.
        #[arg(long)]
        production: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    info!(
        dashboard = %config.dashboard_base,
        missions = %config.missions_base,
        lang = config.lang.code(),
        "configuration loaded"
    );

    match cli.command {
        Command::Dashboard { once, json } => run_dashboard(&config, once, json).await,
        Command::Manager { query, json } => run_manager(&config, &query, json).await,
        Command::Competition { id } => run_competition(&config, &id).await,
        Command::Action(action) => run_action(&config, action).await,
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let path = cli.config.clone().or_else(|| {
        dirs::config_dir()
            .map(|dir| dir.join("safeops").join("config.toml"))
            .filter(|path| path.is_file())
    });

    let mut config = ClientConfig::default();
    if let Some(path) = path {
        info!(path = %path.display(), "reading config file");
        config = config.apply(ConfigOverrides::load(&path)?)?;
    }

    let flags = ConfigOverrides {
        dashboard_base: cli.api_base.clone(),
        missions_base: cli.missions_base.clone(),
        fetch_timeout_ms: cli.fetch_timeout_ms,
        max_loading_wait_ms: None,
        poll_interval_secs: cli.poll_interval_secs,
        lang: cli.lang.clone(),
        manager_enabled: cli.feature_manager_ui.as_deref().map(|raw| feature_flag(Some(raw))),
    };
    Ok(config.apply(flags)?)
}

async fn run_dashboard(config: &ClientConfig, once: bool, json: bool) -> Result<()> {
    let dashboard = Dashboard::new(config);

    if once {
        dashboard.refresh().await;
        print_view(&dashboard.snapshot().await, config.lang, json)?;
        return Ok(());
    }

    let poller = tokio::spawn({
        let dashboard = dashboard.clone();
        let every = config.poll_interval;
        async move { dashboard.run(every).await }
    });

    // Report once each cycle has had its full fetch budget to settle.
    let settle = config.fetch_timeout + Duration::from_millis(100);
    let mut report = interval_at(Instant::now() + settle, config.poll_interval);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = report.tick() => print_view(&dashboard.snapshot().await, config.lang, json)?,
        }
    }

    dashboard.unmount().await;
    poller.await?;
    Ok(())
}

fn print_view(view: &DashboardView, lang: Lang, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(view)?);
        return Ok(());
    }

    let labels = DashboardLabels::for_lang(lang);
    println!("== {} ==", labels.title);
    if view.loading {
        println!("{}", labels.loading);
        return Ok(());
    }

    let metrics = hero_metrics(view);
    let (top, additional) = metrics.split_at(metrics.len().min(3));
    for (title, group) in [(labels.top_kpi, top), (labels.add_kpi, additional)] {
        println!("-- {title} --");
        for metric in group {
            println!("{:<24} {:>8.1}  ({:?})", metric.label, metric.value, metric.tone);
        }
    }

    if let Some(server) = &view.server {
        println!(
            "{}: {} / {}: {}",
            labels.server_status,
            server.server_version,
            labels.uptime,
            format_duration(Some(server.uptime_seconds))
        );
    }

    match &view.last_ci {
        Some(ci) => println!(
            "{}: {} {} @ {}",
            labels.latest_ci,
            ci.operation,
            if ci.success { "ok" } else { "failed" },
            format_iso(&ci.timestamp)
        ),
        None => println!("{}: {}", labels.ci_status, labels.no_ci_events),
    }

    println!("-- {} --", labels.plan_signals);
    for signal in plan_signals(view) {
        println!("[{}] {} ({})", signal.source, signal.summary, signal.path);
    }

    println!("-- {} --", labels.plan_diff);
    let steps = view.plan_summary.as_ref().map(|summary| summary.diff.as_slice()).unwrap_or(&[]);
    println!("{}", render_plan_diff(steps, labels));

    println!("-- {} --", labels.audit_summary);
    if view.audit_summary.is_empty() {
        println!("{}", labels.no_audit_entries);
    }
    for entry in view.audit_summary.iter().take(5) {
        println!("{} {} {}", format_iso(&entry.ts), entry.op, entry.success);
    }

    if view.ui_audits.is_empty() {
        println!("{}", labels.no_artifacts);
    }
    for artifact in &view.ui_audits {
        println!("{} ({})", artifact.name, artifact.path);
    }

    if let Some(release) = &view.release {
        println!("-- {} --", labels.promotion);
        for promotion in &release.promotions {
            println!(
                "{} {} {} {}",
                format_iso(&promotion.ts),
                promotion.stage,
                promotion.status,
                promotion.note
            );
        }
    }

    if view.leaderboard.is_empty() {
        println!("{}: {}", labels.codex_comp, labels.no_results);
    }
    for item in &view.leaderboard {
        println!("{} total={:?} pass={:?}", item.run_id, item.total, item.tests_pass_rate);
    }

    if let Some(at) = view.last_refreshed {
        println!("{}: {}", labels.last_updated, format_iso(&at.to_rfc3339()));
    }
    Ok(())
}

async fn run_manager(config: &ClientConfig, query: &str, json: bool) -> Result<()> {
    let manager = Manager::new(config);
    manager.load_missions().await;
    let snapshot = manager.snapshot(query).await;
    manager.unmount().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }
    print_manager(&snapshot);
    Ok(())
}

fn print_manager(snapshot: &ManagerSnapshot) {
    let labels = snapshot.labels();
    if !snapshot.enabled {
        println!("{}\n{}", labels.disabled_title, labels.disabled_body);
        return;
    }

    println!("== {} ==", labels.page_title);
    if snapshot.show_api_alert {
        let detail = snapshot.fallback_reason.as_deref().unwrap_or_default();
        println!("! {} ({detail})", labels.api_alert_title);
        println!("  {}", labels.api_alert_body);
        println!("  {}", labels.api_alert_hint);
    }

    println!("-- {} --", labels.missions);
    for mission in &snapshot.missions {
        println!(
            "{} {} {}: {} {}: {} {}: {} {}: {}",
            mission.id,
            mission.title,
            labels.status,
            labels.status(mission.status),
            labels.owner,
            mission.owner,
            labels.run_mode,
            labels.run_mode(mission.run_mode),
            labels.updated_at,
            format_iso(&mission.updated_at)
        );
    }

    println!("-- {} --", labels.task_groups);
    for group in &snapshot.groups {
        println!(
            "{}. {} ({}: {}, {}) {}: {} {}: {}",
            group.order,
            group.title,
            labels.kind,
            labels.kind(group.kind),
            labels.status(group.status),
            labels.started_at,
            format_iso(group.started_at.as_deref().unwrap_or_default()),
            labels.finished_at,
            format_iso(group.finished_at.as_deref().unwrap_or_default())
        );
    }

    println!("-- {} --", labels.tasks_artifacts);
    for group in &snapshot.groups {
        for task in snapshot.tasks.iter().filter(|task| task.group_id == group.id) {
            println!(
                "   - {} [{}] {}: {}",
                task.title,
                labels.status(task.status),
                labels.agent,
                task.agent
            );
            let artifacts = snapshot.artifacts.iter().filter(|item| item.task_id == task.id);
            for artifact in artifacts {
                println!(
                    "     * {} {}: {} {}: {} {}: {}",
                    labels.artifact_type(artifact.artifact_type),
                    labels.version,
                    artifact.version,
                    labels.sha,
                    artifact.sha,
                    labels.tags,
                    artifact.tags.join(", ")
                );
            }
        }
    }

    println!("-- {} --", labels.latest);
    for message in &snapshot.messages {
        println!("{}: {}", message.title, message.body);
    }

    println!("-- {} --", labels.external_signals);
    if snapshot.signals.is_empty() {
        println!("{}", labels.no_signals);
    }
    for signal in &snapshot.signals {
        println!(
            "{} {} {} {}",
            format_iso(&signal.created_at),
            signal.signal_type,
            signal.severity,
            signal.status
        );
    }
}

async fn run_competition(config: &ClientConfig, id: &str) -> Result<()> {
    let dashboard = Dashboard::new(config);
    let mut progress = dashboard.subscribe_progress();
    let closed = dashboard.start_competition(id).await.closed();
    tokio::pin!(closed);

    loop {
        tokio::select! {
            reason = &mut closed => {
                info!(competition = %id, ?reason, "competition stream ended");
                return Ok(());
            }
            changed = progress.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("progress: {:.1}%", *progress.borrow_and_update());
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    dashboard.stop_competition().await;
    let reason = closed.await;
    info!(competition = %id, ?reason, "competition stream stopped");
    Ok(())
}

async fn run_action(config: &ClientConfig, action: ActionCommand) -> Result<()> {
    let dashboard = Dashboard::new(config);
    let notification = match action {
        ActionCommand::PlanGuard { goal } => dashboard.plan_and_guard(&goal).await,
        ActionCommand::Approve { appr_id, task_id, status, requested_by, approver } => {
            let form = ApprovalForm {
                appr_id,
                task_id,
                status: ApprovalStatus::from_raw(&status),
                requested_by,
                approver,
            };
            dashboard.update_approval(form).await
        }
        ActionCommand::Signoff { reviewer, notes } => {
            dashboard.manual_signoff(&reviewer, &notes).await
        }
        ActionCommand::SelfHeal => dashboard.self_heal().await,
        ActionCommand::Release { production } => dashboard.promote(!production).await,
    };
    report(&notification)
}

fn report(notification: &Notification) -> Result<()> {
    if !notification.is_success() {
        bail!("{}", notification.message);
    }
    println!("{}", notification.message);
    Ok(())
}
