use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use sentra_core::advisor::{AdviceRequest, AdvisorError, DesignAdvisor};
use sentra_core::conductor::{wall_ms, Conductor, ConductorConfig};
use sentra_core::design_mind::DesignMind;
use sentra_core::pathways::PathwayModel;
use sentra_core::signal_field::{FieldConfig, SignalField};
use sentra_core::synapse_web::{SynapseWeb, WebConfig};
use sentra_core::theme::{Theme, ThemePrefs};
use sentra_core::types::{
    EngagementEvent, EngagementKind, InteractionEvent, InteractionKind, PerformanceSample,
    Sentiment,
};
use sentra_core::{SignalBus, SystemNotice};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    let mut args = std::env::args().skip(1);
    let mut autonomy = "medium".to_string();
    let mut seed: u64 = 7;
    let mut fast_secs: u64 = 300;
    let mut standard_secs: u64 = 1_800;
    let mut deep_secs: u64 = 86_400;
    let mut decay_secs: u64 = 30;
    let mut advisor_timeout_ms: u64 = 10_000;
    let mut plan_file: Option<String> = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--autonomy" => {
                let Some(value) = args.next() else {
                    return Err(anyhow!("--autonomy requires a level"));
                };
                autonomy = value;
            }
            "--seed" => {
                let Some(value) = args.next() else {
                    return Err(anyhow!("--seed requires a number"));
                };
                seed = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("--seed expects a number, got {value}"))?;
            }
            "--fast-secs" => fast_secs = parse_num(&mut args, "--fast-secs")?,
            "--standard-secs" => standard_secs = parse_num(&mut args, "--standard-secs")?,
            "--deep-secs" => deep_secs = parse_num(&mut args, "--deep-secs")?,
            "--decay-secs" => decay_secs = parse_num(&mut args, "--decay-secs")?,
            "--advisor-timeout-ms" => {
                advisor_timeout_ms = parse_num(&mut args, "--advisor-timeout-ms")?
            }
            "--plan" => {
                let Some(path) = args.next() else {
                    return Err(anyhow!("--plan requires a path"));
                };
                plan_file = Some(path);
            }
            other => return Err(anyhow!("unknown argument: {other}")),
        }
    }

    let config = ConductorConfig {
        autonomy: sentra_core::AutonomyLevel::parse(&autonomy)
            .map_err(|err| anyhow!(err.to_string()))?,
        fast_interval: Duration::from_secs(fast_secs),
        standard_interval: Duration::from_secs(standard_secs),
        deep_interval: Duration::from_secs(deep_secs),
        decay_interval: Duration::from_secs(decay_secs),
        advisor_timeout_ms,
    };

    let advisor: Arc<dyn DesignAdvisor> = match plan_file {
        Some(path) => {
            let text = fs::read_to_string(&path)
                .map_err(|err| anyhow!("cannot read plan file {path}: {err}"))?;
            Arc::new(CannedAdvisor { plan: text })
        }
        None => Arc::new(MuteAdvisor),
    };

    let bus = Arc::new(SignalBus::new());
    let conductor = Conductor::new(
        SignalField::new(FieldConfig::default()),
        DesignMind::new(Theme::default()),
        PathwayModel::new(),
        SynapseWeb::new(WebConfig::default(), seed),
        bus.clone(),
        advisor,
        config,
    );

    spawn_printers(&bus);
    conductor.set_enabled(true);
    info!(seed, "sentra ready; type 'help' for commands");

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "quit" || trimmed == "exit" {
            break;
        }
        if let Err(err) = handle_command(&conductor, &mut rng, trimmed).await {
            eprintln!("command failed: {err}");
        }
    }
    conductor.set_enabled(false);
    Ok(())
}

fn parse_num(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<u64> {
    let Some(value) = args.next() else {
        return Err(anyhow!("{flag} requires a number"));
    };
    value
        .parse::<u64>()
        .map_err(|_| anyhow!("{flag} expects a number, got {value}"))
}

/// Answers every request with the same canned plan text.
struct CannedAdvisor {
    plan: String,
}

#[async_trait]
impl DesignAdvisor for CannedAdvisor {
    async fn advise(&self, _request: &AdviceRequest) -> Result<String, AdvisorError> {
        Ok(self.plan.clone())
    }
}

/// Always fails, forcing the heuristic path. The default when no plan file
/// is supplied.
struct MuteAdvisor;

#[async_trait]
impl DesignAdvisor for MuteAdvisor {
    async fn advise(&self, _request: &AdviceRequest) -> Result<String, AdvisorError> {
        Err(AdvisorError::Transport("no advisor configured".to_string()))
    }
}

fn spawn_printers(bus: &Arc<SignalBus>) {
    let mut analysis_rx = bus.subscribe_analysis();
    tokio::spawn(async move {
        while let Ok(event) = analysis_rx.recv().await {
            println!(
                "ANALYSIS [{}] interactions={} clickRate={:.2} frictions={} dropoffs={} avgLoad={:.0}ms",
                event.cycle.as_str(),
                event.snapshot.total_interactions,
                event.snapshot.click_rate,
                event.snapshot.friction_points.len(),
                event.snapshot.drop_off_pages.len(),
                event.snapshot.avg_load_ms,
            );
        }
    });
    let mut design_rx = bus.subscribe_design();
    tokio::spawn(async move {
        while let Ok(notice) = design_rx.recv().await {
            println!(
                "DESIGN record={} changes={} hue={:.0} mode={:?}",
                notice.record_id, notice.changes, notice.theme.primary_hue, notice.theme.mode
            );
        }
    });
    let mut notice_rx = bus.subscribe_notices();
    tokio::spawn(async move {
        while let Ok(notice) = notice_rx.recv().await {
            match notice {
                SystemNotice::LowActivity { total_activity } => {
                    println!("NOTICE low-activity total={total_activity:.2}")
                }
                SystemNotice::Degraded { detail } => println!("NOTICE degraded: {detail}"),
                SystemNotice::RolledBack { record_id } => {
                    println!("NOTICE rolled-back record={record_id}")
                }
            }
        }
    });
}

async fn handle_command(
    conductor: &Arc<Conductor>,
    rng: &mut ChaCha8Rng,
    line: &str,
) -> Result<()> {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    match command {
        "help" => {
            println!(
                "commands: sim <n> | click <user> <session> <target> <page> | \
                 engage <user> <kind> <target> | perf <page> <load_ms> | status | insights | \
                 history [n] | rollback <id> | optimize | autonomy <level> | enable | disable | \
                 theme | mytheme <user> [hue] | predict <path> | quit"
            );
        }
        "sim" => {
            let count: usize = rest.trim().parse().unwrap_or(100);
            simulate(conductor, rng, count).await;
            println!("SIM generated {count} events");
        }
        "click" => {
            let parts: Vec<&str> = rest.split_whitespace().collect();
            let [user, session, target, page] = parts.as_slice() else {
                return Err(anyhow!("usage: click <user> <session> <target> <page>"));
            };
            conductor
                .record_interaction(InteractionEvent {
                    user: user.to_string(),
                    session: session.to_string(),
                    kind: InteractionKind::Click,
                    target: target.to_string(),
                    x: rng.gen_range(0.0..1280.0),
                    y: rng.gen_range(0.0..720.0),
                    page: page.to_string(),
                    device: "desktop".to_string(),
                    viewport: "1280x720".to_string(),
                    at_ms: wall_ms(),
                })
                .await;
        }
        "engage" => {
            let parts: Vec<&str> = rest.split_whitespace().collect();
            let [user, kind, target] = parts.as_slice() else {
                return Err(anyhow!("usage: engage <user> <kind> <target>"));
            };
            let kind = match *kind {
                "like" => EngagementKind::Like,
                "comment" => EngagementKind::Comment,
                "share" => EngagementKind::Share,
                "follow" => EngagementKind::Follow,
                "post" => EngagementKind::Post,
                other => return Err(anyhow!("unknown engagement kind: {other}")),
            };
            conductor
                .record_engagement(EngagementEvent {
                    user: user.to_string(),
                    kind,
                    target_id: target.to_string(),
                    target_type: "post".to_string(),
                    sentiment: Some(Sentiment::Positive),
                    at_ms: wall_ms(),
                })
                .await;
        }
        "perf" => {
            let parts: Vec<&str> = rest.split_whitespace().collect();
            let [page, load] = parts.as_slice() else {
                return Err(anyhow!("usage: perf <page> <load_ms>"));
            };
            let load_ms: f32 = load
                .parse()
                .map_err(|_| anyhow!("load_ms expects a number"))?;
            conductor
                .record_performance(PerformanceSample {
                    user: "cli".to_string(),
                    page: page.to_string(),
                    load_ms,
                    fcp_ms: load_ms * 0.4,
                    lcp_ms: load_ms * 0.7,
                    fid_ms: 18.0,
                    cls: 0.04,
                    ttfb_ms: load_ms * 0.2,
                    device: "desktop".to_string(),
                    connection: "wifi".to_string(),
                    at_ms: wall_ms(),
                })
                .await;
        }
        "status" => {
            let status = conductor.status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        "insights" => {
            let report = conductor.insights(wall_ms()).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "history" => {
            let limit: usize = rest.trim().parse().unwrap_or(10);
            for record in conductor.change_history(limit).await {
                println!(
                    "RECORD id={} at={} changes={} priority={:?}",
                    record.id,
                    record.at_ms,
                    record.applied_changes.len(),
                    record.plan.priority
                );
            }
        }
        "rollback" => {
            let id: u64 = rest
                .trim()
                .parse()
                .map_err(|_| anyhow!("usage: rollback <id>"))?;
            match conductor.rollback(id).await {
                Ok(theme) => println!(
                    "ROLLED BACK to hue={:.0} mode={:?}",
                    theme.primary_hue, theme.mode
                ),
                Err(err) => eprintln!("rollback failed: {err}"),
            }
        }
        "optimize" => {
            let outcome = conductor.manual_optimize().await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        "autonomy" => match conductor.set_autonomy_level(rest.trim()) {
            Ok(level) => println!("AUTONOMY {level}"),
            Err(err) => eprintln!("{err}"),
        },
        "enable" => conductor.set_enabled(true),
        "disable" => conductor.set_enabled(false),
        "theme" => {
            let theme = conductor.current_theme().await;
            println!("{}", serde_json::to_string_pretty(&theme)?);
        }
        "mytheme" => {
            let parts: Vec<&str> = rest.split_whitespace().collect();
            let Some((user, prefs)) = parts.split_first() else {
                return Err(anyhow!("usage: mytheme <user> [hue]"));
            };
            let prefs = ThemePrefs {
                hue: prefs.first().and_then(|v| v.parse().ok()),
                text_scale: None,
                dark: None,
            };
            let theme = conductor.personalized_theme(user, &prefs).await;
            println!("{}", serde_json::to_string_pretty(&theme)?);
        }
        "predict" => {
            match conductor.predict_next(rest.trim()).await {
                Some(prediction) => println!(
                    "PREDICT next={} confidence={:.2}",
                    prediction.next, prediction.confidence
                ),
                None => println!("PREDICT nothing confident enough"),
            }
        }
        other => return Err(anyhow!("unknown command: {other}")),
    }
    Ok(())
}

const SIM_PAGES: [&str; 5] = ["/home", "/feed", "/explore", "/profile", "/chat"];
const SIM_TARGETS: [&str; 8] = [
    "open-feed",
    "composer-box",
    "search-input",
    "like-btn",
    "share-btn",
    "profile-card",
    "chat-panel",
    "notifications-bell",
];

async fn simulate(conductor: &Arc<Conductor>, rng: &mut ChaCha8Rng, count: usize) {
    let now = wall_ms();
    for i in 0..count {
        let user = format!("user-{}", rng.gen_range(0..12));
        let session = format!("{user}-s{}", rng.gen_range(0..3));
        let page = SIM_PAGES[rng.gen_range(0..SIM_PAGES.len())];
        let target = SIM_TARGETS[rng.gen_range(0..SIM_TARGETS.len())];
        let at_ms = now.saturating_sub(rng.gen_range(0..240_000));
        let kind = match rng.gen_range(0..10) {
            0..=5 => InteractionKind::Click,
            6..=7 => InteractionKind::Hover,
            8 => InteractionKind::Scroll,
            _ => InteractionKind::Keypress,
        };
        conductor
            .record_interaction(InteractionEvent {
                user: user.clone(),
                session,
                kind,
                target: target.to_string(),
                x: rng.gen_range(0.0..1280.0),
                y: rng.gen_range(0.0..720.0),
                page: page.to_string(),
                device: (if rng.gen_bool(0.5) { "mobile" } else { "desktop" }).to_string(),
                viewport: "1280x720".to_string(),
                at_ms,
            })
            .await;
        if i % 7 == 0 {
            conductor
                .record_engagement(EngagementEvent {
                    user: user.clone(),
                    kind: EngagementKind::Like,
                    target_id: format!("post-{}", rng.gen_range(0..40)),
                    target_type: "post".to_string(),
                    sentiment: Some(if rng.gen_bool(0.7) {
                        Sentiment::Positive
                    } else {
                        Sentiment::Negative
                    }),
                    at_ms,
                })
                .await;
        }
        if i % 11 == 0 {
            conductor
                .record_performance(PerformanceSample {
                    user,
                    page: page.to_string(),
                    load_ms: rng.gen_range(400.0..4_500.0),
                    fcp_ms: rng.gen_range(200.0..1_500.0),
                    lcp_ms: rng.gen_range(600.0..3_000.0),
                    fid_ms: rng.gen_range(4.0..80.0),
                    cls: rng.gen_range(0.0..0.3),
                    ttfb_ms: rng.gen_range(50.0..600.0),
                    device: "mobile".to_string(),
                    connection: "4g".to_string(),
                    at_ms,
                })
                .await;
        }
    }
}
