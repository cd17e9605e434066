use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use chromatic_clash_server::config::GameSettings;
use chromatic_clash_server::coordinator::SessionCoordinator;
use chromatic_clash_server::rng::Rng;
use chromatic_clash_server::types::{Phase, ScoreEntry, ServerEvent};
use clap::Parser;
use serde::Serialize;
use tracing::{error, info, warn};

const STEP_MS: u64 = 50;
const BOT_STEP_PX: f64 = 6.0;

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless bot matches against the game coordinator")]
struct Cli {
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(2..=8))]
    players: u8,
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u32).range(1..=3600))]
    seconds: u32,
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=100))]
    matches: u32,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug)]
struct Scenario {
    index: u32,
    players: usize,
    seconds: u32,
    seed: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MatchResultLine {
    match_index: u32,
    seed: u64,
    players: usize,
    seconds: u32,
    duration_ms: u64,
    powerups_spawned: u32,
    powerups_collected: u32,
    owned_percent: f64,
    standings: Vec<ScoreEntry>,
    anomalies: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunSummary {
    run_id: String,
    match_count: usize,
    anomaly_count: usize,
    average_owned_percent: f64,
    matches: Vec<MatchResultLine>,
}

struct Bot {
    id: String,
    heading: f64,
    chases_powerups: bool,
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let base_seed = cli.seed.unwrap_or_else(now_ms);
    let run_id = format!("sim-{base_seed}");

    let mut results = Vec::new();
    for index in 0..cli.matches {
        let scenario = Scenario {
            index,
            players: usize::from(cli.players),
            seconds: cli.seconds,
            seed: base_seed.wrapping_add(u64::from(index)),
        };
        info!(run = %run_id, index, seed = scenario.seed, players = scenario.players, "match started");
        let result = run_match(&scenario);
        for anomaly in &result.anomalies {
            warn!(run = %run_id, index, %anomaly, "anomaly detected");
        }
        match serde_json::to_string(&result) {
            Ok(line) => println!("{line}"),
            Err(error) => error!(%error, "match result failed to serialize"),
        }
        results.push(result);
    }

    let summary = build_run_summary(run_id.clone(), results);
    if let Some(path) = cli.summary_out.as_ref() {
        if let Err(error) = write_summary(path, &summary) {
            error!(path = %path.display(), %error, "summary write failed");
            std::process::exit(2);
        }
    }
    info!(
        run = %run_id,
        matches = summary.match_count,
        anomalies = summary.anomaly_count,
        average_owned_percent = summary.average_owned_percent,
        "run finished"
    );

    if summary.anomaly_count > 0 {
        std::process::exit(1);
    }
}

fn run_match(scenario: &Scenario) -> MatchResultLine {
    let settings = GameSettings {
        game_duration_secs: scenario.seconds,
        ..GameSettings::default()
    };
    let mut coordinator = SessionCoordinator::with_seed(settings, scenario.seed);
    let mut rng = Rng::new(scenario.seed as u32);
    let mut anomalies = Vec::new();
    let mut seen = HashSet::new();

    let mut bots: Vec<Bot> = (0..scenario.players)
        .map(|idx| Bot {
            id: format!("bot_{}", idx + 1),
            heading: rng.range(0.0, std::f64::consts::TAU),
            chases_powerups: idx % 2 == 0,
        })
        .collect();

    let code = match coordinator.create_room(&bots[0].id, "Bot-01") {
        Ok(code) => code,
        Err(rejection) => {
            push_anomaly(&mut anomalies, &mut seen, format!("create failed: {rejection}"));
            return empty_result(scenario, anomalies);
        }
    };
    for (idx, bot) in bots.iter().enumerate().skip(1) {
        if let Err(rejection) = coordinator.join_room(&bot.id, &code, &format!("Bot-{:02}", idx + 1)) {
            push_anomaly(&mut anomalies, &mut seen, format!("join failed: {rejection}"));
        }
    }
    if let Err(rejection) = coordinator.start_game(&bots[0].id, &code, 0) {
        push_anomaly(&mut anomalies, &mut seen, format!("start failed: {rejection}"));
        return empty_result(scenario, anomalies);
    }

    let mut now_ms = 0u64;
    let mut powerups_spawned = 0u32;
    let mut powerups_collected = 0u32;
    let mut standings = Vec::new();
    let limit_ms = (u64::from(scenario.seconds) + 10) * 1_000;

    loop {
        now_ms += STEP_MS;
        coordinator.fire_due(now_ms);

        let Some(session) = coordinator.room(&code) else {
            push_anomaly(&mut anomalies, &mut seen, "room vanished mid-match".to_string());
            break;
        };
        if session.phase() == Phase::Playing {
            let moves: Vec<(String, f64, f64)> = bots
                .iter_mut()
                .filter_map(|bot| {
                    let player = session.player(&bot.id)?;
                    if player.view.is_frozen {
                        return None;
                    }
                    let target = if bot.chases_powerups {
                        session
                            .powerups()
                            .iter()
                            .min_by(|a, b| {
                                let da = (a.x - player.view.x).hypot(a.y - player.view.y);
                                let db = (b.x - player.view.x).hypot(b.y - player.view.y);
                                da.total_cmp(&db)
                            })
                            .map(|powerup| (powerup.x, powerup.y))
                    } else {
                        None
                    };
                    bot.heading = match target {
                        Some((tx, ty)) => (ty - player.view.y).atan2(tx - player.view.x),
                        None => bot.heading + rng.range(-0.4, 0.4),
                    };
                    let step = BOT_STEP_PX * f64::from(player.view.speed);
                    let mut x = player.view.x + bot.heading.cos() * step;
                    let mut y = player.view.y + bot.heading.sin() * step;
                    let width = f64::from(session.canvas().width());
                    let height = f64::from(session.canvas().height());
                    if !(0.0..width).contains(&x) {
                        bot.heading = std::f64::consts::PI - bot.heading;
                        x = x.clamp(0.0, width - 1.0);
                    }
                    if !(0.0..height).contains(&y) {
                        bot.heading = -bot.heading;
                        y = y.clamp(0.0, height - 1.0);
                    }
                    Some((bot.id.clone(), x, y))
                })
                .collect();
            for (id, x, y) in moves {
                coordinator.move_player(&id, &code, x, y, now_ms);
            }
        }

        for delivery in coordinator.drain_deliveries() {
            match delivery.event {
                ServerEvent::PowerupSpawned { .. } => powerups_spawned += 1,
                ServerEvent::PowerupCollected { .. } => powerups_collected += 1,
                ServerEvent::GameEnded { results } => standings = results,
                ServerEvent::Error { message } => {
                    push_anomaly(&mut anomalies, &mut seen, format!("error event: {message}"));
                }
                _ => {}
            }
        }

        if coordinator.room(&code).map(|session| session.phase()) == Some(Phase::Finished) {
            break;
        }
        if now_ms > limit_ms {
            push_anomaly(&mut anomalies, &mut seen, "match did not finish in time".to_string());
            break;
        }
    }

    let owned_fraction = coordinator
        .room(&code)
        .map(|session| {
            let canvas = session.canvas();
            let cells = f64::from(canvas.width()) * f64::from(canvas.height());
            canvas.owned_cell_count() as f64 / cells
        })
        .unwrap_or(0.0);
    let owned_cells = coordinator
        .room(&code)
        .map(|session| session.canvas().owned_cell_count())
        .unwrap_or(0);
    for message in collect_standings_anomalies(&standings, owned_cells, scenario.players) {
        push_anomaly(&mut anomalies, &mut seen, message);
    }

    MatchResultLine {
        match_index: scenario.index,
        seed: scenario.seed,
        players: scenario.players,
        seconds: scenario.seconds,
        duration_ms: now_ms,
        powerups_spawned,
        powerups_collected,
        owned_percent: (owned_fraction * 1000.0).round() / 10.0,
        standings,
        anomalies,
    }
}

fn collect_standings_anomalies(
    standings: &[ScoreEntry],
    owned_cells: usize,
    players: usize,
) -> Vec<String> {
    let mut anomalies = Vec::new();
    if standings.len() != players {
        anomalies.push(format!(
            "standings list {} players, expected {players}",
            standings.len()
        ));
    }
    if standings
        .windows(2)
        .any(|pair| pair[0].score < pair[1].score)
    {
        anomalies.push("standings not sorted by score".to_string());
    }
    let total: u64 = standings.iter().map(|entry| u64::from(entry.score)).sum();
    if total != owned_cells as u64 {
        anomalies.push(format!(
            "score total {total} does not match {owned_cells} owned cells"
        ));
    }
    anomalies
}

fn empty_result(scenario: &Scenario, anomalies: Vec<String>) -> MatchResultLine {
    MatchResultLine {
        match_index: scenario.index,
        seed: scenario.seed,
        players: scenario.players,
        seconds: scenario.seconds,
        duration_ms: 0,
        powerups_spawned: 0,
        powerups_collected: 0,
        owned_percent: 0.0,
        standings: Vec::new(),
        anomalies,
    }
}

fn push_anomaly(anomalies: &mut Vec<String>, seen: &mut HashSet<String>, message: String) {
    if seen.insert(message.clone()) {
        anomalies.push(message);
    }
}

fn build_run_summary(run_id: String, matches: Vec<MatchResultLine>) -> RunSummary {
    let match_count = matches.len();
    let anomaly_count = matches.iter().map(|result| result.anomalies.len()).sum();
    let average_owned_percent = if match_count == 0 {
        0.0
    } else {
        matches.iter().map(|result| result.owned_percent).sum::<f64>() / match_count as f64
    };
    RunSummary {
        run_id,
        match_count,
        anomaly_count,
        average_owned_percent,
        matches,
    }
}

fn write_summary(path: &Path, summary: &RunSummary) -> io::Result<()> {
    let summary_text = serde_json::to_string_pretty(summary)?;
    std::fs::write(path, summary_text)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
