//! scoreboard-runner: headless ingest and aggregation for the tournament scoreboard.
//!
//! Usage:
//!   scoreboard-runner --db scores.db --add-source hdf-us,hdf,tnnt,/var/xlog/hdf-us.xlog
//!   scoreboard-runner --db scores.db --ingest --aggregate --summary
//!   scoreboard-runner --db scores.db --wipe-games
//!
//! Operations run in a fixed order: wipe, add source, ingest, aggregate, summary.

use anyhow::{bail, Result};
use serde::Serialize;
use std::env;
use std::sync::atomic::AtomicBool;
use tnnt_core::{
    aggregate::Aggregator,
    config::TournamentConfig,
    ingest::{FailurePolicy, Ingestor},
    leaderboard::LeaderboardStats,
    store::{LogSource, ScoreStore},
};

#[derive(Serialize)]
struct PlayerSummary {
    rank:  usize,
    name:  String,
    #[serde(flatten)]
    stats: LeaderboardStats,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = parse_str(&args, "--db").unwrap_or("scoreboard.db");
    let data_dir = parse_str(&args, "--data-dir");
    let add_source = parse_str(&args, "--add-source");
    let top = parse_arg(&args, "--top", 10usize);
    let has = |flag: &str| args.iter().any(|a| a == flag);

    let config = match data_dir {
        Some(dir) => TournamentConfig::load(dir)?,
        None => TournamentConfig::builtin()?,
    };

    let store = ScoreStore::open(db)?;
    store.migrate()?;

    println!("TNNT scoreboard-runner");
    println!("  db:        {db}");
    println!("  data_dir:  {}", data_dir.unwrap_or("(builtin)"));
    println!("  ruleset:   {}", config.ruleset);
    println!("  started:   {}", chrono::Utc::now().to_rfc3339());
    println!();

    if has("--wipe-games") {
        store.wipe_games()?;
        println!("wiped all games");
    }

    if let Some(spec) = add_source {
        let source = parse_source(spec)?;
        let id = store.add_source(&source)?;
        println!("added source '{}' (#{id}) -> {}", source.name, source.local_file);
    }

    if has("--ingest") {
        let policy = if has("--abort-on-error") { FailurePolicy::Abort } else { FailurePolicy::Skip };
        let stop = AtomicBool::new(false);
        let reports = Ingestor::new(&config).with_policy(policy).ingest_all(&store, &stop)?;

        println!("=== INGEST ===");
        for r in &reports {
            println!(
                "  {:<16} lines {:>6}  games {:>6}  rejected {:>4}  unknown ruleset {:>4}  cursor {} -> {}",
                r.source, r.lines_read, r.games_created, r.rejected, r.unknown_ruleset,
                r.old_pos, r.new_pos
            );
        }
        println!();
        if let Some(err) = reports.iter().find_map(|r| r.abort_error()) {
            log::error!("ingest aborted: {err}");
            return Err(err.into());
        }
    }

    if has("--aggregate") {
        let summary = Aggregator::new(&config)?.run(&store)?;
        println!("=== AGGREGATE ===");
        println!("  players:         {}", summary.players);
        println!("  player trophies: {}", summary.player_trophies);
        println!("  clans:           {}", summary.clans);
        println!("  clan trophies:   {}", summary.clan_trophies);
        println!();
    }

    if has("--summary") {
        let players: Vec<PlayerSummary> = store
            .top_players(top)?
            .into_iter()
            .enumerate()
            .map(|(i, (name, stats))| PlayerSummary { rank: i + 1, name, stats })
            .collect();
        println!("{}", serde_json::to_string_pretty(&players)?);
    }

    Ok(())
}

/// `name,server,variant,local_file[,dumplog_fmt]`
fn parse_source(spec: &str) -> Result<LogSource> {
    let parts: Vec<&str> = spec.split(',').map(str::trim).collect();
    if !(4..=5).contains(&parts.len()) || parts[..4].iter().any(|p| p.is_empty()) {
        bail!("--add-source expects name,server,variant,local_file[,dumplog_fmt], got '{spec}'");
    }
    let mut source = LogSource::new(parts[0], parts[1], parts[2], parts[3]);
    source.dumplog_fmt = parts.get(4).map(|s| s.to_string());
    Ok(source)
}

fn parse_str<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
