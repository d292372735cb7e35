//! The aggregation batch: players, then clans, then trophies.
//!
//! Execution:
//!   1. Load every player's full game history
//!   2. Compute player stats in parallel (pure, no store access)
//!   3. Write player stats and trophies
//!   4. Barrier: only now aggregate clans from the player stats just written
//!   5. Write clan stats and rebuild clan trophies from an empty set
//!
//! `Aggregator::run` wraps all of it in one transaction, so a reader never
//! sees updated players next to stale clans.

use crate::{
    clan_aggregator::ClanAggregator,
    config::TournamentConfig,
    error::{ScoreError, ScoreResult},
    game::Game,
    leaderboard::LeaderboardStats,
    player_aggregator::PlayerAggregator,
    repository::LeaderboardRepository,
    store::ScoreStore,
    trophy::{trophy_catalog, TrophyDef, TrophyEvaluator},
    types::Subject,
    uniqdeaths::UniqueDeathCompiler,
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Totals and compiled rules shared by every unit of one batch.
/// Immutable once built.
pub struct AggregationContext<'a> {
    pub config:             &'a TournamentConfig,
    pub deaths:             UniqueDeathCompiler,
    /// Achievement specs registered for the tournament ruleset.
    pub total_achievements: u64,
    /// Conduct specs registered for the tournament ruleset.
    pub total_conducts:     u64,
    pub trophies:           Vec<TrophyDef>,
}

impl<'a> AggregationContext<'a> {
    pub fn new(config: &'a TournamentConfig) -> ScoreResult<Self> {
        let specs = config.registry.for_ruleset(&config.ruleset).ok_or_else(|| {
            ScoreError::Other(anyhow::anyhow!(
                "no specs registered for tournament ruleset {}",
                config.ruleset
            ))
        })?;
        let deaths = UniqueDeathCompiler::new(&config.deaths)
            .map_err(|e| anyhow::anyhow!("invalid unique-death pattern: {e}"))?;
        Ok(Self {
            config,
            deaths,
            total_achievements: specs.achievements.len() as u64,
            total_conducts: specs.conducts.len() as u64,
            trophies: trophy_catalog(&config.trophies),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationSummary {
    pub players:         usize,
    pub clans:           usize,
    pub player_trophies: usize,
    pub clan_trophies:   usize,
}

pub struct Aggregator<'a> {
    ctx: AggregationContext<'a>,
}

impl<'a> Aggregator<'a> {
    pub fn new(config: &'a TournamentConfig) -> ScoreResult<Self> {
        Ok(Self { ctx: AggregationContext::new(config)? })
    }

    pub fn context(&self) -> &AggregationContext<'a> {
        &self.ctx
    }

    /// Run the full batch as a single transaction.
    pub fn run(&self, store: &ScoreStore) -> ScoreResult<AggregationSummary> {
        store.in_transaction(|store| {
            store.seed_trophies(&self.ctx.trophies)?;
            self.run_with(store)
        })
    }

    /// Run the batch against any repository. The caller owns atomicity.
    pub fn run_with<R: LeaderboardRepository>(&self, repo: &R) -> ScoreResult<AggregationSummary> {
        let evaluator = TrophyEvaluator::new(&self.ctx);
        let mut summary = AggregationSummary::default();

        // ── Players ────────────────────────────────────────────────
        let players = repo.players()?;
        let histories = players
            .iter()
            .map(|p| repo.games_for(Subject::Player(p.id)))
            .collect::<ScoreResult<Vec<_>>>()?;
        let computed = self.compute_players(&histories);

        let mut player_stats = HashMap::with_capacity(players.len());
        for ((player, games), stats) in players.iter().zip(&histories).zip(computed) {
            let subject = Subject::Player(player.id);
            repo.replace_stats(subject, &stats)?;

            let held = repo.trophies_for(subject)?;
            let trophies = evaluator.evaluate(&stats, games, &held);
            repo.replace_trophies(subject, &trophies)?;

            log::debug!(
                "{subject} '{}': {} games, {} wins, {} trophies",
                player.name, stats.total_games, stats.wins, trophies.len()
            );
            summary.players += 1;
            summary.player_trophies += trophies.len();
            player_stats.insert(player.id, stats);
        }

        // ── Clans ──────────────────────────────────────────────────
        let clan_aggregator = ClanAggregator::new(&self.ctx);
        for clan in repo.clans()? {
            let subject = Subject::Clan(clan.id);
            let members = repo
                .clan_members(clan.id)?
                .into_iter()
                .map(|id| match player_stats.get(&id) {
                    Some(stats) => Ok(stats.clone()),
                    None => repo.stats_for(Subject::Player(id)),
                })
                .collect::<ScoreResult<Vec<_>>>()?;
            let games = repo.games_for(subject)?;

            let stats = clan_aggregator.compute(&members, &games);
            repo.replace_stats(subject, &stats)?;

            // Membership may have changed since the last batch.
            let trophies = evaluator.evaluate(&stats, &games, &BTreeSet::new());
            repo.replace_trophies(subject, &trophies)?;

            log::debug!(
                "{subject} '{}': {} members, {} games, {} trophies",
                clan.name, members.len(), stats.total_games, trophies.len()
            );
            summary.clans += 1;
            summary.clan_trophies += trophies.len();
        }

        log::info!(
            "aggregated {} players ({} trophies) and {} clans ({} trophies)",
            summary.players, summary.player_trophies, summary.clans, summary.clan_trophies
        );
        Ok(summary)
    }

    /// Output order matches `histories`.
    fn compute_players(&self, histories: &[Vec<Game>]) -> Vec<LeaderboardStats> {
        let aggregator = PlayerAggregator::new(&self.ctx);
        histories.par_iter().map(|games| aggregator.compute(games)).collect()
    }
}
