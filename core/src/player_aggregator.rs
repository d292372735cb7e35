//! Per-player leaderboard recomputation.
//!
//! Pure: takes a player's complete game history and returns a fresh
//! LeaderboardStats. No store access, so players can be computed in
//! parallel and the same input always yields the same output.

use crate::{
    aggregate::AggregationContext,
    game::Game,
    leaderboard::{BestGameSlot, LeaderboardStats},
    streak::StreakDetector,
};
use std::collections::BTreeSet;

pub struct PlayerAggregator<'a> {
    ctx: &'a AggregationContext<'a>,
}

impl<'a> PlayerAggregator<'a> {
    pub fn new(ctx: &'a AggregationContext<'a>) -> Self {
        Self { ctx }
    }

    pub fn compute(&self, games: &[Game]) -> LeaderboardStats {
        let scoring = &self.ctx.config.scoring;

        let mut stats = LeaderboardStats {
            total_games:             games.len() as u64,
            wins:                    count(games, |g| g.won),
            games_over_1000_turns:   count(games, |g| g.turns >= scoring.long_game_turns),
            games_scummed:           count(games, |g| g.is_scummed(scoring)),
            unique_achievements:     distinct_achievements(games),
            unique_deaths:           self.ctx.deaths.compile(games).len() as u64,
            unique_ascension_combos: distinct_combos(games),
            longest_streak:          StreakDetector::longest(games) as u64,
            ..Default::default()
        };

        for slot in BestGameSlot::ALL {
            stats.best.set(slot, slot.best(games).and_then(|g| g.id));
        }
        stats
    }
}

fn count(games: &[Game], pred: impl Fn(&Game) -> bool) -> u64 {
    games.iter().filter(|g| pred(g)).count() as u64
}

/// Distinct achievements earned across all games, keyed per ruleset.
pub fn distinct_achievements<'a>(games: impl IntoIterator<Item = &'a Game>) -> u64 {
    games
        .into_iter()
        .flat_map(|g| g.achievements.iter().map(move |a| (&g.variant, &g.version, a)))
        .collect::<BTreeSet<_>>()
        .len() as u64
}

/// Distinct conducts kept in winning games, keyed per ruleset.
pub fn distinct_won_conducts<'a>(games: impl IntoIterator<Item = &'a Game>) -> u64 {
    games
        .into_iter()
        .filter(|g| g.won)
        .flat_map(|g| g.conducts.iter().map(move |c| (&g.variant, &g.version, c)))
        .collect::<BTreeSet<_>>()
        .len() as u64
}

/// Distinct role-race-gender0-align0 combinations among wins.
pub fn distinct_combos<'a>(games: impl IntoIterator<Item = &'a Game>) -> u64 {
    games
        .into_iter()
        .filter(|g| g.won)
        .map(Game::rrga)
        .collect::<BTreeSet<_>>()
        .len() as u64
}
