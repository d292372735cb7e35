//! Clan leaderboard rollup.
//!
//! ASSUMPTION: every member's LeaderboardStats has already been recomputed
//! in this batch. Counters come from those stats; distinct-value fields are
//! recomputed over the union of member games, since per-player distinct
//! counts cannot be summed.

use crate::{
    aggregate::AggregationContext,
    game::Game,
    leaderboard::{BestGameSlot, LeaderboardStats},
    player_aggregator::{distinct_achievements, distinct_combos},
};
use std::collections::HashMap;

pub struct ClanAggregator<'a> {
    ctx: &'a AggregationContext<'a>,
}

impl<'a> ClanAggregator<'a> {
    pub fn new(ctx: &'a AggregationContext<'a>) -> Self {
        Self { ctx }
    }

    /// `members` are the current members' freshly computed stats and
    /// `clan_games` every game played by those members.
    pub fn compute(&self, members: &[LeaderboardStats], clan_games: &[Game]) -> LeaderboardStats {
        let mut stats = LeaderboardStats {
            total_games:             members.iter().map(|m| m.total_games).sum(),
            wins:                    members.iter().map(|m| m.wins).sum(),
            games_over_1000_turns:   members.iter().map(|m| m.games_over_1000_turns).sum(),
            games_scummed:           members.iter().map(|m| m.games_scummed).sum(),
            longest_streak:          members.iter().map(|m| m.longest_streak).max().unwrap_or(0),
            unique_achievements:     distinct_achievements(clan_games),
            unique_deaths:           self.ctx.deaths.compile(clan_games).len() as u64,
            unique_ascension_combos: distinct_combos(clan_games),
            ..Default::default()
        };

        let by_id: HashMap<_, _> = clan_games
            .iter()
            .filter_map(|g| g.id.map(|id| (id, g)))
            .collect();

        // Pick among the members' own best games, by the same ranking rule.
        for slot in BestGameSlot::ALL {
            let candidates = members.iter().filter_map(|m| {
                let id = m.best.get(slot)?;
                let game = by_id.get(&id).copied();
                if game.is_none() {
                    log::warn!("{} game #{id} not among clan games; skipped", slot.column());
                }
                game
            });
            stats.best.set(slot, slot.best(candidates).and_then(|g| g.id));
        }
        stats
    }
}
