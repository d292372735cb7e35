//! Leaderboard value objects shared by players and clans.
//!
//! A LeaderboardStats value is always recomputed wholesale; nothing in the
//! crate patches individual fields of an existing value.

use crate::{game::Game, types::GameId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// The seven "best game" references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BestGameSlot {
    LowestTurncountAsc,
    FastestWallclockAsc,
    MinScoreAsc,
    MaxScoreAsc,
    MaxConductsAsc,
    MaxAchievesGame,
    FirstAsc,
}

impl BestGameSlot {
    pub const ALL: [BestGameSlot; 7] = [
        BestGameSlot::LowestTurncountAsc,
        BestGameSlot::FastestWallclockAsc,
        BestGameSlot::MinScoreAsc,
        BestGameSlot::MaxScoreAsc,
        BestGameSlot::MaxConductsAsc,
        BestGameSlot::MaxAchievesGame,
        BestGameSlot::FirstAsc,
    ];

    /// Column name in the player and clan tables.
    pub fn column(self) -> &'static str {
        match self {
            BestGameSlot::LowestTurncountAsc  => "lowest_turncount_asc",
            BestGameSlot::FastestWallclockAsc => "fastest_wallclock_asc",
            BestGameSlot::MinScoreAsc         => "min_score_asc",
            BestGameSlot::MaxScoreAsc         => "max_score_asc",
            BestGameSlot::MaxConductsAsc      => "max_conducts_asc",
            BestGameSlot::MaxAchievesGame     => "max_achieves_game",
            BestGameSlot::FirstAsc            => "first_asc",
        }
    }

    /// Every slot but the achievements one only considers ascensions.
    pub fn eligible(self, game: &Game) -> bool {
        match self {
            BestGameSlot::MaxAchievesGame => true,
            _ => game.won,
        }
    }

    fn value(self, game: &Game) -> i64 {
        match self {
            BestGameSlot::LowestTurncountAsc => i64::try_from(game.turns).unwrap_or(i64::MAX),
            BestGameSlot::FastestWallclockAsc => game.wallclock().num_seconds(),
            BestGameSlot::MinScoreAsc | BestGameSlot::MaxScoreAsc => game.points,
            BestGameSlot::MaxConductsAsc => game.conducts.len() as i64,
            BestGameSlot::MaxAchievesGame => game.achievements.len() as i64,
            BestGameSlot::FirstAsc => game.endtime.timestamp(),
        }
    }

    fn higher_is_better(self) -> bool {
        matches!(
            self,
            BestGameSlot::MaxScoreAsc | BestGameSlot::MaxConductsAsc | BestGameSlot::MaxAchievesGame
        )
    }

    /// `Less` means `a` ranks ahead of `b`. Ties fall back to the earlier
    /// end time, then the lower game id.
    pub fn compare(self, a: &Game, b: &Game) -> Ordering {
        let primary = self.value(a).cmp(&self.value(b));
        let primary = if self.higher_is_better() { primary.reverse() } else { primary };
        primary
            .then_with(|| a.endtime.cmp(&b.endtime))
            .then_with(|| a.id.unwrap_or(GameId::MAX).cmp(&b.id.unwrap_or(GameId::MAX)))
    }

    /// The best eligible game, if any.
    pub fn best<'a, I>(self, games: I) -> Option<&'a Game>
    where
        I: IntoIterator<Item = &'a Game>,
    {
        games
            .into_iter()
            .filter(|g| self.eligible(g))
            .min_by(|a, b| self.compare(a, b))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestGames {
    pub lowest_turncount_asc:  Option<GameId>,
    pub fastest_wallclock_asc: Option<GameId>,
    pub min_score_asc:         Option<GameId>,
    pub max_score_asc:         Option<GameId>,
    pub max_conducts_asc:      Option<GameId>,
    pub max_achieves_game:     Option<GameId>,
    pub first_asc:             Option<GameId>,
}

impl BestGames {
    pub fn get(&self, slot: BestGameSlot) -> Option<GameId> {
        match slot {
            BestGameSlot::LowestTurncountAsc  => self.lowest_turncount_asc,
            BestGameSlot::FastestWallclockAsc => self.fastest_wallclock_asc,
            BestGameSlot::MinScoreAsc         => self.min_score_asc,
            BestGameSlot::MaxScoreAsc         => self.max_score_asc,
            BestGameSlot::MaxConductsAsc      => self.max_conducts_asc,
            BestGameSlot::MaxAchievesGame     => self.max_achieves_game,
            BestGameSlot::FirstAsc            => self.first_asc,
        }
    }

    pub fn set(&mut self, slot: BestGameSlot, game: Option<GameId>) {
        let field = match slot {
            BestGameSlot::LowestTurncountAsc  => &mut self.lowest_turncount_asc,
            BestGameSlot::FastestWallclockAsc => &mut self.fastest_wallclock_asc,
            BestGameSlot::MinScoreAsc         => &mut self.min_score_asc,
            BestGameSlot::MaxScoreAsc         => &mut self.max_score_asc,
            BestGameSlot::MaxConductsAsc      => &mut self.max_conducts_asc,
            BestGameSlot::MaxAchievesGame     => &mut self.max_achieves_game,
            BestGameSlot::FirstAsc            => &mut self.first_asc,
        };
        *field = game;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardStats {
    pub total_games:             u64,
    pub wins:                    u64,
    pub games_over_1000_turns:   u64,
    pub games_scummed:           u64,
    pub unique_achievements:     u64,
    pub unique_deaths:           u64,
    pub unique_ascension_combos: u64,
    pub longest_streak:          u64,
    #[serde(flatten)]
    pub best: BestGames,
}
