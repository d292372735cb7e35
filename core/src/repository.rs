//! The read/write surface aggregation needs from storage.
//!
//! Aggregation only ever reads "all games for a player / for a clan's
//! members" and replaces a subject's stats and trophy set wholesale.

use crate::{
    error::ScoreResult,
    game::Game,
    leaderboard::LeaderboardStats,
    types::{ClanId, PlayerId, Subject},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id:      PlayerId,
    pub name:    String,
    pub clan_id: Option<ClanId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClanRecord {
    pub id:   ClanId,
    pub name: String,
}

pub trait LeaderboardRepository {
    /// Players are created lazily, on the first game seen under a name.
    fn find_or_create_player(&self, name: &str) -> ScoreResult<PlayerId>;

    fn players(&self) -> ScoreResult<Vec<PlayerRecord>>;

    fn clans(&self) -> ScoreResult<Vec<ClanRecord>>;

    fn clan_members(&self, clan: ClanId) -> ScoreResult<Vec<PlayerId>>;

    /// For a clan: every game of its current members.
    fn games_for(&self, subject: Subject) -> ScoreResult<Vec<Game>>;

    fn stats_for(&self, subject: Subject) -> ScoreResult<LeaderboardStats>;

    fn replace_stats(&self, subject: Subject, stats: &LeaderboardStats) -> ScoreResult<()>;

    fn trophies_for(&self, subject: Subject) -> ScoreResult<BTreeSet<String>>;

    fn replace_trophies(&self, subject: Subject, trophies: &BTreeSet<String>) -> ScoreResult<()>;
}
