//! Shared primitive types used across the scoreboard.

/// Row id of a persisted game.
pub type GameId = i64;

/// Row id of a player.
pub type PlayerId = i64;

/// Row id of a clan.
pub type ClanId = i64;

/// Row id of a log source.
pub type SourceId = i64;

/// The leaderboard owner an aggregation result belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Subject {
    Player(PlayerId),
    Clan(ClanId),
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subject::Player(id) => write!(f, "player#{id}"),
            Subject::Clan(id) => write!(f, "clan#{id}"),
        }
    }
}
