//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Ingestion and aggregation call store methods; they never execute SQL directly.

use crate::error::ScoreResult;
use rusqlite::Connection;

mod game;
mod leaderboard;
mod source;

pub use source::{LogSource, RejectedRecord};

pub struct ScoreStore {
    conn: Connection,
}

impl ScoreStore {
    pub fn open(path: &str) -> ScoreResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> ScoreResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> ScoreResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    /// Run `f` as one transaction: committed if it returns Ok, rolled back
    /// otherwise. Not reentrant.
    pub fn in_transaction<T>(&self, f: impl FnOnce(&Self) -> ScoreResult<T>) -> ScoreResult<T> {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    // ── Wipe ───────────────────────────────────────────────────

    /// Delete every game and rejected line, zero every leaderboard, drop
    /// every trophy award and rewind every source cursor. Players, clans,
    /// sources and trophy definitions survive.
    pub fn wipe_games(&self) -> ScoreResult<()> {
        self.in_transaction(|store| {
            store.conn.execute_batch(&format!(
                "DELETE FROM player_trophy;
                 DELETE FROM clan_trophy;
                 DELETE FROM rejected_record;
                 UPDATE player SET {reset};
                 UPDATE clan SET {reset};
                 DELETE FROM game_conduct;
                 DELETE FROM game_achievement;
                 DELETE FROM game;
                 UPDATE source SET file_pos = 0, last_check = NULL;",
                reset = leaderboard::STATS_RESET,
            ))?;
            log::info!("wiped all games, leaderboards and source cursors");
            Ok(())
        })
    }
}
