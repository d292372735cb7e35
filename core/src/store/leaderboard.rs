use super::ScoreStore;
use crate::{
    error::{ScoreError, ScoreResult},
    game::Game,
    leaderboard::{BestGameSlot, LeaderboardStats},
    repository::{ClanRecord, LeaderboardRepository, PlayerRecord},
    trophy::TrophyDef,
    types::{ClanId, PlayerId, Subject},
};
use rusqlite::{params, OptionalExtension, Row};
use std::collections::BTreeSet;

const STATS_COLUMNS: &str = "total_games, wins, games_over_1000_turns, games_scummed,
     unique_achievements, unique_deaths, unique_ascension_combos, longest_streak,
     lowest_turncount_asc, fastest_wallclock_asc, min_score_asc, max_score_asc,
     max_conducts_asc, max_achieves_game, first_asc";

/// SET clause returning a player or clan row to an empty leaderboard.
pub(super) const STATS_RESET: &str = "total_games = 0, wins = 0, games_over_1000_turns = 0,
     games_scummed = 0, unique_achievements = 0, unique_deaths = 0,
     unique_ascension_combos = 0, longest_streak = 0,
     lowest_turncount_asc = NULL, fastest_wallclock_asc = NULL, min_score_asc = NULL,
     max_score_asc = NULL, max_conducts_asc = NULL, max_achieves_game = NULL,
     first_asc = NULL";

/// Reads STATS_COLUMNS starting at column `at`.
fn stats_from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<LeaderboardStats> {
    let count = |i: usize| -> rusqlite::Result<u64> { Ok(row.get::<_, i64>(at + i)? as u64) };
    let mut stats = LeaderboardStats {
        total_games:             count(0)?,
        wins:                    count(1)?,
        games_over_1000_turns:   count(2)?,
        games_scummed:           count(3)?,
        unique_achievements:     count(4)?,
        unique_deaths:           count(5)?,
        unique_ascension_combos: count(6)?,
        longest_streak:          count(7)?,
        ..Default::default()
    };
    for (i, slot) in BestGameSlot::ALL.into_iter().enumerate() {
        stats.best.set(slot, row.get(at + 8 + i)?);
    }
    Ok(stats)
}

/// (table, trophy link table, link column, row id)
fn subject_tables(subject: Subject) -> (&'static str, &'static str, &'static str, i64) {
    match subject {
        Subject::Player(id) => ("player", "player_trophy", "player_id", id),
        Subject::Clan(id) => ("clan", "clan_trophy", "clan_id", id),
    }
}

fn not_found(subject: Subject) -> ScoreError {
    match subject {
        Subject::Player(id) => ScoreError::PlayerNotFound { id },
        Subject::Clan(id) => ScoreError::ClanIdNotFound { id },
    }
}

impl ScoreStore {
    // ── Players & clans ────────────────────────────────────────

    pub fn player_id(&self, name: &str) -> ScoreResult<Option<PlayerId>> {
        let id = self
            .conn
            .query_row("SELECT id FROM player WHERE name = ?1", params![name], |r| r.get(0))
            .optional()?;
        Ok(id)
    }

    pub fn create_clan(&self, name: &str) -> ScoreResult<ClanId> {
        self.conn
            .execute("INSERT INTO clan (name) VALUES (?1)", params![name])?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn clan_id(&self, name: &str) -> ScoreResult<Option<ClanId>> {
        let id = self
            .conn
            .query_row("SELECT id FROM clan WHERE name = ?1", params![name], |r| r.get(0))
            .optional()?;
        Ok(id)
    }

    /// Move a player into a clan, or out of any clan with `None`.
    pub fn set_player_clan(&self, player: &str, clan: Option<&str>) -> ScoreResult<()> {
        let clan_id = match clan {
            Some(name) => Some(
                self.clan_id(name)?
                    .ok_or_else(|| ScoreError::ClanNotFound { name: name.to_string() })?,
            ),
            None => None,
        };
        let player_id = self.find_or_create_player(player)?;
        self.conn.execute(
            "UPDATE player SET clan_id = ?1 WHERE id = ?2",
            params![clan_id, player_id],
        )?;
        Ok(())
    }

    /// Players ranked by wins, then by fewest games, then by name.
    pub fn top_players(&self, limit: usize) -> ScoreResult<Vec<(String, LeaderboardStats)>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT name, {STATS_COLUMNS} FROM player
             ORDER BY wins DESC, total_games ASC, name ASC
             LIMIT ?1"
        ))?;
        let rows = stmt
            .query_map(params![limit as i64], |row| Ok((row.get(0)?, stats_from_row(row, 1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Trophies ───────────────────────────────────────────────

    /// Insert trophy definitions, refreshing descriptions of existing ones.
    pub fn seed_trophies(&self, trophies: &[TrophyDef]) -> ScoreResult<()> {
        for t in trophies {
            self.conn.execute(
                "INSERT INTO trophy (name, description) VALUES (?1, ?2)
                 ON CONFLICT(name) DO UPDATE SET description = excluded.description",
                params![t.name, t.description],
            )?;
        }
        Ok(())
    }

    pub fn trophy_definitions(&self) -> ScoreResult<Vec<TrophyDef>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, description FROM trophy ORDER BY id ASC")?;
        let defs = stmt
            .query_map([], |row| {
                Ok(TrophyDef {
                    name:        row.get(0)?,
                    description: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(defs)
    }
}

impl LeaderboardRepository for ScoreStore {
    fn find_or_create_player(&self, name: &str) -> ScoreResult<PlayerId> {
        if let Some(id) = self.player_id(name)? {
            return Ok(id);
        }
        self.conn
            .execute("INSERT INTO player (name) VALUES (?1)", params![name])?;
        let id = self.conn.last_insert_rowid();
        log::debug!("new player '{name}' (#{id})");
        Ok(id)
    }

    fn players(&self) -> ScoreResult<Vec<PlayerRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, clan_id FROM player ORDER BY id ASC")?;
        let players = stmt
            .query_map([], |row| {
                Ok(PlayerRecord {
                    id:      row.get(0)?,
                    name:    row.get(1)?,
                    clan_id: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(players)
    }

    fn clans(&self) -> ScoreResult<Vec<ClanRecord>> {
        let mut stmt = self.conn.prepare("SELECT id, name FROM clan ORDER BY id ASC")?;
        let clans = stmt
            .query_map([], |row| {
                Ok(ClanRecord {
                    id:   row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(clans)
    }

    fn clan_members(&self, clan: ClanId) -> ScoreResult<Vec<PlayerId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM player WHERE clan_id = ?1 ORDER BY id ASC")?;
        let ids = stmt
            .query_map(params![clan], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    fn games_for(&self, subject: Subject) -> ScoreResult<Vec<Game>> {
        self.load_games(subject)
    }

    fn stats_for(&self, subject: Subject) -> ScoreResult<LeaderboardStats> {
        let (table, _, _, id) = subject_tables(subject);
        self.conn
            .query_row(
                &format!("SELECT {STATS_COLUMNS} FROM {table} WHERE id = ?1"),
                params![id],
                |row| stats_from_row(row, 0),
            )
            .optional()?
            .ok_or_else(|| not_found(subject))
    }

    fn replace_stats(&self, subject: Subject, stats: &LeaderboardStats) -> ScoreResult<()> {
        let (table, _, _, id) = subject_tables(subject);
        let best = &stats.best;
        let changed = self.conn.execute(
            &format!(
                "UPDATE {table} SET
                    total_games = ?1, wins = ?2, games_over_1000_turns = ?3,
                    games_scummed = ?4, unique_achievements = ?5, unique_deaths = ?6,
                    unique_ascension_combos = ?7, longest_streak = ?8,
                    lowest_turncount_asc = ?9, fastest_wallclock_asc = ?10,
                    min_score_asc = ?11, max_score_asc = ?12, max_conducts_asc = ?13,
                    max_achieves_game = ?14, first_asc = ?15
                 WHERE id = ?16"
            ),
            params![
                stats.total_games as i64,
                stats.wins as i64,
                stats.games_over_1000_turns as i64,
                stats.games_scummed as i64,
                stats.unique_achievements as i64,
                stats.unique_deaths as i64,
                stats.unique_ascension_combos as i64,
                stats.longest_streak as i64,
                best.lowest_turncount_asc,
                best.fastest_wallclock_asc,
                best.min_score_asc,
                best.max_score_asc,
                best.max_conducts_asc,
                best.max_achieves_game,
                best.first_asc,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(not_found(subject));
        }
        Ok(())
    }

    fn trophies_for(&self, subject: Subject) -> ScoreResult<BTreeSet<String>> {
        let (_, link, column, id) = subject_tables(subject);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT t.name FROM {link} l JOIN trophy t ON t.id = l.trophy_id
             WHERE l.{column} = ?1"
        ))?;
        let names = stmt
            .query_map(params![id], |row| row.get(0))?
            .collect::<Result<BTreeSet<String>, _>>()?;
        Ok(names)
    }

    fn replace_trophies(&self, subject: Subject, trophies: &BTreeSet<String>) -> ScoreResult<()> {
        let (_, link, column, id) = subject_tables(subject);
        self.conn.execute(
            &format!("DELETE FROM {link} WHERE {column} = ?1"),
            params![id],
        )?;
        for name in trophies {
            self.conn.execute(
                "INSERT OR IGNORE INTO trophy (name) VALUES (?1)",
                params![name],
            )?;
            self.conn.execute(
                &format!(
                    "INSERT INTO {link} ({column}, trophy_id)
                     SELECT ?1, id FROM trophy WHERE name = ?2"
                ),
                params![id, name],
            )?;
        }
        Ok(())
    }
}
