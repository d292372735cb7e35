use super::ScoreStore;
use crate::{
    error::ScoreResult,
    game::Game,
    repository::LeaderboardRepository,
    types::{GameId, Subject},
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::{params, types::Type, Row};
use std::collections::{BTreeSet, HashMap};

const DATE_FORMAT: &str = "%Y-%m-%d";

const GAME_COLUMNS: &str = "g.id, g.source_id, g.server, g.variant, g.version, p.name,
     g.role, g.race, g.gender, g.gender0, g.align, g.align0,
     g.points, g.turns, g.starttime, g.endtime, g.realtime, g.death,
     g.wizmode, g.explore, g.bonesless, g.won,
     g.deathlev, g.maxlvl, g.hp, g.maxhp, g.deaths, g.birthdate, g.deathdate";

fn timestamp(idx: usize, secs: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, secs))
}

fn date(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, DATE_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn game_from_row(row: &Row<'_>) -> rusqlite::Result<Game> {
    Ok(Game {
        id:          Some(row.get(0)?),
        source_id:   row.get(1)?,
        server:      row.get(2)?,
        variant:     row.get(3)?,
        version:     row.get(4)?,
        player_name: row.get(5)?,
        role:        row.get(6)?,
        race:        row.get(7)?,
        gender:      row.get(8)?,
        gender0:     row.get(9)?,
        align:       row.get(10)?,
        align0:      row.get(11)?,
        points:      row.get(12)?,
        turns:       row.get::<_, i64>(13)? as u64,
        starttime:   timestamp(14, row.get(14)?)?,
        endtime:     timestamp(15, row.get(15)?)?,
        realtime:    row.get::<_, Option<i64>>(16)?.map(Duration::seconds),
        death:       row.get(17)?,
        wizmode:     row.get(18)?,
        explore:     row.get(19)?,
        bonesless:   row.get(20)?,
        won:         row.get(21)?,
        deathlev:    row.get(22)?,
        maxlvl:      row.get(23)?,
        hp:          row.get(24)?,
        maxhp:       row.get(25)?,
        deaths:      row.get(26)?,
        birthdate:   date(row, 27)?,
        deathdate:   date(row, 28)?,
        conducts:     BTreeSet::new(),
        achievements: BTreeSet::new(),
    })
}

/// WHERE clause selecting a subject's games, with the subject id as ?1.
fn subject_filter(subject: Subject) -> (&'static str, i64) {
    match subject {
        Subject::Player(id) => ("g.player_id = ?1", id),
        Subject::Clan(id) => ("p.clan_id = ?1", id),
    }
}

impl ScoreStore {
    // ── Games ──────────────────────────────────────────────────

    /// Persist a game with its conduct and achievement relations, creating
    /// the player on first sighting. Games are never updated afterwards.
    pub fn insert_game(&self, game: &Game) -> ScoreResult<GameId> {
        let player_id = self.find_or_create_player(&game.player_name)?;
        self.conn.execute(
            "INSERT INTO game (
                source_id, player_id, server, variant, version,
                role, race, gender, gender0, align, align0,
                points, turns, starttime, endtime, realtime, death,
                wizmode, explore, bonesless, won,
                deathlev, maxlvl, hp, maxhp, deaths, birthdate, deathdate
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                      ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28)",
            params![
                game.source_id,
                player_id,
                game.server,
                game.variant,
                game.version,
                game.role,
                game.race,
                game.gender,
                game.gender0,
                game.align,
                game.align0,
                game.points,
                game.turns as i64,
                game.starttime.timestamp(),
                game.endtime.timestamp(),
                game.realtime.map(|r| r.num_seconds()),
                game.death,
                game.wizmode,
                game.explore,
                game.bonesless,
                game.won,
                game.deathlev,
                game.maxlvl,
                game.hp,
                game.maxhp,
                game.deaths,
                game.birthdate.map(|d| d.format(DATE_FORMAT).to_string()),
                game.deathdate.map(|d| d.format(DATE_FORMAT).to_string()),
            ],
        )?;
        let game_id = self.conn.last_insert_rowid();

        for conduct in &game.conducts {
            self.conn.execute(
                "INSERT INTO game_conduct (game_id, name) VALUES (?1, ?2)",
                params![game_id, conduct],
            )?;
        }
        for achievement in &game.achievements {
            self.conn.execute(
                "INSERT INTO game_achievement (game_id, name) VALUES (?1, ?2)",
                params![game_id, achievement],
            )?;
        }
        Ok(game_id)
    }

    pub fn game_count(&self) -> ScoreResult<u64> {
        let n: i64 = self.conn.query_row("SELECT COUNT(*) FROM game", [], |r| r.get(0))?;
        Ok(n as u64)
    }

    /// A subject's games in end-time order, relations attached.
    pub(super) fn load_games(&self, subject: Subject) -> ScoreResult<Vec<Game>> {
        let (filter, id) = subject_filter(subject);

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {GAME_COLUMNS}
             FROM game g JOIN player p ON p.id = g.player_id
             WHERE {filter}
             ORDER BY g.endtime ASC, g.id ASC"
        ))?;
        let mut games = stmt
            .query_map(params![id], game_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut conducts = self.load_relation("game_conduct", filter, id)?;
        let mut achievements = self.load_relation("game_achievement", filter, id)?;
        for game in &mut games {
            let Some(game_id) = game.id else { continue };
            game.conducts = conducts.remove(&game_id).unwrap_or_default();
            game.achievements = achievements.remove(&game_id).unwrap_or_default();
        }
        Ok(games)
    }

    fn load_relation(
        &self,
        table:  &str,
        filter: &str,
        id:     i64,
    ) -> ScoreResult<HashMap<GameId, BTreeSet<String>>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT r.game_id, r.name
             FROM {table} r
             JOIN game g ON g.id = r.game_id
             JOIN player p ON p.id = g.player_id
             WHERE {filter}"
        ))?;
        let mut out: HashMap<GameId, BTreeSet<String>> = HashMap::new();
        let rows = stmt.query_map(params![id], |row| {
            Ok((row.get::<_, GameId>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (game_id, name) = row?;
            out.entry(game_id).or_default().insert(name);
        }
        Ok(out)
    }
}
