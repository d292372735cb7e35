//! The Game entity and the factory that validates records into games.
//!
//! Checks run in a fixed order and stop at the first violation:
//!   1. start time not in the future
//!   2. end time not in the future
//!   3. start time not after end time
//!   4. realtime (when present) not above wallclock
//!
//! A record that fails any check produces no Game at all.

use crate::{
    bitfield::BitfieldDecoder,
    config::ScoringRules,
    error::{RecordError, TemporalViolation},
    record::XlogRecord,
    spec_registry::{Ruleset, SourceField, SpecRegistry},
    types::{GameId, SourceId},
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const FLAG_WIZARD: u64 = 0x1;
pub const FLAG_EXPLORE: u64 = 0x2;
pub const FLAG_BONESLESS: u64 = 0x4;

/// Bit of the `achieve` field set on ascension.
pub const ACHIEVE_ASCENDED: u64 = 0x100;

pub const DEATH_ASCENDED: &str = "ascended";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    Normal,
    Wizard,
    Explore,
}

/// Role, race, birth gender, birth alignment.
pub type Rrga<'a> = (&'a str, Option<&'a str>, Option<&'a str>, Option<&'a str>);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Game {
    pub id:          Option<GameId>,
    pub source_id:   Option<SourceId>,
    pub server:      String,
    pub variant:     String,
    pub version:     String,
    pub player_name: String,

    pub role:    String,
    pub race:    Option<String>,
    pub gender:  Option<String>,
    pub gender0: Option<String>,
    pub align:   Option<String>,
    pub align0:  Option<String>,

    pub points:    i64,
    pub turns:     u64,
    pub starttime: DateTime<Utc>,
    pub endtime:   DateTime<Utc>,
    pub realtime:  Option<Duration>,
    pub death:     String,

    pub wizmode:   bool,
    pub explore:   bool,
    pub bonesless: bool,
    pub won:       bool,

    pub deathlev:  Option<i64>,
    pub maxlvl:    Option<i64>,
    pub hp:        Option<i64>,
    pub maxhp:     Option<i64>,
    pub deaths:    Option<i64>,
    pub birthdate: Option<NaiveDate>,
    pub deathdate: Option<NaiveDate>,

    /// Matched conduct short names.
    pub conducts:     BTreeSet<String>,
    /// Matched achievement titles.
    pub achievements: BTreeSet<String>,
}

impl Game {
    pub fn wallclock(&self) -> Duration {
        self.endtime - self.starttime
    }

    pub fn ruleset(&self) -> Ruleset {
        Ruleset::new(&self.variant, &self.version)
    }

    pub fn mode(&self) -> GameMode {
        if self.wizmode {
            GameMode::Wizard
        } else if self.explore {
            GameMode::Explore
        } else {
            GameMode::Normal
        }
    }

    pub fn rrga(&self) -> Rrga<'_> {
        (
            self.role.as_str(),
            self.race.as_deref(),
            self.gender0.as_deref(),
            self.align0.as_deref(),
        )
    }

    pub fn is_scummed(&self, rules: &ScoringRules) -> bool {
        self.turns <= rules.scum_max_turns && rules.scum_deaths.iter().any(|d| *d == self.death)
    }

    /// True when every named achievement was earned in this game.
    pub fn reached_milestones(&self, milestones: &[String]) -> bool {
        !milestones.is_empty() && milestones.iter().all(|m| self.achievements.contains(m))
    }

    /// Expand a dumplog URL template: `%n1` first letter of the name,
    /// `%n` the name, `%st` the start time in epoch seconds.
    pub fn dumplog_url(&self, fmt: &str) -> String {
        let first: String = self.player_name.chars().take(1).collect();
        fmt.replace("%n1", &first)
            .replace("%n", &self.player_name)
            .replace("%st", &self.starttime.timestamp().to_string())
    }
}

/// Where a record came from.
#[derive(Debug, Clone)]
pub struct SourceContext<'a> {
    pub source_id: Option<SourceId>,
    pub server:    &'a str,
    pub variant:   &'a str,
}

#[derive(Debug, Clone)]
pub struct BuiltGame {
    pub game:          Game,
    pub ruleset_known: bool,
}

pub struct GameFactory<'a> {
    decoder: BitfieldDecoder<'a>,
    now:     DateTime<Utc>,
}

impl<'a> GameFactory<'a> {
    /// `now` is the evaluation time future timestamps are judged against.
    pub fn new(registry: &'a SpecRegistry, now: DateTime<Utc>) -> Self {
        Self { decoder: BitfieldDecoder::new(registry), now }
    }

    pub fn build(
        &self,
        record: XlogRecord,
        ctx:    &SourceContext<'_>,
    ) -> Result<BuiltGame, RecordError> {
        check_temporal(record.starttime, record.endtime, record.realtime, self.now)
            .map_err(RecordError::TemporalInconsistency)?;

        let ruleset = Ruleset::new(ctx.variant, &record.version);
        let decoded = self.decoder.decode(&record, &ruleset);

        let flags = record.flags.unwrap_or(0);
        let ascended_bit = record
            .bitfield(SourceField::Achieve)
            .is_some_and(|a| a & ACHIEVE_ASCENDED != 0);
        let won = ascended_bit || record.death == DEATH_ASCENDED;

        let game = Game {
            id:          None,
            source_id:   ctx.source_id,
            server:      record.server.unwrap_or_else(|| ctx.server.to_string()),
            variant:     ctx.variant.to_string(),
            version:     record.version,
            player_name: record.name,
            role:        record.role,
            race:        record.race,
            gender0:     record.gender0.or_else(|| record.gender.clone()),
            gender:      record.gender,
            align0:      record.align0.or_else(|| record.align.clone()),
            align:       record.align,
            points:      record.points.unwrap_or(0),
            turns:       record.turns,
            starttime:   record.starttime,
            endtime:     record.endtime,
            realtime:    record.realtime,
            death:       record.death,
            wizmode:     flags & FLAG_WIZARD != 0,
            explore:     flags & FLAG_EXPLORE != 0,
            bonesless:   flags & FLAG_BONESLESS != 0,
            won,
            deathlev:    record.deathlev,
            maxlvl:      record.maxlvl,
            hp:          record.hp,
            maxhp:       record.maxhp,
            deaths:      record.deaths,
            birthdate:   record.birthdate,
            deathdate:   record.deathdate,
            conducts:     decoded.conduct_names().map(str::to_string).collect(),
            achievements: decoded.achievement_names().map(str::to_string).collect(),
        };

        Ok(BuiltGame { game, ruleset_known: decoded.ruleset_known })
    }
}

pub fn check_temporal(
    start:    DateTime<Utc>,
    end:      DateTime<Utc>,
    realtime: Option<Duration>,
    now:      DateTime<Utc>,
) -> Result<(), TemporalViolation> {
    if start > now {
        return Err(TemporalViolation::FutureStart);
    }
    if end > now {
        return Err(TemporalViolation::FutureEnd);
    }
    if start > end {
        return Err(TemporalViolation::EndBeforeStart);
    }
    if let Some(rt) = realtime {
        if end - start < rt {
            return Err(TemporalViolation::RealtimeExceedsWallclock);
        }
    }
    Ok(())
}
