use crate::spec_registry::{AchievementSpec, ConductSpec, Ruleset, SpecRegistry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ── Scoring rules ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringRules {
    /// Death strings that count as abandoning a game.
    pub scum_deaths: Vec<String>,
    /// A scum death at or under this many turns is a scummed game.
    pub scum_max_turns: u64,
    /// Games at or over this many turns count toward games_over_1000_turns.
    pub long_game_turns: u64,
    /// Achievement titles that together mark the late-game milestone
    /// used by the "Lesser" trophies.
    pub milestone_achievements: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct TournamentFile {
    ruleset: Ruleset,
    scoring: ScoringRules,
}

// ── Unique deaths ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeathNormalization {
    pub pattern:     String,
    pub replacement: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeathRules {
    /// Applied in order to every death string.
    pub normalizations: Vec<DeathNormalization>,
    /// Any match excludes the death from the unique set.
    pub rejections: Vec<String>,
}

// ── Trophies ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceTrophyRule {
    /// Display name, e.g. "Dwarf" for "Great Dwarf" / "Lesser Dwarf".
    pub name: String,
    pub race: String,
    pub required_roles: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleTrophyRule {
    pub name: String,
    pub role: String,
    /// "Race-Align" pairs, e.g. "Hum-Neu".
    pub required_race_aligns: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeverKillRule {
    pub conduct: String,
    pub trophy:  String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionTotals {
    pub genders:    usize,
    pub alignments: usize,
    pub races:      usize,
    pub roles:      usize,
    pub combos:     usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrophyTables {
    pub races:      Vec<RaceTrophyRule>,
    pub roles:      Vec<RoleTrophyRule>,
    pub never_kill: Vec<NeverKillRule>,
    pub totals:     CompletionTotals,
}

#[derive(Debug, Clone, Deserialize)]
struct ConductFile {
    conducts: Vec<ConductSpec>,
}

#[derive(Debug, Clone, Deserialize)]
struct AchievementFile {
    achievements: Vec<AchievementSpec>,
}

// ── Top level ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TournamentConfig {
    /// The ruleset tournament totals are counted against.
    pub ruleset:  Ruleset,
    pub registry: SpecRegistry,
    pub scoring:  ScoringRules,
    pub deaths:   DeathRules,
    pub trophies: TrophyTables,
}

impl TournamentConfig {
    /// Load from the data/ directory.
    /// In tests, use TournamentConfig::builtin().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let read = |rel: &str| -> anyhow::Result<String> {
            let path = format!("{data_dir}/{rel}");
            std::fs::read_to_string(&path).map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))
        };
        Self::from_json(
            &read("tournament.json")?,
            &read("specs/conducts.json")?,
            &read("specs/achievements.json")?,
            &read("deaths/unique_deaths.json")?,
            &read("trophies/trophies.json")?,
        )
    }

    /// The data/ directory as compiled into the binary.
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_json(
            include_str!("../../data/tournament.json"),
            include_str!("../../data/specs/conducts.json"),
            include_str!("../../data/specs/achievements.json"),
            include_str!("../../data/deaths/unique_deaths.json"),
            include_str!("../../data/trophies/trophies.json"),
        )
    }

    fn from_json(
        tournament:   &str,
        conducts:     &str,
        achievements: &str,
        deaths:       &str,
        trophies:     &str,
    ) -> anyhow::Result<Self> {
        let tournament: TournamentFile = serde_json::from_str(tournament)?;
        let conducts: ConductFile = serde_json::from_str(conducts)?;
        let achievements: AchievementFile = serde_json::from_str(achievements)?;
        let deaths: DeathRules = serde_json::from_str(deaths)?;
        let trophies: TrophyTables = serde_json::from_str(trophies)?;

        let registry = SpecRegistry::new(conducts.conducts, achievements.achievements)?;
        if registry.for_ruleset(&tournament.ruleset).is_none() {
            anyhow::bail!("no specs registered for tournament ruleset {}", tournament.ruleset);
        }

        let config = Self {
            ruleset: tournament.ruleset,
            registry,
            scoring: tournament.scoring,
            deaths,
            trophies,
        };

        // Compile once so a bad pattern fails at load, not mid-batch.
        crate::uniqdeaths::UniqueDeathCompiler::new(&config.deaths)?;

        for rule in config.unresolved_never_kill() {
            log::warn!(
                "trophy '{}' keys on conduct '{}', which no registered spec uses; \
                 it cannot be awarded until the table or the specs change",
                rule.trophy, rule.conduct
            );
        }
        Ok(config)
    }

    /// Never-kill rules naming a conduct short name that is not registered.
    pub fn unresolved_never_kill(&self) -> Vec<&NeverKillRule> {
        self.trophies
            .never_kill
            .iter()
            .filter(|r| !self.registry.has_conduct(&r.conduct))
            .collect()
    }
}
