//! Trophy rules, evaluated against a subject's stats and games.
//!
//! RULE: Every trophy is "granted if qualified" and is never taken away,
//! except Never Scum a Game, which is held by default once a subject has
//! played and is revoked as soon as a scummed game appears.
//!
//! Clans pass an empty `held` set: their trophies are rebuilt from scratch
//! every batch because membership may have changed.

use crate::{
    aggregate::AggregationContext,
    config::TrophyTables,
    game::Game,
    leaderboard::LeaderboardStats,
    player_aggregator::{distinct_achievements, distinct_won_conducts},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const BOTH_GENDERS: &str = "Both Genders";
pub const ALL_ALIGNMENTS: &str = "All Alignments";
pub const ALL_RACES: &str = "All Races";
pub const ALL_ROLES: &str = "All Roles";
pub const ALL_ACHIEVEMENTS: &str = "All Achievements";
pub const ALL_CONDUCTS: &str = "All Conducts";
pub const NETHACK_MASTER: &str = "NetHack Master";
pub const NETHACK_DOMINATOR: &str = "NetHack Dominator";
pub const NEVER_SCUM: &str = "Never Scum a Game";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrophyDef {
    pub name:        String,
    pub description: String,
}

/// Every trophy the tables can award, for seeding the store.
pub fn trophy_catalog(tables: &TrophyTables) -> Vec<TrophyDef> {
    let def = |name: String, description: String| TrophyDef { name, description };
    let mut out = Vec::new();
    for r in &tables.races {
        let roles = r.required_roles.iter().cloned().collect::<Vec<_>>().join(", ");
        out.push(def(format!("Great {}", r.name), format!("Ascend a {} as each of: {roles}", r.race)));
        out.push(def(
            format!("Lesser {}", r.name),
            format!("Reach the late-game milestone as a {} of each of: {roles}", r.race),
        ));
    }
    for r in &tables.roles {
        let combos = r.required_race_aligns.iter().cloned().collect::<Vec<_>>().join(", ");
        out.push(def(format!("Great {}", r.name), format!("Ascend a {} as each of: {combos}", r.role)));
        out.push(def(
            format!("Lesser {}", r.name),
            format!("Reach the late-game milestone as a {} of each of: {combos}", r.role),
        ));
    }
    for (name, description) in [
        (BOTH_GENDERS, "Ascend both starting genders"),
        (ALL_ALIGNMENTS, "Ascend every starting alignment"),
        (ALL_RACES, "Ascend every race"),
        (ALL_ROLES, "Ascend every role"),
        (ALL_ACHIEVEMENTS, "Earn every achievement"),
        (ALL_CONDUCTS, "Keep every conduct in some ascension"),
        (NETHACK_MASTER, "Ascend every role-race-gender-alignment combination"),
        (NETHACK_DOMINATOR, "NetHack Master plus every conduct"),
        (NEVER_SCUM, "Play without ever quitting or escaping in the first turns"),
    ] {
        out.push(def(name.to_string(), description.to_string()));
    }
    for rule in &tables.never_kill {
        out.push(def(
            rule.trophy.clone(),
            format!("Ascend keeping the '{}' conduct", rule.conduct),
        ));
    }
    out
}

pub struct TrophyEvaluator<'a> {
    ctx: &'a AggregationContext<'a>,
}

impl<'a> TrophyEvaluator<'a> {
    pub fn new(ctx: &'a AggregationContext<'a>) -> Self {
        Self { ctx }
    }

    /// Returns the subject's new trophy set: `held` plus everything now
    /// earned, with Never Scum a Game granted or revoked.
    pub fn evaluate(
        &self,
        stats: &LeaderboardStats,
        games: &[Game],
        held:  &BTreeSet<String>,
    ) -> BTreeSet<String> {
        let tables = &self.ctx.config.trophies;
        let milestones = &self.ctx.config.scoring.milestone_achievements;
        let mut trophies = held.clone();

        // Only wins and milestone games can contribute to any rule below.
        let relevant: Vec<&Game> = games
            .iter()
            .filter(|g| g.won || g.reached_milestones(milestones))
            .collect();
        let wins: Vec<&Game> = relevant.iter().copied().filter(|g| g.won).collect();
        let milestone_games: Vec<&Game> = relevant
            .iter()
            .copied()
            .filter(|g| g.reached_milestones(milestones))
            .collect();

        for rule in &tables.races {
            if roles_of(&wins, &rule.race) == rule.required_roles {
                trophies.insert(format!("Great {}", rule.name));
            }
            if roles_of(&milestone_games, &rule.race) == rule.required_roles {
                trophies.insert(format!("Lesser {}", rule.name));
            }
        }

        for rule in &tables.roles {
            if race_aligns_of(&wins, &rule.role) == rule.required_race_aligns {
                trophies.insert(format!("Great {}", rule.name));
            }
            if race_aligns_of(&milestone_games, &rule.role) == rule.required_race_aligns {
                trophies.insert(format!("Lesser {}", rule.name));
            }
        }

        let totals = &tables.totals;
        if distinct(&wins, |g| g.gender0.as_deref()) == totals.genders {
            trophies.insert(BOTH_GENDERS.to_string());
        }
        if distinct(&wins, |g| g.align0.as_deref()) == totals.alignments {
            trophies.insert(ALL_ALIGNMENTS.to_string());
        }
        if distinct(&wins, |g| g.race.as_deref()) == totals.races {
            trophies.insert(ALL_RACES.to_string());
        }
        if distinct(&wins, |g| Some(g.role.as_str())) == totals.roles {
            trophies.insert(ALL_ROLES.to_string());
        }
        // Completion is measured against the tournament ruleset only.
        let ruleset = &self.ctx.config.ruleset;
        let in_ruleset: Vec<&Game> = games
            .iter()
            .filter(|g| g.variant == ruleset.variant && g.version == ruleset.version)
            .collect();
        if distinct_achievements(in_ruleset.iter().copied()) == self.ctx.total_achievements {
            trophies.insert(ALL_ACHIEVEMENTS.to_string());
        }

        let all_conducts =
            distinct_won_conducts(in_ruleset.iter().copied()) == self.ctx.total_conducts;
        if all_conducts {
            trophies.insert(ALL_CONDUCTS.to_string());
        }
        if stats.unique_ascension_combos == totals.combos as u64 {
            trophies.insert(NETHACK_MASTER.to_string());
            if all_conducts {
                trophies.insert(NETHACK_DOMINATOR.to_string());
            }
        }

        if stats.games_scummed > 0 {
            trophies.remove(NEVER_SCUM);
        } else if stats.total_games > 0 {
            trophies.insert(NEVER_SCUM.to_string());
        }

        for game in &wins {
            for rule in &tables.never_kill {
                if game.conducts.contains(&rule.conduct) {
                    trophies.insert(rule.trophy.clone());
                }
            }
        }

        trophies
    }
}

fn distinct<'g>(games: &[&'g Game], key: impl Fn(&'g Game) -> Option<&'g str>) -> usize {
    games.iter().filter_map(|g| key(*g)).collect::<BTreeSet<_>>().len()
}

/// Roles played by `race` among `games`.
fn roles_of(games: &[&Game], race: &str) -> BTreeSet<String> {
    games
        .iter()
        .filter(|g| g.race.as_deref() == Some(race))
        .map(|g| g.role.clone())
        .collect()
}

/// "Race-Align" pairs (birth alignment) played as `role` among `games`.
fn race_aligns_of(games: &[&Game], role: &str) -> BTreeSet<String> {
    games
        .iter()
        .filter(|g| g.role == role)
        .map(|g| {
            format!(
                "{}-{}",
                g.race.as_deref().unwrap_or_default(),
                g.align0.as_deref().unwrap_or_default()
            )
        })
        .collect()
}
