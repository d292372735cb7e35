//! Aggregation batch over a real (in-memory) store: player stats, clan
//! rollups and the trophies both earn.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tnnt_core::{
    aggregate::Aggregator,
    config::TournamentConfig,
    error::ScoreError,
    game::Game,
    leaderboard::LeaderboardStats,
    repository::LeaderboardRepository,
    store::ScoreStore,
    trophy::{
        ALL_ACHIEVEMENTS, ALL_ALIGNMENTS, ALL_CONDUCTS, ALL_RACES, ALL_ROLES, BOTH_GENDERS,
        NETHACK_DOMINATOR, NETHACK_MASTER, NEVER_SCUM,
    },
    types::{GameId, Subject},
};

// ── Test helpers ────────────────────────────────────────────────────────────

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_600_000_000 + secs, 0).unwrap()
}

fn make_store() -> ScoreStore {
    let store = ScoreStore::in_memory().unwrap();
    store.migrate().unwrap();
    store
}

fn game(name: &str, start: i64, end: i64, won: bool) -> Game {
    Game {
        server:      "hdf-us".into(),
        variant:     "tnnt".into(),
        version:     "3.6.6".into(),
        player_name: name.into(),
        role:        "Val".into(),
        race:        Some("Hum".into()),
        gender:      Some("Fem".into()),
        gender0:     Some("Fem".into()),
        align:       Some("Neu".into()),
        align0:      Some("Neu".into()),
        points:      1000,
        turns:       5000,
        starttime:   at(start),
        endtime:     at(end),
        death:       if won { "ascended" } else { "killed by a jackal" }.into(),
        won,
        ..Default::default()
    }
}

fn dwarf_win(name: &str, role: &str, start: i64) -> Game {
    Game {
        role:   role.into(),
        race:   Some("Dwa".into()),
        align:  Some("Law".into()),
        align0: Some("Law".into()),
        ..game(name, start, start + 100, true)
    }
}

fn win(name: &str, start: i64) -> Game {
    game(name, start, start + 100, true)
}

fn tournament_conducts(config: &TournamentConfig) -> BTreeSet<String> {
    let specs = config.registry.for_ruleset(&config.ruleset).unwrap();
    specs.conducts.iter().map(|c| c.short_name.clone()).collect()
}

fn tournament_achievements(config: &TournamentConfig) -> BTreeSet<String> {
    let specs = config.registry.for_ruleset(&config.ruleset).unwrap();
    specs.achievements.iter().map(|a| a.title.clone()).collect()
}

fn aggregate(store: &ScoreStore, config: &TournamentConfig) {
    Aggregator::new(config).unwrap().run(store).unwrap();
}

fn player_stats(store: &ScoreStore, name: &str) -> LeaderboardStats {
    let id = store.player_id(name).unwrap().expect("player exists");
    store.stats_for(Subject::Player(id)).unwrap()
}

fn player_has(store: &ScoreStore, name: &str, trophy: &str) -> bool {
    let id = store.player_id(name).unwrap().expect("player exists");
    store.trophies_for(Subject::Player(id)).unwrap().contains(trophy)
}

fn clan_has(store: &ScoreStore, clan: &str, trophy: &str) -> bool {
    let id = store.clan_id(clan).unwrap().expect("clan exists");
    store.trophies_for(Subject::Clan(id)).unwrap().contains(trophy)
}

// ── Player stats ─────────────────────────────────────────────────────────────

#[test]
fn player_stats_cover_counts_streaks_and_best_games() {
    let config = TournamentConfig::builtin().unwrap();
    let store = make_store();

    let first = store.insert_game(&game("alice", 0, 1000, true)).unwrap();
    let second = store
        .insert_game(&Game { turns: 3000, points: 500, ..game("alice", 2000, 3000, true) })
        .unwrap();
    store
        .insert_game(&Game { turns: 50, death: "quit".into(), ..game("alice", 4000, 4010, false) })
        .unwrap();
    store
        .insert_game(&Game { turns: 1500, ..game("alice", 5000, 6000, false) })
        .unwrap();

    aggregate(&store, &config);
    let stats = player_stats(&store, "alice");

    assert_eq!(stats.total_games, 4);
    assert_eq!(stats.wins, 2);
    assert_eq!(stats.games_over_1000_turns, 3);
    assert_eq!(stats.games_scummed, 1);
    assert_eq!(stats.longest_streak, 2);
    assert_eq!(stats.unique_deaths, 1, "ascended and quit are not unique deaths");
    assert_eq!(stats.unique_ascension_combos, 1);

    assert_eq!(stats.best.lowest_turncount_asc, Some(second));
    assert_eq!(stats.best.max_score_asc, Some(first));
    assert_eq!(stats.best.min_score_asc, Some(second));
    assert_eq!(stats.best.first_asc, Some(first));
    // Equal wallclock: the earlier end time wins the tie.
    assert_eq!(stats.best.fastest_wallclock_asc, Some(first));
}

#[test]
fn player_without_games_has_empty_stats() {
    let config = TournamentConfig::builtin().unwrap();
    let store = make_store();
    store.create_clan("lurkers").unwrap();
    store.set_player_clan("ghost", Some("lurkers")).unwrap();

    aggregate(&store, &config);

    assert_eq!(player_stats(&store, "ghost"), LeaderboardStats::default());
    assert!(!player_has(&store, "ghost", NEVER_SCUM), "no games, no default trophy");
}

#[test]
fn aggregation_is_idempotent() {
    let config = TournamentConfig::builtin().unwrap();
    let store = make_store();
    for (i, won) in [true, true, false, true].into_iter().enumerate() {
        let start = i as i64 * 1000;
        store.insert_game(&game("bob", start, start + 500, won)).unwrap();
    }

    aggregate(&store, &config);
    let first = player_stats(&store, "bob");
    let id = store.player_id("bob").unwrap().unwrap();
    let first_trophies = store.trophies_for(Subject::Player(id)).unwrap();

    aggregate(&store, &config);
    assert_eq!(player_stats(&store, "bob"), first);
    assert_eq!(store.trophies_for(Subject::Player(id)).unwrap(), first_trophies);
    assert_eq!(
        serde_json::to_string(&player_stats(&store, "bob")).unwrap(),
        serde_json::to_string(&first).unwrap()
    );
}

#[test]
fn unique_deaths_collapse_after_normalization() {
    let config = TournamentConfig::builtin().unwrap();
    let store = make_store();
    for (i, death) in [
        "killed by a jackal, while sleeping",
        "killed by an jackal",
        "killed by a jackal",
        "quit",
        "killed by a newt",
    ]
    .into_iter()
    .enumerate()
    {
        let start = i as i64 * 1000;
        store
            .insert_game(&Game { death: death.into(), ..game("carol", start, start + 500, false) })
            .unwrap();
    }

    aggregate(&store, &config);
    assert_eq!(player_stats(&store, "carol").unique_deaths, 2);
}

#[test]
fn max_conducts_slot_only_ranks_ascensions() {
    let config = TournamentConfig::builtin().unwrap();
    let store = make_store();
    let conducts =
        |names: &[&str]| -> BTreeSet<String> { names.iter().map(|n| n.to_string()).collect() };

    store
        .insert_game(&Game { conducts: conducts(&["food", "vegn"]), ..win("kara", 0) })
        .unwrap();
    let three = store
        .insert_game(&Game { conducts: conducts(&["food", "vegn", "athe"]), ..win("kara", 1000) })
        .unwrap();
    store
        .insert_game(&Game { conducts: conducts(&["food", "vegn", "athe"]), ..win("kara", 2000) })
        .unwrap();
    store
        .insert_game(&Game {
            conducts: conducts(&["food", "vegn", "athe", "paci", "illi"]),
            ..game("kara", 3000, 3100, false)
        })
        .unwrap();

    aggregate(&store, &config);
    let best = player_stats(&store, "kara").best;
    assert_eq!(best.max_conducts_asc, Some(three), "loss ignored; tie goes to the earlier end");
}

#[test]
fn max_achievements_slot_counts_losses() {
    let config = TournamentConfig::builtin().unwrap();
    let store = make_store();
    let achievements =
        |names: &[&str]| -> BTreeSet<String> { names.iter().map(|n| n.to_string()).collect() };

    store
        .insert_game(&Game { achievements: achievements(&["Ascended"]), ..win("lena", 0) })
        .unwrap();
    let loss = store
        .insert_game(&Game {
            achievements: achievements(&["Entered Sokoban", "Sokoban Prize", "Killed Medusa"]),
            ..game("lena", 1000, 1100, false)
        })
        .unwrap();

    aggregate(&store, &config);
    let stats = player_stats(&store, "lena");
    assert_eq!(stats.best.max_achieves_game, Some(loss));
    assert_eq!(stats.unique_achievements, 4);
}

// ── Player trophies ──────────────────────────────────────────────────────────

#[test]
fn never_scum_is_granted_then_revoked() {
    let config = TournamentConfig::builtin().unwrap();
    let store = make_store();
    store.insert_game(&game("dave", 0, 500, false)).unwrap();

    aggregate(&store, &config);
    assert!(player_has(&store, "dave", NEVER_SCUM));

    store
        .insert_game(&Game { turns: 20, death: "escaped".into(), ..game("dave", 1000, 1010, false) })
        .unwrap();
    aggregate(&store, &config);
    assert!(!player_has(&store, "dave", NEVER_SCUM), "scummed game must revoke the trophy");
}

#[test]
fn long_quit_is_not_a_scum() {
    let config = TournamentConfig::builtin().unwrap();
    let store = make_store();
    store
        .insert_game(&Game { turns: 101, death: "quit".into(), ..game("erin", 0, 500, false) })
        .unwrap();

    aggregate(&store, &config);
    assert_eq!(player_stats(&store, "erin").games_scummed, 0);
    assert!(player_has(&store, "erin", NEVER_SCUM));
}

#[test]
fn great_race_needs_exactly_the_required_roles() {
    let config = TournamentConfig::builtin().unwrap();
    let store = make_store();
    store.insert_game(&dwarf_win("frank", "Arc", 0)).unwrap();
    store.insert_game(&dwarf_win("frank", "Cav", 1000)).unwrap();

    aggregate(&store, &config);
    assert!(!player_has(&store, "frank", "Great Dwarf"));

    store.insert_game(&dwarf_win("frank", "Val", 2000)).unwrap();
    aggregate(&store, &config);
    assert!(player_has(&store, "frank", "Great Dwarf"));
    assert!(!player_has(&store, "frank", "Lesser Dwarf"), "no milestone games yet");
}

#[test]
fn lesser_race_counts_milestone_games_without_a_win() {
    let config = TournamentConfig::builtin().unwrap();
    let store = make_store();
    let milestones: std::collections::BTreeSet<String> =
        config.scoring.milestone_achievements.iter().cloned().collect();
    for (i, role) in ["Arc", "Cav", "Val"].into_iter().enumerate() {
        let start = i as i64 * 1000;
        let g = Game {
            won: false,
            death: "killed by a soldier ant".into(),
            achievements: milestones.clone(),
            ..dwarf_win("gina", role, start)
        };
        store.insert_game(&g).unwrap();
    }

    aggregate(&store, &config);
    assert!(player_has(&store, "gina", "Lesser Dwarf"));
    assert!(!player_has(&store, "gina", "Great Dwarf"));
}

#[test]
fn never_kill_trophy_follows_won_game_conducts() {
    let config = TournamentConfig::builtin().unwrap();
    let store = make_store();
    let mut won = game("hank", 0, 500, true);
    won.conducts.insert("neme".into());
    let mut lost = game("hank", 1000, 1500, false);
    lost.conducts.insert("vlad".into());
    store.insert_game(&won).unwrap();
    store.insert_game(&lost).unwrap();

    aggregate(&store, &config);
    assert!(player_has(&store, "hank", "Never Kill the Quest Nemesis"));
    assert!(!player_has(&store, "hank", "Never Kill Vlad"), "conduct kept only in a loss");
}

#[test]
fn great_role_keys_on_birth_alignment() {
    let config = TournamentConfig::builtin().unwrap();
    let store = make_store();
    // Valkyrie needs Dwa-Law, Hum-Law and Hum-Neu.
    store.insert_game(&dwarf_win("mia", "Val", 0)).unwrap();
    store
        .insert_game(&Game { align: Some("Law".into()), align0: Some("Law".into()), ..win("mia", 1000) })
        .unwrap();

    aggregate(&store, &config);
    assert!(!player_has(&store, "mia", "Great Valkyrie"));

    // Converted to Chaotic during play, started Neutral.
    store
        .insert_game(&Game { align: Some("Cha".into()), align0: Some("Neu".into()), ..win("mia", 2000) })
        .unwrap();
    aggregate(&store, &config);
    assert!(player_has(&store, "mia", "Great Valkyrie"));
    assert!(!player_has(&store, "mia", "Lesser Valkyrie"), "no milestone games yet");
}

#[test]
fn lesser_role_counts_milestone_games() {
    let config = TournamentConfig::builtin().unwrap();
    let store = make_store();
    let milestones: BTreeSet<String> =
        config.scoring.milestone_achievements.iter().cloned().collect();
    let lost = |g: Game| Game {
        won:          false,
        death:        "killed by a soldier ant".into(),
        achievements: milestones.clone(),
        ..g
    };

    store.insert_game(&lost(dwarf_win("nell", "Val", 0))).unwrap();
    store
        .insert_game(&lost(Game { align0: Some("Law".into()), ..win("nell", 1000) }))
        .unwrap();
    aggregate(&store, &config);
    assert!(!player_has(&store, "nell", "Lesser Valkyrie"));

    store.insert_game(&lost(win("nell", 2000))).unwrap();
    aggregate(&store, &config);
    assert!(player_has(&store, "nell", "Lesser Valkyrie"));
    assert!(!player_has(&store, "nell", "Great Valkyrie"));
}

#[test]
fn both_genders_and_all_alignments_need_every_value() {
    let config = TournamentConfig::builtin().unwrap();
    let store = make_store();
    store.insert_game(&win("otto", 0)).unwrap();
    store
        .insert_game(&Game { align0: Some("Law".into()), ..win("otto", 1000) })
        .unwrap();
    // A loss as the missing gender and alignment does not count.
    store
        .insert_game(&Game {
            gender0: Some("Mal".into()),
            align0:  Some("Cha".into()),
            ..game("otto", 2000, 2100, false)
        })
        .unwrap();

    aggregate(&store, &config);
    assert!(!player_has(&store, "otto", BOTH_GENDERS));
    assert!(!player_has(&store, "otto", ALL_ALIGNMENTS));

    store
        .insert_game(&Game {
            gender0: Some("Mal".into()),
            align0:  Some("Cha".into()),
            ..win("otto", 3000)
        })
        .unwrap();
    aggregate(&store, &config);
    assert!(player_has(&store, "otto", BOTH_GENDERS));
    assert!(player_has(&store, "otto", ALL_ALIGNMENTS));
}

#[test]
fn all_races_and_all_roles_need_every_value() {
    let config = TournamentConfig::builtin().unwrap();
    let store = make_store();
    let races = ["Hum", "Dwa", "Elf", "Gno", "Orc"];
    let roles = [
        "Arc", "Bar", "Cav", "Hea", "Kni", "Mon", "Pri", "Ran", "Rog", "Sam", "Tou", "Val", "Wiz",
    ];
    assert_eq!(races.len(), config.trophies.totals.races);
    assert_eq!(roles.len(), config.trophies.totals.roles);

    for (i, role) in roles[..roles.len() - 1].iter().enumerate() {
        let race = races[i % (races.len() - 1)];
        store
            .insert_game(&Game {
                role: role.to_string(),
                race: Some(race.into()),
                ..win("pia", i as i64 * 1000)
            })
            .unwrap();
    }
    aggregate(&store, &config);
    assert!(!player_has(&store, "pia", ALL_ROLES), "one role short");
    assert!(!player_has(&store, "pia", ALL_RACES), "one race short");

    store
        .insert_game(&Game { role: "Wiz".into(), race: Some("Orc".into()), ..win("pia", 100_000) })
        .unwrap();
    aggregate(&store, &config);
    assert!(player_has(&store, "pia", ALL_ROLES));
    assert!(player_has(&store, "pia", ALL_RACES));
}

#[test]
fn all_achievements_counts_every_game_in_the_tournament_ruleset() {
    let config = TournamentConfig::builtin().unwrap();
    let store = make_store();
    let mut achievements = tournament_achievements(&config);
    let last = achievements.pop_last().unwrap();

    store
        .insert_game(&Game { achievements: achievements.clone(), ..game("quin", 0, 100, false) })
        .unwrap();
    // Another ruleset's game with the missing achievement does not complete the set.
    store
        .insert_game(&Game {
            variant:      "nethack".into(),
            achievements: BTreeSet::from([last.clone()]),
            ..game("quin", 1000, 1100, false)
        })
        .unwrap();
    aggregate(&store, &config);
    assert!(!player_has(&store, "quin", ALL_ACHIEVEMENTS));

    store
        .insert_game(&Game { achievements: BTreeSet::from([last]), ..game("quin", 2000, 2100, false) })
        .unwrap();
    aggregate(&store, &config);
    assert!(player_has(&store, "quin", ALL_ACHIEVEMENTS), "losses count toward achievements");
}

#[test]
fn all_conducts_counts_only_winning_games() {
    let config = TournamentConfig::builtin().unwrap();
    let store = make_store();
    let mut conducts = tournament_conducts(&config);

    store
        .insert_game(&Game { conducts: conducts.clone(), ..game("rhea", 0, 100, false) })
        .unwrap();
    let last = conducts.pop_last().unwrap();
    store.insert_game(&Game { conducts, ..win("rhea", 1000) }).unwrap();
    aggregate(&store, &config);
    assert!(!player_has(&store, "rhea", ALL_CONDUCTS));

    store
        .insert_game(&Game { conducts: BTreeSet::from([last]), ..win("rhea", 2000) })
        .unwrap();
    aggregate(&store, &config);
    assert!(player_has(&store, "rhea", ALL_CONDUCTS), "union over wins");
}

#[test]
fn dominator_needs_master_and_all_conducts() {
    let mut config = TournamentConfig::builtin().unwrap();
    config.trophies.totals.combos = 2;
    let store = make_store();
    let all = tournament_conducts(&config);

    // Master without conducts.
    store.insert_game(&win("sam", 0)).unwrap();
    store
        .insert_game(&Game { align0: Some("Law".into()), ..win("sam", 1000) })
        .unwrap();
    // All conducts in a single combination.
    store.insert_game(&Game { conducts: all.clone(), ..win("tess", 0) }).unwrap();

    aggregate(&store, &config);
    assert!(player_has(&store, "sam", NETHACK_MASTER));
    assert!(!player_has(&store, "sam", NETHACK_DOMINATOR));
    assert!(player_has(&store, "tess", ALL_CONDUCTS));
    assert!(!player_has(&store, "tess", NETHACK_MASTER));
    assert!(!player_has(&store, "tess", NETHACK_DOMINATOR));

    store
        .insert_game(&Game { align0: Some("Law".into()), ..win("tess", 1000) })
        .unwrap();
    aggregate(&store, &config);
    assert!(player_has(&store, "tess", NETHACK_MASTER));
    assert!(player_has(&store, "tess", NETHACK_DOMINATOR));
}

// ── Clans ───────────────────────────────────────────────────────────────────

fn clan_setup(store: &ScoreStore) -> (GameId, GameId) {
    store.create_clan("stonefolk").unwrap();
    let arc = store
        .insert_game(&Game { turns: 20000, ..dwarf_win("ivy", "Arc", 0) })
        .unwrap();
    store.insert_game(&dwarf_win("ivy", "Cav", 1000)).unwrap();
    let val = store
        .insert_game(&Game { turns: 9000, ..dwarf_win("jon", "Val", 500) })
        .unwrap();
    store.insert_game(&game("jon", 3000, 3500, false)).unwrap();
    store.set_player_clan("ivy", Some("stonefolk")).unwrap();
    store.set_player_clan("jon", Some("stonefolk")).unwrap();
    (arc, val)
}

#[test]
fn clan_stats_roll_up_member_stats() {
    let config = TournamentConfig::builtin().unwrap();
    let store = make_store();
    let (arc, _) = clan_setup(&store);

    aggregate(&store, &config);
    let clan = store.clan_id("stonefolk").unwrap().unwrap();
    let stats = store.stats_for(Subject::Clan(clan)).unwrap();

    assert_eq!(stats.total_games, 4);
    assert_eq!(stats.wins, 3);
    assert_eq!(stats.unique_ascension_combos, 3);
    assert_eq!(stats.unique_deaths, 1);
    assert_eq!(stats.longest_streak, 2, "max of members, not a cross-member streak");
    assert_eq!(stats.best.first_asc, Some(arc));
    assert_eq!(stats.best.lowest_turncount_asc, player_stats(&store, "ivy").best.lowest_turncount_asc);
}

#[test]
fn clan_trophy_is_lost_when_a_member_leaves() {
    let config = TournamentConfig::builtin().unwrap();
    let store = make_store();
    let (_, val) = clan_setup(&store);

    aggregate(&store, &config);
    assert!(clan_has(&store, "stonefolk", "Great Dwarf"));
    assert!(!player_has(&store, "ivy", "Great Dwarf"));
    assert!(!player_has(&store, "jon", "Great Dwarf"));

    store.set_player_clan("jon", None).unwrap();
    aggregate(&store, &config);

    assert!(!clan_has(&store, "stonefolk", "Great Dwarf"));
    let clan = store.clan_id("stonefolk").unwrap().unwrap();
    let stats = store.stats_for(Subject::Clan(clan)).unwrap();
    assert_eq!(stats.total_games, 2);
    assert_ne!(stats.best.lowest_turncount_asc, Some(val));
}

#[test]
fn summary_counts_players_and_clans() {
    let config = TournamentConfig::builtin().unwrap();
    let store = make_store();
    clan_setup(&store);
    store.insert_game(&game("loner", 0, 100, false)).unwrap();

    let summary = Aggregator::new(&config).unwrap().run(&store).unwrap();
    assert_eq!(summary.players, 3);
    assert_eq!(summary.clans, 1);
    assert!(summary.clan_trophies >= 1);

    let top = store.top_players(2).unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].0, "ivy", "most wins first");
}

// ── Repository ───────────────────────────────────────────────────────────────

#[test]
fn unknown_subjects_are_typed_errors() {
    let store = make_store();

    let err = store.stats_for(Subject::Player(404)).unwrap_err();
    assert!(matches!(err, ScoreError::PlayerNotFound { id: 404 }), "got {err}");

    let err = store
        .replace_stats(Subject::Clan(404), &LeaderboardStats::default())
        .unwrap_err();
    assert!(matches!(err, ScoreError::ClanIdNotFound { id: 404 }), "got {err}");
}
