pub mod aggregate;
pub mod bitfield;
pub mod clan_aggregator;
pub mod config;
pub mod error;
pub mod game;
pub mod ingest;
pub mod leaderboard;
pub mod player_aggregator;
pub mod record;
pub mod repository;
pub mod spec_registry;
pub mod store;
pub mod streak;
pub mod trophy;
pub mod types;
pub mod uniqdeaths;
