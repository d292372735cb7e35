//! Incremental xlog ingestion, one source at a time.
//!
//! RULE: A source's cursor only ever covers complete, processed lines.
//! A trailing line without its newline is left for the next run.
//!
//! Execution (per source, one transaction):
//!   1. Seek to the stored byte cursor
//!   2. Parse, decode and validate each complete line
//!   3. Persist games; record or stop at failing lines per FailurePolicy
//!   4. Advance the cursor past the last line handled

use crate::{
    config::TournamentConfig,
    error::{MalformedReason, RecordError, ScoreError, ScoreResult},
    game::{BuiltGame, GameFactory, SourceContext},
    record::RecordParser,
    spec_registry::Ruleset,
    store::{LogSource, RejectedRecord, ScoreStore},
};
use chrono::{DateTime, Utc};
use std::{
    collections::BTreeSet,
    fs::File,
    io::{Read, Seek, SeekFrom},
    sync::atomic::{AtomicBool, Ordering},
};

/// What to do with a line that fails to parse or validate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log it, keep it in `rejected_record`, move past it.
    #[default]
    Skip,
    /// Stop at it. Earlier lines stay committed; the cursor stays on it.
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortedAt {
    pub offset: u64,
    pub error:  RecordError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub source:          String,
    pub lines_read:      u64,
    pub games_created:   u64,
    pub rejected:        u64,
    /// Games whose (variant, version) has no registered specs.
    pub unknown_ruleset: u64,
    pub old_pos:         u64,
    pub new_pos:         u64,
    pub aborted:         Option<AbortedAt>,
}

impl IngestReport {
    /// The abort, if any, as a crate error naming source and offset.
    pub fn abort_error(&self) -> Option<ScoreError> {
        self.aborted.as_ref().map(|a| ScoreError::Record {
            source_name: self.source.clone(),
            offset:      a.offset,
            error:       a.error.clone(),
        })
    }
}

pub struct Ingestor<'a> {
    config: &'a TournamentConfig,
    parser: RecordParser,
    policy: FailurePolicy,
    now:    Option<DateTime<Utc>>,
}

impl<'a> Ingestor<'a> {
    pub fn new(config: &'a TournamentConfig) -> Self {
        Self {
            config,
            parser: RecordParser::default(),
            policy: FailurePolicy::default(),
            now:    None,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Pin the evaluation time future timestamps are judged against.
    /// Without it every source uses the wall clock at its start.
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    /// Ingest every registered source in id order. `stop` is checked before
    /// each source begins; sources already done stay committed. An aborted
    /// source ends the run.
    pub fn ingest_all(&self, store: &ScoreStore, stop: &AtomicBool) -> ScoreResult<Vec<IngestReport>> {
        let mut reports = Vec::new();
        for source in store.sources()? {
            if stop.load(Ordering::Relaxed) {
                log::info!("stop requested before source {}", source.name);
                break;
            }
            let report = self.ingest_source(store, &source)?;
            let aborted = report.aborted.is_some();
            reports.push(report);
            if aborted {
                break;
            }
        }
        Ok(reports)
    }

    pub fn ingest_source(&self, store: &ScoreStore, source: &LogSource) -> ScoreResult<IngestReport> {
        let source_id = source
            .id
            .ok_or_else(|| ScoreError::SourceNotFound { name: source.name.clone() })?;
        let now = self.now.unwrap_or_else(Utc::now);

        let mut file = File::open(&source.local_file)?;
        file.seek(SeekFrom::Start(source.file_pos))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        let complete = buf.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);

        let factory = GameFactory::new(&self.config.registry, now);
        let ctx = SourceContext {
            source_id: Some(source_id),
            server:    &source.server,
            variant:   &source.variant,
        };

        let report = store.in_transaction(|store| {
            let mut report = IngestReport {
                source: source.name.clone(),
                old_pos: source.file_pos,
                ..Default::default()
            };
            let mut unknown_warned: BTreeSet<Ruleset> = BTreeSet::new();
            let mut offset = source.file_pos;

            for raw in buf[..complete].split_inclusive(|&b| b == b'\n') {
                let bytes = &raw[..raw.len() - 1];
                report.lines_read += 1;

                let outcome = std::str::from_utf8(bytes)
                    .map_err(|_| RecordError::Malformed(MalformedReason::InvalidEncoding))
                    .and_then(|line| self.parser.parse(line))
                    .and_then(|record| factory.build(record, &ctx));
                match outcome {
                    Ok(BuiltGame { game, ruleset_known }) => {
                        if !ruleset_known {
                            report.unknown_ruleset += 1;
                            let ruleset = game.ruleset();
                            if !unknown_warned.contains(&ruleset) {
                                log::warn!(
                                    "{}: no specs for {ruleset}; conducts and achievements left empty",
                                    source.name
                                );
                                unknown_warned.insert(ruleset);
                            }
                        }
                        let id = store.insert_game(&game)?;
                        log::debug!("{}@{offset}: game #{id} for '{}'", source.name, game.player_name);
                        report.games_created += 1;
                    }
                    Err(error) => match self.policy {
                        FailurePolicy::Skip => {
                            log::warn!("{}@{offset}: skipped line: {error}", source.name);
                            store.insert_rejected_record(
                                &RejectedRecord {
                                    source_id,
                                    byte_offset: offset,
                                    line:        String::from_utf8_lossy(bytes).into_owned(),
                                    reason:      error.to_string(),
                                },
                                now,
                            )?;
                            report.rejected += 1;
                        }
                        FailurePolicy::Abort => {
                            log::warn!("{}@{offset}: aborting at line: {error}", source.name);
                            report.rejected += 1;
                            report.aborted = Some(AbortedAt { offset, error });
                            break;
                        }
                    },
                }
                offset += raw.len() as u64;
            }

            store.update_source_cursor(source_id, offset, now)?;
            report.new_pos = offset;
            Ok(report)
        })?;

        log::info!(
            "{}: {} lines, {} games, {} rejected, cursor {} -> {}",
            report.source, report.lines_read, report.games_created, report.rejected,
            report.old_pos, report.new_pos
        );
        Ok(report)
    }
}
