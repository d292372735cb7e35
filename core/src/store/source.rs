use super::ScoreStore;
use crate::{
    error::{ScoreError, ScoreResult},
    types::SourceId,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// An xlog file the scoreboard reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSource {
    pub id:          Option<SourceId>,
    pub name:        String,
    pub server:      String,
    pub variant:     String,
    pub local_file:  String,
    /// Remote location of the log. Fetching it is someone else's job.
    pub url:         Option<String>,
    pub dumplog_fmt: Option<String>,
    /// Byte offset just past the last processed line.
    pub file_pos:    u64,
    pub last_check:  Option<DateTime<Utc>>,
}

impl LogSource {
    pub fn new(name: &str, server: &str, variant: &str, local_file: &str) -> Self {
        Self {
            id:          None,
            name:        name.to_string(),
            server:      server.to_string(),
            variant:     variant.to_string(),
            local_file:  local_file.to_string(),
            url:         None,
            dumplog_fmt: None,
            file_pos:    0,
            last_check:  None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRecord {
    pub source_id:   SourceId,
    pub byte_offset: u64,
    pub line:        String,
    pub reason:      String,
}

const SOURCE_COLUMNS: &str =
    "id, name, server, variant, local_file, url, dumplog_fmt, file_pos, last_check";

fn source_from_row(row: &Row<'_>) -> rusqlite::Result<LogSource> {
    let last_check: Option<String> = row.get(8)?;
    let last_check = last_check
        .map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
                })
        })
        .transpose()?;
    Ok(LogSource {
        id:          Some(row.get(0)?),
        name:        row.get(1)?,
        server:      row.get(2)?,
        variant:     row.get(3)?,
        local_file:  row.get(4)?,
        url:         row.get(5)?,
        dumplog_fmt: row.get(6)?,
        file_pos:    row.get::<_, i64>(7)? as u64,
        last_check,
    })
}

impl ScoreStore {
    // ── Sources ────────────────────────────────────────────────

    /// Register a source. The cursor always starts at 0.
    pub fn add_source(&self, source: &LogSource) -> ScoreResult<SourceId> {
        self.conn.execute(
            "INSERT INTO source (name, server, variant, local_file, url, dumplog_fmt)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                source.name,
                source.server,
                source.variant,
                source.local_file,
                source.url,
                source.dumplog_fmt,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn sources(&self) -> ScoreResult<Vec<LogSource>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {SOURCE_COLUMNS} FROM source ORDER BY id ASC"))?;
        let sources = stmt
            .query_map([], source_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    pub fn source_by_name(&self, name: &str) -> ScoreResult<LogSource> {
        self.conn
            .query_row(
                &format!("SELECT {SOURCE_COLUMNS} FROM source WHERE name = ?1"),
                params![name],
                source_from_row,
            )
            .optional()?
            .ok_or_else(|| ScoreError::SourceNotFound { name: name.to_string() })
    }

    /// Move a source's cursor. Callers only ever move it forward.
    pub fn update_source_cursor(
        &self,
        source_id:  SourceId,
        file_pos:   u64,
        checked_at: DateTime<Utc>,
    ) -> ScoreResult<()> {
        self.conn.execute(
            "UPDATE source SET file_pos = ?1, last_check = ?2 WHERE id = ?3",
            params![file_pos as i64, checked_at.to_rfc3339(), source_id],
        )?;
        Ok(())
    }

    // ── Rejected records ───────────────────────────────────────

    pub fn insert_rejected_record(
        &self,
        record:      &RejectedRecord,
        rejected_at: DateTime<Utc>,
    ) -> ScoreResult<()> {
        self.conn.execute(
            "INSERT INTO rejected_record (source_id, byte_offset, line, reason, rejected_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.source_id,
                record.byte_offset as i64,
                record.line,
                record.reason,
                rejected_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn rejected_records(&self, source_id: SourceId) -> ScoreResult<Vec<RejectedRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT source_id, byte_offset, line, reason
             FROM rejected_record WHERE source_id = ?1
             ORDER BY byte_offset ASC, id ASC",
        )?;
        let records = stmt
            .query_map(params![source_id], |row| {
                Ok(RejectedRecord {
                    source_id:   row.get(0)?,
                    byte_offset: row.get::<_, i64>(1)? as u64,
                    line:        row.get(2)?,
                    reason:      row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
