use thiserror::Error;

/// Why a line could not be split or coerced into a typed record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    #[error("line contains a NUL, CR or LF character")]
    ControlCharacter,

    #[error("line is empty")]
    Empty,

    #[error("line is not valid UTF-8")]
    InvalidEncoding,

    #[error("token '{token}' has no key/value separator")]
    MissingSeparator { token: String },

    #[error("field '{field}' has invalid value '{value}'")]
    InvalidValue { field: String, value: String },
}

/// Temporal consistency checks, in the order they are evaluated.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalViolation {
    #[error("game cannot start in the future")]
    FutureStart,

    #[error("game cannot end in the future")]
    FutureEnd,

    #[error("game cannot end before it has begun")]
    EndBeforeStart,

    #[error("realtime cannot exceed wallclock time")]
    RealtimeExceedsWallclock,
}

/// A record-local failure. One bad line never aborts a whole source by itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("malformed record: {0}")]
    Malformed(MalformedReason),

    #[error("missing required field '{field}'")]
    MissingRequiredField { field: &'static str },

    #[error("temporal inconsistency: {0}")]
    TemporalInconsistency(TemporalViolation),
}

#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Rejected record in source '{source_name}' at byte {offset}: {error}")]
    Record {
        source_name: String,
        offset:      u64,
        error:       RecordError,
    },

    #[error("Duplicate spec registration: {key}")]
    DuplicateSpec { key: String },

    #[error("Source '{name}' not found")]
    SourceNotFound { name: String },

    #[error("Clan '{name}' not found")]
    ClanNotFound { name: String },

    #[error("Player #{id} not found")]
    PlayerNotFound { id: i64 },

    #[error("Clan #{id} not found")]
    ClanIdNotFound { id: i64 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ScoreResult<T> = Result<T, ScoreError>;
