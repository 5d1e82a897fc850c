use thiserror::Error;

/// A record could not be decoded. Always recoverable by dropping the record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("invalid operation string {input:?} at offset {offset}: {reason}")]
    InvalidOperationString {
        input: String,
        offset: usize,
        reason: String,
    },

    #[error("{axis} length mismatch: operations consume {consumed} bases, sequence has {actual}")]
    LengthMismatch {
        axis: SequenceAxis,
        consumed: usize,
        actual: usize,
    },

    #[error("empty alignment: start {start} is not before stop {stop}")]
    EmptyAlignment { start: i64, stop: i64 },

    #[error("unknown base {base:?} at read offset {offset}")]
    UnknownBase { base: char, offset: usize },
}

/// Which of the two aligned sequences a check refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum SequenceAxis {
    Read,
    Reference,
}

/// One failed sanity check on a decoded record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("read name is empty")]
    MissingReadName,

    #[error("start {start} is not before stop {stop}")]
    StartNotBeforeStop { start: i64, stop: i64 },

    #[error("{0} sequence is empty")]
    EmptySequence(SequenceAxis),

    #[error("{axis} length mismatch: expected {expected}, found {actual}")]
    LengthMismatch {
        axis: SequenceAxis,
        expected: usize,
        actual: usize,
    },

    #[error("mismatch count {count} outside [0, {alignment_length}]")]
    MismatchCountOutOfRange { count: i64, alignment_length: usize },

    #[error("malformed operations: {0}")]
    MalformedOperations(FormatError),
}

/// Misuse of a stateful component. Unreachable in correct code.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("coverage accumulator is already finalized")]
    AlreadyFinalized,

    #[error("coverage accumulator is not finalized yet")]
    NotFinalized,

    #[error("cannot merge coverage over [{other_from}, {other_to}] into [{from}, {to}]")]
    WindowMismatch {
        from: u64,
        to: u64,
        other_from: u64,
        other_to: u64,
    },
}

/// Failures of the reference sequence collaborator.
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("unknown reference sequence {0}")]
    UnknownSequence(String),

    #[error("{chromosome}:{start}-{stop} is outside the reference sequence (length {length})")]
    OutOfRange {
        chromosome: String,
        start: u64,
        stop: u64,
        length: u64,
    },

    #[error("reference I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the alignment record collaborator.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("alignment I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported alignment file: {0}")]
    UnsupportedFormat(String),
}

/// Errors that abort a whole parse run. Per-record problems never end up here.
#[derive(Debug, Error)]
pub enum ReaddiffError {
    #[error(transparent)]
    Reference(#[from] ReferenceError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("settings error: {0}")]
    Settings(String),

    #[error("worker failed: {0}")]
    Worker(String),
}

impl From<serde_json::Error> for ReaddiffError {
    fn from(e: serde_json::Error) -> Self {
        ReaddiffError::Settings(e.to_string())
    }
}

impl From<tokio::task::JoinError> for ReaddiffError {
    fn from(e: tokio::task::JoinError) -> Self {
        ReaddiffError::Worker(e.to_string())
    }
}
