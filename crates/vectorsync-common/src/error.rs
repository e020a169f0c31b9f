use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("record {source_id} is corrupt: {reason}")]
    RecordCorrupt { source_id: String, reason: String },

    #[error("collection unavailable: {0}")]
    CollectionUnavailable(String),

    #[error("vector dimension mismatch for {source_id}: expected {expected}, got {actual}")]
    DimensionMismatch {
        source_id: String,
        expected: usize,
        actual: usize,
    },

    #[error("upsert failed: {}", attempt_summary(.error, .attempts))]
    Upsert { error: IndexError, attempts: u32 },

    #[error("delete failed: {}", attempt_summary(.error, .attempts))]
    Delete { error: IndexError, attempts: u32 },

    #[error("index error: {0}")]
    Index(IndexError),

    #[error("operation cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn attempt_summary(error: &IndexError, attempts: &u32) -> String {
    error.summary(*attempts)
}

/// Whether a failed index call is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transient,
    Permanent,
}

/// A failed call against the index service.
///
/// Connection errors, timeouts, 5xx and 429 responses are transient; every
/// other non-success status is permanent and carries the response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexError {
    pub kind: FailureKind,
    pub status: Option<u16>,
    pub message: String,
}

impl IndexError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Transient,
            status: None,
            message: message.into(),
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Permanent,
            status: None,
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let kind = if status == 429 || (500..600).contains(&status) {
            FailureKind::Transient
        } else {
            FailureKind::Permanent
        };
        Self {
            kind,
            status: Some(status),
            message: body.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FailureKind::Transient
    }

    /// Display form, noting the attempt count when transient retries ran out.
    pub fn summary(&self, attempts: u32) -> String {
        if self.is_transient() {
            format!("{self} (gave up after {attempts} attempts)")
        } else {
            self.to_string()
        }
    }
}

impl fmt::Display for IndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            FailureKind::Transient => "transient",
            FailureKind::Permanent => "permanent",
        };
        match self.status {
            Some(status) => write!(f, "{kind} (status {status}): {}", self.message),
            None => write!(f, "{kind}: {}", self.message),
        }
    }
}

impl std::error::Error for IndexError {}
