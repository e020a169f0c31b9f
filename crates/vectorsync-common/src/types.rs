use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a point inside an index collection.
///
/// Points written by the migration always use `Num`; `Uuid` exists so that
/// scans over collections populated by other writers still deserialize.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointId {
    Num(u64),
    Uuid(String),
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Uuid(s) => write!(f, "{s}"),
        }
    }
}

impl From<u64> for PointId {
    fn from(value: u64) -> Self {
        Self::Num(value)
    }
}

/// One row read from the source store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub source_id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPayload {
    pub text: String,
    pub path: String,
}

/// A point as sent to the index service's upsert endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: PointId,
    pub vector: Vec<f32>,
    pub payload: PointPayload,
}
