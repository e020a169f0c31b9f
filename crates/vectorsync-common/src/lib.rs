pub mod cancel;
pub mod error;
pub mod types;

pub use cancel::CancelToken;
pub use error::{Error, FailureKind, IndexError, Result};
pub use types::{EmbeddingRecord, Point, PointId, PointPayload};
