pub mod source;
pub mod sqlite_source;

pub use source::{EmbeddingSource, RecordStream};
pub use sqlite_source::SqliteSource;
