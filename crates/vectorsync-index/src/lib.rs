pub mod index;
pub mod qdrant;
pub mod retry;

pub use index::{
    CollectionInfo, Distance, IndexResult, PayloadPoint, ScoredPoint, ScrollPage, VectorIndex,
};
pub use qdrant::QdrantIndex;
pub use retry::{RetryError, RetryPolicy};
