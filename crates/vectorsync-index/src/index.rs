use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vectorsync_common::{IndexError, Point, PointId};

pub type IndexResult<T> = std::result::Result<T, IndexError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    Cosine,
    Euclid,
    Dot,
}

/// What the index reports about an existing collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// `None` when the collection uses named vectors.
    pub vector_dim: Option<usize>,
    pub point_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: PointId,
    pub score: f32,
    #[serde(default)]
    pub payload: Option<Map<String, Value>>,
}

/// A point returned by a payload scan, without its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadPoint {
    pub id: PointId,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollPage {
    pub points: Vec<PayloadPoint>,
    pub next_offset: Option<PointId>,
}

/// Network operations consumed from the vector-index service.
///
/// Implementations hold a reusable client; a failed call must not affect
/// later calls.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// `Ok(None)` when the collection does not exist.
    async fn collection_info(&self, collection: &str) -> IndexResult<Option<CollectionInfo>>;

    async fn create_collection(
        &self,
        collection: &str,
        vector_dim: usize,
        distance: Distance,
    ) -> IndexResult<()>;

    /// Re-upserting an existing identity overwrites it.
    async fn upsert_points(&self, collection: &str, points: &[Point]) -> IndexResult<()>;

    async fn search_points(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<Value>,
    ) -> IndexResult<Vec<ScoredPoint>>;

    async fn delete_points(&self, collection: &str, ids: &[PointId]) -> IndexResult<()>;

    /// One page of points with payloads, starting at `offset`.
    async fn scroll_points(
        &self,
        collection: &str,
        limit: usize,
        offset: Option<PointId>,
    ) -> IndexResult<ScrollPage>;

    async fn collection_exists(&self, collection: &str) -> IndexResult<bool> {
        Ok(self.collection_info(collection).await?.is_some())
    }

    async fn point_count(&self, collection: &str) -> IndexResult<u64> {
        self.collection_info(collection)
            .await?
            .map(|info| info.point_count)
            .ok_or_else(|| {
                IndexError::from_status(404, format!("collection '{collection}' not found"))
            })
    }
}
