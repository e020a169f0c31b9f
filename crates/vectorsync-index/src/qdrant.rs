use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, info};
use vectorsync_common::{Error, IndexError, Point, PointId, Result};
use vectorsync_config::IndexConfig;

use crate::index::{
    CollectionInfo, Distance, IndexResult, PayloadPoint, ScoredPoint, ScrollPage, VectorIndex,
};

/// Qdrant REST client. One `reqwest::Client` is reused for every call.
#[derive(Clone)]
pub struct QdrantIndex {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl QdrantIndex {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("using vector index at {base_url}");
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    pub fn from_config(config: &IndexConfig) -> Result<Self> {
        Self::new(
            config.url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let request = self.client.request(method, self.endpoint(path));
        match &self.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> IndexResult<Response> {
        let response = request.send().await.map_err(classify_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::from_status(status.as_u16(), body));
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> IndexResult<T> {
        let envelope: QdrantResponse<T> = response
            .json()
            .await
            .map_err(|e| IndexError::permanent(format!("failed to decode index response: {e}")))?;
        Ok(envelope.result)
    }
}

fn classify_transport_error(e: reqwest::Error) -> IndexError {
    if e.is_builder() {
        IndexError::permanent(format!("invalid index request: {e}"))
    } else {
        IndexError::transient(format!("index request failed: {e}"))
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn collection_info(&self, collection: &str) -> IndexResult<Option<CollectionInfo>> {
        let response = self
            .request(Method::GET, &format!("/collections/{collection}"))
            .send()
            .await
            .map_err(classify_transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::from_status(status.as_u16(), body));
        }

        let result: CollectionResult = Self::decode(response).await?;
        Ok(Some(CollectionInfo {
            vector_dim: result.vector_dim(),
            point_count: result.points_count.unwrap_or(0),
        }))
    }

    async fn create_collection(
        &self,
        collection: &str,
        vector_dim: usize,
        distance: Distance,
    ) -> IndexResult<()> {
        let body = json!({
            "vectors": {
                "size": vector_dim,
                "distance": distance,
            }
        });
        self.send(
            self.request(Method::PUT, &format!("/collections/{collection}"))
                .json(&body),
        )
        .await?;
        info!("created collection '{collection}' ({vector_dim} dims, {distance:?})");
        Ok(())
    }

    async fn upsert_points(&self, collection: &str, points: &[Point]) -> IndexResult<()> {
        self.send(
            self.request(
                Method::PUT,
                &format!("/collections/{collection}/points?wait=true"),
            )
            .json(&json!({ "points": points })),
        )
        .await?;
        debug!("upserted {} points into '{collection}'", points.len());
        Ok(())
    }

    async fn search_points(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<Value>,
    ) -> IndexResult<Vec<ScoredPoint>> {
        let mut body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });
        if let Some(filter) = filter {
            body["filter"] = filter;
        }

        let response = self
            .send(
                self.request(
                    Method::POST,
                    &format!("/collections/{collection}/points/search"),
                )
                .json(&body),
            )
            .await?;
        Self::decode(response).await
    }

    async fn delete_points(&self, collection: &str, ids: &[PointId]) -> IndexResult<()> {
        self.send(
            self.request(
                Method::POST,
                &format!("/collections/{collection}/points/delete?wait=true"),
            )
            .json(&json!({ "points": ids })),
        )
        .await?;
        debug!("deleted {} points from '{collection}'", ids.len());
        Ok(())
    }

    async fn scroll_points(
        &self,
        collection: &str,
        limit: usize,
        offset: Option<PointId>,
    ) -> IndexResult<ScrollPage> {
        let mut body = json!({
            "limit": limit,
            "with_payload": true,
            "with_vector": false,
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }

        let response = self
            .send(
                self.request(
                    Method::POST,
                    &format!("/collections/{collection}/points/scroll"),
                )
                .json(&body),
            )
            .await?;
        let result: ScrollResult = Self::decode(response).await?;
        Ok(ScrollPage {
            points: result.points,
            next_offset: result.next_page_offset,
        })
    }
}

#[derive(Debug, Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct CollectionResult {
    #[serde(default)]
    points_count: Option<u64>,
    #[serde(default)]
    config: Option<Value>,
}

impl CollectionResult {
    fn vector_dim(&self) -> Option<usize> {
        self.config
            .as_ref()?
            .pointer("/params/vectors/size")?
            .as_u64()
            .map(|size| size as usize)
    }
}

#[derive(Debug, Deserialize)]
struct ScrollResult {
    points: Vec<PayloadPoint>,
    #[serde(default)]
    next_page_offset: Option<PointId>,
}
