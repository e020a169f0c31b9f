use serde::{Deserialize, Serialize};
use std::time::Duration;
use vectorsync_common::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub migration: MigrationConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub retention: RetentionConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.index.url)
            .map_err(|e| Error::Config(format!("invalid index url '{}': {e}", self.index.url)))?;
        if self.index.collection.trim().is_empty() {
            return Err(Error::Config("collection name cannot be empty".into()));
        }
        if self.index.timeout_secs == 0 {
            return Err(Error::Config("index timeout_secs must be greater than zero".into()));
        }
        if self.migration.vector_dim == 0 {
            return Err(Error::Config("vector_dim must be greater than zero".into()));
        }
        if self.migration.batch_size == 0 {
            return Err(Error::Config("batch_size must be greater than zero".into()));
        }
        if self.migration.concurrency == 0 {
            return Err(Error::Config("concurrency must be greater than zero".into()));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(Error::Config(format!(
                "base_delay_ms ({}) must be <= max_delay_ms ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }
        if self.retention.interval_secs == 0 {
            return Err(Error::Config("retention interval_secs must be greater than zero".into()));
        }
        if self.retention.delete_batch_size == 0 || self.retention.scan_page_size == 0 {
            return Err(Error::Config(
                "retention delete_batch_size and scan_page_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    #[serde(default = "default_index_url")]
    pub url: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            url: default_index_url(),
            api_key: None,
            collection: default_collection(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_index_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_collection() -> String {
    "vibe_rag".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    #[serde(default = "default_vector_dim")]
    pub vector_dim: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Upper bound on batches in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Number of sample entries shown by a dry run.
    #[serde(default = "default_preview_size")]
    pub preview_size: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            vector_dim: default_vector_dim(),
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            preview_size: default_preview_size(),
        }
    }
}

fn default_vector_dim() -> usize {
    768
}

fn default_batch_size() -> usize {
    100
}

fn default_concurrency() -> usize {
    1
}

fn default_preview_size() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    #[serde(default)]
    pub ttl_secs: Option<u64>,

    #[serde(default)]
    pub max_per_partition: Option<usize>,

    #[serde(default)]
    pub global_max: Option<usize>,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_delete_batch_size")]
    pub delete_batch_size: usize,

    #[serde(default = "default_scan_page_size")]
    pub scan_page_size: usize,

    #[serde(default = "default_timestamp_field")]
    pub timestamp_field: String,

    #[serde(default = "default_partition_field")]
    pub partition_field: String,
}

impl RetentionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: None,
            max_per_partition: None,
            global_max: None,
            interval_secs: default_interval_secs(),
            delete_batch_size: default_delete_batch_size(),
            scan_page_size: default_scan_page_size(),
            timestamp_field: default_timestamp_field(),
            partition_field: default_partition_field(),
        }
    }
}

fn default_interval_secs() -> u64 {
    86_400
}

fn default_delete_batch_size() -> usize {
    256
}

fn default_scan_page_size() -> usize {
    256
}

fn default_timestamp_field() -> String {
    "timestamp".to_string()
}

fn default_partition_field() -> String {
    "conversation_id".to_string()
}
