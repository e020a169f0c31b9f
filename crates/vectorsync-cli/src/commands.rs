use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};
use vectorsync_common::{CancelToken, Error};
use vectorsync_config::AppConfig;
use vectorsync_db::SqliteSource;
use vectorsync_index::{QdrantIndex, RetryPolicy, VectorIndex};
use vectorsync_migrate::{MigrationCoordinator, MigrationOptions, MigrationOutcome};
use vectorsync_retention::{RetentionEngine, RetentionScheduler};

/// Each handler returns `true` when the run should exit non-zero.
type Failed = bool;

fn connect(config: &AppConfig) -> Result<Arc<dyn VectorIndex>> {
    let index = QdrantIndex::from_config(&config.index)?;
    Ok(Arc::new(index))
}

/// Trip `cancel` on the first Ctrl-C.
fn cancel_on_interrupt(cancel: CancelToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            cancel.cancel();
        }
    });
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn migrate(config: &AppConfig, sqlite_db: &Path, dry_run: bool) -> Result<Failed> {
    let source = SqliteSource::open(sqlite_db)?;
    let cancel = CancelToken::new();
    cancel_on_interrupt(cancel.clone());

    let options = MigrationOptions {
        dry_run,
        ..MigrationOptions::from_config(config)
    };
    let mut coordinator = MigrationCoordinator::new(
        connect(config)?,
        options,
        RetryPolicy::from(&config.retry),
        cancel,
    );

    let outcome = coordinator.run(&source).await?;
    match &outcome {
        MigrationOutcome::DryRun(preview) => print_json(preview)?,
        MigrationOutcome::Completed(report) => print_json(report)?,
    }
    Ok(outcome.has_failures())
}

pub async fn retention_run(config: &AppConfig, dry_run: bool) -> Result<Failed> {
    let cancel = CancelToken::new();
    cancel_on_interrupt(cancel.clone());

    let engine = RetentionEngine::from_config(connect(config)?, config).with_cancel(cancel);
    let report = engine.sweep(dry_run).await?;
    print_json(&report)?;
    Ok(report.has_errors())
}

pub async fn retention_schedule(config: &AppConfig) -> Result<Failed> {
    let cancel = CancelToken::new();
    cancel_on_interrupt(cancel.clone());

    let engine = RetentionEngine::from_config(connect(config)?, config).with_cancel(cancel.clone());
    if engine.policy().is_empty() {
        warn!("no retention rules configured; sweeps will not delete anything");
    }

    // One JSON line per sweep while running; the summary follows on shutdown.
    let summary = RetentionScheduler::new(Arc::new(engine), config.retention.interval(), cancel)
        .run(|report| match serde_json::to_string(report) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!("failed to encode sweep report: {e}"),
        })
        .await;
    print_json(&summary)?;
    Ok(summary.has_errors())
}

#[derive(Serialize)]
struct CollectionStats<'a> {
    collection: &'a str,
    exists: bool,
    vector_dim: Option<usize>,
    point_count: u64,
}

pub async fn stats(config: &AppConfig) -> Result<Failed> {
    let index = connect(config)?;
    let collection = config.index.collection.as_str();
    let info = index
        .collection_info(collection)
        .await
        .map_err(Error::Index)?;

    let stats = CollectionStats {
        collection,
        exists: info.is_some(),
        vector_dim: info.as_ref().and_then(|i| i.vector_dim),
        point_count: info.as_ref().map_or(0, |i| i.point_count),
    };
    print_json(&stats)?;
    if !stats.exists {
        warn!("collection '{collection}' does not exist");
    }
    Ok(!stats.exists)
}

pub async fn search(config: &AppConfig, vector: &str, limit: usize) -> Result<Failed> {
    let vector: Vec<f32> =
        serde_json::from_str(vector).context("--vector must be a JSON array of numbers")?;
    if vector.len() != config.migration.vector_dim {
        warn!(
            "query vector has {} dimensions, configured dimension is {}",
            vector.len(),
            config.migration.vector_dim
        );
    }

    let index = connect(config)?;
    let hits = index
        .search_points(&config.index.collection, &vector, limit, None)
        .await
        .map_err(Error::Index)?;
    info!("{} results from '{}'", hits.len(), config.index.collection);
    print_json(&hits)?;
    Ok(false)
}
