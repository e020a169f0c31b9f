use rusqlite::{Connection, params};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use vectorsync_common::CancelToken;
use vectorsync_db::SqliteSource;
use vectorsync_index::{QdrantIndex, RetryPolicy};
use vectorsync_migrate::{IdentityMapper, MigrationCoordinator, MigrationOptions, MigrationOutcome};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn migrates_sqlite_rows_into_a_new_collection() {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let db = dir.path().join("embeddings.db");
    let conn = Connection::open(&db).expect("failed to create fixture db");
    conn.execute_batch(
        "CREATE TABLE embeddings (id TEXT PRIMARY KEY, vector TEXT, text TEXT, path TEXT);",
    )
    .expect("failed to create embeddings table");
    for (id, vector) in [("a", "[1.0, 0.0, 0.0]"), ("b", "[0.0, 1.0, 0.0]"), ("c", "[0.0, 0.0, 1.0]")] {
        conn.execute(
            "INSERT INTO embeddings (id, vector, text, path) VALUES (?, ?, ?, ?)",
            params![id, vector, format!("chunk {id}"), format!("notes/{id}.md")],
        )
        .expect("failed to insert fixture row");
    }
    drop(conn);

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/vibe_rag"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/collections/vibe_rag"))
        .and(body_partial_json(json!({ "vectors": { "size": 3, "distance": "Cosine" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/collections/vibe_rag/points"))
        .and(body_partial_json(json!({
            "points": [
                { "id": IdentityMapper::map("a"), "payload": { "text": "chunk a", "path": "notes/a.md" } },
                { "id": IdentityMapper::map("b") }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "operation_id": 1, "status": "completed" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/collections/vibe_rag/points"))
        .and(body_partial_json(json!({ "points": [{ "id": IdentityMapper::map("c") }] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "operation_id": 2, "status": "completed" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let index = QdrantIndex::new(server.uri(), None, Duration::from_secs(5))
        .expect("client should build");
    let source = SqliteSource::open(&db).expect("source should open");
    let options = MigrationOptions {
        collection: "vibe_rag".into(),
        vector_dim: 3,
        batch_size: 2,
        concurrency: 1,
        preview_size: 5,
        dry_run: false,
    };

    let outcome = MigrationCoordinator::new(
        Arc::new(index),
        options,
        RetryPolicy::no_delay(1),
        CancelToken::new(),
    )
    .run(&source)
    .await
    .expect("migration should run");

    let MigrationOutcome::Completed(report) = outcome else {
        panic!("expected a live run report");
    };
    assert_eq!(report.total_read, 3);
    assert_eq!(report.total_inserted, 3);
    assert!(!report.has_failures());
}
