use serde_json::json;
use std::time::Duration;
use vectorsync_common::{FailureKind, Point, PointId, PointPayload};
use vectorsync_index::{Distance, QdrantIndex, VectorIndex};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn index_for(server: &MockServer) -> QdrantIndex {
    QdrantIndex::new(server.uri(), None, Duration::from_secs(5)).expect("client should build")
}

#[tokio::test]
async fn collection_info_maps_404_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
        .mount(&server)
        .await;

    let index = index_for(&server);
    assert_eq!(index.collection_info("missing").await.unwrap(), None);
    assert!(!index.collection_exists("missing").await.unwrap());
}

#[tokio::test]
async fn collection_info_reads_dimension_and_count() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/collections/docs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "status": "green",
                "points_count": 42,
                "config": { "params": { "vectors": { "size": 3, "distance": "Cosine" } } }
            },
            "status": "ok",
            "time": 0.001
        })))
        .mount(&server)
        .await;

    let info = index_for(&server)
        .collection_info("docs")
        .await
        .unwrap()
        .expect("collection should exist");
    assert_eq!(info.vector_dim, Some(3));
    assert_eq!(info.point_count, 42);
}

#[tokio::test]
async fn create_collection_sends_cosine_vectors_config() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/collections/docs"))
        .and(body_partial_json(json!({
            "vectors": { "size": 768, "distance": "Cosine" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": true })))
        .expect(1)
        .mount(&server)
        .await;

    index_for(&server)
        .create_collection("docs", 768, Distance::Cosine)
        .await
        .expect("create should succeed");
}

#[tokio::test]
async fn upsert_sends_numeric_ids_and_payload() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/collections/docs/points"))
        .and(body_partial_json(json!({
            "points": [{
                "id": 17,
                "vector": [0.5, 0.5],
                "payload": { "text": "hello", "path": "a.md" }
            }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": { "operation_id": 1, "status": "completed" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let points = vec![Point {
        id: PointId::Num(17),
        vector: vec![0.5, 0.5],
        payload: PointPayload {
            text: "hello".into(),
            path: "a.md".into(),
        },
    }];
    index_for(&server)
        .upsert_points("docs", &points)
        .await
        .expect("upsert should succeed");
}

#[tokio::test]
async fn upsert_failures_are_classified_by_status() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/collections/bad/points"))
        .respond_with(ResponseTemplate::new(400).set_body_string("wrong vector size"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/collections/busy/points"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let index = index_for(&server);

    let bad = index.upsert_points("bad", &[]).await.unwrap_err();
    assert_eq!(bad.kind, FailureKind::Permanent);
    assert_eq!(bad.status, Some(400));
    assert_eq!(bad.message, "wrong vector size");

    let busy = index.upsert_points("busy", &[]).await.unwrap_err();
    assert_eq!(busy.kind, FailureKind::Transient);
}

#[tokio::test]
async fn unreachable_server_is_transient() {
    let index = QdrantIndex::new("http://127.0.0.1:1", None, Duration::from_secs(2))
        .expect("client should build");
    let err = index.upsert_points("docs", &[]).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Transient);
}

#[tokio::test]
async fn scroll_returns_points_and_next_offset() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections/docs/points/scroll"))
        .and(body_partial_json(json!({ "limit": 2, "offset": 5, "with_vector": false })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "points": [
                    { "id": 5, "payload": { "conversation_id": "c1", "timestamp": 100 } },
                    { "id": "5c56c793-69f3-4fbf-87e6-c4bf54c28c26", "payload": {} }
                ],
                "next_page_offset": 9
            }
        })))
        .mount(&server)
        .await;

    let page = index_for(&server)
        .scroll_points("docs", 2, Some(PointId::Num(5)))
        .await
        .expect("scroll should succeed");

    assert_eq!(page.points.len(), 2);
    assert_eq!(page.points[0].payload["conversation_id"], "c1");
    assert!(matches!(page.points[1].id, PointId::Uuid(_)));
    assert_eq!(page.next_offset, Some(PointId::Num(9)));
}

#[tokio::test]
async fn delete_and_search_hit_expected_endpoints_with_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/collections/docs/points/delete"))
        .and(header("api-key", "secret"))
        .and(body_partial_json(json!({ "points": [1, 2] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": {} })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/collections/docs/points/search"))
        .and(header("api-key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [
                { "id": 1, "version": 3, "score": 0.9, "payload": { "text": "near" } }
            ]
        })))
        .mount(&server)
        .await;

    let index = QdrantIndex::new(server.uri(), Some("secret".into()), Duration::from_secs(5))
        .expect("client should build");

    index
        .delete_points("docs", &[PointId::Num(1), PointId::Num(2)])
        .await
        .expect("delete should succeed");

    let hits = index
        .search_points("docs", &[0.1, 0.2], 3, None)
        .await
        .expect("search should succeed");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, PointId::Num(1));
    assert!((hits[0].score - 0.9).abs() < f32::EPSILON);
}
