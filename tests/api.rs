//! API endpoint integration tests

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use courier_gateway::api::{self, ApiState};
use courier_gateway::config::StorageConfig;
use courier_gateway::db::{ConversationRepo, DbPool, InstanceRepo, OutboundMessageRepo};
use courier_gateway::dispatch::Dispatcher;
use courier_gateway::media::{BlobStore, LocalBlobStore, MediaIngestor};
use courier_gateway::session::SessionManager;

mod common;
use common::{MockProvider, Reply, create_connected_instance, create_test_conversation, setup_test_db};

fn build_test_router(db: &DbPool, provider: Arc<MockProvider>, blob_dir: &Path) -> Router {
    let blobs = Arc::new(LocalBlobStore::new(&StorageConfig {
        root_dir: blob_dir.to_path_buf(),
        public_base_url: "https://media.test".to_string(),
        signing_secret: "test-secret".to_string(),
        signed_url_ttl_days: 7,
    }));
    let ingestor = MediaIngestor::new(
        Arc::clone(&blobs) as Arc<dyn BlobStore>,
        Duration::from_secs(3600),
    );

    let state = Arc::new(ApiState {
        sessions: SessionManager::new(
            Arc::clone(&provider) as _,
            InstanceRepo::new(db.clone()),
            "https://crm.test",
        ),
        dispatcher: Dispatcher::new(
            provider,
            ingestor,
            InstanceRepo::new(db.clone()),
            ConversationRepo::new(db.clone()),
            OutboundMessageRepo::new(db.clone()),
            "55".to_string(),
        ),
        instances: InstanceRepo::new(db.clone()),
        conversations: ConversationRepo::new(db.clone()),
        outbound: OutboundMessageRepo::new(db.clone()),
        blobs,
    });

    api::router(state)
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_endpoint() {
    let db = setup_test_db();
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_router(&db, Arc::new(MockProvider::default()), dir.path());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn send_message_reports_outcome_with_200() {
    let db = setup_test_db();
    let instance = create_connected_instance(&db);
    let conversation = create_test_conversation(&db, Some(&instance.id));

    let provider = Arc::new(MockProvider::default());
    provider
        .script_sends(vec![Reply::Body(json!({ "messageId": "MSG-API" }))])
        .await;

    let dir = tempfile::tempdir().unwrap();
    let app = build_test_router(&db, provider, dir.path());

    let response = app
        .oneshot(post_json(
            "/api/messages",
            &json!({
                "conversation_id": conversation.id,
                "kind": "text",
                "text": "hello over http",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["sent"], true);
    assert_eq!(body["provider_message_id"], "MSG-API");
}

#[tokio::test]
async fn send_failure_still_returns_200_with_row() {
    let db = setup_test_db();
    let instance = create_connected_instance(&db);
    let conversation = create_test_conversation(&db, Some(&instance.id));

    // Unscripted provider: every candidate fails
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_router(&db, Arc::new(MockProvider::default()), dir.path());

    let response = app
        .oneshot(post_json(
            "/api/messages",
            &json!({
                "conversation_id": conversation.id,
                "kind": "text",
                "text": "doomed",
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["sent"], false);
    assert!(body["error"].as_str().unwrap().contains("send-message"));

    let log = OutboundMessageRepo::new(db.clone())
        .list_for_conversation(&conversation.id)
        .unwrap();
    assert_eq!(log.len(), 1);
}

#[tokio::test]
async fn unknown_kind_is_unprocessable() {
    let db = setup_test_db();
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_router(&db, Arc::new(MockProvider::default()), dir.path());

    let response = app
        .oneshot(post_json(
            "/api/messages",
            &json!({ "conversation_id": "whatever", "kind": "sticker" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_conversation_is_not_found() {
    let db = setup_test_db();
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_router(&db, Arc::new(MockProvider::default()), dir.path());

    let response = app
        .oneshot(post_json(
            "/api/messages",
            &json!({ "conversation_id": "missing", "kind": "text", "text": "x" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn provision_recovers_an_instance_without_credentials() {
    let db = setup_test_db();
    let instances = InstanceRepo::new(db.clone());
    // Row exists but the create-time provider call never populated
    // credentials
    let instance = instances
        .create("org-1", "Stranded line", Some("5511999998888"))
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let app = build_test_router(&db, Arc::new(MockProvider::default()), dir.path());

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/instances/{}/provision", instance.id),
            &json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["session_id"], "sess-created");
    assert_eq!(body["status"], "pending");

    let updated = instances.find_required(&instance.id).unwrap();
    assert!(updated.has_credentials());

    // Repeated user action keeps the existing session
    let response = app
        .oneshot(post_json(
            &format!("/api/instances/{}/provision", instance.id),
            &json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["session_id"], "sess-created");
}

#[tokio::test]
async fn pair_returns_qr_when_available() {
    let db = setup_test_db();
    let instances = InstanceRepo::new(db.clone());
    let instance = instances
        .create("org-1", "Line", Some("5511999998888"))
        .unwrap();
    instances
        .set_provider_session(&instance.id, "sess", "tok")
        .unwrap();

    let provider = Arc::new(MockProvider::default());
    *provider.qr_reply.lock().await = Some(Reply::Body(json!("qr-over-http")));

    let dir = tempfile::tempdir().unwrap();
    let app = build_test_router(&db, provider, dir.path());

    let response = app
        .oneshot(post_json(
            &format!("/api/instances/{}/pair", instance.id),
            &json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "waiting_qr");
    assert_eq!(body["qr_code"], "qr-over-http");
}

#[tokio::test]
async fn pair_not_ready_is_not_an_error() {
    let db = setup_test_db();
    let instances = InstanceRepo::new(db.clone());
    let instance = instances
        .create("org-1", "Line", Some("5511999998888"))
        .unwrap();
    instances
        .set_provider_session(&instance.id, "sess", "tok")
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let app = build_test_router(&db, Arc::new(MockProvider::default()), dir.path());

    let response = app
        .oneshot(post_json(
            &format!("/api/instances/{}/pair", instance.id),
            &json!({}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "pending");
    assert!(body.get("qr_code").is_none());
}

#[tokio::test]
async fn media_is_served_only_with_a_valid_signature() {
    let db = setup_test_db();
    let dir = tempfile::tempdir().unwrap();

    let blobs = LocalBlobStore::new(&StorageConfig {
        root_dir: dir.path().to_path_buf(),
        public_base_url: "https://media.test".to_string(),
        signing_secret: "test-secret".to_string(),
        signed_url_ttl_days: 7,
    });
    blobs
        .upload("org/conv/images/pic.png", b"png bytes", "image/png")
        .await
        .unwrap();
    let signed = blobs
        .signed_url("org/conv/images/pic.png", Duration::from_secs(3600))
        .await
        .unwrap();
    let query = signed.split_once('?').unwrap().1;

    let app = build_test_router(&db, Arc::new(MockProvider::default()), dir.path());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/media/org/conv/images/pic.png?{query}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "image/png"
    );

    let response = app
        .oneshot(
            Request::builder()
                .uri("/media/org/conv/images/pic.png?expires=9999999999&sig=forged")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}
