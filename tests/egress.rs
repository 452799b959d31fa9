//! Remote-service clients against local fake servers.
//!
//! Covers the shared retry policy, lazy Pinecone index creation with host
//! memoization, and the OpenAI-compatible completion and embedding calls.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use docqa::config::IndexConfig;
use docqa::index::{PineconeIndex, VectorIndex};
use docqa::llm::{CompletionClient, CompletionRequest, OpenAiClient};
use docqa::models::{ChunkMetadata, IndexedEntry};
use docqa::service::{send_with_retry, RetryPolicy, ServiceError};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const PINECONE_KEY: &str = "pc-test-key";
const OPENAI_KEY: &str = "sk-test";
const DIMS: usize = 8;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{}", addr)
}

// ─── Scripted status server ─────────────────────────────────────────

/// Answers each request with the next scripted status, then 200.
struct Scripted {
    statuses: Mutex<VecDeque<u16>>,
    hits: AtomicUsize,
}

async fn scripted_reply(State(s): State<Arc<Scripted>>) -> (StatusCode, &'static str) {
    s.hits.fetch_add(1, Ordering::SeqCst);
    let next = s.statuses.lock().unwrap().pop_front().unwrap_or(200);
    (StatusCode::from_u16(next).unwrap(), "scripted")
}

async fn scripted(statuses: &[u16]) -> (String, Arc<Scripted>) {
    let state = Arc::new(Scripted {
        statuses: Mutex::new(statuses.iter().copied().collect()),
        hits: AtomicUsize::new(0),
    });
    let app = Router::new()
        .route("/", any(scripted_reply))
        .with_state(state.clone());
    (serve(app).await, state)
}

async fn send(url: &str, max_retries: u32) -> Result<reqwest::Response, ServiceError> {
    let client = reqwest::Client::new();
    send_with_retry(RetryPolicy::new(max_retries), || client.post(url)).await
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let (url, server) = scripted(&[429]).await;
    let resp = send(&url, 1).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(server.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_client_error_fails_fast() {
    let (url, server) = scripted(&[400, 400]).await;
    let err = send(&url, 1).await.unwrap_err();
    match err {
        ServiceError::Status { status, body } => {
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, "scripted");
        }
        other => panic!("expected status error, got {:?}", other),
    }
    assert_eq!(server.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let (url, server) = scripted(&[503, 503, 503]).await;
    let err = send(&url, 1).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Status { status, .. } if status == StatusCode::SERVICE_UNAVAILABLE
    ));
    assert_eq!(server.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_persistent_rate_limit_surfaces() {
    let (url, server) = scripted(&[429, 429, 429]).await;
    let err = send(&url, 1).await.unwrap_err();
    assert!(matches!(err, ServiceError::RateLimited { .. }));
    assert_eq!(server.hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_zero_retries_sends_once() {
    let (url, server) = scripted(&[500]).await;
    assert!(send(&url, 0).await.is_err());
    assert_eq!(server.hits.load(Ordering::SeqCst), 1);
}

// ─── Fake Pinecone ──────────────────────────────────────────────────

/// Control and data plane in one server. After creation the index reports
/// not-ready for `pending_after_create` describes.
struct FakePinecone {
    base: String,
    exists: AtomicBool,
    pending: AtomicUsize,
    pending_after_create: usize,
    create_status: StatusCode,
    describes: AtomicUsize,
    creates: AtomicUsize,
    upserted: AtomicUsize,
    queries: AtomicUsize,
    create_body: Mutex<Option<Value>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    let key = headers.get("api-key").and_then(|v| v.to_str().ok());
    key == Some(PINECONE_KEY) && headers.contains_key("x-pinecone-api-version")
}

async fn describe_index(
    State(s): State<Arc<FakePinecone>>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    s.describes.fetch_add(1, Ordering::SeqCst);
    if !s.exists.load(Ordering::SeqCst) {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "not found" }))).into_response();
    }

    let pending = s.pending.load(Ordering::SeqCst);
    if pending > 0 {
        s.pending.store(pending - 1, Ordering::SeqCst);
        return Json(json!({ "name": name, "host": "", "status": { "ready": false } }))
            .into_response();
    }
    Json(json!({ "name": name, "host": s.base, "status": { "ready": true } })).into_response()
}

async fn create_index(
    State(s): State<Arc<FakePinecone>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    s.creates.fetch_add(1, Ordering::SeqCst);
    *s.create_body.lock().unwrap() = Some(body);
    s.exists.store(true, Ordering::SeqCst);
    s.pending.store(s.pending_after_create, Ordering::SeqCst);
    (s.create_status, Json(json!({}))).into_response()
}

async fn upsert_vectors(
    State(s): State<Arc<FakePinecone>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let count = body["vectors"].as_array().map_or(0, Vec::len);
    s.upserted.fetch_add(count, Ordering::SeqCst);
    Json(json!({ "upsertedCount": count })).into_response()
}

async fn query_vectors(
    State(s): State<Arc<FakePinecone>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) || body["includeMetadata"] != json!(true) {
        return StatusCode::BAD_REQUEST.into_response();
    }
    s.queries.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "matches": [{
            "id": "doc_chunk_0",
            "score": 0.91,
            "metadata": {
                "text": "The grace period is thirty days.",
                "doc_id": "doc",
                "chunk_index": 0.0,
                "document_url": "https://example.com/policy.pdf"
            }
        }]
    }))
    .into_response()
}

async fn fake_pinecone(
    exists: bool,
    pending_after_create: usize,
    create_status: StatusCode,
) -> Arc<FakePinecone> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let state = Arc::new(FakePinecone {
        base,
        exists: AtomicBool::new(exists),
        pending: AtomicUsize::new(0),
        pending_after_create,
        create_status,
        describes: AtomicUsize::new(0),
        creates: AtomicUsize::new(0),
        upserted: AtomicUsize::new(0),
        queries: AtomicUsize::new(0),
        create_body: Mutex::new(None),
    });

    let app = Router::new()
        .route("/indexes/{name}", get(describe_index))
        .route("/indexes", post(create_index))
        .route("/vectors/upsert", post(upsert_vectors))
        .route("/query", post(query_vectors))
        .with_state(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    state
}

fn pinecone(fake: &FakePinecone, ready_timeout_secs: u64) -> PineconeIndex {
    let config = IndexConfig {
        name: "docqa-test".to_string(),
        control_url: fake.base.clone(),
        max_retries: 0,
        ready_timeout_secs,
        ready_poll_secs: 1,
        ..Default::default()
    };
    PineconeIndex::new(&config, DIMS, PINECONE_KEY.to_string()).unwrap()
}

fn entry(i: usize) -> IndexedEntry {
    IndexedEntry {
        id: format!("doc_chunk_{}", i),
        values: vec![0.1; DIMS],
        metadata: ChunkMetadata {
            text: format!("chunk {}", i),
            doc_id: "doc".to_string(),
            chunk_index: i,
            document_url: "https://example.com/policy.pdf".to_string(),
        },
    }
}

#[tokio::test]
async fn test_index_created_lazily_and_host_reused() {
    let fake = fake_pinecone(false, 1, StatusCode::CREATED).await;
    let index = pinecone(&fake, 30);

    index.upsert(&[entry(0), entry(1)]).await.unwrap();
    assert_eq!(fake.creates.load(Ordering::SeqCst), 1);
    // 404, not ready, ready.
    assert_eq!(fake.describes.load(Ordering::SeqCst), 3);
    assert_eq!(fake.upserted.load(Ordering::SeqCst), 2);

    let body = fake.create_body.lock().unwrap().clone().unwrap();
    assert_eq!(body["name"], "docqa-test");
    assert_eq!(body["dimension"], DIMS);
    assert_eq!(body["metric"], "cosine");
    assert_eq!(body["spec"]["serverless"]["region"], "us-east-1");

    let matches = index.query(&[0.1; DIMS], 3).await.unwrap();
    assert_eq!(matches.len(), 1);
    let meta = matches[0].metadata.as_ref().unwrap();
    assert_eq!(meta.chunk_index, 0);
    assert_eq!(meta.text, "The grace period is thirty days.");

    index.query(&[0.1; DIMS], 3).await.unwrap();
    assert_eq!(fake.describes.load(Ordering::SeqCst), 3);
    assert_eq!(fake.queries.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_ready_index_is_not_recreated() {
    let fake = fake_pinecone(true, 0, StatusCode::CREATED).await;
    let index = pinecone(&fake, 30);

    index.upsert(&[entry(0)]).await.unwrap();
    assert_eq!(fake.creates.load(Ordering::SeqCst), 0);
    assert_eq!(fake.describes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_create_conflict_counts_as_existing() {
    let fake = fake_pinecone(false, 0, StatusCode::CONFLICT).await;
    let index = pinecone(&fake, 30);

    let matches = index.query(&[0.1; DIMS], 1).await.unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(fake.creates.load(Ordering::SeqCst), 1);
    assert_eq!(fake.describes.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_never_ready_index_times_out() {
    let fake = fake_pinecone(false, usize::MAX, StatusCode::CREATED).await;
    let index = pinecone(&fake, 0);

    let err = index.upsert(&[entry(0)]).await.unwrap_err();
    assert!(matches!(err, ServiceError::Unavailable(_)), "got {:?}", err);
    assert_eq!(fake.upserted.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_wrong_api_key_is_not_retried() {
    let fake = fake_pinecone(true, 0, StatusCode::CREATED).await;
    let config = IndexConfig {
        control_url: fake.base.clone(),
        max_retries: 3,
        ..Default::default()
    };
    let index = PineconeIndex::new(&config, DIMS, "wrong".to_string()).unwrap();

    let err = index.upsert(&[entry(0)]).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Status { status, .. } if status == StatusCode::UNAUTHORIZED
    ));
}

// ─── Fake OpenAI ────────────────────────────────────────────────────

async fn chat_completions(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let auth = headers.get("authorization").and_then(|v| v.to_str().ok());
    if auth != Some("Bearer sk-test") {
        return (StatusCode::UNAUTHORIZED, "bad key").into_response();
    }
    let roles: Vec<&str> = body["messages"]
        .as_array()
        .map(|m| m.iter().filter_map(|m| m["role"].as_str()).collect())
        .unwrap_or_default();
    if body["model"] != "gpt-test" || roles != ["system", "user"] {
        return StatusCode::BAD_REQUEST.into_response();
    }
    Json(json!({
        "choices": [{ "message": { "role": "assistant", "content": "  Thirty days.\n" } }]
    }))
    .into_response()
}

async fn embeddings(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !headers.contains_key("authorization") || body["input"].as_str().is_none() {
        return StatusCode::BAD_REQUEST.into_response();
    }
    Json(json!({ "data": [{ "embedding": [0.25, -0.5, 1.0] }] })).into_response()
}

async fn fake_openai() -> String {
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/embeddings", post(embeddings));
    format!("{}/v1", serve(app).await)
}

fn request<'a>(user: &'a str) -> CompletionRequest<'a> {
    CompletionRequest {
        system: "Answer from the context.",
        user,
        temperature: Some(0.1),
        max_tokens: 64,
    }
}

#[tokio::test]
async fn test_completion_is_trimmed() {
    let base = fake_openai().await;
    let client = OpenAiClient::new(&base, OPENAI_KEY.to_string(), "gpt-test".to_string(), 5, 0)
        .unwrap();

    let answer = client.complete(&request("What is the grace period?")).await.unwrap();
    assert_eq!(answer, "Thirty days.");

    let vector = client.embed("text-embedding-test", "grace period").await.unwrap();
    assert_eq!(vector, vec![0.25, -0.5, 1.0]);
}

#[tokio::test]
async fn test_bad_api_key_is_status_error() {
    let base = fake_openai().await;
    let client = OpenAiClient::new(&base, "wrong".to_string(), "gpt-test".to_string(), 5, 3)
        .unwrap();

    let err = client.complete(&request("q")).await.unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Status { status, .. } if status == StatusCode::UNAUTHORIZED
    ));
}
