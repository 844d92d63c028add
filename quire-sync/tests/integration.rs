//! Integration tests against an in-process HTTP backend.
//!
//! A small axum app plays both the document API and the data store's REST
//! interface, so the real reqwest clients and the full save pipeline are
//! exercised over a socket.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::time::{timeout, Duration};
use uuid::Uuid;

use quire_core::{Block, Document, Edit};
use quire_sync::{
    default_chain, BackendClient, DocumentContent, PersistError, RevisionService, SaveStatus,
    Session, Snapshot, SyncConfig,
};

/// Recorded traffic and failure switches of the fake backend.
#[derive(Default)]
struct FakeBackend {
    /// Status returned by the update endpoint when non-zero
    api_status: AtomicU16,
    api_rejects: AtomicBool,
    store_down: AtomicBool,
    metadata_down: AtomicBool,
    next_revision: AtomicU64,
    updates: Mutex<Vec<(Uuid, Value)>>,
    content_rows: Mutex<Vec<(String, Value)>>,
    metadata_rows: Mutex<Vec<(String, Value)>>,
    revisions: Mutex<Vec<Value>>,
    api_keys: Mutex<Vec<String>>,
}

type Shared = Arc<FakeBackend>;

async fn update(
    State(backend): State<Shared>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let status = backend.api_status.load(Ordering::SeqCst);
    if status != 0 {
        let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return (code, Json(json!({"error": "backend unavailable"})));
    }
    if backend.api_rejects.load(Ordering::SeqCst) {
        return (
            StatusCode::OK,
            Json(json!({"success": false, "error": "document locked"})),
        );
    }
    backend.updates.lock().unwrap().push((id, body.clone()));
    (
        StatusCode::OK,
        Json(json!({"success": true, "document": {"id": id, "title": body["title"]}})),
    )
}

async fn create_revision(
    State(backend): State<Shared>,
    Path(_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let number = backend.next_revision.fetch_add(1, Ordering::SeqCst) + 1;
    let revision = json!({
        "revision_number": number,
        "created_at": chrono::Utc::now(),
        "change_summary": body["change_summary"],
    });
    backend.revisions.lock().unwrap().push(revision.clone());
    Json(revision)
}

async fn list_revisions(
    State(backend): State<Shared>,
    Path(_id): Path<Uuid>,
) -> impl IntoResponse {
    let revisions = backend.revisions.lock().unwrap().clone();
    Json(json!({ "revisions": revisions }))
}

async fn patch_content(
    State(backend): State<Shared>,
    headers: HeaderMap,
    Query(filter): Query<HashMap<String, String>>,
    Json(row): Json<Value>,
) -> StatusCode {
    if let Some(key) = headers.get("apikey").and_then(|v| v.to_str().ok()) {
        backend.api_keys.lock().unwrap().push(key.to_string());
    }
    if backend.store_down.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    let filter = filter.get("document_id").cloned().unwrap_or_default();
    backend.content_rows.lock().unwrap().push((filter, row));
    StatusCode::NO_CONTENT
}

async fn patch_metadata(
    State(backend): State<Shared>,
    Query(filter): Query<HashMap<String, String>>,
    Json(row): Json<Value>,
) -> StatusCode {
    if backend.metadata_down.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    let filter = filter.get("id").cloned().unwrap_or_default();
    backend.metadata_rows.lock().unwrap().push((filter, row));
    StatusCode::NO_CONTENT
}

/// Start the fake backend on a free port, return it with its base URL.
async fn start_fake_backend() -> (Shared, String) {
    let backend: Shared = Arc::new(FakeBackend::default());
    let app = Router::new()
        .route("/documents/:id/update", post(update))
        .route("/documents/:id/create-revision", post(create_revision))
        .route("/documents/:id/revisions", get(list_revisions))
        .route("/rest/v1/document_content", patch(patch_content))
        .route("/rest/v1/documents", patch(patch_metadata))
        .with_state(backend.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (backend, format!("http://127.0.0.1:{port}"))
}

fn snapshot(document_id: Uuid, edited_by: Uuid, title: &str) -> Snapshot {
    Snapshot::new(
        document_id,
        edited_by,
        DocumentContent {
            title: title.to_string(),
            content: json!({
                "type": "doc",
                "content": [{"type": "paragraph", "content": [{"type": "text", "text": "body"}]}]
            }),
        },
    )
}

fn chain_for(config: &SyncConfig) -> (Arc<BackendClient>, quire_sync::PersistenceChain) {
    let client = Arc::new(BackendClient::new(config).unwrap());
    let chain = default_chain(config, client.clone()).unwrap();
    (client, chain)
}

#[tokio::test]
async fn test_api_update_succeeds() {
    let (backend, url) = start_fake_backend().await;
    let config = SyncConfig::for_testing(&url);
    let (_, chain) = chain_for(&config);
    let id = Uuid::new_v4();

    let receipt = chain.persist(&snapshot(id, config.user_id, "Paper")).await.unwrap();
    assert_eq!(receipt.strategy, "api");

    let updates = backend.updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, id);
    assert_eq!(updates[0].1["title"], "Paper");
    assert_eq!(updates[0].1["content"]["type"], "doc");
    assert!(backend.content_rows.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_server_error_falls_back_to_store() {
    let (backend, url) = start_fake_backend().await;
    backend.api_status.store(500, Ordering::SeqCst);
    let config = SyncConfig::for_testing(&url);
    let (_, chain) = chain_for(&config);
    let id = Uuid::new_v4();

    let receipt = chain.persist(&snapshot(id, config.user_id, "Paper")).await.unwrap();
    assert_eq!(receipt.strategy, "direct-store");
    assert_eq!(receipt.attempt, 1);

    let rows = backend.content_rows.lock().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, format!("eq.{id}"));
    assert_eq!(rows[0].1["last_edited_by"], config.user_id.to_string());
    assert!(rows[0].1["updated_at"].is_string());

    let meta = backend.metadata_rows.lock().unwrap();
    assert_eq!(meta[0].1["title"], "Paper");
    assert_eq!(backend.api_keys.lock().unwrap()[0], "test-anon-key");
}

#[tokio::test]
async fn test_rejected_update_falls_back_to_store() {
    let (backend, url) = start_fake_backend().await;
    backend.api_rejects.store(true, Ordering::SeqCst);
    let config = SyncConfig::for_testing(&url);
    let (_, chain) = chain_for(&config);

    let receipt = chain
        .persist(&snapshot(Uuid::new_v4(), config.user_id, "Paper"))
        .await
        .unwrap();
    assert_eq!(receipt.strategy, "direct-store");
}

#[tokio::test]
async fn test_metadata_failure_still_saves() {
    let (backend, url) = start_fake_backend().await;
    backend.api_status.store(502, Ordering::SeqCst);
    backend.metadata_down.store(true, Ordering::SeqCst);
    let config = SyncConfig::for_testing(&url);
    let (_, chain) = chain_for(&config);

    let receipt = chain
        .persist(&snapshot(Uuid::new_v4(), config.user_id, "Paper"))
        .await
        .unwrap();
    assert_eq!(receipt.strategy, "direct-store");
    assert_eq!(backend.content_rows.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_both_paths_failing() {
    let (backend, url) = start_fake_backend().await;
    backend.api_status.store(500, Ordering::SeqCst);
    backend.store_down.store(true, Ordering::SeqCst);
    let config = SyncConfig::for_testing(&url);
    let (_, chain) = chain_for(&config);

    let err = chain
        .persist(&snapshot(Uuid::new_v4(), config.user_id, "Paper"))
        .await
        .unwrap_err();
    match err {
        PersistError::Exhausted { attempts } => {
            assert_eq!(attempts.len(), 2);
            assert_eq!(attempts[0].0, "api");
            assert_eq!(attempts[1].0, "direct-store");
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_backend_fails_fast() {
    // Nothing listens on this port once the listener is dropped.
    let port = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = SyncConfig::for_testing(format!("http://127.0.0.1:{port}"));
    let (_, chain) = chain_for(&config);

    let result = timeout(
        Duration::from_secs(10),
        chain.persist(&snapshot(Uuid::new_v4(), config.user_id, "Paper")),
    )
    .await
    .expect("request timeout should bound the chain");
    assert!(result.is_err());
}

#[tokio::test]
async fn test_create_and_list_revisions() {
    let (backend, url) = start_fake_backend().await;
    let config = SyncConfig::for_testing(&url);
    let client = BackendClient::new(&config).unwrap();
    let id = Uuid::new_v4();

    let first = client.create_revision(id, "Auto-saved checkpoint").await.unwrap();
    let second = client.create_revision(id, "Submitted").await.unwrap();
    assert_eq!(first.revision_number, 1);
    assert_eq!(second.revision_number, 2);
    assert_eq!(second.summary, "Submitted");

    let listing = client.list_revisions(id).await.unwrap();
    assert_eq!(listing.len(), 2);
    assert_eq!(backend.revisions.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_session_saves_over_http() {
    let (backend, url) = start_fake_backend().await;
    let config = SyncConfig {
        debounce: Duration::from_millis(50),
        ..SyncConfig::for_testing(&url)
    };
    let doc = Arc::new(RwLock::new(Document::new(config.user_id, "Remote Draft")));
    let handle = Session::open_remote(&config, doc.clone()).unwrap();

    handle
        .load_content(json!({"type": "doc", "content": [{"type": "paragraph"}]}))
        .await
        .unwrap()
        .unwrap();
    // Loading alone never saves.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(backend.updates.lock().unwrap().is_empty());

    doc.write()
        .unwrap()
        .apply(Edit::InsertBlock {
            index: 1,
            block: Block::paragraph("typed"),
        })
        .unwrap();
    let mut state_rx = handle.subscribe();
    handle.notify_mutation().await.unwrap();

    timeout(
        Duration::from_secs(5),
        state_rx.wait_for(|s| s.status == SaveStatus::Saved),
    )
    .await
    .expect("save should complete")
    .unwrap();

    let updates = backend.updates.lock().unwrap().clone();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].1["content"]["content"][1]["content"][0]["text"], "typed");

    let report = handle.close().await.unwrap();
    assert_eq!(report.state.status, SaveStatus::Saved);
    assert_eq!(report.discarded, 0);
}

#[tokio::test]
async fn test_session_replays_offline_saves_in_order() {
    let (backend, url) = start_fake_backend().await;
    let config = SyncConfig::for_testing(&url);
    let doc = Arc::new(RwLock::new(Document::new(config.user_id, "v0")));
    let handle = Session::open_remote(&config, doc.clone()).unwrap();
    handle.content_loaded().await.unwrap();

    handle.set_online(false).await.unwrap();
    for title in ["v1", "v2", "v3"] {
        doc.write()
            .unwrap()
            .apply(Edit::SetTitle {
                title: title.to_string(),
            })
            .unwrap();
        handle.save_now().await.unwrap();
    }
    assert_eq!(handle.queue_len().await.unwrap(), 3);
    assert!(backend.updates.lock().unwrap().is_empty());

    handle.set_online(true).await.unwrap();
    assert_eq!(handle.queue_len().await.unwrap(), 0);
    assert_eq!(handle.state().status, SaveStatus::Saved);

    let titles: Vec<Value> = backend
        .updates
        .lock()
        .unwrap()
        .iter()
        .map(|(_, body)| body["title"].clone())
        .collect();
    assert_eq!(titles, vec![json!("v1"), json!("v2"), json!("v3")]);
}
