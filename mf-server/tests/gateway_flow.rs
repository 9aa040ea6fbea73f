use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use mf_auth::InsecureTestVerifier;
use mf_dispatch::{Dispatcher, InProcessCoordinator, InProcessInvoker};
use mf_kv::MemoryKvStore;
use mf_registry::{FileResultRegistry, JobRegistry, SessionRegistry};
use mf_rewind::RewindController;
use mf_store::{MemoryObjectStore, MultipartBroker, MultipartStore, SignedUrlStore};

const SECRET: &str = "edge-secret-for-tests";

fn test_state() -> mf_server::AppState {
    let kv = Arc::new(MemoryKvStore::new());
    let jobs = JobRegistry::new(kv.clone());
    let sessions = SessionRegistry::new(kv.clone());
    let files = FileResultRegistry::new(kv.clone());

    let object_store = Arc::new(MemoryObjectStore::new());
    let store: Arc<dyn SignedUrlStore> = object_store.clone();
    let multipart_store: Arc<dyn MultipartStore> = object_store.clone();
    let rewind_store: Arc<dyn mf_store::ObjectStore> = object_store;

    let dispatcher = Arc::new(Dispatcher::new(
        jobs.clone(),
        Arc::new(InProcessCoordinator::new()),
        Arc::new(InProcessInvoker::new()),
    ));
    let rewind = Arc::new(RewindController::new(jobs.clone(), rewind_store));
    let multipart = Arc::new(MultipartBroker::new(multipart_store));

    mf_server::AppState::new(
        jobs,
        sessions,
        files,
        dispatcher,
        rewind,
        store,
        multipart,
        Arc::new(InsecureTestVerifier),
        Some(SECRET.to_string()),
        "test-commit".to_string(),
        "test-build-time".to_string(),
    )
}

async fn json_body(res: axum::response::Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn authed_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("authorization", "Bearer test-subject-1")
        .header("x-mediaforge-edge-secret", SECRET)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn missing_edge_secret_is_rejected_fail_closed() {
    let router = mf_server::build_router(test_state());

    let res = router
        .oneshot(Request::builder().method("GET").uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unconfigured_edge_secret_rejects_every_request() {
    let mut state = test_state();
    state.shared_secret = None;
    let router = mf_server::build_router(state);

    let res = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/health")
                .header("x-mediaforge-edge-secret", SECRET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn health_check_succeeds_with_edge_secret() {
    let router = mf_server::build_router(test_state());

    let res = router
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/health")
                .header("x-mediaforge-edge-secret", SECRET)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn triage_init_then_results_round_trips_through_the_registry() {
    let router = mf_server::build_router(test_state());
    let session_id = uuid::Uuid::new_v4().to_string();

    let init_res = router
        .clone()
        .oneshot(authed_request(
            "POST",
            "/api/triage/init",
            json!({ "sessionId": session_id, "expectedFileCount": 2 }),
        ))
        .await
        .unwrap();
    assert_eq!(init_res.status(), StatusCode::ACCEPTED);
    let init_body = json_body(init_res).await;
    let job_id = init_body["id"].as_str().unwrap().to_string();

    let results_res = router
        .oneshot(authed_request(
            "GET",
            &format!("/api/triage/{job_id}/results?sessionId={session_id}"),
            Value::Null,
        ))
        .await
        .unwrap();
    assert_eq!(results_res.status(), StatusCode::OK);
    let results_body = json_body(results_res).await;
    assert_eq!(results_body["id"], job_id);
    assert_eq!(results_body["files"], json!([]));
}

#[tokio::test]
async fn triage_init_with_zero_expected_files_is_rejected() {
    let router = mf_server::build_router(test_state());
    let session_id = uuid::Uuid::new_v4().to_string();

    let res = router
        .oneshot(authed_request(
            "POST",
            "/api/triage/init",
            json!({ "sessionId": session_id, "expectedFileCount": 0 }),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn a_session_bound_to_one_subject_rejects_a_different_subject() {
    let router = mf_server::build_router(test_state());
    let session_id = uuid::Uuid::new_v4().to_string();

    let first = router
        .clone()
        .oneshot(authed_request(
            "POST",
            "/api/triage/init",
            json!({ "sessionId": session_id, "expectedFileCount": 1 }),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::ACCEPTED);

    let other_subject = Request::builder()
        .method("POST")
        .uri("/api/triage/init")
        .header("content-type", "application/json")
        .header("authorization", "Bearer a-different-subject")
        .header("x-mediaforge-edge-secret", SECRET)
        .body(Body::from(json!({ "sessionId": session_id, "expectedFileCount": 1 }).to_string()))
        .unwrap();

    let second = router.oneshot(other_subject).await.unwrap();
    assert_eq!(second.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn download_start_rejects_empty_key_list() {
    let router = mf_server::build_router(test_state());
    let session_id = uuid::Uuid::new_v4().to_string();

    let res = router
        .oneshot(authed_request(
            "POST",
            "/api/download/start",
            json!({ "sessionId": session_id, "label": "trip", "keys": [] }),
        ))
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
