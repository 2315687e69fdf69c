use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Form, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex};

use super::*;

async fn spawn_server(app: Router) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn backend_for(url: &str) -> HttpRenderBackend {
    HttpRenderBackend::new(url, Duration::from_secs(5)).expect("backend")
}

fn test_params() -> RenderParameters {
    [
        ("fgColor", "#ffffffff"),
        ("bgColor", "#000000ff"),
        ("frames", "60"),
    ]
    .into_iter()
    .collect()
}

#[derive(Clone)]
struct CaptureState {
    tx: Arc<Mutex<Option<oneshot::Sender<HashMap<String, String>>>>>,
}

async fn handle_submit(
    State(state): State<CaptureState>,
    Form(fields): Form<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    if let Some(tx) = state.tx.lock().await.take() {
        let _ = tx.send(fields);
    }
    Json(serde_json::json!({
        "jobID": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
        "status": "Job started"
    }))
}

#[tokio::test]
async fn submit_posts_form_fields_and_decodes_the_job_id() {
    let (tx, rx) = oneshot::channel();
    let state = CaptureState {
        tx: Arc::new(Mutex::new(Some(tx))),
    };
    let app = Router::new()
        .route("/lissajous", post(handle_submit))
        .with_state(state);
    let url = spawn_server(app).await;

    let job_id = backend_for(&url)
        .submit_job(&test_params())
        .await
        .expect("submit");
    assert_eq!(job_id, JobId::from("7c9e6679-7425-40de-944b-e07fc1f90ae7"));

    let fields = rx.await.expect("captured form");
    assert_eq!(fields.get("fgColor").map(String::as_str), Some("#ffffffff"));
    assert_eq!(fields.get("bgColor").map(String::as_str), Some("#000000ff"));
    assert_eq!(fields.get("frames").map(String::as_str), Some("60"));
}

#[tokio::test]
async fn submit_response_without_job_id_is_a_protocol_error() {
    let app = Router::new().route(
        "/lissajous",
        post(|| async { Json(serde_json::json!({"status": "accepted"})) }),
    );
    let url = spawn_server(app).await;

    let err = backend_for(&url)
        .submit_job(&test_params())
        .await
        .expect_err("missing job id");
    assert!(matches!(err, TransportError::Protocol(_)));
}

#[tokio::test]
async fn submit_non_success_is_a_status_error() {
    let app = Router::new().route(
        "/lissajous",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "ffmpeg is not available") }),
    );
    let url = spawn_server(app).await;

    let err = backend_for(&url)
        .submit_job(&test_params())
        .await
        .expect_err("server error");
    match err {
        TransportError::Status { status, detail } => {
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(detail, "ffmpeg is not available");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn fetch_status_decodes_the_json_payload() {
    let app = Router::new().route(
        "/lissajous/status/:id",
        get(|Path(id): Path<String>| async move {
            assert_eq!(id, "job-1");
            Json(serde_json::json!({"status": "pending"}))
        }),
    );
    let url = spawn_server(app).await;

    let payload = backend_for(&url)
        .fetch_status(&JobId::from("job-1"))
        .await
        .expect("status");
    assert_eq!(payload.status, shared::domain::JobState::Pending);
    assert!(payload.message.is_none());
}

#[tokio::test]
async fn fetch_status_rejects_non_json_content_types() {
    let app = Router::new().route(
        "/lissajous/status/:id",
        get(|| async { ([(header::CONTENT_TYPE, "text/html")], "<html>busy</html>") }),
    );
    let url = spawn_server(app).await;

    let err = backend_for(&url)
        .fetch_status(&JobId::from("job-1"))
        .await
        .expect_err("html response");
    match err {
        TransportError::Protocol(detail) => assert!(detail.contains("text/html")),
        other => panic!("expected protocol error, got {other:?}"),
    }
}

#[tokio::test]
async fn fetch_status_surfaces_non_success_as_status_error() {
    let app = Router::new().route(
        "/lissajous/status/:id",
        get(|| async { (StatusCode::NOT_FOUND, "Job not found") }),
    );
    let url = spawn_server(app).await;

    let err = backend_for(&url)
        .fetch_status(&JobId::from("gone"))
        .await
        .expect_err("missing job");
    assert!(matches!(
        err,
        TransportError::Status {
            status: StatusCode::NOT_FOUND,
            ..
        }
    ));
}

#[tokio::test]
async fn fetch_artifact_returns_bytes_and_content_type() {
    let app = Router::new().route(
        "/lissajous/result",
        get(|Query(query): Query<HashMap<String, String>>| async move {
            assert_eq!(query.get("id").map(String::as_str), Some("job-9"));
            (
                [(header::CONTENT_TYPE, "image/webp")],
                b"RIFF....WEBP".to_vec(),
            )
                .into_response()
        }),
    );
    let url = spawn_server(app).await;

    let artifact = backend_for(&url)
        .fetch_artifact(&JobId::from("job-9"))
        .await
        .expect("artifact");
    assert_eq!(artifact.bytes, b"RIFF....WEBP");
    assert_eq!(artifact.content_type, "image/webp");
}

#[tokio::test]
async fn fetch_artifact_non_success_is_a_status_error() {
    let app = Router::new().route(
        "/lissajous/result",
        get(|| async { (StatusCode::BAD_REQUEST, "Job is not complete yet") }),
    );
    let url = spawn_server(app).await;

    let err = backend_for(&url)
        .fetch_artifact(&JobId::from("job-9"))
        .await
        .expect_err("incomplete job");
    assert!(matches!(
        err,
        TransportError::Status {
            status: StatusCode::BAD_REQUEST,
            ..
        }
    ));
}

#[tokio::test]
async fn render_sync_sends_params_as_query_and_returns_bytes() {
    let app = Router::new().route(
        "/lissajous",
        get(|Query(query): Query<HashMap<String, String>>| async move {
            assert_eq!(query.get("frames").map(String::as_str), Some("60"));
            ([(header::CONTENT_TYPE, "image/gif")], b"GIF89a".to_vec()).into_response()
        }),
    );
    let url = spawn_server(app).await;

    let artifact = backend_for(&url)
        .render_sync(&test_params())
        .await
        .expect("sync render");
    assert_eq!(artifact.bytes, b"GIF89a");
    assert_eq!(artifact.content_type, "image/gif");
}

#[tokio::test]
async fn render_sync_non_success_is_a_status_error() {
    let app = Router::new().route(
        "/lissajous",
        get(|| async { (StatusCode::METHOD_NOT_ALLOWED, "POST only") }),
    );
    let url = spawn_server(app).await;

    let err = backend_for(&url)
        .render_sync(&test_params())
        .await
        .expect_err("rejected render");
    assert!(matches!(err, TransportError::Status { .. }));
}

#[tokio::test]
async fn base_urls_with_trailing_slash_resolve_the_same_endpoints() {
    let app = Router::new().route(
        "/lissajous/status/:id",
        get(|| async { Json(serde_json::json!({"status": "pending"})) }),
    );
    let url = spawn_server(app).await;

    let payload = backend_for(&format!("{url}/"))
        .fetch_status(&JobId::from("job-1"))
        .await
        .expect("status via trailing-slash base");
    assert_eq!(payload.status, shared::domain::JobState::Pending);
}

#[test]
fn rejects_unparseable_server_urls() {
    let err = HttpRenderBackend::new("not a url", Duration::from_secs(1))
        .expect_err("invalid url");
    assert!(matches!(err, HttpBackendError::InvalidUrl { .. }));
}

#[test]
fn rejects_urls_that_cannot_carry_paths() {
    let err = HttpRenderBackend::new("data:text/plain,hi", Duration::from_secs(1))
        .expect_err("opaque url");
    assert!(matches!(err, HttpBackendError::NotABaseUrl(_)));
}
