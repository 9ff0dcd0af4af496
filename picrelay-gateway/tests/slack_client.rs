//! Slack Web API client against a local mock of the API host.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde_json::{Value, json};

use picrelay_gateway::notifier::{Notifier, NotifyError, SlackClient};

struct MockSlack {
    base_url: String,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockSlack {
    fn record(&self, method: &str, body: Value) {
        self.calls
            .lock()
            .expect("calls lock")
            .push((method.to_string(), body));
    }

    fn calls(&self, method: &str) -> Vec<Value> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .filter(|(name, _)| name == method)
            .map(|(_, body)| body.clone())
            .collect()
    }
}

async fn post_message(State(mock): State<Arc<MockSlack>>, Json(body): Json<Value>) -> Json<Value> {
    mock.record("chat.postMessage", body.clone());
    if body["channel"] == "C404" {
        return Json(json!({"ok": false, "error": "channel_not_found"}));
    }
    Json(json!({"ok": true, "channel": body["channel"], "ts": "1700000000.000900"}))
}

async fn users_info(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    match query.get("user").map(String::as_str) {
        Some("U7") => Json(json!({
            "ok": true,
            "user": {"name": "ada", "profile": {"display_name": "Ada", "real_name": "Ada Lovelace"}}
        })),
        _ => Json(json!({"ok": false, "error": "user_not_found"})),
    }
}

async fn upload_url(
    State(mock): State<Arc<MockSlack>>,
    Form(form): Form<HashMap<String, String>>,
) -> Json<Value> {
    mock.record("files.getUploadURLExternal", json!(form));
    Json(json!({
        "ok": true,
        "upload_url": format!("{}/upload/F1", mock.base_url),
        "file_id": "F1"
    }))
}

async fn upload(State(mock): State<Arc<MockSlack>>, body: axum::body::Bytes) -> StatusCode {
    mock.record("upload", json!(body.len()));
    StatusCode::OK
}

async fn complete_upload(
    State(mock): State<Arc<MockSlack>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    mock.record("files.completeUploadExternal", body);
    Json(json!({"ok": true, "files": [{"id": "F1"}]}))
}

async fn private_file() -> Vec<u8> {
    vec![7, 8, 9]
}

async fn start_mock() -> (SlackClient, Arc<MockSlack>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let mock = Arc::new(MockSlack {
        base_url: base_url.clone(),
        calls: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/chat.postMessage", post(post_message))
        .route("/users.info", get(users_info))
        .route("/files.getUploadURLExternal", post(upload_url))
        .route("/upload/F1", post(upload))
        .route("/files.completeUploadExternal", post(complete_upload))
        .route("/files/ref.png", get(private_file))
        .with_state(Arc::clone(&mock));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = SlackClient::new("xoxb-test")
        .unwrap()
        .with_base_url(format!("{}/", base_url));
    (client, mock)
}

#[tokio::test]
async fn post_message_returns_thread_handle() {
    let (client, mock) = start_mock().await;

    let message = client
        .post_message("C42", "hello", Some("1700000000.000100"))
        .await
        .unwrap();

    assert_eq!(message.channel_id, "C42");
    assert_eq!(message.ts, "1700000000.000900");
    let sent = mock.calls("chat.postMessage");
    assert_eq!(sent[0]["thread_ts"], "1700000000.000100");
    assert_eq!(sent[0]["text"], "hello");
}

#[tokio::test]
async fn api_error_is_surfaced() {
    let (client, _mock) = start_mock().await;

    let err = client.post_message("C404", "hello", None).await.unwrap_err();

    assert!(matches!(err, NotifyError::Api { .. }));
    assert!(err.to_string().contains("channel_not_found"));
}

#[tokio::test]
async fn display_name_prefers_profile() {
    let (client, _mock) = start_mock().await;

    assert_eq!(client.lookup_display_name("U7").await.unwrap(), "Ada");
    assert!(client.lookup_display_name("U0").await.is_err());
}

#[tokio::test]
async fn file_upload_runs_three_steps() {
    let (client, mock) = start_mock().await;

    client
        .post_file(
            "C42",
            vec![1, 2, 3, 4],
            "picrelay-1234.png",
            "Here you go",
            Some("1700000000.000100"),
        )
        .await
        .unwrap();

    let requested = mock.calls("files.getUploadURLExternal");
    assert_eq!(requested[0]["filename"], "picrelay-1234.png");
    assert_eq!(requested[0]["length"], "4");
    assert_eq!(mock.calls("upload"), vec![json!(4)]);

    let completed = mock.calls("files.completeUploadExternal");
    assert_eq!(completed[0]["channel_id"], "C42");
    assert_eq!(completed[0]["files"][0]["id"], "F1");
    assert_eq!(completed[0]["thread_ts"], "1700000000.000100");
}

#[tokio::test]
async fn private_download_reports_missing_files() {
    let (client, mock) = start_mock().await;

    let bytes = client
        .download_file(&format!("{}/files/ref.png", mock.base_url))
        .await
        .unwrap();
    assert_eq!(bytes, vec![7, 8, 9]);

    let err = client
        .download_file(&format!("{}/files/gone.png", mock.base_url))
        .await
        .unwrap_err();
    assert!(matches!(err, NotifyError::Status { status: 404, .. }));
}
