//! Integration tests for the command server.
//!
//! Each test spins up an Axum server on a random port backed by a real tab
//! host and libSQL store, with wiremock standing in for the completion
//! endpoint, and drives it over HTTP and WebSocket.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use wiremock::{Mock, MockServer, ResponseTemplate, matchers};

use page_assist::llm::ResponsesClient;
use page_assist::orchestrator::Orchestrator;
use page_assist::page::TabHost;
use page_assist::server::routes;
use page_assist::store::LibSqlBackend;

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

const GRANT_PAGE: &str = "<html><head><title>Grant Info</title></head><body>\
    <p>Deadline: June 1.</p><style>p { margin: 0 }</style><p>Must submit form A.</p>\
    </body></html>";

struct TestServer {
    port: u16,
    tabs: Arc<TabHost>,
    llm: MockServer,
    http: reqwest::Client,
}

impl TestServer {
    async fn command(&self, body: Value) -> Value {
        self.http
            .post(format!("http://127.0.0.1:{}/api/command", self.port))
            .json(&body)
            .send()
            .await
            .expect("command request failed")
            .json()
            .await
            .expect("command response was not JSON")
    }
}

/// Start the server on a random port with a mocked completion endpoint.
async fn start_server() -> TestServer {
    let llm = MockServer::start().await;
    let client = Arc::new(ResponsesClient::new(
        &format!("{}/v1/responses", llm.uri()),
        "gpt-4.1-mini",
    ));
    let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let tabs = TabHost::new();
    let orchestrator = Arc::new(Orchestrator::new(tabs.clone(), client, store));
    let app = routes(orchestrator, tabs.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Give the server a moment to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        port,
        tabs,
        llm,
        http: reqwest::Client::new(),
    }
}

async fn mock_answer(server: &MockServer, text: &str) {
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/v1/responses"))
        .and(matchers::header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "output": [{"type": "message", "content": [{"type": "output_text", "text": text}]}]
        })))
        .mount(server)
        .await;
}

/// Parse a WS text frame into a serde_json::Value.
fn parse_ws_json(msg: &Message) -> Value {
    match msg {
        Message::Text(txt) => serde_json::from_str(txt).expect("invalid JSON from server"),
        other => panic!("expected Text frame, got {:?}", other),
    }
}

// ── HTTP Tests ───────────────────────────────────────────────────────

#[tokio::test]
async fn run_without_key_reports_missing_key() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        server
            .tabs
            .open("https://apply.example.org/grants", GRANT_PAGE, true)
            .await;

        let resp = server.command(json!({"type": "RUN", "mode": "dates"})).await;
        assert_eq!(resp, json!({"ok": false, "error": "Missing API key"}));

        // Nothing reached the model and no extractor was injected.
        assert!(server.llm.received_requests().await.unwrap().is_empty());
        assert!(!server.tabs.list().await[0].extractor_loaded);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn dates_run_end_to_end() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        mock_answer(&server.llm, "- Deadline: June 1").await;
        server
            .tabs
            .open("https://apply.example.org/grants", GRANT_PAGE, true)
            .await;

        let saved = server
            .command(json!({"type": "SAVE_KEY", "apiKey": "sk-test"}))
            .await;
        assert_eq!(saved, json!({"ok": true}));

        let resp = server.command(json!({"type": "RUN", "mode": "dates"})).await;
        assert_eq!(
            resp,
            json!({
                "ok": true,
                "domain": "example.org",
                "result": "- Deadline: June 1",
                "title": "Grant Info",
                "url": "https://apply.example.org/grants"
            })
        );

        let requests = server.llm.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["model"], "gpt-4.1-mini");
        let prompt = body["input"].as_str().unwrap();
        assert!(prompt.contains("Extract any dates, deadlines, timelines"));
        assert!(prompt.contains("Deadline: June 1. Must submit form A."));
        assert!(!prompt.contains("margin"));

        let history = server
            .command(json!({"type": "GET_HISTORY", "domain": "example.org"}))
            .await;
        let entries = history["history"].as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["mode"], "dates");
        assert_eq!(entries[0]["output"], "- Deadline: June 1");
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn remote_error_is_surfaced_with_status() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("server error"))
            .mount(&server.llm)
            .await;
        server
            .tabs
            .open("https://apply.example.org/grants", GRANT_PAGE, true)
            .await;
        server
            .command(json!({"type": "SAVE_KEY", "apiKey": "sk-test"}))
            .await;

        let resp = server.command(json!({"type": "RUN", "mode": "dates"})).await;
        assert_eq!(resp["ok"], false);
        let error = resp["error"].as_str().unwrap();
        assert!(error.contains("500"), "got: {error}");
        assert!(error.contains("server error"), "got: {error}");

        let history = server
            .command(json!({"type": "GET_HISTORY", "domain": "example.org"}))
            .await;
        assert_eq!(history, json!({"ok": true, "history": []}));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn no_active_tab_after_close() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let id = server
            .tabs
            .open("https://apply.example.org/grants", GRANT_PAGE, true)
            .await;
        server
            .command(json!({"type": "SAVE_KEY", "apiKey": "sk-test"}))
            .await;

        let status = server
            .http
            .delete(format!("http://127.0.0.1:{}/api/tabs/{id}", server.port))
            .send()
            .await
            .unwrap()
            .status();
        assert_eq!(status, reqwest::StatusCode::OK);

        let resp = server.command(json!({"type": "RUN"})).await;
        assert_eq!(resp, json!({"ok": false, "error": "No active tab"}));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn restricted_page_cannot_be_read() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        server
            .tabs
            .open("chrome://extensions", "<p>internal</p>", true)
            .await;
        server
            .command(json!({"type": "SAVE_KEY", "apiKey": "sk-test"}))
            .await;

        let resp = server.command(json!({"type": "RUN"})).await;
        assert_eq!(resp, json!({"ok": false, "error": "Could not read page"}));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn unknown_command_over_http() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let resp = server.command(json!({"type": "REFRESH"})).await;
        assert_eq!(resp, json!({"ok": false, "error": "Unknown message"}));
    })
    .await
    .expect("test timed out");
}

// ── WebSocket Tests ──────────────────────────────────────────────────

#[tokio::test]
async fn ws_replies_carry_request_ids() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        mock_answer(&server.llm, "- Deadline: June 1").await;
        server
            .tabs
            .open("https://apply.example.org/grants", GRANT_PAGE, true)
            .await;

        let (mut ws, _resp) = connect_async(format!("ws://127.0.0.1:{}/ws", server.port))
            .await
            .expect("WS connect failed");

        ws.send(Message::Text(
            json!({"id": "k1", "type": "SAVE_KEY", "apiKey": "sk-test"})
                .to_string()
                .into(),
        ))
        .await
        .unwrap();
        let reply = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(reply, json!({"id": "k1", "ok": true}));

        ws.send(Message::Text(
            json!({"id": 2, "type": "RUN", "mode": "dates"})
                .to_string()
                .into(),
        ))
        .await
        .unwrap();
        ws.send(Message::Text(
            json!({"id": 3, "type": "NOPE"}).to_string().into(),
        ))
        .await
        .unwrap();

        // Frames are handled concurrently, so replies may arrive in any order.
        let mut replies = Vec::new();
        for _ in 0..2 {
            replies.push(parse_ws_json(&ws.next().await.unwrap().unwrap()));
        }
        replies.sort_by_key(|r| r["id"].as_i64());

        assert_eq!(replies[0]["id"], 2);
        assert_eq!(replies[0]["ok"], true);
        assert_eq!(replies[0]["domain"], "example.org");
        assert_eq!(replies[0]["result"], "- Deadline: June 1");

        assert_eq!(
            replies[1],
            json!({"id": 3, "ok": false, "error": "Unknown message"})
        );
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn ws_non_json_frame_is_unknown_message() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let (mut ws, _resp) = connect_async(format!("ws://127.0.0.1:{}/ws", server.port))
            .await
            .expect("WS connect failed");

        ws.send(Message::Text("hello?".into())).await.unwrap();
        let reply = parse_ws_json(&ws.next().await.unwrap().unwrap());
        assert_eq!(reply, json!({"ok": false, "error": "Unknown message"}));
    })
    .await
    .expect("test timed out");
}

// ── Tab Tests ────────────────────────────────────────────────────────

#[tokio::test]
async fn tabs_can_be_opened_over_http() {
    timeout(TEST_TIMEOUT, async {
        let server = start_server().await;
        let base = format!("http://127.0.0.1:{}", server.port);

        let resp: Value = server
            .http
            .post(format!("{base}/api/tabs"))
            .json(&json!({"url": "https://www.example.com/", "html": "<p>hi</p>", "activate": true}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(resp["ok"], true);

        let listed: Value = server
            .http
            .get(format!("{base}/api/tabs"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let tabs = listed["tabs"].as_array().unwrap();
        assert_eq!(tabs.len(), 1);
        assert_eq!(tabs[0]["id"], resp["id"]);
        assert_eq!(tabs[0]["active"], true);
    })
    .await
    .expect("test timed out");
}
