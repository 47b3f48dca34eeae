//! HTTP + WebSocket command server.
//!
//! `POST /api/command` answers one command per request. `/ws` accepts many
//! commands on one socket; each frame may carry an `id`, echoed back on its
//! response so callers can match answers to requests. Frames are handled
//! concurrently, so a slow RUN does not hold up a GET_HISTORY behind it.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{CommandError, PageError};
use crate::orchestrator::{CommandResponse, Orchestrator};
use crate::page::TabHost;

/// Outgoing frames buffered per WebSocket client.
const WS_OUTBOX_CAPACITY: usize = 64;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub tabs: Arc<TabHost>,
}

/// Build the Axum router with command, WebSocket, and tab routes.
pub fn routes(orchestrator: Arc<Orchestrator>, tabs: Arc<TabHost>) -> Router {
    let state = AppState { orchestrator, tabs };

    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .route("/api/command", post(command))
        .route("/api/history", get(list_history_domains))
        .route("/api/tabs", get(list_tabs).post(open_tab))
        .route("/api/tabs/{id}", delete(close_tab))
        .route("/api/tabs/{id}/activate", post(activate_tab))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "page-assist"
    }))
}

// ── Commands ────────────────────────────────────────────────────────────

/// Decode a frame or body. Non-JSON input is answered like an unknown command.
fn decode(raw: &[u8]) -> Result<Value, CommandResponse> {
    serde_json::from_slice(raw).map_err(|_| CommandResponse::error(&CommandError::UnknownCommand))
}

async fn command(State(state): State<AppState>, body: Bytes) -> Json<CommandResponse> {
    let response = match decode(&body) {
        Ok(message) => state.orchestrator.handle(message).await,
        Err(resp) => resp,
    };
    Json(response)
}

async fn list_history_domains(State(state): State<AppState>) -> Response {
    match state.orchestrator.history().domains().await {
        Ok(domains) => Json(json!({ "ok": true, "domains": domains })).into_response(),
        Err(e) => {
            warn!(error = %e, "Listing history domains failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

// ── WebSocket ───────────────────────────────────────────────────────────

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket client connecting");
    ws.on_upgrade(|socket| handle_socket(socket, state.orchestrator))
}

async fn handle_socket(socket: WebSocket, orchestrator: Arc<Orchestrator>) {
    info!("WebSocket client connected");

    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(WS_OUTBOX_CAPACITY);

    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if sink.send(msg).await.is_err() {
                debug!("Client disconnected during send");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let orchestrator = Arc::clone(&orchestrator);
                let out_tx = out_tx.clone();
                tokio::spawn(async move {
                    let reply = answer_frame(&orchestrator, text.as_bytes()).await;
                    if out_tx.send(Message::Text(reply.to_string().into())).await.is_err() {
                        debug!("Socket closed before reply was sent");
                    }
                });
            }
            Ok(Message::Ping(data)) => {
                if out_tx.send(Message::Pong(data)).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => {
                info!("WebSocket client disconnected");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // In-flight command tasks hold sender clones; the writer drains their
    // replies (or fails to send them) and then exits.
    drop(out_tx);
    let _ = writer.await;
}

/// Run one frame and attach its `id`, if it had one.
async fn answer_frame(orchestrator: &Orchestrator, raw: &[u8]) -> Value {
    let (id, response) = match decode(raw) {
        Ok(message) => {
            let id = message.get("id").cloned();
            (id, orchestrator.handle(message).await)
        }
        Err(resp) => (None, resp),
    };

    let mut value = serde_json::to_value(&response).unwrap_or_else(|_| json!({ "ok": false }));
    if let (Some(id), Some(obj)) = (id, value.as_object_mut()) {
        obj.insert("id".to_string(), id);
    }
    value
}

// ── Tabs ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct OpenTabRequest {
    url: String,
    /// Page source. When absent the URL is fetched.
    html: Option<String>,
    #[serde(default)]
    activate: bool,
}

fn page_error(e: PageError) -> Response {
    let status = match e {
        PageError::TabNotFound { .. } => StatusCode::NOT_FOUND,
        PageError::Fetch { .. } => StatusCode::BAD_GATEWAY,
        PageError::InjectionRefused { .. } | PageError::Unreachable { .. } => {
            StatusCode::CONFLICT
        }
    };
    (status, Json(json!({ "ok": false, "error": e.to_string() }))).into_response()
}

async fn list_tabs(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "ok": true, "tabs": state.tabs.list().await }))
}

async fn open_tab(State(state): State<AppState>, Json(req): Json<OpenTabRequest>) -> Response {
    let opened = match req.html {
        Some(html) => Ok(state.tabs.open(&req.url, &html, req.activate).await),
        None => state.tabs.open_url(&req.url, req.activate).await,
    };

    match opened {
        Ok(id) => (StatusCode::CREATED, Json(json!({ "ok": true, "id": id }))).into_response(),
        Err(e) => page_error(e),
    }
}

async fn activate_tab(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.tabs.activate(id).await {
        Ok(()) => Json(json!({ "ok": true })).into_response(),
        Err(e) => page_error(e),
    }
}

async fn close_tab(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    match state.tabs.close(id).await {
        Ok(()) => Json(json!({ "ok": true })).into_response(),
        Err(e) => page_error(e),
    }
}
