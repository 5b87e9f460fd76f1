use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;

use crate::error::RelayError;
use crate::registry::{OutboundMessage, OUTBOUND_QUEUE_CAPACITY};
use crate::relay::{RelayState, TimerRequest};
use crate::store::ExpiryTicket;
use crate::session::SlowdownTicket;
use crate::types::{Difficulty, SessionStatus};

pub type SharedState = Arc<Mutex<RelayState>>;

#[derive(Clone)]
pub struct AppState {
    pub relay: SharedState,
    epoch: Instant,
}

impl AppState {
    pub fn new(relay: RelayState) -> Self {
        Self {
            relay: Arc::new(Mutex::new(relay)),
            epoch: Instant::now(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    pub async fn with_relay<T>(&self, f: impl FnOnce(&mut RelayState, u64) -> T) -> T {
        let mut guard = self.relay.lock().await;
        let result = f(&mut *guard, self.now_ms());
        let timers = guard.take_timers();
        drop(guard);
        schedule(self, timers);
        result
    }
}

#[derive(Debug, Deserialize)]
struct MapQuery {
    map: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StartQuery {
    difficulty: Option<i64>,
    map: Option<String>,
}

pub fn build_router(app: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/ws", get(ws_handler))
        .route("/api/zombie/state", get(session_state))
        .route("/api/zombie/start", post(session_start))
        .route("/api/zombie/stop", post(session_stop))
        .with_state(app)
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn session_state(State(app): State<AppState>, Query(query): Query<MapQuery>) -> Response {
    let result = app.relay.lock().await.session_status(query.map.as_deref());
    status_response(result)
}

async fn session_start(State(app): State<AppState>, Query(query): Query<StartQuery>) -> Response {
    let difficulty = Difficulty::from_level(query.difficulty.unwrap_or(1));
    let result = app
        .with_relay(|state, _| state.start_session(query.map.as_deref(), difficulty))
        .await;
    status_response(result)
}

async fn session_stop(State(app): State<AppState>, Query(query): Query<MapQuery>) -> Response {
    let result = app
        .with_relay(|state, _| state.stop_session(query.map.as_deref()))
        .await;
    status_response(result)
}

fn status_response(result: Result<SessionStatus, RelayError>) -> Response {
    match result {
        Ok(status) => Json(status).into_response(),
        Err(err) => {
            let code = match err {
                RelayError::UnknownMap(_) => StatusCode::NOT_FOUND,
                _ => StatusCode::BAD_REQUEST,
            };
            (code, Json(json!({ "error": err.to_string() }))).into_response()
        }
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(app): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(app, socket))
}

async fn handle_socket(app: AppState, socket: WebSocket) {
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(OUTBOUND_QUEUE_CAPACITY);
    let conn_id = app
        .with_relay(|state, now_ms| state.open_connection(tx, now_ms))
        .await;

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let should_close = matches!(outbound, OutboundMessage::Close { .. });
            let result = match outbound {
                OutboundMessage::Text(payload) => {
                    ws_sender.send(Message::Text(payload.into())).await
                }
                OutboundMessage::Ping => ws_sender.send(Message::Ping(Bytes::new())).await,
                OutboundMessage::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    ws_sender.send(Message::Close(Some(frame))).await
                }
            };
            if result.is_err() || should_close {
                break;
            }
        }
    });

    let mut writer_done = false;
    loop {
        tokio::select! {
            received = ws_receiver.next() => {
                let Some(Ok(message)) = received else {
                    break;
                };
                match message {
                    Message::Text(raw) => {
                        let raw = raw.to_string();
                        app.with_relay(|state, now_ms| state.handle_text(&conn_id, &raw, now_ms))
                            .await;
                    }
                    Message::Binary(raw) => match String::from_utf8(raw.to_vec()) {
                        Ok(text) => {
                            app.with_relay(|state, now_ms| state.handle_text(&conn_id, &text, now_ms))
                                .await;
                        }
                        Err(_) => warn!("dropping non-utf8 frame from {conn_id}"),
                    },
                    Message::Close(_) => break,
                    Message::Ping(_) | Message::Pong(_) => {
                        app.with_relay(|state, now_ms| state.touch(&conn_id, now_ms))
                            .await;
                    }
                }
            }
            _ = &mut writer => {
                writer_done = true;
                break;
            }
        }
    }

    app.with_relay(|state, _| state.disconnect(&conn_id)).await;
    if !writer_done {
        let _ = writer.await;
    }
}

pub fn schedule(app: &AppState, timers: Vec<TimerRequest>) {
    for timer in timers {
        match timer {
            TimerRequest::Expire { ticket, after_ms } => {
                spawn_expiry(app.clone(), ticket, after_ms);
            }
            TimerRequest::RunSession { map, generation } => {
                spawn_session_ticker(app.clone(), map, generation);
            }
            TimerRequest::RestoreSpeed { ticket, after_ms } => {
                spawn_speed_restore(app.clone(), ticket, after_ms);
            }
        }
    }
}

fn spawn_expiry(app: AppState, ticket: ExpiryTicket, after_ms: u64) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(after_ms)).await;
        app.with_relay(|state, _| state.expire(&ticket)).await;
    });
}

fn spawn_speed_restore(app: AppState, ticket: SlowdownTicket, after_ms: u64) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(after_ms)).await;
        app.with_relay(|state, _| state.restore_speed(&ticket)).await;
    });
}

// Interval is re-read every tick so a slowdown applies without a restart.
fn spawn_session_ticker(app: AppState, map: String, generation: u64) {
    tokio::spawn(async move {
        let first = app.relay.lock().await.session_interval(&map, generation);
        let Some(mut interval_ms) = first else {
            return;
        };
        loop {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
            let next = app
                .with_relay(|state, now_ms| state.tick_session(&map, generation, now_ms))
                .await;
            match next {
                Some(ms) => interval_ms = ms,
                None => break,
            }
        }
        debug!("ticker for {map} generation {generation} exited");
    });
}

pub fn spawn_heartbeat(app: AppState) {
    tokio::spawn(async move {
        let heartbeat_ms = app.relay.lock().await.options().heartbeat_ms;
        let mut interval = tokio::time::interval(Duration::from_millis(heartbeat_ms));
        interval.tick().await;
        loop {
            interval.tick().await;
            app.with_relay(|state, now_ms| state.sweep_heartbeat(now_ms))
                .await;
        }
    });
}
