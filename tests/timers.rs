use std::time::Duration;

use campus_relay::app::{spawn_heartbeat, AppState};
use campus_relay::collision::MapRegistry;
use campus_relay::constants::{RECONNECT_GRACE_MS, SLOWDOWN_MS};
use campus_relay::registry::OutboundMessage;
use campus_relay::relay::{RelayOptions, RelayState, HEARTBEAT_CLOSE_CODE};
use serde_json::Value;
use tokio::sync::mpsc;

fn app(options: RelayOptions) -> AppState {
    let maps = MapRegistry::builtin().expect("builtin maps should load");
    AppState::new(RelayState::new(maps, options))
}

fn seeded() -> RelayOptions {
    RelayOptions {
        seed: Some(5),
        ..RelayOptions::default()
    }
}

async fn connect(app: &AppState) -> (String, mpsc::Receiver<OutboundMessage>) {
    let (tx, rx) = mpsc::channel(4096);
    let conn = app
        .with_relay(|state, now_ms| state.open_connection(tx, now_ms))
        .await;
    (conn, rx)
}

async fn send(app: &AppState, conn: &str, raw: &str) {
    app.with_relay(|state, now_ms| state.handle_text(conn, raw, now_ms))
        .await;
}

fn drain(rx: &mut mpsc::Receiver<OutboundMessage>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(message) = rx.try_recv() {
        if let OutboundMessage::Text(payload) = message {
            out.push(serde_json::from_str(&payload).expect("outbound payload is json"));
        }
    }
    out
}

fn count_command(messages: &[Value], command: &str) -> usize {
    messages
        .iter()
        .filter(|m| m["type"] == "zombie_game_command" && m["command"] == command)
        .count()
}

#[tokio::test(start_paused = true)]
async fn player_times_out_once_after_grace_window() {
    let app = app(seeded());
    let (alice, _alice_rx) = connect(&app).await;
    let (_watcher, mut watcher_rx) = connect(&app).await;
    send(&app, &alice, r#"{"type":"join","id":"alice"}"#).await;
    app.with_relay(|state, _| state.disconnect(&alice)).await;

    tokio::time::sleep(Duration::from_millis(RECONNECT_GRACE_MS - 100)).await;
    assert!(app.relay.lock().await.store().get("alice").is_some());

    tokio::time::sleep(Duration::from_millis(RECONNECT_GRACE_MS)).await;
    assert!(app.relay.lock().await.store().get("alice").is_none());
    let timeouts = drain(&mut watcher_rx)
        .into_iter()
        .filter(|m| m["type"] == "player_timeout" && m["id"] == "alice")
        .count();
    assert_eq!(timeouts, 1);
}

#[tokio::test(start_paused = true)]
async fn rejoin_inside_grace_window_cancels_timeout() {
    let app = app(seeded());
    let (first, _first_rx) = connect(&app).await;
    let (_watcher, mut watcher_rx) = connect(&app).await;
    send(
        &app,
        &first,
        r#"{"type":"update","id":"alice","x":12,"y":8,"map":"cafeteria"}"#,
    )
    .await;
    app.with_relay(|state, _| state.disconnect(&first)).await;

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    let (second, _second_rx) = connect(&app).await;
    send(&app, &second, r#"{"type":"join","id":"alice"}"#).await;

    tokio::time::sleep(Duration::from_millis(RECONNECT_GRACE_MS * 2)).await;
    let guard = app.relay.lock().await;
    let alice = guard.store().get("alice").expect("alice kept");
    assert!(alice.connected);
    assert_eq!((alice.x, alice.y), (12, 8));
    drop(guard);
    assert!(drain(&mut watcher_rx)
        .iter()
        .all(|m| m["type"] != "player_timeout"));
}

#[tokio::test(start_paused = true)]
async fn overlapping_slowdowns_restore_once_to_baseline() {
    let app = app(seeded());
    let (conn, mut rx) = connect(&app).await;
    send(
        &app,
        &conn,
        r#"{"type":"update","id":"alice","x":12,"y":8,"map":"cafeteria"}"#,
    )
    .await;
    send(
        &app,
        &conn,
        r#"{"type":"zombie_game_update","id":"alice","action":"start","difficulty":2,"map":"cafeteria"}"#,
    )
    .await;

    let food = r#"{"type":"zombie_game_food","id":"alice","player":"alice","x":12,"y":8,"score":1}"#;
    send(&app, &conn, food).await;
    tokio::time::sleep(Duration::from_millis(2_000)).await;
    send(&app, &conn, food).await;

    tokio::time::sleep(Duration::from_millis(SLOWDOWN_MS - 1_000)).await;
    let messages = drain(&mut rx);
    assert_eq!(count_command(&messages, "zombie_slowed"), 2);
    assert_eq!(count_command(&messages, "zombie_speed_normal"), 0);
    let status = app
        .relay
        .lock()
        .await
        .session_status(Some("cafeteria"))
        .expect("cafeteria exists");
    assert!(status.slowed);
    assert_eq!(status.tick_ms, 1_200);

    tokio::time::sleep(Duration::from_millis(2_000)).await;
    let messages = drain(&mut rx);
    assert_eq!(count_command(&messages, "zombie_speed_normal"), 1);
    let status = app
        .relay
        .lock()
        .await
        .session_status(Some("cafeteria"))
        .expect("cafeteria exists");
    assert!(!status.slowed);
    assert_eq!(status.tick_ms, 600);
}

#[tokio::test(start_paused = true)]
async fn ticker_reports_agents_until_stopped() {
    let app = app(seeded());
    let (conn, mut rx) = connect(&app).await;
    send(
        &app,
        &conn,
        r#"{"type":"zombie_game_update","id":"host","action":"start","map":"library"}"#,
    )
    .await;
    tokio::time::sleep(Duration::from_millis(800 * 3 + 100)).await;
    let positions = drain(&mut rx)
        .into_iter()
        .filter(|m| m["type"] == "zombie_position")
        .count();
    // Two agents announced at start, then two per tick.
    assert_eq!(positions, 2 + 2 * 3);

    send(
        &app,
        &conn,
        r#"{"type":"zombie_game_update","id":"host","action":"stop","map":"library"}"#,
    )
    .await;
    let messages = drain(&mut rx);
    assert_eq!(count_command(&messages, "stop"), 1);

    tokio::time::sleep(Duration::from_millis(5_000)).await;
    assert!(drain(&mut rx)
        .iter()
        .all(|m| m["type"] != "zombie_position"));
}

#[tokio::test(start_paused = true)]
async fn heartbeat_pings_then_closes_silent_connections() {
    let app = app(RelayOptions {
        heartbeat_ms: 1_000,
        ..seeded()
    });
    spawn_heartbeat(app.clone());
    let (_conn, mut rx) = connect(&app).await;

    tokio::time::sleep(Duration::from_millis(2_100)).await;
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(frame);
    }
    assert_eq!(
        frames,
        vec![
            OutboundMessage::Ping,
            OutboundMessage::Close {
                code: HEARTBEAT_CLOSE_CODE,
                reason: "heartbeat timeout".to_string(),
            },
        ]
    );
    assert_eq!(app.relay.lock().await.connection_count(), 0);
}
