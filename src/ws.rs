use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, info, warn};

use crate::config::GameSettings;
use crate::coordinator::SessionCoordinator;
use crate::server_protocol::parse_client_message;

const CLIENT_QUEUE_CAPACITY: usize = 256;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

struct ClientContext {
    tx: mpsc::Sender<String>,
    kick: Arc<Notify>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

struct ServerState {
    clients: HashMap<String, ClientContext>,
    coordinator: SessionCoordinator,
}

/// Shared handle passed to every axum handler and to the timer driver.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Mutex<ServerState>>,
    timer_wake: Arc<Notify>,
    clock: Instant,
}

impl AppState {
    pub fn new(settings: GameSettings) -> Self {
        Self::with_coordinator(SessionCoordinator::new(settings))
    }

    pub fn with_coordinator(coordinator: SessionCoordinator) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ServerState {
                clients: HashMap::new(),
                coordinator,
            })),
            timer_wake: Arc::new(Notify::new()),
            clock: Instant::now(),
        }
    }

    /// Milliseconds since the server started; the time base of every room timer.
    fn now_ms(&self) -> u64 {
        self.clock.elapsed().as_millis() as u64
    }
}

pub fn app(state: AppState, static_dir: Option<PathBuf>) -> Router {
    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/ws", get(ws_handler))
        .with_state(state);

    match static_dir {
        Some(static_dir) => {
            let index_file = static_dir.join("index.html");
            app.fallback_service(
                ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)),
            )
        }
        None => app,
    }
}

/// Sleeps until the earliest room deadline, fires everything due, and flushes
/// the resulting events. Inbound messages wake it so a newly scheduled, earlier
/// deadline is picked up.
pub fn start_timer_loop(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let deadline = {
                let guard = state.inner.lock().await;
                guard.coordinator.next_deadline()
            };
            match deadline {
                Some(due_ms) => {
                    let wake_at = state.clock + Duration::from_millis(due_ms);
                    tokio::select! {
                        _ = tokio::time::sleep_until(wake_at) => {}
                        _ = state.timer_wake.notified() => continue,
                    }
                }
                None => {
                    state.timer_wake.notified().await;
                    continue;
                }
            }

            let mut guard = state.inner.lock().await;
            let now_ms = state.now_ms();
            guard.coordinator.fire_due(now_ms);
            flush_deliveries(&mut guard);
        }
    })
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    let guard = state.inner.lock().await;
    Json(json!({ "ok": true, "rooms": guard.coordinator.room_count() }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: AppState, socket: WebSocket) {
    let client_id = make_id("client");
    let (tx, mut rx) = mpsc::channel::<String>(CLIENT_QUEUE_CAPACITY);
    let kick = Arc::new(Notify::new());

    {
        let mut guard = state.inner.lock().await;
        guard.clients.insert(
            client_id.clone(),
            ClientContext {
                tx,
                kick: kick.clone(),
            },
        );
    }
    info!(client = %client_id, "client connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    let mut kicked = false;
    loop {
        let received = tokio::select! {
            received = ws_receiver.next() => received,
            _ = kick.notified() => {
                kicked = true;
                break;
            }
        };
        let Some(Ok(message)) = received else {
            break;
        };

        match message {
            Message::Text(raw) => handle_client_message(&state, &client_id, raw.as_str()).await,
            Message::Binary(raw) => match std::str::from_utf8(&raw) {
                Ok(text) => handle_client_message(&state, &client_id, text).await,
                Err(_) => send_error_to_client(&state, &client_id, "invalid utf8 message").await,
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    handle_disconnect(&state, &client_id).await;
    if kicked {
        writer.abort();
    } else {
        let _ = writer.await;
    }
    info!(client = %client_id, kicked, "client disconnected");
}

async fn handle_client_message(state: &AppState, client_id: &str, raw: &str) {
    let parsed = parse_client_message(raw);
    {
        let mut guard = state.inner.lock().await;
        let now_ms = state.now_ms();
        guard.coordinator.fire_due(now_ms);
        match parsed {
            Some(message) => guard.coordinator.handle(client_id, message, now_ms),
            None => {
                warn!(client = %client_id, "undecodable message");
                guard.coordinator.send_error(client_id, "invalid message");
            }
        }
        flush_deliveries(&mut guard);
    }
    state.timer_wake.notify_one();
}

async fn send_error_to_client(state: &AppState, client_id: &str, message: &str) {
    let mut guard = state.inner.lock().await;
    guard.coordinator.send_error(client_id, message);
    flush_deliveries(&mut guard);
}

async fn handle_disconnect(state: &AppState, client_id: &str) {
    {
        let mut guard = state.inner.lock().await;
        disconnect_client_internal(&mut guard, client_id);
        flush_deliveries(&mut guard);
    }
    state.timer_wake.notify_one();
}

fn disconnect_client_internal(state: &mut ServerState, client_id: &str) {
    if let Some(context) = state.clients.remove(client_id) {
        context.kick.notify_one();
    }
    state.coordinator.disconnect(client_id);
}

/// Sends everything the coordinator queued. Clients whose queue overflows on
/// an event that must not be lost are disconnected, which may queue more
/// events (`playerLeft`, `hostChanged`), so this loops until drained.
fn flush_deliveries(state: &mut ServerState) {
    loop {
        let deliveries = state.coordinator.drain_deliveries();
        if deliveries.is_empty() {
            return;
        }

        let mut overflowed = Vec::new();
        for delivery in deliveries {
            let payload = match serde_json::to_string(&delivery.event) {
                Ok(payload) => payload,
                Err(error) => {
                    warn!(%error, "outbound event failed to serialize");
                    continue;
                }
            };
            let policy = if delivery.event.is_droppable() {
                QueuePolicy::DropOnFull
            } else {
                QueuePolicy::DisconnectOnFull
            };
            for client_id in &delivery.recipients {
                if !send_to_client(state, client_id, &payload)
                    && policy == QueuePolicy::DisconnectOnFull
                    && !overflowed.contains(client_id)
                {
                    overflowed.push(client_id.clone());
                }
            }
        }

        for client_id in overflowed {
            warn!(client = %client_id, "outbound queue full; disconnecting");
            disconnect_client_internal(state, &client_id);
        }
    }
}

/// Returns `false` when the client is connected but its queue refused the
/// message.
fn send_to_client(state: &ServerState, client_id: &str, payload: &str) -> bool {
    let Some(client) = state.clients.get(client_id) else {
        debug!(client = %client_id, "delivery to unknown client skipped");
        return true;
    };
    client.tx.try_send(payload.to_string()).is_ok()
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_protocol::ParsedClientMessage;

    fn state_with_client(capacity: usize) -> (ServerState, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        let mut clients = HashMap::new();
        clients.insert(
            "client_1".to_string(),
            ClientContext {
                tx,
                kick: Arc::new(Notify::new()),
            },
        );
        let state = ServerState {
            clients,
            coordinator: SessionCoordinator::with_seed(GameSettings::default(), 3),
        };
        (state, rx)
    }

    #[test]
    fn make_id_is_prefixed_and_unique() {
        let a = make_id("client");
        let b = make_id("client");
        assert!(a.starts_with("client_"));
        assert_ne!(a, b);
    }

    #[test]
    fn deliveries_are_serialized_with_type_tag() {
        let (mut state, mut rx) = state_with_client(8);
        state.coordinator.handle(
            "client_1",
            ParsedClientMessage::CreateRoom {
                player_name: "Ann".to_string(),
            },
            0,
        );
        flush_deliveries(&mut state);

        let payload = rx.try_recv().expect("roomCreated queued");
        let value: serde_json::Value = serde_json::from_str(&payload).expect("valid json");
        assert_eq!(value["type"], "roomCreated");
        assert_eq!(value["isHost"], true);
        assert_eq!(value["player"]["id"], "client_1");
    }

    #[test]
    fn overflow_on_reliable_event_disconnects_client() {
        let (mut state, _rx) = state_with_client(1);
        state.coordinator.send_error("client_1", "first");
        state.coordinator.send_error("client_1", "second");
        flush_deliveries(&mut state);
        assert!(!state.clients.contains_key("client_1"));
    }

    fn playing_room(state: &mut ServerState) -> String {
        let code = state
            .coordinator
            .create_room("client_1", "Ann")
            .expect("room");
        state
            .coordinator
            .join_room("client_2", &code, "Bo")
            .expect("join");
        state.coordinator.start_game("client_1", &code, 0).expect("start");
        state.coordinator.fire_due(3_000);
        state.coordinator.drain_deliveries();
        code
    }

    #[test]
    fn overflow_on_droppable_event_keeps_client() {
        let (mut state, mut rx) = state_with_client(1);
        playing_room(&mut state);

        state.coordinator.fire_due(5_000);
        flush_deliveries(&mut state);
        assert!(state.clients.contains_key("client_1"));
        let payload = rx.try_recv().expect("first time update queued");
        assert!(payload.contains(r#""timeRemaining":89"#));
    }

    #[test]
    fn overflow_on_canvas_update_disconnects_client() {
        let (mut state, _rx) = state_with_client(1);
        let code = playing_room(&mut state);

        state
            .coordinator
            .move_player("client_1", &code, 100.0, 100.0, 3_100);
        state
            .coordinator
            .move_player("client_1", &code, 300.0, 300.0, 3_200);
        flush_deliveries(&mut state);
        assert!(!state.clients.contains_key("client_1"));
        assert_eq!(state.coordinator.room_of("client_1"), None);
    }
}
