//! WebSocket feed of vault events
//!
//! Every wallet event is pushed to connected clients as it is accepted.
//! Clients may narrow the feed with `?index=N` and/or `?owner=NAME`. A
//! client that falls behind the buffer is told how many events it missed
//! so it can re-read state over REST.

use crate::api::handlers::ApiState;
use crate::multisig::{EventSink, WalletEvent};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};

/// Events buffered per subscriber before it is considered lagging
const EVENT_BUFFER: usize = 256;

/// Interval between heartbeat messages
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Messages sent to WebSocket clients
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum WsEvent {
    /// A wallet state change (deposit, submit, confirm, revoke, execute)
    Wallet(WalletEvent),
    /// First message on a connection: the vault it is attached to
    Connected {
        address: String,
        description: String,
        pending: Vec<usize>,
    },
    /// The client fell behind and `missed` events were dropped
    Lagged { missed: u64 },
    /// Heartbeat
    Ping,
}

/// Optional narrowing of the event feed
#[derive(Clone, Debug, Default, Deserialize)]
pub struct EventFilter {
    pub index: Option<usize>,
    pub owner: Option<String>,
}

impl EventFilter {
    /// Whether `event` passes the filter
    ///
    /// Deposits carry neither an index nor an owner, so any filter drops them.
    pub fn matches(&self, event: &WalletEvent) -> bool {
        if let Some(index) = self.index {
            if event.index() != Some(index) {
                return false;
            }
        }
        if let Some(owner) = &self.owner {
            if event.owner().map(|o| o.as_str()) != Some(owner.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Fans wallet events out to every connected client
#[derive(Debug)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<WalletEvent>,
}

impl WsBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self { sender }
    }

    /// Subscribe to wallet events
    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for WsBroadcaster {
    fn emit(&self, event: &WalletEvent) {
        // No subscribers is not an error
        let _ = self.sender.send(event.clone());
    }
}

/// GET /ws - upgrade to the event feed
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<ApiState>,
    Query(filter): Query<EventFilter>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, filter))
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &WsEvent,
) -> Result<(), axum::Error> {
    match serde_json::to_string(event) {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(e) => {
            log::error!("Failed to encode WebSocket event: {}", e);
            Ok(())
        }
    }
}

/// Next message for a client, or `None` once the feed has closed
fn next_message(
    received: Result<WalletEvent, RecvError>,
    filter: &EventFilter,
) -> Option<Option<WsEvent>> {
    match received {
        Ok(event) if filter.matches(&event) => Some(Some(WsEvent::Wallet(event))),
        Ok(_) => Some(None),
        Err(RecvError::Lagged(missed)) => {
            log::warn!("WebSocket client lagged, {} event(s) dropped", missed);
            Some(Some(WsEvent::Lagged { missed }))
        }
        Err(RecvError::Closed) => None,
    }
}

async fn handle_socket(socket: WebSocket, state: ApiState, filter: EventFilter) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before the greeting so nothing accepted after it is missed
    let mut rx = state.ws_broadcaster.subscribe();

    let greeting = WsEvent::Connected {
        address: state.wallet.address().to_string(),
        description: state.wallet.description(),
        pending: state.wallet.pending_indices(),
    };
    if send_event(&mut sender, &greeting).await.is_err() {
        return;
    }
    log::info!("WebSocket client connected ({:?})", filter);

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            let message = tokio::select! {
                received = rx.recv() => match next_message(received, &filter) {
                    Some(message) => message,
                    None => break,
                },
                _ = heartbeat.tick() => Some(WsEvent::Ping),
            };

            if let Some(message) = message {
                if send_event(&mut sender, &message).await.is_err() {
                    break;
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    log::warn!("WebSocket error: {}", e);
                    break;
                }
                // The feed is one-way; pongs are answered by axum
                Ok(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    log::info!("WebSocket connection closed");
}
