//! WebSocket notification emitter
//!
//! Fire-and-forget push of ride lifecycle events to connected parties.
//! Emission is decoupled from the ride/vault transaction boundary: a failed
//! or dropped send is logged and never fails the operation that produced it.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

use crate::ride::RideEvent;

/// WebSocket server state
#[derive(Clone)]
pub struct WsState {
    /// Broadcast channel for ride events
    tx: broadcast::Sender<RideEvent>,
    /// Connected clients and their ride subscriptions
    clients: Arc<RwLock<HashMap<String, Vec<Uuid>>>>,
}

/// Client message types
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientMessage {
    Subscribe { ride_ids: Vec<Uuid> },
    Unsubscribe { ride_ids: Vec<Uuid> },
    Ping,
}

/// Server message types
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ServerMessage {
    Event { event: RideEvent },
    Subscribed { ride_ids: Vec<Uuid> },
    Unsubscribed { ride_ids: Vec<Uuid> },
    Pong,
}

impl WsState {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(100);
        Self {
            tx,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Best-effort, at-most-once event push
    pub fn emit(&self, event: RideEvent) {
        if let Err(e) = self.tx.send(event) {
            // No connected subscribers; nothing to deliver
            tracing::debug!("Ride event dropped: {}", e);
        }
    }

    async fn register(&self, client_id: String) {
        self.clients.write().await.insert(client_id, vec![]);
    }

    async fn unregister(&self, client_id: &str) {
        self.clients.write().await.remove(client_id);
        tracing::info!("Client {} disconnected", client_id);
    }

    async fn set_subscriptions(&self, client_id: &str, ride_ids: Vec<Uuid>) {
        if let Some(subs) = self.clients.write().await.get_mut(client_id) {
            *subs = ride_ids;
        }
    }

    async fn subscriptions(&self, client_id: &str) -> Vec<Uuid> {
        self.clients
            .read()
            .await
            .get(client_id)
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for WsState {
    fn default() -> Self {
        Self::new()
    }
}

/// WebSocket handler - upgrades HTTP connection to WebSocket
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WsState) {
    let client_id = Uuid::new_v4().to_string();
    state.register(client_id.clone()).await;

    let (mut sender, mut receiver) = socket.split();
    let (internal_tx, mut internal_rx) = mpsc::channel::<ServerMessage>(32);

    let mut rx = state.tx.subscribe();
    let state_send = state.clone();
    let client_id_send = client_id.clone();

    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Ok(event) = rx.recv() => {
                    let subs = state_send.subscriptions(&client_id_send).await;
                    // An empty subscription list means "everything"
                    if subs.is_empty() || subs.contains(&event.ride_id()) {
                        let msg = ServerMessage::Event { event };
                        if let Ok(text) = serde_json::to_string(&msg) {
                            if sender.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                Some(msg) = internal_rx.recv() => {
                    if let Ok(text) = serde_json::to_string(&msg) {
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                }
                else => break,
            }
        }
    });

    let state_recv = state.clone();
    let client_id_recv = client_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let Ok(client_msg) = serde_json::from_str::<ClientMessage>(&text) else {
                        continue;
                    };
                    match client_msg {
                        ClientMessage::Subscribe { ride_ids } => {
                            state_recv
                                .set_subscriptions(&client_id_recv, ride_ids.clone())
                                .await;
                            let _ = internal_tx.send(ServerMessage::Subscribed { ride_ids }).await;
                        }
                        ClientMessage::Unsubscribe { ride_ids } => {
                            let mut current = state_recv.subscriptions(&client_id_recv).await;
                            current.retain(|id| !ride_ids.contains(id));
                            state_recv.set_subscriptions(&client_id_recv, current).await;
                            let _ = internal_tx
                                .send(ServerMessage::Unsubscribed { ride_ids })
                                .await;
                        }
                        ClientMessage::Ping => {
                            let _ = internal_tx.send(ServerMessage::Pong).await;
                        }
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    state.unregister(&client_id).await;
}
