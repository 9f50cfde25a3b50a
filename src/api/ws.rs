use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tokio::sync::broadcast;

use crate::sync::{SharedSnapshotStore, Snapshot, SnapshotUpdateSender, VehicleRecord};

#[derive(Clone)]
pub struct WsState {
    pub store: SharedSnapshotStore,
    pub updates_tx: SnapshotUpdateSender,
}

/// Client subscription message
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
enum ClientMessage {
    /// Subscribe to specific routes; an empty list means all routes
    Subscribe { route_ids: Vec<String> },
}

/// Server message sent to clients
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
enum ServerMessage {
    /// Initial connection acknowledgment
    Connected { message: String },
    /// Snapshot data for the subscribed routes, pushed on every publish
    Snapshot {
        sequence: u64,
        collected_at: DateTime<Utc>,
        vehicles: Vec<VehicleRecord>,
    },
}

fn snapshot_message(snapshot: &Snapshot, routes: &HashSet<String>) -> ServerMessage {
    let vehicles = snapshot
        .records
        .iter()
        .filter(|r| routes.is_empty() || routes.contains(&r.route_id))
        .cloned()
        .collect();

    ServerMessage::Snapshot {
        sequence: snapshot.sequence,
        collected_at: snapshot.collected_at,
        vehicles,
    }
}

/// WebSocket endpoint pushing one message per published snapshot
pub async fn ws_updates(ws: WebSocketUpgrade, State(state): State<WsState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: WsState) {
    let (mut sender, mut receiver) = socket.split();
    let mut updates_rx = state.updates_tx.subscribe();

    let connected_msg = ServerMessage::Connected {
        message: "Connected to snapshot updates. Send subscribe message with route_ids.".to_string(),
    };
    if let Ok(json) = serde_json::to_string(&connected_msg) {
        let _ = sender.send(Message::Text(json.into())).await;
    }

    // Channel to communicate subscriptions from receiver task to sender task
    let (sub_tx, mut sub_rx) = tokio::sync::mpsc::channel::<Vec<String>>(16);

    let store = state.store.clone();
    let mut subscribed_routes: HashSet<String> = HashSet::new();
    let mut subscribed = false;

    // Forward publish notifications to the socket; the notification itself
    // only says "new sequence exists" - the data comes from the store
    let forward_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(route_ids) = sub_rx.recv() => {
                    subscribed_routes = route_ids.into_iter().collect();
                    subscribed = true;

                    // Send the current snapshot right away so the client
                    // doesn't wait a full poll interval for its first data
                    if let Some(snapshot) = store.current().await {
                        let msg = snapshot_message(&snapshot, &subscribed_routes);
                        if let Ok(json) = serde_json::to_string(&msg) {
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                result = updates_rx.recv() => {
                    match result {
                        Ok(_update) => {
                            if !subscribed {
                                continue;
                            }
                            if let Some(snapshot) = store.current().await {
                                let msg = snapshot_message(&snapshot, &subscribed_routes);
                                if let Ok(json) = serde_json::to_string(&msg) {
                                    if sender.send(Message::Text(json.into())).await.is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    }
                }
            }
        }
    });

    // Handle incoming messages from client
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Ok(client_msg) = serde_json::from_str::<ClientMessage>(&text) {
                    match client_msg {
                        ClientMessage::Subscribe { route_ids } => {
                            let _ = sub_tx.send(route_ids).await;
                        }
                    }
                }
            }
            Ok(Message::Ping(_)) => {
                // Axum handles pong automatically
            }
            Ok(Message::Close(_)) => break,
            Err(_) => break,
            _ => {}
        }
    }

    // Cleanup
    forward_task.abort();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_snapshot() -> Snapshot {
        let observed_at = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        Snapshot {
            sequence: 7,
            collected_at: observed_at,
            records: vec![
                VehicleRecord {
                    vehicle_id: "MX-10-01".to_string(),
                    route_id: "71".to_string(),
                    latitude: 22.19,
                    longitude: 113.54,
                    heading: None,
                    speed: None,
                    timestamp: None,
                    observed_at,
                },
                VehicleRecord {
                    vehicle_id: "MX-20-01".to_string(),
                    route_id: "73".to_string(),
                    latitude: 22.20,
                    longitude: 113.55,
                    heading: None,
                    speed: None,
                    timestamp: None,
                    observed_at,
                },
            ],
        }
    }

    #[test]
    fn snapshot_message_filters_by_subscribed_routes() {
        let snapshot = make_snapshot();
        let routes: HashSet<String> = ["71".to_string()].into_iter().collect();
        let ServerMessage::Snapshot { sequence, vehicles, .. } =
            snapshot_message(&snapshot, &routes)
        else {
            panic!("expected snapshot message");
        };
        assert_eq!(sequence, 7);
        assert_eq!(vehicles.len(), 1);
        assert_eq!(vehicles[0].route_id, "71");
    }

    #[test]
    fn snapshot_message_empty_filter_means_all() {
        let snapshot = make_snapshot();
        let ServerMessage::Snapshot { vehicles, .. } =
            snapshot_message(&snapshot, &HashSet::new())
        else {
            panic!("expected snapshot message");
        };
        assert_eq!(vehicles.len(), 2);
    }
}
