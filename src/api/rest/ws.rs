use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::SinkExt;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::realtime::protocol::{ClientEvent, ServerEvent};
use crate::realtime::registry::ConnId;
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let conn_id: ConnId = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel::<ServerEvent>();

    state.metrics.ws_connections.inc();
    info!(%conn_id, "realtime client connected");

    let mut outbox = UnboundedReceiverStream::new(outbox_rx);
    let send_task = tokio::spawn(async move {
        while let Some(event) = outbox.next().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(err) => {
                    warn!(error = %err, "failed to serialize room event");
                    continue;
                }
            };

            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_state = state.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let Message::Text(text) = msg else { continue };

            match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => handle_client_event(&recv_state, conn_id, &outbox_tx, event),
                Err(err) => {
                    warn!(%conn_id, error = %err, "ignoring malformed client event");
                }
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    // Unconditional: a closed socket must not leak room membership.
    state.rooms.disconnect(conn_id);
    state.metrics.ws_connections.dec();
    info!(%conn_id, "realtime client disconnected");
}

fn handle_client_event(
    state: &Arc<AppState>,
    conn_id: ConnId,
    outbox: &mpsc::UnboundedSender<ServerEvent>,
    event: ClientEvent,
) {
    match event {
        ClientEvent::JoinOrder { order_id } => {
            state.rooms.join(conn_id, order_id, outbox.clone());
        }
        ClientEvent::LeaveOrder { order_id } => {
            state.rooms.leave(conn_id, order_id);
        }
        ClientEvent::UpdateLocation {
            order_id,
            latitude,
            longitude,
        } => {
            state.metrics.location_updates_total.inc();
            state.rooms.publish(
                order_id,
                ServerEvent::DriverLocation {
                    latitude,
                    longitude,
                },
                Some(conn_id),
            );
        }
        ClientEvent::UpdateStatus { order_id, status } => {
            state.rooms.publish(
                order_id,
                ServerEvent::StatusUpdate { order_id, status },
                Some(conn_id),
            );
        }
    }
}
