//! Progress WebSocket — one observer per job id.

use std::sync::Arc;

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use tracing::{debug, info, warn};

use super::AppState;
use crate::observer::QueueChannel;
use crate::orchestrator::ProgressOrchestrator;

pub(super) async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    info!(job_id = %id, "Progress WebSocket client connecting");
    let orchestrator = Arc::clone(state.orchestrator());
    ws.on_upgrade(move |socket| handle_socket(socket, id, orchestrator))
}

async fn handle_socket(mut socket: WebSocket, id: String, orchestrator: Arc<ProgressOrchestrator>) {
    let (channel, mut rx) = QueueChannel::new();
    let token = orchestrator.attach_observer(&id, channel).await;

    loop {
        tokio::select! {
            // Forward progress events to the client
            frame = rx.recv() => {
                match frame {
                    Some(text) => {
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            debug!(job_id = %id, "Client disconnected during send");
                            break;
                        }
                    }
                    None => {
                        debug!(job_id = %id, "Observer replaced, closing socket");
                        break;
                    }
                }
            }

            // Client frames only keep the connection alive
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(job_id = %id, "Progress WebSocket client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(job_id = %id, error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    orchestrator.detach_observer_if_current(&id, token).await;
}
