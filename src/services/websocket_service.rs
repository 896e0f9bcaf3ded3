use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{dto::ws::ChatEnvelope, state::SharedState};

/// What to do with one inbound text frame.
#[derive(Debug, PartialEq, Eq)]
enum FrameAction {
    Relay,
    Ignore,
}

fn classify_text(peer: &Uuid, text: &str) -> FrameAction {
    match ChatEnvelope::from_json_str(text) {
        Ok(envelope) if envelope.is_chat_message() => FrameAction::Relay,
        Ok(envelope) => {
            warn!(peer = %peer, event = %envelope.event, "ignoring unsupported realtime event");
            FrameAction::Ignore
        }
        Err(err) => {
            warn!(peer = %peer, error = %err, "failed to parse realtime frame");
            FrameAction::Ignore
        }
    }
}

/// Handle the full lifecycle of one chat peer: register, relay, unregister.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound frames flowing while we await inbound ones.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let peer_id = state.chat().register(outbound_tx.clone());
    info!(peer = %peer_id, peers = state.chat().peer_count(), "chat peer connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if classify_text(&peer_id, text.as_str()) == FrameAction::Relay {
                    let delivered = state.chat().broadcast(text.as_str());
                    debug!(peer = %peer_id, delivered, "chat message relayed");
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(peer = %peer_id, error = %err, "websocket error");
                break;
            }
        }
    }

    state.chat().unregister(&peer_id);
    info!(peer = %peer_id, "chat peer disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
