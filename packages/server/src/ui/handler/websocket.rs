//! WebSocket connection handlers.

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;

use crate::{domain::ConnectionIdFactory, ui::state::AppState, usecase::ConnectionSession};

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection = ConnectionIdFactory::generate();
    tracing::info!(%connection, "Client connected");

    // Frames for this client (joiner replies and room broadcasts)
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let (mut sender, mut receiver) = socket.split();

    let mut session = ConnectionSession::new(
        connection.clone(),
        tx,
        state.registry.clone(),
        state.index.clone(),
        state.locks.clone(),
    );
    let mut shutdown = state.shutdown.subscribe();

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    // Events are handled inline, one at a time, so an operation is never cut off halfway
    loop {
        tokio::select! {
            msg = receiver.next() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        tracing::warn!(%connection, "WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                };

                match msg {
                    Message::Text(text) => {
                        tracing::debug!(%connection, "Received text: {}", text.as_str());
                        session.handle_text(text.as_str()).await;
                    }
                    Message::Ping(_) => {
                        tracing::debug!("Received ping");
                        // Ping/pong is handled automatically by the WebSocket protocol
                    }
                    Message::Close(_) => {
                        tracing::info!(%connection, "Client requested close");
                        break;
                    }
                    _ => {}
                }
            }
            _ = &mut send_task => {
                tracing::debug!(%connection, "Send task finished");
                break;
            }
            _ = shutdown.changed() => {
                tracing::debug!(%connection, "Closing for shutdown");
                break;
            }
        }
    }

    session.disconnect().await;
    send_task.abort();
    tracing::info!(%connection, "Client disconnected");
}
