use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::auth::VerifiedIdentity;
use crate::protocol::{ClientEvent, ErrorCode, ServerEvent};
use crate::server::TriviaServer;

pub(super) async fn handle_socket(
    socket: WebSocket,
    server: Arc<TriviaServer>,
    addr: SocketAddr,
    identity: VerifiedIdentity,
) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Arc<ServerEvent>>(server.config().event_queue_capacity);

    server.handle_connect(&identity, tx).await;
    let uid = identity.uid.clone();
    tracing::info!(%uid, client_addr = %addr, "WebSocket connection established");

    // Outbound pump: serialize once per event and write the frame.
    let send_uid = uid.clone();
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&*event) {
                Ok(text) => text,
                Err(err) => {
                    tracing::error!(uid = %send_uid, error = %err, "Failed to serialize outbound event");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let max_message_size = server.config().max_message_size;

    // Inbound loop: parse, route, reply. Malformed
    // frames produce an error ack, never a crash or a dropped connection.
    while let Some(message) = stream.next().await {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(%uid, "WebSocket error: {}", err);
                break;
            }
        };

        match message {
            Message::Text(text) => {
                if text.len() > max_message_size {
                    tracing::warn!(
                        %uid,
                        size = text.len(),
                        max = max_message_size,
                        "Inbound frame exceeds size limit"
                    );
                    server
                        .reply_error(
                            &uid,
                            format!(
                                "Message too large ({} bytes, max {max_message_size} bytes)",
                                text.len()
                            ),
                            ErrorCode::MessageTooLarge,
                        )
                        .await;
                    continue;
                }

                let event: ClientEvent = match serde_json::from_str(&text) {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(%uid, error = %err, "Rejected malformed client frame");
                        server
                            .reply_error(
                                &uid,
                                "Malformed event payload",
                                ErrorCode::InvalidInput,
                            )
                            .await;
                        continue;
                    }
                };

                server.handle_client_event(&uid, event).await;
            }
            Message::Binary(_) => {
                server
                    .reply_error(
                        &uid,
                        "Binary frames are not supported",
                        ErrorCode::InvalidInput,
                    )
                    .await;
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => break,
        }
    }

    server.handle_disconnect(&uid).await;
    send_task.abort();
    tracing::info!(%uid, client_addr = %addr, "WebSocket connection closed");
}
