use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::server::TriviaServer;

use super::connection::handle_socket;

/// Query parameters accepted on the WebSocket endpoint. Browsers cannot set
/// headers on WebSocket upgrades, so the token may ride the query string.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// WebSocket handler for the game protocol.
///
/// The bearer identity token is verified during the handshake; connections
/// without a valid token never upgrade. The verified identity is stapled to
/// the connection for its lifetime.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(server): State<Arc<TriviaServer>>,
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
) -> Response {
    let token = bearer_token(&headers).or(query.token);
    let Some(token) = token else {
        tracing::warn!(client_addr = %addr, "WebSocket upgrade without identity token");
        return (StatusCode::UNAUTHORIZED, "Missing identity token").into_response();
    };

    match server.token_verifier().verify(&token).await {
        Ok(identity) => {
            ws.on_upgrade(move |socket| handle_socket(socket, server, addr, identity))
        }
        Err(err) => {
            tracing::warn!(client_addr = %addr, error = %err, "Rejected WebSocket upgrade");
            (StatusCode::UNAUTHORIZED, err.to_string()).into_response()
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}
