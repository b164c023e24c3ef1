// WebSocket module - organized into focused submodules
//
// - handler: WebSocket upgrade handler with bearer-token authentication
// - connection: Main WebSocket connection handling logic
// - routes: HTTP route setup (WebSocket endpoint, health)

mod connection;
mod handler;
mod routes;

pub use handler::websocket_handler;
pub use routes::create_router;
