//! Shellbridge server: Axum HTTP + WebSocket terminal bridge. The Telegram bot and
//! daemon supervisor live in `shellbridge-core`; this crate is the browser-facing half
//! plus the binary that ties every mode together.

mod web_server;

pub use web_server::run_web_server;
