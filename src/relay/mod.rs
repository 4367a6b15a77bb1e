pub mod protocol;
pub mod registry;
pub mod server;
mod ws;

use axum::{routing::get, Router};

use crate::AppState;

pub use protocol::{ClientEvent, SendMessage, ServerEvent};
pub use registry::{ConnectionRegistry, Joined, SessionId};
pub use server::{RelayServer, Session, SessionState};
pub use ws::Heartbeat;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::relay_ws))
}
