pub mod appresult;
pub mod client;
pub mod config;
pub mod conversations;
pub mod identity;
pub mod relay;
pub mod store;

use axum::{
    Router,
    extract::FromRef,
    http::{HeaderValue, Method, header},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer, cookie::SameSite};

pub use appresult::{AppError, AppResult};

use relay::{Heartbeat, RelayServer};
use store::SqliteStore;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: SqliteStore,
    pub relay: RelayServer,
    pub heartbeat: Heartbeat,
}

/// HTTP surface settings that do not live in [`AppState`].
#[derive(Debug, Clone, Default)]
pub struct RouterOptions {
    pub client_url: Option<String>,
    pub session_expiry_minutes: i64,
}

pub fn router(app_state: AppState, options: RouterOptions) -> anyhow::Result<Router> {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(false)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::minutes(
            options.session_expiry_minutes.max(1),
        )));

    let allow_origin = match options.client_url {
        Some(url) => AllowOrigin::exact(HeaderValue::from_str(&url)?),
        None => AllowOrigin::mirror_request(),
    };
    let cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    Ok(Router::new()
        .merge(identity::router())
        .merge(conversations::router())
        .merge(relay::router())
        .with_state(app_state)
        .layer(session_layer)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}
