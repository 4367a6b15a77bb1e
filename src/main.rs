use orderchat::{
    AppState, RouterOptions,
    config::Config,
    relay::{ConnectionRegistry, Heartbeat, RelayServer},
    store::SqliteStore,
};
use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("orderchat=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let db_pool = SqlitePoolOptions::new()
        .max_connections(config.max_db_connections)
        .connect(&config.database_url)
        .await?;
    let store = SqliteStore::new(db_pool);
    store.init().await?;

    let app_state = AppState {
        store,
        relay: RelayServer::new(ConnectionRegistry::new()),
        heartbeat: Heartbeat { ping_every: config.ping_interval },
    };

    let app = orderchat::router(app_state, RouterOptions {
        client_url: config.client_url.clone(),
        session_expiry_minutes: config.session_expiry_minutes,
    })?;

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "order chat relay listening");
    axum::serve(listener, app).await?;

    Ok(())
}
