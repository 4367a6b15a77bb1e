#![allow(dead_code)]

use std::{net::SocketAddr, time::Duration};

use futures_util::{SinkExt, StreamExt};
use orderchat::{
    AppState, RouterOptions,
    relay::{ConnectionRegistry, Heartbeat, RelayServer},
    store::SqliteStore,
};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, tungstenite::Message};

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub relay: RelayServer,
    pub store: SqliteStore,
}

impl TestServer {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub async fn connect(&self) -> Socket {
        let (socket, _) = tokio_tungstenite::connect_async(self.ws_url()).await.unwrap();
        socket
    }

    /// Joins go through another task, so wait until the registry has seen them.
    pub async fn wait_for_room_size(&self, order_id: &str, size: usize) {
        for _ in 0..100 {
            if self.relay.registry().room_size(order_id).await == size {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("room {order_id} never reached {size} members");
    }
}

pub async fn start_test_server() -> TestServer {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = SqliteStore::new(db_pool);
    store.init().await.unwrap();

    let relay = RelayServer::new(ConnectionRegistry::new());
    let app_state = AppState {
        store: store.clone(),
        relay: relay.clone(),
        heartbeat: Heartbeat { ping_every: Duration::from_secs(30) },
    };
    let app = orderchat::router(app_state, RouterOptions::default()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer { addr, relay, store }
}

pub async fn emit(socket: &mut Socket, frame: Value) {
    socket.send(Message::Text(frame.to_string().into())).await.unwrap();
}

/// Next JSON text frame, or `None` if nothing arrives within `wait`.
pub async fn next_frame(socket: &mut Socket, wait: Duration) -> Option<Value> {
    loop {
        match tokio::time::timeout(wait, socket.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => return Some(serde_json::from_str(text.as_str()).unwrap()),
            Ok(Some(Ok(_))) => continue,
            _ => return None,
        }
    }
}
