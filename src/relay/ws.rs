use std::time::Duration;

use axum::{
    debug_handler,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::{sync::mpsc, time};

use super::{protocol::ClientEvent, server::RelayServer};

/// Ping cadence for relay sockets. A socket silent for three intervals is dropped.
#[derive(Debug, Clone, Copy)]
pub struct Heartbeat {
    pub ping_every: Duration,
}

impl Heartbeat {
    pub fn idle_limit(&self) -> Duration {
        self.ping_every * 3
    }
}

#[debug_handler(state = crate::AppState)]
pub async fn relay_ws(
    State(relay): State<RelayServer>,
    State(heartbeat): State<Heartbeat>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |stream| run_session(stream, relay, heartbeat))
}

async fn run_session(stream: WebSocket, relay: RelayServer, heartbeat: Heartbeat) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = relay.connect(tx).await;
    let (mut sender, mut receiver) = stream.split();

    let session_id = session.id();
    let mut writer_task = tokio::spawn(async move {
        let mut ping = time::interval(heartbeat.ping_every);
        ping.tick().await;

        loop {
            let msg = tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    match serde_json::to_string(&*event) {
                        Ok(text) => Message::Text(text.into()),
                        Err(err) => {
                            tracing::warn!(session = %session_id, %err, "could not encode event");
                            continue;
                        }
                    }
                }
                _ = ping.tick() => Message::Ping(Default::default()),
            };

            if sender.send(msg).await.is_err() {
                break;
            }
        }
    });

    loop {
        let msg = tokio::select! {
            _ = &mut writer_task => break,
            next = time::timeout(heartbeat.idle_limit(), receiver.next()) => match next {
                Ok(Some(Ok(msg))) => msg,
                Ok(Some(Err(err))) => {
                    tracing::debug!(session = %session_id, %err, "relay socket error");
                    break;
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::info!(session = %session_id, "relay socket idle, dropping");
                    break;
                }
            },
        };

        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let event = match serde_json::from_str::<ClientEvent>(text.as_str()) {
            Ok(event) => event,
            Err(err) => {
                tracing::debug!(session = %session_id, %err, "skipping malformed frame");
                continue;
            }
        };

        relay.handle(&mut session, event).await;
    }

    relay.disconnect(&mut session).await;
    writer_task.abort();
}
