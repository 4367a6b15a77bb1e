use uuid::Uuid;

use super::{
    protocol::{ClientEvent, SendMessage, ServerEvent},
    registry::{ConnectionRegistry, Joined, SessionId, SessionSender},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Joined(String),
    Disconnected,
}

/// One live relay connection.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    state: SessionState,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }
}

/// Handles relay events against the shared [`ConnectionRegistry`].
///
/// Nothing is persisted here. Messages arrive already stored and are only fanned
/// out to whoever is in the room at that moment.
#[derive(Clone, Default)]
pub struct RelayServer {
    registry: ConnectionRegistry,
}

impl RelayServer {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub async fn connect(&self, tx: SessionSender) -> Session {
        let id = Uuid::now_v7();
        self.registry.connect(id, tx).await;
        tracing::info!(session = %id, "relay session connected");

        Session { id, state: SessionState::Connected }
    }

    /// Applies one client event. For `sendMessage` returns the delivered count.
    pub async fn handle(&self, session: &mut Session, event: ClientEvent) -> Option<usize> {
        if session.state == SessionState::Disconnected {
            tracing::debug!(session = %session.id, "event after disconnect ignored");
            return None;
        }

        match event {
            ClientEvent::JoinRoom(order_id) => {
                match self.registry.join(session.id, &order_id).await {
                    Some(Joined::Switched { from }) => {
                        tracing::info!(session = %session.id, %from, to = %order_id, "switched room");
                    }
                    Some(Joined::Entered) => {
                        tracing::info!(session = %session.id, %order_id, "joined room");
                    }
                    Some(Joined::AlreadyMember) => {}
                    None => {
                        tracing::warn!(session = %session.id, %order_id, "join from unregistered session ignored");
                        return None;
                    }
                }
                session.state = SessionState::Joined(order_id);
                None
            }
            // The sender does not have to be in the room it sends to.
            ClientEvent::SendMessage(SendMessage { order_id, message }) => {
                let message_id = message.id;
                let delivered = self
                    .registry
                    .broadcast(&order_id, ServerEvent::ReceiveMessage(message))
                    .await;
                tracing::debug!(session = %session.id, %order_id, %message_id, delivered, "broadcast");
                Some(delivered)
            }
        }
    }

    pub async fn disconnect(&self, session: &mut Session) {
        if session.state == SessionState::Disconnected {
            return;
        }

        let left = self.registry.disconnect(session.id).await;
        session.state = SessionState::Disconnected;
        tracing::info!(session = %session.id, room = ?left, "relay session disconnected");
    }
}
