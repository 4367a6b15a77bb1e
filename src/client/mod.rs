//! Client side of an order chat: one [`ChatView`] per open conversation screen.

mod connection;
mod timeline;

use uuid::Uuid;

use crate::{
    relay::ServerEvent,
    store::{MessageRecord, MessageStore, StoreError},
};

pub use connection::RelayConnection;
pub use timeline::Timeline;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("could not persist or load messages: {0}")]
    Store(#[from] StoreError),
    #[error("relay transport failed: {0}")]
    Relay(#[from] tokio_tungstenite::tungstenite::Error),
    #[error(transparent)]
    Encode(#[from] serde_json::Error),
    #[error("message content is empty")]
    EmptyMessage,
}

/// A live chat screen for one order.
///
/// The store is the source of truth. The relay only speeds up delivery, so a
/// dead relay connection pauses live updates without losing anything.
pub struct ChatView<S> {
    store: S,
    order_id: String,
    conversation_id: Uuid,
    me: String,
    relay: Option<RelayConnection>,
    timeline: Timeline,
}

impl<S: MessageStore> ChatView<S> {
    /// Resolves the conversation, loads its history, then joins the order's room.
    pub async fn open(
        store: S,
        relay_url: &str,
        order_id: impl Into<String>,
        me: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let order_id = order_id.into();
        let conversation = store.get_or_create_conversation(&order_id).await?;

        let mut timeline = Timeline::new();
        timeline.load_history(store.list_messages(conversation.id).await?);

        let mut relay = RelayConnection::connect(relay_url).await?;
        relay.join(&order_id).await?;

        Ok(ChatView {
            store,
            order_id,
            conversation_id: conversation.id,
            me: me.into(),
            relay: Some(relay),
            timeline,
        })
    }

    /// Stores `content`, then asks the relay to fan it out.
    ///
    /// Surrounding whitespace is trimmed and blank input is refused before
    /// anything is stored. Nothing is broadcast when the store write fails.
    pub async fn send(&mut self, content: &str) -> Result<MessageRecord, ClientError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ClientError::EmptyMessage);
        }

        let message = self
            .store
            .create_message(self.conversation_id, &self.me, content)
            .await?;
        self.timeline.push(message.clone());

        if let Some(relay) = self.relay.as_mut() {
            if let Err(err) = relay.send_message(&self.order_id, message.clone()).await {
                tracing::warn!(order_id = %self.order_id, %err, "relay send failed, live updates paused");
                self.relay = None;
            }
        }

        Ok(message)
    }

    /// Waits for the next message from the relay that is not already shown.
    ///
    /// Returns `None` when the relay connection is gone.
    pub async fn recv(&mut self) -> Option<MessageRecord> {
        loop {
            let relay = self.relay.as_mut()?;
            let Some(ServerEvent::ReceiveMessage(message)) = relay.next_event().await else {
                tracing::info!(order_id = %self.order_id, "relay connection lost");
                self.relay = None;
                return None;
            };

            if self.timeline.push(message.clone()) {
                return Some(message);
            }
        }
    }

    /// Reloads stored history and merges it with what arrived live.
    pub async fn resync(&mut self) -> Result<(), ClientError> {
        let history = self.store.list_messages(self.conversation_id).await?;
        self.timeline.load_history(history);
        Ok(())
    }

    /// Opens a fresh relay connection, rejoins the room and resyncs.
    pub async fn reconnect(&mut self, relay_url: &str) -> Result<(), ClientError> {
        let mut relay = RelayConnection::connect(relay_url).await?;
        relay.join(&self.order_id).await?;
        self.relay = Some(relay);
        self.resync().await
    }

    pub fn is_live(&self) -> bool {
        self.relay.is_some()
    }

    pub fn messages(&self) -> &[MessageRecord] {
        self.timeline.messages()
    }

    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    /// Whether `message` was written by this view's user.
    pub fn is_mine(&self, message: &MessageRecord) -> bool {
        message.sender_id == self.me
    }

    /// Closing the socket is enough for the relay to drop this session.
    pub async fn close(self) -> Result<(), ClientError> {
        match self.relay {
            Some(relay) => relay.close().await,
            None => Ok(()),
        }
    }
}
