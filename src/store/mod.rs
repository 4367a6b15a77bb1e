//! Durable message log.
//!
//! The relay never writes here; clients persist first and broadcast second, so
//! this is the only place a message can be recovered from after a reconnect.

mod http;
mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

pub use http::HttpStore;
pub use sqlite::SqliteStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub order_id: String,
}

/// A persisted chat message as it travels between store, relay and clients.
///
/// Fields the relay does not know about are kept in `extra` and forwarded as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("conversation {0} not found")]
    ConversationNotFound(Uuid),
    #[error("conversation for order {order_id} still unresolved after {attempts} attempts")]
    ConversationRace { order_id: String, attempts: u32 },
    #[error("malformed row: {0}")]
    Malformed(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Returns the conversation for `order_id`, creating it if absent.
    ///
    /// Concurrent first callers must all end up with the same conversation.
    async fn get_or_create_conversation(&self, order_id: &str) -> StoreResult<Conversation>;

    /// All messages of a conversation, oldest first.
    async fn list_messages(&self, conversation_id: Uuid) -> StoreResult<Vec<MessageRecord>>;

    async fn create_message(
        &self,
        conversation_id: Uuid,
        sender_id: &str,
        content: &str,
    ) -> StoreResult<MessageRecord>;
}

#[async_trait]
impl<S: MessageStore + ?Sized> MessageStore for std::sync::Arc<S> {
    async fn get_or_create_conversation(&self, order_id: &str) -> StoreResult<Conversation> {
        (**self).get_or_create_conversation(order_id).await
    }

    async fn list_messages(&self, conversation_id: Uuid) -> StoreResult<Vec<MessageRecord>> {
        (**self).list_messages(conversation_id).await
    }

    async fn create_message(
        &self,
        conversation_id: Uuid,
        sender_id: &str,
        content: &str,
    ) -> StoreResult<MessageRecord> {
        (**self).create_message(conversation_id, sender_id, content).await
    }
}
