use async_trait::async_trait;
use serde_json::Map;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{Conversation, MessageRecord, MessageStore, StoreError, StoreResult};

const GET_OR_CREATE_ATTEMPTS: u32 = 3;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY NOT NULL,
        order_id TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS messages (
        id TEXT PRIMARY KEY NOT NULL,
        conversation_id TEXT NOT NULL REFERENCES conversations(id),
        sender_id TEXT NOT NULL,
        content TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS messages_by_conversation ON messages (conversation_id, created_at)",
];

#[derive(Clone)]
pub struct SqliteStore {
    db_pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    /// Creates the tables if they are missing.
    pub async fn init(&self) -> StoreResult<()> {
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&self.db_pool).await?;
        }
        Ok(())
    }

    async fn find_conversation(&self, order_id: &str) -> StoreResult<Option<Conversation>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT id FROM conversations WHERE order_id=?")
            .bind(order_id)
            .fetch_optional(&self.db_pool)
            .await?;

        row.map(|(id,)| {
            Ok(Conversation {
                id: parse_uuid(&id)?,
                order_id: order_id.to_owned(),
            })
        })
        .transpose()
    }

    async fn ensure_conversation(&self, conversation_id: Uuid) -> StoreResult<()> {
        sqlx::query_as::<_, (i64,)>("SELECT 1 FROM conversations WHERE id=?")
            .bind(conversation_id.to_string())
            .fetch_optional(&self.db_pool)
            .await?
            .map(|_| ())
            .ok_or(StoreError::ConversationNotFound(conversation_id))
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn get_or_create_conversation(&self, order_id: &str) -> StoreResult<Conversation> {
        for attempt in 1..=GET_OR_CREATE_ATTEMPTS {
            if let Some(conversation) = self.find_conversation(order_id).await? {
                return Ok(conversation);
            }

            let id = Uuid::now_v7();
            let inserted = sqlx::query("INSERT INTO conversations (id,order_id) VALUES (?,?)")
                .bind(id.to_string())
                .bind(order_id)
                .execute(&self.db_pool)
                .await;

            match inserted {
                Ok(_) => {
                    tracing::debug!(%order_id, conversation_id = %id, "created conversation");
                    return Ok(Conversation { id, order_id: order_id.to_owned() });
                }
                Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                    tracing::debug!(%order_id, attempt, "lost conversation create race, re-reading");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(StoreError::ConversationRace {
            order_id: order_id.to_owned(),
            attempts: GET_OR_CREATE_ATTEMPTS,
        })
    }

    async fn list_messages(&self, conversation_id: Uuid) -> StoreResult<Vec<MessageRecord>> {
        self.ensure_conversation(conversation_id).await?;

        let rows: Vec<(String, String, String, i64)> = sqlx::query_as(
            "SELECT id,sender_id,content,created_at FROM messages WHERE conversation_id=? ORDER BY created_at, rowid",
        )
        .bind(conversation_id.to_string())
        .fetch_all(&self.db_pool)
        .await?;

        rows.into_iter()
            .map(|(id, sender_id, content, created_at)| {
                Ok(MessageRecord {
                    id: parse_uuid(&id)?,
                    conversation_id,
                    sender_id,
                    content,
                    created_at: from_nanos(created_at)?,
                    extra: Map::new(),
                })
            })
            .collect()
    }

    async fn create_message(
        &self,
        conversation_id: Uuid,
        sender_id: &str,
        content: &str,
    ) -> StoreResult<MessageRecord> {
        self.ensure_conversation(conversation_id).await?;

        let id = Uuid::now_v7();
        let created_at = OffsetDateTime::now_utc();
        sqlx::query("INSERT INTO messages (id,conversation_id,sender_id,content,created_at) VALUES (?,?,?,?,?)")
            .bind(id.to_string())
            .bind(conversation_id.to_string())
            .bind(sender_id)
            .bind(content)
            .bind(to_nanos(created_at)?)
            .execute(&self.db_pool)
            .await?;

        Ok(MessageRecord {
            id,
            conversation_id,
            sender_id: sender_id.to_owned(),
            content: content.to_owned(),
            created_at,
            extra: Map::new(),
        })
    }
}

fn to_nanos(at: OffsetDateTime) -> StoreResult<i64> {
    i64::try_from(at.unix_timestamp_nanos())
        .map_err(|_| StoreError::Malformed(format!("timestamp {at} out of range")))
}

fn from_nanos(nanos: i64) -> StoreResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos))
        .map_err(|err| StoreError::Malformed(format!("timestamp {nanos}: {err}")))
}

fn parse_uuid(raw: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(raw).map_err(|err| StoreError::Malformed(format!("{raw}: {err}")))
}
