use async_trait::async_trait;
use reqwest::Url;
use serde::Serialize;
use uuid::Uuid;

use super::{Conversation, MessageRecord, MessageStore, StoreError, StoreResult};

#[derive(Serialize)]
struct NewMessage<'a> {
    sender_id: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct IdentityRequest<'a> {
    user_id: &'a str,
}

/// [`MessageStore`] backed by the conversation HTTP API.
///
/// The session cookie set by [`HttpStore::sign_in`] carries the caller's
/// identity on every later request.
#[derive(Clone)]
pub struct HttpStore {
    base_url: Url,
    http_client: reqwest::Client,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>) -> StoreResult<Self> {
        let http_client = reqwest::ClientBuilder::new()
            .cookie_store(true)
            .build()?;

        let base_url = base_url.into();
        let base_url = Url::parse(&base_url)
            .map_err(|err| StoreError::Malformed(format!("base url {base_url}: {err}")))?;

        Ok(Self { base_url, http_client })
    }

    /// Appends `segments` to the base url, percent-encoding each one, so an
    /// order id may contain `/`, `?` or `#`.
    fn endpoint(&self, segments: &[&str]) -> StoreResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::Malformed(format!("{} cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn sign_in(&self, user_id: &str) -> StoreResult<()> {
        self.http_client
            .post(self.endpoint(&["identity"])?)
            .json(&IdentityRequest { user_id })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    fn not_found(conversation_id: Uuid, res: &reqwest::Response) -> Option<StoreError> {
        (res.status() == reqwest::StatusCode::NOT_FOUND)
            .then_some(StoreError::ConversationNotFound(conversation_id))
    }
}

#[async_trait]
impl MessageStore for HttpStore {
    async fn get_or_create_conversation(&self, order_id: &str) -> StoreResult<Conversation> {
        Ok(self
            .http_client
            .post(self.endpoint(&["orders", order_id, "conversation"])?)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    async fn list_messages(&self, conversation_id: Uuid) -> StoreResult<Vec<MessageRecord>> {
        let conversation = conversation_id.to_string();
        let res = self
            .http_client
            .get(self.endpoint(&["conversations", &conversation, "messages"])?)
            .send()
            .await?;

        if let Some(err) = Self::not_found(conversation_id, &res) {
            return Err(err);
        }
        Ok(res.error_for_status()?.json().await?)
    }

    async fn create_message(
        &self,
        conversation_id: Uuid,
        sender_id: &str,
        content: &str,
    ) -> StoreResult<MessageRecord> {
        let conversation = conversation_id.to_string();
        let res = self
            .http_client
            .post(self.endpoint(&["conversations", &conversation, "messages"])?)
            .json(&NewMessage { sender_id, content })
            .send()
            .await?;

        if let Some(err) = Self::not_found(conversation_id, &res) {
            return Err(err);
        }
        Ok(res.error_for_status()?.json().await?)
    }
}
