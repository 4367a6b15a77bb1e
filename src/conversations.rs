use axum::{
    Json, Router, debug_handler,
    extract::{Path, State},
    routing::post,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    AppState,
    appresult::{ApiError, AppResult},
    identity::CurrentUser,
    store::{Conversation, MessageRecord, MessageStore, SqliteStore},
};

#[derive(Deserialize)]
pub(crate) struct NewMessageQuery {
    sender_id: String,
    content: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn conversation(
    _user: CurrentUser,
    State(store): State<SqliteStore>,
    Path(order_id): Path<String>,
) -> AppResult<Json<Conversation>> {
    Ok(Json(store.get_or_create_conversation(&order_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn messages(
    _user: CurrentUser,
    State(store): State<SqliteStore>,
    Path(conversation_id): Path<Uuid>,
) -> AppResult<Json<Vec<MessageRecord>>> {
    Ok(Json(store.list_messages(conversation_id).await?))
}

#[debug_handler(state = AppState)]
pub(crate) async fn new_message(
    user: CurrentUser,
    State(store): State<SqliteStore>,
    Path(conversation_id): Path<Uuid>,
    Json(NewMessageQuery { sender_id, content }): Json<NewMessageQuery>,
) -> AppResult<Json<MessageRecord>> {
    if sender_id != user.id {
        return Err(ApiError::SenderMismatch(sender_id).into());
    }

    let content = content.trim();
    if content.is_empty() {
        return Err(ApiError::EmptyMessage.into());
    }

    let message = store.create_message(conversation_id, &user.id, content).await?;
    tracing::debug!(%conversation_id, message_id = %message.id, sender = %user.id, "message stored");

    Ok(Json(message))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders/{order_id}/conversation", post(conversation))
        .route("/conversations/{conversation_id}/messages", post(new_message).get(messages))
}
