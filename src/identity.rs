//! Caller identity, read from the cookie session.
//!
//! Accounts and sign-in belong to an external provider; `POST /identity` only
//! records the id that provider vouched for so later requests can be stamped.

use axum::{
    Json, Router, debug_handler,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{
    AppState,
    appresult::{ApiError, AppError, AppResult},
};

pub const USER_ID: &str = "user_id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| anyhow::Error::msg(msg))?;

        let id = session
            .get::<String>(USER_ID)
            .await?
            .ok_or(ApiError::Unauthenticated)?;

        Ok(CurrentUser { id })
    }
}

#[derive(Deserialize)]
pub(crate) struct IdentityRequest {
    user_id: String,
}

#[debug_handler]
pub(crate) async fn current_user(user: CurrentUser) -> Json<CurrentUser> {
    Json(user)
}

#[debug_handler]
pub(crate) async fn bind_identity(
    session: Session,
    Json(IdentityRequest { user_id }): Json<IdentityRequest>,
) -> AppResult<StatusCode> {
    if user_id.trim().is_empty() {
        return Err(ApiError::BlankIdentity.into());
    }

    session.insert(USER_ID, &user_id).await?;
    tracing::info!(%user_id, "identity bound to session");
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/identity", get(current_user).post(bind_identity))
}
