use axum::{http::StatusCode, response::{IntoResponse, Response}};

use crate::store::StoreError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

/// Request-level failures that map onto a specific status code.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("no identity bound to this session")]
    Unauthenticated,
    #[error("sender {0} is not the signed in user")]
    SenderMismatch(String),
    #[error("message content is empty")]
    EmptyMessage,
    #[error("user id is empty")]
    BlankIdentity,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        if let Some(err) = self.0.downcast_ref::<ApiError>() {
            return match err {
                ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
                ApiError::SenderMismatch(_) => StatusCode::FORBIDDEN,
                ApiError::EmptyMessage | ApiError::BlankIdentity => StatusCode::BAD_REQUEST,
            };
        }

        match self.0.downcast_ref::<StoreError>() {
            Some(StoreError::ConversationNotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
            (status, format!("{}\n\n{}", self.0, self.0.backtrace())).into_response()
        } else {
            (status, self.0.to_string()).into_response()
        }
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
