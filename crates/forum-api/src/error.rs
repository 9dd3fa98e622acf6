use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use forum_db::models::UniqueField;
use forum_types::api::ErrorResponse;
use forum_types::models::InvalidVoteValue;

/// Failure outcomes of the credential, session, identity and vote components.
#[derive(Debug, Error)]
pub enum ForumError {
    /// No session cookie, an unknown token, an expired session, or bad
    /// login credentials. Deliberately carries no detail.
    #[error("authentication required")]
    Unauthenticated,

    #[error("{0} is already registered")]
    ConstraintViolation(UniqueField),

    #[error("vote value must be +1 or -1, got {0}")]
    InvalidVoteValue(i64),

    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// The body did not decode into the expected request shape.
    #[error("invalid request body: {message}")]
    InvalidBody { status: StatusCode, message: String },

    #[error("session lifetime out of range")]
    SessionTtl,

    #[error("password hashing failed: {0}")]
    HashingError(String),

    #[error("store unavailable: {0:#}")]
    StoreUnavailable(anyhow::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<anyhow::Error> for ForumError {
    fn from(err: anyhow::Error) -> Self {
        Self::StoreUnavailable(err)
    }
}

impl From<InvalidVoteValue> for ForumError {
    fn from(err: InvalidVoteValue) -> Self {
        Self::InvalidVoteValue(err.0)
    }
}

impl ForumError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::ConstraintViolation(_) => StatusCode::CONFLICT,
            Self::InvalidVoteValue(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::InvalidBody { status, .. } => *status,
            Self::HashingError(_) | Self::SessionTtl | Self::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ForumError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            error!("{}", self);
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (
            status,
            Json(ErrorResponse {
                success: false,
                error: message,
            }),
        )
            .into_response()
    }
}

/// Run blocking work (SQLite, Argon2) off the async runtime.
pub async fn blocking<F, T>(f: F) -> Result<T, ForumError>
where
    F: FnOnce() -> Result<T, ForumError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}
