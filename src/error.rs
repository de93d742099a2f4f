use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Domain errors returned to clients.
///
/// Every variant except `Internal` is operational: expected, user-facing,
/// and safe to render with its message. `Internal` wraps anything
/// unanticipated; it is logged with full detail and surfaced opaquely.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    // Deliberately generic: never distinguishes unknown email from wrong password.
    #[error("Incorrect email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("You do not have permission to perform this action")]
    Forbidden,

    #[error("{0}")]
    NotFound(String),

    // Covers mismatch, expiry and never-existed alike.
    #[error("Token is invalid or has expired")]
    InvalidOrExpiredToken,

    #[error("Too many requests. Please try again later.")]
    RateLimited,

    #[error("There was an error sending the email. Try again later!")]
    Delivery,

    #[error("Something went wrong")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) | Self::InvalidOrExpiredToken => {
                StatusCode::BAD_REQUEST
            }
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidCredentials | Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Delivery | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Expected, user-facing errors. Anything else is a fault we only
    /// describe to the client as "Something went wrong".
    pub fn is_operational(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if self.is_operational() {
            self.to_string()
        } else {
            if let Self::Internal(ref e) = self {
                error!(error = ?e, "unhandled internal error");
            }
            "Something went wrong".to_string()
        };
        let envelope = if status.is_server_error() { "error" } else { "fail" };
        let body = Json(json!({ "status": envelope, "message": message }));
        (status, body).into_response()
    }
}
