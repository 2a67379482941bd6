use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Input rejection with its user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid request body")]
    Body,
    #[error("Email must be at least 5 characters long")]
    EmailTooShort,
    #[error("Email must not exceed 60 characters")]
    EmailTooLong,
    #[error("Email must be a valid address")]
    EmailFormat,
    #[error("Password is required")]
    PasswordRequired,
    #[error("Password must be at least 8 characters long and include uppercase, lowercase, number, and special character")]
    PasswordWeak,
    #[error("Old password is required")]
    OldPasswordRequired,
    #[error("New password must be at least 8 characters long and include uppercase, lowercase, number, and special character")]
    NewPasswordWeak,
    #[error("Title must be at least 3 characters long")]
    TitleTooShort,
    #[error("Title must not exceed 60 characters")]
    TitleTooLong,
    #[error("Description must be at least 3 characters long")]
    DescriptionTooShort,
    #[error("Description must not exceed 600 characters")]
    DescriptionTooLong,
}

/// Every failure a handler can produce. Each variant carries the wire message
/// and maps to one status code; the body is always
/// `{"success": false, "message": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Update-post reports malformed input as a plain 400; the other routes
    /// answer 401.
    #[error(transparent)]
    InvalidUpdate(ValidationError),
    /// Signup hit an email that is already registered.
    #[error("User already exists")]
    Conflict,
    #[error("User does not exist")]
    UserNotFound,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("User already verified")]
    AlreadyVerified,
    /// No code/timestamp pair is stored for this account, or the pair was
    /// consumed by a concurrent request.
    #[error("Something went wrong with the code")]
    NoPendingCode,
    #[error("Code expired")]
    CodeExpired,
    #[error("Invalid code")]
    InvalidCode,
    /// The change-password gate requires a verified account.
    #[error("User is not verified yet")]
    NotVerified,
    /// Authenticated, but the resource belongs to someone else.
    #[error("Unauthorized")]
    Forbidden,
    /// The mail gateway rejected the message or transport failed; no code
    /// state was written.
    #[error("{0}")]
    DeliveryFailed(&'static str),
    /// Missing, malformed, or expired session credential.
    #[error("Unauthorized")]
    Unauthenticated,
    #[error("Post not found")]
    PostNotFound,
    #[error("PostId is required")]
    PostIdRequired,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::Conflict
            | ApiError::InvalidCredentials
            | ApiError::NotVerified
            | ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::UserNotFound | ApiError::PostNotFound | ApiError::PostIdRequired => {
                StatusCode::NOT_FOUND
            }
            ApiError::AlreadyVerified
            | ApiError::NoPendingCode
            | ApiError::CodeExpired
            | ApiError::InvalidCode
            | ApiError::InvalidUpdate(_)
            | ApiError::DeliveryFailed(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Internal(e) => {
                error!(error = ?e, "unhandled internal error");
                "Something went wrong".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "success": false, "message": message }))).into_response()
    }
}
