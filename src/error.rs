use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Every failure the auth core can report, as a closed set.
///
/// Handlers never leak raw database or crypto errors; anything unexpected is
/// folded into `Internal` and logged at the point it happened.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Name or email already registered")]
    DuplicateCredential,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Expired token")]
    TokenExpired,

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("Email is already verified")]
    AlreadyVerified,

    #[error("User not found")]
    UserNotFound,

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Access denied")]
    Forbidden,

    #[error("Could not deliver email")]
    EmailDeliveryFailed,

    #[error("{0}")]
    Validation(String),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidCredentials
            | AuthError::TokenInvalid
            | AuthError::TokenExpired
            | AuthError::TokenRevoked
            | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::DuplicateCredential | AuthError::AlreadyVerified => StatusCode::CONFLICT,
            AuthError::PasswordMismatch => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::EmailDeliveryFailed | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        if let AuthError::Internal(ref e) = self {
            tracing::error!(error = %e, "internal error");
        }
        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(AuthError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::TokenRevoked.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::UserNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AuthError::DuplicateCredential.status(), StatusCode::CONFLICT);
        assert_eq!(AuthError::AlreadyVerified.status(), StatusCode::CONFLICT);
        assert_eq!(
            AuthError::PasswordMismatch.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AuthError::EmailDeliveryFailed.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn messages_do_not_distinguish_missing_user_from_bad_password() {
        // Both cases must surface the exact same variant and message.
        assert_eq!(
            AuthError::InvalidCredentials.to_string(),
            "Invalid credentials"
        );
    }
}
