use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User role. Plain users get `User`; admin-only routes require `Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// User record as stored.
///
/// The hash/expiry pairs hold at most one outstanding one-time token per
/// purpose; issuing a new one overwrites the previous pair. `refresh_token`
/// is the single currently-valid refresh token (one active session per user).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub avatar: Option<String>,
    pub role: Role,
    pub is_email_verified: bool,
    #[serde(skip_serializing)]
    pub email_verification_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub email_verification_expiry: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub forgot_password_token_hash: Option<String>,
    #[serde(skip_serializing)]
    pub forgot_password_expiry: Option<OffsetDateTime>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Sanitized projection returned to clients. Never carries the password
/// hash, the refresh token, or any one-time token material.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub role: Role,
    pub is_email_verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone(),
            role: user.role,
            is_email_verified: user.is_email_verified,
            created_at: user.created_at,
        }
    }
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        (&user).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "alice".into(),
            email: "a@x.com".into(),
            password_hash: "$argon2id$fake".into(),
            avatar: None,
            role: Role::User,
            is_email_verified: false,
            email_verification_token_hash: Some("deadbeef".into()),
            email_verification_expiry: Some(OffsetDateTime::now_utc()),
            forgot_password_token_hash: None,
            forgot_password_expiry: None,
            refresh_token: Some("some.jwt.token".into()),
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn row_serialization_skips_sensitive_fields() {
        let json = serde_json::to_string(&sample_user()).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("refresh_token"));
        assert!(!json.contains("token_hash"));
        assert!(json.contains("a@x.com"));
    }

    #[test]
    fn public_view_carries_no_secrets() {
        let public: PublicUser = sample_user().into();
        let json = serde_json::to_string(&public).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("jwt"));
        assert!(!json.contains("deadbeef"));
        assert!(json.contains("\"role\":\"user\""));
    }
}
