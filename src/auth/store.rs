use axum::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::user::{Role, User},
    error::{AuthError, AuthResult},
};

/// Input to `UserStore::create`. The password arrives already hashed; the
/// store never sees plaintext.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Persistence operations the auth core needs from the user table.
///
/// Every mutation is a single-row atomic update; token rotation and the
/// verified-flag flip rely on that rather than on application-level locks.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a new unverified user. Fails with `DuplicateCredential` when
    /// the name or email is already taken; no partial row is left behind.
    async fn create(&self, new: NewUser) -> AuthResult<User>;

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>>;

    /// Look up the user holding an unexpired verification token hash.
    async fn find_by_verification_hash(
        &self,
        hash: &str,
        now: OffsetDateTime,
    ) -> AuthResult<Option<User>>;

    /// Look up the user holding an unexpired password-reset token hash.
    async fn find_by_reset_hash(&self, hash: &str, now: OffsetDateTime)
        -> AuthResult<Option<User>>;

    /// Replace the active refresh token. `None` clears it (logout).
    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> AuthResult<()>;

    /// Overwrite the verification (hash, expiry) pair, invalidating any
    /// previously issued verification token.
    async fn set_verification_token(
        &self,
        id: Uuid,
        hash: &str,
        expires_at: OffsetDateTime,
    ) -> AuthResult<()>;

    /// Overwrite or clear the reset (hash, expiry) pair. `None` is the
    /// rollback path when the reset mail could not be delivered.
    async fn set_reset_token(
        &self,
        id: Uuid,
        token: Option<(&str, OffsetDateTime)>,
    ) -> AuthResult<()>;

    /// Flip the verified flag and clear the verification pair.
    async fn mark_email_verified(&self, id: Uuid) -> AuthResult<()>;

    async fn set_password_hash(&self, id: Uuid, hash: &str) -> AuthResult<()>;

    async fn list(&self) -> AuthResult<Vec<User>>;

    async fn set_role(&self, id: Uuid, role: Role) -> AuthResult<User>;

    async fn delete(&self, id: Uuid) -> AuthResult<()>;
}

const USER_COLUMNS: &str = "id, name, email, password_hash, avatar, role, is_email_verified, \
     email_verification_token_hash, email_verification_expiry, \
     forgot_password_token_hash, forgot_password_expiry, \
     refresh_token, created_at, updated_at";

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn map_db_err(e: sqlx::Error) -> AuthError {
    if let Some(db) = e.as_database_error() {
        if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            return AuthError::DuplicateCredential;
        }
    }
    AuthError::Internal(anyhow::anyhow!(e))
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn create(&self, new: NewUser) -> AuthResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, password_hash) \
             VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(map_db_err)?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(map_db_err)?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(map_db_err)?;
        Ok(user)
    }

    async fn find_by_verification_hash(
        &self,
        hash: &str,
        now: OffsetDateTime,
    ) -> AuthResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE email_verification_token_hash = $1 AND email_verification_expiry > $2"
        ))
        .bind(hash)
        .bind(now)
        .fetch_optional(&self.db)
        .await
        .map_err(map_db_err)?;
        Ok(user)
    }

    async fn find_by_reset_hash(
        &self,
        hash: &str,
        now: OffsetDateTime,
    ) -> AuthResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE forgot_password_token_hash = $1 AND forgot_password_expiry > $2"
        ))
        .bind(hash)
        .bind(now)
        .fetch_optional(&self.db)
        .await
        .map_err(map_db_err)?;
        Ok(user)
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> AuthResult<()> {
        sqlx::query("UPDATE users SET refresh_token = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(token)
            .execute(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    async fn set_verification_token(
        &self,
        id: Uuid,
        hash: &str,
        expires_at: OffsetDateTime,
    ) -> AuthResult<()> {
        sqlx::query(
            "UPDATE users SET email_verification_token_hash = $2, \
             email_verification_expiry = $3, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(hash)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn set_reset_token(
        &self,
        id: Uuid,
        token: Option<(&str, OffsetDateTime)>,
    ) -> AuthResult<()> {
        let (hash, expires_at) = match token {
            Some((h, e)) => (Some(h), Some(e)),
            None => (None, None),
        };
        sqlx::query(
            "UPDATE users SET forgot_password_token_hash = $2, \
             forgot_password_expiry = $3, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(hash)
        .bind(expires_at)
        .execute(&self.db)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn mark_email_verified(&self, id: Uuid) -> AuthResult<()> {
        sqlx::query(
            "UPDATE users SET is_email_verified = TRUE, \
             email_verification_token_hash = NULL, email_verification_expiry = NULL, \
             updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.db)
        .await
        .map_err(map_db_err)?;
        Ok(())
    }

    async fn set_password_hash(&self, id: Uuid, hash: &str) -> AuthResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(hash)
            .execute(&self.db)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    async fn list(&self) -> AuthResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at"
        ))
        .fetch_all(&self.db)
        .await
        .map_err(map_db_err)?;
        Ok(users)
    }

    async fn set_role(&self, id: Uuid, role: Role) -> AuthResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET role = $2, updated_at = now() WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(role)
        .fetch_optional(&self.db)
        .await
        .map_err(map_db_err)?;
        user.ok_or(AuthError::UserNotFound)
    }

    async fn delete(&self, id: Uuid) -> AuthResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .map_err(map_db_err)?;
        if result.rows_affected() == 0 {
            return Err(AuthError::UserNotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory store with the same uniqueness behavior as the Postgres
    /// schema, for exercising the session and flow logic without a database.
    #[derive(Default)]
    pub struct MemoryUserStore {
        users: Mutex<HashMap<Uuid, User>>,
    }

    impl MemoryUserStore {
        pub fn get(&self, id: Uuid) -> Option<User> {
            self.users.lock().unwrap().get(&id).cloned()
        }

        pub fn len(&self) -> usize {
            self.users.lock().unwrap().len()
        }

        fn update<F: FnOnce(&mut User)>(&self, id: Uuid, f: F) -> AuthResult<()> {
            let mut users = self.users.lock().unwrap();
            match users.get_mut(&id) {
                Some(user) => {
                    f(user);
                    user.updated_at = OffsetDateTime::now_utc();
                    Ok(())
                }
                None => Err(AuthError::UserNotFound),
            }
        }
    }

    #[async_trait]
    impl UserStore for MemoryUserStore {
        async fn create(&self, new: NewUser) -> AuthResult<User> {
            let mut users = self.users.lock().unwrap();
            if users
                .values()
                .any(|u| u.email == new.email || u.name == new.name)
            {
                return Err(AuthError::DuplicateCredential);
            }
            let now = OffsetDateTime::now_utc();
            let user = User {
                id: Uuid::new_v4(),
                name: new.name,
                email: new.email,
                password_hash: new.password_hash,
                avatar: None,
                role: Role::User,
                is_email_verified: false,
                email_verification_token_hash: None,
                email_verification_expiry: None,
                forgot_password_token_hash: None,
                forgot_password_expiry: None,
                refresh_token: None,
                created_at: now,
                updated_at: now,
            };
            users.insert(user.id, user.clone());
            Ok(user)
        }

        async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
            Ok(self.get(id))
        }

        async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .values()
                .find(|u| u.email == email)
                .cloned())
        }

        async fn find_by_verification_hash(
            &self,
            hash: &str,
            now: OffsetDateTime,
        ) -> AuthResult<Option<User>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .values()
                .find(|u| {
                    u.email_verification_token_hash.as_deref() == Some(hash)
                        && u.email_verification_expiry.map(|e| e > now).unwrap_or(false)
                })
                .cloned())
        }

        async fn find_by_reset_hash(
            &self,
            hash: &str,
            now: OffsetDateTime,
        ) -> AuthResult<Option<User>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .values()
                .find(|u| {
                    u.forgot_password_token_hash.as_deref() == Some(hash)
                        && u.forgot_password_expiry.map(|e| e > now).unwrap_or(false)
                })
                .cloned())
        }

        async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> AuthResult<()> {
            self.update(id, |u| u.refresh_token = token.map(String::from))
        }

        async fn set_verification_token(
            &self,
            id: Uuid,
            hash: &str,
            expires_at: OffsetDateTime,
        ) -> AuthResult<()> {
            self.update(id, |u| {
                u.email_verification_token_hash = Some(hash.to_string());
                u.email_verification_expiry = Some(expires_at);
            })
        }

        async fn set_reset_token(
            &self,
            id: Uuid,
            token: Option<(&str, OffsetDateTime)>,
        ) -> AuthResult<()> {
            self.update(id, |u| match token {
                Some((hash, expires_at)) => {
                    u.forgot_password_token_hash = Some(hash.to_string());
                    u.forgot_password_expiry = Some(expires_at);
                }
                None => {
                    u.forgot_password_token_hash = None;
                    u.forgot_password_expiry = None;
                }
            })
        }

        async fn mark_email_verified(&self, id: Uuid) -> AuthResult<()> {
            self.update(id, |u| {
                u.is_email_verified = true;
                u.email_verification_token_hash = None;
                u.email_verification_expiry = None;
            })
        }

        async fn set_password_hash(&self, id: Uuid, hash: &str) -> AuthResult<()> {
            self.update(id, |u| u.password_hash = hash.to_string())
        }

        async fn list(&self) -> AuthResult<Vec<User>> {
            let mut users: Vec<User> = self.users.lock().unwrap().values().cloned().collect();
            users.sort_by_key(|u| u.created_at);
            Ok(users)
        }

        async fn set_role(&self, id: Uuid, role: Role) -> AuthResult<User> {
            self.update(id, |u| u.role = role)?;
            Ok(self.get(id).expect("updated above"))
        }

        async fn delete(&self, id: Uuid) -> AuthResult<()> {
            match self.users.lock().unwrap().remove(&id) {
                Some(_) => Ok(()),
                None => Err(AuthError::UserNotFound),
            }
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicate_email_and_name() {
        let store = MemoryUserStore::default();
        store
            .create(NewUser {
                name: "alice".into(),
                email: "a@x.com".into(),
                password_hash: "h".into(),
            })
            .await
            .unwrap();

        let dup_email = store
            .create(NewUser {
                name: "other".into(),
                email: "a@x.com".into(),
                password_hash: "h".into(),
            })
            .await;
        assert!(matches!(dup_email, Err(AuthError::DuplicateCredential)));

        let dup_name = store
            .create(NewUser {
                name: "alice".into(),
                email: "b@x.com".into(),
                password_hash: "h".into(),
            })
            .await;
        assert!(matches!(dup_name, Err(AuthError::DuplicateCredential)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn expired_token_pairs_never_match() {
        let store = MemoryUserStore::default();
        let user = store
            .create(NewUser {
                name: "bob".into(),
                email: "b@x.com".into(),
                password_hash: "h".into(),
            })
            .await
            .unwrap();

        let past = OffsetDateTime::now_utc() - time::Duration::minutes(1);
        store
            .set_verification_token(user.id, "somehash", past)
            .await
            .unwrap();

        let found = store
            .find_by_verification_hash("somehash", OffsetDateTime::now_utc())
            .await
            .unwrap();
        assert!(found.is_none());
    }
}
