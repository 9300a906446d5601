use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        password::verify_password,
        store::UserStore,
        tokens::JwtKeys,
        user::PublicUser,
    },
    error::{AuthError, AuthResult},
};

/// The signed pair handed out on login and refresh. The refresh token only
/// ever travels in the http-only cookie, never in a response body.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Authenticate by email and password, issue a token pair, and persist the
/// refresh token as the user's single active session credential.
///
/// An unknown email and a wrong password both surface as the same
/// `InvalidCredentials`, so the response never reveals which check failed.
pub async fn login(
    store: &dyn UserStore,
    keys: &JwtKeys,
    email: &str,
    password: &str,
) -> AuthResult<(SessionTokens, PublicUser)> {
    let user = match store.find_by_email(email).await? {
        Some(u) => u,
        None => {
            warn!(email = %email, "login for unknown email");
            return Err(AuthError::InvalidCredentials);
        }
    };

    let ok = verify_password(password, &user.password_hash)?;
    if !ok {
        warn!(user_id = %user.id, "login with wrong password");
        return Err(AuthError::InvalidCredentials);
    }

    let tokens = SessionTokens {
        access_token: keys.sign_access(user.id)?,
        refresh_token: keys.sign_refresh(user.id)?,
    };
    store
        .set_refresh_token(user.id, Some(&tokens.refresh_token))
        .await?;

    info!(user_id = %user.id, "user logged in");
    Ok((tokens, PublicUser::from(&user)))
}

/// Clear the persisted refresh token. Safe to call when already logged out.
pub async fn logout(store: &dyn UserStore, user_id: Uuid) -> AuthResult<()> {
    store.set_refresh_token(user_id, None).await?;
    info!(user_id = %user_id, "user logged out");
    Ok(())
}

/// Rotate the token pair.
///
/// The presented token must both carry a valid signature and equal the
/// refresh token currently on the user record; a token superseded by an
/// earlier rotation fails with `TokenRevoked`.
pub async fn refresh(
    store: &dyn UserStore,
    keys: &JwtKeys,
    presented: &str,
) -> AuthResult<SessionTokens> {
    let claims = keys.verify_refresh(presented)?;

    let user = store
        .find_by_id(claims.sub)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    if user.refresh_token.as_deref() != Some(presented) {
        warn!(user_id = %user.id, "presented refresh token is not the active one");
        return Err(AuthError::TokenRevoked);
    }

    let tokens = SessionTokens {
        access_token: keys.sign_access(user.id)?,
        refresh_token: keys.sign_refresh(user.id)?,
    };
    store
        .set_refresh_token(user.id, Some(&tokens.refresh_token))
        .await?;

    info!(user_id = %user.id, "session refreshed");
    Ok(tokens)
}
