use std::time::Duration;

use time::OffsetDateTime;
use tracing::{info, warn};

use crate::{
    auth::{
        password::{hash_password, verify_password},
        store::{NewUser, UserStore},
        tokens::OneTimeToken,
        user::{PublicUser, User},
    },
    config::AppConfig,
    error::{AuthError, AuthResult},
    mail::Mailer,
};

fn one_time_ttl(config: &AppConfig) -> Duration {
    Duration::from_secs((config.tokens.one_time_ttl_minutes as u64) * 60)
}

/// Create an unverified user and mail them a one-time verification link.
///
/// The account and its verification token survive a mail dispatch failure;
/// the failure is surfaced so the caller can retry delivery later.
pub async fn register(
    store: &dyn UserStore,
    mailer: &dyn Mailer,
    config: &AppConfig,
    name: &str,
    email: &str,
    password: &str,
) -> AuthResult<PublicUser> {
    let password_hash = hash_password(password)?;
    let user = store
        .create(NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
        })
        .await?;

    let token = OneTimeToken::generate(one_time_ttl(config));
    store
        .set_verification_token(user.id, &token.hash, token.expires_at)
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");

    let link = format!(
        "{}/api/v1/user/verify-email/{}",
        config.base_url, token.plaintext
    );
    if let Err(e) = mailer
        .send(
            &user.email,
            "Verify your Email",
            &format!("Please click on the following link: {link}"),
        )
        .await
    {
        warn!(user_id = %user.id, error = %e, "verification mail dispatch failed");
        return Err(AuthError::EmailDeliveryFailed);
    }

    Ok(PublicUser::from(user))
}

/// Redeem a verification token. Verification happens exactly once: the
/// token pair is cleared on success, so a second presentation fails.
pub async fn verify_email(store: &dyn UserStore, token: &str) -> AuthResult<PublicUser> {
    let hash = OneTimeToken::hash(token);
    let user = store
        .find_by_verification_hash(&hash, OffsetDateTime::now_utc())
        .await?
        .ok_or(AuthError::TokenInvalid)?;

    if user.is_email_verified {
        return Err(AuthError::AlreadyVerified);
    }

    store.mark_email_verified(user.id).await?;
    info!(user_id = %user.id, "email verified");

    let user = store
        .find_by_id(user.id)
        .await?
        .ok_or(AuthError::UserNotFound)?;
    Ok(PublicUser::from(user))
}

/// Issue a password-reset token and mail it.
///
/// Unlike registration, a dispatch failure here rolls the token back: a
/// reset token the user was never told about must not stay redeemable.
pub async fn forgot_password(
    store: &dyn UserStore,
    mailer: &dyn Mailer,
    config: &AppConfig,
    email: &str,
) -> AuthResult<()> {
    let user = store
        .find_by_email(email)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    let token = OneTimeToken::generate(one_time_ttl(config));
    store
        .set_reset_token(user.id, Some((&token.hash, token.expires_at)))
        .await?;

    let link = format!(
        "{}/api/v1/user/reset-password/{}",
        config.base_url, token.plaintext
    );
    if let Err(e) = mailer
        .send(
            &user.email,
            "Reset your Password",
            &format!("Please click on the following link: {link}"),
        )
        .await
    {
        warn!(user_id = %user.id, error = %e, "reset mail dispatch failed, rolling token back");
        store.set_reset_token(user.id, None).await?;
        return Err(AuthError::EmailDeliveryFailed);
    }

    info!(user_id = %user.id, "password reset token issued");
    Ok(())
}

/// Redeem a reset token and set a new password. The confirm check runs
/// before any lookup, so a mismatch never consumes the token.
pub async fn reset_password(
    store: &dyn UserStore,
    token: &str,
    new_password: &str,
    confirm_password: &str,
) -> AuthResult<PublicUser> {
    if new_password != confirm_password {
        return Err(AuthError::PasswordMismatch);
    }

    let hash = OneTimeToken::hash(token);
    let user = store
        .find_by_reset_hash(&hash, OffsetDateTime::now_utc())
        .await?
        .ok_or(AuthError::TokenInvalid)?;

    let password_hash = hash_password(new_password)?;
    store.set_password_hash(user.id, &password_hash).await?;
    store.set_reset_token(user.id, None).await?;

    info!(user_id = %user.id, "password reset");
    Ok(PublicUser::from(user))
}

/// Change the password of an already-authenticated user.
pub async fn update_password(
    store: &dyn UserStore,
    user: &User,
    old_password: &str,
    new_password: &str,
    confirm_password: &str,
) -> AuthResult<()> {
    let ok = verify_password(old_password, &user.password_hash)?;
    if !ok {
        warn!(user_id = %user.id, "update password with wrong current password");
        return Err(AuthError::InvalidCredentials);
    }
    if new_password != confirm_password {
        return Err(AuthError::PasswordMismatch);
    }

    let password_hash = hash_password(new_password)?;
    store.set_password_hash(user.id, &password_hash).await?;
    info!(user_id = %user.id, "password updated");
    Ok(())
}
