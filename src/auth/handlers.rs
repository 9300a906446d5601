use axum::{
    extract::{FromRef, Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, LoginRequest, MessageResponse, RefreshResponse,
            RegisterRequest, ResetPasswordRequest, UpdatePasswordRequest, UpdateRoleRequest,
        },
        extractors::{AdminUser, AuthUser},
        flows, session,
        tokens::JwtKeys,
        user::PublicUser,
    },
    error::{AuthError, AuthResult},
    state::AppState,
};

const ACCESS_COOKIE: &str = "accessToken";
const REFRESH_COOKIE: &str = "refreshToken";
// Deployment knob, deliberately not tied to either token's signed expiry.
const COOKIE_MAX_AGE_DAYS: i64 = 7;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/verify-email/:token", get(verify_email))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/refresh-token", post(refresh))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password/:token", post(reset_password))
        .route("/update-password", post(update_password))
        .route("/profile", get(profile))
        .route("/get-all-user", get(list_users))
        .route("/update/role/:user_id", put(update_role))
        .route("/user/:user_id", delete(delete_user))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn check_email(email: &str) -> AuthResult<()> {
    if !is_valid_email(email) {
        warn!(email = %email, "invalid email");
        return Err(AuthError::Validation("Invalid email".into()));
    }
    Ok(())
}

fn check_password(password: &str) -> AuthResult<()> {
    if password.len() < 8 {
        warn!("password too short");
        return Err(AuthError::Validation("Password too short".into()));
    }
    Ok(())
}

fn auth_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::days(COOKIE_MAX_AGE_DAYS))
        .path("/")
        .build()
}

fn expired_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<PublicUser>), AuthError> {
    payload.name = payload.name.trim().to_lowercase();
    payload.email = payload.email.trim().to_lowercase();

    if payload.name.is_empty() {
        return Err(AuthError::Validation("Name is required".into()));
    }
    check_email(&payload.email)?;
    check_password(&payload.password)?;

    let user = flows::register(
        state.store.as_ref(),
        state.mailer.as_ref(),
        &state.config,
        &payload.name,
        &payload.email,
        &payload.password,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

// The plaintext token stays out of the span.
#[instrument(skip(state, token))]
async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<PublicUser>, AuthError> {
    let user = flows::verify_email(state.store.as_ref(), &token).await?;
    Ok(Json(user))
}

#[instrument(skip(state, payload, jar))]
async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(mut payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), AuthError> {
    payload.email = payload.email.trim().to_lowercase();
    check_email(&payload.email)?;

    let keys = JwtKeys::from_ref(&state);
    let (tokens, user) = session::login(
        state.store.as_ref(),
        &keys,
        &payload.email,
        &payload.password,
    )
    .await?;

    let secure = state.config.secure_cookies;
    let jar = jar
        .add(auth_cookie(ACCESS_COOKIE, tokens.access_token.clone(), secure))
        .add(auth_cookie(REFRESH_COOKIE, tokens.refresh_token, secure));

    Ok((
        jar,
        Json(AuthResponse {
            access_token: tokens.access_token,
            user,
        }),
    ))
}

#[instrument(skip(state, user, jar))]
async fn logout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    jar: CookieJar,
) -> Result<(CookieJar, Json<MessageResponse>), AuthError> {
    session::logout(state.store.as_ref(), user.id).await?;

    let jar = jar
        .remove(expired_cookie(ACCESS_COOKIE))
        .remove(expired_cookie(REFRESH_COOKIE));

    Ok((
        jar,
        Json(MessageResponse {
            message: "Logged out",
        }),
    ))
}

#[instrument(skip(state, jar))]
async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<RefreshResponse>), AuthError> {
    let presented = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(AuthError::Unauthenticated)?;

    let keys = JwtKeys::from_ref(&state);
    let tokens = session::refresh(state.store.as_ref(), &keys, &presented).await?;

    let secure = state.config.secure_cookies;
    let jar = jar
        .add(auth_cookie(ACCESS_COOKIE, tokens.access_token.clone(), secure))
        .add(auth_cookie(REFRESH_COOKIE, tokens.refresh_token, secure));

    Ok((
        jar,
        Json(RefreshResponse {
            access_token: tokens.access_token,
        }),
    ))
}

#[instrument(skip(state, payload))]
async fn forgot_password(
    State(state): State<AppState>,
    Json(mut payload): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    payload.email = payload.email.trim().to_lowercase();
    check_email(&payload.email)?;

    flows::forgot_password(
        state.store.as_ref(),
        state.mailer.as_ref(),
        &state.config,
        &payload.email,
    )
    .await?;

    Ok(Json(MessageResponse {
        message: "Password reset email sent",
    }))
}

#[instrument(skip(state, token, payload))]
async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<PublicUser>, AuthError> {
    check_password(&payload.password)?;
    let user = flows::reset_password(
        state.store.as_ref(),
        &token,
        &payload.password,
        &payload.confirm_password,
    )
    .await?;
    Ok(Json(user))
}

#[instrument(skip(state, user, payload))]
async fn update_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<UpdatePasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    check_password(&payload.new_password)?;
    flows::update_password(
        state.store.as_ref(),
        &user,
        &payload.old_password,
        &payload.new_password,
        &payload.confirm_password,
    )
    .await?;
    Ok(Json(MessageResponse {
        message: "Password updated",
    }))
}

#[instrument(skip(user))]
async fn profile(AuthUser(user): AuthUser) -> Json<PublicUser> {
    Json(PublicUser::from(user))
}

#[instrument(skip(state, _admin))]
async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<PublicUser>>, AuthError> {
    let users = state.store.list().await?;
    Ok(Json(users.iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, _admin, payload))]
async fn update_role(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<PublicUser>, AuthError> {
    let user = state.store.set_role(user_id, payload.role).await?;
    Ok(Json(PublicUser::from(user)))
}

#[instrument(skip(state, _admin))]
async fn delete_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AuthError> {
    state.store.delete(user_id).await?;
    Ok(Json(MessageResponse {
        message: "User deleted",
    }))
}
