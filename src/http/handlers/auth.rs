use axum::extract::{Path, State};
use axum::Json;
use chrono::{Duration, Utc};

use super::HandlerResult;
use crate::access::Identity;
use crate::auth::{
    generate_reset_token, hash_password, hash_reset_token, secrets_match, verify_password,
};
use crate::engine::{normalize_email, NewAccount};
use crate::http::dto::{
    AuthResponse, ForgotPasswordRequest, ForgotPasswordResponse, LoginRequest, MeResponse,
    MessageResponse, RegisterRequest, ResetPasswordRequest, UserDto,
};
use crate::http::error::AppError;
use crate::http::extract::{Caller, ValidJson};
use crate::http::state::AppState;
use crate::limits::RESET_TOKEN_TTL_MINUTES;

const RESET_REQUESTED: &str = "If that email is registered, a reset link has been sent.";

/// Argon2 is deliberately slow; keep it off the async workers.
async fn hash_off_thread(password: String) -> Result<String, AppError> {
    Ok(tokio::task::spawn_blocking(move || hash_password(&password)).await??)
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<RegisterRequest>,
) -> HandlerResult<AuthResponse> {
    let password_hash = hash_off_thread(req.password).await?;
    let user = state
        .engine
        .register(NewAccount {
            email: req.email,
            password_hash,
            first_name: req.first_name,
            last_name: req.last_name,
        })
        .await?;
    let token = state.tokens.issue(&Identity::Customer(user.id), &user.email)?;
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

/// POST /api/auth/login
///
/// The configured administrator pair is checked first; any other user name
/// is looked up as a customer email.
pub async fn login(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<LoginRequest>,
) -> HandlerResult<AuthResponse> {
    let admin = &state.config.admin;
    if let Some(ref admin_password) = admin.password
        && req.username.trim() == admin.username
        && secrets_match(&req.password, admin_password)
    {
        let token = state.tokens.issue(&Identity::Admin, &admin.email)?;
        tracing::info!("administrator logged in");
        return Ok(Json(AuthResponse {
            token,
            user: UserDto::admin(&admin.email),
        }));
    }

    let invalid = || {
        metrics::counter!(crate::observability::AUTH_FAILURES_TOTAL).increment(1);
        AppError::Unauthorized("invalid credentials")
    };
    let user = state
        .engine
        .find_account(&req.username)
        .await
        .ok_or_else(invalid)?;
    let stored = user.password_hash.clone();
    let password = req.password;
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored)).await?;
    if !matches {
        return Err(invalid());
    }

    let token = state.tokens.issue(&Identity::Customer(user.id), &user.email)?;
    Ok(Json(AuthResponse {
        token,
        user: user.into(),
    }))
}

/// GET /api/auth/me
pub async fn me(State(state): State<AppState>, caller: Caller) -> HandlerResult<MeResponse> {
    let user = match caller.identity {
        Identity::Admin => UserDto::admin(&caller.email),
        Identity::Customer(id) => state
            .engine
            .user(&id)
            .await
            .map(UserDto::from)
            .ok_or(AppError::Unauthorized("account no longer exists"))?,
    };
    Ok(Json(MeResponse { user }))
}

/// POST /api/auth/forgot-password
///
/// Answers with the same body whether or not the email is registered. An
/// unknown address gets a link whose token was never stored, so it can only
/// fail at reset time like any expired one.
pub async fn forgot_password(
    State(state): State<AppState>,
    ValidJson(req): ValidJson<ForgotPasswordRequest>,
) -> HandlerResult<ForgotPasswordResponse> {
    let email = normalize_email(&req.email);
    let token = generate_reset_token();
    let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES);
    let issued = state
        .engine
        .issue_reset_token(&email, hash_reset_token(&token), expires_at)
        .await?;

    let reset_url = state.config.reset_url(&token);
    match issued {
        Some(user) => tracing::info!(user_id = %user.id, reset_url = %reset_url, "password reset requested"),
        None => tracing::debug!("password reset requested for unknown email"),
    }
    Ok(Json(ForgotPasswordResponse {
        message: RESET_REQUESTED.into(),
        reset_url,
    }))
}

/// POST /api/auth/reset-password/{token}
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ValidJson(req): ValidJson<ResetPasswordRequest>,
) -> HandlerResult<MessageResponse> {
    let password_hash = hash_off_thread(req.password).await?;
    state
        .engine
        .reset_password(&hash_reset_token(&token), password_hash, Utc::now())
        .await?;
    Ok(Json(MessageResponse::new("Password reset successful")))
}
