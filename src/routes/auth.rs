use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::{CookieJar, WithRejection};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::extractor::AuthUser;
use crate::auth::jwt::{encode_token, Claims};
use crate::auth::password;
use crate::auth::tokens::{generate_refresh_token, hash_token};
use crate::config::RegistrationMode;
use crate::db;
use crate::envelope::{self, ApiResponse};
use crate::error::AppError;
use crate::models::User;
use crate::state::SharedState;

const REFRESH_TOKEN_DAYS: i64 = 7;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub id: uuid::Uuid,
    pub email: String,
    pub name: String,
}

fn auth_cookies(access_token: &str, refresh_token: &str, access_minutes: i64) -> CookieJar {
    let access = Cookie::build(("access_token", access_token.to_string()))
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(access_minutes))
        .build();

    let refresh = Cookie::build(("refresh_token", refresh_token.to_string()))
        .path("/api/auth")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::days(REFRESH_TOKEN_DAYS))
        .build();

    CookieJar::new().add(access).add(refresh)
}

fn clear_auth_cookies() -> CookieJar {
    let access = Cookie::build(("access_token", ""))
        .path("/")
        .max_age(time::Duration::ZERO)
        .build();
    let refresh = Cookie::build(("refresh_token", ""))
        .path("/api/auth")
        .max_age(time::Duration::ZERO)
        .build();
    CookieJar::new().add(access).add(refresh)
}

/// Mint an access token plus a stored refresh token for `user`.
async fn issue_session(
    state: &SharedState,
    user: User,
) -> Result<(CookieJar, AuthResponse), AppError> {
    let minutes = state.config.access_token_minutes;
    let access_token = encode_token(&Claims::new(user.id, minutes), &state.config.jwt_secret)
        .map_err(AppError::Internal)?;

    let refresh = generate_refresh_token();
    db::refresh_tokens::create(
        &state.pool,
        user.id,
        &hash_token(&refresh),
        Utc::now() + Duration::days(REFRESH_TOKEN_DAYS),
    )
    .await?;

    let jar = auth_cookies(&access_token, &refresh, minutes);
    Ok((
        jar,
        AuthResponse {
            user,
            access_token,
            refresh_token: refresh,
        },
    ))
}

/// Refresh token from a JSON body, falling back to the cookie.
fn presented_refresh_token(jar: &CookieJar, body: &Bytes) -> Result<Option<String>, AppError> {
    if !body.is_empty() {
        let req: RefreshRequest = serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON: {e}")))?;
        if let Some(token) = req.refresh_token.filter(|t| !t.is_empty()) {
            return Ok(Some(token));
        }
    }
    Ok(jar.get("refresh_token").map(|c| c.value().to_string()))
}

pub async fn register(
    State(state): State<SharedState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, AppError>,
) -> Result<(CookieJar, ApiResponse<AuthResponse>), AppError> {
    let email = req.email.trim().to_lowercase();
    let name = req.name.trim();
    if email.is_empty() || req.password.is_empty() || name.is_empty() {
        return Err(AppError::BadRequest("All fields are required".to_string()));
    }
    if email.contains('\0') || name.contains('\0') {
        return Err(AppError::BadRequest(
            "Fields must not contain NUL characters".to_string(),
        ));
    }
    if !email.contains('@') {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }
    password::check_length(&req.password).map_err(AppError::BadRequest)?;

    let pw_hash = password::hash(&req.password).map_err(AppError::Internal)?;

    // Advisory lock serializes the "first user" check in closed mode
    let mut tx = state.pool.begin().await?;
    if state.config.registration == RegistrationMode::Closed {
        sqlx::query("SELECT pg_advisory_xact_lock(1)")
            .execute(&mut *tx)
            .await?;
        if db::users::count_all(&mut *tx).await? > 0 {
            return Err(AppError::Forbidden(
                "Registration is disabled. Contact your administrator.".to_string(),
            ));
        }
    }

    let user = db::users::create(&mut *tx, &email, &pw_hash, name)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("An account with this email already exists".to_string())
            }
            _ => AppError::Database(e),
        })?;
    tx.commit().await?;

    tracing::info!(user_id = %user.id, "User registered");

    let (jar, body) = issue_session(&state, user).await?;
    Ok((jar, envelope::created(body)))
}

pub async fn login(
    State(state): State<SharedState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, AppError>,
) -> Result<(CookieJar, ApiResponse<AuthResponse>), AppError> {
    let email = req.email.trim().to_lowercase();
    // No stored email can contain NUL, and Postgres text rejects it
    if email.contains('\0') {
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    if let Err(retry_after) = state.login_limiter.check(&email) {
        return Err(AppError::RateLimited(format!(
            "Too many login attempts. Try again in {retry_after}s."
        )));
    }

    let Some(user) = db::users::find_by_email(&state.pool, &email).await? else {
        state.login_limiter.record_failure(&email);
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    };

    let valid = password::verify(&req.password, &user.password_hash).map_err(AppError::Internal)?;
    if !valid {
        state.login_limiter.record_failure(&email);
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }
    state.login_limiter.clear(&email);

    let (jar, body) = issue_session(&state, user).await?;
    Ok((jar, envelope::ok(body)))
}

pub async fn refresh(
    State(state): State<SharedState>,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, ApiResponse<AuthResponse>), AppError> {
    let refresh_value = presented_refresh_token(&jar, &body)?
        .ok_or_else(|| AppError::Unauthorized("Missing refresh token".to_string()))?;

    let stored = db::refresh_tokens::find_by_hash(&state.pool, &hash_token(&refresh_value))
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".to_string()))?;

    let reused = stored.used || !db::refresh_tokens::mark_used(&state.pool, stored.id).await?;
    if reused {
        tracing::warn!(
            user_id = %stored.user_id,
            "Refresh token reuse detected, revoking all sessions"
        );
        db::refresh_tokens::delete_all_for_user(&state.pool, stored.user_id).await?;
        return Err(AppError::Unauthorized(
            "Refresh token reuse detected. All sessions revoked.".to_string(),
        ));
    }

    if stored.expires_at < Utc::now() {
        return Err(AppError::Unauthorized("Refresh token expired".to_string()));
    }

    let user = db::users::find_by_id(&state.pool, stored.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;

    let (jar, body) = issue_session(&state, user).await?;
    Ok((jar, envelope::ok(body)))
}

pub async fn logout(
    State(state): State<SharedState>,
    jar: CookieJar,
    body: Bytes,
) -> Result<(CookieJar, ApiResponse<MessageResponse>), AppError> {
    if let Some(token) = presented_refresh_token(&jar, &body)? {
        db::refresh_tokens::delete_by_hash(&state.pool, &hash_token(&token)).await?;
    }

    Ok((
        clear_auth_cookies(),
        envelope::ok(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    ))
}

pub async fn me(auth: AuthUser) -> ApiResponse<MeResponse> {
    envelope::ok(MeResponse {
        id: auth.user_id,
        email: auth.email,
        name: auth.name,
    })
}
