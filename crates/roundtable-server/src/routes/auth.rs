//! Registration, login, and the current-user endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use roundtable_store::User;
use roundtable_token::default_user_ttl;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::extract::AuthUser;
use crate::validate::{
    validate_display_name, validate_email, validate_registration_password,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// `POST /auth/register`
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let email = req.email.trim().to_lowercase();
    if let Some(msg) = validate_email(&email) {
        return Err(ApiError::Validation(msg));
    }
    if let Some(msg) = validate_registration_password(&req.password) {
        return Err(ApiError::Validation(msg));
    }
    if let Some(msg) = validate_display_name(&req.display_name) {
        return Err(ApiError::Validation(msg));
    }
    let display_name = req.display_name.trim();

    let user = state
        .users
        .create_user(&email, &req.password, display_name)
        .await?;
    let (token, expires_at) = state
        .tokens
        .generate_user_token(user.id, default_user_ttl())?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user,
            token,
            expires_at,
        }),
    ))
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let email = req.email.trim().to_lowercase();
    if let Some(msg) = validate_email(&email) {
        return Err(ApiError::Validation(msg));
    }
    if req.password.is_empty() {
        return Err(ApiError::Validation("password is required".to_string()));
    }

    let user = state
        .users
        .verify_password(&email, &req.password)
        .await?
        .ok_or(ApiError::Unauthorized("invalid email or password"))?;
    let (token, expires_at) = state
        .tokens
        .generate_user_token(user.id, default_user_ttl())?;

    Ok(Json(AuthResponse {
        user,
        token,
        expires_at,
    }))
}

/// `GET /users/me`
pub async fn me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<User>, ApiError> {
    let user = state
        .users
        .get_user_by_id(claims.user_id)
        .await?
        .ok_or(ApiError::Unauthorized("unauthorized"))?;
    Ok(Json(user))
}
