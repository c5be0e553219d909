// src/handlers/auth.rs

use axum::{Json, extract::State, response::IntoResponse};
use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{ExamLoginRequest, LoginRequest},
    services::assignments,
    store::DynStore,
    utils::{
        hash::verify_password,
        jwt::{ROLE_ADMIN, ROLE_PERSONNEL, sign_jwt},
    },
};

/// Authenticates an administrator and returns a JWT token.
pub async fn login(
    State(store): State<DynStore>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let admin = store
        .find_admin_by_username(&payload.username)
        .await?
        .ok_or_else(|| AppError::AuthError("Invalid username or password".to_string()))?;

    if !verify_password(&payload.password, &admin.password)? {
        tracing::warn!("Failed admin login for '{}'", payload.username);
        return Err(AppError::AuthError(
            "Invalid username or password".to_string(),
        ));
    }

    let token = sign_jwt(
        &admin.id.to_string(),
        ROLE_ADMIN,
        Some(admin.display_name.as_str()),
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "name": admin.display_name
    })))
}

/// Exchanges a screener's sicil and one-time code for an exam session token.
/// The code is spent on success.
pub async fn exam_login(
    State(store): State<DynStore>,
    State(config): State<Config>,
    Json(payload): Json<ExamLoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    assignments::authenticate(store.as_ref(), payload.sicil, &payload.code, Utc::now()).await?;

    let token = sign_jwt(
        &payload.sicil.to_string(),
        ROLE_PERSONNEL,
        None,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "sicil": payload.sicil
    })))
}
