//! Login attempt endpoints.

use axum::extract::{Extension, Path};
use axum::Json;
use serde::Deserialize;

use crate::common::UserId;
use crate::domains::auth::models::AttemptSnapshot;
use crate::domains::auth::{LoginError, LoginOutcome};
use crate::server::app::AxumAppState;
use crate::server::ApiError;

#[derive(Debug, Deserialize)]
pub struct BeginLoginRequest {
    pub user_id: UserId,
    pub phone_number: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitCodeRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitPasswordRequest {
    pub password: String,
}

pub async fn begin_login_handler(
    Extension(state): Extension<AxumAppState>,
    Json(req): Json<BeginLoginRequest>,
) -> Result<Json<LoginOutcome>, ApiError> {
    let outcome = state
        .manager
        .begin_login(req.user_id, &req.phone_number)
        .await?;
    Ok(Json(outcome))
}

pub async fn submit_code_handler(
    Extension(state): Extension<AxumAppState>,
    Path(user_id): Path<UserId>,
    Json(req): Json<SubmitCodeRequest>,
) -> Result<Json<LoginOutcome>, ApiError> {
    let outcome = state.manager.submit_code(user_id, &req.code).await?;
    Ok(Json(outcome))
}

pub async fn submit_password_handler(
    Extension(state): Extension<AxumAppState>,
    Path(user_id): Path<UserId>,
    Json(req): Json<SubmitPasswordRequest>,
) -> Result<Json<LoginOutcome>, ApiError> {
    let outcome = state.manager.submit_password(user_id, &req.password).await?;
    Ok(Json(outcome))
}

pub async fn cancel_login_handler(
    Extension(state): Extension<AxumAppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<LoginOutcome>, ApiError> {
    let outcome = state.manager.cancel_login(user_id).await?;
    Ok(Json(outcome))
}

/// Current state of the user's attempt. Never notifies.
pub async fn get_login_handler(
    Extension(state): Extension<AxumAppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<AttemptSnapshot>, ApiError> {
    state
        .manager
        .deps()
        .access
        .check(user_id)
        .map_err(LoginError::from)?;
    let snapshot = state
        .manager
        .attempt(user_id)
        .await
        .ok_or(LoginError::NoActiveAttempt)?;
    Ok(Json(snapshot))
}
