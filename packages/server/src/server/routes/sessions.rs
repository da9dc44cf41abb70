//! Stored session endpoints.

use axum::extract::{Extension, Path};
use axum::Json;
use serde::Deserialize;

use crate::common::UserId;
use crate::domains::auth::LoginOutcome;
use crate::server::app::AxumAppState;
use crate::server::ApiError;

#[derive(Debug, Deserialize)]
pub struct ImportSessionRequest {
    pub session: String,
}

pub async fn list_sessions_handler(
    Extension(state): Extension<AxumAppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<LoginOutcome>, ApiError> {
    let outcome = state.manager.list_sessions(user_id).await?;
    Ok(Json(outcome))
}

pub async fn import_session_handler(
    Extension(state): Extension<AxumAppState>,
    Path(user_id): Path<UserId>,
    Json(req): Json<ImportSessionRequest>,
) -> Result<Json<LoginOutcome>, ApiError> {
    let outcome = state.manager.import_session(user_id, &req.session).await?;
    Ok(Json(outcome))
}

pub async fn relay_code_handler(
    Extension(state): Extension<AxumAppState>,
    Path((user_id, session_id)): Path<(UserId, String)>,
) -> Result<Json<LoginOutcome>, ApiError> {
    let outcome = state.manager.relay_code(user_id, &session_id).await?;
    Ok(Json(outcome))
}
