use axum::extract::Extension;
use axum::Json;
use serde::Deserialize;

use crate::common::UserId;
use crate::domains::auth::LoginOutcome;
use crate::server::app::AxumAppState;
use crate::server::ApiError;

/// A chat message forwarded by the bot front end.
#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    pub user_id: UserId,
    pub text: String,
}

pub async fn message_handler(
    Extension(state): Extension<AxumAppState>,
    Json(msg): Json<InboundMessage>,
) -> Result<Json<LoginOutcome>, ApiError> {
    let outcome = state.manager.handle_text(msg.user_id, &msg.text).await?;
    Ok(Json(outcome))
}
