use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::auth::extractor::AuthUser;
use crate::error::AppError;
use crate::state::SharedState;

/// Profile and quota of the signed-in user.
pub async fn me(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = state
        .store
        .find_user(auth.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Unknown user".to_string()))?;

    Ok(Json(json!({
        "user": user,
        "quota": user.quota_info(),
    })))
}
