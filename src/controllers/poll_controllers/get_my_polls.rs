use axum::{
    extract::{Extension, State},
    Json,
};

use crate::controllers::poll_controllers::models::PollResponse;
use crate::middleware::jwt::Claims;
use crate::state::AppState;
use crate::utils::error::AppResult;

/// "My polls". For an admin this lists every poll in the system; a regular
/// user only gets polls they created.
pub async fn get_my_polls(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<PollResponse>>> {
    let user = claims.user_id()?;
    let polls = state.service.list_owned(user, claims.role).await?;

    Ok(Json(
        polls
            .iter()
            .map(|record| PollResponse::from_poll_with_creator(record, &user))
            .collect(),
    ))
}
