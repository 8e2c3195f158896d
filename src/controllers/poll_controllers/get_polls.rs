use axum::{
    extract::{Extension, State},
    Json,
};

use crate::controllers::poll_controllers::models::PollResponse;
use crate::middleware::jwt::Claims;
use crate::state::AppState;
use crate::utils::error::AppResult;

pub async fn get_polls(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<PollResponse>>> {
    let user = claims.user_id()?;
    let polls = state.service.list_visible(user).await?;

    Ok(Json(
        polls
            .iter()
            .map(|record| PollResponse::from_poll_with_creator(record, &user))
            .collect(),
    ))
}
