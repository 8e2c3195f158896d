use axum::{
    extract::{Extension, Path, State},
    Json,
};

use crate::controllers::poll_controllers::models::{CastVoteRequest, PollResponse};
use crate::controllers::poll_controllers::parse_poll_id;
use crate::middleware::jwt::Claims;
use crate::state::AppState;
use crate::utils::error::AppResult;

pub async fn cast_vote(
    Path(poll_id): Path<String>,
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CastVoteRequest>,
) -> AppResult<Json<PollResponse>> {
    let poll_id = parse_poll_id(&poll_id)?;
    let user = claims.user_id()?;

    let poll = state
        .service
        .vote(poll_id, payload.option_index, user)
        .await?;
    Ok(Json(PollResponse::from_poll(&poll, &user)))
}
