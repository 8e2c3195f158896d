use axum::{
    extract::{Extension, Path, State},
    Json,
};

use crate::controllers::poll_controllers::models::PollResponse;
use crate::controllers::poll_controllers::parse_poll_id;
use crate::middleware::jwt::Claims;
use crate::state::AppState;
use crate::utils::error::AppResult;

pub async fn get_poll(
    Path(poll_id): Path<String>,
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<PollResponse>> {
    let poll_id = parse_poll_id(&poll_id)?;
    let user = claims.user_id()?;

    let record = state.service.get_one(poll_id, user).await?;
    Ok(Json(PollResponse::from_poll_with_creator(&record, &user)))
}
