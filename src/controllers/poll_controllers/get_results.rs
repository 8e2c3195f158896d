use axum::{
    extract::{Extension, Path, State},
    Json,
};

use crate::controllers::poll_controllers::models::PollResultsResponse;
use crate::controllers::poll_controllers::parse_poll_id;
use crate::middleware::jwt::Claims;
use crate::state::AppState;
use crate::utils::error::AppResult;

pub async fn get_results(
    Path(poll_id): Path<String>,
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<PollResultsResponse>> {
    let poll_id = parse_poll_id(&poll_id)?;
    let user = claims.user_id()?;

    let results = state.service.get_results(poll_id, user).await?;
    Ok(Json(PollResultsResponse::from(results)))
}
