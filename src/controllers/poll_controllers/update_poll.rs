use axum::{
    extract::{Extension, Path, State},
    Json,
};

use crate::controllers::poll_controllers::models::{PollResponse, UpdatePollRequest};
use crate::controllers::poll_controllers::parse_poll_id;
use crate::middleware::jwt::Claims;
use crate::services::poll_service::PollPatch;
use crate::state::AppState;
use crate::utils::error::AppResult;

pub async fn update_poll(
    Path(poll_id): Path<String>,
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdatePollRequest>,
) -> AppResult<Json<PollResponse>> {
    let poll_id = parse_poll_id(&poll_id)?;
    let user = claims.user_id()?;

    let patch = PollPatch {
        title: payload.title,
        description: payload.description,
    };

    let poll = state
        .service
        .update(poll_id, patch, user, claims.role)
        .await?;
    Ok(Json(PollResponse::from_poll(&poll, &user)))
}
