use axum::{
    extract::{Extension, State},
    Json,
};
use mongodb::bson::oid::ObjectId;

use crate::controllers::poll_controllers::models::{CreatePollRequest, PollResponse};
use crate::middleware::jwt::Claims;
use crate::services::poll_service::NewPoll;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};

pub async fn create_poll(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreatePollRequest>,
) -> AppResult<Json<PollResponse>> {
    claims.require_admin()?;
    let creator = claims.user_id()?;

    let allowed_users = payload
        .allowed_users
        .iter()
        .map(|raw| {
            ObjectId::parse_str(raw)
                .map_err(|_| AppError::invalid_input("allowedUsers", "Invalid user id"))
        })
        .collect::<AppResult<Vec<ObjectId>>>()?;

    let input = NewPoll {
        title: payload.title,
        description: payload.description,
        options: payload.options,
        is_public: payload.is_public,
        duration_minutes: payload.duration_minutes,
        allowed_users,
    };

    let poll = state.service.create(input, creator).await?;
    Ok(Json(PollResponse::from_poll(&poll, &creator)))
}
