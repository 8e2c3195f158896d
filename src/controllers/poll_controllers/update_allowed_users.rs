use axum::{
    extract::{Extension, Path, State},
    Json,
};
use mongodb::bson::oid::ObjectId;

use crate::controllers::poll_controllers::models::{AllowedUsersResponse, UpdateAllowedUsersRequest};
use crate::controllers::poll_controllers::parse_poll_id;
use crate::middleware::jwt::Claims;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};

pub async fn update_allowed_users(
    Path(poll_id): Path<String>,
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateAllowedUsersRequest>,
) -> AppResult<Json<AllowedUsersResponse>> {
    let poll_id = parse_poll_id(&poll_id)?;
    let user = claims.user_id()?;

    let allowed = payload
        .allowed_users
        .iter()
        .map(|raw| {
            ObjectId::parse_str(raw)
                .map_err(|_| AppError::invalid_input("allowedUsers", "Invalid user id"))
        })
        .collect::<AppResult<Vec<ObjectId>>>()?;

    let (poll, diff) = state
        .service
        .update_allowed_users(poll_id, allowed, user, claims.role)
        .await?;
    Ok(Json(AllowedUsersResponse::new(&poll, &diff, &user)))
}
