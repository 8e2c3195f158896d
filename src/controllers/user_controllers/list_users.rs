use axum::{
    extract::{Extension, State},
    Json,
};
use serde::Serialize;

use crate::middleware::jwt::Claims;
use crate::models::user_models::Role;
use crate::state::AppState;
use crate::utils::error::AppResult;

#[derive(Serialize, Debug)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
}

/// Regular users, for the allow-list picker in the admin dashboard.
pub async fn list_users(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<Vec<UserResponse>>> {
    claims.require_admin()?;

    let users = state.users.find_by_role(Role::User).await?;
    Ok(Json(
        users
            .into_iter()
            .map(|user| UserResponse {
                id: user.id.to_hex(),
                username: user.username,
                email: user.email,
            })
            .collect(),
    ))
}
