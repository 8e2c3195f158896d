use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
};

use crate::controllers::poll_controllers::parse_poll_id;
use crate::middleware::jwt::Claims;
use crate::state::AppState;
use crate::utils::error::AppResult;

pub async fn delete_poll(
    Path(poll_id): Path<String>,
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<StatusCode> {
    let poll_id = parse_poll_id(&poll_id)?;
    let user = claims.user_id()?;

    state.service.remove(poll_id, user, claims.role).await?;
    Ok(StatusCode::NO_CONTENT)
}
