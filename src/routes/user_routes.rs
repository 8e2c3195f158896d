use axum::{middleware, routing::get, Router};

use crate::controllers::user_controllers::list_users;
use crate::middleware::jwt::jwt_auth;
use crate::state::AppState;

pub fn user_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_users::list_users))
        .layer(middleware::from_fn(jwt_auth))
        .with_state(state)
}
