use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use crate::controllers::poll_controllers::{
    cast_vote, create_poll, delete_poll, get_my_polls, get_poll, get_polls, get_results,
    update_allowed_users, update_poll,
};
use crate::middleware::jwt::jwt_auth;
use crate::state::AppState;

pub fn poll_routes(state: AppState) -> Router {
    Router::new()
        .route("/", post(create_poll::create_poll).get(get_polls::get_polls))
        .route("/my-polls", get(get_my_polls::get_my_polls))
        .route(
            "/{pollId}",
            get(get_poll::get_poll)
                .patch(update_poll::update_poll)
                .delete(delete_poll::delete_poll),
        )
        .route("/{pollId}/vote", post(cast_vote::cast_vote))
        .route("/{pollId}/results", get(get_results::get_results))
        .route(
            "/{pollId}/allowed-users",
            patch(update_allowed_users::update_allowed_users),
        )
        .layer(middleware::from_fn(jwt_auth))
        .with_state(state)
}
