pub mod poll_routes;
pub mod user_routes;
