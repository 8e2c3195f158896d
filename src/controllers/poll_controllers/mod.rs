pub mod models;

pub mod cast_vote;
pub mod create_poll;
pub mod delete_poll;
pub mod get_my_polls;
pub mod get_poll;
pub mod get_polls;
pub mod get_results;
pub mod update_allowed_users;
pub mod update_poll;

use mongodb::bson::oid::ObjectId;

use crate::utils::error::{AppError, AppResult};

pub(crate) fn parse_poll_id(raw: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(raw).map_err(|_| AppError::invalid_input("pollId", "Invalid poll id"))
}
