//! Storage contracts consumed by the lifecycle service. Two backends:
//! MongoDB for deployment and an in-memory store used when no database is
//! configured (and by the test suite).

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;

use crate::models::poll_models::Poll;
use crate::models::user_models::{Role, User};
use crate::utils::error::AppResult;

/// Outcome of the atomic vote primitive.
#[derive(Debug)]
pub enum VoteOutcome {
    /// The vote was recorded; carries the updated poll.
    Recorded(Poll),
    /// The voter already appears in some option's voter set.
    AlreadyVoted,
    /// No poll with that id.
    Missing,
}

#[async_trait]
pub trait PollStore: Send + Sync {
    async fn insert(&self, poll: &Poll) -> AppResult<()>;

    async fn find_by_id(&self, id: ObjectId) -> AppResult<Option<Poll>>;

    /// Polls that are public, created by `user`, or allow-listing `user`,
    /// in stable insertion order.
    async fn find_visible_to(&self, user: ObjectId) -> AppResult<Vec<Poll>>;

    async fn find_all(&self) -> AppResult<Vec<Poll>>;

    async fn find_created_by(&self, user: ObjectId) -> AppResult<Vec<Poll>>;

    /// Applies a title/description patch. Returns the updated poll, or
    /// `None` if the poll no longer exists.
    async fn apply_patch(
        &self,
        id: ObjectId,
        title: Option<&str>,
        description: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> AppResult<Option<Poll>>;

    async fn set_allowed_users(
        &self,
        id: ObjectId,
        allowed: &[ObjectId],
        updated_at: DateTime<Utc>,
    ) -> AppResult<Option<Poll>>;

    /// Returns true if a record was deleted.
    async fn delete(&self, id: ObjectId) -> AppResult<bool>;

    /// Atomic conditional vote: record `voter` on option `option_index`
    /// only if the voter is absent from every option's voter set. This is
    /// the serialization point for concurrent votes by the same user; votes
    /// by distinct users must both survive.
    ///
    /// The caller is responsible for bounds-checking `option_index`.
    async fn record_vote(
        &self,
        id: ObjectId,
        option_index: usize,
        voter: ObjectId,
        updated_at: DateTime<Utc>,
    ) -> AppResult<VoteOutcome>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: ObjectId) -> AppResult<Option<User>>;

    async fn find_by_role(&self, role: Role) -> AppResult<Vec<User>>;
}
