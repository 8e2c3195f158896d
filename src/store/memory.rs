use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use std::sync::RwLock;

use super::{PollStore, UserDirectory, VoteOutcome};
use crate::models::poll_models::Poll;
use crate::models::user_models::{Role, User};
use crate::utils::error::{AppError, AppResult};

/// In-memory poll store. Polls live in a Vec so list operations keep stable
/// insertion order. Every mutation takes the write lock for its whole
/// read-check-write sequence, which serializes votes per store (a superset
/// of the required per-poll serialization).
#[derive(Default)]
pub struct MemoryPollStore {
    polls: RwLock<Vec<Poll>>,
}

impl MemoryPollStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> AppError {
    AppError::InternalError("poll store lock poisoned".to_string())
}

#[async_trait]
impl PollStore for MemoryPollStore {
    async fn insert(&self, poll: &Poll) -> AppResult<()> {
        self.polls.write().map_err(poisoned)?.push(poll.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: ObjectId) -> AppResult<Option<Poll>> {
        let polls = self.polls.read().map_err(poisoned)?;
        Ok(polls.iter().find(|p| p.id == id).cloned())
    }

    async fn find_visible_to(&self, user: ObjectId) -> AppResult<Vec<Poll>> {
        let polls = self.polls.read().map_err(poisoned)?;
        Ok(polls
            .iter()
            .filter(|p| p.is_public || p.created_by == user || p.allowed_users.contains(&user))
            .cloned()
            .collect())
    }

    async fn find_all(&self) -> AppResult<Vec<Poll>> {
        Ok(self.polls.read().map_err(poisoned)?.clone())
    }

    async fn find_created_by(&self, user: ObjectId) -> AppResult<Vec<Poll>> {
        let polls = self.polls.read().map_err(poisoned)?;
        Ok(polls
            .iter()
            .filter(|p| p.created_by == user)
            .cloned()
            .collect())
    }

    async fn apply_patch(
        &self,
        id: ObjectId,
        title: Option<&str>,
        description: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> AppResult<Option<Poll>> {
        let mut polls = self.polls.write().map_err(poisoned)?;
        let Some(poll) = polls.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if let Some(title) = title {
            poll.title = title.to_string();
        }
        if let Some(description) = description {
            poll.description = Some(description.to_string());
        }
        poll.updated_at = updated_at;
        Ok(Some(poll.clone()))
    }

    async fn set_allowed_users(
        &self,
        id: ObjectId,
        allowed: &[ObjectId],
        updated_at: DateTime<Utc>,
    ) -> AppResult<Option<Poll>> {
        let mut polls = self.polls.write().map_err(poisoned)?;
        let Some(poll) = polls.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        poll.allowed_users = allowed.to_vec();
        poll.updated_at = updated_at;
        Ok(Some(poll.clone()))
    }

    async fn delete(&self, id: ObjectId) -> AppResult<bool> {
        let mut polls = self.polls.write().map_err(poisoned)?;
        let before = polls.len();
        polls.retain(|p| p.id != id);
        Ok(polls.len() < before)
    }

    async fn record_vote(
        &self,
        id: ObjectId,
        option_index: usize,
        voter: ObjectId,
        updated_at: DateTime<Utc>,
    ) -> AppResult<VoteOutcome> {
        let mut polls = self.polls.write().map_err(poisoned)?;
        let Some(poll) = polls.iter_mut().find(|p| p.id == id) else {
            return Ok(VoteOutcome::Missing);
        };
        if poll.has_voted(&voter) {
            return Ok(VoteOutcome::AlreadyVoted);
        }
        let Some(option) = poll.options.get_mut(option_index) else {
            return Ok(VoteOutcome::Missing);
        };
        option.votes += 1;
        option.voted_by.push(voter);
        poll.updated_at = updated_at;
        Ok(VoteOutcome::Recorded(poll.clone()))
    }
}

/// In-memory user directory, seeded at startup (memory mode) or by tests.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<Vec<User>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: User) {
        if let Ok(mut users) = self.users.write() {
            users.push(user);
        }
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_id(&self, id: ObjectId) -> AppResult<Option<User>> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_role(&self, role: Role) -> AppResult<Vec<User>> {
        let users = self.users.read().map_err(poisoned)?;
        Ok(users.iter().filter(|u| u.role == role).cloned().collect())
    }
}
