//! Poll access policy. Pure capability checks over `(poll, user)`, no I/O
//! and no errors. The lifecycle service maps a failed check to an error kind.
//!
//! Visibility is always checked before any active-state check, so a caller
//! without access can never learn whether a private poll has expired.

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;

use crate::models::poll_models::Poll;
use crate::models::user_models::Role;

pub fn can_view(poll: &Poll, user: &ObjectId) -> bool {
    poll.is_public || poll.created_by == *user || poll.allowed_users.contains(user)
}

pub fn can_vote(poll: &Poll, user: &ObjectId, now: DateTime<Utc>) -> bool {
    can_view(poll, user) && poll.is_active(now) && !poll.has_voted(user)
}

/// Results of an expired private poll stay visible only to the creator and
/// to users who participated; public polls stay readable after expiry.
pub fn can_view_results(poll: &Poll, user: &ObjectId, now: DateTime<Utc>) -> bool {
    poll.is_active(now) || poll.is_public || poll.created_by == *user || poll.has_voted(user)
}

/// Update, delete, and allow-list changes require an admin acting on their
/// own poll.
pub fn can_manage(poll: &Poll, user: &ObjectId, role: Role) -> bool {
    role == Role::Admin && poll.created_by == *user
}
