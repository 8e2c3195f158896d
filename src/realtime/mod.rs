//! Realtime fan-out of poll lifecycle events.
//!
//! The lifecycle service talks to a `PollNotifier` it receives at
//! construction; nothing here can fail the mutation that triggered it.
//! Deliveries are best-effort, never retried, never persisted.

pub mod gateway;
pub mod session;

use mongodb::bson::oid::ObjectId;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::models::poll_models::Poll;
use self::session::SessionRegistry;

/// Lifecycle events the service emits after a durable mutation.
pub trait PollNotifier: Send + Sync {
    fn poll_created(&self, poll: &Poll);
    fn poll_updated(&self, poll: &Poll);
    /// `poll` is the pre-deletion snapshot; recipients are computed from it
    /// since the record no longer exists.
    fn poll_deleted(&self, poll: &Poll);
    fn allowed_users_changed(&self, poll: &Poll, added: &[ObjectId], removed: &[ObjectId]);
}

/// JSON shape pushed over the realtime channel. Voter sets stay private;
/// clients get per-option tallies only.
pub fn poll_payload(poll: &Poll) -> Value {
    json!({
        "id": poll.id.to_hex(),
        "title": poll.title,
        "description": poll.description,
        "options": poll.options.iter().map(|opt| json!({
            "text": opt.text,
            "votes": opt.votes,
        })).collect::<Vec<Value>>(),
        "createdBy": poll.created_by.to_hex(),
        "isPublic": poll.is_public,
        "expiresAt": poll.expires_at.to_rfc3339(),
        "isActive": poll.is_active(chrono::Utc::now()),
        "createdAt": poll.created_at.to_rfc3339(),
        "updatedAt": poll.updated_at.to_rfc3339(),
    })
}

/// WebSocket-backed notifier. Public polls go to every connected session;
/// private polls only to the creator and allow-listed users.
pub struct WsNotifier {
    registry: Arc<SessionRegistry>,
}

impl WsNotifier {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        WsNotifier { registry }
    }

    fn fan_out(&self, poll: &Poll, event: &str, data: &Value) {
        if poll.is_public {
            self.registry.broadcast_all(event, data);
        } else {
            let mut recipients = vec![poll.created_by];
            recipients.extend_from_slice(&poll.allowed_users);
            self.registry.send_to_users(&recipients, event, data);
        }
    }
}

impl PollNotifier for WsNotifier {
    fn poll_created(&self, poll: &Poll) {
        self.fan_out(poll, "pollCreated", &poll_payload(poll));
    }

    fn poll_updated(&self, poll: &Poll) {
        self.fan_out(poll, "pollUpdated", &poll_payload(poll));
    }

    fn poll_deleted(&self, poll: &Poll) {
        self.fan_out(poll, "pollDeleted", &json!({ "id": poll.id.to_hex() }));
    }

    fn allowed_users_changed(&self, poll: &Poll, added: &[ObjectId], removed: &[ObjectId]) {
        self.fan_out(poll, "allowedUsersUpdated", &poll_payload(poll));

        // Targeted pushes so clients can add/remove the poll without a
        // refetch: newly invited users get the full poll, removed users
        // just the id.
        let payload = poll_payload(poll);
        for user in added {
            self.registry
                .send_to_user(*user, "pollAccessGranted", &payload);
        }
        let revoked = json!({ "id": poll.id.to_hex() });
        for user in removed {
            self.registry
                .send_to_user(*user, "pollAccessRevoked", &revoked);
        }
    }
}
