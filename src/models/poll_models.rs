use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// A poll document. Field names are camelCase on the wire and in BSON.
///
/// `isActive` is deliberately not a stored field; it is derived from
/// `expires_at` on every read so it can never go stale.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub options: Vec<PollOption>,
    pub created_by: ObjectId,
    pub is_public: bool,
    #[serde(default)]
    pub allowed_users: Vec<ObjectId>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PollOption {
    pub text: String,
    pub votes: u32,
    #[serde(default)]
    pub voted_by: Vec<ObjectId>,
}

impl PollOption {
    pub fn new(text: String) -> Self {
        PollOption {
            text,
            votes: 0,
            voted_by: Vec::new(),
        }
    }
}

impl Poll {
    /// Derived, never persisted. Once false it stays false.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Whether the user has a vote recorded on any option of this poll.
    pub fn has_voted(&self, user: &ObjectId) -> bool {
        self.options.iter().any(|opt| opt.voted_by.contains(user))
    }

    pub fn total_votes(&self) -> u32 {
        self.options.iter().map(|opt| opt.votes).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn poll_expiring_at(expires_at: DateTime<Utc>) -> Poll {
        let now = Utc::now();
        Poll {
            id: ObjectId::new(),
            title: "t".to_string(),
            description: None,
            options: vec![
                PollOption::new("a".to_string()),
                PollOption::new("b".to_string()),
            ],
            created_by: ObjectId::new(),
            is_public: true,
            allowed_users: Vec::new(),
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn is_active_flips_exactly_at_expiry() {
        let now = Utc::now();
        let poll = poll_expiring_at(now + Duration::minutes(5));
        assert!(poll.is_active(now));
        assert!(!poll.is_active(poll.expires_at));
        assert!(!poll.is_active(poll.expires_at + Duration::seconds(1)));
    }

    #[test]
    fn total_votes_sums_voter_sets() {
        let mut poll = poll_expiring_at(Utc::now() + Duration::minutes(5));
        let u1 = ObjectId::new();
        let u2 = ObjectId::new();
        poll.options[0].votes = 1;
        poll.options[0].voted_by.push(u1);
        poll.options[1].votes = 1;
        poll.options[1].voted_by.push(u2);
        assert_eq!(poll.total_votes(), 2);
        assert!(poll.has_voted(&u1));
        assert!(poll.has_voted(&u2));
        assert!(!poll.has_voted(&ObjectId::new()));
    }
}
