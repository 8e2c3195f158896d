use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::models::poll_models::Poll;
use crate::policy;
use crate::services::poll_service::{AllowedUsersDiff, PollResults, PollWithCreator, UserSummary};

fn default_is_public() -> bool {
    true
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollRequest {
    pub title: String,
    pub description: Option<String>,
    pub options: Vec<String>,
    #[serde(default = "default_is_public")]
    pub is_public: bool,
    pub duration_minutes: i64,
    #[serde(default)]
    pub allowed_users: Vec<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePollRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteRequest {
    pub option_index: i64,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAllowedUsersRequest {
    pub allowed_users: Vec<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CreatorResponse {
    pub id: String,
    pub username: String,
    pub email: String,
}

impl From<&UserSummary> for CreatorResponse {
    fn from(summary: &UserSummary) -> Self {
        CreatorResponse {
            id: summary.id.to_hex(),
            username: summary.username.clone(),
            email: summary.email.clone(),
        }
    }
}

/// Per-option view without the voter set; voters stay server-side.
#[derive(Serialize, Debug)]
pub struct OptionResponse {
    pub text: String,
    pub votes: u32,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub options: Vec<OptionResponse>,
    pub created_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator: Option<CreatorResponse>,
    pub is_public: bool,
    pub allowed_users: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub user_has_voted: bool,
    pub can_vote: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PollResponse {
    pub fn from_poll(poll: &Poll, viewer: &ObjectId) -> Self {
        let now = Utc::now();
        PollResponse {
            id: poll.id.to_hex(),
            title: poll.title.clone(),
            description: poll.description.clone(),
            options: poll
                .options
                .iter()
                .map(|opt| OptionResponse {
                    text: opt.text.clone(),
                    votes: opt.votes,
                })
                .collect(),
            created_by: poll.created_by.to_hex(),
            creator: None,
            is_public: poll.is_public,
            allowed_users: poll.allowed_users.iter().map(|id| id.to_hex()).collect(),
            expires_at: poll.expires_at,
            is_active: poll.is_active(now),
            user_has_voted: poll.has_voted(viewer),
            can_vote: policy::can_vote(poll, viewer, now),
            created_at: poll.created_at,
            updated_at: poll.updated_at,
        }
    }

    pub fn from_poll_with_creator(record: &PollWithCreator, viewer: &ObjectId) -> Self {
        let mut response = Self::from_poll(&record.poll, viewer);
        response.creator = record.creator.as_ref().map(CreatorResponse::from);
        response
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OptionTallyResponse {
    pub text: String,
    pub votes: u32,
    pub percentage: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PollResultsResponse {
    pub poll_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub total_votes: u32,
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
    pub results: Vec<OptionTallyResponse>,
    pub user_has_voted: bool,
}

impl From<PollResults> for PollResultsResponse {
    fn from(results: PollResults) -> Self {
        PollResultsResponse {
            poll_id: results.poll_id.to_hex(),
            title: results.title,
            description: results.description,
            total_votes: results.total_votes,
            is_active: results.is_active,
            expires_at: results.expires_at,
            results: results
                .options
                .into_iter()
                .map(|opt| OptionTallyResponse {
                    text: opt.text,
                    votes: opt.votes,
                    percentage: opt.percentage,
                })
                .collect(),
            user_has_voted: results.user_has_voted,
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AllowedUsersResponse {
    pub poll: PollResponse,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl AllowedUsersResponse {
    pub fn new(poll: &Poll, diff: &AllowedUsersDiff, viewer: &ObjectId) -> Self {
        AllowedUsersResponse {
            poll: PollResponse::from_poll(poll, viewer),
            added: diff.added.iter().map(|id| id.to_hex()).collect(),
            removed: diff.removed.iter().map(|id| id.to_hex()).collect(),
        }
    }
}
