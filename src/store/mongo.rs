use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};

use super::{PollStore, UserDirectory, VoteOutcome};
use crate::models::poll_models::Poll;
use crate::models::user_models::{Role, User};
use crate::utils::error::AppResult;

pub struct MongoPollStore {
    polls: Collection<Poll>,
}

impl MongoPollStore {
    pub fn new(db: &Database) -> Self {
        MongoPollStore {
            polls: db.collection::<Poll>("polls"),
        }
    }
}

fn object_id_array(ids: &[ObjectId]) -> Bson {
    Bson::Array(ids.iter().copied().map(Bson::ObjectId).collect())
}

#[async_trait]
impl PollStore for MongoPollStore {
    async fn insert(&self, poll: &Poll) -> AppResult<()> {
        self.polls.insert_one(poll).await?;
        Ok(())
    }

    async fn find_by_id(&self, id: ObjectId) -> AppResult<Option<Poll>> {
        Ok(self.polls.find_one(doc! { "_id": id }).await?)
    }

    async fn find_visible_to(&self, user: ObjectId) -> AppResult<Vec<Poll>> {
        let cursor = self
            .polls
            .find(doc! {
                "$or": [
                    { "isPublic": true },
                    { "createdBy": user },
                    { "allowedUsers": user },
                ]
            })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_all(&self) -> AppResult<Vec<Poll>> {
        let cursor = self.polls.find(doc! {}).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn find_created_by(&self, user: ObjectId) -> AppResult<Vec<Poll>> {
        let cursor = self.polls.find(doc! { "createdBy": user }).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn apply_patch(
        &self,
        id: ObjectId,
        title: Option<&str>,
        description: Option<&str>,
        updated_at: DateTime<Utc>,
    ) -> AppResult<Option<Poll>> {
        let mut set = Document::new();
        if let Some(title) = title {
            set.insert("title", title);
        }
        if let Some(description) = description {
            set.insert("description", description);
        }
        set.insert("updatedAt", updated_at.to_rfc3339());

        let updated = self
            .polls
            .find_one_and_update(doc! { "_id": id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated)
    }

    async fn set_allowed_users(
        &self,
        id: ObjectId,
        allowed: &[ObjectId],
        updated_at: DateTime<Utc>,
    ) -> AppResult<Option<Poll>> {
        let updated = self
            .polls
            .find_one_and_update(
                doc! { "_id": id },
                doc! { "$set": {
                    "allowedUsers": object_id_array(allowed),
                    "updatedAt": updated_at.to_rfc3339(),
                }},
            )
            .return_document(ReturnDocument::After)
            .await?;
        Ok(updated)
    }

    async fn delete(&self, id: ObjectId) -> AppResult<bool> {
        let result = self.polls.delete_one(doc! { "_id": id }).await?;
        Ok(result.deleted_count == 1)
    }

    async fn record_vote(
        &self,
        id: ObjectId,
        option_index: usize,
        voter: ObjectId,
        updated_at: DateTime<Utc>,
    ) -> AppResult<VoteOutcome> {
        // Single conditional update: matches only while the voter is absent
        // from every option's voter set, so a concurrent duplicate vote
        // cannot slip past the check.
        let filter = doc! {
            "_id": id,
            "options.votedBy": { "$ne": voter },
        };

        let mut inc = Document::new();
        inc.insert(format!("options.{}.votes", option_index), 1);
        let mut push = Document::new();
        push.insert(format!("options.{}.votedBy", option_index), voter);

        let update = doc! {
            "$inc": inc,
            "$push": push,
            "$set": { "updatedAt": updated_at.to_rfc3339() },
        };

        let updated = self
            .polls
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await?;

        match updated {
            Some(poll) => Ok(VoteOutcome::Recorded(poll)),
            None => {
                // Disambiguate: missing poll vs. duplicate vote.
                match self.find_by_id(id).await? {
                    Some(_) => Ok(VoteOutcome::AlreadyVoted),
                    None => Ok(VoteOutcome::Missing),
                }
            }
        }
    }
}

pub struct MongoUserDirectory {
    users: Collection<User>,
}

impl MongoUserDirectory {
    pub fn new(db: &Database) -> Self {
        MongoUserDirectory {
            users: db.collection::<User>("users"),
        }
    }
}

#[async_trait]
impl UserDirectory for MongoUserDirectory {
    async fn find_by_id(&self, id: ObjectId) -> AppResult<Option<User>> {
        Ok(self.users.find_one(doc! { "_id": id }).await?)
    }

    async fn find_by_role(&self, role: Role) -> AppResult<Vec<User>> {
        let role_name = match role {
            Role::Admin => "admin",
            Role::User => "user",
        };
        let cursor = self.users.find(doc! { "role": role_name }).await?;
        Ok(cursor.try_collect().await?)
    }
}
