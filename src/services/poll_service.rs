//! Poll lifecycle service: the orchestration layer between the HTTP
//! handlers, the access policy, the store, and the realtime notifier.
//!
//! Every operation finishes its store mutation before notifying; delivery
//! problems are the notifier's to log, never this service's to fail on.

use chrono::{DateTime, Duration, Utc};
use mongodb::bson::oid::ObjectId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::models::poll_models::{Poll, PollOption};
use crate::models::user_models::Role;
use crate::policy;
use crate::realtime::PollNotifier;
use crate::store::{PollStore, UserDirectory, VoteOutcome};
use crate::utils::error::{AppError, AppResult};

const MIN_OPTIONS: usize = 2;
const MAX_OPTIONS: usize = 10;
const MAX_TITLE_LEN: usize = 200;
const MAX_DESCRIPTION_LEN: usize = 1000;
const MIN_DURATION_MINUTES: i64 = 1;
const MAX_DURATION_MINUTES: i64 = 120;

/// Input for `create`.
#[derive(Debug, Clone)]
pub struct NewPoll {
    pub title: String,
    pub description: Option<String>,
    pub options: Vec<String>,
    pub is_public: bool,
    pub duration_minutes: i64,
    pub allowed_users: Vec<ObjectId>,
}

/// Input for `update`. Options, duration, and visibility are immutable
/// after creation.
#[derive(Debug, Clone, Default)]
pub struct PollPatch {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// Denormalized creator info joined onto poll reads.
#[derive(Debug, Clone)]
pub struct UserSummary {
    pub id: ObjectId,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct PollWithCreator {
    pub poll: Poll,
    pub creator: Option<UserSummary>,
}

#[derive(Debug, Clone)]
pub struct OptionTally {
    pub text: String,
    pub votes: u32,
    /// Share of the total vote, rendered to two decimal places; `"0.00"`
    /// for every option when nobody has voted.
    pub percentage: String,
}

#[derive(Debug, Clone)]
pub struct PollResults {
    pub poll_id: ObjectId,
    pub title: String,
    pub description: Option<String>,
    pub total_votes: u32,
    pub is_active: bool,
    pub expires_at: DateTime<Utc>,
    pub options: Vec<OptionTally>,
    pub user_has_voted: bool,
}

#[derive(Debug, Clone)]
pub struct AllowedUsersDiff {
    pub added: Vec<ObjectId>,
    pub removed: Vec<ObjectId>,
}

pub struct PollService {
    polls: Arc<dyn PollStore>,
    users: Arc<dyn UserDirectory>,
    notifier: Arc<dyn PollNotifier>,
}

/// Trim, drop empties, dedupe while preserving first-seen order.
fn normalize_options(raw: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|text| text.trim())
        .filter(|text| !text.is_empty())
        .filter(|text| seen.insert(text.to_string()))
        .map(|text| text.to_string())
        .collect()
}

fn dedupe_ids(ids: Vec<ObjectId>) -> Vec<ObjectId> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

fn validate_title(title: &str) -> AppResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::invalid_input("title", "Title must not be empty"));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::invalid_input(
            "title",
            "Title must be at most 200 characters",
        ));
    }
    Ok(title.to_string())
}

fn validate_description(description: &str) -> AppResult<()> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(AppError::invalid_input(
            "description",
            "Description must be at most 1000 characters",
        ));
    }
    Ok(())
}

impl PollService {
    pub fn new(
        polls: Arc<dyn PollStore>,
        users: Arc<dyn UserDirectory>,
        notifier: Arc<dyn PollNotifier>,
    ) -> Self {
        PollService {
            polls,
            users,
            notifier,
        }
    }

    pub async fn create(&self, input: NewPoll, creator: ObjectId) -> AppResult<Poll> {
        let title = validate_title(&input.title)?;
        if let Some(description) = &input.description {
            validate_description(description)?;
        }
        if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&input.duration_minutes) {
            return Err(AppError::invalid_input(
                "durationMinutes",
                "Duration must be between 1 and 120 minutes",
            ));
        }

        let option_texts = normalize_options(&input.options);
        if option_texts.len() < MIN_OPTIONS {
            return Err(AppError::invalid_input(
                "options",
                "A poll needs at least 2 distinct non-empty options",
            ));
        }
        if option_texts.len() > MAX_OPTIONS {
            return Err(AppError::invalid_input(
                "options",
                "A poll can have at most 10 options",
            ));
        }

        let now = Utc::now();
        let poll = Poll {
            id: ObjectId::new(),
            title,
            description: input.description,
            options: option_texts.into_iter().map(PollOption::new).collect(),
            created_by: creator,
            is_public: input.is_public,
            allowed_users: dedupe_ids(input.allowed_users),
            expires_at: now + Duration::minutes(input.duration_minutes),
            created_at: now,
            updated_at: now,
        };

        self.polls.insert(&poll).await?;
        self.notifier.poll_created(&poll);
        Ok(poll)
    }

    pub async fn list_visible(&self, user: ObjectId) -> AppResult<Vec<PollWithCreator>> {
        let polls = self.polls.find_visible_to(user).await?;
        self.populate(polls).await
    }

    /// "My polls": for admins this is every poll in the system, not just
    /// their own. Observed contract, kept as-is and locked in by a test.
    pub async fn list_owned(&self, user: ObjectId, role: Role) -> AppResult<Vec<PollWithCreator>> {
        let polls = match role {
            Role::Admin => self.polls.find_all().await?,
            Role::User => self.polls.find_created_by(user).await?,
        };
        self.populate(polls).await
    }

    pub async fn get_one(&self, id: ObjectId, user: ObjectId) -> AppResult<PollWithCreator> {
        let poll = self
            .polls
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Poll not found".to_string()))?;

        if !policy::can_view(&poll, &user) {
            return Err(AppError::Forbidden(
                "You do not have access to this poll".to_string(),
            ));
        }

        let creator = self.creator_summary(poll.created_by).await?;
        Ok(PollWithCreator { poll, creator })
    }

    pub async fn update(
        &self,
        id: ObjectId,
        patch: PollPatch,
        user: ObjectId,
        role: Role,
    ) -> AppResult<Poll> {
        let poll = self
            .polls
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Poll not found".to_string()))?;

        if !policy::can_manage(&poll, &user, role) {
            return Err(AppError::Forbidden(
                "You can only update your own polls".to_string(),
            ));
        }
        if !poll.is_active(Utc::now()) {
            return Err(AppError::InvalidState(
                "Cannot update an expired poll".to_string(),
            ));
        }

        let title = match &patch.title {
            Some(title) => Some(validate_title(title)?),
            None => None,
        };
        if let Some(description) = &patch.description {
            validate_description(description)?;
        }

        let updated = self
            .polls
            .apply_patch(id, title.as_deref(), patch.description.as_deref(), Utc::now())
            .await?
            .ok_or_else(|| AppError::NotFound("Poll not found".to_string()))?;

        self.notifier.poll_updated(&updated);
        Ok(updated)
    }

    /// Expired polls stay deletable; recipients of the deletion event come
    /// from the pre-deletion snapshot.
    pub async fn remove(&self, id: ObjectId, user: ObjectId, role: Role) -> AppResult<()> {
        let poll = self
            .polls
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Poll not found".to_string()))?;

        if !policy::can_manage(&poll, &user, role) {
            return Err(AppError::Forbidden(
                "You can only delete your own polls".to_string(),
            ));
        }

        if !self.polls.delete(id).await? {
            return Err(AppError::NotFound("Poll not found".to_string()));
        }

        self.notifier.poll_deleted(&poll);
        Ok(())
    }

    pub async fn vote(&self, id: ObjectId, option_index: i64, user: ObjectId) -> AppResult<Poll> {
        let poll = self
            .polls
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Poll not found".to_string()))?;

        // Visibility first: a caller without access learns nothing about
        // the poll's expiry state.
        if !policy::can_view(&poll, &user) {
            return Err(AppError::Forbidden(
                "You do not have access to this poll".to_string(),
            ));
        }

        let now = Utc::now();
        if !poll.is_active(now) {
            return Err(AppError::InvalidState(
                "This poll has expired".to_string(),
            ));
        }
        if poll.has_voted(&user) {
            return Err(AppError::Conflict(
                "You have already voted in this poll".to_string(),
            ));
        }
        if option_index < 0 || option_index as usize >= poll.options.len() {
            return Err(AppError::invalid_input(
                "optionIndex",
                "Option index is out of range",
            ));
        }

        // The pre-check above gives a clean error in the common case; the
        // store's conditional write is what actually closes the race
        // between two concurrent votes by the same user.
        match self
            .polls
            .record_vote(id, option_index as usize, user, now)
            .await?
        {
            VoteOutcome::Recorded(updated) => {
                self.notifier.poll_updated(&updated);
                Ok(updated)
            }
            VoteOutcome::AlreadyVoted => Err(AppError::Conflict(
                "You have already voted in this poll".to_string(),
            )),
            VoteOutcome::Missing => Err(AppError::NotFound("Poll not found".to_string())),
        }
    }

    pub async fn get_results(&self, id: ObjectId, user: ObjectId) -> AppResult<PollResults> {
        let PollWithCreator { poll, .. } = self.get_one(id, user).await?;

        let now = Utc::now();
        if !policy::can_view_results(&poll, &user, now) {
            return Err(AppError::Forbidden(
                "You can only view results of polls you participated in".to_string(),
            ));
        }

        let total_votes = poll.total_votes();
        let options = poll
            .options
            .iter()
            .map(|opt| OptionTally {
                text: opt.text.clone(),
                votes: opt.votes,
                percentage: if total_votes == 0 {
                    "0.00".to_string()
                } else {
                    format!("{:.2}", f64::from(opt.votes) * 100.0 / f64::from(total_votes))
                },
            })
            .collect();

        Ok(PollResults {
            poll_id: poll.id,
            title: poll.title.clone(),
            description: poll.description.clone(),
            total_votes,
            is_active: poll.is_active(now),
            expires_at: poll.expires_at,
            options,
            user_has_voted: poll.has_voted(&user),
        })
    }

    pub async fn update_allowed_users(
        &self,
        id: ObjectId,
        allowed: Vec<ObjectId>,
        user: ObjectId,
        role: Role,
    ) -> AppResult<(Poll, AllowedUsersDiff)> {
        let poll = self
            .polls
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Poll not found".to_string()))?;

        if !policy::can_manage(&poll, &user, role) {
            return Err(AppError::Forbidden(
                "You can only manage your own polls".to_string(),
            ));
        }
        if poll.is_public {
            return Err(AppError::invalid_input(
                "allowedUsers",
                "Public polls do not use an allow-list",
            ));
        }

        let allowed = dedupe_ids(allowed);
        for id in &allowed {
            if self.users.find_by_id(*id).await?.is_none() {
                return Err(AppError::invalid_input(
                    "allowedUsers",
                    "Referenced user does not exist",
                ));
            }
        }

        let added: Vec<ObjectId> = allowed
            .iter()
            .filter(|id| !poll.allowed_users.contains(id))
            .copied()
            .collect();
        let removed: Vec<ObjectId> = poll
            .allowed_users
            .iter()
            .filter(|id| !allowed.contains(id))
            .copied()
            .collect();

        let updated = self
            .polls
            .set_allowed_users(id, &allowed, Utc::now())
            .await?
            .ok_or_else(|| AppError::NotFound("Poll not found".to_string()))?;

        self.notifier
            .allowed_users_changed(&updated, &added, &removed);
        Ok((updated, AllowedUsersDiff { added, removed }))
    }

    async fn populate(&self, polls: Vec<Poll>) -> AppResult<Vec<PollWithCreator>> {
        let mut cache: HashMap<ObjectId, Option<UserSummary>> = HashMap::new();
        let mut out = Vec::with_capacity(polls.len());
        for poll in polls {
            let creator = match cache.get(&poll.created_by) {
                Some(cached) => cached.clone(),
                None => {
                    let summary = self.creator_summary(poll.created_by).await?;
                    cache.insert(poll.created_by, summary.clone());
                    summary
                }
            };
            out.push(PollWithCreator { poll, creator });
        }
        Ok(out)
    }

    async fn creator_summary(&self, id: ObjectId) -> AppResult<Option<UserSummary>> {
        Ok(self.users.find_by_id(id).await?.map(|user| UserSummary {
            id: user.id,
            username: user.username,
            email: user.email,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user_models::User;
    use crate::store::memory::{MemoryPollStore, MemoryUserDirectory};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Recorded {
        Created(ObjectId),
        Updated(ObjectId),
        Deleted(ObjectId),
        AllowedUsersChanged {
            poll: ObjectId,
            added: Vec<ObjectId>,
            removed: Vec<ObjectId>,
        },
    }

    #[derive(Default)]
    struct RecordingNotifier {
        events: Mutex<Vec<Recorded>>,
    }

    impl RecordingNotifier {
        fn events(&self) -> Vec<Recorded> {
            self.events.lock().unwrap().clone()
        }
    }

    impl PollNotifier for RecordingNotifier {
        fn poll_created(&self, poll: &Poll) {
            self.events.lock().unwrap().push(Recorded::Created(poll.id));
        }
        fn poll_updated(&self, poll: &Poll) {
            self.events.lock().unwrap().push(Recorded::Updated(poll.id));
        }
        fn poll_deleted(&self, poll: &Poll) {
            self.events.lock().unwrap().push(Recorded::Deleted(poll.id));
        }
        fn allowed_users_changed(&self, poll: &Poll, added: &[ObjectId], removed: &[ObjectId]) {
            self.events
                .lock()
                .unwrap()
                .push(Recorded::AllowedUsersChanged {
                    poll: poll.id,
                    added: added.to_vec(),
                    removed: removed.to_vec(),
                });
        }
    }

    struct Harness {
        service: Arc<PollService>,
        store: Arc<MemoryPollStore>,
        notifier: Arc<RecordingNotifier>,
        admin: ObjectId,
        u2: ObjectId,
        u3: ObjectId,
        u4: ObjectId,
    }

    fn seed_user(directory: &MemoryUserDirectory, name: &str, role: Role) -> ObjectId {
        let id = ObjectId::new();
        directory.insert(User {
            id,
            username: name.to_string(),
            email: format!("{}@example.com", name),
            role,
        });
        id
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryPollStore::new());
        let directory = Arc::new(MemoryUserDirectory::new());
        let notifier = Arc::new(RecordingNotifier::default());

        let admin = seed_user(&directory, "admin", Role::Admin);
        let u2 = seed_user(&directory, "u2", Role::User);
        let u3 = seed_user(&directory, "u3", Role::User);
        let u4 = seed_user(&directory, "u4", Role::User);

        let service = Arc::new(PollService::new(
            store.clone(),
            directory.clone(),
            notifier.clone(),
        ));
        Harness {
            service,
            store,
            notifier,
            admin,
            u2,
            u3,
            u4,
        }
    }

    fn new_poll(options: &[&str], is_public: bool, allowed: Vec<ObjectId>) -> NewPoll {
        NewPoll {
            title: "Team lunch".to_string(),
            description: Some("Where to?".to_string()),
            options: options.iter().map(|s| s.to_string()).collect(),
            is_public,
            duration_minutes: 60,
            allowed_users: allowed,
        }
    }

    /// Inserts an already-expired poll directly into the store.
    async fn insert_expired(h: &Harness, is_public: bool, allowed: Vec<ObjectId>) -> Poll {
        let now = Utc::now();
        let poll = Poll {
            id: ObjectId::new(),
            title: "Old poll".to_string(),
            description: None,
            options: vec![
                PollOption::new("yes".to_string()),
                PollOption::new("no".to_string()),
            ],
            created_by: h.admin,
            is_public,
            allowed_users: allowed,
            expires_at: now - Duration::minutes(1),
            created_at: now - Duration::minutes(61),
            updated_at: now - Duration::minutes(61),
        };
        h.store.insert(&poll).await.unwrap();
        poll
    }

    #[tokio::test]
    async fn create_trims_and_dedupes_options() {
        let h = harness();
        let poll = h
            .service
            .create(new_poll(&["  A ", "B", "A"], true, vec![]), h.admin)
            .await
            .unwrap();

        let texts: Vec<&str> = poll.options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["A", "B"]);
        assert!(poll.options.iter().all(|o| o.votes == 0 && o.voted_by.is_empty()));
        assert_eq!(poll.expires_at, poll.created_at + Duration::minutes(60));
        assert_eq!(h.notifier.events(), vec![Recorded::Created(poll.id)]);
    }

    #[tokio::test]
    async fn create_rejects_fewer_than_two_distinct_options() {
        let h = harness();
        let err = h
            .service
            .create(new_poll(&["  A ", "A", "   "], true, vec![]), h.admin)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { ref field, .. } if field == "options"));
        assert!(h.notifier.events().is_empty());
    }

    #[tokio::test]
    async fn create_validates_title_duration_and_option_count() {
        let h = harness();

        let mut req = new_poll(&["a", "b"], true, vec![]);
        req.title = "   ".to_string();
        let err = h.service.create(req, h.admin).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { ref field, .. } if field == "title"));

        let mut req = new_poll(&["a", "b"], true, vec![]);
        req.duration_minutes = 0;
        let err = h.service.create(req, h.admin).await.unwrap_err();
        assert!(
            matches!(err, AppError::InvalidInput { ref field, .. } if field == "durationMinutes")
        );

        let mut req = new_poll(&["a", "b"], true, vec![]);
        req.duration_minutes = 121;
        let err = h.service.create(req, h.admin).await.unwrap_err();
        assert!(
            matches!(err, AppError::InvalidInput { ref field, .. } if field == "durationMinutes")
        );

        let too_many: Vec<String> = (0..11).map(|i| format!("opt{}", i)).collect();
        let mut req = new_poll(&[], true, vec![]);
        req.options = too_many;
        let err = h.service.create(req, h.admin).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { ref field, .. } if field == "options"));
    }

    #[tokio::test]
    async fn private_poll_voting_scenario() {
        let h = harness();
        let poll = h
            .service
            .create(new_poll(&["soup", "salad"], false, vec![h.u2]), h.admin)
            .await
            .unwrap();

        // outsider can neither fetch nor learn anything else about it
        let err = h.service.get_one(poll.id, h.u3).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let updated = h.service.vote(poll.id, 0, h.u2).await.unwrap();
        assert_eq!(updated.options[0].votes, 1);
        assert!(updated.options[0].voted_by.contains(&h.u2));

        // a second vote, even for a different option, is a conflict
        let err = h.service.vote(poll.id, 1, h.u2).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let results = h.service.get_results(poll.id, h.admin).await.unwrap();
        assert_eq!(results.total_votes, 1);
        assert!(!results.user_has_voted);
        assert_eq!(results.options[0].percentage, "100.00");
        assert_eq!(results.options[1].percentage, "0.00");

        let results_voter = h.service.get_results(poll.id, h.u2).await.unwrap();
        assert!(results_voter.user_has_voted);
    }

    #[tokio::test]
    async fn expired_poll_rejects_votes_and_edits_but_allows_delete() {
        let h = harness();
        let poll = insert_expired(&h, true, vec![]).await;

        let err = h.service.vote(poll.id, 0, h.u2).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let patch = PollPatch {
            title: Some("new title".to_string()),
            description: None,
        };
        let err = h
            .service
            .update(poll.id, patch, h.admin, Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        h.service.remove(poll.id, h.admin, Role::Admin).await.unwrap();
        assert!(h.store.find_by_id(poll.id).await.unwrap().is_none());
        assert_eq!(h.notifier.events(), vec![Recorded::Deleted(poll.id)]);
    }

    #[tokio::test]
    async fn outsider_on_expired_private_poll_gets_forbidden_not_expiry() {
        let h = harness();
        let poll = insert_expired(&h, false, vec![h.u2]).await;

        // visibility is checked before the active-state check
        let err = h.service.vote(poll.id, 0, h.u3).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = h.service.get_results(poll.id, h.u3).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn expired_private_results_gated_on_participation() {
        let h = harness();
        let mut poll = insert_expired(&h, false, vec![h.u2, h.u3]).await;

        // give u2 a recorded vote by hand
        h.store.delete(poll.id).await.unwrap();
        poll.options[0].votes = 1;
        poll.options[0].voted_by.push(h.u2);
        h.store.insert(&poll).await.unwrap();

        assert!(h.service.get_results(poll.id, h.u2).await.is_ok());
        assert!(h.service.get_results(poll.id, h.admin).await.is_ok());
        let err = h.service.get_results(poll.id, h.u3).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn vote_with_out_of_range_index_changes_nothing() {
        let h = harness();
        let poll = h
            .service
            .create(new_poll(&["a", "b"], true, vec![]), h.admin)
            .await
            .unwrap();

        let err = h.service.vote(poll.id, 2, h.u2).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { ref field, .. } if field == "optionIndex"));
        let err = h.service.vote(poll.id, -1, h.u2).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput { ref field, .. } if field == "optionIndex"));

        let stored = h.store.find_by_id(poll.id).await.unwrap().unwrap();
        assert_eq!(stored.total_votes(), 0);
    }

    #[tokio::test]
    async fn concurrent_votes_by_same_user_record_exactly_one() {
        let h = harness();
        let poll = h
            .service
            .create(new_poll(&["a", "b"], true, vec![]), h.admin)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8i64 {
            let service = h.service.clone();
            let voter = h.u2;
            let poll_id = poll.id;
            handles.push(tokio::spawn(async move {
                service.vote(poll_id, i % 2, voter).await
            }));
        }

        let mut successes = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(AppError::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {}", other),
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(conflicts, 7);

        let stored = h.store.find_by_id(poll.id).await.unwrap().unwrap();
        assert_eq!(stored.total_votes(), 1);
        // the voter appears in exactly one option's voter set
        let appearances = stored
            .options
            .iter()
            .filter(|o| o.voted_by.contains(&h.u2))
            .count();
        assert_eq!(appearances, 1);
    }

    #[tokio::test]
    async fn vote_sum_matches_distinct_voters() {
        let h = harness();
        let poll = h
            .service
            .create(new_poll(&["a", "b", "c"], true, vec![]), h.admin)
            .await
            .unwrap();

        h.service.vote(poll.id, 0, h.u2).await.unwrap();
        h.service.vote(poll.id, 1, h.u3).await.unwrap();
        h.service.vote(poll.id, 1, h.u4).await.unwrap();

        let stored = h.store.find_by_id(poll.id).await.unwrap().unwrap();
        let voters: HashSet<ObjectId> = stored
            .options
            .iter()
            .flat_map(|o| o.voted_by.iter().copied())
            .collect();
        assert_eq!(stored.total_votes() as usize, voters.len());
    }

    #[tokio::test]
    async fn result_percentages_sum_to_about_one_hundred() {
        let h = harness();
        let poll = h
            .service
            .create(new_poll(&["a", "b", "c"], true, vec![]), h.admin)
            .await
            .unwrap();

        // no votes yet: everything is "0.00"
        let results = h.service.get_results(poll.id, h.u2).await.unwrap();
        assert!(results.options.iter().all(|o| o.percentage == "0.00"));

        h.service.vote(poll.id, 0, h.u2).await.unwrap();
        h.service.vote(poll.id, 1, h.u3).await.unwrap();
        h.service.vote(poll.id, 2, h.u4).await.unwrap();

        let results = h.service.get_results(poll.id, h.u2).await.unwrap();
        assert_eq!(results.total_votes, 3);
        let sum: f64 = results
            .options
            .iter()
            .map(|o| o.percentage.parse::<f64>().unwrap())
            .sum();
        // each option rounds independently, so allow a cent per option
        assert!((sum - 100.0).abs() <= 0.01 * results.options.len() as f64);
    }

    #[tokio::test]
    async fn list_visible_filters_by_access() {
        let h = harness();
        let public = h
            .service
            .create(new_poll(&["a", "b"], true, vec![]), h.admin)
            .await
            .unwrap();
        let invited = h
            .service
            .create(new_poll(&["a", "b"], false, vec![h.u2]), h.admin)
            .await
            .unwrap();
        h.service
            .create(new_poll(&["a", "b"], false, vec![h.u3]), h.admin)
            .await
            .unwrap();

        let visible = h.service.list_visible(h.u2).await.unwrap();
        let ids: Vec<ObjectId> = visible.iter().map(|p| p.poll.id).collect();
        assert_eq!(ids, vec![public.id, invited.id]);

        // creator join is populated
        let creator = visible[0].creator.as_ref().unwrap();
        assert_eq!(creator.username, "admin");
        assert_eq!(creator.email, "admin@example.com");
    }

    #[tokio::test]
    async fn list_owned_admin_sees_all_polls() {
        let h = harness();
        let directory = MemoryUserDirectory::new();
        let other_admin = seed_user(&directory, "admin2", Role::Admin);

        h.service
            .create(new_poll(&["a", "b"], true, vec![]), h.admin)
            .await
            .unwrap();
        h.service
            .create(new_poll(&["a", "b"], false, vec![]), other_admin)
            .await
            .unwrap();

        // an admin's "my polls" is every poll in the system
        let owned = h.service.list_owned(h.admin, Role::Admin).await.unwrap();
        assert_eq!(owned.len(), 2);

        // a regular user only sees what they created (nothing, in practice)
        let owned = h.service.list_owned(h.u2, Role::User).await.unwrap();
        assert!(owned.is_empty());
    }

    #[tokio::test]
    async fn update_patches_title_and_description_for_manager_only() {
        let h = harness();
        let poll = h
            .service
            .create(new_poll(&["a", "b"], false, vec![h.u2]), h.admin)
            .await
            .unwrap();

        let patch = PollPatch {
            title: Some("Renamed".to_string()),
            description: Some("Updated".to_string()),
        };

        // non-admin creator role and foreign admin are both refused
        let err = h
            .service
            .update(poll.id, patch.clone(), h.u2, Role::User)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        let foreign_admin = ObjectId::new();
        let err = h
            .service
            .update(poll.id, patch.clone(), foreign_admin, Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let updated = h
            .service
            .update(poll.id, patch, h.admin, Role::Admin)
            .await
            .unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.description.as_deref(), Some("Updated"));
        assert!(h.notifier.events().contains(&Recorded::Updated(poll.id)));
    }

    #[tokio::test]
    async fn allowed_users_update_computes_diff_and_notifies() {
        let h = harness();
        let poll = h
            .service
            .create(new_poll(&["a", "b"], false, vec![h.u2, h.u3]), h.admin)
            .await
            .unwrap();

        let (updated, diff) = h
            .service
            .update_allowed_users(poll.id, vec![h.u3, h.u4], h.admin, Role::Admin)
            .await
            .unwrap();

        assert_eq!(updated.allowed_users, vec![h.u3, h.u4]);
        assert_eq!(diff.added, vec![h.u4]);
        assert_eq!(diff.removed, vec![h.u2]);

        assert!(h.notifier.events().contains(&Recorded::AllowedUsersChanged {
            poll: poll.id,
            added: vec![h.u4],
            removed: vec![h.u2],
        }));
    }

    #[tokio::test]
    async fn allowed_users_update_rejects_public_unknown_and_foreign() {
        let h = harness();
        let public = h
            .service
            .create(new_poll(&["a", "b"], true, vec![]), h.admin)
            .await
            .unwrap();
        let err = h
            .service
            .update_allowed_users(public.id, vec![h.u2], h.admin, Role::Admin)
            .await
            .unwrap_err();
        assert!(
            matches!(err, AppError::InvalidInput { ref field, .. } if field == "allowedUsers")
        );

        let private = h
            .service
            .create(new_poll(&["a", "b"], false, vec![]), h.admin)
            .await
            .unwrap();
        let err = h
            .service
            .update_allowed_users(private.id, vec![ObjectId::new()], h.admin, Role::Admin)
            .await
            .unwrap_err();
        assert!(
            matches!(err, AppError::InvalidInput { ref field, .. } if field == "allowedUsers")
        );

        let err = h
            .service
            .update_allowed_users(private.id, vec![h.u2], h.u2, Role::User)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn allowed_users_update_dedupes_incoming_ids() {
        let h = harness();
        let poll = h
            .service
            .create(new_poll(&["a", "b"], false, vec![]), h.admin)
            .await
            .unwrap();

        let (updated, diff) = h
            .service
            .update_allowed_users(poll.id, vec![h.u2, h.u2, h.u3], h.admin, Role::Admin)
            .await
            .unwrap();
        assert_eq!(updated.allowed_users, vec![h.u2, h.u3]);
        assert_eq!(diff.added, vec![h.u2, h.u3]);
        assert!(diff.removed.is_empty());
    }

    #[tokio::test]
    async fn missing_poll_is_not_found_everywhere() {
        let h = harness();
        let ghost = ObjectId::new();

        assert!(matches!(
            h.service.get_one(ghost, h.u2).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            h.service.vote(ghost, 0, h.u2).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            h.service.remove(ghost, h.admin, Role::Admin).await.unwrap_err(),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            h.service
                .update(ghost, PollPatch::default(), h.admin, Role::Admin)
                .await
                .unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}
