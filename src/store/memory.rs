//! In-memory [`MarketStore`] used for tests and `PERSISTENCE_ENABLED=false`.
//!
//! All tables live in one [`Tables`] value behind a single
//! [`tokio::sync::RwLock`]. Every compound write holds the write guard for
//! its whole duration, which makes it atomic with respect to every other
//! operation. Writes validate everything before mutating anything, so an
//! error leaves the tables untouched.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{
    Acceptance, Completion, ConversationOverview, MarketStore, Page, Party, ProfileSkills,
    RequestFilter,
};
use crate::domain::skill::default_catalog;
use crate::domain::{
    Conversation, ConversationId, CreditTransaction, Credits, LearningRequest, Message,
    ParticipantPair, Profile, ProfileUpdate, RequestId, RequestStatus, Review, Session, SessionId,
    SessionStatus, Settlement, Skill, SkillId, SkillRole, UserId,
};
use crate::error::MarketError;

#[derive(Debug, Default)]
struct Tables {
    profiles: HashMap<UserId, Profile>,
    profile_skills: HashSet<(UserId, SkillId, SkillRole)>,
    skills: HashMap<SkillId, Skill>,
    requests: HashMap<RequestId, LearningRequest>,
    sessions: HashMap<SessionId, Session>,
    ledger: Vec<CreditTransaction>,
    conversations: HashMap<ConversationId, Conversation>,
    conversation_index: HashMap<ParticipantPair, ConversationId>,
    messages: Vec<Message>,
    reviews: Vec<Review>,
}

impl Tables {
    /// Computes the balances after applying `entries` without touching
    /// any profile.
    fn stage_balances(
        &self,
        entries: &[CreditTransaction],
    ) -> Result<HashMap<UserId, Credits>, MarketError> {
        let mut staged: HashMap<UserId, Credits> = HashMap::new();
        for entry in entries {
            let current = match staged.get(&entry.user_id) {
                Some(balance) => *balance,
                None => {
                    self.profiles
                        .get(&entry.user_id)
                        .ok_or_else(|| MarketError::not_found("profile", entry.user_id))?
                        .credit_balance
                }
            };
            let next = current
                .checked_add(entry.amount)
                .ok_or_else(|| MarketError::InvalidRequest("credit amount out of range".to_string()))?;
            if next.is_negative() {
                return Err(MarketError::InsufficientCredits {
                    required: -entry.amount,
                    available: current,
                });
            }
            staged.insert(entry.user_id, next);
        }
        Ok(staged)
    }

    /// Writes staged balances and appends the ledger rows.
    fn commit_balances(&mut self, staged: HashMap<UserId, Credits>, entries: &[CreditTransaction]) {
        let now = Utc::now();
        for (user, balance) in staged {
            if let Some(profile) = self.profiles.get_mut(&user) {
                profile.credit_balance = balance;
                profile.updated_at = now;
            }
        }
        self.ledger.extend(entries.iter().cloned());
    }

    fn conversation_for(&mut self, pair: ParticipantPair) -> Conversation {
        if let Some(existing) = self
            .conversation_index
            .get(&pair)
            .and_then(|id| self.conversations.get(id))
        {
            return existing.clone();
        }
        let conversation = Conversation::new(pair);
        self.conversation_index.insert(pair, conversation.id);
        self.conversations.insert(conversation.id, conversation.clone());
        conversation
    }

    fn push_message(&mut self, message: Message) -> Result<Message, MarketError> {
        let conversation = self
            .conversations
            .get_mut(&message.conversation_id)
            .ok_or_else(|| MarketError::not_found("conversation", message.conversation_id))?;
        conversation.last_message_at = message.created_at;
        self.messages.push(message.clone());
        Ok(message)
    }

    fn skills_of(&self, user: UserId, role: SkillRole) -> Vec<Skill> {
        let mut skills: Vec<Skill> = self
            .profile_skills
            .iter()
            .filter(|(u, _, r)| *u == user && *r == role)
            .filter_map(|(_, skill, _)| self.skills.get(skill).cloned())
            .collect();
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        skills
    }
}

/// Applies an offset/limit window to an already ordered list.
fn paginate<T>(rows: Vec<T>, page: Page) -> (Vec<T>, u64) {
    let total = rows.len() as u64;
    let data = rows
        .into_iter()
        .skip(page.offset as usize)
        .take(page.limit as usize)
        .collect();
    (data, total)
}

/// [`MarketStore`] backed by process memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    /// Creates an empty store with no skills.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with [`default_catalog`].
    #[must_use]
    pub fn with_default_catalog() -> Self {
        Self::with_skills(default_catalog())
    }

    /// Creates a store seeded with `skills`.
    #[must_use]
    pub fn with_skills(skills: Vec<Skill>) -> Self {
        let tables = Tables {
            skills: skills.into_iter().map(|s| (s.id, s)).collect(),
            ..Tables::default()
        };
        Self {
            tables: RwLock::new(tables),
        }
    }
}

#[async_trait]
impl MarketStore for InMemoryStore {
    async fn ping(&self) -> Result<(), MarketError> {
        Ok(())
    }

    async fn create_profile(
        &self,
        profile: Profile,
        grant: Option<CreditTransaction>,
    ) -> Result<Profile, MarketError> {
        let mut t = self.tables.write().await;
        if t.profiles.contains_key(&profile.id) {
            return Err(MarketError::Conflict(format!(
                "profile {} already exists",
                profile.id
            )));
        }
        let id = profile.id;
        t.profiles.insert(id, profile);
        if let Some(grant) = grant {
            let entries = [grant];
            let staged = t.stage_balances(&entries);
            match staged {
                Ok(staged) => t.commit_balances(staged, &entries),
                Err(e) => {
                    t.profiles.remove(&id);
                    return Err(e);
                }
            }
        }
        t.profiles
            .get(&id)
            .cloned()
            .ok_or_else(|| MarketError::Internal("profile vanished during insert".to_string()))
    }

    async fn get_profile(&self, id: UserId) -> Result<Option<Profile>, MarketError> {
        Ok(self.tables.read().await.profiles.get(&id).cloned())
    }

    async fn update_profile(&self, id: UserId, update: &ProfileUpdate) -> Result<Profile, MarketError> {
        let mut t = self.tables.write().await;
        let profile = t
            .profiles
            .get_mut(&id)
            .ok_or_else(|| MarketError::not_found("profile", id))?;
        update.apply_to(profile);
        Ok(profile.clone())
    }

    async fn list_profiles(
        &self,
        teaches: Option<SkillId>,
        page: Page,
    ) -> Result<(Vec<Profile>, u64), MarketError> {
        let t = self.tables.read().await;
        let mut rows: Vec<Profile> = t
            .profiles
            .values()
            .filter(|p| match teaches {
                Some(skill) => t.profile_skills.contains(&(p.id, skill, SkillRole::Teaches)),
                None => true,
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.display_name.cmp(&b.display_name).then(a.id.cmp(&b.id)));
        Ok(paginate(rows, page))
    }

    async fn replace_profile_skills(
        &self,
        id: UserId,
        teaches: &[SkillId],
        learns: &[SkillId],
    ) -> Result<ProfileSkills, MarketError> {
        let mut t = self.tables.write().await;
        if !t.profiles.contains_key(&id) {
            return Err(MarketError::not_found("profile", id));
        }
        if let Some(missing) = teaches.iter().chain(learns).find(|s| !t.skills.contains_key(s)) {
            return Err(MarketError::not_found("skill", missing));
        }
        t.profile_skills.retain(|(user, _, _)| *user != id);
        for skill in teaches {
            t.profile_skills.insert((id, *skill, SkillRole::Teaches));
        }
        for skill in learns {
            t.profile_skills.insert((id, *skill, SkillRole::Learns));
        }
        Ok(ProfileSkills {
            teaches: t.skills_of(id, SkillRole::Teaches),
            learns: t.skills_of(id, SkillRole::Learns),
        })
    }

    async fn profile_skills(&self, id: UserId) -> Result<ProfileSkills, MarketError> {
        let t = self.tables.read().await;
        Ok(ProfileSkills {
            teaches: t.skills_of(id, SkillRole::Teaches),
            learns: t.skills_of(id, SkillRole::Learns),
        })
    }

    async fn apply_transaction(&self, entry: CreditTransaction) -> Result<Credits, MarketError> {
        let mut t = self.tables.write().await;
        let user = entry.user_id;
        let entries = [entry];
        let staged = t.stage_balances(&entries)?;
        let balance = staged.get(&user).copied().unwrap_or_default();
        t.commit_balances(staged, &entries);
        Ok(balance)
    }

    async fn list_transactions(
        &self,
        user: UserId,
        page: Page,
    ) -> Result<(Vec<CreditTransaction>, u64), MarketError> {
        let t = self.tables.read().await;
        // Ledger is append-ordered; reverse for newest first.
        let rows: Vec<CreditTransaction> = t
            .ledger
            .iter()
            .rev()
            .filter(|tx| tx.user_id == user)
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }

    async fn list_skills(&self, category: Option<&str>) -> Result<Vec<Skill>, MarketError> {
        let t = self.tables.read().await;
        let mut skills: Vec<Skill> = t
            .skills
            .values()
            .filter(|s| category.is_none_or(|c| s.category.eq_ignore_ascii_case(c)))
            .cloned()
            .collect();
        skills.sort_by(|a, b| a.category.cmp(&b.category).then(a.name.cmp(&b.name)));
        Ok(skills)
    }

    async fn get_skill(&self, id: SkillId) -> Result<Option<Skill>, MarketError> {
        Ok(self.tables.read().await.skills.get(&id).cloned())
    }

    async fn insert_request(&self, request: LearningRequest) -> Result<LearningRequest, MarketError> {
        let mut t = self.tables.write().await;
        t.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get_request(&self, id: RequestId) -> Result<Option<LearningRequest>, MarketError> {
        Ok(self.tables.read().await.requests.get(&id).cloned())
    }

    async fn list_requests(
        &self,
        user: UserId,
        filter: RequestFilter,
    ) -> Result<Vec<LearningRequest>, MarketError> {
        let t = self.tables.read().await;
        let mut rows: Vec<LearningRequest> = t
            .requests
            .values()
            .filter(|r| match filter.role {
                Some(Party::Learner) => r.learner_id == user,
                Some(Party::Tutor) => r.tutor_id == user,
                None => r.involves(user),
            })
            .filter(|r| filter.status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn resolve_request(
        &self,
        id: RequestId,
        to: RequestStatus,
    ) -> Result<LearningRequest, MarketError> {
        if to == RequestStatus::Accepted {
            return Err(MarketError::InvalidRequest(
                "use accept_request to accept a request".to_string(),
            ));
        }
        let mut t = self.tables.write().await;
        let request = t
            .requests
            .get_mut(&id)
            .ok_or_else(|| MarketError::not_found("request", id))?;
        request.resolve(to)?;
        Ok(request.clone())
    }

    async fn accept_request(
        &self,
        id: RequestId,
        session: Session,
        greeting: String,
    ) -> Result<Acceptance, MarketError> {
        let mut t = self.tables.write().await;
        let mut request = t
            .requests
            .get(&id)
            .cloned()
            .ok_or_else(|| MarketError::not_found("request", id))?;
        request.resolve(RequestStatus::Accepted)?;
        let pair = ParticipantPair::new(request.tutor_id, request.learner_id)?;

        t.requests.insert(id, request.clone());
        t.sessions.insert(session.id, session.clone());
        let conversation = t.conversation_for(pair);
        let message = t.push_message(Message::new(conversation.id, request.tutor_id, greeting))?;
        let conversation = t
            .conversations
            .get(&conversation.id)
            .cloned()
            .unwrap_or(conversation);

        Ok(Acceptance {
            request,
            session,
            conversation,
            message,
        })
    }

    async fn insert_session(&self, session: Session) -> Result<Session, MarketError> {
        let mut t = self.tables.write().await;
        t.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, MarketError> {
        Ok(self.tables.read().await.sessions.get(&id).cloned())
    }

    async fn list_sessions(
        &self,
        user: UserId,
        status: Option<SessionStatus>,
    ) -> Result<Vec<Session>, MarketError> {
        let t = self.tables.read().await;
        let mut rows: Vec<Session> = t
            .sessions
            .values()
            .filter(|s| s.involves(user))
            .filter(|s| status.is_none_or(|st| s.status == st))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at));
        Ok(rows)
    }

    async fn transition_session(
        &self,
        id: SessionId,
        to: SessionStatus,
    ) -> Result<Session, MarketError> {
        let mut t = self.tables.write().await;
        let session = t
            .sessions
            .get_mut(&id)
            .ok_or_else(|| MarketError::not_found("session", id))?;
        match to {
            SessionStatus::InProgress => session.start()?,
            SessionStatus::Cancelled => session.cancel()?,
            other => {
                return Err(MarketError::InvalidRequest(format!(
                    "cannot transition a session to {other}"
                )));
            }
        }
        Ok(session.clone())
    }

    async fn complete_session(
        &self,
        id: SessionId,
        notes: Option<String>,
        settlement: &Settlement,
    ) -> Result<Completion, MarketError> {
        let mut t = self.tables.write().await;
        let mut session = t
            .sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| MarketError::not_found("session", id))?;
        session.complete(notes, Utc::now())?;

        let staged = t.stage_balances(&settlement.entries)?;
        let learner_balance = match staged.get(&session.learner_id) {
            Some(balance) => *balance,
            None => {
                t.profiles
                    .get(&session.learner_id)
                    .ok_or_else(|| MarketError::not_found("profile", session.learner_id))?
                    .credit_balance
            }
        };
        t.commit_balances(staged, &settlement.entries);
        t.sessions.insert(id, session.clone());

        Ok(Completion {
            session,
            learner_balance,
            transactions: settlement.entries.clone(),
        })
    }

    async fn get_or_create_conversation(
        &self,
        pair: ParticipantPair,
    ) -> Result<Conversation, MarketError> {
        Ok(self.tables.write().await.conversation_for(pair))
    }

    async fn get_conversation(&self, id: ConversationId) -> Result<Option<Conversation>, MarketError> {
        Ok(self.tables.read().await.conversations.get(&id).cloned())
    }

    async fn list_conversations(&self, user: UserId) -> Result<Vec<ConversationOverview>, MarketError> {
        let t = self.tables.read().await;
        let mut rows: Vec<ConversationOverview> = t
            .conversations
            .values()
            .filter(|c| c.involves(user))
            .map(|c| ConversationOverview {
                conversation: c.clone(),
                unread_count: t
                    .messages
                    .iter()
                    .filter(|m| m.conversation_id == c.id && m.sender_id != user && m.read_at.is_none())
                    .count() as u64,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.conversation
                .last_message_at
                .cmp(&a.conversation.last_message_at)
        });
        Ok(rows)
    }

    async fn insert_message(&self, message: Message) -> Result<Message, MarketError> {
        self.tables.write().await.push_message(message)
    }

    async fn list_messages(
        &self,
        conversation: ConversationId,
        page: Page,
    ) -> Result<(Vec<Message>, u64), MarketError> {
        let t = self.tables.read().await;
        let rows: Vec<Message> = t
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation)
            .cloned()
            .collect();
        Ok(paginate(rows, page))
    }

    async fn mark_read(
        &self,
        conversation: ConversationId,
        reader: UserId,
        at: DateTime<Utc>,
    ) -> Result<u64, MarketError> {
        let mut t = self.tables.write().await;
        let mut marked = 0;
        for message in t.messages.iter_mut().filter(|m| {
            m.conversation_id == conversation && m.sender_id != reader && m.read_at.is_none()
        }) {
            message.read_at = Some(at);
            marked += 1;
        }
        Ok(marked)
    }

    async fn insert_review(&self, review: Review) -> Result<Review, MarketError> {
        let mut t = self.tables.write().await;
        if t
            .reviews
            .iter()
            .any(|r| r.session_id == review.session_id && r.reviewer_id == review.reviewer_id)
        {
            return Err(MarketError::Conflict(
                "you have already reviewed this session".to_string(),
            ));
        }
        t.reviews.push(review.clone());
        Ok(review)
    }

    async fn list_reviews_for(&self, user: UserId) -> Result<Vec<Review>, MarketError> {
        let t = self.tables.read().await;
        Ok(t
            .reviews
            .iter()
            .rev()
            .filter(|r| r.reviewee_id == user)
            .cloned()
            .collect())
    }
}
