//! Storage layer: the [`MarketStore`] trait and its two backends.
//!
//! Every method that writes more than one row is atomic. Callers check
//! authorization before calling in; the store re-checks status
//! preconditions inside its own transaction so concurrent callers cannot
//! both win (two accepts, two completions).
//!
//! - [`memory::InMemoryStore`]: all tables behind one `tokio` `RwLock`.
//! - [`postgres::PostgresStore`]: `sqlx` transactions over PostgreSQL.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Conversation, ConversationId, CreditTransaction, Credits, LearningRequest, Message,
    ParticipantPair, Profile, ProfileUpdate, RequestId, RequestStatus, Review, Session, SessionId,
    SessionStatus, Settlement, Skill, SkillId, UserId,
};
use crate::error::MarketError;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Offset/limit window for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Rows to skip.
    pub offset: u32,
    /// Maximum rows to return.
    pub limit: u32,
}

impl Page {
    /// Window covering everything.
    pub const ALL: Self = Self {
        offset: 0,
        limit: u32::MAX,
    };
}

/// Which side of a request or session the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    /// The learning side.
    Learner,
    /// The teaching side.
    Tutor,
}

/// Filter for [`MarketStore::list_requests`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestFilter {
    /// Only requests where the user plays this role; both when `None`.
    pub role: Option<Party>,
    /// Only requests in this status.
    pub status: Option<RequestStatus>,
}

/// A profile's teach and learn skill sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileSkills {
    /// Skills the user teaches.
    pub teaches: Vec<Skill>,
    /// Skills the user wants to learn.
    pub learns: Vec<Skill>,
}

/// Rows written when a tutor accepts a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acceptance {
    /// The request, now accepted.
    pub request: LearningRequest,
    /// The booked session.
    pub session: Session,
    /// Conversation between tutor and learner.
    pub conversation: Conversation,
    /// Booking announcement posted by the tutor.
    pub message: Message,
}

/// Result of settling a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// The session, now completed.
    pub session: Session,
    /// Learner's balance after the charge.
    pub learner_balance: Credits,
    /// Ledger rows appended.
    pub transactions: Vec<CreditTransaction>,
}

/// A conversation as listed for one participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationOverview {
    /// The conversation.
    pub conversation: Conversation,
    /// Messages from the other participant not yet read.
    pub unread_count: u64,
}

/// Persistence operations for the marketplace.
#[async_trait]
pub trait MarketStore: Send + Sync + std::fmt::Debug {
    /// Checks that the backend is reachable.
    ///
    /// # Errors
    ///
    /// [`MarketError::Persistence`] if it is not.
    async fn ping(&self) -> Result<(), MarketError>;

    // ── Profiles & credits ─────────────────────────────────────────────

    /// Inserts a profile and, if given, applies its signup grant.
    ///
    /// # Errors
    ///
    /// [`MarketError::Conflict`] if the profile already exists.
    async fn create_profile(
        &self,
        profile: Profile,
        grant: Option<CreditTransaction>,
    ) -> Result<Profile, MarketError>;

    /// Loads a profile.
    ///
    /// # Errors
    ///
    /// [`MarketError::Persistence`] on backend failure.
    async fn get_profile(&self, id: UserId) -> Result<Option<Profile>, MarketError>;

    /// Applies a partial profile update.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotFound`] if the profile does not exist.
    async fn update_profile(&self, id: UserId, update: &ProfileUpdate) -> Result<Profile, MarketError>;

    /// Lists profiles by display name, optionally only those teaching a
    /// skill. Returns the page and the total match count.
    ///
    /// # Errors
    ///
    /// [`MarketError::Persistence`] on backend failure.
    async fn list_profiles(
        &self,
        teaches: Option<SkillId>,
        page: Page,
    ) -> Result<(Vec<Profile>, u64), MarketError>;

    /// Replaces both skill sets of a profile.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotFound`] for a missing profile or skill.
    async fn replace_profile_skills(
        &self,
        id: UserId,
        teaches: &[SkillId],
        learns: &[SkillId],
    ) -> Result<ProfileSkills, MarketError>;

    /// Loads both skill sets of a profile.
    ///
    /// # Errors
    ///
    /// [`MarketError::Persistence`] on backend failure.
    async fn profile_skills(&self, id: UserId) -> Result<ProfileSkills, MarketError>;

    /// Applies one ledger entry to its user's balance and appends it.
    /// Returns the new balance.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotFound`] for a missing profile,
    /// [`MarketError::InsufficientCredits`] if the balance would go negative.
    async fn apply_transaction(&self, entry: CreditTransaction) -> Result<Credits, MarketError>;

    /// Lists a user's ledger, newest first, with the total row count.
    ///
    /// # Errors
    ///
    /// [`MarketError::Persistence`] on backend failure.
    async fn list_transactions(
        &self,
        user: UserId,
        page: Page,
    ) -> Result<(Vec<CreditTransaction>, u64), MarketError>;

    // ── Skills ─────────────────────────────────────────────────────────

    /// Lists the catalog by category then name.
    ///
    /// # Errors
    ///
    /// [`MarketError::Persistence`] on backend failure.
    async fn list_skills(&self, category: Option<&str>) -> Result<Vec<Skill>, MarketError>;

    /// Loads one skill.
    ///
    /// # Errors
    ///
    /// [`MarketError::Persistence`] on backend failure.
    async fn get_skill(&self, id: SkillId) -> Result<Option<Skill>, MarketError>;

    // ── Learning requests ──────────────────────────────────────────────

    /// Inserts a new request.
    ///
    /// # Errors
    ///
    /// [`MarketError::Persistence`] on backend failure.
    async fn insert_request(&self, request: LearningRequest) -> Result<LearningRequest, MarketError>;

    /// Loads one request.
    ///
    /// # Errors
    ///
    /// [`MarketError::Persistence`] on backend failure.
    async fn get_request(&self, id: RequestId) -> Result<Option<LearningRequest>, MarketError>;

    /// Lists requests involving `user`, newest first.
    ///
    /// # Errors
    ///
    /// [`MarketError::Persistence`] on backend failure.
    async fn list_requests(
        &self,
        user: UserId,
        filter: RequestFilter,
    ) -> Result<Vec<LearningRequest>, MarketError>;

    /// Moves a pending request to `to` (rejected or cancelled).
    ///
    /// # Errors
    ///
    /// [`MarketError::NotPending`] if it was already resolved.
    async fn resolve_request(
        &self,
        id: RequestId,
        to: RequestStatus,
    ) -> Result<LearningRequest, MarketError>;

    /// Accepts a pending request, books `session`, and posts `greeting`
    /// from the tutor into their conversation, all atomically.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotPending`] if it was already resolved.
    async fn accept_request(
        &self,
        id: RequestId,
        session: Session,
        greeting: String,
    ) -> Result<Acceptance, MarketError>;

    // ── Sessions ───────────────────────────────────────────────────────

    /// Inserts a session booked without a request (AI sessions).
    ///
    /// # Errors
    ///
    /// [`MarketError::Persistence`] on backend failure.
    async fn insert_session(&self, session: Session) -> Result<Session, MarketError>;

    /// Loads one session.
    ///
    /// # Errors
    ///
    /// [`MarketError::Persistence`] on backend failure.
    async fn get_session(&self, id: SessionId) -> Result<Option<Session>, MarketError>;

    /// Lists sessions involving `user`, latest schedule first.
    ///
    /// # Errors
    ///
    /// [`MarketError::Persistence`] on backend failure.
    async fn list_sessions(
        &self,
        user: UserId,
        status: Option<SessionStatus>,
    ) -> Result<Vec<Session>, MarketError>;

    /// Starts (`InProgress`) or cancels (`Cancelled`) an open session.
    ///
    /// # Errors
    ///
    /// [`MarketError::SessionClosed`] for terminal sessions,
    /// [`MarketError::InvalidRequest`] for any other target status.
    async fn transition_session(
        &self,
        id: SessionId,
        to: SessionStatus,
    ) -> Result<Session, MarketError>;

    /// Marks an open session completed and applies `settlement`, atomically.
    ///
    /// # Errors
    ///
    /// [`MarketError::SessionClosed`] if it is no longer open,
    /// [`MarketError::InsufficientCredits`] if the learner cannot pay.
    async fn complete_session(
        &self,
        id: SessionId,
        notes: Option<String>,
        settlement: &Settlement,
    ) -> Result<Completion, MarketError>;

    // ── Messaging ──────────────────────────────────────────────────────

    /// Returns the conversation for `pair`, creating it on first contact.
    ///
    /// # Errors
    ///
    /// [`MarketError::Persistence`] on backend failure.
    async fn get_or_create_conversation(
        &self,
        pair: ParticipantPair,
    ) -> Result<Conversation, MarketError>;

    /// Loads one conversation.
    ///
    /// # Errors
    ///
    /// [`MarketError::Persistence`] on backend failure.
    async fn get_conversation(&self, id: ConversationId) -> Result<Option<Conversation>, MarketError>;

    /// Lists `user`'s conversations by last activity, newest first.
    ///
    /// # Errors
    ///
    /// [`MarketError::Persistence`] on backend failure.
    async fn list_conversations(&self, user: UserId) -> Result<Vec<ConversationOverview>, MarketError>;

    /// Appends a message and bumps its conversation's activity time.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotFound`] if the conversation does not exist.
    async fn insert_message(&self, message: Message) -> Result<Message, MarketError>;

    /// Lists a conversation's messages, oldest first, with the total count.
    ///
    /// # Errors
    ///
    /// [`MarketError::Persistence`] on backend failure.
    async fn list_messages(
        &self,
        conversation: ConversationId,
        page: Page,
    ) -> Result<(Vec<Message>, u64), MarketError>;

    /// Marks every unread message not sent by `reader` as read at `at`.
    /// Returns how many were marked.
    ///
    /// # Errors
    ///
    /// [`MarketError::Persistence`] on backend failure.
    async fn mark_read(
        &self,
        conversation: ConversationId,
        reader: UserId,
        at: DateTime<Utc>,
    ) -> Result<u64, MarketError>;

    // ── Reviews ────────────────────────────────────────────────────────

    /// Inserts a review.
    ///
    /// # Errors
    ///
    /// [`MarketError::Conflict`] if the reviewer already reviewed the session.
    async fn insert_review(&self, review: Review) -> Result<Review, MarketError>;

    /// Lists reviews received by `user`, newest first.
    ///
    /// # Errors
    ///
    /// [`MarketError::Persistence`] on backend failure.
    async fn list_reviews_for(&self, user: UserId) -> Result<Vec<Review>, MarketError>;
}
