//! Database row types and their conversion into domain entities.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::{
    Conversation, CreditTransaction, Credits, LearningRequest, Message, Profile, Rating, Review,
    Session, Skill,
};
use crate::error::MarketError;

/// A row of the `profiles` table.
#[derive(Debug, Clone, FromRow)]
pub struct ProfileRow {
    /// Primary key (auth identity).
    pub id: Uuid,
    /// Display name.
    pub display_name: String,
    /// Biography.
    pub bio: Option<String>,
    /// Avatar object key.
    pub avatar_path: Option<String>,
    /// Balance in hundredths of a credit.
    pub credit_balance_cents: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id.into(),
            display_name: row.display_name,
            bio: row.bio,
            avatar_path: row.avatar_path,
            credit_balance: Credits::from_cents(row.credit_balance_cents),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A row of the `skills` table.
#[derive(Debug, Clone, FromRow)]
pub struct SkillRow {
    /// Primary key.
    pub id: Uuid,
    /// Unique name.
    pub name: String,
    /// Category.
    pub category: String,
}

impl From<SkillRow> for Skill {
    fn from(row: SkillRow) -> Self {
        Self {
            id: row.id.into(),
            name: row.name,
            category: row.category,
        }
    }
}

/// A row of the `learning_requests` table.
#[derive(Debug, Clone, FromRow)]
pub struct RequestRow {
    /// Primary key.
    pub id: Uuid,
    /// Learner.
    pub learner_id: Uuid,
    /// Tutor.
    pub tutor_id: Uuid,
    /// Skill.
    pub skill_id: Uuid,
    /// Learner's note.
    pub message: Option<String>,
    /// Proposed time.
    pub proposed_time: Option<DateTime<Utc>>,
    /// Status string.
    pub status: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<RequestRow> for LearningRequest {
    type Error = MarketError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            learner_id: row.learner_id.into(),
            tutor_id: row.tutor_id.into(),
            skill_id: row.skill_id.into(),
            message: row.message,
            proposed_time: row.proposed_time,
            status: row.status.parse().map_err(|_| corrupt("learning_requests.status", &row.status))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A row of the `sessions` table.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    /// Primary key.
    pub id: Uuid,
    /// Tutor; null for AI sessions.
    pub tutor_id: Option<Uuid>,
    /// Learner.
    pub learner_id: Uuid,
    /// Skill.
    pub skill_id: Uuid,
    /// Originating request.
    pub request_id: Option<Uuid>,
    /// Start time.
    pub scheduled_at: DateTime<Utc>,
    /// Length in minutes.
    pub duration_minutes: i32,
    /// Status string.
    pub status: String,
    /// Notes.
    pub notes: Option<String>,
    /// AI flag.
    pub is_ai_session: bool,
    /// Booking time.
    pub created_at: DateTime<Utc>,
    /// Completion time.
    pub completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<SessionRow> for Session {
    type Error = MarketError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            tutor_id: row.tutor_id.map(Into::into),
            learner_id: row.learner_id.into(),
            skill_id: row.skill_id.into(),
            request_id: row.request_id.map(Into::into),
            scheduled_at: row.scheduled_at,
            duration_minutes: u32::try_from(row.duration_minutes)
                .map_err(|_| corrupt("sessions.duration_minutes", &row.duration_minutes))?,
            status: row.status.parse().map_err(|_| corrupt("sessions.status", &row.status))?,
            notes: row.notes,
            is_ai_session: row.is_ai_session,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

/// A row of the `credit_transactions` table.
#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    /// Primary key.
    pub id: Uuid,
    /// Account holder.
    pub user_id: Uuid,
    /// Signed amount in hundredths.
    pub amount_cents: i64,
    /// Type string.
    #[sqlx(rename = "type")]
    pub kind: String,
    /// Session reference.
    pub session_id: Option<Uuid>,
    /// Description.
    pub description: String,
    /// Write time.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for CreditTransaction {
    type Error = MarketError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id.into(),
            user_id: row.user_id.into(),
            amount: Credits::from_cents(row.amount_cents),
            kind: row.kind.parse()?,
            session_id: row.session_id.map(Into::into),
            description: row.description,
            created_at: row.created_at,
        })
    }
}

/// A row of the `conversations` table.
#[derive(Debug, Clone, FromRow)]
pub struct ConversationRow {
    /// Primary key.
    pub id: Uuid,
    /// Smaller participant.
    pub participant_a: Uuid,
    /// Larger participant.
    pub participant_b: Uuid,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last activity.
    pub last_message_at: DateTime<Utc>,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Self {
            id: row.id.into(),
            participant_a: row.participant_a.into(),
            participant_b: row.participant_b.into(),
            created_at: row.created_at,
            last_message_at: row.last_message_at,
        }
    }
}

/// A row of the `messages` table.
#[derive(Debug, Clone, FromRow)]
pub struct MessageRow {
    /// Primary key.
    pub id: Uuid,
    /// Conversation.
    pub conversation_id: Uuid,
    /// Author.
    pub sender_id: Uuid,
    /// Body.
    pub content: String,
    /// Read marker.
    pub read_at: Option<DateTime<Utc>>,
    /// Send time.
    pub created_at: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id.into(),
            conversation_id: row.conversation_id.into(),
            sender_id: row.sender_id.into(),
            content: row.content,
            read_at: row.read_at,
            created_at: row.created_at,
        }
    }
}

/// A row of the `reviews` table.
#[derive(Debug, Clone, FromRow)]
pub struct ReviewRow {
    /// Primary key.
    pub id: Uuid,
    /// Session.
    pub session_id: Uuid,
    /// Author.
    pub reviewer_id: Uuid,
    /// Subject.
    pub reviewee_id: Uuid,
    /// Stars.
    pub rating: i16,
    /// Comment.
    pub comment: Option<String>,
    /// Write time.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = MarketError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        let stars = u8::try_from(row.rating).map_err(|_| corrupt("reviews.rating", &row.rating))?;
        Ok(Self {
            id: row.id.into(),
            session_id: row.session_id.into(),
            reviewer_id: row.reviewer_id.into(),
            reviewee_id: row.reviewee_id.into(),
            rating: Rating::new(stars).map_err(|_| corrupt("reviews.rating", &row.rating))?,
            comment: row.comment,
            created_at: row.created_at,
        })
    }
}

/// Converts a batch of rows, failing on the first invalid one.
///
/// # Errors
///
/// Returns the first conversion error.
pub fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, MarketError>
where
    T: TryFrom<R, Error = MarketError>,
{
    rows.into_iter().map(T::try_from).collect()
}

fn corrupt(column: &str, value: &dyn std::fmt::Display) -> MarketError {
    MarketError::Persistence(format!("unexpected value in {column}: {value}"))
}
