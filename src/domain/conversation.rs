//! Two-party conversations and their messages.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{ConversationId, MessageId, UserId};
use crate::error::MarketError;

/// Order-normalized pair of distinct users.
///
/// `ParticipantPair::new(x, y)` and `ParticipantPair::new(y, x)` are equal,
/// which is what makes a conversation between two users unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticipantPair {
    low: UserId,
    high: UserId,
}

impl ParticipantPair {
    /// Builds a normalized pair.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidRequest`] when both users are the same.
    pub fn new(x: UserId, y: UserId) -> Result<Self, MarketError> {
        if x == y {
            return Err(MarketError::InvalidRequest(
                "cannot start a conversation with yourself".to_string(),
            ));
        }
        let (low, high) = if x < y { (x, y) } else { (y, x) };
        Ok(Self { low, high })
    }

    /// Smaller participant id.
    #[must_use]
    pub const fn low(&self) -> UserId {
        self.low
    }

    /// Larger participant id.
    #[must_use]
    pub const fn high(&self) -> UserId {
        self.high
    }
}

/// A conversation between two users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Conversation {
    /// Conversation identifier.
    pub id: ConversationId,
    /// Smaller participant id.
    pub participant_a: UserId,
    /// Larger participant id.
    pub participant_b: UserId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the latest message (or creation).
    pub last_message_at: DateTime<Utc>,
}

impl Conversation {
    /// Opens a new conversation for `pair`.
    #[must_use]
    pub fn new(pair: ParticipantPair) -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            participant_a: pair.low(),
            participant_b: pair.high(),
            created_at: now,
            last_message_at: now,
        }
    }

    /// Returns `true` if `user` is one of the two participants.
    #[must_use]
    pub fn involves(&self, user: UserId) -> bool {
        self.participant_a == user || self.participant_b == user
    }

    /// Returns the participant that is not `user`.
    #[must_use]
    pub fn other_participant(&self, user: UserId) -> Option<UserId> {
        if self.participant_a == user {
            Some(self.participant_b)
        } else if self.participant_b == user {
            Some(self.participant_a)
        } else {
            None
        }
    }
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Message {
    /// Message identifier.
    pub id: MessageId,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// Author.
    pub sender_id: UserId,
    /// Body text.
    pub content: String,
    /// When the recipient read it.
    pub read_at: Option<DateTime<Utc>>,
    /// Send time.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Creates an unread message stamped now.
    #[must_use]
    pub fn new(conversation_id: ConversationId, sender_id: UserId, content: String) -> Self {
        Self {
            id: MessageId::new(),
            conversation_id,
            sender_id,
            content,
            read_at: None,
            created_at: Utc::now(),
        }
    }
}
