//! Conversation and message DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::PaginationMeta;
use crate::domain::{Conversation, ConversationId, Message, UserId};
use crate::store::ConversationOverview;

/// Request body for `POST /conversations`.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct OpenConversationBody {
    /// The member to talk to.
    pub participant_id: UserId,
}

/// A conversation from the caller's point of view.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConversationDto {
    /// Conversation id.
    pub id: ConversationId,
    /// The other participant.
    pub other_participant_id: UserId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last activity.
    pub last_message_at: DateTime<Utc>,
    /// Unread messages from the other participant.
    pub unread_count: u64,
}

impl ConversationDto {
    /// Builds the view of `conversation` for `viewer`.
    #[must_use]
    pub fn new(conversation: &Conversation, viewer: UserId, unread_count: u64) -> Self {
        Self {
            id: conversation.id,
            other_participant_id: conversation
                .other_participant(viewer)
                .unwrap_or(conversation.participant_a),
            created_at: conversation.created_at,
            last_message_at: conversation.last_message_at,
            unread_count,
        }
    }

    /// Builds the view of a listed conversation for `viewer`.
    #[must_use]
    pub fn from_overview(overview: &ConversationOverview, viewer: UserId) -> Self {
        Self::new(&overview.conversation, viewer, overview.unread_count)
    }
}

/// Request body for `POST /conversations/{id}/messages`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SendMessageBody {
    /// Text, 1–2000 characters after trimming.
    pub content: String,
}

/// Response for `GET /conversations/{id}/messages`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageListResponse {
    /// Messages, oldest first.
    pub data: Vec<Message>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}
