//! Direct messaging between two members.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::validate::bounded_text;
use crate::domain::{Conversation, ConversationId, Message, ParticipantPair, UserId};
use crate::error::MarketError;
use crate::store::{ConversationOverview, MarketStore, Page};

use super::require_profile;

const CONTENT_MAX: usize = 2000;

/// Orchestrates conversations and messages.
#[derive(Debug, Clone)]
pub struct MessagingService {
    store: Arc<dyn MarketStore>,
}

impl MessagingService {
    /// Creates a new `MessagingService`.
    #[must_use]
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    /// Returns the conversation between the caller and `other`, creating
    /// it on first contact.
    ///
    /// # Errors
    ///
    /// [`MarketError::InvalidRequest`] when `other` is the caller,
    /// [`MarketError::NotFound`] if `other` has no profile.
    pub async fn open(&self, user: UserId, other: UserId) -> Result<Conversation, MarketError> {
        let pair = ParticipantPair::new(user, other)?;
        require_profile(self.store.as_ref(), other).await?;
        let conversation = self.store.get_or_create_conversation(pair).await?;
        tracing::debug!(conversation_id = %conversation.id, user_id = %user, "conversation opened");
        Ok(conversation)
    }

    /// The caller's conversations, most recently active first.
    ///
    /// # Errors
    ///
    /// [`MarketError::Persistence`] on store failure.
    pub async fn list(&self, user: UserId) -> Result<Vec<ConversationOverview>, MarketError> {
        self.store.list_conversations(user).await
    }

    /// A page of messages, oldest first.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotFound`] / [`MarketError::Forbidden`] unless the
    /// caller takes part in the conversation.
    pub async fn messages(
        &self,
        user: UserId,
        id: ConversationId,
        page: Page,
    ) -> Result<(Vec<Message>, u64), MarketError> {
        self.participant(user, id).await?;
        self.store.list_messages(id, page).await
    }

    /// Posts a message from the caller.
    ///
    /// # Errors
    ///
    /// [`MarketError::InvalidRequest`] for empty or oversized content,
    /// [`MarketError::NotFound`] / [`MarketError::Forbidden`] unless the
    /// caller takes part in the conversation.
    pub async fn send(
        &self,
        user: UserId,
        id: ConversationId,
        content: &str,
    ) -> Result<Message, MarketError> {
        let content = bounded_text("content", content, 1, CONTENT_MAX)?;
        self.participant(user, id).await?;
        let message = self.store.insert_message(Message::new(id, user, content)).await?;
        tracing::info!(conversation_id = %id, message_id = %message.id, sender_id = %user, "message sent");
        Ok(message)
    }

    /// Marks the other participant's messages as read; returns how many.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotFound`] / [`MarketError::Forbidden`] unless the
    /// caller takes part in the conversation.
    pub async fn mark_read(&self, user: UserId, id: ConversationId) -> Result<u64, MarketError> {
        self.participant(user, id).await?;
        let marked = self.store.mark_read(id, user, Utc::now()).await?;
        tracing::debug!(conversation_id = %id, reader_id = %user, marked, "messages read");
        Ok(marked)
    }

    async fn participant(&self, user: UserId, id: ConversationId) -> Result<Conversation, MarketError> {
        let conversation = self
            .store
            .get_conversation(id)
            .await?
            .ok_or_else(|| MarketError::not_found("conversation", id))?;
        if !conversation.involves(user) {
            return Err(MarketError::Forbidden(
                "not a participant of this conversation".to_string(),
            ));
        }
        Ok(conversation)
    }
}
