//! Domain layer: identifiers, credits, entities and their lifecycles.
//!
//! Everything here is storage-agnostic. State transitions are methods on
//! the entities and return [`crate::error::MarketError`] when a
//! precondition does not hold.

pub mod conversation;
pub mod credits;
pub mod ids;
pub mod ledger;
pub mod profile;
pub mod request;
pub mod review;
pub mod session;
pub mod skill;
pub mod validate;

pub use conversation::{Conversation, Message, ParticipantPair};
pub use credits::Credits;
pub use ids::{
    ConversationId, MessageId, RequestId, ReviewId, SessionId, SkillId, TransactionId, UserId,
};
pub use ledger::{CreditTransaction, Settlement, TransactionType};
pub use profile::{Profile, ProfileUpdate};
pub use request::{LearningRequest, RequestStatus};
pub use review::{Rating, Review};
pub use session::{Session, SessionStatus};
pub use skill::{Skill, SkillRole};
