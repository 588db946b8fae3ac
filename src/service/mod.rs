//! Service layer: business logic orchestration.
//!
//! Each service owns an `Arc<dyn MarketStore>` and follows the same shape:
//! validate input → load rows → check the caller's party → check status
//! preconditions → one atomic store call → log the state change.

pub mod messaging_service;
pub mod profile_service;
pub mod request_service;
pub mod review_service;
pub mod session_service;

pub use messaging_service::MessagingService;
pub use profile_service::{ProfileService, ProfileSettings};
pub use request_service::{AcceptRequest, RequestService, SendRequest};
pub use review_service::{ReviewService, ReviewSummary};
pub use session_service::{BookAiSession, SessionService};

use crate::domain::{Profile, Skill, SkillId, UserId};
use crate::error::MarketError;
use crate::store::MarketStore;

/// Loads a profile or fails with 404.
pub(crate) async fn require_profile(
    store: &dyn MarketStore,
    id: UserId,
) -> Result<Profile, MarketError> {
    store
        .get_profile(id)
        .await?
        .ok_or_else(|| MarketError::not_found("profile", id))
}

/// Loads a skill or fails with 404.
pub(crate) async fn require_skill(
    store: &dyn MarketStore,
    id: SkillId,
) -> Result<Skill, MarketError> {
    store
        .get_skill(id)
        .await?
        .ok_or_else(|| MarketError::not_found("skill", id))
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures shared by the service tests.

    use std::sync::Arc;

    use crate::domain::{CreditTransaction, Credits, Profile, Skill, TransactionType, UserId};
    use crate::store::{InMemoryStore, MarketStore};

    /// A store seeded with the default catalog.
    pub fn store() -> Arc<dyn MarketStore> {
        Arc::new(InMemoryStore::with_default_catalog())
    }

    /// Creates a profile holding `balance` credits.
    #[allow(clippy::panic)]
    pub async fn member(store: &Arc<dyn MarketStore>, name: &str, balance: Credits) -> UserId {
        let id = UserId::new();
        let grant = balance
            .is_positive()
            .then(|| CreditTransaction::new(id, balance, TransactionType::TopUp, None, "seed"));
        let Ok(_) = store
            .create_profile(Profile::new(id, name.to_string(), None, None), grant)
            .await
        else {
            panic!("profile creation failed");
        };
        id
    }

    /// Returns the first skill of the catalog.
    #[allow(clippy::panic)]
    pub async fn any_skill(store: &Arc<dyn MarketStore>) -> Skill {
        let Ok(skills) = store.list_skills(None).await else {
            panic!("listing skills failed");
        };
        let Some(skill) = skills.into_iter().next() else {
            panic!("catalog is empty");
        };
        skill
    }

    /// Current balance of `user`.
    #[allow(clippy::panic)]
    pub async fn balance(store: &Arc<dyn MarketStore>, user: UserId) -> Credits {
        let Ok(Some(profile)) = store.get_profile(user).await else {
            panic!("profile missing");
        };
        profile.credit_balance
    }
}
