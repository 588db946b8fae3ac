//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::auth::JwtVerifier;
use crate::service::{
    MessagingService, ProfileService, ProfileSettings, RequestService, ReviewService,
    SessionService,
};
use crate::store::MarketStore;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Profiles, skills and credits.
    pub profiles: Arc<ProfileService>,
    /// Learning requests.
    pub requests: Arc<RequestService>,
    /// Sessions and settlement.
    pub sessions: Arc<SessionService>,
    /// Conversations and messages.
    pub messaging: Arc<MessagingService>,
    /// Reviews.
    pub reviews: Arc<ReviewService>,
    /// Backing store, used directly only for health checks.
    pub store: Arc<dyn MarketStore>,
    /// Bearer token verifier used by [`crate::auth::AuthUser`].
    pub jwt: Arc<JwtVerifier>,
}

impl AppState {
    /// Wires every service over one `store`.
    #[must_use]
    pub fn new(store: Arc<dyn MarketStore>, settings: ProfileSettings, jwt: JwtVerifier) -> Self {
        Self {
            profiles: Arc::new(ProfileService::new(Arc::clone(&store), settings)),
            requests: Arc::new(RequestService::new(Arc::clone(&store))),
            sessions: Arc::new(SessionService::new(Arc::clone(&store))),
            messaging: Arc::new(MessagingService::new(Arc::clone(&store))),
            reviews: Arc::new(ReviewService::new(Arc::clone(&store))),
            store,
            jwt: Arc::new(jwt),
        }
    }
}
