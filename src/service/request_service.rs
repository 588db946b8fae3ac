//! Learning request lifecycle: send, accept, reject, cancel.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::domain::ledger::MIN_BALANCE_TO_REQUEST;
use crate::domain::validate::{duration_minutes, optional_text};
use crate::domain::{LearningRequest, RequestId, RequestStatus, Session, SkillId, UserId};
use crate::error::MarketError;
use crate::store::{Acceptance, MarketStore, RequestFilter};

use super::{require_profile, require_skill};

const MESSAGE_MAX: usize = 1000;
const DEFAULT_DURATION_MINUTES: u32 = 60;
const DEFAULT_LEAD_HOURS: i64 = 24;

/// Input of [`RequestService::send`].
#[derive(Debug, Clone)]
pub struct SendRequest {
    /// Requested tutor.
    pub tutor_id: UserId,
    /// Skill to learn.
    pub skill_id: SkillId,
    /// Optional note to the tutor.
    pub message: Option<String>,
    /// Optional proposed start time.
    pub proposed_time: Option<DateTime<Utc>>,
}

/// Input of [`RequestService::accept`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptRequest {
    /// Session start; defaults to the proposed time, else a day from now.
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Session length; defaults to 60 minutes.
    pub duration_minutes: Option<u32>,
}

/// Orchestrates learning request operations.
#[derive(Debug, Clone)]
pub struct RequestService {
    store: Arc<dyn MarketStore>,
}

impl RequestService {
    /// Creates a new `RequestService`.
    #[must_use]
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    /// Sends a learning request from `learner` to a tutor.
    ///
    /// The learner must hold enough credits for one session; nothing is
    /// deducted until the session completes.
    ///
    /// # Errors
    ///
    /// [`MarketError::InvalidRequest`] for a self-request or long message,
    /// [`MarketError::NotFound`] for an unknown tutor, skill or learner,
    /// [`MarketError::InsufficientCredits`] below one session's cost.
    pub async fn send(&self, learner: UserId, input: SendRequest) -> Result<LearningRequest, MarketError> {
        if input.tutor_id == learner {
            return Err(MarketError::InvalidRequest(
                "cannot send a request to yourself".to_string(),
            ));
        }
        let message = optional_text("message", input.message.as_deref(), MESSAGE_MAX)?;

        require_profile(self.store.as_ref(), input.tutor_id).await?;
        require_skill(self.store.as_ref(), input.skill_id).await?;
        let profile = require_profile(self.store.as_ref(), learner).await?;
        if profile.credit_balance < MIN_BALANCE_TO_REQUEST {
            return Err(MarketError::InsufficientCredits {
                required: MIN_BALANCE_TO_REQUEST,
                available: profile.credit_balance,
            });
        }

        let request = self
            .store
            .insert_request(LearningRequest::new(
                learner,
                input.tutor_id,
                input.skill_id,
                message,
                input.proposed_time,
            ))
            .await?;
        tracing::info!(
            request_id = %request.id,
            learner_id = %learner,
            tutor_id = %request.tutor_id,
            skill_id = %request.skill_id,
            "learning request sent"
        );
        Ok(request)
    }

    /// Accepts a pending request: books the session and posts a booking
    /// message from the tutor, atomically.
    ///
    /// # Errors
    ///
    /// [`MarketError::Forbidden`] unless `tutor` is the request's tutor,
    /// [`MarketError::NotPending`] if it was already resolved.
    pub async fn accept(
        &self,
        tutor: UserId,
        id: RequestId,
        input: AcceptRequest,
    ) -> Result<Acceptance, MarketError> {
        let request = self.load(id).await?;
        if request.tutor_id != tutor {
            return Err(MarketError::Forbidden(
                "only the tutor can accept this request".to_string(),
            ));
        }
        if request.status != RequestStatus::Pending {
            return Err(MarketError::NotPending(request.status));
        }

        let scheduled_at = input
            .scheduled_at
            .or(request.proposed_time)
            .unwrap_or_else(|| Utc::now() + Duration::hours(DEFAULT_LEAD_HOURS));
        let minutes = duration_minutes(input.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES))?;
        let skill = require_skill(self.store.as_ref(), request.skill_id).await?;

        let session = Session::from_request(&request, scheduled_at, minutes);
        let greeting = format!(
            "I've accepted your request to learn {}. Session booked for {} ({} minutes).",
            skill.name,
            scheduled_at.format("%Y-%m-%d %H:%M UTC"),
            minutes
        );
        let acceptance = self.store.accept_request(id, session, greeting).await?;
        tracing::info!(
            request_id = %id,
            session_id = %acceptance.session.id,
            conversation_id = %acceptance.conversation.id,
            "learning request accepted"
        );
        Ok(acceptance)
    }

    /// Rejects a pending request.
    ///
    /// # Errors
    ///
    /// [`MarketError::Forbidden`] unless `tutor` is the request's tutor,
    /// [`MarketError::NotPending`] if it was already resolved.
    pub async fn reject(&self, tutor: UserId, id: RequestId) -> Result<LearningRequest, MarketError> {
        let request = self.load(id).await?;
        if request.tutor_id != tutor {
            return Err(MarketError::Forbidden(
                "only the tutor can reject this request".to_string(),
            ));
        }
        let request = self.store.resolve_request(id, RequestStatus::Rejected).await?;
        tracing::info!(request_id = %id, "learning request rejected");
        Ok(request)
    }

    /// Withdraws a pending request.
    ///
    /// # Errors
    ///
    /// [`MarketError::Forbidden`] unless `learner` sent the request,
    /// [`MarketError::NotPending`] if it was already resolved.
    pub async fn cancel(&self, learner: UserId, id: RequestId) -> Result<LearningRequest, MarketError> {
        let request = self.load(id).await?;
        if request.learner_id != learner {
            return Err(MarketError::Forbidden(
                "only the learner can cancel this request".to_string(),
            ));
        }
        let request = self.store.resolve_request(id, RequestStatus::Cancelled).await?;
        tracing::info!(request_id = %id, "learning request cancelled");
        Ok(request)
    }

    /// Loads a request the caller takes part in.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotFound`] if missing, [`MarketError::Forbidden`] for
    /// outsiders.
    pub async fn get(&self, user: UserId, id: RequestId) -> Result<LearningRequest, MarketError> {
        let request = self.load(id).await?;
        if !request.involves(user) {
            return Err(MarketError::Forbidden(
                "not a participant of this request".to_string(),
            ));
        }
        Ok(request)
    }

    /// Lists the caller's requests.
    ///
    /// # Errors
    ///
    /// [`MarketError::Persistence`] on store failure.
    pub async fn list(
        &self,
        user: UserId,
        filter: RequestFilter,
    ) -> Result<Vec<LearningRequest>, MarketError> {
        self.store.list_requests(user, filter).await
    }

    async fn load(&self, id: RequestId) -> Result<LearningRequest, MarketError> {
        self.store
            .get_request(id)
            .await?
            .ok_or_else(|| MarketError::not_found("request", id))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Credits;
    use crate::service::testing::{any_skill, balance, member, store};
    use crate::store::Party;

    async fn setup(learner_balance: Credits) -> (RequestService, Arc<dyn MarketStore>, UserId, UserId, SkillId) {
        let store = store();
        let learner = member(&store, "Learner", learner_balance).await;
        let tutor = member(&store, "Tutor", Credits::ZERO).await;
        let skill = any_skill(&store).await.id;
        (RequestService::new(Arc::clone(&store)), store, learner, tutor, skill)
    }

    fn to(tutor: UserId, skill: SkillId) -> SendRequest {
        SendRequest {
            tutor_id: tutor,
            skill_id: skill,
            message: Some("Hi!".to_string()),
            proposed_time: None,
        }
    }

    #[tokio::test]
    async fn cannot_request_yourself() {
        let (svc, _, learner, _, skill) = setup(Credits::whole(3)).await;
        let result = svc.send(learner, to(learner, skill)).await;
        let Err(MarketError::InvalidRequest(msg)) = result else {
            panic!("expected invalid request");
        };
        assert_eq!(msg, "cannot send a request to yourself");
    }

    #[tokio::test]
    async fn insufficient_credits_creates_nothing() {
        let (svc, _, learner, tutor, skill) = setup(Credits::from_cents(99)).await;
        let result = svc.send(learner, to(tutor, skill)).await;
        assert!(matches!(result, Err(MarketError::InsufficientCredits { .. })));
        let Ok(rows) = svc.list(learner, RequestFilter::default()).await else {
            panic!("list failed");
        };
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn unknown_tutor_or_skill_is_not_found() {
        let (svc, _, learner, tutor, skill) = setup(Credits::whole(3)).await;
        let no_tutor = svc.send(learner, to(UserId::new(), skill)).await;
        assert!(matches!(no_tutor, Err(MarketError::NotFound { .. })));
        let no_skill = svc.send(learner, to(tutor, SkillId::new())).await;
        assert!(matches!(no_skill, Err(MarketError::NotFound { .. })));
    }

    #[tokio::test]
    async fn sending_does_not_deduct() {
        let (svc, store, learner, tutor, skill) = setup(Credits::whole(1)).await;
        let Ok(request) = svc.send(learner, to(tutor, skill)).await else {
            panic!("send failed");
        };
        assert_eq!(request.status, RequestStatus::Pending);
        assert_eq!(balance(&store, learner).await, Credits::whole(1));
    }

    #[tokio::test]
    async fn accept_books_session_and_greets() {
        let (svc, store, learner, tutor, skill) = setup(Credits::whole(3)).await;
        let Ok(request) = svc.send(learner, to(tutor, skill)).await else {
            panic!("send failed");
        };
        let Ok(acceptance) = svc.accept(tutor, request.id, AcceptRequest::default()).await else {
            panic!("accept failed");
        };
        assert_eq!(acceptance.request.status, RequestStatus::Accepted);
        assert_eq!(acceptance.session.request_id, Some(request.id));
        assert_eq!(acceptance.session.duration_minutes, 60);
        assert_eq!(acceptance.message.sender_id, tutor);
        assert!(acceptance.conversation.involves(learner));
        assert!(acceptance.session.scheduled_at > Utc::now() + Duration::hours(23));

        let Ok(sessions) = store.list_sessions(learner, None).await else {
            panic!("list failed");
        };
        assert_eq!(sessions.len(), 1);
    }

    #[tokio::test]
    async fn accept_uses_proposed_time() {
        let (svc, _, learner, tutor, skill) = setup(Credits::whole(3)).await;
        let proposed = Utc::now() + Duration::days(3);
        let input = SendRequest {
            proposed_time: Some(proposed),
            ..to(tutor, skill)
        };
        let Ok(request) = svc.send(learner, input).await else {
            panic!("send failed");
        };
        let Ok(acceptance) = svc.accept(tutor, request.id, AcceptRequest::default()).await else {
            panic!("accept failed");
        };
        assert_eq!(acceptance.session.scheduled_at, proposed);
    }

    #[tokio::test]
    async fn only_tutor_accepts_and_only_once() {
        let (svc, _, learner, tutor, skill) = setup(Credits::whole(3)).await;
        let Ok(request) = svc.send(learner, to(tutor, skill)).await else {
            panic!("send failed");
        };
        let by_learner = svc.accept(learner, request.id, AcceptRequest::default()).await;
        assert!(matches!(by_learner, Err(MarketError::Forbidden(_))));

        assert!(svc.accept(tutor, request.id, AcceptRequest::default()).await.is_ok());
        let second = svc.accept(tutor, request.id, AcceptRequest::default()).await;
        assert!(matches!(second, Err(MarketError::NotPending(RequestStatus::Accepted))));
    }

    #[tokio::test]
    async fn concurrent_accepts_book_one_session() {
        let (svc, store, learner, tutor, skill) = setup(Credits::whole(3)).await;
        let Ok(request) = svc.send(learner, to(tutor, skill)).await else {
            panic!("send failed");
        };
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let svc = svc.clone();
                tokio::spawn(async move { svc.accept(tutor, request.id, AcceptRequest::default()).await })
            })
            .collect();
        let mut won = 0;
        for handle in handles {
            let Ok(result) = handle.await else {
                panic!("task panicked");
            };
            match result {
                Ok(_) => won += 1,
                Err(MarketError::NotPending(_)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(won, 1);
        let Ok(sessions) = store.list_sessions(tutor, None).await else {
            panic!("list failed");
        };
        assert_eq!(sessions.len(), 1);
    }

    #[tokio::test]
    async fn bad_duration_is_rejected() {
        let (svc, _, learner, tutor, skill) = setup(Credits::whole(3)).await;
        let Ok(request) = svc.send(learner, to(tutor, skill)).await else {
            panic!("send failed");
        };
        let input = AcceptRequest {
            duration_minutes: Some(5),
            ..AcceptRequest::default()
        };
        let result = svc.accept(tutor, request.id, input).await;
        assert!(matches!(result, Err(MarketError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn reject_and_cancel_respect_roles() {
        let (svc, _, learner, tutor, skill) = setup(Credits::whole(3)).await;
        let Ok(first) = svc.send(learner, to(tutor, skill)).await else {
            panic!("send failed");
        };
        assert!(matches!(svc.reject(learner, first.id).await, Err(MarketError::Forbidden(_))));
        let Ok(rejected) = svc.reject(tutor, first.id).await else {
            panic!("reject failed");
        };
        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert!(matches!(svc.cancel(learner, first.id).await, Err(MarketError::NotPending(_))));

        let Ok(second) = svc.send(learner, to(tutor, skill)).await else {
            panic!("send failed");
        };
        assert!(matches!(svc.cancel(tutor, second.id).await, Err(MarketError::Forbidden(_))));
        let Ok(cancelled) = svc.cancel(learner, second.id).await else {
            panic!("cancel failed");
        };
        assert_eq!(cancelled.status, RequestStatus::Cancelled);
    }

    #[tokio::test]
    async fn listing_filters_by_role_and_status() {
        let (svc, _, learner, tutor, skill) = setup(Credits::whole(3)).await;
        assert!(svc.send(learner, to(tutor, skill)).await.is_ok());

        let as_tutor = RequestFilter {
            role: Some(Party::Tutor),
            status: None,
        };
        let Ok(mine) = svc.list(learner, as_tutor).await else {
            panic!("list failed");
        };
        assert!(mine.is_empty());
        let Ok(inbox) = svc.list(tutor, as_tutor).await else {
            panic!("list failed");
        };
        assert_eq!(inbox.len(), 1);

        let Some(first) = inbox.first() else {
            panic!("inbox empty");
        };
        let outsider = svc.get(UserId::new(), first.id).await;
        assert!(matches!(outsider, Err(MarketError::Forbidden(_))));
    }
}
