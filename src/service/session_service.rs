//! Session lifecycle and settlement.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::ledger::AI_SESSION_COST;
use crate::domain::validate::{duration_minutes, optional_text};
use crate::domain::{Session, SessionId, SessionStatus, Settlement, SkillId, UserId};
use crate::error::MarketError;
use crate::store::{Completion, MarketStore};

use super::{require_profile, require_skill};

const NOTES_MAX: usize = 2000;
const AI_DEFAULT_DURATION_MINUTES: u32 = 30;

/// Input of [`SessionService::book_ai`].
#[derive(Debug, Clone, Copy)]
pub struct BookAiSession {
    /// Skill to practise.
    pub skill_id: SkillId,
    /// Start time; defaults to now.
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Length; defaults to 30 minutes.
    pub duration_minutes: Option<u32>,
}

/// Orchestrates session operations.
#[derive(Debug, Clone)]
pub struct SessionService {
    store: Arc<dyn MarketStore>,
}

impl SessionService {
    /// Creates a new `SessionService`.
    #[must_use]
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    /// Books an AI-assisted session for `learner`.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotFound`] for an unknown skill or learner,
    /// [`MarketError::InsufficientCredits`] below the AI session cost.
    pub async fn book_ai(&self, learner: UserId, input: BookAiSession) -> Result<Session, MarketError> {
        let minutes = duration_minutes(input.duration_minutes.unwrap_or(AI_DEFAULT_DURATION_MINUTES))?;
        require_skill(self.store.as_ref(), input.skill_id).await?;
        let profile = require_profile(self.store.as_ref(), learner).await?;
        if profile.credit_balance < AI_SESSION_COST {
            return Err(MarketError::InsufficientCredits {
                required: AI_SESSION_COST,
                available: profile.credit_balance,
            });
        }
        let session = Session::ai(
            learner,
            input.skill_id,
            input.scheduled_at.unwrap_or_else(Utc::now),
            minutes,
        );
        let session = self.store.insert_session(session).await?;
        tracing::info!(session_id = %session.id, learner_id = %learner, "AI session booked");
        Ok(session)
    }

    /// Completes an open session and settles its credits atomically.
    ///
    /// # Errors
    ///
    /// [`MarketError::Forbidden`] for non-participants,
    /// [`MarketError::SessionClosed`] if already completed or cancelled,
    /// [`MarketError::InsufficientCredits`] if the learner cannot pay.
    pub async fn complete(
        &self,
        user: UserId,
        id: SessionId,
        notes: Option<&str>,
    ) -> Result<Completion, MarketError> {
        let notes = optional_text("notes", notes, NOTES_MAX)?;
        let session = self.get(user, id).await?;
        session.ensure_open()?;
        let skill = require_skill(self.store.as_ref(), session.skill_id).await?;

        let settlement = Settlement::for_session(&session, &skill.name);
        let completion = self.store.complete_session(id, notes, &settlement).await?;
        tracing::info!(
            session_id = %id,
            learner_id = %completion.session.learner_id,
            cost = %settlement.learner_cost(),
            ai = completion.session.is_ai_session,
            "session completed"
        );
        Ok(completion)
    }

    /// Moves a scheduled session to in-progress.
    ///
    /// # Errors
    ///
    /// [`MarketError::Forbidden`] for non-participants,
    /// [`MarketError::SessionClosed`] for terminal sessions.
    pub async fn start(&self, user: UserId, id: SessionId) -> Result<Session, MarketError> {
        self.get(user, id).await?;
        let session = self.store.transition_session(id, SessionStatus::InProgress).await?;
        tracing::info!(session_id = %id, "session started");
        Ok(session)
    }

    /// Cancels an open session. No credits move.
    ///
    /// # Errors
    ///
    /// [`MarketError::Forbidden`] for non-participants,
    /// [`MarketError::SessionClosed`] for terminal sessions.
    pub async fn cancel(&self, user: UserId, id: SessionId) -> Result<Session, MarketError> {
        self.get(user, id).await?;
        let session = self.store.transition_session(id, SessionStatus::Cancelled).await?;
        tracing::info!(session_id = %id, cancelled_by = %user, "session cancelled");
        Ok(session)
    }

    /// Loads a session the caller takes part in.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotFound`] if missing, [`MarketError::Forbidden`] for
    /// outsiders.
    pub async fn get(&self, user: UserId, id: SessionId) -> Result<Session, MarketError> {
        let session = self
            .store
            .get_session(id)
            .await?
            .ok_or_else(|| MarketError::not_found("session", id))?;
        if !session.involves(user) {
            return Err(MarketError::Forbidden(
                "not a participant of this session".to_string(),
            ));
        }
        Ok(session)
    }

    /// Lists the caller's sessions.
    ///
    /// # Errors
    ///
    /// [`MarketError::Persistence`] on store failure.
    pub async fn list(
        &self,
        user: UserId,
        status: Option<SessionStatus>,
    ) -> Result<Vec<Session>, MarketError> {
        self.store.list_sessions(user, status).await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{CreditTransaction, Credits, TransactionType};
    use crate::service::request_service::{AcceptRequest, RequestService, SendRequest};
    use crate::service::testing::{any_skill, balance, member, store};
    use crate::store::Page;

    struct Fixture {
        store: Arc<dyn MarketStore>,
        sessions: SessionService,
        learner: UserId,
        tutor: UserId,
        skill: SkillId,
    }

    async fn fixture(learner_balance: Credits) -> Fixture {
        let store = store();
        let learner = member(&store, "Learner", learner_balance).await;
        let tutor = member(&store, "Tutor", Credits::ZERO).await;
        let skill = any_skill(&store).await.id;
        Fixture {
            sessions: SessionService::new(Arc::clone(&store)),
            store,
            learner,
            tutor,
            skill,
        }
    }

    async fn human_session(f: &Fixture) -> Session {
        let requests = RequestService::new(Arc::clone(&f.store));
        let Ok(request) = requests
            .send(
                f.learner,
                SendRequest {
                    tutor_id: f.tutor,
                    skill_id: f.skill,
                    message: None,
                    proposed_time: None,
                },
            )
            .await
        else {
            panic!("send failed");
        };
        let Ok(acceptance) = requests.accept(f.tutor, request.id, AcceptRequest::default()).await else {
            panic!("accept failed");
        };
        acceptance.session
    }

    #[tokio::test]
    async fn human_completion_moves_one_credit() {
        let f = fixture(Credits::whole(3)).await;
        let session = human_session(&f).await;
        let Ok(done) = f.sessions.complete(f.tutor, session.id, Some("great")).await else {
            panic!("complete failed");
        };
        assert_eq!(done.session.status, SessionStatus::Completed);
        assert_eq!(done.session.notes.as_deref(), Some("great"));
        assert_eq!(done.learner_balance, Credits::whole(2));
        assert_eq!(balance(&f.store, f.learner).await, Credits::whole(2));
        assert_eq!(balance(&f.store, f.tutor).await, Credits::whole(1));

        let Ok((learner_rows, _)) = f.store.list_transactions(f.learner, Page::ALL).await else {
            panic!("ledger failed");
        };
        assert!(learner_rows
            .iter()
            .any(|t| t.kind == TransactionType::SessionPayment && t.amount == -Credits::whole(1)));
        let Ok((tutor_rows, _)) = f.store.list_transactions(f.tutor, Page::ALL).await else {
            panic!("ledger failed");
        };
        assert_eq!(tutor_rows.len(), 1);
        assert_eq!(tutor_rows.first().map(|t| t.kind), Some(TransactionType::SessionEarning));
    }

    #[tokio::test]
    async fn ai_completion_charges_half_a_credit() {
        let f = fixture(Credits::whole(1)).await;
        let input = BookAiSession {
            skill_id: f.skill,
            scheduled_at: None,
            duration_minutes: None,
        };
        let Ok(session) = f.sessions.book_ai(f.learner, input).await else {
            panic!("booking failed");
        };
        assert!(session.is_ai_session);
        assert_eq!(session.duration_minutes, 30);

        let Ok(done) = f.sessions.complete(f.learner, session.id, None).await else {
            panic!("complete failed");
        };
        assert_eq!(done.learner_balance, Credits::from_cents(50));
        assert_eq!(done.transactions.len(), 1);
        assert_eq!(done.transactions.first().map(|t| t.kind), Some(TransactionType::AiSession));
    }

    #[tokio::test]
    async fn ai_booking_needs_half_a_credit() {
        let f = fixture(Credits::from_cents(49)).await;
        let input = BookAiSession {
            skill_id: f.skill,
            scheduled_at: None,
            duration_minutes: None,
        };
        let result = f.sessions.book_ai(f.learner, input).await;
        assert!(matches!(result, Err(MarketError::InsufficientCredits { .. })));
    }

    #[tokio::test]
    async fn second_completion_moves_nothing() {
        let f = fixture(Credits::whole(3)).await;
        let session = human_session(&f).await;
        assert!(f.sessions.complete(f.learner, session.id, None).await.is_ok());
        let again = f.sessions.complete(f.learner, session.id, None).await;
        assert!(matches!(again, Err(MarketError::SessionClosed(SessionStatus::Completed))));
        assert_eq!(balance(&f.store, f.learner).await, Credits::whole(2));
        assert_eq!(balance(&f.store, f.tutor).await, Credits::whole(1));
    }

    #[tokio::test]
    async fn concurrent_completions_settle_once() {
        let f = fixture(Credits::whole(3)).await;
        let session = human_session(&f).await;
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let svc = f.sessions.clone();
                let caller = if i % 2 == 0 { f.learner } else { f.tutor };
                let id = session.id;
                tokio::spawn(async move { svc.complete(caller, id, None).await })
            })
            .collect();
        let mut won = 0;
        for handle in handles {
            let Ok(result) = handle.await else {
                panic!("task panicked");
            };
            if result.is_ok() {
                won += 1;
            }
        }
        assert_eq!(won, 1);
        assert_eq!(balance(&f.store, f.learner).await, Credits::whole(2));
        assert_eq!(balance(&f.store, f.tutor).await, Credits::whole(1));
    }

    #[tokio::test]
    async fn broke_learner_cannot_complete() {
        let f = fixture(Credits::whole(1)).await;
        let session = human_session(&f).await;
        let drain = CreditTransaction::new(
            f.learner,
            -Credits::whole(1),
            TransactionType::TopUp,
            None,
            "refund",
        );
        assert!(f.store.apply_transaction(drain).await.is_ok());
        let result = f.sessions.complete(f.tutor, session.id, None).await;
        assert!(matches!(result, Err(MarketError::InsufficientCredits { .. })));
        let Ok(reloaded) = f.sessions.get(f.tutor, session.id).await else {
            panic!("get failed");
        };
        assert_eq!(reloaded.status, SessionStatus::Scheduled);
        assert_eq!(balance(&f.store, f.tutor).await, Credits::ZERO);
    }

    #[tokio::test]
    async fn outsiders_cannot_touch_sessions() {
        let f = fixture(Credits::whole(3)).await;
        let session = human_session(&f).await;
        let outsider = UserId::new();
        assert!(matches!(
            f.sessions.complete(outsider, session.id, None).await,
            Err(MarketError::Forbidden(_))
        ));
        assert!(matches!(
            f.sessions.cancel(outsider, session.id).await,
            Err(MarketError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn start_then_cancel_then_nothing() {
        let f = fixture(Credits::whole(3)).await;
        let session = human_session(&f).await;
        let Ok(started) = f.sessions.start(f.tutor, session.id).await else {
            panic!("start failed");
        };
        assert_eq!(started.status, SessionStatus::InProgress);
        let Ok(cancelled) = f.sessions.cancel(f.learner, session.id).await else {
            panic!("cancel failed");
        };
        assert_eq!(cancelled.status, SessionStatus::Cancelled);
        let late = f.sessions.complete(f.tutor, session.id, None).await;
        assert!(matches!(late, Err(MarketError::SessionClosed(SessionStatus::Cancelled))));
        assert_eq!(balance(&f.store, f.learner).await, Credits::whole(3));

        let Ok(open) = f.sessions.list(f.learner, Some(SessionStatus::Scheduled)).await else {
            panic!("list failed");
        };
        assert!(open.is_empty());
    }
}
