//! Post-session reviews.

use std::sync::Arc;

use crate::domain::review::average_rating;
use crate::domain::validate::optional_text;
use crate::domain::{Rating, Review, SessionId, SessionStatus, UserId};
use crate::error::MarketError;
use crate::store::MarketStore;

use super::require_profile;

const COMMENT_MAX: usize = 1000;

/// Reviews received by one member, with aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSummary {
    /// Newest first.
    pub reviews: Vec<Review>,
    /// Mean rating, `None` without reviews.
    pub average_rating: Option<f64>,
}

/// Orchestrates reviews.
#[derive(Debug, Clone)]
pub struct ReviewService {
    store: Arc<dyn MarketStore>,
}

impl ReviewService {
    /// Creates a new `ReviewService`.
    #[must_use]
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    /// Reviews the other participant of a completed human session.
    ///
    /// # Errors
    ///
    /// [`MarketError::Forbidden`] for non-participants,
    /// [`MarketError::InvalidRequest`] for AI or unfinished sessions and
    /// bad input, [`MarketError::Conflict`] on a second review by the same
    /// reviewer.
    pub async fn review(
        &self,
        reviewer: UserId,
        session_id: SessionId,
        stars: u8,
        comment: Option<&str>,
    ) -> Result<Review, MarketError> {
        let rating = Rating::new(stars)?;
        let comment = optional_text("comment", comment, COMMENT_MAX)?;

        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| MarketError::not_found("session", session_id))?;
        if !session.involves(reviewer) {
            return Err(MarketError::Forbidden(
                "not a participant of this session".to_string(),
            ));
        }
        if session.status != SessionStatus::Completed {
            return Err(MarketError::InvalidRequest(
                "only completed sessions can be reviewed".to_string(),
            ));
        }
        let Some(reviewee) = session.counterpart_of(reviewer) else {
            return Err(MarketError::InvalidRequest(
                "AI sessions cannot be reviewed".to_string(),
            ));
        };

        let review = self
            .store
            .insert_review(Review::new(session_id, reviewer, reviewee, rating, comment))
            .await?;
        tracing::info!(
            review_id = %review.id,
            %session_id,
            reviewer_id = %reviewer,
            reviewee_id = %reviewee,
            rating = stars,
            "review posted"
        );
        Ok(review)
    }

    /// Reviews received by `user` and their average.
    ///
    /// # Errors
    ///
    /// [`MarketError::NotFound`] if `user` has no profile.
    pub async fn received_by(&self, user: UserId) -> Result<ReviewSummary, MarketError> {
        require_profile(self.store.as_ref(), user).await?;
        let reviews = self.store.list_reviews_for(user).await?;
        Ok(ReviewSummary {
            average_rating: average_rating(&reviews),
            reviews,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{Credits, Session, Settlement, SkillId};
    use crate::service::testing::{any_skill, member, store};

    async fn completed(store: &Arc<dyn MarketStore>, learner: UserId, tutor: Option<UserId>) -> SessionId {
        let skill = any_skill(store).await;
        let mut session = Session::ai(learner, skill.id, chrono::Utc::now(), 60);
        if let Some(tutor) = tutor {
            session.tutor_id = Some(tutor);
            session.is_ai_session = false;
        }
        let Ok(session) = store.insert_session(session).await else {
            panic!("insert failed");
        };
        let settlement = Settlement::for_session(&session, &skill.name);
        let Ok(done) = store.complete_session(session.id, None, &settlement).await else {
            panic!("complete failed");
        };
        done.session.id
    }

    #[tokio::test]
    async fn participants_review_each_other_once() {
        let store = store();
        let learner = member(&store, "L", Credits::whole(3)).await;
        let tutor = member(&store, "T", Credits::ZERO).await;
        let session = completed(&store, learner, Some(tutor)).await;
        let svc = ReviewService::new(store);

        let Ok(review) = svc.review(learner, session, 5, Some("Great")).await else {
            panic!("review failed");
        };
        assert_eq!(review.reviewee_id, tutor);
        let again = svc.review(learner, session, 4, None).await;
        assert!(matches!(again, Err(MarketError::Conflict(_))));
        assert!(svc.review(tutor, session, 3, None).await.is_ok());

        let Ok(summary) = svc.received_by(tutor).await else {
            panic!("summary failed");
        };
        assert_eq!(summary.reviews.len(), 1);
        assert_eq!(summary.average_rating, Some(5.0));
    }

    #[tokio::test]
    async fn open_or_ai_sessions_cannot_be_reviewed() {
        let store = store();
        let learner = member(&store, "L", Credits::whole(3)).await;
        let ai = completed(&store, learner, None).await;
        let svc = ReviewService::new(Arc::clone(&store));
        assert!(matches!(
            svc.review(learner, ai, 5, None).await,
            Err(MarketError::InvalidRequest(_))
        ));

        let tutor = member(&store, "T", Credits::ZERO).await;
        let mut open = Session::ai(learner, SkillId::new(), chrono::Utc::now(), 60);
        open.tutor_id = Some(tutor);
        open.is_ai_session = false;
        let Ok(open) = store.insert_session(open).await else {
            panic!("insert failed");
        };
        assert!(matches!(
            svc.review(learner, open.id, 5, None).await,
            Err(MarketError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn rating_must_be_one_to_five() {
        let svc = ReviewService::new(store());
        let result = svc.review(UserId::new(), SessionId::new(), 6, None).await;
        assert!(matches!(result, Err(MarketError::InvalidRequest(_))));
    }
}
