//! Learning requests: a learner's proposal to a tutor.
//!
//! A request starts `pending` and is resolved exactly once, to `accepted`,
//! `rejected` or `cancelled`. Resolved requests never change again.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{RequestId, SkillId, UserId};
use crate::error::MarketError;

/// Lifecycle state of a [`LearningRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Awaiting the tutor's answer.
    Pending,
    /// Accepted by the tutor; a session was booked.
    Accepted,
    /// Declined by the tutor.
    Rejected,
    /// Withdrawn by the learner.
    Cancelled,
}

impl RequestStatus {
    /// Returns the status as its wire/database string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(MarketError::InvalidRequest(format!(
                "unknown request status: {other}"
            ))),
        }
    }
}

/// A learner's proposal to a tutor for a skill.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LearningRequest {
    /// Request identifier.
    pub id: RequestId,
    /// The user asking to learn.
    pub learner_id: UserId,
    /// The user asked to teach.
    pub tutor_id: UserId,
    /// Skill to be taught.
    pub skill_id: SkillId,
    /// Optional note from the learner.
    pub message: Option<String>,
    /// Time the learner proposed for the session.
    pub proposed_time: Option<DateTime<Utc>>,
    /// Current lifecycle state.
    pub status: RequestStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

impl LearningRequest {
    /// Creates a new pending request.
    #[must_use]
    pub fn new(
        learner_id: UserId,
        tutor_id: UserId,
        skill_id: SkillId,
        message: Option<String>,
        proposed_time: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: RequestId::new(),
            learner_id,
            tutor_id,
            skill_id,
            message,
            proposed_time,
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` if `user` is the learner or the tutor.
    #[must_use]
    pub fn involves(&self, user: UserId) -> bool {
        self.learner_id == user || self.tutor_id == user
    }

    /// Moves a pending request to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotPending`] when the request was already
    /// resolved, and [`MarketError::InvalidRequest`] when `to` is
    /// `Pending`.
    pub fn resolve(&mut self, to: RequestStatus) -> Result<(), MarketError> {
        if to == RequestStatus::Pending {
            return Err(MarketError::InvalidRequest(
                "a request cannot be moved back to pending".to_string(),
            ));
        }
        if self.status != RequestStatus::Pending {
            return Err(MarketError::NotPending(self.status));
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending() -> LearningRequest {
        LearningRequest::new(UserId::new(), UserId::new(), SkillId::new(), None, None)
    }

    #[test]
    fn new_request_is_pending() {
        assert_eq!(pending().status, RequestStatus::Pending);
    }

    #[test]
    fn resolve_once() {
        let mut req = pending();
        assert!(req.resolve(RequestStatus::Accepted).is_ok());
        assert_eq!(req.status, RequestStatus::Accepted);

        let second = req.resolve(RequestStatus::Accepted);
        assert!(matches!(second, Err(MarketError::NotPending(RequestStatus::Accepted))));
    }

    #[test]
    fn cannot_resolve_to_pending() {
        let mut req = pending();
        assert!(req.resolve(RequestStatus::Pending).is_err());
    }

    #[test]
    fn status_string_round_trip() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Accepted,
            RequestStatus::Rejected,
            RequestStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<RequestStatus>().ok(), Some(status));
        }
        assert!("done".parse::<RequestStatus>().is_err());
    }

    #[test]
    fn involves_both_parties_only() {
        let req = pending();
        assert!(req.involves(req.learner_id));
        assert!(req.involves(req.tutor_id));
        assert!(!req.involves(UserId::new()));
    }
}
