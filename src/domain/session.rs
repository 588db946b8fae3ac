//! Booked teaching sessions.
//!
//! ```text
//! scheduled ──start──▶ in_progress
//!     │                    │
//!     ├──────complete──────┼──▶ completed
//!     └──────cancel────────┴──▶ cancelled
//! ```
//!
//! `completed` and `cancelled` are terminal. Completion happens exactly once
//! and drives the credit settlement in [`super::ledger`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{LearningRequest, RequestId, SessionId, SkillId, UserId};
use crate::error::MarketError;

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Booked, not yet started.
    Scheduled,
    /// Under way.
    InProgress,
    /// Finished and settled.
    Completed,
    /// Called off; no credits moved.
    Cancelled,
}

impl SessionStatus {
    /// Returns the status as its wire/database string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Returns `true` for `scheduled` and `in_progress`.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Scheduled | Self::InProgress)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = MarketError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(MarketError::InvalidRequest(format!(
                "unknown session status: {other}"
            ))),
        }
    }
}

/// A scheduled or finished teaching engagement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Session {
    /// Session identifier.
    pub id: SessionId,
    /// Teaching user; `None` for AI-assisted sessions.
    pub tutor_id: Option<UserId>,
    /// Learning user.
    pub learner_id: UserId,
    /// Skill covered.
    pub skill_id: SkillId,
    /// Request this session was booked from, if any.
    pub request_id: Option<RequestId>,
    /// Start time.
    pub scheduled_at: DateTime<Utc>,
    /// Planned length.
    pub duration_minutes: u32,
    /// Current lifecycle state.
    pub status: SessionStatus,
    /// Free-form notes, set on completion.
    pub notes: Option<String>,
    /// Whether the tutor is the AI assistant.
    pub is_ai_session: bool,
    /// Booking time.
    pub created_at: DateTime<Utc>,
    /// Completion time, once completed.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Books a human session from an accepted request.
    #[must_use]
    pub fn from_request(
        request: &LearningRequest,
        scheduled_at: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Self {
        Self {
            id: SessionId::new(),
            tutor_id: Some(request.tutor_id),
            learner_id: request.learner_id,
            skill_id: request.skill_id,
            request_id: Some(request.id),
            scheduled_at,
            duration_minutes,
            status: SessionStatus::Scheduled,
            notes: None,
            is_ai_session: false,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Books an AI-assisted session with no human tutor.
    #[must_use]
    pub fn ai(
        learner_id: UserId,
        skill_id: SkillId,
        scheduled_at: DateTime<Utc>,
        duration_minutes: u32,
    ) -> Self {
        Self {
            id: SessionId::new(),
            tutor_id: None,
            learner_id,
            skill_id,
            request_id: None,
            scheduled_at,
            duration_minutes,
            status: SessionStatus::Scheduled,
            notes: None,
            is_ai_session: true,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Returns `true` if `user` is the learner or the tutor.
    #[must_use]
    pub fn involves(&self, user: UserId) -> bool {
        self.learner_id == user || self.tutor_id == Some(user)
    }

    /// Returns the other human participant from `user`'s point of view.
    #[must_use]
    pub fn counterpart_of(&self, user: UserId) -> Option<UserId> {
        if self.learner_id == user {
            self.tutor_id
        } else if self.tutor_id == Some(user) {
            Some(self.learner_id)
        } else {
            None
        }
    }

    /// Checks the session can still complete or be cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::SessionClosed`] for terminal sessions.
    pub fn ensure_open(&self) -> Result<(), MarketError> {
        if self.status.is_open() {
            Ok(())
        } else {
            Err(MarketError::SessionClosed(self.status))
        }
    }

    /// Moves a scheduled session to `in_progress`.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::SessionClosed`] for terminal sessions and
    /// [`MarketError::InvalidRequest`] if it is already in progress.
    pub fn start(&mut self) -> Result<(), MarketError> {
        self.ensure_open()?;
        if self.status == SessionStatus::InProgress {
            return Err(MarketError::InvalidRequest(
                "session is already in progress".to_string(),
            ));
        }
        self.status = SessionStatus::InProgress;
        Ok(())
    }

    /// Marks an open session completed, replacing notes when given.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::SessionClosed`] for terminal sessions.
    pub fn complete(&mut self, notes: Option<String>, at: DateTime<Utc>) -> Result<(), MarketError> {
        self.ensure_open()?;
        self.status = SessionStatus::Completed;
        if notes.is_some() {
            self.notes = notes;
        }
        self.completed_at = Some(at);
        Ok(())
    }

    /// Cancels an open session.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::SessionClosed`] for terminal sessions.
    pub fn cancel(&mut self) -> Result<(), MarketError> {
        self.ensure_open()?;
        self.status = SessionStatus::Cancelled;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn human() -> Session {
        let req = LearningRequest::new(UserId::new(), UserId::new(), SkillId::new(), None, None);
        Session::from_request(&req, Utc::now(), 60)
    }

    #[test]
    fn from_request_copies_parties() {
        let req = LearningRequest::new(UserId::new(), UserId::new(), SkillId::new(), None, None);
        let session = Session::from_request(&req, Utc::now(), 45);
        assert_eq!(session.tutor_id, Some(req.tutor_id));
        assert_eq!(session.learner_id, req.learner_id);
        assert_eq!(session.request_id, Some(req.id));
        assert_eq!(session.status, SessionStatus::Scheduled);
        assert!(!session.is_ai_session);
    }

    #[test]
    fn ai_session_has_no_tutor() {
        let learner = UserId::new();
        let session = Session::ai(learner, SkillId::new(), Utc::now(), 30);
        assert!(session.is_ai_session);
        assert_eq!(session.tutor_id, None);
        assert_eq!(session.counterpart_of(learner), None);
    }

    #[test]
    fn complete_is_terminal() {
        let mut session = human();
        assert!(session.complete(Some("great".to_string()), Utc::now()).is_ok());
        assert_eq!(session.status, SessionStatus::Completed);
        assert!(session.completed_at.is_some());

        let again = session.complete(None, Utc::now());
        assert!(matches!(again, Err(MarketError::SessionClosed(SessionStatus::Completed))));
        assert_eq!(session.notes.as_deref(), Some("great"));
    }

    #[test]
    fn start_then_cancel() {
        let mut session = human();
        assert!(session.start().is_ok());
        assert!(session.start().is_err());
        assert!(session.cancel().is_ok());
        assert!(session.start().is_err());
        assert!(session.complete(None, Utc::now()).is_err());
    }

    #[test]
    fn counterpart_and_involvement() {
        let session = human();
        let Some(tutor) = session.tutor_id else {
            panic!("human sessions have a tutor");
        };
        assert_eq!(session.counterpart_of(session.learner_id), Some(tutor));
        assert_eq!(session.counterpart_of(tutor), Some(session.learner_id));
        assert!(!session.involves(UserId::new()));
    }

    #[test]
    fn status_strings() {
        assert_eq!(SessionStatus::InProgress.as_str(), "in_progress");
        assert_eq!("in_progress".parse::<SessionStatus>().ok(), Some(SessionStatus::InProgress));
        assert!(SessionStatus::Scheduled.is_open());
        assert!(SessionStatus::InProgress.is_open());
        assert!(!SessionStatus::Completed.is_open());
        assert!(!SessionStatus::Cancelled.is_open());
    }
}
