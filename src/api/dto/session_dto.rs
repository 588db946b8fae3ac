//! Session DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{CreditTransaction, Credits, Session, SessionStatus, SkillId};
use crate::service::BookAiSession;
use crate::store::Completion;

/// Request body for `POST /sessions/ai`.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct BookAiSessionBody {
    /// Skill to practise.
    pub skill_id: SkillId,
    /// Start time; defaults to now.
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Length in minutes (15–480); defaults to 30.
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

impl From<BookAiSessionBody> for BookAiSession {
    fn from(body: BookAiSessionBody) -> Self {
        Self {
            skill_id: body.skill_id,
            scheduled_at: body.scheduled_at,
            duration_minutes: body.duration_minutes,
        }
    }
}

/// Optional request body for `POST /sessions/{id}/complete`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CompleteSessionBody {
    /// Replaces the session notes (up to 2000 characters).
    #[serde(default)]
    pub notes: Option<String>,
}

/// Response for `POST /sessions/{id}/complete`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CompleteSessionResponse {
    /// The completed session.
    pub session: Session,
    /// Learner's balance after the charge.
    pub learner_balance: Credits,
    /// Ledger rows written.
    pub transactions: Vec<CreditTransaction>,
}

impl From<Completion> for CompleteSessionResponse {
    fn from(c: Completion) -> Self {
        Self {
            session: c.session,
            learner_balance: c.learner_balance,
            transactions: c.transactions,
        }
    }
}

/// Query parameters for `GET /sessions`.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SessionListParams {
    /// Only sessions in this status.
    pub status: Option<SessionStatus>,
}
