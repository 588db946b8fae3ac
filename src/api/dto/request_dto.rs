//! Learning request DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{
    ConversationId, LearningRequest, Message, RequestStatus, Session, SkillId, UserId,
};
use crate::service::{AcceptRequest, SendRequest};
use crate::store::{Acceptance, Party, RequestFilter};

/// Request body for `POST /requests`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SendRequestBody {
    /// Requested tutor.
    pub tutor_id: UserId,
    /// Skill to learn.
    pub skill_id: SkillId,
    /// Optional note, up to 1000 characters.
    #[serde(default)]
    pub message: Option<String>,
    /// Optional proposed start time (RFC 3339).
    #[serde(default)]
    pub proposed_time: Option<DateTime<Utc>>,
}

impl From<SendRequestBody> for SendRequest {
    fn from(body: SendRequestBody) -> Self {
        Self {
            tutor_id: body.tutor_id,
            skill_id: body.skill_id,
            message: body.message,
            proposed_time: body.proposed_time,
        }
    }
}

/// Optional request body for `POST /requests/{id}/accept`.
#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
pub struct AcceptRequestBody {
    /// Session start; defaults to the proposed time, else 24 hours ahead.
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Session length in minutes (15–480); defaults to 60.
    #[serde(default)]
    pub duration_minutes: Option<u32>,
}

impl From<AcceptRequestBody> for AcceptRequest {
    fn from(body: AcceptRequestBody) -> Self {
        Self {
            scheduled_at: body.scheduled_at,
            duration_minutes: body.duration_minutes,
        }
    }
}

/// Query parameters for `GET /requests`.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RequestListParams {
    /// Only requests where the caller is this party.
    pub role: Option<Party>,
    /// Only requests in this status.
    pub status: Option<RequestStatus>,
}

impl From<RequestListParams> for RequestFilter {
    fn from(params: RequestListParams) -> Self {
        Self {
            role: params.role,
            status: params.status,
        }
    }
}

/// Response for `POST /requests/{id}/accept`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AcceptResponse {
    /// The accepted request.
    pub request: LearningRequest,
    /// The booked session.
    pub session: Session,
    /// Conversation between tutor and learner.
    pub conversation_id: ConversationId,
    /// Booking announcement posted by the tutor.
    pub message: Message,
}

impl From<Acceptance> for AcceptResponse {
    fn from(a: Acceptance) -> Self {
        Self {
            request: a.request,
            session: a.session,
            conversation_id: a.conversation.id,
            message: a.message,
        }
    }
}
