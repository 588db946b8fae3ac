//! Messaging handlers: conversations, messages, read markers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    ConversationDto, CountResponse, MessageListResponse, OpenConversationBody, PaginationParams,
    SendMessageBody,
};
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::{ConversationId, Message};
use crate::error::{ErrorResponse, MarketError};

/// `POST /conversations` — Get or create a conversation with a member.
///
/// # Errors
///
/// Returns [`MarketError`] for self-conversations or unknown members.
#[utoipa::path(
    post,
    path = "/api/v1/conversations",
    tag = "Messaging",
    summary = "Open a conversation",
    description = "Returns the unique conversation between the caller and `participant_id`, creating it on first contact.",
    request_body = OpenConversationBody,
    responses(
        (status = 200, description = "Conversation", body = ConversationDto),
        (status = 400, description = "Conversation with yourself", body = ErrorResponse),
        (status = 404, description = "Unknown member", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn open_conversation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(body): ApiJson<OpenConversationBody>,
) -> Result<impl IntoResponse, MarketError> {
    let conversation = state.messaging.open(user, body.participant_id).await?;
    Ok(Json(ConversationDto::new(&conversation, user, 0)))
}

/// `GET /conversations` — The caller's conversations.
///
/// # Errors
///
/// Returns [`MarketError`] on store failure.
#[utoipa::path(
    get,
    path = "/api/v1/conversations",
    tag = "Messaging",
    summary = "List conversations",
    responses(
        (status = 200, description = "Conversations by last activity", body = Vec<ConversationDto>),
    ),
    security(("bearer" = []))
)]
pub async fn list_conversations(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, MarketError> {
    let overviews = state.messaging.list(user).await?;
    let data: Vec<ConversationDto> = overviews
        .iter()
        .map(|o| ConversationDto::from_overview(o, user))
        .collect();
    Ok(Json(data))
}

/// `GET /conversations/{id}/messages` — Messages, oldest first.
///
/// # Errors
///
/// Returns [`MarketError`] if missing or the caller is not a participant.
#[utoipa::path(
    get,
    path = "/api/v1/conversations/{id}/messages",
    tag = "Messaging",
    summary = "List messages",
    params(("id" = String, Path, description = "Conversation UUID"), PaginationParams),
    responses(
        (status = 200, description = "Message page", body = MessageListResponse),
        (status = 403, description = "Not a participant", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_messages(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<ConversationId>,
    ApiQuery(params): ApiQuery<PaginationParams>,
) -> Result<impl IntoResponse, MarketError> {
    let (data, total) = state
        .messaging
        .messages(user, id, params.page_window())
        .await?;
    Ok(Json(MessageListResponse {
        data,
        pagination: params.meta(total),
    }))
}

/// `POST /conversations/{id}/messages` — Send a message.
///
/// # Errors
///
/// Returns [`MarketError`] for empty or oversized content and outsiders.
#[utoipa::path(
    post,
    path = "/api/v1/conversations/{id}/messages",
    tag = "Messaging",
    summary = "Send a message",
    params(("id" = String, Path, description = "Conversation UUID")),
    request_body = SendMessageBody,
    responses(
        (status = 201, description = "Message sent", body = Message),
        (status = 400, description = "Invalid content", body = ErrorResponse),
        (status = 403, description = "Not a participant", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<ConversationId>,
    ApiJson(body): ApiJson<SendMessageBody>,
) -> Result<impl IntoResponse, MarketError> {
    let message = state.messaging.send(user, id, &body.content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// `POST /conversations/{id}/read` — Mark the other side's messages read.
///
/// # Errors
///
/// Returns [`MarketError`] if missing or the caller is not a participant.
#[utoipa::path(
    post,
    path = "/api/v1/conversations/{id}/read",
    tag = "Messaging",
    summary = "Mark messages read",
    params(("id" = String, Path, description = "Conversation UUID")),
    responses(
        (status = 200, description = "Number of messages marked", body = CountResponse),
        (status = 403, description = "Not a participant", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn mark_read(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<ConversationId>,
) -> Result<impl IntoResponse, MarketError> {
    let count = state.messaging.mark_read(user, id).await?;
    Ok(Json(CountResponse { count }))
}

/// Messaging routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/conversations", post(open_conversation).get(list_conversations))
        .route(
            "/conversations/{id}/messages",
            get(list_messages).post(send_message),
        )
        .route("/conversations/{id}/read", post(mark_read))
}
