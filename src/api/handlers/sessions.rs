//! Session handlers: AI booking, lifecycle, completion and reviews.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    BookAiSessionBody, CompleteSessionBody, CompleteSessionResponse, CreateReviewBody,
    SessionListParams,
};
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::{Review, Session, SessionId};
use crate::error::{ErrorResponse, MarketError};

/// `POST /sessions/ai` — Book an AI-assisted session.
///
/// # Errors
///
/// Returns [`MarketError`] for unknown skills or balances below 0.50.
#[utoipa::path(
    post,
    path = "/api/v1/sessions/ai",
    tag = "Sessions",
    summary = "Book an AI session",
    request_body = BookAiSessionBody,
    responses(
        (status = 201, description = "Session booked", body = Session),
        (status = 400, description = "Invalid input or insufficient credits", body = ErrorResponse),
        (status = 404, description = "Unknown skill", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn book_ai_session(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(body): ApiJson<BookAiSessionBody>,
) -> Result<impl IntoResponse, MarketError> {
    let session = state.sessions.book_ai(user, body.into()).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// `GET /sessions` — The caller's sessions.
///
/// # Errors
///
/// Returns [`MarketError`] on store failure.
#[utoipa::path(
    get,
    path = "/api/v1/sessions",
    tag = "Sessions",
    summary = "List sessions",
    params(SessionListParams),
    responses(
        (status = 200, description = "Sessions, latest schedule first", body = Vec<Session>),
    ),
    security(("bearer" = []))
)]
pub async fn list_sessions(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(params): ApiQuery<SessionListParams>,
) -> Result<impl IntoResponse, MarketError> {
    let sessions = state.sessions.list(user, params.status).await?;
    Ok(Json(sessions))
}

/// `GET /sessions/{id}` — One session.
///
/// # Errors
///
/// Returns [`MarketError`] if missing or the caller is not a participant.
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}",
    tag = "Sessions",
    summary = "Get a session",
    params(("id" = String, Path, description = "Session UUID")),
    responses(
        (status = 200, description = "Session", body = Session),
        (status = 403, description = "Not a participant", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn get_session(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<SessionId>,
) -> Result<impl IntoResponse, MarketError> {
    let session = state.sessions.get(user, id).await?;
    Ok(Json(session))
}

/// `POST /sessions/{id}/start` — Mark a scheduled session in progress.
///
/// # Errors
///
/// Returns [`MarketError`] if the session is not scheduled or the caller
/// is not a participant.
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/start",
    tag = "Sessions",
    summary = "Start a session",
    params(("id" = String, Path, description = "Session UUID")),
    responses(
        (status = 200, description = "Session in progress", body = Session),
        (status = 400, description = "Session is not scheduled", body = ErrorResponse),
        (status = 403, description = "Not a participant", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn start_session(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<SessionId>,
) -> Result<impl IntoResponse, MarketError> {
    let session = state.sessions.start(user, id).await?;
    Ok(Json(session))
}

/// `POST /sessions/{id}/cancel` — Cancel an open session.
///
/// # Errors
///
/// Returns [`MarketError`] if the session is closed or the caller is not a
/// participant.
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/cancel",
    tag = "Sessions",
    summary = "Cancel a session",
    params(("id" = String, Path, description = "Session UUID")),
    responses(
        (status = 200, description = "Session cancelled", body = Session),
        (status = 400, description = "Session already closed", body = ErrorResponse),
        (status = 403, description = "Not a participant", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn cancel_session(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<SessionId>,
) -> Result<impl IntoResponse, MarketError> {
    let session = state.sessions.cancel(user, id).await?;
    Ok(Json(session))
}

/// `POST /sessions/{id}/complete` — Complete and settle a session.
///
/// # Errors
///
/// Returns [`MarketError`] if the session is closed, the caller is not a
/// participant, or the learner cannot pay.
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/complete",
    tag = "Sessions",
    summary = "Complete a session",
    description = "Marks the session completed and settles credits atomically: 1.00 from learner to tutor for human sessions, 0.50 from the learner for AI sessions.",
    params(("id" = String, Path, description = "Session UUID")),
    request_body(content = Option<CompleteSessionBody>, description = "Optional notes"),
    responses(
        (status = 200, description = "Session completed", body = CompleteSessionResponse),
        (status = 400, description = "Session closed or insufficient credits", body = ErrorResponse),
        (status = 403, description = "Not a participant", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn complete_session(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<SessionId>,
    body: Option<ApiJson<CompleteSessionBody>>,
) -> Result<impl IntoResponse, MarketError> {
    let body = body.map(|ApiJson(b)| b).unwrap_or_default();
    let completion = state
        .sessions
        .complete(user, id, body.notes.as_deref())
        .await?;
    Ok(Json(CompleteSessionResponse::from(completion)))
}

/// `POST /sessions/{id}/reviews` — Review the other participant.
///
/// # Errors
///
/// Returns [`MarketError`] for open or AI sessions, outsiders, bad ratings
/// and repeat reviews.
#[utoipa::path(
    post,
    path = "/api/v1/sessions/{id}/reviews",
    tag = "Reviews",
    summary = "Review a session",
    params(("id" = String, Path, description = "Session UUID")),
    request_body = CreateReviewBody,
    responses(
        (status = 201, description = "Review created", body = Review),
        (status = 400, description = "Session not completed or invalid rating", body = ErrorResponse),
        (status = 403, description = "Not a participant", body = ErrorResponse),
        (status = 409, description = "Already reviewed", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn create_review(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<SessionId>,
    ApiJson(body): ApiJson<CreateReviewBody>,
) -> Result<impl IntoResponse, MarketError> {
    let review = state
        .reviews
        .review(user, id, body.rating, body.comment.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// Session routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", get(list_sessions))
        .route("/sessions/ai", post(book_ai_session))
        .route("/sessions/{id}", get(get_session))
        .route("/sessions/{id}/start", post(start_session))
        .route("/sessions/{id}/cancel", post(cancel_session))
        .route("/sessions/{id}/complete", post(complete_session))
        .route("/sessions/{id}/reviews", post(create_review))
}
