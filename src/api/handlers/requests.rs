//! Learning request handlers: send, list, get, accept, reject, cancel.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{AcceptRequestBody, AcceptResponse, RequestListParams, SendRequestBody};
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::{LearningRequest, RequestId};
use crate::error::{ErrorResponse, MarketError};

/// `POST /requests` — Ask a tutor for a session.
///
/// # Errors
///
/// Returns [`MarketError`] for self-requests, unknown parties or skills,
/// and balances below one session.
#[utoipa::path(
    post,
    path = "/api/v1/requests",
    tag = "Requests",
    summary = "Send a learning request",
    description = "Creates a pending request. The learner needs at least 1.00 credit; nothing is deducted until the session completes.",
    request_body = SendRequestBody,
    responses(
        (status = 201, description = "Request created", body = LearningRequest),
        (status = 400, description = "Self-request, invalid input or insufficient credits", body = ErrorResponse),
        (status = 404, description = "Unknown tutor, learner or skill", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn send_request(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(body): ApiJson<SendRequestBody>,
) -> Result<impl IntoResponse, MarketError> {
    let request = state.requests.send(user, body.into()).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// `GET /requests` — The caller's requests.
///
/// # Errors
///
/// Returns [`MarketError`] on store failure.
#[utoipa::path(
    get,
    path = "/api/v1/requests",
    tag = "Requests",
    summary = "List learning requests",
    params(RequestListParams),
    responses(
        (status = 200, description = "Requests, newest first", body = Vec<LearningRequest>),
    ),
    security(("bearer" = []))
)]
pub async fn list_requests(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(params): ApiQuery<RequestListParams>,
) -> Result<impl IntoResponse, MarketError> {
    let requests = state.requests.list(user, params.into()).await?;
    Ok(Json(requests))
}

/// `GET /requests/{id}` — One request.
///
/// # Errors
///
/// Returns [`MarketError`] if missing or the caller is not a party.
#[utoipa::path(
    get,
    path = "/api/v1/requests/{id}",
    tag = "Requests",
    summary = "Get a learning request",
    params(("id" = String, Path, description = "Request UUID")),
    responses(
        (status = 200, description = "Request", body = LearningRequest),
        (status = 403, description = "Not a participant", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn get_request(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<RequestId>,
) -> Result<impl IntoResponse, MarketError> {
    let request = state.requests.get(user, id).await?;
    Ok(Json(request))
}

/// `POST /requests/{id}/accept` — Tutor accepts and books the session.
///
/// # Errors
///
/// Returns [`MarketError`] if the caller is not the tutor or the request
/// is no longer pending.
#[utoipa::path(
    post,
    path = "/api/v1/requests/{id}/accept",
    tag = "Requests",
    summary = "Accept a learning request",
    description = "Atomically marks the request accepted, books a scheduled session, and posts a booking message into the tutor/learner conversation.",
    params(("id" = String, Path, description = "Request UUID")),
    request_body(content = Option<AcceptRequestBody>, description = "Optional schedule overrides"),
    responses(
        (status = 200, description = "Request accepted", body = AcceptResponse),
        (status = 400, description = "Request is not pending", body = ErrorResponse),
        (status = 403, description = "Caller is not the tutor", body = ErrorResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn accept_request(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<RequestId>,
    body: Option<ApiJson<AcceptRequestBody>>,
) -> Result<impl IntoResponse, MarketError> {
    let body = body.map(|ApiJson(b)| b).unwrap_or_default();
    let acceptance = state.requests.accept(user, id, body.into()).await?;
    Ok(Json(AcceptResponse::from(acceptance)))
}

/// `POST /requests/{id}/reject` — Tutor declines.
///
/// # Errors
///
/// Returns [`MarketError`] if the caller is not the tutor or the request
/// is no longer pending.
#[utoipa::path(
    post,
    path = "/api/v1/requests/{id}/reject",
    tag = "Requests",
    summary = "Reject a learning request",
    params(("id" = String, Path, description = "Request UUID")),
    responses(
        (status = 200, description = "Request rejected", body = LearningRequest),
        (status = 400, description = "Request is not pending", body = ErrorResponse),
        (status = 403, description = "Caller is not the tutor", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn reject_request(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<RequestId>,
) -> Result<impl IntoResponse, MarketError> {
    let request = state.requests.reject(user, id).await?;
    Ok(Json(request))
}

/// `POST /requests/{id}/cancel` — Learner withdraws.
///
/// # Errors
///
/// Returns [`MarketError`] if the caller is not the learner or the request
/// is no longer pending.
#[utoipa::path(
    post,
    path = "/api/v1/requests/{id}/cancel",
    tag = "Requests",
    summary = "Cancel a learning request",
    params(("id" = String, Path, description = "Request UUID")),
    responses(
        (status = 200, description = "Request cancelled", body = LearningRequest),
        (status = 400, description = "Request is not pending", body = ErrorResponse),
        (status = 403, description = "Caller is not the learner", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn cancel_request(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<RequestId>,
) -> Result<impl IntoResponse, MarketError> {
    let request = state.requests.cancel(user, id).await?;
    Ok(Json(request))
}

/// Learning request routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/requests", post(send_request).get(list_requests))
        .route("/requests/{id}", get(get_request))
        .route("/requests/{id}/accept", post(accept_request))
        .route("/requests/{id}/reject", post(reject_request))
        .route("/requests/{id}/cancel", post(cancel_request))
}
