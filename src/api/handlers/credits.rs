//! Skill catalog and credit handlers.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    BalanceResponse, PaginationParams, SkillQuery, TopUpRequest, TransactionListResponse,
};
use crate::api::extract::{ApiJson, ApiQuery};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::Skill;
use crate::error::{ErrorResponse, MarketError};

/// `GET /skills` — The skill catalog.
///
/// # Errors
///
/// Returns [`MarketError`] on store failure.
#[utoipa::path(
    get,
    path = "/api/v1/skills",
    tag = "Skills",
    summary = "List skills",
    description = "Returns the seeded catalog ordered by category and name.",
    params(SkillQuery),
    responses(
        (status = 200, description = "Skill catalog", body = Vec<Skill>),
    )
)]
pub async fn list_skills(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SkillQuery>,
) -> Result<impl IntoResponse, MarketError> {
    let skills = state.profiles.catalog(query.category.as_deref()).await?;
    Ok(Json(skills))
}

/// `POST /credits/top-up` — Add credits to the caller's balance.
///
/// # Errors
///
/// Returns [`MarketError::InvalidRequest`] for amounts outside the allowed
/// range.
#[utoipa::path(
    post,
    path = "/api/v1/credits/top-up",
    tag = "Credits",
    summary = "Top up credits",
    description = "Adds credits and appends a `top_up` ledger row in one atomic write.",
    request_body = TopUpRequest,
    responses(
        (status = 200, description = "New balance", body = BalanceResponse),
        (status = 400, description = "Amount out of range", body = ErrorResponse),
        (status = 404, description = "Signup not completed", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn top_up(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<TopUpRequest>,
) -> Result<impl IntoResponse, MarketError> {
    let credit_balance = state.profiles.top_up(user, req.amount).await?;
    Ok(Json(BalanceResponse { credit_balance }))
}

/// `GET /credits/transactions` — The caller's ledger.
///
/// # Errors
///
/// Returns [`MarketError::NotFound`] before signup is completed.
#[utoipa::path(
    get,
    path = "/api/v1/credits/transactions",
    tag = "Credits",
    summary = "List credit transactions",
    params(PaginationParams),
    responses(
        (status = 200, description = "Ledger page, newest first", body = TransactionListResponse),
        (status = 404, description = "Signup not completed", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(params): ApiQuery<PaginationParams>,
) -> Result<impl IntoResponse, MarketError> {
    let (data, total, credit_balance) = state
        .profiles
        .transactions(user, params.page_window())
        .await?;
    Ok(Json(TransactionListResponse {
        credit_balance,
        data,
        pagination: params.meta(total),
    }))
}

/// Skill and credit routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/skills", get(list_skills))
        .route("/credits/top-up", post(top_up))
        .route("/credits/transactions", get(list_transactions))
}
