//! Profile handlers: signup, own profile, public profiles, skill sets.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::api::dto::{
    BrowseProfilesParams, CreateProfileRequest, PaginationParams, ProfileDetailResponse,
    ProfileListResponse, ProfileResponse, ProfileSkillsResponse, PublicProfileDto,
    ReplaceSkillsRequest, ReviewListResponse, UpdateProfileRequest,
};
use crate::api::extract::{ApiJson, ApiPath, ApiQuery};
use crate::app_state::AppState;
use crate::auth::AuthUser;
use crate::domain::UserId;
use crate::error::{ErrorResponse, MarketError};

/// `POST /profiles` — Complete signup for the caller.
///
/// # Errors
///
/// Returns [`MarketError`] on invalid fields or an existing profile.
#[utoipa::path(
    post,
    path = "/api/v1/profiles",
    tag = "Profiles",
    summary = "Complete signup",
    description = "Creates the caller's profile and grants the signup bonus with a ledger row.",
    request_body = CreateProfileRequest,
    responses(
        (status = 201, description = "Profile created", body = ProfileResponse),
        (status = 400, description = "Invalid fields", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 409, description = "Profile already exists", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn create_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<CreateProfileRequest>,
) -> Result<impl IntoResponse, MarketError> {
    let profile = state
        .profiles
        .create_profile(user, &req.display_name, req.bio.as_deref(), req.avatar_path.as_deref())
        .await?;
    let avatar_url = state.profiles.avatar_url(&profile);
    Ok((StatusCode::CREATED, Json(ProfileResponse::new(profile, avatar_url))))
}

/// `GET /profiles/me` — The caller's own profile.
///
/// # Errors
///
/// Returns [`MarketError::NotFound`] before signup is completed.
#[utoipa::path(
    get,
    path = "/api/v1/profiles/me",
    tag = "Profiles",
    summary = "Get own profile",
    responses(
        (status = 200, description = "Own profile with balance", body = ProfileResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "Signup not completed", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<impl IntoResponse, MarketError> {
    let profile = state.profiles.get_profile(user).await?;
    let avatar_url = state.profiles.avatar_url(&profile);
    Ok(Json(ProfileResponse::new(profile, avatar_url)))
}

/// `PATCH /profiles/me` — Partially update the caller's profile.
///
/// # Errors
///
/// Returns [`MarketError`] on invalid fields or a missing profile.
#[utoipa::path(
    patch,
    path = "/api/v1/profiles/me",
    tag = "Profiles",
    summary = "Update own profile",
    description = "Omitted fields are unchanged; `null` clears `bio` or `avatar_path`.",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 400, description = "Invalid fields", body = ErrorResponse),
        (status = 403, description = "Avatar outside the caller's folder", body = ErrorResponse),
        (status = 404, description = "Signup not completed", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, MarketError> {
    let profile = state.profiles.update_profile(user, req.into()).await?;
    let avatar_url = state.profiles.avatar_url(&profile);
    Ok(Json(ProfileResponse::new(profile, avatar_url)))
}

/// `PUT /profiles/me/skills` — Replace the caller's teach and learn sets.
///
/// # Errors
///
/// Returns [`MarketError::NotFound`] for unknown skills.
#[utoipa::path(
    put,
    path = "/api/v1/profiles/me/skills",
    tag = "Profiles",
    summary = "Replace own skills",
    request_body = ReplaceSkillsRequest,
    responses(
        (status = 200, description = "New skill sets", body = ProfileSkillsResponse),
        (status = 404, description = "Unknown skill or profile", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn replace_my_skills(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<ReplaceSkillsRequest>,
) -> Result<impl IntoResponse, MarketError> {
    let skills = state
        .profiles
        .replace_skills(user, &req.teaches, &req.learns)
        .await?;
    Ok(Json(ProfileSkillsResponse::from(skills)))
}

/// `GET /profiles` — Browse members, optionally tutors of one skill.
///
/// # Errors
///
/// Returns [`MarketError::NotFound`] for an unknown skill filter.
#[utoipa::path(
    get,
    path = "/api/v1/profiles",
    tag = "Profiles",
    summary = "Browse profiles",
    params(BrowseProfilesParams, PaginationParams),
    responses(
        (status = 200, description = "Paginated public profiles", body = ProfileListResponse),
        (status = 404, description = "Unknown skill", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_profiles(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    ApiQuery(filter): ApiQuery<BrowseProfilesParams>,
    ApiQuery(params): ApiQuery<PaginationParams>,
) -> Result<impl IntoResponse, MarketError> {
    let (profiles, total) = state
        .profiles
        .browse(filter.teaches, params.page_window())
        .await?;
    let data = profiles
        .into_iter()
        .map(|p| {
            let url = state.profiles.avatar_url(&p);
            PublicProfileDto::new(p, url)
        })
        .collect();
    Ok(Json(ProfileListResponse {
        data,
        pagination: params.meta(total),
    }))
}

/// `GET /profiles/{id}` — A member's public profile and skills.
///
/// # Errors
///
/// Returns [`MarketError::NotFound`] if the member does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/profiles/{id}",
    tag = "Profiles",
    summary = "Get public profile",
    params(("id" = String, Path, description = "User UUID")),
    responses(
        (status = 200, description = "Public profile", body = ProfileDetailResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    ApiPath(id): ApiPath<UserId>,
) -> Result<impl IntoResponse, MarketError> {
    let profile = state.profiles.get_profile(id).await?;
    let skills = state.profiles.skills_of(id).await?;
    let url = state.profiles.avatar_url(&profile);
    Ok(Json(ProfileDetailResponse {
        profile: PublicProfileDto::new(profile, url),
        teaches: skills.teaches,
        learns: skills.learns,
    }))
}

/// `GET /profiles/{id}/reviews` — Reviews a member received.
///
/// # Errors
///
/// Returns [`MarketError::NotFound`] if the member does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/profiles/{id}/reviews",
    tag = "Reviews",
    summary = "List reviews received",
    params(("id" = String, Path, description = "User UUID")),
    responses(
        (status = 200, description = "Reviews with average rating", body = ReviewListResponse),
        (status = 404, description = "Not found", body = ErrorResponse),
    ),
    security(("bearer" = []))
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    AuthUser(_caller): AuthUser,
    ApiPath(id): ApiPath<UserId>,
) -> Result<impl IntoResponse, MarketError> {
    let summary = state.reviews.received_by(id).await?;
    Ok(Json(ReviewListResponse::from(summary)))
}

/// Profile routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/profiles", post(create_profile).get(list_profiles))
        .route("/profiles/me", get(get_me).patch(update_me))
        .route("/profiles/me/skills", put(replace_my_skills))
        .route("/profiles/{id}", get(get_profile))
        .route("/profiles/{id}/reviews", get(list_reviews))
}
