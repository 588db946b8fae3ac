//! REST endpoint handlers organized by resource.

pub mod conversations;
pub mod credits;
pub mod profiles;
pub mod requests;
pub mod sessions;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(profiles::routes())
        .merge(credits::routes())
        .merge(requests::routes())
        .merge(sessions::routes())
        .merge(conversations::routes())
}
