//! Review DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Review;
use crate::service::ReviewSummary;

/// Request body for `POST /sessions/{id}/reviews`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateReviewBody {
    /// Stars, 1–5.
    pub rating: u8,
    /// Optional comment, up to 1000 characters.
    #[serde(default)]
    pub comment: Option<String>,
}

/// Response for `GET /profiles/{id}/reviews`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReviewListResponse {
    /// Mean rating; absent without reviews.
    pub average_rating: Option<f64>,
    /// Number of reviews.
    pub count: usize,
    /// Reviews, newest first.
    pub data: Vec<Review>,
}

impl From<ReviewSummary> for ReviewListResponse {
    fn from(summary: ReviewSummary) -> Self {
        Self {
            average_rating: summary.average_rating,
            count: summary.reviews.len(),
            data: summary.reviews,
        }
    }
}
