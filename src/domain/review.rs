//! Reviews left after completed sessions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{ReviewId, SessionId, UserId};
use crate::error::MarketError;

/// A star rating from 1 to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ToSchema)]
#[serde(transparent)]
pub struct Rating(u8);

impl Rating {
    /// Validates a rating.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidRequest`] outside `1..=5`.
    pub fn new(stars: u8) -> Result<Self, MarketError> {
        if (1..=5).contains(&stars) {
            Ok(Self(stars))
        } else {
            Err(MarketError::InvalidRequest(
                "rating must be between 1 and 5".to_string(),
            ))
        }
    }

    /// Returns the number of stars.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

/// One participant's review of the other after a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Review {
    /// Review identifier.
    pub id: ReviewId,
    /// Reviewed session.
    pub session_id: SessionId,
    /// Author.
    pub reviewer_id: UserId,
    /// Subject.
    pub reviewee_id: UserId,
    /// Stars given.
    pub rating: Rating,
    /// Optional free text.
    pub comment: Option<String>,
    /// Write time.
    pub created_at: DateTime<Utc>,
}

impl Review {
    /// Creates a review stamped now.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        reviewer_id: UserId,
        reviewee_id: UserId,
        rating: Rating,
        comment: Option<String>,
    ) -> Self {
        Self {
            id: ReviewId::new(),
            session_id,
            reviewer_id,
            reviewee_id,
            rating,
            comment,
            created_at: Utc::now(),
        }
    }
}

/// Mean rating over `reviews`, or `None` when empty.
#[must_use]
pub fn average_rating(reviews: &[Review]) -> Option<f64> {
    if reviews.is_empty() {
        return None;
    }
    let total: u32 = reviews.iter().map(|r| u32::from(r.rating.get())).sum();
    #[allow(clippy::cast_precision_loss)]
    let avg = f64::from(total) / reviews.len() as f64;
    Some(avg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_bounds() {
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(6).is_err());
        assert_eq!(Rating::new(5).ok().map(Rating::get), Some(5));
    }

    #[test]
    fn average_of_reviews() {
        let make = |stars| {
            Rating::new(stars)
                .map(|r| Review::new(SessionId::new(), UserId::new(), UserId::new(), r, None))
                .ok()
        };
        let reviews: Vec<Review> = [4, 5, 3].into_iter().filter_map(make).collect();
        assert_eq!(average_rating(&reviews), Some(4.0));
        assert_eq!(average_rating(&[]), None);
    }
}
