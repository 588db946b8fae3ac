//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::store::Page;

/// Pagination query parameters for list endpoints.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationParams {
    /// Page number (1-indexed). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: u32,
    /// Items per page (max 100). Defaults to 20.
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

/// Pagination metadata included in list responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaginationMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total number of items.
    pub total: u64,
    /// Total number of pages.
    pub total_pages: u64,
}

fn default_page() -> u32 {
    1
}

fn default_per_page() -> u32 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl PaginationParams {
    /// Clamps `per_page` to the allowed maximum of 100.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            page: self.page.max(1),
            per_page: self.per_page.clamp(1, 100),
        }
    }

    /// The store window for these (clamped) parameters.
    #[must_use]
    pub fn page_window(&self) -> Page {
        let p = self.clamped();
        Page {
            offset: (p.page - 1).saturating_mul(p.per_page),
            limit: p.per_page,
        }
    }

    /// Metadata for a page of these parameters out of `total` items.
    #[must_use]
    pub fn meta(&self, total: u64) -> PaginationMeta {
        let p = self.clamped();
        PaginationMeta {
            page: p.page,
            per_page: p.per_page,
            total,
            total_pages: total.div_ceil(u64::from(p.per_page)),
        }
    }
}

/// Body of endpoints that return a count of affected rows.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CountResponse {
    /// Rows affected.
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_and_meta_follow_clamping() {
        let params = PaginationParams {
            page: 0,
            per_page: 500,
        };
        assert_eq!(params.page_window(), Page { offset: 0, limit: 100 });

        let third = PaginationParams {
            page: 3,
            per_page: 10,
        };
        assert_eq!(third.page_window(), Page { offset: 20, limit: 10 });
        let meta = third.meta(21);
        assert_eq!(meta.total_pages, 3);
        assert_eq!(third.meta(0).total_pages, 0);
    }
}
