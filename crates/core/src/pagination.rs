//! Offset pagination over in-memory listings.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// A 1-based page request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

/// Slice `items` down to the requested page.
///
/// A page whose first index lies at or beyond the end of the data is
/// `NotFound`; the last page may be short. `page` and `limit` must be >= 1.
pub fn paginate<T>(page: Page, items: Vec<T>) -> DomainResult<Vec<T>> {
    if page.page == 0 || page.limit == 0 {
        return Err(DomainError::validation("page and limit must be >= 1"));
    }

    let limit = page.limit as usize;
    let start = (page.page as usize - 1).saturating_mul(limit);
    if start >= items.len() {
        return Err(DomainError::not_found("page does not exist"));
    }

    Ok(items.into_iter().skip(start).take(limit).collect())
}
