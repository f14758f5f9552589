//! Offset pagination for article listings.

use thiserror::Error;

pub const DEFAULT_PAGE_LIMIT: i64 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("limit must greater than or equals to 0")]
    NegativeLimit,
    #[error("offset must greater than or equals to 0")]
    NegativeOffset,
}

/// Validated `offset`/`limit` pair.
///
/// A `limit` of zero coming from a request is replaced by [`DEFAULT_PAGE_LIMIT`];
/// stores still treat a non-positive limit as "nothing requested".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(offset: i64, limit: i64) -> Self {
        Self { offset, limit }
    }

    pub fn from_query(limit: Option<i64>, offset: Option<i64>) -> Result<Self, PaginationError> {
        let limit = limit.unwrap_or(0);
        let offset = offset.unwrap_or(0);
        if limit < 0 {
            return Err(PaginationError::NegativeLimit);
        }
        if offset < 0 {
            return Err(PaginationError::NegativeOffset);
        }
        let limit = if limit == 0 { DEFAULT_PAGE_LIMIT } else { limit };
        Ok(Self { offset, limit })
    }

    pub fn is_empty(&self) -> bool {
        self.limit <= 0
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, DEFAULT_PAGE_LIMIT)
    }
}
