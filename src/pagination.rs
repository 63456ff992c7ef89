use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// Page cursor for list endpoints, rendered as `?page=<page>&per_page=<per_page>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPagination")]
pub struct Pagination {
    page: u32,
    per_page: u32,
}

#[derive(Deserialize)]
struct RawPagination {
    page: u32,
    per_page: u32,
}

impl TryFrom<RawPagination> for Pagination {
    type Error = ValidationError;

    fn try_from(raw: RawPagination) -> Result<Self, Self::Error> {
        Pagination::new(raw.page, raw.per_page)
    }
}

impl Pagination {
    /// `page` starts at 1; `per_page` must be positive.
    pub fn new(page: u32, per_page: u32) -> Result<Self, ValidationError> {
        if page == 0 {
            return Err(ValidationError::new("must be at least 1").with_field("page"));
        }
        if per_page == 0 {
            return Err(ValidationError::new("must be greater than 0").with_field("per_page"));
        }
        Ok(Self { page, per_page })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn forward(&mut self, pages: u32) {
        self.page = self.page.saturating_add(pages);
    }

    /// Move back, never past page 1.
    pub fn back(&mut self, pages: u32) {
        self.page = self.page.saturating_sub(pages).max(1);
    }

    pub fn query_string(&self) -> String {
        format!("?page={}&per_page={}", self.page, self.per_page)
    }

    /// Append the query string to `path` when a cursor is set.
    pub fn apply(path: &str, pagination: Option<&Pagination>) -> String {
        match pagination {
            Some(p) => format!("{path}{}", p.query_string()),
            None => path.to_string(),
        }
    }
}
