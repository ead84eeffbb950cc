//! Success response types

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Paging metadata attached to every list response
///
/// # Example
///
/// ```rust
/// use pharma_service::api::PaginationMeta;
///
/// let pagination = PaginationMeta::new(1, 10, 25);
/// assert_eq!(pagination.pages, 3);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationMeta {
    /// Current page number (1-indexed)
    pub page: u32,
    /// Page size
    pub limit: u32,
    /// Matches across all pages
    pub total: u64,
    /// Number of pages, `ceil(total / limit)`; zero when there are no matches
    pub pages: u64,
}

impl PaginationMeta {
    /// Build metadata, computing `pages`
    #[must_use]
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let limit = limit.max(1);
        Self {
            page,
            limit,
            total,
            pages: total.div_ceil(u64::from(limit)),
        }
    }
}

/// Body of a list endpoint: `{ data, pagination }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListResponse<T> {
    /// Records on this page
    pub data: Vec<T>,
    /// Paging metadata
    pub pagination: PaginationMeta,
}

impl<T> ListResponse<T> {
    /// Wrap a page of records
    #[must_use]
    pub fn new(data: Vec<T>, pagination: PaginationMeta) -> Self {
        Self { data, pagination }
    }
}

impl<T: Serialize> IntoResponse for ListResponse<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// HTTP 201 Created with the new record as body
pub struct Created<T> {
    data: T,
    location: Option<String>,
}

impl<T> Created<T> {
    /// Create a new 201 Created response
    pub fn new(data: T) -> Self {
        Self {
            data,
            location: None,
        }
    }

    /// Add a Location header pointing to the created record
    #[must_use]
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl<T: Serialize> IntoResponse for Created<T> {
    fn into_response(self) -> Response {
        let mut response = (StatusCode::CREATED, Json(&self.data)).into_response();

        if let Some(location) = self.location {
            if let Ok(value) = HeaderValue::from_str(&location) {
                response.headers_mut().insert(header::LOCATION, value);
            }
        }

        response
    }
}

/// HTTP 204 No Content
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContent;

impl IntoResponse for NoContent {
    fn into_response(self) -> Response {
        StatusCode::NO_CONTENT.into_response()
    }
}
