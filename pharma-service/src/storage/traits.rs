//! Storage adapter trait
//!
//! The trait uses RPITIT (return position `impl Trait` in traits) so adapters
//! can be written with plain `async fn` while the controller can still rely
//! on the returned futures being `Send`.

use std::future::Future;

use serde::Serialize;

use super::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Numeric record identifier
pub type EntityId = i64;

/// A stored record that can be returned from the API
pub trait Record: Serialize + Clone + Send + Sync + 'static {
    /// The record's identifier
    fn id(&self) -> EntityId;
}

/// One page of a listing, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Page number, at least 1
    pub page: u32,
    /// Page size, at least 1
    pub limit: u32,
}

impl PageRequest {
    /// Create a page request; zero values are raised to 1
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    /// Number of records preceding this page
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

/// Free-text search over a fixed set of fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Text to look for
    pub term: String,
    /// Serialized field names the term is matched against
    pub fields: Vec<&'static str>,
}

impl SearchQuery {
    /// Build a search; blank terms and empty field lists yield `None`
    pub fn new(term: &str, fields: &[&'static str]) -> Option<Self> {
        let term = term.trim();
        if term.is_empty() || fields.is_empty() {
            return None;
        }
        Some(Self {
            term: term.to_string(),
            fields: fields.to_vec(),
        })
    }
}

/// A page of records together with the total number of matches
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// Records on this page
    pub items: Vec<T>,
    /// Matches across all pages
    pub total: u64,
}

/// Persistence adapter for one resource
///
/// `Create` and `Update` are the already-validated request models; the
/// adapter only persists them. `update` and `delete` may assume the
/// controller checked existence first but must still tolerate a record
/// disappearing in between.
pub trait Storage: Send + Sync + 'static {
    /// Stored record type
    type Record: Record;
    /// Validated creation input
    type Create: Send + 'static;
    /// Validated partial update input
    type Update: Send + 'static;

    /// List one page, optionally filtered by a search term
    fn get_all(
        &self,
        page: PageRequest,
        search: Option<&SearchQuery>,
    ) -> impl Future<Output = StorageResult<Page<Self::Record>>> + Send;

    /// Load a record; `Ok(None)` when it does not exist
    fn get_by_id(
        &self,
        id: EntityId,
    ) -> impl Future<Output = StorageResult<Option<Self::Record>>> + Send;

    /// Insert a record
    fn create(
        &self,
        data: Self::Create,
    ) -> impl Future<Output = StorageResult<Self::Record>> + Send;

    /// Apply a partial update and return the new state
    fn update(
        &self,
        id: EntityId,
        data: Self::Update,
    ) -> impl Future<Output = StorageResult<Self::Record>> + Send;

    /// Delete a record; `Ok(false)` when there was nothing to delete
    fn delete(&self, id: EntityId) -> impl Future<Output = StorageResult<bool>> + Send;
}
