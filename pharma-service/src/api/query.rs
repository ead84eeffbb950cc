//! Query and route parameter models shared by every resource

use serde_json::Value;

use crate::config::PaginationConfig;
use crate::storage::{EntityId, PageRequest, SearchQuery};
use crate::validation::{Fields, Schema, ValidationErrors};

/// `?page&limit&search` as sent by the client, before clamping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    /// Requested page
    pub page: Option<i64>,
    /// Requested page size
    pub limit: Option<i64>,
    /// Free-text filter
    pub search: Option<String>,
}

impl Schema for ListParams {
    fn parse(input: &Value) -> Result<Self, ValidationErrors> {
        let mut fields = Fields::new(input);
        let page = fields.optional_i64("page");
        let limit = fields.optional_i64("limit");
        let search = fields.optional_str_len("search", 1, 200);
        fields.finish()?;
        Ok(Self {
            page,
            limit,
            search,
        })
    }
}

/// `/{id}` route parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdParams {
    /// Positive record id
    pub id: EntityId,
}

impl Schema for IdParams {
    fn parse(input: &Value) -> Result<Self, ValidationErrors> {
        let mut fields = Fields::new(input);
        let id = fields.required_id("id");
        fields.finish()?;
        Ok(Self {
            id: id.unwrap_or_default(),
        })
    }
}

/// Per-resource paging limits and searchable fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSettings {
    /// Page size when none is requested
    pub default_limit: u32,
    /// Largest page size a client may request
    pub max_limit: u32,
    /// Serialized field names matched by `?search`
    pub searchable_fields: Vec<&'static str>,
}

impl Default for ListSettings {
    fn default() -> Self {
        Self::from(PaginationConfig::default())
    }
}

impl From<PaginationConfig> for ListSettings {
    fn from(config: PaginationConfig) -> Self {
        Self {
            default_limit: config.default_limit.max(1),
            max_limit: config.max_limit.max(1),
            searchable_fields: Vec::new(),
        }
    }
}

impl ListSettings {
    /// Override the default page size
    #[must_use]
    pub fn with_default_limit(mut self, limit: u32) -> Self {
        self.default_limit = limit.max(1);
        self
    }

    /// Override the page size ceiling
    #[must_use]
    pub fn with_max_limit(mut self, limit: u32) -> Self {
        self.max_limit = limit.max(1);
        self
    }

    /// Fields matched by `?search`
    #[must_use]
    pub fn searchable(mut self, fields: &[&'static str]) -> Self {
        self.searchable_fields = fields.to_vec();
        self
    }

    /// Clamp client parameters into a page request and optional search
    ///
    /// `page` is raised to at least 1 with no upper bound. `limit` defaults
    /// to `default_limit` and is clamped into `1..=max_limit`.
    pub fn resolve(&self, params: &ListParams) -> (PageRequest, Option<SearchQuery>) {
        let page = params.page.unwrap_or(1).clamp(1, i64::from(u32::MAX));
        let limit = params
            .limit
            .unwrap_or(i64::from(self.default_limit))
            .clamp(1, i64::from(self.max_limit));

        let search = params
            .search
            .as_deref()
            .and_then(|term| SearchQuery::new(term, &self.searchable_fields));

        (
            PageRequest::new(
                u32::try_from(page).unwrap_or(u32::MAX),
                u32::try_from(limit).unwrap_or(self.max_limit),
            ),
            search,
        )
    }
}
