//! # pharma-service
//!
//! JSON API for a pharmaceutical distributor: customers, products and orders
//! served through one generic CRUD pipeline.
//!
//! Every mutating request runs validation, storage and activity logging in
//! that order, and every failure leaves the service in the same envelope:
//!
//! ```json
//! {
//!   "message": "Validation failed",
//!   "error": "validation_error",
//!   "details": [{ "field": "name", "message": "name is required", "code": "required" }],
//!   "timestamp": "2025-01-01T00:00:00Z",
//!   "path": "/api/customers",
//!   "method": "POST"
//! }
//! ```
//!
//! ## Modules
//!
//! - [`validation`]: schemas for bodies, query strings and route parameters
//! - [`storage`]: the storage trait, its error model and an in-memory backend
//! - [`activity`]: the fire-and-forget audit trail
//! - [`api`]: error normalization, the envelope middleware and response types
//! - [`controller`]: the generic CRUD controller
//! - [`domain`]: customers, products and orders
//!
//! ## Example
//!
//! ```rust,no_run
//! use pharma_service::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     ServiceBuilder::new(config)
//!         .with_memory_resources()
//!         .build()
//!         .serve()
//!         .await
//! }
//! ```

pub mod activity;
pub mod api;
pub mod config;
pub mod context;
pub mod controller;
pub mod domain;
pub mod error;
pub mod health;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod service_builder;
pub mod state;
pub mod storage;
pub mod validation;

pub mod prelude {
    pub use crate::activity::{
        ActivityAction, ActivityDraft, ActivityEntry, ActivityLogger, ActivitySink,
        ActivityWorker, MemoryActivitySink, SinkError, TracingActivitySink,
    };
    pub use crate::api::{
        ApiError, Created, ErrorCode, ErrorEnvelope, Failure, ListParams, ListResponse,
        ListSettings, NoContent, PaginationMeta,
    };
    pub use crate::config::Config;
    pub use crate::context::RequestContext;
    pub use crate::controller::{CrudController, ResourceDescriptor};
    pub use crate::error::{Error, Result};
    pub use crate::health::{health, readiness};
    pub use crate::middleware::{
        request_id_layer, request_id_propagation_layer, sensitive_headers_layer,
    };
    pub use crate::observability::init_tracing;
    pub use crate::server::Server;
    pub use crate::service_builder::{PharmaService, ServiceBuilder};
    pub use crate::state::AppState;
    pub use crate::storage::{
        EntityId, MemoryEntity, MemoryStorage, Page, PageRequest, Record, SearchQuery, Storage,
        StorageError, StorageErrorKind, StorageOperation, StorageResult,
    };
    pub use crate::validation::{Fields, Schema, ValidJson, ValidPath, ValidQuery, ValidationErrors};

    pub use axum::{
        extract::{Path, Query, State},
        response::{IntoResponse, Response},
        routing::{delete, get, post, put},
        Json, Router,
    };
    pub use serde::{Deserialize, Serialize};
}
