//! Storage adapters
//!
//! A [`Storage`] implementation persists one resource. The CRUD controller
//! only talks to this trait, so a relational adapter and the bundled
//! [`MemoryStorage`] are interchangeable.
//!
//! # Example
//!
//! ```rust,ignore
//! use pharma_service::storage::{Page, PageRequest, SearchQuery, Storage, StorageResult};
//!
//! struct PgProducts { pool: PgPool }
//!
//! impl Storage for PgProducts {
//!     type Record = Product;
//!     type Create = NewProduct;
//!     type Update = ProductChanges;
//!
//!     async fn get_by_id(&self, id: i64) -> StorageResult<Option<Product>> {
//!         sqlx::query_as("SELECT * FROM products WHERE id = $1")
//!             .bind(id)
//!             .fetch_optional(&self.pool)
//!             .await
//!             .map_err(into_storage_error)
//!     }
//!     // ... other methods
//! }
//! ```

mod error;
mod memory;
mod traits;

pub use error::{StorageError, StorageErrorKind, StorageOperation, UNIQUE_VIOLATION_CODES};
pub use memory::{MemoryEntity, MemoryStorage};
pub use traits::{EntityId, Page, PageRequest, Record, SearchQuery, Storage, StorageResult};
