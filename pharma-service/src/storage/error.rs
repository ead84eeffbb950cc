//! Storage adapter error types
//!
//! Adapters report failures as a [`StorageError`] carrying the operation, a
//! coarse kind and, when the backend exposes one, its native error code
//! (for example PostgreSQL's `23505` for a unique violation). The HTTP layer
//! classifies these into the API error taxonomy.
//!
//! # Example
//!
//! ```rust
//! use pharma_service::storage::{StorageError, StorageErrorKind};
//!
//! let error = StorageError::already_exists("Product", "code", "AMX-500");
//! assert!(matches!(error.kind, StorageErrorKind::AlreadyExists));
//! assert!(error.is_unique_violation());
//! ```

use std::fmt;

/// Backend error codes that signal a unique-constraint violation
///
/// `23505` is the SQLSTATE for `unique_violation`; `P2002` is the code ORMs
/// such as Prisma use for the same condition.
pub const UNIQUE_VIOLATION_CODES: &[&str] = &["23505", "P2002"];

/// Operation being performed when the storage error occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOperation {
    /// Listing a page of records
    GetAll,
    /// Loading a single record by id
    GetById,
    /// Inserting a record
    Create,
    /// Updating a record
    Update,
    /// Deleting a record
    Delete,
}

impl fmt::Display for StorageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GetAll => write!(f, "get_all"),
            Self::GetById => write!(f, "get_by_id"),
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Category of storage error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageErrorKind {
    /// Record was not found
    NotFound,
    /// Record collides with an existing one on a unique key
    AlreadyExists,
    /// Other constraint violation (foreign key, check)
    ConstraintViolation,
    /// Failed to reach the backend
    ConnectionFailed,
    /// Operation timed out
    Timeout,
    /// An upstream integration (the ERP bridge) failed
    Upstream,
    /// Underlying database error
    DatabaseError,
    /// Other unclassified error
    Other,
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::AlreadyExists => write!(f, "already_exists"),
            Self::ConstraintViolation => write!(f, "constraint_violation"),
            Self::ConnectionFailed => write!(f, "connection_failed"),
            Self::Timeout => write!(f, "timeout"),
            Self::Upstream => write!(f, "upstream"),
            Self::DatabaseError => write!(f, "database_error"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Structured storage error with operation context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageError {
    /// The operation being performed when the error occurred
    pub operation: StorageOperation,
    /// The category of error
    pub kind: StorageErrorKind,
    /// Human-readable error message
    pub message: String,
    /// The type of record involved (e.g. "Product")
    pub entity_type: Option<String>,
    /// Backend-native error code, if any
    pub code: Option<String>,
}

impl StorageError {
    /// Create a new storage error
    pub fn new(
        operation: StorageOperation,
        kind: StorageErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            kind,
            message: message.into(),
            entity_type: None,
            code: None,
        }
    }

    /// A record with the given id does not exist
    pub fn not_found(
        operation: StorageOperation,
        entity_type: impl Into<String>,
        id: impl fmt::Display,
    ) -> Self {
        let entity_type = entity_type.into();
        Self {
            operation,
            kind: StorageErrorKind::NotFound,
            message: format!("{entity_type} {id} not found"),
            entity_type: Some(entity_type),
            code: None,
        }
    }

    /// A unique key collides with an existing record
    pub fn already_exists(
        entity_type: impl Into<String>,
        field: &str,
        value: impl fmt::Display,
    ) -> Self {
        let entity_type = entity_type.into();
        Self {
            operation: StorageOperation::Create,
            kind: StorageErrorKind::AlreadyExists,
            message: format!("{entity_type} with {field} '{value}' already exists"),
            entity_type: Some(entity_type),
            code: Some(UNIQUE_VIOLATION_CODES[0].to_string()),
        }
    }

    /// The backend could not be reached
    pub fn connection_failed(operation: StorageOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StorageErrorKind::ConnectionFailed, message)
    }

    /// The backend did not answer in time
    pub fn timeout(operation: StorageOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StorageErrorKind::Timeout, message)
    }

    /// An upstream integration failed while serving the operation
    pub fn upstream(operation: StorageOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StorageErrorKind::Upstream, message)
    }

    /// Generic database failure
    pub fn database_error(operation: StorageOperation, message: impl Into<String>) -> Self {
        Self::new(operation, StorageErrorKind::DatabaseError, message)
    }

    /// Attach the record type
    #[must_use]
    pub fn with_entity(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    /// Attach the backend-native error code
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Override the operation
    #[must_use]
    pub fn with_operation(mut self, operation: StorageOperation) -> Self {
        self.operation = operation;
        self
    }

    /// True for `AlreadyExists` or a known unique-violation backend code
    pub fn is_unique_violation(&self) -> bool {
        self.kind == StorageErrorKind::AlreadyExists
            || self
                .code
                .as_deref()
                .is_some_and(|code| UNIQUE_VIOLATION_CODES.contains(&code))
    }

    /// Whether retrying the operation may succeed
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.kind,
            StorageErrorKind::ConnectionFailed | StorageErrorKind::Timeout
        )
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Storage {} error during {}: {}",
            self.kind, self.operation, self.message
        )?;
        if let Some(code) = &self.code {
            write!(f, " (code {code})")?;
        }
        Ok(())
    }
}

impl std::error::Error for StorageError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind_operation_and_code() {
        let error = StorageError::database_error(StorageOperation::Update, "deadlock detected")
            .with_code("40P01");
        assert_eq!(
            error.to_string(),
            "Storage database_error error during update: deadlock detected (code 40P01)"
        );
    }

    #[test]
    fn test_unique_violation_by_kind_or_code() {
        assert!(StorageError::already_exists("Product", "code", "X").is_unique_violation());

        let pg = StorageError::database_error(StorageOperation::Create, "duplicate key value")
            .with_code("23505");
        assert!(pg.is_unique_violation());

        let orm = StorageError::database_error(StorageOperation::Create, "Unique constraint failed")
            .with_code("P2002");
        assert!(orm.is_unique_violation());

        let fk = StorageError::new(
            StorageOperation::Create,
            StorageErrorKind::ConstraintViolation,
            "foreign key",
        )
        .with_code("23503");
        assert!(!fk.is_unique_violation());
    }

    #[test]
    fn test_retriable_kinds() {
        assert!(StorageError::timeout(StorageOperation::GetAll, "slow").is_retriable());
        assert!(StorageError::connection_failed(StorageOperation::GetAll, "refused").is_retriable());
        assert!(!StorageError::upstream(StorageOperation::Create, "GestLine down").is_retriable());
    }

    #[test]
    fn test_not_found_message() {
        let error = StorageError::not_found(StorageOperation::Update, "Customer", 7);
        assert_eq!(error.message, "Customer 7 not found");
        assert_eq!(error.entity_type.as_deref(), Some("Customer"));
    }
}
