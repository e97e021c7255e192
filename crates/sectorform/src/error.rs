//! Error types for sectorform.
//!
//! This module defines all error types used throughout the sectorform crate,
//! separating failures that never reach the store (validation) from failures
//! reported by the store itself.

use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationErrors;

/// The main error type for sectorform operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Document Store Errors ===
    /// A document store call failed (transport, auth, permission, quota).
    #[error("store {operation} on '{collection}' failed: {message}")]
    Store {
        /// The store operation that failed.
        operation: &'static str,
        /// The collection the operation targeted.
        collection: String,
        /// Description of what went wrong.
        message: String,
    },

    /// A stored document could not be decoded into a typed record.
    #[error("document '{id}' in '{collection}' is malformed: {message}")]
    DocumentDecode {
        /// The collection holding the document.
        collection: String,
        /// The document identifier.
        id: String,
        /// Description of what went wrong.
        message: String,
    },

    // === Form Errors ===
    /// A submission was rejected before reaching the store.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for sectorform operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<ValidationErrors> for Error {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl Error {
    /// Create a new store error.
    #[must_use]
    pub fn store(
        operation: &'static str,
        collection: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Store {
            operation,
            collection: collection.into(),
            message: message.into(),
        }
    }

    /// Create a new document decode error.
    #[must_use]
    pub fn document_decode(
        collection: impl Into<String>,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::DocumentDecode {
            collection: collection.into(),
            id: id.into(),
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is a rejected form submission.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this error was reported by the document store.
    ///
    /// Database failures of the local backend count as store failures: the
    /// form layer cannot tell them apart from a remote outage.
    #[must_use]
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            Self::Store { .. }
                | Self::DatabaseOpen { .. }
                | Self::DatabaseQuery(_)
                | Self::DatabaseMigration { .. }
        )
    }

    /// Field errors carried by a validation failure.
    #[must_use]
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::USER;

    #[test]
    fn test_store_error_display() {
        let err = Error::store("list", "choices", "permission denied");
        assert_eq!(
            err.to_string(),
            "store list on 'choices' failed: permission denied"
        );
    }

    #[test]
    fn test_is_store_error() {
        assert!(Error::store("create", "choices", "offline").is_store_error());
        assert!(!Error::internal("bug").is_store_error());
        assert!(Error::DatabaseMigration {
            message: "x".to_string()
        }
        .is_store_error());
    }

    #[test]
    fn test_validation_error() {
        let mut errors = ValidationErrors::default();
        errors.insert(USER, "Username is required");
        let err: Error = errors.into();

        assert!(err.is_validation_error());
        assert!(!err.is_store_error());
        assert!(err.to_string().contains("Username is required"));
        assert!(err.validation_errors().unwrap().get(USER).is_some());
    }

    #[test]
    fn test_validation_errors_absent_for_other_kinds() {
        assert!(Error::internal("x").validation_errors().is_none());
    }

    #[test]
    fn test_document_decode_display() {
        let err = Error::document_decode("sectors", "abc", "missing field `name`");
        let msg = err.to_string();
        assert!(msg.contains("abc"));
        assert!(msg.contains("sectors"));
        assert!(msg.contains("missing field"));
    }

    #[test]
    fn test_internal_error() {
        let err = Error::internal("something went wrong");
        assert_eq!(err.to_string(), "internal error: something went wrong");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
            assert!(err.is_store_error());
        }
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "delimiter must not be empty".to_string(),
        };
        assert!(err.to_string().contains("delimiter"));
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
