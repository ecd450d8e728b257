//! Error types for the schema catalog

use thiserror::Error;

use crate::catalog::ItemKind;

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Schema catalog errors
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: ItemKind, name: String },

    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: ItemKind, name: String },

    #[error("Invalid pattern for format {name}: {reason}")]
    InvalidPattern { name: String, reason: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CatalogError {
    pub fn not_found(kind: ItemKind, name: impl Into<String>) -> Self {
        CatalogError::NotFound { kind, name: name.into() }
    }

    pub fn already_exists(kind: ItemKind, name: impl Into<String>) -> Self {
        CatalogError::AlreadyExists { kind, name: name.into() }
    }

    /// Whether the error was caused by the caller rather than the catalog
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            CatalogError::InvalidPattern { .. }
                | CatalogError::InvalidQuery(_)
                | CatalogError::InvalidInput(_)
        )
    }
}
