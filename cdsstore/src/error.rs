//! Error types for catalog operations

use std::time::Duration;

/// Error types for catalog operations
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Malformed object id: {0}")]
    MalformedId(String),

    #[error("Entity is not registered in a store: {0}")]
    Detached(String),

    #[error("Children retrieval failed: {0}")]
    FetchFailed(String),

    #[error("Children retrieval timed out after {0:?}")]
    FetchTimeout(Duration),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CatalogError {
    /// NotFound and MalformedId are soft misses for the protocol layer
    pub fn is_not_found(&self) -> bool {
        matches!(self, CatalogError::NotFound(_) | CatalogError::MalformedId(_))
    }
}

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;
