//! Error types for fleetctl
//!
//! This module defines the error handling strategy for fleetctl. There are two
//! error types: `FleetError` (main error enum) and `ConfigError` (configuration-specific).
//!
//! ## Error Handling Philosophy
//!
//! Library code uses `crate::error::Result<T>` which returns `FleetError`.
//! CLI code uses `anyhow::Result<T>` for top-level error handling. The conversion
//! happens at the CLI boundary using `anyhow::Error::from` so the binary can still
//! downcast to `FleetError` when choosing an exit code.
//!
//! ## When to Use Which Error
//!
//! - `Validation`: a user-supplied demand field is missing or malformed
//!   - Always names the offending field
//!   - Surfaced verbatim to the caller
//!
//! - `Pricing`: a discount lookup failed for a record that passed filtering
//!   - Means the catalog and discount schedule disagree
//!   - Internal fault, not user-correctable
//!
//! - `Cancelled`: the caller's cancellation token fired mid-search
//!   - A defined outcome rather than a failure; no partial result is returned
//!
//! - `Catalog`: catalog data could not be read or is inconsistent
//!   - Raised while building the `CatalogStore`, never during a search
//!
//! - `ConfigError`: configuration parsing and validation issues
//!   - Automatically converted to `FleetError::Config` via `#[from]`
//!
//! An empty offer set is never an error.

use thiserror::Error;

/// Main error type for fleetctl
#[derive(Error, Debug)]
pub enum FleetError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {field} - {reason}")]
    Validation { field: String, reason: String },

    #[error("Pricing error: {provider} {instance_type} - {reason}")]
    Pricing {
        provider: String,
        instance_type: String,
        reason: String,
    },

    #[error("Search cancelled before completion")]
    Cancelled,

    #[error("Catalog error: {source_name} - {message}")]
    Catalog {
        source_name: String,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FleetError {
    /// Shorthand for a validation failure on `field`
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        FleetError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn catalog(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        FleetError::Catalog {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// True for errors the user can fix by changing the request
    pub fn is_user_error(&self) -> bool {
        matches!(self, FleetError::Validation { .. })
    }
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, FleetError>;
