//! Helper functions for creating actionable error messages
//!
//! Provides utilities to create error messages with suggestions
//! and actionable guidance for users.

use crate::error::{ConfigError, FleetError};

/// Create a validation error with format examples
pub fn validation_error_with_examples(
    field: impl Into<String>,
    reason: impl Into<String>,
    examples: &[&str],
) -> FleetError {
    let field = field.into();
    let mut reason = reason.into();
    if !examples.is_empty() {
        reason.push_str("\n\nValid examples:\n");
        for example in examples {
            reason.push_str(&format!("  - {}\n", example));
        }
    }
    FleetError::Validation { field, reason }
}

/// Create a catalog error with troubleshooting steps
pub fn catalog_error_with_troubleshooting(
    source_name: impl Into<String>,
    message: impl Into<String>,
    troubleshooting: &[&str],
) -> FleetError {
    let source_name = source_name.into();
    let mut message = message.into();
    if !troubleshooting.is_empty() {
        message.push_str("\n\nTroubleshooting:\n");
        for (i, step) in troubleshooting.iter().enumerate() {
            message.push_str(&format!("  {}. {}\n", i + 1, step));
        }
    }
    FleetError::Catalog {
        source_name,
        message,
    }
}

/// Create a config error with fix suggestions
pub fn config_error_with_fix(
    field: impl Into<String>,
    reason: impl Into<String>,
    fix: impl Into<String>,
) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        reason: format!("{}\n\nFix: {}", reason.into(), fix.into()),
    }
}
