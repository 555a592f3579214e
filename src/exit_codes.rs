//! Exit code standardization for fleetctl
//!
//! Provides consistent exit codes for different error types so scripts can
//! tell a bad request apart from a broken catalog.
//!
//! ## Exit Code Convention
//!
//! - `0` = Success (including an empty offer set)
//! - `1` = User error (invalid demand field)
//! - `2` = System error (catalog, pricing, I/O, JSON)
//! - `3` = Configuration error (config parse or validation)
//! - `4` = Cancelled (deadline reached before the search finished)

use crate::error::FleetError;

/// Standard exit codes for fleetctl
pub mod codes {
    #[allow(dead_code)]
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 1;
    pub const SYSTEM_ERROR: i32 = 2;
    pub const CONFIG_ERROR: i32 = 3;
    pub const CANCELLED: i32 = 4;
}

/// Map a FleetError to an exit code
pub fn exit_code_for_error(error: &FleetError) -> i32 {
    use FleetError::*;
    match error {
        Config(_) => codes::CONFIG_ERROR,

        Validation { .. } => codes::USER_ERROR,

        Cancelled => codes::CANCELLED,

        // Catalog and schedule disagree, or data could not be read
        Pricing { .. } => codes::SYSTEM_ERROR,
        Catalog { .. } => codes::SYSTEM_ERROR,
        Io(_) => codes::SYSTEM_ERROR,
        Json(_) => codes::SYSTEM_ERROR,
    }
}

/// Exit code for an error that reached `main`
///
/// Config loader failures (a bare `ConfigError` or a TOML parse error) map
/// to the config code; anything else that is not a `FleetError` is a system
/// error.
pub fn exit_code_for_anyhow(error: &anyhow::Error) -> i32 {
    if let Some(fleet) = error.downcast_ref::<FleetError>() {
        exit_code_for_error(fleet)
    } else if error.downcast_ref::<crate::error::ConfigError>().is_some()
        || error.downcast_ref::<toml::de::Error>().is_some()
    {
        codes::CONFIG_ERROR
    } else {
        codes::SYSTEM_ERROR
    }
}

/// Exit with the code for `error`
pub fn exit_with_code(error: &anyhow::Error) -> ! {
    std::process::exit(exit_code_for_anyhow(error));
}
