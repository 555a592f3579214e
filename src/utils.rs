use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;

/// Billing hours in an average month
pub const HOURS_PER_MONTH: f64 = 730.0;

pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Create the parent directory of `file` if it has one
pub fn ensure_parent_dir(file: &Path) -> Result<()> {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

pub fn monthly_cost(hourly: f64) -> f64 {
    hourly * HOURS_PER_MONTH
}

/// `$0.1920/h` below a dollar, `$12.34/h` above
pub fn format_price(hourly: f64) -> String {
    if hourly < 1.0 {
        format!("${:.4}/h", hourly)
    } else {
        format!("${:.2}/h", hourly)
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
