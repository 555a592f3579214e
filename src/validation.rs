//! Input validation utilities
//!
//! Field-level parsers for loosely typed request values. Each returns a
//! `FleetError::Validation` naming the field it was given.

use crate::error::{FleetError, Result};

/// Treat missing and whitespace-only values the same
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parse a finite number >= 0
pub fn parse_non_negative(field: &str, raw: &str) -> Result<f64> {
    let value: f64 = raw.trim().parse().map_err(|_| {
        FleetError::validation(field, format!("Expected a number, got: '{}'", raw.trim()))
    })?;

    if !value.is_finite() {
        return Err(FleetError::validation(
            field,
            format!("Value must be finite, got: {}", raw.trim()),
        ));
    }

    if value < 0.0 {
        return Err(FleetError::validation(
            field,
            format!("Value cannot be negative, got: {}", value),
        ));
    }

    Ok(value)
}

/// Parse a required finite number > 0
pub fn parse_positive(field: &str, raw: Option<&str>) -> Result<f64> {
    let raw = non_empty(raw)
        .ok_or_else(|| FleetError::validation(field, "Field is required"))?;
    let value = parse_non_negative(field, raw)?;
    if value == 0.0 {
        return Err(FleetError::validation(field, "Value must be greater than 0"));
    }
    Ok(value)
}

/// Parse an optional dimension where absent means unconstrained
pub fn parse_optional_non_negative(field: &str, raw: Option<&str>) -> Result<f64> {
    match non_empty(raw) {
        Some(raw) => parse_non_negative(field, raw),
        None => Ok(0.0),
    }
}

/// Parse a required integer >= 1
pub fn parse_positive_count(field: &str, raw: Option<&str>) -> Result<u32> {
    let raw = non_empty(raw)
        .ok_or_else(|| FleetError::validation(field, "Field is required"))?;
    let count: u32 = raw.parse().map_err(|_| {
        FleetError::validation(field, format!("Expected a whole number, got: '{}'", raw))
    })?;
    if count == 0 {
        return Err(FleetError::validation(field, "Count must be at least 1"));
    }
    Ok(count)
}

/// Parse a commitment term in months
///
/// Accepts a bare month count ("12") or years with a suffix ("1y", "3yr").
pub fn parse_commitment_months(field: &str, raw: &str) -> Result<u32> {
    let lower = raw.trim().to_ascii_lowercase();
    let (digits, per_unit) = if let Some(years) = lower
        .strip_suffix("yr")
        .or_else(|| lower.strip_suffix('y'))
    {
        (years.trim(), 12)
    } else if let Some(months) = lower
        .strip_suffix("mo")
        .or_else(|| lower.strip_suffix('m'))
    {
        (months.trim(), 1)
    } else {
        (lower.as_str(), 1)
    };

    let value: u32 = digits.parse().map_err(|_| {
        FleetError::validation(
            field,
            format!("Expected months (e.g. 12) or years (e.g. 1y), got: '{}'", raw.trim()),
        )
    })?;

    value.checked_mul(per_unit).ok_or_else(|| {
        FleetError::validation(field, format!("Commitment is too long: '{}'", raw.trim()))
    })
}

/// Parse utilization, which must lie in (0, 1]
pub fn parse_utilization(field: &str, raw: &str) -> Result<f64> {
    let value = parse_non_negative(field, raw)?;
    validate_utilization(field, value)?;
    Ok(value)
}

pub fn validate_utilization(field: &str, value: f64) -> Result<()> {
    if !(value > 0.0 && value <= 1.0) {
        return Err(FleetError::validation(
            field,
            format!("Utilization must be in (0, 1], got: {}", value),
        ));
    }
    Ok(())
}

/// Normalize a region to trimmed lower case
///
/// Any non-empty text is accepted; a region the catalog does not know simply
/// matches no records.
pub fn validate_region(field: &str, raw: Option<&str>) -> Result<String> {
    let region = non_empty(raw)
        .ok_or_else(|| FleetError::validation(field, "Field is required"))?;
    Ok(region.to_ascii_lowercase())
}
