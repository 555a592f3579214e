//! Demand normalization
//!
//! Turns a loosely typed request (form fields, CLI flags, JSON objects with
//! numbers or strings) into a validated [`ResourceDemand`]. Everything past
//! this module works on the typed record only.

use crate::catalog::DiscountSchedule;
use crate::error::{FleetError, Result};
use crate::types::{Architecture, OperatingSystem, PurchaseType, Resources};
use crate::validation::{
    non_empty, parse_commitment_months, parse_optional_non_negative, parse_positive,
    parse_positive_count, parse_utilization, validate_region, validate_utilization,
};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// Request fields as they arrive, before any parsing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawDemand {
    #[serde(default, deserialize_with = "loose_string")]
    pub region: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub os: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub architecture: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub vcpu: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub memory: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub storage: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub iops: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub bandwidth: Option<String>,
    #[serde(default, alias = "instance_count", deserialize_with = "loose_string")]
    pub instances: Option<String>,
    #[serde(default, alias = "commitment_months", deserialize_with = "loose_string")]
    pub commitment: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub utilization: Option<String>,
    #[serde(default, alias = "type", deserialize_with = "loose_string")]
    pub purchase_type: Option<String>,
}

/// Accept a JSON string, number or bool as text; null as absent
fn loose_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "expected a string or number, got {}",
                other
            )))
        }
    })
}

/// Validated resource requirement for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDemand {
    pub region: String,
    pub operating_system: OperatingSystem,
    pub architecture: Architecture,
    /// Per-instance requirement; multiplied by `instance_count` for the fleet
    pub per_instance: Resources,
    pub instance_count: u32,
    /// 0 means no commitment
    pub commitment_months: u32,
    pub utilization: f64,
    pub purchase_type: PurchaseType,
}

impl ResourceDemand {
    /// Fleet-wide requirement in every dimension
    pub fn required_totals(&self) -> Resources {
        self.per_instance.scaled(f64::from(self.instance_count))
    }

    /// Re-check the invariants for demands built in code rather than normalized
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(FleetError::validation("region", "Field is required"));
        }
        if let Some(dim) = self.per_instance.first_invalid() {
            return Err(FleetError::validation(
                dim.name(),
                format!(
                    "Value must be a non-negative number, got: {}",
                    self.per_instance.get(dim)
                ),
            ));
        }
        if self.instance_count == 0 {
            return Err(FleetError::validation("instances", "Count must be at least 1"));
        }
        validate_utilization("utilization", self.utilization)
    }
}

/// Normalize a raw request against the discount schedule
///
/// The schedule is only consulted for the default commitment term.
pub fn normalize(raw: &RawDemand, schedule: &DiscountSchedule) -> Result<ResourceDemand> {
    let region = validate_region("region", raw.region.as_deref())?;

    let operating_system: OperatingSystem = non_empty(raw.os.as_deref())
        .ok_or_else(|| FleetError::validation("os", "Field is required"))?
        .parse()?;

    let architecture = match non_empty(raw.architecture.as_deref()) {
        Some(value) => value.parse()?,
        None => Architecture::X86_64,
    };

    let purchase_type = match non_empty(raw.purchase_type.as_deref()) {
        Some(value) => value.parse()?,
        None => PurchaseType::OnDemand,
    };

    let per_instance = Resources {
        vcpu: parse_positive("vcpu", raw.vcpu.as_deref())?,
        memory: parse_positive("memory", raw.memory.as_deref())?,
        storage: parse_positive("storage", raw.storage.as_deref())?,
        iops: parse_optional_non_negative("iops", raw.iops.as_deref())?,
        bandwidth: parse_optional_non_negative("bandwidth", raw.bandwidth.as_deref())?,
    };

    let instance_count = parse_positive_count("instances", raw.instances.as_deref())?;

    let commitment_months = match non_empty(raw.commitment.as_deref()) {
        Some(value) => parse_commitment_months("commitment", value)?,
        None => {
            let term = schedule
                .smallest_term(operating_system, purchase_type)
                .unwrap_or(0);
            debug!(
                "No commitment given; defaulting to {} months for {} {}",
                term, operating_system, purchase_type
            );
            term
        }
    };

    let utilization = match non_empty(raw.utilization.as_deref()) {
        Some(value) => parse_utilization("utilization", value)?,
        None => 1.0,
    };

    Ok(ResourceDemand {
        region,
        operating_system,
        architecture,
        per_instance,
        instance_count,
        commitment_months,
        utilization,
        purchase_type,
    })
}
