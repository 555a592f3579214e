//! Tests for error message quality and actionability
//!
//! Verifies that error messages name the offending field and, where a fixed
//! vocabulary exists, list the accepted values.

use fleetctl::catalog::DiscountSchedule;
use fleetctl::demand::{normalize, RawDemand};
use fleetctl::error::{ConfigError, FleetError};
use fleetctl::validation;

fn raw() -> RawDemand {
    RawDemand {
        region: Some("us-east-1".to_string()),
        os: Some("Linux".to_string()),
        vcpu: Some("4".to_string()),
        memory: Some("16".to_string()),
        storage: Some("100".to_string()),
        instances: Some("1".to_string()),
        ..Default::default()
    }
}

fn validation_field(result: fleetctl::Result<impl std::fmt::Debug>) -> (String, String) {
    match result {
        Err(FleetError::Validation { field, reason }) => (field, reason),
        other => panic!("Expected Validation error, got: {:?}", other),
    }
}

#[test]
fn test_missing_required_field_is_named() {
    let mut request = raw();
    request.memory = None;

    let (field, reason) = validation_field(normalize(&request, &DiscountSchedule::new()));
    assert_eq!(field, "memory");
    assert!(reason.contains("required"));
}

#[test]
fn test_unknown_purchase_type_lists_choices() {
    let mut request = raw();
    request.purchase_type = Some("preemptible".to_string());

    let (field, reason) = validation_field(normalize(&request, &DiscountSchedule::new()));
    assert_eq!(field, "purchase_type");
    assert!(reason.contains("preemptible"));
    assert!(reason.contains("Valid examples"));
    assert!(reason.contains("On-Demand"));
    assert!(reason.contains("Spot"));
}

#[test]
fn test_unknown_os_lists_choices() {
    let mut request = raw();
    request.os = Some("macos".to_string());

    let (field, reason) = validation_field(normalize(&request, &DiscountSchedule::new()));
    assert_eq!(field, "os");
    assert!(reason.contains("Linux"));
    assert!(reason.contains("Windows"));
}

#[test]
fn test_utilization_out_of_range_message() {
    let (field, reason) = validation_field(validation::parse_utilization("utilization", "1.5"));
    assert_eq!(field, "utilization");
    assert!(reason.contains("(0, 1]"));
    assert!(reason.contains("1.5"));
}

#[test]
fn test_missing_region_is_named() {
    let (field, reason) = validation_field(validation::validate_region("region", Some("  ")));
    assert_eq!(field, "region");
    assert!(reason.contains("required"));
}

#[test]
fn test_display_name_region_is_accepted() {
    let mut request = raw();
    request.region = Some("East US".to_string());

    let demand = normalize(&request, &DiscountSchedule::new()).unwrap();
    assert_eq!(demand.region, "east us");
}

#[test]
fn test_non_numeric_value_echoed() {
    let mut request = raw();
    request.vcpu = Some("four".to_string());

    let (field, reason) = validation_field(normalize(&request, &DiscountSchedule::new()));
    assert_eq!(field, "vcpu");
    assert!(reason.contains("'four'"));
}

#[test]
fn test_pricing_error_names_instance() {
    let err = FleetError::Pricing {
        provider: "Azure".to_string(),
        instance_type: "D4s_v5".to_string(),
        reason: "no discount entry for Linux spot".to_string(),
    };

    let msg = format!("{}", err);
    assert!(msg.contains("Azure"));
    assert!(msg.contains("D4s_v5"));
    assert!(msg.contains("no discount entry"));
}

#[test]
fn test_config_error_messages() {
    let err = ConfigError::InvalidValue {
        field: "catalog.providers".to_string(),
        reason: "at least one provider must be enabled".to_string(),
    };
    let msg = format!("{}", FleetError::from(err));
    assert!(msg.contains("Configuration error"));
    assert!(msg.contains("catalog.providers"));
}

#[test]
fn test_error_chain_preservation() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
    let err = FleetError::Io(io_err);

    let msg = format!("{}", err);
    assert!(msg.contains("I/O error"));
    assert!(msg.contains("File not found"));
}
