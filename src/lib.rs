//! fleetctl library
//!
//! Cross-cloud fleet composition: given a resource demand and an immutable
//! catalog of AWS and Azure instance offerings, find every fleet that covers
//! the demand and price it under the requested purchase terms.

pub mod catalog;
pub mod commands;
pub mod config;
pub mod demand;
pub mod error;
pub mod error_helpers;
pub mod exit_codes;
pub mod filter;
pub mod offers;
pub mod optimizer;
pub mod pricing;
pub mod search;
pub mod types;
pub mod utils;
pub mod validation;

// Re-export commonly used types
pub use catalog::{CatalogSource, CatalogStore, InstanceRecord, JsonCatalogSource};
pub use demand::{normalize, RawDemand, ResourceDemand};
pub use error::{ConfigError, FleetError, Result};
pub use offers::{compare_offers, rank_offers, Offer, OfferLine};
pub use optimizer::{compute_offers, compute_offers_from_raw};
pub use search::SearchOptions;
pub use types::{Architecture, OperatingSystem, Provider, PurchaseType, Resources};
