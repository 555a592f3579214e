//! JSON file catalog source
//!
//! Layout under the catalog directory:
//!
//! ```text
//! <dir>/aws/instances_linux.json     <dir>/aws/discounts_linux.json
//! <dir>/aws/instances_windows.json   <dir>/aws/discounts_windows.json
//! <dir>/azure/...
//! ```
//!
//! Provider and OS come from the file location, not the file body.

use crate::catalog::{CatalogSource, DiscountKey, InstanceRecord, ProviderCatalog};
use crate::error::{FleetError, Result};
use crate::error_helpers::catalog_error_with_troubleshooting;
use crate::types::{Architecture, OperatingSystem, Provider, PurchaseType, Resources};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Instance price sheet for one provider/OS
#[derive(Debug, Serialize, Deserialize)]
pub struct InstanceFile {
    #[serde(default)]
    pub version: Option<String>,
    pub instances: Vec<InstanceEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InstanceEntry {
    pub instance_type: String,
    pub region: String,
    pub architecture: Architecture,
    #[serde(flatten)]
    pub capacity: Resources,
    pub price: f64,
}

/// Discount sheet for one provider/OS
#[derive(Debug, Serialize, Deserialize)]
pub struct DiscountFile {
    #[serde(default)]
    pub version: Option<String>,
    pub discounts: Vec<DiscountEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiscountEntry {
    pub purchase_type: PurchaseType,
    #[serde(default)]
    pub commitment_months: u32,
    pub multiplier: f64,
}

/// Reads catalog files from a directory tree
#[derive(Debug, Clone)]
pub struct JsonCatalogSource {
    dir: PathBuf,
}

impl JsonCatalogSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn instances_path(&self, provider: Provider, os: OperatingSystem) -> PathBuf {
        self.dir
            .join(provider.slug())
            .join(format!("instances_{}.json", os.slug()))
    }

    pub fn discounts_path(&self, provider: Provider, os: OperatingSystem) -> PathBuf {
        self.dir
            .join(provider.slug())
            .join(format!("discounts_{}.json", os.slug()))
    }
}

impl CatalogSource for JsonCatalogSource {
    fn name(&self) -> String {
        self.dir.display().to_string()
    }

    fn load(&self, provider: Provider, os: OperatingSystem) -> Result<Option<ProviderCatalog>> {
        let instances_path = self.instances_path(provider, os);
        let Some(instances) = read_json_file::<InstanceFile>(&instances_path)? else {
            return Ok(None);
        };

        let discounts_path = self.discounts_path(provider, os);
        let discounts = match read_json_file::<DiscountFile>(&discounts_path)? {
            Some(file) => file.discounts,
            None => {
                warn!(
                    "No discount file at {}; {} {} records will never be eligible",
                    discounts_path.display(),
                    provider,
                    os
                );
                Vec::new()
            }
        };

        debug!(
            "Read {} instances from {}",
            instances.instances.len(),
            instances_path.display()
        );

        Ok(Some(ProviderCatalog {
            version: instances.version,
            records: instances
                .instances
                .into_iter()
                .map(|entry| InstanceRecord {
                    provider,
                    instance_type: entry.instance_type,
                    region: entry.region,
                    operating_system: os,
                    architecture: entry.architecture,
                    capacity: entry.capacity,
                    base_price: entry.price,
                })
                .collect(),
            discounts: discounts
                .into_iter()
                .map(|entry| {
                    (
                        DiscountKey {
                            provider,
                            operating_system: os,
                            purchase_type: entry.purchase_type,
                            commitment_months: entry.commitment_months,
                        },
                        entry.multiplier,
                    )
                })
                .collect(),
        }))
    }
}

/// Read and parse a JSON file; `Ok(None)` when it does not exist
fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|e| {
        FleetError::catalog(path.display().to_string(), format!("Failed to read file: {}", e))
    })?;
    let parsed = serde_json::from_str(&content).map_err(|e| {
        catalog_error_with_troubleshooting(
            path.display().to_string(),
            format!("Failed to parse JSON: {}", e),
            &[
                "Validate the file with: jq . <file>",
                "Check field names and that numbers are not quoted",
            ],
        )
    })?;
    Ok(Some(parsed))
}
