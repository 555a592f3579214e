//! Catalog store: instance offerings and discount schedules
//!
//! The store is built once at start-up, either directly from parts (tests,
//! embedders) or from a [`CatalogSource`], and is read-only afterwards. It is
//! plain owned data, so it can be shared across threads behind `&` or `Arc`
//! without locking.

pub mod json;

use crate::error::{FleetError, Result};
use crate::types::{Architecture, OperatingSystem, Provider, PurchaseType, Resources};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

pub use json::JsonCatalogSource;

/// One priced virtual-machine offering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub provider: Provider,
    pub instance_type: String,
    pub region: String,
    pub operating_system: OperatingSystem,
    pub architecture: Architecture,
    #[serde(flatten)]
    pub capacity: Resources,
    /// On-demand price per hour
    pub base_price: f64,
}

impl InstanceRecord {
    /// (provider, instance_type, region, operating_system)
    pub fn identity(&self) -> (Provider, &str, &str, OperatingSystem) {
        (
            self.provider,
            self.instance_type.as_str(),
            self.region.as_str(),
            self.operating_system,
        )
    }

    fn check(&self) -> std::result::Result<(), String> {
        if self.instance_type.trim().is_empty() {
            return Err("instance_type cannot be empty".to_string());
        }
        if self.region.trim().is_empty() {
            return Err(format!("{}: region cannot be empty", self.instance_type));
        }
        if let Some(dim) = self.capacity.first_invalid() {
            return Err(format!(
                "{}: {} capacity must be a non-negative number, got {}",
                self.instance_type,
                dim.name(),
                self.capacity.get(dim)
            ));
        }
        if !self.base_price.is_finite() || self.base_price < 0.0 {
            return Err(format!(
                "{}: price must be a non-negative number, got {}",
                self.instance_type, self.base_price
            ));
        }
        Ok(())
    }
}

/// Key of one discount schedule entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiscountKey {
    pub provider: Provider,
    pub operating_system: OperatingSystem,
    pub purchase_type: PurchaseType,
    pub commitment_months: u32,
}

/// Price multipliers per (provider, OS, purchase type, commitment)
///
/// A missing key means the combination is not sold. Lookups never fall back
/// to a default multiplier.
#[derive(Debug, Clone, Default)]
pub struct DiscountSchedule {
    multipliers: HashMap<DiscountKey, f64>,
}

impl DiscountSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a multiplier; rejects non-positive values and conflicting duplicates
    pub fn insert(&mut self, key: DiscountKey, multiplier: f64) -> std::result::Result<(), String> {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(format!(
                "multiplier for {} {} {} {}m must be greater than 0, got {}",
                key.provider, key.operating_system, key.purchase_type, key.commitment_months, multiplier
            ));
        }
        match self.multipliers.get(&key) {
            Some(existing) if (*existing - multiplier).abs() > f64::EPSILON => Err(format!(
                "conflicting multipliers for {} {} {} {}m: {} vs {}",
                key.provider,
                key.operating_system,
                key.purchase_type,
                key.commitment_months,
                existing,
                multiplier
            )),
            _ => {
                self.multipliers.insert(key, multiplier);
                Ok(())
            }
        }
    }

    pub fn multiplier(&self, key: &DiscountKey) -> Option<f64> {
        self.multipliers.get(key).copied()
    }

    pub fn contains(&self, key: &DiscountKey) -> bool {
        self.multipliers.contains_key(key)
    }

    /// Smallest commitment any provider sells for this OS and purchase type
    pub fn smallest_term(&self, os: OperatingSystem, purchase_type: PurchaseType) -> Option<u32> {
        self.multipliers
            .keys()
            .filter(|k| k.operating_system == os && k.purchase_type == purchase_type)
            .map(|k| k.commitment_months)
            .min()
    }

    pub fn len(&self) -> usize {
        self.multipliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.multipliers.is_empty()
    }

    /// Entries in key order
    pub fn entries(&self) -> Vec<(DiscountKey, f64)> {
        let mut entries: Vec<_> = self.multipliers.iter().map(|(k, v)| (*k, *v)).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

/// Everything a source yields for one provider/OS pair
#[derive(Debug, Clone, Default)]
pub struct ProviderCatalog {
    pub version: Option<String>,
    pub records: Vec<InstanceRecord>,
    pub discounts: Vec<(DiscountKey, f64)>,
}

/// Where catalog data comes from
///
/// `Ok(None)` means the source has nothing for the pair; the store skips it.
pub trait CatalogSource {
    fn name(&self) -> String;

    fn load(&self, provider: Provider, os: OperatingSystem) -> Result<Option<ProviderCatalog>>;
}

/// Immutable catalog shared by every request
#[derive(Debug, Clone)]
pub struct CatalogStore {
    records: Vec<InstanceRecord>,
    discounts: DiscountSchedule,
    versions: BTreeMap<(Provider, OperatingSystem), String>,
    loaded_at: DateTime<Utc>,
}

impl CatalogStore {
    /// Build a store from in-memory parts
    pub fn from_parts(
        records: Vec<InstanceRecord>,
        discounts: Vec<(DiscountKey, f64)>,
    ) -> Result<Self> {
        let mut builder = StoreBuilder::new("in-memory");
        builder.add_records(records)?;
        builder.add_discounts(discounts)?;
        Ok(builder.finish())
    }

    /// Load every provider/OS pair `source` knows about
    pub fn from_source(source: &dyn CatalogSource, providers: &[Provider]) -> Result<Self> {
        let mut builder = StoreBuilder::new(&source.name());

        for provider in providers {
            for os in OperatingSystem::ALL {
                match source.load(*provider, os)? {
                    Some(part) => {
                        debug!(
                            "Loaded {} {} catalog: {} records, {} discounts",
                            provider,
                            os,
                            part.records.len(),
                            part.discounts.len()
                        );
                        if let Some(mismatch) = part
                            .records
                            .iter()
                            .find(|r| r.provider != *provider || r.operating_system != os)
                        {
                            return Err(FleetError::catalog(
                                source.name(),
                                format!(
                                    "{} listed under {} {} but tagged {} {}",
                                    mismatch.instance_type,
                                    provider,
                                    os,
                                    mismatch.provider,
                                    mismatch.operating_system
                                ),
                            ));
                        }
                        if let Some(version) = part.version {
                            builder.versions.insert((*provider, os), version);
                        }
                        builder.add_records(part.records)?;
                        builder.add_discounts(part.discounts)?;
                    }
                    None => warn!("No {} {} catalog data in {}", provider, os, source.name()),
                }
            }
        }

        let store = builder.finish();
        info!(
            "Catalog ready: {} instance records, {} discount entries",
            store.records.len(),
            store.discounts.len()
        );
        Ok(store)
    }

    pub fn records(&self) -> &[InstanceRecord] {
        &self.records
    }

    pub fn discounts(&self) -> &DiscountSchedule {
        &self.discounts
    }

    pub fn version(&self, provider: Provider, os: OperatingSystem) -> Option<&str> {
        self.versions.get(&(provider, os)).map(String::as_str)
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Record counts per (provider, OS)
    pub fn counts(&self) -> BTreeMap<(Provider, OperatingSystem), usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts
                .entry((record.provider, record.operating_system))
                .or_insert(0) += 1;
        }
        counts
    }

    /// Distinct regions, sorted
    pub fn regions(&self) -> Vec<&str> {
        let mut regions: Vec<&str> = self.records.iter().map(|r| r.region.as_str()).collect();
        regions.sort_unstable();
        regions.dedup();
        regions
    }
}

struct StoreBuilder {
    source_name: String,
    records: Vec<InstanceRecord>,
    identities: HashSet<(Provider, String, String, OperatingSystem)>,
    discounts: DiscountSchedule,
    versions: BTreeMap<(Provider, OperatingSystem), String>,
}

impl StoreBuilder {
    fn new(source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
            records: Vec::new(),
            identities: HashSet::new(),
            discounts: DiscountSchedule::new(),
            versions: BTreeMap::new(),
        }
    }

    fn add_records(&mut self, records: Vec<InstanceRecord>) -> Result<()> {
        for mut record in records {
            record.region = record.region.trim().to_ascii_lowercase();
            record
                .check()
                .map_err(|reason| FleetError::catalog(&self.source_name, reason))?;
            let identity = (
                record.provider,
                record.instance_type.clone(),
                record.region.clone(),
                record.operating_system,
            );
            if !self.identities.insert(identity) {
                return Err(FleetError::catalog(
                    &self.source_name,
                    format!(
                        "duplicate record {} {} in {} ({})",
                        record.provider, record.instance_type, record.region, record.operating_system
                    ),
                ));
            }
            self.records.push(record);
        }
        Ok(())
    }

    fn add_discounts(&mut self, discounts: Vec<(DiscountKey, f64)>) -> Result<()> {
        for (key, multiplier) in discounts {
            self.discounts
                .insert(key, multiplier)
                .map_err(|reason| FleetError::catalog(&self.source_name, reason))?;
        }
        Ok(())
    }

    fn finish(self) -> CatalogStore {
        CatalogStore {
            records: self.records,
            discounts: self.discounts,
            versions: self.versions,
            loaded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(instance_type: &str, vcpu: f64, price: f64) -> InstanceRecord {
        InstanceRecord {
            provider: Provider::Aws,
            instance_type: instance_type.to_string(),
            region: "us-east-1".to_string(),
            operating_system: OperatingSystem::Linux,
            architecture: Architecture::X86_64,
            capacity: Resources {
                vcpu,
                memory: vcpu * 4.0,
                ..Default::default()
            },
            base_price: price,
        }
    }

    fn key(purchase_type: PurchaseType, months: u32) -> DiscountKey {
        DiscountKey {
            provider: Provider::Aws,
            operating_system: OperatingSystem::Linux,
            purchase_type,
            commitment_months: months,
        }
    }

    #[test]
    fn test_from_parts_rejects_duplicate_identity() {
        let result = CatalogStore::from_parts(
            vec![record("m5.large", 2.0, 0.096), record("m5.large", 2.0, 0.1)],
            vec![],
        );
        assert!(matches!(result, Err(FleetError::Catalog { .. })));
    }

    #[test]
    fn test_from_parts_rejects_negative_capacity() {
        let mut bad = record("m5.large", 2.0, 0.096);
        bad.capacity.iops = -1.0;
        let err = CatalogStore::from_parts(vec![bad], vec![]).unwrap_err();
        assert!(err.to_string().contains("iops"));
    }

    #[test]
    fn test_discount_rejects_zero_multiplier() {
        let mut schedule = DiscountSchedule::new();
        assert!(schedule.insert(key(PurchaseType::Spot, 0), 0.0).is_err());
        assert!(schedule.insert(key(PurchaseType::Spot, 0), 0.3).is_ok());
        assert!(schedule.insert(key(PurchaseType::Spot, 0), 0.3).is_ok());
        assert!(schedule.insert(key(PurchaseType::Spot, 0), 0.4).is_err());
    }

    #[test]
    fn test_smallest_term() {
        let mut schedule = DiscountSchedule::new();
        schedule.insert(key(PurchaseType::Reserved, 36), 0.4).unwrap();
        schedule.insert(key(PurchaseType::Reserved, 12), 0.6).unwrap();
        schedule.insert(key(PurchaseType::OnDemand, 0), 1.0).unwrap();
        assert_eq!(
            schedule.smallest_term(OperatingSystem::Linux, PurchaseType::Reserved),
            Some(12)
        );
        assert_eq!(
            schedule.smallest_term(OperatingSystem::Windows, PurchaseType::Reserved),
            None
        );
    }

    #[test]
    fn test_counts_and_regions() {
        let mut west = record("c5.large", 2.0, 0.085);
        west.region = "us-west-2".to_string();
        let store =
            CatalogStore::from_parts(vec![record("m5.large", 2.0, 0.096), west], vec![]).unwrap();
        assert_eq!(store.counts()[&(Provider::Aws, OperatingSystem::Linux)], 2);
        assert_eq!(store.regions(), vec!["us-east-1", "us-west-2"]);
    }
}
