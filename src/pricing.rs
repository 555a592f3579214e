//! Pricing engine
//!
//! Prices a fleet composition under the demand's purchase terms:
//!
//! ```text
//! total = Σ count × base_price × multiplier(provider, os, purchase, term) × utilization
//! ```
//!
//! The total is summed in a canonical entry order, so reordering a
//! composition never changes its price.
//!
//! A missing multiplier is a `Pricing` error: filtering already dropped
//! unsupported records, so reaching one here means the catalog and the
//! schedule disagree.

use crate::catalog::{DiscountSchedule, InstanceRecord};
use crate::demand::ResourceDemand;
use crate::error::{FleetError, Result};
use crate::filter::discount_key;
use crate::search::FleetComposition;
use crate::types::PurchaseType;
use serde::{Serialize, Serializer};
use std::fmt;

/// Purchase type plus commitment, e.g. `on-demand` or `reserved-12-month`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BillingType {
    pub purchase_type: PurchaseType,
    pub commitment_months: u32,
}

impl BillingType {
    pub fn for_demand(demand: &ResourceDemand) -> Self {
        Self {
            purchase_type: demand.purchase_type,
            commitment_months: demand.commitment_months,
        }
    }
}

impl fmt::Display for BillingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.commitment_months == 0 {
            write!(f, "{}", self.purchase_type.slug())
        } else {
            write!(
                f,
                "{}-{}-month",
                self.purchase_type.slug(),
                self.commitment_months
            )
        }
    }
}

impl Serialize for BillingType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Price of one composition entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineQuote {
    /// Expected hourly cost of a single instance after discount and utilization
    pub unit_price: f64,
    pub subtotal: f64,
}

/// Price of a whole composition
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub lines: Vec<LineQuote>,
    pub total_price: f64,
    pub billing_type: BillingType,
}

/// Expected hourly cost of one instance of `record` under `demand`
pub fn unit_price(
    record: &InstanceRecord,
    demand: &ResourceDemand,
    schedule: &DiscountSchedule,
) -> Result<f64> {
    let key = discount_key(record, demand);
    let multiplier = schedule
        .multiplier(&key)
        .ok_or_else(|| FleetError::Pricing {
            provider: record.provider.to_string(),
            instance_type: record.instance_type.clone(),
            reason: format!(
                "no discount entry for {} {} with a {}-month commitment",
                record.operating_system, demand.purchase_type, demand.commitment_months
            ),
        })?;
    Ok(record.base_price * multiplier * demand.utilization)
}

/// Price every entry of `composition`
pub fn price_composition(
    composition: &FleetComposition,
    demand: &ResourceDemand,
    schedule: &DiscountSchedule,
) -> Result<Quote> {
    let lines = composition
        .entries()
        .iter()
        .map(|entry| {
            let unit_price = unit_price(&entry.record, demand, schedule)?;
            Ok(LineQuote {
                unit_price,
                subtotal: unit_price * f64::from(entry.count),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    // Sum in key order so the total does not depend on entry order
    let mut keyed: Vec<(&str, u32, f64)> = composition
        .entries()
        .iter()
        .zip(lines.iter())
        .map(|(entry, line)| (entry.record.instance_type.as_str(), entry.count, line.subtotal))
        .collect();
    keyed.sort_by(|a, b| {
        a.0.cmp(b.0)
            .then_with(|| a.1.cmp(&b.1))
            .then_with(|| a.2.total_cmp(&b.2))
    });
    let total_price = keyed.iter().map(|(_, _, subtotal)| subtotal).sum();

    Ok(Quote {
        lines,
        total_price,
        billing_type: BillingType::for_demand(demand),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DiscountKey;
    use crate::search::FleetEntry;
    use crate::types::{Architecture, OperatingSystem, Provider, Resources};

    fn record(provider: Provider, instance_type: &str, price: f64) -> InstanceRecord {
        InstanceRecord {
            provider,
            instance_type: instance_type.to_string(),
            region: "us-east-1".to_string(),
            operating_system: OperatingSystem::Linux,
            architecture: Architecture::X86_64,
            capacity: Resources {
                vcpu: 4.0,
                memory: 16.0,
                ..Default::default()
            },
            base_price: price,
        }
    }

    fn demand(purchase_type: PurchaseType, months: u32, utilization: f64) -> ResourceDemand {
        ResourceDemand {
            region: "us-east-1".to_string(),
            operating_system: OperatingSystem::Linux,
            architecture: Architecture::X86_64,
            per_instance: Resources {
                vcpu: 4.0,
                memory: 16.0,
                ..Default::default()
            },
            instance_count: 1,
            commitment_months: months,
            utilization,
            purchase_type,
        }
    }

    fn schedule() -> DiscountSchedule {
        let mut schedule = DiscountSchedule::new();
        for (provider, purchase_type, months, multiplier) in [
            (Provider::Aws, PurchaseType::OnDemand, 0, 1.0),
            (Provider::Aws, PurchaseType::Reserved, 12, 0.6),
            (Provider::Azure, PurchaseType::OnDemand, 0, 1.0),
        ] {
            schedule
                .insert(
                    DiscountKey {
                        provider,
                        operating_system: OperatingSystem::Linux,
                        purchase_type,
                        commitment_months: months,
                    },
                    multiplier,
                )
                .unwrap();
        }
        schedule
    }

    #[test]
    fn test_billing_type_labels() {
        let on_demand = BillingType {
            purchase_type: PurchaseType::OnDemand,
            commitment_months: 0,
        };
        let reserved = BillingType {
            purchase_type: PurchaseType::Reserved,
            commitment_months: 12,
        };
        assert_eq!(on_demand.to_string(), "on-demand");
        assert_eq!(reserved.to_string(), "reserved-12-month");
        assert_eq!(serde_json::to_string(&reserved).unwrap(), "\"reserved-12-month\"");
    }

    #[test]
    fn test_reserved_discount_applies() {
        let composition =
            FleetComposition::homogeneous(record(Provider::Aws, "m5.xlarge", 0.192), 2);
        let on_demand =
            price_composition(&composition, &demand(PurchaseType::OnDemand, 0, 1.0), &schedule())
                .unwrap();
        let reserved =
            price_composition(&composition, &demand(PurchaseType::Reserved, 12, 1.0), &schedule())
                .unwrap();
        assert!((on_demand.total_price - 0.384).abs() < 1e-12);
        assert!((reserved.total_price - on_demand.total_price * 0.6).abs() < 1e-12);
        assert_eq!(reserved.billing_type.to_string(), "reserved-12-month");
    }

    #[test]
    fn test_utilization_scales_price() {
        let composition =
            FleetComposition::homogeneous(record(Provider::Aws, "m5.xlarge", 0.192), 1);
        let quote =
            price_composition(&composition, &demand(PurchaseType::OnDemand, 0, 0.5), &schedule())
                .unwrap();
        assert!((quote.total_price - 0.096).abs() < 1e-12);
        assert!((quote.lines[0].unit_price - 0.096).abs() < 1e-12);
    }

    #[test]
    fn test_mixed_entries_sum() {
        let composition = FleetComposition::new(vec![
            FleetEntry {
                record: record(Provider::Aws, "m5.xlarge", 0.192),
                count: 1,
            },
            FleetEntry {
                record: record(Provider::Azure, "D4s_v5", 0.2),
                count: 3,
            },
        ]);
        let quote =
            price_composition(&composition, &demand(PurchaseType::OnDemand, 0, 1.0), &schedule())
                .unwrap();
        assert!((quote.total_price - (0.192 + 0.6)).abs() < 1e-12);
        assert_eq!(quote.lines.len(), 2);
    }

    #[test]
    fn test_missing_discount_is_pricing_error() {
        let composition =
            FleetComposition::homogeneous(record(Provider::Azure, "D4s_v5", 0.2), 1);
        let err = price_composition(&composition, &demand(PurchaseType::Spot, 0, 1.0), &schedule())
            .unwrap_err();
        match err {
            FleetError::Pricing { provider, instance_type, .. } => {
                assert_eq!(provider, "Azure");
                assert_eq!(instance_type, "D4s_v5");
            }
            other => panic!("Expected Pricing error, got: {:?}", other),
        }
    }
}
