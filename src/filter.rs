//! Candidate filtering
//!
//! Narrows the catalog to records a demand can actually be served with.
//! Never fails: an empty result simply flows through to an empty offer set.

use crate::catalog::{CatalogStore, DiscountKey, InstanceRecord};
use crate::demand::ResourceDemand;
use std::cmp::Ordering;
use tracing::debug;

/// Discount key for pricing `record` under `demand`
pub fn discount_key(record: &InstanceRecord, demand: &ResourceDemand) -> DiscountKey {
    DiscountKey {
        provider: record.provider,
        operating_system: record.operating_system,
        purchase_type: demand.purchase_type,
        commitment_months: demand.commitment_months,
    }
}

/// Records eligible for `demand`, ordered by provider, price, then type
pub fn eligible_candidates<'a>(
    demand: &ResourceDemand,
    catalog: &'a CatalogStore,
) -> Vec<&'a InstanceRecord> {
    let discounts = catalog.discounts();

    let mut candidates: Vec<&InstanceRecord> = catalog
        .records()
        .iter()
        .filter(|record| {
            record.region == demand.region
                && record.operating_system == demand.operating_system
                && record.architecture == demand.architecture
        })
        .filter(|record| {
            let supported = discounts.contains(&discount_key(record, demand));
            if !supported {
                debug!(
                    "{} {} not sold as {} for {} months",
                    record.provider, record.instance_type, demand.purchase_type, demand.commitment_months
                );
            }
            supported
        })
        .filter(|record| {
            let contributes = demand
                .per_instance
                .requested()
                .any(|dim| record.capacity.get(dim) > 0.0);
            if !contributes {
                debug!(
                    "{} {} has no capacity in any requested dimension",
                    record.provider, record.instance_type
                );
            }
            contributes
        })
        .collect();

    candidates.sort_by(|a, b| compare_candidates(a, b));

    debug!(
        "{} of {} catalog records eligible for {} {} {}",
        candidates.len(),
        catalog.records().len(),
        demand.region,
        demand.operating_system,
        demand.architecture
    );

    candidates
}

fn compare_candidates(a: &InstanceRecord, b: &InstanceRecord) -> Ordering {
    a.provider
        .cmp(&b.provider)
        .then_with(|| a.base_price.total_cmp(&b.base_price))
        .then_with(|| a.instance_type.cmp(&b.instance_type))
}
