//! Offer collection
//!
//! Turns priced compositions into read-only [`Offer`]s, dropping
//! compositions that resolve to the same (provider, instance_type, count)
//! multiset. The collector keeps insertion order; sorting is left to callers
//! through [`rank_offers`].

use crate::catalog::InstanceRecord;
use crate::pricing::BillingType;
use crate::search::{CompositionKey, FleetComposition, FleetEntry, PricedComposition};
use crate::types::{Provider, Resources};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// One line of an offer: an instance type, its count and its price
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OfferLine {
    #[serde(flatten)]
    pub record: InstanceRecord,
    pub count: u32,
    /// Expected hourly cost of one instance
    pub unit_price: f64,
    pub subtotal: f64,
}

/// A priced fleet that satisfies the demand
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Offer {
    pub fleet_composition: Vec<OfferLine>,
    /// Hourly
    pub total_price: f64,
    pub billing_type: BillingType,
    pub provider_mix: BTreeSet<Provider>,
}

impl Offer {
    fn from_priced(priced: PricedComposition) -> Self {
        let PricedComposition { composition, quote } = priced;
        let fleet_composition: Vec<OfferLine> = composition
            .entries()
            .iter()
            .zip(quote.lines.iter())
            .map(|(entry, line)| OfferLine {
                record: entry.record.clone(),
                count: entry.count,
                unit_price: line.unit_price,
                subtotal: line.subtotal,
            })
            .collect();
        let provider_mix = fleet_composition
            .iter()
            .map(|line| line.record.provider)
            .collect();

        Offer {
            fleet_composition,
            total_price: quote.total_price,
            billing_type: quote.billing_type,
            provider_mix,
        }
    }

    /// The composition this offer prices
    pub fn composition(&self) -> FleetComposition {
        FleetComposition::new(
            self.fleet_composition
                .iter()
                .map(|line| FleetEntry {
                    record: line.record.clone(),
                    count: line.count,
                })
                .collect(),
        )
    }

    pub fn total_instances(&self) -> u64 {
        self.fleet_composition
            .iter()
            .map(|line| u64::from(line.count))
            .sum()
    }

    /// Σ capacity × count
    pub fn aggregate_capacity(&self) -> Resources {
        self.composition().aggregate_capacity()
    }

    pub fn is_mixed(&self) -> bool {
        self.fleet_composition.len() > 1
    }
}

/// Collects offers, keeping the first of any duplicate composition
#[derive(Debug, Default)]
pub struct OfferCollector {
    seen: HashSet<CompositionKey>,
    offers: Vec<Offer>,
}

impl OfferCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a priced composition; returns false when it was a duplicate
    pub fn push(&mut self, priced: PricedComposition) -> bool {
        let key = priced.composition.key();
        if !self.seen.insert(key) {
            debug!("Dropping duplicate composition");
            return false;
        }
        self.offers.push(Offer::from_priced(priced));
        true
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }

    pub fn finish(self) -> Vec<Offer> {
        self.offers
    }
}

impl Extend<PricedComposition> for OfferCollector {
    fn extend<I: IntoIterator<Item = PricedComposition>>(&mut self, iter: I) {
        for priced in iter {
            self.push(priced);
        }
    }
}

/// Price ascending; ties go to fewer instances, then smaller provider/type names
pub fn compare_offers(a: &Offer, b: &Offer) -> Ordering {
    a.total_price
        .total_cmp(&b.total_price)
        .then_with(|| a.total_instances().cmp(&b.total_instances()))
        .then_with(|| name_key(a).cmp(&name_key(b)))
}

fn name_key(offer: &Offer) -> Vec<(Provider, &str)> {
    let mut names: Vec<(Provider, &str)> = offer
        .fleet_composition
        .iter()
        .map(|line| (line.record.provider, line.record.instance_type.as_str()))
        .collect();
    names.sort();
    names
}

/// Sort offers cheapest first
pub fn rank_offers(offers: &mut [Offer]) {
    offers.sort_by(compare_offers);
}
