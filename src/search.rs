//! Composition search
//!
//! Finds fleets that cover a demand in every requested dimension.
//!
//! ## Homogeneous fleets
//!
//! For every candidate record the smallest count that covers the fleet-wide
//! requirement on its own:
//!
//! ```text
//! count = ceil(max over requested d of required_total[d] / capacity[d])
//! ```
//!
//! A record with zero capacity in a requested dimension cannot cover the
//! demand alone and yields no homogeneous fleet.
//!
//! ## Two-type mixes
//!
//! The anchor is the candidate with the lowest discounted price per vCPU.
//! It is paired once with every other candidate: the cheaper-per-vCPU type
//! of the pair takes as many instances as it can without covering the
//! demand alone, and the other type tops up whatever remains. A mix is kept
//! only when it is strictly cheaper than the best homogeneous fleet of
//! either member, so the search stays at O(n) homogeneous plus O(n) paired
//! evaluations.
//!
//! A composition that cannot be priced is logged and skipped; it never
//! aborts the rest of the search.
//!
//! The optional cancellation token is checked before every evaluation; a
//! cancelled search returns `FleetError::Cancelled` and discards its work.

use crate::catalog::{DiscountSchedule, InstanceRecord};
use crate::demand::ResourceDemand;
use crate::error::{FleetError, Result};
use crate::pricing::{price_composition, unit_price, Quote};
use crate::types::{Provider, Resources};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Slack applied before flooring a ratio to a whole instance count
const RATIO_TOLERANCE: f64 = 1e-9;

/// One instance type and how many of it
#[derive(Debug, Clone, PartialEq)]
pub struct FleetEntry {
    pub record: InstanceRecord,
    pub count: u32,
}

/// Dedup identity: sorted (provider, instance_type, count) triples
pub type CompositionKey = Vec<(Provider, String, u32)>;

/// Instance types and counts provisioned together
#[derive(Debug, Clone, PartialEq)]
pub struct FleetComposition {
    entries: Vec<FleetEntry>,
}

impl FleetComposition {
    /// Entries with a zero count are dropped
    pub fn new(entries: Vec<FleetEntry>) -> Self {
        Self {
            entries: entries.into_iter().filter(|e| e.count > 0).collect(),
        }
    }

    pub fn homogeneous(record: InstanceRecord, count: u32) -> Self {
        Self::new(vec![FleetEntry { record, count }])
    }

    pub fn entries(&self) -> &[FleetEntry] {
        &self.entries
    }

    pub fn is_homogeneous(&self) -> bool {
        self.entries.len() == 1
    }

    pub fn total_instances(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.count)).sum()
    }

    /// Σ capacity × count
    pub fn aggregate_capacity(&self) -> Resources {
        self.entries
            .iter()
            .fold(Resources::default(), |acc, e| {
                acc.plus(&e.record.capacity.scaled(f64::from(e.count)))
            })
    }

    pub fn covers(&self, required: &Resources) -> bool {
        self.aggregate_capacity().covers(required)
    }

    pub fn key(&self) -> CompositionKey {
        let mut key: CompositionKey = self
            .entries
            .iter()
            .map(|e| (e.record.provider, e.record.instance_type.clone(), e.count))
            .collect();
        key.sort();
        key
    }
}

/// Search tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Evaluate two-type mixes around the cheapest-per-vCPU anchor
    pub mixed_compositions: bool,
    /// Drop compositions with more instances than this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_instances_per_offer: Option<u32>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            mixed_compositions: true,
            max_instances_per_offer: None,
        }
    }
}

/// A composition with its price
#[derive(Debug, Clone)]
pub struct PricedComposition {
    pub composition: FleetComposition,
    pub quote: Quote,
}

/// Smallest count of `record` covering `amount` in every dimension
///
/// `None` when the record lacks a needed dimension, or nothing is needed.
pub fn count_to_cover(amount: &Resources, record: &InstanceRecord) -> Option<u32> {
    let mut max = 0;
    for dim in amount.requested() {
        let capacity = record.capacity.get(dim);
        if capacity <= 0.0 {
            return None;
        }
        max = max.max(dimension_count(amount.get(dim), capacity)?);
    }
    match max {
        0 => None,
        count => Some(count),
    }
}

/// Smallest `n` with `capacity * n >= need`, checked with the same product
/// `Resources::scaled` computes, so the result always passes `covers`.
fn dimension_count(need: f64, capacity: f64) -> Option<u32> {
    let mut count = (need / capacity).ceil();
    if !count.is_finite() || count > f64::from(u32::MAX) {
        return None;
    }
    // The quotient can be off by an ulp either way
    if count >= 1.0 && capacity * (count - 1.0) >= need {
        count -= 1.0;
    }
    if capacity * count < need {
        count += 1.0;
    }
    if count > f64::from(u32::MAX) {
        return None;
    }
    Some(count as u32)
}

/// Largest ratio of need to capacity over dimensions with a need
///
/// Dimensions the record has no capacity for are ignored.
fn max_ratio_present(amount: &Resources, record: &InstanceRecord) -> f64 {
    amount
        .requested()
        .filter(|dim| record.capacity.get(*dim) > 0.0)
        .map(|dim| amount.get(dim) / record.capacity.get(dim))
        .fold(0.0, f64::max)
}

fn floor_count(ratio: f64) -> Option<u32> {
    let count = (ratio + RATIO_TOLERANCE).floor().max(0.0);
    if !count.is_finite() || count > f64::from(u32::MAX) {
        return None;
    }
    Some(count as u32)
}

/// Counts for a two-type mix, cheaper type first
///
/// The first type takes one fewer than it would need alone (or, when it
/// cannot cover the demand alone, as many as fit under its largest ratio);
/// the second covers the exact remainder. `None` when either count would be
/// zero or the second type cannot cover what is left.
pub fn mixed_allocation(
    required: &Resources,
    first: &InstanceRecord,
    second: &InstanceRecord,
) -> Option<(u32, u32)> {
    let first_count = match count_to_cover(required, first) {
        Some(alone) => alone - 1,
        None => floor_count(max_ratio_present(required, first))?,
    };
    if first_count == 0 {
        return None;
    }

    let provided = first.capacity.scaled(f64::from(first_count));
    let remainder = required.shortfall(&provided);
    let mut second_count = count_to_cover(&remainder, second)?;

    // required - provided is rounded, so the sum can still fall an ulp short
    let covered = |count: u32| {
        provided
            .plus(&second.capacity.scaled(f64::from(count)))
            .covers(required)
    };
    if !covered(second_count) {
        second_count = second_count.checked_add(1)?;
        if !covered(second_count) {
            return None;
        }
    }
    Some((first_count, second_count))
}

/// One request's search over its candidate records
pub struct CompositionSearch<'a> {
    demand: &'a ResourceDemand,
    candidates: &'a [&'a InstanceRecord],
    schedule: &'a DiscountSchedule,
    options: &'a SearchOptions,
    cancel: Option<&'a CancellationToken>,
}

impl<'a> CompositionSearch<'a> {
    pub fn new(
        demand: &'a ResourceDemand,
        candidates: &'a [&'a InstanceRecord],
        schedule: &'a DiscountSchedule,
        options: &'a SearchOptions,
    ) -> Self {
        Self {
            demand,
            candidates,
            schedule,
            options,
            cancel: None,
        }
    }

    pub fn with_cancellation(mut self, cancel: Option<&'a CancellationToken>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Homogeneous fleets first, in candidate order, then retained mixes
    pub fn run(&self) -> Result<Vec<PricedComposition>> {
        let required = self.demand.required_totals();
        let mut results = Vec::new();
        let mut homogeneous_prices: Vec<Option<f64>> = vec![None; self.candidates.len()];

        for (idx, record) in self.candidates.iter().enumerate() {
            self.check_cancelled()?;

            let Some(count) = count_to_cover(&required, record) else {
                debug!(
                    "{} {} cannot cover the demand on its own",
                    record.provider, record.instance_type
                );
                continue;
            };

            let composition = FleetComposition::homogeneous((*record).clone(), count);
            if !self.within_cap(&composition) {
                continue;
            }
            debug_assert!(composition.covers(&required));

            let quote = match price_composition(&composition, self.demand, self.schedule) {
                Ok(quote) => quote,
                Err(e) => {
                    warn!(
                        "Dropping {} x {}: {}",
                        count, record.instance_type, e
                    );
                    continue;
                }
            };
            homogeneous_prices[idx] = Some(quote.total_price);
            results.push(PricedComposition { composition, quote });
        }

        let homogeneous = results.len();

        if self.options.mixed_compositions && self.candidates.len() >= 2 {
            self.search_mixed(&required, &homogeneous_prices, &mut results)?;
        }

        info!(
            "Search found {} homogeneous and {} mixed compositions from {} candidates",
            homogeneous,
            results.len() - homogeneous,
            self.candidates.len()
        );

        Ok(results)
    }

    fn search_mixed(
        &self,
        required: &Resources,
        homogeneous_prices: &[Option<f64>],
        results: &mut Vec<PricedComposition>,
    ) -> Result<()> {
        let per_vcpu: Vec<Option<f64>> = self
            .candidates
            .iter()
            .map(|record| self.price_per_vcpu(record))
            .collect();

        let Some(anchor_idx) = self.select_anchor(&per_vcpu) else {
            debug!("No candidate has a vCPU price; skipping mixed compositions");
            return Ok(());
        };
        let anchor = self.candidates[anchor_idx];
        debug!("Mix anchor: {} {}", anchor.provider, anchor.instance_type);

        for (idx, partner) in self.candidates.iter().enumerate() {
            if idx == anchor_idx {
                continue;
            }
            self.check_cancelled()?;

            let (first, second) =
                match compare_per_vcpu(per_vcpu[anchor_idx], anchor, per_vcpu[idx], partner) {
                    Ordering::Greater => (*partner, anchor),
                    _ => (anchor, *partner),
                };

            let Some((first_count, second_count)) = mixed_allocation(required, first, second)
            else {
                continue;
            };

            let composition = FleetComposition::new(vec![
                FleetEntry {
                    record: first.clone(),
                    count: first_count,
                },
                FleetEntry {
                    record: second.clone(),
                    count: second_count,
                },
            ]);
            if !self.within_cap(&composition) {
                continue;
            }
            debug_assert!(composition.covers(required));

            let quote = match price_composition(&composition, self.demand, self.schedule) {
                Ok(quote) => quote,
                Err(e) => {
                    warn!(
                        "Dropping mix {} + {}: {}",
                        first.instance_type, second.instance_type, e
                    );
                    continue;
                }
            };

            let baseline = [homogeneous_prices[anchor_idx], homogeneous_prices[idx]]
                .into_iter()
                .flatten()
                .min_by(|a, b| a.total_cmp(b));

            if let Some(baseline) = baseline {
                if quote.total_price >= baseline {
                    debug!(
                        "Mix {}x{} + {}x{} at {:.4} not cheaper than {:.4}",
                        first_count,
                        first.instance_type,
                        second_count,
                        second.instance_type,
                        quote.total_price,
                        baseline
                    );
                    continue;
                }
            }

            results.push(PricedComposition { composition, quote });
        }

        Ok(())
    }

    /// Discounted hourly price per vCPU; `None` without vCPUs or a discount
    fn price_per_vcpu(&self, record: &InstanceRecord) -> Option<f64> {
        if record.capacity.vcpu <= 0.0 {
            return None;
        }
        unit_price(record, self.demand, self.schedule)
            .ok()
            .map(|price| price / record.capacity.vcpu)
    }

    fn select_anchor(&self, per_vcpu: &[Option<f64>]) -> Option<usize> {
        (0..self.candidates.len())
            .filter(|idx| per_vcpu[*idx].is_some())
            .min_by(|a, b| {
                compare_per_vcpu(
                    per_vcpu[*a],
                    self.candidates[*a],
                    per_vcpu[*b],
                    self.candidates[*b],
                )
            })
    }

    fn within_cap(&self, composition: &FleetComposition) -> bool {
        match self.options.max_instances_per_offer {
            Some(cap) if composition.total_instances() > u64::from(cap) => {
                debug!(
                    "Skipping composition of {} instances (cap {})",
                    composition.total_instances(),
                    cap
                );
                false
            }
            _ => true,
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        match self.cancel {
            Some(token) if token.is_cancelled() => {
                info!("Composition search cancelled");
                Err(FleetError::Cancelled)
            }
            _ => Ok(()),
        }
    }
}

/// Cheaper per vCPU first; a missing price sorts last; ties by provider then type
fn compare_per_vcpu(
    a_price: Option<f64>,
    a: &InstanceRecord,
    b_price: Option<f64>,
    b: &InstanceRecord,
) -> Ordering {
    let a_price = a_price.unwrap_or(f64::INFINITY);
    let b_price = b_price.unwrap_or(f64::INFINITY);
    a_price
        .total_cmp(&b_price)
        .then_with(|| a.provider.cmp(&b.provider))
        .then_with(|| a.instance_type.cmp(&b.instance_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DiscountKey;
    use crate::types::{Architecture, Dimension, OperatingSystem, PurchaseType};

    fn record(instance_type: &str, capacity: Resources, price: f64) -> InstanceRecord {
        InstanceRecord {
            provider: Provider::Aws,
            instance_type: instance_type.to_string(),
            region: "us-east-1".to_string(),
            operating_system: OperatingSystem::Linux,
            architecture: Architecture::X86_64,
            capacity,
            base_price: price,
        }
    }

    fn cpu_mem(vcpu: f64, memory: f64) -> Resources {
        Resources {
            vcpu,
            memory,
            ..Default::default()
        }
    }

    fn demand(per_instance: Resources, instance_count: u32) -> ResourceDemand {
        ResourceDemand {
            region: "us-east-1".to_string(),
            operating_system: OperatingSystem::Linux,
            architecture: Architecture::X86_64,
            per_instance,
            instance_count,
            commitment_months: 0,
            utilization: 1.0,
            purchase_type: PurchaseType::OnDemand,
        }
    }

    fn on_demand_schedule() -> DiscountSchedule {
        let mut schedule = DiscountSchedule::new();
        schedule
            .insert(
                DiscountKey {
                    provider: Provider::Aws,
                    operating_system: OperatingSystem::Linux,
                    purchase_type: PurchaseType::OnDemand,
                    commitment_months: 0,
                },
                1.0,
            )
            .unwrap();
        schedule
    }

    #[test]
    fn test_count_to_cover_ceils_aggregate_demand() {
        let required = demand(cpu_mem(2.0, 1.0), 3).required_totals();
        let r = record("m5.xlarge", cpu_mem(4.0, 16.0), 0.192);
        assert_eq!(count_to_cover(&required, &r), Some(2));
    }

    #[test]
    fn test_count_to_cover_exact_fit_is_not_rounded_up() {
        let required = cpu_mem(0.3, 0.0).scaled(10.0);
        let r = record("tiny", cpu_mem(0.1, 1.0), 0.01);
        assert_eq!(count_to_cover(&required, &r), Some(30));
    }

    #[test]
    fn test_count_to_cover_missing_dimension() {
        let required = Resources {
            vcpu: 4.0,
            memory: 16.0,
            storage: 100.0,
            ..Default::default()
        };
        let r = record("m5.xlarge", cpu_mem(4.0, 16.0), 0.192);
        assert_eq!(count_to_cover(&required, &r), None);
    }

    #[test]
    fn test_mixed_allocation_tops_up_with_second_type() {
        let required = cpu_mem(10.0, 40.0);
        let big = record("m5.2xlarge", cpu_mem(8.0, 32.0), 0.384);
        let small = record("m5.large", cpu_mem(2.0, 8.0), 0.096);
        assert_eq!(mixed_allocation(&required, &big, &small), Some((1, 1)));
    }

    #[test]
    fn test_mixed_allocation_covers_missing_dimension() {
        let required = Resources {
            vcpu: 8.0,
            memory: 32.0,
            storage: 100.0,
            ..Default::default()
        };
        let compute = record("m5.xlarge", cpu_mem(4.0, 16.0), 0.192);
        let storage = record(
            "i3.large",
            Resources {
                vcpu: 2.0,
                memory: 15.0,
                storage: 475.0,
                ..Default::default()
            },
            0.156,
        );
        assert_eq!(mixed_allocation(&required, &compute, &storage), Some((2, 1)));
    }

    #[test]
    fn test_mixed_allocation_single_unit_demand() {
        let required = cpu_mem(2.0, 8.0);
        let a = record("m5.large", cpu_mem(2.0, 8.0), 0.096);
        let b = record("c5.large", cpu_mem(2.0, 4.0), 0.085);
        assert_eq!(mixed_allocation(&required, &a, &b), None);
    }

    #[test]
    fn test_run_keeps_only_cheaper_mix() {
        // 10 vCPU: 2x big = 0.75, 5x small = 0.46875, 1 big + 1 small = 0.46875 (a tie)
        let big = record("m5.2xlarge", cpu_mem(8.0, 32.0), 0.375);
        let small = record("m5.large", cpu_mem(2.0, 8.0), 0.09375);
        let candidates = vec![&small, &big];
        let d = demand(cpu_mem(10.0, 10.0), 1);
        let schedule = on_demand_schedule();
        let options = SearchOptions::default();

        let results = CompositionSearch::new(&d, &candidates, &schedule, &options)
            .run()
            .unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.composition.is_homogeneous()));
    }

    #[test]
    fn test_run_retains_strictly_cheaper_mix() {
        // 10 vCPU: big covers 8 for 0.30 (2x = 0.60), small 2 vCPU for 0.10 (5x = 0.50),
        // 1 big + 1 small = 0.40
        let big = record("big", cpu_mem(8.0, 8.0), 0.30);
        let small = record("small", cpu_mem(2.0, 2.0), 0.10);
        let candidates = vec![&small, &big];
        let d = demand(cpu_mem(10.0, 10.0), 1);
        let schedule = on_demand_schedule();
        let options = SearchOptions::default();

        let results = CompositionSearch::new(&d, &candidates, &schedule, &options)
            .run()
            .unwrap();
        let mixes: Vec<_> = results
            .iter()
            .filter(|r| !r.composition.is_homogeneous())
            .collect();
        assert_eq!(mixes.len(), 1);
        assert!((mixes[0].quote.total_price - 0.40).abs() < 1e-9);
        assert!(mixes[0].composition.covers(&d.required_totals()));
    }

    #[test]
    fn test_run_respects_instance_cap() {
        let small = record("m5.large", cpu_mem(2.0, 8.0), 0.096);
        let candidates = vec![&small];
        let d = demand(cpu_mem(2.0, 8.0), 10);
        let schedule = on_demand_schedule();
        let options = SearchOptions {
            mixed_compositions: true,
            max_instances_per_offer: Some(5),
        };

        let results = CompositionSearch::new(&d, &candidates, &schedule, &options)
            .run()
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_cancelled_search_returns_no_partial_result() {
        let small = record("m5.large", cpu_mem(2.0, 8.0), 0.096);
        let candidates = vec![&small];
        let d = demand(cpu_mem(2.0, 8.0), 1);
        let schedule = on_demand_schedule();
        let options = SearchOptions::default();
        let token = CancellationToken::new();
        token.cancel();

        let result = CompositionSearch::new(&d, &candidates, &schedule, &options)
            .with_cancellation(Some(&token))
            .run();
        assert!(matches!(result, Err(FleetError::Cancelled)));
    }

    /// Every dimension of the aggregate at or above the requirement, no slack
    fn covers_exactly(composition: &FleetComposition, required: &Resources) -> bool {
        let aggregate = composition.aggregate_capacity();
        Dimension::ALL
            .into_iter()
            .all(|dim| aggregate.get(dim) >= required.get(dim))
    }

    #[test]
    fn test_mix_tops_up_fractional_remainder() {
        let cpu = record("cpu", cpu_mem(4.0, 16.0), 0.192);
        let disk = record(
            "disk",
            Resources {
                memory: 1.0,
                storage: 1000.0,
                ..Default::default()
            },
            0.05,
        );
        let candidates = vec![&cpu, &disk];
        let d = demand(
            Resources {
                vcpu: 4.0,
                memory: 16.00001,
                storage: 10.0,
                ..Default::default()
            },
            100,
        );
        let schedule = on_demand_schedule();
        let options = SearchOptions::default();

        let results = CompositionSearch::new(&d, &candidates, &schedule, &options)
            .run()
            .unwrap();
        assert_eq!(results.len(), 1);
        let counts: Vec<_> = results[0]
            .composition
            .entries()
            .iter()
            .map(|e| (e.record.instance_type.as_str(), e.count))
            .collect();
        assert_eq!(counts, vec![("cpu", 100), ("disk", 1)]);
        assert!(covers_exactly(&results[0].composition, &d.required_totals()));
    }

    #[test]
    fn test_mix_rejected_when_partner_lacks_remaining_dimension() {
        let cpu = record("cpu", cpu_mem(4.0, 16.0), 0.192);
        let disk = record(
            "disk",
            Resources {
                storage: 1000.0,
                ..Default::default()
            },
            0.05,
        );
        let candidates = vec![&cpu, &disk];
        let d = demand(
            Resources {
                vcpu: 4.0,
                memory: 16.00001,
                storage: 10.0,
                ..Default::default()
            },
            100,
        );
        let schedule = on_demand_schedule();
        let options = SearchOptions::default();

        let results = CompositionSearch::new(&d, &candidates, &schedule, &options)
            .run()
            .unwrap();
        assert!(results
            .iter()
            .all(|r| covers_exactly(&r.composition, &d.required_totals())));
        assert!(results.is_empty());
    }

    #[test]
    fn test_count_to_cover_fractional_demand_is_exact() {
        let required = Resources {
            vcpu: 4.0,
            memory: 16.00001,
            ..Default::default()
        }
        .scaled(100.0);
        let r = record("m5.xlarge", cpu_mem(4.0, 16.0), 0.192);
        let count = count_to_cover(&required, &r).unwrap();
        assert_eq!(count, 101);
        assert!(covers_exactly(
            &FleetComposition::homogeneous(r, count),
            &required
        ));
    }

    #[test]
    fn test_unpriced_candidate_is_skipped_not_fatal() {
        let priced = record("m5.large", cpu_mem(2.0, 8.0), 0.096);
        let mut unpriced = record("D2s_v5", cpu_mem(2.0, 8.0), 0.096);
        unpriced.provider = Provider::Azure;
        let candidates = vec![&priced, &unpriced];
        let d = demand(cpu_mem(2.0, 8.0), 1);
        let schedule = on_demand_schedule();
        let options = SearchOptions::default();

        let results = CompositionSearch::new(&d, &candidates, &schedule, &options)
            .run()
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].composition.entries()[0].record.instance_type, "m5.large");
    }

    #[test]
    fn test_composition_key_is_order_independent() {
        let a = record("a", cpu_mem(1.0, 1.0), 0.1);
        let b = record("b", cpu_mem(1.0, 1.0), 0.1);
        let ab = FleetComposition::new(vec![
            FleetEntry { record: a.clone(), count: 1 },
            FleetEntry { record: b.clone(), count: 2 },
        ]);
        let ba = FleetComposition::new(vec![
            FleetEntry { record: b, count: 2 },
            FleetEntry { record: a, count: 1 },
        ]);
        assert_eq!(ab.key(), ba.key());
        assert_eq!(ab.total_instances(), 3);
    }
}
