//! Optimizer entry point
//!
//! Runs the whole pipeline for one request:
//!
//! ```text
//! demand -> eligible candidates -> composition search (priced) -> offers
//! ```
//!
//! The catalog is borrowed and never mutated, so any number of requests may
//! run against one `CatalogStore` at the same time.

use crate::catalog::CatalogStore;
use crate::demand::{normalize, RawDemand, ResourceDemand};
use crate::error::Result;
use crate::filter::eligible_candidates;
use crate::offers::{Offer, OfferCollector};
use crate::search::{CompositionSearch, SearchOptions};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Every distinct fleet that satisfies `demand`, in discovery order
///
/// An empty vector means nothing in the catalog fits; it is not an error.
pub fn compute_offers(
    demand: &ResourceDemand,
    catalog: &CatalogStore,
    options: &SearchOptions,
    cancel: Option<&CancellationToken>,
) -> Result<Vec<Offer>> {
    demand.validate()?;

    let candidates = eligible_candidates(demand, catalog);
    if candidates.is_empty() {
        info!(
            "No eligible instances for {} {} {}",
            demand.region, demand.operating_system, demand.architecture
        );
        return Ok(Vec::new());
    }

    let priced = CompositionSearch::new(demand, &candidates, catalog.discounts(), options)
        .with_cancellation(cancel)
        .run()?;

    let mut collector = OfferCollector::new();
    collector.extend(priced);
    let offers = collector.finish();

    info!(
        "{} offers from {} candidates in {}",
        offers.len(),
        candidates.len(),
        demand.region
    );
    Ok(offers)
}

/// Normalize `raw` against the catalog's discounts, then compute offers
pub fn compute_offers_from_raw(
    raw: &RawDemand,
    catalog: &CatalogStore,
    options: &SearchOptions,
    cancel: Option<&CancellationToken>,
) -> Result<Vec<Offer>> {
    let demand = normalize(raw, catalog.discounts())?;
    compute_offers(&demand, catalog, options, cancel)
}
