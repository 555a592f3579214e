//! CLI command handlers
//!
//! Every handler loads the catalog once, runs the optimizer and prints either
//! a human summary or pretty JSON depending on `--output`.

use crate::catalog::{CatalogStore, JsonCatalogSource};
use crate::config::Config;
use crate::demand::RawDemand;
use crate::error::FleetError;
use crate::offers::{rank_offers, Offer};
use crate::optimizer::compute_offers_from_raw;
use crate::search::SearchOptions;
use crate::utils::{ensure_parent_dir, format_price, format_timestamp, monthly_cost};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use comfy_table::{Cell, Color, Table};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Demand fields for `fleetctl offers`
///
/// Values stay as text here; the normalizer owns parsing so that the CLI
/// and batch files report identical validation errors.
#[derive(Args, Debug, Clone)]
pub struct DemandArgs {
    /// Region code, e.g. us-east-1 or eastus
    #[arg(long)]
    pub region: String,
    /// Linux or Windows
    #[arg(long, default_value = "Linux")]
    pub os: String,
    /// x86_64 or arm64
    #[arg(long)]
    pub arch: Option<String>,
    /// vCPUs per instance
    #[arg(long)]
    pub vcpu: String,
    /// Memory per instance (GiB)
    #[arg(long)]
    pub memory: String,
    /// Storage per instance (GB)
    #[arg(long)]
    pub storage: String,
    #[arg(long)]
    pub iops: Option<String>,
    /// Network bandwidth per instance (Mbps)
    #[arg(long)]
    pub bandwidth: Option<String>,
    /// Number of instances the workload needs
    #[arg(long, default_value = "1")]
    pub instances: String,
    /// Commitment term: months (12) or years (1y, 3yr)
    #[arg(long)]
    pub commitment: Option<String>,
    /// Expected utilization in (0, 1]
    #[arg(long)]
    pub utilization: Option<String>,
    /// On-Demand, Reserved or Spot
    #[arg(long = "purchase-type")]
    pub purchase_type: Option<String>,
}

impl From<DemandArgs> for RawDemand {
    fn from(args: DemandArgs) -> Self {
        RawDemand {
            region: Some(args.region),
            os: Some(args.os),
            architecture: args.arch,
            vcpu: Some(args.vcpu),
            memory: Some(args.memory),
            storage: Some(args.storage),
            iops: args.iops,
            bandwidth: args.bandwidth,
            instances: Some(args.instances),
            commitment: args.commitment,
            utilization: args.utilization,
            purchase_type: args.purchase_type,
        }
    }
}

/// Search overrides shared by `offers` and `batch`
#[derive(Args, Debug, Clone, Default)]
pub struct SearchArgs {
    /// Catalog directory (overrides [catalog].dir)
    #[arg(long)]
    pub catalog_dir: Option<PathBuf>,
    /// Only consider single-type fleets
    #[arg(long)]
    pub no_mixed: bool,
    /// Drop fleets with more instances than this
    #[arg(long)]
    pub max_instances: Option<u32>,
}

impl SearchArgs {
    pub fn options(&self, config: &Config) -> SearchOptions {
        let mut options = config.search.clone();
        if self.no_mixed {
            options.mixed_compositions = false;
        }
        if let Some(cap) = self.max_instances {
            options.max_instances_per_offer = Some(cap);
        }
        options
    }

    pub fn catalog_dir<'a>(&'a self, config: &'a Config) -> &'a Path {
        self.catalog_dir.as_deref().unwrap_or(&config.catalog.dir)
    }
}

pub fn load_catalog(dir: &Path, config: &Config) -> Result<CatalogStore> {
    let source = JsonCatalogSource::new(dir);
    let store = CatalogStore::from_source(&source, &config.catalog.providers)
        .with_context(|| format!("Failed to load catalog from {}", dir.display()))?;
    if store.records().is_empty() {
        warn!(
            "Catalog at {} has no instance records; every request will return no offers",
            dir.display()
        );
    }
    Ok(store)
}

pub fn handle_offers(
    demand: DemandArgs,
    search: SearchArgs,
    top: Option<usize>,
    save: Option<Option<PathBuf>>,
    config: &Config,
    output_format: &str,
) -> Result<()> {
    let catalog = load_catalog(search.catalog_dir(config), config)?;
    let options = search.options(config);

    let mut offers = compute_offers_from_raw(&demand.into(), &catalog, &options, None)?;
    rank_offers(&mut offers);

    if let Some(path) = save {
        let path = path
            .or_else(|| config.output.results_file.clone())
            .context("No output path given and [output].results_file is not set")?;
        save_json(&path, &offers)?;
        info!("Saved {} offers to {}", offers.len(), path.display());
    }

    let shown = &offers[..top.unwrap_or(offers.len()).min(offers.len())];
    if output_format == "json" {
        println!("{}", serde_json::to_string_pretty(shown)?);
    } else if offers.is_empty() {
        println!("No fleet in the catalog satisfies this demand.");
    } else {
        println!("{} offers (showing {}):", offers.len(), shown.len());
        for (rank, offer) in shown.iter().enumerate() {
            print_offer(rank + 1, offer);
        }
    }
    Ok(())
}

fn print_offer(rank: usize, offer: &Offer) {
    let providers: Vec<String> = offer.provider_mix.iter().map(|p| p.to_string()).collect();
    println!(
        "\n#{} {} ({:.2}/month) {} [{}]",
        rank,
        format_price(offer.total_price),
        monthly_cost(offer.total_price),
        offer.billing_type,
        providers.join(" + ")
    );
    println!("{}", offer_table(offer));
}

/// One row per composition line
pub fn offer_table(offer: &Offer) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        "Provider",
        "Instance type",
        "Count",
        "vCPU",
        "Memory (GiB)",
        "Storage (GB)",
        "Price",
        "Billing type",
    ]);

    for line in &offer.fleet_composition {
        table.add_row(vec![
            Cell::new(line.record.provider),
            Cell::new(&line.record.instance_type),
            Cell::new(line.count),
            Cell::new(line.record.capacity.vcpu),
            Cell::new(line.record.capacity.memory),
            Cell::new(line.record.capacity.storage),
            Cell::new(format_price(line.unit_price)),
            Cell::new(offer.billing_type),
        ]);
    }
    table
}

fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    ensure_parent_dir(path)?;
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Outcome of one batch request
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Ok { offers: Vec<Offer> },
    Error { kind: &'static str, message: String },
}

#[derive(Debug, Serialize)]
pub struct BatchResult {
    pub index: usize,
    #[serde(flatten)]
    pub outcome: BatchOutcome,
}

#[derive(Debug, Serialize)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    pub catalog_loaded_at: DateTime<Utc>,
    pub results: Vec<BatchResult>,
}

impl BatchReport {
    pub fn failures(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, BatchOutcome::Error { .. }))
            .count()
    }
}

fn error_kind(err: &FleetError) -> &'static str {
    match err {
        FleetError::Validation { .. } => "validation",
        FleetError::Pricing { .. } => "pricing",
        FleetError::Cancelled => "cancelled",
        FleetError::Catalog { .. } => "catalog",
        FleetError::Config(_) => "config",
        FleetError::Io(_) | FleetError::Json(_) => "io",
    }
}

/// One row per request: status, offer count and best price or error
pub fn batch_table(report: &BatchReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["#", "Status", "Offers", "Best price / error"]);

    for result in &report.results {
        let row = match &result.outcome {
            BatchOutcome::Ok { offers } => vec![
                Cell::new(result.index),
                Cell::new("ok").fg(Color::Green),
                Cell::new(offers.len()),
                Cell::new(
                    offers
                        .first()
                        .map(|best| format_price(best.total_price))
                        .unwrap_or_else(|| "-".to_string()),
                ),
            ],
            BatchOutcome::Error { kind, message } => vec![
                Cell::new(result.index),
                Cell::new(kind).fg(Color::Red),
                Cell::new("-"),
                Cell::new(message),
            ],
        };
        table.add_row(row);
    }
    table
}

/// Read a JSON array of requests
pub fn read_batch_file(path: &Path) -> Result<Vec<RawDemand>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| {
        format!(
            "Failed to parse batch file: {}\n  Expected a JSON array of request objects",
            path.display()
        )
    })
}

/// Evaluate every request in parallel against one shared catalog
///
/// When `timeout` elapses the shared token is cancelled; requests still
/// searching report `cancelled`, finished ones keep their offers.
pub async fn run_batch(
    requests: Vec<RawDemand>,
    catalog: Arc<CatalogStore>,
    options: SearchOptions,
    timeout: Option<Duration>,
) -> Result<BatchReport> {
    let cancel = CancellationToken::new();
    let options = Arc::new(options);

    let deadline = timeout.map(|limit| {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            warn!("Batch deadline of {:?} reached; cancelling remaining searches", limit);
            cancel.cancel();
        })
    });

    let handles: Vec<_> = requests
        .into_iter()
        .map(|raw| {
            let catalog = Arc::clone(&catalog);
            let options = Arc::clone(&options);
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || {
                let mut result = compute_offers_from_raw(&raw, &catalog, &options, Some(&cancel));
                if let Ok(offers) = result.as_mut() {
                    rank_offers(offers);
                }
                result
            })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (index, handle) in handles.into_iter().enumerate() {
        let outcome = match handle
            .await
            .with_context(|| format!("Batch request {} panicked", index))?
        {
            Ok(offers) => BatchOutcome::Ok { offers },
            Err(err) => BatchOutcome::Error {
                kind: error_kind(&err),
                message: err.to_string(),
            },
        };
        results.push(BatchResult { index, outcome });
    }

    if let Some(deadline) = deadline {
        deadline.abort();
    }

    Ok(BatchReport {
        generated_at: Utc::now(),
        catalog_loaded_at: catalog.loaded_at(),
        results,
    })
}

pub async fn handle_batch(
    file: PathBuf,
    search: SearchArgs,
    timeout_secs: Option<u64>,
    save: Option<PathBuf>,
    config: &Config,
    output_format: &str,
) -> Result<()> {
    let requests = read_batch_file(&file)?;
    let catalog = Arc::new(load_catalog(search.catalog_dir(config), config)?);
    let options = search.options(config);
    info!("Evaluating {} requests from {}", requests.len(), file.display());

    let report = run_batch(
        requests,
        catalog,
        options,
        timeout_secs.map(Duration::from_secs),
    )
    .await?;

    if let Some(path) = save {
        save_json(&path, &report)?;
        info!("Saved batch report to {}", path.display());
    }

    if output_format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Batch of {} requests at {}: {} failed",
            report.results.len(),
            format_timestamp(report.generated_at),
            report.failures()
        );
        println!("{}", batch_table(&report));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct CatalogSummary {
    dir: PathBuf,
    loaded_at: DateTime<Utc>,
    partitions: Vec<PartitionSummary>,
    discount_entries: usize,
    regions: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PartitionSummary {
    pub provider: String,
    pub operating_system: String,
    pub records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// One row per (provider, OS) partition
pub fn partition_table(partitions: &[PartitionSummary]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Provider", "OS", "Instance types", "Version"]);

    for part in partitions {
        table.add_row(vec![
            Cell::new(&part.provider),
            Cell::new(&part.operating_system),
            Cell::new(part.records),
            Cell::new(part.version.as_deref().unwrap_or("-")),
        ]);
    }
    table
}

pub fn handle_catalog(search: SearchArgs, config: &Config, output_format: &str) -> Result<()> {
    let dir = search.catalog_dir(config);
    let catalog = load_catalog(dir, config)?;

    let summary = CatalogSummary {
        dir: dir.to_path_buf(),
        loaded_at: catalog.loaded_at(),
        partitions: catalog
            .counts()
            .into_iter()
            .map(|((provider, os), records)| PartitionSummary {
                provider: provider.to_string(),
                operating_system: os.to_string(),
                records,
                version: catalog.version(provider, os).map(str::to_string),
            })
            .collect(),
        discount_entries: catalog.discounts().len(),
        regions: catalog.regions().into_iter().map(str::to_string).collect(),
    };

    if output_format == "json" {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Catalog {} (loaded {})",
            summary.dir.display(),
            format_timestamp(summary.loaded_at)
        );
        println!("{}", partition_table(&summary.partitions));
        println!("{} discount entries", summary.discount_entries);
        println!("Regions: {}", summary.regions.join(", "));
    }
    Ok(())
}
