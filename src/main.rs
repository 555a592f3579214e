use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use fleetctl::commands::{self, DemandArgs, SearchArgs};
use fleetctl::config::{self, Config};
use fleetctl::exit_codes;

#[derive(Parser)]
#[command(name = "fleetctl")]
#[command(
    about = "Cross-cloud fleet composition and pricing",
    long_about = "fleetctl finds every fleet of AWS and Azure instances that covers a resource demand.\n\nGiven vCPU, memory, storage, IOPS and bandwidth per instance plus an instance count,\nit searches single-type fleets and two-type mixes across providers and prices\neach one under the requested purchase type, commitment and utilization."
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(long, global = true, default_value = "text")]
    output: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Find and price fleets for one demand
    ///
    /// Examples:
    ///   fleetctl offers --region us-east-1 --vcpu 4 --memory 16 --storage 100
    ///   fleetctl offers --region eastus --vcpu 2 --memory 8 --storage 50 --instances 6 \
    ///       --purchase-type Reserved --commitment 1y --top 5
    Offers {
        #[command(flatten)]
        demand: DemandArgs,
        #[command(flatten)]
        search: SearchArgs,
        /// Show only the N cheapest offers
        #[arg(long)]
        top: Option<usize>,
        /// Save all offers as JSON (defaults to [output].results_file)
        #[arg(long, num_args = 0..=1, value_name = "PATH")]
        save: Option<Option<PathBuf>>,
    },
    /// Evaluate a JSON array of requests in parallel
    Batch {
        /// File holding a JSON array of request objects
        file: PathBuf,
        #[command(flatten)]
        search: SearchArgs,
        /// Cancel searches still running after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Save the report as JSON
        #[arg(long, value_name = "PATH")]
        save: Option<PathBuf>,
    },
    /// Summarize the loaded catalog
    Catalog {
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Initialize fleetctl configuration
    Init {
        /// Where to write the config file
        #[arg(short, long, default_value = ".fleetctl.toml")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Only warnings and errors unless --verbose; RUST_LOG is not consulted
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    if let Err(err) = run(cli).await {
        eprintln!("Error: {:#}", err);
        exit_codes::exit_with_code(&err);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Offers {
            demand,
            search,
            top,
            save,
        } => {
            commands::handle_offers(demand, search, top, save, &config, &cli.output)?;
        }
        Commands::Batch {
            file,
            search,
            timeout_secs,
            save,
        } => {
            commands::handle_batch(file, search, timeout_secs, save, &config, &cli.output).await?;
        }
        Commands::Catalog { search } => {
            commands::handle_catalog(search, &config, &cli.output)?;
        }
        Commands::Init { path } => {
            config::init_config(&path)?;
        }
    }

    Ok(())
}
