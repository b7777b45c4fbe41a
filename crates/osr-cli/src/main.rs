//! OSR scenario runner.
//!
//! Runs a scripted mesh scenario round by round and reports per-station rate
//! adaptation and spatial-reuse statistics, or dumps the precomputed
//! modulation table for a given radio configuration.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use osr_core::modulation::{ModulationTable, TableConfig};
use osr_sim::harness::MeshHarness;
use osr_sim::scenario::ScenarioConfig;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "osr")]
#[command(author, version, about = "OSR mesh rate-control and spatial-reuse runner", long_about = None)]
struct Cli {
    /// Enable verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and print the resulting statistics
    Run {
        /// Scenario JSON file (built-in default scenario when omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Number of traffic rounds to run
        #[arg(short, long, default_value = "100")]
        rounds: u32,

        /// Emit the reports as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print the precomputed modulation table
    Modes {
        /// Channel width in MHz (20, 40, 80)
        #[arg(long, default_value = "20")]
        width: u16,

        /// Maximum spatial streams
        #[arg(long, default_value = "1")]
        streams: u8,

        /// Target bit error rate for the SNR thresholds
        #[arg(long, default_value = "1e-5")]
        ber: f64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            scenario,
            rounds,
            json,
        } => run_scenario(scenario, rounds, json),
        Commands::Modes {
            width,
            streams,
            ber,
        } => print_modes(width, streams, ber),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn run_scenario(path: Option<PathBuf>, rounds: u32, json: bool) -> Result<()> {
    let config = match path {
        Some(path) => ScenarioConfig::load(&path)
            .with_context(|| format!("loading scenario {}", path.display()))?,
        None => ScenarioConfig::default(),
    };
    let mut harness = MeshHarness::new(config).context("building harness")?;

    info!(rounds, "running scenario");
    let total = harness.run(rounds);
    let reports = harness.station_reports();

    if json {
        let out = serde_json::json!({
            "totals": total,
            "stations": reports,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!(
        "{} rounds, {} frames: {} delivered / {} lost, verdicts {} restricted / {} unrestricted",
        rounds, total.transmissions, total.delivered, total.lost, total.restricted,
        total.unrestricted,
    );
    println!(
        "{:>8} {:>9} {:>26} {:>10} {:>8} {:>11} {:>13}",
        "station", "next hop", "mode", "delivered", "lost", "restricted", "unrestricted"
    );
    for r in &reports {
        let next_hop = r
            .next_hop
            .map(|h| h.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "{:>8} {:>9} {:>26} {:>10} {:>8} {:>11} {:>13}",
            r.station.to_string(),
            next_hop,
            format!("{:.1} Mb/s", r.data_rate_bps as f64 / 1e6),
            r.delivered,
            r.lost,
            r.restricted,
            r.unrestricted,
        );
    }
    Ok(())
}

fn print_modes(width: u16, streams: u8, ber: f64) -> Result<()> {
    let table = ModulationTable::build(&TableConfig {
        channel_width_mhz: width,
        max_streams: streams,
        short_guard: false,
        target_ber: ber,
    });
    println!("{:>5} {}", "index", "mode");
    for (i, entry) in table.entries().iter().enumerate() {
        println!("{:>5} {}", i, entry);
    }
    Ok(())
}
