//! gridpack-bench — synthetic load for the gang scheduler.
//!
//! Exercises the scheduler call surface the way a reconciliation driver
//! would. Not part of the scheduler itself.
//!
//! # Usage
//!
//! ```text
//! gridpack-bench saturate --iterations 100000
//! gridpack-bench fleet --nodes 5000 --types 4 --rounds 5000
//! gridpack-bench --config gridpack.toml soak --ticks 600 --interval-ms 100
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gridpack_scheduler::SchedulerConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "gridpack-bench",
    about = "Synthetic load generator for the gridpack scheduler",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Scheduler limits as TOML. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print the final scheduler state as JSON.
    #[arg(long, global = true)]
    dump: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// One 8-GPU node, one full-node job admitted per iteration.
    Saturate {
        #[arg(long, default_value = "100000")]
        iterations: u64,
    },
    /// Large fleet, many small single-replica jobs.
    Fleet {
        #[arg(long, default_value = "5000")]
        nodes: usize,
        /// Number of distinct node types; jobs all target the first one.
        #[arg(long, default_value = "4")]
        types: usize,
        #[arg(long, default_value = "5000")]
        rounds: u64,
        #[arg(long, default_value = "10")]
        jobs_per_round: u64,
    },
    /// Timed reconciliation loop against simulated infrastructure.
    Soak {
        #[arg(long, default_value = "600")]
        ticks: u64,
        /// Tick interval in milliseconds.
        #[arg(long, default_value = "100")]
        interval_ms: u64,
        #[arg(long, default_value = "16")]
        nodes: usize,
        #[arg(long, default_value = "7")]
        seed: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gridpack=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SchedulerConfig::from_file(path)?,
        None => SchedulerConfig::default(),
    };

    match cli.command {
        Command::Saturate { iterations } => commands::saturate::run(config, iterations, cli.dump),
        Command::Fleet {
            nodes,
            types,
            rounds,
            jobs_per_round,
        } => commands::fleet::run(config, nodes, types, rounds, jobs_per_round, cli.dump),
        Command::Soak {
            ticks,
            interval_ms,
            nodes,
            seed,
        } => commands::soak::run(config, ticks, interval_ms, nodes, seed, cli.dump).await,
    }
}
