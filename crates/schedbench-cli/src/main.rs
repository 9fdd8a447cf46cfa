//! schedbench: bring up containerized scheduler clusters and benchmark them.
//!
//! # Usage
//!
//! ```text
//! schedbench run --workdir /bench --config config.json --nodes nodes
//! schedbench clean --workdir /bench
//! schedbench plan --scenario 100m50cpu_sync_j
//! schedbench stats --schedlogs /var/spool/pbs/sched_logs --stats
//! ```

use clap::{Parser, Subcommand};

mod commands;

use commands::{HarnessArgs, InputArgs, StatsArgs};

#[derive(Parser)]
#[command(
    name = "schedbench",
    about = "Scheduler benchmark harness",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every scenario in the config file.
    ///
    /// Each scenario gets a fresh cluster: hosts are cleaned, the cluster is
    /// rolled out, and `run-test.sh` is invoked from the workdir once every
    /// node is up.
    Run {
        #[command(flatten)]
        inputs: InputArgs,
        /// Exit on the first scenario that fails to come up.
        #[arg(long)]
        no_continue: bool,
        #[command(flatten)]
        harness: HarnessArgs,
    },
    /// Remove containers, spool directories, and the image from every host
    Clean {
        /// Host list file, relative to the workdir
        #[arg(long, default_value = "nodes")]
        nodes: std::path::PathBuf,
        #[command(flatten)]
        harness: HarnessArgs,
    },
    /// Print a scenario's cluster plan and addressing as JSON (dry run)
    Plan {
        #[command(flatten)]
        inputs: InputArgs,
        /// Scenario name from the config file
        #[arg(short, long)]
        scenario: String,
        #[command(flatten)]
        harness: HarnessArgs,
    },
    /// Print the standard scenario matrix as a config file
    Genconf {
        /// Keep only layouts with this many CPUs in total
        #[arg(long, default_value = "5000")]
        total_cpus: u64,
        /// Virtual nodes per mom
        #[arg(long, default_value = "0")]
        vnodes_per_mom: u32,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
    },
    /// Scheduling cycle statistics from scheduler logs
    Stats(StatsArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,schedbench=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            inputs,
            no_continue,
            harness,
        } => commands::run::run(&inputs, &harness, no_continue).await,
        Commands::Clean { nodes, harness } => commands::clean::clean(&nodes, &harness).await,
        Commands::Plan {
            inputs,
            scenario,
            harness,
        } => commands::plan::plan(&inputs, &scenario, &harness).await,
        Commands::Genconf {
            total_cpus,
            vnodes_per_mom,
            output,
        } => commands::genconf::genconf(total_cpus, vnodes_per_mom, output.as_deref()),
        Commands::Stats(args) => commands::stats::stats(&args),
    }
}
