//! Maintenance jobs for the labeler tables.

#![warn(clippy::all, clippy::pedantic)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use labeler_common::LEADERBOARD_SIZE;
use labeler_common::config::LabelerConfig;
use labeler_common::consensus;
use labeler_common::db_util::{self, PgStore};
use labeler_common::store::LabelStore;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Postgres connection URL
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    #[command(flatten)]
    config: LabelerConfig,

    #[command(subcommand)]
    job: Job,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Job {
    /// Recompute the consensus label of every record
    Consensus,
    /// Print labeling progress and the leaderboard
    Status,
    /// Flag the first records by id as the overlap pool (defaults to --num-overlap)
    MarkOverlap {
        /// How many records to flag
        #[arg(long = "count")]
        count: Option<usize>,
    },
}

fn print_status<S: LabelStore + ?Sized>(store: &mut S) -> Result<()> {
    let status = store.status().context("Could not fetch labeling status")?;
    println!("{status}");

    let leaderboard = store
        .leaderboard(LEADERBOARD_SIZE)
        .context("Could not fetch the leaderboard")?;
    for (rank, entry) in leaderboard.iter().enumerate() {
        println!("{}. {}: {} labels", rank + 1, entry.contributor, entry.num_labels);
    }
    Ok(())
}

fn run_job<S: LabelStore + ?Sized>(store: &mut S, job: Job, config: &LabelerConfig) -> Result<()> {
    match job {
        Job::Consensus => {
            println!("=== CONSENSUS ===");
            let num_with_consensus =
                consensus::recompute(store).context("Consensus update failed")?;
            println!("{num_with_consensus} records have a consensus label.");
            print_status(store)?;
        }
        Job::Status => {
            println!("=== STATUS ===");
            print_status(store)?;
        }
        Job::MarkOverlap { count } => {
            let num_overlap = count.unwrap_or(config.num_overlap);
            println!("=== OVERLAP POOL ===");
            let flagged = store
                .mark_overlap_pool(num_overlap)
                .context("Could not mark the overlap pool")?;
            println!("Flagged {flagged} records as overlap (requested {num_overlap}).");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    db_util::load_env();
    let cli = Cli::parse();
    env_logger::init();

    let mut store = PgStore::connect(&cli.database_url, &cli.config)
        .context("Could not connect to the database")?;
    info!("Database connection established, running {:?}", cli.job);

    run_job(&mut store, cli.job, &cli.config)
}
