//! taskmesh CLI
//!
//! Command-line interface for the taskmesh experiment suite: batch
//! comparison runs of the four migration strategies, and the
//! supply-chain preprocessor that turns CSV source tables into the text
//! input formats.
//!
//! # Usage
//!
//! ```bash
//! # Compare all four strategies on one input case
//! taskmesh run --tasks Task24.txt --agents Robots4.txt --graphs Graph4.txt
//!
//! # Ten repetitions, two strategies, custom fault ratio
//! taskmesh run --tasks t.txt --agents r.txt --graphs g.txt \
//!     --algorithms hgtm,gbma --fault-ratio 0.2 --repeat 10 --out results/
//!
//! # Build experiment inputs from supply-chain CSV data
//! taskmesh build --providers providers.csv --inputs inputs.csv \
//!     --provision provision.csv --out-prefix semiconductor
//! ```

use clap::{Parser, Subcommand};

pub mod batch;
pub mod supply;

/// taskmesh command line interface
#[derive(Parser, Debug)]
#[command(name = "taskmesh")]
#[command(author, version, about = "Task redistribution on faulted multi-agent mesh networks")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Batch-run migration strategies over input cases and write reports
    Run(batch::RunArgs),

    /// Build text-format inputs from supply-chain CSV tables
    Build(supply::BuildArgs),

    /// Display version information
    Version,
}
