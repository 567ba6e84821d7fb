//! Command-line argument parsing for DOCI calculations

use clap::Parser;

/// DOCI ground state and orbital optimization
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the YAML integrals file
    #[arg(short, long)]
    pub integrals: String,

    /// Write the final 2-RDM to this file
    #[arg(short, long)]
    pub rdm: Option<String>,

    /// Start from the orbital transform stored in this file
    #[arg(short, long)]
    pub unitary: Option<String>,

    /// Run mode: diag, anneal or local
    #[arg(short, long)]
    pub mode: Option<String>,

    /// Override output file: (default stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to an optional YAML configuration file
    #[arg(short, long)]
    pub config_file: Option<String>,

    /// Directory for the checkpoints of an optimization
    #[arg(long)]
    pub checkpoint_dir: Option<String>,

    /// Override the energy convergence criterion of the local optimizer
    #[arg(long)]
    pub conv_crit: Option<f64>,

    /// Override the number of converged iterations needed to stop
    #[arg(long)]
    pub conv_steps: Option<usize>,

    /// Override the maximum number of local optimizer iterations
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Draw orbital pairs by energy gain instead of taking the best
    #[arg(long)]
    pub dist_choice: bool,

    /// Override the annealing start temperature
    #[arg(long)]
    pub start_temp: Option<f64>,

    /// Override the maximum number of annealing steps
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Seed of the random number generator of the optimizers
    #[arg(long)]
    pub seed: Option<u64>,
}
