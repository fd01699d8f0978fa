//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Segcurate: curate segmentation training data
#[derive(Parser)]
#[command(name = "segcurate")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Walk every image triple and save the selection as train.csv
    Curate {
        /// Directory of raw images
        #[arg(long, value_name = "DIR")]
        raw: PathBuf,

        /// Directory of first-choice segmentations
        #[arg(long, value_name = "DIR")]
        seg1: PathBuf,

        /// Directory of alternative segmentations
        #[arg(long, value_name = "DIR")]
        seg2: Option<PathBuf>,

        /// Image indices to leave out of the training set (e.g., "1,4")
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<usize>,

        /// Settings file (TOML)
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Experiment that receives the curated record
        #[arg(short, long)]
        experiment: String,

        /// Also write valid.csv and test.csv next to train.csv
        #[arg(long)]
        splits: bool,
    },

    /// List experiments and their best checkpoints
    Experiments {
        /// Settings file (TOML)
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show training progress of an experiment
    Progress {
        /// Settings file (TOML)
        #[arg(short, long)]
        settings: Option<PathBuf>,

        /// Experiment to inspect
        #[arg(short, long)]
        experiment: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_curate_with_exclusions() {
        let cli = Cli::try_parse_from([
            "segcurate",
            "curate",
            "--raw",
            "/raw",
            "--seg1",
            "/seg1",
            "--exclude",
            "1,3",
            "--experiment",
            "exp1",
        ])
        .unwrap();

        match cli.command {
            Commands::Curate {
                exclude,
                seg2,
                experiment,
                ..
            } => {
                assert_eq!(exclude, vec![1, 3]);
                assert!(seg2.is_none());
                assert_eq!(experiment, "exp1");
            }
            _ => panic!("expected curate"),
        }
    }

    #[test]
    fn test_parse_curate_with_splits() {
        let cli = Cli::try_parse_from([
            "segcurate",
            "curate",
            "--raw",
            "/raw",
            "--seg1",
            "/seg1",
            "-e",
            "exp1",
            "--splits",
        ])
        .unwrap();

        match cli.command {
            Commands::Curate { splits, exclude, .. } => {
                assert!(splits);
                assert!(exclude.is_empty());
            }
            _ => panic!("expected curate"),
        }
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::try_parse_from(["segcurate", "experiments", "--json", "-v"]).unwrap();
        assert!(cli.verbose);
    }
}
