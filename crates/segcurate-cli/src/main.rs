//! Segcurate CLI - headless curation of segmentation training data.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "segcurate=debug"
    } else {
        "segcurate=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match cli.command {
        Commands::Curate {
            raw,
            seg1,
            seg2,
            exclude,
            settings,
            experiment,
            splits,
        } => commands::curate::run(
            commands::curate::CurateArgs {
                raw,
                seg1,
                seg2,
                exclude,
                settings,
                experiment,
                splits,
            },
            cli.verbose,
        ),

        Commands::Experiments { settings, json } => {
            commands::experiments::run(settings, json, cli.verbose)
        }

        Commands::Progress {
            settings,
            experiment,
        } => commands::progress::run(settings, experiment, cli.verbose),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
