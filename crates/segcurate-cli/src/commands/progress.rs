//! Progress command - report how far training of an experiment has come.

use std::path::PathBuf;

use colored::Colorize;
use segcurate::{ExperimentsModel, UserSettings, training_progress};

pub fn run(
    settings: Option<PathBuf>,
    experiment: String,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = UserSettings::from_env_or_file(settings.as_deref())?;
    let model = ExperimentsModel::new(settings)?;

    if !model.experiments().contains(&experiment) {
        return Err(format!(
            "Experiment not found: {}\nRun 'segcurate experiments' to list available experiments.",
            experiment
        )
        .into());
    }
    model.set_experiment_name(Some(experiment.clone()))?;

    println!(
        "{} {}",
        "Training progress for".cyan().bold(),
        experiment.white()
    );
    println!();

    match model.latest_metrics_csv()? {
        Some(metrics) => {
            let epochs = training_progress(&metrics)?;
            println!("Epochs completed: {}", epochs.to_string().white().bold());
            if verbose {
                println!("Metrics file:     {}", metrics.display());
            }
        }
        None => println!("  {}", "No training metrics yet".yellow()),
    }

    match model.checkpoint()? {
        Some(checkpoint) => {
            let epoch = model
                .current_epoch()?
                .map_or_else(|| "?".to_string(), |e| e.to_string());
            println!("Best checkpoint:  {} (epoch {})", checkpoint.green(), epoch);
        }
        None => println!("Best checkpoint:  {}", "none".dimmed()),
    }

    Ok(())
}
