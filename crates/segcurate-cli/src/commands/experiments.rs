//! Experiments command - list experiments and their best checkpoints.

use std::path::PathBuf;

use colored::Colorize;
use segcurate::{ExperimentsModel, UserSettings};

pub fn run(
    settings: Option<PathBuf>,
    json_output: bool,
    _verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = UserSettings::from_env_or_file(settings.as_deref())?;
    let model = ExperimentsModel::new(settings)?;

    let mut entries = Vec::new();
    for name in model.experiments() {
        let checkpoint = model.best_checkpoint(&name)?;
        entries.push((name, checkpoint));
    }

    if json_output {
        let experiments: Vec<_> = entries
            .iter()
            .map(|(name, checkpoint)| {
                serde_json::json!({
                    "name": name,
                    "best_checkpoint": checkpoint,
                })
            })
            .collect();
        let output = serde_json::json!({
            "user_experiments_path": model.user_settings().user_experiments_path,
            "experiments": experiments,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "{} {}",
        "Experiments in".cyan().bold(),
        model.user_settings().user_experiments_path.display()
    );
    println!();

    if entries.is_empty() {
        println!("  {}", "No experiments found".dimmed());
        return Ok(());
    }

    let width = entries.iter().map(|(n, _)| n.len()).max().unwrap_or(0);
    for (name, checkpoint) in &entries {
        let checkpoint = match checkpoint {
            Some(c) => c.green().to_string(),
            None => "no checkpoint".dimmed().to_string(),
        };
        let name = format!("{:width$}", name, width = width);
        println!("  {}  {}", name.white().bold(), checkpoint);
    }

    Ok(())
}
