//! Training progress from the metrics CSV written by the training framework.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use crate::error::{CurateError, Result};
use crate::event::Event;

/// Number of completed epochs recorded in `metrics_csv`.
///
/// Each epoch may log several rows, and the final test pass is logged as one
/// extra epoch, so progress is the number of distinct `epoch` values minus one
/// (never below zero). Rows with an empty `epoch` cell are ignored.
pub fn training_progress(metrics_csv: impl AsRef<Path>) -> Result<u32> {
    let path = metrics_csv.as_ref();
    let file = File::open(path).map_err(|e| CurateError::io(path, e))?;
    let mut reader = csv::Reader::from_reader(file);

    let column = reader
        .headers()?
        .iter()
        .position(|h| h == "epoch")
        .ok_or_else(|| {
            CurateError::Configuration(format!("No epoch column in '{}'", path.display()))
        })?;

    let mut epochs = HashSet::new();
    for row in reader.records() {
        let row = row?;
        let cell = row.get(column).unwrap_or_default().trim();
        if cell.is_empty() {
            continue;
        }
        let epoch: u32 = cell.parse().map_err(|_| {
            CurateError::Configuration(format!(
                "Invalid epoch '{}' in '{}'",
                cell,
                path.display()
            ))
        })?;
        epochs.insert(epoch);
    }

    Ok(u32::try_from(epochs.len()).unwrap_or(u32::MAX).saturating_sub(1))
}

/// [`training_progress`] wrapped as the event a training view listens for.
pub fn training_progress_event(metrics_csv: impl AsRef<Path>) -> Result<Event> {
    training_progress(metrics_csv).map(Event::TrainingProgress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, text: &str) -> std::path::PathBuf {
        let path = dir.path().join("metrics.csv");
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_counts_distinct_epochs_minus_one() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "epoch,step,train_loss\n0,10,0.9\n0,20,0.8\n1,30,0.7\n2,40,0.6\n",
        );
        assert_eq!(training_progress(&path).unwrap(), 2);
        assert_eq!(
            training_progress_event(&path).unwrap(),
            Event::TrainingProgress(2)
        );
    }

    #[test]
    fn test_empty_file_is_zero() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "epoch,step\n");
        assert_eq!(training_progress(&path).unwrap(), 0);
    }

    #[test]
    fn test_blank_cells_ignored() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "step,epoch\n1,0\n2,\n3,1\n");
        assert_eq!(training_progress(&path).unwrap(), 1);
    }

    #[test]
    fn test_missing_epoch_column() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "step,loss\n1,0.5\n");
        assert!(matches!(
            training_progress(&path),
            Err(CurateError::Configuration(_))
        ));
    }
}
