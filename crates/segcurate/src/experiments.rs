//! On-disk experiment layout.
//!
//! ```text
//! <user_experiments_path>/
//! └── <experiment>/
//!     ├── checkpoints/epoch_004.ckpt
//!     ├── csv/version_0/metrics.csv
//!     ├── data/train.csv
//!     ├── test_images/
//!     └── train_config.yaml
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use tracing::debug;

use crate::config::UserSettings;
use crate::error::{CurateError, Result};
use crate::event::Event;
use crate::publisher::Publisher;

static VERSION_DIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^version_(\d+)$").unwrap());
static CHECKPOINT_EPOCH: Lazy<Regex> = Lazy::new(|| Regex::new(r"_(\d+)$").unwrap());

/// What the curation core needs to know about experiments.
pub trait ExperimentsResolver: Send + Sync {
    /// Directory containing all experiments.
    fn user_experiments_path(&self) -> PathBuf;

    /// The active experiment, if one is selected.
    fn experiment_name(&self) -> Option<String>;

    /// Directory of the active experiment.
    fn experiment_path(&self) -> Result<PathBuf> {
        let name = self.experiment_name().ok_or_else(|| {
            CurateError::Configuration("No experiment selected".to_string())
        })?;
        Ok(self.user_experiments_path().join(name))
    }
}

/// Experiments rooted at a settings-provided directory.
#[derive(Debug)]
pub struct ExperimentsModel {
    settings: UserSettings,
    experiments: RwLock<Vec<String>>,
    experiment_name: RwLock<Option<String>>,
    publisher: Publisher,
}

impl ExperimentsModel {
    /// Create the model and scan the experiments directory.
    pub fn new(settings: UserSettings) -> Result<Self> {
        let model = Self {
            settings,
            experiments: RwLock::new(Vec::new()),
            experiment_name: RwLock::new(None),
            publisher: Publisher::new(),
        };
        model.refresh_experiments()?;
        Ok(model)
    }

    /// Publisher for [`Event::ExperimentSelected`].
    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// The settings this model was built from.
    pub fn user_settings(&self) -> &UserSettings {
        &self.settings
    }

    /// Rescan the experiments directory. Hidden entries are skipped.
    ///
    /// A missing experiments directory yields an empty list.
    pub fn refresh_experiments(&self) -> Result<()> {
        let root = &self.settings.user_experiments_path;
        let mut found = Vec::new();
        if root.exists() {
            for entry in fs::read_dir(root).map_err(|e| CurateError::io(root, e))? {
                let entry = entry.map_err(|e| CurateError::io(root, e))?;
                if !entry.path().is_dir() {
                    continue;
                }
                let name = entry.file_name().to_string_lossy().into_owned();
                if !name.starts_with('.') && !found.contains(&name) {
                    found.push(name);
                }
            }
        }
        found.sort();
        debug!(count = found.len(), "refreshed experiments");
        *self.experiments.write() = found;
        Ok(())
    }

    /// Known experiment names (a copy).
    pub fn experiments(&self) -> Vec<String> {
        self.experiments.read().clone()
    }

    /// Select the active experiment and notify subscribers.
    pub fn set_experiment_name(&self, name: Option<String>) -> Result<()> {
        *self.experiment_name.write() = name;
        self.publisher.dispatch(&Event::ExperimentSelected)
    }

    /// Best checkpoint of the active experiment.
    pub fn checkpoint(&self) -> Result<Option<String>> {
        match self.experiment_name() {
            Some(name) => self.best_checkpoint(&name),
            None => Ok(None),
        }
    }

    /// `<root>/<experiment>/checkpoints/<checkpoint>`.
    pub fn model_checkpoints_path(
        &self,
        experiment_name: Option<&str>,
        checkpoint: Option<&str>,
    ) -> Result<PathBuf> {
        let experiment_name = experiment_name.ok_or_else(|| {
            CurateError::Configuration(
                "Experiment name cannot be None in order to get model_checkpoint_path".to_string(),
            )
        })?;
        let checkpoint = checkpoint.ok_or_else(|| {
            CurateError::Configuration(
                "Checkpoint cannot be None in order to get model_checkpoint_path".to_string(),
            )
        })?;
        Ok(self
            .user_experiments_path()
            .join(experiment_name)
            .join("checkpoints")
            .join(checkpoint))
    }

    /// `<root>/<experiment>/test_images`.
    pub fn model_test_images_path(&self, experiment_name: &str) -> Option<PathBuf> {
        (!experiment_name.is_empty()).then(|| {
            self.user_experiments_path()
                .join(experiment_name)
                .join("test_images")
        })
    }

    /// `<root>/<experiment>/train_config.yaml`.
    pub fn train_config_path(&self, experiment_name: &str) -> Option<PathBuf> {
        (!experiment_name.is_empty()).then(|| {
            self.user_experiments_path()
                .join(experiment_name)
                .join("train_config.yaml")
        })
    }

    /// `<root>/<active experiment>/data`, if an experiment is selected.
    pub fn csv_path(&self) -> Option<PathBuf> {
        self.experiment_path().ok().map(|p| p.join("data"))
    }

    /// `<root>/<active experiment>/csv`, where training metrics are logged.
    pub fn metrics_csv_path(&self) -> Result<PathBuf> {
        Ok(self.experiment_path()?.join("csv"))
    }

    /// Highest `version_N` directory under the metrics path, or -1 when none exist.
    pub fn latest_metrics_csv_version(&self) -> Result<i64> {
        let metrics = self.metrics_csv_path()?;
        if !metrics.exists() {
            return Ok(-1);
        }
        let mut latest = -1;
        for entry in fs::read_dir(&metrics).map_err(|e| CurateError::io(&metrics, e))? {
            let entry = entry.map_err(|e| CurateError::io(&metrics, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let version = VERSION_DIR
                .captures(&name)
                .and_then(|c| c[1].parse::<i64>().ok());
            if let Some(version) = version {
                latest = latest.max(version);
            }
        }
        Ok(latest)
    }

    /// Metrics file of the latest version, if any version exists.
    pub fn latest_metrics_csv(&self) -> Result<Option<PathBuf>> {
        let version = self.latest_metrics_csv_version()?;
        if version < 0 {
            return Ok(None);
        }
        Ok(Some(
            self.metrics_csv_path()?
                .join(format!("version_{}", version))
                .join("metrics.csv"),
        ))
    }

    /// Most recently modified checkpoint, ignoring `last*` checkpoints.
    pub fn best_checkpoint(&self, experiment_name: &str) -> Result<Option<String>> {
        let dir = self.user_experiments_path().join(experiment_name).join("checkpoints");
        if !dir.exists() {
            return Ok(None);
        }

        let mut files: Vec<(SystemTime, String)> = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| CurateError::io(&dir, e))? {
            let entry = entry.map_err(|e| CurateError::io(&dir, e))?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if !path.is_file() || name.to_lowercase().contains("last") {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .map_err(|e| CurateError::io(&path, e))?;
            files.push((modified, name));
        }

        files.sort();
        Ok(files.pop().map(|(_, name)| name))
    }

    /// Epoch of the active experiment's best checkpoint (`epoch_012.ckpt` is 12).
    pub fn current_epoch(&self) -> Result<Option<u32>> {
        Ok(self.checkpoint()?.as_deref().and_then(parse_checkpoint_epoch))
    }
}

impl ExperimentsResolver for ExperimentsModel {
    fn user_experiments_path(&self) -> PathBuf {
        self.settings.user_experiments_path.clone()
    }

    fn experiment_name(&self) -> Option<String> {
        self.experiment_name.read().clone()
    }
}

/// Epoch number encoded in a checkpoint file name.
pub fn parse_checkpoint_epoch(checkpoint: &str) -> Option<u32> {
    let stem = checkpoint.split('.').next()?;
    CHECKPOINT_EPOCH
        .captures(stem)
        .and_then(|c| c[1].parse().ok())
}

/// A fixed experiment location, for callers that do not need discovery.
#[derive(Debug, Clone)]
pub struct FixedExperiment {
    root: PathBuf,
    name: Option<String>,
}

impl FixedExperiment {
    /// Resolve to `root/name`.
    pub fn new(root: impl AsRef<Path>, name: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            name: Some(name.into()),
        }
    }
}

impl ExperimentsResolver for FixedExperiment {
    fn user_experiments_path(&self) -> PathBuf {
        self.root.clone()
    }

    fn experiment_name(&self) -> Option<String> {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_checkpoint_epoch() {
        assert_eq!(parse_checkpoint_epoch("epoch_001.ckpt"), Some(1));
        assert_eq!(parse_checkpoint_epoch("epoch_120.ckpt"), Some(120));
        assert_eq!(parse_checkpoint_epoch("best.ckpt"), None);
    }

    #[test]
    fn test_experiment_path_requires_selection() {
        let model = ExperimentsModel::new(UserSettings::new("/nonexistent/root")).unwrap();
        assert!(model.experiments().is_empty());
        assert!(model.experiment_path().is_err());
        assert!(model.csv_path().is_none());
    }

    #[test]
    fn test_fixed_experiment_path() {
        let fixed = FixedExperiment::new("/data", "exp1");
        assert_eq!(fixed.experiment_path().unwrap(), PathBuf::from("/data/exp1"));
    }

    #[test]
    fn test_checkpoint_path_errors() {
        let model = ExperimentsModel::new(UserSettings::new("/root")).unwrap();
        assert!(model.model_checkpoints_path(None, Some("bar")).is_err());
        assert!(model.model_checkpoints_path(Some("foo"), None).is_err());
        assert_eq!(
            model
                .model_checkpoints_path(Some("foo"), Some("bar"))
                .unwrap(),
            PathBuf::from("/root/foo/checkpoints/bar")
        );
    }
}
