//! User settings and curation configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::curation::CurationImageType;
use crate::error::{CurateError, Result};

/// Environment variable overriding [`UserSettings::user_experiments_path`].
pub const EXPERIMENTS_PATH_ENV: &str = "SEGCURATE_EXPERIMENTS_PATH";

/// Where the user keeps experiments and the ML framework.
///
/// ```toml
/// user_experiments_path = "/data/experiments"
/// cyto_dl_home_path = "/opt/cyto-dl"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Directory holding one subdirectory per experiment.
    pub user_experiments_path: PathBuf,

    /// Install location of the training framework.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cyto_dl_home_path: Option<PathBuf>,
}

impl UserSettings {
    /// Settings rooted at `user_experiments_path`.
    pub fn new(user_experiments_path: impl Into<PathBuf>) -> Self {
        Self {
            user_experiments_path: user_experiments_path.into(),
            cyto_dl_home_path: None,
        }
    }

    /// Set the training framework location.
    pub fn with_cyto_dl_home(mut self, path: impl Into<PathBuf>) -> Self {
        self.cyto_dl_home_path = Some(path.into());
        self
    }

    /// Parse settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load settings from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| CurateError::io(path, e))?;
        debug!(path = %path.display(), "loaded user settings");
        Self::from_toml(&text)
    }

    /// Resolve settings: the environment override wins, then the file.
    ///
    /// Errors when neither source is available.
    pub fn from_env_or_file(path: Option<&Path>) -> Result<Self> {
        Self::resolve(std::env::var(EXPERIMENTS_PATH_ENV).ok(), path)
    }

    /// Resolve settings from an already looked-up override value.
    ///
    /// A blank override counts as unset. When both are present the file
    /// supplies everything except the experiments path.
    pub fn resolve(override_dir: Option<String>, path: Option<&Path>) -> Result<Self> {
        if let Some(dir) = override_dir.filter(|d| !d.trim().is_empty()) {
            let mut settings = match path {
                Some(p) if p.exists() => Self::from_file(p)?,
                _ => Self::new(&dir),
            };
            debug!(dir = %dir, "experiments path taken from environment");
            settings.user_experiments_path = PathBuf::from(dir);
            return Ok(settings);
        }
        match path {
            Some(p) => Self::from_file(p),
            None => Err(CurateError::Configuration(format!(
                "No settings file given and {} is not set",
                EXPERIMENTS_PATH_ENV
            ))),
        }
    }
}

/// Tunables for a curation session and its loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurationConfig {
    /// File name suffixes skipped when listing an image directory.
    pub ignored_suffixes: Vec<String>,
    /// Base image assigned to new records.
    pub default_base_image: CurationImageType,
    /// Worker threads used by the loader pool.
    pub loader_workers: usize,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            ignored_suffixes: vec![".DS_Store".to_string()],
            default_base_image: CurationImageType::Seg1,
            loader_workers: 3,
        }
    }
}

impl CurationConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip an additional file name suffix when listing directories.
    pub fn with_ignored_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.ignored_suffixes.push(suffix.into());
        self
    }

    /// Set the base image for new records.
    pub fn with_default_base_image(mut self, base: CurationImageType) -> Self {
        self.default_base_image = base;
        self
    }

    /// Set the loader worker count (at least one).
    pub fn with_loader_workers(mut self, workers: usize) -> Self {
        self.loader_workers = workers.max(1);
        self
    }
}
