//! Image directory listing.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CurateError, Result};

/// Files in `dir`, sorted by path, skipping subdirectories and any file whose
/// name ends with one of `ignored_suffixes` (e.g. `.DS_Store`).
pub fn list_image_files(dir: impl AsRef<Path>, ignored_suffixes: &[String]) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| CurateError::io(dir, e))? {
        let entry = entry.map_err(|e| CurateError::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if ignored_suffixes.iter().any(|s| name.ends_with(s.as_str())) {
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}
