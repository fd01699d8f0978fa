//! Persistence of curation decisions as training CSV files.
//!
//! ```text
//! ,raw,seg
//! 0,/path/to/raw_0.tiff,/path/to/seg1_0.tiff
//! 2,/path/to/raw_2.tiff,/path/to/seg1_2.tiff
//! ```
//!
//! The first column is the record's position in the full list, so excluded
//! images leave gaps rather than being renumbered.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{CurateError, Result};

use super::record::CurationRecord;

/// Header row of every record file.
pub const CSV_HEADER: [&str; 3] = ["", "raw", "seg"];

/// Split files written next to `train.csv`.
pub const SPLIT_FILES: [&str; 3] = ["train.csv", "valid.csv", "test.csv"];

/// One data row of a record file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRecordRow {
    /// Position in the original record list.
    pub index: usize,
    pub raw: PathBuf,
    pub seg: PathBuf,
}

/// Write the records marked for use to `path`.
///
/// Missing parent directories are created. Each row is flushed as it is
/// written, so a failure part-way leaves the rows written so far on disk.
/// Paths that are not valid UTF-8 are rejected before the file is created.
/// Returns the number of data rows.
pub fn write_curation_record(records: &[CurationRecord], path: impl AsRef<Path>) -> Result<usize> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            fs::create_dir_all(parent).map_err(|e| CurateError::io(parent, e))?;
        }
    }

    // Checked up front so a bad path never leaves a truncated file behind.
    let mut selected = Vec::new();
    for (index, record) in records.iter().enumerate() {
        if record.to_use {
            selected.push((index, utf8_path(&record.raw_file)?, utf8_path(&record.seg1)?));
        }
    }

    let file = File::create(path).map_err(|e| CurateError::io(path, e))?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b',')
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(file);

    writer.write_record(CSV_HEADER)?;
    for (index, raw, seg) in &selected {
        writer.write_record([index.to_string().as_str(), *raw, *seg])?;
        writer.flush().map_err(|e| CurateError::io(path, e))?;
    }
    writer.flush().map_err(|e| CurateError::io(path, e))?;
    let rows = selected.len();

    info!(path = %path.display(), rows, "wrote curation record");
    Ok(rows)
}

fn utf8_path(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| {
        CurateError::Configuration(format!(
            "Image path is not valid UTF-8: '{}'",
            path.display()
        ))
    })
}

/// Read back the rows of a record file.
pub fn read_curation_record(path: impl AsRef<Path>) -> Result<Vec<CsvRecordRow>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| CurateError::io(path, e))?;
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);

    let headers = reader.headers()?.clone();
    if headers.iter().collect::<Vec<_>>() != CSV_HEADER {
        return Err(CurateError::Configuration(format!(
            "Unexpected header in '{}': {:?}",
            path.display(),
            headers
        )));
    }

    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let row = result?;
        let index = row
            .get(0)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                CurateError::Configuration(format!(
                    "Invalid index on data row {} of '{}'",
                    line + 1,
                    path.display()
                ))
            })?;
        rows.push(CsvRecordRow {
            index,
            raw: PathBuf::from(row.get(1).unwrap_or_default()),
            seg: PathBuf::from(row.get(2).unwrap_or_default()),
        });
    }
    Ok(rows)
}

/// Write `train.csv` into `dir` and mirror it as `valid.csv` and `test.csv`.
///
/// The training framework requires all three splits; until a real split is
/// configured they share the same rows.
pub fn write_split_records(records: &[CurationRecord], dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let train = dir.join(SPLIT_FILES[0]);
    write_curation_record(records, &train)?;

    let mut written = vec![train.clone()];
    for name in &SPLIT_FILES[1..] {
        let target = dir.join(name);
        fs::copy(&train, &target).map_err(|e| CurateError::io(&target, e))?;
        written.push(target);
    }
    Ok(written)
}
