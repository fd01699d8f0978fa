//! Glue between the file system and a [`CurationSession`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error};

use crate::error::{CurateError, Result};
use crate::event::Event;

use super::files::list_image_files;
use super::loader::{FileBytesReader, ImageReader};
use super::persistence::{write_curation_record, write_split_records};
use super::record::{CurationImageType, CurationRecord};
use super::session::CurationSession;

/// Directory selection and saving for a session.
pub struct CurationService {
    reader: Arc<dyn ImageReader>,
}

impl Default for CurationService {
    fn default() -> Self {
        Self::new(Arc::new(FileBytesReader))
    }
}

impl fmt::Debug for CurationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurationService").finish_non_exhaustive()
    }
}

impl CurationService {
    /// `reader` is used to probe the channel count of a selected directory.
    pub fn new(reader: Arc<dyn ImageReader>) -> Self {
        Self { reader }
    }

    /// Use `dir` as the image directory for `image_type`.
    ///
    /// Lists the directory and probes the first file for a channel count
    /// before touching the session, so a failed selection leaves it as it
    /// was. Emits `ImageDirectorySet`, then `ChannelCountSet` when the
    /// reader reports dimensions, and `CurationRawSelected`,
    /// `CurationSeg1Selected` or `CurationSeg2Selected` last.
    pub fn select_directory(
        &self,
        session: &mut CurationSession,
        image_type: CurationImageType,
        dir: impl AsRef<Path>,
    ) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        let files = list_image_files(dir, &session.config().ignored_suffixes)?;
        let dims = match files.first() {
            Some(first) => self.reader.dims(first)?,
            None => None,
        };
        debug!(%image_type, dir = %dir.display(), files = files.len(), "directory selected");

        session.set_image_directory(image_type, dir)?;
        session.set_image_directory_paths(image_type, files.clone());
        if let Some(dims) = dims {
            session.set_channel_count(image_type, dims.channels)?;
        }

        session
            .publisher()
            .dispatch(&Event::directory_selected(image_type))?;
        Ok(files)
    }

    /// Write the session's record to its `train.csv`.
    ///
    /// The saved flag and `SavedToDisk` event reflect the outcome; a write
    /// failure is returned after they are updated.
    pub fn save(&self, session: &mut CurationSession) -> Result<usize> {
        let path = session.csv_path()?;
        let result = write_curation_record(records_of(session)?, &path);
        finish_save(session, &path, result)
    }

    /// Like [`save`](Self::save), and also mirror `train.csv` as `valid.csv`
    /// and `test.csv` in the same directory.
    ///
    /// Returns the files written.
    pub fn save_splits(&self, session: &mut CurationSession) -> Result<Vec<PathBuf>> {
        let path = session.csv_path()?;
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let result = write_split_records(records_of(session)?, &dir);
        finish_save(session, &path, result)
    }
}

fn records_of(session: &CurationSession) -> Result<&[CurationRecord]> {
    session.curation_record().ok_or_else(|| {
        CurateError::Precondition("Nothing to save outside the main view".to_string())
    })
}

fn finish_save<T>(session: &mut CurationSession, path: &Path, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            session.set_saved_to_disk(true)?;
            Ok(value)
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "failed to save curation record");
            session.set_saved_to_disk(false)?;
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curation::record::{CurationView, ImageData, ImageDims};
    use crate::event::EventKind;
    use crate::experiments::FixedExperiment;
    use crate::publisher::FnSubscriber;
    use parking_lot::Mutex;
    use std::fs;
    use tempfile::TempDir;

    struct DimsReader;

    impl ImageReader for DimsReader {
        fn read(&self, path: &Path) -> Result<ImageData> {
            Ok(ImageData::new(path, vec![0u8]))
        }

        fn dims(&self, _path: &Path) -> Result<Option<ImageDims>> {
            Ok(Some(ImageDims {
                channels: 4,
                z: 1,
                y: 2,
                x: 2,
            }))
        }
    }

    struct BrokenHeaderReader;

    impl ImageReader for BrokenHeaderReader {
        fn read(&self, path: &Path) -> Result<ImageData> {
            Ok(ImageData::new(path, vec![0u8]))
        }

        fn dims(&self, path: &Path) -> Result<Option<ImageDims>> {
            Err(CurateError::ImageLoad {
                path: path.to_path_buf(),
                message: "unreadable header".to_string(),
            })
        }
    }

    fn populate(dir: &Path, prefix: &str, n: usize) {
        fs::create_dir_all(dir).unwrap();
        for i in 0..n {
            fs::write(dir.join(format!("{}_{}.tiff", prefix, i)), b"img").unwrap();
        }
    }

    #[test]
    fn test_select_directory_sets_paths_and_emits() {
        let tmp = TempDir::new().unwrap();
        let raw = tmp.path().join("raw");
        populate(&raw, "raw", 2);
        fs::write(raw.join(".DS_Store"), b"").unwrap();

        let mut session = CurationSession::new(Arc::new(FixedExperiment::new(tmp.path(), "e")));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener = FnSubscriber::new(move |event: &Event| {
            sink.lock().push(*event);
            Ok(())
        });
        let _raw_sub = session
            .publisher()
            .subscribe(EventKind::CurationRawSelected, &listener, None);
        let _count_sub = session
            .publisher()
            .subscribe(EventKind::ChannelCountSet, &listener, None);

        let service = CurationService::new(Arc::new(DimsReader));
        let files = service
            .select_directory(&mut session, CurationImageType::Raw, &raw)
            .unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(session.num_images(), 2);
        assert_eq!(session.image_directory(CurationImageType::Raw), Some(raw.as_path()));
        assert_eq!(session.channel_count(CurationImageType::Raw), Some(4));
        assert_eq!(
            *seen.lock(),
            vec![
                Event::ChannelCountSet(CurationImageType::Raw),
                Event::CurationRawSelected
            ]
        );
    }

    #[test]
    fn test_failed_probe_leaves_session_untouched() {
        let tmp = TempDir::new().unwrap();
        let raw = tmp.path().join("raw");
        populate(&raw, "raw", 2);

        let mut session = CurationSession::new(Arc::new(FixedExperiment::new(tmp.path(), "e")));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener = FnSubscriber::new(move |event: &Event| {
            sink.lock().push(*event);
            Ok(())
        });
        let _dir_sub = session
            .publisher()
            .subscribe(EventKind::ImageDirectorySet, &listener, None);

        let service = CurationService::new(Arc::new(BrokenHeaderReader));
        let err = service
            .select_directory(&mut session, CurationImageType::Raw, &raw)
            .unwrap_err();

        assert!(matches!(err, CurateError::ImageLoad { .. }));
        assert!(session.image_directory(CurationImageType::Raw).is_none());
        assert!(session.image_directory_paths(CurationImageType::Raw).is_none());
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_default_reader_does_not_probe_contents() {
        let tmp = TempDir::new().unwrap();
        let raw = tmp.path().join("raw");
        fs::create_dir_all(&raw).unwrap();
        // Empty files cannot be read, but selecting them needs no read.
        fs::write(raw.join("a.tiff"), b"").unwrap();
        fs::write(raw.join("b.tiff"), b"").unwrap();

        let mut session = CurationSession::new(Arc::new(FixedExperiment::new(tmp.path(), "e")));
        let files = CurationService::default()
            .select_directory(&mut session, CurationImageType::Raw, &raw)
            .unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(session.channel_count(CurationImageType::Raw), None);
    }

    #[test]
    fn test_save_writes_csv_and_sets_flag() {
        let tmp = TempDir::new().unwrap();
        let service = CurationService::default();
        let mut session = CurationSession::new(Arc::new(FixedExperiment::new(tmp.path(), "e")));
        populate(&tmp.path().join("raw"), "raw", 1);
        populate(&tmp.path().join("seg1"), "seg1", 1);
        service
            .select_directory(&mut session, CurationImageType::Raw, tmp.path().join("raw"))
            .unwrap();
        service
            .select_directory(&mut session, CurationImageType::Seg1, tmp.path().join("seg1"))
            .unwrap();
        session.set_current_view(CurationView::MainView).unwrap();
        session.start_loading_images().unwrap();

        assert_eq!(service.save(&mut session).unwrap(), 1);
        assert!(session.is_saved_to_disk());
        assert!(tmp.path().join("e").join("data").join("train.csv").exists());
    }

    #[test]
    fn test_save_splits_writes_all_three_files() {
        let tmp = TempDir::new().unwrap();
        let service = CurationService::default();
        let mut session = CurationSession::new(Arc::new(FixedExperiment::new(tmp.path(), "e")));
        populate(&tmp.path().join("raw"), "raw", 2);
        populate(&tmp.path().join("seg1"), "seg1", 2);
        service
            .select_directory(&mut session, CurationImageType::Raw, tmp.path().join("raw"))
            .unwrap();
        service
            .select_directory(&mut session, CurationImageType::Seg1, tmp.path().join("seg1"))
            .unwrap();
        session.set_current_view(CurationView::MainView).unwrap();
        session.start_loading_images().unwrap();

        let written = service.save_splits(&mut session).unwrap();
        let data = tmp.path().join("e").join("data");
        assert_eq!(
            written,
            vec![data.join("train.csv"), data.join("valid.csv"), data.join("test.csv")]
        );
        assert!(session.is_saved_to_disk());
        assert_eq!(
            fs::read_to_string(data.join("test.csv")).unwrap(),
            fs::read_to_string(data.join("train.csv")).unwrap()
        );
    }

    #[test]
    fn test_save_outside_main_view_is_error() {
        let tmp = TempDir::new().unwrap();
        let mut session = CurationSession::new(Arc::new(FixedExperiment::new(tmp.path(), "e")));
        assert!(CurationService::default().save(&mut session).is_err());
        assert!(!session.is_saved_to_disk());
    }
}
