//! Background image loading.
//!
//! A [`LoaderPool`] reads files on worker threads and hands the results back
//! to the thread that owns the [`CurationSession`], which applies them with
//! [`CurationSession::fill_image_data`]. Workers never touch the session.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, warn};

use crate::error::{CurateError, Result};

use super::record::{CurationImageType, ImageData, ImageDims};
use super::session::{CurationSession, LoadRequest};

/// Reads one image file.
pub trait ImageReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<ImageData>;

    /// Dimensions of the image at `path`, if the reader can tell without
    /// loading the pixel data.
    fn dims(&self, _path: &Path) -> Result<Option<ImageDims>> {
        Ok(None)
    }
}

/// Reads the raw bytes of a file without decoding them.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileBytesReader;

impl ImageReader for FileBytesReader {
    fn read(&self, path: &Path) -> Result<ImageData> {
        let bytes = fs::read(path).map_err(|e| CurateError::io(path, e))?;
        if bytes.is_empty() {
            return Err(CurateError::ImageLoad {
                path: path.to_path_buf(),
                message: "file is empty".to_string(),
            });
        }
        Ok(ImageData::new(path, bytes))
    }
}

enum Job {
    Load(LoadRequest),
    Shutdown,
}

struct Completed {
    request: LoadRequest,
    result: Result<ImageData>,
}

/// Worker threads that read files for a session.
pub struct LoaderPool {
    job_tx: Sender<Job>,
    completed_rx: Receiver<Completed>,
    workers: Vec<JoinHandle<()>>,
    // (generation, slot) pairs submitted and not yet applied.
    in_flight: HashSet<(u64, CurationImageType)>,
}

impl LoaderPool {
    /// Start `workers` threads (at least one) reading with `reader`.
    pub fn new(reader: Arc<dyn ImageReader>, workers: usize) -> Result<Self> {
        let (job_tx, job_rx) = unbounded::<Job>();
        let (completed_tx, completed_rx) = unbounded::<Completed>();

        let count = workers.max(1);
        let mut handles = Vec::with_capacity(count);
        for i in 0..count {
            let rx = job_rx.clone();
            let tx = completed_tx.clone();
            let reader = Arc::clone(&reader);
            let handle = thread::Builder::new()
                .name(format!("segcurate-loader-{}", i))
                .spawn(move || worker_thread(rx, tx, reader))
                .map_err(|e| CurateError::Worker(format!("failed to spawn loader thread: {}", e)))?;
            handles.push(handle);
        }
        debug!(workers = count, "started loader pool");

        Ok(Self {
            job_tx,
            completed_rx,
            workers: handles,
            in_flight: HashSet::new(),
        })
    }

    /// Queue requests. Requests already in flight are skipped.
    ///
    /// Returns the number of requests queued.
    pub fn submit(&mut self, requests: Vec<LoadRequest>) -> Result<usize> {
        let mut queued = 0;
        for request in requests {
            if !self.in_flight.insert((request.generation, request.image_type)) {
                continue;
            }
            self.job_tx
                .send(Job::Load(request))
                .map_err(|_| CurateError::Worker("loader threads have stopped".to_string()))?;
            queued += 1;
        }
        Ok(queued)
    }

    /// Queue everything the session is still waiting for.
    pub fn request_pending(&mut self, session: &CurationSession) -> Result<usize> {
        self.submit(session.pending_loads())
    }

    /// Number of requests submitted whose results have not been applied.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Apply results to `session` until it has finished loading.
    ///
    /// Results for buffers the session has since discarded are dropped. A
    /// read failure is returned after its request is retired, so calling
    /// `pump` again continues with the remaining results.
    pub fn pump(&mut self, session: &mut CurationSession) -> Result<()> {
        while session.is_loading_images() {
            if self.in_flight.is_empty() {
                return Err(CurateError::Precondition(
                    "Session is waiting for images that were never requested".to_string(),
                ));
            }

            let completed = self
                .completed_rx
                .recv()
                .map_err(|_| CurateError::Worker("loader threads have stopped".to_string()))?;
            let LoadRequest {
                generation,
                image_type,
                ..
            } = completed.request;
            self.in_flight.remove(&(generation, image_type));

            match session.fill_image_data(generation, image_type, completed.result?) {
                Ok(()) => {}
                Err(CurateError::StaleBuffer { .. }) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

fn worker_thread(job_rx: Receiver<Job>, completed_tx: Sender<Completed>, reader: Arc<dyn ImageReader>) {
    for job in job_rx.iter() {
        let request = match job {
            Job::Load(request) => request,
            Job::Shutdown => break,
        };
        let result = reader.read(&request.path);
        if let Err(e) = &result {
            warn!(path = %request.path.display(), error = %e, "image load failed");
        }
        if completed_tx.send(Completed { request, result }).is_err() {
            break;
        }
    }
}

impl Drop for LoaderPool {
    fn drop(&mut self) {
        for _ in 0..self.workers.len() {
            let _ = self.job_tx.send(Job::Shutdown);
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for LoaderPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderPool")
            .field("workers", &self.workers.len())
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curation::record::CurationView;
    use crate::experiments::FixedExperiment;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn session_in(dir: &TempDir, n: usize) -> CurationSession {
        let mut raw = Vec::new();
        let mut seg1 = Vec::new();
        for i in 0..n {
            let r = dir.path().join(format!("raw_{}.tiff", i));
            let s = dir.path().join(format!("seg1_{}.tiff", i));
            fs::write(&r, format!("raw {}", i)).unwrap();
            fs::write(&s, format!("seg1 {}", i)).unwrap();
            raw.push(r);
            seg1.push(s);
        }
        let mut session = CurationSession::new(Arc::new(FixedExperiment::new(dir.path(), "e")));
        session.set_image_directory_paths(CurationImageType::Raw, raw);
        session.set_image_directory_paths(CurationImageType::Seg1, seg1);
        session.set_current_view(CurationView::MainView).unwrap();
        session
    }

    #[test]
    fn test_file_bytes_reader_missing_file() {
        let err = FileBytesReader
            .read(Path::new("/no/such/image.tiff"))
            .unwrap_err();
        assert!(matches!(err, CurateError::Io { .. }));
    }

    #[test]
    fn test_pump_fills_current_and_next() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir, 3);
        let mut pool = LoaderPool::new(Arc::new(FileBytesReader), 2).unwrap();

        session.start_loading_images().unwrap();
        assert_eq!(pool.request_pending(&session).unwrap(), 4);
        pool.pump(&mut session).unwrap();

        assert!(!session.is_loading_images());
        assert_eq!(pool.in_flight(), 0);
        let raw = session.curr_image_data(CurationImageType::Raw).unwrap();
        assert_eq!(&*raw.bytes, b"raw 0");
    }

    #[test]
    fn test_duplicate_requests_are_skipped() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir, 2);
        let mut pool = LoaderPool::new(Arc::new(FileBytesReader), 1).unwrap();

        session.start_loading_images().unwrap();
        let first = pool.request_pending(&session).unwrap();
        assert_eq!(pool.request_pending(&session).unwrap(), 0);
        assert_eq!(pool.in_flight(), first);
        pool.pump(&mut session).unwrap();
    }

    #[test]
    fn test_pump_without_requests_is_error() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir, 2);
        let mut pool = LoaderPool::new(Arc::new(FileBytesReader), 1).unwrap();

        session.start_loading_images().unwrap();
        assert!(matches!(
            pool.pump(&mut session),
            Err(CurateError::Precondition(_))
        ));
    }

    #[test]
    fn test_read_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir, 1);
        fs::remove_file(dir.path().join("seg1_0.tiff")).unwrap();
        let mut pool = LoaderPool::new(Arc::new(FileBytesReader), 1).unwrap();

        session.start_loading_images().unwrap();
        pool.request_pending(&session).unwrap();
        let err = pool.pump(&mut session).unwrap_err();
        assert!(err.to_string().contains("seg1_0.tiff"));
        assert!(session.is_loading_curr_images());
    }

    #[test]
    fn test_stale_results_are_dropped() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir, 2);
        let mut pool = LoaderPool::new(Arc::new(FileBytesReader), 1).unwrap();

        session.start_loading_images().unwrap();
        pool.request_pending(&session).unwrap();
        // Restarting discards the buffers the queued requests target.
        session.start_loading_images().unwrap();
        pool.request_pending(&session).unwrap();
        pool.pump(&mut session).unwrap();

        assert!(!session.is_loading_images());
        assert_eq!(
            session.curr_image_data(CurationImageType::Seg1).unwrap().path,
            PathBuf::from(dir.path().join("seg1_0.tiff"))
        );
    }
}
