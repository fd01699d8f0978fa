//! The curation session state machine.
//!
//! ```text
//!              set_current_view(MainView)          start_loading_images()
//!  InputView ─────────────────────────────▶ MainView ───────────────────▶ cursor = 0
//!      ▲        (records built, buffers          │                          │
//!      │         allocated as placeholders)      │                          │ next_image()
//!      └─────────────────────────────────────────┘                          ▼
//!              set_current_view(InputView)                              cursor + 1
//! ```
//!
//! Image data is double buffered. While the user curates the image under the
//! cursor, the loader prefetches the next one; `next_image()` hands the
//! prefetched buffer over as the new current buffer. The session performs no
//! I/O itself: loaders call [`CurationSession::set_curr_image_data`],
//! [`CurationSession::set_next_image_data`] or
//! [`CurationSession::fill_image_data`], and the session emits
//! [`Event::ImageLoadingFinished`] once both buffers are complete.
//!
//! All mutation happens on one thread. Worker threads must hand their results
//! back to that thread (see [`LoaderPool`](super::LoaderPool)).

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::CurationConfig;
use crate::error::{CurateError, Result};
use crate::event::Event;
use crate::experiments::ExperimentsResolver;
use crate::publisher::Publisher;

use super::buffer::ImageBuffer;
use super::record::{
    CurationImageType, CurationRecord, CurationView, ExcludingMask, ImageData, ImageTypeMap,
    MergingMask,
};

/// Which half of the double buffer a load is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferRole {
    Current,
    Next,
}

/// One file the loader still has to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    /// Generation of the buffer the result must be written to.
    pub generation: u64,
    /// Buffer the request was issued for.
    pub role: BufferRole,
    /// Slot to fill.
    pub image_type: CurationImageType,
    /// File to read.
    pub path: PathBuf,
}

/// State of one curation session.
pub struct CurationSession {
    config: CurationConfig,
    experiments: Arc<dyn ExperimentsResolver>,
    publisher: Publisher,

    current_view: CurationView,
    image_directories: ImageTypeMap<PathBuf>,
    image_directory_paths: ImageTypeMap<Vec<PathBuf>>,
    selected_channels: ImageTypeMap<usize>,
    channel_counts: ImageTypeMap<usize>,

    records: Option<Vec<CurationRecord>>,
    // None until start_loading_images.
    cursor: Option<usize>,
    current: Option<Arc<ImageBuffer>>,
    next: Option<Arc<ImageBuffer>>,
    last_generation: u64,
    saved_to_disk: bool,
}

impl fmt::Debug for CurationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurationSession")
            .field("current_view", &self.current_view)
            .field("num_records", &self.records.as_ref().map(Vec::len))
            .field("cursor", &self.cursor)
            .field("current", &self.current)
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}

impl CurationSession {
    /// Create a session in the input view.
    pub fn new(experiments: Arc<dyn ExperimentsResolver>) -> Self {
        Self::with_config(experiments, CurationConfig::default())
    }

    /// Create a session with custom configuration.
    pub fn with_config(experiments: Arc<dyn ExperimentsResolver>, config: CurationConfig) -> Self {
        Self {
            config,
            experiments,
            publisher: Publisher::new(),
            current_view: CurationView::InputView,
            image_directories: ImageTypeMap::new(),
            image_directory_paths: ImageTypeMap::new(),
            selected_channels: ImageTypeMap::new(),
            channel_counts: ImageTypeMap::new(),
            records: None,
            cursor: None,
            current: None,
            next: None,
            last_generation: 0,
            saved_to_disk: false,
        }
    }

    /// Publisher for this session's events.
    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    /// Session configuration.
    pub fn config(&self) -> &CurationConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Input configuration
    // ------------------------------------------------------------------

    /// Record the directory chosen for `image_type`.
    pub fn set_image_directory(
        &mut self,
        image_type: CurationImageType,
        dir: impl Into<PathBuf>,
    ) -> Result<()> {
        self.image_directories.set(image_type, dir.into());
        self.publisher
            .dispatch(&Event::ImageDirectorySet(image_type))
    }

    pub fn image_directory(&self, image_type: CurationImageType) -> Option<&Path> {
        self.image_directories.get(image_type).map(PathBuf::as_path)
    }

    /// Record the (sorted) files found in the directory for `image_type`.
    pub fn set_image_directory_paths(&mut self, image_type: CurationImageType, paths: Vec<PathBuf>) {
        self.image_directory_paths.set(image_type, paths);
    }

    pub fn image_directory_paths(&self, image_type: CurationImageType) -> Option<&[PathBuf]> {
        self.image_directory_paths
            .get(image_type)
            .map(Vec::as_slice)
    }

    /// Forget every input setting for `image_type` (e.g. dropping seg2).
    pub fn clear_image_type(&mut self, image_type: CurationImageType) {
        self.image_directories.take(image_type);
        self.image_directory_paths.take(image_type);
        self.selected_channels.take(image_type);
        self.channel_counts.take(image_type);
    }

    pub fn set_selected_channel(&mut self, image_type: CurationImageType, channel: usize) {
        self.selected_channels.set(image_type, channel);
    }

    pub fn selected_channel(&self, image_type: CurationImageType) -> Option<usize> {
        self.selected_channels.get(image_type).copied()
    }

    /// Record how many channels the images of `image_type` have.
    pub fn set_channel_count(&mut self, image_type: CurationImageType, count: usize) -> Result<()> {
        self.channel_counts.set(image_type, count);
        self.publisher.dispatch(&Event::ChannelCountSet(image_type))
    }

    pub fn channel_count(&self, image_type: CurationImageType) -> Option<usize> {
        self.channel_counts.get(image_type).copied()
    }

    /// Whether the session curates seg2 images.
    ///
    /// In the main view this is fixed by the records built on entry; input
    /// changes made meanwhile only apply after returning to the input view.
    pub fn has_seg2_data(&self) -> bool {
        match self.records.as_deref() {
            Some(records) => records.first().is_some_and(|r| r.seg2.is_some()),
            None => self.image_directory_paths.contains(CurationImageType::Seg2),
        }
    }

    /// Number of image triples: the record count in the main view, the raw
    /// listing otherwise.
    pub fn num_images(&self) -> usize {
        match self.records.as_deref() {
            Some(records) => records.len(),
            None => self
                .image_directory_paths(CurationImageType::Raw)
                .map_or(0, <[PathBuf]>::len),
        }
    }

    // ------------------------------------------------------------------
    // View transitions
    // ------------------------------------------------------------------

    pub fn current_view(&self) -> CurationView {
        self.current_view
    }

    /// Switch views.
    ///
    /// Entering the main view validates the directory listings and builds the
    /// record list; on a validation error nothing changes. Leaving it drops
    /// the records and both buffers. Setting the current view again is a no-op.
    pub fn set_current_view(&mut self, view: CurationView) -> Result<()> {
        if view == self.current_view {
            return Ok(());
        }

        match view {
            CurationView::MainView => {
                let records = self.generate_curation_record()?;
                let with_seg2 = records.first().is_some_and(|r| r.seg2.is_some());
                info!(
                    images = records.len(),
                    with_seg2, "entering main curation view"
                );
                self.records = Some(records);
                self.current = Some(Arc::new(ImageBuffer::placeholder(
                    self.fresh_generation(),
                    with_seg2,
                )));
                self.next = Some(Arc::new(ImageBuffer::placeholder(
                    self.fresh_generation(),
                    with_seg2,
                )));
                self.saved_to_disk = false;
            }
            CurationView::InputView => {
                info!("returning to curation input view");
                self.records = None;
                self.cursor = None;
                self.current = None;
                self.next = None;
            }
        }

        self.current_view = view;
        self.publisher.dispatch(&Event::CurrentViewChanged)
    }

    fn generate_curation_record(&self) -> Result<Vec<CurationRecord>> {
        let raw = self
            .image_directory_paths(CurationImageType::Raw)
            .unwrap_or_default();
        let seg1 = self
            .image_directory_paths(CurationImageType::Seg1)
            .unwrap_or_default();
        let seg2 = self.image_directory_paths(CurationImageType::Seg2);

        if raw.len() != seg1.len() || seg2.is_some_and(|s| s.len() != seg1.len()) {
            return Err(CurateError::Configuration(
                "provided image dirs must be of same length".to_string(),
            ));
        }
        if raw.is_empty() {
            return Err(CurateError::Configuration(
                "cannot load images from empty image dir".to_string(),
            ));
        }

        let base_image = self.config.default_base_image;
        Ok(raw
            .iter()
            .zip(seg1)
            .enumerate()
            .map(|(i, (raw, seg1))| {
                let mut record = CurationRecord::new(
                    raw.clone(),
                    seg1.clone(),
                    seg2.map(|s| s[i].clone()),
                );
                record.base_image = base_image;
                record
            })
            .collect())
    }

    /// The record list; `None` outside the main view.
    pub fn curation_record(&self) -> Option<&[CurationRecord]> {
        self.records.as_deref()
    }

    // ------------------------------------------------------------------
    // Loading protocol
    // ------------------------------------------------------------------

    /// Position the cursor on the first image and request its data.
    ///
    /// Emits [`Event::CursorMoved`] immediately and
    /// [`Event::ImageLoadingFinished`] once the loader has filled the buffers.
    pub fn start_loading_images(&mut self) -> Result<()> {
        if self.records.is_none() {
            return Err(CurateError::Precondition(
                "Images can only be loaded in the main view".to_string(),
            ));
        }

        let with_seg2 = self.has_seg2_data();
        self.cursor = Some(0);
        self.set_use_image(true)?;
        self.current = Some(Arc::new(ImageBuffer::pending(
            self.fresh_generation(),
            with_seg2,
        )));
        if self.has_next_image() {
            self.next = Some(Arc::new(ImageBuffer::pending(
                self.fresh_generation(),
                with_seg2,
            )));
        }

        debug!(cursor = 0, "started loading images");
        self.publisher.dispatch(&Event::CursorMoved)
    }

    /// Advance to the prefetched next image.
    ///
    /// Fails without changing anything while a load is in flight or when the
    /// cursor is on the last image.
    pub fn next_image(&mut self) -> Result<()> {
        if self.is_loading_images() {
            return Err(CurateError::Precondition(
                "Image loader is busy. Please see image_loading_finished signal.".to_string(),
            ));
        }
        if !self.has_next_image() {
            return Err(CurateError::Precondition(
                "No next image available".to_string(),
            ));
        }

        let cursor = self.cursor.map_or(0, |c| c + 1);
        self.current = self.next.take();
        self.cursor = Some(cursor);

        let with_seg2 = self.has_seg2_data();
        let generation = self.fresh_generation();
        self.next = Some(Arc::new(if self.has_next_image() {
            ImageBuffer::pending(generation, with_seg2)
        } else {
            ImageBuffer::placeholder(generation, with_seg2)
        }));

        self.set_use_image(true)?;
        debug!(cursor, "cursor moved");
        self.publisher.dispatch(&Event::CursorMoved)?;

        // Nothing left to prefetch; the loader will never report completion.
        if !self.has_next_image() {
            self.publisher.dispatch(&Event::ImageLoadingFinished)?;
        }
        Ok(())
    }

    /// Loader callback for the image under the cursor.
    pub fn set_curr_image_data(
        &mut self,
        image_type: CurationImageType,
        data: impl Into<Arc<ImageData>>,
    ) -> Result<()> {
        let buffer = self.buffer(BufferRole::Current)?;
        buffer.fill(image_type, data.into())?;
        self.finish_if_loaded()
    }

    /// Loader callback for the prefetched next image.
    pub fn set_next_image_data(
        &mut self,
        image_type: CurationImageType,
        data: impl Into<Arc<ImageData>>,
    ) -> Result<()> {
        let buffer = self.buffer(BufferRole::Next)?;
        buffer.fill(image_type, data.into())?;
        self.finish_if_loaded()
    }

    /// Loader callback addressed by buffer generation.
    ///
    /// The write lands in whichever live buffer carries `generation`, so a
    /// prefetch that completes after `next_image()` still reaches the right
    /// buffer. Writes for a buffer that has been discarded are rejected with
    /// [`CurateError::StaleBuffer`].
    pub fn fill_image_data(
        &mut self,
        generation: u64,
        image_type: CurationImageType,
        data: impl Into<Arc<ImageData>>,
    ) -> Result<()> {
        let buffer = [self.current.as_ref(), self.next.as_ref()]
            .into_iter()
            .flatten()
            .find(|b| b.generation() == generation)
            .cloned();
        let Some(buffer) = buffer else {
            warn!(generation, %image_type, "dropping image data for a discarded buffer");
            return Err(CurateError::StaleBuffer { generation });
        };
        buffer.fill(image_type, data.into())?;
        self.finish_if_loaded()
    }

    fn finish_if_loaded(&self) -> Result<()> {
        if self.is_loading_images() {
            return Ok(());
        }
        debug!("image loading finished");
        self.publisher.dispatch(&Event::ImageLoadingFinished)
    }

    fn buffer(&self, role: BufferRole) -> Result<Arc<ImageBuffer>> {
        let buffer = match role {
            BufferRole::Current => self.current.as_ref(),
            BufferRole::Next => self.next.as_ref(),
        };
        buffer.cloned().ok_or_else(|| {
            CurateError::Precondition("Image buffers exist only in the main view".to_string())
        })
    }

    /// Loaded data of the current image.
    pub fn curr_image_data(&self, image_type: CurationImageType) -> Option<Arc<ImageData>> {
        self.current.as_ref().and_then(|b| b.get(image_type))
    }

    /// Buffer of the image under the cursor.
    pub fn current_buffer(&self) -> Option<&Arc<ImageBuffer>> {
        self.current.as_ref()
    }

    /// Prefetch buffer.
    pub fn next_buffer(&self) -> Option<&Arc<ImageBuffer>> {
        self.next.as_ref()
    }

    /// Files that still have to be loaded into the current and next buffers.
    pub fn pending_loads(&self) -> Vec<LoadRequest> {
        let (Some(records), Some(cursor)) = (self.records.as_ref(), self.cursor) else {
            return Vec::new();
        };

        let targets = [
            (BufferRole::Current, self.current.as_ref(), cursor),
            (BufferRole::Next, self.next.as_ref(), cursor + 1),
        ];

        let mut requests = Vec::new();
        for (role, buffer, index) in targets {
            let (Some(buffer), Some(record)) = (buffer, records.get(index)) else {
                continue;
            };
            for image_type in buffer.missing() {
                if let Some(path) = record.path(image_type) {
                    requests.push(LoadRequest {
                        generation: buffer.generation(),
                        role,
                        image_type,
                        path: path.to_path_buf(),
                    });
                }
            }
        }
        requests
    }

    pub fn curr_image_index(&self) -> Option<usize> {
        self.cursor
    }

    /// Whether there is an image after the one under the cursor.
    pub fn has_next_image(&self) -> bool {
        match (self.cursor, self.records.as_ref()) {
            (Some(cursor), Some(records)) => cursor + 1 < records.len(),
            _ => false,
        }
    }

    pub fn is_loading_curr_images(&self) -> bool {
        self.current.as_ref().is_some_and(|b| !b.is_complete())
    }

    pub fn is_loading_next_images(&self) -> bool {
        self.next.as_ref().is_some_and(|b| !b.is_complete())
    }

    pub fn is_loading_images(&self) -> bool {
        self.is_loading_curr_images() || self.is_loading_next_images()
    }

    fn fresh_generation(&mut self) -> u64 {
        self.last_generation += 1;
        self.last_generation
    }

    // ------------------------------------------------------------------
    // Record under the cursor
    // ------------------------------------------------------------------

    /// The record under the cursor.
    pub fn current_record(&self) -> Result<&CurationRecord> {
        match (self.cursor, self.records.as_ref()) {
            (Some(cursor), Some(records)) => records.get(cursor).ok_or_else(cursor_error),
            _ => Err(cursor_error()),
        }
    }

    fn current_record_mut(&mut self) -> Result<&mut CurationRecord> {
        match (self.cursor, self.records.as_mut()) {
            (Some(cursor), Some(records)) => records.get_mut(cursor).ok_or_else(cursor_error),
            _ => Err(cursor_error()),
        }
    }

    pub fn merging_mask(&self) -> Result<Option<&MergingMask>> {
        Ok(self.current_record()?.merging_mask.as_ref())
    }

    pub fn set_merging_mask(&mut self, mask: MergingMask) -> Result<()> {
        self.current_record_mut()?.merging_mask = Some(mask);
        Ok(())
    }

    pub fn excluding_mask(&self) -> Result<Option<&ExcludingMask>> {
        Ok(self.current_record()?.excluding_mask.as_ref())
    }

    pub fn set_excluding_mask(&mut self, mask: ExcludingMask) -> Result<()> {
        self.current_record_mut()?.excluding_mask = Some(mask);
        Ok(())
    }

    pub fn base_image(&self) -> Result<CurationImageType> {
        Ok(self.current_record()?.base_image)
    }

    pub fn set_base_image(&mut self, base: CurationImageType) -> Result<()> {
        self.current_record_mut()?.base_image = base;
        Ok(())
    }

    pub fn use_image(&self) -> Result<bool> {
        Ok(self.current_record()?.to_use)
    }

    pub fn set_use_image(&mut self, use_image: bool) -> Result<()> {
        self.current_record_mut()?.to_use = use_image;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Persistence contract
    // ------------------------------------------------------------------

    /// `<experiments>/<experiment>`, where curation masks are stored.
    pub fn save_masks_path(&self) -> Result<PathBuf> {
        self.experiments.experiment_path()
    }

    /// `<experiments>/<experiment>/data/train.csv`.
    pub fn csv_path(&self) -> Result<PathBuf> {
        Ok(self
            .experiments
            .experiment_path()?
            .join("data")
            .join("train.csv"))
    }

    /// Ask whoever owns persistence to write the record.
    pub fn request_save(&self) -> Result<()> {
        self.publisher.dispatch(&Event::SaveToDiskRequested)
    }

    /// Report the outcome of a save.
    pub fn set_saved_to_disk(&mut self, saved: bool) -> Result<()> {
        self.saved_to_disk = saved;
        self.publisher.dispatch(&Event::SavedToDisk(saved))
    }

    /// Whether the record of this main-view session has been written.
    pub fn is_saved_to_disk(&self) -> bool {
        self.saved_to_disk
    }
}

fn cursor_error() -> CurateError {
    CurateError::Precondition(
        "No current image: call start_loading_images first".to_string(),
    )
}
