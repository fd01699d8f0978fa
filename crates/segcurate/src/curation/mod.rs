//! Image curation for segmentation training data.
//!
//! A user pairs a directory of raw images with one or two directories of
//! candidate segmentations, steps through the triples, marks which ones to
//! keep, and saves the selection as the experiment's `train.csv`.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use segcurate::curation::{
//!     CurationImageType, CurationService, CurationSession, CurationView, FileBytesReader,
//!     LoaderPool,
//! };
//! use segcurate::FixedExperiment;
//!
//! # fn main() -> segcurate::Result<()> {
//! let mut session = CurationSession::new(Arc::new(FixedExperiment::new("/data/experiments", "exp1")));
//! let service = CurationService::default();
//! service.select_directory(&mut session, CurationImageType::Raw, "/data/raw")?;
//! service.select_directory(&mut session, CurationImageType::Seg1, "/data/seg1")?;
//!
//! session.set_current_view(CurationView::MainView)?;
//! let mut loader = LoaderPool::new(Arc::new(FileBytesReader), 3)?;
//! session.start_loading_images()?;
//! loader.request_pending(&session)?;
//! loader.pump(&mut session)?;
//!
//! while session.has_next_image() {
//!     session.next_image()?;
//!     loader.request_pending(&session)?;
//!     loader.pump(&mut session)?;
//! }
//! service.save(&mut session)?;
//! # Ok(())
//! # }
//! ```

mod buffer;
mod files;
mod loader;
mod persistence;
mod record;
mod service;
mod session;

pub use buffer::ImageBuffer;
pub use files::list_image_files;
pub use loader::{FileBytesReader, ImageReader, LoaderPool};
pub use persistence::{
    CSV_HEADER, CsvRecordRow, SPLIT_FILES, read_curation_record, write_curation_record,
    write_split_records,
};
pub use record::{
    CurationImageType, CurationRecord, CurationView, ExcludingMask, ImageData, ImageDims,
    ImageTypeMap, MergingMask,
};
pub use service::CurationService;
pub use session::{BufferRole, CurationSession, LoadRequest};
