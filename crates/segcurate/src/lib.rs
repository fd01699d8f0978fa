//! Segcurate: curation of segmentation training data.
//!
//! Segcurate walks a user through pairs (or triples) of raw images and
//! candidate segmentations, records which ones are good enough to train on,
//! and writes the selection into an experiment's `data/train.csv`.
//!
//! # Core Principles
//!
//! - **Event-driven**: models publish [`Event`]s; views subscribe per [`EventKind`]
//! - **Non-blocking**: image data is double buffered and loaded off-thread
//! - **Non-destructive**: source images are never modified, only referenced
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use segcurate::{CurationImageType, CurationSession, CurationView, FixedExperiment};
//!
//! let mut session = CurationSession::new(Arc::new(FixedExperiment::new("/experiments", "exp1")));
//! session.set_image_directory_paths(CurationImageType::Raw, vec!["/raw/a.tiff".into()]);
//! session.set_image_directory_paths(CurationImageType::Seg1, vec!["/seg/a.tiff".into()]);
//! session.set_current_view(CurationView::MainView).unwrap();
//!
//! println!("Images: {}", session.num_images());
//! ```

pub mod config;
pub mod curation;
pub mod error;
pub mod event;
pub mod experiments;
pub mod metrics;
pub mod publisher;

pub use config::{CurationConfig, UserSettings};
pub use curation::{
    CurationImageType, CurationRecord, CurationService, CurationSession, CurationView,
    ImageData, LoaderPool,
};
pub use error::{CurateError, Result};
pub use event::{Event, EventKind};
pub use experiments::{ExperimentsModel, ExperimentsResolver, FixedExperiment};
pub use metrics::training_progress;
pub use publisher::{FnSubscriber, Handler, Publisher, Subscriber, Subscription, handler};
