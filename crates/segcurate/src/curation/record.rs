//! Curation records and the small closed types they are built from.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// The kinds of image a curation session works over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurationImageType {
    /// The raw microscopy image.
    Raw,
    /// First candidate segmentation.
    Seg1,
    /// Optional second candidate segmentation.
    Seg2,
}

impl CurationImageType {
    /// Every image type, in slot order.
    pub const ALL: [CurationImageType; 3] = [
        CurationImageType::Raw,
        CurationImageType::Seg1,
        CurationImageType::Seg2,
    ];

    /// Slot index of this type in fixed-size per-type arrays.
    pub const fn index(self) -> usize {
        match self {
            CurationImageType::Raw => 0,
            CurationImageType::Seg1 => 1,
            CurationImageType::Seg2 => 2,
        }
    }

    /// Bit for this type in a filled/expected mask.
    pub const fn bit(self) -> u8 {
        1 << self.index()
    }

    /// Lowercase name, as used in settings and record files.
    pub fn as_str(self) -> &'static str {
        match self {
            CurationImageType::Raw => "raw",
            CurationImageType::Seg1 => "seg1",
            CurationImageType::Seg2 => "seg2",
        }
    }

    /// The image types a session expects, depending on whether seg2 is configured.
    pub fn expected(with_seg2: bool) -> &'static [CurationImageType] {
        if with_seg2 {
            &Self::ALL
        } else {
            &[CurationImageType::Raw, CurationImageType::Seg1]
        }
    }
}

impl fmt::Display for CurationImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two screens of a curation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurationView {
    /// Directory and channel selection.
    #[default]
    InputView,
    /// Image-by-image curation.
    MainView,
}

/// One optional value per [`CurationImageType`], stored in a fixed array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTypeMap<T> {
    slots: [Option<T>; 3],
}

impl<T> Default for ImageTypeMap<T> {
    fn default() -> Self {
        Self {
            slots: [None, None, None],
        }
    }
}

impl<T> ImageTypeMap<T> {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value for `image_type`.
    pub fn get(&self, image_type: CurationImageType) -> Option<&T> {
        self.slots[image_type.index()].as_ref()
    }

    /// Set the value for `image_type`, returning the previous one.
    pub fn set(&mut self, image_type: CurationImageType, value: T) -> Option<T> {
        self.slots[image_type.index()].replace(value)
    }

    /// Clear the value for `image_type`.
    pub fn take(&mut self, image_type: CurationImageType) -> Option<T> {
        self.slots[image_type.index()].take()
    }

    /// Whether a value is set for `image_type`.
    pub fn contains(&self, image_type: CurationImageType) -> bool {
        self.slots[image_type.index()].is_some()
    }

    /// Iterate over the set values with their types.
    pub fn iter(&self) -> impl Iterator<Item = (CurationImageType, &T)> {
        CurationImageType::ALL
            .iter()
            .filter_map(move |t| self.get(*t).map(|v| (*t, v)))
    }
}

/// Raster mask of pixels to exclude from training, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludingMask {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<bool>,
}

impl ExcludingMask {
    /// Create an all-clear mask.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![false; width * height],
        }
    }

    /// Number of excluded pixels.
    pub fn excluded_count(&self) -> usize {
        self.pixels.iter().filter(|p| **p).count()
    }
}

/// Vector shapes marking regions where seg1 and seg2 should be merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergingMask {
    /// Closed polygons as `[y, x]` vertices.
    pub polygons: Vec<Vec<[f64; 2]>>,
}

impl MergingMask {
    /// Create a mask from polygons.
    pub fn new(polygons: Vec<Vec<[f64; 2]>>) -> Self {
        Self { polygons }
    }
}

/// Decisions about one image triple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurationRecord {
    /// Raw image path.
    pub raw_file: PathBuf,
    /// First segmentation path.
    pub seg1: PathBuf,
    /// Second segmentation path, when the session has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seg2: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluding_mask: Option<ExcludingMask>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merging_mask: Option<MergingMask>,
    /// Which segmentation the training label is based on.
    pub base_image: CurationImageType,
    /// Whether this image goes into the training set.
    pub to_use: bool,
}

impl CurationRecord {
    /// A fresh record: seg1 as base image, no masks, not yet included.
    pub fn new(raw_file: PathBuf, seg1: PathBuf, seg2: Option<PathBuf>) -> Self {
        Self {
            raw_file,
            seg1,
            seg2,
            excluding_mask: None,
            merging_mask: None,
            base_image: CurationImageType::Seg1,
            to_use: false,
        }
    }

    /// Path of the file of the given type.
    pub fn path(&self, image_type: CurationImageType) -> Option<&Path> {
        match image_type {
            CurationImageType::Raw => Some(&self.raw_file),
            CurationImageType::Seg1 => Some(&self.seg1),
            CurationImageType::Seg2 => self.seg2.as_deref(),
        }
    }
}

/// Dimensions of decoded image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDims {
    pub channels: usize,
    pub z: usize,
    pub y: usize,
    pub x: usize,
}

/// Payload produced by an image loader for one file.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    /// File the data came from.
    pub path: PathBuf,
    /// Decoded (or raw) bytes.
    pub bytes: Arc<[u8]>,
    /// Known dimensions, if the loader decoded the image.
    pub dims: Option<ImageDims>,
}

impl ImageData {
    /// Create image data without dimension information.
    pub fn new(path: impl Into<PathBuf>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
            dims: None,
        }
    }

    /// Attach dimensions.
    pub fn with_dims(mut self, dims: ImageDims) -> Self {
        self.dims = Some(dims);
        self
    }
}
