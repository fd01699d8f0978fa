//! Generation-tagged image buffers for the current/next double buffer.
//!
//! A buffer has one write-once slot per [`CurationImageType`] and an atomic
//! bitmask of filled slots. Completeness is a single mask comparison, and
//! loaders writing disjoint slots from worker threads need no lock.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};

use crate::error::{CurateError, Result};

use super::record::{CurationImageType, ImageData};

/// Image data for one curation position.
pub struct ImageBuffer {
    generation: u64,
    expected: u8,
    filled: AtomicU8,
    slots: [OnceLock<Arc<ImageData>>; 3],
}

impl ImageBuffer {
    fn with_filled(generation: u64, with_seg2: bool, filled: bool) -> Self {
        let expected = CurationImageType::expected(with_seg2)
            .iter()
            .fold(0u8, |mask, t| mask | t.bit());
        Self {
            generation,
            expected,
            filled: AtomicU8::new(if filled { expected } else { 0 }),
            slots: [OnceLock::new(), OnceLock::new(), OnceLock::new()],
        }
    }

    /// An empty buffer waiting for a loader to fill every expected slot.
    pub fn pending(generation: u64, with_seg2: bool) -> Self {
        Self::with_filled(generation, with_seg2, false)
    }

    /// A buffer that is complete without holding data: nothing to load.
    pub fn placeholder(generation: u64, with_seg2: bool) -> Self {
        Self::with_filled(generation, with_seg2, true)
    }

    /// Generation tag assigned by the owning session.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether `image_type` is one of this buffer's slots.
    pub fn expects(&self, image_type: CurationImageType) -> bool {
        self.expected & image_type.bit() != 0
    }

    /// Whether the slot for `image_type` has been filled (or needs no data).
    pub fn is_filled(&self, image_type: CurationImageType) -> bool {
        self.filled.load(Ordering::Acquire) & image_type.bit() != 0
    }

    /// True once every expected slot is filled.
    pub fn is_complete(&self) -> bool {
        self.filled.load(Ordering::Acquire) & self.expected == self.expected
    }

    /// Expected slots that are still empty.
    pub fn missing(&self) -> Vec<CurationImageType> {
        CurationImageType::ALL
            .into_iter()
            .filter(|t| self.expects(*t) && !self.is_filled(*t))
            .collect()
    }

    /// Data for `image_type`, if loaded.
    pub fn get(&self, image_type: CurationImageType) -> Option<Arc<ImageData>> {
        self.slots[image_type.index()].get().cloned()
    }

    /// Write one slot. Returns `true` if this write completed the buffer.
    ///
    /// Slots are write-once: writing an unexpected or already filled slot
    /// is rejected.
    pub fn fill(&self, image_type: CurationImageType, data: Arc<ImageData>) -> Result<bool> {
        if !self.expects(image_type) {
            return Err(CurateError::Precondition(format!(
                "Image type {} is not part of this session",
                image_type
            )));
        }
        if self.is_filled(image_type) || self.slots[image_type.index()].set(data).is_err() {
            return Err(CurateError::Precondition(format!(
                "Image data for {} is already set",
                image_type
            )));
        }

        let previous = self.filled.fetch_or(image_type.bit(), Ordering::AcqRel);
        let now = previous | image_type.bit();
        let was_complete = previous & self.expected == self.expected;
        Ok(!was_complete && now & self.expected == self.expected)
    }
}

impl fmt::Debug for ImageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBuffer")
            .field("generation", &self.generation)
            .field("expected", &format_args!("{:03b}", self.expected))
            .field(
                "filled",
                &format_args!("{:03b}", self.filled.load(Ordering::Acquire)),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(name: &str) -> Arc<ImageData> {
        Arc::new(ImageData::new(name, vec![0u8; 4]))
    }

    #[test]
    fn test_pending_buffer_completes_after_all_expected_slots() {
        let buffer = ImageBuffer::pending(1, false);
        assert!(!buffer.is_complete());
        assert_eq!(
            buffer.missing(),
            vec![CurationImageType::Raw, CurationImageType::Seg1]
        );

        assert!(!buffer.fill(CurationImageType::Raw, data("raw")).unwrap());
        assert!(buffer.fill(CurationImageType::Seg1, data("seg1")).unwrap());
        assert!(buffer.is_complete());
        assert!(buffer.missing().is_empty());
    }

    #[test]
    fn test_placeholder_is_complete_without_data() {
        let buffer = ImageBuffer::placeholder(2, true);
        assert!(buffer.is_complete());
        assert!(buffer.get(CurationImageType::Raw).is_none());
    }

    #[test]
    fn test_slots_are_write_once() {
        let buffer = ImageBuffer::pending(3, false);
        buffer.fill(CurationImageType::Raw, data("a")).unwrap();
        let err = buffer.fill(CurationImageType::Raw, data("b")).unwrap_err();
        assert!(err.to_string().contains("already set"));
        assert_eq!(
            buffer.get(CurationImageType::Raw).unwrap().path.to_str(),
            Some("a")
        );
    }

    #[test]
    fn test_unexpected_seg2_rejected() {
        let buffer = ImageBuffer::pending(4, false);
        assert!(buffer.fill(CurationImageType::Seg2, data("s2")).is_err());
    }

    #[test]
    fn test_concurrent_disjoint_writers() {
        let buffer = Arc::new(ImageBuffer::pending(5, true));
        let handles: Vec<_> = CurationImageType::ALL
            .into_iter()
            .map(|t| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || buffer.fill(t, data(t.as_str())).unwrap())
            })
            .collect();

        let completions: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap() as usize)
            .sum();

        assert_eq!(completions, 1);
        assert!(buffer.is_complete());
    }
}
