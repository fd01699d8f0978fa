//! The closed vocabulary of events exchanged between models and views.
//!
//! Subscriptions are keyed by [`EventKind`]; the [`Event`] value passed to
//! handlers may carry a small payload (which image type changed, whether a
//! save succeeded, how far training got).

use serde::{Deserialize, Serialize};

use crate::curation::CurationImageType;

/// A semantic occurrence that a [`Publisher`](crate::Publisher) can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Event {
    // Navigation between top-level views.
    ChangeView,
    MainSelected,
    TrainingSelected,
    PredictionSelected,

    // Experiment and training state.
    ExperimentSelected,
    TrainingDatasetSelected,
    TrainingMaxChannelsSet,
    ProcessTraining,
    /// Training reached the given epoch.
    TrainingProgress(u32),

    // Prediction settings.
    PredictionModelFile,
    PredictionPreprocessingMethod,
    PredictionPostprocessingMethod,
    PredictionPostprocessingSimpleThreshold,
    PredictionPostprocessingAutoThreshold,

    // Curation input selection.
    CurationRawSelected,
    CurationSeg1Selected,
    CurationSeg2Selected,

    // Curation session signals.
    CurrentViewChanged,
    ImageDirectorySet(CurationImageType),
    ChannelCountSet(CurationImageType),
    CursorMoved,
    ImageLoadingFinished,
    SaveToDiskRequested,
    /// A save attempt finished; `true` when the record reached disk.
    SavedToDisk(bool),
}

/// Payload-free discriminant of an [`Event`], used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    ChangeView,
    MainSelected,
    TrainingSelected,
    PredictionSelected,
    ExperimentSelected,
    TrainingDatasetSelected,
    TrainingMaxChannelsSet,
    ProcessTraining,
    TrainingProgress,
    PredictionModelFile,
    PredictionPreprocessingMethod,
    PredictionPostprocessingMethod,
    PredictionPostprocessingSimpleThreshold,
    PredictionPostprocessingAutoThreshold,
    CurationRawSelected,
    CurationSeg1Selected,
    CurationSeg2Selected,
    CurrentViewChanged,
    ImageDirectorySet,
    ChannelCountSet,
    CursorMoved,
    ImageLoadingFinished,
    SaveToDiskRequested,
    SavedToDisk,
}

impl Event {
    /// The subscription key for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ChangeView => EventKind::ChangeView,
            Event::MainSelected => EventKind::MainSelected,
            Event::TrainingSelected => EventKind::TrainingSelected,
            Event::PredictionSelected => EventKind::PredictionSelected,
            Event::ExperimentSelected => EventKind::ExperimentSelected,
            Event::TrainingDatasetSelected => EventKind::TrainingDatasetSelected,
            Event::TrainingMaxChannelsSet => EventKind::TrainingMaxChannelsSet,
            Event::ProcessTraining => EventKind::ProcessTraining,
            Event::TrainingProgress(_) => EventKind::TrainingProgress,
            Event::PredictionModelFile => EventKind::PredictionModelFile,
            Event::PredictionPreprocessingMethod => EventKind::PredictionPreprocessingMethod,
            Event::PredictionPostprocessingMethod => EventKind::PredictionPostprocessingMethod,
            Event::PredictionPostprocessingSimpleThreshold => {
                EventKind::PredictionPostprocessingSimpleThreshold
            }
            Event::PredictionPostprocessingAutoThreshold => {
                EventKind::PredictionPostprocessingAutoThreshold
            }
            Event::CurationRawSelected => EventKind::CurationRawSelected,
            Event::CurationSeg1Selected => EventKind::CurationSeg1Selected,
            Event::CurationSeg2Selected => EventKind::CurationSeg2Selected,
            Event::CurrentViewChanged => EventKind::CurrentViewChanged,
            Event::ImageDirectorySet(_) => EventKind::ImageDirectorySet,
            Event::ChannelCountSet(_) => EventKind::ChannelCountSet,
            Event::CursorMoved => EventKind::CursorMoved,
            Event::ImageLoadingFinished => EventKind::ImageLoadingFinished,
            Event::SaveToDiskRequested => EventKind::SaveToDiskRequested,
            Event::SavedToDisk(_) => EventKind::SavedToDisk,
        }
    }

    /// The image type an image-scoped event refers to, if any.
    pub fn image_type(&self) -> Option<CurationImageType> {
        match self {
            Event::ImageDirectorySet(t) | Event::ChannelCountSet(t) => Some(*t),
            Event::CurationRawSelected => Some(CurationImageType::Raw),
            Event::CurationSeg1Selected => Some(CurationImageType::Seg1),
            Event::CurationSeg2Selected => Some(CurationImageType::Seg2),
            _ => None,
        }
    }

    /// The "directory selected" event for an image type.
    pub fn directory_selected(image_type: CurationImageType) -> Self {
        match image_type {
            CurationImageType::Raw => Event::CurationRawSelected,
            CurationImageType::Seg1 => Event::CurationSeg1Selected,
            CurationImageType::Seg2 => Event::CurationSeg2Selected,
        }
    }
}

impl From<Event> for EventKind {
    fn from(event: Event) -> Self {
        event.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_events_share_kind() {
        assert_eq!(
            Event::ImageDirectorySet(CurationImageType::Raw).kind(),
            Event::ImageDirectorySet(CurationImageType::Seg2).kind()
        );
        assert_eq!(Event::SavedToDisk(true).kind(), EventKind::SavedToDisk);
        assert_eq!(Event::TrainingProgress(4).kind(), EventKind::TrainingProgress);
    }

    #[test]
    fn test_image_type_payload() {
        assert_eq!(
            Event::ChannelCountSet(CurationImageType::Seg1).image_type(),
            Some(CurationImageType::Seg1)
        );
        assert_eq!(Event::CursorMoved.image_type(), None);
        assert_eq!(
            Event::directory_selected(CurationImageType::Seg2),
            Event::CurationSeg2Selected
        );
    }
}
