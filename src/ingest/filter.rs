// Event filter: keep target detections only

use super::archive::EventMetadata;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Keep,
    Drop { label: String },
}

impl FilterDecision {
    pub fn is_keep(&self) -> bool {
        matches!(self, FilterDecision::Keep)
    }
}

/// Keeps events whose predicted label equals the target label exactly.
/// Everything else is dropped, including the classifier's bright-frame
/// false positives.
#[derive(Debug, Clone)]
pub struct EventFilter {
    target_label: String,
}

impl EventFilter {
    pub fn new(target_label: impl Into<String>) -> Self {
        Self {
            target_label: target_label.into(),
        }
    }

    pub fn decide(&self, metadata: &EventMetadata) -> FilterDecision {
        if metadata.predicted_class_label == self.target_label {
            FilterDecision::Keep
        } else {
            FilterDecision::Drop {
                label: metadata.predicted_class_label.clone(),
            }
        }
    }
}
