use serde::{Deserialize, Serialize};
use crate::common::GradeBox;
use crate::detection_runners::ort_detector::nms::Nms;

/// One decoded detection. `L` is the label type of the model that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeDetection<L> {
    pub class_id: usize,
    pub label: L,
    pub confidence: f32,
    pub bbox: GradeBox,
}

impl<L> Nms for GradeDetection<L> {
    fn bbox(&self) -> &GradeBox {
        &self.bbox
    }

    fn confidence(&self) -> f32 {
        self.confidence
    }
}

impl<L> GradeDetection<L> {
    pub fn new(class_id: usize, label: L, confidence: f32, bbox: GradeBox) -> Self {
        Self {
            class_id,
            label,
            confidence,
            bbox,
        }
    }
}
