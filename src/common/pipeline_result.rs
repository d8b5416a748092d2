use serde::Serialize;
use crate::common::{
    DefectCounts, DefectLabel, Decision, GradeBox, GradeDetection, GradeError, RipenessLabel, SizeBucket,
};

/// Ranked output of a classification pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult<L> {
    /// `(label, probability)` pairs, most probable first. Probabilities sum to 1.
    pub ranked: Vec<(L, f32)>,
}

impl<L> ClassificationResult<L> {
    /// `ranked` must be non-empty and sorted by descending probability.
    pub(crate) fn from_ranked(ranked: Vec<(L, f32)>) -> Self {
        debug_assert!(!ranked.is_empty());
        Self { ranked }
    }

    pub fn top_label(&self) -> &L {
        &self.ranked[0].0
    }

    pub fn top_confidence(&self) -> f32 {
        self.ranked[0].1
    }

    pub fn confidence_of(&self, label: &L) -> Option<f32>
    where
        L: PartialEq,
    {
        self.ranked.iter().find(|(l, _)| l == label).map(|(_, c)| *c)
    }
}

/// Outcome of the optional variety pass. Never silently empty: a skipped or
/// failed pass says so.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum VarietyOutcome {
    Identified(ClassificationResult<String>),
    /// The pipeline runs without a variety model.
    Disabled,
    /// The model is configured but missing, failed or timed out.
    Unavailable { reason: String },
}

impl VarietyOutcome {
    /// Top variety label, or an empty string when no variety was identified.
    pub fn label(&self) -> &str {
        match self {
            VarietyOutcome::Identified(result) => result.top_label(),
            _ => "",
        }
    }

    pub fn is_identified(&self) -> bool {
        matches!(self, VarietyOutcome::Identified(_))
    }
}

/// Wall-clock milliseconds spent in each pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PassTimings {
    pub detection_ms: f64,
    pub ripeness_ms: f64,
    pub defect_ms: f64,
    pub variety_ms: f64,
    pub total_ms: f64,
}

/// Region of interest the crop-dependent passes ran on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegionOfInterest {
    pub bbox: GradeBox,
    /// `None` when the whole frame was used.
    pub detection: Option<GradeDetection<String>>,
}

impl RegionOfInterest {
    /// `false` when detection found nothing and the full frame stood in.
    pub fn detection_successful(&self) -> bool {
        self.detection.is_some()
    }
}

/// Immutable record of one analysis.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    roi: RegionOfInterest,
    ripeness: ClassificationResult<RipenessLabel>,
    defects: Vec<GradeDetection<DefectLabel>>,
    defect_counts: DefectCounts,
    variety: VarietyOutcome,
    size: SizeBucket,
    decision: Decision,
    timings: PassTimings,
}

impl PipelineResult {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        roi: RegionOfInterest,
        ripeness: ClassificationResult<RipenessLabel>,
        defects: Vec<GradeDetection<DefectLabel>>,
        defect_counts: DefectCounts,
        variety: VarietyOutcome,
        size: SizeBucket,
        decision: Decision,
        timings: PassTimings,
    ) -> Result<Self, GradeError> {
        if roi.bbox.area() <= 0. {
            return Err(GradeError::InvalidInput("region of interest has zero area".to_string()));
        }
        Ok(Self {
            roi,
            ripeness,
            defects,
            defect_counts,
            variety,
            size,
            decision,
            timings,
        })
    }

    pub fn roi(&self) -> &RegionOfInterest {
        &self.roi
    }

    pub fn detection_successful(&self) -> bool {
        self.roi.detection_successful()
    }

    pub fn ripeness(&self) -> &ClassificationResult<RipenessLabel> {
        &self.ripeness
    }

    pub fn defects(&self) -> &[GradeDetection<DefectLabel>] {
        &self.defects
    }

    pub fn defect_counts(&self) -> &DefectCounts {
        &self.defect_counts
    }

    pub fn variety(&self) -> &VarietyOutcome {
        &self.variety
    }

    pub fn size(&self) -> SizeBucket {
        self.size
    }

    pub fn decision(&self) -> &Decision {
        &self.decision
    }

    pub fn timings(&self) -> &PassTimings {
        &self.timings
    }
}
