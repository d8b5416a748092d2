//! The detector and classifier passes run by the orchestrator.

use anyhow::Result;
use crate::common::{parse_labels, ClassificationResult, ClassifierConfig, DetectorConfig, GradeDetection, GradeError, ModelRole, ScoreKind};
use crate::detection_runners::classifier::rank_scores;
use crate::detection_runners::decoder::{decode_detections, DecodeGeometry, DecodeParams};
use crate::detection_runners::image_ops::{encode_tensor, letterbox, resize_exact, ResizeMode};
use crate::detection_runners::inference_process::{InferenceProcess, PassInput};
use crate::detection_runners::input_wrapper::X;
use crate::detection_runners::model_handle::{ModelHandle, SharedModel};

/// Letterbox, encode, run, decode boxes.
#[derive(Debug)]
pub struct DetectorPass<L> {
    role: ModelRole,
    model: SharedModel,
    labels: Vec<L>,
    input_size: u32,
    params: DecodeParams,
    fill: u8,
}

impl<L> DetectorPass<L> {
    pub fn new(role: ModelRole, model: SharedModel, config: &DetectorConfig, parse: fn(&str) -> L, fill: u8) -> Self {
        Self {
            role,
            model,
            labels: parse_labels(&config.labels, parse),
            input_size: config.input_size,
            params: DecodeParams {
                conf_threshold: config.conf_threshold,
                max_overlap: config.overlap_threshold,
            },
            fill,
        }
    }

    pub fn labels(&self) -> &[L] {
        &self.labels
    }
}

impl<L> InferenceProcess for DetectorPass<L>
where
    L: Clone + Send + Sync + 'static,
{
    type Output = Vec<GradeDetection<L>>;
    type Context = DecodeGeometry;

    fn role(&self) -> ModelRole {
        self.role
    }

    fn model(&self) -> &dyn ModelHandle {
        self.model.as_ref()
    }

    fn preprocess(&self, input: &PassInput) -> Result<(X, DecodeGeometry), GradeError> {
        let boxed = letterbox(&input.image, self.input_size, self.fill)?;
        let geometry = DecodeGeometry::from_letterbox(&boxed, input.offset);
        Ok((encode_tensor(&boxed.image), geometry))
    }

    fn postprocess(&self, ys: X, geometry: DecodeGeometry) -> Result<Self::Output> {
        decode_detections(&ys, &self.labels, &self.params, &geometry)
    }
}

/// Resize, encode, run, rank class scores.
#[derive(Debug)]
pub struct ClassifierPass<L> {
    role: ModelRole,
    model: SharedModel,
    labels: Vec<L>,
    input_size: u32,
    resize_mode: ResizeMode,
    score_kind: ScoreKind,
    fill: u8,
}

impl<L> ClassifierPass<L> {
    pub fn new(role: ModelRole, model: SharedModel, config: &ClassifierConfig, parse: fn(&str) -> L, fill: u8) -> Self {
        Self {
            role,
            model,
            labels: parse_labels(&config.labels, parse),
            input_size: config.input_size,
            resize_mode: config.resize_mode,
            score_kind: config.score_kind,
            fill,
        }
    }
}

impl<L> InferenceProcess for ClassifierPass<L>
where
    L: Clone + Send + Sync + 'static,
{
    type Output = ClassificationResult<L>;
    type Context = ();

    fn role(&self) -> ModelRole {
        self.role
    }

    fn model(&self) -> &dyn ModelHandle {
        self.model.as_ref()
    }

    fn preprocess(&self, input: &PassInput) -> Result<(X, ()), GradeError> {
        let resized = match self.resize_mode {
            ResizeMode::FitExact => resize_exact(&input.image, self.input_size)?,
            ResizeMode::Letterbox => letterbox(&input.image, self.input_size, self.fill)?.image,
        };
        Ok((encode_tensor(&resized), ()))
    }

    fn postprocess(&self, ys: X, _: ()) -> Result<Self::Output> {
        rank_scores(&ys, &self.labels, self.score_kind)
    }
}
