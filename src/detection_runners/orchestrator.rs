//! Runs the model passes of one analysis and assembles the result.
//!
//! The whole-image detection pass runs first and fixes the region of
//! interest. The ripeness, defect and variety passes then run concurrently on
//! the same crop and are joined before the decision is made.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use crate::common::{
    decide, DefectCounts, DefectLabel, GradeError, GradeImage, ModelRole, PassTimings, PipelineConfig,
    PipelineResult, RegionOfInterest, RipenessLabel, VarietyOutcome,
};
use crate::detection_runners::cancel_token::CancelToken;
use crate::detection_runners::inference_process::{InferenceProcess, PassInput};
use crate::detection_runners::model_handle::SharedModel;
use crate::detection_runners::passes::{ClassifierPass, DetectorPass};
use crate::utils;

/// The loaded models, one slot per [`ModelRole`].
#[derive(Debug, Clone, Default)]
pub struct ModelHandles {
    detection: Option<SharedModel>,
    ripeness: Option<SharedModel>,
    defect: Option<SharedModel>,
    variety: Option<SharedModel>,
}

impl ModelHandles {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_detection(self, model: SharedModel) -> Self {
        self.with(ModelRole::Detection, model)
    }

    pub fn with_ripeness(self, model: SharedModel) -> Self {
        self.with(ModelRole::Ripeness, model)
    }

    pub fn with_defect(self, model: SharedModel) -> Self {
        self.with(ModelRole::Defect, model)
    }

    pub fn with_variety(self, model: SharedModel) -> Self {
        self.with(ModelRole::Variety, model)
    }

    pub fn with(mut self, role: ModelRole, model: SharedModel) -> Self {
        *self.slot(role) = Some(model);
        self
    }

    pub fn get(&self, role: ModelRole) -> Option<&SharedModel> {
        match role {
            ModelRole::Detection => self.detection.as_ref(),
            ModelRole::Ripeness => self.ripeness.as_ref(),
            ModelRole::Defect => self.defect.as_ref(),
            ModelRole::Variety => self.variety.as_ref(),
        }
    }

    fn slot(&mut self, role: ModelRole) -> &mut Option<SharedModel> {
        match role {
            ModelRole::Detection => &mut self.detection,
            ModelRole::Ripeness => &mut self.ripeness,
            ModelRole::Defect => &mut self.defect,
            ModelRole::Variety => &mut self.variety,
        }
    }

    fn take(&mut self, role: ModelRole) -> Option<SharedModel> {
        self.slot(role).take()
    }
}

#[derive(Debug)]
enum VarietyPass {
    Disabled,
    Missing,
    Ready(Arc<ClassifierPass<String>>),
}

/// Outcome of [`InferenceOrchestrator::analyze_batch`].
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One entry per image analysed, in input order. Images after a
    /// cancellation have no entry.
    pub results: Vec<Result<PipelineResult, GradeError>>,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn graded(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.graded()
    }
}

#[derive(Debug)]
pub struct InferenceOrchestrator {
    config: PipelineConfig,
    detection: Arc<DetectorPass<String>>,
    ripeness: Arc<ClassifierPass<RipenessLabel>>,
    defect: Arc<DetectorPass<DefectLabel>>,
    variety: VarietyPass,
}

impl InferenceOrchestrator {
    /// Builds the pipeline. Fails with [`GradeError::Configuration`] when the
    /// configuration is invalid and [`GradeError::ModelsUnavailable`] when a
    /// mandatory model is missing.
    pub fn new(config: PipelineConfig, mut handles: ModelHandles) -> Result<Self, GradeError> {
        config.validate()?;

        let missing: Vec<ModelRole> = ModelRole::all()
            .into_iter()
            .filter(|role| role.is_mandatory() && handles.get(*role).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(GradeError::ModelsUnavailable(missing));
        }

        let (Some(detection), Some(ripeness), Some(defect)) = (
            handles.take(ModelRole::Detection),
            handles.take(ModelRole::Ripeness),
            handles.take(ModelRole::Defect),
        ) else {
            return Err(GradeError::ModelsUnavailable(vec![ModelRole::Detection, ModelRole::Ripeness, ModelRole::Defect]));
        };

        let fill = config.letterbox_fill;
        let variety = match (&config.variety, handles.take(ModelRole::Variety)) {
            (None, _) => VarietyPass::Disabled,
            (Some(_), None) => {
                log::warn!("Variety model not loaded; variety will be reported as unavailable");
                VarietyPass::Missing
            }
            (Some(variety), Some(model)) => VarietyPass::Ready(Arc::new(ClassifierPass::new(
                ModelRole::Variety, model, variety, |s| s.to_string(), fill,
            ))),
        };

        log::info!(
            "Pipeline ready | Detection: {} | Ripeness: {} | Defect: {} | Variety: {}",
            detection.name(),
            ripeness.name(),
            defect.name(),
            match &variety {
                VarietyPass::Disabled => "disabled",
                VarietyPass::Missing => "missing",
                VarietyPass::Ready(_) => "enabled",
            }
        );

        Ok(Self {
            detection: Arc::new(DetectorPass::new(ModelRole::Detection, detection, &config.detection, |s| s.to_string(), fill)),
            ripeness: Arc::new(ClassifierPass::new(ModelRole::Ripeness, ripeness, &config.ripeness, RipenessLabel::from_label, fill)),
            defect: Arc::new(DetectorPass::new(ModelRole::Defect, defect, &config.defect, DefectLabel::from_label, fill)),
            variety,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Grades one image.
    ///
    /// Mandatory pass failures abort this call only. A failing variety pass is
    /// reported as [`VarietyOutcome::Unavailable`].
    pub async fn analyze(&self, image: &GradeImage, cancel: &CancelToken) -> Result<PipelineResult, GradeError> {
        let start = Instant::now();
        if cancel.is_cancelled() {
            return Err(GradeError::Cancelled);
        }
        image.ensure_not_empty()?;
        let timeout = self.config.model_timeout();
        let (width, height) = image.dimensions();

        // Region of interest
        let full_frame = PassInput::new(image.shared(), (0, 0));
        let (detections, detection_ms) =
            until_cancelled(cancel, timed(run_pass(Arc::clone(&self.detection), full_frame, timeout))).await?;
        let detections = detections?;
        let mut elapsed = utils::trace("ANALYZE", "Detection", start, Duration::ZERO);

        let roi = match detections.into_iter().next() {
            Some(best) => RegionOfInterest {
                bbox: best.bbox.clamp_to(width, height),
                detection: Some(best),
            },
            None => {
                log::warn!(
                    "No fruit detected above {:.2}; grading the full frame",
                    self.config.detection.conf_threshold
                );
                RegionOfInterest {
                    bbox: image.frame(),
                    detection: None,
                }
            }
        };
        if roi.bbox.area() <= 0. {
            return Err(GradeError::InvalidInput(format!(
                "region of interest {:?} has no area inside the {width}x{height} image",
                roi.bbox.xy1_wh()
            )));
        }
        let (crop, offset) = image.crop(&roi.bbox)?;
        let crop = PassInput::new(Arc::new(crop), offset);

        // Crop-dependent passes
        let fan_out = async {
            tokio::join!(
                timed(run_pass(Arc::clone(&self.ripeness), crop.clone(), timeout)),
                timed(run_pass(Arc::clone(&self.defect), crop.clone(), timeout)),
                timed(self.run_variety(crop.clone(), timeout)),
            )
        };
        let ((ripeness, ripeness_ms), (defects, defect_ms), (variety, variety_ms)) =
            until_cancelled(cancel, fan_out).await?;
        let ripeness = ripeness?;
        let defects = defects?;
        elapsed = utils::trace("ANALYZE", "Ripeness/defect/variety", start, elapsed);

        let defect_counts = DefectCounts::from_detections(&defects);
        let decision = decide(ripeness.top_label(), &defect_counts);
        let size = self.config.size_table.bucket(roi.bbox.area());
        utils::trace("ANALYZE", "Decision", start, elapsed);

        log::debug!(
            "Graded {}x{} image | Ripeness: {} ({:.2}) | Defects: {} | Variety: {} | Size: {} | {}",
            width,
            height,
            ripeness.top_label(),
            ripeness.top_confidence(),
            defect_counts.total(),
            match &variety {
                VarietyOutcome::Identified(v) => v.top_label().as_str(),
                VarietyOutcome::Disabled => "disabled",
                VarietyOutcome::Unavailable { .. } => "unavailable",
            },
            size.display_name(),
            decision,
        );

        let timings = PassTimings {
            detection_ms,
            ripeness_ms,
            defect_ms,
            variety_ms,
            total_ms: utils::millis(start.elapsed()),
        };

        PipelineResult::new(roi, ripeness, defects, defect_counts, variety, size, decision, timings)
    }

    /// Grades `images` one after another, stopping before the next image once
    /// `cancel` is set.
    pub async fn analyze_batch(&self, images: &[GradeImage], cancel: &CancelToken) -> BatchReport {
        let mut report = BatchReport::default();
        for (i, image) in images.iter().enumerate() {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            match self.analyze(image, cancel).await {
                Err(GradeError::Cancelled) => {
                    report.cancelled = true;
                    break;
                }
                Err(err) => {
                    log::warn!("Image {} of {} not graded: {}", i + 1, images.len(), err);
                    report.results.push(Err(err));
                }
                Ok(result) => report.results.push(Ok(result)),
            }
        }
        if report.cancelled {
            log::info!("Batch cancelled after {} of {} images", report.results.len(), images.len());
        }
        report
    }

    async fn run_variety(&self, input: PassInput, timeout: Option<Duration>) -> VarietyOutcome {
        match &self.variety {
            VarietyPass::Disabled => VarietyOutcome::Disabled,
            VarietyPass::Missing => VarietyOutcome::Unavailable {
                reason: "variety model not loaded".to_string(),
            },
            VarietyPass::Ready(pass) => match run_pass(Arc::clone(pass), input, timeout).await {
                Ok(result) => VarietyOutcome::Identified(result),
                Err(err) => {
                    log::warn!("Variety pass degraded: {err}");
                    VarietyOutcome::Unavailable { reason: err.to_string() }
                }
            },
        }
    }
}

/// Runs `pass` on the blocking pool. Only the model call is bounded by
/// `timeout`; preprocessing and decoding run to completion.
///
/// A timed-out model call keeps its blocking thread until the runtime returns;
/// only its result is discarded.
async fn run_pass<P>(pass: Arc<P>, input: PassInput, timeout: Option<Duration>) -> Result<P::Output, GradeError>
where
    P: InferenceProcess + 'static,
{
    let role = pass.role();

    let stage = Arc::clone(&pass);
    let (xs, context) = blocking(role, move || stage.preprocess(&input)).await?;

    let stage = Arc::clone(&pass);
    let call = blocking(role, move || stage.invoke(&xs));
    let ys = match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| GradeError::ModelTimeout { role, timeout: limit })??,
        None => call.await?,
    };

    blocking(role, move || pass.decode(ys, context)).await
}

async fn blocking<T, F>(role: ModelRole, f: F) -> Result<T, GradeError>
where
    F: FnOnce() -> Result<T, GradeError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| GradeError::ModelInvocation {
            role,
            reason: format!("{role} pass did not complete: {err}"),
        })?
}

async fn timed<F: Future>(fut: F) -> (F::Output, f64) {
    let start = Instant::now();
    let out = fut.await;
    (out, utils::millis(start.elapsed()))
}

async fn until_cancelled<F: Future>(cancel: &CancelToken, fut: F) -> Result<F::Output, GradeError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(GradeError::Cancelled),
        out = fut => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection_runners::model_handle::FnHandle;
    use crate::detection_runners::input_wrapper::X;

    fn classifier(n: usize) -> SharedModel {
        FnHandle::shared("classifier", move |_: &X| Ok(X::from(vec![0.; n])))
    }

    fn empty_detector(rows: usize) -> SharedModel {
        FnHandle::shared("detector", move |_: &X| X::from_shape_vec(&[1, rows, 0], vec![]))
    }

    #[test]
    fn missing_mandatory_models_are_named() {
        let handles = ModelHandles::new().with_detection(empty_detector(5));
        let err = InferenceOrchestrator::new(PipelineConfig::default(), handles).unwrap_err();
        match err {
            GradeError::ModelsUnavailable(roles) => assert_eq!(roles, vec![ModelRole::Ripeness, ModelRole::Defect]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn variety_is_optional() {
        let handles = ModelHandles::new()
            .with_detection(empty_detector(5))
            .with_ripeness(classifier(6))
            .with_defect(empty_detector(7));
        let orchestrator = InferenceOrchestrator::new(PipelineConfig::default(), handles.clone()).unwrap();
        assert!(matches!(orchestrator.variety, VarietyPass::Disabled));

        let config = PipelineConfig::preset(crate::common::Preset::VarietyAware);
        let orchestrator = InferenceOrchestrator::new(config, handles).unwrap();
        assert!(matches!(orchestrator.variety, VarietyPass::Missing));
    }

    #[test]
    fn invalid_config_is_rejected_before_models() {
        let mut config = PipelineConfig::default();
        config.detection.input_size = 0;
        let err = InferenceOrchestrator::new(config, ModelHandles::new()).unwrap_err();
        assert!(matches!(err, GradeError::Configuration(_)));
    }
}
