mod utils;
pub mod data;
pub mod detection_runners;
pub mod common;

use std::path::Path;
use std::sync::Arc;
use anyhow::Context;
use crate::common::{GradeImage, ModelConfig, ModelRole, PipelineConfig, PipelineResult};
use crate::data::ConfigOrt;
use crate::detection_runners::{CancelToken, InferenceOrchestrator, ModelHandles, OrtEngine, SharedModel};

/// Loads every configured model with ONNX Runtime and builds the pipeline.
///
/// Models without a weights path stay unloaded; a missing mandatory model makes
/// this fail with "models unavailable". A variety model that fails to load is
/// skipped with a warning. Empty label lists are filled from the model's
/// metadata.
pub fn init_orchestrator(config: &PipelineConfig) -> anyhow::Result<InferenceOrchestrator> {
    log::info!("Initializing fruit grading pipeline");
    let mut config = config.clone();
    let ort_lib_path = config.ort_lib_path.clone();
    let ort_lib_path = ort_lib_path.as_deref();
    let mut handles = ModelHandles::new();

    let detection = &mut config.detection;
    if let Some(model) = load_engine(ModelRole::Detection, &detection.model, &mut detection.labels, detection.input_size, ort_lib_path)? {
        handles = handles.with_detection(model);
    }

    let ripeness = &mut config.ripeness;
    if let Some(model) = load_engine(ModelRole::Ripeness, &ripeness.model, &mut ripeness.labels, ripeness.input_size, ort_lib_path)? {
        handles = handles.with_ripeness(model);
    }

    let defect = &mut config.defect;
    if let Some(model) = load_engine(ModelRole::Defect, &defect.model, &mut defect.labels, defect.input_size, ort_lib_path)? {
        handles = handles.with_defect(model);
    }

    if let Some(variety) = config.variety.as_mut() {
        match load_engine(ModelRole::Variety, &variety.model, &mut variety.labels, variety.input_size, ort_lib_path) {
            Ok(Some(model)) => handles = handles.with_variety(model),
            Ok(None) => {}
            Err(err) => log::warn!("{err:#}"),
        }
    }

    Ok(InferenceOrchestrator::new(config, handles)?)
}

fn load_engine(
    role: ModelRole,
    model: &ModelConfig,
    labels: &mut Vec<String>,
    input_size: u32,
    ort_lib_path: Option<&str>,
) -> anyhow::Result<Option<SharedModel>> {
    if model.weights_path.is_none() {
        log::warn!("No weights configured for the {role} model");
        return Ok(None);
    }
    let options = ConfigOrt::from_model_config(model)?
        .with_ort_lib_path(ort_lib_path)
        .with_names(labels)
        .with_dry_run(input_size);

    log::info!("Loading {role} model\n{}", model.describe());
    let engine = OrtEngine::new(&options).with_context(|| format!("loading the {role} model"))?;
    if labels.is_empty() {
        if let Some(names) = engine.names() {
            *labels = names.to_vec();
        }
    }
    Ok(Some(Arc::new(engine)))
}

/// Opens the image at `path` and grades it.
pub async fn grade_image<P: AsRef<Path>>(orchestrator: &InferenceOrchestrator, path: P) -> anyhow::Result<PipelineResult> {
    let image = GradeImage::open(path.as_ref())
        .with_context(|| format!("opening {}", path.as_ref().display()))?;
    Ok(orchestrator.analyze(&image, &CancelToken::new()).await?)
}
