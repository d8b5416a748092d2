use std::sync::Arc;
use std::time::{Duration, Instant};
use image::RgbImage;
use crate::common::{GradeError, ModelRole};
use crate::detection_runners::input_wrapper::X;
use crate::detection_runners::model_handle::ModelHandle;
use crate::utils;

/// Pixels handed to one pass, with their origin in the original image.
#[derive(Debug, Clone)]
pub struct PassInput {
    pub image: Arc<RgbImage>,
    pub offset: (u32, u32),
}

impl PassInput {
    pub fn new(image: Arc<RgbImage>, offset: (u32, u32)) -> Self {
        Self { image, offset }
    }
}

/// One model pass: image in, decoded output out.
///
/// The three stages are exposed separately so the orchestrator can bound the
/// model call alone. `invoke` and `decode` map failures onto [`GradeError`]
/// tagged with the pass's role, so the caller only decides whether the role is
/// allowed to fail.
pub trait InferenceProcess: Send + Sync {
    type Output: Send + 'static;
    /// Whatever preprocessing learned that decoding needs back.
    type Context: Send + 'static;

    fn role(&self) -> ModelRole;

    fn model(&self) -> &dyn ModelHandle;

    /// Pre-process the input image into a model tensor.
    fn preprocess(&self, input: &PassInput) -> Result<(X, Self::Context), GradeError>;

    /// Decode the model's raw output.
    fn postprocess(&self, ys: X, context: Self::Context) -> anyhow::Result<Self::Output>;

    /// Executes the model on the preprocessed tensor.
    fn invoke(&self, xs: &X) -> Result<X, GradeError> {
        let start = Instant::now();
        let ys = self.model().run(xs).map_err(|err| GradeError::ModelInvocation {
            role: self.role(),
            reason: format!("{}: {err:#}", self.model().name()),
        })?;
        utils::trace(self.role().str(), "Model run", start, Duration::ZERO);
        Ok(ys)
    }

    fn decode(&self, ys: X, context: Self::Context) -> Result<Self::Output, GradeError> {
        let start = Instant::now();
        let out = self.postprocess(ys, context).map_err(|err| GradeError::MalformedOutput {
            role: self.role(),
            detail: format!("{err:#}"),
        })?;
        utils::trace(self.role().str(), "Postprocessing", start, Duration::ZERO);
        Ok(out)
    }

    /// Executes the full pass on the current thread, unbounded.
    fn run(&self, input: &PassInput) -> Result<Self::Output, GradeError> {
        let start = Instant::now();
        let (xs, context) = self.preprocess(input)?;
        utils::trace(self.role().str(), "Preprocessing input", start, Duration::ZERO);

        let ys = self.invoke(&xs)?;
        self.decode(ys, context)
    }
}
