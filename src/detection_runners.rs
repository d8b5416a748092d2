pub mod cancel_token;
pub mod inference_process;
pub mod model_handle;
pub mod orchestrator;
pub mod ort_detector;
pub mod passes;

pub use cancel_token::CancelToken;
pub use model_handle::{FnHandle, ModelHandle, SharedModel};
pub use orchestrator::{BatchReport, InferenceOrchestrator, ModelHandles};
pub use ort_detector::*;
