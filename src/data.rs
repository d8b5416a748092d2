mod config_ort;
mod filesystem_access;

pub use config_ort::ConfigOrt;
pub use filesystem_access::FsAccess;

pub use crate::detection_runners::ort_detector::image_ops::ResizeMode;
pub use crate::detection_runners::ort_detector::input_wrapper::X;

pub(crate) const CROSS_MARK: &str = "❌";
