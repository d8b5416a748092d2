mod decision;
mod grade_box;
mod grade_detection;
mod grade_error;
mod grade_image;
mod inference_device;
mod labels;
mod model_config;
mod pipeline_config;
mod pipeline_result;
mod size_table;

pub use decision::*;
pub use grade_box::*;
pub use grade_detection::*;
pub use grade_error::*;
pub use grade_image::*;
pub use inference_device::*;
pub use labels::{DefectLabel, RipenessLabel};
pub(crate) use labels::parse_labels;
pub use model_config::*;
pub use pipeline_config::*;
pub use pipeline_result::*;
pub use size_table::*;
