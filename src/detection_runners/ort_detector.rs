mod ort_engine;
pub mod classifier;
pub mod decoder;
pub mod image_ops;
pub mod input_wrapper;
pub mod nms;

pub use ort_engine::*;
