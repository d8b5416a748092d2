use serde::{Deserialize, Serialize};
use crate::common::inference_device::InferenceDevice;

fn enabled() -> bool {
    true
}

/// Where one model's weights live and which device runs them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// ONNX weights. `None` leaves the model unloaded.
    #[serde(default)]
    pub weights_path: Option<String>,
    #[serde(default)]
    pub inference_device: InferenceDevice,
    /// TensorRT only: build the engine in half precision.
    #[serde(default)]
    pub trt_fp16: bool,
    /// TensorRT only: keep built engines in the user cache directory.
    #[serde(default = "enabled")]
    pub trt_engine_cache: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            weights_path: None,
            inference_device: InferenceDevice::default(),
            trt_fp16: false,
            trt_engine_cache: true,
        }
    }
}

impl ModelConfig {
    pub fn new(weights_path: &str, inference_device: InferenceDevice) -> Self {
        Self {
            weights_path: Some(weights_path.to_string()),
            inference_device,
            ..Default::default()
        }
    }

    pub fn describe(&self) -> String {
        let mut s = format!("Weights File Path: {}\n\
        Inference Device: {}",
                self.weights_path.as_deref().unwrap_or("<none>"),
                self.inference_device);
        if let InferenceDevice::TensorRT(_) = self.inference_device {
            s.push_str(&format!("\nTensorRT fp16: {} | Engine cache: {}", self.trt_fp16, self.trt_engine_cache));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trt_options_default_when_absent() {
        let config: ModelConfig = serde_json::from_str(r#"{ "weights_path": "fruit.onnx" }"#).unwrap();
        assert!(!config.trt_fp16);
        assert!(config.trt_engine_cache);
        assert_eq!(config, ModelConfig { weights_path: Some("fruit.onnx".into()), ..Default::default() });
    }
}
