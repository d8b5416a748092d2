use serde::{Deserialize, Serialize};

/// Execution provider an ONNX model is placed on.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InferenceDevice {
    #[default] CPU,
    CUDA(usize),
    TensorRT(usize),
    CoreML,
}

impl InferenceDevice {
    pub fn str(&self) -> &'static str {
        match self {
            InferenceDevice::CPU => "CPU",
            InferenceDevice::CUDA(_) => "CUDA",
            InferenceDevice::TensorRT(_) => "TensorRT",
            InferenceDevice::CoreML => "CoreML",
        }
    }
}

impl std::fmt::Display for InferenceDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InferenceDevice::CUDA(id) | InferenceDevice::TensorRT(id) => write!(f, "{}:{}", self.str(), id),
            _ => f.write_str(self.str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_the_device_index() {
        assert_eq!(InferenceDevice::TensorRT(2).to_string(), "TensorRT:2");
        assert_eq!(InferenceDevice::CoreML.to_string(), "CoreML");
        let parsed: InferenceDevice = serde_json::from_str(r#"{"CUDA": 1}"#).unwrap();
        assert_eq!(parsed, InferenceDevice::CUDA(1));
    }
}
