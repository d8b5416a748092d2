//! Options for building ONNX Runtime models.

use anyhow::Result;
use crate::common::{InferenceDevice, ModelConfig};

#[derive(Debug, Clone)]
pub struct ConfigOrt {
    pub onnx_path: String,
    /// Shared library loaded at runtime. `None` uses the library already
    /// initialised in this process or the platform default.
    pub ort_lib_path: Option<String>,
    pub device: InferenceDevice,
    /// Square input size of a warm-up run done right after loading.
    pub dry_run_size: Option<u32>,

    // trt related
    pub trt_engine_cache_enable: bool,
    pub trt_fp16_enable: bool,

    pub names: Option<Vec<String>>,
}

impl Default for ConfigOrt {
    fn default() -> Self {
        Self {
            onnx_path: String::new(),
            ort_lib_path: None,
            device: InferenceDevice::CPU,
            dry_run_size: None,

            trt_engine_cache_enable: true,
            trt_fp16_enable: false,

            names: None,
        }
    }
}

impl ConfigOrt {
    pub fn new() -> Self {
        Default::default()
    }

    /// Starts from a per-model configuration. Fails when it has no weights.
    pub fn from_model_config(model: &ModelConfig) -> Result<Self> {
        let weights = model
            .weights_path
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("no weights path configured"))?;
        Ok(Self::new()
            .with_model(weights)?
            .with_device(model.inference_device)
            .with_trt_fp16(model.trt_fp16)
            .with_trt_engine_cache(model.trt_engine_cache))
    }

    pub fn with_model(mut self, onnx_path: &str) -> Result<Self> {
        if onnx_path.trim().is_empty() {
            anyhow::bail!("empty model path");
        }
        self.onnx_path = onnx_path.to_string();
        Ok(self)
    }

    pub fn with_ort_lib_path(mut self, ort_lib_path: Option<&str>) -> Self {
        self.ort_lib_path = ort_lib_path.map(|p| p.to_string());
        self
    }

    pub fn with_device(mut self, device_type: InferenceDevice) -> Self {
        self.device = device_type;
        self
    }

    pub fn with_dry_run(mut self, input_size: u32) -> Self {
        self.dry_run_size = Some(input_size);
        self
    }

    pub fn with_trt_fp16(mut self, x: bool) -> Self {
        self.trt_fp16_enable = x;
        self
    }

    pub fn with_trt_engine_cache(mut self, x: bool) -> Self {
        self.trt_engine_cache_enable = x;
        self
    }

    pub fn with_names(mut self, names: &[String]) -> Self {
        self.names = if names.is_empty() { None } else { Some(names.to_vec()) };
        self
    }
}
