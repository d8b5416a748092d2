//! ONNX Runtime backend for [`ModelHandle`].

use std::time::Instant;
use anyhow::Result;
use half::f16;
use ndarray::Array;
use parking_lot::Mutex;
use regex::Regex;
use ort::{
    execution_providers::{ExecutionProvider,
                          CUDAExecutionProvider,
                          TensorRTExecutionProvider,
                          CoreMLExecutionProvider},
    session::builder::{GraphOptimizationLevel, SessionBuilder},
    session::Session,
    tensor::TensorElementType,
    value::{Tensor, TensorRef},
};
use crate::common::InferenceDevice;
use crate::data::{ConfigOrt, FsAccess, CROSS_MARK};
use crate::detection_runners::input_wrapper::X;
use crate::detection_runners::model_handle::ModelHandle;

static ORT_READY: Mutex<bool> = Mutex::new(false);

/// Loads the ONNX Runtime shared library once per process.
fn init_runtime(ort_lib_path: &str) -> Result<()> {
    let mut ready = ORT_READY.lock();
    if *ready {
        return Ok(());
    }
    let ort_init = ort::init_from(ort_lib_path);
    match ort_init.commit() {
        Ok(_) => {}
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to commit ORT from {ort_lib_path}: {:?}", e));
        }
    };
    *ready = true;
    Ok(())
}

/// ONNXRuntime Backend
#[derive(Debug)]
pub struct OrtEngine {
    name: String,
    session: Mutex<Session>,
    device: InferenceDevice,
    input_dtype: TensorElementType,
    names: Option<Vec<String>>,
}

impl OrtEngine {
    pub fn new(config: &ConfigOrt) -> Result<Self> {
        if let Some(lib) = &config.ort_lib_path {
            init_runtime(lib)?;
        }

        let mut builder = Session::builder()?;

        let mut device = config.device;
        let registered = match device {
            InferenceDevice::TensorRT(device_id) => Self::build_trt(
                &mut builder,
                device_id,
                config.trt_fp16_enable,
                config.trt_engine_cache_enable,
            ),
            InferenceDevice::CUDA(device_id) => Self::build_cuda(&mut builder, device_id),
            InferenceDevice::CoreML => Self::build_coreml(&mut builder),
            InferenceDevice::CPU => Ok(()),
        };
        if let Err(err) = registered {
            log::warn!("{err}, Using cpu");
            device = InferenceDevice::CPU;
        }

        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_file(&config.onnx_path)?;

        let input_dtype = session
            .inputs
            .first()
            .and_then(|input| input.input_type.tensor_type())
            .unwrap_or(TensorElementType::Float32);

        let names = match (Self::fetch_names(&session)?, &config.names) {
            (Some(parsed), Some(names)) if parsed.len() != names.len() => anyhow::bail!(
                "{}: the lengths of parsed class names: {} and configured class names: {} do not match.",
                config.onnx_path,
                parsed.len(),
                names.len(),
            ),
            (_, Some(names)) => Some(names.clone()),
            (parsed, None) => parsed,
        };

        log::info!(
            "Backend: ONNXRuntime | Model: {} | Device: {} | Input: {:?} | Classes: {}",
            config.onnx_path,
            device,
            input_dtype,
            names.as_ref().map_or(0, |n| n.len()),
        );

        let engine = Self {
            name: config.onnx_path.clone(),
            session: Mutex::new(session),
            device,
            input_dtype,
            names,
        };

        if let Some(size) = config.dry_run_size {
            let now = Instant::now();
            let size = size as usize;
            engine.run(&X::from(Array::<f32, _>::zeros(vec![1, 3, size, size])))?;
            log::info!("Warm-up run of {} took {:.2?}", engine.name, now.elapsed());
        }

        Ok(engine)
    }

    fn build_trt(builder: &mut SessionBuilder, device_id: usize, fp16_enable: bool, engine_cache_enable: bool) -> Result<()> {
        let cache_path = FsAccess::Cache.path_with_subs(&["trt-cache"])?;
        let trt = TensorRTExecutionProvider::default()
            .with_device_id(device_id as i32)
            .with_fp16(fp16_enable)
            .with_engine_cache(engine_cache_enable)
            .with_engine_cache_path(cache_path.to_string_lossy())
            .with_timing_cache(false);
        if trt.is_available()? {
            match trt.register(builder) {
                Ok(_) => { }
                Err(err) => { anyhow::bail!("{CROSS_MARK} TensorRT initialization failed: {:?}", err) }
            }
            log::info!("Initial model serialization with TensorRT may take some time...");
            Ok(())
        } else {
            anyhow::bail!("{CROSS_MARK} TensorRT execution provider not available")
        }
    }

    fn build_cuda(builder: &mut SessionBuilder, device_id: usize) -> Result<()> {
        let ep = CUDAExecutionProvider::default()
            .with_device_id(device_id as i32);
        if ep.is_available()? {
            match ep.register(builder) {
                Ok(_) => { }
                Err(err) => { anyhow::bail!("{CROSS_MARK} CUDA initialization failed: {:?}", err) }
            }
            Ok(())
        } else {
            anyhow::bail!("{CROSS_MARK} CUDA execution provider not available")
        }
    }

    fn build_coreml(builder: &mut SessionBuilder) -> Result<()> {
        let ep = CoreMLExecutionProvider::default()
            .with_subgraphs(false);
        if ep.is_available()? {
            match ep.register(builder) {
                Ok(_) => { }
                Err(err) => { anyhow::bail!("{CROSS_MARK} CoreML initialization failed: {:?}", err) }
            }
            Ok(())
        } else {
            anyhow::bail!("{CROSS_MARK} CoreML execution provider not available")
        }
    }

    fn fetch_names(session: &Session) -> Result<Option<Vec<String>>> {
        // fetch class names from onnx metadata
        // String format: `{0: 'unripe', 1: 'breaking_stage', ..., 5: "unhealthy"}`
        let raw = match session.metadata() {
            Err(_) => None,
            Ok(metadata) => metadata.custom("names").unwrap_or_default(),
        };
        let Some(raw) = raw else {
            return Ok(None);
        };
        let re = Regex::new(r#"(['"])([-()\w '"]+)(['"])"#)?;
        let names: Vec<String> = re
            .captures_iter(&raw)
            .map(|x| x.extract())
            .map(|(_, [_, name, _])| name.to_string())
            .collect();
        Ok(if names.is_empty() { None } else { Some(names) })
    }

    /// Class names configured or read from the model's metadata.
    pub fn names(&self) -> Option<&[String]> {
        self.names.as_deref()
    }

    pub fn device(&self) -> &InferenceDevice {
        &self.device
    }
}

impl ModelHandle for OrtEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, xs: &X) -> Result<X> {
        let mut session = self.session.lock();
        let outputs = match self.input_dtype {
            TensorElementType::Float16 => session.run(ort::inputs![Tensor::from_array(xs.mapv(f16::from_f32))?])?,
            _ => session.run(ort::inputs![TensorRef::from_array_view(xs.view())?])?,
        };

        let output = &outputs[0];
        let ys = match output.try_extract_array::<f32>() {
            Ok(y) => y.into_owned(),
            Err(_) => output.try_extract_array::<f16>()?.mapv(f16::to_f32),
        };

        Ok(X::from(ys))
    }
}
