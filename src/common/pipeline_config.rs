//! Pipeline configuration.
//!
//! One parameterized pipeline serves every deployment; the deployments differ
//! only in label sets, input sizes, thresholds and size boundaries, captured
//! here and in the named [`Preset`]s.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::common::{GradeError, ModelConfig, ModelRole, SizeTable};
use crate::detection_runners::image_ops::ResizeMode;

const DEFAULT_FILL: u8 = 114;

fn labels(xs: &[&str]) -> Vec<String> {
    xs.iter().map(|x| x.to_string()).collect()
}

/// How a classifier's raw output row should be read.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreKind {
    /// Unnormalized scores; softmax is applied.
    #[default]
    Logits,
    /// Already probabilities; only renormalized.
    Probabilities,
}

/// Settings of a detection-style model (`(1, 4 + classes, boxes)` output).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    #[serde(default)]
    pub model: ModelConfig,
    pub labels: Vec<String>,
    pub input_size: u32,
    /// Candidates must score strictly above this.
    pub conf_threshold: f32,
    /// Largest share of a candidate's own area that may overlap an already
    /// accepted box.
    pub overlap_threshold: f32,
}

impl DetectorConfig {
    pub fn new(labels: &[&str], input_size: u32, conf_threshold: f32) -> Self {
        Self {
            model: ModelConfig::default(),
            labels: self::labels(labels),
            input_size,
            conf_threshold,
            overlap_threshold: 0.45,
        }
    }

    fn validate(&self, role: ModelRole) -> Result<(), GradeError> {
        validate_common(role, &self.labels, self.input_size)?;
        if !(0.0..1.0).contains(&self.conf_threshold) {
            return Err(GradeError::Configuration(format!(
                "{role} confidence threshold {} is outside [0, 1)", self.conf_threshold
            )));
        }
        if !(self.overlap_threshold > 0. && self.overlap_threshold <= 1.) {
            return Err(GradeError::Configuration(format!(
                "{role} overlap threshold {} is outside (0, 1]", self.overlap_threshold
            )));
        }
        Ok(())
    }
}

/// Settings of a classification-style model (`(1, classes)` output).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub model: ModelConfig,
    pub labels: Vec<String>,
    pub input_size: u32,
    #[serde(default)]
    pub resize_mode: ResizeMode,
    #[serde(default)]
    pub score_kind: ScoreKind,
}

impl ClassifierConfig {
    pub fn new(labels: &[&str], input_size: u32) -> Self {
        Self {
            model: ModelConfig::default(),
            labels: self::labels(labels),
            input_size,
            resize_mode: ResizeMode::FitExact,
            score_kind: ScoreKind::Logits,
        }
    }

    fn validate(&self, role: ModelRole) -> Result<(), GradeError> {
        validate_common(role, &self.labels, self.input_size)
    }
}

fn validate_common(role: ModelRole, labels: &[String], input_size: u32) -> Result<(), GradeError> {
    if labels.is_empty() {
        return Err(GradeError::Configuration(format!("{role} model has an empty label set")));
    }
    if input_size == 0 {
        return Err(GradeError::Configuration(format!("{role} model input size is zero")));
    }
    Ok(())
}

/// Named deployment configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Preset {
    /// Ripeness, defects and size; no variety model.
    Standard,
    /// Standard plus variety identification.
    VarietyAware,
    /// Close-range camera rigs: looser fruit detection, smaller size cut points.
    Compact,
}

impl FromStr for Preset {
    type Err = GradeError;

    /// Case-insensitive; `-` and `_` are ignored.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_lowercase().replace(['-', '_'], "").as_str() {
            "standard" => Ok(Preset::Standard),
            "varietyaware" | "variety" => Ok(Preset::VarietyAware),
            "compact" => Ok(Preset::Compact),
            _ => Err(GradeError::Configuration(format!(
                "unknown preset '{name}' (expected standard, variety-aware or compact)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub detection: DetectorConfig,
    pub ripeness: ClassifierConfig,
    pub defect: DetectorConfig,
    /// `None` disables the variety pass.
    pub variety: Option<ClassifierConfig>,
    pub size_table: SizeTable,
    /// Background value of letterbox padding, all three channels.
    pub letterbox_fill: u8,
    /// Upper bound for a single model call.
    pub model_timeout_ms: Option<u64>,
    pub ort_lib_path: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::preset(Preset::Standard)
    }
}

impl PipelineConfig {
    pub fn preset(preset: Preset) -> Self {
        let standard = Self {
            detection: DetectorConfig::new(&["fruit"], 640, 0.5),
            ripeness: ClassifierConfig::new(
                &["unripe", "breaking_stage", "half_ripe", "ripe", "ripe_with_minor_defect", "unhealthy"],
                224,
            ),
            defect: DetectorConfig::new(&["black_spot", "brown_spot", "scab"], 640, 0.3),
            variety: None,
            size_table: SizeTable::default(),
            letterbox_fill: DEFAULT_FILL,
            model_timeout_ms: Some(10_000),
            ort_lib_path: None,
        };

        match preset {
            Preset::Standard => standard,
            Preset::VarietyAware => Self {
                variety: Some(ClassifierConfig::new(
                    &["cavendish", "lady_finger", "red_dacca", "plantain"],
                    224,
                )),
                ..standard
            },
            Preset::Compact => Self {
                detection: DetectorConfig::new(&["fruit"], 640, 0.45),
                size_table: SizeTable::compact(),
                ..standard
            },
        }
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` as a partial configuration laid over `base`: objects merge
    /// key by key, any other value in the file replaces the base value.
    pub fn from_json_file_over<P: AsRef<Path>>(path: P, base: &PipelineConfig) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let overlay: serde_json::Value = serde_json::from_str(&raw)?;
        let mut merged = serde_json::to_value(base)?;
        merge_json(&mut merged, overlay);
        let config: Self = serde_json::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn with_model_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.model_timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }

    pub fn model_timeout(&self) -> Option<Duration> {
        self.model_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), GradeError> {
        self.detection.validate(ModelRole::Detection)?;
        self.ripeness.validate(ModelRole::Ripeness)?;
        self.defect.validate(ModelRole::Defect)?;
        if let Some(variety) = &self.variety {
            variety.validate(ModelRole::Variety)?;
        }
        self.size_table.validate()?;
        if self.model_timeout_ms == Some(0) {
            return Err(GradeError::Configuration("model timeout must be positive".to_string()));
        }
        Ok(())
    }
}

fn merge_json(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base), serde_json::Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_keeps_preset_values() {
        let path = std::env::temp_dir().join(format!("fruit_grade_overlay_{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{ "ripeness": { "model": { "weights_path": "ripeness.onnx" } }, "model_timeout_ms": 2500 }"#,
        ).unwrap();
        let base = PipelineConfig::preset(Preset::VarietyAware);
        let loaded = PipelineConfig::from_json_file_over(&path, &base).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.ripeness.model.weights_path.as_deref(), Some("ripeness.onnx"));
        assert_eq!(loaded.ripeness.labels, base.ripeness.labels);
        assert_eq!(loaded.variety, base.variety);
        assert_eq!(loaded.model_timeout(), Some(Duration::from_millis(2500)));
    }

    #[test]
    fn presets_validate() {
        for preset in [Preset::Standard, Preset::VarietyAware, Preset::Compact] {
            PipelineConfig::preset(preset).validate().unwrap();
        }
        assert!(PipelineConfig::preset(Preset::Standard).variety.is_none());
        assert!(PipelineConfig::preset(Preset::VarietyAware).variety.is_some());
    }

    #[test]
    fn observed_thresholds() {
        let config = PipelineConfig::default();
        assert_eq!(config.detection.conf_threshold, 0.5);
        assert_eq!(config.defect.conf_threshold, 0.3);
        assert_eq!(config.defect.overlap_threshold, 0.45);
        assert_eq!(config.detection.input_size, 640);
        assert_eq!(config.ripeness.input_size, 224);
    }

    #[test]
    fn preset_names() {
        assert_eq!("variety-aware".parse::<Preset>().unwrap(), Preset::VarietyAware);
        assert_eq!("Compact".parse::<Preset>().unwrap(), Preset::Compact);
        let err = "deluxe".parse::<Preset>().unwrap_err();
        assert!(err.to_string().contains("unknown preset 'deluxe'"));
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = PipelineConfig::default();
        config.defect.conf_threshold = 1.5;
        assert!(matches!(config.validate(), Err(GradeError::Configuration(_))));

        let mut config = PipelineConfig::default();
        config.ripeness.labels.clear();
        assert!(config.validate().is_err());

        let config = PipelineConfig::default().with_model_timeout(Some(Duration::ZERO));
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{ "size_table": { "boundaries": [45000.0, 90000.0, 140000.0] } }"#,
        ).unwrap();
        assert_eq!(config.size_table, SizeTable::compact());
        assert_eq!(config.defect, PipelineConfig::default().defect);
    }

    #[test]
    fn json_file_round_trip() {
        let path = std::env::temp_dir().join(format!("fruit_grade_cfg_{}.json", std::process::id()));
        let config = PipelineConfig::preset(Preset::VarietyAware);
        config.to_json_file(&path).unwrap();
        let loaded = PipelineConfig::from_json_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }
}
