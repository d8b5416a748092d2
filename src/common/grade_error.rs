use std::fmt;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The four model passes of one analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelRole {
    Detection,
    Ripeness,
    Defect,
    Variety,
}

impl ModelRole {
    /// Mandatory roles abort an analysis when they fail; optional ones degrade.
    pub fn is_mandatory(&self) -> bool {
        !matches!(self, ModelRole::Variety)
    }

    pub fn str(&self) -> &'static str {
        match self {
            ModelRole::Detection => "detection",
            ModelRole::Ripeness => "ripeness",
            ModelRole::Defect => "defect",
            ModelRole::Variety => "variety",
        }
    }

    pub fn all() -> [ModelRole; 4] {
        [ModelRole::Detection, ModelRole::Ripeness, ModelRole::Defect, ModelRole::Variety]
    }
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.str())
    }
}

#[derive(Debug, Error)]
pub enum GradeError {
    /// Unusable configuration.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Mandatory models absent when the pipeline is built.
    #[error("models unavailable: {} model not loaded", roles_list(.0))]
    ModelsUnavailable(Vec<ModelRole>),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{role} model failed: {reason}")]
    ModelInvocation { role: ModelRole, reason: String },

    #[error("{role} model timed out after {timeout:?}")]
    ModelTimeout { role: ModelRole, timeout: Duration },

    #[error("{role} model produced unusable output: {detail}")]
    MalformedOutput { role: ModelRole, detail: String },

    #[error("analysis cancelled")]
    Cancelled,
}

fn roles_list(roles: &[ModelRole]) -> String {
    roles.iter().map(|r| r.str()).collect::<Vec<_>>().join(", ")
}

impl GradeError {
    /// Failure attributable to one model pass, as opposed to the input or the
    /// caller.
    pub fn is_model_failure(&self) -> bool {
        self.role().is_some()
    }

    pub fn role(&self) -> Option<ModelRole> {
        match self {
            GradeError::ModelInvocation { role, .. }
            | GradeError::ModelTimeout { role, .. }
            | GradeError::MalformedOutput { role, .. } => Some(*role),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_models_and_bad_settings_read_differently() {
        let missing = GradeError::ModelsUnavailable(vec![ModelRole::Ripeness, ModelRole::Defect]);
        assert_eq!(missing.to_string(), "models unavailable: ripeness, defect model not loaded");

        let invalid = GradeError::Configuration("defect confidence threshold 1.5 is outside [0, 1)".into());
        assert!(invalid.to_string().starts_with("invalid configuration"));
        assert!(!invalid.is_model_failure());
    }
}
