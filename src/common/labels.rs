//! Label sets of the grading models.
//!
//! Model outputs are index-aligned with a configured list of label strings.
//! Known labels parse into tagged variants; anything else is kept verbatim in
//! an `Other` variant and flows through the pipeline like any other label.

use std::fmt;
use serde::{Deserialize, Serialize};

/// Lower-cases a raw label and folds `-` and spaces into `_`.
pub(crate) fn normalize_label(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c.is_whitespace() { '_' } else { c })
        .collect()
}

/// Ripeness stage reported by the ripeness classifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RipenessLabel {
    Unripe,
    BreakingStage,
    HalfRipe,
    Ripe,
    RipeWithMinorDefect,
    Unhealthy,
    Other(String),
}

impl RipenessLabel {
    pub fn from_label(raw: &str) -> Self {
        match normalize_label(raw).as_str() {
            "unripe" => Self::Unripe,
            "breaking" | "breaking_stage" => Self::BreakingStage,
            "half_ripe" | "halfripe" => Self::HalfRipe,
            "ripe" => Self::Ripe,
            "ripe_with_minor_defect" | "ripe_minor_defect" => Self::RipeWithMinorDefect,
            "unhealthy" | "overripe" => Self::Unhealthy,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Self::Unripe => "Unripe",
            Self::BreakingStage => "Breaking stage",
            Self::HalfRipe => "Half ripe",
            Self::Ripe => "Ripe",
            Self::RipeWithMinorDefect => "Ripe, minor defect",
            Self::Unhealthy => "Unhealthy",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for RipenessLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Surface defect class reported by the defect detector.
///
/// Every label mentioning "scab" parses as [`DefectLabel::Scab`], so all
/// scab-type pathogens share one tally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DefectLabel {
    BlackSpot,
    BrownSpot,
    Scab,
    Other(String),
}

impl DefectLabel {
    pub fn from_label(raw: &str) -> Self {
        let norm = normalize_label(raw);
        match norm.as_str() {
            "black_spot" | "blackspot" => Self::BlackSpot,
            "brown_spot" | "brownspot" => Self::BrownSpot,
            _ if norm.contains("scab") => Self::Scab,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn is_scab_type(&self) -> bool {
        matches!(self, Self::Scab)
    }

    pub fn display_name(&self) -> &str {
        match self {
            Self::BlackSpot => "Black spot",
            Self::BrownSpot => "Brown spot",
            Self::Scab => "Scab",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for DefectLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

pub(crate) fn parse_labels<L>(raw: &[String], parse: fn(&str) -> L) -> Vec<L> {
    raw.iter().map(|l| parse(l)).collect()
}
