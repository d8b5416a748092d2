//! Grading rules.
//!
//! The rules are evaluated top to bottom and the first match wins. Stricter
//! rules sit above the permissive ones, so a pathogen always outranks a
//! favourable ripeness reading.

use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::common::{DefectLabel, GradeDetection, RipenessLabel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    Accept,
    Conditional,
    Reject,
    Hold,
}

impl Grade {
    pub fn display_name(&self) -> &'static str {
        match self {
            Grade::Accept => "Accept",
            Grade::Conditional => "Conditional",
            Grade::Reject => "Reject",
            Grade::Hold => "Hold",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub grade: Grade,
    pub reason: Option<String>,
    /// 1-based position of the rule that fired.
    pub rule: usize,
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {}", self.grade.display_name(), reason),
            None => f.write_str(self.grade.display_name()),
        }
    }
}

/// Number of defect detections per defect class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefectCounts {
    counts: BTreeMap<DefectLabel, usize>,
}

// Keyed by display name: JSON maps only take string keys.
impl Serialize for DefectCounts {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.counts.len()))?;
        for (label, n) in &self.counts {
            map.serialize_entry(label.display_name(), n)?;
        }
        map.end()
    }
}

impl DefectCounts {
    pub fn from_detections(detections: &[GradeDetection<DefectLabel>]) -> Self {
        let mut counts = Self::default();
        for det in detections {
            counts.add(det.label.clone(), 1);
        }
        counts
    }

    pub fn add(&mut self, label: DefectLabel, n: usize) {
        *self.counts.entry(label).or_insert(0) += n;
    }

    pub fn with(mut self, label: DefectLabel, n: usize) -> Self {
        self.add(label, n);
        self
    }

    pub fn count(&self, label: &DefectLabel) -> usize {
        self.counts.get(label).copied().unwrap_or(0)
    }

    pub fn any_scab(&self) -> bool {
        self.counts.iter().any(|(label, n)| label.is_scab_type() && *n > 0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DefectLabel, &usize)> {
        self.counts.iter()
    }
}

struct Rule {
    applies: fn(&RipenessLabel, &DefectCounts) -> bool,
    grade: Grade,
    reason: Option<&'static str>,
}

const BROWN_SPOT_LIMIT: usize = 10;

const RULES: [Rule; 8] = [
    Rule {
        applies: |_, d| d.any_scab(),
        grade: Grade::Reject,
        reason: Some("pathogen detected"),
    },
    Rule {
        applies: |r, d| {
            *r == RipenessLabel::Unhealthy
                && (d.count(&DefectLabel::BlackSpot) >= 1 || d.count(&DefectLabel::BrownSpot) >= 1)
        },
        grade: Grade::Reject,
        reason: Some("overripe and decaying"),
    },
    Rule {
        applies: |_, d| d.count(&DefectLabel::BlackSpot) >= 1,
        grade: Grade::Conditional,
        reason: Some("processing-grade only"),
    },
    Rule {
        applies: |_, d| d.count(&DefectLabel::BrownSpot) >= BROWN_SPOT_LIMIT,
        grade: Grade::Conditional,
        reason: Some("excess surface spotting"),
    },
    Rule {
        applies: |r, _| matches!(r, RipenessLabel::Unripe | RipenessLabel::BreakingStage),
        grade: Grade::Conditional,
        reason: Some("needs further ripening"),
    },
    Rule {
        applies: |r, _| {
            matches!(r, RipenessLabel::HalfRipe | RipenessLabel::Ripe | RipenessLabel::RipeWithMinorDefect)
        },
        grade: Grade::Accept,
        reason: None,
    },
    Rule {
        applies: |r, _| *r == RipenessLabel::Unhealthy,
        grade: Grade::Reject,
        reason: Some("overripe"),
    },
    Rule {
        applies: |_, _| true,
        grade: Grade::Hold,
        reason: Some("undetermined"),
    },
];

/// Grades a fruit from its ripeness reading and defect tally.
pub fn decide(ripeness: &RipenessLabel, defects: &DefectCounts) -> Decision {
    let (idx, rule) = RULES
        .iter()
        .enumerate()
        .find(|(_, rule)| (rule.applies)(ripeness, defects))
        .unwrap_or((RULES.len() - 1, &RULES[RULES.len() - 1]));

    Decision {
        grade: rule.grade,
        reason: rule.reason.map(str::to_string),
        rule: idx + 1,
    }
}
