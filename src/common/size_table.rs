use serde::{Deserialize, Serialize};
use crate::common::GradeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SizeBucket {
    Small,
    Medium,
    Large,
    ExtraLarge,
}

impl SizeBucket {
    pub fn display_name(&self) -> &'static str {
        match self {
            SizeBucket::Small => "Small",
            SizeBucket::Medium => "Medium",
            SizeBucket::Large => "Large",
            SizeBucket::ExtraLarge => "Extra large",
        }
    }

    const ORDERED: [SizeBucket; 4] = [
        SizeBucket::Small,
        SizeBucket::Medium,
        SizeBucket::Large,
        SizeBucket::ExtraLarge,
    ];
}

/// Area boundaries (square pixels) between the four size buckets, ascending:
/// small/medium, medium/large and large/extra-large.
///
/// [`SizeBucket::Small`] opens at zero. An area exactly at a boundary falls
/// into the larger bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeTable {
    pub boundaries: [f32; 3],
}

impl Default for SizeTable {
    fn default() -> Self {
        Self {
            boundaries: [50_000., 100_000., 150_000.],
        }
    }
}

impl SizeTable {
    pub fn new(boundaries: [f32; 3]) -> Result<Self, GradeError> {
        let table = Self { boundaries };
        table.validate()?;
        Ok(table)
    }

    /// Boundaries used by the compact-camera deployments.
    pub fn compact() -> Self {
        Self {
            boundaries: [45_000., 90_000., 140_000.],
        }
    }

    pub fn validate(&self) -> Result<(), GradeError> {
        if self.boundaries.iter().any(|c| !c.is_finite() || *c <= 0.) {
            return Err(GradeError::Configuration(format!(
                "size boundaries must be finite and positive: {:?}", self.boundaries
            )));
        }
        if self.boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(GradeError::Configuration(format!(
                "size boundaries must be strictly ascending: {:?}", self.boundaries
            )));
        }
        Ok(())
    }

    pub fn bucket(&self, area: f32) -> SizeBucket {
        let passed = self.boundaries.iter().take_while(|b| area >= **b).count();
        SizeBucket::ORDERED[passed]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_bucket_opens_at_its_lower_bound() {
        let table = SizeTable::new([50_000., 100_000., 150_000.]).unwrap();
        assert_eq!(table.bucket(0.), SizeBucket::Small);
        assert_eq!(table.bucket(49_999.9), SizeBucket::Small);
        assert_eq!(table.bucket(50_000.), SizeBucket::Medium);
        assert_eq!(table.bucket(99_999.), SizeBucket::Medium);
        assert_eq!(table.bucket(100_000.), SizeBucket::Large);
        assert_eq!(table.bucket(149_999.), SizeBucket::Large);
        assert_eq!(table.bucket(150_000.), SizeBucket::ExtraLarge);
        assert_eq!(table.bucket(f32::MAX), SizeBucket::ExtraLarge);
    }

    #[test]
    fn compact_table_moves_medium_boundary() {
        assert_eq!(SizeTable::compact().bucket(47_000.), SizeBucket::Medium);
        assert_eq!(SizeTable::default().bucket(47_000.), SizeBucket::Small);
    }

    #[test]
    fn rejects_unordered_table() {
        assert!(SizeTable::new([50_000., 40_000., 150_000.]).is_err());
        assert!(SizeTable::new([50_000., 50_000., 150_000.]).is_err());
        assert!(SizeTable::new([0., 50_000., 150_000.]).is_err());
    }
}
