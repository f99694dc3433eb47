//! Duplicate scoring strategies
//!
//! Scores decide which record of a duplicate set is kept: among records that
//! tie on file order, the higher score sorts first.

use clap::ValueEnum;
use std::cmp::Ordering;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::record::AlignmentRecord;

/// Per-term cap so that two terms never overflow an `i16` score
const MAX_TERM: i32 = (i16::MAX / 2) as i32;

/// Base qualities below this do not contribute to [`ScoringStrategy::SumOfBaseQualities`]
pub const MIN_BASE_QUALITY: u8 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ScoringStrategy {
    /// Sum of base qualities >= 15
    SumOfBaseQualities,
    /// Reference bases covered by the read, plus its mate's when the mate cigar is trusted
    #[default]
    TotalMappedReferenceLength,
    /// Arbitrary but deterministic, from the read name
    Random,
}

impl ScoringStrategy {
    /// Score of a single record; larger is better.
    pub fn score(self, record: &AlignmentRecord, trust_mate_cigar: bool) -> i32 {
        match self {
            ScoringStrategy::SumOfBaseQualities => {
                capped(i64::from(record.base_quality_sum()))
            }
            ScoringStrategy::TotalMappedReferenceLength => {
                let mut score = 0;
                if !record.is_unmapped() {
                    score += capped(i64::from(record.reference_length()));
                }
                if trust_mate_cigar && record.is_paired() && !record.is_mate_unmapped() {
                    if let Some(len) = record.mate_reference_length() {
                        score += capped(i64::from(len));
                    }
                }
                score
            }
            ScoringStrategy::Random => {
                let mut hasher = DefaultHasher::new();
                record.name().hash(&mut hasher);
                (hasher.finish() % (MAX_TERM as u64)) as i32
            }
        }
    }

    /// Preference order of two records: `Less` when `a` is preferred.
    pub fn compare(self, a: &AlignmentRecord, b: &AlignmentRecord, trust_mate_cigar: bool) -> Ordering {
        self.score(b, trust_mate_cigar)
            .cmp(&self.score(a, trust_mate_cigar))
    }
}

#[inline]
fn capped(value: i64) -> i32 {
    value.min(i64::from(MAX_TERM)) as i32
}

/// Sum of base qualities at or above [`MIN_BASE_QUALITY`]
#[inline]
pub fn sum_of_base_qualities(qualities: &[u8]) -> u32 {
    qualities
        .iter()
        .copied()
        .filter(|&q| q >= MIN_BASE_QUALITY)
        .map(u32::from)
        .sum()
}
