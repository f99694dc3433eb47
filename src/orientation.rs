//! Strand orientation categories
//!
//! Paired categories use the first letter for this read's strand and the
//! second for the mate's. The discriminants fix the raw sort order.

use std::cmp::Ordering;

use crate::record::AlignmentRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Orientation {
    FF = 0,
    FR = 1,
    F = 2,
    RF = 3,
    RR = 4,
    R = 5,
}

impl Orientation {
    pub const ALL: [Orientation; 6] = [
        Orientation::FF,
        Orientation::FR,
        Orientation::F,
        Orientation::RF,
        Orientation::RR,
        Orientation::R,
    ];

    /// Category of a pair from both ends' strands.
    #[inline]
    pub fn paired(reverse: bool, mate_reverse: bool) -> Self {
        match (reverse, mate_reverse) {
            (false, false) => Orientation::FF,
            (false, true) => Orientation::FR,
            (true, false) => Orientation::RF,
            (true, true) => Orientation::RR,
        }
    }

    /// Category of a single-ended read from its own strand.
    #[inline]
    pub fn fragment(reverse: bool) -> Self {
        if reverse {
            Orientation::R
        } else {
            Orientation::F
        }
    }

    /// Paired category when both ends are mapped, fragment category otherwise.
    pub fn of(record: &AlignmentRecord) -> Self {
        if record.is_paired_and_both_mapped() {
            Self::paired(record.is_reverse(), record.is_mate_reverse())
        } else {
            Self::fragment(record.is_reverse())
        }
    }

    #[inline]
    pub fn is_fragment(self) -> bool {
        matches!(self, Orientation::F | Orientation::R)
    }

    /// Raw comparison by discriminant.
    #[inline]
    pub fn cmp_raw(self, other: Self) -> Ordering {
        (self as u8).cmp(&(other as u8))
    }

    /// Comparison where a fragment equals the pairs sharing its own strand:
    /// `F == FR == FF` and `R == RF == RR` when one side is `F` or `R`.
    ///
    /// Two distinct paired categories never collapse, so this is not transitive
    /// (`FR == F == FF` but `FR != FF`).
    pub fn cmp_collapsed(self, other: Self) -> Ordering {
        use Orientation::*;
        match (self, other) {
            (F, FR | FF) | (FR | FF, F) => Ordering::Equal,
            (R, RF | RR) | (RF | RR, R) => Ordering::Equal,
            _ => self.cmp_raw(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn orientation_strategy() -> impl Strategy<Value = Orientation> {
        prop::sample::select(Orientation::ALL.to_vec())
    }

    #[test]
    fn test_paired_and_fragment_categories() {
        assert_eq!(Orientation::paired(false, false), Orientation::FF);
        assert_eq!(Orientation::paired(false, true), Orientation::FR);
        assert_eq!(Orientation::paired(true, false), Orientation::RF);
        assert_eq!(Orientation::paired(true, true), Orientation::RR);
        assert_eq!(Orientation::fragment(false), Orientation::F);
        assert_eq!(Orientation::fragment(true), Orientation::R);
    }

    #[test]
    fn test_collapsed_equalities() {
        use Orientation::*;
        for (a, b) in [(F, FR), (F, FF), (R, RF), (R, RR), (F, F), (FR, FR)] {
            assert_eq!(a.cmp_collapsed(b), Ordering::Equal, "{a:?} vs {b:?}");
            assert_eq!(b.cmp_collapsed(a), Ordering::Equal, "{b:?} vs {a:?}");
        }
    }

    #[test]
    fn test_collapsed_distinctions() {
        use Orientation::*;
        assert_eq!(F.cmp_collapsed(RF), Ordering::Less);
        assert_eq!(RF.cmp_collapsed(F), Ordering::Greater);
        assert_eq!(R.cmp_collapsed(FR), Ordering::Greater);
        assert_eq!(FR.cmp_collapsed(FF), Ordering::Greater);
        assert_eq!(F.cmp_collapsed(R), Ordering::Less);
    }

    #[test]
    fn test_raw_order_follows_discriminants() {
        let mut all = Orientation::ALL.to_vec();
        all.reverse();
        all.sort_by(|a, b| a.cmp_raw(*b));
        assert_eq!(all, Orientation::ALL.to_vec());
    }

    proptest! {
        /// Property: collapsed comparison is antisymmetric
        #[test]
        fn prop_cmp_collapsed_symmetric(a in orientation_strategy(), b in orientation_strategy()) {
            prop_assert_eq!(a.cmp_collapsed(b), b.cmp_collapsed(a).reverse());
        }

        /// Property: collapsing only ever widens equality
        #[test]
        fn prop_raw_ties_are_collapsed_ties(a in orientation_strategy(), b in orientation_strategy()) {
            if a.cmp_raw(b) == Ordering::Equal {
                prop_assert_eq!(a.cmp_collapsed(b), Ordering::Equal);
            }
        }
    }
}
