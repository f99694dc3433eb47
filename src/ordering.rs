//! Duplicate orderings over alignment records
//!
//! One key chain drives two orders:
//!
//! - **strict order**: a total file order, used to sort records so that
//!   potential duplicates become adjacent
//! - **equivalence order**: the same keys with orientation collapsing and
//!   single-end/unmapped collapsing switched on; two records are in the same
//!   duplicate set iff it returns `Equal`
//!
//! Keys, first difference wins:
//!
//! 1. library id
//! 2. reference index, unmapped last
//! 3. 5' unclipped coordinate
//! 4. orientation category (collapsed in equivalence mode)
//! 5. mate reference index and mate 5' coordinate, only when both records are
//!    paired with both ends mapped
//! 6. records with a mapped end first
//! 7. (strict only) records without an unmapped end first, or paired first
//!    when paired-ness differs
//!
//! The full order used to choose a representative extends the strict order
//! with the scoring strategy, the read name, and first-of-pair precedence.

use std::cmp::Ordering;

use crate::library::LibraryRegistry;
use crate::orientation::Orientation;
use crate::record::AlignmentRecord;
use crate::scoring::ScoringStrategy;

/// Switches that loosen the key chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collapse {
    /// Compare orientation with [`Orientation::cmp_collapsed`]
    pub orientation: bool,
    /// Skip the unmapped-end / paired-ness key
    pub single_end_unmapped: bool,
}

impl Collapse {
    pub const STRICT: Collapse = Collapse {
        orientation: false,
        single_end_unmapped: false,
    };

    pub const EQUIVALENCE: Collapse = Collapse {
        orientation: true,
        single_end_unmapped: true,
    };
}

/// Comparator for duplicate sorting, grouping, and representative selection
#[derive(Debug, Clone, Default)]
pub struct OrderingPolicy {
    libraries: LibraryRegistry,
    scoring_strategy: ScoringStrategy,
}

impl OrderingPolicy {
    pub fn new(libraries: LibraryRegistry) -> Self {
        Self {
            libraries,
            scoring_strategy: ScoringStrategy::default(),
        }
    }

    pub fn with_scoring_strategy(mut self, strategy: ScoringStrategy) -> Self {
        self.scoring_strategy = strategy;
        self
    }

    pub fn scoring_strategy(&self) -> ScoringStrategy {
        self.scoring_strategy
    }

    pub fn set_scoring_strategy(&mut self, strategy: ScoringStrategy) {
        self.scoring_strategy = strategy;
    }

    pub fn libraries(&self) -> &LibraryRegistry {
        &self.libraries
    }

    pub fn libraries_mut(&mut self) -> &mut LibraryRegistry {
        &mut self.libraries
    }

    /// Total file order.
    pub fn strict_order(&mut self, a: &AlignmentRecord, b: &AlignmentRecord) -> Ordering {
        self.compare_keys(a, b, Collapse::STRICT)
    }

    /// Duplicate-set membership test; `Equal` means same set.
    pub fn equivalence_order(&mut self, a: &AlignmentRecord, b: &AlignmentRecord) -> Ordering {
        self.compare_keys(a, b, Collapse::EQUIVALENCE)
    }

    /// Strict order, then score, read name, and first-of-pair before second-of-pair.
    pub fn full_order(&mut self, a: &AlignmentRecord, b: &AlignmentRecord) -> Ordering {
        self.full_order_with(a, b, self.scoring_strategy)
    }

    /// [`Self::full_order`] under an explicit scoring strategy.
    pub fn full_order_with(
        &mut self,
        a: &AlignmentRecord,
        b: &AlignmentRecord,
        strategy: ScoringStrategy,
    ) -> Ordering {
        self.strict_order(a, b)
            .then_with(|| strategy.compare(a, b, true))
            .then_with(|| a.name().cmp(b.name()))
            .then_with(|| compare_pair_end(a, b))
    }

    /// The shared key chain behind [`Self::strict_order`] and [`Self::equivalence_order`].
    pub fn compare_keys(
        &mut self,
        a: &AlignmentRecord,
        b: &AlignmentRecord,
        collapse: Collapse,
    ) -> Ordering {
        self.compare_library(a, b)
            .then_with(|| compare_reference(a, b))
            .then_with(|| compare_coordinate(a, b))
            .then_with(|| compare_orientation(a, b, collapse.orientation))
            .then_with(|| compare_mate(a, b))
            .then_with(|| compare_mapped_end(a, b))
            .then_with(|| {
                if collapse.single_end_unmapped {
                    Ordering::Equal
                } else {
                    compare_unmapped_end(a, b)
                }
            })
    }

    fn compare_library(&mut self, a: &AlignmentRecord, b: &AlignmentRecord) -> Ordering {
        let lib_a = self.libraries.library_id(a);
        let lib_b = self.libraries.library_id(b);
        lib_a.cmp(&lib_b)
    }
}

/// Reference index ascending, with unmapped (no reference) after every mapped index.
pub fn compare_reference(a: &AlignmentRecord, b: &AlignmentRecord) -> Ordering {
    match (a.reference_sequence_id(), b.reference_sequence_id()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub fn compare_coordinate(a: &AlignmentRecord, b: &AlignmentRecord) -> Ordering {
    a.five_prime_coordinate().cmp(&b.five_prime_coordinate())
}

pub fn compare_orientation(a: &AlignmentRecord, b: &AlignmentRecord, collapse: bool) -> Ordering {
    let (oa, ob) = (Orientation::of(a), Orientation::of(b));
    if collapse {
        oa.cmp_collapsed(ob)
    } else {
        oa.cmp_raw(ob)
    }
}

/// Mate reference then mate 5' coordinate; `Equal` unless both records are
/// paired with both ends mapped.
pub fn compare_mate(a: &AlignmentRecord, b: &AlignmentRecord) -> Ordering {
    if !(a.is_paired_and_both_mapped() && b.is_paired_and_both_mapped()) {
        return Ordering::Equal;
    }
    a.mate_reference_sequence_id()
        .cmp(&b.mate_reference_sequence_id())
        .then_with(|| a.mate_five_prime_coordinate().cmp(&b.mate_five_prime_coordinate()))
}

pub fn compare_mapped_end(a: &AlignmentRecord, b: &AlignmentRecord) -> Ordering {
    b.has_mapped_end().cmp(&a.has_mapped_end())
}

/// Same paired-ness: records without an unmapped end first.
/// Different paired-ness: the paired record first.
pub fn compare_unmapped_end(a: &AlignmentRecord, b: &AlignmentRecord) -> Ordering {
    if a.is_paired() == b.is_paired() {
        a.has_unmapped_end().cmp(&b.has_unmapped_end())
    } else if a.is_paired() {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

fn compare_pair_end(a: &AlignmentRecord, b: &AlignmentRecord) -> Ordering {
    if a.is_paired() && b.is_paired() {
        b.is_first_of_pair().cmp(&a.is_first_of_pair())
    } else {
        Ordering::Equal
    }
}
