//! A set of records that are duplicates of each other
//!
//! Records are kept in insertion order until the representative or member
//! list is requested. At that point the set is sorted by the full order, the
//! first record becomes the representative, and duplicate flags are assigned.
//!
//! The first record *added* (the seed) is what the grouping iterator compares
//! against. It is not necessarily the representative.

use crate::errors::{DupsetError, Result};
use crate::ordering::OrderingPolicy;
use crate::record::AlignmentRecord;

#[derive(Debug, Clone, Default)]
pub struct DuplicateGroup {
    records: Vec<AlignmentRecord>,
    seed: usize,
    needs_sorting: bool,
}

impl DuplicateGroup {
    pub fn new() -> Self {
        Self {
            records: Vec::with_capacity(10),
            seed: 0,
            needs_sorting: false,
        }
    }

    pub fn add(&mut self, record: AlignmentRecord) {
        self.records.push(record);
        self.needs_sorting = true;
    }

    /// The first record added to the group
    pub fn seed(&self) -> Option<&AlignmentRecord> {
        self.records.get(self.seed)
    }

    /// The record kept as non-duplicate.
    pub fn representative(&mut self, policy: &mut OrderingPolicy) -> Result<&AlignmentRecord> {
        self.ensure_sorted(policy);
        self.records.first().ok_or(DupsetError::EmptyGroup)
    }

    /// All records, representative first, with duplicate flags assigned.
    pub fn members(&mut self, policy: &mut OrderingPolicy) -> Result<&[AlignmentRecord]> {
        self.ensure_sorted(policy);
        if self.records.is_empty() {
            return Err(DupsetError::EmptyGroup);
        }
        Ok(&self.records)
    }

    /// Sort by the full order (if needed) and hand the records over.
    pub fn into_members(mut self, policy: &mut OrderingPolicy) -> Result<Vec<AlignmentRecord>> {
        self.ensure_sorted(policy);
        if self.records.is_empty() {
            return Err(DupsetError::EmptyGroup);
        }
        Ok(self.records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn ensure_sorted(&mut self, policy: &mut OrderingPolicy) {
        if !self.needs_sorting {
            return;
        }
        self.needs_sorting = false;
        if self.records.is_empty() {
            return;
        }

        // Stable: ties keep their current relative order.
        let mut order: Vec<usize> = (0..self.records.len()).collect();
        order.sort_by(|&a, &b| policy.full_order(&self.records[a], &self.records[b]));

        self.seed = order.iter().position(|&o| o == self.seed).unwrap_or(0);

        let mut slots: Vec<Option<AlignmentRecord>> =
            std::mem::take(&mut self.records).into_iter().map(Some).collect();
        self.records = order.iter().filter_map(|&o| slots[o].take()).collect();

        let representative = self.records[0].name().to_owned();
        for record in &mut self.records {
            if !record.is_unmapped()
                && !record.is_secondary_or_supplementary()
                && record.name() != representative.as_slice()
            {
                record.set_duplicate(true);
            }
        }
        self.records[0].set_duplicate(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordBuilder;
    use noodles::sam::alignment::record::Flags;

    fn mapped_pair(name: &str, reference_length: u32) -> AlignmentRecord {
        RecordBuilder::new()
            .name(name)
            .flags(Flags::SEGMENTED | Flags::MATE_REVERSE_COMPLEMENTED | Flags::FIRST_SEGMENT)
            .reference_sequence_id(Some(0))
            .unclipped_start(100)
            .unclipped_end(199)
            .mate_reference_sequence_id(Some(0))
            .mate_unclipped_start(300)
            .mate_unclipped_end(399)
            .reference_length(reference_length)
            .build()
    }

    fn flags_of(group: &mut DuplicateGroup, policy: &mut OrderingPolicy) -> Vec<(String, bool)> {
        group
            .members(policy)
            .unwrap()
            .iter()
            .map(|r| (r.name().to_string(), r.is_duplicate()))
            .collect()
    }

    #[test]
    fn test_empty_group() {
        let mut policy = OrderingPolicy::default();
        let mut group = DuplicateGroup::new();
        assert!(group.is_empty());
        assert!(matches!(group.representative(&mut policy), Err(DupsetError::EmptyGroup)));
        assert!(matches!(group.members(&mut policy), Err(DupsetError::EmptyGroup)));
        assert!(group.seed().is_none());
    }

    #[test]
    fn test_best_scoring_record_is_representative() {
        let mut policy = OrderingPolicy::default();
        let mut group = DuplicateGroup::new();
        group.add(mapped_pair("short", 80));
        group.add(mapped_pair("long", 100));
        group.add(mapped_pair("mid", 90));

        assert_eq!(group.seed().unwrap().name(), "short");
        assert_eq!(group.representative(&mut policy).unwrap().name(), "long");
        assert_eq!(group.seed().unwrap().name(), "short");
        assert_eq!(
            flags_of(&mut group, &mut policy),
            vec![
                ("long".to_string(), false),
                ("mid".to_string(), true),
                ("short".to_string(), true),
            ]
        );
    }

    #[test]
    fn test_representative_flag_forced_false() {
        let mut policy = OrderingPolicy::default();
        let mut rep = mapped_pair("rep", 100);
        rep.set_duplicate(true);
        let mut group = DuplicateGroup::new();
        group.add(rep);
        assert!(!group.representative(&mut policy).unwrap().is_duplicate());
    }

    #[test]
    fn test_unmapped_secondary_and_mate_are_untouched() {
        let mut policy = OrderingPolicy::default();
        let mut group = DuplicateGroup::new();
        group.add(mapped_pair("rep", 100));
        group.add(
            RecordBuilder::new()
                .name("rep")
                .flags(Flags::SEGMENTED | Flags::REVERSE_COMPLEMENTED | Flags::LAST_SEGMENT)
                .reference_sequence_id(Some(0))
                .unclipped_start(50)
                .unclipped_end(60)
                .reference_length(10)
                .build(),
        );
        group.add(
            RecordBuilder::new()
                .name("sec")
                .flags(Flags::SECONDARY)
                .reference_sequence_id(Some(0))
                .unclipped_start(100)
                .build(),
        );
        group.add(
            RecordBuilder::new()
                .name("supp")
                .flags(Flags::SUPPLEMENTARY)
                .reference_sequence_id(Some(0))
                .unclipped_start(100)
                .build(),
        );
        group.add(RecordBuilder::new().name("unmapped").flags(Flags::UNMAPPED).build());

        let members = group.members(&mut policy).unwrap();
        assert_eq!(members[0].name(), "rep");
        assert!(members.iter().all(|r| !r.is_duplicate()));
    }

    #[test]
    fn test_existing_duplicate_flags_are_not_cleared() {
        let mut policy = OrderingPolicy::default();
        let mut unmapped = RecordBuilder::new().name("u").flags(Flags::UNMAPPED).build();
        unmapped.set_duplicate(true);
        let mut group = DuplicateGroup::new();
        group.add(mapped_pair("rep", 100));
        group.add(unmapped);
        let members = group.members(&mut policy).unwrap();
        assert!(members[1].is_duplicate());
    }

    #[test]
    fn test_sorting_is_idempotent() {
        let mut policy = OrderingPolicy::default();
        let mut group = DuplicateGroup::new();
        for name in ["c", "a", "b"] {
            group.add(mapped_pair(name, 100));
        }
        let first = flags_of(&mut group, &mut policy);
        let second = flags_of(&mut group, &mut policy);
        assert_eq!(first, second);
        assert_eq!(group.representative(&mut policy).unwrap().name(), "a");
    }

    #[test]
    fn test_seed_survives_rotating_sort() {
        // Full order moves insertion positions [0, 1, 2] to [1, 2, 0].
        let mut policy = OrderingPolicy::default();
        let mut group = DuplicateGroup::new();
        group.add(mapped_pair("seed", 90));
        group.add(mapped_pair("low", 80));
        group.add(mapped_pair("high", 100));

        assert_eq!(group.representative(&mut policy).unwrap().name(), "high");
        assert_eq!(group.seed().unwrap().name(), "seed");
        let names: Vec<String> = group
            .members(&mut policy)
            .unwrap()
            .iter()
            .map(|r| r.name().to_string())
            .collect();
        assert_eq!(names, vec!["high", "seed", "low"]);
        assert_eq!(group.seed().unwrap().name(), "seed");
    }

    #[test]
    fn test_add_after_sort_resorts() {
        let mut policy = OrderingPolicy::default();
        let mut group = DuplicateGroup::new();
        group.add(mapped_pair("b", 100));
        assert_eq!(group.representative(&mut policy).unwrap().name(), "b");

        group.add(mapped_pair("a", 120));
        assert_eq!(group.len(), 2);
        assert_eq!(group.representative(&mut policy).unwrap().name(), "a");
        let members = group.into_members(&mut policy).unwrap();
        assert!(!members[0].is_duplicate());
        assert!(members[1].is_duplicate());
    }
}
