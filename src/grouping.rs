//! Streaming partition of records into duplicate groups
//!
//! [`GroupingIterator`] pulls records from a stream in duplicate order and
//! cuts it into consecutive [`DuplicateGroup`]s. Membership is decided by
//! comparing each record to the seed of the open group with
//! [`OrderingPolicy::equivalence_order`]; a record that compares before the
//! seed means the input was not in duplicate order and aborts iteration.
//!
//! Groups seeded by an unmapped, secondary, or supplementary record are
//! always singletons.
//!
//! Input that is not already in duplicate order can be sorted on the way in
//! with [`GroupingIterator::sorting`], which spills to disk past the
//! configured record budget.

use log::debug;
use std::cmp::Ordering;
use std::iter::Peekable;

use crate::errors::{DupsetError, Result};
use crate::group::DuplicateGroup;
use crate::ordering::OrderingPolicy;
use crate::record::AlignmentRecord;
use crate::scoring::ScoringStrategy;
use crate::sort::{ExternalSorter, SortConfig, SortedStream};

type RecordStream = Box<dyn Iterator<Item = Result<AlignmentRecord>>>;

enum Source {
    Presorted(Peekable<RecordStream>),
    /// Output of the internal sort, read back under the strategy it was sorted with
    Sorted {
        stream: SortedStream<AlignmentRecord>,
        strategy: ScoringStrategy,
    },
    Closed,
}

pub struct GroupingIterator {
    source: Source,
    policy: OrderingPolicy,
    current: DuplicateGroup,
    failed: bool,
    groups_emitted: u64,
}

impl GroupingIterator {
    /// Group a stream that is already in duplicate (strict) order.
    pub fn presorted<I>(records: I, policy: OrderingPolicy) -> Result<Self>
    where
        I: IntoIterator<Item = Result<AlignmentRecord>>,
        I::IntoIter: 'static,
    {
        let stream: RecordStream = Box::new(records.into_iter());
        Self::with_source(Source::Presorted(stream.peekable()), policy)
    }

    /// Sort the stream first, spilling per `config`.
    ///
    /// The sort uses the full order under the scoring strategy set on `policy`
    /// at this point; changing the strategy later does not reorder the input.
    pub fn sorting<I>(records: I, mut policy: OrderingPolicy, config: &SortConfig) -> Result<Self>
    where
        I: IntoIterator<Item = Result<AlignmentRecord>>,
    {
        let strategy = policy.scoring_strategy();
        let mut compare =
            |a: &AlignmentRecord, b: &AlignmentRecord| policy.full_order_with(a, b, strategy);

        let mut sorter = ExternalSorter::new(config);
        for record in records {
            sorter.add(record?, &mut compare)?;
        }
        debug!(
            "sorting {} records in duplicate order ({} spill files)",
            sorter.len(),
            sorter.spill_count()
        );
        let stream = sorter.finish(&mut compare)?;

        Self::with_source(Source::Sorted { stream, strategy }, policy)
    }

    fn with_source(source: Source, policy: OrderingPolicy) -> Result<Self> {
        let mut iter = Self {
            source,
            policy,
            current: DuplicateGroup::new(),
            failed: false,
            groups_emitted: 0,
        };
        if let Some(record) = iter.pull() {
            iter.current.add(record?);
        }
        Ok(iter)
    }

    fn pull(&mut self) -> Option<Result<AlignmentRecord>> {
        match &mut self.source {
            Source::Presorted(records) => records.next(),
            Source::Sorted { stream, strategy } => {
                let strategy = *strategy;
                let policy = &mut self.policy;
                stream.next_with(&mut |a: &AlignmentRecord, b: &AlignmentRecord| {
                    policy.full_order_with(a, b, strategy)
                })
            }
            Source::Closed => None,
        }
    }

    fn source_has_next(&mut self) -> bool {
        match &mut self.source {
            Source::Presorted(records) => records.peek().is_some(),
            Source::Sorted { stream, .. } => stream.has_next(),
            Source::Closed => false,
        }
    }

    /// True while the open group holds records or the stream has more.
    pub fn has_next(&mut self) -> bool {
        !self.failed && (!self.current.is_empty() || self.source_has_next())
    }

    /// Affects representative selection only; group boundaries never depend on scoring.
    pub fn set_scoring_strategy(&mut self, strategy: ScoringStrategy) {
        self.policy.set_scoring_strategy(strategy);
    }

    /// The policy to resolve representatives of emitted groups with
    pub fn policy(&self) -> &OrderingPolicy {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut OrderingPolicy {
        &mut self.policy
    }

    pub fn groups_emitted(&self) -> u64 {
        self.groups_emitted
    }

    /// Release the input stream and any spill files.
    pub fn close(&mut self) {
        if let Source::Sorted { stream, .. } = &mut self.source {
            stream.close();
        }
        self.source = Source::Closed;
        self.current = DuplicateGroup::new();
    }

    fn emit(&mut self, next_seed: Option<AlignmentRecord>) -> DuplicateGroup {
        let mut fresh = DuplicateGroup::new();
        if let Some(record) = next_seed {
            fresh.add(record);
        }
        self.groups_emitted += 1;
        std::mem::replace(&mut self.current, fresh)
    }

    fn fail(&mut self, error: DupsetError) -> Option<Result<DuplicateGroup>> {
        self.failed = true;
        self.close();
        Some(Err(error))
    }
}

impl Iterator for GroupingIterator {
    type Item = Result<DuplicateGroup>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }

        loop {
            let record = match self.pull() {
                None => return Some(Ok(self.emit(None))),
                Some(Err(e)) => return self.fail(e),
                Some(Ok(record)) => record,
            };

            let Some(seed) = self.current.seed() else {
                self.current.add(record);
                continue;
            };

            if seed.is_unmapped() || seed.is_secondary_or_supplementary() {
                return Some(Ok(self.emit(Some(record))));
            }

            match self.policy.equivalence_order(seed, &record) {
                Ordering::Greater => {
                    let error = DupsetError::SortOrderViolation {
                        seed: seed.to_string(),
                        record: record.to_string(),
                    };
                    return self.fail(error);
                }
                Ordering::Equal => self.current.add(record),
                Ordering::Less => return Some(Ok(self.emit(Some(record)))),
            }
        }
    }
}
