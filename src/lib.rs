//! dupsetrs - duplicate sets for coordinate-level duplicate marking
//!
//! Alignment records are grouped into *duplicate sets*: records from the same
//! library whose unclipped 5' ends (and, for pairs, mates) land on the same
//! reference coordinates and orientation. Within each set one record is the
//! representative and every other mapped primary record is flagged as a
//! duplicate.
//!
//! # Example
//!
//! ```ignore
//! use dupsetrs::{GroupingIterator, LibraryRegistry, OrderingPolicy, SortConfig};
//!
//! let policy = OrderingPolicy::new(LibraryRegistry::from_header(&header));
//! let mut groups = GroupingIterator::sorting(records, policy, &SortConfig::new())?;
//! while let Some(group) = groups.next() {
//!     for record in group?.into_members(groups.policy_mut())? {
//!         // record.is_duplicate() ...
//!     }
//! }
//! ```

pub mod args;
pub mod cigar;
pub mod errors;
pub mod group;
pub mod grouping;
pub mod io;
pub mod library;
pub mod ordering;
pub mod orientation;
pub mod record;
pub mod scoring;
pub mod sort;

// Re-export commonly used items
pub use errors::{DupsetError, Result};
pub use group::DuplicateGroup;
pub use grouping::GroupingIterator;
pub use library::{LibraryRegistry, UNKNOWN_LIBRARY};
pub use ordering::{Collapse, OrderingPolicy};
pub use orientation::Orientation;
pub use record::{AlignmentRecord, RecordBuilder};
pub use scoring::ScoringStrategy;
pub use sort::{ExternalSorter, SortConfig, SortedStream};
