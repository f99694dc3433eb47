//! Error types for duplicate-set construction.

use thiserror::Error;

/// Result type alias for dupsetrs operations
pub type Result<T> = std::result::Result<T, DupsetError>;

/// Error type for dupsetrs operations
#[derive(Error, Debug)]
pub enum DupsetError {
    /// A record compared strictly before the seed of the open duplicate group.
    ///
    /// Raised when the upstream sort is broken or when a stream claimed to be
    /// presorted is not.
    #[error("The input records were not sorted in duplicate order:\n{seed}\n{record}")]
    SortOrderViolation {
        /// Description of the seed record of the open group
        seed: String,
        /// Description of the offending record
        record: String,
    },

    /// The representative or members of a group that never received a record were requested
    #[error("Duplicate group is empty")]
    EmptyGroup,

    /// An input alignment record could not be converted
    #[error("Invalid record '{name}': {reason}")]
    InvalidRecord {
        /// Read name, or a placeholder when the record has none
        name: String,
        /// Explanation of the problem
        reason: String,
    },

    /// Failure reading input or reading/writing spill files
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
