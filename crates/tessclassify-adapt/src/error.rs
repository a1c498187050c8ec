//! Error types for tessclassify-adapt
//!
//! Classification itself never fails: an unmatchable blob produces the
//! noise result, a feature set the stores cannot use produces nothing,
//! and a full adaptive store bumps a counter instead of erroring. The
//! variants here cover the conditions a caller can actually fix, which
//! are all mismatches between the classifier and the data handed to it.

use thiserror::Error;

/// tessclassify-rs adaptive classifier error type
#[derive(Error, Debug)]
pub enum AdaptError {
    /// Class id past the end of the character set
    #[error("unknown class id: {class_id} >= {num_classes}")]
    UnknownClass { class_id: usize, num_classes: usize },

    /// Character set without a space entry, needed for the noise result
    #[error("character set has no space entry")]
    MissingSpaceClass,

    /// Component sized for a different character set
    #[error("{what} sized for {found} classes, character set holds {expected}")]
    ClassCountMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// Template store failure
    #[error(transparent)]
    Core(#[from] tessclassify_core::Error),
}

/// Result type alias for adaptive classifier operations
pub type AdaptResult<T> = std::result::Result<T, AdaptError>;
