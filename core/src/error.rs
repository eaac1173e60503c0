use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::{MergeError, ParseError, SchemaError};

/// Any failure from reading, validating, parsing, or merging descriptors.
#[derive(Debug, Error)]
pub enum NodlError {
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Merge(#[from] MergeError),
}

impl NodlError {
    /// The merge conflict behind this error, if that is what it is.
    pub fn as_conflict(&self) -> Option<&crate::MergeConflict> {
        match self {
            Self::Merge(MergeError::Conflict(conflict)) => Some(conflict),
            _ => None,
        }
    }
}
