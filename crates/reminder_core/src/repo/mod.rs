//! Repository layer over the key-value record store.
//!
//! # Responsibility
//! - Map typed records and settings onto well-known store keys.
//! - Keep JSON encoding details out of the lifecycle manager.
//!
//! # Invariants
//! - Repository writes validate records before persistence.
//! - Read paths reject malformed persisted state instead of masking it;
//!   masking is the caller's decision.

pub mod record_repo;
pub mod settings_repo;

use crate::model::record::RecordValidationError;
use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for record and settings persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(RecordValidationError),
    Store(StoreError),
    IndexOutOfRange { index: usize, len: usize },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::IndexOutOfRange { index, len } => {
                write!(f, "record index {index} out of range for list of {len}")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::IndexOutOfRange { .. } => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<RecordValidationError> for RepoError {
    fn from(value: RecordValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for RepoError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}
