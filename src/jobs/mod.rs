//! The two daily batch jobs. Each returns a summary the binary logs and
//! turns into a process exit code.

pub mod collect;
pub mod compare;

pub use collect::{run_collection, CollectSummary};
pub use compare::{run_comparison, CompareSummary};

use thiserror::Error;

use crate::error::{AppError, CompareError, FetchError, LoadError};

pub const EXIT_OK: i32 = 0;
/// Configuration, store or load failure.
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_FETCH_FAILED: i32 = 2;
/// Collection finished but at least one sink did not persist it.
pub const EXIT_SINK_FAILED: i32 = 3;

/// Failure that ends a job before it can produce a summary.
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Compare(#[from] CompareError),
}

impl JobError {
    pub fn exit_code(&self) -> i32 {
        match self {
            JobError::Fetch(_) => EXIT_FETCH_FAILED,
            _ => EXIT_FAILURE,
        }
    }
}
