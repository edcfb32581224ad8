use thiserror::Error;

/// Error taxonomy for the activity federation layer.
///
/// Individual source-read failures inside a fan-out are recovered locally
/// (the failing source degrades to an empty result set) and never reach the
/// caller; the variants here are the ones that do.
#[derive(Error, Debug)]
pub enum ActivityError {
    #[error("Source read failure: {0}")]
    SourceRead(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Aggregation failure: {0}")]
    Aggregation(String),
}

pub type ActivityResult<T> = Result<T, ActivityError>;
