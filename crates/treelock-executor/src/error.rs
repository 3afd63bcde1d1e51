//! Error types for task execution

use thiserror::Error;

/// Result type for executor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while waiting on executor primitives
///
/// A timed out bounded wait is not an error; it is reported as an
/// `Ok(false)` result by the waiting operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("operation was cancelled")]
    Cancelled,
}
