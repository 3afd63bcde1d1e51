//! Error types for the access coordinator

use thiserror::Error;

/// Result type for access operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the access coordinator
///
/// A denied access request is not an error; it is reported through
/// `AccessResult::is_available`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("access request contains no rights")]
    EmptyRequest,

    #[error("combined token requires at least one sub-token")]
    NoSubTokens,

    #[error("release listeners can only be notified after release")]
    NotReleased,

    #[error(transparent)]
    Cancelled(#[from] treelock_executor::Error),
}
