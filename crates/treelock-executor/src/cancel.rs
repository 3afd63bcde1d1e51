//! Cooperative cancellation primitives
//!
//! Cancellation is a shared flag that running code checks; nothing is
//! interrupted preemptively.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    /// The token is also considered cancelled once any parent is.
    parents: Vec<CancellationToken>,
}

/// Owner side of a cancellation flag
///
/// Cloning shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationSource {
    state: Arc<CancelState>,
}

impl CancellationSource {
    /// Create a new, unsignalled cancellation source
    pub fn new() -> Self {
        Self::default()
    }

    /// Observer token for this source
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            state: Some(Arc::clone(&self.state)),
        }
    }

    /// Signal cancellation; idempotent
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }
}

/// Observer side of a cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    /// `None` means the token can never be cancelled.
    state: Option<Arc<CancelState>>,
}

impl CancellationToken {
    /// A token that is never cancelled
    pub fn unsignalled() -> Self {
        Self { state: None }
    }

    /// A token cancelled as soon as any of the given tokens is
    pub fn any(tokens: Vec<CancellationToken>) -> Self {
        Self {
            state: Some(Arc::new(CancelState {
                cancelled: AtomicBool::new(false),
                parents: tokens,
            })),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match &self.state {
            None => false,
            Some(state) => {
                state.cancelled.load(Ordering::SeqCst)
                    || state.parents.iter().any(CancellationToken::is_cancelled)
            }
        }
    }

    /// `Err(Error::Cancelled)` once the token has been signalled
    pub fn checked(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}
