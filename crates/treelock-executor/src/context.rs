//! Explicit execution-context tagging
//!
//! Instead of ambient thread-local state, every task receives a
//! `TaskContext` from its runner. Context-aware wrappers push a
//! `ContextMark` into the context so the task (and the code it calls) can
//! test which execution scopes produced the current call path.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::cancel::CancellationToken;

static NEXT_MARK: AtomicU64 = AtomicU64::new(0);

/// Process-unique marker identifying one execution-context owner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextMark(u64);

impl ContextMark {
    pub fn new() -> Self {
        ContextMark(NEXT_MARK.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ContextMark {
    fn default() -> Self {
        Self::new()
    }
}

/// Context handed to a task by the runner executing it
///
/// Carries the effective cancellation token and the stack of marks
/// accumulated by the wrappers the task was submitted through.
#[derive(Debug, Clone)]
pub struct TaskContext {
    marks: Vec<ContextMark>,
    cancel: CancellationToken,
}

impl TaskContext {
    /// Root context created by a base runner
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            marks: Vec::new(),
            cancel,
        }
    }

    /// Derived context with one more mark and a replaced cancellation token
    pub fn with_mark(&self, mark: ContextMark, cancel: CancellationToken) -> Self {
        let mut marks = self.marks.clone();
        marks.push(mark);
        Self { marks, cancel }
    }

    /// Whether this call path went through the owner of `mark`
    pub fn has_mark(&self, mark: ContextMark) -> bool {
        self.marks.contains(&mark)
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}
