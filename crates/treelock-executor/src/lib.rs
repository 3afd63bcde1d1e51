//! Task-execution plumbing for the treelock access coordinator
//!
//! Provides the `TaskRunner` abstraction the access layer is built on: a
//! serializing runner that totally orders submitted work, a synchronous
//! hand-off helper, cooperative cancellation flags, a one-shot waitable
//! signal, and explicit execution-context tagging.

pub mod cancel;
pub mod context;
pub mod error;
pub mod runner;
pub mod signal;

pub use cancel::{CancellationSource, CancellationToken};
pub use context::{ContextMark, TaskContext};
pub use error::{Error, Result};
pub use runner::{run_sync, SerialRunner, SyncTaskRunner, Task, TaskRunner};
pub use signal::WaitableSignal;
