//! The access-token family
//!
//! `AccessToken` is the contract every token kind implements. The trait
//! ships a default `await_release` built only on the bounded
//! `try_await_release`, and `ReleaseListenerSupport` carries the reusable
//! listener bookkeeping, so concrete tokens only implement the few real
//! primitives.

mod combined;
mod delegated;
mod generic;
mod listeners;

pub use combined::CombinedToken;
pub use delegated::DelegatedAccessToken;
pub use generic::GenericAccessToken;
pub use listeners::{ListenerHandle, ReleaseListener, ReleaseListenerSupport};

use std::sync::Arc;
use std::time::Duration;

use treelock_executor::{
    CancellationToken, ContextMark, Task, TaskContext, TaskRunner, WaitableSignal,
};

use crate::error::Result;
use crate::request::AccessId;

/// Wait bound for one iteration of the polling `await_release` loop
const RELEASE_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Handle representing one granted access scope
///
/// Tokens transition from active to released exactly once; every operation
/// on a released token is an idempotent no-op or an immediate success.
/// Release may be invoked concurrently from any number of threads with
/// exactly one observable transition.
pub trait AccessToken: Send + Sync {
    /// Id of the request this token was granted for
    fn access_id(&self) -> &AccessId;

    fn is_released(&self) -> bool;

    /// Transition to released; idempotent
    fn release(&self);

    /// Release, plus cooperative cancellation of tasks currently executing
    /// in this token's context
    fn release_and_cancel(&self);

    /// Bounded wait for release
    ///
    /// `Ok(true)` once released, `Ok(false)` when `timeout` elapsed first,
    /// `Err(Error::Cancelled)` when `cancel` was signalled before or
    /// during the wait.
    fn try_await_release(&self, cancel: &CancellationToken, timeout: Duration) -> Result<bool>;

    /// Register a callback fired exactly once at release
    ///
    /// When the token is already released the listener fires synchronously
    /// before this call returns. Unregistering through the handle before
    /// release guarantees the listener is never called.
    fn add_release_listener(&self, listener: ReleaseListener) -> ListenerHandle;

    /// Runner that tags tasks as executing in this token's context
    ///
    /// Tasks run through the returned runner see `is_executing_in` report
    /// `true` for this token and observe the token's cancellation flag in
    /// their `TaskContext`.
    fn create_executor(&self, base: Arc<dyn TaskRunner>) -> Arc<dyn TaskRunner>;

    /// Whether the given context was produced through this token's executor
    fn is_executing_in(&self, ctx: &TaskContext) -> bool;

    /// Block until released or `cancel` is signalled
    ///
    /// Default implementation polls `try_await_release` with short bounded
    /// waits, re-checking the cancellation token each iteration; the only
    /// primitive concrete tokens must supply is the bounded wait.
    fn await_release(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            if self.try_await_release(cancel, RELEASE_POLL_INTERVAL)? {
                return Ok(());
            }
        }
    }
}

impl<T: AccessToken + ?Sized> AccessToken for Arc<T> {
    fn access_id(&self) -> &AccessId {
        (**self).access_id()
    }

    fn is_released(&self) -> bool {
        (**self).is_released()
    }

    fn release(&self) {
        (**self).release();
    }

    fn release_and_cancel(&self) {
        (**self).release_and_cancel();
    }

    fn try_await_release(&self, cancel: &CancellationToken, timeout: Duration) -> Result<bool> {
        (**self).try_await_release(cancel, timeout)
    }

    fn add_release_listener(&self, listener: ReleaseListener) -> ListenerHandle {
        (**self).add_release_listener(listener)
    }

    fn create_executor(&self, base: Arc<dyn TaskRunner>) -> Arc<dyn TaskRunner> {
        (**self).create_executor(base)
    }

    fn is_executing_in(&self, ctx: &TaskContext) -> bool {
        (**self).is_executing_in(ctx)
    }

    fn await_release(&self, cancel: &CancellationToken) -> Result<()> {
        (**self).await_release(cancel)
    }
}

/// Wrapper runner shared by the concrete tokens
///
/// Delegates to `base`; tasks run with the owning token's mark pushed into
/// their context and the token's cancellation merged with the caller's.
/// Tasks reaching a released token are dropped.
pub(crate) struct ContextTaggingRunner {
    base: Arc<dyn TaskRunner>,
    mark: ContextMark,
    cancel: CancellationToken,
    released: Arc<WaitableSignal>,
}

impl ContextTaggingRunner {
    pub(crate) fn new(
        base: Arc<dyn TaskRunner>,
        mark: ContextMark,
        cancel: CancellationToken,
        released: Arc<WaitableSignal>,
    ) -> Self {
        Self {
            base,
            mark,
            cancel,
            released,
        }
    }
}

impl TaskRunner for ContextTaggingRunner {
    fn execute(&self, cancel: CancellationToken, task: Task) {
        if self.released.is_signalled() {
            tracing::trace!("dropping task submitted to a released token");
            return;
        }

        let mark = self.mark;
        let own_cancel = self.cancel.clone();
        let released = Arc::clone(&self.released);
        self.base.execute(
            cancel,
            Box::new(move |ctx| {
                if released.is_signalled() {
                    tracing::trace!("dropping task for a token released while queued");
                    return;
                }
                let merged =
                    CancellationToken::any(vec![ctx.cancellation().clone(), own_cancel]);
                let tagged = ctx.with_mark(mark, merged);
                task(&tagged);
            }),
        );
    }
}
