//! Token representing the conjunction of several grants

use std::sync::Arc;
use std::time::Duration;

use treelock_executor::{
    CancellationSource, CancellationToken, ContextMark, TaskContext, TaskRunner, WaitableSignal,
};

use crate::error::{Error, Result};
use crate::request::AccessId;
use crate::token::listeners::{ListenerHandle, ReleaseListener, ReleaseListenerSupport};
use crate::token::{AccessToken, ContextTaggingRunner};

/// Token that is alive only while every sub-token is alive
///
/// Releasing the combined token releases every sub-token; the release of
/// any single sub-token releases the combined token. A sub-token that is
/// already released at construction releases the combination before the
/// constructor returns.
pub struct CombinedToken {
    id: AccessId,
    mark: ContextMark,
    cancel_source: CancellationSource,
    release_signal: Arc<WaitableSignal>,
    listeners: Arc<ReleaseListenerSupport>,
    subs: Vec<Arc<dyn AccessToken>>,
}

impl std::fmt::Debug for CombinedToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombinedToken")
            .field("id", &self.id)
            .field("subs", &self.subs.len())
            .finish_non_exhaustive()
    }
}

impl CombinedToken {
    /// Combine the given sub-tokens under one id
    ///
    /// Fails with `Error::NoSubTokens` when `subs` is empty.
    pub fn new(id: impl Into<AccessId>, subs: Vec<Arc<dyn AccessToken>>) -> Result<Self> {
        if subs.is_empty() {
            return Err(Error::NoSubTokens);
        }

        let token = Self {
            id: id.into(),
            mark: ContextMark::new(),
            cancel_source: CancellationSource::new(),
            release_signal: Arc::new(WaitableSignal::new()),
            listeners: ReleaseListenerSupport::new(),
            subs,
        };

        // A released sub-token fires this synchronously right here, so a
        // combination doomed at construction is born released.
        for sub in &token.subs {
            let signal = Arc::clone(&token.release_signal);
            let listeners = Arc::clone(&token.listeners);
            let id = token.id.clone();
            sub.add_release_listener(Box::new(move || {
                release_combined(&id, &signal, &listeners);
            }));
        }

        Ok(token)
    }

    pub fn sub_tokens(&self) -> &[Arc<dyn AccessToken>] {
        &self.subs
    }
}

fn release_combined(
    id: &AccessId,
    signal: &WaitableSignal,
    listeners: &Arc<ReleaseListenerSupport>,
) {
    if signal.signal() {
        listeners.mark_released();
        if let Err(err) = listeners.notify_release_listeners() {
            tracing::error!(id = %id, %err, "failed to notify release listeners");
        }
        tracing::trace!(id = %id, "combined token released");
    }
}

impl AccessToken for CombinedToken {
    fn access_id(&self) -> &AccessId {
        &self.id
    }

    fn is_released(&self) -> bool {
        self.release_signal.is_signalled()
    }

    fn release(&self) {
        for sub in &self.subs {
            sub.release();
        }
        release_combined(&self.id, &self.release_signal, &self.listeners);
    }

    fn release_and_cancel(&self) {
        for sub in &self.subs {
            sub.release_and_cancel();
        }
        release_combined(&self.id, &self.release_signal, &self.listeners);
        self.cancel_source.cancel();
    }

    fn try_await_release(&self, cancel: &CancellationToken, timeout: Duration) -> Result<bool> {
        Ok(self.release_signal.wait_timeout(cancel, timeout)?)
    }

    fn add_release_listener(&self, listener: ReleaseListener) -> ListenerHandle {
        self.listeners.add(listener)
    }

    fn create_executor(&self, base: Arc<dyn TaskRunner>) -> Arc<dyn TaskRunner> {
        let tagged = self
            .subs
            .iter()
            .fold(base, |runner, sub| sub.create_executor(runner));
        Arc::new(ContextTaggingRunner::new(
            tagged,
            self.mark,
            self.cancel_source.token(),
            Arc::clone(&self.release_signal),
        ))
    }

    fn is_executing_in(&self, ctx: &TaskContext) -> bool {
        ctx.has_mark(self.mark)
    }
}
