//! The plain granted token

use std::sync::Arc;
use std::time::Duration;

use treelock_executor::{
    CancellationSource, CancellationToken, ContextMark, TaskContext, TaskRunner, WaitableSignal,
};

use crate::error::Result;
use crate::request::AccessId;
use crate::token::listeners::{ListenerHandle, ReleaseListener, ReleaseListenerSupport};
use crate::token::{AccessToken, ContextTaggingRunner};

/// Token handed out for a granted access request
pub struct GenericAccessToken {
    id: AccessId,
    mark: ContextMark,
    cancel_source: CancellationSource,
    release_signal: Arc<WaitableSignal>,
    listeners: Arc<ReleaseListenerSupport>,
}

impl GenericAccessToken {
    pub fn new(id: impl Into<AccessId>) -> Self {
        Self {
            id: id.into(),
            mark: ContextMark::new(),
            cancel_source: CancellationSource::new(),
            release_signal: Arc::new(WaitableSignal::new()),
            listeners: ReleaseListenerSupport::new(),
        }
    }

    /// An inert token that is already released
    ///
    /// Denied access results carry one of these.
    pub fn released(id: impl Into<AccessId>) -> Self {
        let token = Self::new(id);
        token.release();
        token
    }
}

impl AccessToken for GenericAccessToken {
    fn access_id(&self) -> &AccessId {
        &self.id
    }

    fn is_released(&self) -> bool {
        self.release_signal.is_signalled()
    }

    fn release(&self) {
        if self.release_signal.signal() {
            self.listeners.mark_released();
            if let Err(err) = self.listeners.notify_release_listeners() {
                tracing::error!(id = %self.id, %err, "failed to notify release listeners");
            }
            tracing::trace!(id = %self.id, "access token released");
        }
    }

    fn release_and_cancel(&self) {
        self.release();
        self.cancel_source.cancel();
    }

    fn try_await_release(&self, cancel: &CancellationToken, timeout: Duration) -> Result<bool> {
        Ok(self.release_signal.wait_timeout(cancel, timeout)?)
    }

    fn add_release_listener(&self, listener: ReleaseListener) -> ListenerHandle {
        self.listeners.add(listener)
    }

    fn create_executor(&self, base: Arc<dyn TaskRunner>) -> Arc<dyn TaskRunner> {
        Arc::new(ContextTaggingRunner::new(
            base,
            self.mark,
            self.cancel_source.token(),
            Arc::clone(&self.release_signal),
        ))
    }

    fn is_executing_in(&self, ctx: &TaskContext) -> bool {
        ctx.has_mark(self.mark)
    }
}
