//! Pure forwarding token wrapper

use std::sync::Arc;
use std::time::Duration;

use treelock_executor::{CancellationToken, TaskContext, TaskRunner};

use crate::error::Result;
use crate::request::AccessId;
use crate::token::listeners::{ListenerHandle, ReleaseListener};
use crate::token::AccessToken;

/// Relays every operation unmodified to the wrapped token
///
/// Composition point for wrappers that override a small subset of the
/// token contract while inheriting the rest. Generic over the wrapped
/// token, so a missing inner token is unrepresentable.
pub struct DelegatedAccessToken<T: AccessToken> {
    token: T,
}

impl<T: AccessToken> DelegatedAccessToken<T> {
    pub fn new(token: T) -> Self {
        Self { token }
    }

    pub fn wrapped(&self) -> &T {
        &self.token
    }

    pub fn into_inner(self) -> T {
        self.token
    }
}

impl<T: AccessToken> AccessToken for DelegatedAccessToken<T> {
    fn access_id(&self) -> &AccessId {
        self.token.access_id()
    }

    fn is_released(&self) -> bool {
        self.token.is_released()
    }

    fn release(&self) {
        self.token.release();
    }

    fn release_and_cancel(&self) {
        self.token.release_and_cancel();
    }

    fn try_await_release(&self, cancel: &CancellationToken, timeout: Duration) -> Result<bool> {
        self.token.try_await_release(cancel, timeout)
    }

    fn add_release_listener(&self, listener: ReleaseListener) -> ListenerHandle {
        self.token.add_release_listener(listener)
    }

    fn create_executor(&self, base: Arc<dyn TaskRunner>) -> Arc<dyn TaskRunner> {
        self.token.create_executor(base)
    }

    fn is_executing_in(&self, ctx: &TaskContext) -> bool {
        self.token.is_executing_in(ctx)
    }

    fn await_release(&self, cancel: &CancellationToken) -> Result<()> {
        self.token.await_release(cancel)
    }
}
