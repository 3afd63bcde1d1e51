//! Release-listener bookkeeping shared by the token implementations

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Callback fired exactly once when a token is released
pub type ReleaseListener = Box<dyn FnOnce() + Send>;

enum ListenerState {
    Active {
        listeners: HashMap<u64, ReleaseListener>,
        next_id: u64,
    },
    Released,
}

/// Listener registry with idempotent late registration
///
/// Modelled as a small state machine: while active the registry holds the
/// listener collection; once notified it holds nothing and registration
/// short-circuits to an immediate synchronous fire. Every listener
/// registered over the owner's lifetime fires exactly once.
pub struct ReleaseListenerSupport {
    released: AtomicBool,
    state: Mutex<ListenerState>,
}

impl ReleaseListenerSupport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            released: AtomicBool::new(false),
            state: Mutex::new(ListenerState::Active {
                listeners: HashMap::new(),
                next_id: 0,
            }),
        })
    }

    /// Record the owner's release; returns `true` for exactly one caller
    pub fn mark_released(&self) -> bool {
        !self.released.swap(true, Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Register a listener, or fire it synchronously when already notified
    pub fn add(self: &Arc<Self>, listener: ReleaseListener) -> ListenerHandle {
        let mut state = self.state.lock();
        match &mut *state {
            ListenerState::Active { listeners, next_id } => {
                let id = *next_id;
                *next_id += 1;
                listeners.insert(id, listener);
                drop(state);
                ListenerHandle {
                    support: Arc::downgrade(self),
                    id,
                }
            }
            ListenerState::Released => {
                drop(state);
                run_listener(listener);
                ListenerHandle {
                    support: Weak::new(),
                    id: 0,
                }
            }
        }
    }

    /// Fire every registered listener and transition to the released state
    ///
    /// Fails with `Error::NotReleased` unless `mark_released` happened
    /// first. Idempotent: a second call does nothing. Listener panics are
    /// isolated so one failing listener never prevents the rest from
    /// firing.
    pub fn notify_release_listeners(&self) -> Result<()> {
        if !self.is_released() {
            return Err(Error::NotReleased);
        }

        let drained = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, ListenerState::Released) {
                ListenerState::Active { listeners, .. } => listeners,
                ListenerState::Released => HashMap::new(),
            }
        };

        for (_, listener) in drained {
            run_listener(listener);
        }
        Ok(())
    }
}

fn run_listener(listener: ReleaseListener) {
    if catch_unwind(AssertUnwindSafe(listener)).is_err() {
        tracing::error!("release listener panicked");
    }
}

/// Handle for unregistering a release listener
///
/// Dropping the handle leaves the listener registered; only `unregister`
/// removes it.
pub struct ListenerHandle {
    support: Weak<ReleaseListenerSupport>,
    id: u64,
}

impl ListenerHandle {
    /// Remove the listener; before release this guarantees it never fires
    pub fn unregister(&self) {
        if let Some(support) = self.support.upgrade() {
            let mut state = support.state.lock();
            if let ListenerState::Active { listeners, .. } = &mut *state {
                listeners.remove(&self.id);
            }
        }
    }
}
