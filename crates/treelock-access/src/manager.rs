//! The hierarchical access-rights coordinator
//!
//! All state transitions and queries are funnelled through one injected
//! serializing `TaskRunner`, so the manager itself needs no lock ordering
//! beyond its two independent mutexes. The manager never blocks waiting
//! for rights to become available; callers get the conflict set and decide
//! their own blocking policy.

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use treelock_executor::{run_sync, TaskRunner};

use crate::request::{AccessId, AccessRequest};
use crate::result::AccessResult;
use crate::right::HierarchicalRight;
use crate::token::{AccessToken, GenericAccessToken};

/// Sharing mode a right is held under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    Read,
    Write,
}

/// Callback observing grant and release events
///
/// Invoked with the originating request and `true` on acquisition, `false`
/// on release. Called from inside the manager's serialized task; must not
/// call back into the manager.
pub type AccessChangeListener = Box<dyn Fn(&AccessRequest, bool) + Send>;

struct HolderEntry {
    right: HierarchicalRight,
    mode: AccessMode,
    owner: AccessId,
    token: Weak<dyn AccessToken>,
}

struct ManagerState {
    holders: Vec<HolderEntry>,
}

struct ListenerRegistry {
    listeners: HashMap<u64, AccessChangeListener>,
    next_id: u64,
}

struct ManagerShared {
    runner: Arc<dyn TaskRunner>,
    state: Mutex<ManagerState>,
    listeners: Mutex<ListenerRegistry>,
}

/// Coordinator granting read/write access over a tree of rights
///
/// Two rights conflict iff one's path is a prefix of the other's. A
/// requested read conflicts with conflicting write holders; a requested
/// write conflicts with any conflicting holder. Holder entries reference
/// their token weakly, so the manager never keeps a token alive; entries
/// for tokens dropped without release are pruned lazily.
///
/// Every operation hands off synchronously to the injected runner, so
/// calling any manager method, `release`, or a release wait from a task
/// already running inside that runner deadlocks.
pub struct HierarchicalAccessManager {
    shared: Arc<ManagerShared>,
}

impl HierarchicalAccessManager {
    pub fn new(runner: Arc<dyn TaskRunner>) -> Self {
        Self {
            shared: Arc::new(ManagerShared {
                runner,
                state: Mutex::new(ManagerState {
                    holders: Vec::new(),
                }),
                listeners: Mutex::new(ListenerRegistry {
                    listeners: HashMap::new(),
                    next_id: 0,
                }),
            }),
        }
    }

    /// Attempt to acquire the requested rights without waiting
    ///
    /// On conflict nothing changes and the result lists the blocking
    /// tokens. On success the result carries a live token holding every
    /// requested right until it is released.
    pub fn try_get_access(&self, request: AccessRequest) -> AccessResult {
        let shared = Arc::clone(&self.shared);
        run_sync(&*self.shared.runner, move |_| {
            let blocking = {
                let mut state = shared.state.lock();
                prune_dead_entries(&mut state);
                blocking_tokens_locked(&state, request.read_rights(), request.write_rights())
            };

            if !blocking.is_empty() {
                tracing::debug!(
                    id = %request.id(),
                    blockers = blocking.len(),
                    "access denied"
                );
                return AccessResult::denied(request.id().clone(), blocking);
            }

            let token = install_grant(&shared, &request);
            tracing::debug!(
                id = %request.id(),
                rights = request.read_rights().len() + request.write_rights().len(),
                "access granted"
            );
            notify_listeners(&shared, &request, true);
            AccessResult::granted(token)
        })
    }

    /// Reserve the requested rights unconditionally
    ///
    /// Always grants: holder entries are registered and the acquire event
    /// fires even when conflicting tokens exist, and the result reports no
    /// blockers. Conflicting holders keep their tokens; the caller decides
    /// how to reconcile with them (typically by awaiting or cancelling
    /// them before using the returned token).
    pub fn get_scheduled_access(&self, request: AccessRequest) -> AccessResult {
        let shared = Arc::clone(&self.shared);
        run_sync(&*self.shared.runner, move |_| {
            {
                let mut state = shared.state.lock();
                prune_dead_entries(&mut state);
            }

            let token = install_grant(&shared, &request);
            tracing::debug!(
                id = %request.id(),
                rights = request.read_rights().len() + request.write_rights().len(),
                "scheduled access granted"
            );
            notify_listeners(&shared, &request, true);
            AccessResult::granted(token)
        })
    }

    /// Whether a request for the given rights would currently be granted
    pub fn is_available(
        &self,
        read_rights: &[HierarchicalRight],
        write_rights: &[HierarchicalRight],
    ) -> bool {
        self.get_blocking_tokens(read_rights, write_rights).is_empty()
    }

    /// Live tokens that would block a request for the given rights
    pub fn get_blocking_tokens(
        &self,
        read_rights: &[HierarchicalRight],
        write_rights: &[HierarchicalRight],
    ) -> Vec<Arc<dyn AccessToken>> {
        let shared = Arc::clone(&self.shared);
        let read_rights = read_rights.to_vec();
        let write_rights = write_rights.to_vec();
        run_sync(&*self.shared.runner, move |_| {
            let state = shared.state.lock();
            blocking_tokens_locked(&state, &read_rights, &write_rights)
        })
    }

    /// Snapshot of the currently held rights, partitioned by mode
    pub fn get_rights(
        &self,
        read_rights: &mut HashSet<HierarchicalRight>,
        write_rights: &mut HashSet<HierarchicalRight>,
    ) {
        let shared = Arc::clone(&self.shared);
        let (read, write) = run_sync(&*self.shared.runner, move |_| {
            let state = shared.state.lock();
            let mut read = HashSet::new();
            let mut write = HashSet::new();
            for entry in live_entries(&state) {
                match entry.mode {
                    AccessMode::Read => read.insert(entry.right.clone()),
                    AccessMode::Write => write.insert(entry.right.clone()),
                };
            }
            (read, write)
        });
        read_rights.extend(read);
        write_rights.extend(write);
    }

    /// Register a listener for acquire and release events
    ///
    /// Events arrive in serialized order, exactly once each. After
    /// `unregister` returns, no further events are delivered.
    pub fn add_access_change_listener(
        &self,
        listener: AccessChangeListener,
    ) -> AccessListenerHandle {
        let mut registry = self.shared.listeners.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.insert(id, listener);
        AccessListenerHandle {
            shared: Arc::downgrade(&self.shared),
            id,
        }
    }
}

/// Handle for unregistering an access-change listener
pub struct AccessListenerHandle {
    shared: Weak<ManagerShared>,
    id: u64,
}

impl AccessListenerHandle {
    pub fn unregister(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.listeners.lock().listeners.remove(&self.id);
        }
    }
}

/// Live, unreleased tokens conflicting with the given request, distinct
/// by token identity
fn blocking_tokens_locked(
    state: &ManagerState,
    read_rights: &[HierarchicalRight],
    write_rights: &[HierarchicalRight],
) -> Vec<Arc<dyn AccessToken>> {
    let mut blocking: Vec<Arc<dyn AccessToken>> = Vec::new();
    for entry in live_entries(state) {
        let conflicts = match entry.mode {
            // A held read only excludes writers.
            AccessMode::Read => write_rights
                .iter()
                .any(|right| right.conflicts_with(&entry.right)),
            AccessMode::Write => read_rights
                .iter()
                .chain(write_rights.iter())
                .any(|right| right.conflicts_with(&entry.right)),
        };
        if !conflicts {
            continue;
        }
        tracing::trace!(owner = %entry.owner, right = %entry.right, "conflicting holder");
        if let Some(token) = entry.token.upgrade() {
            if !blocking.iter().any(|known| Arc::ptr_eq(known, &token)) {
                blocking.push(token);
            }
        }
    }
    blocking
}

fn live_entries(state: &ManagerState) -> impl Iterator<Item = &HolderEntry> {
    state.holders.iter().filter(|entry| {
        entry
            .token
            .upgrade()
            .is_some_and(|token| !token.is_released())
    })
}

fn prune_dead_entries(state: &mut ManagerState) {
    state
        .holders
        .retain(|entry| entry.token.strong_count() > 0);
}

/// Register holder entries for every requested right and wire the token's
/// release to remove them again
///
/// Runs inside the serialized task. The release listener hands off through
/// the same runner, so cleanup and the release event are ordered with all
/// other manager operations.
fn install_grant(shared: &Arc<ManagerShared>, request: &AccessRequest) -> Arc<dyn AccessToken> {
    let token = Arc::new(GenericAccessToken::new(request.id().clone()));
    let erased: Arc<dyn AccessToken> = token;

    {
        let mut state = shared.state.lock();
        let rights = request
            .read_rights()
            .iter()
            .map(|right| (right, AccessMode::Read))
            .chain(
                request
                    .write_rights()
                    .iter()
                    .map(|right| (right, AccessMode::Write)),
            );
        for (right, mode) in rights {
            state.holders.push(HolderEntry {
                right: right.clone(),
                mode,
                owner: request.id().clone(),
                token: Arc::downgrade(&erased),
            });
        }
    }

    let manager = Arc::downgrade(shared);
    let granted = Arc::downgrade(&erased);
    let released_request = request.clone();
    erased.add_release_listener(Box::new(move || {
        let Some(shared) = manager.upgrade() else {
            return;
        };
        let runner = Arc::clone(&shared.runner);
        run_sync(&*runner, move |_| {
            let removed = {
                let mut state = shared.state.lock();
                let before = state.holders.len();
                state
                    .holders
                    .retain(|entry| !Weak::ptr_eq(&entry.token, &granted));
                before - state.holders.len()
            };
            tracing::debug!(
                id = %released_request.id(),
                rights = removed,
                "access released"
            );
            notify_listeners(&shared, &released_request, false);
        });
    }));

    erased
}

fn notify_listeners(shared: &ManagerShared, request: &AccessRequest, acquired: bool) {
    let registry = shared.listeners.lock();
    for listener in registry.listeners.values() {
        if catch_unwind(AssertUnwindSafe(|| listener(request, acquired))).is_err() {
            tracing::error!(id = %request.id(), "access-change listener panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use treelock_executor::SerialRunner;

    use super::*;

    fn manager() -> HierarchicalAccessManager {
        HierarchicalAccessManager::new(Arc::new(SerialRunner::new()))
    }

    fn right(path: &[&str]) -> HierarchicalRight {
        HierarchicalRight::create(path.iter().copied())
    }

    #[test]
    fn test_grant_on_empty_manager() {
        let manager = manager();
        let result = manager.try_get_access(AccessRequest::write("writer", right(&["docs"])));

        assert!(result.is_available());
        assert!(!result.token().is_released());
        assert_eq!(result.token().access_id().as_str(), "writer");
    }

    #[test]
    fn test_write_holder_blocks_conflicting_read() {
        let manager = manager();
        let held = manager.try_get_access(AccessRequest::write("writer", right(&["docs"])));
        assert!(held.is_available());

        let denied =
            manager.try_get_access(AccessRequest::read("reader", right(&["docs", "chapter1"])));

        assert!(!denied.is_available());
        assert!(denied.token().is_released());
        assert!(denied.blocking_ids().contains(&AccessId::new("writer")));
    }

    #[test]
    fn test_read_holder_allows_other_readers() {
        let manager = manager();
        let first = manager.try_get_access(AccessRequest::read("reader-1", right(&["docs"])));
        let second =
            manager.try_get_access(AccessRequest::read("reader-2", right(&["docs", "ch1"])));

        assert!(first.is_available());
        assert!(second.is_available());
    }

    #[test]
    fn test_read_holders_block_a_writer() {
        let manager = manager();
        let _r1 = manager.try_get_access(AccessRequest::read("reader-1", right(&["docs", "a"])));
        let _r2 = manager.try_get_access(AccessRequest::read("reader-2", right(&["docs", "b"])));

        let denied = manager.try_get_access(AccessRequest::write("writer", right(&["docs"])));

        assert!(!denied.is_available());
        let ids = denied.blocking_ids();
        assert!(ids.contains(&AccessId::new("reader-1")));
        assert!(ids.contains(&AccessId::new("reader-2")));
    }

    #[test]
    fn test_siblings_are_independent() {
        let manager = manager();
        let left = manager.try_get_access(AccessRequest::write("left", right(&["docs", "ch1"])));
        let right_side =
            manager.try_get_access(AccessRequest::write("right", right(&["docs", "ch2"])));

        assert!(left.is_available());
        assert!(right_side.is_available());
    }

    #[test]
    fn test_release_unblocks() {
        let manager = manager();
        let held = manager.try_get_access(AccessRequest::write("writer", right(&["docs"])));

        assert!(!manager.is_available(&[], &[right(&["docs"])]));
        held.release();
        assert!(manager.is_available(&[], &[right(&["docs"])]));

        let retry = manager.try_get_access(AccessRequest::write("writer-2", right(&["docs"])));
        assert!(retry.is_available());
    }

    #[test]
    fn test_denial_changes_nothing() {
        let manager = manager();
        let _held = manager.try_get_access(AccessRequest::write("writer", right(&["docs"])));
        let _denied = manager.try_get_access(AccessRequest::write("loser", right(&["docs"])));

        let mut read = HashSet::new();
        let mut write = HashSet::new();
        manager.get_rights(&mut read, &mut write);

        assert!(read.is_empty());
        assert_eq!(write, HashSet::from([right(&["docs"])]));
    }

    #[test]
    fn test_scheduled_access_grants_through_conflicts() {
        let manager = manager();
        let holder = manager.try_get_access(AccessRequest::write("holder", right(&["docs"])));

        let scheduled = manager.get_scheduled_access(AccessRequest::write("jumper", right(&["docs"])));

        assert!(scheduled.is_available());
        assert!(scheduled.blocking_tokens().is_empty());
        assert!(!scheduled.token().is_released());
        assert!(!holder.token().is_released());

        // Both grants are registered as holders.
        let blockers = manager.get_blocking_tokens(&[], &[right(&["docs"])]);
        assert_eq!(blockers.len(), 2);
    }

    #[test]
    fn test_get_blocking_tokens_deduplicates_by_token() {
        let manager = manager();
        let request = AccessRequest::new(
            "writer",
            Vec::new(),
            vec![right(&["docs", "a"]), right(&["docs", "b"])],
        )
        .unwrap();
        let _held = manager.try_get_access(request);

        let blockers = manager.get_blocking_tokens(&[], &[right(&["docs"])]);
        assert_eq!(blockers.len(), 1);
    }

    #[test]
    fn test_get_rights_deduplicates() {
        let manager = manager();
        let _a = manager.try_get_access(AccessRequest::read("a", right(&["docs"])));
        let _b = manager.try_get_access(AccessRequest::read("b", right(&["docs"])));

        let mut read = HashSet::new();
        let mut write = HashSet::new();
        manager.get_rights(&mut read, &mut write);

        assert_eq!(read.len(), 1);
        assert!(write.is_empty());
    }

    #[test]
    fn test_dropped_token_entries_are_pruned() {
        let manager = manager();
        {
            let result = manager.try_get_access(AccessRequest::write("lost", right(&["docs"])));
            assert!(result.is_available());
            // Dropped without release.
        }

        let retry = manager.try_get_access(AccessRequest::write("writer", right(&["docs"])));
        assert!(retry.is_available());
    }

    #[test]
    fn test_listener_sees_acquire_and_release_in_order() {
        let manager = manager();
        let events = Arc::new(Mutex::new(Vec::new()));

        let captured = Arc::clone(&events);
        let _handle = manager.add_access_change_listener(Box::new(move |request, acquired| {
            captured
                .lock()
                .push((request.id().as_str().to_string(), acquired));
        }));

        let result = manager.try_get_access(AccessRequest::write("writer", right(&["docs"])));
        result.release();

        assert_eq!(
            *events.lock(),
            vec![("writer".to_string(), true), ("writer".to_string(), false)]
        );
    }

    #[test]
    fn test_denied_request_fires_no_event() {
        let manager = manager();
        let _held = manager.try_get_access(AccessRequest::write("holder", right(&["docs"])));

        let fired = Arc::new(AtomicUsize::new(0));
        let captured = Arc::clone(&fired);
        let _handle = manager.add_access_change_listener(Box::new(move |_, _| {
            captured.fetch_add(1, Ordering::SeqCst);
        }));

        let _denied = manager.try_get_access(AccessRequest::write("loser", right(&["docs"])));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unregistered_listener_gets_no_further_events() {
        let manager = manager();
        let fired = Arc::new(AtomicUsize::new(0));

        let captured = Arc::clone(&fired);
        let handle = manager.add_access_change_listener(Box::new(move |_, _| {
            captured.fetch_add(1, Ordering::SeqCst);
        }));

        let result = manager.try_get_access(AccessRequest::write("writer", right(&["docs"])));
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        handle.unregister();
        result.release();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_release_and_cancel_through_result() {
        let manager = manager();
        let result = manager.try_get_access(AccessRequest::write("writer", right(&["docs"])));

        result.release_and_cancel();

        assert!(result.token().is_released());
        assert!(manager.is_available(&[], &[right(&["docs"])]));
    }
}
