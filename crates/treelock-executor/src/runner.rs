//! Task runner abstractions and the serializing runner

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::cancel::CancellationToken;
use crate::context::TaskContext;
use crate::signal::WaitableSignal;

/// How long a synchronous hand-off waits between completion checks
const HANDOFF_WAIT: Duration = Duration::from_millis(50);

/// Unit of work handed to a task runner
pub type Task = Box<dyn FnOnce(&TaskContext) + Send + 'static>;

/// Something that can eventually run a task
///
/// The runner builds the `TaskContext` the task receives; context-aware
/// wrappers extend it on the way in. Ordering guarantees are
/// implementation-specific: `SerialRunner` runs tasks strictly in
/// submission order.
pub trait TaskRunner: Send + Sync {
    fn execute(&self, cancel: CancellationToken, task: Task);
}

/// Runs every task inline on the submitting thread
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncTaskRunner;

impl TaskRunner for SyncTaskRunner {
    fn execute(&self, cancel: CancellationToken, task: Task) {
        let ctx = TaskContext::new(cancel);
        task(&ctx);
    }
}

/// Serializing runner: one total order over all submitted tasks
///
/// Tasks are queued and drained in submission order with at most one
/// draining thread at a time. A submitting thread that finds no active
/// drainer drains the queue itself, so no background thread is required.
#[derive(Default)]
pub struct SerialRunner {
    queue: Mutex<VecDeque<(CancellationToken, Task)>>,
    draining: Mutex<()>,
}

impl SerialRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn drain(&self) {
        loop {
            let Some(guard) = self.draining.try_lock() else {
                // Another thread is draining; it will pick up our task.
                return;
            };
            loop {
                let next = self.queue.lock().pop_front();
                match next {
                    Some((cancel, task)) => {
                        let ctx = TaskContext::new(cancel);
                        task(&ctx);
                    }
                    None => break,
                }
            }
            drop(guard);
            // A task enqueued after the final empty check would otherwise
            // be stranded until the next submission.
            if self.queue.lock().is_empty() {
                return;
            }
        }
    }
}

impl TaskRunner for SerialRunner {
    fn execute(&self, cancel: CancellationToken, task: Task) {
        self.queue.lock().push_back((cancel, task));
        self.drain();
    }
}

/// Submit `f` to `runner` and block until it has run, handing back its
/// return value.
///
/// This is the synchronous hand-off used for monitor-style state owners:
/// the caller blocks only until the runner has processed the task. It must
/// not be called from inside a task running on the same serial runner;
/// that would wait for a task the blocked drainer can never reach.
pub fn run_sync<R, F>(runner: &dyn TaskRunner, f: F) -> R
where
    R: Send + 'static,
    F: FnOnce(&TaskContext) -> R + Send + 'static,
{
    let done = Arc::new(WaitableSignal::new());
    let slot: Arc<Mutex<Option<R>>> = Arc::new(Mutex::new(None));

    {
        let done = Arc::clone(&done);
        let slot = Arc::clone(&slot);
        runner.execute(
            CancellationToken::unsignalled(),
            Box::new(move |ctx| {
                *slot.lock() = Some(f(ctx));
                done.signal();
            }),
        );
    }

    loop {
        if let Ok(true) = done.wait_timeout(&CancellationToken::unsignalled(), HANDOFF_WAIT) {
            break;
        }
    }

    let result = slot.lock().take();
    result.expect("hand-off task completed without storing its result")
}
