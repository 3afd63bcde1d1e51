//! Cross-crate scenarios: manager grants driving token executors

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use treelock_access::{
    AccessRequest, AccessToken, CombinedToken, HierarchicalAccessManager, HierarchicalRight,
};
use treelock_executor::{CancellationToken, SerialRunner, SyncTaskRunner};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn manager() -> HierarchicalAccessManager {
    HierarchicalAccessManager::new(Arc::new(SerialRunner::new()))
}

#[test]
fn test_granted_token_drives_a_tagged_executor() {
    init_tracing();
    let manager = manager();
    let result = manager.try_get_access(AccessRequest::write(
        "renderer",
        HierarchicalRight::create(["canvas"]),
    ));
    assert!(result.is_available());

    let token = Arc::clone(result.token());
    let executor = token.create_executor(Arc::new(SyncTaskRunner));

    let observed = Arc::new(AtomicBool::new(false));
    let captured = Arc::clone(&observed);
    let token_in_task = Arc::clone(&token);
    executor.execute(
        CancellationToken::unsignalled(),
        Box::new(move |ctx| {
            captured.store(token_in_task.is_executing_in(ctx), Ordering::SeqCst);
        }),
    );

    assert!(observed.load(Ordering::SeqCst));
}

#[test]
fn test_combining_two_grants_releases_both_rights_at_once() {
    init_tracing();
    let manager = manager();
    let canvas = manager.try_get_access(AccessRequest::write(
        "painter",
        HierarchicalRight::create(["canvas"]),
    ));
    let palette = manager.try_get_access(AccessRequest::read(
        "painter",
        HierarchicalRight::create(["palette"]),
    ));
    assert!(canvas.is_available() && palette.is_available());

    let combined = CombinedToken::new(
        "painter",
        vec![Arc::clone(canvas.token()), Arc::clone(palette.token())],
    )
    .unwrap();

    combined.release();

    assert!(canvas.token().is_released());
    assert!(palette.token().is_released());
    assert!(manager.is_available(
        &[],
        &[
            HierarchicalRight::create(["canvas"]),
            HierarchicalRight::create(["palette"]),
        ],
    ));
}

#[test]
fn test_waiting_for_a_blocker_then_retrying() {
    init_tracing();
    let manager = Arc::new(manager());
    let right = HierarchicalRight::create(["document"]);

    let held = manager.try_get_access(AccessRequest::write("first", right.clone()));
    assert!(held.is_available());

    let retry = {
        let manager = Arc::clone(&manager);
        let right = right.clone();
        thread::spawn(move || {
            let denied = manager.try_get_access(AccessRequest::write("second", right.clone()));
            assert!(!denied.is_available());

            for blocker in denied.blocking_tokens() {
                blocker
                    .await_release(&CancellationToken::unsignalled())
                    .unwrap();
            }
            manager.try_get_access(AccessRequest::write("second", right))
        })
    };

    thread::sleep(Duration::from_millis(30));
    held.release();

    let result = retry.join().unwrap();
    assert!(result.is_available());
}

#[test]
fn test_release_and_cancel_cancels_in_flight_work() {
    init_tracing();
    let manager = manager();
    let result = manager.try_get_access(AccessRequest::write(
        "worker",
        HierarchicalRight::create(["queue"]),
    ));

    let token = Arc::clone(result.token());
    let executor = token.create_executor(Arc::new(SyncTaskRunner));

    let iterations = Arc::new(AtomicUsize::new(0));
    let captured = Arc::clone(&iterations);
    let token_in_task = Arc::clone(&token);
    executor.execute(
        CancellationToken::unsignalled(),
        Box::new(move |ctx| {
            for _ in 0..100 {
                if ctx.cancellation().is_cancelled() {
                    break;
                }
                captured.fetch_add(1, Ordering::SeqCst);
                if captured.load(Ordering::SeqCst) == 3 {
                    token_in_task.release_and_cancel();
                }
            }
        }),
    );

    assert_eq!(iterations.load(Ordering::SeqCst), 3);
    assert!(manager.is_available(&[], &[HierarchicalRight::create(["queue"])]));
}
