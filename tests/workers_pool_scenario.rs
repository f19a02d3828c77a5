//! Scenario 6 from spec §8: `WorkersPool` add/remove semantics under load,
//! driven directly against the pool (no `PipelineManager` involved) the
//! same way `original_source/unitTests/WorkersPoolTest.cpp` exercises the
//! original scheduler.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use streamgraph::{Filter, FilterId, Runnable, RunnableHandle, WorkersConfig, WorkersPool};

use common::{CountingTicker, Identity};

#[test]
fn add_remove_under_load() {
    let pool = WorkersPool::new(WorkersConfig { threads: 4 });

    let ticks = Arc::new(AtomicUsize::new(0));
    let mut a = Filter::new_head(Box::new(CountingTicker(ticks.clone())), 40_000, 0);
    a.set_id(FilterId(1));
    let a_handle: RunnableHandle = Arc::new(Mutex::new(a));

    let mut b = Filter::new_one_to_one(Box::new(Identity));
    b.set_id(FilterId(2));
    let b_handle: RunnableHandle = Arc::new(Mutex::new(b));

    // addTask(A) twice returns false the second time.
    pool.add_task(a_handle.clone()).unwrap();
    assert!(pool.add_task(a_handle.clone()).is_err());

    // removeTask(B) returns false before B has been added.
    assert!(pool.remove_task(FilterId(2)).is_err());

    pool.add_task(b_handle.clone()).unwrap();

    // Wait for A to have run at least 5 times.
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while ticks.load(Ordering::SeqCst) < 5 && std::time::Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }
    assert!(
        ticks.load(Ordering::SeqCst) >= 5,
        "expected at least 5 ticks, got {}",
        ticks.load(Ordering::SeqCst)
    );

    // removeTask(A) returns true, and A's is_running() becomes false
    // within one period.
    pool.remove_task(FilterId(1)).unwrap();
    thread::sleep(Duration::from_millis(80));
    assert!(!a_handle.lock().is_running());

    pool.remove_task(FilterId(2)).unwrap();
}
