//! Scenarios 1-3 from spec §8: a straight line, a diamond merge, and a
//! fork to two tails, all driven through a real `WorkersPool` and real
//! wall-clock sleeps (per SPEC_FULL.md §8's choice of test idiom).

mod common;

use std::time::Duration;

use streamgraph::{Filter, FilterId, PipelineManager, ReaderId, WorkersConfig, WorkersPool, WriterId};

use common::{Collector, CountingHead, Identity};

#[test]
fn line_head_mid_tail_preserves_order() {
    let pool = WorkersPool::new(WorkersConfig { threads: 4 });
    let manager = PipelineManager::new(pool);

    manager
        .add_filter(FilterId(1), Filter::new_head(Box::new(CountingHead::new(2)), 50_000, 1))
        .unwrap();
    manager
        .add_filter(FilterId(2), Filter::new_one_to_one(Box::new(Identity)))
        .unwrap();
    let tail_out = Collector::new();
    manager
        .add_filter(FilterId(3), Filter::new_tail(Box::new(tail_out.clone()), 1))
        .unwrap();

    let path = manager
        .create_path(FilterId(1), WriterId(0), &[FilterId(2)], FilterId(3), ReaderId(0))
        .unwrap();
    let path_id = manager.add_path(path);
    manager.connect_path(path_id, 4, 8).unwrap();

    std::thread::sleep(Duration::from_millis(500));

    assert_eq!(tail_out.snapshot(), vec![0, 1]);
}

#[test]
fn diamond_both_branches_carry_the_original_sequence() {
    let pool = WorkersPool::new(WorkersConfig { threads: 4 });
    let manager = PipelineManager::new(pool);

    manager
        .add_filter(FilterId(1), Filter::new_head(Box::new(CountingHead::new(1)), 50_000, 2))
        .unwrap();
    manager
        .add_filter(FilterId(2), Filter::new_one_to_one(Box::new(Identity)))
        .unwrap();
    manager
        .add_filter(FilterId(3), Filter::new_one_to_one(Box::new(Identity)))
        .unwrap();
    let tail_out = Collector::new();
    manager
        .add_filter(FilterId(4), Filter::new_tail(Box::new(tail_out.clone()), 2))
        .unwrap();

    let path_a = manager
        .create_path(FilterId(1), WriterId(0), &[FilterId(2)], FilterId(4), ReaderId(0))
        .unwrap();
    let id_a = manager.add_path(path_a);
    manager.connect_path(id_a, 4, 8).unwrap();

    let path_b = manager
        .create_path(FilterId(1), WriterId(1), &[FilterId(3)], FilterId(4), ReaderId(1))
        .unwrap();
    let id_b = manager.add_path(path_b);
    manager.connect_path(id_b, 4, 8).unwrap();

    std::thread::sleep(Duration::from_millis(500));

    let mut got = tail_out.snapshot();
    got.sort();
    assert_eq!(got, vec![0, 0], "each branch should deliver the one injected frame, sequence 0");
}

#[test]
fn fork_two_tails_both_see_every_frame_in_order() {
    let pool = WorkersPool::new(WorkersConfig { threads: 4 });
    let manager = PipelineManager::new(pool);

    manager
        .add_filter(FilterId(1), Filter::new_head(Box::new(CountingHead::new(2)), 50_000, 2))
        .unwrap();
    manager
        .add_filter(FilterId(2), Filter::new_one_to_one(Box::new(Identity)))
        .unwrap();
    let tail3 = Collector::new();
    manager
        .add_filter(FilterId(3), Filter::new_tail(Box::new(tail3.clone()), 1))
        .unwrap();
    let tail4 = Collector::new();
    manager
        .add_filter(FilterId(4), Filter::new_tail(Box::new(tail4.clone()), 1))
        .unwrap();

    // path [1, 2, 4]: head -> mid -> tail4
    let path_a = manager
        .create_path(FilterId(1), WriterId(0), &[FilterId(2)], FilterId(4), ReaderId(0))
        .unwrap();
    let id_a = manager.add_path(path_a);
    manager.connect_path(id_a, 4, 8).unwrap();

    // path [1, 3]: head -> tail3 directly
    let path_b = manager
        .create_path(FilterId(1), WriterId(1), &[], FilterId(3), ReaderId(0))
        .unwrap();
    let id_b = manager.add_path(path_b);
    manager.connect_path(id_b, 4, 8).unwrap();

    std::thread::sleep(Duration::from_millis(500));

    assert_eq!(tail3.snapshot(), vec![0, 1]);
    assert_eq!(tail4.snapshot(), vec![0, 1]);
}
