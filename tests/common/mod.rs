//! Shared processors used by the end-to-end scenario tests (spec §8).
//!
//! These stand in for the concrete codec filters spec.md §1 puts out of
//! scope: each one is deliberately the simplest possible implementation of
//! its `FilterKind` contract so the tests exercise the scheduler and graph
//! plumbing, not codec logic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use streamgraph::{Frame, HeadProcessor, OneToOneProcessor, ReaderId, TailProcessor, WriterId};

/// A head that stamps outgoing frames with an incrementing counter (0, 1,
/// 2, ...) up to `max`, then stops producing — but keeps ticking, since a
/// head stays periodic regardless of whether it has anything to say.
pub struct CountingHead {
    next: u8,
    max: u8,
}

impl CountingHead {
    pub fn new(max: u8) -> Self {
        CountingHead { next: 0, max }
    }
}

impl HeadProcessor for CountingHead {
    fn do_process_frame(&mut self, outputs: &mut HashMap<WriterId, Frame>) -> Vec<WriterId> {
        if self.next >= self.max {
            return Vec::new();
        }
        let seq = self.next;
        self.next += 1;
        for f in outputs.values_mut() {
            f.data_mut()[0] = seq;
            f.set_length(1).unwrap();
        }
        outputs.keys().copied().collect()
    }
}

/// Like [`CountingHead`], but also counts every tick (productive or not)
/// into a shared counter, for tests that only care about scheduling
/// cadence (spec §8 scenario 6).
pub struct CountingTicker(pub Arc<AtomicUsize>);

impl HeadProcessor for CountingTicker {
    fn do_process_frame(&mut self, _outputs: &mut HashMap<WriterId, Frame>) -> Vec<WriterId> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Vec::new()
    }
}

/// Copies its input frame to its output frame unchanged.
pub struct Identity;

impl OneToOneProcessor for Identity {
    fn do_process_frame(&mut self, src: &Frame, dst: &mut Frame) -> bool {
        let n = src.length();
        dst.data_mut()[..n].copy_from_slice(src.data());
        dst.set_length(n).unwrap();
        true
    }
}

/// Consumes its input but never produces an output, modeling a slave that
/// only observes traffic (spec §8 scenario 5's "passthrough" slave).
pub struct Sink;

impl OneToOneProcessor for Sink {
    fn do_process_frame(&mut self, _src: &Frame, _dst: &mut Frame) -> bool {
        false
    }
}

/// A tail that records every frame's single payload byte it sees, in
/// arrival order, behind a handle the test keeps around to inspect later.
#[derive(Clone)]
pub struct Collector(Arc<Mutex<Vec<u8>>>);

impl Collector {
    pub fn new() -> Self {
        Collector(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl TailProcessor for Collector {
    fn do_process_frame(&mut self, inputs: &HashMap<ReaderId, (bool, Frame)>) {
        let mut ids: Vec<ReaderId> = inputs.keys().copied().collect();
        ids.sort_by_key(|r| r.0);
        for rid in ids {
            if let Some((true, f)) = inputs.get(&rid) {
                if f.length() > 0 {
                    self.0.lock().unwrap().push(f.data()[0]);
                }
            }
        }
    }
}
