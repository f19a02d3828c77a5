//! The bounded single-producer / single-consumer ring of frame slots.
//!
//! Each edge of the filter graph owns exactly one `FrameQueue`. The
//! producer and consumer sides are never contended against each other by
//! more than one thread at a time (the scheduler's single-flight discipline
//! over each filter guarantees that), so the `parking_lot::Mutex` guarding
//! the ring's bookkeeping is held only for the O(1) index arithmetic in
//! each call, never across a filter's `do_process_frame`.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::frame::{Frame, FrameFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("queue is empty")]
    Empty,
    #[error("queue is full")]
    Full,
}

struct Ring {
    slots: Vec<Frame>,
    front: usize,
    elements: usize,
    next_sequence: u64,
}

/// A bounded ring of frame slots connecting one writer to one reader.
///
/// `get_front`/`remove_frame` form the consumer's two-phase protocol;
/// `force_get_rear`/`add_frame` form the producer's. `force_get_rear` never
/// fails: when the ring is full it returns the oldest unread slot, and
/// `add_frame` advances `front` along with it, silently dropping that
/// frame. This is the lossy, real-time backpressure policy this runtime is
/// built around (see spec §4.2).
pub struct FrameQueue {
    ring: Mutex<Ring>,
    capacity: usize,
    format: FrameFormat,
    reader_connected: AtomicBool,
    writer_connected: AtomicBool,
}

impl FrameQueue {
    pub fn with_capacity(capacity: usize, max_frame_len: usize, format: FrameFormat) -> Self {
        assert!(capacity > 0, "FrameQueue capacity must be positive");
        let slots = (0..capacity).map(|_| Frame::new(max_frame_len, format)).collect();
        FrameQueue {
            ring: Mutex::new(Ring {
                slots,
                front: 0,
                elements: 0,
                next_sequence: 0,
            }),
            capacity,
            format,
            reader_connected: AtomicBool::new(false),
            writer_connected: AtomicBool::new(false),
        }
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    pub fn get_max_frames(&self) -> usize {
        self.capacity
    }

    pub fn get_elements(&self) -> usize {
        self.ring.lock().elements
    }

    pub fn is_empty(&self) -> bool {
        self.get_elements() == 0
    }

    pub fn is_full(&self) -> bool {
        self.get_elements() == self.capacity
    }

    /// Returns a clone of the front slot, or `Empty` if there is nothing to
    /// read. The caller commits the dequeue separately via
    /// [`FrameQueue::remove_frame`].
    pub fn get_front(&self) -> Result<Frame, QueueError> {
        let ring = self.ring.lock();
        if ring.elements == 0 {
            return Err(QueueError::Empty);
        }
        Ok(ring.slots[ring.front].clone())
    }

    /// Returns the front slot even when the queue is empty. Per spec §9's
    /// open question, the contents are then undefined input; callers must
    /// consult their own "did this reader have data" bookkeeping before
    /// trusting it (see `filter::kind::ManyToOneProcessor`).
    pub fn force_get_front(&self) -> Frame {
        let ring = self.ring.lock();
        ring.slots[ring.front].clone()
    }

    /// Commits the dequeue begun by `get_front`/`force_get_front`. A no-op
    /// on an empty queue.
    pub fn remove_frame(&self) {
        let mut ring = self.ring.lock();
        if ring.elements == 0 {
            return;
        }
        ring.front = (ring.front + 1) % self.capacity;
        ring.elements -= 1;
    }

    /// Writes into the rear slot in place via `f`, stamping it with the
    /// next sequence number first, and returns whatever `f` returns. Does
    /// not commit the enqueue; call [`FrameQueue::add_frame`] to do that.
    pub fn force_get_rear<R>(&self, f: impl FnOnce(&mut Frame) -> R) -> R {
        let mut ring = self.ring.lock();
        let rear = (ring.front + ring.elements) % self.capacity;
        ring.next_sequence += 1;
        let seq = ring.next_sequence;
        let slot = &mut ring.slots[rear];
        slot.set_sequence_number(seq);
        slot.set_consumed(false);
        f(slot)
    }

    /// A clone of the rear slot as it stands, useful as a scratch buffer
    /// when a filter must stage frames for several output queues before
    /// deciding which to actually commit (fan-out variants).
    pub fn peek_rear_template(&self) -> Frame {
        let ring = self.ring.lock();
        let rear = (ring.front + ring.elements) % self.capacity;
        ring.slots[rear].clone()
    }

    /// Commits the enqueue begun by `force_get_rear`. If the ring was
    /// already full, the oldest unread frame is dropped and `front`
    /// advances with it (overwrite policy); otherwise `elements` grows.
    pub fn add_frame(&self) {
        let mut ring = self.ring.lock();
        if ring.elements == self.capacity {
            ring.front = (ring.front + 1) % self.capacity;
        } else {
            ring.elements += 1;
        }
    }

    pub(crate) fn connect(&self) {
        self.reader_connected.store(true, Ordering::SeqCst);
        self.writer_connected.store(true, Ordering::SeqCst);
    }

    pub(crate) fn disconnect_reader(&self) {
        self.reader_connected.store(false, Ordering::SeqCst);
    }

    pub(crate) fn disconnect_writer(&self) {
        self.writer_connected.store(false, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.reader_connected.load(Ordering::SeqCst) && self.writer_connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_preserved() {
        let q = FrameQueue::with_capacity(4, 8, FrameFormat::Interleaved);
        for i in 0..3u64 {
            q.force_get_rear(|f| f.set_presentation_time(i as i64));
            q.add_frame();
        }
        assert_eq!(q.get_elements(), 3);
        for i in 0..3i64 {
            let f = q.get_front().unwrap();
            assert_eq!(f.presentation_time(), i);
            q.remove_frame();
        }
        assert!(q.get_front().is_err());
    }

    #[test]
    fn overwrite_on_full_advances_front() {
        let q = FrameQueue::with_capacity(2, 8, FrameFormat::Interleaved);
        for i in 0..2i64 {
            q.force_get_rear(|f| f.set_presentation_time(i));
            q.add_frame();
        }
        assert!(q.is_full());
        // Third write overwrites the oldest (pts=0); elements stays at capacity.
        q.force_get_rear(|f| f.set_presentation_time(2));
        q.add_frame();
        assert_eq!(q.get_elements(), 2);
        let f = q.get_front().unwrap();
        assert_eq!(f.presentation_time(), 1);
        q.remove_frame();
        let f = q.get_front().unwrap();
        assert_eq!(f.presentation_time(), 2);
    }

    #[test]
    fn sequence_numbers_are_monotonic() {
        let q = FrameQueue::with_capacity(4, 8, FrameFormat::Interleaved);
        for _ in 0..3 {
            q.force_get_rear(|_| ());
            q.add_frame();
        }
        let mut seqs = Vec::new();
        for _ in 0..3 {
            seqs.push(q.get_front().unwrap().sequence_number());
            q.remove_frame();
        }
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn connect_disconnect_lifecycle() {
        let q = FrameQueue::with_capacity(2, 4, FrameFormat::Interleaved);
        assert!(!q.is_connected());
        q.connect();
        assert!(q.is_connected());
        q.disconnect_reader();
        assert!(!q.is_connected());
        q.disconnect_writer();
        assert!(!q.is_connected());
        // Idempotent.
        q.disconnect_reader();
        q.disconnect_writer();
        assert!(!q.is_connected());
    }
}
