//! Per-shape tick logic, dispatched from `Filter::run_process_frame`.
//!
//! Split out as free functions taking disjoint borrows of a `Filter`'s
//! fields (rather than methods) so `run_process_frame` can destructure
//! `self` once and hand each field to the right function without fighting
//! the borrow checker over `&mut self` + `&mut self.kind` at once.

use std::collections::HashMap;

use crate::endpoint::{Reader, Writer};
use crate::filter::kind::{
    HeadProcessor, ManyToManyProcessor, ManyToOneProcessor, OneToManyProcessor, OneToOneProcessor, TailProcessor,
};
use crate::filter::master_slave::{MasterLink, SharedSlot};
use crate::frame::Frame;
use crate::ids::{ReaderId, WriterId};
use crate::runnable::{EnabledIds, RETRY_DELAY_US};

fn first_writer(writers: &HashMap<WriterId, Writer>) -> Option<&Writer> {
    writers.values().next()
}

fn first_reader(readers: &HashMap<ReaderId, Reader>) -> Option<&Reader> {
    readers.values().next()
}

/// Gathers one (had_data, frame) pair per reader, using `force_get_front`'s
/// placeholder for readers with nothing queued (spec §9's open question).
/// Returns `None` if not a single reader had real data this tick.
fn gather_inputs(readers: &HashMap<ReaderId, Reader>) -> Option<HashMap<ReaderId, (bool, Frame)>> {
    let mut inputs = HashMap::new();
    let mut any_data = false;
    for (rid, reader) in readers {
        let Some(q) = reader.queue() else { continue };
        match q.get_front() {
            Ok(f) => {
                any_data = true;
                inputs.insert(*rid, (true, f));
            }
            Err(_) => {
                inputs.insert(*rid, (false, q.force_get_front()));
            }
        }
    }
    any_data.then_some(inputs)
}

fn commit_consumed_inputs(readers: &HashMap<ReaderId, Reader>, inputs: &HashMap<ReaderId, (bool, Frame)>) {
    for (rid, reader) in readers {
        if let Some((true, _)) = inputs.get(rid) {
            if let Some(q) = reader.queue() {
                q.remove_frame();
            }
        }
    }
}

fn stage_outputs(writers: &HashMap<WriterId, Writer>) -> HashMap<WriterId, Frame> {
    writers
        .iter()
        .filter_map(|(wid, w)| w.frame_queue().map(|q| (*wid, q.peek_rear_template())))
        .collect()
}

/// Commits whichever staged frames the processor asked for, returning the
/// downstream filter ids fed by the writers that actually fired.
fn commit_outputs(
    writers: &HashMap<WriterId, Writer>,
    mut staged: HashMap<WriterId, Frame>,
    produced: Vec<WriterId>,
) -> EnabledIds {
    let mut downstream = EnabledIds::new();
    for wid in produced {
        let Some(writer) = writers.get(&wid) else { continue };
        let Some(q) = writer.frame_queue() else { continue };
        let Some(frame) = staged.remove(&wid) else { continue };
        q.force_get_rear(|dst| *dst = frame);
        q.add_frame();
        if let Some((fid, _)) = writer.peer() {
            downstream.push(fid);
        }
    }
    downstream
}

pub(super) fn tick_one_to_one(
    readers: &HashMap<ReaderId, Reader>,
    writers: &HashMap<WriterId, Writer>,
    master_link: &mut Option<MasterLink>,
    slave_slot: &Option<SharedSlot>,
    proc: &mut dyn OneToOneProcessor,
) -> (EnabledIds, i64) {
    let Some(writer) = first_writer(writers) else {
        return (EnabledIds::new(), RETRY_DELAY_US);
    };
    let Some(out_queue) = writer.frame_queue() else {
        return (EnabledIds::new(), RETRY_DELAY_US);
    };

    let frame = if let Some(slot) = slave_slot {
        match slot.take() {
            Some(f) => f,
            None => return (EnabledIds::new(), RETRY_DELAY_US),
        }
    } else {
        let Some(reader) = first_reader(readers) else {
            return (EnabledIds::new(), RETRY_DELAY_US);
        };
        let Some(in_queue) = reader.queue() else {
            return (EnabledIds::new(), RETRY_DELAY_US);
        };
        // A master defers the previous round's dequeue to this tick, so the
        // frame it just staged for its slaves stays readable for a full
        // scheduler round (spec §4.4).
        if let Some(link) = master_link {
            if link.pending_release {
                in_queue.remove_frame();
                link.pending_release = false;
            }
        }
        match in_queue.get_front() {
            Ok(f) => f,
            Err(_) => return (EnabledIds::new(), RETRY_DELAY_US),
        }
    };

    let produced = out_queue.force_get_rear(|dst| proc.do_process_frame(&frame, dst));
    let mut downstream = EnabledIds::new();
    if produced {
        out_queue.add_frame();
        if let Some((fid, _)) = writer.peer() {
            downstream.push(fid);
        }
    }

    match master_link {
        Some(link) => {
            if slave_slot.is_none() {
                link.stage_for_all(&frame);
                link.pending_release = true;
            }
        }
        None => {
            if slave_slot.is_none() {
                if let Some(reader) = first_reader(readers) {
                    if let Some(in_queue) = reader.queue() {
                        in_queue.remove_frame();
                    }
                }
            }
        }
    }

    (downstream, 0)
}

pub(super) fn tick_many_to_one(
    readers: &HashMap<ReaderId, Reader>,
    writers: &HashMap<WriterId, Writer>,
    proc: &mut dyn ManyToOneProcessor,
) -> (EnabledIds, i64) {
    let Some(writer) = first_writer(writers) else {
        return (EnabledIds::new(), RETRY_DELAY_US);
    };
    let Some(out_queue) = writer.frame_queue() else {
        return (EnabledIds::new(), RETRY_DELAY_US);
    };
    let Some(inputs) = gather_inputs(readers) else {
        return (EnabledIds::new(), RETRY_DELAY_US);
    };

    let produced = out_queue.force_get_rear(|dst| proc.do_process_frame(&inputs, dst));
    let mut downstream = EnabledIds::new();
    if produced {
        out_queue.add_frame();
        if let Some((fid, _)) = writer.peer() {
            downstream.push(fid);
        }
    }
    commit_consumed_inputs(readers, &inputs);
    (downstream, 0)
}

pub(super) fn tick_one_to_many(
    readers: &HashMap<ReaderId, Reader>,
    writers: &HashMap<WriterId, Writer>,
    proc: &mut dyn OneToManyProcessor,
) -> (EnabledIds, i64) {
    let Some(reader) = first_reader(readers) else {
        return (EnabledIds::new(), RETRY_DELAY_US);
    };
    let Some(in_queue) = reader.queue() else {
        return (EnabledIds::new(), RETRY_DELAY_US);
    };
    let frame = match in_queue.get_front() {
        Ok(f) => f,
        Err(_) => return (EnabledIds::new(), RETRY_DELAY_US),
    };

    let mut staged = stage_outputs(writers);
    let produced = proc.do_process_frame(&frame, &mut staged);
    let downstream = commit_outputs(writers, staged, produced);
    in_queue.remove_frame();
    (downstream, 0)
}

pub(super) fn tick_many_to_many(
    readers: &HashMap<ReaderId, Reader>,
    writers: &HashMap<WriterId, Writer>,
    proc: &mut dyn ManyToManyProcessor,
) -> (EnabledIds, i64) {
    let Some(inputs) = gather_inputs(readers) else {
        return (EnabledIds::new(), RETRY_DELAY_US);
    };
    let mut staged = stage_outputs(writers);
    let produced = proc.do_process_frame(&inputs, &mut staged);
    let downstream = commit_outputs(writers, staged, produced);
    commit_consumed_inputs(readers, &inputs);
    (downstream, 0)
}

pub(super) fn tick_head(writers: &HashMap<WriterId, Writer>, proc: &mut dyn HeadProcessor) -> (EnabledIds, i64) {
    let mut staged = stage_outputs(writers);
    let produced = proc.do_process_frame(&mut staged);
    let downstream = commit_outputs(writers, staged, produced);
    (downstream, 0)
}

pub(super) fn tick_tail(readers: &HashMap<ReaderId, Reader>, proc: &mut dyn TailProcessor) -> (EnabledIds, i64) {
    let Some(inputs) = gather_inputs(readers) else {
        return (EnabledIds::new(), RETRY_DELAY_US);
    };
    proc.do_process_frame(&inputs);
    commit_consumed_inputs(readers, &inputs);
    (EnabledIds::new(), 0)
}
