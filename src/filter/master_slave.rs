//! The master/slave shared-frame hand-off (spec §4.4).
//!
//! A shared-frame slave doesn't read from its own `Reader` at all; instead
//! it pulls the frame the master staged for it out of a [`SharedSlot`] and
//! runs its own processor against that. This sidesteps the single-
//! reader-per-queue rule (spec §4.2) entirely, rather than trying to let
//! two filters peek the same ring concurrently.
//!
//! Independent-frame mode doesn't use `SharedSlot` at all: master and
//! slaves each read their own queue, fed by a common upstream fan-out, and
//! `add_slave` only folds their [`crate::group::Group`]s together so
//! `is_running`/`get_group_ids` see the whole set.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::frame::Frame;
use crate::ids::{FilterId, WriterId};

#[derive(Clone)]
pub(crate) struct SharedSlot(Arc<Mutex<Option<Frame>>>);

impl SharedSlot {
    fn new() -> Self {
        SharedSlot(Arc::new(Mutex::new(None)))
    }

    pub(crate) fn put(&self, f: Frame) {
        *self.0.lock() = Some(f);
    }

    pub(crate) fn take(&self) -> Option<Frame> {
        self.0.lock().take()
    }
}

pub(crate) struct SlaveEntry {
    pub(crate) filter_id: FilterId,
    pub(crate) slot: SharedSlot,
}

/// Bookkeeping a master filter carries about its attached slaves.
pub(crate) struct MasterLink {
    pub(crate) share_frames: bool,
    pub(crate) slaves: HashMap<WriterId, SlaveEntry>,
    /// The writer ids declared at [`MasterLink::new`] time — the only
    /// slots `add_slave` may attach to. Fixed at construction, matching
    /// spec §4.4's "a filter's shape never changes after construction";
    /// distinct from the master's own `writers` map (see
    /// [`crate::filter::Filter::make_master`]).
    declared_slots: HashSet<WriterId>,
    /// Set once a round has been staged for the slaves; cleared (and the
    /// deferred `remove_frame` performed) on the master's *next* tick, per
    /// spec §4.4: "the master's next tick performs the remove_frame".
    pub(crate) pending_release: bool,
}

impl MasterLink {
    pub(crate) fn new(share_frames: bool, slave_writers: &[WriterId]) -> Self {
        MasterLink {
            share_frames,
            slaves: HashMap::new(),
            declared_slots: slave_writers.iter().copied().collect(),
            pending_release: false,
        }
    }

    pub(crate) fn new_slot_for(&self) -> SharedSlot {
        SharedSlot::new()
    }

    /// Whether `slot` is one of the writer ids this master declared for
    /// slave attachment at construction time.
    pub(crate) fn declares(&self, slot: WriterId) -> bool {
        self.declared_slots.contains(&slot)
    }

    /// Contention rules from spec §4.4: the slot must be free and the
    /// candidate not already attached anywhere in this link. Call only
    /// after [`MasterLink::declares`] has confirmed `slot` is valid.
    pub(crate) fn can_attach(&self, slot: WriterId, slave_id: FilterId) -> Result<(), &'static str> {
        if self.slaves.contains_key(&slot) {
            return Err("writer id already has a slave attached");
        }
        if self.slaves.values().any(|s| s.filter_id == slave_id) {
            return Err("slave is already attached to this master");
        }
        Ok(())
    }

    pub(crate) fn stage_for_all(&self, frame: &Frame) {
        for entry in self.slaves.values() {
            entry.slot.put(frame.clone());
        }
    }
}
