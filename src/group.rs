//! The shared "am I running?" refcount a master and its slaves share.
//!
//! Grounded in `original_source/src/Runnable.cpp`'s actual (not the header
//! comment's) `setRunning`/`unsetRunning`: a shared counter initialized to
//! the group size the first time any member starts a round, decremented by
//! every member as it finishes, and only on the *last* decrement is every
//! member's own running flag cleared together. Per spec §9's open
//! question, that shared-counter behavior — not the header's simple local
//! bool — is the one this crate implements.
//!
//! Unlike the original's per-instance `std::set<Runnable*> group`, this
//! crate gives every member a handle to one shared, symmetric [`Group`]
//! (REDESIGN FLAGS: shared-ownership atomic counter, not a raw pointer),
//! so there is no risk of the asymmetric membership the original's
//! pairwise `groupRunnable` calls could produce.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::ids::FilterId;

#[derive(Clone)]
pub(crate) struct RunFlag(Arc<AtomicBool>);

impl RunFlag {
    fn new() -> Self {
        RunFlag(Arc::new(AtomicBool::new(false)))
    }

    pub(crate) fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn set(&self, v: bool) {
        self.0.store(v, Ordering::SeqCst);
    }
}

struct Inner {
    members: Mutex<Vec<(FilterId, RunFlag)>>,
    running_count: Mutex<usize>,
}

/// A set of Runnables sharing one running-count, per spec §3's "Group".
#[derive(Clone)]
pub struct Group(Arc<Inner>);

impl Group {
    pub fn new() -> Self {
        Group(Arc::new(Inner {
            members: Mutex::new(Vec::new()),
            running_count: Mutex::new(0),
        }))
    }

    /// Adds a brand new member to this (otherwise-empty, single-filter)
    /// group, returning the run flag it should hold.
    pub(crate) fn join(&self, id: FilterId) -> RunFlagHandle {
        let flag = RunFlag::new();
        self.0.members.lock().push((id, flag.clone()));
        RunFlagHandle(flag)
    }

    /// Folds an existing member (and its already-issued flag) into this
    /// group, used when a master adopts a slave.
    pub(crate) fn adopt(&self, id: FilterId, flag: &RunFlagHandle) {
        self.0.members.lock().push((id, flag.0.clone()));
    }

    pub fn ids(&self) -> Vec<FilterId> {
        self.0.members.lock().iter().map(|(id, _)| *id).collect()
    }

    pub fn len(&self) -> usize {
        self.0.members.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether *any* member of this group is mid-round. Backed by a single
    /// shared flag state rather than a per-instance one, matching the
    /// grouped semantics above.
    pub fn is_running(&self) -> bool {
        self.0.members.lock().iter().any(|(_, f)| f.get())
    }

    pub(crate) fn begin_run(&self, flag: &RunFlagHandle) {
        let mut count = self.0.running_count.lock();
        if *count == 0 {
            *count = self.0.members.lock().len().max(1);
        }
        flag.0.set(true);
    }

    /// Decrements the shared counter. Returns `true` if this call brought
    /// it to zero, in which case every member's run flag was just cleared.
    pub(crate) fn end_run(&self) -> bool {
        let mut count = self.0.running_count.lock();
        if *count > 0 {
            *count -= 1;
        }
        let done = *count == 0;
        if done {
            for (_, f) in self.0.members.lock().iter() {
                f.set(false);
            }
        }
        done
    }
}

impl Default for Group {
    fn default() -> Self {
        Self::new()
    }
}

/// A member's own handle to its run flag, held alongside `Group` so
/// `is_running`/`set_running`/`unset_running` read naturally as per-filter
/// operations even though the backing storage is shared.
#[derive(Clone)]
pub(crate) struct RunFlagHandle(RunFlag);

impl RunFlagHandle {
    pub(crate) fn get(&self) -> bool {
        self.0.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solo_group_is_single_flight() {
        let g = Group::new();
        let flag = g.join(FilterId(1));
        assert!(!flag.get());
        g.begin_run(&flag);
        assert!(flag.get());
        assert!(g.is_running());
        let done = g.end_run();
        assert!(done);
        assert!(!flag.get());
        assert!(!g.is_running());
    }

    #[test]
    fn master_slave_group_releases_on_last_finisher() {
        let g = Group::new();
        let master = g.join(FilterId(1));
        let slave1 = g.join(FilterId(2));
        let slave2 = g.join(FilterId(3));

        g.begin_run(&master);
        assert!(master.get());
        g.begin_run(&slave1);
        g.begin_run(&slave2);

        assert!(!g.end_run()); // master finishes, 2 left
        assert!(!g.end_run()); // slave1 finishes, 1 left
        assert!(g.end_run()); // slave2 finishes, releases all
        assert!(!master.get());
        assert!(!slave1.get());
        assert!(!slave2.get());
    }

    #[test]
    fn adopt_merges_membership_and_ids() {
        let master_group = Group::new();
        let _master = master_group.join(FilterId(1));

        // The slave starts out in its own solo group, then gets folded
        // into the master's, the way `Filter::add_slave` does it.
        let slave_group = Group::new();
        let slave_flag = slave_group.join(FilterId(2));
        master_group.adopt(FilterId(2), &slave_flag);

        let mut ids = master_group.ids();
        ids.sort_by_key(|id| id.0);
        assert_eq!(ids, vec![FilterId(1), FilterId(2)]);
    }
}
