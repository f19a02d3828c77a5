//! The scheduler's view of a schedulable unit — anything with
//! `process_frame` (spec §6's "Runnable contract").

use std::time::Instant;

use smallvec::SmallVec;

use crate::group::Group;
use crate::ids::FilterId;

/// Downstream ids a tick enables. Most filters have one or a handful of
/// writers, so this stays on the stack for the common case (mirrors the
/// teacher's use of `SmallVec` for similarly small, usually-inline sets).
pub type EnabledIds = SmallVec<[FilterId; 4]>;

/// Deferral used when a tick finds nothing to do (empty input, or no
/// readers/writers connected yet), to avoid busy-polling. Matches the
/// scheduler's own ~10ms idle wait, so a starved filter and an idle worker
/// wake up on comparable cadences.
pub const RETRY_DELAY_US: i64 = 10_000;

/// Implemented by every schedulable node in the graph. `Filter` is this
/// crate's only implementor; the trait exists as a seam so
/// [`crate::workers::WorkersPool`] and its tests don't need to depend on
/// `Filter`'s frame-processing machinery at all.
pub trait Runnable: Send {
    /// Runs one tick, returning the downstream filter ids now worth
    /// scheduling and the minimum microseconds before this runnable should
    /// be considered again.
    fn run_process_frame(&mut self) -> (EnabledIds, i64);

    fn is_periodic(&self) -> bool;

    fn get_id(&self) -> FilterId;

    /// Assigns this runnable's id. Callers (here, only
    /// `PipelineManager::add_filter`) must call this exactly once.
    fn set_id(&mut self, id: FilterId);

    fn group(&self) -> &Group;

    fn get_group_ids(&self) -> Vec<FilterId> {
        self.group().ids()
    }

    fn group_runnable(&self, other: &dyn Runnable) -> bool {
        self.get_group_ids().contains(&other.get_id())
    }

    /// True while any member of this runnable's group is mid-round (the
    /// shared-counter semantics spec §9 calls for; see [`crate::group`]).
    fn is_running(&self) -> bool;

    fn set_running(&self);

    fn unset_running(&self);

    fn next_eligible(&self) -> Instant;

    fn set_next_eligible(&mut self, t: Instant);

    fn ready(&self, now: Instant) -> bool {
        self.next_eligible() <= now
    }
}
