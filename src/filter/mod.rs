//! `Filter`: a graph node combining a reader set, a writer set, and a
//! [`kind::FilterKind`] processor (spec §4.4).
//!
//! Composition over inheritance, per REDESIGN FLAGS: there is one `Filter`
//! type for every shape, not an `OneToOneFilter`/`ManyToOneFilter`/etc.
//! subclass tree.

pub mod kind;
pub mod master_slave;
mod tick;

use std::collections::HashMap;
use std::time::Instant;

use base::bail_t;

use crate::endpoint::{Reader, Writer};
use crate::group::{Group, RunFlagHandle};
use crate::ids::{FilterId, ReaderId, WriterId};
use crate::runnable::Runnable;
use kind::{
    FilterKind, HeadProcessor, ManyToManyProcessor, ManyToOneProcessor, OneToManyProcessor, OneToOneProcessor,
    TailProcessor,
};
use master_slave::{MasterLink, SharedSlot, SlaveEntry};

/// A node in the filter graph. Exactly one of `kind`'s variants applies,
/// chosen at construction and fixed for the filter's lifetime (spec §4.4:
/// "a filter's shape never changes after construction").
pub struct Filter {
    id: FilterId,
    readers: HashMap<ReaderId, Reader>,
    writers: HashMap<WriterId, Writer>,
    kind: FilterKind,
    periodic: bool,
    period_us: i64,
    group: Group,
    run_flag: Option<RunFlagHandle>,
    next_eligible: Instant,
    master_link: Option<MasterLink>,
    slave_slot: Option<SharedSlot>,
    attached_as_slave: bool,
}

impl Filter {
    fn empty(kind: FilterKind, periodic: bool, period_us: i64) -> Self {
        Filter {
            id: FilterId(u32::MAX),
            readers: HashMap::new(),
            writers: HashMap::new(),
            kind,
            periodic,
            period_us,
            group: Group::new(),
            run_flag: None,
            next_eligible: Instant::now(),
            master_link: None,
            slave_slot: None,
            attached_as_slave: false,
        }
    }

    pub fn new_one_to_one(proc: Box<dyn OneToOneProcessor>) -> Self {
        let mut f = Self::empty(FilterKind::OneToOne(proc), false, 0);
        f.readers.insert(ReaderId(0), Reader::new(ReaderId(0)));
        f.writers.insert(WriterId(0), Writer::new(WriterId(0)));
        f
    }

    pub fn new_many_to_one(proc: Box<dyn ManyToOneProcessor>, num_readers: u32) -> Self {
        let mut f = Self::empty(FilterKind::ManyToOne(proc), false, 0);
        for i in 0..num_readers {
            f.readers.insert(ReaderId(i), Reader::new(ReaderId(i)));
        }
        f.writers.insert(WriterId(0), Writer::new(WriterId(0)));
        f
    }

    pub fn new_one_to_many(proc: Box<dyn OneToManyProcessor>, num_writers: u32) -> Self {
        let mut f = Self::empty(FilterKind::OneToMany(proc), false, 0);
        f.readers.insert(ReaderId(0), Reader::new(ReaderId(0)));
        for i in 0..num_writers {
            f.writers.insert(WriterId(i), Writer::new(WriterId(i)));
        }
        f
    }

    pub fn new_many_to_many(proc: Box<dyn ManyToManyProcessor>, num_readers: u32, num_writers: u32) -> Self {
        let mut f = Self::empty(FilterKind::ManyToMany(proc), false, 0);
        for i in 0..num_readers {
            f.readers.insert(ReaderId(i), Reader::new(ReaderId(i)));
        }
        for i in 0..num_writers {
            f.writers.insert(WriterId(i), Writer::new(WriterId(i)));
        }
        f
    }

    /// A source: no readers, always periodic, paced by `period_us`.
    pub fn new_head(proc: Box<dyn HeadProcessor>, period_us: i64, num_writers: u32) -> Self {
        let mut f = Self::empty(FilterKind::Head(proc), true, period_us);
        for i in 0..num_writers {
            f.writers.insert(WriterId(i), Writer::new(WriterId(i)));
        }
        f
    }

    /// A sink: no writers.
    pub fn new_tail(proc: Box<dyn TailProcessor>, num_readers: u32) -> Self {
        let mut f = Self::empty(FilterKind::Tail(proc), false, 0);
        for i in 0..num_readers {
            f.readers.insert(ReaderId(i), Reader::new(ReaderId(i)));
        }
        f
    }

    pub fn id(&self) -> FilterId {
        self.id
    }

    pub fn period_us(&self) -> i64 {
        self.period_us
    }

    pub fn readers(&self) -> &HashMap<ReaderId, Reader> {
        &self.readers
    }

    pub fn writers(&self) -> &HashMap<WriterId, Writer> {
        &self.writers
    }

    pub fn reader_mut(&mut self, id: ReaderId) -> Option<&mut Reader> {
        self.readers.get_mut(&id)
    }

    pub fn writer_mut(&mut self, id: WriterId) -> Option<&mut Writer> {
        self.writers.get_mut(&id)
    }

    pub fn kind(&self) -> &FilterKind {
        &self.kind
    }

    pub fn is_master(&self) -> bool {
        self.master_link.is_some()
    }

    /// True once this filter has been attached to a master via
    /// [`Filter::add_slave`], in either shared-frame or independent-frame
    /// mode (spec §4.4's `role == slave`).
    pub fn is_slave(&self) -> bool {
        self.attached_as_slave
    }

    /// Promotes this `OneToOne` filter to a master, enabling [`Filter::add_slave`].
    ///
    /// `share_frames` selects spec §4.4's shared-frame mode: `true` hands
    /// every slave a clone of the exact frame this master dequeued each
    /// round; `false` only merges the groups for single-flight bookkeeping,
    /// leaving each slave to read its own upstream queue. `slave_writers`
    /// fixes this master's shape (spec §4.4: "a filter's shape never
    /// changes after construction"): it declares the only writer ids a
    /// later `add_slave` may attach to. These are slave-attachment slots,
    /// not entries in this filter's own `writers` map — a `OneToOne`
    /// master has exactly one real output, and [`tick`] picks it
    /// independently of how many slaves are attached.
    pub fn make_master(&mut self, share_frames: bool, slave_writers: &[WriterId]) -> Result<(), base::Error> {
        if !matches!(self.kind, FilterKind::OneToOne(_)) {
            bail_t!(InvalidArgument, "only a OneToOne filter can become a master");
        }
        if self.master_link.is_some() {
            bail_t!(AlreadyRegistered, "filter {} is already a master", self.id);
        }
        self.master_link = Some(MasterLink::new(share_frames, slave_writers));
        Ok(())
    }

    /// Attaches `slave` to this master on writer slot `on_writer`. Both
    /// filters must already have been assigned ids ([`Runnable::set_id`])
    /// by the time this is called, matching `PipelineManager`'s
    /// register-then-wire order.
    pub fn add_slave(&mut self, on_writer: WriterId, slave: &mut Filter) -> Result<(), base::Error> {
        if slave.id == FilterId(u32::MAX) {
            bail_t!(InvalidArgument, "slave must be registered before attaching");
        }
        if slave.is_master() {
            bail_t!(InvalidArgument, "filter {} is already a master and cannot become a slave", slave.id);
        }
        if slave.attached_as_slave {
            bail_t!(AlreadyRegistered, "filter {} is already a slave", slave.id);
        }
        let share_frames = {
            let Some(link) = &self.master_link else {
                bail_t!(InvalidArgument, "add_slave called on a non-master filter");
            };
            if link.share_frames && slave.readers.len() != self.readers.len() {
                bail_t!(IncompatibleEndpoint, "slave {} has an incompatible input queue topology", slave.id);
            }
            if !link.declares(on_writer) {
                bail_t!(InvalidId, "{} is not a declared slave slot on this master", on_writer);
            }
            if let Err(msg) = link.can_attach(on_writer, slave.id) {
                bail_t!(AlreadyRegistered, "{}", msg);
            }
            link.share_frames
        };
        let Some(slave_flag) = slave.run_flag.clone() else {
            bail_t!(InvalidArgument, "slave must be registered before attaching");
        };

        let link = self.master_link.as_mut().expect("checked above");
        let slot = link.new_slot_for();
        if share_frames {
            slave.slave_slot = Some(slot.clone());
        }
        link.slaves.insert(on_writer, SlaveEntry { filter_id: slave.id, slot });

        self.group.adopt(slave.id, &slave_flag);
        slave.group = self.group.clone();
        slave.attached_as_slave = true;
        Ok(())
    }
}

impl Runnable for Filter {
    fn run_process_frame(&mut self) -> (crate::runnable::EnabledIds, i64) {
        let Filter {
            readers,
            writers,
            kind,
            master_link,
            slave_slot,
            periodic,
            period_us,
            ..
        } = self;
        let (downstream, delay) = match kind {
            FilterKind::OneToOne(proc) => {
                tick::tick_one_to_one(readers, writers, master_link, slave_slot, proc.as_mut())
            }
            FilterKind::ManyToOne(proc) => tick::tick_many_to_one(readers, writers, proc.as_mut()),
            FilterKind::OneToMany(proc) => tick::tick_one_to_many(readers, writers, proc.as_mut()),
            FilterKind::ManyToMany(proc) => tick::tick_many_to_many(readers, writers, proc.as_mut()),
            FilterKind::Head(proc) => tick::tick_head(writers, proc.as_mut()),
            FilterKind::Tail(proc) => tick::tick_tail(readers, proc.as_mut()),
        };
        // A periodic filter (only `Head` today) paces itself by `period_us`
        // rather than being woken by an upstream producer; a tick function
        // reports `0` on a normal productive round, which we read here as
        // "use the filter's own period" instead of "run again immediately".
        let delay = if *periodic && delay == 0 { *period_us } else { delay };
        (downstream, delay)
    }

    fn is_periodic(&self) -> bool {
        self.periodic
    }

    fn get_id(&self) -> FilterId {
        self.id
    }

    fn set_id(&mut self, id: FilterId) {
        self.id = id;
        self.run_flag = Some(self.group.join(id));
    }

    fn group(&self) -> &Group {
        &self.group
    }

    fn is_running(&self) -> bool {
        self.run_flag.as_ref().is_some_and(RunFlagHandle::get)
    }

    fn set_running(&self) {
        if let Some(flag) = &self.run_flag {
            self.group.begin_run(flag);
        }
    }

    fn unset_running(&self) {
        self.group.end_run();
    }

    fn next_eligible(&self) -> Instant {
        self.next_eligible
    }

    fn set_next_eligible(&mut self, t: Instant) {
        self.next_eligible = t;
    }
}
