//! The concrete processing contracts for each filter shape (spec §4.4).
//!
//! `FilterKind` is a tagged enum over boxed trait objects rather than a
//! base-class hierarchy (REDESIGN FLAGS): composition of a reader set, a
//! writer set, and one of these processors stands in for the original's
//! `OneToOneFilter`/`ManyToOneFilter`/etc. subclasses.

use std::collections::HashMap;

use crate::frame::Frame;
use crate::ids::{ReaderId, WriterId};

/// One input, one output. `do_process_frame` returns `true` to commit both
/// the dequeue and the enqueue, `false` to commit only the dequeue (the
/// frame was consumed but produced nothing).
pub trait OneToOneProcessor: Send {
    fn do_process_frame(&mut self, src: &Frame, dst: &mut Frame) -> bool;
}

/// Several inputs, one output. Each entry in `inputs` pairs a reader id
/// with `(had_data, frame)`; per spec §9's open question, a `false` flag
/// means the paired frame is a placeholder (the queue was empty) and must
/// not be trusted without checking the flag first.
pub trait ManyToOneProcessor: Send {
    fn do_process_frame(&mut self, inputs: &HashMap<ReaderId, (bool, Frame)>, dst: &mut Frame) -> bool;
}

/// One input, several outputs. `outputs` is pre-staged with one scratch
/// frame per connected writer; the processor fills whichever it wants to
/// produce into and returns their ids. Writers whose id isn't returned are
/// left untouched this tick.
pub trait OneToManyProcessor: Send {
    fn do_process_frame(&mut self, src: &Frame, outputs: &mut HashMap<WriterId, Frame>) -> Vec<WriterId>;
}

/// Several inputs, several outputs: the composition of the two above.
pub trait ManyToManyProcessor: Send {
    fn do_process_frame(
        &mut self,
        inputs: &HashMap<ReaderId, (bool, Frame)>,
        outputs: &mut HashMap<WriterId, Frame>,
    ) -> Vec<WriterId>;
}

/// Zero inputs: a source. Always periodic; `Filter`'s own `period_us`
/// paces it, so the processor just reports what it produced.
pub trait HeadProcessor: Send {
    fn do_process_frame(&mut self, outputs: &mut HashMap<WriterId, Frame>) -> Vec<WriterId>;
}

/// Zero outputs: a sink.
pub trait TailProcessor: Send {
    fn do_process_frame(&mut self, inputs: &HashMap<ReaderId, (bool, Frame)>);
}

pub enum FilterKind {
    OneToOne(Box<dyn OneToOneProcessor>),
    ManyToOne(Box<dyn ManyToOneProcessor>),
    OneToMany(Box<dyn OneToManyProcessor>),
    ManyToMany(Box<dyn ManyToManyProcessor>),
    Head(Box<dyn HeadProcessor>),
    Tail(Box<dyn TailProcessor>),
}

impl FilterKind {
    /// Whether this shape has zero readers (a source).
    pub fn is_head(&self) -> bool {
        matches!(self, FilterKind::Head(_))
    }

    /// Whether this shape has zero writers (a sink).
    pub fn is_tail(&self) -> bool {
        matches!(self, FilterKind::Tail(_))
    }
}
