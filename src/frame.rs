//! The payload carrier exchanged between filters.
//!
//! Frames are value-like: a filter that must fan data out to several
//! downstream queues copies the payload into each rather than sharing one
//! instance, so `Frame` derives `Clone` and carries no borrowed state.

use base::{bail_t, Error};

/// Planar vs. interleaved layout of a frame's payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameFormat {
    Interleaved,
    Planar { planes: u8 },
}

#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    length: usize,
    format: FrameFormat,
    presentation_time_us: i64,
    sequence_number: u64,
    consumed: bool,
}

impl Frame {
    /// Allocates a slot frame. Used only by `FrameQueue::with_capacity`
    /// when it builds its ring; filters never construct frames directly,
    /// they fill the slot handed to them by `force_get_rear`.
    pub(crate) fn new(max_length: usize, format: FrameFormat) -> Self {
        Frame {
            data: vec![0u8; max_length],
            length: 0,
            format,
            presentation_time_us: 0,
            sequence_number: 0,
            consumed: true,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data[..self.length]
    }

    /// The full backing buffer, up to `max_length`, for a producer to fill
    /// before calling [`Frame::set_length`].
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data[..]
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn max_length(&self) -> usize {
        self.data.len()
    }

    pub fn set_length(&mut self, n: usize) -> Result<(), Error> {
        if n > self.max_length() {
            bail_t!(
                InvalidArgument,
                "frame length {} exceeds max_length {}",
                n,
                self.max_length()
            );
        }
        self.length = n;
        Ok(())
    }

    pub fn presentation_time(&self) -> i64 {
        self.presentation_time_us
    }

    pub fn set_presentation_time(&mut self, t_us: i64) {
        self.presentation_time_us = t_us;
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub(crate) fn set_sequence_number(&mut self, n: u64) {
        self.sequence_number = n;
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    pub fn is_planar(&self) -> bool {
        matches!(self.format, FrameFormat::Planar { .. })
    }

    /// Whether every participant sharing this frame (in master/slave
    /// shared-frame mode) has finished with it.
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    pub(crate) fn set_consumed(&mut self, v: bool) {
        self.consumed = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_length_rejects_overflow() {
        let mut f = Frame::new(16, FrameFormat::Interleaved);
        assert!(f.set_length(16).is_ok());
        assert_eq!(f.length(), 16);
        let e = f.set_length(17).unwrap_err();
        assert_eq!(e.kind(), base::ErrorKind::InvalidArgument);
    }

    #[test]
    fn is_planar_follows_format() {
        let f = Frame::new(4, FrameFormat::Planar { planes: 3 });
        assert!(f.is_planar());
        let f = Frame::new(4, FrameFormat::Interleaved);
        assert!(!f.is_planar());
    }
}
