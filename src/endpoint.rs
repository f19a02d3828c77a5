//! Reader and Writer endpoints: the handles a filter uses to reach a queue
//! without owning it directly. Queues live on edges; filters only hold
//! endpoints (see spec §4.3).

use std::collections::HashMap;
use std::sync::Arc;

use crate::ids::{FilterId, ReaderId, WriterId};
use crate::queue::FrameQueue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Connected,
    Disconnected,
}

/// A filter's outbound port. Exposes the single queue it writes into once
/// connected.
pub struct Writer {
    id: WriterId,
    queue: Option<Arc<FrameQueue>>,
    peer: Option<(FilterId, ReaderId)>,
    state: ConnectionState,
}

impl Writer {
    pub(crate) fn new(id: WriterId) -> Self {
        Writer {
            id,
            queue: None,
            peer: None,
            state: ConnectionState::Unconnected,
        }
    }

    pub fn id(&self) -> WriterId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn peer(&self) -> Option<(FilterId, ReaderId)> {
        self.peer
    }

    /// The outbound queue, once connected.
    pub fn frame_queue(&self) -> Option<&Arc<FrameQueue>> {
        self.queue.as_ref()
    }

    pub(crate) fn connect(&mut self, queue: Arc<FrameQueue>, peer_filter: FilterId, peer_reader: ReaderId) {
        queue.connect();
        self.queue = Some(queue);
        self.peer = Some((peer_filter, peer_reader));
        self.state = ConnectionState::Connected;
    }

    pub(crate) fn disconnect(&mut self) {
        if let Some(q) = &self.queue {
            q.disconnect_writer();
        }
        self.queue = None;
        self.peer = None;
        self.state = ConnectionState::Disconnected;
    }
}

/// A filter's inbound port. Holds the map of connections keyed by the
/// remote writer id, per spec §4.3 — in this crate's usage a `Reader`
/// normally carries at most one connection, since fan-out is implemented
/// with multiple queues rather than multiple producers on one.
pub struct Reader {
    id: ReaderId,
    connections: HashMap<WriterId, (FilterId, Arc<FrameQueue>)>,
    state: ConnectionState,
}

impl Reader {
    pub(crate) fn new(id: ReaderId) -> Self {
        Reader {
            id,
            connections: HashMap::new(),
            state: ConnectionState::Unconnected,
        }
    }

    pub fn id(&self) -> ReaderId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn get_connected_to(&self) -> &HashMap<WriterId, (FilterId, Arc<FrameQueue>)> {
        &self.connections
    }

    /// The queue this reader is connected to, if any.
    pub fn queue(&self) -> Option<&Arc<FrameQueue>> {
        self.connections.values().next().map(|(_, q)| q)
    }

    pub(crate) fn connect(&mut self, peer_filter: FilterId, peer_writer: WriterId, queue: Arc<FrameQueue>) {
        queue.connect();
        self.connections.insert(peer_writer, (peer_filter, queue));
        self.state = ConnectionState::Connected;
    }

    pub(crate) fn disconnect(&mut self) {
        for (_, q) in self.connections.values() {
            q.disconnect_reader();
        }
        self.connections.clear();
        self.state = ConnectionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameFormat;

    #[test]
    fn reader_writer_connect_cycle() {
        let q = Arc::new(FrameQueue::with_capacity(4, 8, FrameFormat::Interleaved));
        let mut w = Writer::new(WriterId(0));
        let mut r = Reader::new(ReaderId(0));
        assert_eq!(w.state(), ConnectionState::Unconnected);
        w.connect(q.clone(), FilterId(2), ReaderId(0));
        r.connect(FilterId(1), WriterId(0), q.clone());
        assert_eq!(w.state(), ConnectionState::Connected);
        assert_eq!(r.state(), ConnectionState::Connected);
        assert!(q.is_connected());
        assert_eq!(w.peer(), Some((FilterId(2), ReaderId(0))));
        assert!(r.get_connected_to().contains_key(&WriterId(0)));
        w.disconnect();
        r.disconnect();
        assert!(!q.is_connected());
        assert_eq!(w.state(), ConnectionState::Disconnected);
        assert_eq!(r.state(), ConnectionState::Disconnected);
    }
}
