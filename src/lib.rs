//! A concurrent frame-processing dataflow runtime: a directed graph of
//! stateful filters exchanging frames over bounded queues, executed by a
//! shared pool of worker threads under a deadline-aware scheduler.
//!
//! Concrete codecs, RTSP/RTP, DASH, shared memory, and the management
//! CLI/JSON-RPC surface are external collaborators, modeled here only by
//! the shape of their interface (a filter with N readers and M writers).

pub mod endpoint;
pub mod filter;
pub mod frame;
pub mod group;
pub mod ids;
pub mod manager;
pub mod queue;
pub mod runnable;
pub mod workers;

pub use endpoint::{ConnectionState, Reader, Writer};
pub use filter::kind::{
    FilterKind, HeadProcessor, ManyToManyProcessor, ManyToOneProcessor, OneToManyProcessor, OneToOneProcessor,
    TailProcessor,
};
pub use filter::Filter;
pub use frame::{Frame, FrameFormat};
pub use group::Group;
pub use ids::{FilterId, ReaderId, WriterId};
pub use manager::{Hop, Path, PipelineManager, PipelineSnapshot};
pub use queue::{FrameQueue, QueueError};
pub use runnable::{Runnable, RETRY_DELAY_US};
pub use workers::{RunnableHandle, WorkersConfig, WorkersPool};
