// Ambient stack shared by the streamgraph runtime: clocks, error types,
// a cooperative shutdown signal, and tracing setup.

pub mod clock;
mod error;
pub mod shutdown;
pub mod tracing_setup;

pub use crate::error::{Error, ErrorKind, ResultExt};
