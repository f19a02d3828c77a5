//! Small newtype identifiers for filters, readers, and writers.
//!
//! Mirrors `db::CompositeId` in the teacher crate: a thin tuple struct
//! around an integer rather than a bare `u32`, so a reader id can't be
//! passed where a writer id is expected.

use std::fmt;

macro_rules! id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(FilterId, "Identifies a filter, unique within a `PipelineManager`.");
id_type!(ReaderId, "Identifies a reader endpoint, unique within its owning filter.");
id_type!(WriterId, "Identifies a writer endpoint, unique within its owning filter.");
