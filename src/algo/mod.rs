//! Whole-mesh algorithms.
//!
//! - **Replication**: duplicating a mesh across the periodic images of its
//!   simulation cell and repairing the links that cross image boundaries
//!
//! Long-running algorithms accept a [`Progress`] callback.

pub mod progress;
pub mod replicate;

pub use progress::Progress;
pub use replicate::{replicate_periodic, replicate_periodic_with_progress, ReplicateOptions};
