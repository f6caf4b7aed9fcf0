//! Recording: trajectory storage and start/end notifications.
//!
//! # Key Types
//!
//! - [`TrajectoryStore`]: destination for run and generation records
//! - [`InMemoryTrajectory`]: the bundled store
//! - [`Recorder`]: parameter snapshot at start, summary at end

mod observer;
mod store;

pub use observer::{Recorder, OPTIMIZEE_GROUP, OPTIMIZER_GROUP, SUMMARY_GROUP};
pub use store::{generation_of_runs, InMemoryTrajectory, RunRecord, TrajectoryStore};
