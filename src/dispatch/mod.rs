//! Run dispatch: executing evaluations for a batch of individuals.
//!
//! # Dispatchers
//!
//! - [`InlineDispatcher`]: sequential, on the calling thread
//! - [`ParallelDispatcher`]: rayon thread pool (feature `parallel`)
//! - [`FileDispatcher`]: input files out, sentinel files back, polled with
//!   [`wait_for_keys`]; [`FileWorker`] is the evaluating side
//!
//! Every dispatcher isolates failures per run: an evaluation that errors or
//! panics yields [`FitnessOutcome::Failed`](crate::base::FitnessOutcome::Failed)
//! for that run-id only.

mod file;
mod inline;
mod poll;
mod types;

pub use file::{FileDispatcher, FileLayout, FileWorker, JobLauncher, NoopLauncher, RunInput, RunOutput};
#[cfg(feature = "parallel")]
pub use inline::ParallelDispatcher;
pub use inline::InlineDispatcher;
pub use poll::{wait_for_keys, PollPolicy};
pub use types::{DispatchContext, DispatchError, DispatchResults, Dispatcher};
