//! Status pollers and the per-screen scheduler that owns them.

mod scheduler;
mod sequence;
mod task;

pub use scheduler::ScreenScheduler;
pub use sequence::{SequenceGuard, SequenceSource};
pub use task::{fetch_with_timeout, spawn_poller, PollHandle, PollResult, PollerSpec};
