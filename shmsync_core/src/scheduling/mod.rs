//! # SHMSYNC Scheduling
//!
//! Two ways to drive a [`Node`](crate::core::Node):
//!
//! - **PeriodicTask**: a dedicated thread ticking the node once per period on
//!   an absolute-deadline timeline, optionally with realtime priority, CPU
//!   pinning and locked memory
//! - **PollingLoop**: best-effort ticking on the calling thread, as fast as
//!   possible or with a sleep between ticks
//!
//! Both stop on a shared [`StopSignal`], which Ctrl+C can raise.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shmsync_core::scheduling::{PeriodicOptions, PeriodicTask, StopSignal};
//!
//! let stop = StopSignal::new();
//! let task = PeriodicTask::spawn(writer, period, PeriodicOptions::new(stop.clone()).with_cycles(1000))?;
//! let (writer, stats) = task.join()?;
//! ```

pub mod periodic;
pub mod polling;
pub mod realtime;
pub mod stop;

pub use periodic::{PeriodicOptions, PeriodicTask, TaskStats};
pub use polling::{PollStats, PollingLoop};
pub use realtime::{apply_realtime, lock_memory, pin_to_cpu, set_realtime_priority};
pub use stop::StopSignal;
