//! # SHMSYNC Core
//!
//! Lock-free data exchange between one periodic realtime writer and one
//! polling best-effort reader over shared memory.
//!
//! - **Memory**: zero-initialized regions and the exchange buffer laid over them
//! - **Consistency**: three non-blocking exclusion strategies (Peterson,
//!   test-and-set, head/tail generation counters)
//! - **Exchange**: the heartbeat writer, the auditing reader and their report
//! - **Scheduling**: periodic tasks, polling loops and realtime settings
//! - **Jitter**: a cycle-counter instrument for scheduling latency
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shmsync_core::{ExchangeConfig, ExchangeSession, StopSignal};
//!
//! let config = ExchangeConfig::head_tail_reference().with_cycles(10_000);
//! let report = ExchangeSession::run(&config, &StopSignal::new())?;
//! println!("{}", report);
//! # Ok::<(), shmsync_core::ShmSyncError>(())
//! ```

pub mod config;
pub mod consistency;
pub mod core;
pub mod error;
pub mod exchange;
pub mod jitter;
pub mod memory;
pub mod scheduling;

pub use crate::core::{Node, NodeInfo, NodeState};
pub use config::{ExchangeConfig, JitterConfig, RealtimeConfig};
pub use consistency::{
    Algorithm, Outcome, ReadStats, ReaderEndpoint, ResumeState, Role, WriteStats, WriterEndpoint,
};
pub use error::{ShmSyncError, ShmSyncResult};
pub use exchange::{
    run_reader_role, run_writer_role, ConsistencyReader, ExchangeReport, ExchangeSession,
    HeartbeatWriter,
};
pub use jitter::{run_jitter, run_jitter_reader, run_jitter_recorder, JitterAnalysis, JitterLog};
pub use memory::{SharedBuffer, ShmRegion};
pub use scheduling::{PeriodicOptions, PeriodicTask, PollingLoop, StopSignal, TaskStats};
