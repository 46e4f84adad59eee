//! # SHMSYNC
//!
//! A periodic realtime writer and a best-effort polling reader exchanging a
//! fixed-size integer array through shared memory, without either side ever
//! blocking on the other.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use shmsync::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let config = ExchangeConfig::peterson_busy_poll().with_cycles(5_000);
//!     let report = ExchangeSession::run(&config, &StopSignal::new())?;
//!     println!("{}", report);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Three exclusion strategies**: Peterson, test-and-set, head/tail counters
//! - **Torn-read detection** on every successful read
//! - **Cross-process roles** over a named, file-backed region
//! - **Jitter instrument** for periodic release latency

// Re-export core components
pub use shmsync_core::{self, *};

/// The SHMSYNC prelude - everything you need to get started
pub mod prelude {
    // Node model
    pub use shmsync_core::core::{Node, NodeInfo, NodeState};

    // Exchange
    pub use shmsync_core::consistency::{Algorithm, Outcome, ReaderEndpoint, WriterEndpoint};
    pub use shmsync_core::exchange::{ExchangeReport, ExchangeSession};
    pub use shmsync_core::memory::SharedBuffer;

    // Configuration and scheduling
    pub use shmsync_core::config::{ExchangeConfig, JitterConfig};
    pub use shmsync_core::scheduling::{PeriodicOptions, PeriodicTask, StopSignal};

    // Error types
    pub use shmsync_core::error::{ShmSyncError, ShmSyncResult};
    pub type Result<T> = ShmSyncResult<T>;

    // Common std types
    pub use std::sync::Arc;
    pub use std::time::{Duration, Instant};

    // Common traits
    pub use serde::{Deserialize, Serialize};

    // Re-export anyhow for error handling
    pub use anyhow::{anyhow, bail, ensure, Context, Result as AnyResult};
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get SHMSYNC version
pub fn version() -> &'static str {
    VERSION
}
