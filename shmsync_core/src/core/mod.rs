//! # Core node types for SHMSYNC
//!
//! - **Node**: a unit of work driven by a scheduler, one `tick` at a time
//! - **NodeInfo**: the per-node context handed to every lifecycle call
//!
//! ## Node Lifecycle
//!
//! 1. **Construction** - the node is built around its endpoint
//! 2. **Initialization** - `init()` runs once on the executing thread
//! 3. **Execution** - `tick()` is called by a periodic task or a polling loop
//! 4. **Shutdown** - `shutdown()` runs once after the last tick

pub mod node;

pub use node::{Node, NodeInfo, NodeMetrics, NodeState};
