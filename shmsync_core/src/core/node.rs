use crate::error::ShmSyncResult;
use std::fmt;
use std::time::Instant;

/// Node states for monitoring and lifecycle management
#[derive(Debug, Clone, PartialEq)]
pub enum NodeState {
    Uninitialized,
    Initializing,
    Running,
    Stopping,
    Stopped,
    Error(String),
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeState::Uninitialized => write!(f, "Uninitialized"),
            NodeState::Initializing => write!(f, "Initializing"),
            NodeState::Running => write!(f, "Running"),
            NodeState::Stopping => write!(f, "Stopping"),
            NodeState::Stopped => write!(f, "Stopped"),
            NodeState::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

/// Tick durations of one node, reported in
/// [`TaskStats`](crate::scheduling::TaskStats)
#[derive(Debug, Clone, Default)]
pub struct NodeMetrics {
    pub total_ticks: u64,
    pub avg_tick_duration_us: f64,
    pub max_tick_duration_us: f64,
}

/// Context handed to a node on every lifecycle call
#[derive(Debug)]
pub struct NodeInfo {
    name: String,
    state: NodeState,
    metrics: NodeMetrics,
    tick_start_time: Option<Instant>,
    logging_enabled: bool,
}

impl NodeInfo {
    pub fn new(node_name: impl Into<String>, logging_enabled: bool) -> Self {
        Self {
            name: node_name.into(),
            state: NodeState::Uninitialized,
            metrics: NodeMetrics::default(),
            tick_start_time: None,
            logging_enabled,
        }
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn set_state(&mut self, new_state: NodeState) {
        if self.state != new_state {
            log::debug!("[{}] {} -> {}", self.name, self.state, new_state);
            self.state = new_state;
        }
    }

    pub fn transition_to_error(&mut self, error_msg: String) {
        self.log_error(&error_msg);
        self.set_state(NodeState::Error(error_msg));
    }

    // Tick Management
    pub fn start_tick(&mut self) {
        self.tick_start_time = Some(Instant::now());
    }

    pub fn record_tick(&mut self) {
        let Some(start_time) = self.tick_start_time.take() else {
            return;
        };
        let duration_us = start_time.elapsed().as_secs_f64() * 1e6;
        let metrics = &mut self.metrics;

        metrics.total_ticks += 1;
        if duration_us > metrics.max_tick_duration_us {
            metrics.max_tick_duration_us = duration_us;
        }

        let total = metrics.avg_tick_duration_us * (metrics.total_ticks - 1) as f64;
        metrics.avg_tick_duration_us = (total + duration_us) / metrics.total_ticks as f64;
    }

    // Logging: forwarded to the `log` facade, prefixed with the node name
    pub fn log_info(&self, message: &str) {
        if self.logging_enabled {
            log::info!("[{}] {}", self.name, message);
        }
    }

    pub fn log_warning(&self, message: &str) {
        if self.logging_enabled {
            log::warn!("[{}] {}", self.name, message);
        }
    }

    pub fn log_error(&self, message: &str) {
        if self.logging_enabled {
            log::error!("[{}] {}", self.name, message);
        }
    }

    pub fn log_debug(&self, message: &str) {
        if self.logging_enabled {
            log::debug!("[{}] {}", self.name, message);
        }
    }

    // Getters
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn metrics(&self) -> &NodeMetrics {
        &self.metrics
    }
}

/// A unit of work driven one tick at a time by a scheduler
pub trait Node: Send {
    /// Get the node's name
    fn name(&self) -> &'static str;

    /// Initialize the node (called once on the executing thread)
    fn init(&mut self, ctx: &mut NodeInfo) -> ShmSyncResult<()> {
        ctx.log_debug("initialized");
        Ok(())
    }

    /// One unit of work. Must not block.
    fn tick(&mut self, ctx: &mut NodeInfo);

    /// Shutdown the node (called once after the last tick)
    fn shutdown(&mut self, ctx: &mut NodeInfo) -> ShmSyncResult<()> {
        ctx.log_debug("shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let mut info = NodeInfo::new("heartbeat_writer", false);
        assert_eq!(info.state(), &NodeState::Uninitialized);
        info.set_state(NodeState::Running);
        info.set_state(NodeState::Stopping);
        assert_eq!(info.state(), &NodeState::Stopping);
    }

    #[test]
    fn test_record_tick_updates_metrics() {
        let mut info = NodeInfo::new("heartbeat_writer", false);
        info.record_tick();
        assert_eq!(info.metrics().total_ticks, 0);

        for _ in 0..3 {
            info.start_tick();
            info.record_tick();
        }
        let metrics = info.metrics();
        assert_eq!(metrics.total_ticks, 3);
        assert!(metrics.avg_tick_duration_us <= metrics.max_tick_duration_us);
    }

    #[test]
    fn test_error_transition() {
        let mut info = NodeInfo::new("heartbeat_writer", false);
        info.transition_to_error("boom".to_string());
        assert_eq!(info.state().to_string(), "Error: boom");
    }
}
