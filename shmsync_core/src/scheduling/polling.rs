use super::stop::StopSignal;
use crate::core::{Node, NodeInfo, NodeState};
use crate::error::ShmSyncResult;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PollStats {
    pub polls: u64,
    pub elapsed_secs: f64,
}

/// Best-effort ticking on the calling thread
pub struct PollingLoop;

impl PollingLoop {
    /// Tick `node` until `stop` is raised.
    ///
    /// With no `poll_interval` the loop spins as fast as it can; otherwise it
    /// sleeps the interval after each tick.
    pub fn run<N: Node>(
        node: &mut N,
        stop: &StopSignal,
        poll_interval: Option<Duration>,
    ) -> ShmSyncResult<PollStats> {
        Self::run_until(node, poll_interval, || stop.is_stopped())
    }

    /// Tick `node` until `done` returns true. `done` is checked before every tick.
    pub fn run_until<N: Node, F: FnMut() -> bool>(
        node: &mut N,
        poll_interval: Option<Duration>,
        mut done: F,
    ) -> ShmSyncResult<PollStats> {
        let mut ctx = NodeInfo::new(node.name(), true);
        ctx.set_state(NodeState::Initializing);
        node.init(&mut ctx)?;
        ctx.set_state(NodeState::Running);

        let start = Instant::now();
        let mut stats = PollStats::default();
        while !done() {
            node.tick(&mut ctx);
            stats.polls += 1;
            if let Some(interval) = poll_interval {
                thread::sleep(interval);
            }
        }
        stats.elapsed_secs = start.elapsed().as_secs_f64();

        ctx.set_state(NodeState::Stopping);
        node.shutdown(&mut ctx)?;
        ctx.set_state(NodeState::Stopped);
        log::debug!("Polling loop '{}' ended after {} polls", node.name(), stats.polls);
        Ok(stats)
    }
}
