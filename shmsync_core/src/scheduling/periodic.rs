//! Periodic execution on a dedicated thread.
//!
//! Releases sit on a fixed grid `start + k * period`, so lateness in one
//! cycle never shifts the next. When a tick finishes after the following
//! release, the releases already in the past are skipped and counted as
//! overruns; a late node never gets a burst of catch-up ticks.

use super::realtime::apply_realtime;
use super::stop::StopSignal;
use crate::config::RealtimeConfig;
use crate::core::{Node, NodeInfo, NodeState};
use crate::error::{ShmSyncError, ShmSyncResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Remaining time below which the thread spins instead of sleeping
pub const DEFAULT_SPIN_THRESHOLD: Duration = Duration::from_micros(50);

/// Longest single sleep, bounds how late a stop request is noticed
const MAX_SLEEP_SLICE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct PeriodicOptions {
    /// Ticks to run before stopping on its own
    pub cycles: Option<u64>,
    pub realtime: RealtimeConfig,
    pub stop: StopSignal,
    pub spin_threshold: Duration,
    pub logging: bool,
}

impl PeriodicOptions {
    pub fn new(stop: StopSignal) -> Self {
        Self {
            cycles: None,
            realtime: RealtimeConfig::default(),
            stop,
            spin_threshold: DEFAULT_SPIN_THRESHOLD,
            logging: true,
        }
    }

    pub fn with_cycles(mut self, cycles: u64) -> Self {
        self.cycles = Some(cycles);
        self
    }

    pub fn with_cycle_limit(mut self, cycles: Option<u64>) -> Self {
        self.cycles = cycles;
        self
    }

    pub fn with_realtime(mut self, realtime: RealtimeConfig) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn with_spin_threshold(mut self, spin_threshold: Duration) -> Self {
        self.spin_threshold = spin_threshold;
        self
    }

    pub fn with_logging(mut self, logging: bool) -> Self {
        self.logging = logging;
        self
    }
}

impl Default for PeriodicOptions {
    fn default() -> Self {
        Self::new(StopSignal::new())
    }
}

/// Timing summary of a finished periodic task
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStats {
    /// Ticks executed
    pub cycles: u64,
    /// Releases skipped because a tick ran past them
    pub overruns: u64,
    /// Worst delay between a release and the start of its tick
    pub max_lateness_us: f64,
    /// Mean time spent inside a tick
    #[serde(default)]
    pub avg_tick_us: f64,
    #[serde(default)]
    pub max_tick_us: f64,
    pub elapsed_secs: f64,
}

impl fmt::Display for TaskStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cycles, {} overruns, worst lateness {:.1} us, tick avg {:.1} us max {:.1} us",
            self.cycles, self.overruns, self.max_lateness_us, self.avg_tick_us, self.max_tick_us
        )
    }
}

/// A node ticking on its own thread, handed back by [`PeriodicTask::join`]
pub struct PeriodicTask<N: Node + 'static> {
    name: &'static str,
    handle: Option<JoinHandle<ShmSyncResult<(N, TaskStats)>>>,
    stop: StopSignal,
    finished: Arc<AtomicBool>,
}

impl<N: Node + 'static> PeriodicTask<N> {
    /// Start ticking `node` every `period`.
    ///
    /// Returns once the thread has applied its realtime settings and the
    /// node's `init` succeeded; either failure is returned here.
    pub fn spawn(node: N, period: Duration, options: PeriodicOptions) -> ShmSyncResult<Self> {
        if period.is_zero() {
            return Err(ShmSyncError::config("period must be positive"));
        }

        let name = node.name();
        let stop = options.stop.clone();
        let finished = Arc::new(AtomicBool::new(false));
        let thread_finished = finished.clone();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<ShmSyncResult<()>>(1);

        let handle = thread::Builder::new()
            .name(format!("shmsync-{}", name))
            .spawn(move || run_periodic(node, period, options, ready_tx, thread_finished))
            .map_err(|e| ShmSyncError::Internal(format!("failed to spawn '{}': {}", name, e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                log::info!(
                    "Periodic task '{}' started ({:.1} Hz)",
                    name,
                    1.0 / period.as_secs_f64()
                );
                Ok(Self {
                    name,
                    handle: Some(handle),
                    stop,
                    finished,
                })
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => Err(match handle.join() {
                Ok(Err(e)) => e,
                _ => ShmSyncError::Internal(format!("periodic task '{}' died during startup", name)),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True once the loop has exited, by cycle limit or stop request
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Wait for the loop to end and take the node back
    pub fn join(mut self) -> ShmSyncResult<(N, TaskStats)> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| ShmSyncError::Internal(format!("task '{}' already joined", self.name)))?;
        handle
            .join()
            .map_err(|_| ShmSyncError::Internal(format!("periodic task '{}' panicked", self.name)))?
    }
}

impl<N: Node + 'static> Drop for PeriodicTask<N> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.stop.stop();
            let _ = handle.join();
        }
    }
}

fn run_periodic<N: Node>(
    mut node: N,
    period: Duration,
    options: PeriodicOptions,
    ready: mpsc::SyncSender<ShmSyncResult<()>>,
    finished: Arc<AtomicBool>,
) -> ShmSyncResult<(N, TaskStats)> {
    let mut ctx = NodeInfo::new(node.name(), options.logging);
    ctx.set_state(NodeState::Initializing);

    let startup = apply_realtime(&options.realtime, node.name()).and_then(|_| node.init(&mut ctx));
    if let Err(e) = startup {
        ctx.transition_to_error(format!("startup failed: {}", e));
        finished.store(true, Ordering::Release);
        let _ = ready.send(Err(e));
        return Err(ShmSyncError::Internal(format!(
            "periodic task '{}' failed to start",
            node.name()
        )));
    }
    ctx.set_state(NodeState::Running);
    let _ = ready.send(Ok(()));

    let stop = &options.stop;
    let start = Instant::now();
    let mut release = start;
    let mut stats = TaskStats::default();

    while !stop.is_stopped() && options.cycles.map_or(true, |limit| stats.cycles < limit) {
        if !wait_until(release, options.spin_threshold, stop) {
            break;
        }

        let lateness = release.elapsed();
        ctx.start_tick();
        node.tick(&mut ctx);
        ctx.record_tick();
        stats.cycles += 1;
        stats.max_lateness_us = stats.max_lateness_us.max(lateness.as_secs_f64() * 1e6);

        let (next, skipped) = next_release(release, Instant::now(), period);
        release = next;
        if skipped > 0 {
            stats.overruns = stats.overruns.saturating_add(skipped);
            log::debug!("[{}] overran {} release(s)", node.name(), skipped);
        }
    }

    stats.elapsed_secs = start.elapsed().as_secs_f64();
    stats.avg_tick_us = ctx.metrics().avg_tick_duration_us;
    stats.max_tick_us = ctx.metrics().max_tick_duration_us;
    finished.store(true, Ordering::Release);

    ctx.set_state(NodeState::Stopping);
    node.shutdown(&mut ctx)?;
    ctx.set_state(NodeState::Stopped);

    log::info!(
        "Periodic task '{}' stopped after {} cycles ({} overruns)",
        node.name(),
        stats.cycles,
        stats.overruns
    );
    Ok((node, stats))
}

/// The release following `release`, plus the releases skipped because `now`
/// is already past it. A late tick resumes on the original timeline.
fn next_release(release: Instant, now: Instant, period: Duration) -> (Instant, u64) {
    if let Some(next) = release.checked_add(period) {
        if next >= now {
            return (next, 0);
        }
    }

    let period_ns = u64::try_from(period.as_nanos()).unwrap_or(u64::MAX).max(1);
    let late = now.saturating_duration_since(release);
    let late_ns = u64::try_from(late.as_nanos()).unwrap_or(u64::MAX);
    // releases at or before `now`, not counting `release` itself
    let passed = late_ns / period_ns;
    let next = passed
        .checked_add(1)
        .and_then(|steps| period_ns.checked_mul(steps))
        .and_then(|ns| release.checked_add(Duration::from_nanos(ns)))
        .unwrap_or_else(|| now.checked_add(period).unwrap_or(now));
    (next, passed)
}

/// Sleep, then spin, until `deadline`. False if stopped while waiting.
fn wait_until(deadline: Instant, spin_threshold: Duration, stop: &StopSignal) -> bool {
    loop {
        if stop.is_stopped() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        let remaining = deadline - now;
        if remaining > spin_threshold {
            thread::sleep((remaining - spin_threshold).min(MAX_SLEEP_SLICE));
        } else {
            std::hint::spin_loop();
        }
    }
}
