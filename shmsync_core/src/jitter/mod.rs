//! # Scheduling-jitter instrument
//!
//! A periodic recorder appends one cycle-counter reading per period into a
//! fixed-size [`JitterLog`]; once the log is full a consumer turns the
//! readings into per-period deltas. The log follows the same rules as the
//! exchange buffer: allocated once, one appender, one consumer.
//!
//! [`run_jitter`] keeps both in one process. [`run_jitter_recorder`] and
//! [`run_jitter_reader`] split them across processes through a named log.

pub mod analysis;
pub mod sample_log;
pub mod recorder;
pub mod tsc;

pub use analysis::JitterAnalysis;
pub use sample_log::JitterLog;
pub use recorder::JitterRecorder;
pub use tsc::{calibrate_secs_per_cycle, cycles_between, read_cycles};

use crate::config::JitterConfig;
use crate::error::{ShmSyncError, ShmSyncResult};
use crate::scheduling::{PeriodicOptions, PeriodicTask, StopSignal, TaskStats};
use std::time::Duration;

pub const DEFAULT_CALIBRATION_WINDOW: Duration = Duration::from_millis(250);

const ATTACH_RETRY: Duration = Duration::from_millis(100);
const LOG_POLL: Duration = Duration::from_millis(10);

/// Record a full log in-process and analyse it.
///
/// The counter is calibrated while the recorder runs.
pub fn run_jitter(config: &JitterConfig, stop: &StopSignal) -> ShmSyncResult<JitterAnalysis> {
    config.validate()?;
    let recording = JitterLog::allocate(config.samples)?;

    let options = PeriodicOptions::new(stop.clone())
        .with_cycles(config.samples as u64)
        .with_realtime(config.realtime.clone());
    let task = PeriodicTask::spawn(JitterRecorder::new(recording.clone()), config.period(), options)?;

    let secs_per_cycle = calibrate_secs_per_cycle(DEFAULT_CALIBRATION_WINDOW)?;
    let (_, stats) = task.join()?;

    let samples = recording.snapshot().ok_or_else(|| {
        ShmSyncError::Internal(format!(
            "recording stopped after {} of {} samples",
            recording.len(),
            recording.capacity()
        ))
    })?;
    let analysis = JitterAnalysis::from_samples(&samples, secs_per_cycle, config.period())?;

    log::info!("Jitter: {} ({} overruns)", analysis, stats.overruns);
    Ok(analysis)
}

/// Record a full log into the named region and keep it until a reader has
/// consumed it or `stop` is raised. The region is removed on return.
pub fn run_jitter_recorder(
    config: &JitterConfig,
    stop: &StopSignal,
) -> ShmSyncResult<TaskStats> {
    config.validate()?;
    let recording = JitterLog::create(&config.region_name, config.samples, config.period())?;

    let options = PeriodicOptions::new(stop.clone())
        .with_cycles(config.samples as u64)
        .with_realtime(config.realtime.clone());
    let task = PeriodicTask::spawn(JitterRecorder::new(recording.clone()), config.period(), options)?;
    let (_, stats) = task.join()?;

    if !recording.is_full() {
        log::warn!(
            "Recording stopped after {} of {} samples",
            recording.len(),
            recording.capacity()
        );
    } else {
        log::info!(
            "Jitter log '{}' full ({} overruns), waiting for a reader",
            config.region_name,
            stats.overruns
        );
        if recording.wait_consumed(stop, LOG_POLL) {
            log::info!("Jitter log consumed");
        } else {
            log::warn!("Stopped before a reader consumed the jitter log");
        }
    }
    Ok(stats)
}

/// Attach to the named log, waiting for a recorder to create it, calibrate
/// the counter meanwhile and analyse the log once it is full.
///
/// Deltas are judged against the period the recorder stored, falling back
/// to `config.period_ns` for a log that carries none.
pub fn run_jitter_reader(
    config: &JitterConfig,
    stop: &StopSignal,
) -> ShmSyncResult<JitterAnalysis> {
    config.validate()?;
    let what = format!("a jitter recorder on region '{}'", config.region_name);
    let recording = stop.retry_until_ready(&what, ATTACH_RETRY, || {
        JitterLog::attach(&config.region_name)
    })?;

    let secs_per_cycle = calibrate_secs_per_cycle(DEFAULT_CALIBRATION_WINDOW)?;
    let samples = recording.wait_full(stop, LOG_POLL).ok_or_else(|| {
        ShmSyncError::Internal(format!(
            "stopped after {} of {} samples",
            recording.len(),
            recording.capacity()
        ))
    })?;
    recording.mark_consumed();

    let period = recording.nominal_period().unwrap_or_else(|| config.period());
    let analysis = JitterAnalysis::from_samples(&samples, secs_per_cycle, period)?;
    log::info!("Jitter from '{}': {}", config.region_name, analysis);
    Ok(analysis)
}
