//! Whole-scenario drivers.
//!
//! [`ExchangeSession::run`] keeps both sides in one process. The role
//! functions split them across processes through a named region: the writer
//! creates it and the reader attaches.

use super::reader::ConsistencyReader;
use super::report::ExchangeReport;
use super::writer::HeartbeatWriter;
use crate::config::ExchangeConfig;
use crate::consistency::WriteStats;
use crate::error::{ShmSyncError, ShmSyncResult};
use crate::memory::SharedBuffer;
use crate::scheduling::{
    pin_to_cpu, PeriodicOptions, PeriodicTask, PollingLoop, StopSignal, TaskStats,
};
use std::thread;
use std::time::{Duration, Instant};

const ATTACH_RETRY: Duration = Duration::from_millis(100);

pub struct ExchangeSession;

impl ExchangeSession {
    /// Run writer and reader against one private buffer.
    ///
    /// The writer ticks on its own thread; the reader polls on another until
    /// the writer has run its cycles or `stop` is raised. The buffer is freed
    /// once both have finished.
    pub fn run(config: &ExchangeConfig, stop: &StopSignal) -> ShmSyncResult<ExchangeReport> {
        config.validate()?;
        let buffer = SharedBuffer::allocate(config.algorithm, config.payload_len)?;
        let writer = HeartbeatWriter::attach(&buffer)?;
        let mut reader = ConsistencyReader::attach(&buffer)?;

        log::info!(
            "Exchange: {} over {} elements, writer at {:.0} Hz for {}",
            config.algorithm,
            config.payload_len,
            config.writer_rate_hz(),
            config
                .cycles
                .map_or_else(|| "ever".to_string(), |c| format!("{} cycles", c))
        );

        let start = Instant::now();
        let options = PeriodicOptions::new(StopSignal::new())
            .with_cycle_limit(config.cycles)
            .with_realtime(config.writer_realtime.clone());
        let task = PeriodicTask::spawn(writer, config.writer_period(), options)?;

        let poll_interval = config.reader_poll_interval();
        let polled = thread::scope(|scope| {
            let task = &task;
            let reader = &mut reader;
            thread::Builder::new()
                .name("shmsync-reader".to_string())
                .spawn_scoped(scope, move || {
                    if let Some(cpu) = config.reader_cpu {
                        if let Err(e) = pin_to_cpu(cpu) {
                            log::warn!("[consistency_reader] CPU pinning not applied: {}", e);
                        }
                    }
                    PollingLoop::run_until(reader, poll_interval, || {
                        stop.is_stopped() || task.is_finished()
                    })
                })
                .map_err(|e| ShmSyncError::Internal(format!("failed to spawn reader: {}", e)))?
                .join()
                .map_err(|_| ShmSyncError::Internal("reader thread panicked".to_string()))?
        })?;

        task.stop();
        let (writer, writer_task) = task.join()?;

        let report = ExchangeReport {
            algorithm: config.algorithm,
            payload_len: config.payload_len,
            reads: reader.stats(),
            writes: writer.stats(),
            writer_task: Some(writer_task),
            reader_polls: polled.polls,
            elapsed_secs: start.elapsed().as_secs_f64(),
            last_heartbeat: reader.last_heartbeat(),
        };
        log_report(&report);
        Ok(report)
    }
}

/// Create the named region and run the periodic writer until its cycles are
/// done or `stop` is raised. The region is removed on return.
pub fn run_writer_role(
    config: &ExchangeConfig,
    stop: &StopSignal,
) -> ShmSyncResult<(WriteStats, TaskStats)> {
    config.validate()?;
    let buffer = SharedBuffer::create(&config.region_name, config.algorithm, config.payload_len)?;
    let writer = HeartbeatWriter::attach(&buffer)?;

    let options = PeriodicOptions::new(stop.clone())
        .with_cycle_limit(config.cycles)
        .with_realtime(config.writer_realtime.clone());
    let task = PeriodicTask::spawn(writer, config.writer_period(), options)?;
    let (writer, task_stats) = task.join()?;

    let stats = writer.stats();
    log::info!(
        "Writer finished: {}/{} made/missed over {} cycles",
        stats.made_writes,
        stats.missed_writes,
        task_stats.cycles
    );
    Ok((stats, task_stats))
}

/// Attach to the named region, waiting for a writer to create it, and poll
/// until `stop` is raised.
pub fn run_reader_role(config: &ExchangeConfig, stop: &StopSignal) -> ShmSyncResult<ExchangeReport> {
    config.validate()?;
    let buffer = attach_when_ready(config, stop)?;
    let mut reader = ConsistencyReader::attach(&buffer)?;

    if let Some(cpu) = config.reader_cpu {
        if let Err(e) = pin_to_cpu(cpu) {
            log::warn!("[consistency_reader] CPU pinning not applied: {}", e);
        }
    }

    let start = Instant::now();
    let polled = PollingLoop::run(&mut reader, stop, config.reader_poll_interval())?;

    let report = ExchangeReport {
        algorithm: config.algorithm,
        payload_len: buffer.payload_len(),
        reads: reader.stats(),
        writes: reader.writer_stats(),
        writer_task: None,
        reader_polls: polled.polls,
        elapsed_secs: start.elapsed().as_secs_f64(),
        last_heartbeat: reader.last_heartbeat(),
    };
    log_report(&report);
    Ok(report)
}

fn attach_when_ready(config: &ExchangeConfig, stop: &StopSignal) -> ShmSyncResult<SharedBuffer> {
    let what = format!("a writer on region '{}'", config.region_name);
    stop.retry_until_ready(&what, ATTACH_RETRY, || {
        SharedBuffer::attach(&config.region_name, config.algorithm)
    })
}

fn log_report(report: &ExchangeReport) {
    log::info!(
        "reads made/missed/inconsistent: {}/{}/{}",
        report.reads.made_reads,
        report.reads.missed_reads,
        report.reads.inconsistent
    );
    log::info!(
        "writes made/missed: {}/{}",
        report.writes.made_writes,
        report.writes.missed_writes
    );
    if report.reads.inconsistent > 0 {
        log::warn!(
            "{} inconsistent reads under {}",
            report.reads.inconsistent,
            report.algorithm
        );
    }
}
