//! Realtime settings for the calling thread.
//!
//! On Linux these act on the calling thread only, so a periodic task applies
//! them from inside its own thread before the first tick.

use crate::config::RealtimeConfig;
use crate::error::{ShmSyncError, ShmSyncResult};

/// Set SCHED_FIFO with the given priority (1-99, higher = more important)
///
/// # Requirements
/// - CAP_SYS_NICE capability or root
/// - An RT-PREEMPT kernel for bounded latency
pub fn set_realtime_priority(priority: i32) -> ShmSyncResult<()> {
    if !(1..=99).contains(&priority) {
        return Err(ShmSyncError::config("Priority must be between 1 and 99"));
    }

    #[cfg(target_os = "linux")]
    unsafe {
        use libc::{sched_param, sched_setscheduler, SCHED_FIFO};

        let param = sched_param {
            sched_priority: priority,
        };

        if sched_setscheduler(0, SCHED_FIFO, &param) != 0 {
            let err = std::io::Error::last_os_error();
            return Err(ShmSyncError::Internal(format!(
                "Failed to set real-time priority: {}. Ensure CAP_SYS_NICE capability.",
                err
            )));
        }

        log::info!("Real-time priority set to {} (SCHED_FIFO)", priority);
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    {
        Err(ShmSyncError::Unsupported(
            "Real-time priority scheduling is only supported on Linux".to_string(),
        ))
    }
}

/// Pin the calling thread to one CPU core
pub fn pin_to_cpu(cpu_id: usize) -> ShmSyncResult<()> {
    let available = num_cpus::get();
    if cpu_id >= available {
        return Err(ShmSyncError::config(format!(
            "CPU {} out of range (0-{})",
            cpu_id,
            available.saturating_sub(1)
        )));
    }

    #[cfg(target_os = "linux")]
    unsafe {
        use libc::{cpu_set_t, sched_setaffinity, CPU_SET, CPU_ZERO};

        let mut cpuset: cpu_set_t = std::mem::zeroed();
        CPU_ZERO(&mut cpuset);
        CPU_SET(cpu_id, &mut cpuset);

        if sched_setaffinity(0, std::mem::size_of::<cpu_set_t>(), &cpuset) != 0 {
            let err = std::io::Error::last_os_error();
            return Err(ShmSyncError::Internal(format!(
                "Failed to set CPU affinity: {}",
                err
            )));
        }

        log::debug!("Thread pinned to CPU core {}", cpu_id);
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    {
        Err(ShmSyncError::Unsupported(
            "CPU pinning is only supported on Linux".to_string(),
        ))
    }
}

/// Lock all current and future pages of the process into RAM
///
/// # Requirements
/// - Sufficient locked memory limit (ulimit -l)
/// - CAP_IPC_LOCK capability or root
pub fn lock_memory() -> ShmSyncResult<()> {
    #[cfg(target_os = "linux")]
    unsafe {
        use libc::{mlockall, MCL_CURRENT, MCL_FUTURE};

        if mlockall(MCL_CURRENT | MCL_FUTURE) != 0 {
            let err = std::io::Error::last_os_error();
            return Err(ShmSyncError::Internal(format!(
                "Failed to lock memory: {}. Check ulimit -l and CAP_IPC_LOCK.",
                err
            )));
        }

        log::info!("Memory locked (no page faults)");
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    {
        Err(ShmSyncError::Unsupported(
            "Memory locking is only supported on Linux".to_string(),
        ))
    }
}

/// Apply every setting in `config` to the calling thread.
///
/// Failures are logged and skipped unless `config.strict` is set, in which
/// case the first failure is returned.
pub fn apply_realtime(config: &RealtimeConfig, label: &str) -> ShmSyncResult<()> {
    let mut attempts: Vec<(&str, ShmSyncResult<()>)> = Vec::new();
    if let Some(cpu) = config.cpu {
        attempts.push(("CPU pinning", pin_to_cpu(cpu)));
    }
    if config.lock_memory {
        attempts.push(("memory locking", lock_memory()));
    }
    if let Some(priority) = config.priority {
        attempts.push(("realtime priority", set_realtime_priority(priority)));
    }

    for (setting, result) in attempts {
        if let Err(e) = result {
            if config.strict {
                return Err(e);
            }
            log::warn!("[{}] {} not applied: {}", label, setting, e);
        }
    }
    Ok(())
}
