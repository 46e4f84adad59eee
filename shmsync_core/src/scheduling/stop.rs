use crate::error::{ShmSyncError, ShmSyncResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Shared cancellation flag; clones observe the same flag
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Call `attach` until it succeeds, fails for good, or this signal is raised.
    ///
    /// Only errors for which [`ShmSyncError::is_not_ready`] holds are retried,
    /// sleeping `retry` in between. `what` names the awaited peer in the one
    /// log line emitted while waiting.
    pub fn retry_until_ready<T>(
        &self,
        what: &str,
        retry: Duration,
        mut attach: impl FnMut() -> ShmSyncResult<T>,
    ) -> ShmSyncResult<T> {
        let mut announced = false;
        loop {
            match attach() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_not_ready() && !self.is_stopped() => {
                    if !announced {
                        log::info!("Waiting for {} ({})", what, e);
                        announced = true;
                    }
                    thread::sleep(retry);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Raise this signal on Ctrl+C. A second Ctrl+C exits the process.
    ///
    /// Only one handler can be installed per process.
    pub fn install_ctrlc(&self) -> ShmSyncResult<()> {
        let flag = self.flag.clone();
        ctrlc::set_handler(move || {
            if flag.swap(true, Ordering::AcqRel) {
                log::warn!("Second interrupt, terminating");
                std::process::exit(130);
            }
            log::info!("Interrupt received, stopping");
        })
        .map_err(|e| ShmSyncError::Internal(format!("failed to install Ctrl+C handler: {}", e)))
    }
}
