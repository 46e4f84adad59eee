//! Cycle-counter access.
//!
//! On x86 and x86_64 this is the time-stamp counter. Elsewhere it falls back
//! to nanoseconds on the monotonic clock, so one "cycle" is one nanosecond.

use crate::error::{ShmSyncError, ShmSyncResult};
use std::time::{Duration, Instant};

#[cfg(target_arch = "x86_64")]
#[inline]
pub fn read_cycles() -> u64 {
    unsafe { std::arch::x86_64::_rdtsc() }
}

#[cfg(target_arch = "x86")]
#[inline]
pub fn read_cycles() -> u64 {
    unsafe { std::arch::x86::_rdtsc() }
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
#[inline]
pub fn read_cycles() -> u64 {
    use std::sync::OnceLock;
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

/// `later - earlier`, correct across one counter wrap
#[inline]
pub fn cycles_between(later: u64, earlier: u64) -> u64 {
    later.wrapping_sub(earlier)
}

/// Seconds per counter tick, measured over `window` of wall time.
///
/// Each end of the window reads the counter on both sides of the clock read
/// and uses the midpoint.
pub fn calibrate_secs_per_cycle(window: Duration) -> ShmSyncResult<f64> {
    let (start_wall, start_cycles) = bracketed_now();
    std::thread::sleep(window);
    let (end_wall, end_cycles) = bracketed_now();

    let elapsed = end_wall.duration_since(start_wall).as_secs_f64();
    let cycles = end_cycles - start_cycles;
    if cycles <= 0.0 || elapsed <= 0.0 {
        return Err(ShmSyncError::Internal(
            "cycle counter did not advance during calibration".to_string(),
        ));
    }

    let secs_per_cycle = elapsed / cycles;
    log::debug!(
        "Calibrated cycle counter: {:.3} MHz",
        1e-6 / secs_per_cycle
    );
    Ok(secs_per_cycle)
}

fn bracketed_now() -> (Instant, f64) {
    let before = read_cycles();
    let wall = Instant::now();
    let after = read_cycles();
    (wall, 0.5 * (before as f64 + after as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_advances() {
        let first = read_cycles();
        std::thread::sleep(Duration::from_millis(1));
        assert!(cycles_between(read_cycles(), first) > 0);
    }

    #[test]
    fn test_difference_across_wrap() {
        assert_eq!(cycles_between(5, u64::MAX - 4), 10);
        assert_eq!(cycles_between(100, 40), 60);
    }

    #[test]
    fn test_calibration_is_plausible() {
        let secs_per_cycle = calibrate_secs_per_cycle(Duration::from_millis(50)).unwrap();
        // between 10 MHz and 100 GHz
        assert!(secs_per_cycle > 1e-11 && secs_per_cycle < 1e-7);
    }
}
