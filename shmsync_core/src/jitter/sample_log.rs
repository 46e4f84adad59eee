//! Fixed-size log of counter samples shared between one appender and one
//! consumer.
//!
//! The appender writes slots in order and publishes the new length with a
//! release store; once the log is full further appends are dropped. The
//! consumer waits for a full log, reads it once and marks it consumed so a
//! recorder in another process knows it may remove the region.

use crate::error::{ShmSyncError, ShmSyncResult};
use crate::memory::{shm_jitter_dir, ShmRegion};
use std::mem;
use std::path::Path;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::scheduling::StopSignal;

/// "SHMJ"
const JITTER_MAGIC: u32 = 0x5348_4D4A;
pub const MAX_JITTER_SAMPLES: usize = 1 << 24;

#[repr(C, align(64))]
struct JitterHeader {
    magic: AtomicU32,
    capacity: AtomicU32,
    consumed: AtomicBool,
    period_ns: AtomicU64,
    len: AtomicU64,
}

struct Inner {
    region: ShmRegion,
    header: NonNull<JitterHeader>,
    slots: NonNull<AtomicU64>,
    capacity: usize,
}

unsafe impl Send for Inner {}
unsafe impl Sync for Inner {}

#[derive(Clone)]
pub struct JitterLog {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for JitterLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JitterLog")
            .field("capacity", &self.inner.capacity)
            .field("len", &self.len())
            .field("path", &self.inner.region.path())
            .finish()
    }
}

impl JitterLog {
    pub fn required_size(samples: usize) -> ShmSyncResult<usize> {
        samples
            .checked_mul(mem::size_of::<AtomicU64>())
            .and_then(|bytes| bytes.checked_add(mem::size_of::<JitterHeader>()))
            .ok_or_else(|| ShmSyncError::resource_exhausted("jitter log size overflows"))
    }

    pub fn allocate(samples: usize) -> ShmSyncResult<Self> {
        check_samples(samples)?;
        Self::initialize(ShmRegion::anonymous(Self::required_size(samples)?)?, samples, None)
    }

    /// Create a named log for a consumer in another process. The recording
    /// period is stored in the header so the consumer can analyse against it.
    pub fn create(name: &str, samples: usize, period: Duration) -> ShmSyncResult<Self> {
        Self::create_in(&shm_jitter_dir(), name, samples, period)
    }

    pub fn create_in(
        dir: &Path,
        name: &str,
        samples: usize,
        period: Duration,
    ) -> ShmSyncResult<Self> {
        check_samples(samples)?;
        let region = ShmRegion::create_in(dir, name, Self::required_size(samples)?)?;
        Self::initialize(region, samples, Some(period))
    }

    pub fn attach(name: &str) -> ShmSyncResult<Self> {
        Self::attach_in(&shm_jitter_dir(), name)
    }

    pub fn attach_in(dir: &Path, name: &str) -> ShmSyncResult<Self> {
        let region = ShmRegion::open_in(dir, name)?;
        if region.size() < mem::size_of::<JitterHeader>() {
            return Err(ShmSyncError::layout("region too small for a jitter log"));
        }
        let header = unsafe { &*(region.as_ptr() as *const JitterHeader) };
        if header.magic.load(Ordering::Acquire) != JITTER_MAGIC {
            return Err(ShmSyncError::layout("bad magic, jitter log not initialized"));
        }
        let capacity = header.capacity.load(Ordering::Relaxed) as usize;
        check_samples(capacity).map_err(|e| ShmSyncError::incompatible(e.to_string()))?;
        Self::from_region(region, capacity).map_err(|e| match e {
            ShmSyncError::Layout(reason) => ShmSyncError::Incompatible(reason),
            e => e,
        })
    }

    fn initialize(
        region: ShmRegion,
        samples: usize,
        period: Option<Duration>,
    ) -> ShmSyncResult<Self> {
        let log = Self::from_region(region, samples)?;
        let header = log.header();
        header.capacity.store(samples as u32, Ordering::Relaxed);
        let period_ns = period.map_or(0, |p| u64::try_from(p.as_nanos()).unwrap_or(u64::MAX));
        header.period_ns.store(period_ns, Ordering::Relaxed);
        header.magic.store(JITTER_MAGIC, Ordering::Release);
        log::debug!("Jitter log ready for {} samples", samples);
        Ok(log)
    }

    fn from_region(region: ShmRegion, capacity: usize) -> ShmSyncResult<Self> {
        if region.size() < Self::required_size(capacity)? {
            return Err(ShmSyncError::layout(format!(
                "region of {} bytes cannot hold {} samples",
                region.size(),
                capacity
            )));
        }
        let base = region.as_ptr();
        let header = NonNull::new(base as *mut JitterHeader)
            .ok_or_else(|| ShmSyncError::layout("null region base"))?;
        let slots = NonNull::new(unsafe { base.add(mem::size_of::<JitterHeader>()) } as *mut AtomicU64)
            .ok_or_else(|| ShmSyncError::layout("null slot pointer"))?;
        Ok(Self {
            inner: Arc::new(Inner {
                region,
                header,
                slots,
                capacity,
            }),
        })
    }

    fn header(&self) -> &JitterHeader {
        unsafe { self.inner.header.as_ref() }
    }

    fn slots(&self) -> &[AtomicU64] {
        unsafe { std::slice::from_raw_parts(self.inner.slots.as_ptr(), self.inner.capacity) }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn len(&self) -> usize {
        self.header().len.load(Ordering::Acquire) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.inner.capacity
    }

    /// Recording period stored by the creator, if any
    pub fn nominal_period(&self) -> Option<Duration> {
        match self.header().period_ns.load(Ordering::Relaxed) {
            0 => None,
            ns => Some(Duration::from_nanos(ns)),
        }
    }

    pub fn mark_consumed(&self) {
        self.header().consumed.store(true, Ordering::Release);
    }

    pub fn is_consumed(&self) -> bool {
        self.header().consumed.load(Ordering::Acquire)
    }

    /// Poll until a consumer has marked the log. False if `stop` was raised first.
    pub fn wait_consumed(&self, stop: &StopSignal, poll: Duration) -> bool {
        while !self.is_consumed() {
            if stop.is_stopped() {
                return false;
            }
            std::thread::sleep(poll);
        }
        true
    }

    /// Append one sample. False once the log is full.
    ///
    /// Only one thread may append.
    pub fn push(&self, sample: u64) -> bool {
        let header = self.header();
        let index = header.len.load(Ordering::Relaxed) as usize;
        if index >= self.inner.capacity {
            return false;
        }
        self.slots()[index].store(sample, Ordering::Relaxed);
        header.len.store(index as u64 + 1, Ordering::Release);
        true
    }

    /// The samples, if the log is full
    pub fn snapshot(&self) -> Option<Vec<u64>> {
        if !self.is_full() {
            return None;
        }
        Some(self.slots().iter().map(|s| s.load(Ordering::Relaxed)).collect())
    }

    /// Poll until the log is full. `None` if `stop` was raised first.
    pub fn wait_full(&self, stop: &StopSignal, poll: Duration) -> Option<Vec<u64>> {
        loop {
            if let Some(samples) = self.snapshot() {
                return Some(samples);
            }
            if stop.is_stopped() {
                return None;
            }
            std::thread::sleep(poll);
        }
    }
}

fn check_samples(samples: usize) -> ShmSyncResult<()> {
    if samples < 2 {
        return Err(ShmSyncError::config("a jitter log needs at least two samples"));
    }
    if samples > MAX_JITTER_SAMPLES {
        return Err(ShmSyncError::resource_exhausted(format!(
            "{} samples exceeds the maximum of {}",
            samples, MAX_JITTER_SAMPLES
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_until_full() {
        let log = JitterLog::allocate(3).unwrap();
        assert!(log.is_empty());
        assert!(log.snapshot().is_none());

        assert!(log.push(10));
        assert!(log.push(20));
        assert!(log.push(30));
        assert!(!log.push(40));

        assert!(log.is_full());
        assert_eq!(log.snapshot().unwrap(), vec![10, 20, 30]);
    }

    #[test]
    fn test_wait_full_honours_stop() {
        let log = JitterLog::allocate(4).unwrap();
        let stop = StopSignal::new();
        stop.stop();
        assert!(log.wait_full(&stop, Duration::from_millis(1)).is_none());
    }

    #[test]
    fn test_named_log_visible_to_peer() {
        let dir = tempfile::tempdir().unwrap();
        let period = Duration::from_micros(250);
        let log = JitterLog::create_in(dir.path(), "jit", 2, period).unwrap();
        let peer = JitterLog::attach_in(dir.path(), "jit").unwrap();
        assert_eq!(peer.capacity(), 2);
        assert_eq!(peer.nominal_period(), Some(period));

        log.push(1);
        log.push(2);
        assert_eq!(peer.snapshot().unwrap(), vec![1, 2]);

        assert!(!log.is_consumed());
        peer.mark_consumed();
        assert!(log.wait_consumed(&StopSignal::new(), Duration::from_millis(1)));
    }

    #[test]
    fn test_private_log_has_no_period_and_wait_consumed_honours_stop() {
        let log = JitterLog::allocate(2).unwrap();
        assert_eq!(log.nominal_period(), None);

        let stop = StopSignal::new();
        stop.stop();
        assert!(!log.wait_consumed(&stop, Duration::from_millis(1)));
    }

    #[test]
    fn test_attach_rejects_corrupt_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let log = JitterLog::create_in(dir.path(), "bad", 4, Duration::from_micros(100)).unwrap();
        log.header().capacity.store(1, Ordering::Relaxed);
        assert!(matches!(
            JitterLog::attach_in(dir.path(), "bad"),
            Err(ShmSyncError::Incompatible(_))
        ));
    }

    #[test]
    fn test_sample_bounds() {
        assert!(JitterLog::allocate(1).is_err());
        assert!(JitterLog::allocate(MAX_JITTER_SAMPLES + 1)
            .unwrap_err()
            .is_resource_exhausted());
    }
}
