use super::platform::shm_buffers_dir;
use super::shm_region::ShmRegion;
use crate::consistency::{Algorithm, Generation, PetersonFlags, Role, TasFlag, WriteStats};
use crate::error::{ShmSyncError, ShmSyncResult};
use std::mem;
use std::path::Path;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

/// "SHMS"
pub const BUFFER_MAGIC: u32 = 0x5348_4D53;
pub const LAYOUT_VERSION: u32 = 1;

pub const MIN_PAYLOAD_LEN: usize = 2;
pub const MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;

/// Header at the start of every exchange region, followed by the payload.
///
/// Every field is an atomic so a zero-filled mapping is already a valid,
/// idle header. Only the metadata block of the selected algorithm is used.
#[repr(C, align(64))]
pub struct BufferHeader {
    magic: AtomicU32,
    version: AtomicU32,
    algorithm: AtomicU32,
    payload_len: AtomicU32,
    writer_attached: AtomicBool,
    reader_attached: AtomicBool,
    pub(crate) peterson: PetersonFlags,
    pub(crate) tas: TasFlag,
    pub(crate) generation: Generation,
    made_writes: AtomicU64,
    missed_writes: AtomicU64,
}

impl BufferHeader {
    fn role_flag(&self, role: Role) -> &AtomicBool {
        match role {
            Role::Reader => &self.reader_attached,
            Role::Writer => &self.writer_attached,
        }
    }

    pub fn peterson(&self) -> &PetersonFlags {
        &self.peterson
    }

    pub fn tas(&self) -> &TasFlag {
        &self.tas
    }

    pub fn generation(&self) -> &Generation {
        &self.generation
    }
}

struct Inner {
    region: ShmRegion,
    header: NonNull<BufferHeader>,
    payload: NonNull<AtomicI32>,
    len: usize,
    algorithm: Algorithm,
}

// All access to the mapping goes through the atomics in the header and payload.
unsafe impl Send for Inner {}
unsafe impl Sync for Inner {}

/// The exchange block shared by exactly one writer and one reader.
///
/// Cloning is cheap and yields another handle on the same mapping; the
/// mapping is released when the last handle is dropped. Role exclusivity is
/// enforced by [`SharedBuffer::claim`], not by the number of handles.
#[derive(Clone)]
pub struct SharedBuffer {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedBuffer")
            .field("algorithm", &self.inner.algorithm)
            .field("payload_len", &self.inner.len)
            .field("region_size", &self.inner.region.size())
            .finish()
    }
}

impl SharedBuffer {
    /// Bytes needed for a header plus `payload_len` elements
    pub fn required_size(payload_len: usize) -> ShmSyncResult<usize> {
        payload_len
            .checked_mul(mem::size_of::<AtomicI32>())
            .and_then(|bytes| bytes.checked_add(mem::size_of::<BufferHeader>()))
            .ok_or_else(|| {
                ShmSyncError::resource_exhausted(format!(
                    "payload of {} elements overflows the address space",
                    payload_len
                ))
            })
    }

    /// Allocate a zeroed, process-private buffer
    pub fn allocate(algorithm: Algorithm, payload_len: usize) -> ShmSyncResult<Self> {
        check_payload_len(payload_len)?;
        let region = ShmRegion::anonymous(Self::required_size(payload_len)?)?;
        Self::initialize(region, algorithm, payload_len)
    }

    /// Create a named buffer other processes can attach to
    pub fn create(name: &str, algorithm: Algorithm, payload_len: usize) -> ShmSyncResult<Self> {
        Self::create_in(&shm_buffers_dir(), name, algorithm, payload_len)
    }

    /// Create a named buffer inside `dir`.
    ///
    /// A buffer still in use under the same name is left untouched: the call
    /// fails with `RoleTaken(Writer)` while its writer is attached, and with
    /// `InUse` while only other mappings remain.
    pub fn create_in(
        dir: &Path,
        name: &str,
        algorithm: Algorithm,
        payload_len: usize,
    ) -> ShmSyncResult<Self> {
        check_payload_len(payload_len)?;
        let region = ShmRegion::create_in(dir, name, Self::required_size(payload_len)?)
            .map_err(|e| match e {
                ShmSyncError::InUse(reason) => live_buffer_refusal(dir, name, reason),
                e => e,
            })?;
        Self::initialize(region, algorithm, payload_len)
    }

    /// Attach to a named buffer created by another process
    pub fn attach(name: &str, algorithm: Algorithm) -> ShmSyncResult<Self> {
        Self::validate(ShmRegion::open(name)?, algorithm)
    }

    pub fn attach_in(dir: &Path, name: &str, algorithm: Algorithm) -> ShmSyncResult<Self> {
        Self::validate(ShmRegion::open_in(dir, name)?, algorithm)
    }

    fn initialize(region: ShmRegion, algorithm: Algorithm, len: usize) -> ShmSyncResult<Self> {
        let buffer = Self::from_region(region, algorithm, len)?;
        let header = buffer.header();

        // The region is freshly zeroed; the magic goes in last so an attaching
        // peer never sees a half-written header as valid.
        header.version.store(LAYOUT_VERSION, Ordering::Relaxed);
        header.algorithm.store(algorithm.tag(), Ordering::Relaxed);
        header.payload_len.store(len as u32, Ordering::Relaxed);
        header.magic.store(BUFFER_MAGIC, Ordering::Release);

        log::info!(
            "Initialized {} exchange buffer: {} elements, {} bytes",
            algorithm,
            len,
            buffer.inner.region.size()
        );
        Ok(buffer)
    }

    fn validate(region: ShmRegion, algorithm: Algorithm) -> ShmSyncResult<Self> {
        if region.size() < mem::size_of::<BufferHeader>() {
            return Err(ShmSyncError::layout(format!(
                "region of {} bytes cannot hold a header",
                region.size()
            )));
        }

        let header = unsafe { &*(region.as_ptr() as *const BufferHeader) };
        if header.magic.load(Ordering::Acquire) != BUFFER_MAGIC {
            return Err(ShmSyncError::layout("bad magic, buffer not initialized"));
        }
        let version = header.version.load(Ordering::Relaxed);
        if version != LAYOUT_VERSION {
            return Err(ShmSyncError::incompatible(format!(
                "layout version {} (expected {})",
                version, LAYOUT_VERSION
            )));
        }

        let tag = header.algorithm.load(Ordering::Relaxed);
        match Algorithm::from_tag(tag) {
            Some(found) if found == algorithm => {}
            Some(found) => {
                return Err(ShmSyncError::incompatible(format!(
                    "buffer uses {}, requested {}",
                    found, algorithm
                )))
            }
            None => {
                return Err(ShmSyncError::incompatible(format!(
                    "unknown algorithm tag {}",
                    tag
                )))
            }
        }

        let len = header.payload_len.load(Ordering::Relaxed) as usize;
        check_payload_len(len).map_err(|e| ShmSyncError::incompatible(e.to_string()))?;
        let buffer = Self::from_region(region, algorithm, len).map_err(|e| match e {
            ShmSyncError::Layout(reason) => ShmSyncError::Incompatible(reason),
            e => e,
        })?;

        log::info!("Attached to {} exchange buffer: {} elements", algorithm, len);
        Ok(buffer)
    }

    fn from_region(region: ShmRegion, algorithm: Algorithm, len: usize) -> ShmSyncResult<Self> {
        let required = Self::required_size(len)?;
        if region.size() < required {
            return Err(ShmSyncError::layout(format!(
                "region holds {} bytes, {} elements need {}",
                region.size(),
                len,
                required
            )));
        }

        let base = region.as_ptr();
        if (base as usize) % mem::align_of::<BufferHeader>() != 0 {
            return Err(ShmSyncError::layout("region base is not cache-line aligned"));
        }

        let header = NonNull::new(base as *mut BufferHeader)
            .ok_or_else(|| ShmSyncError::layout("null region base"))?;
        let payload = NonNull::new(unsafe { base.add(mem::size_of::<BufferHeader>()) } as *mut AtomicI32)
            .ok_or_else(|| ShmSyncError::layout("null payload pointer"))?;

        Ok(Self {
            inner: Arc::new(Inner {
                region,
                header,
                payload,
                len,
                algorithm,
            }),
        })
    }

    pub fn header(&self) -> &BufferHeader {
        unsafe { self.inner.header.as_ref() }
    }

    /// The shared payload, element by element
    pub fn payload(&self) -> &[AtomicI32] {
        unsafe { std::slice::from_raw_parts(self.inner.payload.as_ptr(), self.inner.len) }
    }

    pub fn payload_len(&self) -> usize {
        self.inner.len
    }

    pub fn algorithm(&self) -> Algorithm {
        self.inner.algorithm
    }

    pub fn region(&self) -> &ShmRegion {
        &self.inner.region
    }

    /// Copy the shared payload into `dst`. No protection of its own.
    pub(crate) fn copy_out(&self, dst: &mut [i32]) {
        debug_assert_eq!(dst.len(), self.inner.len);
        for (slot, value) in self.payload().iter().zip(dst.iter_mut()) {
            *value = slot.load(Ordering::Relaxed);
        }
    }

    /// Copy `src` into the shared payload. No protection of its own.
    pub(crate) fn copy_in(&self, src: &[i32]) {
        debug_assert_eq!(src.len(), self.inner.len);
        for (slot, &value) in self.payload().iter().zip(src.iter()) {
            slot.store(value, Ordering::Relaxed);
        }
    }

    pub(crate) fn store_write_stats(&self, stats: WriteStats) {
        let header = self.header();
        header.made_writes.store(stats.made_writes, Ordering::Relaxed);
        header.missed_writes.store(stats.missed_writes, Ordering::Relaxed);
    }

    /// Writer tallies as last published
    pub fn write_stats(&self) -> WriteStats {
        let header = self.header();
        WriteStats {
            made_writes: header.made_writes.load(Ordering::Relaxed),
            missed_writes: header.missed_writes.load(Ordering::Relaxed),
        }
    }

    pub fn is_attached(&self, role: Role) -> bool {
        self.header().role_flag(role).load(Ordering::Acquire)
    }

    /// Claim `role` on this buffer; fails if someone already holds it
    pub fn claim(&self, role: Role) -> ShmSyncResult<RoleClaim> {
        self.header()
            .role_flag(role)
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ShmSyncError::RoleTaken(role))?;

        log::debug!("{} attached to {} buffer", role, self.algorithm());
        Ok(RoleClaim {
            buffer: self.clone(),
            role,
        })
    }
}

/// Exclusive hold on one side of a buffer; released on drop
#[derive(Debug)]
pub struct RoleClaim {
    buffer: SharedBuffer,
    role: Role,
}

impl RoleClaim {
    pub fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

impl Drop for RoleClaim {
    fn drop(&mut self) {
        self.buffer
            .header()
            .role_flag(self.role)
            .store(false, Ordering::Release);
        log::debug!("{} detached", self.role);
    }
}

/// Name the holder of a region that could not be recreated
fn live_buffer_refusal(dir: &Path, name: &str, reason: String) -> ShmSyncError {
    let writer_attached = ShmRegion::open_in(dir, name)
        .ok()
        .filter(|region| region.size() >= mem::size_of::<BufferHeader>())
        .map(|region| {
            let header = unsafe { &*(region.as_ptr() as *const BufferHeader) };
            header.magic.load(Ordering::Acquire) == BUFFER_MAGIC
                && header.writer_attached.load(Ordering::Acquire)
        })
        .unwrap_or(false);

    if writer_attached {
        ShmSyncError::RoleTaken(Role::Writer)
    } else {
        ShmSyncError::InUse(reason)
    }
}

fn check_payload_len(len: usize) -> ShmSyncResult<()> {
    if len < MIN_PAYLOAD_LEN {
        return Err(ShmSyncError::config(format!(
            "payload length {} is below the minimum of {}",
            len, MIN_PAYLOAD_LEN
        )));
    }
    if len > MAX_PAYLOAD_LEN {
        return Err(ShmSyncError::resource_exhausted(format!(
            "payload length {} exceeds the maximum of {}",
            len, MAX_PAYLOAD_LEN
        )));
    }
    Ok(())
}
