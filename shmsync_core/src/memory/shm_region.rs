// SHMSYNC Shared Memory Region - anonymous or /dev/shm/shmsync backed
use crate::error::{ShmSyncError, ShmSyncResult};
use crate::memory::platform::{safe_region_file_name, shm_buffers_dir};
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// Largest region we are willing to map (256 MiB)
pub const MAX_REGION_SIZE: usize = 256 * 1024 * 1024;

/// A zero-initialized memory mapping shared by one writer and one reader.
///
/// The base pointer is captured once at construction and all later access
/// goes through it, so the mapping is never reborrowed as a byte slice while
/// the two sides mutate it through atomics.
#[derive(Debug)]
pub struct ShmRegion {
    _mmap: MmapMut,
    base: NonNull<u8>,
    size: usize,
    path: Option<PathBuf>,
    _file: Option<File>,
    owner: bool,
}

impl ShmRegion {
    /// Map a private anonymous region, used when both sides live in one process
    pub fn anonymous(size: usize) -> ShmSyncResult<Self> {
        check_size(size)?;

        let mut mmap = MmapOptions::new().len(size).map_anon().map_err(|e| {
            ShmSyncError::resource_exhausted(format!(
                "cannot map {} anonymous bytes: {}",
                size, e
            ))
        })?;

        let base = NonNull::new(mmap.as_mut_ptr())
            .ok_or_else(|| ShmSyncError::resource_exhausted("anonymous mapping returned null"))?;

        Ok(Self {
            _mmap: mmap,
            base,
            size,
            path: None,
            _file: None,
            owner: true,
        })
    }

    /// Create a named region in the default buffers directory
    pub fn create(name: &str, size: usize) -> ShmSyncResult<Self> {
        Self::create_in(&shm_buffers_dir(), name, size)
    }

    /// Create a named region inside `dir`, starting from an all-zero file.
    ///
    /// The file is created exclusively. A file left behind by a run that is
    /// gone is replaced; one still mapped by a live process is refused with
    /// [`ShmSyncError::InUse`]. Every mapping holds a shared advisory lock on
    /// its file, which is what tells the two apart. The creator owns the
    /// backing file and removes it on drop.
    pub fn create_in(dir: &Path, name: &str, size: usize) -> ShmSyncResult<Self> {
        check_size(size)?;
        std::fs::create_dir_all(dir)?;

        let path = dir.join(safe_region_file_name(name));
        let file = match create_exclusive(&path) {
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                remove_stale(&path, name)?;
                create_exclusive(&path).map_err(|e| match e.kind() {
                    io::ErrorKind::AlreadyExists => in_use(name, &path),
                    _ => e.into(),
                })?
            }
            other => other?,
        };
        if lock(&file, LockMode::Shared).is_err() {
            log::debug!("Could not lock {}", path.display());
        }

        file.set_len(size as u64).map_err(|e| {
            ShmSyncError::resource_exhausted(format!(
                "cannot size '{}' to {} bytes: {}",
                path.display(),
                size,
                e
            ))
        })?;

        let mut mmap = unsafe { MmapOptions::new().len(size).map_mut(&file) }.map_err(|e| {
            ShmSyncError::resource_exhausted(format!("cannot map '{}': {}", path.display(), e))
        })?;

        let base = NonNull::new(mmap.as_mut_ptr())
            .ok_or_else(|| ShmSyncError::resource_exhausted("file mapping returned null"))?;

        log::info!(
            "Created shared region '{}' ({} bytes) at {}",
            name,
            size,
            path.display()
        );

        Ok(Self {
            _mmap: mmap,
            base,
            size,
            path: Some(path),
            _file: Some(file),
            owner: true,
        })
    }

    /// Open an existing named region in the default buffers directory
    pub fn open(name: &str) -> ShmSyncResult<Self> {
        Self::open_in(&shm_buffers_dir(), name)
    }

    /// Open an existing named region inside `dir` (no creation)
    pub fn open_in(dir: &Path, name: &str) -> ShmSyncResult<Self> {
        let path = dir.join(safe_region_file_name(name));
        if !path.exists() {
            return Err(ShmSyncError::layout(format!(
                "shared region '{}' does not exist at {}",
                name,
                path.display()
            )));
        }

        let file = match OpenOptions::new().read(true).write(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ShmSyncError::layout(format!(
                    "shared region '{}' was removed at {}",
                    name,
                    path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };
        if lock(&file, LockMode::Shared).is_err() {
            log::debug!("Could not lock {}", path.display());
        }
        let size = file.metadata()?.len() as usize;
        if size == 0 {
            return Err(ShmSyncError::layout(format!(
                "shared region '{}' is empty",
                name
            )));
        }

        let mut mmap = unsafe { MmapOptions::new().len(size).map_mut(&file) }.map_err(|e| {
            ShmSyncError::resource_exhausted(format!("cannot map '{}': {}", path.display(), e))
        })?;

        let base = NonNull::new(mmap.as_mut_ptr())
            .ok_or_else(|| ShmSyncError::resource_exhausted("file mapping returned null"))?;

        log::debug!("Opened shared region '{}' ({} bytes)", name, size);

        Ok(Self {
            _mmap: mmap,
            base,
            size,
            path: Some(path),
            _file: Some(file),
            owner: false,
        })
    }

    pub fn as_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_owner(&self) -> bool {
        self.owner
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Drop for ShmRegion {
    fn drop(&mut self) {
        if self.owner {
            if let Some(path) = &self.path {
                if let Err(e) = std::fs::remove_file(path) {
                    log::debug!("Could not remove {}: {}", path.display(), e);
                }
            }
        }
    }
}

fn create_exclusive(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(path)
}

/// Delete a region file nobody has mapped any more
fn remove_stale(path: &Path, name: &str) -> ShmSyncResult<()> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    if lock(&file, LockMode::Exclusive).is_err() {
        return Err(in_use(name, path));
    }
    log::warn!("Replacing stale shared region '{}' at {}", name, path.display());
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

fn in_use(name: &str, path: &Path) -> ShmSyncError {
    ShmSyncError::InUse(format!(
        "'{}' is mapped by a running process ({})",
        name,
        path.display()
    ))
}

#[derive(Clone, Copy)]
enum LockMode {
    Shared,
    Exclusive,
}

/// Non-blocking advisory lock, released when the file is closed
#[cfg(unix)]
fn lock(file: &File, mode: LockMode) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let operation = match mode {
        LockMode::Shared => libc::LOCK_SH,
        LockMode::Exclusive => libc::LOCK_EX,
    } | libc::LOCK_NB;
    if unsafe { libc::flock(file.as_raw_fd(), operation) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Without advisory locks an existing file is never assumed stale
#[cfg(not(unix))]
fn lock(_file: &File, mode: LockMode) -> io::Result<()> {
    match mode {
        LockMode::Shared => Ok(()),
        LockMode::Exclusive => Err(io::Error::new(
            io::ErrorKind::WouldBlock,
            "advisory locks unavailable",
        )),
    }
}

fn check_size(size: usize) -> ShmSyncResult<()> {
    if size == 0 {
        return Err(ShmSyncError::config("shared region size must be non-zero"));
    }
    if size > MAX_REGION_SIZE {
        return Err(ShmSyncError::resource_exhausted(format!(
            "requested {} bytes, maximum region size is {}",
            size, MAX_REGION_SIZE
        )));
    }
    Ok(())
}

// The mapping is only ever touched through atomics laid over `base`.
unsafe impl Send for ShmRegion {}
unsafe impl Sync for ShmRegion {}
