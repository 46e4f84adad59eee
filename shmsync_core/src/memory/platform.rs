// Cross-platform shared memory path abstraction
//
// Linux: /dev/shm/shmsync (tmpfs - RAM-backed, fastest)
// macOS: /tmp/shmsync (regular filesystem, but still fast for IPC)
// Windows: %TEMP%\shmsync (uses system temp directory)

use std::path::PathBuf;

/// Get the base directory for SHMSYNC shared memory
///
/// This returns a platform-appropriate path for shared memory:
/// - Linux: `/dev/shm/shmsync` (tmpfs for maximum performance)
/// - macOS: `/tmp/shmsync` (no /dev/shm, but /tmp is still fast)
/// - Windows: `%TEMP%\shmsync` (system temp directory)
pub fn shm_base_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/dev/shm/shmsync")
    }

    #[cfg(target_os = "macos")]
    {
        PathBuf::from("/tmp/shmsync")
    }

    #[cfg(target_os = "windows")]
    {
        std::env::temp_dir().join("shmsync")
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        PathBuf::from("/tmp/shmsync")
    }
}

/// Directory holding exchange buffers shared between a writer and a reader
pub fn shm_buffers_dir() -> PathBuf {
    shm_base_dir().join("buffers")
}

/// Directory holding jitter logs
pub fn shm_jitter_dir() -> PathBuf {
    shm_base_dir().join("jitter")
}

/// Turn a region name into a file name that cannot escape its directory
pub fn safe_region_file_name(name: &str) -> String {
    format!("shmsync_{}", name.replace(['/', '\\', ':'], "_"))
}

/// Check if we're running on a platform with true shared memory (tmpfs)
pub fn has_native_shm() -> bool {
    cfg!(target_os = "linux")
}

/// Get platform name for logging/diagnostics
pub fn platform_name() -> &'static str {
    #[cfg(target_os = "linux")]
    {
        "Linux"
    }

    #[cfg(target_os = "macos")]
    {
        "macOS"
    }

    #[cfg(target_os = "windows")]
    {
        "Windows"
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        "Unix"
    }
}
