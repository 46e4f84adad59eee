//! # Shared memory for SHMSYNC
//!
//! - **ShmRegion**: a zero-initialized mapping, either private to the
//!   process or backed by a file under the platform shm directory
//! - **SharedBuffer**: the exchange block laid over a region, a header with
//!   the exclusion metadata followed by the integer payload
//!
//! The payload is only ever touched through atomics, so a torn read is a
//! detectable logical condition rather than undefined behaviour.

pub mod platform;
pub mod shared_buffer;
pub mod shm_region;

pub use platform::*;
pub use shared_buffer::{
    BufferHeader, RoleClaim, SharedBuffer, BUFFER_MAGIC, LAYOUT_VERSION, MAX_PAYLOAD_LEN,
    MIN_PAYLOAD_LEN,
};
pub use shm_region::ShmRegion;
