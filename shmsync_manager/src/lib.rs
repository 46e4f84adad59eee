//! SHMSYNC Manager Library
//!
//! Command implementations behind the `shmsync` binary.

pub mod commands;
pub mod logging;
pub mod version;
