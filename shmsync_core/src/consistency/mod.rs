//! # Exclusion algorithms for the shared exchange buffer
//!
//! Three interchangeable, non-blocking strategies protect the payload that a
//! periodic writer hands to a polling reader:
//!
//! - **Peterson**: a two-party flag exchange with a "favored" tie breaker.
//!   Both sides may be refused; a refused side keeps its intent declared and
//!   comes back on its next call.
//! - **Test-and-set**: a single atomic flag. Whoever swaps it first copies the
//!   data; the other side is refused immediately.
//! - **Head/tail**: generation counters bracket every write. Writes always
//!   succeed and the reader detects when it straddled one.
//!
//! Every operation returns at once with [`Outcome::Success`] or
//! [`Outcome::Missed`]. Nothing in here spins, sleeps or parks, because the
//! realtime side cannot share blocking primitives with the best-effort side.
//!
//! The set of strategies is closed, so selection is a plain enum matched at
//! each call rather than a trait object.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ShmSyncError;
use crate::memory::SharedBuffer;

pub mod endpoint;
pub mod head_tail;
pub mod peterson;
pub mod stats;
pub mod test_and_set;

pub use endpoint::{ReaderEndpoint, WriterEndpoint};
pub use head_tail::Generation;
pub use peterson::PetersonFlags;
pub use stats::{ReadStats, WriteStats};
pub use test_and_set::TasFlag;

/// Result of a single read or write attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    /// The buffer was busy or the read straddled a write. Not an error.
    Missed,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        self == Outcome::Success
    }
}

/// Caller-owned memory between successive attempts.
///
/// Only the Peterson strategy looks at it: a `Retrying` caller already has
/// its intent declared and must not declare it again. Callers reset it to
/// `Fresh` after every success.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ResumeState {
    #[default]
    Fresh,
    Retrying,
}

/// The two parties sharing a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Reader,
    Writer,
}

impl Role {
    pub fn other(self) -> Role {
        match self {
            Role::Reader => Role::Writer,
            Role::Writer => Role::Reader,
        }
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            Role::Reader => 0,
            Role::Writer => 1,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Role {
        if tag == 0 {
            Role::Reader
        } else {
            Role::Writer
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Reader => write!(f, "reader"),
            Role::Writer => write!(f, "writer"),
        }
    }
}

/// Exclusion strategy, chosen once at startup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    Peterson,
    TestAndSet,
    #[default]
    HeadTail,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [Algorithm::Peterson, Algorithm::TestAndSet, Algorithm::HeadTail];

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Peterson => "peterson",
            Algorithm::TestAndSet => "test-and-set",
            Algorithm::HeadTail => "head-tail",
        }
    }

    /// Tag stored in the buffer header so both sides agree on the strategy
    pub(crate) fn tag(self) -> u32 {
        match self {
            Algorithm::Peterson => 1,
            Algorithm::TestAndSet => 2,
            Algorithm::HeadTail => 3,
        }
    }

    pub(crate) fn from_tag(tag: u32) -> Option<Algorithm> {
        match tag {
            1 => Some(Algorithm::Peterson),
            2 => Some(Algorithm::TestAndSet),
            3 => Some(Algorithm::HeadTail),
            _ => None,
        }
    }

    /// Whether the writer can ever be refused under this strategy
    pub fn writer_can_miss(self) -> bool {
        self != Algorithm::HeadTail
    }

    /// Copy the shared payload into `local` if the strategy admits the reader
    pub fn try_read(
        self,
        buffer: &SharedBuffer,
        local: &mut [i32],
        resume: &mut ResumeState,
    ) -> Outcome {
        match self {
            Algorithm::Peterson => peterson::try_read(buffer, local, resume),
            Algorithm::TestAndSet => test_and_set::try_read(buffer, local),
            Algorithm::HeadTail => head_tail::try_read(buffer, local),
        }
    }

    /// Copy `local` into the shared payload if the strategy admits the writer
    pub fn try_write(
        self,
        local: &[i32],
        buffer: &SharedBuffer,
        resume: &mut ResumeState,
    ) -> Outcome {
        match self {
            Algorithm::Peterson => peterson::try_write(local, buffer, resume),
            Algorithm::TestAndSet => test_and_set::try_write(local, buffer),
            Algorithm::HeadTail => head_tail::try_write(local, buffer),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = ShmSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "peterson" => Ok(Algorithm::Peterson),
            "test-and-set" | "tas" => Ok(Algorithm::TestAndSet),
            "head-tail" | "headtail" => Ok(Algorithm::HeadTail),
            other => Err(ShmSyncError::config(format!(
                "unknown algorithm '{}' (expected peterson, test-and-set or head-tail)",
                other
            ))),
        }
    }
}

/// True when every element equals the first one.
///
/// The writer fills the whole payload with one value per cycle, so anything
/// else is a torn snapshot.
pub fn is_consistent(payload: &[i32]) -> bool {
    match payload.first() {
        Some(&first) => payload.iter().all(|&v| v == first),
        None => true,
    }
}
