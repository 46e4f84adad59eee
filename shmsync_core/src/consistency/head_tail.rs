//! Generation counters bracketing every write.
//!
//! The writer bumps `head`, copies the payload, then publishes `tail = head`.
//! It never looks at the reader and never misses.
//!
//! The reader samples `tail` first, copies the payload, then samples `head`.
//! The two match only if no write began after the generation it started
//! from was published, i.e. the copy did not straddle a write. Sampling in
//! this order keeps the check sound when writer and reader run on different
//! cores; sampling `head` first is only safe when the writer can never be
//! interrupted by the reader.
//!
//! Ordering follows the usual sequence-lock recipe: a release fence between
//! the `head` bump and the payload stores, a release store of `tail`, an
//! acquire load of `tail` and an acquire fence before the final `head` load.

use std::sync::atomic::{fence, AtomicU64, Ordering};

use super::Outcome;
use crate::memory::SharedBuffer;

#[repr(C, align(64))]
#[derive(Debug, Default)]
pub struct Generation {
    head: AtomicU64,
    tail: AtomicU64,
}

impl Generation {
    /// Open a write generation. The payload may be written until the
    /// returned guard is dropped, which publishes the generation.
    pub fn begin_write(&self) -> GenerationWrite<'_> {
        let next = self.head.load(Ordering::Relaxed).wrapping_add(1);
        self.head.store(next, Ordering::Relaxed);
        fence(Ordering::Release);
        GenerationWrite {
            generation: self,
            next,
        }
    }

    /// Start of a read: the last fully published generation
    pub fn read_begin(&self) -> u64 {
        self.tail.load(Ordering::Acquire)
    }

    /// End of a read: true if no write started since `read_begin`
    pub fn read_validate(&self, begun: u64) -> bool {
        fence(Ordering::Acquire);
        self.head.load(Ordering::Relaxed) == begun
    }

    pub fn head(&self) -> u64 {
        self.head.load(Ordering::Relaxed)
    }

    pub fn tail(&self) -> u64 {
        self.tail.load(Ordering::Acquire)
    }
}

/// An open write generation
#[derive(Debug)]
pub struct GenerationWrite<'a> {
    generation: &'a Generation,
    next: u64,
}

impl GenerationWrite<'_> {
    pub fn generation(&self) -> u64 {
        self.next
    }
}

impl Drop for GenerationWrite<'_> {
    fn drop(&mut self) {
        self.generation.tail.store(self.next, Ordering::Release);
    }
}

pub fn try_read(buffer: &SharedBuffer, local: &mut [i32]) -> Outcome {
    let generation = &buffer.header().generation;
    let begun = generation.read_begin();
    buffer.copy_out(local);
    if generation.read_validate(begun) {
        Outcome::Success
    } else {
        Outcome::Missed
    }
}

pub fn try_write(local: &[i32], buffer: &SharedBuffer) -> Outcome {
    let _write = buffer.header().generation.begin_write();
    buffer.copy_in(local);
    Outcome::Success
}
