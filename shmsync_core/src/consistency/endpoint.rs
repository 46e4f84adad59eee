//! Role-bound handles on a [`SharedBuffer`].
//!
//! Each endpoint holds the role claim for its side, its own resume state and
//! (for the reader) the local copy. At most one endpoint of each role exists
//! per buffer at any time.

use super::{Algorithm, Outcome, ResumeState, Role, WriteStats};
use crate::error::ShmSyncResult;
use crate::memory::{RoleClaim, SharedBuffer};

/// The writer's side of the exchange
#[derive(Debug)]
pub struct WriterEndpoint {
    claim: RoleClaim,
    algorithm: Algorithm,
    resume: ResumeState,
}

impl WriterEndpoint {
    pub fn attach(buffer: &SharedBuffer) -> ShmSyncResult<Self> {
        Ok(Self {
            claim: buffer.claim(Role::Writer)?,
            algorithm: buffer.algorithm(),
            resume: ResumeState::Fresh,
        })
    }

    /// One write attempt. A miss is not retried here.
    pub fn try_write(&mut self, payload: &[i32]) -> Outcome {
        let outcome = self
            .algorithm
            .try_write(payload, self.claim.buffer(), &mut self.resume);
        if outcome.is_success() {
            self.resume = ResumeState::Fresh;
        }
        outcome
    }

    /// Publish the writer tallies to the header. Only the writer may do this.
    pub fn publish_stats(&self, stats: WriteStats) {
        self.claim.buffer().store_write_stats(stats);
    }

    pub fn resume_state(&self) -> ResumeState {
        self.resume
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn payload_len(&self) -> usize {
        self.claim.buffer().payload_len()
    }

    pub fn buffer(&self) -> &SharedBuffer {
        self.claim.buffer()
    }
}

impl Drop for WriterEndpoint {
    fn drop(&mut self) {
        withdraw_intent(&self.claim, self.algorithm, &mut self.resume);
    }
}

/// The reader's side of the exchange
#[derive(Debug)]
pub struct ReaderEndpoint {
    claim: RoleClaim,
    algorithm: Algorithm,
    resume: ResumeState,
    local: Vec<i32>,
}

impl ReaderEndpoint {
    pub fn attach(buffer: &SharedBuffer) -> ShmSyncResult<Self> {
        Ok(Self {
            claim: buffer.claim(Role::Reader)?,
            algorithm: buffer.algorithm(),
            resume: ResumeState::Fresh,
            local: vec![0; buffer.payload_len()],
        })
    }

    /// One read attempt into the local copy
    pub fn try_read(&mut self) -> Outcome {
        let outcome = self
            .algorithm
            .try_read(self.claim.buffer(), &mut self.local, &mut self.resume);
        if outcome.is_success() {
            self.resume = ResumeState::Fresh;
        }
        outcome
    }

    /// The local copy as of the last successful read
    pub fn snapshot(&self) -> &[i32] {
        &self.local
    }

    /// Writer tallies as last published in the header
    pub fn writer_stats(&self) -> WriteStats {
        self.claim.buffer().write_stats()
    }

    pub fn resume_state(&self) -> ResumeState {
        self.resume
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn buffer(&self) -> &SharedBuffer {
        self.claim.buffer()
    }
}

impl Drop for ReaderEndpoint {
    fn drop(&mut self) {
        withdraw_intent(&self.claim, self.algorithm, &mut self.resume);
    }
}

/// A side leaving while `Retrying` still has its Peterson intent declared
fn withdraw_intent(claim: &RoleClaim, algorithm: Algorithm, resume: &mut ResumeState) {
    if algorithm == Algorithm::Peterson {
        claim
            .buffer()
            .header()
            .peterson
            .withdraw(claim.role(), resume);
    }
}
