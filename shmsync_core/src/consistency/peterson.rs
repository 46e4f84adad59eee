//! Non-blocking adaptation of Peterson's two-party mutual exclusion.
//!
//! A fresh attempt declares intent and hands the favor to the other side,
//! then checks whether the other side both wants in and holds the favor. If
//! so the attempt is refused and the caller is left `Retrying`, with its
//! intent still declared, instead of spinning here. The next call only
//! repeats the check.
//!
//! Every flag access is `SeqCst`: the algorithm needs the store of our own
//! intent to be ordered before the load of the other side's intent.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use super::{Outcome, ResumeState, Role};
use crate::memory::SharedBuffer;

/// Intent flags and tie breaker, laid out in the shared header
#[repr(C, align(64))]
#[derive(Debug, Default)]
pub struct PetersonFlags {
    reader_wants: AtomicBool,
    writer_wants: AtomicBool,
    favored: AtomicU8,
}

impl PetersonFlags {
    fn wants(&self, role: Role) -> &AtomicBool {
        match role {
            Role::Reader => &self.reader_wants,
            Role::Writer => &self.writer_wants,
        }
    }

    /// Whether `role` currently has its intent declared
    pub fn wants_access(&self, role: Role) -> bool {
        self.wants(role).load(Ordering::SeqCst)
    }

    /// The side that wins a tie
    pub fn favored(&self) -> Role {
        Role::from_tag(self.favored.load(Ordering::SeqCst))
    }

    /// Attempt to enter the critical section as `role`.
    ///
    /// Returns a guard on success; dropping it withdraws our intent and
    /// resets `resume` to `Fresh`. On refusal `resume` becomes `Retrying`.
    pub fn try_enter<'a>(
        &'a self,
        role: Role,
        resume: &'a mut ResumeState,
    ) -> Option<PetersonGuard<'a>> {
        let other = role.other();

        if *resume == ResumeState::Fresh {
            self.wants(role).store(true, Ordering::SeqCst);
            self.favored.store(other.tag(), Ordering::SeqCst);
        }

        if self.wants(other).load(Ordering::SeqCst)
            && self.favored.load(Ordering::SeqCst) == other.tag()
        {
            *resume = ResumeState::Retrying;
            return None;
        }

        Some(PetersonGuard {
            flags: self,
            role,
            resume,
        })
    }

    /// Drop a declared intent without entering. Used when a retrying side
    /// detaches, so the other side is not refused forever.
    pub(crate) fn withdraw(&self, role: Role, resume: &mut ResumeState) {
        if *resume == ResumeState::Retrying {
            self.wants(role).store(false, Ordering::SeqCst);
            *resume = ResumeState::Fresh;
        }
    }
}

/// Proof of entry; withdraws intent on drop
#[derive(Debug)]
pub struct PetersonGuard<'a> {
    flags: &'a PetersonFlags,
    role: Role,
    resume: &'a mut ResumeState,
}

impl PetersonGuard<'_> {
    pub fn role(&self) -> Role {
        self.role
    }
}

impl Drop for PetersonGuard<'_> {
    fn drop(&mut self) {
        self.flags.wants(self.role).store(false, Ordering::SeqCst);
        *self.resume = ResumeState::Fresh;
    }
}

pub fn try_read(buffer: &SharedBuffer, local: &mut [i32], resume: &mut ResumeState) -> Outcome {
    match buffer.header().peterson.try_enter(Role::Reader, resume) {
        Some(_guard) => {
            buffer.copy_out(local);
            Outcome::Success
        }
        None => Outcome::Missed,
    }
}

pub fn try_write(local: &[i32], buffer: &SharedBuffer, resume: &mut ResumeState) -> Outcome {
    match buffer.header().peterson.try_enter(Role::Writer, resume) {
        Some(_guard) => {
            buffer.copy_in(local);
            Outcome::Success
        }
        None => Outcome::Missed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uncontended_entry_clears_intent() {
        let flags = PetersonFlags::default();
        let mut resume = ResumeState::Fresh;
        {
            let guard = flags.try_enter(Role::Reader, &mut resume).unwrap();
            assert_eq!(guard.role(), Role::Reader);
            assert!(flags.wants_access(Role::Reader));
            assert_eq!(flags.favored(), Role::Writer);
        }
        assert!(!flags.wants_access(Role::Reader));
        assert_eq!(resume, ResumeState::Fresh);
    }

    #[test]
    fn test_refused_side_keeps_intent_and_retries() {
        let flags = PetersonFlags::default();
        let mut reader_resume = ResumeState::Fresh;
        let mut writer_resume = ResumeState::Fresh;

        let reader_guard = flags.try_enter(Role::Reader, &mut reader_resume).unwrap();

        // Writer declares and hands the favor to the reader, who is inside
        assert!(flags.try_enter(Role::Writer, &mut writer_resume).is_none());
        assert_eq!(writer_resume, ResumeState::Retrying);
        assert!(flags.wants_access(Role::Writer));
        assert_eq!(flags.favored(), Role::Reader);

        drop(reader_guard);

        // The retry does not re-declare, and the reader has left
        let writer_guard = flags.try_enter(Role::Writer, &mut writer_resume);
        assert!(writer_guard.is_some());
        drop(writer_guard);
        assert_eq!(writer_resume, ResumeState::Fresh);
        assert!(!flags.wants_access(Role::Writer));
    }

    #[test]
    fn test_retrying_side_wins_next_episode() {
        let flags = PetersonFlags::default();
        let mut reader_resume = ResumeState::Fresh;
        let mut writer_resume = ResumeState::Fresh;

        let reader_guard = flags.try_enter(Role::Reader, &mut reader_resume).unwrap();
        assert!(flags.try_enter(Role::Writer, &mut writer_resume).is_none());
        drop(reader_guard);

        // A fresh reader declaration gives the favor to the waiting writer
        assert!(flags.try_enter(Role::Reader, &mut reader_resume).is_none());
        assert_eq!(reader_resume, ResumeState::Retrying);
        assert!(flags.try_enter(Role::Writer, &mut writer_resume).is_some());

        // Once the writer is done the retrying reader gets in
        assert!(flags.try_enter(Role::Reader, &mut reader_resume).is_some());
    }

    #[test]
    fn test_withdraw_releases_waiting_intent() {
        let flags = PetersonFlags::default();
        let mut reader_resume = ResumeState::Fresh;
        let mut writer_resume = ResumeState::Fresh;

        let writer_guard = flags.try_enter(Role::Writer, &mut writer_resume).unwrap();
        assert!(flags.try_enter(Role::Reader, &mut reader_resume).is_none());
        drop(writer_guard);

        flags.withdraw(Role::Reader, &mut reader_resume);
        assert_eq!(reader_resume, ResumeState::Fresh);
        assert!(!flags.wants_access(Role::Reader));

        // Without the withdrawal every fresh writer attempt would now be refused
        for _ in 0..3 {
            assert!(flags.try_enter(Role::Writer, &mut writer_resume).is_some());
        }
    }
}
