//! Domain lock
//!
//! Exclusive use of the NCA command interface takes two steps:
//!
//! 1. the software spinlock around the mapped windows, which serialises
//!    callers in this process, then
//! 2. the hardware lock register of the domain, which reads zero once the
//!    lock is granted and serialises processors sharing the bus.
//!
//! After the hardware lock is granted the command interface is drained:
//! CDR0 is polled until the previous command is no longer busy. A stale
//! failure status is logged and does not block the new transaction.
//!
//! Release happens when the [`LockGuard`] is dropped: zero is written to the
//! lock register, then the spinlock is released. Every exit path of a
//! transaction therefore releases the lock.

use crate::error::{NcrError, Result};
use crate::poll::{poll_until, PollBudget, PollOutcome};
use crate::regio::{read_be32, write_be32};
use crate::window::RegisterWindow;
use ncr_chip::regs::{lock_register, CDR0};
use ncr_chip::{Cdr0, CommandStatus};
use spin::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{error, trace};

/// The mapped register windows
#[derive(Debug)]
pub struct Windows {
    /// NCA window (command descriptor, data window, lock registers)
    pub nca: Box<dyn RegisterWindow>,
    /// APB2SER window, absent on platforms without the bridge
    pub apb2ser: Option<Box<dyn RegisterWindow>>,
}

impl Windows {
    /// Bundle the NCA window with an optional APB2SER window.
    pub fn new(nca: Box<dyn RegisterWindow>, apb2ser: Option<Box<dyn RegisterWindow>>) -> Self {
        Self { nca, apb2ser }
    }
}

/// Lock over one hardware domain and the windows it protects
#[derive(Debug)]
pub struct DomainLock {
    windows: Mutex<Option<Windows>>,
    domain: u32,
    timeout: Duration,
}

impl DomainLock {
    /// Unmapped lock for `domain` with the given handshake deadline.
    pub const fn new(domain: u32, timeout: Duration) -> Self {
        Self {
            windows: Mutex::new(None),
            domain,
            timeout,
        }
    }

    /// Domain this lock arbitrates.
    pub const fn domain(&self) -> u32 {
        self.domain
    }

    /// Install mapped windows, returning any previously installed ones.
    pub fn install(&self, windows: Windows) -> Option<Windows> {
        self.windows.lock().replace(windows)
    }

    /// Remove the windows, returning them if they were installed.
    pub fn take(&self) -> Option<Windows> {
        self.windows.lock().take()
    }

    /// Inspect the installed windows under the spinlock.
    pub fn with_windows<R>(&self, f: impl FnOnce(Option<&Windows>) -> R) -> R {
        f(self.windows.lock().as_ref())
    }

    /// Acquire the domain.
    ///
    /// # Errors
    ///
    /// - [`NcrError::NotReady`] if no windows are installed
    /// - [`NcrError::LockTimeout`] if the hardware lock is not granted in time
    /// - [`NcrError::PreviousCommandIncomplete`] if CDR0 stays busy
    pub fn acquire(&self) -> Result<LockGuard<'_>> {
        let guard = self.windows.lock();
        let Some(windows) = guard.as_ref() else {
            return Err(NcrError::NotReady);
        };

        let lock_reg = lock_register(self.domain);
        let nca = &*windows.nca;
        let grant = poll_until(
            PollBudget::Deadline(self.timeout),
            || read_be32(nca, lock_reg),
            |value| *value == 0,
        )?;
        if let PollOutcome::Expired { last, elapsed, .. } = grant {
            error!(
                "Lock domain {} timeout after {}ms (register={last:#x})",
                self.domain,
                elapsed.as_millis()
            );
            // Hardware lock never granted: only the spinlock is released.
            return Err(NcrError::LockTimeout {
                domain: self.domain,
                waited_ms: duration_ms(elapsed),
            });
        }
        trace!("Lock domain {} granted", self.domain);

        let mut lock = LockGuard {
            windows: guard,
            domain: self.domain,
        };

        let drained = {
            let nca = &*lock.windows()?.nca;
            poll_until(
                PollBudget::Deadline(self.timeout),
                || read_be32(nca, CDR0).map(Cdr0::decode),
                |cdr0| cdr0.status != CommandStatus::Busy,
            )?
        };
        match drained {
            PollOutcome::Expired { elapsed, .. } => {
                error!("Previous ring bus command didn't complete!");
                Err(NcrError::PreviousCommandIncomplete {
                    waited_ms: duration_ms(elapsed),
                })
            }
            PollOutcome::Ready { value, .. } => {
                if value.status == CommandStatus::Failed {
                    error!("Previous ring bus access failed!");
                }
                Ok(lock)
            }
        }
    }
}

fn duration_ms(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Held domain lock; dropping it releases the domain
#[derive(Debug)]
pub struct LockGuard<'a> {
    windows: MutexGuard<'a, Option<Windows>>,
    domain: u32,
}

impl LockGuard<'_> {
    /// Windows protected by the lock.
    ///
    /// # Errors
    ///
    /// Returns [`NcrError::NotReady`] if the windows are gone, which cannot
    /// happen while the guard holds the spinlock.
    pub fn windows(&mut self) -> Result<&mut Windows> {
        self.windows.as_mut().ok_or(NcrError::NotReady)
    }

    /// Release the domain now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Some(windows) = self.windows.as_mut() {
            if let Err(e) = write_be32(&mut *windows.nca, lock_register(self.domain), 0) {
                error!("Failed to release lock domain {}: {e}", self.domain);
            }
        }
        trace!("Lock domain {} released", self.domain);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::software::SimulatedNca;

    fn lock_with(sim: &SimulatedNca, timeout: Duration) -> DomainLock {
        let lock = DomainLock::new(0, timeout);
        lock.install(Windows::new(Box::new(sim.clone()), None));
        lock
    }

    #[test]
    fn unmapped_lock_is_not_ready() {
        let lock = DomainLock::new(0, Duration::from_millis(10));
        assert!(matches!(lock.acquire(), Err(NcrError::NotReady)));
    }

    #[test]
    fn acquire_then_drop_releases() {
        let sim = SimulatedNca::new();
        let lock = lock_with(&sim, Duration::from_millis(100));
        {
            let _guard = lock.acquire().unwrap();
            assert!(sim.lock_held());
        }
        assert!(!sim.lock_held());
        assert_eq!(sim.lock_grants(), 1);
        assert_eq!(sim.lock_releases(), 1);
    }

    #[test]
    fn contended_lock_is_eventually_granted() {
        let sim = SimulatedNca::new().with_lock_contention(25);
        let lock = lock_with(&sim, Duration::from_millis(500));
        lock.acquire().unwrap().release();
        assert_eq!(sim.lock_grants(), 1);
        assert_eq!(sim.lock_releases(), 1);
    }

    #[test]
    fn stuck_lock_times_out_without_release_write() {
        let sim = SimulatedNca::new().with_stuck_lock();
        let lock = lock_with(&sim, Duration::from_millis(5));
        let err = lock.acquire().unwrap_err();
        assert!(matches!(err, NcrError::LockTimeout { domain: 0, .. }));
        assert_eq!(sim.lock_releases(), 0);
        // Spinlock was released: a second attempt gets as far as the hardware again.
        assert!(matches!(lock.acquire(), Err(NcrError::LockTimeout { .. })));
    }

    #[test]
    fn busy_previous_command_times_out_and_releases() {
        let sim = SimulatedNca::new().with_stale_status(CommandStatus::Busy);
        let lock = lock_with(&sim, Duration::from_millis(5));
        let err = lock.acquire().unwrap_err();
        assert!(matches!(err, NcrError::PreviousCommandIncomplete { .. }));
        assert!(!sim.lock_held());
        assert_eq!(sim.lock_releases(), 1);
    }

    #[test]
    fn stale_failure_does_not_block() {
        let sim = SimulatedNca::new().with_stale_status(CommandStatus::Failed);
        let lock = lock_with(&sim, Duration::from_millis(50));
        assert!(lock.acquire().is_ok());
        assert_eq!(sim.lock_releases(), 1);
    }
}
