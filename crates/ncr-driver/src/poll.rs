//! Bounded busy-wait polling
//!
//! The ring bus has no completion interrupt, so every wait is a loop that
//! re-reads a register until a predicate holds or a budget runs out. The
//! budget is either a number of reads or a wall-clock deadline on the
//! monotonic clock.

use crate::error::Result;
use std::time::{Duration, Instant};

/// Limit on a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollBudget {
    /// At most this many reads
    Iterations(u32),
    /// Keep reading until this much time has passed
    Deadline(Duration),
}

/// Result of a polling loop that did not fail on a register access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// Predicate held on the last value read
    Ready {
        /// Value that satisfied the predicate
        value: T,
        /// Reads performed, including the final one
        polls: u32,
    },
    /// Budget ran out; `last` is the final value read
    Expired {
        /// Final value read
        last: T,
        /// Reads performed
        polls: u32,
        /// Time spent polling
        elapsed: Duration,
    },
}

impl<T> PollOutcome<T> {
    /// Whether the predicate was satisfied.
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }
}

/// Read with `read` until `done` holds or `budget` is exhausted.
///
/// The register is always read at least once. A failing read aborts the
/// loop and its error is returned.
///
/// # Errors
///
/// Returns the first error produced by `read`.
pub fn poll_until<T, R, P>(budget: PollBudget, mut read: R, done: P) -> Result<PollOutcome<T>>
where
    R: FnMut() -> Result<T>,
    P: Fn(&T) -> bool,
{
    let start = Instant::now();
    let mut polls: u32 = 0;

    loop {
        let value = read()?;
        polls = polls.saturating_add(1);

        if done(&value) {
            return Ok(PollOutcome::Ready { value, polls });
        }

        let expired = match budget {
            PollBudget::Iterations(max) => polls >= max,
            PollBudget::Deadline(limit) => start.elapsed() >= limit,
        };
        if expired {
            return Ok(PollOutcome::Expired {
                last: value,
                polls,
                elapsed: start.elapsed(),
            });
        }

        std::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NcrError;

    #[test]
    fn ready_after_n_reads() {
        let mut n = 0;
        let outcome = poll_until(
            PollBudget::Iterations(10),
            || {
                n += 1;
                Ok(n)
            },
            |v| *v == 3,
        )
        .unwrap();
        assert_eq!(outcome, PollOutcome::Ready { value: 3, polls: 3 });
    }

    #[test]
    fn iteration_budget_is_exact() {
        let mut reads = 0u32;
        let outcome = poll_until(
            PollBudget::Iterations(5),
            || {
                reads += 1;
                Ok(1u32)
            },
            |v| *v == 0,
        )
        .unwrap();
        assert!(!outcome.is_ready());
        assert_eq!(reads, 5);
    }

    #[test]
    fn deadline_expires() {
        let outcome = poll_until(
            PollBudget::Deadline(Duration::from_millis(5)),
            || Ok(1u32),
            |v| *v == 0,
        )
        .unwrap();
        match outcome {
            PollOutcome::Expired { last, elapsed, .. } => {
                assert_eq!(last, 1);
                assert!(elapsed >= Duration::from_millis(5));
            }
            PollOutcome::Ready { .. } => panic!("predicate never holds"),
        }
    }

    #[test]
    fn read_error_aborts() {
        let result = poll_until(
            PollBudget::Iterations(10),
            || Err::<u32, _>(NcrError::NotReady),
            |_| true,
        );
        assert!(matches!(result, Err(NcrError::NotReady)));
    }
}
