//! Primary path: command descriptor transactions
//!
//! Sequence for one transaction, with the domain lock held:
//!
//! ```text
//! CDR2 <- target select        (node id, target id)
//! CDR1 <- address >> 2
//! [write] data window <- payload
//! CDR0 <- start_done | local | cmd_type | dbs   (starts execution)
//! poll CDR0 until start_done clears
//! check status == success
//! [read] payload <- data window
//! ```
//!
//! CDR2 and CDR1 must land before CDR0, and for writes the payload must be
//! in the data window before CDR0, because the CDR0 store starts the
//! hardware.

use crate::error::{NcrError, Result};
use crate::poll::{poll_until, PollBudget, PollOutcome};
use crate::regio::{read_be32, write_be32};
use crate::transfer::{read_words, write_words, WordOrder};
use crate::window::RegisterWindow;
use ncr_chip::regs::{
    CDR0, CDR1, CDR2, DATA_WINDOW, DATA_WINDOW_CAPACITY, EXTENDED_STATUS, MAX_WORD_COUNT,
};
use ncr_chip::{Cdr0, Cdr1, Cdr2, CommandStatus, CommandType, Region};
use tracing::{debug, error};

/// Words needed to move `length` bytes.
///
/// # Errors
///
/// Returns [`NcrError::InvalidLength`] for an empty transfer, a count that
/// does not fit `dbs`, or a payload larger than the data window.
pub fn word_count(length: usize) -> Result<usize> {
    if length == 0 {
        return Err(NcrError::invalid_length(length, "empty transfer"));
    }
    if length > DATA_WINDOW_CAPACITY {
        return Err(NcrError::invalid_length(length, "larger than the data window"));
    }
    let count = length.div_ceil(4);
    if count > MAX_WORD_COUNT {
        return Err(NcrError::invalid_length(length, "word count exceeds dbs"));
    }
    Ok(count)
}

/// One primary-path transaction
#[derive(Debug, Clone, Copy)]
pub struct Transaction {
    region: Region,
    address: u32,
    word_count: usize,
    completion_polls: u32,
}

impl Transaction {
    /// Transaction moving `length` bytes at `address` of `region`.
    ///
    /// # Errors
    ///
    /// Returns [`NcrError::InvalidLength`] if `length` is not transferable.
    pub fn new(region: Region, address: u32, length: usize, completion_polls: u32) -> Result<Self> {
        Ok(Self {
            region,
            address,
            word_count: word_count(length)?,
            completion_polls,
        })
    }

    /// Words moved by this transaction.
    pub const fn word_count(&self) -> usize {
        self.word_count
    }

    /// Read from the target into `buffer`.
    ///
    /// # Errors
    ///
    /// - [`NcrError::TransactionTimeout`] if completion is never observed
    /// - [`NcrError::TransactionFailed`] if the status is not success
    pub fn read(&self, nca: &mut dyn RegisterWindow, buffer: &mut [u8]) -> Result<()> {
        debug!(
            "ring read {} @ {:#x}, {} bytes",
            self.region,
            self.address,
            buffer.len()
        );
        let local = self.select(nca)?;
        self.trigger(nca, CommandType::Read, local)?;
        let done = self.wait_for_completion(nca)?;

        if done.status != CommandStatus::Success {
            error!(
                "ring read {} @ {:#x} failed: {:?}",
                self.region, self.address, done.status
            );
            return Err(self.failed(done.status, None));
        }

        read_words(nca, DATA_WINDOW, WordOrder::BigEndian, buffer)
    }

    /// Write `data` to the target.
    ///
    /// # Errors
    ///
    /// - [`NcrError::TransactionTimeout`] if completion is never observed
    /// - [`NcrError::TransactionFailed`] with the extended status value if
    ///   the status is not success
    pub fn write(&self, nca: &mut dyn RegisterWindow, data: &[u8]) -> Result<()> {
        debug!(
            "ring write {} @ {:#x}, {} bytes",
            self.region,
            self.address,
            data.len()
        );
        let local = self.select(nca)?;
        write_words(nca, DATA_WINDOW, WordOrder::BigEndian, data)?;
        self.trigger(nca, CommandType::Write, local)?;
        let done = self.wait_for_completion(nca)?;

        if done.status != CommandStatus::Success {
            let extended = read_be32(nca, EXTENDED_STATUS)?;
            error!(
                "ring write {} @ {:#x} error: {:?} {extended:#x}",
                self.region, self.address, done.status
            );
            return Err(self.failed(done.status, Some(extended)));
        }
        Ok(())
    }

    /// Write CDR2 then CDR1. Returns whether the access is local.
    fn select(&self, nca: &mut dyn RegisterWindow) -> Result<bool> {
        let cdr2 = Cdr2::for_region(self.region);
        write_be32(nca, CDR2, cdr2.encode())?;
        write_be32(nca, CDR1, Cdr1::from_byte_address(self.address).encode())?;
        Ok(cdr2.is_local())
    }

    /// Write CDR0 with `start_done` set; the store is followed by a barrier.
    fn trigger(&self, nca: &mut dyn RegisterWindow, cmd: CommandType, local: bool) -> Result<()> {
        let cdr0 = Cdr0::command(cmd, self.word_count, local).ok_or_else(|| {
            NcrError::invalid_length(self.word_count * 4, "word count exceeds dbs")
        })?;
        write_be32(nca, CDR0, cdr0.encode())
    }

    fn wait_for_completion(&self, nca: &dyn RegisterWindow) -> Result<Cdr0> {
        let outcome = poll_until(
            PollBudget::Iterations(self.completion_polls),
            || read_be32(nca, CDR0).map(Cdr0::decode),
            |cdr0| !cdr0.start_done,
        )?;
        match outcome {
            PollOutcome::Ready { value, polls } => {
                debug!("ring command complete after {polls} polls: {:?}", value.status);
                Ok(value)
            }
            PollOutcome::Expired { polls, .. } => {
                error!("ring transaction {} @ {:#x} timeout!", self.region, self.address);
                Err(NcrError::TransactionTimeout {
                    region: self.region,
                    address: self.address,
                    polls,
                })
            }
        }
    }

    const fn failed(&self, status: CommandStatus, diagnostic: Option<u32>) -> NcrError {
        NcrError::TransactionFailed {
            region: self.region,
            address: self.address,
            status,
            diagnostic,
        }
    }
}
