//! Error types for ring bus operations

use ncr_chip::{CommandStatus, Region};
use thiserror::Error;

/// Result type alias for ring bus operations
pub type Result<T> = std::result::Result<T, NcrError>;

/// How an error affects the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Hardware state is unknown; further transactions may corrupt the bus.
    Fatal,
    /// The call failed but the bus is usable.
    Recoverable,
}

/// Errors that can occur during ring bus operations
#[derive(Debug, Error)]
pub enum NcrError {
    /// Register windows are not mapped
    #[error("Ring bus not ready: register windows are not mapped")]
    NotReady,

    /// A previous fatal error latched the driver
    #[error("Ring bus halted after fatal error: {reason}")]
    Halted {
        /// Description of the fatal error
        reason: String,
    },

    /// Hardware lock never granted
    #[error("Lock domain {domain} not granted after {waited_ms}ms")]
    LockTimeout {
        /// Lock domain
        domain: u32,
        /// Time spent waiting
        waited_ms: u64,
    },

    /// Command in flight when the lock was taken never finished
    #[error("Previous ring bus command didn't complete after {waited_ms}ms")]
    PreviousCommandIncomplete {
        /// Time spent waiting
        waited_ms: u64,
    },

    /// Primary path completion never observed
    #[error("Transaction on {region} @ {address:#x} timed out after {polls} polls")]
    TransactionTimeout {
        /// Target region
        region: Region,
        /// Target address
        address: u32,
        /// Polls performed
        polls: u32,
    },

    /// Hardware reported a non-success completion status
    #[error(
        "Transaction on {region} @ {address:#x} failed: status {status:?}{}",
        diagnostic_suffix(.diagnostic)
    )]
    TransactionFailed {
        /// Target region
        region: Region,
        /// Target address
        address: u32,
        /// Completion status read from CDR0
        status: CommandStatus,
        /// Extended status register value (writes only)
        diagnostic: Option<u32>,
    },

    /// Bridge target id or address out of range
    #[error("Invalid bridge target {region} @ {address:#x}")]
    InvalidTarget {
        /// Target region
        region: Region,
        /// Target address
        address: u32,
    },

    /// Bridge block stayed busy
    #[error("Bridge target {region} @ {address:#x} busy after {polls} polls")]
    BridgeTimeout {
        /// Target region
        region: Region,
        /// Target address
        address: u32,
        /// Polls performed
        polls: u32,
    },

    /// Platform has no APB2SER bridge
    #[error("Region {region} needs the APB2SER bridge, which this platform lacks")]
    BridgeUnavailable {
        /// Target region
        region: Region,
    },

    /// Transfer length not expressible by the hardware
    #[error("Invalid transfer length {length}: {reason}")]
    InvalidLength {
        /// Requested length in bytes
        length: usize,
        /// Why it was rejected
        reason: &'static str,
    },

    /// Register access outside a mapped window
    #[error("Out of bounds access: offset={offset:#x}, limit={limit:#x}")]
    OutOfBounds {
        /// Offending offset
        offset: usize,
        /// Window size
        limit: usize,
    },

    /// Mapping a physical window failed
    #[error("Failed to map {window} window: {reason}")]
    Mapping {
        /// Window name
        window: &'static str,
        /// Reason for failure
        reason: String,
    },

    /// I/O error while opening the memory device
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },
}

#[allow(clippy::ref_option)]
fn diagnostic_suffix(diagnostic: &Option<u32>) -> String {
    diagnostic.map_or_else(String::new, |value| format!(", extended status {value:#x}"))
}

impl NcrError {
    /// Severity tier of this error.
    ///
    /// Lock and primary-path timeouts leave the ring bus in an unknown
    /// state and are fatal. Everything else, including bridge timeouts, is
    /// recoverable.
    pub const fn severity(&self) -> Severity {
        match self {
            Self::LockTimeout { .. }
            | Self::PreviousCommandIncomplete { .. }
            | Self::TransactionTimeout { .. } => Severity::Fatal,
            _ => Severity::Recoverable,
        }
    }

    /// Shorthand for `severity() == Severity::Fatal`.
    pub const fn is_fatal(&self) -> bool {
        matches!(self.severity(), Severity::Fatal)
    }

    /// Create a mapping error
    pub fn mapping(window: &'static str, reason: impl Into<String>) -> Self {
        Self::Mapping {
            window,
            reason: reason.into(),
        }
    }

    /// Create an invalid length error
    pub const fn invalid_length(length: usize, reason: &'static str) -> Self {
        Self::InvalidLength { length, reason }
    }

    /// Create a halted error
    pub fn halted(reason: impl Into<String>) -> Self {
        Self::Halted {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_tiers() {
        let region = Region::new(0x16, 0);
        assert!(NcrError::LockTimeout { domain: 0, waited_ms: 1000 }.is_fatal());
        assert!(NcrError::PreviousCommandIncomplete { waited_ms: 1000 }.is_fatal());
        assert!(NcrError::TransactionTimeout { region, address: 0, polls: 1 }.is_fatal());
        assert!(!NcrError::BridgeTimeout { region, address: 0, polls: 1 }.is_fatal());
        assert!(!NcrError::NotReady.is_fatal());
    }

    #[test]
    fn io_errors_convert() {
        let err: NcrError = std::io::Error::from(std::io::ErrorKind::PermissionDenied).into();
        assert!(matches!(err, NcrError::Io { .. }));
        assert_eq!(err.severity(), Severity::Recoverable);
    }

    #[test]
    fn failure_message_carries_diagnostic() {
        let err = NcrError::TransactionFailed {
            region: Region::new(0x16, 0x1),
            address: 0x100,
            status: CommandStatus::Failed,
            diagnostic: Some(0xdead),
        };
        let msg = err.to_string();
        assert!(msg.contains("0x16.0x1"));
        assert!(msg.contains("0xdead"));
    }
}
