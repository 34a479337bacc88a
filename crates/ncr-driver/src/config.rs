//! Driver configuration
//!
//! Defaults reproduce the hardware contract: lock domain 0, a 1000 ms lock
//! deadline and a 400 000 poll budget for both completion sites.

use ncr_chip::regs::{DEFAULT_LOCK_DOMAIN, LOCK_TIMEOUT_MS, WFC_TIMEOUT_POLLS};
use ncr_chip::Platform;
use std::time::Duration;

/// What the driver does once a fatal error has been observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FatalPolicy {
    /// Return the error and refuse further transactions until
    /// [`NcrDriver::reset_halt`](crate::NcrDriver::reset_halt).
    #[default]
    Halt,
    /// Panic, taking the process down with the bus.
    Panic,
    /// Return the error and keep serving calls.
    Report,
}

/// Ring bus driver configuration
#[derive(Debug, Clone)]
pub struct NcrConfig {
    /// SoC family, selects physical windows and bridge availability
    pub platform: Platform,

    /// Hardware lock domain
    pub lock_domain: u32,

    /// Deadline for the lock handshake and for draining a previous command
    pub lock_timeout: Duration,

    /// CDR0 polls before a transaction is declared wedged
    pub completion_polls: u32,

    /// Control slot polls before a bridge transfer gives up
    pub bridge_polls: u32,

    /// Reaction to fatal errors
    pub fatal_policy: FatalPolicy,
}

impl Default for NcrConfig {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            lock_domain: DEFAULT_LOCK_DOMAIN,
            lock_timeout: Duration::from_millis(LOCK_TIMEOUT_MS),
            completion_polls: WFC_TIMEOUT_POLLS,
            bridge_polls: WFC_TIMEOUT_POLLS,
            fatal_policy: FatalPolicy::default(),
        }
    }
}

impl NcrConfig {
    /// Configuration for `platform` with hardware defaults.
    pub fn for_platform(platform: Platform) -> Self {
        Self {
            platform,
            ..Self::default()
        }
    }

    /// Set the lock domain.
    #[must_use]
    pub const fn with_lock_domain(mut self, domain: u32) -> Self {
        self.lock_domain = domain;
        self
    }

    /// Set the lock deadline.
    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Set the primary completion poll budget.
    #[must_use]
    pub const fn with_completion_polls(mut self, polls: u32) -> Self {
        self.completion_polls = polls;
        self
    }

    /// Set the bridge poll budget.
    #[must_use]
    pub const fn with_bridge_polls(mut self, polls: u32) -> Self {
        self.bridge_polls = polls;
        self
    }

    /// Set the fatal error policy.
    #[must_use]
    pub const fn with_fatal_policy(mut self, policy: FatalPolicy) -> Self {
        self.fatal_policy = policy;
        self
    }
}
