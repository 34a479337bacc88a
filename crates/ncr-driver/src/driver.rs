//! Ring bus driver
//!
//! `NcrDriver` is the single entry point: `read` / `write` validate the
//! request, take the domain lock, run the primary or bridge path and release
//! the lock before returning, whatever the outcome.

use crate::backends::mmap::MmapWindow;
use crate::bridge::{Bridge, BridgeTransfer};
use crate::config::{FatalPolicy, NcrConfig};
use crate::error::{NcrError, Result};
use crate::lock::{DomainLock, Windows};
use crate::transaction::Transaction;
use crate::window::RegisterWindow;
use ncr_chip::{Region, RegionClass};
use spin::Mutex;
use tracing::{debug, error, info};

/// Work planned for one call, decided before the lock is taken
#[derive(Debug, Clone, Copy)]
enum Plan {
    Ring(Transaction),
    Bridge(Bridge),
}

/// Ring bus driver handle
///
/// Shareable between threads; every call takes the domain lock for its
/// whole duration and releases it before returning.
#[derive(Debug)]
pub struct NcrDriver {
    config: NcrConfig,
    lock: DomainLock,
    halted: Mutex<Option<String>>,
}

impl NcrDriver {
    /// Driver with no windows mapped. Calls fail with
    /// [`NcrError::NotReady`] until [`attach`](Self::attach) is called.
    pub fn new(config: NcrConfig) -> Self {
        let lock = DomainLock::new(config.lock_domain, config.lock_timeout);
        Self {
            config,
            lock,
            halted: Mutex::new(None),
        }
    }

    /// Map the platform's physical windows through `/dev/mem`.
    ///
    /// # Errors
    ///
    /// Returns error if `/dev/mem` cannot be opened or a window cannot be
    /// mapped.
    pub fn map(config: NcrConfig) -> Result<Self> {
        let platform = config.platform;
        let nca = MmapWindow::open("NCA", platform.nca())?;
        let apb2ser = platform
            .apb2ser()
            .map(|window| MmapWindow::open("APB2SER", window))
            .transpose()?;
        for window in std::iter::once(&nca).chain(apb2ser.as_ref()) {
            info!("ncr: {} window at {:#x}", window.name(), window.phys().base);
        }

        let driver = Self::new(config);
        driver.attach(
            Box::new(nca),
            apb2ser.map(|w| Box::new(w) as Box<dyn RegisterWindow>),
        );
        info!("ncr: available ({platform})");
        Ok(driver)
    }

    /// Install register windows, replacing any previous ones.
    pub fn attach(&self, nca: Box<dyn RegisterWindow>, apb2ser: Option<Box<dyn RegisterWindow>>) {
        debug!(
            "ncr: attaching {} NCA window, APB2SER {}",
            nca.window_type(),
            apb2ser
                .as_ref()
                .map_or_else(|| "absent".to_string(), |w| w.window_type().to_string())
        );
        if self.lock.install(Windows::new(nca, apb2ser)).is_some() {
            info!("ncr: replaced mapped windows");
        }
    }

    /// Drop the register windows. Returns whether any were mapped.
    pub fn unmap(&self) -> bool {
        let unmapped = self.lock.take().is_some();
        if unmapped {
            info!("ncr: windows unmapped");
        }
        unmapped
    }

    /// Whether every window the platform needs is mapped.
    pub fn is_ready(&self) -> bool {
        let needs_bridge = self.config.platform.has_bridge();
        self.lock.with_windows(|windows| {
            windows.is_some_and(|w| !needs_bridge || w.apb2ser.is_some())
        })
    }

    /// Active configuration.
    pub const fn config(&self) -> &NcrConfig {
        &self.config
    }

    /// Reason the driver halted, if a fatal error latched it.
    pub fn halt_reason(&self) -> Option<String> {
        self.halted.lock().clone()
    }

    /// Clear a fatal-error latch.
    pub fn reset_halt(&self) {
        if let Some(reason) = self.halted.lock().take() {
            info!("ncr: halt cleared (was: {reason})");
        }
    }

    /// Read `buffer.len()` bytes at `address` of `region`.
    ///
    /// # Errors
    ///
    /// See [`NcrError`]; the domain lock is released before any error is
    /// returned.
    ///
    /// # Panics
    ///
    /// Panics on a fatal error under [`FatalPolicy::Panic`].
    pub fn read(&self, region: Region, address: u32, buffer: &mut [u8]) -> Result<()> {
        let plan = self.plan(region, address, buffer.len())?;
        let result = self.locked(|windows| match plan {
            Plan::Ring(tx) => tx.read(&mut *windows.nca, buffer),
            Plan::Bridge(bridge) => bridge.read(bridge_window(windows, region)?, buffer),
        });
        self.settle(result)
    }

    /// Write `data` at `address` of `region`.
    ///
    /// # Errors
    ///
    /// See [`NcrError`]; the domain lock is released before any error is
    /// returned.
    ///
    /// # Panics
    ///
    /// Panics on a fatal error under [`FatalPolicy::Panic`].
    pub fn write(&self, region: Region, address: u32, data: &[u8]) -> Result<()> {
        let plan = self.plan(region, address, data.len())?;
        let result = self.locked(|windows| match plan {
            Plan::Ring(tx) => tx.write(&mut *windows.nca, data),
            Plan::Bridge(bridge) => bridge.write(bridge_window(windows, region)?, data),
        });
        self.settle(result)
    }

    /// Validate the request without touching hardware.
    fn plan(&self, region: Region, address: u32, length: usize) -> Result<Plan> {
        if let Some(reason) = self.halt_reason() {
            return Err(NcrError::halted(reason));
        }
        if !self.is_ready() {
            return Err(NcrError::NotReady);
        }

        let class = region.class();
        if class.is_bridge() && !self.config.platform.has_bridge() {
            return Err(NcrError::BridgeUnavailable { region });
        }
        match class {
            RegionClass::Ring => Ok(Plan::Ring(Transaction::new(
                region,
                address,
                length,
                self.config.completion_polls,
            )?)),
            RegionClass::Apb2SerWindow | RegionClass::Apb2SerPhy => {
                let transfer = BridgeTransfer::plan(region, address, length)?;
                Ok(Plan::Bridge(Bridge::new(
                    region,
                    address,
                    transfer,
                    self.config.bridge_polls,
                )))
            }
        }
    }

    /// Run `f` with the domain lock held. The guard drops, releasing the
    /// lock, before this returns.
    fn locked<T>(&self, f: impl FnOnce(&mut Windows) -> Result<T>) -> Result<T> {
        let mut guard = self.lock.acquire()?;
        let windows = guard.windows()?;
        f(windows)
    }

    /// Apply the fatal-error policy to a finished call.
    fn settle<T>(&self, result: Result<T>) -> Result<T> {
        match result {
            Err(e) if e.is_fatal() => {
                error!("ncr: fatal ring bus error: {e}");
                match self.config.fatal_policy {
                    FatalPolicy::Halt => {
                        *self.halted.lock() = Some(e.to_string());
                        Err(e)
                    }
                    FatalPolicy::Panic => panic!("ring bus wedged: {e}"),
                    FatalPolicy::Report => Err(e),
                }
            }
            other => other,
        }
    }
}

fn bridge_window(windows: &mut Windows, region: Region) -> Result<&mut dyn RegisterWindow> {
    match windows.apb2ser.as_mut() {
        Some(window) => Ok(&mut **window),
        None => Err(NcrError::BridgeUnavailable { region }),
    }
}

impl Drop for NcrDriver {
    fn drop(&mut self) {
        if self.lock.take().is_some() {
            debug!("ncr: unmapping windows on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::software::{SimulatedApb2Ser, SimulatedNca};
    use ncr_chip::Platform;

    #[test]
    fn unmapped_driver_is_not_ready() {
        let driver = NcrDriver::new(NcrConfig::default());
        assert!(!driver.is_ready());
        let err = driver.read(Region::new(0x16, 0), 0, &mut [0u8; 4]).unwrap_err();
        assert!(matches!(err, NcrError::NotReady));
    }

    #[test]
    fn axxia_needs_both_windows() {
        let driver = NcrDriver::new(NcrConfig::default());
        driver.attach(Box::new(SimulatedNca::new()), None);
        assert!(!driver.is_ready());
        driver.attach(
            Box::new(SimulatedNca::new()),
            Some(Box::new(SimulatedApb2Ser::new())),
        );
        assert!(driver.is_ready());
        assert!(driver.unmap());
        assert!(!driver.is_ready());
    }

    #[test]
    fn acp_rejects_bridge_regions() {
        let driver = NcrDriver::new(NcrConfig::for_platform(Platform::Acp));
        driver.attach(Box::new(SimulatedNca::new()), None);
        assert!(driver.is_ready());
        let err = driver.read(Region::new(0x115, 0), 0, &mut [0u8; 4]).unwrap_err();
        assert!(matches!(err, NcrError::BridgeUnavailable { .. }));
    }
}
