//! Ring bus (NCA) access for LSI ACP / Axxia SoCs.
//!
//! Reads and writes registers of remote on-chip nodes through the NCA
//! command descriptor protocol, falling back to the APB2SER bridge for the
//! two reserved node ids. No kernel module required: the physical windows
//! are mapped through `/dev/mem`.
//!
//! # Paths
//!
//! ```text
//! node 0x153       APB2SER overlay      raw word copy, no protocol
//! node 0x115       APB2SER PHY blocks   command + busy poll per word
//! everything else  NCA ring bus         lock, CDR2/CDR1/CDR0, poll, data window
//! ```
//!
//! # Quick start
//!
//! ```no_run
//! use ncr_driver::{NcrConfig, NcrDriver, Region};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ncr = NcrDriver::map(NcrConfig::default())?;
//!
//! let mut word = [0u8; 4];
//! ncr.read(Region::new(0x16, 0x10), 0x100, &mut word)?;
//! ncr.write(Region::new(0x16, 0x10), 0x104, &word)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Simulation
//!
//! [`SimulatedNca`] and [`SimulatedApb2Ser`] model the hardware closely
//! enough to run every path, including lock contention and timeouts:
//!
//! ```
//! use ncr_driver::{NcrConfig, NcrDriver, Region, SimulatedApb2Ser, SimulatedNca};
//!
//! let ncr = NcrDriver::new(NcrConfig::default());
//! ncr.attach(Box::new(SimulatedNca::new()), Some(Box::new(SimulatedApb2Ser::new())));
//!
//! ncr.write(Region::new(0x16, 0x10), 0x40, &[1, 2, 3, 4, 5]).unwrap();
//! let mut back = [0u8; 5];
//! ncr.read(Region::new(0x16, 0x10), 0x40, &mut back).unwrap();
//! assert_eq!(back, [1, 2, 3, 4, 5]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

pub mod backends;
mod barrier;
pub mod bridge;
mod config;
mod driver;
mod error;
pub mod lock;
pub mod poll;
pub mod regio;
pub mod transaction;
pub mod transfer;
mod window;

pub use backends::software::{CommandRecord, MemoryWindow, SimulatedApb2Ser, SimulatedNca};
pub use backends::MmapWindow;
pub use config::{FatalPolicy, NcrConfig};
pub use driver::NcrDriver;
pub use error::{NcrError, Result, Severity};
pub use ncr_chip::{CommandStatus, Platform, Region, RegionClass};
pub use window::{RegisterWindow, WindowType};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        FatalPolicy, NcrConfig, NcrDriver, NcrError, Platform, Region, RegisterWindow, Result,
        Severity,
    };
}
