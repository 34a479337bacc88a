//! Register window implementations
//!
//! - **Mmap**: `/dev/mem` mapping of a physical window (requires root)
//! - **Software**: simulated NCA and APB2SER hardware for tests and dry runs

pub mod mmap;
pub mod software;

pub use mmap::MmapWindow;
pub use software::{MemoryWindow, SimulatedApb2Ser, SimulatedNca};
