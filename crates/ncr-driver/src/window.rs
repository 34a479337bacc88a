//! Register window abstraction
//!
//! A window is a mapped span of device registers accessed as raw 32-bit
//! words in CPU byte order. Byte-order conversion and barriers live in
//! [`regio`](crate::regio); windows only move bits.

use crate::error::Result;
use std::fmt::Debug;

/// Mapped register window
///
/// Implementations perform volatile accesses with no byte swapping.
/// `read_u32` takes `&self` because device reads are side-effect free from
/// the CPU's point of view, even when the device reacts to them.
pub trait RegisterWindow: Debug + Send {
    /// Read the raw word at `offset`
    ///
    /// # Errors
    ///
    /// Returns error if `offset + 4` exceeds the window.
    fn read_u32(&self, offset: usize) -> Result<u32>;

    /// Write the raw word at `offset`
    ///
    /// # Errors
    ///
    /// Returns error if `offset + 4` exceeds the window.
    fn write_u32(&mut self, offset: usize, value: u32) -> Result<()>;

    /// Window length in bytes
    fn size(&self) -> usize;

    /// Window type for debugging
    fn window_type(&self) -> WindowType;
}

/// Window type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowType {
    /// `/dev/mem` mapping of the physical window
    Mmap,

    /// Simulated hardware, no device required
    Simulated,
}

impl std::fmt::Display for WindowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mmap => write!(f, "Mmap"),
            Self::Simulated => write!(f, "Simulated"),
        }
    }
}
