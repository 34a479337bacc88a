//! Ordered register access
//!
//! The NCA is a big-endian device: its registers and data window are
//! accessed with byte-swapping 32-bit loads and stores. Writes that may
//! trigger hardware are followed by a barrier so the store is visible before
//! anything that depends on it. The APB2SER bridge uses little-endian
//! accessors instead.

use crate::barrier::{io_barrier, read_barrier};
use crate::error::Result;
use crate::window::RegisterWindow;

/// Big-endian load.
///
/// # Errors
///
/// Returns error if the offset is outside the window.
pub fn read_be32(window: &dyn RegisterWindow, offset: usize) -> Result<u32> {
    let raw = window.read_u32(offset)?;
    read_barrier();
    let value = u32::from_be(raw);
    tracing::trace!("be32 @ {offset:#x} -> {value:#x}");
    Ok(value)
}

/// Big-endian store followed by a barrier.
///
/// # Errors
///
/// Returns error if the offset is outside the window.
pub fn write_be32(window: &mut dyn RegisterWindow, offset: usize, value: u32) -> Result<()> {
    tracing::trace!("be32 @ {offset:#x} <- {value:#x}");
    window.write_u32(offset, value.to_be())?;
    io_barrier();
    Ok(())
}

/// Little-endian load.
///
/// # Errors
///
/// Returns error if the offset is outside the window.
pub fn read_le32(window: &dyn RegisterWindow, offset: usize) -> Result<u32> {
    let raw = window.read_u32(offset)?;
    read_barrier();
    let value = u32::from_le(raw);
    tracing::trace!("le32 @ {offset:#x} -> {value:#x}");
    Ok(value)
}

/// Little-endian store followed by a barrier.
///
/// # Errors
///
/// Returns error if the offset is outside the window.
pub fn write_le32(window: &mut dyn RegisterWindow, offset: usize, value: u32) -> Result<()> {
    tracing::trace!("le32 @ {offset:#x} <- {value:#x}");
    window.write_u32(offset, value.to_le())?;
    io_barrier();
    Ok(())
}
