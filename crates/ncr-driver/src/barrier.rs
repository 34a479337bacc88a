//! Memory barriers for device register ordering
//!
//! - `read_barrier()`: loads before complete before loads after
//! - `write_barrier()`: stores before complete before stores after
//! - `io_barrier()`: all accesses, including device memory, complete before
//!   continuing; used after writes that trigger hardware action

use std::sync::atomic::{fence, Ordering};

/// Read barrier (acquire semantics).
#[inline]
pub fn read_barrier() {
    fence(Ordering::Acquire);
}

/// Write barrier (release semantics).
#[inline]
pub fn write_barrier() {
    fence(Ordering::Release);
}

/// Full barrier that also orders device memory.
///
/// On AArch64 this is `dsb sy`; elsewhere a sequentially consistent fence.
#[inline]
pub fn io_barrier() {
    #[cfg(target_arch = "aarch64")]
    // SAFETY: DSB has no operands and no memory effects beyond ordering.
    unsafe {
        std::arch::asm!("dsb sy", options(nostack, preserves_flags));
    }
    #[cfg(not(target_arch = "aarch64"))]
    fence(Ordering::SeqCst);
}
