//! Physical register window mapped through `/dev/mem`
//!
//! The window is opened with `O_SYNC` so the kernel maps it uncached, which
//! is what device registers need. All accesses are bounds-checked and
//! volatile.

use crate::error::{NcrError, Result};
use crate::window::{RegisterWindow, WindowType};
use ncr_chip::platform::PhysWindow;
use rustix::fs::OFlags;
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsFd;
use std::ptr::NonNull;

/// Path of the physical memory device.
pub const DEV_MEM: &str = "/dev/mem";

/// Memory-mapped physical register window
#[derive(Debug)]
pub struct MmapWindow {
    ptr: NonNull<u8>,
    size: usize,
    _file: File,
    name: &'static str,
    phys: PhysWindow,
}

impl MmapWindow {
    /// Map `phys` from `/dev/mem`
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - [`NcrError::Io`]: `/dev/mem` cannot be opened (not root)
    /// - [`NcrError::Mapping`]: the window is empty or mmap fails
    ///   (`CONFIG_STRICT_DEVMEM`)
    pub fn open(name: &'static str, phys: PhysWindow) -> Result<Self> {
        if phys.size == 0 {
            return Err(NcrError::mapping(name, "window size is 0"));
        }
        tracing::debug!(
            "Mapping {name} window: {:#x} + {:#x}",
            phys.base,
            phys.size
        );

        // Flag bits are small positive values
        #[allow(clippy::cast_possible_wrap)]
        let sync_flag = OFlags::SYNC.bits() as i32;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(sync_flag)
            .open(DEV_MEM)?;

        // SAFETY: mmap of a device window. Preconditions:
        // - file is an open /dev/mem descriptor, kept alive in `_file`
        // - size is non-zero (checked above)
        // - offset is the page-aligned physical base of the window
        // - MAP_SHARED so stores reach the device
        // The mapping is released in Drop.
        let addr = unsafe {
            mmap(
                std::ptr::null_mut(),
                phys.size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                phys.base,
            )
        }
        .map_err(|e| NcrError::mapping(name, format!("mmap failed: {e}")))?;

        let ptr = NonNull::new(addr.cast::<u8>())
            .ok_or_else(|| NcrError::mapping(name, "mmap returned null"))?;

        tracing::info!(
            "Mapped {name} window {:#x} ({} KB at {ptr:p})",
            phys.base,
            phys.size / 1024
        );

        Ok(Self {
            ptr,
            size: phys.size,
            _file: file,
            name,
            phys,
        })
    }

    /// Window name
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Physical window
    #[must_use]
    pub const fn phys(&self) -> PhysWindow {
        self.phys
    }

    fn check(&self, offset: usize) -> Result<()> {
        if offset % 4 != 0 || offset + 4 > self.size {
            return Err(NcrError::OutOfBounds {
                offset,
                limit: self.size,
            });
        }
        Ok(())
    }
}

impl RegisterWindow for MmapWindow {
    fn read_u32(&self, offset: usize) -> Result<u32> {
        self.check(offset)?;
        // SAFETY: Volatile read from a mapped device register.
        // - offset + 4 <= size and offset is 4-byte aligned (checked above)
        // - ptr is valid for `size` bytes for the lifetime of self
        // - the mapping base is page aligned, so the u32 pointer is aligned
        #[allow(clippy::cast_ptr_alignment)]
        let value = unsafe { self.ptr.as_ptr().add(offset).cast::<u32>().read_volatile() };
        Ok(value)
    }

    fn write_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        self.check(offset)?;
        // SAFETY: Volatile write to a mapped device register; same
        // invariants as read_u32. The store has device side effects, so it
        // must not be elided or merged.
        #[allow(clippy::cast_ptr_alignment)]
        unsafe {
            self.ptr.as_ptr().add(offset).cast::<u32>().write_volatile(value);
        }
        Ok(())
    }

    fn size(&self) -> usize {
        self.size
    }

    fn window_type(&self) -> WindowType {
        WindowType::Mmap
    }
}

impl Drop for MmapWindow {
    fn drop(&mut self) {
        tracing::debug!("Unmapping {} window {:#x}", self.name, self.phys.base);

        // SAFETY: ptr and size are exactly those returned by / passed to
        // mmap in open(), and Drop runs once.
        unsafe {
            if let Err(e) = munmap(self.ptr.as_ptr().cast(), self.size) {
                tracing::error!("munmap failed during drop: {e}");
            }
        }
    }
}

// SAFETY: MmapWindow owns its mapping exclusively; moving it to another
// thread does not invalidate the mapping, which is process-wide.
unsafe impl Send for MmapWindow {}

#[cfg(test)]
mod tests {
    use super::*;
    use ncr_chip::Platform;

    #[test]
    #[ignore] // Requires root and Axxia hardware
    fn map_nca_window() {
        let window = MmapWindow::open("NCA", Platform::Axxia.nca()).expect("map NCA");
        assert_eq!(window.size(), 0x2_0000);
        assert_eq!(window.name(), "NCA");
        assert_eq!(window.phys(), Platform::Axxia.nca());
        assert_eq!(window.window_type(), WindowType::Mmap);
    }

    #[test]
    fn empty_window_is_rejected_before_open() {
        let phys = PhysWindow { base: 0, size: 0 };
        let err = MmapWindow::open("NCA", phys).unwrap_err();
        assert!(matches!(err, NcrError::Mapping { window: "NCA", .. }));
    }
}
