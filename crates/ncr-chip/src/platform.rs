//! Physical windows per platform variant.
//!
//! ```text
//! Platform  Window    Physical address     Size
//! ──────── ───────── ──────────────────── ────────
//! Axxia     NCA       0x0020_2010_0000     128 KB
//! Axxia     APB2SER   0x0020_1000_0000      64 KB
//! ACP       NCA       0x0020_0052_0000     128 KB
//! ```
//!
//! ACP parts have no APB2SER bridge; regions on the reserved bridge nodes
//! cannot be served there.

/// NCA window size on every platform.
pub const NCA_WINDOW_SIZE: usize = 0x2_0000;

/// APB2SER window size.
pub const APB2SER_WINDOW_SIZE: usize = 0x1_0000;

/// A physical register window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysWindow {
    /// Physical base address.
    pub base: u64,
    /// Length in bytes.
    pub size: usize,
}

/// SoC family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Platform {
    /// Axxia, with the APB2SER bridge.
    #[default]
    Axxia,
    /// ACP (PowerPC), NCA only.
    Acp,
}

impl Platform {
    /// NCA window.
    #[must_use]
    pub const fn nca(self) -> PhysWindow {
        match self {
            Self::Axxia => PhysWindow {
                base: 0x0020_2010_0000,
                size: NCA_WINDOW_SIZE,
            },
            Self::Acp => PhysWindow {
                base: 0x0020_0052_0000,
                size: NCA_WINDOW_SIZE,
            },
        }
    }

    /// APB2SER window, if the platform has one.
    #[must_use]
    pub const fn apb2ser(self) -> Option<PhysWindow> {
        match self {
            Self::Axxia => Some(PhysWindow {
                base: 0x0020_1000_0000,
                size: APB2SER_WINDOW_SIZE,
            }),
            Self::Acp => None,
        }
    }

    /// Whether the APB2SER bridge exists.
    #[must_use]
    pub const fn has_bridge(self) -> bool {
        self.apb2ser().is_some()
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Axxia => write!(f, "Axxia"),
            Self::Acp => write!(f, "ACP"),
        }
    }
}
