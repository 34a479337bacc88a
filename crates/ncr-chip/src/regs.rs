//! NCA window register map.
//!
//! Offsets are relative to the base of the NCA window (0x20000 bytes).
//!
//! ```text
//! 0x00e4        Extended status (read after a failed write)
//! 0x00f0        CDR0  control / status, writing start_done=1 triggers
//! 0x00f4        CDR1  target word address
//! 0x00f8        CDR2  target node id / target id
//! 0x1000..      Data window (payload words, big-endian)
//! 0xff80 + 4*d  Lock register for domain d (reads 0 when granted)
//! ```

// ── Command descriptor ───────────────────────────────────────────────────────

/// Command data register 0: control bits, status, transfer count.
pub const CDR0: usize = 0x00F0;
/// Command data register 1: target word address.
pub const CDR1: usize = 0x00F4;
/// Command data register 2: target node id and target id.
pub const CDR2: usize = 0x00F8;

/// Extended status, holds a diagnostic value after a failed write.
pub const EXTENDED_STATUS: usize = 0x00E4;

// ── Data window ──────────────────────────────────────────────────────────────

/// First word of the payload data window.
pub const DATA_WINDOW: usize = 0x1000;

// ── Lock domains ─────────────────────────────────────────────────────────────

/// Lock register of domain 0.
pub const LOCK_BASE: usize = 0xFF80;
/// Stride between lock registers.
pub const LOCK_STRIDE: usize = 4;
/// Domain used by the driver unless configured otherwise.
pub const DEFAULT_LOCK_DOMAIN: u32 = 0;

/// Offset of the lock register for `domain`.
#[must_use]
pub const fn lock_register(domain: u32) -> usize {
    LOCK_BASE + domain as usize * LOCK_STRIDE
}

/// Bytes between the start of the data window and the first lock register.
pub const DATA_WINDOW_CAPACITY: usize = LOCK_BASE - DATA_WINDOW;

// ── Timing ───────────────────────────────────────────────────────────────────

/// Polls of CDR0 allowed before a transaction is declared wedged.
pub const WFC_TIMEOUT_POLLS: u32 = 400_000;

/// Deadline for the lock handshake and for draining a previous command (ms).
pub const LOCK_TIMEOUT_MS: u64 = 1000;

/// Largest transfer count that fits the 16-bit `dbs` field.
pub const MAX_WORD_COUNT: usize = 1 << 16;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_words_are_adjacent() {
        assert_eq!(CDR1 - CDR0, 4);
        assert_eq!(CDR2 - CDR1, 4);
    }

    #[test]
    fn lock_registers_follow_domain() {
        assert_eq!(lock_register(0), 0xFF80);
        assert_eq!(lock_register(3), 0xFF8C);
    }

    #[test]
    fn data_window_stops_before_lock_registers() {
        assert!(DATA_WINDOW + DATA_WINDOW_CAPACITY <= lock_register(0));
    }
}
