//! APB2SER bridge layout.
//!
//! Node `0x115` is reached through six register blocks in the APB2SER
//! window, one per target id. Each block is 16 bytes:
//!
//! ```text
//! +0x0  data slot      value to write
//! +0x4  control slot   command tag | address; bit 31 = busy
//! +0x8  result slot    value read
//! ```
//!
//! Targets 1 and 4 carry 16-bit data, the others 32-bit.

/// Base offsets of the per-target blocks, indexed by target id.
pub const TARGET_BLOCKS: [usize; 6] = [0x1E0, 0x1F0, 0x200, 0x210, 0x220, 0x230];

/// Data slot offset within a block.
pub const DATA_SLOT: usize = 0x0;
/// Control slot offset within a block.
pub const CONTROL_SLOT: usize = 0x4;
/// Result slot offset within a block.
pub const RESULT_SLOT: usize = 0x8;

/// Busy flag in the control slot.
pub const BUSY: u32 = 1 << 31;

/// Highest address a block command can carry.
pub const MAX_ADDRESS: u32 = 0xFFFF;

/// Command tags, added to the address in the control slot.
pub mod tag {
    /// Read, 16-bit target.
    pub const READ_16: u32 = 0x84C0_0000;
    /// Read, 32-bit target.
    pub const READ_32: u32 = 0x8540_0000;
    /// Write, 16-bit target.
    pub const WRITE_16: u32 = 0xC4C0_0000;
    /// Write, 32-bit target.
    pub const WRITE_32: u32 = 0xC540_0000;
}

/// Width of a target's data slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataWidth {
    /// 16-bit data (targets 1 and 4).
    Half,
    /// 32-bit data.
    Word,
}

impl DataWidth {
    /// Bytes moved per transfer.
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Half => 2,
            Self::Word => 4,
        }
    }
}

/// One resolved target block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetBlock {
    /// Target id (0–5).
    pub target_id: u16,
    /// Offset of the block in the APB2SER window.
    pub base: usize,
    /// Data width of the target.
    pub width: DataWidth,
}

impl TargetBlock {
    /// Block for `target_id`, or `None` if the bridge has no such target.
    #[must_use]
    pub const fn for_target(target_id: u16) -> Option<Self> {
        if target_id as usize >= TARGET_BLOCKS.len() {
            return None;
        }
        let width = match target_id {
            1 | 4 => DataWidth::Half,
            _ => DataWidth::Word,
        };
        Some(Self {
            target_id,
            base: TARGET_BLOCKS[target_id as usize],
            width,
        })
    }

    /// Offset of the data slot.
    #[must_use]
    pub const fn data_slot(&self) -> usize {
        self.base + DATA_SLOT
    }

    /// Offset of the control slot.
    #[must_use]
    pub const fn control_slot(&self) -> usize {
        self.base + CONTROL_SLOT
    }

    /// Offset of the result slot.
    #[must_use]
    pub const fn result_slot(&self) -> usize {
        self.base + RESULT_SLOT
    }

    /// Control word for a read of `address`.
    #[must_use]
    pub const fn read_command(&self, address: u32) -> u32 {
        match self.width {
            DataWidth::Half => tag::READ_16.wrapping_add(address),
            DataWidth::Word => tag::READ_32.wrapping_add(address),
        }
    }

    /// Control word for a write of `address`.
    #[must_use]
    pub const fn write_command(&self, address: u32) -> u32 {
        match self.width {
            DataWidth::Half => tag::WRITE_16.wrapping_add(address),
            DataWidth::Word => tag::WRITE_32.wrapping_add(address),
        }
    }
}
