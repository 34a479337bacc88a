//! Command descriptor register images.
//!
//! The three command data registers are modelled as plain structs with
//! explicit `encode` / `decode` to the raw 32-bit value the hardware sees.
//! Bit numbering is LSB = bit 0.
//!
//! ```text
//! CDR0  31     start_done
//!       30..25 unused
//!       24     local_bit
//!       23..22 status
//!       21     byte_swap_enable
//!       20     cfg_cmpl_int_enable
//!       19..16 cmd_type
//!       15..0  dbs (count - 1)
//!
//! CDR1  31..0  target word address (byte address >> 2)
//!
//! CDR2  31..16 unused
//!       15..8  target_node_id
//!       7..0   target_id_address_upper (0xff = local access)
//! ```

use crate::region::Region;
use crate::regs::MAX_WORD_COUNT;

const START_DONE: u32 = 1 << 31;
const LOCAL_BIT: u32 = 1 << 24;
const STATUS_SHIFT: u32 = 22;
const STATUS_MASK: u32 = 0x3;
const BYTE_SWAP_ENABLE: u32 = 1 << 21;
const CFG_CMPL_INT_ENABLE: u32 = 1 << 20;
const CMD_TYPE_SHIFT: u32 = 16;
const CMD_TYPE_MASK: u32 = 0xF;
const DBS_MASK: u32 = 0xFFFF;

/// Target id value that marks an access local to the NCA itself.
pub const LOCAL_TARGET_ID: u8 = 0xFF;

/// Ring bus command type (CDR0 bits 19..16).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandType {
    /// Block read from the target into the data window.
    Read = 4,
    /// Block write from the data window to the target.
    Write = 5,
}

impl CommandType {
    /// Decode a raw 4-bit command type.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            4 => Some(Self::Read),
            5 => Some(Self::Write),
            _ => None,
        }
    }
}

/// Completion status (CDR0 bits 23..22).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandStatus {
    /// No command has run.
    Idle = 0,
    /// A command is executing.
    Busy = 1,
    /// The previous command failed.
    Failed = 2,
    /// The previous command completed successfully.
    Success = 3,
}

impl CommandStatus {
    /// Decode the two status bits. Only the low two bits are considered.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        match bits & STATUS_MASK {
            0 => Self::Idle,
            1 => Self::Busy,
            2 => Self::Failed,
            _ => Self::Success,
        }
    }

    /// Raw two-bit code.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self as u8
    }
}

/// CDR0: control word. Writing it with `start_done` set starts execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cdr0 {
    /// Set by software to start, cleared by hardware on completion.
    pub start_done: bool,
    /// Access targets the NCA itself rather than a remote node.
    pub local_bit: bool,
    /// Completion status.
    pub status: CommandStatus,
    /// Hardware byte swapping (not used by this driver).
    pub byte_swap_enable: bool,
    /// Completion interrupt (not used by this driver).
    pub cfg_cmpl_int_enable: bool,
    /// Raw command type bits.
    pub cmd_type: u8,
    /// Transfer count minus one.
    pub dbs: u16,
}

impl Cdr0 {
    /// Build the trigger word for a command of `word_count` words.
    ///
    /// Returns `None` if `word_count` is zero or does not fit `dbs`.
    #[must_use]
    pub fn command(cmd: CommandType, word_count: usize, local: bool) -> Option<Self> {
        if word_count == 0 || word_count > MAX_WORD_COUNT {
            return None;
        }
        let dbs = u16::try_from(word_count - 1).ok()?;
        Some(Self {
            start_done: true,
            local_bit: local,
            status: CommandStatus::Idle,
            byte_swap_enable: false,
            cfg_cmpl_int_enable: false,
            cmd_type: cmd as u8,
            dbs,
        })
    }

    /// Raw register value.
    #[must_use]
    pub const fn encode(&self) -> u32 {
        let mut raw = self.dbs as u32;
        raw |= (self.cmd_type as u32 & CMD_TYPE_MASK) << CMD_TYPE_SHIFT;
        if self.cfg_cmpl_int_enable {
            raw |= CFG_CMPL_INT_ENABLE;
        }
        if self.byte_swap_enable {
            raw |= BYTE_SWAP_ENABLE;
        }
        raw |= (self.status as u32) << STATUS_SHIFT;
        if self.local_bit {
            raw |= LOCAL_BIT;
        }
        if self.start_done {
            raw |= START_DONE;
        }
        raw
    }

    /// Parse a raw register value. Unused bits are ignored.
    #[must_use]
    pub const fn decode(raw: u32) -> Self {
        Self {
            start_done: raw & START_DONE != 0,
            local_bit: raw & LOCAL_BIT != 0,
            status: CommandStatus::from_bits(raw >> STATUS_SHIFT),
            byte_swap_enable: raw & BYTE_SWAP_ENABLE != 0,
            cfg_cmpl_int_enable: raw & CFG_CMPL_INT_ENABLE != 0,
            #[allow(clippy::cast_possible_truncation)]
            cmd_type: ((raw >> CMD_TYPE_SHIFT) & CMD_TYPE_MASK) as u8,
            #[allow(clippy::cast_possible_truncation)]
            dbs: (raw & DBS_MASK) as u16,
        }
    }

    /// Decoded command type, if it is one the driver issues.
    #[must_use]
    pub const fn command_type(&self) -> Option<CommandType> {
        CommandType::from_bits(self.cmd_type)
    }

    /// Number of words the command transfers.
    #[must_use]
    pub const fn word_count(&self) -> usize {
        self.dbs as usize + 1
    }
}

/// CDR1: target word address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cdr1 {
    /// Byte address shifted right by two.
    pub target_address: u32,
}

impl Cdr1 {
    /// Word address for a byte address.
    #[must_use]
    pub const fn from_byte_address(address: u32) -> Self {
        Self {
            target_address: address >> 2,
        }
    }

    /// Raw register value.
    #[must_use]
    pub const fn encode(&self) -> u32 {
        self.target_address
    }

    /// Parse a raw register value.
    #[must_use]
    pub const fn decode(raw: u32) -> Self {
        Self { target_address: raw }
    }
}

/// CDR2: target select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cdr2 {
    /// Ring node owning the address space.
    pub target_node_id: u8,
    /// Target id / upper address bits within the node.
    pub target_id_address_upper: u8,
}

impl Cdr2 {
    /// Target select for a region. Both ids are truncated to eight bits.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn for_region(region: Region) -> Self {
        Self {
            target_node_id: region.node_id() as u8,
            target_id_address_upper: region.target_id() as u8,
        }
    }

    /// Whether the access is local (sets `local_bit` in CDR0).
    #[must_use]
    pub const fn is_local(&self) -> bool {
        self.target_id_address_upper == LOCAL_TARGET_ID
    }

    /// Raw register value.
    #[must_use]
    pub const fn encode(&self) -> u32 {
        ((self.target_node_id as u32) << 8) | self.target_id_address_upper as u32
    }

    /// Parse a raw register value.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn decode(raw: u32) -> Self {
        Self {
            target_node_id: (raw >> 8) as u8,
            target_id_address_upper: raw as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_trigger_layout() {
        let cdr0 = Cdr0::command(CommandType::Read, 1, false).unwrap();
        assert_eq!(cdr0.encode(), 0x8004_0000);
    }

    #[test]
    fn write_trigger_local_layout() {
        let cdr0 = Cdr0::command(CommandType::Write, 16, true).unwrap();
        assert_eq!(cdr0.encode(), 0x8105_000F);
    }

    #[test]
    fn dbs_is_count_minus_one() {
        for count in [1usize, 2, 255, 4096, 65535, 65536] {
            let cdr0 = Cdr0::command(CommandType::Read, count, false).unwrap();
            assert_eq!(cdr0.dbs as usize, count - 1);
            assert_eq!(Cdr0::decode(cdr0.encode()).word_count(), count);
        }
    }

    #[test]
    fn count_out_of_range_is_rejected() {
        assert!(Cdr0::command(CommandType::Read, 0, false).is_none());
        assert!(Cdr0::command(CommandType::Write, 65537, false).is_none());
    }

    #[test]
    fn status_field_decodes() {
        assert_eq!(Cdr0::decode(0x0040_0000).status, CommandStatus::Busy);
        assert_eq!(Cdr0::decode(0x0080_0000).status, CommandStatus::Failed);
        assert_eq!(Cdr0::decode(0x00C0_0000).status, CommandStatus::Success);
        assert!(!Cdr0::decode(0x00C0_0000).start_done);
    }

    #[test]
    fn decode_ignores_unused_bits() {
        let cdr0 = Cdr0::decode(0x7E00_0000);
        assert!(!cdr0.start_done);
        assert!(!cdr0.local_bit);
        assert_eq!(cdr0.status, CommandStatus::Idle);
    }

    #[test]
    fn target_select_layout() {
        let cdr2 = Cdr2::for_region(Region::new(0x16, 0x10));
        assert_eq!(cdr2.encode(), 0x1610);
        assert!(!cdr2.is_local());
        assert!(Cdr2::for_region(Region::new(0x16, 0xFF)).is_local());
    }

    #[test]
    fn address_is_word_granular() {
        assert_eq!(Cdr1::from_byte_address(0x103).encode(), 0x40);
    }
}
