//! Secondary path: the APB2SER bridge
//!
//! Two node ids bypass the ring bus:
//!
//! - `0x153`: the APB2SER window is a plain memory overlay; words are copied
//!   at `address & !3` with no command or status protocol.
//! - `0x115`: each target id 0–5 owns a register block. A write stores the
//!   data word, then the write command; a read stores the read command and
//!   takes the result slot once the block is idle. Both wait for bit 31 of
//!   the control slot to clear.
//!
//! A bridge block that stays busy is reported as
//! [`NcrError::BridgeTimeout`], a recoverable error.

use crate::barrier::read_barrier;
use crate::error::{NcrError, Result};
use crate::poll::{poll_until, PollBudget, PollOutcome};
use crate::regio::{read_le32, write_le32};
use crate::transfer::{read_words, write_words, WordOrder};
use crate::window::RegisterWindow;
use ncr_chip::bridge::{DataWidth, TargetBlock, BUSY, MAX_ADDRESS};
use ncr_chip::platform::APB2SER_WINDOW_SIZE;
use ncr_chip::{Region, RegionClass};
use tracing::{debug, warn};

/// A validated bridge transfer
#[derive(Debug, Clone, Copy)]
pub enum BridgeTransfer {
    /// Word copy through the memory overlay
    Overlay {
        /// Window offset of the first word
        offset: usize,
    },
    /// One access through a PHY target block
    Phy {
        /// Target block
        block: TargetBlock,
        /// Address carried in the command word
        address: u32,
    },
}

impl BridgeTransfer {
    /// Validate a bridge access without touching hardware.
    ///
    /// # Errors
    ///
    /// - [`NcrError::InvalidTarget`] for a PHY target id outside 0–5 or an
    ///   address above `0xffff`
    /// - [`NcrError::InvalidLength`] for an empty transfer or a PHY buffer
    ///   shorter than the target's data width
    /// - [`NcrError::OutOfBounds`] for an overlay copy past the window
    pub fn plan(region: Region, address: u32, length: usize) -> Result<Self> {
        if length == 0 {
            return Err(NcrError::invalid_length(length, "empty transfer"));
        }
        match region.class() {
            RegionClass::Apb2SerWindow => {
                let offset = (address & !0x3) as usize;
                let end = offset.saturating_add(length.div_ceil(4) * 4);
                if end > APB2SER_WINDOW_SIZE {
                    return Err(NcrError::OutOfBounds {
                        offset: end,
                        limit: APB2SER_WINDOW_SIZE,
                    });
                }
                Ok(Self::Overlay { offset })
            }
            RegionClass::Apb2SerPhy => {
                if address > MAX_ADDRESS {
                    return Err(NcrError::InvalidTarget { region, address });
                }
                let block = TargetBlock::for_target(region.target_id())
                    .ok_or(NcrError::InvalidTarget { region, address })?;
                check_width(block, length)?;
                Ok(Self::Phy { block, address })
            }
            RegionClass::Ring => Err(NcrError::InvalidTarget { region, address }),
        }
    }
}

/// Store 1–3 trailing bytes over a live overlay word, keeping the rest of it.
fn merge_tail(apb2ser: &mut dyn RegisterWindow, offset: usize, tail: &[u8]) -> Result<()> {
    if tail.is_empty() {
        return Ok(());
    }
    let mut word = apb2ser.read_u32(offset)?.to_ne_bytes();
    read_barrier();
    word[..tail.len()].copy_from_slice(tail);
    apb2ser.write_u32(offset, u32::from_ne_bytes(word))
}

fn check_width(block: TargetBlock, length: usize) -> Result<()> {
    if length < block.width.bytes() {
        return Err(NcrError::invalid_length(length, "shorter than target data width"));
    }
    Ok(())
}

/// Bridge access with a poll budget
#[derive(Debug, Clone, Copy)]
pub struct Bridge {
    region: Region,
    address: u32,
    transfer: BridgeTransfer,
    polls: u32,
}

impl Bridge {
    /// Bridge access for a planned transfer.
    pub const fn new(region: Region, address: u32, transfer: BridgeTransfer, polls: u32) -> Self {
        Self {
            region,
            address,
            transfer,
            polls,
        }
    }

    /// Read into `buffer`.
    ///
    /// A PHY read fills only the first two or four bytes of `buffer`.
    ///
    /// # Errors
    ///
    /// Returns [`NcrError::BridgeTimeout`] if the block stays busy.
    pub fn read(&self, apb2ser: &mut dyn RegisterWindow, buffer: &mut [u8]) -> Result<()> {
        match self.transfer {
            BridgeTransfer::Overlay { offset } => {
                debug!("apb2ser overlay read @ {offset:#x}, {} bytes", buffer.len());
                read_words(apb2ser, offset, WordOrder::Native, buffer)
            }
            BridgeTransfer::Phy { block, address } => {
                debug!("apb2ser phy read target {} @ {address:#x}", block.target_id);
                check_width(block, buffer.len())?;
                write_le32(apb2ser, block.control_slot(), block.read_command(address))?;
                self.wait_idle(apb2ser, block)?;
                let value = read_le32(apb2ser, block.result_slot())?;
                match block.width {
                    DataWidth::Half => {
                        #[allow(clippy::cast_possible_truncation)]
                        let half = value as u16;
                        buffer[..2].copy_from_slice(&half.to_ne_bytes());
                    }
                    DataWidth::Word => buffer[..4].copy_from_slice(&value.to_ne_bytes()),
                }
                Ok(())
            }
        }
    }

    /// Write from `data`.
    ///
    /// A PHY write takes only the first two or four bytes of `data`. An
    /// overlay write ending mid-word leaves the rest of that word intact.
    ///
    /// # Errors
    ///
    /// Returns [`NcrError::BridgeTimeout`] if the block stays busy.
    pub fn write(&self, apb2ser: &mut dyn RegisterWindow, data: &[u8]) -> Result<()> {
        match self.transfer {
            BridgeTransfer::Overlay { offset } => {
                debug!("apb2ser overlay write @ {offset:#x}, {} bytes", data.len());
                let whole = data.len() - data.len() % 4;
                write_words(apb2ser, offset, WordOrder::Native, &data[..whole])?;
                merge_tail(apb2ser, offset + whole, &data[whole..])
            }
            BridgeTransfer::Phy { block, address } => {
                debug!("apb2ser phy write target {} @ {address:#x}", block.target_id);
                check_width(block, data.len())?;
                let value = match block.width {
                    DataWidth::Half => u32::from(u16::from_ne_bytes([data[0], data[1]])),
                    DataWidth::Word => u32::from_ne_bytes([data[0], data[1], data[2], data[3]]),
                };
                write_le32(apb2ser, block.data_slot(), value)?;
                write_le32(apb2ser, block.control_slot(), block.write_command(address))?;
                self.wait_idle(apb2ser, block)
            }
        }
    }

    fn wait_idle(&self, apb2ser: &dyn RegisterWindow, block: TargetBlock) -> Result<()> {
        let outcome = poll_until(
            PollBudget::Iterations(self.polls),
            || read_le32(apb2ser, block.control_slot()),
            |control| control & BUSY == 0,
        )?;
        match outcome {
            PollOutcome::Ready { .. } => Ok(()),
            PollOutcome::Expired { last, polls, .. } => {
                warn!(
                    "apb2ser target {} busy after {polls} polls (control={last:#x})",
                    block.target_id
                );
                Err(NcrError::BridgeTimeout {
                    region: self.region,
                    address: self.address,
                    polls,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::software::SimulatedApb2Ser;
    use ncr_chip::region::{APB2SER_PHY_NODE, APB2SER_WINDOW_NODE};

    fn phy(target: u16) -> Region {
        Region::new(APB2SER_PHY_NODE, target)
    }

    #[test]
    fn plan_rejects_unknown_target() {
        let err = BridgeTransfer::plan(phy(6), 0x10, 4).unwrap_err();
        assert!(matches!(err, NcrError::InvalidTarget { .. }));
    }

    #[test]
    fn plan_rejects_wide_address() {
        let err = BridgeTransfer::plan(phy(0), 0x1_0000, 4).unwrap_err();
        assert!(matches!(err, NcrError::InvalidTarget { address: 0x1_0000, .. }));
        assert!(BridgeTransfer::plan(phy(0), 0xFFFF, 4).is_ok());
    }

    #[test]
    fn plan_overlay_aligns_address() {
        let plan = BridgeTransfer::plan(Region::new(APB2SER_WINDOW_NODE, 0), 0x107, 4).unwrap();
        assert!(matches!(plan, BridgeTransfer::Overlay { offset: 0x104 }));
    }

    #[test]
    fn plan_rejects_overlay_past_window() {
        let region = Region::new(APB2SER_WINDOW_NODE, 0);
        assert!(BridgeTransfer::plan(region, 0xFFFC, 4).is_ok());
        let err = BridgeTransfer::plan(region, 0xFFFC, 5).unwrap_err();
        assert!(matches!(err, NcrError::OutOfBounds { .. }));
    }

    #[test]
    fn plan_rejects_short_buffer() {
        assert!(BridgeTransfer::plan(phy(0), 0, 2).is_err());
        assert!(BridgeTransfer::plan(phy(1), 0, 2).is_ok());
    }

    #[test]
    fn phy_write_then_read_16_bit() {
        let sim = SimulatedApb2Ser::new();
        let mut window = sim.clone();
        let region = phy(4);
        let plan = BridgeTransfer::plan(region, 0x22, 2).unwrap();
        let bridge = Bridge::new(region, 0x22, plan, 100);

        bridge.write(&mut window, &0xBEEFu16.to_ne_bytes()).unwrap();
        assert_eq!(sim.phy_value(4, 0x22), Some(0xBEEF));

        let mut out = [0u8; 4];
        bridge.read(&mut window, &mut out).unwrap();
        assert_eq!(u16::from_ne_bytes([out[0], out[1]]), 0xBEEF);
        assert_eq!(&out[2..], &[0, 0]);
    }

    #[test]
    fn phy_read_32_bit() {
        let sim = SimulatedApb2Ser::new().with_busy_polls(3);
        sim.set_phy_value(2, 0x40, 0x1234_5678);
        let mut window = sim.clone();
        let region = phy(2);
        let plan = BridgeTransfer::plan(region, 0x40, 4).unwrap();
        let mut out = [0u8; 4];
        Bridge::new(region, 0x40, plan, 100).read(&mut window, &mut out).unwrap();
        assert_eq!(u32::from_ne_bytes(out), 0x1234_5678);
    }

    #[test]
    fn busy_block_times_out() {
        let sim = SimulatedApb2Ser::new().with_stuck_busy();
        let mut window = sim.clone();
        let region = phy(0);
        let plan = BridgeTransfer::plan(region, 0, 4).unwrap();
        let err = Bridge::new(region, 0, plan, 20)
            .read(&mut window, &mut [0u8; 4])
            .unwrap_err();
        assert!(matches!(err, NcrError::BridgeTimeout { polls: 20, .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn overlay_partial_word_keeps_neighbours() {
        let sim = SimulatedApb2Ser::new();
        sim.set_bytes(0x800, &[0xAA; 8]);
        let mut window = sim.clone();
        let region = Region::new(APB2SER_WINDOW_NODE, 0);
        let plan = BridgeTransfer::plan(region, 0x800, 5).unwrap();
        Bridge::new(region, 0x800, plan, 10)
            .write(&mut window, &[1, 2, 3, 4, 5])
            .unwrap();
        assert_eq!(sim.bytes(0x800, 8), [1, 2, 3, 4, 5, 0xAA, 0xAA, 0xAA]);
    }

    #[test]
    fn overlay_copies_words() {
        let sim = SimulatedApb2Ser::new();
        let mut window = sim.clone();
        let region = Region::new(APB2SER_WINDOW_NODE, 0);
        let plan = BridgeTransfer::plan(region, 0x800, 8).unwrap();
        let bridge = Bridge::new(region, 0x800, plan, 10);
        bridge.write(&mut window, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(sim.bytes(0x800, 8), [1, 2, 3, 4, 5, 6, 7, 8]);

        let mut out = [0u8; 8];
        bridge.read(&mut window, &mut out).unwrap();
        assert_eq!(out, [1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
