// SPDX-License-Identifier: AGPL-3.0-only

//! Software (simulated) register windows
//!
//! Implements [`RegisterWindow`] with in-memory models of the hardware so
//! the whole driver runs without an Axxia board:
//!
//! 1. **CI without hardware**: every protocol path, including timeouts and
//!    failure statuses, is exercised by the test suite.
//! 2. **Dry runs**: the `ncr` CLI can target the simulation with
//!    `--simulate`.
//!
//! ## Models
//!
//! - [`MemoryWindow`]: plain memory, counts reads and writes.
//! - [`SimulatedNca`]: lock registers that grant on read and release on a
//!   zero write, a command engine that executes CDR0 triggers against a
//!   per-node word store after a configurable number of polls, and a data
//!   window. Registers are stored big-endian, as the device sees them.
//! - [`SimulatedApb2Ser`]: the APB2SER window as memory, with the six PHY
//!   target blocks decoded. Registers are stored little-endian.
//!
//! Every model is a cheap handle around shared state: clone it, hand one
//! copy to the driver and inspect the other.

use crate::error::{NcrError, Result};
use crate::window::{RegisterWindow, WindowType};
use ncr_chip::bridge::{tag, DataWidth, TargetBlock, BUSY};
use ncr_chip::platform::{APB2SER_WINDOW_SIZE, NCA_WINDOW_SIZE};
use ncr_chip::regs::{CDR0, CDR1, CDR2, DATA_WINDOW, EXTENDED_STATUS, LOCK_BASE, LOCK_STRIDE};
use ncr_chip::{Cdr0, Cdr1, Cdr2, CommandStatus, CommandType, Region};
use spin::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

/// Lock domains modelled by [`SimulatedNca`].
const LOCK_DOMAINS: usize = 32;

fn check(offset: usize, size: usize) -> Result<()> {
    if offset % 4 != 0 || offset + 4 > size {
        return Err(NcrError::OutOfBounds {
            offset,
            limit: size,
        });
    }
    Ok(())
}

fn raw_word(mem: &[u8], offset: usize) -> u32 {
    u32::from_ne_bytes([mem[offset], mem[offset + 1], mem[offset + 2], mem[offset + 3]])
}

// ── Plain memory ─────────────────────────────────────────────────────────────

#[derive(Debug)]
struct MemoryState {
    mem: Vec<u8>,
    reads: usize,
    writes: usize,
}

/// Plain memory window
#[derive(Debug, Clone)]
pub struct MemoryWindow {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryWindow {
    /// Zero-filled window of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                mem: vec![0; size],
                reads: 0,
                writes: 0,
            })),
        }
    }

    /// Copy of `len` bytes at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the range is outside the window.
    pub fn bytes(&self, offset: usize, len: usize) -> Vec<u8> {
        self.state.lock().mem[offset..offset + len].to_vec()
    }

    /// Overwrite bytes at `offset` without counting an access.
    ///
    /// # Panics
    ///
    /// Panics if the range is outside the window.
    pub fn set_bytes(&self, offset: usize, data: &[u8]) {
        self.state.lock().mem[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Word reads performed.
    pub fn read_count(&self) -> usize {
        self.state.lock().reads
    }

    /// Word writes performed.
    pub fn write_count(&self) -> usize {
        self.state.lock().writes
    }
}

impl RegisterWindow for MemoryWindow {
    fn read_u32(&self, offset: usize) -> Result<u32> {
        let mut state = self.state.lock();
        check(offset, state.mem.len())?;
        state.reads += 1;
        Ok(raw_word(&state.mem, offset))
    }

    fn write_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        let mut state = self.state.lock();
        check(offset, state.mem.len())?;
        state.writes += 1;
        state.mem[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
        Ok(())
    }

    fn size(&self) -> usize {
        self.state.lock().mem.len()
    }

    fn window_type(&self) -> WindowType {
        WindowType::Simulated
    }
}

// ── NCA ──────────────────────────────────────────────────────────────────────

/// Command descriptor captured when CDR0 was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandRecord {
    /// Trigger word
    pub cdr0: Cdr0,
    /// Address word at trigger time
    pub cdr1: Cdr1,
    /// Target select at trigger time
    pub cdr2: Cdr2,
}

#[derive(Debug)]
struct Pending {
    record: CommandRecord,
    polls: u32,
}

#[derive(Debug)]
struct NcaState {
    mem: Vec<u8>,
    /// Remote node words keyed by (node id, target id, word address)
    nodes: BTreeMap<(u8, u8, u32), u32>,

    held: BTreeSet<usize>,
    lock_grants: usize,
    lock_releases: usize,
    lock_contention: u32,
    lock_stuck: bool,

    completion_polls: u32,
    completion_status: CommandStatus,
    never_complete: bool,
    pending: Option<Pending>,

    commands: Vec<CommandRecord>,
    register_writes: Vec<usize>,
    accesses: usize,
}

impl NcaState {
    fn device_word(&self, offset: usize) -> u32 {
        u32::from_be_bytes([
            self.mem[offset],
            self.mem[offset + 1],
            self.mem[offset + 2],
            self.mem[offset + 3],
        ])
    }

    fn set_device_word(&mut self, offset: usize, value: u32) {
        self.mem[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }

    fn is_lock_register(offset: usize) -> bool {
        (LOCK_BASE..LOCK_BASE + LOCK_DOMAINS * LOCK_STRIDE).contains(&offset)
    }

    fn read_lock(&mut self, offset: usize) -> u32 {
        if self.lock_stuck {
            return 1;
        }
        if self.lock_contention > 0 {
            self.lock_contention -= 1;
            return 1;
        }
        if !self.held.insert(offset) {
            return 1;
        }
        self.lock_grants += 1;
        0
    }

    fn write_lock(&mut self, offset: usize, value: u32) {
        if value == 0 && self.held.remove(&offset) {
            self.lock_releases += 1;
        }
    }

    fn read_cdr0(&mut self) -> u32 {
        let Some(pending) = self.pending.as_mut() else {
            return self.device_word(CDR0);
        };
        pending.polls += 1;
        if self.never_complete || pending.polls < self.completion_polls {
            let mut busy = pending.record.cdr0;
            busy.status = CommandStatus::Busy;
            return busy.encode();
        }

        let Some(Pending { record, .. }) = self.pending.take() else {
            return self.device_word(CDR0);
        };
        let status = self.completion_status;
        if status == CommandStatus::Success {
            self.execute(record);
        }
        let mut done = record.cdr0;
        done.start_done = false;
        done.status = status;
        self.set_device_word(CDR0, done.encode());
        done.encode()
    }

    fn write_cdr0(&mut self, value: u32) {
        let cdr0 = Cdr0::decode(value);
        if !cdr0.start_done {
            self.set_device_word(CDR0, value);
            return;
        }
        let record = CommandRecord {
            cdr0,
            cdr1: Cdr1::decode(self.device_word(CDR1)),
            cdr2: Cdr2::decode(self.device_word(CDR2)),
        };
        debug!("simulated NCA command: {record:?}");
        self.commands.push(record);
        self.pending = Some(Pending { record, polls: 0 });
        self.set_device_word(CDR0, value);
    }

    fn execute(&mut self, record: CommandRecord) {
        let node = record.cdr2.target_node_id;
        let target = record.cdr2.target_id_address_upper;
        let base = record.cdr1.target_address;
        let words = record
            .cdr0
            .word_count()
            .min((self.mem.len() - DATA_WINDOW) / 4);

        for i in 0..words {
            #[allow(clippy::cast_possible_truncation)]
            let address = base.wrapping_add(i as u32);
            let slot = DATA_WINDOW + i * 4;
            match record.cdr0.command_type() {
                Some(CommandType::Read) => {
                    let value = self.nodes.get(&(node, target, address)).copied().unwrap_or(0);
                    self.set_device_word(slot, value);
                }
                Some(CommandType::Write) => {
                    let value = self.device_word(slot);
                    self.nodes.insert((node, target, address), value);
                }
                None => {}
            }
        }
    }
}

/// Simulated NCA window
#[derive(Debug, Clone)]
pub struct SimulatedNca {
    state: Arc<Mutex<NcaState>>,
}

impl Default for SimulatedNca {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedNca {
    /// Idle NCA: lock free, commands succeed on the third poll.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(NcaState {
                mem: vec![0; NCA_WINDOW_SIZE],
                nodes: BTreeMap::new(),
                held: BTreeSet::new(),
                lock_grants: 0,
                lock_releases: 0,
                lock_contention: 0,
                lock_stuck: false,
                completion_polls: 3,
                completion_status: CommandStatus::Success,
                never_complete: false,
                pending: None,
                commands: Vec::new(),
                register_writes: Vec::new(),
                accesses: 0,
            })),
        }
    }

    /// Commands complete on the `polls`-th read of CDR0.
    #[must_use]
    pub fn with_completion_polls(self, polls: u32) -> Self {
        self.state.lock().completion_polls = polls;
        self
    }

    /// Status reported when a command completes.
    #[must_use]
    pub fn with_completion_status(self, status: CommandStatus) -> Self {
        self.state.lock().completion_status = status;
        self
    }

    /// Commands never clear `start_done`.
    #[must_use]
    pub fn with_never_complete(self) -> Self {
        self.state.lock().never_complete = true;
        self
    }

    /// The lock register reads non-zero `reads` times before granting.
    #[must_use]
    pub fn with_lock_contention(self, reads: u32) -> Self {
        self.state.lock().lock_contention = reads;
        self
    }

    /// The lock register is never granted.
    #[must_use]
    pub fn with_stuck_lock(self) -> Self {
        self.state.lock().lock_stuck = true;
        self
    }

    /// CDR0 status left over from an earlier command.
    #[must_use]
    pub fn with_stale_status(self, status: CommandStatus) -> Self {
        {
            let mut state = self.state.lock();
            let mut cdr0 = Cdr0::decode(state.device_word(CDR0));
            cdr0.status = status;
            state.set_device_word(CDR0, cdr0.encode());
        }
        self
    }

    /// Value of the extended status register.
    #[must_use]
    pub fn with_extended_status(self, value: u32) -> Self {
        self.state.lock().set_device_word(EXTENDED_STATUS, value);
        self
    }

    /// Store a word in a remote node.
    pub fn set_node_word(&self, region: Region, address: u32, value: u32) {
        let cdr2 = Cdr2::for_region(region);
        self.state.lock().nodes.insert(
            (cdr2.target_node_id, cdr2.target_id_address_upper, address >> 2),
            value,
        );
    }

    /// Word held by a remote node.
    pub fn node_word(&self, region: Region, address: u32) -> Option<u32> {
        let cdr2 = Cdr2::for_region(region);
        self.state
            .lock()
            .nodes
            .get(&(cdr2.target_node_id, cdr2.target_id_address_upper, address >> 2))
            .copied()
    }

    /// Word `index` of the data window, as the device sees it.
    pub fn data_window_word(&self, index: usize) -> u32 {
        self.state.lock().device_word(DATA_WINDOW + index * 4)
    }

    /// Hardware lock grants so far.
    pub fn lock_grants(&self) -> usize {
        self.state.lock().lock_grants
    }

    /// Hardware lock releases so far.
    pub fn lock_releases(&self) -> usize {
        self.state.lock().lock_releases
    }

    /// Whether any lock domain is held.
    pub fn lock_held(&self) -> bool {
        !self.state.lock().held.is_empty()
    }

    /// Commands triggered so far.
    pub fn commands(&self) -> Vec<CommandRecord> {
        self.state.lock().commands.clone()
    }

    /// Offsets written, in order.
    pub fn register_writes(&self) -> Vec<usize> {
        self.state.lock().register_writes.clone()
    }

    /// Register reads and writes performed.
    pub fn accesses(&self) -> usize {
        self.state.lock().accesses
    }
}

impl RegisterWindow for SimulatedNca {
    fn read_u32(&self, offset: usize) -> Result<u32> {
        let mut state = self.state.lock();
        check(offset, state.mem.len())?;
        state.accesses += 1;

        let value = if NcaState::is_lock_register(offset) {
            state.read_lock(offset)
        } else if offset == CDR0 {
            state.read_cdr0()
        } else {
            return Ok(raw_word(&state.mem, offset));
        };
        Ok(value.to_be())
    }

    fn write_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        let mut state = self.state.lock();
        check(offset, state.mem.len())?;
        state.accesses += 1;
        state.register_writes.push(offset);

        let device = u32::from_be(value);
        if NcaState::is_lock_register(offset) {
            state.write_lock(offset, device);
        } else if offset == CDR0 {
            state.write_cdr0(device);
        } else {
            state.set_device_word(offset, device);
        }
        Ok(())
    }

    fn size(&self) -> usize {
        NCA_WINDOW_SIZE
    }

    fn window_type(&self) -> WindowType {
        WindowType::Simulated
    }
}

// ── APB2SER ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Apb2SerState {
    mem: Vec<u8>,
    /// PHY registers keyed by (target id, address)
    phy: BTreeMap<(u16, u32), u32>,
    /// Remaining busy reads per control slot
    pending: BTreeMap<usize, u32>,
    busy_polls: u32,
    stuck: bool,
    accesses: usize,
}

impl Apb2SerState {
    fn device_word(&self, offset: usize) -> u32 {
        u32::from_le_bytes([
            self.mem[offset],
            self.mem[offset + 1],
            self.mem[offset + 2],
            self.mem[offset + 3],
        ])
    }

    fn set_device_word(&mut self, offset: usize, value: u32) {
        self.mem[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn block_for_control(offset: usize) -> Option<TargetBlock> {
        (0..6)
            .filter_map(TargetBlock::for_target)
            .find(|block| block.control_slot() == offset)
    }

    fn command(&mut self, block: TargetBlock, value: u32) {
        let address = value & 0xFFFF;
        let mask = match block.width {
            DataWidth::Half => 0xFFFF,
            DataWidth::Word => u32::MAX,
        };
        match value & !0xFFFF {
            tag::WRITE_16 | tag::WRITE_32 => {
                let data = self.device_word(block.data_slot()) & mask;
                self.phy.insert((block.target_id, address), data);
            }
            tag::READ_16 | tag::READ_32 => {
                let data = self.phy.get(&(block.target_id, address)).copied().unwrap_or(0) & mask;
                self.set_device_word(block.result_slot(), data);
            }
            other => debug!("simulated APB2SER: unknown command tag {other:#x}"),
        }
        self.set_device_word(block.control_slot(), value | BUSY);
        self.pending.insert(block.control_slot(), self.busy_polls);
    }

    fn read_control(&mut self, offset: usize) -> u32 {
        let value = self.device_word(offset);
        let Some(remaining) = self.pending.get_mut(&offset) else {
            return value;
        };
        if self.stuck {
            return value;
        }
        if *remaining > 0 {
            *remaining -= 1;
            return value;
        }
        self.pending.remove(&offset);
        self.set_device_word(offset, value & !BUSY);
        value & !BUSY
    }
}

/// Simulated APB2SER window
#[derive(Debug, Clone)]
pub struct SimulatedApb2Ser {
    state: Arc<Mutex<Apb2SerState>>,
}

impl Default for SimulatedApb2Ser {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedApb2Ser {
    /// Idle bridge: PHY commands finish after two busy reads.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(Apb2SerState {
                mem: vec![0; APB2SER_WINDOW_SIZE],
                phy: BTreeMap::new(),
                pending: BTreeMap::new(),
                busy_polls: 2,
                stuck: false,
                accesses: 0,
            })),
        }
    }

    /// Control slots read busy `polls` times after a command.
    #[must_use]
    pub fn with_busy_polls(self, polls: u32) -> Self {
        self.state.lock().busy_polls = polls;
        self
    }

    /// Control slots stay busy forever.
    #[must_use]
    pub fn with_stuck_busy(self) -> Self {
        self.state.lock().stuck = true;
        self
    }

    /// Set a PHY register.
    pub fn set_phy_value(&self, target_id: u16, address: u32, value: u32) {
        self.state.lock().phy.insert((target_id, address), value);
    }

    /// PHY register value, if ever written.
    pub fn phy_value(&self, target_id: u16, address: u32) -> Option<u32> {
        self.state.lock().phy.get(&(target_id, address)).copied()
    }

    /// Copy of `len` bytes of the window at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the range is outside the window.
    pub fn bytes(&self, offset: usize, len: usize) -> Vec<u8> {
        self.state.lock().mem[offset..offset + len].to_vec()
    }

    /// Overwrite window bytes at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if the range is outside the window.
    pub fn set_bytes(&self, offset: usize, data: &[u8]) {
        self.state.lock().mem[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Register reads and writes performed.
    pub fn accesses(&self) -> usize {
        self.state.lock().accesses
    }
}

impl RegisterWindow for SimulatedApb2Ser {
    fn read_u32(&self, offset: usize) -> Result<u32> {
        let mut state = self.state.lock();
        check(offset, state.mem.len())?;
        state.accesses += 1;
        if Apb2SerState::block_for_control(offset).is_some() {
            return Ok(state.read_control(offset).to_le());
        }
        Ok(raw_word(&state.mem, offset))
    }

    fn write_u32(&mut self, offset: usize, value: u32) -> Result<()> {
        let mut state = self.state.lock();
        check(offset, state.mem.len())?;
        state.accesses += 1;
        if let Some(block) = Apb2SerState::block_for_control(offset) {
            state.command(block, u32::from_le(value));
        } else {
            state.mem[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
        }
        Ok(())
    }

    fn size(&self) -> usize {
        APB2SER_WINDOW_SIZE
    }

    fn window_type(&self) -> WindowType {
        WindowType::Simulated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_grants_once_until_released() {
        let mut sim = SimulatedNca::new();
        let lock = LOCK_BASE;
        assert_eq!(sim.read_u32(lock).unwrap(), 0);
        assert_ne!(sim.read_u32(lock).unwrap(), 0);
        sim.write_u32(lock, 0).unwrap();
        assert_eq!(sim.read_u32(lock).unwrap(), 0);
        assert_eq!(sim.lock_grants(), 2);
        assert_eq!(sim.lock_releases(), 1);
    }

    #[test]
    fn command_completes_after_configured_polls() {
        let mut sim = SimulatedNca::new().with_completion_polls(4);
        let trigger = Cdr0::command(CommandType::Read, 1, false).unwrap().encode();
        sim.write_u32(CDR0, trigger.to_be()).unwrap();
        for _ in 0..3 {
            let cdr0 = Cdr0::decode(u32::from_be(sim.read_u32(CDR0).unwrap()));
            assert!(cdr0.start_done);
            assert_eq!(cdr0.status, CommandStatus::Busy);
        }
        let cdr0 = Cdr0::decode(u32::from_be(sim.read_u32(CDR0).unwrap()));
        assert!(!cdr0.start_done);
        assert_eq!(cdr0.status, CommandStatus::Success);
    }

    #[test]
    fn bridge_control_slot_goes_idle() {
        let mut sim = SimulatedApb2Ser::new().with_busy_polls(1);
        let block = TargetBlock::for_target(3).unwrap();
        sim.write_u32(block.control_slot(), block.read_command(7).to_le())
            .unwrap();
        assert_ne!(u32::from_le(sim.read_u32(block.control_slot()).unwrap()) & BUSY, 0);
        assert_eq!(u32::from_le(sim.read_u32(block.control_slot()).unwrap()) & BUSY, 0);
    }

    #[test]
    fn simulated_windows_report_their_type() {
        assert_eq!(SimulatedNca::new().window_type(), WindowType::Simulated);
        assert_eq!(SimulatedApb2Ser::new().window_type(), WindowType::Simulated);
        assert_eq!(MemoryWindow::new(4).window_type().to_string(), "Simulated");
    }

    #[test]
    fn misaligned_access_is_rejected() {
        let sim = MemoryWindow::new(16);
        assert!(matches!(sim.read_u32(2), Err(NcrError::OutOfBounds { .. })));
    }
}
