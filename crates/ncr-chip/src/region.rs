//! Ring bus regions.
//!
//! A region packs the owning node id in the upper half-word and the target
//! id in the lower half-word:
//!
//! ```text
//! 31        16 15         0
//! ┌───────────┬────────────┐
//! │  node_id  │ target_id  │
//! └───────────┴────────────┘
//! ```

use std::fmt;

/// Node reached through the APB2SER window as a plain memory overlay.
pub const APB2SER_WINDOW_NODE: u16 = 0x153;

/// Node reached through the APB2SER PHY register blocks.
pub const APB2SER_PHY_NODE: u16 = 0x115;

/// Ring bus transaction target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region(u32);

impl Region {
    /// Region for `node_id` / `target_id`.
    #[must_use]
    pub const fn new(node_id: u16, target_id: u16) -> Self {
        Self(((node_id as u32) << 16) | target_id as u32)
    }

    /// Region from its packed representation.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Packed representation.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Owning node.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn node_id(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// Sub-target within the node.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn target_id(self) -> u16 {
        self.0 as u16
    }

    /// Which protocol serves this region.
    #[must_use]
    pub const fn class(self) -> RegionClass {
        match self.node_id() {
            APB2SER_WINDOW_NODE => RegionClass::Apb2SerWindow,
            APB2SER_PHY_NODE => RegionClass::Apb2SerPhy,
            _ => RegionClass::Ring,
        }
    }
}

impl From<u32> for Region {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl From<Region> for u32 {
    fn from(region: Region) -> Self {
        region.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}.{:#x}", self.node_id(), self.target_id())
    }
}

/// Path a region's transactions take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionClass {
    /// Ordinary ring bus node, served by the command descriptor protocol.
    Ring,
    /// Node `0x153`: direct word copy through the APB2SER window.
    Apb2SerWindow,
    /// Node `0x115`: APB2SER PHY register blocks with their own polling.
    Apb2SerPhy,
}

impl RegionClass {
    /// Whether the region bypasses the ring bus for the APB2SER bridge.
    #[must_use]
    pub const fn is_bridge(self) -> bool {
        !matches!(self, Self::Ring)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packing() {
        let region = Region::new(0x16, 0x10);
        assert_eq!(region.raw(), 0x0016_0010);
        assert_eq!(region.node_id(), 0x16);
        assert_eq!(region.target_id(), 0x10);
        assert_eq!(Region::from_raw(0x0153_0002).node_id(), 0x153);
    }

    #[test]
    fn classification() {
        assert_eq!(Region::new(0x16, 0).class(), RegionClass::Ring);
        assert_eq!(Region::new(0x153, 0).class(), RegionClass::Apb2SerWindow);
        assert_eq!(Region::new(0x115, 3).class(), RegionClass::Apb2SerPhy);
        assert!(Region::new(0x115, 3).class().is_bridge());
    }

    #[test]
    fn display() {
        assert_eq!(Region::new(0x115, 4).to_string(), "0x115.0x4");
    }
}
