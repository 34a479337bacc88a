//! Silicon model for the NCA ring bus on LSI ACP / Axxia SoCs.
//!
//! This crate has **no dependencies** and **no hardware access**; it is a
//! pure model of the silicon: register offsets, command descriptor bit
//! fields, region encoding, the APB2SER bridge block layout and the physical
//! window addresses for each platform variant.
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`regs`] | NCA window register map (CDR0–2, lock domains, data window) |
//! | [`command`] | Typed command descriptor words with `encode` / `decode` |
//! | [`region`] | `Region` = (node id, target id) and its classification |
//! | [`bridge`] | APB2SER target blocks, command tags, busy bit |
//! | [`platform`] | Physical window addresses for Axxia and ACP |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod command;
pub mod platform;
pub mod region;
pub mod regs;

pub use command::{CommandStatus, CommandType, Cdr0, Cdr1, Cdr2};
pub use platform::Platform;
pub use region::{Region, RegionClass};
