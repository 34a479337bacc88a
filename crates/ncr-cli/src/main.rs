//! `ncr`: command-line access to the LSI ACP / Axxia ring bus.
//!
//! ```text
//! USAGE:
//!   ncr read <node.target> <address> [-n LEN]    Hex dump LEN bytes
//!   ncr write <node.target> <address> <hex>      Write bytes, e.g. deadbeef
//!   ncr layout                                   Register map and windows
//!
//!   --simulate     run against simulated hardware (no root, no board)
//!   --platform     axxia (default) or acp
//! ```
//!
//! Numbers accept `0x` hex or decimal. A region is `node.target`, e.g.
//! `0x16.0x10`.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ncr_chip::bridge::{DataWidth, TargetBlock};
use ncr_chip::regs;
use ncr_driver::{
    FatalPolicy, NcrConfig, NcrDriver, Platform, Region, RegisterWindow, SimulatedApb2Ser,
    SimulatedNca,
};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ncr", about = "LSI ACP / Axxia ring bus access", version)]
struct Cli {
    /// SoC family.
    #[arg(long, value_enum, default_value_t = PlatformArg::Axxia, global = true)]
    platform: PlatformArg,

    /// Use simulated hardware instead of /dev/mem.
    #[arg(long, global = true)]
    simulate: bool,

    /// What to do when the ring bus wedges.
    #[arg(long, value_enum, default_value_t = PolicyArg::Report, global = true)]
    fatal_policy: PolicyArg,

    /// Hardware lock domain.
    #[arg(long, default_value_t = regs::DEFAULT_LOCK_DOMAIN, global = true)]
    lock_domain: u32,

    /// Deadline for the lock and for a stale command, in milliseconds.
    #[arg(long, default_value_t = regs::LOCK_TIMEOUT_MS, global = true)]
    lock_timeout_ms: u64,

    /// CDR0 completion poll budget.
    #[arg(long, default_value_t = regs::WFC_TIMEOUT_POLLS, global = true)]
    completion_polls: u32,

    /// APB2SER busy poll budget.
    #[arg(long, default_value_t = regs::WFC_TIMEOUT_POLLS, global = true)]
    bridge_polls: u32,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Read bytes from a node and hex dump them.
    Read {
        /// Region as node.target (e.g. 0x16.0x10).
        #[arg(value_parser = parse_region)]
        region: Region,
        /// Byte address within the target.
        #[arg(value_parser = parse_u32)]
        address: u32,
        /// Number of bytes.
        #[arg(short = 'n', long, default_value_t = 4)]
        length: usize,
    },
    /// Write hex bytes to a node.
    Write {
        /// Region as node.target (e.g. 0x16.0x10).
        #[arg(value_parser = parse_region)]
        region: Region,
        /// Byte address within the target.
        #[arg(value_parser = parse_u32)]
        address: u32,
        /// Data as hex, separators allowed (e.g. de:ad:be:ef).
        #[arg(value_parser = parse_hex)]
        data: HexBytes,
        /// Read the data back and compare.
        #[arg(long)]
        verify: bool,
    },
    /// Print the register map and physical windows.
    Layout,
}

#[derive(Clone, Copy, ValueEnum)]
enum PlatformArg {
    Axxia,
    Acp,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Axxia => Self::Axxia,
            PlatformArg::Acp => Self::Acp,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Halt,
    Panic,
    Report,
}

impl From<PolicyArg> for FatalPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Halt => Self::Halt,
            PolicyArg::Panic => Self::Panic,
            PolicyArg::Report => Self::Report,
        }
    }
}

/// Owned byte string parsed from hex.
#[derive(Clone, Debug)]
struct HexBytes(Vec<u8>);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();
    let config = NcrConfig::for_platform(cli.platform.into())
        .with_lock_domain(cli.lock_domain)
        .with_lock_timeout(Duration::from_millis(cli.lock_timeout_ms))
        .with_completion_polls(cli.completion_polls)
        .with_bridge_polls(cli.bridge_polls)
        .with_fatal_policy(cli.fatal_policy.into());

    match cli.command {
        Cmd::Read {
            region,
            address,
            length,
        } => cmd_read(&open(config, cli.simulate)?, region, address, length)?,
        Cmd::Write {
            region,
            address,
            data,
            verify,
        } => cmd_write(&open(config, cli.simulate)?, region, address, &data.0, verify)?,
        Cmd::Layout => cmd_layout(config.platform),
    }

    Ok(())
}

fn open(config: NcrConfig, simulate: bool) -> Result<NcrDriver> {
    if !simulate {
        return NcrDriver::map(config).context("cannot map ring bus windows (root required)");
    }
    let apb2ser = config
        .platform
        .has_bridge()
        .then(|| Box::new(SimulatedApb2Ser::new()) as Box<dyn RegisterWindow>);
    let driver = NcrDriver::new(config);
    driver.attach(Box::new(SimulatedNca::new()), apb2ser);
    tracing::info!("using simulated ring bus");
    Ok(driver)
}

fn cmd_read(ncr: &NcrDriver, region: Region, address: u32, length: usize) -> Result<()> {
    let mut buf = vec![0u8; length];
    ncr.read(region, address, &mut buf)
        .with_context(|| format!("read {length} bytes at {region}:{address:#x}"))?;
    print!("{}", hex_dump(address, &buf));
    Ok(())
}

fn cmd_write(
    ncr: &NcrDriver,
    region: Region,
    address: u32,
    data: &[u8],
    verify: bool,
) -> Result<()> {
    ncr.write(region, address, data)
        .with_context(|| format!("write {} bytes at {region}:{address:#x}", data.len()))?;
    println!("Wrote {} bytes to {region}:{address:#x}", data.len());

    if verify {
        let mut back = vec![0u8; data.len()];
        ncr.read(region, address, &mut back)
            .context("read back for verify")?;
        if back != data {
            bail!("verify failed:\n{}", hex_dump(address, &back));
        }
        println!("Verified.");
    }
    Ok(())
}

fn cmd_layout(platform: Platform) {
    let nca = platform.nca();
    println!("Platform     : {platform}");
    println!("NCA window   : {:#014x} + {:#x}", nca.base, nca.size);
    match platform.apb2ser() {
        Some(w) => println!("APB2SER      : {:#014x} + {:#x}", w.base, w.size),
        None => println!("APB2SER      : (not present)"),
    }
    println!();
    println!("CDR0         : {:#06x}", regs::CDR0);
    println!("CDR1         : {:#06x}", regs::CDR1);
    println!("CDR2         : {:#06x}", regs::CDR2);
    println!("Ext. status  : {:#06x}", regs::EXTENDED_STATUS);
    println!(
        "Data window  : {:#06x} ({} bytes)",
        regs::DATA_WINDOW,
        regs::DATA_WINDOW_CAPACITY
    );
    println!("Lock domains : {:#06x} + 4 x domain", regs::LOCK_BASE);

    if platform.has_bridge() {
        println!();
        println!("APB2SER PHY blocks (node {:#x}):", ncr_chip::region::APB2SER_PHY_NODE);
        for block in (0..6).filter_map(TargetBlock::for_target) {
            let width = match block.width {
                DataWidth::Half => 16,
                DataWidth::Word => 32,
            };
            println!(
                "  target {}  {:#06x}  {width}-bit",
                block.target_id, block.base
            );
        }
    }
}

fn hex_dump(address: u32, data: &[u8]) -> String {
    let mut out = String::new();
    for (i, line) in data.chunks(16).enumerate() {
        let bytes: Vec<String> = line.iter().map(|b| format!("{b:02x}")).collect();
        let offset = u64::from(address) + (i as u64) * 16;
        out.push_str(&format!("{offset:08x}  {}\n", bytes.join(" ")));
    }
    out
}

fn parse_u32(s: &str) -> Result<u32, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid number {s:?}: {e}"))
}

fn parse_region(s: &str) -> Result<Region, String> {
    let (node, target) = s
        .split_once('.')
        .ok_or_else(|| format!("expected node.target, got {s:?}"))?;
    let node = u16::try_from(parse_u32(node)?)
        .map_err(|_| format!("node id {node} exceeds 16 bits"))?;
    let target = u16::try_from(parse_u32(target)?)
        .map_err(|_| format!("target id {target} exceeds 16 bits"))?;
    Ok(Region::new(node, target))
}

fn parse_hex(s: &str) -> Result<HexBytes, String> {
    let digits: String = s
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !matches!(c, ':' | ' ' | '_' | '-'))
        .collect();
    if !digits.is_ascii() {
        return Err(format!("invalid hex {s:?}: non-ASCII characters"));
    }
    if digits.is_empty() || digits.len() % 2 != 0 {
        return Err(format!("expected an even number of hex digits, got {s:?}"));
    }
    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).map_err(|e| e.to_string())?;
            u8::from_str_radix(pair, 16).map_err(|e| e.to_string())
        })
        .collect::<Result<Vec<u8>, String>>()
        .map(HexBytes)
        .map_err(|e| format!("invalid hex {s:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_accepts_hex_and_decimal() {
        assert_eq!(parse_region("0x16.0x10").unwrap(), Region::new(0x16, 0x10));
        assert_eq!(parse_region("22.16").unwrap(), Region::new(0x16, 0x10));
        assert!(parse_region("0x16").is_err());
        assert!(parse_region("0x10000.0").is_err());
    }

    #[test]
    fn hex_bytes_with_separators() {
        assert_eq!(parse_hex("de:ad:be:ef").unwrap().0, [0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(parse_hex("0x0102").unwrap().0, [1, 2]);
        assert!(parse_hex("abc").is_err());
    }

    #[test]
    fn hex_rejects_non_ascii() {
        assert!(parse_hex("a\u{e9}1").is_err());
        assert!(parse_hex("\u{e9}\u{e9}").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn dump_offsets_follow_address() {
        let dump = hex_dump(0x100, &[0u8; 17]);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("00000110  00"));
    }

    #[test]
    fn simulated_write_verifies() {
        let ncr = open(NcrConfig::default(), true).unwrap();
        cmd_write(&ncr, Region::new(0x16, 0x10), 0x20, &[1, 2, 3, 4, 5], true).unwrap();
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::try_parse_from([
            "ncr", "--simulate", "--platform", "acp", "read", "0x16.0x10", "0x40", "-n", "8",
        ])
        .unwrap();
        assert!(cli.simulate);
        assert!(matches!(cli.platform, PlatformArg::Acp));
        assert!(matches!(cli.command, Cmd::Read { length: 8, .. }));
    }
}
