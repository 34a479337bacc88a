//! Ring bus access against simulated hardware
//!
//! Runs a write/read cycle on each path (ring, PHY block, overlay) without
//! a board. `RUST_LOG=ncr_driver=trace` shows every register access.

use ncr_driver::{NcrConfig, NcrDriver, Region, Result, SimulatedApb2Ser, SimulatedNca};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("ncr_driver=debug")
        .init();

    let nca = SimulatedNca::new();
    let apb2ser = SimulatedApb2Ser::new();
    let ncr = NcrDriver::new(NcrConfig::default());
    ncr.attach(Box::new(nca.clone()), Some(Box::new(apb2ser.clone())));

    let paths = [
        ("ring", Region::new(0x16, 0x10), 0x100),
        ("phy", Region::new(0x115, 2), 0x40),
        ("overlay", Region::new(0x153, 0), 0x800),
    ];

    for (name, region, address) in paths {
        let pattern = 0x5AA5_0000u32 | address;
        ncr.write(region, address, &pattern.to_ne_bytes())?;

        let mut back = [0u8; 4];
        ncr.read(region, address, &mut back)?;
        let value = u32::from_ne_bytes(back);
        println!(
            "{name:8} {region} @ {address:#06x}: wrote {pattern:#010x} read {value:#010x} {}",
            if value == pattern { "ok" } else { "MISMATCH" }
        );
    }

    println!(
        "lock grants {} releases {}, {} ring commands",
        nca.lock_grants(),
        nca.lock_releases(),
        nca.commands().len()
    );
    Ok(())
}
