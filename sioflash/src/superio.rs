//! SuperIO logical-register-bank access.
//!
//! The SuperIO exposes a banked register file behind an index/data port
//! pair (`base` / `base + 1`). Registers `0x00..=0x2f` are per-LDN
//! (Logical Device Number); the chip-id registers can be read from any
//! bank. This path is only used for identification and for the IT89xx
//! indirect EC-memory read — the firmware flash itself is reached through
//! the PM1 byte channel in [`crate::link`].

use {
    crate::{error::Result, port::PortIo},
    log::debug,
};

/// LDN select register, valid in every bank.
pub const SIO_LDNXX_IDX_LDNSEL: u8 = 0x07;
/// Chip-id high byte.
pub const SIO_LDNXX_IDX_CHIPID1: u8 = 0x20;
/// Chip-id low byte.
pub const SIO_LDNXX_IDX_CHIPID2: u8 = 0x21;
/// Chip version/revision.
pub const SIO_LDNXX_IDX_CHIPVER: u8 = 0x22;
/// Depth-2 indirect address register.
pub const SIO_LDNXX_IDX_D2ADR: u8 = 0x2e;
/// Depth-2 indirect data register.
pub const SIO_LDNXX_IDX_D2DAT: u8 = 0x2f;
/// I/O base address 0, high byte (low byte follows).
pub const SIO_LDNXX_IDX_IOBAD0: u8 = 0x60;
/// I/O base address 1, high byte (low byte follows).
pub const SIO_LDNXX_IDX_IOBAD1: u8 = 0x62;

/// Power Management I/F Channel 1 LDN.
pub const SIO_LDN_PM1: u8 = 0x11;
/// Number of LDN banks dumped in diagnostics mode.
pub const SIO_LDN_COUNT: u8 = 0x14;

/// Depth-2 selector: I2EC address low byte.
pub const SIO_DEPTH2_I2EC_ADDRL: u8 = 0x10;
/// Depth-2 selector: I2EC address high byte.
pub const SIO_DEPTH2_I2EC_ADDRH: u8 = 0x11;
/// Depth-2 selector: I2EC data.
pub const SIO_DEPTH2_I2EC_DATA: u8 = 0x12;

/// EC-internal address of the chip-id mirror register.
pub const GCTRL_ECHIPID1: u16 = 0x2000;
/// EC-internal address of the chip-revision register.
pub const GCTRL_ECHIPVER: u16 = 0x2002;

/// Read one banked register.
pub fn regval<P: PortIo>(port: &mut P, base: u16, idx: u8) -> Result<u8> {
    port.write_byte(base, idx)?;
    port.read_byte(base + 1)
}

/// Read a 16-bit value from two consecutive registers (high byte first).
pub fn regval16<P: PortIo>(port: &mut P, base: u16, idx: u8) -> Result<u16> {
    let hi = regval(port, base, idx)?;
    let lo = regval(port, base, idx + 1)?;
    Ok(u16::from_be_bytes([hi, lo]))
}

/// Write one banked register.
pub fn regwrite<P: PortIo>(port: &mut P, base: u16, idx: u8, value: u8) -> Result<()> {
    port.write_byte(base, idx)?;
    port.write_byte(base + 1, value)
}

/// Select the active LDN bank.
pub fn set_ldn<P: PortIo>(port: &mut P, base: u16, ldn: u8) -> Result<()> {
    regwrite(port, base, SIO_LDNXX_IDX_LDNSEL, ldn)
}

/// Read one byte of EC-internal memory through the depth-2 (I2EC)
/// indirect window.
pub fn i2ec_read<P: PortIo>(port: &mut P, base: u16, addr: u16) -> Result<u8> {
    regwrite(port, base, SIO_LDNXX_IDX_D2ADR, SIO_DEPTH2_I2EC_ADDRH)?;
    regwrite(port, base, SIO_LDNXX_IDX_D2DAT, (addr >> 8) as u8)?;
    regwrite(port, base, SIO_LDNXX_IDX_D2ADR, SIO_DEPTH2_I2EC_ADDRL)?;
    regwrite(port, base, SIO_LDNXX_IDX_D2DAT, (addr & 0xff) as u8)?;
    regwrite(port, base, SIO_LDNXX_IDX_D2ADR, SIO_DEPTH2_I2EC_DATA)?;
    regval(port, base, SIO_LDNXX_IDX_D2DAT)
}

/// Dump one LDN's register file to the debug log, 16 bytes per row.
pub fn regdump<P: PortIo>(port: &mut P, base: u16, ldn: u8) -> Result<()> {
    set_ldn(port, base, ldn)?;
    let mut buf = [0u8; 0x100];
    for (idx, slot) in buf.iter_mut().enumerate() {
        *slot = regval(port, base, idx as u8)?;
    }
    debug!("LDN 0x{ldn:02x} register dump:");
    for (row, chunk) in buf.chunks(16).enumerate() {
        let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
        debug!("  {:02x}0: {}", row, hex.join(" "));
    }
    Ok(())
}
