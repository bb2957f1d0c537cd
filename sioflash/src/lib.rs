//! # sioflash
//!
//! A library for reflashing ITE SuperIO embedded controllers.
//!
//! This crate provides the core functionality for talking to IT85xx and
//! IT89xx ECs through the legacy x86 I/O-port space, including:
//!
//! - SuperIO banked register access and chip identification
//! - Polling PM1 byte-channel handshake (OBF/IBF)
//! - SPI-NOR command sequencing bridged through the EC
//! - Chunked erase/program/verify firmware programming
//! - Firmware image signature validation
//!
//! ## Supported Chips
//!
//! - IT85xx (identify and read; no in-system reflash)
//! - IT89xx (identify, read and write)
//!
//! ## Example
//!
//! ```rust,no_run
//! use sioflash::SuperioDevice;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut dev = SuperioDevice::open("/dev/port", 0x2e, 0x8987)?;
//!     dev.probe()?;
//!     dev.setup()?;
//!
//!     let firmware = std::fs::read("firmware.bin")?;
//!     dev.prepare_firmware(&firmware)?;
//!     dev.detach()?;
//!     dev.write_firmware(&firmware, Some(&mut |done, total| {
//!         println!("chunk {done}/{total}");
//!     }))?;
//!     dev.attach()?;
//!     dev.close()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chip;
pub mod clock;
pub mod device;
pub mod error;
pub mod flasher;
pub mod image;
pub mod link;
pub mod port;
pub mod spi;
pub mod superio;

#[cfg(test)]
pub(crate) mod dummy;

// Re-exports for convenience
#[cfg(unix)]
pub use port::DevPort;
pub use {
    chip::{ChipFamily, KNOWN_CHIPSETS, chipset_id},
    clock::{Clock, SystemClock},
    device::{DEFAULT_SIO_PORT, SuperioDevice},
    error::{Error, Result},
    flasher::{CHUNK_SIZE, MAX_CHUNK_ATTEMPTS, ProgrammingResult},
    image::find_signature,
    link::EcLink,
    port::PortIo,
};
