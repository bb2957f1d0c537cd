//! Port abstraction for raw x86 I/O-port access.
//!
//! The SuperIO configuration registers and the EC's PM1 byte channel are
//! both reached through legacy I/O ports. This module provides a unified
//! `PortIo` trait so the protocol layers stay I/O-agnostic:
//!
//! ```text
//! +--------------------------+
//! |  Protocol layers         |
//! |  (superio, link, spi)    |
//! +------------+-------------+
//!              |
//!              v
//! +------------+-------------+
//! |       PortIo trait       |
//! +------------+-------------+
//!              |
//!              v
//! +------------+-------------+
//! |  /dev/port (DevPort)     |
//! +--------------------------+
//! ```
//!
//! Tests substitute an in-memory EC emulator for the real hardware.

#[cfg(unix)]
pub mod native;

use crate::error::Result;

/// Raw byte access to I/O ports. Pure hardware access: no caching, no
/// retry, no interpretation of the bytes moved.
pub trait PortIo {
    /// Read one byte from the given port address.
    fn read_byte(&mut self, port: u16) -> Result<u8>;

    /// Write one byte to the given port address.
    fn write_byte(&mut self, port: u16, value: u8) -> Result<()>;

    /// Close the port and release resources.
    ///
    /// After calling this method, further I/O fails. Safe to call more
    /// than once.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(unix)]
pub use native::DevPort;
