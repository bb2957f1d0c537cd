//! Polling handshake over the EC's two-port PM1 byte channel.
//!
//! The EC exposes a data port (IOBAD0) and a command/status port (IOBAD1).
//! There is no interrupt or DMA path: every byte moved in either direction
//! is gated by busy-polling the status register for the output-buffer-full
//! (OBF) or input-buffer-empty (!IBF) condition, each wait bounded by a
//! 250 ms wall-clock deadline measured per call.

use {
    crate::{
        clock::{Clock, SystemClock},
        error::{Error, Result},
        port::PortIo,
    },
    std::time::Duration,
};

/// Handshake deadline for a single buffer-flag wait.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(250);

/// EC status register: output buffer full.
pub const EC_STATUS_OBF: u8 = 1 << 0;
/// EC status register: input buffer full.
pub const EC_STATUS_IBF: u8 = 1 << 1;

/// EC command: read a named parameter byte.
pub const EC_CMD_READ_PARAM: u8 = 0x80;
/// EC command: stream the controller name string (IT85xx only).
pub const EC_CMD_GET_NAME_STR: u8 = 0x92;
/// EC command: stream the firmware version string (IT85xx only).
pub const EC_CMD_GET_VERSION_STR: u8 = 0x93;

/// Strings streamed by the EC are `$`-terminated and bounded to 255 bytes.
const EC_STR_MAX: usize = 0xff;

/// PM1 data port address used until the real one is read from the LDN.
pub const DEFAULT_PM1_IOBAD0: u16 = 0x62;
/// PM1 command/status port address used until the real one is read.
pub const DEFAULT_PM1_IOBAD1: u16 = 0x66;

/// Polling link to the EC over the two PM1 ports.
///
/// Owns the raw port channel and the clock for the whole device session;
/// the SuperIO register-bank helpers borrow the channel through
/// [`EcLink::port_mut`].
pub struct EcLink<P: PortIo, C: Clock = SystemClock> {
    port: P,
    clock: C,
    data_port: u16,
    cmd_port: u16,
    timeout: Duration,
}

impl<P: PortIo, C: Clock> EcLink<P, C> {
    /// Create a link with the default PM1 port addresses.
    pub fn new(port: P, clock: C) -> Self {
        Self {
            port,
            clock,
            data_port: DEFAULT_PM1_IOBAD0,
            cmd_port: DEFAULT_PM1_IOBAD1,
            timeout: HANDSHAKE_TIMEOUT,
        }
    }

    /// Point the link at the PM1 addresses read back from the LDN.
    pub fn set_io_ports(&mut self, data_port: u16, cmd_port: u16) {
        self.data_port = data_port;
        self.cmd_port = cmd_port;
    }

    /// PM1 data port (IOBAD0).
    pub fn data_port(&self) -> u16 {
        self.data_port
    }

    /// PM1 command/status port (IOBAD1).
    pub fn cmd_port(&self) -> u16 {
        self.cmd_port
    }

    /// Borrow the raw port channel, for the SuperIO register-bank path.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Close the underlying port channel.
    pub fn close(&mut self) -> Result<()> {
        self.port.close()
    }

    /// Busy-poll the status port until `(status & mask)` is all-set
    /// (`set = true`) or all-clear (`set = false`).
    ///
    /// The deadline is measured per call, not cumulatively across a
    /// transaction. Polling stops once the deadline has elapsed, so a
    /// pattern that first appears after it is still a timeout.
    pub fn wait_for(&mut self, mask: u8, set: bool) -> Result<()> {
        let start = self.clock.now();
        loop {
            if self.clock.now() - start > self.timeout {
                return Err(Error::TimedOut(format!(
                    "waiting for status 0x{mask:02x}:{}",
                    u8::from(set)
                )));
            }
            let status = self.port.read_byte(self.cmd_port)?;
            if set && (status & mask) == mask {
                return Ok(());
            }
            if !set && (status & mask) == 0 {
                return Ok(());
            }
        }
    }

    /// Wait for output-buffer-full, then read one byte from `port`.
    pub fn ec_read(&mut self, port: u16) -> Result<u8> {
        self.wait_for(EC_STATUS_OBF, true)
            .map_err(|e| Error::TimedOut(format!("ec-read: {e}")))?;
        self.port.read_byte(port)
    }

    /// Wait for input-buffer-empty, then write one byte to `port`.
    pub fn ec_write(&mut self, port: u16, value: u8) -> Result<()> {
        self.wait_for(EC_STATUS_IBF, false)
            .map_err(|e| Error::TimedOut(format!("ec-write: {e}")))?;
        self.port.write_byte(port, value)
    }

    /// Drain any stale output byte before starting a new transaction.
    pub fn ec_flush(&mut self) -> Result<()> {
        let start = self.clock.now();
        loop {
            let status = self.port.read_byte(self.cmd_port)?;
            if (status & EC_STATUS_OBF) == 0 {
                return Ok(());
            }
            self.port.read_byte(self.data_port)?;
            if self.clock.now() - start > self.timeout {
                return Err(Error::TimedOut("waiting for flush".into()));
            }
        }
    }

    /// Read one named EC parameter byte.
    pub fn ec_get_param(&mut self, param: u8) -> Result<u8> {
        self.ec_write(self.cmd_port, EC_CMD_READ_PARAM)?;
        self.ec_write(self.data_port, param)?;
        self.ec_read(self.data_port)
    }

    /// Read a `$`-terminated ASCII string for the given EC command.
    pub fn ec_get_string(&mut self, cmd: u8) -> Result<String> {
        self.ec_write(self.cmd_port, cmd)?;
        let mut out = String::new();
        for _ in 0..EC_STR_MAX {
            let c = self.ec_read(self.data_port)?;
            if c == b'$' {
                break;
            }
            out.push(char::from(c));
        }
        Ok(out)
    }
}
