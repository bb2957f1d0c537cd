//! I/O-port access through the Linux `/dev/port` device.
//!
//! `/dev/port` maps the x86 I/O-port space into a seekable character
//! device: a positioned one-byte read or write at offset `p` performs the
//! equivalent of `inb(p)` / `outb(p)`.

use {
    crate::{error::Result, port::PortIo},
    log::trace,
    std::{
        fs::{File, OpenOptions},
        io,
        os::unix::fs::FileExt,
        path::Path,
    },
};

/// Default character device exposing the I/O-port space.
pub const DEFAULT_DEVICE_PATH: &str = "/dev/port";

/// I/O-port channel backed by `/dev/port`.
pub struct DevPort {
    file: Option<File>,
    path: String,
}

impl DevPort {
    /// Open the port device at the given path (usually `/dev/port`).
    ///
    /// Requires read/write access, which in practice means root.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self {
            file: Some(file),
            path: path.display().to_string(),
        })
    }

    /// Open the default `/dev/port` device.
    pub fn open_default() -> Result<Self> {
        Self::open(DEFAULT_DEVICE_PATH)
    }

    /// Path this channel was opened from.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn file(&mut self) -> io::Result<&File> {
        self.file
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "port device closed"))
    }
}

impl PortIo for DevPort {
    fn read_byte(&mut self, port: u16) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.file()?.read_exact_at(&mut buf, u64::from(port))?;
        trace!("inb(0x{port:04x}) = 0x{:02x}", buf[0]);
        Ok(buf[0])
    }

    fn write_byte(&mut self, port: u16, value: u8) -> Result<()> {
        trace!("outb(0x{port:04x}, 0x{value:02x})");
        self.file()?.write_all_at(&[value], u64::from(port))?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        // Take ownership of the file and let it drop (close)
        self.file.take();
        Ok(())
    }
}
