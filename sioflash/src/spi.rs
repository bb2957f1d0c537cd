//! SPI-NOR command sequencing over the EC byte channel.
//!
//! The EC bridges the host to the firmware flash one byte at a time: a PMC
//! selector written to the command port routes the next byte either to the
//! SCI side channel (opcodes) or the SMI side channel (address and data
//! bytes), and a direct-input selector clocks one byte back out. Every
//! command ends by re-arming the SCI status-event watch.
//!
//! ## Command shape
//!
//! ```text
//! PM1DO, PM1DOSCI, <opcode>          select output, send opcode
//! (PM1DOSMI, <byte>) * 3             address, MSB -> LSB
//! ... payload bytes or PM1DI reads
//! PM1DISCI                           re-arm status-event watch
//! ```

use crate::{
    clock::Clock,
    error::{Error, Result},
    link::EcLink,
    port::PortIo,
};

/// PMC selector: direct output.
pub const EC_PMC_PM1DO: u8 = 0x2f;
/// PMC selector: output one byte on the SCI side channel.
pub const EC_PMC_PM1DOSCI: u8 = 0x2e;
/// PMC selector: output one byte on the SMI side channel.
pub const EC_PMC_PM1DOSMI: u8 = 0x2d;
/// PMC selector: clock one byte in.
pub const EC_PMC_PM1DI: u8 = 0x2c;
/// PMC selector: re-arm the SCI status-event watch.
pub const EC_PMC_PM1DISCI: u8 = 0x2b;

/// Write Enable - required before any write/erase operation
pub const SPI_CMD_WREN: u8 = 0x06;
/// Write Disable - clears WEL bit in status register
pub const SPI_CMD_WRDI: u8 = 0x04;
/// Read Status Register 1
pub const SPI_CMD_RDSR: u8 = 0x05;
/// High-speed Read (with dummy byte)
pub const SPI_CMD_HS_READ: u8 = 0x0b;
/// Auto-Address-Increment word program, two bytes per issue
pub const SPI_CMD_WRITE_WORD: u8 = 0xad;
/// Sector Erase, 4 KiB granularity
pub const SPI_CMD_SECTOR_ERASE_4K: u8 = 0xd7;

/// SPI status register: write in progress.
pub const SPI_STATUS_WIP: u8 = 1 << 0;
/// SPI status register: write-enable latch.
pub const SPI_STATUS_WEL: u8 = 1 << 1;

/// Per-byte progress callback: (bytes done, bytes total).
pub type ByteProgress<'a> = &'a mut dyn FnMut(usize, usize);

impl<P: PortIo, C: Clock> EcLink<P, C> {
    /// Send one byte on the SCI side channel.
    fn pm1do_sci(&mut self, value: u8) -> Result<()> {
        self.ec_write(self.cmd_port(), EC_PMC_PM1DOSCI)?;
        self.ec_write(self.cmd_port(), value)
    }

    /// Send one byte on the SMI side channel.
    fn pm1do_smi(&mut self, value: u8) -> Result<()> {
        self.ec_write(self.cmd_port(), EC_PMC_PM1DOSMI)?;
        self.ec_write(self.cmd_port(), value)
    }

    /// Stream a 24-bit flash address, MSB first.
    fn send_addr(&mut self, addr: u32) -> Result<()> {
        self.pm1do_smi((addr >> 16) as u8)?;
        self.pm1do_smi((addr >> 8) as u8)?;
        self.pm1do_smi((addr & 0xff) as u8)
    }

    /// Clock one byte back from the EC.
    fn pm1di(&mut self) -> Result<u8> {
        self.ec_write(self.cmd_port(), EC_PMC_PM1DI)?;
        self.ec_read(self.data_port())
    }

    /// Re-arm the SCI status-event watch.
    fn watch_sci(&mut self) -> Result<()> {
        self.ec_write(self.cmd_port(), EC_PMC_PM1DISCI)
    }

    /// Read the SPI status register until the write-in-progress bit
    /// clears, then re-arm the event watch.
    pub fn spi_read_status(&mut self) -> Result<()> {
        self.ec_write(self.cmd_port(), EC_PMC_PM1DO)?;
        self.pm1do_sci(SPI_CMD_RDSR)?;
        loop {
            let status = self.pm1di()?;
            if (status & SPI_STATUS_WIP) == 0 {
                break;
            }
        }
        self.watch_sci()
    }

    /// Set the write-enable latch and poll status until the flash reports
    /// not-busy with the latch set.
    pub fn spi_write_enable(&mut self) -> Result<()> {
        self.spi_read_status()?;

        self.ec_write(self.cmd_port(), EC_PMC_PM1DO)?;
        self.pm1do_sci(SPI_CMD_WREN)?;

        self.ec_write(self.cmd_port(), EC_PMC_PM1DO)?;
        self.pm1do_sci(SPI_CMD_RDSR)?;
        loop {
            let status = self.pm1di()?;
            if (status & (SPI_STATUS_WIP | SPI_STATUS_WEL)) == SPI_STATUS_WEL {
                break;
            }
        }
        self.watch_sci()
    }

    /// Clear the write-enable latch and poll status until it reads back
    /// clear.
    pub fn spi_write_disable(&mut self) -> Result<()> {
        self.spi_read_status()?;

        self.ec_write(self.cmd_port(), EC_PMC_PM1DO)?;
        self.pm1do_sci(SPI_CMD_WRDI)?;

        self.ec_write(self.cmd_port(), EC_PMC_PM1DO)?;
        self.pm1do_sci(SPI_CMD_RDSR)?;
        loop {
            let status = self.pm1di()?;
            if (status & SPI_STATUS_WEL) == 0 {
                break;
            }
        }
        self.watch_sci()
    }

    /// High-speed read of `buf.len()` bytes starting at `addr`.
    ///
    /// The progress callback fires once per byte and must not block; it
    /// runs on the polling thread.
    pub fn spi_read(
        &mut self,
        addr: u32,
        buf: &mut [u8],
        mut progress: Option<ByteProgress<'_>>,
    ) -> Result<()> {
        // Drop the write latch first, matching the vendor programmer's
        // command ordering.
        self.spi_write_disable()?;
        self.spi_read_status()?;

        self.ec_write(self.cmd_port(), EC_PMC_PM1DO)?;
        self.pm1do_sci(SPI_CMD_HS_READ)?;

        // Address, then the high-speed-read dummy byte.
        self.send_addr(addr)?;
        self.pm1do_smi(0x00)?;

        let total = buf.len();
        for (i, slot) in buf.iter_mut().enumerate() {
            *slot = self.pm1di()?;
            if let Some(cb) = progress.as_mut() {
                cb(i + 1, total);
            }
        }

        self.spi_read_status()
    }

    /// Program `data` at `addr` with the auto-address-increment word
    /// command; the opcode is re-issued for every 2-byte word.
    pub fn spi_write(&mut self, addr: u32, data: &[u8]) -> Result<()> {
        if (addr & 0x3ff) != 0 {
            return Err(Error::InvalidFile(format!(
                "write address unaligned, got 0x{addr:04x}"
            )));
        }
        if data.len() % 2 != 0 {
            return Err(Error::InvalidFile(format!(
                "write length not a whole number of words, got 0x{:04x}",
                data.len()
            )));
        }

        self.spi_write_enable()?;

        self.ec_write(self.cmd_port(), EC_PMC_PM1DO)?;
        self.pm1do_sci(SPI_CMD_WRITE_WORD)?;
        self.send_addr(addr)?;

        for (i, word) in data.chunks_exact(2).enumerate() {
            if i > 0 {
                self.spi_read_status()?;
                self.ec_write(self.cmd_port(), EC_PMC_PM1DO)?;
                self.pm1do_sci(SPI_CMD_WRITE_WORD)?;
            }
            self.pm1do_smi(word[0])?;
            self.pm1do_smi(word[1])?;
        }

        self.spi_write_disable()?;
        self.spi_read_status()
    }

    /// Erase the 4 KiB sector containing `addr`.
    pub fn spi_sector_erase(&mut self, addr: u32) -> Result<()> {
        self.spi_write_enable()?;

        self.ec_write(self.cmd_port(), EC_PMC_PM1DO)?;
        self.pm1do_sci(SPI_CMD_SECTOR_ERASE_4K)?;
        self.send_addr(addr)?;

        self.watch_sci()?;
        self.spi_read_status()
    }
}
