//! Device session: probe, setup, firmware read and write.
//!
//! Ties the layers together for one SuperIO EC: identify the chip through
//! the banked registers, locate the PM1 channel, size the eflash per
//! family, and drive firmware transfers with the EC detached from its
//! normal duties.

use {
    crate::{
        chip::ChipFamily,
        clock::{Clock, SystemClock},
        error::{Error, Result},
        flasher, image,
        link::{EC_CMD_GET_NAME_STR, EC_CMD_GET_VERSION_STR, EcLink},
        port::PortIo,
        superio,
    },
    log::{debug, info, warn},
    std::{fmt, io},
};

/// Default SuperIO index port.
pub const DEFAULT_SIO_PORT: u16 = 0x2e;

/// EC command: resume normal EC duty.
const EC_CMD_CHIP_ATTACH: u8 = 0xfc;
/// EC command: suspend EC duty for flash access.
const EC_CMD_CHIP_DETACH: u8 = 0xdc;
/// Byte the EC returns once detached.
const EC_DETACH_ACK: u8 = 0x33;

/// IT85xx EC parameter holding the flash size in KiB.
const EC_PARAM_FLASH_SIZE_KB: u8 = 0xe5;
/// IT89xx EC parameters holding the firmware version.
const EC_PARAM_VERSION_MAJOR: u8 = 0x00;
const EC_PARAM_VERSION_MINOR: u8 = 0x01;

/// Fallback flash size when the chip registers are inconclusive.
const FALLBACK_FLASH_SIZE: u32 = 0x2_0000;

/// One programming session against a SuperIO EC.
pub struct SuperioDevice<P: PortIo, C: Clock = SystemClock> {
    link: EcLink<P, C>,
    sio_port: u16,
    expected_id: u16,
    chip_id: u16,
    family: Option<ChipFamily>,
    size: u32,
    name: Option<String>,
    version: Option<String>,
    instance_id: Option<String>,
    diagnostics: bool,
}

impl<P: PortIo, C: Clock> SuperioDevice<P, C> {
    /// Create a session over an open port channel.
    ///
    /// `expected_id` is the chip id the hardware must report, e.g. 0x8987.
    pub fn new(port: P, clock: C, sio_port: u16, expected_id: u16) -> Self {
        Self {
            link: EcLink::new(port, clock),
            sio_port,
            expected_id,
            chip_id: 0,
            family: None,
            size: 0,
            name: None,
            version: None,
            instance_id: None,
            diagnostics: false,
        }
    }

    /// Dump register banks and EC parameters during setup.
    pub fn set_diagnostics(&mut self, diagnostics: bool) {
        self.diagnostics = diagnostics;
    }

    /// Chip id read back from the hardware.
    pub fn chip_id(&self) -> u16 {
        self.chip_id
    }

    /// Chip family, known after [`SuperioDevice::setup`].
    pub fn family(&self) -> Option<ChipFamily> {
        self.family
    }

    /// Eflash size in bytes, known after [`SuperioDevice::setup`].
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Controller name, when the family reports one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// EC firmware version, when the family reports one.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Stable identifier assigned by [`SuperioDevice::probe`].
    pub fn instance_id(&self) -> Option<&str> {
        self.instance_id.as_deref()
    }

    fn check_id(&mut self) -> Result<()> {
        let id = superio::regval16(
            self.link.port_mut(),
            self.sio_port,
            superio::SIO_LDNXX_IDX_CHIPID1,
        )?;
        if id != self.expected_id {
            return Err(Error::NotSupported(format!(
                "SuperIO chip id was 0x{id:04x} while expecting 0x{:04x}",
                self.expected_id
            )));
        }
        self.chip_id = id;
        Ok(())
    }

    /// Verify the expected chip is present and assign an instance id.
    pub fn probe(&mut self) -> Result<()> {
        self.check_id()?;
        self.instance_id = Some(format!("SuperIO-IT{:04X}", self.chip_id));
        Ok(())
    }

    fn dump_param_space(&mut self) {
        // Parameters past the documented set may time out; keep going.
        for param in 0..=0xffu8 {
            match self.link.ec_get_param(param) {
                Ok(value) => debug!("param 0x{param:02x} = 0x{value:02x}"),
                Err(e) => debug!("param 0x{param:02x} unreadable: {e}"),
            }
        }
    }

    fn setup_it85(&mut self) -> Result<()> {
        self.link.ec_flush()?;
        let size_kb = self.link.ec_get_param(EC_PARAM_FLASH_SIZE_KB)?;
        self.size = u32::from(size_kb) << 10;
        self.name = Some(self.link.ec_get_string(EC_CMD_GET_NAME_STR)?);
        self.version = Some(self.link.ec_get_string(EC_CMD_GET_VERSION_STR)?);
        Ok(())
    }

    fn setup_it89(&mut self) -> Result<()> {
        self.link.ec_flush()?;
        let major = self.link.ec_get_param(EC_PARAM_VERSION_MAJOR)?;
        let minor = self.link.ec_get_param(EC_PARAM_VERSION_MINOR)?;
        self.version = Some(format!("{major:02}.{minor:02}"));

        let id1 = superio::i2ec_read(self.link.port_mut(), self.sio_port, superio::GCTRL_ECHIPID1)?;
        if id1 == 0x85 {
            warn!("EC firmware identifies as IT85xx, assuming 128 KiB flash");
            self.size = FALLBACK_FLASH_SIZE;
            return Ok(());
        }
        let ver = superio::i2ec_read(self.link.port_mut(), self.sio_port, superio::GCTRL_ECHIPVER)?;
        self.size = match ver >> 4 {
            0x0 => 0x2_0000,
            0x4 => 0x3_0000,
            0x8 => 0x4_0000,
            nibble => {
                warn!("unknown size nibble 0x{nibble:x}, assuming 128 KiB flash");
                FALLBACK_FLASH_SIZE
            }
        };
        Ok(())
    }

    /// Identify the chip, locate the PM1 channel and size the eflash.
    pub fn setup(&mut self) -> Result<()> {
        self.check_id()?;

        if self.diagnostics {
            for ldn in 0..superio::SIO_LDN_COUNT {
                superio::regdump(self.link.port_mut(), self.sio_port, ldn)?;
            }
        }

        superio::set_ldn(self.link.port_mut(), self.sio_port, superio::SIO_LDN_PM1)?;
        let iobad0 = superio::regval16(
            self.link.port_mut(),
            self.sio_port,
            superio::SIO_LDNXX_IDX_IOBAD0,
        )?;
        let iobad1 = superio::regval16(
            self.link.port_mut(),
            self.sio_port,
            superio::SIO_LDNXX_IDX_IOBAD1,
        )?;
        debug!("PM1 channel: data 0x{iobad0:04x}, cmd 0x{iobad1:04x}");
        self.link.set_io_ports(iobad0, iobad1);

        if self.diagnostics {
            self.dump_param_space();
        }

        let family = ChipFamily::from_chip_id(self.chip_id).ok_or_else(|| {
            Error::NotSupported(format!("chip id 0x{:04x} has no known family", self.chip_id))
        })?;
        self.family = Some(family);
        match family {
            ChipFamily::It85xx => self.setup_it85()?,
            ChipFamily::It89xx => self.setup_it89()?,
        }
        info!(
            "{family} EC, {} KiB flash, version {}",
            self.size >> 10,
            self.version.as_deref().unwrap_or("unknown")
        );
        Ok(())
    }

    /// Suspend the EC's normal duty so the flash can be accessed.
    pub fn detach(&mut self) -> Result<()> {
        let cmd_port = self.link.cmd_port();
        let data_port = self.link.data_port();
        self.link.ec_write(cmd_port, EC_CMD_CHIP_DETACH)?;
        let ack = self.link.ec_read(data_port)?;
        if ack != EC_DETACH_ACK {
            return Err(Error::Io(io::Error::other(format!(
                "detach failed, EC replied 0x{ack:02x}"
            ))));
        }
        Ok(())
    }

    /// Resume normal EC duty after flash access.
    pub fn attach(&mut self) -> Result<()> {
        let cmd_port = self.link.cmd_port();
        self.link.ec_write(cmd_port, EC_CMD_CHIP_ATTACH)
    }

    /// Read the whole eflash.
    pub fn read_firmware(
        &mut self,
        progress: Option<crate::spi::ByteProgress<'_>>,
    ) -> Result<Vec<u8>> {
        if self.size == 0 {
            return Err(Error::NotSupported("flash size not detected".into()));
        }
        let mut buf = vec![0u8; self.size as usize];
        self.link.spi_read(0, &mut buf, progress)?;
        Ok(buf)
    }

    /// Validate a firmware image against this device before writing.
    pub fn prepare_firmware(&self, data: &[u8]) -> Result<()> {
        image::validate(data, self.size)
    }

    /// Program a firmware image.
    ///
    /// Requires a prior [`SuperioDevice::detach`]; only the IT89xx family
    /// supports in-system reflashing.
    pub fn write_firmware(
        &mut self,
        image: &[u8],
        progress: Option<flasher::ChunkProgress<'_>>,
    ) -> Result<()> {
        match self.family {
            Some(ChipFamily::It89xx) => {}
            Some(family) => {
                return Err(Error::NotSupported(format!(
                    "firmware write is not supported on {family}"
                )));
            }
            None => return Err(Error::NotSupported("device has not been set up".into())),
        }
        if image.len() != self.size as usize {
            return Err(Error::InvalidFile(format!(
                "image size 0x{:x} does not match flash size 0x{:x}",
                image.len(),
                self.size
            )));
        }
        flasher::check_eflash_writable(&mut self.link, self.size)?;
        flasher::write_image(&mut self.link, image, progress)
    }

    /// Close the underlying port channel.
    pub fn close(&mut self) -> Result<()> {
        self.link.close()
    }
}

#[cfg(unix)]
impl SuperioDevice<crate::port::DevPort, SystemClock> {
    /// Open a session over a port device such as `/dev/port`.
    pub fn open(path: impl AsRef<std::path::Path>, sio_port: u16, expected_id: u16) -> Result<Self> {
        let port = crate::port::DevPort::open(path)?;
        Ok(Self::new(port, SystemClock::new(), sio_port, expected_id))
    }
}

impl<P: PortIo, C: Clock> fmt::Display for SuperioDevice<P, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "chip id:  0x{:04x}", self.chip_id)?;
        writeln!(
            f,
            "family:   {}",
            self.family.map_or("unknown".into(), |fam| fam.to_string())
        )?;
        writeln!(f, "flash:    {} KiB", self.size >> 10)?;
        if let Some(name) = &self.name {
            writeln!(f, "name:     {name}")?;
        }
        write!(
            f,
            "version:  {}",
            self.version.as_deref().unwrap_or("unknown")
        )
    }
}
