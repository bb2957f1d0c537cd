//! In-memory EC emulator for testing.
//!
//! Models just enough of the SuperIO register file, the PM1 byte channel
//! and the EC-bridged flash to exercise the protocol layers without
//! hardware: the banked index/data registers, the OBF/IBF status
//! handshake, the PMC side-channel selectors and an eflash array whose
//! erased state reads back as `0x00`.
//!
//! Fault injection knobs cover the failure paths the programmer has to
//! survive: a wedged status register, erases that silently do nothing and
//! writes that land corrupted for the first N transactions.

use {
    crate::{
        clock::Clock,
        error::Result,
        link::{self, EcLink},
        port::PortIo,
        spi, superio,
    },
    std::{
        collections::{HashMap, VecDeque},
        time::Duration,
    },
};

/// Default emulated flash size, matching an EC parameter 0xe5 of 0x80.
const DEFAULT_FLASH_SIZE: usize = 0x2_0000;

/// Erase granularity of the emulated eflash, one programming page.
const PAGE_SIZE: usize = 0x400;

/// What the next byte written to the command port means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PmcState {
    Idle,
    AwaitSci,
    AwaitSmi,
}

/// SPI command currently being assembled or serviced.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SpiOp {
    None,
    Status,
    /// `pending` counts the 3 address bytes plus the dummy byte.
    Read {
        cursor: u32,
        pending: u8,
    },
    Write {
        addr: u32,
        pending: u8,
        word: Vec<u8>,
    },
    Erase {
        addr: u32,
        pending: u8,
    },
}

/// In-memory stand-in for an ITE SuperIO EC, wired up as a [`PortIo`].
pub struct DummyEc {
    // SuperIO register bank
    sio_index: u8,
    ldn: u8,
    d2_selector: u8,
    i2ec_addr: u16,
    chip_id: u16,
    chip_ver: u8,
    i2ec_id1: u8,

    // PM1 channel
    state: PmcState,
    out: VecDeque<u8>,
    param_pending: bool,
    params: HashMap<u8, u8>,
    name: String,
    version: String,

    // SPI flash model
    op: SpiOp,
    flash: Vec<u8>,
    wel: bool,
    aai: Option<u32>,
    write_op_count: usize,

    // Fault injection
    stuck: bool,
    stuck_polls: usize,
    erase_noop: bool,
    corrupt_writes: usize,
    corrupt_current: bool,
    detach_reply: u8,
    attach_count: usize,
}

impl DummyEc {
    /// SuperIO index port; data port is `SIO_BASE + 1`.
    pub const SIO_BASE: u16 = 0x2e;
    /// PM1 data port advertised through IOBAD0.
    pub const PM1_DATA_PORT: u16 = 0x62;
    /// PM1 command/status port advertised through IOBAD1.
    pub const PM1_CMD_PORT: u16 = 0x66;

    fn new(chip_id: u16) -> Self {
        Self {
            sio_index: 0,
            ldn: 0,
            d2_selector: 0,
            i2ec_addr: 0,
            chip_id,
            chip_ver: 0,
            i2ec_id1: (chip_id >> 8) as u8,
            state: PmcState::Idle,
            out: VecDeque::new(),
            param_pending: false,
            params: HashMap::new(),
            name: String::new(),
            version: String::new(),
            op: SpiOp::None,
            flash: vec![0u8; DEFAULT_FLASH_SIZE],
            wel: false,
            aai: None,
            write_op_count: 0,
            stuck: false,
            stuck_polls: 0,
            erase_noop: false,
            corrupt_writes: 0,
            corrupt_current: false,
            detach_reply: 0x33,
            attach_count: 0,
        }
    }

    /// An IT85xx part: sized through EC parameter 0xe5, named through the
    /// string commands.
    pub fn new_it85(chip_id: u16) -> Self {
        let mut ec = Self::new(chip_id);
        ec.params.insert(0xe5, 0x80);
        ec.name = "IT8512E".into();
        ec.version = "1.00".into();
        ec
    }

    /// An IT89xx part: versioned through parameters 0x00/0x01, sized
    /// through the I2EC chip registers.
    pub fn new_it89(chip_id: u16) -> Self {
        let mut ec = Self::new(chip_id);
        ec.params.insert(0x00, 1);
        ec.params.insert(0x01, 2);
        ec
    }

    /// Wedge the status register: IBF stays set, OBF stays clear.
    pub fn set_stuck(&mut self, stuck: bool) {
        self.stuck = stuck;
    }

    /// Report IBF set for the next `n` status reads only, then recover.
    pub fn set_stuck_polls(&mut self, n: usize) {
        self.stuck_polls = n;
    }

    /// Make sector erases silently do nothing.
    pub fn set_erase_noop(&mut self, noop: bool) {
        self.erase_noop = noop;
    }

    /// Corrupt the first data byte of the next `n` write transactions.
    pub fn set_corrupt_writes(&mut self, n: usize) {
        self.corrupt_writes = n;
    }

    /// Byte returned for the detach command (sane firmware replies 0x33).
    pub fn set_detach_reply(&mut self, reply: u8) {
        self.detach_reply = reply;
    }

    /// Override the chip revision register (I2EC 0x2002).
    pub fn set_chip_revision(&mut self, ver: u8) {
        self.chip_ver = ver;
    }

    /// Override the chip-id mirror register (I2EC 0x2000).
    pub fn set_i2ec_id1(&mut self, id1: u8) {
        self.i2ec_id1 = id1;
    }

    /// Set one EC parameter byte.
    pub fn set_param(&mut self, param: u8, value: u8) {
        self.params.insert(param, value);
    }

    /// Set the controller name string.
    pub fn set_name(&mut self, name: &str) {
        self.name = name.into();
    }

    /// Set the firmware version string.
    pub fn set_version(&mut self, version: &str) {
        self.version = version.into();
    }

    /// Queue raw bytes on the output buffer.
    pub fn push_output(&mut self, bytes: &[u8]) {
        self.out.extend(bytes.iter().copied());
    }

    /// True when no output byte is pending.
    pub fn output_is_empty(&self) -> bool {
        self.out.is_empty()
    }

    /// Emulated flash contents.
    pub fn flash(&self) -> &[u8] {
        &self.flash
    }

    /// Mutable view of the emulated flash.
    pub fn flash_mut(&mut self) -> &mut [u8] {
        &mut self.flash
    }

    /// Resize the emulated flash, erased (all zeroes).
    pub fn set_flash_size(&mut self, size: usize) {
        self.flash = vec![0u8; size];
    }

    /// State of the write-enable latch.
    pub fn write_enabled(&self) -> bool {
        self.wel
    }

    /// Number of completed write-word address phases, one per programmed
    /// chunk.
    pub fn write_op_count(&self) -> usize {
        self.write_op_count
    }

    /// Number of attach commands received.
    pub fn attach_count(&self) -> usize {
        self.attach_count
    }

    fn sio_read(&mut self) -> u8 {
        match self.sio_index {
            superio::SIO_LDNXX_IDX_LDNSEL => self.ldn,
            superio::SIO_LDNXX_IDX_CHIPID1 => (self.chip_id >> 8) as u8,
            superio::SIO_LDNXX_IDX_CHIPID2 => (self.chip_id & 0xff) as u8,
            superio::SIO_LDNXX_IDX_CHIPVER => self.chip_ver,
            superio::SIO_LDNXX_IDX_D2DAT if self.d2_selector == superio::SIO_DEPTH2_I2EC_DATA => {
                match self.i2ec_addr {
                    superio::GCTRL_ECHIPID1 => self.i2ec_id1,
                    superio::GCTRL_ECHIPVER => self.chip_ver,
                    _ => 0,
                }
            }
            superio::SIO_LDNXX_IDX_IOBAD0 => (Self::PM1_DATA_PORT >> 8) as u8,
            idx if idx == superio::SIO_LDNXX_IDX_IOBAD0 + 1 => (Self::PM1_DATA_PORT & 0xff) as u8,
            superio::SIO_LDNXX_IDX_IOBAD1 => (Self::PM1_CMD_PORT >> 8) as u8,
            idx if idx == superio::SIO_LDNXX_IDX_IOBAD1 + 1 => (Self::PM1_CMD_PORT & 0xff) as u8,
            _ => 0,
        }
    }

    fn sio_write(&mut self, value: u8) {
        match self.sio_index {
            superio::SIO_LDNXX_IDX_LDNSEL => self.ldn = value,
            superio::SIO_LDNXX_IDX_D2ADR => self.d2_selector = value,
            superio::SIO_LDNXX_IDX_D2DAT => match self.d2_selector {
                superio::SIO_DEPTH2_I2EC_ADDRH => {
                    self.i2ec_addr = (u16::from(value) << 8) | (self.i2ec_addr & 0x00ff);
                }
                superio::SIO_DEPTH2_I2EC_ADDRL => {
                    self.i2ec_addr = (self.i2ec_addr & 0xff00) | u16::from(value);
                }
                _ => {}
            },
            _ => {}
        }
    }

    fn spi_status_byte(&self) -> u8 {
        // Never busy: WIP clear, WEL tracks the latch.
        if self.wel { spi::SPI_STATUS_WEL } else { 0 }
    }

    fn start_spi_op(&mut self, opcode: u8) {
        match opcode {
            spi::SPI_CMD_RDSR => self.op = SpiOp::Status,
            spi::SPI_CMD_WREN => {
                self.wel = true;
                self.op = SpiOp::None;
            }
            spi::SPI_CMD_WRDI => {
                self.wel = false;
                self.aai = None;
                self.op = SpiOp::None;
            }
            spi::SPI_CMD_HS_READ => {
                self.aai = None;
                self.op = SpiOp::Read {
                    cursor: 0,
                    pending: 4,
                };
            }
            spi::SPI_CMD_WRITE_WORD => {
                self.op = match self.aai {
                    // Continuation: the address auto-increments.
                    Some(addr) => SpiOp::Write {
                        addr,
                        pending: 0,
                        word: Vec::new(),
                    },
                    None => SpiOp::Write {
                        addr: 0,
                        pending: 3,
                        word: Vec::new(),
                    },
                };
            }
            spi::SPI_CMD_SECTOR_ERASE_4K => {
                self.aai = None;
                self.op = SpiOp::Erase {
                    addr: 0,
                    pending: 3,
                };
            }
            _ => self.op = SpiOp::None,
        }
    }

    fn spi_data_byte(&mut self, value: u8) {
        match &mut self.op {
            SpiOp::Read { cursor, pending } => {
                if *pending > 1 {
                    *cursor = (*cursor << 8) | u32::from(value);
                }
                *pending -= 1;
            }
            SpiOp::Write {
                addr,
                pending,
                word,
            } => {
                if *pending > 0 {
                    *addr = (*addr << 8) | u32::from(value);
                    *pending -= 1;
                    if *pending == 0 {
                        // Address phase complete: a new write transaction.
                        self.aai = Some(*addr);
                        self.write_op_count += 1;
                        self.corrupt_current = self.corrupt_writes > 0;
                        if self.corrupt_writes > 0 {
                            self.corrupt_writes -= 1;
                        }
                    }
                } else {
                    word.push(value);
                    if word.len() == 2 {
                        let base = *addr as usize;
                        let mut first = word[0];
                        if self.corrupt_current {
                            first ^= 0xff;
                            self.corrupt_current = false;
                        }
                        if base + 1 < self.flash.len() {
                            self.flash[base] = first;
                            self.flash[base + 1] = word[1];
                        }
                        self.aai = Some(*addr + 2);
                        self.op = SpiOp::None;
                    }
                }
            }
            SpiOp::Erase { addr, pending } => {
                if *pending > 0 {
                    *addr = (*addr << 8) | u32::from(value);
                    *pending -= 1;
                    if *pending == 0 {
                        let base = *addr as usize;
                        if !self.erase_noop && base < self.flash.len() {
                            let end = (base + PAGE_SIZE).min(self.flash.len());
                            self.flash[base..end].fill(0);
                        }
                        self.op = SpiOp::None;
                    }
                }
            }
            SpiOp::None | SpiOp::Status => {}
        }
    }

    fn clock_byte_in(&mut self) {
        let status = self.spi_status_byte();
        let byte = match &mut self.op {
            SpiOp::Status => status,
            SpiOp::Read { cursor, pending } if *pending == 0 => {
                let b = self
                    .flash
                    .get(*cursor as usize)
                    .copied()
                    .unwrap_or(0);
                *cursor += 1;
                b
            }
            _ => 0,
        };
        self.out.push_back(byte);
    }

    fn cmd_write(&mut self, value: u8) {
        match self.state {
            PmcState::AwaitSci => {
                self.start_spi_op(value);
                self.state = PmcState::Idle;
            }
            PmcState::AwaitSmi => {
                self.spi_data_byte(value);
                self.state = PmcState::Idle;
            }
            PmcState::Idle => match value {
                spi::EC_PMC_PM1DO => {}
                spi::EC_PMC_PM1DOSCI => self.state = PmcState::AwaitSci,
                spi::EC_PMC_PM1DOSMI => self.state = PmcState::AwaitSmi,
                spi::EC_PMC_PM1DI => self.clock_byte_in(),
                spi::EC_PMC_PM1DISCI => {}
                link::EC_CMD_READ_PARAM => self.param_pending = true,
                link::EC_CMD_GET_NAME_STR => {
                    let s: Vec<u8> = self.name.bytes().collect();
                    self.push_output(&s);
                    self.out.push_back(b'$');
                }
                link::EC_CMD_GET_VERSION_STR => {
                    let s: Vec<u8> = self.version.bytes().collect();
                    self.push_output(&s);
                    self.out.push_back(b'$');
                }
                0xfc => self.attach_count += 1,
                0xdc => self.out.push_back(self.detach_reply),
                _ => {}
            },
        }
    }

    fn status_byte(&mut self) -> u8 {
        if self.stuck {
            return link::EC_STATUS_IBF;
        }
        if self.stuck_polls > 0 {
            self.stuck_polls -= 1;
            return link::EC_STATUS_IBF;
        }
        if self.out.is_empty() {
            0
        } else {
            link::EC_STATUS_OBF
        }
    }
}

impl PortIo for DummyEc {
    fn read_byte(&mut self, port: u16) -> Result<u8> {
        Ok(match port {
            p if p == Self::SIO_BASE => self.sio_index,
            p if p == Self::SIO_BASE + 1 => self.sio_read(),
            Self::PM1_CMD_PORT => self.status_byte(),
            Self::PM1_DATA_PORT => self.out.pop_front().unwrap_or(0),
            _ => 0,
        })
    }

    fn write_byte(&mut self, port: u16, value: u8) -> Result<()> {
        match port {
            p if p == Self::SIO_BASE => self.sio_index = value,
            p if p == Self::SIO_BASE + 1 => self.sio_write(value),
            Self::PM1_CMD_PORT => self.cmd_write(value),
            Self::PM1_DATA_PORT => {
                if self.param_pending {
                    self.param_pending = false;
                    let reply = self.params.get(&value).copied().unwrap_or(0);
                    self.out.push_back(reply);
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Deterministic clock advancing a fixed tick per observation, so timeout
/// paths run in microseconds instead of wall-clock time.
pub struct TestClock {
    now: Duration,
    tick: Duration,
}

impl TestClock {
    /// Clock advancing `tick` per observation.
    pub fn with_tick(tick: Duration) -> Self {
        Self {
            now: Duration::ZERO,
            tick,
        }
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::with_tick(Duration::from_millis(10))
    }
}

impl Clock for TestClock {
    fn now(&mut self) -> Duration {
        self.now += self.tick;
        self.now
    }
}

/// EC link over a dummy controller with the test clock, pointed at the
/// emulator's PM1 ports.
pub fn test_link(ec: DummyEc) -> EcLink<DummyEc, TestClock> {
    let mut link = EcLink::new(ec, TestClock::default());
    link.set_io_ports(DummyEc::PM1_DATA_PORT, DummyEc::PM1_CMD_PORT);
    link
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chip_id_registers() {
        let mut ec = DummyEc::new_it85(0x8512);
        ec.write_byte(DummyEc::SIO_BASE, superio::SIO_LDNXX_IDX_CHIPID1)
            .unwrap();
        assert_eq!(ec.read_byte(DummyEc::SIO_BASE + 1).unwrap(), 0x85);
        ec.write_byte(DummyEc::SIO_BASE, superio::SIO_LDNXX_IDX_CHIPID2)
            .unwrap();
        assert_eq!(ec.read_byte(DummyEc::SIO_BASE + 1).unwrap(), 0x12);
    }

    #[test]
    fn test_status_reflects_output_buffer() {
        let mut ec = DummyEc::new_it85(0x8512);
        assert_eq!(ec.read_byte(DummyEc::PM1_CMD_PORT).unwrap(), 0);
        ec.push_output(&[0x42]);
        assert_eq!(
            ec.read_byte(DummyEc::PM1_CMD_PORT).unwrap(),
            link::EC_STATUS_OBF
        );
        assert_eq!(ec.read_byte(DummyEc::PM1_DATA_PORT).unwrap(), 0x42);
        assert_eq!(ec.read_byte(DummyEc::PM1_CMD_PORT).unwrap(), 0);
    }

    #[test]
    fn test_detach_command_queues_reply() {
        let mut ec = DummyEc::new_it85(0x8512);
        ec.write_byte(DummyEc::PM1_CMD_PORT, 0xdc).unwrap();
        assert_eq!(ec.read_byte(DummyEc::PM1_DATA_PORT).unwrap(), 0x33);
    }
}
