//! Chip identification and family dispatch.

use std::fmt;

/// SuperIO EC families with distinct setup and sizing paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipFamily {
    /// IT85xx: sized through an EC parameter, self-describing name and
    /// version strings.
    It85xx,
    /// IT89xx: versioned through EC parameters, sized through the I2EC
    /// chip registers.
    It89xx,
}

impl ChipFamily {
    /// Classify a 16-bit chip id by its family byte.
    pub fn from_chip_id(id: u16) -> Option<Self> {
        match id >> 8 {
            0x85 => Some(Self::It85xx),
            0x89 => Some(Self::It89xx),
            _ => None,
        }
    }
}

impl fmt::Display for ChipFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::It85xx => write!(f, "IT85xx"),
            Self::It89xx => write!(f, "IT89xx"),
        }
    }
}

/// Chipsets this programmer has been used against, with their expected
/// chip ids. Used to validate the id read back from hardware.
pub const KNOWN_CHIPSETS: &[(&str, u16)] = &[
    ("it8512", 0x8512),
    ("it8587", 0x8587),
    ("it8987", 0x8987),
];

/// Look up the expected chip id for a chipset name.
pub fn chipset_id(name: &str) -> Option<u16> {
    KNOWN_CHIPSETS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|&(_, id)| id)
}
