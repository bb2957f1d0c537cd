//! Firmware image validation.
//!
//! EC firmware images carry an embedded signature block somewhere in the
//! image on a 16-byte boundary: a run of seven `0xa5` marker bytes, one
//! don't-care byte, then a fixed 8-byte tag.

use crate::error::{Error, Result};

/// Marker byte repeated seven times at the start of a signature block.
const SIG_MARKER: u8 = 0xa5;

/// Fixed tag at offset 8 of the signature block.
const SIG_TAG: [u8; 8] = [0x85, 0x12, 0x5a, 0x5a, 0xaa, 0xaa, 0x55, 0x55];

/// Length of the signature block.
const SIG_LEN: usize = 16;

/// Scan for the signature block, returning its offset.
///
/// Only 16-byte-aligned offsets are considered.
pub fn find_signature(data: &[u8]) -> Option<usize> {
    if data.len() < SIG_LEN {
        return None;
    }
    (0..=data.len() - SIG_LEN)
        .step_by(16)
        .find(|&off| {
            data[off..off + 7].iter().all(|&b| b == SIG_MARKER)
                && data[off + 8..off + 16] == SIG_TAG
        })
}

/// Check that `data` is a plausible firmware image for a part with
/// `flash_size` bytes of eflash.
pub fn validate(data: &[u8], flash_size: u32) -> Result<()> {
    if data.is_empty() {
        return Err(Error::InvalidFile("firmware file is empty".into()));
    }
    if data.len() != flash_size as usize {
        return Err(Error::InvalidFile(format!(
            "firmware size 0x{:x} does not match flash size 0x{flash_size:x}",
            data.len()
        )));
    }
    if find_signature(data).is_none() {
        return Err(Error::NotSupported(
            "did not detect signature in firmware file".into(),
        ));
    }
    Ok(())
}
