//! Chunked eflash programming with per-chunk verification and retry.
//!
//! Firmware is programmed in 1 KiB chunks. Each chunk is erased, read
//! back to confirm the erase took, written (unless the chunk is all
//! zeroes, which already matches the erased state) and read back again to
//! confirm the write. A chunk that fails read-back verification is
//! retried from the erase step; any other failure aborts immediately.

use {
    crate::{
        clock::Clock,
        error::{Error, Result},
        link::EcLink,
        port::PortIo,
    },
    log::{debug, warn},
};

/// Programming chunk size, matching the eflash page-erase granularity.
pub const CHUNK_SIZE: usize = 0x400;

/// Upper bound on erase/write/verify attempts for one chunk.
pub const MAX_CHUNK_ATTEMPTS: usize = 6;

/// Number of trailing flash bytes probed by [`check_eflash_writable`].
const PROTECT_PROBE_LEN: usize = 16;

/// Per-chunk progress callback: (chunks done, chunks total).
pub type ChunkProgress<'a> = &'a mut dyn FnMut(usize, usize);

/// One programming unit: a chunk-aligned address and its payload.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    /// Flash address of the first byte.
    pub address: u32,
    /// Payload, at most [`CHUNK_SIZE`] bytes.
    pub data: &'a [u8],
}

/// Partition an image into chunk-aligned programming units.
pub fn chunks(image: &[u8]) -> Vec<Chunk<'_>> {
    image
        .chunks(CHUNK_SIZE)
        .enumerate()
        .map(|(i, data)| Chunk {
            address: (i * CHUNK_SIZE) as u32,
            data,
        })
        .collect()
}

fn all_zero(data: &[u8]) -> bool {
    data.iter().all(|&b| b == 0)
}

/// Outcome of one chunk's bounded retry loop.
#[derive(Debug)]
pub enum ProgrammingResult {
    /// The chunk verified clean, possibly after retries.
    Success {
        /// Attempts consumed, counting the successful one.
        attempts: usize,
    },
    /// Every attempt failed verification; holds the last mismatch.
    VerificationFailed(Error),
    /// A non-retryable error aborted the loop.
    Fatal(Error),
}

impl ProgrammingResult {
    /// Collapse into a plain result, dropping the attempt count.
    pub fn into_result(self) -> Result<()> {
        match self {
            Self::Success { .. } => Ok(()),
            Self::VerificationFailed(e) | Self::Fatal(e) => Err(e),
        }
    }
}

/// Run `f` up to `attempts` times, retrying only verification failures.
pub fn program_with_retries(
    attempts: usize,
    mut f: impl FnMut() -> Result<()>,
) -> ProgrammingResult {
    let mut last = None;
    for attempt in 1..=attempts {
        match f() {
            Ok(()) => return ProgrammingResult::Success { attempts: attempt },
            Err(e) if e.is_retryable() => {
                warn!("attempt {attempt}/{attempts} failed: {e}");
                last = Some(e);
            }
            Err(e) => return ProgrammingResult::Fatal(e),
        }
    }
    ProgrammingResult::VerificationFailed(
        last.unwrap_or_else(|| Error::ReadVerifyFailed("no attempts made".into())),
    )
}

/// Refuse to program a part whose protection fuse is blown.
///
/// On a writable part the tail of the eflash reads back erased (all
/// zeroes); a protected part returns live data there.
pub fn check_eflash_writable<P: PortIo, C: Clock>(
    link: &mut EcLink<P, C>,
    flash_size: u32,
) -> Result<()> {
    let Some(tail_addr) = flash_size.checked_sub(PROTECT_PROBE_LEN as u32) else {
        return Err(Error::NotSupported(format!(
            "flash size 0x{flash_size:x} is smaller than the protection window"
        )));
    };
    let mut buf = [0u8; PROTECT_PROBE_LEN];
    link.spi_read(tail_addr, &mut buf, None)?;
    if !all_zero(&buf) {
        return Err(Error::NotSupported("eflash has been protected".into()));
    }
    Ok(())
}

fn write_chunk_once<P: PortIo, C: Clock>(
    link: &mut EcLink<P, C>,
    chunk: &Chunk<'_>,
) -> Result<()> {
    link.spi_sector_erase(chunk.address)?;

    let mut buf = vec![0u8; chunk.data.len()];
    link.spi_read(chunk.address, &mut buf, None)?;
    if !all_zero(&buf) {
        return Err(Error::ReadVerifyFailed(format!(
            "sector @0x{:x} was not erased",
            chunk.address
        )));
    }

    // Erased flash reads back as zeroes, so an all-zero chunk is already
    // in its final state.
    if all_zero(chunk.data) {
        debug!("skipping all-zero chunk @0x{:x}", chunk.address);
        return Ok(());
    }

    link.spi_write(chunk.address, chunk.data)?;
    link.spi_read(chunk.address, &mut buf, None)?;
    if buf != chunk.data {
        return Err(Error::ReadVerifyFailed(format!(
            "failed to verify chunk @0x{:x}",
            chunk.address
        )));
    }
    Ok(())
}

/// Erase, program and verify one chunk, retrying verification failures.
pub fn write_chunk<P: PortIo, C: Clock>(
    link: &mut EcLink<P, C>,
    chunk: &Chunk<'_>,
) -> Result<()> {
    let outcome = program_with_retries(MAX_CHUNK_ATTEMPTS, || write_chunk_once(link, chunk));
    if let ProgrammingResult::Success { attempts } = &outcome {
        if *attempts > 1 {
            debug!("chunk @0x{:x} succeeded on attempt {attempts}", chunk.address);
        }
    }
    outcome.into_result()
}

/// Program a firmware image.
///
/// The final chunk is never transmitted, matching the vendor updater's
/// observed behavior. Whether that chunk carries meaningful payload is
/// unconfirmed, so the behavior is preserved as-is. The progress callback
/// counts transmitted chunks against the full chunk count.
pub fn write_image<P: PortIo, C: Clock>(
    link: &mut EcLink<P, C>,
    image: &[u8],
    mut progress: Option<ChunkProgress<'_>>,
) -> Result<()> {
    let chunks = chunks(image);
    let total = chunks.len();
    for (i, chunk) in chunks.iter().take(total.saturating_sub(1)).enumerate() {
        debug!(
            "writing chunk {}/{total} @0x{:x} ({} bytes)",
            i + 1,
            chunk.address,
            chunk.data.len()
        );
        write_chunk(link, chunk)?;
        if let Some(cb) = progress.as_mut() {
            cb(i + 1, total);
        }
    }
    Ok(())
}
