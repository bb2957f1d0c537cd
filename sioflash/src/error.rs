//! Error types for sioflash.

use std::io;
use thiserror::Error;

/// Result type for sioflash operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for sioflash operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (port access, file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Handshake deadline exceeded while polling the EC status register.
    #[error("Timed out: {0}")]
    TimedOut(String),

    /// Chip-id mismatch, protection fuse engaged, or signature absent.
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Size mismatch, misaligned address or odd-length payload.
    #[error("Invalid file: {0}")]
    InvalidFile(String),

    /// Erase or write verification read back the wrong contents.
    #[error("Read verify failed: {0}")]
    ReadVerifyFailed(String),
}

impl Error {
    /// Whether the per-chunk programming loop may retry after this error.
    ///
    /// Only verification mismatches are retryable; channel-level errors
    /// (`Io`, `TimedOut`) and policy errors abort immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ReadVerifyFailed(_))
    }
}
