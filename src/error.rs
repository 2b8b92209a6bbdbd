//! Typed errors for every fallible entry point.
//!
//! The wire protocol itself only ever reported terse numeric codes
//! (`-1`/`-2`/`-3` from `input`, `-1` from `peeksize`). We keep those
//! available via [`InputError::code`] for callers ported against the
//! numeric ABI, but the primary surface is these enums.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("cannot send an empty buffer")]
    EmptyData,
    #[error("message of {len} bytes needs more fragments than the receive window allows (mss={mss})")]
    FragmentTooLarge { mss: usize, len: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecvError {
    #[error("no data available")]
    NoData,
    #[error("leading message is not fully reassembled yet")]
    FragmentIncomplete,
    #[error("buffer too small: need {needed}, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("datagram shorter than a segment header")]
    HeaderTooShort,
    #[error("conversation id mismatch: expected {expected}, got {got}")]
    ConversationMismatch { expected: u32, got: u32 },
    #[error("segment payload truncated")]
    PayloadTruncated,
    #[error("segment payload of {len} bytes exceeds mtu {mtu}")]
    PayloadExceedsMtu { len: u32, mtu: u32 },
    #[error("unknown command byte {0}")]
    UnknownCommand(u8),
}

impl InputError {
    /// The numeric code this error maps onto in the original 3-code contract.
    pub fn code(&self) -> i32 {
        match self {
            InputError::HeaderTooShort | InputError::ConversationMismatch { .. } => -1,
            InputError::PayloadTruncated | InputError::PayloadExceedsMtu { .. } => -2,
            InputError::UnknownCommand(_) => -3,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("mtu {got} is below the minimum of {min}")]
    MtuTooSmall { min: u16, got: u16 },
}
