#![forbid(unsafe_code)]

use std::io;

use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////

/// Error kinds a decode session can end with.
///
/// Carried inside `anyhow::Error`; use `err.downcast_ref::<DecodeError>()` to
/// tell them apart.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid gzip header: {0}")]
    Format(String),

    #[error("unsupported block type {0}")]
    UnsupportedBlock(u8),

    #[error("corrupt deflate stream: {0}")]
    CorruptStream(String),

    #[error("input ended before the stream was complete")]
    Truncated(#[source] io::Error),

    #[error("{0} check failed")]
    Checksum(&'static str),
}

impl DecodeError {
    pub fn format<T: ToString>(msg: T) -> Self {
        DecodeError::Format(msg.to_string())
    }

    pub fn corrupt<T: ToString>(msg: T) -> Self {
        DecodeError::CorruptStream(msg.to_string())
    }
}

impl From<io::Error> for DecodeError {
    fn from(err: io::Error) -> Self {
        DecodeError::Truncated(err)
    }
}

////////////////////////////////////////////////////////////////////////////////
