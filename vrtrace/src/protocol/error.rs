use std::io;
use thiserror::Error;

/// Errors raised by the Sandesh codec.
///
/// Any of these aborts the struct being read or written. The transport is
/// left mid-stream, so a session that failed must not be reused for further
/// reads.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The underlying transport failed (including short reads).
    #[error("transport i/o: {0}")]
    Transport(#[from] io::Error),

    /// A length or size prefix on the wire was negative.
    #[error("negative size: {0}")]
    NegativeSize(i32),

    /// A length or size prefix exceeded the configured maximum.
    #[error("size exceeded max allowed: {size} > {max}")]
    SizeLimit { size: i32, max: i32 },

    /// Well-framed bytes that still cannot be decoded.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Skipping a nested value recursed too deep.
    #[error("depth limit exceeded while skipping")]
    DepthLimit,
}

impl ProtocolError {
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(e) if crate::protocol::transport::is_timeout(e))
    }
}

pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;
