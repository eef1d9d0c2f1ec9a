//! Unified error types for the GAP controller.
//!
//! A single `GapError` enum that every subsystem can convert into. All
//! variants are `Copy` so they can be passed through the dispatcher and
//! the worker without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Link-controller status
// ---------------------------------------------------------------------------

/// Non-zero status code returned by a rejected Link-Controller command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkStatus(pub u8);

impl LinkStatus {
    /// Generic "invalid parameters" status used by the radio stack.
    pub const INVALID_PARAMS: Self = Self(0x42);
    /// Command issued while the radio is busy with another procedure.
    pub const BUSY: Self = Self(0x0C);
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status 0x{:02X}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Event decoding errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Packet ended before the fields required by its event code.
    Truncated,
    /// Parameter-length byte disagrees with the bytes actually delivered.
    LengthMismatch,
    /// Packet shorter than the 2-byte HCI event header.
    Empty,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "packet truncated"),
            Self::LengthMismatch => write!(f, "parameter length mismatch"),
            Self::Empty => write!(f, "packet shorter than event header"),
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level controller error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapError {
    /// The radio stack has not finished booting.
    RadioNotReady,
    /// Configuration is invalid.
    Config(&'static str),
    /// The command worker thread could not be created.
    WorkerSpawn,
    /// A Link-Controller command was rejected.
    Link(LinkStatus),
    /// An inbound notification could not be decoded.
    Decode(DecodeError),
    /// An advertising payload would exceed its buffer.
    PayloadOverflow,
}

impl fmt::Display for GapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RadioNotReady => write!(f, "radio stack not ready"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::WorkerSpawn => write!(f, "failed to spawn GAP worker"),
            Self::Link(s) => write!(f, "link controller: {s}"),
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::PayloadOverflow => write!(f, "advertising payload overflow"),
        }
    }
}

impl std::error::Error for GapError {}

impl From<LinkStatus> for GapError {
    fn from(s: LinkStatus) -> Self {
        Self::Link(s)
    }
}

impl From<DecodeError> for GapError {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, GapError>;
