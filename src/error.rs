//! Error taxonomy for the connection engine.
//!
//! Mirrors the recovery policy described by the engine: per-stream errors reset
//! just that stream, per-connection errors end the connection, and there is no
//! global recovery.

use std::fmt;

use crate::frame::StreamId;

/// A reason code carried by `RST_STREAM` and `GOAWAY` frames.
///
/// Only the subset this engine actually emits or recognizes on the wire is
/// represented; an unknown code received from a peer is mapped to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    NoError,
    ProtocolError,
    InternalError,
    FlowControlError,
    RefusedStream,
    Cancel,
    Other(u32),
}

impl Reason {
    pub fn into_wire(self) -> u32 {
        match self {
            Reason::NoError => 0x0,
            Reason::ProtocolError => 0x1,
            Reason::InternalError => 0x2,
            Reason::FlowControlError => 0x3,
            Reason::RefusedStream => 0x7,
            Reason::Cancel => 0x8,
            Reason::Other(code) => code,
        }
    }

    pub fn from_wire(code: u32) -> Reason {
        match code {
            0x0 => Reason::NoError,
            0x1 => Reason::ProtocolError,
            0x2 => Reason::InternalError,
            0x3 => Reason::FlowControlError,
            0x7 => Reason::RefusedStream,
            0x8 => Reason::Cancel,
            other => Reason::Other(other),
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::NoError => write!(f, "NO_ERROR"),
            Reason::ProtocolError => write!(f, "PROTOCOL_ERROR"),
            Reason::InternalError => write!(f, "INTERNAL_ERROR"),
            Reason::FlowControlError => write!(f, "FLOW_CONTROL_ERROR"),
            Reason::RefusedStream => write!(f, "REFUSED_STREAM"),
            Reason::Cancel => write!(f, "CANCEL"),
            Reason::Other(code) => write!(f, "UNKNOWN({code})"),
        }
    }
}

/// Errors raised by the frame codec / HPACK layer (C7), the in-process stand-in
/// for a negative return from the delegated framing library.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("malformed frame: {0}")]
    Malformed(&'static str),

    #[error("hpack decode error: {0:?}")]
    HpackDecode(fluke_hpack::decoder::DecoderError),

    #[error("{op} failed: {detail}")]
    Submit { op: &'static str, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by a user-supplied handler future.
#[derive(Debug, thiserror::Error)]
#[error("handler error: {0}")]
pub struct HandlerError(pub String);

/// Top-level engine error.
///
/// `Connection(..)` aborts the whole connection task; `Stream(..)` is the
/// "submission race" case from the error handling design, local to one
/// stream and resolved with `RST_STREAM`.
#[derive(Debug, thiserror::Error)]
pub enum H2Error {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(Reason),

    #[error("stream {id:?} reset: {reason}")]
    StreamReset { id: StreamId, reason: Reason },
}

pub type Result<T> = std::result::Result<T, H2Error>;
