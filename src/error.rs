//! Error taxonomy and transfer results.
//!
//! Every public operation resolves to one of a closed set of error codes —
//! nothing in this crate panics its way across the API boundary.  Transfers
//! additionally carry the number of bytes moved before any failing condition,
//! because a short read or write is often *not* an error: the peer hung up,
//! the deadline passed, or the send buffer filled.  Callers get the partial
//! count either way.

use thiserror::Error;

use crate::radio::RadioFault;

// ---------------------------------------------------------------------------
// TransportError
// ---------------------------------------------------------------------------

/// The closed set of failure codes surfaced by every public operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Allocating the per-connection machinery failed.
    #[error("out of memory allocating the connection handle")]
    NoMemory,
    /// A null, unopened, or already-closed handle was passed in.
    #[error("invalid or closed handle")]
    InvalidArgs,
    /// The device address could not be resolved, or the peer does not offer
    /// the serial service.
    #[error("device or serial service not found")]
    NoDevice,
    /// The peer answered with an incompatible protocol.
    #[error("peer protocol not compatible")]
    Protocol,
    /// The local platform or Bluetooth stack cannot perform the operation.
    #[error("operation not supported by the local stack")]
    Unsupported,
    /// Any other transport-level failure.  Also the fallback for underlying
    /// errors this crate does not recognize.
    #[error("transport I/O failure")]
    Io,
}

/// Map a terminal socket fault onto the public taxonomy.
///
/// Unrecognized faults deliberately collapse into [`TransportError::Io`].
impl From<RadioFault> for TransportError {
    fn from(fault: RadioFault) -> Self {
        match fault {
            RadioFault::HostNotFound | RadioFault::ServiceNotFound => Self::NoDevice,
            RadioFault::ProtocolUnsupported => Self::Protocol,
            RadioFault::OperationUnsupported => Self::Unsupported,
            RadioFault::Network | RadioFault::Other => Self::Io,
        }
    }
}

// ---------------------------------------------------------------------------
// TransferResult
// ---------------------------------------------------------------------------

/// Outcome of one read or write call.
///
/// `transferred` counts the bytes actually moved, which may be fewer than
/// requested.  `error` is `None` for benign endings (all bytes moved, the
/// deadline passed, the connection dropped mid-stream, the send buffer was
/// full) and `Some` only for hard failures — and even then the partial count
/// is preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct TransferResult {
    /// Bytes successfully transferred before any terminating condition.
    pub transferred: usize,
    /// Hard failure, if one occurred.
    pub error: Option<TransportError>,
}

impl TransferResult {
    /// A transfer that ended without a hard error (possibly short).
    pub fn done(transferred: usize) -> Self {
        Self {
            transferred,
            error: None,
        }
    }

    /// A transfer cut short by a hard error, keeping the partial count.
    pub fn aborted(transferred: usize, error: TransportError) -> Self {
        Self {
            transferred,
            error: Some(error),
        }
    }

    /// `true` when no hard error occurred.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
