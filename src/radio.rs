//! The asynchronous radio socket capability.
//!
//! Everything above this module is written once against [`RadioSocket`];
//! platform backends (a BlueZ/high-level stack socket, a raw AF_BLUETOOTH
//! socket, the in-memory [`crate::sim`] backend) are interchangeable behind
//! it.  The trait mirrors what real Bluetooth stacks offer: an asynchronous
//! connect, an observable connection state, non-blocking read/write, a
//! readable-byte count, and a notification stream that fires whenever "data
//! became readable" or "the connection outcome changed".
//!
//! Notifications are an epoch counter in a `tokio::sync::watch` channel.
//! Backends bump the counter after every observable transition; waiters
//! re-check socket state after each wakeup, so a bump can be coarse (one
//! counter for all event kinds) without losing information.

use std::fmt;

use tokio::sync::watch;
use uuid::{uuid, Uuid};

/// Well-known UUID of the Serial Port Profile service.
pub const SERIAL_PORT_PROFILE: Uuid = uuid!("00001101-0000-1000-8000-00805f9b34fb");

// ---------------------------------------------------------------------------
// Vocabulary types
// ---------------------------------------------------------------------------

/// Observable connection state of a radio socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No connection; also the terminal state after a refused or dropped one.
    Unconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// The stack is still resolving the remote service (SDP lookup).
    ServiceLookup,
    /// The link is up; reads and writes may move bytes.
    Connected,
}

impl LinkState {
    /// `true` while a connect attempt has neither succeeded nor failed.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Connecting | Self::ServiceLookup)
    }
}

/// Last error reported by the underlying stack for a failed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioFault {
    /// The remote address could not be resolved.
    HostNotFound,
    /// The peer exists but does not offer the requested service.
    ServiceNotFound,
    /// The peer answered with a protocol the stack cannot speak.
    ProtocolUnsupported,
    /// The local stack refused the operation outright.
    OperationUnsupported,
    /// A network-level failure below the Bluetooth profile layer.
    Network,
    /// Anything the backend could not classify.
    Other,
}

/// Result of one non-blocking read or write attempt.
///
/// `Transferred(0)` means "nothing available right now" (read) or "send
/// buffer full" (write) — not end-of-stream; stream end is observed through
/// [`LinkState::Unconnected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoAttempt {
    /// `n` bytes moved.  Never more than the caller's buffer length.
    Transferred(usize),
    /// A retryable condition (interrupted call, would-block).  The caller
    /// may retry immediately.
    Transient,
    /// A hard failure; the attempt (and usually the link) is dead.
    Failed,
}

/// Endpoint on the remote device offering the serial service.
///
/// Some platforms connect by numbered RFCOMM channel, others by service
/// UUID; devices are inconsistent about which channel actually carries the
/// serial service, which is why [`crate::establish`] tries more than one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceTarget {
    /// A numbered RFCOMM channel (1 is the customary default).
    Channel(u8),
    /// A service UUID, resolved through service discovery.
    Service(Uuid),
}

impl fmt::Display for ServiceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(n) => write!(f, "channel {n}"),
            Self::Service(uuid) => write!(f, "service {uuid}"),
        }
    }
}

// ---------------------------------------------------------------------------
// RadioSocket
// ---------------------------------------------------------------------------

/// An asynchronous connect/read/write/close primitive over the radio.
///
/// # Contract for implementors
///
/// - [`start_connect`](Self::start_connect) only *initiates*; progress and
///   outcome are observed via [`state`](Self::state) and announced on the
///   [`events`](Self::events) channel.  Calling it again abandons the
///   previous attempt (used for the fallback-channel retry).
/// - [`try_read`](Self::try_read) / [`try_write`](Self::try_write) never
///   block and never report more bytes than the buffer holds.
/// - Every observable transition — state change, fault, data becoming
///   readable — must bump the events counter *after* the state is visible,
///   so a waiter that re-checks on wakeup cannot miss it.
/// - [`close`](Self::close) is best-effort and must be safe to call in any
///   state, including after an earlier failure.
pub trait RadioSocket: Send {
    /// Begin an asynchronous connect to `address` at `target`.
    fn start_connect(&mut self, address: &str, target: ServiceTarget);

    /// Current connection state.
    fn state(&self) -> LinkState;

    /// Last fault reported by the stack, if any.
    fn last_fault(&self) -> Option<RadioFault>;

    /// Non-blocking read into `buf`.
    fn try_read(&mut self, buf: &mut [u8]) -> IoAttempt;

    /// Non-blocking write of `buf`.
    fn try_write(&mut self, buf: &[u8]) -> IoAttempt;

    /// Count of bytes readable right now without blocking.
    fn bytes_available(&self) -> usize;

    /// Subscribe to the socket's event counter.
    fn events(&self) -> watch::Receiver<u64>;

    /// Tear the connection down and release stack resources.
    fn close(&mut self);
}
