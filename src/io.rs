//! Blocking-emulation read and write engines.
//!
//! Both engines are retry loops over the socket's non-blocking primitives:
//!
//! - Transient conditions (interrupted call, would-block) are retried
//!   immediately and never consume the timeout budget or reach the caller.
//! - Hard failures abort with `Io`, still reporting the bytes already moved.
//! - Losing the connection mid-transfer ends the loop *without* an error:
//!   a short transfer models end-of-stream.
//!
//! The engines differ in how they handle "zero bytes moved".  A reader can
//! wait — the socket announces readability on its event channel — so it
//! suspends via [`await_event`] under the configured timeout.  A writer has
//! no send-side readiness event to wait on, so a full send buffer ends the
//! write short rather than spinning.

use tokio::sync::watch;

use crate::error::{TransferResult, TransportError};
use crate::radio::{IoAttempt, LinkState, RadioSocket};
use crate::wait::{await_event, Fired, ReadTimeout};

/// Fill `buf` from the socket, waiting up to `timeout` each time the link
/// runs dry.
///
/// Returns short with no error when the deadline passes or the connection
/// drops; returns `Io` (with the partial count) only on a hard failure.
/// An empty `buf` completes immediately.
pub async fn read_into(
    socket: &mut dyn RadioSocket,
    events: &mut watch::Receiver<u64>,
    buf: &mut [u8],
    timeout: ReadTimeout,
) -> TransferResult {
    let mut nread = 0;

    while nread < buf.len() {
        if socket.state() != LinkState::Connected {
            // End of stream, not an error.
            break;
        }

        match socket.try_read(&mut buf[nread..]) {
            IoAttempt::Transferred(0) => {
                // Nothing readable: suspend until data arrives or the
                // per-wait budget elapses, whichever comes first.
                match await_event(events, timeout).await {
                    Fired::Event => continue,
                    Fired::TimedOut => break,
                }
            }
            IoAttempt::Transferred(n) => nread += n,
            IoAttempt::Transient => continue,
            IoAttempt::Failed => {
                log::debug!("[rfcomm] read failed after {nread} byte(s)");
                return TransferResult::aborted(nread, TransportError::Io);
            }
        }
    }

    TransferResult::done(nread)
}

/// Push all of `buf` into the socket.
///
/// A full send buffer (`Transferred(0)` without an error) ends the write
/// short with no error — the platform is signalling backpressure and offers
/// no event to wait on.  Hard failures abort with `Io` plus the partial
/// count.
pub async fn write_all(socket: &mut dyn RadioSocket, buf: &[u8]) -> TransferResult {
    let mut nwritten = 0;

    while nwritten < buf.len() {
        if socket.state() != LinkState::Connected {
            break;
        }

        match socket.try_write(&buf[nwritten..]) {
            IoAttempt::Transferred(0) => break, // backpressure
            IoAttempt::Transferred(n) => nwritten += n,
            IoAttempt::Transient => continue,
            IoAttempt::Failed => {
                log::debug!("[rfcomm] write failed after {nwritten} byte(s)");
                return TransferResult::aborted(nwritten, TransportError::Io);
            }
        }
    }

    TransferResult::done(nwritten)
}
