//! The blocking handle: lifecycle and timeout control.
//!
//! [`RfcommStream`] is the unit of ownership for one open connection.  It
//! exclusively owns its radio socket (created during [`open`], destroyed in
//! [`close`]) plus the stream's read timeout, and it drives the async core
//! on a private current-thread runtime: each blocking call runs exactly one
//! short cooperative event loop and returns.  Nothing here is shared — by
//! contract a handle is never touched from two call sites at once, so there
//! is no internal locking.
//!
//! A handle is either fully open or logically closed; establishment failure
//! releases the socket before the error is returned, so callers never see a
//! half-open handle.  [`RfcommStream::closed`] models the unopened handle a
//! foreign caller might pass in: every operation on it answers
//! `InvalidArgs`, except [`close`], which trivially succeeds.
//!
//! [`open`]: RfcommStream::open
//! [`close`]: RfcommStream::close

use tokio::runtime::{Builder, Runtime};
use tokio::sync::watch;

use crate::error::{TransferResult, TransportError};
use crate::establish::{establish, ConnectConfig};
use crate::io::{read_into, write_all};
use crate::radio::RadioSocket;
use crate::wait::ReadTimeout;

/// Which buffered direction a purge request names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeDirection {
    /// Received-but-unread bytes.
    Input,
    /// Queued-but-unsent bytes.
    Output,
    /// Both directions.
    All,
}

// ---------------------------------------------------------------------------
// RfcommStream
// ---------------------------------------------------------------------------

/// Everything an open stream owns.  Exists only while the handle is open.
struct Inner {
    rt: Runtime,
    socket: Box<dyn RadioSocket>,
    events: watch::Receiver<u64>,
    /// Signed milliseconds: negative blocks forever, zero polls once.
    timeout_ms: i64,
    /// Kept for diagnostics only.
    address: String,
}

/// A blocking byte stream over one RFCOMM connection.
pub struct RfcommStream {
    inner: Option<Inner>,
}

impl RfcommStream {
    /// A handle that was never opened (or has been closed).
    pub fn closed() -> Self {
        Self { inner: None }
    }

    /// Connect to `address` through `socket` and wrap the live link.
    ///
    /// Reads default to blocking indefinitely until
    /// [`set_timeout`](Self::set_timeout) says otherwise.  On any failure
    /// the socket is closed and released before the error is returned.
    pub fn open(
        address: &str,
        mut socket: Box<dyn RadioSocket>,
        cfg: ConnectConfig,
    ) -> Result<Self, TransportError> {
        let rt = Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| {
                log::warn!("[rfcomm] could not allocate the connection runtime: {e}");
                TransportError::NoMemory
            })?;

        // `establish` closes the socket itself on failure; dropping the box
        // here releases the rest.
        rt.block_on(establish(socket.as_mut(), address, &cfg))?;

        let events = socket.events();
        log::debug!("[rfcomm] {address} open");
        Ok(Self {
            inner: Some(Inner {
                rt,
                socket,
                events,
                timeout_ms: -1,
                address: address.to_owned(),
            }),
        })
    }

    /// `true` while the handle owns a live connection.
    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Device address this handle was opened against.
    pub fn address(&self) -> Option<&str> {
        self.inner.as_ref().map(|inner| inner.address.as_str())
    }

    /// Read into `buf`, blocking per the configured timeout.
    ///
    /// May return fewer bytes than requested — see
    /// [`TransferResult`](crate::error::TransferResult) for when a short
    /// read is benign.  An empty `buf` completes immediately.
    pub fn read(&mut self, buf: &mut [u8]) -> TransferResult {
        match &mut self.inner {
            None => TransferResult::aborted(0, TransportError::InvalidArgs),
            Some(inner) => {
                let timeout = ReadTimeout::from_millis(inner.timeout_ms);
                let Inner {
                    rt, socket, events, ..
                } = inner;
                rt.block_on(read_into(socket.as_mut(), events, buf, timeout))
            }
        }
    }

    /// Write all of `buf`, stopping early on disconnect or backpressure.
    pub fn write(&mut self, buf: &[u8]) -> TransferResult {
        match &mut self.inner {
            None => TransferResult::aborted(0, TransportError::InvalidArgs),
            Some(inner) => {
                let Inner { rt, socket, .. } = inner;
                rt.block_on(write_all(socket.as_mut(), buf))
            }
        }
    }

    /// Set the read timeout in signed milliseconds: negative blocks
    /// indefinitely, zero polls once.  No upper bound is enforced.
    pub fn set_timeout(&mut self, ms: i64) -> Result<(), TransportError> {
        let inner = self.inner.as_mut().ok_or(TransportError::InvalidArgs)?;
        inner.timeout_ms = ms;
        Ok(())
    }

    /// Bytes readable right now without blocking.
    pub fn bytes_available(&self) -> Result<usize, TransportError> {
        let inner = self.inner.as_ref().ok_or(TransportError::InvalidArgs)?;
        Ok(inner.socket.bytes_available())
    }

    /// Discard buffered bytes in `direction`.
    ///
    /// Validates the handle; the discard itself is currently a no-op.
    pub fn purge(&mut self, direction: PurgeDirection) -> Result<(), TransportError> {
        self.inner.as_ref().ok_or(TransportError::InvalidArgs)?;
        log::debug!("[rfcomm] purge {direction:?} requested (no-op)");
        Ok(())
    }

    /// Tear the connection down and release the handle's resources.
    ///
    /// Best-effort and idempotent: closing an already-closed or never-opened
    /// handle succeeds, and a socket that errored out earlier cannot make
    /// close fail.
    pub fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut inner) = self.inner.take() {
            inner.socket.close();
            log::debug!("[rfcomm] {} closed", inner.address);
        }
        Ok(())
    }
}

impl Drop for RfcommStream {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for RfcommStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Some(inner) => f
                .debug_struct("RfcommStream")
                .field("address", &inner.address)
                .field("timeout_ms", &inner.timeout_ms)
                .finish_non_exhaustive(),
            None => f.write_str("RfcommStream(closed)"),
        }
    }
}
