//! Connection establishment: fallback channels and escalating waits.
//!
//! Real devices behave inconsistently.  Some refuse quickly when asked on
//! the wrong RFCOMM channel; others simply stall in service discovery while
//! actually still making progress.  A single fixed timeout mishandles both,
//! so establishment distinguishes the two:
//!
//! ```text
//!  start_connect(primary)
//!      │ wait ≤ base_wait
//!      ├── Connected ──────────────────────────────▶ done
//!      ├── Unconnected (fast refuse) ─▶ retry once on the fallback target
//!      └── still pending (slow lookup)
//!              │ wait ≤ stall_factor × base_wait, same attempt
//!              ├── Connected ──────────────────────▶ done
//!              └── anything else ──────────────────▶ fail
//! ```
//!
//! On failure the socket's last fault is mapped into the public taxonomy
//! and the socket is closed before the error is returned — no half-open
//! connection ever escapes to the caller.

use std::time::Duration;

use tokio::sync::watch;

use crate::error::TransportError;
use crate::radio::{LinkState, RadioSocket, ServiceTarget};

// ---------------------------------------------------------------------------
// ConnectConfig
// ---------------------------------------------------------------------------

/// Tunable parameters for connection establishment.
///
/// The defaults reproduce field-proven behavior: 5 seconds per attempt,
/// tripled when the stack is still looking up the service, channel 1 first
/// and channel 5 as the fallback (some serial devices only answer there).
/// The escalation factor is a parameter, not a constant, because the right
/// value is hardware lore rather than protocol.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// First target to try.
    pub primary: ServiceTarget,
    /// Second target, tried once if the first is refused outright.
    pub fallback: Option<ServiceTarget>,
    /// Wait budget for each attempt's first phase.
    pub base_wait: Duration,
    /// Multiplier applied to `base_wait` when the attempt is still pending
    /// after the first phase (slow service discovery, not a refusal).
    pub stall_factor: u32,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            primary: ServiceTarget::Channel(1),
            fallback: Some(ServiceTarget::Channel(5)),
            base_wait: Duration::from_millis(5000),
            stall_factor: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Attempt state machine
// ---------------------------------------------------------------------------

/// Terminal classification of one connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectOutcome {
    /// The link came up.
    Connected,
    /// The stack reached `Unconnected` within the first wait — a fast
    /// refusal, worth retrying on another target.
    Refused,
    /// Neither connected nor refused after base + extended waits.
    Exhausted,
}

/// Wait until the socket leaves its pending states or `budget` elapses,
/// returning whatever state it is in at that point.
///
/// Intermediate transitions (`Connecting` → `ServiceLookup`) wake the wait
/// and are absorbed by re-checking; exactly one of {terminal socket event,
/// deadline} ends it.
async fn settle(
    socket: &dyn RadioSocket,
    events: &mut watch::Receiver<u64>,
    budget: Duration,
) -> LinkState {
    let deadline = tokio::time::Instant::now() + budget;
    loop {
        let state = socket.state();
        if !state.is_pending() {
            return state;
        }
        tokio::select! {
            changed = events.changed() => {
                if changed.is_err() {
                    // Event source gone; report the state as-is.
                    return socket.state();
                }
            }
            _ = tokio::time::sleep_until(deadline) => return socket.state(),
        }
    }
}

/// Run one full attempt (base wait, then the extended wait if still
/// pending) against a single target.
async fn attempt(
    socket: &mut dyn RadioSocket,
    events: &mut watch::Receiver<u64>,
    address: &str,
    target: ServiceTarget,
    cfg: &ConnectConfig,
) -> ConnectOutcome {
    log::debug!("[rfcomm] connecting to {address} on {target}");
    socket.start_connect(address, target);

    match settle(socket, events, cfg.base_wait).await {
        LinkState::Connected => return ConnectOutcome::Connected,
        LinkState::Unconnected => return ConnectOutcome::Refused,
        _pending => {}
    }

    // Slow service discovery is not failure: keep the attempt alive and
    // wait longer without restarting the connect.
    let extended = cfg.base_wait * cfg.stall_factor;
    log::debug!(
        "[rfcomm] {target} still settling after {:?}; waiting another {:?}",
        cfg.base_wait,
        extended
    );
    match settle(socket, events, extended).await {
        LinkState::Connected => ConnectOutcome::Connected,
        _ => ConnectOutcome::Exhausted,
    }
}

// ---------------------------------------------------------------------------
// establish
// ---------------------------------------------------------------------------

/// Drive `socket` to a connected state, or close it and report why not.
///
/// On success the live socket stays with the caller.  On failure the
/// socket's last fault is mapped ([`RadioFault`](crate::radio::RadioFault)
/// → [`TransportError`], unknown faults default to `Io`) and the socket is
/// closed before the error is returned.
pub async fn establish(
    socket: &mut dyn RadioSocket,
    address: &str,
    cfg: &ConnectConfig,
) -> Result<(), TransportError> {
    let mut events = socket.events();

    let mut outcome = attempt(socket, &mut events, address, cfg.primary, cfg).await;

    // A fast refusal on the primary target is the signature of a device
    // serving the serial profile elsewhere; try the fallback once.
    if outcome == ConnectOutcome::Refused {
        if let Some(fallback) = cfg.fallback {
            log::debug!("[rfcomm] {} refused; retrying on {fallback}", cfg.primary);
            outcome = attempt(socket, &mut events, address, fallback, cfg).await;
        }
    }

    if outcome == ConnectOutcome::Connected {
        log::debug!("[rfcomm] connected to {address}");
        return Ok(());
    }

    let fault = socket.last_fault();
    log::debug!(
        "[rfcomm] failed to connect to {address}: state {:?}, fault {:?}",
        socket.state(),
        fault
    );
    socket.close();
    Err(fault.map(TransportError::from).unwrap_or(TransportError::Io))
}
