//! The one-shot wait primitive.
//!
//! Blocking emulation needs exactly one building block: "suspend until the
//! socket signals an event or a timer elapses, whichever comes first."
//! [`await_event`] is that primitive.  Exactly one of the two outcomes
//! resolves each wait; there is no busy polling and no external cancel —
//! the timer is the only bounding mechanism, and a [`ReadTimeout::Forever`]
//! wait can only be resolved by the socket itself.

use std::time::Duration;

use tokio::sync::watch;

/// Stand-in deadline for an unbounded wait.  Far enough out that it never
/// fires in practice; the select arm still exists so the wait shape stays
/// uniform.
const FAR_FUTURE: Duration = Duration::from_secs(365 * 24 * 3600);

// ---------------------------------------------------------------------------
// ReadTimeout
// ---------------------------------------------------------------------------

/// How long a read may wait for data to become available.
///
/// Mirrors the signed-millisecond convention of classic serial APIs:
/// negative blocks indefinitely, zero polls once, positive bounds the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadTimeout {
    /// Block until the socket signals data or disconnect.
    Forever,
    /// Never suspend; report whatever is available right now.
    Poll,
    /// Wait at most this long for each readability event.
    Bounded(Duration),
}

impl ReadTimeout {
    /// Interpret a signed millisecond value.  No upper bound is enforced.
    pub fn from_millis(ms: i64) -> Self {
        match ms {
            ms if ms < 0 => Self::Forever,
            0 => Self::Poll,
            ms => Self::Bounded(Duration::from_millis(ms as u64)),
        }
    }
}

// ---------------------------------------------------------------------------
// await_event
// ---------------------------------------------------------------------------

/// Which of the two possible outcomes resolved a wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fired {
    /// The socket announced an event; re-check its state.
    Event,
    /// The timer elapsed first (immediately, for [`ReadTimeout::Poll`]).
    TimedOut,
}

/// Suspend until the socket's event counter changes or `timeout` elapses.
///
/// An event that arrived since the caller last observed the counter wins
/// over any timer, so the check-then-wait sequence in the I/O loops cannot
/// lose a wakeup.  A closed event channel means the socket is gone; that is
/// reported as [`Fired::TimedOut`] so retry loops unwind instead of
/// spinning.
pub async fn await_event(events: &mut watch::Receiver<u64>, timeout: ReadTimeout) -> Fired {
    if events.has_changed().unwrap_or(false) {
        let _ = events.borrow_and_update();
        return Fired::Event;
    }

    let budget = match timeout {
        ReadTimeout::Poll => return Fired::TimedOut,
        ReadTimeout::Bounded(d) => d,
        ReadTimeout::Forever => FAR_FUTURE,
    };

    tokio::select! {
        changed = events.changed() => match changed {
            Ok(()) => Fired::Event,
            Err(_) => Fired::TimedOut,
        },
        _ = tokio::time::sleep(budget) => Fired::TimedOut,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
