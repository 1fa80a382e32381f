//! Scripted in-memory radio backend for deterministic testing.
//!
//! Real radios are slow, flaky, and unavailable in CI.  [`SimSocket`]
//! implements [`RadioSocket`] entirely in memory, driven by per-target
//! connect scripts and a cloneable [`SimHandle`] that plays the part of the
//! remote device:
//!
//! | Script / control        | Models                                        |
//! |-------------------------|-----------------------------------------------|
//! | `Accept { after }`      | A device that answers, possibly slowly.       |
//! | `Refuse { after, .. }`  | A fast refusal with a specific stack fault.   |
//! | `Stall`                 | Service discovery that never completes.       |
//! | `push_data`             | Bytes arriving over the air.                  |
//! | `queue_read/queue_write`| Injected transient or hard I/O outcomes.      |
//! | `choke_writes`          | A send buffer that accepts nothing.           |
//! | `disconnect`            | The peer dropping the link mid-stream.        |
//!
//! Scripted delays run as spawned timer tasks on the caller's runtime, so
//! the simulator works both under `#[tokio::test]` (including a paused
//! clock) and inside the blocking handle's private runtime.  Everything is
//! deterministic; there is no randomness to make failures unreproducible.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;

use crate::radio::{IoAttempt, LinkState, RadioFault, RadioSocket, ServiceTarget};

// ---------------------------------------------------------------------------
// Scripts
// ---------------------------------------------------------------------------

/// How the simulated device answers a connect on one target.
///
/// Targets with no script behave like [`ConnectScript::Stall`].
#[derive(Debug, Clone, Copy)]
pub enum ConnectScript {
    /// Reach `Connected` once `after` has elapsed.
    Accept {
        /// Delay before the link comes up.
        after: Duration,
    },
    /// Reach `Unconnected` with `fault` once `after` has elapsed.
    Refuse {
        /// Delay before the refusal is reported.
        after: Duration,
        /// Fault the stack reports for the refusal.
        fault: RadioFault,
    },
    /// Stay pending forever.
    Stall,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Shared {
    state: LinkState,
    fault: Option<RadioFault>,
    /// Bytes "received over the air", drained by `try_read`.
    rx: VecDeque<u8>,
    /// Injected outcomes served before real data (front first).
    read_plan: VecDeque<IoAttempt>,
    write_plan: VecDeque<IoAttempt>,
    /// Everything successfully written by the caller.
    written: Vec<u8>,
    /// When set, every write is answered with `Transferred(0)`.
    choked: bool,
    closed: bool,
    /// Bumped by each `start_connect` so stale script timers from an
    /// abandoned attempt cannot fire into the next one.
    generation: u64,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    // A poisoned simulator is still inspectable; tests will fail on state.
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

fn bump(events: &watch::Sender<u64>) {
    events.send_modify(|n| *n = n.wrapping_add(1));
}

// ---------------------------------------------------------------------------
// SimSocket
// ---------------------------------------------------------------------------

/// A scripted [`RadioSocket`] backend.
#[derive(Debug)]
pub struct SimSocket {
    scripts: HashMap<ServiceTarget, ConnectScript>,
    shared: Arc<Mutex<Shared>>,
    events: Arc<watch::Sender<u64>>,
}

impl Default for SimSocket {
    fn default() -> Self {
        Self::new()
    }
}

impl SimSocket {
    /// A simulator with no scripts: every connect attempt stalls.
    pub fn new() -> Self {
        let (events, _) = watch::channel(0u64);
        Self {
            scripts: HashMap::new(),
            shared: Arc::new(Mutex::new(Shared {
                state: LinkState::Unconnected,
                fault: None,
                rx: VecDeque::new(),
                read_plan: VecDeque::new(),
                write_plan: VecDeque::new(),
                written: Vec::new(),
                choked: false,
                closed: false,
                generation: 0,
            })),
            events: Arc::new(events),
        }
    }

    /// Script the device's answer for one connect target.
    pub fn script(mut self, target: ServiceTarget, script: ConnectScript) -> Self {
        self.scripts.insert(target, script);
        self
    }

    /// Remote-device controls for this socket.  Cloneable and thread-safe;
    /// usable from another thread while a blocking read is suspended.
    pub fn handle(&self) -> SimHandle {
        SimHandle {
            shared: Arc::clone(&self.shared),
            events: Arc::clone(&self.events),
        }
    }

    fn schedule(&self, generation: u64, after: Duration, state: LinkState, fault: Option<RadioFault>) {
        let shared = Arc::clone(&self.shared);
        let events = Arc::clone(&self.events);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            {
                let mut s = lock(&shared);
                if s.generation != generation || s.closed {
                    return; // attempt abandoned in the meantime
                }
                s.state = state;
                s.fault = fault;
            }
            bump(&events);
        });
    }
}

impl RadioSocket for SimSocket {
    fn start_connect(&mut self, address: &str, target: ServiceTarget) {
        let script = self
            .scripts
            .get(&target)
            .copied()
            .unwrap_or(ConnectScript::Stall);
        log::debug!("[sim] connect to {address} on {target}: {script:?}");

        let generation = {
            let mut s = lock(&self.shared);
            s.generation += 1;
            s.fault = None;
            s.state = match target {
                ServiceTarget::Service(_) => LinkState::ServiceLookup,
                ServiceTarget::Channel(_) => LinkState::Connecting,
            };
            s.generation
        };
        bump(&self.events);

        match script {
            ConnectScript::Stall => {}
            ConnectScript::Accept { after } => {
                self.schedule(generation, after, LinkState::Connected, None)
            }
            ConnectScript::Refuse { after, fault } => {
                self.schedule(generation, after, LinkState::Unconnected, Some(fault))
            }
        }
    }

    fn state(&self) -> LinkState {
        lock(&self.shared).state
    }

    fn last_fault(&self) -> Option<RadioFault> {
        lock(&self.shared).fault
    }

    fn try_read(&mut self, buf: &mut [u8]) -> IoAttempt {
        let mut s = lock(&self.shared);
        if let Some(attempt) = s.read_plan.pop_front() {
            return attempt;
        }
        if s.rx.is_empty() || buf.is_empty() {
            return IoAttempt::Transferred(0);
        }
        let n = buf.len().min(s.rx.len());
        for slot in buf[..n].iter_mut() {
            *slot = s.rx.pop_front().unwrap_or_default();
        }
        IoAttempt::Transferred(n)
    }

    fn try_write(&mut self, buf: &[u8]) -> IoAttempt {
        let mut s = lock(&self.shared);
        if let Some(attempt) = s.write_plan.pop_front() {
            return attempt;
        }
        if s.choked {
            return IoAttempt::Transferred(0);
        }
        s.written.extend_from_slice(buf);
        IoAttempt::Transferred(buf.len())
    }

    fn bytes_available(&self) -> usize {
        lock(&self.shared).rx.len()
    }

    fn events(&self) -> watch::Receiver<u64> {
        self.events.subscribe()
    }

    fn close(&mut self) {
        let mut s = lock(&self.shared);
        s.closed = true;
        s.state = LinkState::Unconnected;
        drop(s);
        bump(&self.events);
    }
}

// ---------------------------------------------------------------------------
// SimHandle
// ---------------------------------------------------------------------------

/// Remote-device controls for a [`SimSocket`].
#[derive(Debug, Clone)]
pub struct SimHandle {
    shared: Arc<Mutex<Shared>>,
    events: Arc<watch::Sender<u64>>,
}

impl SimHandle {
    /// Deliver bytes "over the air"; wakes a suspended reader.
    pub fn push_data(&self, bytes: &[u8]) {
        lock(&self.shared).rx.extend(bytes.iter().copied());
        bump(&self.events);
    }

    /// Queue an outcome served by the next `try_read`, ahead of real data.
    pub fn queue_read(&self, attempt: IoAttempt) {
        lock(&self.shared).read_plan.push_back(attempt);
        bump(&self.events);
    }

    /// Queue an outcome served by the next `try_write`.
    pub fn queue_write(&self, attempt: IoAttempt) {
        lock(&self.shared).write_plan.push_back(attempt);
    }

    /// Make every subsequent write report a full send buffer.
    pub fn choke_writes(&self, choked: bool) {
        lock(&self.shared).choked = choked;
    }

    /// Drop the link, as the peer would; wakes any suspended wait.
    pub fn disconnect(&self) {
        lock(&self.shared).state = LinkState::Unconnected;
        bump(&self.events);
    }

    /// Current simulated link state.
    pub fn state(&self) -> LinkState {
        lock(&self.shared).state
    }

    /// Everything the caller has successfully written.
    pub fn written(&self) -> Vec<u8> {
        lock(&self.shared).written.clone()
    }

    /// `true` once the caller has closed the socket.
    pub fn is_closed(&self) -> bool {
        lock(&self.shared).closed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn accept_script_transitions_after_delay() {
        let mut sock = SimSocket::new().script(
            ServiceTarget::Channel(1),
            ConnectScript::Accept {
                after: Duration::from_millis(20),
            },
        );
        let mut events = sock.events();

        sock.start_connect("00:11:22:33:44:55", ServiceTarget::Channel(1));
        assert_eq!(sock.state(), LinkState::Connecting);

        // start_connect itself announces the Connecting transition.
        events.changed().await.unwrap();
        // The scripted acceptance follows after the delay.
        events.changed().await.unwrap();
        assert_eq!(sock.state(), LinkState::Connected);
    }

    #[tokio::test]
    async fn stale_timer_cannot_touch_the_next_attempt() {
        let mut sock = SimSocket::new()
            .script(
                ServiceTarget::Channel(1),
                ConnectScript::Refuse {
                    after: Duration::from_millis(5),
                    fault: RadioFault::Network,
                },
            )
            .script(
                ServiceTarget::Channel(5),
                ConnectScript::Accept {
                    after: Duration::from_millis(5),
                },
            );

        sock.start_connect("00:11:22:33:44:55", ServiceTarget::Channel(1));
        // Abandon the first attempt immediately and move to the fallback.
        sock.start_connect("00:11:22:33:44:55", ServiceTarget::Channel(5));

        tokio::time::sleep(Duration::from_millis(50)).await;
        // The channel-1 refusal timer fired but its generation is stale.
        assert_eq!(sock.state(), LinkState::Connected);
        assert_eq!(sock.last_fault(), None);
    }

    #[tokio::test]
    async fn data_round_trip_and_plans() {
        let mut sock = SimSocket::new();
        let handle = sock.handle();

        handle.push_data(b"abc");
        assert_eq!(sock.bytes_available(), 3);

        let mut buf = [0u8; 8];
        assert_eq!(sock.try_read(&mut buf), IoAttempt::Transferred(3));
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(sock.try_read(&mut buf), IoAttempt::Transferred(0));

        handle.queue_read(IoAttempt::Transient);
        assert_eq!(sock.try_read(&mut buf), IoAttempt::Transient);

        assert_eq!(sock.try_write(b"hi"), IoAttempt::Transferred(2));
        assert_eq!(handle.written(), b"hi");

        handle.choke_writes(true);
        assert_eq!(sock.try_write(b"more"), IoAttempt::Transferred(0));
    }
}
