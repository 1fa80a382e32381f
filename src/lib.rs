//! `rfcomm-stream` — a blocking serial byte stream over a Bluetooth RFCOMM link.
//!
//! Device-communication libraries expect a classic blocking transport: open,
//! read, write, get-available, set-timeout, close.  Bluetooth socket stacks
//! are event-driven and non-blocking by nature.  This crate bridges the two:
//! it synthesizes bounded-wait blocking semantics on top of an asynchronous
//! socket capability, while tolerating real-world radio flakiness (devices
//! that expose the serial service on a non-default channel, slow service
//! discovery, transient I/O errors).
//!
//! # Architecture
//!
//! ```text
//!  Application (blocking calls)
//!      │ open / read / write / set_timeout / close
//!  ┌───▼───────────────────────────────────┐
//!  │            RfcommStream               │
//!  │  (handle: socket + timeout + runtime) │
//!  └───┬───────────────────────────────────┘
//!      │ drives, one cooperative wait at a time
//!  ┌───▼─────────┐   ┌──────────────┐
//!  │  establish  │   │      io      │
//!  │ (channel    │   │ (retry loops │
//!  │  fallback + │   │  + timeout-  │
//!  │  escalating │   │  bounded     │
//!  │  waits)     │   │  waiting)    │
//!  └───┬─────────┘   └───┬──────────┘
//!      │ async connect   │ non-blocking read/write + readiness events
//!  ┌───▼─────────────────▼─────────┐
//!  │     RadioSocket (trait)       │  ← interchangeable backends
//!  └───────────────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`radio`]     — the `RadioSocket` capability trait and its vocabulary
//! - [`establish`] — connection establishment: fallback channels, escalating waits
//! - [`io`]        — blocking-emulation read/write engines
//! - [`wait`]      — the one-shot "event or timer" wait primitive
//! - [`stream`]    — the blocking handle: lifecycle, timeout control
//! - [`error`]     — closed error taxonomy and transfer results
//! - [`sim`]       — scripted in-memory backend for deterministic testing
//!
//! The crate never interprets the bytes it transports and implements no
//! protocol above raw delivery; it is handed an already-resolvable device
//! address and connects.

pub mod error;
pub mod establish;
pub mod io;
pub mod radio;
pub mod sim;
pub mod stream;
pub mod wait;

pub use error::{TransferResult, TransportError};
pub use establish::{establish, ConnectConfig};
pub use radio::{
    IoAttempt, LinkState, RadioFault, RadioSocket, ServiceTarget, SERIAL_PORT_PROFILE,
};
pub use stream::{PurgeDirection, RfcommStream};
pub use wait::{await_event, Fired, ReadTimeout};
