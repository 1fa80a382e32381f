//! Integration tests for connection establishment.
//!
//! Each test scripts a simulated device and drives `establish` under a
//! paused tokio clock, so even the multi-second reference budgets resolve
//! instantly and deterministically.

use std::time::Duration;

use rfcomm_stream::sim::{ConnectScript, SimSocket};
use rfcomm_stream::{
    establish, ConnectConfig, LinkState, RadioFault, RadioSocket, ServiceTarget, TransportError,
};

const ADDR: &str = "00:11:22:33:44:55";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Run `establish` with the reference configuration against `sock`.
async fn connect(mut sock: Box<dyn RadioSocket>, cfg: &ConnectConfig) -> Result<(), TransportError> {
    establish(sock.as_mut(), ADDR, cfg).await
}

// ---------------------------------------------------------------------------
// Happy paths
// ---------------------------------------------------------------------------

/// A device that answers promptly on the default channel connects within
/// the base wait.
#[tokio::test(start_paused = true)]
async fn prompt_accept_on_primary_channel() {
    let sock = SimSocket::new().script(
        ServiceTarget::Channel(1),
        ConnectScript::Accept { after: ms(30) },
    );
    let handle = sock.handle();

    connect(Box::new(sock), &ConnectConfig::default())
        .await
        .expect("connect");
    assert_eq!(handle.state(), LinkState::Connected);
}

/// A refusal on channel 1 must fall back to channel 5, and the whole dance
/// must fit inside the two base-wait budgets.
#[tokio::test(start_paused = true)]
async fn fast_refuse_falls_back_to_second_channel() {
    let sock = SimSocket::new()
        .script(
            ServiceTarget::Channel(1),
            ConnectScript::Refuse {
                after: ms(40),
                fault: RadioFault::Network,
            },
        )
        .script(
            ServiceTarget::Channel(5),
            ConnectScript::Accept { after: ms(40) },
        );
    let handle = sock.handle();

    let cfg = ConnectConfig::default();
    let started = tokio::time::Instant::now();
    connect(Box::new(sock), &cfg).await.expect("fallback connect");

    assert_eq!(handle.state(), LinkState::Connected);
    assert!(
        started.elapsed() <= cfg.base_wait * 2,
        "fallback exceeded the summed wait budgets: {:?}",
        started.elapsed()
    );
}

/// Slow service discovery is not failure: an attempt still pending when the
/// base wait elapses gets the extended wait and may yet connect.
#[tokio::test(start_paused = true)]
async fn slow_settle_succeeds_within_extended_wait() {
    let cfg = ConnectConfig::default();
    // Slower than base_wait (5 s) but inside base + 3×base.
    let sock = SimSocket::new().script(
        ServiceTarget::Channel(1),
        ConnectScript::Accept {
            after: cfg.base_wait + ms(2500),
        },
    );
    let handle = sock.handle();

    connect(Box::new(sock), &cfg).await.expect("slow connect");
    assert_eq!(handle.state(), LinkState::Connected);
}

/// UUID-targeted connects go through the service-lookup state and succeed
/// the same way.
#[tokio::test(start_paused = true)]
async fn service_uuid_target_connects() {
    let target = ServiceTarget::Service(rfcomm_stream::SERIAL_PORT_PROFILE);
    let sock = SimSocket::new().script(target, ConnectScript::Accept { after: ms(20) });
    let handle = sock.handle();

    let cfg = ConnectConfig {
        primary: target,
        fallback: None,
        ..ConnectConfig::default()
    };
    connect(Box::new(sock), &cfg).await.expect("uuid connect");
    assert_eq!(handle.state(), LinkState::Connected);
}

// ---------------------------------------------------------------------------
// Failure paths
// ---------------------------------------------------------------------------

/// An unresolvable host maps to `NoDevice`, and the socket is released
/// before the error surfaces.
#[tokio::test(start_paused = true)]
async fn host_not_found_maps_to_no_device() {
    let refuse = ConnectScript::Refuse {
        after: ms(10),
        fault: RadioFault::HostNotFound,
    };
    let sock = SimSocket::new()
        .script(ServiceTarget::Channel(1), refuse)
        .script(ServiceTarget::Channel(5), refuse);
    let handle = sock.handle();

    let err = connect(Box::new(sock), &ConnectConfig::default())
        .await
        .expect_err("connect must fail");
    assert_eq!(err, TransportError::NoDevice);
    assert!(handle.is_closed(), "socket must be released on failure");
}

/// Fault-to-error mapping for the remaining classified faults.
#[tokio::test(start_paused = true)]
async fn remaining_faults_map_onto_the_taxonomy() {
    for (fault, expected) in [
        (RadioFault::ServiceNotFound, TransportError::NoDevice),
        (RadioFault::ProtocolUnsupported, TransportError::Protocol),
        (RadioFault::OperationUnsupported, TransportError::Unsupported),
        (RadioFault::Network, TransportError::Io),
        (RadioFault::Other, TransportError::Io),
    ] {
        let refuse = ConnectScript::Refuse {
            after: ms(10),
            fault,
        };
        let sock = SimSocket::new()
            .script(ServiceTarget::Channel(1), refuse)
            .script(ServiceTarget::Channel(5), refuse);

        let err = connect(Box::new(sock), &ConnectConfig::default())
            .await
            .expect_err("connect must fail");
        assert_eq!(err, expected, "wrong mapping for {fault:?}");
    }
}

/// An attempt that never settles exhausts base + extended wait and fails
/// with the `Io` default (the stack reported no fault at all).
#[tokio::test(start_paused = true)]
async fn endless_stall_exhausts_both_waits() {
    let cfg = ConnectConfig {
        fallback: None,
        ..ConnectConfig::default()
    };
    let sock = SimSocket::new(); // unscripted: stalls forever
    let handle = sock.handle();

    let started = tokio::time::Instant::now();
    let err = connect(Box::new(sock), &cfg).await.expect_err("must fail");

    assert_eq!(err, TransportError::Io);
    assert!(handle.is_closed());
    // Exactly one base wait plus one extended wait, no more.
    let budget = cfg.base_wait + cfg.base_wait * cfg.stall_factor;
    assert!(started.elapsed() >= budget);
    assert!(started.elapsed() <= budget + ms(100));
}

/// A refusal during the *extended* wait is terminal: the fallback is only
/// taken after a fast refusal in the first phase.
#[tokio::test(start_paused = true)]
async fn refusal_during_extended_wait_does_not_fall_back() {
    let cfg = ConnectConfig::default();
    let sock = SimSocket::new()
        .script(
            ServiceTarget::Channel(1),
            ConnectScript::Refuse {
                // Lands inside the extended window.
                after: cfg.base_wait + ms(1000),
                fault: RadioFault::Network,
            },
        )
        .script(
            ServiceTarget::Channel(5),
            ConnectScript::Accept { after: ms(10) },
        );

    let err = connect(Box::new(sock), &cfg).await.expect_err("must fail");
    assert_eq!(err, TransportError::Io);
}

/// With no fallback configured, a fast refusal fails after a single
/// attempt.
#[tokio::test(start_paused = true)]
async fn no_fallback_means_single_attempt() {
    let cfg = ConnectConfig {
        fallback: None,
        ..ConnectConfig::default()
    };
    let sock = SimSocket::new().script(
        ServiceTarget::Channel(1),
        ConnectScript::Refuse {
            after: ms(10),
            fault: RadioFault::ServiceNotFound,
        },
    );

    let started = tokio::time::Instant::now();
    let err = connect(Box::new(sock), &cfg).await.expect_err("must fail");
    assert_eq!(err, TransportError::NoDevice);
    assert!(started.elapsed() < cfg.base_wait);
}

/// A configurable escalation factor changes the extended budget.
#[tokio::test(start_paused = true)]
async fn stall_factor_is_honored() {
    let cfg = ConnectConfig {
        base_wait: ms(100),
        stall_factor: 5,
        fallback: None,
        ..ConnectConfig::default()
    };
    // Settles inside base + 5×base, but outside base + 3×base.
    let sock = SimSocket::new().script(
        ServiceTarget::Channel(1),
        ConnectScript::Accept { after: ms(450) },
    );
    let handle = sock.handle();

    connect(Box::new(sock), &cfg).await.expect("connect");
    assert_eq!(handle.state(), LinkState::Connected);
}
