//! Connection state machine.
//!
//! Tracks the single allowed BLE connection and the notification
//! subscription, and owns the lifecycle of the periodic sample timer:
//!
//! ```text
//!            connection opened          client-config status
//!   ┌──────┐ ──────────────────▶ ┌───────────┐ ─────────────▶ ┌────────────┐
//!   │ Idle │                     │ Connected │                │ Subscribed │
//!   └──────┘ ◀────────────────── └───────────┘ ◀───────────── └────────────┘
//!                connection closed (from any state)
//! ```
//!
//! The sample timer is armed inside the `Connected → Subscribed` transition
//! and disarmed inside the `→ Idle` transition.  Keeping arm/disarm inside
//! the transitions (rather than as separate calls the dispatcher could
//! reorder) upholds the one invariant the whole system hangs on: **no
//! sample timer ever outlives its connection**.

use log::{debug, info, warn};

use crate::app::ports::SamplerPort;
use crate::events::{ConnHandle, CONN_HANDLE_NONE};

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Enumeration of the connection states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LinkState {
    /// No connection; advertising is (re)armed by the dispatcher.
    Idle = 0,
    /// A central is connected; notifications disabled.
    Connected = 1,
    /// A central is connected and has enabled temperature notifications.
    Subscribed = 2,
}

// ---------------------------------------------------------------------------
// Link
// ---------------------------------------------------------------------------

/// The single-connection state machine.
///
/// One instance lives inside the event dispatcher — no statics.  The
/// sampler is passed into the transitions that own its lifecycle.
pub struct Link {
    state: LinkState,
    conn_handle: ConnHandle,
    /// Notifications sent on the current connection.  Reset on disconnect.
    step_count: u32,
}

impl Link {
    pub fn new() -> Self {
        Self {
            state: LinkState::Idle,
            conn_handle: CONN_HANDLE_NONE,
            step_count: 0,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// The live connection handle, or [`CONN_HANDLE_NONE`].
    pub fn conn_handle(&self) -> ConnHandle {
        self.conn_handle
    }

    /// True while a connection is open (subscribed or not).
    pub fn is_open(&self) -> bool {
        self.state != LinkState::Idle
    }

    /// True while the client has notifications enabled.
    pub fn is_subscribed(&self) -> bool {
        self.state == LinkState::Subscribed
    }

    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    /// Count one delivered notification; returns the new total.
    pub fn bump_step(&mut self) -> u32 {
        self.step_count = self.step_count.wrapping_add(1);
        self.step_count
    }

    // ── Transitions ───────────────────────────────────────────

    /// Connection-opened transition.  Subscription always starts disabled.
    ///
    /// The stack enforces the single-connection limit (advertising stops on
    /// connect), so a second open without an intervening close means we
    /// missed a close event; the stale handle is replaced.
    pub fn open(&mut self, handle: ConnHandle) {
        if self.is_open() {
            warn!(
                "link: open with connection already present (old={:#04x}, new={:#04x})",
                self.conn_handle, handle
            );
        }
        self.state = LinkState::Connected;
        self.conn_handle = handle;
        self.step_count = 0;
        info!("link: connection opened (handle={:#04x})", handle);
    }

    /// Client-configuration transition: `Connected → Subscribed`.
    ///
    /// State-checked: a repeated subscribe while already subscribed is an
    /// explicit no-op, so the underlying timer is never created twice.
    /// An arm failure is reported but the subscription flag is kept — the
    /// flag reflects client intent, and the client has no way to learn the
    /// timer never started.
    pub fn subscribe(&mut self, period_ms: u32, sampler: &mut impl SamplerPort) {
        match self.state {
            LinkState::Idle => {
                warn!("link: subscribe with no connection, ignored");
            }
            LinkState::Subscribed => {
                debug!("link: already subscribed, sampler left as-is");
            }
            LinkState::Connected => {
                self.state = LinkState::Subscribed;
                match sampler.arm(period_ms) {
                    Ok(()) => info!("link: subscribed, sampler armed at {} ms", period_ms),
                    Err(e) => warn!("link: sampler arm failed ({e}), subscription kept"),
                }
            }
        }
    }

    /// Connection-closed transition: `* → Idle`.
    ///
    /// Disarms the sampler unconditionally before any other bookkeeping —
    /// disarming is part of the transition itself and cannot be skipped or
    /// reordered by the caller.  Idempotent if the sampler was never armed.
    pub fn close(&mut self, sampler: &mut impl SamplerPort) {
        sampler.disarm();
        self.state = LinkState::Idle;
        self.conn_handle = CONN_HANDLE_NONE;
        self.step_count = 0;
        info!("link: connection closed");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------


#[cfg(all(test, not(target_os = "espidf")))]
mod proptests {
    use super::*;
    use crate::error::TimerError;
    use proptest::prelude::*;

    struct Sampler {
        armed: bool,
    }

    impl SamplerPort for Sampler {
        fn arm(&mut self, _period_ms: u32) -> Result<(), TimerError> {
            self.armed = true;
            Ok(())
        }
        fn disarm(&mut self) {
            self.armed = false;
        }
        fn is_armed(&self) -> bool {
            self.armed
        }
    }

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Open(u8),
        Subscribe,
        Close,
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u8..0xFF).prop_map(Op::Open),
            Just(Op::Subscribe),
            Just(Op::Close),
        ]
    }

    proptest! {
        /// The system's core safety property: after any event sequence the
        /// sampler is armed exactly when the link is in `Subscribed`.
        #[test]
        fn sampler_armed_iff_subscribed(ops in proptest::collection::vec(arb_op(), 1..200)) {
            let mut link = Link::new();
            let mut sampler = Sampler { armed: false };

            for op in ops {
                match op {
                    Op::Open(h) => link.open(h),
                    Op::Subscribe => link.subscribe(1000, &mut sampler),
                    Op::Close => link.close(&mut sampler),
                }
                prop_assert_eq!(
                    sampler.is_armed(),
                    link.state() == LinkState::Subscribed,
                    "armed={} in state {:?}", sampler.is_armed(), link.state()
                );
            }
        }

        /// The handle is the sentinel exactly when no connection is open.
        #[test]
        fn sentinel_iff_idle(ops in proptest::collection::vec(arb_op(), 1..200)) {
            let mut link = Link::new();
            let mut sampler = Sampler { armed: false };

            for op in ops {
                match op {
                    // 0xFF is reserved as the sentinel; the stack never
                    // assigns it to a live connection.
                    Op::Open(h) if h != CONN_HANDLE_NONE => link.open(h),
                    Op::Open(_) => {}
                    Op::Subscribe => link.subscribe(1000, &mut sampler),
                    Op::Close => link.close(&mut sampler),
                }
                prop_assert_eq!(
                    link.conn_handle() == CONN_HANDLE_NONE,
                    link.state() == LinkState::Idle
                );
            }
        }
    }
}
