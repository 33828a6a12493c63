//! Stack events and the timer-signal bridge.
//!
//! Events are produced by:
//! - The BLE host stack (boot, connect, disconnect, GATT server requests)
//! - The periodic sample timer (raises a signal bit from the timer task)
//!
//! Events are consumed by the main loop, which feeds them one at a time
//! into the event dispatcher.
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ BLE stack task  │────▶│              │     │              │
//! │ Timer callback  │────▶│ Signal bits +│────▶│  Main Loop   │
//! │ (signal only)   │     │ event stream │     │  (consumer)  │
//! └─────────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! The timer callback runs in the timer-service task and is not allowed to
//! touch domain state; it only sets a bit in [`raise_signal`].  The main
//! loop converts pending bits into an [`StackEvent::ExternalSignal`] in the
//! same serial stream as the radio events, so all state mutation stays
//! single-writer.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::gatt::CharHandle;

// ── Signal bits ───────────────────────────────────────────────

/// Signal bit raised by the periodic sample timer.
pub const SAMPLE_TIMER_SIGNAL: u32 = 1 << 0;

static SIGNAL_BITS: AtomicU32 = AtomicU32::new(0);

/// Raise one or more signal bits.
/// Safe to call from the timer-service task (lock-free, no data passed).
pub fn raise_signal(bits: u32) {
    SIGNAL_BITS.fetch_or(bits, Ordering::Release);
}

/// Consume all pending signal bits.  Called from the main loop only.
pub fn take_signals() -> u32 {
    SIGNAL_BITS.swap(0, Ordering::AcqRel)
}

/// True if any signal bit is pending.
pub fn has_pending_signals() -> bool {
    SIGNAL_BITS.load(Ordering::Acquire) != 0
}

// ── Stack events ──────────────────────────────────────────────

/// Maximum write payload the event stream carries.  The digital-out
/// characteristic only needs one byte; the headroom absorbs sloppy clients.
pub const MAX_WRITE_LEN: usize = 32;

/// Opaque connection handle assigned by the stack.  Valid only while a
/// link is open; [`CONN_HANDLE_NONE`] when absent.
pub type ConnHandle = u8;

/// Sentinel for "no connection".
pub const CONN_HANDLE_NONE: ConnHandle = 0xFF;

/// Events delivered serially to the dispatcher.
///
/// The variants mirror what the host stack reports; payloads are copied out
/// of the stack's callback context into fixed-capacity storage before being
/// enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackEvent {
    /// The radio is ready.  No stack command may be issued before this.
    Boot,

    /// A central connected.
    ConnectionOpened { connection: ConnHandle },

    /// The connection closed (any cause: remote close, timeout, local).
    ConnectionClosed { connection: ConnHandle, reason: u16 },

    /// A client issued a read on a user-managed characteristic.
    ReadRequest {
        connection: ConnHandle,
        characteristic: CharHandle,
    },

    /// A characteristic's status changed (CCCD write or confirmation).
    CharacteristicStatus {
        connection: ConnHandle,
        characteristic: CharHandle,
        status_flags: u8,
        client_config: u16,
    },

    /// A client wrote a user-managed characteristic.
    WriteRequest {
        connection: ConnHandle,
        characteristic: CharHandle,
        att_opcode: u8,
        value: heapless::Vec<u8, MAX_WRITE_LEN>,
    },

    /// Pending signal bits, injected by the main loop from [`take_signals`].
    ExternalSignal { bits: u32 },

    /// Any stack event the dispatcher has no interest in.
    Other { id: u32 },
}

impl StackEvent {
    /// Build a `WriteRequest`, truncating the payload to [`MAX_WRITE_LEN`].
    /// Only the first byte is ever interpreted, so truncation is lossless
    /// for the protocol.
    pub fn write_request(
        connection: ConnHandle,
        characteristic: CharHandle,
        att_opcode: u8,
        data: &[u8],
    ) -> Self {
        let take = data.len().min(MAX_WRITE_LEN);
        let mut value = heapless::Vec::new();
        // Cannot fail: `take` is clamped to the capacity.
        let _ = value.extend_from_slice(&data[..take]);
        Self::WriteRequest {
            connection,
            characteristic,
            att_opcode,
            value,
        }
    }
}
