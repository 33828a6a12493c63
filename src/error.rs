//! Unified error types for the ThermoNode firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! event dispatcher's error handling uniform.  All variants are `Copy` so
//! they can be cheaply passed through the dispatcher without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A BLE transport command was rejected by the stack.
    Transport(TransportError),
    /// The RHT sensor could not be read or initialised.
    Sensor(SensorError),
    /// The periodic sample timer could not be started.
    Timer(TimerError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Timer(e) => write!(f, "timer: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// BLE transport errors
// ---------------------------------------------------------------------------

/// Failures reported by the advertising/GATT transport stack.  Each variant
/// carries the raw stack status code for the log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Advertising setup or (re)start was rejected.  Fatal: the node is
    /// unreachable without advertising.
    Advertising(i32),
    /// A read response could not be delivered.
    ReadResponse(i32),
    /// A notification could not be delivered.
    Notification(i32),
    /// A write response could not be delivered.
    WriteResponse(i32),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Advertising(rc) => write!(f, "advertising command failed (rc={rc})"),
            Self::ReadResponse(rc) => write!(f, "read response failed (rc={rc})"),
            Self::Notification(rc) => write!(f, "notification failed (rc={rc})"),
            Self::WriteResponse(rc) => write!(f, "write response failed (rc={rc})"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The sensor did not acknowledge its init sequence.
    InitFailed,
    /// A measurement was requested before `init()` (or after `deinit()`).
    NotInitialised,
    /// The I²C transaction failed or the conversion timed out.
    ReadFailed,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitFailed => write!(f, "init failed"),
            Self::NotInitialised => write!(f, "not initialised"),
            Self::ReadFailed => write!(f, "read failed"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Timer errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    /// The timer service refused to create or start the periodic timer.
    StartFailed(i32),
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartFailed(rc) => write!(f, "periodic start failed (rc={rc})"),
        }
    }
}

impl From<TimerError> for Error {
    fn from(e: TimerError) -> Self {
        Self::Timer(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
