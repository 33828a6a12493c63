//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (BLE transport, sensor, actuator, timer) implement these
//! traits.  The [`AppService`](super::service::AppService) consumes them at
//! call sites via generics, so the domain core never touches hardware
//! directly.  All port errors are typed — callers handle every variant.

use crate::error::{SensorError, TimerError, TransportError};
use crate::events::ConnHandle;
use crate::gatt::CharHandle;

// ───────────────────────────────────────────────────────────────
// BLE transport port (driven adapter: domain → host stack)
// ───────────────────────────────────────────────────────────────

/// Stack-assigned identity of the advertising set.
pub type AdvSetHandle = u8;

/// Advertising and GATT server primitives of the host stack.
///
/// Every command may be rejected with a stack status code.  The dispatcher
/// decides which failures are fatal (advertising setup) and which are
/// merely logged (responses, notifications).
pub trait TransportPort {
    /// Allocate the advertising set.  Called once, at boot.
    fn create_advertising_set(&mut self) -> Result<AdvSetHandle, TransportError>;

    /// Generate general-discoverable advertising data for the set.
    /// Called at boot and again after every disconnect.
    fn generate_advertising_data(&mut self, set: AdvSetHandle) -> Result<(), TransportError>;

    /// Configure advertising timing.  `duration_ms == 0` and
    /// `max_events == 0` mean "advertise indefinitely".
    fn set_advertising_timing(
        &mut self,
        set: AdvSetHandle,
        interval_min_ms: u32,
        interval_max_ms: u32,
        duration_ms: u16,
        max_events: u8,
    ) -> Result<(), TransportError>;

    /// Start connectable legacy advertising on the set.
    fn start_advertising(&mut self, set: AdvSetHandle) -> Result<(), TransportError>;

    /// Answer a pending user read request with `value`.
    fn send_read_response(
        &mut self,
        connection: ConnHandle,
        characteristic: CharHandle,
        value: &[u8],
    ) -> Result<(), TransportError>;

    /// Push a characteristic value to the subscribed client.
    fn send_notification(
        &mut self,
        connection: ConnHandle,
        characteristic: CharHandle,
        value: &[u8],
    ) -> Result<(), TransportError>;

    /// Acknowledge a Write Request with success.
    fn send_write_response(
        &mut self,
        connection: ConnHandle,
        characteristic: CharHandle,
    ) -> Result<(), TransportError>;
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// One combined measurement from the RHT sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RhtReading {
    /// Relative humidity in milli-percent (e.g. 45_120 = 45.12 %RH).
    pub humidity_milli_pct: u32,
    /// Temperature in tenths of a degree Celsius (e.g. 234 = 23.4 °C).
    pub temperature_decic: i32,
}

/// Read-side port for the relative-humidity/temperature sensor.
///
/// The dispatcher powers the sensor up on connect and down on disconnect;
/// measurements outside that window fail with
/// [`SensorError::NotInitialised`].
pub trait SensorPort {
    /// Power up and configure the sensor.
    fn init(&mut self) -> Result<(), SensorError>;

    /// Power the sensor down.  Idempotent.
    fn deinit(&mut self);

    /// Take one fresh measurement.  Never cached.
    fn measure(&mut self) -> Result<RhtReading, SensorError>;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the digital output.
pub trait ActuatorPort {
    /// Drive the output high.
    fn turn_on(&mut self);

    /// Drive the output low.
    fn turn_off(&mut self);

    /// Current commanded state (mirrors the pin).
    fn is_on(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Sampler port (driven adapter: domain → timer service)
// ───────────────────────────────────────────────────────────────

/// The recurring sample timer.
///
/// Armed only while a connection exists and the client has enabled
/// notifications; the connection state machine owns both transitions.
/// Implementations must be safe against double arm/disarm: `disarm` on a
/// stopped timer is a no-op, and `arm` on a running timer must not create
/// a second underlying timer.
pub trait SamplerPort {
    /// Start the recurring timer with the given period.
    fn arm(&mut self, period_ms: u32) -> Result<(), TimerError>;

    /// Stop the timer.  Idempotent.
    fn disarm(&mut self);

    /// Whether the timer is currently running.
    fn is_armed(&self) -> bool;
}
