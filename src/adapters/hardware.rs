//! Hardware adapter — bridges real peripherals to domain port traits.
//!
//! Owns the RHT sensor and the digital-out driver, exposing them through
//! [`SensorPort`] and [`ActuatorPort`].  On non-espidf targets the
//! underlying drivers use cfg-gated simulation stubs.

use crate::app::ports::{ActuatorPort, RhtReading, SensorPort};
use crate::drivers::digital_out::DigitalOut;
use crate::drivers::rht::RhtSensor;
use crate::error::SensorError;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter {
    rht: RhtSensor,
    digital_out: DigitalOut,
}

impl HardwareAdapter {
    pub fn new(rht: RhtSensor, digital_out: DigitalOut) -> Self {
        Self { rht, digital_out }
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl SensorPort for HardwareAdapter {
    fn init(&mut self) -> Result<(), SensorError> {
        self.rht.init()
    }

    fn deinit(&mut self) {
        self.rht.deinit();
    }

    fn measure(&mut self) -> Result<RhtReading, SensorError> {
        self.rht.measure()
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl ActuatorPort for HardwareAdapter {
    fn turn_on(&mut self) {
        self.digital_out.turn_on();
    }

    fn turn_off(&mut self) {
        self.digital_out.turn_off();
    }

    fn is_on(&self) -> bool {
        self.digital_out.is_on()
    }
}
