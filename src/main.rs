//! ThermoNode Firmware — Main Entry Point
//!
//! Hexagonal architecture with a single serial event stream.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                   │
//! │                                                            │
//! │  BleAdapter        HardwareAdapter      SampleTimer        │
//! │  (TransportPort)   (Sensor+Actuator)    (SamplerPort)      │
//! │                                                            │
//! │  ────────────── Port Trait Boundary ──────────────────     │
//! │                                                            │
//! │  ┌──────────────────────────────────────────────────┐      │
//! │  │            AppService (pure logic)               │      │
//! │  │  Link state machine · wire codec                 │      │
//! │  └──────────────────────────────────────────────────┘      │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The Bluedroid task and the timer service only enqueue events/signals;
//! this loop is the single consumer and the single writer of domain state.

#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info};

use thermonode::adapters::ble::{self, BleAdapter};
use thermonode::adapters::hardware::HardwareAdapter;
use thermonode::app::service::AppService;
use thermonode::config::SystemConfig;
use thermonode::drivers::digital_out::DigitalOut;
use thermonode::drivers::rht::RhtSensor;
use thermonode::drivers::sample_timer::SampleTimer;
use thermonode::events::{self, StackEvent};

/// Park the task forever after an unrecoverable failure.  The watchdog (if
/// configured in sdkconfig) resets the node; otherwise it stays down until
/// power-cycled, which beats advertising a half-initialised GATT table.
fn halt() -> ! {
    loop {
        esp_idf_svc::hal::delay::FreeRtos::delay_ms(1000);
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("ThermoNode v{}", env!("CARGO_PKG_VERSION"));

    let config = SystemConfig::default();

    // ── 2. Construct adapters ─────────────────────────────────
    let mut hw = HardwareAdapter::new(RhtSensor::new(), DigitalOut::new());
    let mut sampler = SampleTimer::new();
    let mut transport = BleAdapter::new(config.device_name.clone());
    let mut app = AppService::new(config);

    // ── 3. Bring up the BLE stack ─────────────────────────────
    // Readiness arrives asynchronously as StackEvent::Boot once the GATT
    // table is registered; advertising starts from that event.
    if let Err(e) = transport.start() {
        error!("BLE stack bring-up failed ({e}) — halting");
        halt();
    }

    info!("System ready. Entering event loop.");

    // ── 4. Event loop ─────────────────────────────────────────
    loop {
        // Drain stack events, one at a time, in arrival order.
        while let Some(event) = ble::poll_stack_event() {
            if let Err(e) = app.on_event(&event, &mut transport, &mut hw, &mut sampler) {
                error!("unrecoverable dispatch failure ({e}) — halting");
                halt();
            }
        }

        // Fold any pending timer signals into the same serial stream.
        let bits = events::take_signals();
        if bits != 0 {
            let event = StackEvent::ExternalSignal { bits };
            if let Err(e) = app.on_event(&event, &mut transport, &mut hw, &mut sampler) {
                error!("unrecoverable dispatch failure ({e}) — halting");
                halt();
            }
        }

        // Nothing pending — yield to FreeRTOS until the next callback.
        esp_idf_svc::hal::delay::FreeRtos::delay_ms(10);
    }
}
