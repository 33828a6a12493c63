//! Application service — the event dispatcher.
//!
//! [`AppService`] owns the connection state machine and the advertising-set
//! handle, and is the single entry point for every stack-originated event.
//! It exposes one method, [`on_event`](AppService::on_event); all I/O flows
//! through port traits injected at the call site, making the entire
//! service testable with mock adapters.
//!
//! ```text
//!  StackEvent ──▶ ┌────────────────────────┐ ──▶ TransportPort
//!                 │       AppService        │ ──▶ SamplerPort
//!                 │  Link · codec · gatt    │ ──▶ ActuatorPort
//!                 └────────────────────────┘ ◀── SensorPort
//! ```
//!
//! Error policy: advertising setup/restart failures propagate out of
//! `on_event` and are fatal in `main`; everything else is logged inline
//! and the triggering operation skipped — the next read request or timer
//! period is the retry.

use log::{info, warn};

use crate::config::SystemConfig;
use crate::error::Result;
use crate::events::{StackEvent, SAMPLE_TIMER_SIGNAL};
use crate::gatt;
use crate::link::Link;

use super::codec;
use super::ports::{ActuatorPort, AdvSetHandle, SamplerPort, SensorPort, TransportPort};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    link: Link,
    /// Advertising set, created once on `Boot` and kept for the process
    /// lifetime.  `None` only before the boot event.
    adv_set: Option<AdvSetHandle>,
    config: SystemConfig,
}

impl AppService {
    pub fn new(config: SystemConfig) -> Self {
        Self {
            link: Link::new(),
            adv_set: None,
            config,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// The connection state machine (read-only view for tests/telemetry).
    pub fn link(&self) -> &Link {
        &self.link
    }

    /// The advertising set handle, once boot has completed.
    pub fn adv_set(&self) -> Option<AdvSetHandle> {
        self.adv_set
    }

    // ── Event dispatch ────────────────────────────────────────

    /// Process one stack event.
    ///
    /// Returns `Err` only for failures the system cannot run without
    /// (advertising setup); the caller treats those as fatal.
    pub fn on_event(
        &mut self,
        event: &StackEvent,
        transport: &mut impl TransportPort,
        hw: &mut (impl SensorPort + ActuatorPort),
        sampler: &mut impl SamplerPort,
    ) -> Result<()> {
        match event {
            // The radio is ready — bring up advertising.  No stack command
            // may be issued before this event.
            StackEvent::Boot => self.on_boot(transport)?,

            StackEvent::ConnectionOpened { connection } => {
                if let Err(e) = hw.init() {
                    warn!("dispatch: sensor init failed ({e})");
                }
                self.link.open(*connection);
            }

            StackEvent::ConnectionClosed { reason, .. } => {
                info!("dispatch: connection closed (reason={:#06x})", reason);
                hw.deinit();
                // Sampler disarm happens inside the transition.
                self.link.close(sampler);
                self.restart_advertising(transport)?;
            }

            StackEvent::ReadRequest {
                connection,
                characteristic,
            } => {
                if *characteristic == gatt::CHAR_TEMPERATURE {
                    self.on_temperature_read(*connection, transport, hw);
                }
            }

            StackEvent::CharacteristicStatus {
                characteristic,
                status_flags,
                client_config,
                ..
            } => {
                if *characteristic == gatt::CHAR_TEMPERATURE
                    && *status_flags == gatt::STATUS_CLIENT_CONFIG
                {
                    info!(
                        "dispatch: temperature client-config update ({:#06x})",
                        client_config
                    );
                    self.link
                        .subscribe(self.config.sample_period_ms, sampler);
                }
            }

            StackEvent::ExternalSignal { bits } => {
                if bits & SAMPLE_TIMER_SIGNAL != 0 {
                    self.on_sample_signal(transport, hw);
                }
            }

            StackEvent::WriteRequest {
                connection,
                characteristic,
                att_opcode,
                value,
            } => {
                if *characteristic == gatt::CHAR_DIGITAL_OUT {
                    self.on_digital_out_write(*connection, *att_opcode, value, transport, hw);
                }
            }

            StackEvent::Other { .. } => {}
        }
        Ok(())
    }

    // ── Event handlers ────────────────────────────────────────

    fn on_boot(&mut self, transport: &mut impl TransportPort) -> Result<()> {
        let set = transport.create_advertising_set()?;
        transport.generate_advertising_data(set)?;
        transport.set_advertising_timing(
            set,
            self.config.adv_interval_min_ms,
            self.config.adv_interval_max_ms,
            self.config.adv_duration_ms,
            self.config.adv_max_events,
        )?;
        transport.start_advertising(set)?;
        self.adv_set = Some(set);
        info!(
            "dispatch: advertising as '{}' ({} ms interval)",
            self.config.device_name, self.config.adv_interval_min_ms
        );
        Ok(())
    }

    /// Regenerate advertising data and re-enter connectable mode after a
    /// disconnect.  Failing here leaves the node unreachable, so it gets
    /// the same fatal treatment as the boot path.
    fn restart_advertising(&mut self, transport: &mut impl TransportPort) -> Result<()> {
        let Some(set) = self.adv_set else {
            warn!("dispatch: disconnect before boot completed, no advertising set");
            return Ok(());
        };
        transport.generate_advertising_data(set)?;
        transport.start_advertising(set)?;
        info!("dispatch: advertising restarted");
        Ok(())
    }

    fn on_temperature_read(
        &mut self,
        connection: u8,
        transport: &mut impl TransportPort,
        hw: &mut impl SensorPort,
    ) {
        info!("dispatch: temperature read requested");
        match codec::read_temperature(hw) {
            Ok(payload) => {
                match transport.send_read_response(connection, gatt::CHAR_TEMPERATURE, &payload) {
                    Ok(()) => info!(
                        "dispatch: temperature sent ({} decidegrees)",
                        codec::decode_temperature(payload)
                    ),
                    Err(e) => warn!("dispatch: read response not delivered ({e})"),
                }
            }
            // No response is sent; the client observes a transport-level
            // timeout.  The next read request retries naturally.
            Err(e) => warn!("dispatch: temperature read failed ({e})"),
        }
    }

    fn on_sample_signal(
        &mut self,
        transport: &mut impl TransportPort,
        hw: &mut impl SensorPort,
    ) {
        // A signal raised just before a disconnect can be drained after the
        // link is already gone (or after a fresh, unsubscribed session has
        // started); it must never turn into a send attempt.
        if !self.link.is_subscribed() {
            warn!("dispatch: stale sample signal without subscriber, dropped");
            return;
        }
        match codec::read_temperature(hw) {
            Ok(payload) => {
                match transport.send_notification(
                    self.link.conn_handle(),
                    gatt::CHAR_TEMPERATURE,
                    &payload,
                ) {
                    Ok(()) => {
                        let step = self.link.bump_step();
                        info!(
                            "dispatch: temperature notification #{} sent ({} decidegrees)",
                            step,
                            codec::decode_temperature(payload)
                        );
                    }
                    // Not retried — the next period tries again.
                    Err(e) => warn!("dispatch: notification not delivered ({e})"),
                }
            }
            Err(e) => warn!("dispatch: temperature read failed ({e})"),
        }
    }

    fn on_digital_out_write(
        &mut self,
        connection: u8,
        att_opcode: u8,
        value: &[u8],
        transport: &mut impl TransportPort,
        hw: &mut impl ActuatorPort,
    ) {
        if let Some(&byte) = value.first() {
            match byte {
                gatt::DIGITAL_OUT_OFF => {
                    hw.turn_off();
                    info!("dispatch: digital out OFF");
                }
                gatt::DIGITAL_OUT_ON => {
                    hw.turn_on();
                    info!("dispatch: digital out ON");
                }
                // Malformed values are ignored, not rejected: there is no
                // application-level error path on this characteristic.
                other => info!("dispatch: digital out write ignored (value={other})"),
            }
        }
        if att_opcode == gatt::ATT_OPCODE_WRITE_REQUEST {
            if let Err(e) = transport.send_write_response(connection, gatt::CHAR_DIGITAL_OUT) {
                warn!("dispatch: write response not delivered ({e})");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests — mock-port unit coverage; scenario sequences live in tests/.
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::RhtReading;
    use crate::error::{SensorError, TimerError, TransportError};
    use crate::events::CONN_HANDLE_NONE;
    use crate::link::LinkState;

    // ── Mock transport ────────────────────────────────────────

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Sent {
        AdvDataGenerated,
        AdvTiming {
            min_ms: u32,
            max_ms: u32,
            duration_ms: u16,
            max_events: u8,
        },
        AdvStarted,
        ReadResponse { characteristic: u16, value: Vec<u8> },
        Notification { connection: u8, value: Vec<u8> },
        WriteResponse { characteristic: u16 },
    }

    struct MockTransport {
        sent: Vec<Sent>,
        fail_advertising: bool,
        fail_notify: bool,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                sent: Vec::new(),
                fail_advertising: false,
                fail_notify: false,
            }
        }

        fn notifications(&self) -> usize {
            self.sent
                .iter()
                .filter(|s| matches!(s, Sent::Notification { .. }))
                .count()
        }
    }

    impl TransportPort for MockTransport {
        fn create_advertising_set(&mut self) -> core::result::Result<u8, TransportError> {
            if self.fail_advertising {
                return Err(TransportError::Advertising(-1));
            }
            Ok(0)
        }
        fn generate_advertising_data(
            &mut self,
            _set: u8,
        ) -> core::result::Result<(), TransportError> {
            if self.fail_advertising {
                return Err(TransportError::Advertising(-1));
            }
            self.sent.push(Sent::AdvDataGenerated);
            Ok(())
        }
        fn set_advertising_timing(
            &mut self,
            _set: u8,
            min_ms: u32,
            max_ms: u32,
            duration_ms: u16,
            max_events: u8,
        ) -> core::result::Result<(), TransportError> {
            self.sent.push(Sent::AdvTiming {
                min_ms,
                max_ms,
                duration_ms,
                max_events,
            });
            Ok(())
        }
        fn start_advertising(&mut self, _set: u8) -> core::result::Result<(), TransportError> {
            if self.fail_advertising {
                return Err(TransportError::Advertising(-1));
            }
            self.sent.push(Sent::AdvStarted);
            Ok(())
        }
        fn send_read_response(
            &mut self,
            _connection: u8,
            characteristic: u16,
            value: &[u8],
        ) -> core::result::Result<(), TransportError> {
            self.sent.push(Sent::ReadResponse {
                characteristic,
                value: value.to_vec(),
            });
            Ok(())
        }
        fn send_notification(
            &mut self,
            connection: u8,
            _characteristic: u16,
            value: &[u8],
        ) -> core::result::Result<(), TransportError> {
            if self.fail_notify {
                return Err(TransportError::Notification(-1));
            }
            self.sent.push(Sent::Notification {
                connection,
                value: value.to_vec(),
            });
            Ok(())
        }
        fn send_write_response(
            &mut self,
            _connection: u8,
            characteristic: u16,
        ) -> core::result::Result<(), TransportError> {
            self.sent.push(Sent::WriteResponse { characteristic });
            Ok(())
        }
    }

    // ── Mock hardware (sensor + actuator) ─────────────────────

    struct MockHw {
        initialised: bool,
        temperature_decic: i32,
        read_fails: bool,
        led_on: bool,
    }

    impl MockHw {
        fn new() -> Self {
            Self {
                initialised: false,
                temperature_decic: 234,
                read_fails: false,
                led_on: false,
            }
        }
    }

    impl SensorPort for MockHw {
        fn init(&mut self) -> core::result::Result<(), SensorError> {
            self.initialised = true;
            Ok(())
        }
        fn deinit(&mut self) {
            self.initialised = false;
        }
        fn measure(&mut self) -> core::result::Result<RhtReading, SensorError> {
            if !self.initialised {
                return Err(SensorError::NotInitialised);
            }
            if self.read_fails {
                return Err(SensorError::ReadFailed);
            }
            Ok(RhtReading {
                humidity_milli_pct: 45_000,
                temperature_decic: self.temperature_decic,
            })
        }
    }

    impl ActuatorPort for MockHw {
        fn turn_on(&mut self) {
            self.led_on = true;
        }
        fn turn_off(&mut self) {
            self.led_on = false;
        }
        fn is_on(&self) -> bool {
            self.led_on
        }
    }

    // ── Mock sampler ──────────────────────────────────────────

    struct MockSampler {
        armed: bool,
        period_ms: u32,
        arm_calls: u32,
    }

    impl MockSampler {
        fn new() -> Self {
            Self {
                armed: false,
                period_ms: 0,
                arm_calls: 0,
            }
        }
    }

    impl SamplerPort for MockSampler {
        fn arm(&mut self, period_ms: u32) -> core::result::Result<(), TimerError> {
            self.arm_calls += 1;
            self.armed = true;
            self.period_ms = period_ms;
            Ok(())
        }
        fn disarm(&mut self) {
            self.armed = false;
        }
        fn is_armed(&self) -> bool {
            self.armed
        }
    }

    // ── Harness ───────────────────────────────────────────────

    struct Harness {
        app: AppService,
        transport: MockTransport,
        hw: MockHw,
        sampler: MockSampler,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                app: AppService::new(SystemConfig::default()),
                transport: MockTransport::new(),
                hw: MockHw::new(),
                sampler: MockSampler::new(),
            }
        }

        fn dispatch(&mut self, event: StackEvent) -> Result<()> {
            self.app
                .on_event(&event, &mut self.transport, &mut self.hw, &mut self.sampler)
        }

        fn booted() -> Self {
            let mut h = Self::new();
            h.dispatch(StackEvent::Boot).unwrap();
            h
        }

        fn connected() -> Self {
            let mut h = Self::booted();
            h.dispatch(StackEvent::ConnectionOpened { connection: 0x03 })
                .unwrap();
            h
        }

        fn subscribe_event() -> StackEvent {
            StackEvent::CharacteristicStatus {
                connection: 0x03,
                characteristic: gatt::CHAR_TEMPERATURE,
                status_flags: gatt::STATUS_CLIENT_CONFIG,
                client_config: 0x0001,
            }
        }

        fn sample_signal() -> StackEvent {
            StackEvent::ExternalSignal {
                bits: SAMPLE_TIMER_SIGNAL,
            }
        }
    }

    // ── Boot ──────────────────────────────────────────────────

    #[test]
    fn boot_starts_unlimited_advertising_at_100ms() {
        let h = Harness::booted();
        assert!(h.app.adv_set().is_some());
        assert!(h.transport.sent.contains(&Sent::AdvTiming {
            min_ms: 100,
            max_ms: 100,
            duration_ms: 0,
            max_events: 0,
        }));
        assert!(h.transport.sent.contains(&Sent::AdvStarted));
    }

    #[test]
    fn boot_failure_is_fatal() {
        let mut h = Harness::new();
        h.transport.fail_advertising = true;
        assert!(h.dispatch(StackEvent::Boot).is_err());
    }

    // ── Connect / disconnect ──────────────────────────────────

    #[test]
    fn connect_inits_sensor_and_records_handle() {
        let h = Harness::connected();
        assert!(h.hw.initialised);
        assert_eq!(h.app.link().conn_handle(), 0x03);
        assert_eq!(h.app.link().state(), LinkState::Connected);
    }

    #[test]
    fn disconnect_releases_everything_and_restarts_advertising() {
        let mut h = Harness::connected();
        h.dispatch(Harness::subscribe_event()).unwrap();
        assert!(h.sampler.is_armed());

        h.transport.sent.clear();
        h.dispatch(StackEvent::ConnectionClosed {
            connection: 0x03,
            reason: 0x0213,
        })
        .unwrap();

        assert!(!h.hw.initialised, "sensor must be deinitialised");
        assert!(!h.sampler.is_armed(), "sampler must be disarmed");
        assert_eq!(h.app.link().conn_handle(), CONN_HANDLE_NONE);
        assert_eq!(h.app.link().step_count(), 0);
        assert_eq!(
            h.transport.sent,
            vec![Sent::AdvDataGenerated, Sent::AdvStarted],
            "advertising data regenerated and restarted"
        );
    }

    // ── Read requests ─────────────────────────────────────────

    #[test]
    fn temperature_read_responds_with_encoded_payload() {
        let mut h = Harness::connected();
        h.hw.temperature_decic = 234; // 23.4 °C
        h.dispatch(StackEvent::ReadRequest {
            connection: 0x03,
            characteristic: gatt::CHAR_TEMPERATURE,
        })
        .unwrap();

        assert!(h.transport.sent.contains(&Sent::ReadResponse {
            characteristic: gatt::CHAR_TEMPERATURE,
            value: vec![0xEA, 0x00],
        }));
    }

    #[test]
    fn failed_sensor_read_leaves_request_unanswered() {
        let mut h = Harness::connected();
        h.hw.read_fails = true;
        h.dispatch(StackEvent::ReadRequest {
            connection: 0x03,
            characteristic: gatt::CHAR_TEMPERATURE,
        })
        .unwrap();
        assert!(
            !h.transport
                .sent
                .iter()
                .any(|s| matches!(s, Sent::ReadResponse { .. })),
            "no response on sensor failure"
        );
    }

    #[test]
    fn read_on_other_characteristic_is_ignored() {
        let mut h = Harness::connected();
        h.dispatch(StackEvent::ReadRequest {
            connection: 0x03,
            characteristic: 0x0099,
        })
        .unwrap();
        assert!(
            !h.transport
                .sent
                .iter()
                .any(|s| matches!(s, Sent::ReadResponse { .. }))
        );
    }

    // ── Subscription ──────────────────────────────────────────

    #[test]
    fn subscribe_arms_sampler_at_configured_period() {
        let mut h = Harness::connected();
        h.dispatch(Harness::subscribe_event()).unwrap();
        assert!(h.sampler.is_armed());
        assert_eq!(h.sampler.period_ms, 1000);
    }

    #[test]
    fn repeated_subscribe_events_arm_exactly_once() {
        let mut h = Harness::connected();
        h.dispatch(Harness::subscribe_event()).unwrap();
        h.dispatch(Harness::subscribe_event()).unwrap();
        assert_eq!(h.sampler.arm_calls, 1);
    }

    #[test]
    fn status_event_without_client_config_flag_is_ignored() {
        let mut h = Harness::connected();
        h.dispatch(StackEvent::CharacteristicStatus {
            connection: 0x03,
            characteristic: gatt::CHAR_TEMPERATURE,
            status_flags: 0x02, // confirmation, not a CCCD update
            client_config: 0,
        })
        .unwrap();
        assert!(!h.sampler.is_armed());
    }

    // ── Timer signal ──────────────────────────────────────────

    #[test]
    fn sample_signal_sends_notification_and_bumps_step() {
        let mut h = Harness::connected();
        h.dispatch(Harness::subscribe_event()).unwrap();
        h.hw.temperature_decic = -50;
        h.dispatch(Harness::sample_signal()).unwrap();

        assert!(h.transport.sent.contains(&Sent::Notification {
            connection: 0x03,
            value: (-50_i16).to_le_bytes().to_vec(),
        }));
        assert_eq!(h.app.link().step_count(), 1);
    }

    #[test]
    fn sample_signal_without_connection_is_dropped() {
        let mut h = Harness::booted();
        h.dispatch(Harness::sample_signal()).unwrap();
        assert_eq!(h.transport.notifications(), 0);
    }

    #[test]
    fn notification_failure_is_not_retried() {
        let mut h = Harness::connected();
        h.dispatch(Harness::subscribe_event()).unwrap();
        h.transport.fail_notify = true;
        h.dispatch(Harness::sample_signal()).unwrap();
        assert_eq!(h.app.link().step_count(), 0, "failed send does not count");
    }

    #[test]
    fn unrelated_signal_bits_are_ignored() {
        let mut h = Harness::connected();
        h.dispatch(Harness::subscribe_event()).unwrap();
        h.dispatch(StackEvent::ExternalSignal { bits: 1 << 5 }).unwrap();
        assert_eq!(h.transport.notifications(), 0);
    }

    // ── Writes ────────────────────────────────────────────────

    fn digital_write(byte: u8, opcode: u8) -> StackEvent {
        StackEvent::write_request(0x03, gatt::CHAR_DIGITAL_OUT, opcode, &[byte])
    }

    #[test]
    fn write_ascii_one_turns_actuator_on() {
        let mut h = Harness::connected();
        h.dispatch(digital_write(49, gatt::ATT_OPCODE_WRITE_REQUEST))
            .unwrap();
        assert!(h.hw.is_on());
        assert!(h.transport.sent.contains(&Sent::WriteResponse {
            characteristic: gatt::CHAR_DIGITAL_OUT,
        }));
    }

    #[test]
    fn write_ascii_zero_turns_actuator_off() {
        let mut h = Harness::connected();
        h.dispatch(digital_write(49, gatt::ATT_OPCODE_WRITE_REQUEST))
            .unwrap();
        h.dispatch(digital_write(48, gatt::ATT_OPCODE_WRITE_REQUEST))
            .unwrap();
        assert!(!h.hw.is_on());
    }

    #[test]
    fn malformed_write_leaves_actuator_unchanged_but_is_acknowledged() {
        let mut h = Harness::connected();
        h.dispatch(digital_write(49, gatt::ATT_OPCODE_WRITE_REQUEST))
            .unwrap();
        h.transport.sent.clear();

        h.dispatch(digital_write(0x07, gatt::ATT_OPCODE_WRITE_REQUEST))
            .unwrap();
        assert!(h.hw.is_on(), "unrecognised byte must not change state");
        assert!(h.transport.sent.contains(&Sent::WriteResponse {
            characteristic: gatt::CHAR_DIGITAL_OUT,
        }));
    }

    #[test]
    fn write_command_gets_no_response() {
        let mut h = Harness::connected();
        h.dispatch(digital_write(49, 0x52)).unwrap();
        assert!(h.hw.is_on());
        assert!(
            !h.transport
                .sent
                .iter()
                .any(|s| matches!(s, Sent::WriteResponse { .. }))
        );
    }

    #[test]
    fn empty_write_is_a_noop() {
        let mut h = Harness::connected();
        h.dispatch(StackEvent::write_request(
            0x03,
            gatt::CHAR_DIGITAL_OUT,
            gatt::ATT_OPCODE_WRITE_REQUEST,
            &[],
        ))
        .unwrap();
        assert!(!h.hw.is_on());
    }

    #[test]
    fn write_on_other_characteristic_is_ignored() {
        let mut h = Harness::connected();
        h.dispatch(StackEvent::write_request(
            0x03,
            0x0099,
            gatt::ATT_OPCODE_WRITE_REQUEST,
            &[49],
        ))
        .unwrap();
        assert!(!h.hw.is_on());
        assert!(h.transport.sent.is_empty());
    }

    // ── Unknown events ────────────────────────────────────────

    #[test]
    fn unknown_events_are_noops() {
        let mut h = Harness::connected();
        h.dispatch(StackEvent::Other { id: 0xDEAD_BEEF }).unwrap();
        assert_eq!(h.app.link().state(), LinkState::Connected);
        assert!(!h.sampler.is_armed());
    }
}
