//! System configuration parameters
//!
//! All tunable parameters for the ThermoNode peripheral.  The defaults
//! match the shipped GATT profile; a host tool can serialise/deserialise
//! the whole struct for bench provisioning.

use serde::{Deserialize, Serialize};

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Identity ---
    /// Device name used in advertising data.
    pub device_name: heapless::String<24>,

    // --- Advertising ---
    /// Advertising interval, minimum (milliseconds).
    pub adv_interval_min_ms: u32,
    /// Advertising interval, maximum (milliseconds).
    pub adv_interval_max_ms: u32,
    /// Advertising duration (milliseconds).  0 = advertise until connected.
    pub adv_duration_ms: u16,
    /// Maximum number of advertising events.  0 = unlimited.
    pub adv_max_events: u8,

    // --- Sampling ---
    /// Period of the temperature notification timer (milliseconds).
    pub sample_period_ms: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        let mut device_name = heapless::String::new();
        // Cannot overflow: literal is shorter than the 24-byte capacity.
        let _ = device_name.push_str("thermonode");

        Self {
            device_name,

            // Advertising: 100 ms fixed interval, no duration or event cap.
            adv_interval_min_ms: 100,
            adv_interval_max_ms: 100,
            adv_duration_ms: 0,
            adv_max_events: 0,

            // Sampling: 1 Hz notifications while subscribed.
            sample_period_ms: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = SystemConfig::default();
        assert!(!c.device_name.is_empty());
        assert!(c.adv_interval_min_ms > 0);
        assert!(c.adv_interval_min_ms <= c.adv_interval_max_ms);
        assert!(c.sample_period_ms > 0);
    }

    #[test]
    fn default_advertising_is_unlimited() {
        let c = SystemConfig::default();
        assert_eq!(c.adv_duration_ms, 0, "advertising must not time out");
        assert_eq!(c.adv_max_events, 0, "advertising must not stop after N events");
    }

    #[test]
    fn serde_roundtrip() {
        let c = SystemConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: SystemConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c.device_name, c2.device_name);
        assert_eq!(c.adv_interval_min_ms, c2.adv_interval_min_ms);
        assert_eq!(c.sample_period_ms, c2.sample_period_ms);
    }
}
