//! Digital output driver (board LED).
//!
//! A single push-pull GPIO driven by the digital-out characteristic.
//! The commanded state is mirrored in memory so the rest of the system
//! (and the host tests) can query it without touching the pin.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: configures the pin as output once and drives it via raw
//! sys calls.  On host/test: tracks state in-memory only.

use crate::pins;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

pub struct DigitalOut {
    on: bool,
}

impl DigitalOut {
    pub fn new() -> Self {
        #[cfg(target_os = "espidf")]
        // SAFETY: one-shot pin configuration from the main task at boot.
        unsafe {
            let cfg = gpio_config_t {
                pin_bit_mask: 1u64 << pins::DIGITAL_OUT_GPIO,
                mode: gpio_mode_t_GPIO_MODE_OUTPUT,
                pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
                pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
                intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
            };
            if gpio_config(&cfg) != ESP_OK {
                log::error!("digital_out: GPIO config failed, output inoperative");
            }
        }

        let mut out = Self { on: false };
        out.turn_off();
        out
    }

    pub fn turn_on(&mut self) {
        self.set_level(true);
        self.on = true;
    }

    pub fn turn_off(&mut self) {
        self.set_level(false);
        self.on = false;
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    #[cfg(target_os = "espidf")]
    fn set_level(&mut self, high: bool) {
        // SAFETY: pin configured as output in new(); set_level is atomic.
        unsafe {
            gpio_set_level(pins::DIGITAL_OUT_GPIO, u32::from(high));
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn set_level(&mut self, _high: bool) {
        let _ = pins::DIGITAL_OUT_GPIO;
    }
}
