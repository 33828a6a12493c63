//! Si7021 relative-humidity/temperature sensor driver (I²C).
//!
//! One combined measurement per call: the RH conversion is triggered in
//! hold-master mode, then the temperature measured during that conversion
//! is read back with 0xE0 — no second conversion, no extra wait.
//!
//! Conversions (datasheet §5.1):
//!   %RH  = 125 · code / 65536 − 6
//!   T °C = 175.72 · code / 65536 − 46.85
//!
//! The driver reports humidity in milli-percent and temperature in
//! Celsius-tenths, which is the unit the wire codec transmits directly.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: legacy I²C master driver via raw sys calls, installed once.
//! On host/test: readings come from statics with injection helpers.

use crate::app::ports::{RhtReading, SensorPort};
use crate::error::SensorError;
use log::info;

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

#[cfg(target_os = "espidf")]
use crate::pins;
#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

// ── Si7021 command set ────────────────────────────────────────

#[cfg(target_os = "espidf")]
const CMD_MEASURE_RH_HOLD: u8 = 0xE5;
#[cfg(target_os = "espidf")]
const CMD_READ_TEMP_FROM_RH: u8 = 0xE0;
#[cfg(target_os = "espidf")]
const CMD_READ_USER_REG: u8 = 0xE7;

#[cfg(target_os = "espidf")]
const I2C_PORT: i32 = 0;
#[cfg(target_os = "espidf")]
const I2C_TIMEOUT_TICKS: u32 = 20;

// ── Host simulation state ─────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
static SIM_TEMP_DECIC: AtomicI32 = AtomicI32::new(215);
#[cfg(not(target_os = "espidf"))]
static SIM_HUM_MILLI_PCT: AtomicU32 = AtomicU32::new(45_000);
#[cfg(not(target_os = "espidf"))]
static SIM_READ_FAILS: AtomicBool = AtomicBool::new(false);

/// Inject the simulated temperature (Celsius-tenths).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_temperature_decic(decic: i32) {
    SIM_TEMP_DECIC.store(decic, Ordering::Relaxed);
}

/// Inject the simulated humidity (milli-percent).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_humidity_milli_pct(milli_pct: u32) {
    SIM_HUM_MILLI_PCT.store(milli_pct, Ordering::Relaxed);
}

/// Make every subsequent `measure()` fail with `ReadFailed`.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_read_fails(fails: bool) {
    SIM_READ_FAILS.store(fails, Ordering::Relaxed);
}

// ── Driver ────────────────────────────────────────────────────

/// The RHT sensor.  Powered up on connect, down on disconnect; measuring
/// outside that window fails with [`SensorError::NotInitialised`].
pub struct RhtSensor {
    initialised: bool,
}

impl RhtSensor {
    pub fn new() -> Self {
        Self { initialised: false }
    }

    #[cfg(target_os = "espidf")]
    fn platform_init(&mut self) -> Result<(), SensorError> {
        // SAFETY: Called from the single main-task context; the legacy I²C
        // driver install is guarded against double-install by ESP-IDF.
        unsafe {
            let cfg = i2c_config_t {
                mode: i2c_mode_t_I2C_MODE_MASTER,
                sda_io_num: pins::I2C_SDA_GPIO,
                scl_io_num: pins::I2C_SCL_GPIO,
                sda_pullup_en: true,
                scl_pullup_en: true,
                __bindgen_anon_1: i2c_config_t__bindgen_ty_1 {
                    master: i2c_config_t__bindgen_ty_1__bindgen_ty_1 {
                        clk_speed: pins::I2C_FREQ_HZ,
                    },
                },
                clk_flags: 0,
            };
            if i2c_param_config(I2C_PORT, &cfg) != ESP_OK {
                return Err(SensorError::InitFailed);
            }
            let ret = i2c_driver_install(I2C_PORT, i2c_mode_t_I2C_MODE_MASTER, 0, 0, 0);
            if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
                return Err(SensorError::InitFailed);
            }
        }
        // Probe the part: the user register read NACKs if nothing answers.
        let mut reg = [0u8; 1];
        self.transfer(&[CMD_READ_USER_REG], &mut reg)
            .map_err(|_| SensorError::InitFailed)?;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_init(&mut self) -> Result<(), SensorError> {
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn transfer(&mut self, cmd: &[u8], out: &mut [u8]) -> Result<(), SensorError> {
        // SAFETY: buffers outlive the call; the legacy driver copies them.
        let ret = unsafe {
            i2c_master_write_read_device(
                I2C_PORT,
                pins::RHT_I2C_ADDR,
                cmd.as_ptr(),
                cmd.len(),
                out.as_mut_ptr(),
                out.len(),
                I2C_TIMEOUT_TICKS,
            )
        };
        if ret != ESP_OK {
            return Err(SensorError::ReadFailed);
        }
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_measure(&mut self) -> Result<RhtReading, SensorError> {
        let mut rh_raw = [0u8; 2];
        self.transfer(&[CMD_MEASURE_RH_HOLD], &mut rh_raw)?;
        let mut t_raw = [0u8; 2];
        self.transfer(&[CMD_READ_TEMP_FROM_RH], &mut t_raw)?;

        let rh_code = u16::from_be_bytes(rh_raw) as i64;
        let t_code = u16::from_be_bytes(t_raw) as i64;

        // Milli-percent, clamped to the physical 0–100 % range the
        // datasheet allows codes to slightly overshoot.
        let milli_pct = (125_000 * rh_code / 65_536 - 6_000).clamp(0, 100_000);
        // Celsius-tenths via milli-degrees to keep the integer math exact.
        let millic = 175_720 * t_code / 65_536 - 46_850;
        let decic = millic / 100;

        Ok(RhtReading {
            humidity_milli_pct: milli_pct as u32,
            temperature_decic: decic as i32,
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_measure(&mut self) -> Result<RhtReading, SensorError> {
        if SIM_READ_FAILS.load(Ordering::Relaxed) {
            return Err(SensorError::ReadFailed);
        }
        Ok(RhtReading {
            humidity_milli_pct: SIM_HUM_MILLI_PCT.load(Ordering::Relaxed),
            temperature_decic: SIM_TEMP_DECIC.load(Ordering::Relaxed),
        })
    }
}

impl SensorPort for RhtSensor {
    fn init(&mut self) -> Result<(), SensorError> {
        if self.initialised {
            return Ok(());
        }
        self.platform_init()?;
        self.initialised = true;
        info!("rht: sensor initialised");
        Ok(())
    }

    fn deinit(&mut self) {
        if self.initialised {
            self.initialised = false;
            info!("rht: sensor deinitialised");
        }
    }

    fn measure(&mut self) -> Result<RhtReading, SensorError> {
        if !self.initialised {
            return Err(SensorError::NotInitialised);
        }
        self.platform_measure()
    }
}

#[cfg(all(test, not(target_os = "espidf")))]
mod tests {
    use super::*;

    #[test]
    fn measure_before_init_fails() {
        let mut sensor = RhtSensor::new();
        assert_eq!(sensor.measure(), Err(SensorError::NotInitialised));
    }

    #[test]
    fn measure_after_deinit_fails() {
        let mut sensor = RhtSensor::new();
        sensor.init().unwrap();
        sensor.deinit();
        assert_eq!(sensor.measure(), Err(SensorError::NotInitialised));
    }

    #[test]
    fn init_is_idempotent() {
        let mut sensor = RhtSensor::new();
        sensor.init().unwrap();
        sensor.init().unwrap();
        assert!(sensor.measure().is_ok());
    }

    #[test]
    fn sim_injection_reaches_reading() {
        let mut sensor = RhtSensor::new();
        sensor.init().unwrap();
        sim_set_temperature_decic(234);
        sim_set_humidity_milli_pct(50_000);
        let reading = sensor.measure().unwrap();
        assert_eq!(reading.temperature_decic, 234);
        assert_eq!(reading.humidity_milli_pct, 50_000);
        // Restore defaults for other tests sharing the statics.
        sim_set_temperature_decic(215);
        sim_set_humidity_milli_pct(45_000);
    }
}
