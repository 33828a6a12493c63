//! Periodic sample timer using ESP-IDF's esp_timer API.
//!
//! Once armed, the timer fires in the ESP timer task context (not ISR) and
//! raises [`SAMPLE_TIMER_SIGNAL`] — nothing else.  The signal is consumed
//! by the main loop in the same serial stream as the radio events, so the
//! callback never touches connection state.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: a lazily created `esp_timer` started/stopped per arm cycle.
//! On host/test: an in-memory armed flag plus the recorded period.

use crate::app::ports::SamplerPort;
use crate::error::TimerError;

#[cfg(target_os = "espidf")]
use crate::events::{raise_signal, SAMPLE_TIMER_SIGNAL};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
static mut SAMPLE_TIMER: esp_timer_handle_t = core::ptr::null_mut();

/// SAFETY: SAMPLE_TIMER is written once, lazily, from `arm()` in the single
/// main-task context before the callback can fire.  The callback itself
/// never reads the handle.
#[cfg(target_os = "espidf")]
unsafe fn sample_timer_handle() -> esp_timer_handle_t {
    unsafe { SAMPLE_TIMER }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn sample_tick_cb(_arg: *mut core::ffi::c_void) {
    raise_signal(SAMPLE_TIMER_SIGNAL);
}

/// The recurring sample timer.  Armed/disarmed state is tracked here so a
/// double arm never creates a second underlying timer and a double disarm
/// is a no-op.
pub struct SampleTimer {
    armed: bool,
    #[cfg(not(target_os = "espidf"))]
    period_ms: u32,
}

impl SampleTimer {
    pub fn new() -> Self {
        Self {
            armed: false,
            #[cfg(not(target_os = "espidf"))]
            period_ms: 0,
        }
    }

    /// Period the simulated timer was armed with (test inspection).
    #[cfg(not(target_os = "espidf"))]
    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    #[cfg(target_os = "espidf")]
    fn platform_arm(&mut self, period_ms: u32) -> Result<(), TimerError> {
        // SAFETY: SAMPLE_TIMER is created once here from the main task;
        // the callback only calls raise_signal(), which is lock-free.
        unsafe {
            if sample_timer_handle().is_null() {
                let args = esp_timer_create_args_t {
                    callback: Some(sample_tick_cb),
                    arg: core::ptr::null_mut(),
                    dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
                    name: b"sample\0".as_ptr() as *const _,
                    skip_unhandled_events: false,
                };
                let ret = esp_timer_create(&args, &raw mut SAMPLE_TIMER);
                if ret != ESP_OK {
                    return Err(TimerError::StartFailed(ret));
                }
            }
            let ret = esp_timer_start_periodic(sample_timer_handle(), u64::from(period_ms) * 1000);
            if ret != ESP_OK {
                return Err(TimerError::StartFailed(ret));
            }
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_arm(&mut self, period_ms: u32) -> Result<(), TimerError> {
        self.period_ms = period_ms;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_disarm(&mut self) {
        // SAFETY: handle is valid if arm() succeeded; null-check guards the
        // never-armed case.  Stopping a stopped timer returns an error code
        // we deliberately ignore — disarm is idempotent by contract.
        unsafe {
            let t = sample_timer_handle();
            if !t.is_null() {
                esp_timer_stop(t);
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disarm(&mut self) {}
}

impl SamplerPort for SampleTimer {
    fn arm(&mut self, period_ms: u32) -> Result<(), TimerError> {
        if self.armed {
            return Ok(());
        }
        self.platform_arm(period_ms)?;
        self.armed = true;
        log::info!("sample_timer: armed ({} ms period)", period_ms);
        Ok(())
    }

    fn disarm(&mut self) {
        if !self.armed {
            return;
        }
        self.platform_disarm();
        self.armed = false;
        log::info!("sample_timer: disarmed");
    }

    fn is_armed(&self) -> bool {
        self.armed
    }
}
