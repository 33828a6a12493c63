//! GPIO / peripheral pin assignments for the ThermoNode main board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Digital output (board LED, exposed over the digital-out characteristic)
// ---------------------------------------------------------------------------

/// Digital output: HIGH = LED on (active HIGH through a driver transistor).
pub const DIGITAL_OUT_GPIO: i32 = 21;

// ---------------------------------------------------------------------------
// I²C bus — Si7021 relative-humidity/temperature sensor
// ---------------------------------------------------------------------------

pub const I2C_SDA_GPIO: i32 = 14;
pub const I2C_SCL_GPIO: i32 = 15;

/// Si7021 7-bit I²C address (fixed by the part).
pub const RHT_I2C_ADDR: u8 = 0x40;

/// I²C bus clock (Si7021 supports up to 400 kHz).
pub const I2C_FREQ_HZ: u32 = 100_000;

// ---------------------------------------------------------------------------
// UART debug
// ---------------------------------------------------------------------------

pub const UART_TX_GPIO: i32 = 17;
pub const UART_RX_GPIO: i32 = 18;
