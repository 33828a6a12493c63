//! Temperature wire codec.
//!
//! The temperature characteristic carries a 2-byte little-endian signed
//! fixed-point value in units of 0.1 °C.  The sensor driver already
//! delivers Celsius-tenths, so encoding is a straight truncating cast to
//! `i16` — values outside ±3276.7 °C wrap, which is far beyond anything
//! the part can measure.  No rounding correction is applied.

use crate::error::SensorError;

use super::ports::SensorPort;

/// Size of the temperature characteristic value.
pub const TEMPERATURE_PAYLOAD_LEN: usize = 2;

/// Encode a temperature in Celsius-tenths into the characteristic payload.
pub fn encode_temperature(temperature_decic: i32) -> [u8; TEMPERATURE_PAYLOAD_LEN] {
    (temperature_decic as i16).to_le_bytes()
}

/// Decode a characteristic payload back into Celsius-tenths.
pub fn decode_temperature(payload: [u8; TEMPERATURE_PAYLOAD_LEN]) -> i16 {
    i16::from_le_bytes(payload)
}

/// Take a fresh measurement and encode it for the wire.
///
/// The sensor's humidity output is read as part of the same transaction
/// and discarded here; only temperature goes over the air.
pub fn read_temperature(
    sensor: &mut impl SensorPort,
) -> Result<[u8; TEMPERATURE_PAYLOAD_LEN], SensorError> {
    let reading = sensor.measure()?;
    Ok(encode_temperature(reading.temperature_decic))
}
