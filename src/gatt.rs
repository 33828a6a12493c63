//! Static GATT attribute table constants.
//!
//! The characteristic table is fixed at build time; these identifiers are
//! the local attribute handles the transport adapter assigns when it
//! registers the table, and the dispatcher matches incoming events against
//! them.  Service/characteristic UUIDs are Bluetooth SIG assigned numbers.

/// Local attribute handle of a characteristic in the static table.
pub type CharHandle = u16;

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

/// Environmental Sensing service (org.bluetooth.service.environmental_sensing).
pub const SVC_ENVIRONMENTAL_SENSING: u16 = 0x181A;
/// Automation IO service (org.bluetooth.service.automation_io).
pub const SVC_AUTOMATION_IO: u16 = 0x1815;

// ---------------------------------------------------------------------------
// Characteristics
// ---------------------------------------------------------------------------

/// Temperature characteristic UUID (org.bluetooth.characteristic.temperature).
pub const UUID_TEMPERATURE: u16 = 0x2A6E;
/// Digital characteristic UUID (org.bluetooth.characteristic.digital).
pub const UUID_DIGITAL: u16 = 0x2A56;

/// Attribute handle of the temperature characteristic (read + notify).
pub const CHAR_TEMPERATURE: CharHandle = 0x0021;
/// Attribute handle of the digital-output characteristic (write).
pub const CHAR_DIGITAL_OUT: CharHandle = 0x0031;

// ---------------------------------------------------------------------------
// ATT / GATT protocol constants
// ---------------------------------------------------------------------------

/// ATT opcode of the acknowledged Write Request.  Writes carrying this
/// opcode expect a write response; Write Commands (0x52) do not.
pub const ATT_OPCODE_WRITE_REQUEST: u8 = 0x12;

/// Status-flags value of a characteristic-status event that reports a
/// client-configuration (CCCD) update.
pub const STATUS_CLIENT_CONFIG: u8 = 0x01;

/// Digital-out payload byte: ASCII `'0'` switches the actuator off.
pub const DIGITAL_OUT_OFF: u8 = b'0';
/// Digital-out payload byte: ASCII `'1'` switches the actuator on.
pub const DIGITAL_OUT_ON: u8 = b'1';
