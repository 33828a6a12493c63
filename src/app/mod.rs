//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the business rules for the ThermoNode peripheral:
//! event dispatch, connection/subscription bookkeeping, and the wire codec.
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`], keeping this layer fully testable without real peripherals.

pub mod codec;
pub mod ports;
pub mod service;
