//! Hardware drivers: sample timer, RHT sensor, digital output.
//!
//! Every driver is dual-target: real peripheral access on ESP-IDF, an
//! in-memory simulation with injection helpers on host targets.

pub mod digital_out;
pub mod rht;
pub mod sample_timer;
