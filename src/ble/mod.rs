//! BLE communication module.
//!
//! This module provides low-level Bluetooth Low Energy functionality
//! for connecting to and reading from iGrill devices.

pub mod session;
pub mod transport;
pub mod uuids;

pub use session::{BleConnector, CharacteristicMap, DeviceSession};
pub use transport::BleTransport;
pub use uuids::*;
