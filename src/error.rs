//! Error types for the igrill-mqtt crate.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// No peripheral with the configured address was found by the adapter.
    #[error("Device not found: {address}")]
    DeviceNotFound {
        /// The address that was searched for.
        address: String,
    },

    /// Failed to establish a connection to the device.
    #[error("Connection to {address} failed: {reason}")]
    ConnectionFailed {
        /// The address of the device.
        address: String,
        /// Description of why the connection failed.
        reason: String,
    },

    /// The challenge/response handshake did not complete.
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed {
        /// Description of which handshake step failed.
        reason: String,
    },

    /// Characteristic not found on the device.
    ///
    /// Usually means the configured device type does not match the
    /// hardware at that address.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// A characteristic read failed or returned a malformed value.
    #[error("Read failed: {context}")]
    ReadFailed {
        /// Description of what was read and what went wrong.
        context: String,
    },

    /// The telemetry sink rejected or failed to accept a reading.
    #[error("Publish failed: {reason}")]
    PublishFailed {
        /// Description of why the publish was not accepted.
        reason: String,
    },

    /// The configured device type string matches no known variant.
    #[error("Unknown device type: {name}")]
    UnknownDeviceType {
        /// The type string from the configuration.
        name: String,
    },
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
