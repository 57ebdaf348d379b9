//! Howler board control over USB
//!
//! This crate discovers Howler boards attached to the host and talks to them
//! with the board's fixed-size command/response protocol over interrupt
//! transfers.
//!
//! - [`DeviceRegistry`] enumerates the bus, keeps the boards that belong to the
//!   family and opens a handle to each of them.
//! - [`ConnectedDevice::exchange`] runs one command/response exchange, taking
//!   the interface away from the kernel driver for the duration of the call.
//!
//! The USB stack is reached through the [`UsbTransport`] and [`DeviceIo`]
//! traits. Both are implemented for `rusb`. The `test_utils` module, behind
//! the default `test-utils` feature, carries a scripted fake for tests.

pub mod channel;
pub mod device;
pub mod error;
pub mod protocol;
pub mod registry;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod transport;

pub use channel::CommandExchange;
pub use device::{ConnectedDevice, StateBank, StateSlot};
pub use error::{Error, Result, Stage};
pub use protocol::DeviceIdentity;
pub use registry::DeviceRegistry;
pub use transport::{DeviceIo, UsbTransport};
