//! Connected Howler board
//!
//! A [`ConnectedDevice`] pairs the raw transport device with the handle the
//! registry opened for it. The handle is owned exclusively and closes when the
//! device is dropped.

use crate::channel::CommandExchange;
use crate::error::Result;
use crate::protocol::{DeviceIdentity, NO_TIMEOUT, Packet, STATE_SLOTS};
use crate::transport::UsbTransport;
use std::time::Duration;

/// Length of one opaque state slot
pub const SLOT_LEN: usize = 16;

/// Opaque per-board state reserved for higher layers
///
/// Nothing in this crate reads or writes the contents.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StateSlot(pub [u8; SLOT_LEN]);

pub type StateBank = [StateSlot; STATE_SLOTS];

/// An opened Howler board
pub struct ConnectedDevice<T: UsbTransport> {
    /// Raw device reference; its lifetime belongs to the transport
    device: T::Device,
    /// Open handle, closed on drop
    handle: T::Handle,
    identity: DeviceIdentity,
    /// Bus number and address, if the transport reports them
    location: Option<(u8, u8)>,
    state: StateBank,
    timeout: Duration,
}

impl<T: UsbTransport> ConnectedDevice<T> {
    pub(crate) fn new(
        device: T::Device,
        handle: T::Handle,
        identity: DeviceIdentity,
        location: Option<(u8, u8)>,
    ) -> Self {
        Self {
            device,
            handle,
            identity,
            location,
            state: [StateSlot::default(); STATE_SLOTS],
            timeout: NO_TIMEOUT,
        }
    }

    /// Raw transport device
    pub fn device(&self) -> &T::Device {
        &self.device
    }

    /// Vendor/product pair the device was matched on
    pub fn identity(&self) -> DeviceIdentity {
        self.identity
    }

    /// Bus number and device address
    pub fn location(&self) -> Option<(u8, u8)> {
        self.location
    }

    pub fn state(&self) -> &StateBank {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut StateBank {
        &mut self.state
    }

    /// Timeout applied to every transfer, `Duration::ZERO` blocks forever
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Send a command and optionally read the response into `output`
    ///
    /// The interface is claimed (and taken from the kernel driver if needed)
    /// only for the duration of the call. On return the device is always back
    /// in its previous state and may be used again, whatever the outcome.
    pub fn exchange(&mut self, command: &Packet, output: Option<&mut Packet>) -> Result<()> {
        CommandExchange::new(&mut self.handle, command, output, self.timeout).run()
    }

    #[cfg(test)]
    pub(crate) fn handle(&self) -> &T::Handle {
        &self.handle
    }
}

impl<T: UsbTransport> std::fmt::Debug for ConnectedDevice<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectedDevice")
            .field("identity", &self.identity)
            .field("location", &self.location)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
