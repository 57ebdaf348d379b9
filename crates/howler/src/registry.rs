//! Howler device registry
//!
//! Enumerates the USB bus once, keeps the devices that belong to the Howler
//! family and opens a handle to each of them. Devices that cannot be opened
//! are logged and left out; only session start and enumeration failures are
//! fatal.

use crate::device::ConnectedDevice;
use crate::error::{Error, Result};
use crate::protocol::DeviceIdentity;
use crate::transport::UsbTransport;
use rusb::Context;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Opened Howler boards plus the USB session they belong to
///
/// Devices are kept in discovery order. Tearing the registry down (or
/// dropping it) closes every handle before the session is released.
pub struct DeviceRegistry<T: UsbTransport = Context> {
    devices: Vec<ConnectedDevice<T>>,
    /// `None` once torn down
    transport: Option<T>,
}

impl DeviceRegistry<Context> {
    /// Start a libusb session and open every attached Howler board
    pub fn initialize() -> Result<Self> {
        Self::initialize_with(Context::new)
    }
}

impl<T: UsbTransport> DeviceRegistry<T> {
    /// Start a session with `start` and open every Howler board it lists
    pub fn initialize_with<F>(start: F) -> Result<Self>
    where
        F: FnOnce() -> rusb::Result<T>,
    {
        let transport = start().map_err(Error::TransportInit)?;

        // On failure the transport is dropped here, ending the session.
        let devices = scan(&transport)?;

        if devices.is_empty() {
            info!("No Howler devices found");
        } else {
            info!("Found {} Howler device(s)", devices.len());
        }

        Ok(Self {
            devices,
            transport: Some(transport),
        })
    }

    /// Close every device handle, then end the USB session
    ///
    /// Calling this again is a no-op.
    pub fn teardown(&mut self) {
        if self.transport.is_none() {
            return;
        }

        let closed = self.devices.len();
        // Handles close on drop
        self.devices.clear();
        self.transport = None;

        debug!("Closed {} Howler device(s) and ended USB session", closed);
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn devices(&self) -> &[ConnectedDevice<T>] {
        &self.devices
    }

    pub fn get(&self, index: usize) -> Option<&ConnectedDevice<T>> {
        self.devices.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ConnectedDevice<T>> {
        self.devices.get_mut(index)
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, ConnectedDevice<T>> {
        self.devices.iter_mut()
    }

    /// Apply a transfer timeout to every connected device
    pub fn set_timeout(&mut self, timeout: Duration) {
        for device in &mut self.devices {
            device.set_timeout(timeout);
        }
    }
}

impl<T: UsbTransport> Drop for DeviceRegistry<T> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<T: UsbTransport> std::fmt::Debug for DeviceRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("devices", &self.devices)
            .field("active", &self.transport.is_some())
            .finish()
    }
}

/// Enumerate, filter and open
fn scan<T: UsbTransport>(transport: &T) -> Result<Vec<ConnectedDevice<T>>> {
    let listed = transport
        .list_devices()
        .map_err(Error::DeviceEnumeration)?;
    debug!("Enumerated {} USB device(s)", listed.len());

    // Consuming the snapshot releases it once classification is done.
    let members: Vec<(T::Device, DeviceIdentity)> = listed
        .into_iter()
        .filter_map(|device| {
            let identity = classify(transport, &device)?;
            Some((device, identity))
        })
        .collect();

    Ok(members
        .into_iter()
        .filter_map(|(device, identity)| open_member(transport, device, identity))
        .collect())
}

/// The device's identity, if it is a Howler
fn classify<T: UsbTransport>(transport: &T, device: &T::Device) -> Option<DeviceIdentity> {
    match transport.identity(device) {
        Ok(identity) if identity.is_howler() => Some(identity),
        Ok(_) => None,
        Err(e) => {
            debug!("Skipping device with unreadable descriptor: {}", e);
            None
        }
    }
}

fn open_member<T: UsbTransport>(
    transport: &T,
    device: T::Device,
    identity: DeviceIdentity,
) -> Option<ConnectedDevice<T>> {
    let location = transport.location(&device);

    match transport.open(&device) {
        Ok(handle) => {
            debug!("Opened Howler device {} at {:?}", identity, location);
            Some(ConnectedDevice::new(device, handle, identity, location))
        }
        Err(rusb::Error::Access) => {
            warn!(
                "Unable to open interface to Howler device {}: permission denied",
                identity
            );
            None
        }
        Err(e) => {
            warn!("Skipping Howler device {}: {}", identity, Error::Open(e));
            None
        }
    }
}
