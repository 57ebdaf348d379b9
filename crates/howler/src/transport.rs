//! USB transport capability
//!
//! The registry and the command channel only need a handful of libusb calls.
//! They are collected here as two traits so the real stack (`rusb`) and the
//! test doubles in `test_utils` can be swapped freely.
//!
//! Resource release is tied to `Drop`: dropping the transport ends the USB
//! session, dropping a device list frees it and dropping a handle closes it.

use crate::protocol::DeviceIdentity;
use rusb::{Context, Device, DeviceHandle, UsbContext};
use std::time::Duration;

/// A USB session able to list and open devices
pub trait UsbTransport {
    /// Raw device reference, owned by the transport's device list
    type Device;
    /// Open device handle, closed when dropped
    type Handle: DeviceIo;

    /// Snapshot of every device currently attached
    fn list_devices(&self) -> rusb::Result<Vec<Self::Device>>;

    /// Read the vendor/product pair from the device descriptor
    fn identity(&self, device: &Self::Device) -> rusb::Result<DeviceIdentity>;

    /// Open a device. Fails with `rusb::Error::Access` on permission denial.
    fn open(&self, device: &Self::Device) -> rusb::Result<Self::Handle>;

    /// Bus location for display, when the transport knows it
    fn location(&self, _device: &Self::Device) -> Option<(u8, u8)> {
        None
    }
}

/// Operations performed on an open device handle
pub trait DeviceIo {
    fn kernel_driver_active(&self, interface: u8) -> rusb::Result<bool>;

    fn detach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()>;

    fn attach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()>;

    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()>;

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()>;

    fn write_interrupt(&self, endpoint: u8, buf: &[u8], timeout: Duration) -> rusb::Result<usize>;

    fn read_interrupt(
        &self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;
}

impl UsbTransport for Context {
    type Device = Device<Context>;
    type Handle = DeviceHandle<Context>;

    fn list_devices(&self) -> rusb::Result<Vec<Self::Device>> {
        // The rusb list is released when it goes out of scope; the devices
        // themselves stay alive through their own reference counts.
        let devices = self.devices()?;
        Ok(devices.iter().collect())
    }

    fn identity(&self, device: &Self::Device) -> rusb::Result<DeviceIdentity> {
        let desc = device.device_descriptor()?;
        Ok(DeviceIdentity::new(desc.vendor_id(), desc.product_id()))
    }

    fn open(&self, device: &Self::Device) -> rusb::Result<Self::Handle> {
        device.open()
    }

    fn location(&self, device: &Self::Device) -> Option<(u8, u8)> {
        Some((device.bus_number(), device.address()))
    }
}

impl<T: UsbContext> DeviceIo for DeviceHandle<T> {
    fn kernel_driver_active(&self, interface: u8) -> rusb::Result<bool> {
        DeviceHandle::kernel_driver_active(self, interface)
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::detach_kernel_driver(self, interface)
    }

    fn attach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::attach_kernel_driver(self, interface)
    }

    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::claim_interface(self, interface)
    }

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::release_interface(self, interface)
    }

    fn write_interrupt(&self, endpoint: u8, buf: &[u8], timeout: Duration) -> rusb::Result<usize> {
        DeviceHandle::write_interrupt(self, endpoint, buf, timeout)
    }

    fn read_interrupt(
        &self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        DeviceHandle::read_interrupt(self, endpoint, buf, timeout)
    }
}
