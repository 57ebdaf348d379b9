//! Command channel
//!
//! One synchronous command/response exchange with a Howler board:
//!
//! 1. take interface 0 from the kernel driver if one is bound
//! 2. claim the interface
//! 3. write the 24-byte command to endpoint 0x02
//! 4. if a response is wanted, read 24 bytes from the first IN endpoint that
//!    completes a transfer (0x81, then 0x83, then 0x86)
//! 5. release the interface and hand it back to the kernel driver
//!
//! Step 5 is carried by two guards. `InterfaceClaim` releases on drop and
//! `KernelDriverGuard` reattaches on drop, and the claim is created inside
//! the driver guard so it is always undone first.

use crate::error::{Error, Result};
use crate::protocol::{INTERFACE, Packet, READ_ENDPOINTS, TRANSFER_LEN, WRITE_ENDPOINT};
use crate::transport::DeviceIo;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tracing::{debug, warn};

/// A single command/response exchange bound to one device handle
pub struct CommandExchange<'a, H: DeviceIo> {
    handle: &'a mut H,
    command: &'a Packet,
    output: Option<&'a mut Packet>,
    timeout: Duration,
}

impl<'a, H: DeviceIo> CommandExchange<'a, H> {
    pub fn new(
        handle: &'a mut H,
        command: &'a Packet,
        output: Option<&'a mut Packet>,
        timeout: Duration,
    ) -> Self {
        Self {
            handle,
            command,
            output,
            timeout,
        }
    }

    /// Run the exchange
    ///
    /// Errors are tagged with the step that failed. Cleanup failures are
    /// logged and never replace the primary result.
    pub fn run(self) -> Result<()> {
        let Self {
            handle,
            command,
            output,
            timeout,
        } = self;

        let mut driver = KernelDriverGuard::acquire(handle, INTERFACE)?;
        let claim = InterfaceClaim::acquire(&mut *driver, INTERFACE)?;

        claim
            .write_interrupt(WRITE_ENDPOINT, command, timeout)
            .map_err(Error::Write)?;
        debug!("Wrote command to endpoint {:#04x}", WRITE_ENDPOINT);

        match output {
            Some(buf) => read_response(&*claim, buf, timeout),
            None => Ok(()),
        }
    }
}

/// Read a response, falling back across the candidate IN endpoints
///
/// A transfer that completes with fewer than [`TRANSFER_LEN`] bytes still
/// counts as the response; the tail of `output` is left as it was.
fn read_response<H: DeviceIo>(handle: &H, output: &mut Packet, timeout: Duration) -> Result<()> {
    let mut last_error = rusb::Error::Other;

    let hit = READ_ENDPOINTS.iter().copied().find_map(|endpoint| {
        match handle.read_interrupt(endpoint, &mut output[..], timeout) {
            Ok(len) => Some((endpoint, len)),
            Err(e) => {
                debug!("Read on endpoint {:#04x} failed: {}", endpoint, e);
                last_error = e;
                None
            }
        }
    });

    match hit {
        Some((endpoint, len)) => {
            if len < TRANSFER_LEN {
                debug!(
                    "Short response on endpoint {:#04x}: {} of {} bytes",
                    endpoint, len, TRANSFER_LEN
                );
            } else {
                debug!("Read response from endpoint {:#04x}", endpoint);
            }
            Ok(())
        }
        None => Err(Error::Read(last_error)),
    }
}

/// Keeps the kernel driver detached while alive
///
/// Reattaches on drop, but only if this guard did the detaching.
struct KernelDriverGuard<'a, H: DeviceIo> {
    handle: &'a mut H,
    interface: u8,
    detached: bool,
}

impl<'a, H: DeviceIo> KernelDriverGuard<'a, H> {
    fn acquire(handle: &'a mut H, interface: u8) -> Result<Self> {
        let active = handle
            .kernel_driver_active(interface)
            .map_err(Error::Query)?;

        if active {
            handle
                .detach_kernel_driver(interface)
                .map_err(Error::Detach)?;
            debug!("Detached kernel driver from interface {}", interface);
        }

        Ok(Self {
            handle,
            interface,
            detached: active,
        })
    }
}

impl<H: DeviceIo> Deref for KernelDriverGuard<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        &*self.handle
    }
}

impl<H: DeviceIo> DerefMut for KernelDriverGuard<'_, H> {
    fn deref_mut(&mut self) -> &mut H {
        &mut *self.handle
    }
}

impl<H: DeviceIo> Drop for KernelDriverGuard<'_, H> {
    fn drop(&mut self) {
        if !self.detached {
            return;
        }
        match self.handle.attach_kernel_driver(self.interface) {
            Ok(()) => debug!("Reattached kernel driver to interface {}", self.interface),
            Err(e) => warn!("{} (interface {})", Error::Reattach(e), self.interface),
        }
    }
}

/// A claimed interface, released on drop
struct InterfaceClaim<'a, H: DeviceIo> {
    handle: &'a mut H,
    interface: u8,
}

impl<'a, H: DeviceIo> InterfaceClaim<'a, H> {
    fn acquire(handle: &'a mut H, interface: u8) -> Result<Self> {
        handle.claim_interface(interface).map_err(Error::Claim)?;
        debug!("Claimed interface {}", interface);
        Ok(Self { handle, interface })
    }
}

impl<H: DeviceIo> Deref for InterfaceClaim<'_, H> {
    type Target = H;

    fn deref(&self) -> &H {
        &*self.handle
    }
}

impl<H: DeviceIo> Drop for InterfaceClaim<'_, H> {
    fn drop(&mut self) {
        match self.handle.release_interface(self.interface) {
            Ok(()) => debug!("Released interface {}", self.interface),
            Err(e) => warn!("{} (interface {})", Error::Release(e), self.interface),
        }
    }
}
