//! Test utilities for howler
//!
//! A scripted in-memory transport. Every call made through [`MockTransport`]
//! and its [`MockHandle`]s is appended to a shared [`EventLog`], so tests can
//! assert on exactly which USB operations happened and in what order.
//!
//! # Example
//!
//! ```
//! use howler::test_utils::{Event, MockDevice, MockTransport};
//! use howler::DeviceRegistry;
//!
//! let transport = MockTransport::new(vec![MockDevice::howler(1)]);
//! let log = transport.log();
//! let registry = DeviceRegistry::initialize_with(move || Ok(transport)).unwrap();
//! assert_eq!(registry.len(), 1);
//! assert!(log.events().contains(&Event::Open(1)));
//! ```

use crate::protocol::{DeviceIdentity, HOWLER_PRODUCT_IDS, HOWLER_VENDOR_ID};
use crate::transport::{DeviceIo, UsbTransport};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// A USB operation observed by the mock transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Open(u32),
    Close(u32),
    QueryDriver(u32),
    Detach(u32),
    Attach(u32),
    Claim(u32),
    Release(u32),
    Write(u32, u8),
    Read(u32, u8),
    EndSession,
}

/// Payload and timeout of one interrupt transfer
///
/// For a write `data` is what the caller sent; for a read it is what the mock
/// delivered into the caller's `buffer_len`-byte buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub endpoint: u8,
    pub data: Vec<u8>,
    pub buffer_len: usize,
    pub timeout: Duration,
}

impl Transfer {
    /// Bit 7 of the address marks an IN endpoint
    pub fn is_write(&self) -> bool {
        self.endpoint & 0x80 == 0
    }
}

#[derive(Debug, Default)]
struct Record {
    events: Vec<Event>,
    transfers: Vec<Transfer>,
}

/// Shared, append-only record of USB operations
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Record>>);

impl EventLog {
    fn lock(&self) -> MutexGuard<'_, Record> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, event: Event) {
        self.lock().events.push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    pub fn clear(&self) {
        let mut record = self.lock();
        record.events.clear();
        record.transfers.clear();
    }

    /// Number of recorded events equal to `event`
    pub fn count(&self, event: &Event) -> usize {
        self.lock().events.iter().filter(|e| *e == event).count()
    }

    /// Endpoints read from, in order
    pub fn reads(&self) -> Vec<u8> {
        self.lock()
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Read(_, ep) => Some(*ep),
                _ => None,
            })
            .collect()
    }

    fn push_transfer(&self, transfer: Transfer) {
        self.lock().transfers.push(transfer);
    }

    /// Every interrupt transfer, writes and reads, in order
    pub fn transfers(&self) -> Vec<Transfer> {
        self.lock().transfers.clone()
    }

    /// Bytes handed to each write, in order
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.lock()
            .transfers
            .iter()
            .filter(|t| t.is_write())
            .map(|t| t.data.clone())
            .collect()
    }
}

/// Scripted behaviour of one simulated device
#[derive(Debug, Clone)]
pub struct MockDevice {
    pub id: u32,
    pub identity: DeviceIdentity,
    pub kernel_driver: bool,
    pub descriptor_error: Option<rusb::Error>,
    pub open_error: Option<rusb::Error>,
    pub query_error: Option<rusb::Error>,
    pub detach_error: Option<rusb::Error>,
    pub attach_error: Option<rusb::Error>,
    pub claim_error: Option<rusb::Error>,
    pub release_error: Option<rusb::Error>,
    pub write_error: Option<rusb::Error>,
    pub read_errors: Vec<(u8, rusb::Error)>,
    pub responses: Vec<(u8, Vec<u8>)>,
}

impl MockDevice {
    pub fn new(id: u32, vendor_id: u16, product_id: u16) -> Self {
        Self {
            id,
            identity: DeviceIdentity::new(vendor_id, product_id),
            kernel_driver: false,
            descriptor_error: None,
            open_error: None,
            query_error: None,
            detach_error: None,
            attach_error: None,
            claim_error: None,
            release_error: None,
            write_error: None,
            read_errors: Vec::new(),
            responses: Vec::new(),
        }
    }

    /// A family member that opens and answers on every endpoint
    pub fn howler(id: u32) -> Self {
        Self::new(id, HOWLER_VENDOR_ID, HOWLER_PRODUCT_IDS[0])
    }

    pub fn with_kernel_driver(mut self) -> Self {
        self.kernel_driver = true;
        self
    }

    /// Bytes returned by a read on `endpoint`
    ///
    /// Without one, a read fills the whole buffer with the endpoint address.
    pub fn with_response(mut self, endpoint: u8, data: Vec<u8>) -> Self {
        self.responses.push((endpoint, data));
        self
    }

    pub fn fail_descriptor(mut self, err: rusb::Error) -> Self {
        self.descriptor_error = Some(err);
        self
    }

    pub fn fail_open(mut self, err: rusb::Error) -> Self {
        self.open_error = Some(err);
        self
    }

    pub fn fail_query(mut self, err: rusb::Error) -> Self {
        self.query_error = Some(err);
        self
    }

    pub fn fail_detach(mut self, err: rusb::Error) -> Self {
        self.detach_error = Some(err);
        self
    }

    pub fn fail_attach(mut self, err: rusb::Error) -> Self {
        self.attach_error = Some(err);
        self
    }

    pub fn fail_claim(mut self, err: rusb::Error) -> Self {
        self.claim_error = Some(err);
        self
    }

    pub fn fail_release(mut self, err: rusb::Error) -> Self {
        self.release_error = Some(err);
        self
    }

    pub fn fail_write(mut self, err: rusb::Error) -> Self {
        self.write_error = Some(err);
        self
    }

    pub fn fail_read(mut self, endpoint: u8, err: rusb::Error) -> Self {
        self.read_errors.push((endpoint, err));
        self
    }
}

/// In-memory USB session
///
/// Records [`Event::EndSession`] when dropped.
#[derive(Debug)]
pub struct MockTransport {
    devices: Vec<MockDevice>,
    list_error: Option<rusb::Error>,
    log: EventLog,
}

impl MockTransport {
    pub fn new(devices: Vec<MockDevice>) -> Self {
        Self {
            devices,
            list_error: None,
            log: EventLog::default(),
        }
    }

    /// A session whose device listing fails
    pub fn failing_list(err: rusb::Error) -> Self {
        Self {
            devices: Vec::new(),
            list_error: Some(err),
            log: EventLog::default(),
        }
    }

    /// Handle to the shared event log
    pub fn log(&self) -> EventLog {
        self.log.clone()
    }
}

impl Drop for MockTransport {
    fn drop(&mut self) {
        self.log.push(Event::EndSession);
    }
}

impl UsbTransport for MockTransport {
    type Device = MockDevice;
    type Handle = MockHandle;

    fn list_devices(&self) -> rusb::Result<Vec<MockDevice>> {
        match self.list_error {
            Some(e) => Err(e),
            None => Ok(self.devices.clone()),
        }
    }

    fn identity(&self, device: &MockDevice) -> rusb::Result<DeviceIdentity> {
        match device.descriptor_error {
            Some(e) => Err(e),
            None => Ok(device.identity),
        }
    }

    fn open(&self, device: &MockDevice) -> rusb::Result<MockHandle> {
        if let Some(e) = device.open_error {
            return Err(e);
        }
        self.log.push(Event::Open(device.id));
        Ok(MockHandle {
            driver_attached: device.kernel_driver,
            device: device.clone(),
            log: self.log.clone(),
        })
    }

    fn location(&self, device: &MockDevice) -> Option<(u8, u8)> {
        Some((1, device.id as u8))
    }
}

/// Open handle to a [`MockDevice`]
///
/// Records [`Event::Close`] when dropped.
#[derive(Debug)]
pub struct MockHandle {
    device: MockDevice,
    driver_attached: bool,
    log: EventLog,
}

impl MockHandle {
    pub fn id(&self) -> u32 {
        self.device.id
    }

    fn result(&self, scripted: Option<rusb::Error>) -> rusb::Result<()> {
        match scripted {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.log.push(Event::Close(self.device.id));
    }
}

impl DeviceIo for MockHandle {
    fn kernel_driver_active(&self, _interface: u8) -> rusb::Result<bool> {
        self.log.push(Event::QueryDriver(self.device.id));
        self.result(self.device.query_error)?;
        Ok(self.driver_attached)
    }

    fn detach_kernel_driver(&mut self, _interface: u8) -> rusb::Result<()> {
        self.log.push(Event::Detach(self.device.id));
        self.result(self.device.detach_error)?;
        self.driver_attached = false;
        Ok(())
    }

    fn attach_kernel_driver(&mut self, _interface: u8) -> rusb::Result<()> {
        self.log.push(Event::Attach(self.device.id));
        self.result(self.device.attach_error)?;
        self.driver_attached = true;
        Ok(())
    }

    fn claim_interface(&mut self, _interface: u8) -> rusb::Result<()> {
        self.log.push(Event::Claim(self.device.id));
        self.result(self.device.claim_error)
    }

    fn release_interface(&mut self, _interface: u8) -> rusb::Result<()> {
        self.log.push(Event::Release(self.device.id));
        self.result(self.device.release_error)
    }

    fn write_interrupt(&self, endpoint: u8, buf: &[u8], timeout: Duration) -> rusb::Result<usize> {
        self.log.push(Event::Write(self.device.id, endpoint));
        self.log.push_transfer(Transfer {
            endpoint,
            data: buf.to_vec(),
            buffer_len: buf.len(),
            timeout,
        });
        self.result(self.device.write_error)?;
        Ok(buf.len())
    }

    fn read_interrupt(
        &self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        self.log.push(Event::Read(self.device.id, endpoint));

        let delivered = match self.device.read_errors.iter().find(|(ep, _)| *ep == endpoint) {
            Some((_, e)) => Err(*e),
            None => match self.device.responses.iter().find(|(ep, _)| *ep == endpoint) {
                Some((_, data)) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    Ok(len)
                }
                None => {
                    buf.fill(endpoint);
                    Ok(buf.len())
                }
            },
        };

        self.log.push_transfer(Transfer {
            endpoint,
            data: delivered.map(|len| buf[..len].to_vec()).unwrap_or_default(),
            buffer_len: buf.len(),
            timeout,
        });
        delivered
    }
}
