//! Howler protocol constants and device identity

use std::time::Duration;

/// USB vendor ID shared by every Howler board
pub const HOWLER_VENDOR_ID: u16 = 0x03eb;

/// Product IDs recognized as members of the Howler family
pub const HOWLER_PRODUCT_IDS: [u16; 4] = [0x6800, 0x6801, 0x6802, 0x6803];

/// Interface used for all command traffic
pub const INTERFACE: u8 = 0;

/// OUT endpoint commands are written to
pub const WRITE_ENDPOINT: u8 = 0x02;

/// IN endpoints a response may arrive on, in the order they are tried
///
/// Firmware revisions disagree on where the response shows up, so the first
/// endpoint that completes a transfer wins.
pub const READ_ENDPOINTS: [u8; 3] = [0x81, 0x83, 0x86];

/// Length of every command and response buffer
pub const TRANSFER_LEN: usize = 24;

/// Number of state slots kept per connected board
pub const STATE_SLOTS: usize = 6;

/// Transfer timeout meaning "block until the transfer completes"
pub const NO_TIMEOUT: Duration = Duration::ZERO;

/// A fixed-size command or response buffer
pub type Packet = [u8; TRANSFER_LEN];

/// Vendor/product pair read from a device descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceIdentity {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    /// Whether this identity belongs to the Howler family
    pub fn is_howler(&self) -> bool {
        self.vendor_id == HOWLER_VENDOR_ID && HOWLER_PRODUCT_IDS.contains(&self.product_id)
    }
}

impl std::fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}
