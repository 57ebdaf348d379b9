//! Howler error types

use thiserror::Error;

/// Step of device setup or of an exchange that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    TransportInit,
    Enumeration,
    Open,
    Query,
    Detach,
    Claim,
    Write,
    Read,
    Release,
    Reattach,
}

/// Errors raised by the registry and the command channel
///
/// Every variant keeps the native transport status so callers can still see
/// what libusb reported.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to start USB session: {0}")]
    TransportInit(#[source] rusb::Error),

    #[error("Failed to enumerate USB devices: {0}")]
    DeviceEnumeration(#[source] rusb::Error),

    #[error("Failed to open Howler device: {0}")]
    Open(#[source] rusb::Error),

    #[error("Failed to query kernel driver state: {0}")]
    Query(#[source] rusb::Error),

    #[error("Failed to detach kernel driver: {0}")]
    Detach(#[source] rusb::Error),

    #[error("Failed to claim interface: {0}")]
    Claim(#[source] rusb::Error),

    #[error("Failed to write command: {0}")]
    Write(#[source] rusb::Error),

    #[error("Failed to read response: {0}")]
    Read(#[source] rusb::Error),

    #[error("Failed to release interface: {0}")]
    Release(#[source] rusb::Error),

    #[error("Failed to reattach kernel driver: {0}")]
    Reattach(#[source] rusb::Error),
}

impl Error {
    /// The step that failed
    pub fn stage(&self) -> Stage {
        match self {
            Error::TransportInit(_) => Stage::TransportInit,
            Error::DeviceEnumeration(_) => Stage::Enumeration,
            Error::Open(_) => Stage::Open,
            Error::Query(_) => Stage::Query,
            Error::Detach(_) => Stage::Detach,
            Error::Claim(_) => Stage::Claim,
            Error::Write(_) => Stage::Write,
            Error::Read(_) => Stage::Read,
            Error::Release(_) => Stage::Release,
            Error::Reattach(_) => Stage::Reattach,
        }
    }

    /// The status reported by the transport
    pub fn transport_code(&self) -> rusb::Error {
        match *self {
            Error::TransportInit(e)
            | Error::DeviceEnumeration(e)
            | Error::Open(e)
            | Error::Query(e)
            | Error::Detach(e)
            | Error::Claim(e)
            | Error::Write(e)
            | Error::Read(e)
            | Error::Release(e)
            | Error::Reattach(e) => e,
        }
    }
}

/// Type alias for Howler results
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_and_code() {
        let err = Error::Read(rusb::Error::Timeout);
        assert_eq!(err.stage(), Stage::Read);
        assert_eq!(err.transport_code(), rusb::Error::Timeout);
    }

    #[test]
    fn test_error_display() {
        let err = Error::Claim(rusb::Error::Busy);
        let msg = format!("{}", err);
        assert!(msg.contains("claim interface"));
    }
}
