//! Integration tests for the command channel
//!
//! Tests ConnectedDevice::exchange including:
//! - Kernel driver detach/reattach bracketing
//! - Read endpoint fallback order
//! - Cleanup on every failure path
//! - Reuse of a device after a failed exchange
//! - Payload and timeout of every transfer

use howler::protocol::{NO_TIMEOUT, READ_ENDPOINTS, TRANSFER_LEN, WRITE_ENDPOINT};
use howler::test_utils::{Event, EventLog, MockDevice, MockTransport};
use howler::{ConnectedDevice, DeviceRegistry, Error, Stage};
use std::time::Duration;

const COMMAND: [u8; TRANSFER_LEN] = [0x05; TRANSFER_LEN];

/// Registry holding a single device, with the open events cleared from the log
fn single(device: MockDevice) -> (DeviceRegistry<MockTransport>, EventLog) {
    let transport = MockTransport::new(vec![device]);
    let log = transport.log();
    let registry = DeviceRegistry::initialize_with(move || Ok(transport)).unwrap();
    assert_eq!(registry.len(), 1);
    log.clear();
    (registry, log)
}

fn device(registry: &mut DeviceRegistry<MockTransport>) -> &mut ConnectedDevice<MockTransport> {
    registry.get_mut(0).unwrap()
}

mod success {
    use super::*;

    #[test]
    fn test_write_only_never_reads() {
        let (mut registry, log) = single(MockDevice::howler(1));

        device(&mut registry).exchange(&COMMAND, None).unwrap();

        assert_eq!(
            log.events(),
            vec![
                Event::QueryDriver(1),
                Event::Claim(1),
                Event::Write(1, WRITE_ENDPOINT),
                Event::Release(1),
            ]
        );
    }

    #[test]
    fn test_write_only_with_kernel_driver_reattaches() {
        let (mut registry, log) = single(MockDevice::howler(1).with_kernel_driver());

        device(&mut registry).exchange(&COMMAND, None).unwrap();

        assert_eq!(
            log.events(),
            vec![
                Event::QueryDriver(1),
                Event::Detach(1),
                Event::Claim(1),
                Event::Write(1, WRITE_ENDPOINT),
                Event::Release(1),
                Event::Attach(1),
            ]
        );
    }

    #[test]
    fn test_response_from_first_endpoint() {
        let (mut registry, log) = single(MockDevice::howler(1));
        let mut out = [0u8; TRANSFER_LEN];

        device(&mut registry)
            .exchange(&COMMAND, Some(&mut out))
            .unwrap();

        assert_eq!(log.reads(), vec![0x81]);
        assert_eq!(out, [0x81; TRANSFER_LEN]);
    }

    #[test]
    fn test_fallback_to_second_endpoint_skips_third() {
        let (mut registry, log) = single(MockDevice::howler(1).fail_read(0x81, rusb::Error::Io));
        let mut out = [0u8; TRANSFER_LEN];

        device(&mut registry)
            .exchange(&COMMAND, Some(&mut out))
            .unwrap();

        assert_eq!(log.reads(), vec![0x81, 0x83]);
        assert_eq!(out, [0x83; TRANSFER_LEN]);
        assert_eq!(log.count(&Event::Release(1)), 1);
    }

    #[test]
    fn test_fallback_to_last_endpoint() {
        let (mut registry, log) = single(
            MockDevice::howler(1)
                .fail_read(0x81, rusb::Error::Timeout)
                .fail_read(0x83, rusb::Error::Pipe),
        );
        let mut out = [0u8; TRANSFER_LEN];

        device(&mut registry)
            .exchange(&COMMAND, Some(&mut out))
            .unwrap();

        assert_eq!(log.reads(), READ_ENDPOINTS.to_vec());
        assert_eq!(out, [0x86; TRANSFER_LEN]);
    }

    #[test]
    fn test_short_response_is_accepted() {
        let (mut registry, log) =
            single(MockDevice::howler(1).with_response(0x81, vec![1, 2, 3, 4]));
        let mut out = [0u8; TRANSFER_LEN];

        device(&mut registry)
            .exchange(&COMMAND, Some(&mut out))
            .unwrap();

        assert_eq!(log.reads(), vec![0x81]);
        assert_eq!(&out[..4], &[1, 2, 3, 4]);
        assert!(out[4..].iter().all(|b| *b == 0));
    }
}

mod read_failures {
    use super::*;

    #[test]
    fn test_all_endpoints_fail_returns_last_status() {
        let (mut registry, log) = single(
            MockDevice::howler(1)
                .with_kernel_driver()
                .fail_read(0x81, rusb::Error::Io)
                .fail_read(0x83, rusb::Error::Pipe)
                .fail_read(0x86, rusb::Error::Timeout),
        );
        let mut out = [0u8; TRANSFER_LEN];

        let err = device(&mut registry)
            .exchange(&COMMAND, Some(&mut out))
            .unwrap_err();

        assert!(matches!(err, Error::Read(rusb::Error::Timeout)));
        assert_eq!(err.stage(), Stage::Read);
        assert_eq!(log.reads(), READ_ENDPOINTS.to_vec());
        let tail: Vec<Event> = log.events().into_iter().rev().take(2).collect();
        assert_eq!(tail, vec![Event::Attach(1), Event::Release(1)]);
    }

    #[test]
    fn test_device_reusable_after_failed_read() {
        let (mut registry, log) = single(
            MockDevice::howler(1)
                .fail_read(0x81, rusb::Error::Io)
                .fail_read(0x83, rusb::Error::Io)
                .fail_read(0x86, rusb::Error::Io),
        );
        let mut out = [0u8; TRANSFER_LEN];

        assert!(device(&mut registry).exchange(&COMMAND, Some(&mut out)).is_err());
        device(&mut registry).exchange(&COMMAND, None).unwrap();

        assert_eq!(log.count(&Event::Claim(1)), 2);
        assert_eq!(log.count(&Event::Release(1)), 2);
        assert_eq!(log.count(&Event::Close(1)), 0);
    }
}

mod setup_failures {
    use super::*;

    #[test]
    fn test_query_failure_touches_nothing() {
        let (mut registry, log) = single(MockDevice::howler(1).fail_query(rusb::Error::NotSupported));

        let err = device(&mut registry).exchange(&COMMAND, None).unwrap_err();

        assert!(matches!(err, Error::Query(rusb::Error::NotSupported)));
        assert_eq!(log.events(), vec![Event::QueryDriver(1)]);
    }

    #[test]
    fn test_detach_failure_skips_claim_and_reattach() {
        let (mut registry, log) = single(
            MockDevice::howler(1)
                .with_kernel_driver()
                .fail_detach(rusb::Error::Busy),
        );

        let err = device(&mut registry).exchange(&COMMAND, None).unwrap_err();

        assert_eq!(err.stage(), Stage::Detach);
        assert_eq!(log.events(), vec![Event::QueryDriver(1), Event::Detach(1)]);
    }

    #[test]
    fn test_claim_failure_reattaches_detached_driver() {
        let (mut registry, log) = single(
            MockDevice::howler(1)
                .with_kernel_driver()
                .fail_claim(rusb::Error::Busy),
        );
        let mut out = [0u8; TRANSFER_LEN];

        let err = device(&mut registry)
            .exchange(&COMMAND, Some(&mut out))
            .unwrap_err();

        assert!(matches!(err, Error::Claim(rusb::Error::Busy)));
        assert_eq!(
            log.events(),
            vec![
                Event::QueryDriver(1),
                Event::Detach(1),
                Event::Claim(1),
                Event::Attach(1),
            ]
        );
    }

    #[test]
    fn test_claim_failure_without_driver_does_not_reattach() {
        let (mut registry, log) = single(MockDevice::howler(1).fail_claim(rusb::Error::Access));

        let err = device(&mut registry).exchange(&COMMAND, None).unwrap_err();

        assert_eq!(err.transport_code(), rusb::Error::Access);
        assert_eq!(log.events(), vec![Event::QueryDriver(1), Event::Claim(1)]);
    }

    #[test]
    fn test_write_failure_releases_and_reattaches() {
        let (mut registry, log) = single(
            MockDevice::howler(1)
                .with_kernel_driver()
                .fail_write(rusb::Error::NoDevice),
        );
        let mut out = [0u8; TRANSFER_LEN];

        let err = device(&mut registry)
            .exchange(&COMMAND, Some(&mut out))
            .unwrap_err();

        assert!(matches!(err, Error::Write(rusb::Error::NoDevice)));
        assert!(log.reads().is_empty());
        assert_eq!(
            log.events(),
            vec![
                Event::QueryDriver(1),
                Event::Detach(1),
                Event::Claim(1),
                Event::Write(1, WRITE_ENDPOINT),
                Event::Release(1),
                Event::Attach(1),
            ]
        );
    }
}

mod cleanup_failures {
    use super::*;

    #[test]
    fn test_release_failure_does_not_mask_success() {
        let (mut registry, log) = single(
            MockDevice::howler(1)
                .with_kernel_driver()
                .fail_release(rusb::Error::NoDevice),
        );

        device(&mut registry).exchange(&COMMAND, None).unwrap();

        assert_eq!(log.count(&Event::Attach(1)), 1);
    }

    #[test]
    fn test_reattach_failure_does_not_mask_primary_error() {
        let (mut registry, _log) = single(
            MockDevice::howler(1)
                .with_kernel_driver()
                .fail_write(rusb::Error::Pipe)
                .fail_attach(rusb::Error::NotFound),
        );

        let err = device(&mut registry).exchange(&COMMAND, None).unwrap_err();

        assert!(matches!(err, Error::Write(rusb::Error::Pipe)));
    }
}

mod transfers {
    use super::*;

    #[test]
    fn test_command_bytes_reach_the_wire_unchanged() {
        let (mut registry, log) = single(MockDevice::howler(1));
        let mut command = [0u8; TRANSFER_LEN];
        for (i, byte) in command.iter_mut().enumerate() {
            *byte = i as u8 ^ 0xa5;
        }

        device(&mut registry).exchange(&command, None).unwrap();

        let written = log.written();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].len(), TRANSFER_LEN);
        assert_eq!(written[0], command);
    }

    #[test]
    fn test_write_goes_to_write_endpoint() {
        let (mut registry, log) = single(MockDevice::howler(1));

        device(&mut registry).exchange(&COMMAND, None).unwrap();

        let transfers = log.transfers();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].endpoint, WRITE_ENDPOINT);
        assert_eq!(transfers[0].data, COMMAND);
        assert_eq!(transfers[0].buffer_len, TRANSFER_LEN);
    }

    #[test]
    fn test_reads_use_full_packet_buffer() {
        let (mut registry, log) = single(
            MockDevice::howler(1)
                .fail_read(0x81, rusb::Error::Io)
                .with_response(0x83, vec![0x42; TRANSFER_LEN]),
        );
        let mut out = [0u8; TRANSFER_LEN];

        device(&mut registry)
            .exchange(&COMMAND, Some(&mut out))
            .unwrap();

        let reads: Vec<_> = log.transfers().into_iter().filter(|t| !t.is_write()).collect();
        assert_eq!(reads.len(), 2);
        assert!(reads.iter().all(|t| t.buffer_len == TRANSFER_LEN));
        assert!(reads[0].data.is_empty());
        assert_eq!(reads[1].data, vec![0x42; TRANSFER_LEN]);
    }

    #[test]
    fn test_default_timeout_is_unbounded() {
        let (mut registry, log) = single(MockDevice::howler(1));
        let mut out = [0u8; TRANSFER_LEN];

        device(&mut registry)
            .exchange(&COMMAND, Some(&mut out))
            .unwrap();

        let transfers = log.transfers();
        assert_eq!(transfers.len(), 2);
        assert!(transfers.iter().all(|t| t.timeout == NO_TIMEOUT));
    }

    #[test]
    fn test_device_timeout_applies_to_every_transfer() {
        let timeout = Duration::from_millis(750);
        let (mut registry, log) = single(
            MockDevice::howler(1)
                .fail_read(0x81, rusb::Error::Timeout)
                .fail_read(0x83, rusb::Error::Timeout),
        );
        device(&mut registry).set_timeout(timeout);
        let mut out = [0u8; TRANSFER_LEN];

        device(&mut registry)
            .exchange(&COMMAND, Some(&mut out))
            .unwrap();

        let transfers = log.transfers();
        let endpoints: Vec<u8> = transfers.iter().map(|t| t.endpoint).collect();
        let mut expected = vec![WRITE_ENDPOINT];
        expected.extend(READ_ENDPOINTS);
        assert_eq!(endpoints, expected);
        assert!(transfers.iter().all(|t| t.timeout == timeout));
    }

    #[test]
    fn test_registry_timeout_reaches_every_device() {
        let transport = MockTransport::new(vec![MockDevice::howler(1), MockDevice::howler(2)]);
        let log = transport.log();
        let mut registry = DeviceRegistry::initialize_with(move || Ok(transport)).unwrap();
        registry.set_timeout(Duration::from_secs(2));

        for device in registry.iter_mut() {
            device.exchange(&COMMAND, None).unwrap();
        }

        let transfers = log.transfers();
        assert_eq!(transfers.len(), 2);
        assert!(transfers.iter().all(|t| t.timeout == Duration::from_secs(2)));
        assert_eq!(log.written(), vec![COMMAND.to_vec(), COMMAND.to_vec()]);
    }
}
