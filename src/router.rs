//! GATT callback router (C10), embedded-only.
//!
//! Reduces the platform's `Service::on_write` events for [`HidService`]
//! into calls against [`Facade`], mirroring the router closure the donor
//! firmware builds inline around `gatt_server::run` (see
//! `ble::multi_conn` and the pack's rumcake reference for the
//! `match event { ServerEvent::... }` shape this generalizes).

use defmt::{debug, info, warn};
use nrf_softdevice::ble::gatt_server::{self, NotifyValueError};
use nrf_softdevice::ble::Connection;

use crate::facade::Facade;
use crate::gatt::{HidService, HidServiceEvent};
use crate::handlers::ProtocolMode;
use crate::hid::{consumer, keyboard, mouse};
use crate::subscription::{CharId, DeviceId};

/// Derive a stable per-peer key from the connection's BLE address. Two
/// connections to the same peer address collapse to the same `DeviceId`,
/// which is what the subscription table and bond lookups need.
pub fn device_id(connection: &Connection) -> DeviceId {
    let addr = connection.peer_address().bytes;
    u64::from_le_bytes([
        addr[0], addr[1], addr[2], addr[3], addr[4], addr[5], 0, 0,
    ])
}

fn char_id_for(service: &HidService, handle: u16) -> Option<CharId> {
    if handle == service.mouse.value || handle == service.mouse.cccd {
        Some(CharId::MouseReport)
    } else if handle == service.keyboard.value || handle == service.keyboard.cccd {
        Some(CharId::KeyboardReport)
    } else if handle == service.consumer.value || handle == service.consumer.cccd {
        Some(CharId::ConsumerReport)
    } else if handle == service.boot_mouse_input.value || handle == service.boot_mouse_input.cccd {
        Some(CharId::BootMouseInput)
    } else {
        None
    }
}

/// Handle one `HidServiceEvent`, applying it to `facade` and, for a fresh
/// CCCD subscription, notifying the zero report immediately (§4.5).
pub fn handle_event(
    facade: &mut Facade,
    service: &HidService,
    connection: &Connection,
    event: HidServiceEvent,
) {
    match event {
        HidServiceEvent::CccdWrite { handle, value } => {
            let Some(char_id) = char_id_for(service, handle) else {
                warn!("CCCD write on unrecognized handle");
                return;
            };
            match facade.write_cccd(char_id, &value) {
                Some(true) => {
                    debug!("fresh subscription, sending zero report");
                    send_zero_report(service, connection, char_id);
                }
                Some(false) => {}
                None => warn!("malformed CCCD write ignored"),
            }
        }
        HidServiceEvent::ProtocolModeWrite(value) => {
            if let Some(mode) = ProtocolMode::from_byte(value) {
                info!("protocol mode changed");
                facade.set_protocol_mode(mode);
                let _ = gatt_server::set_value(
                    unsafe { nrf_softdevice::Softdevice::steal() },
                    service.protocol_mode_handle(),
                    &[mode.as_byte()],
                );
            } else {
                warn!("protocol mode write with invalid value, ignoring");
            }
        }
        HidServiceEvent::ReportWrite { .. } => {
            info!("output report received, no output reports are supported");
        }
        HidServiceEvent::HidControlPointWrite(value) => {
            debug!("HID control point write received: {=u8}", value);
        }
    }
}

fn send_zero_report(service: &HidService, connection: &Connection, char_id: CharId) {
    let (handle, bytes): (u16, &[u8]) = match char_id {
        CharId::MouseReport => (service.mouse.value, &[0, 0, 0, 0]),
        CharId::KeyboardReport => (service.keyboard.value, &[0; keyboard::KEYBOARD_REPORT_SIZE]),
        CharId::ConsumerReport => (service.consumer.value, &[0; consumer::CONSUMER_REPORT_SIZE]),
        CharId::BootMouseInput => (service.boot_mouse_input.value, &[0, 0, 0]),
    };
    if let Err(e) = gatt_server::notify_value(connection, handle, bytes) {
        warn!("zero report notify failed: {:?}", defmt::Debug2Format(&e));
    }
}

/// Notify a report with the §4.4 bounded retry: up to
/// `NOTIFY_RETRY_COUNT` additional attempts, `NOTIFY_RETRY_BACKOFF_MS`
/// apart. Lives here (not in `Facade`) because it is the one piece of the
/// report path that genuinely needs the SoftDevice connection handle and
/// an async delay.
pub async fn notify_with_retry(
    connection: &Connection,
    handle: u16,
    bytes: &[u8],
) -> Result<(), crate::error::Error> {
    use embassy_time::{Duration, Timer};

    let mut attempts_left = crate::config::NOTIFY_RETRY_COUNT;
    loop {
        match gatt_server::notify_value(connection, handle, bytes) {
            Ok(()) => return Ok(()),
            Err(NotifyValueError::Disconnected) => return Err(crate::error::Error::NotConnected),
            Err(e) => {
                if attempts_left == 0 {
                    warn!("notify failed permanently: {:?}", defmt::Debug2Format(&e));
                    return Err(crate::error::Error::NotifyFailed);
                }
                attempts_left -= 1;
                Timer::after(Duration::from_millis(crate::config::NOTIFY_RETRY_BACKOFF_MS)).await;
            }
        }
    }
}

pub fn value_handle_for(service: &HidService, report_id: u8) -> Option<u16> {
    match report_id {
        id if id == mouse::REPORT_ID => Some(service.mouse.value),
        id if id == keyboard::REPORT_ID => Some(service.keyboard.value),
        id if id == consumer::REPORT_ID => Some(service.consumer.value),
        _ => None,
    }
}
