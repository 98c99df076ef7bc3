//! GATT service database (C3), embedded-only.
//!
//! Builds the HID-over-GATT service tree exactly once per initialization,
//! following the `ServiceBuilder`/`Attribute`/`Metadata` shape used by the
//! donor firmware's central-role services, adapted to the peripheral-role
//! HID Service (0x1812) this engine advertises. Every readable
//! characteristic and every CCCD requires an encrypted link, matching the
//! `SecurityMode::JustWorks` convention the pack's other peripheral
//! examples use for HID-over-GATT.

use defmt::{info, warn};
use nrf_softdevice::ble::gatt_server::builder::ServiceBuilder;
use nrf_softdevice::ble::gatt_server::characteristic::{Attribute, Metadata, Properties};
use nrf_softdevice::ble::gatt_server::{RegisterError, Service};
use nrf_softdevice::ble::security::SecurityMode;
use nrf_softdevice::ble::Uuid;
use nrf_softdevice::Softdevice;

use crate::hid::map::report_map;
use crate::hid::{consumer, keyboard, mouse};

const HID_INFORMATION: &[u8] = &[0x11, 0x01, 0x00, 0x03];

/// Bluetooth Base UUID with the Report (0x2A4D) 16-bit UUID inserted,
/// big-endian byte order as it appears in a UUID string.
const REPORT_BASE_UUID: [u8; 16] = [
    0x00, 0x00, 0x2A, 0x4D, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0x80, 0x5F, 0x9B, 0x34, 0xFB,
];

/// The Report characteristic UUID, varied per report ID by adding the ID
/// to the low 64 bits of the base UUID (§4.3: mandatory disambiguation for
/// hosts that skip the Report Reference descriptor during discovery).
const fn report_uuid_bytes(report_id: u8) -> [u8; 16] {
    let base = REPORT_BASE_UUID;
    let mut low: u64 = 0;
    let mut i = 8;
    while i < 16 {
        low = (low << 8) | base[i] as u64;
        i += 1;
    }
    low += report_id as u64;

    let mut out = base;
    let mut shift = 0u32;
    let mut j = 15;
    loop {
        out[j] = ((low >> shift) & 0xFF) as u8;
        shift += 8;
        if j == 8 {
            break;
        }
        j -= 1;
    }
    out
}

fn report_uuid(report_id: u8) -> Uuid {
    Uuid::new_128(&report_uuid_bytes(report_id))
}

/// Handles for one Report characteristic (value + CCCD).
#[derive(Clone, Copy)]
pub struct ReportHandles {
    pub value: u16,
    pub cccd: u16,
}

pub struct HidService {
    hid_information_handle: u16,
    report_map_handle: u16,
    hid_control_point_handle: u16,
    pub mouse: ReportHandles,
    pub keyboard: ReportHandles,
    pub consumer: ReportHandles,
    pub boot_mouse_input: ReportHandles,
    protocol_mode_handle: u16,
}

/// Report Reference descriptor payload: `[report_id, report_type]`;
/// report_type 1 = Input.
fn report_reference(report_id: u8) -> [u8; 2] {
    [report_id, 0x01]
}

impl HidService {
    pub fn new(sd: &mut Softdevice) -> Result<Self, RegisterError> {
        let mut sb = ServiceBuilder::new(sd, Uuid::new_16(0x1812))?;

        let _hid_info = sb.add_characteristic(
            Uuid::new_16(0x2A4A),
            Attribute::new(HID_INFORMATION).read_security(SecurityMode::JustWorks),
            Metadata::new(Properties::new().read()),
        )?;
        let hid_information_handle = _hid_info.build().value_handle;

        let _report_map = sb.add_characteristic(
            Uuid::new_16(0x2A4B),
            Attribute::new(report_map()).read_security(SecurityMode::JustWorks),
            Metadata::new(Properties::new().read()),
        )?;
        let report_map_handle = _report_map.build().value_handle;

        let _hid_control_point = sb.add_characteristic(
            Uuid::new_16(0x2A4C),
            Attribute::new(&[0u8]).write_security(SecurityMode::JustWorks),
            Metadata::new(Properties::new().write_without_response()),
        )?;
        let hid_control_point_handle = _hid_control_point.build().value_handle;

        let _protocol_mode = sb.add_characteristic(
            Uuid::new_16(0x2A4E),
            Attribute::new(&[0x01u8]).security(SecurityMode::JustWorks),
            Metadata::new(Properties::new().read().write_without_response()),
        )?;
        let protocol_mode_handle = _protocol_mode.build().value_handle;

        let mouse = Self::add_report_characteristic(
            &mut sb,
            mouse::REPORT_ID,
            &mouse::MouseReport::empty().format(),
        )?;
        let keyboard = Self::add_report_characteristic(
            &mut sb,
            keyboard::REPORT_ID,
            &keyboard::KeyboardReport::empty().format(),
        )?;
        let consumer = Self::add_report_characteristic(
            &mut sb,
            consumer::REPORT_ID,
            &consumer::ConsumerReport::empty().format(),
        )?;

        let mut boot_builder = sb.add_characteristic(
            Uuid::new_16(0x2A33),
            Attribute::new(&[0u8; 3]).security(SecurityMode::JustWorks),
            Metadata::with_security(
                Properties::new().read().notify(),
                SecurityMode::JustWorks,
            ),
        )?;
        boot_builder.add_descriptor(
            Uuid::new_16(0x2902),
            Attribute::new(&[0u8, 0u8]).security(SecurityMode::JustWorks),
        )?;
        let boot_handles = boot_builder.build();
        let boot_mouse_input = ReportHandles {
            value: boot_handles.value_handle,
            cccd: boot_handles.cccd_handle,
        };

        sb.build();

        Ok(Self {
            hid_information_handle,
            report_map_handle,
            hid_control_point_handle,
            mouse,
            keyboard,
            consumer,
            boot_mouse_input,
            protocol_mode_handle,
        })
    }

    fn add_report_characteristic(
        sb: &mut ServiceBuilder,
        report_id: u8,
        initial: &[u8],
    ) -> Result<ReportHandles, RegisterError> {
        let mut builder = sb.add_characteristic(
            report_uuid(report_id),
            Attribute::new(initial).security(SecurityMode::JustWorks),
            Metadata::with_security(
                Properties::new().read().write_without_response().notify(),
                SecurityMode::JustWorks,
            ),
        )?;
        builder.add_descriptor(
            Uuid::new_16(0x2908),
            Attribute::new(&report_reference(report_id)).security(SecurityMode::JustWorks),
        )?;
        let handles = builder.build();
        Ok(ReportHandles {
            value: handles.value_handle,
            cccd: handles.cccd_handle,
        })
    }

    pub fn hid_control_point_handle(&self) -> u16 {
        self.hid_control_point_handle
    }

    pub fn protocol_mode_handle(&self) -> u16 {
        self.protocol_mode_handle
    }

    pub fn report_map_handle(&self) -> u16 {
        self.report_map_handle
    }

    pub fn hid_information_handle(&self) -> u16 {
        self.hid_information_handle
    }
}

/// GATT events surfaced to the callback router (C10): every write the
/// platform accepts, reduced to the handle it landed on. CCCD/Report
/// Reference writes are intercepted structurally by `on_write` below and
/// never reach the router as raw handle writes.
pub enum HidServiceEvent {
    CccdWrite { handle: u16, value: [u8; 2] },
    ProtocolModeWrite(u8),
    ReportWrite { handle: u16 },
    HidControlPointWrite(u8),
}

impl Service for HidService {
    type Event = HidServiceEvent;

    fn on_write(&self, handle: u16, data: &[u8]) -> Option<Self::Event> {
        for handles in [self.mouse, self.keyboard, self.consumer, self.boot_mouse_input] {
            if handle == handles.cccd {
                if data.len() != 2 {
                    warn!("malformed CCCD write, ignoring");
                    return None;
                }
                return Some(HidServiceEvent::CccdWrite {
                    handle,
                    value: [data[0], data[1]],
                });
            }
        }

        if handle == self.protocol_mode_handle {
            return data.first().map(|b| HidServiceEvent::ProtocolModeWrite(*b));
        }

        if handle == self.hid_control_point_handle {
            return data.first().map(|b| HidServiceEvent::HidControlPointWrite(*b));
        }

        for handles in [self.mouse, self.keyboard, self.consumer] {
            if handle == handles.value {
                info!("output report write on report characteristic, ignoring payload");
                return Some(HidServiceEvent::ReportWrite { handle });
            }
        }

        None
    }
}
