//! Composite USB-HID report map (C2).
//!
//! A single immutable byte sequence declaring the mouse, keyboard, and
//! consumer-control application collections as three top-level HID
//! collections, in that order. This is the only report map the device
//! advertises through the Report Map characteristic (0x2A4B) - no
//! per-device descriptors are kept alongside it.

use super::consumer::CONSUMER_REPORT_DESCRIPTOR;
use super::keyboard::KEYBOARD_REPORT_DESCRIPTOR;
use super::mouse::MOUSE_REPORT_DESCRIPTOR;

/// The maximum length the composite descriptor can reach; sized generously
/// above the three fragments concatenated so `build()` never truncates.
const MAP_CAPACITY: usize = 128;

/// Concatenates the three report fragments into the composite report map.
///
/// Returns the byte count written into `buf`; `buf` must be at least
/// `MAP_CAPACITY` bytes.
const fn build(buf: &mut [u8; MAP_CAPACITY]) -> usize {
    let mut n = 0;
    let mut i = 0;
    while i < MOUSE_REPORT_DESCRIPTOR.len() {
        buf[n] = MOUSE_REPORT_DESCRIPTOR[i];
        n += 1;
        i += 1;
    }
    i = 0;
    while i < KEYBOARD_REPORT_DESCRIPTOR.len() {
        buf[n] = KEYBOARD_REPORT_DESCRIPTOR[i];
        n += 1;
        i += 1;
    }
    i = 0;
    while i < CONSUMER_REPORT_DESCRIPTOR.len() {
        buf[n] = CONSUMER_REPORT_DESCRIPTOR[i];
        n += 1;
        i += 1;
    }
    n
}

struct CompositeMap {
    bytes: [u8; MAP_CAPACITY],
    len: usize,
}

static COMPOSITE: CompositeMap = {
    let mut bytes = [0u8; MAP_CAPACITY];
    let len = build(&mut bytes);
    CompositeMap { bytes, len }
};

/// The composite report map, trimmed to its exact length.
///
/// The HID-over-GATT profile requires this to be returned byte-for-byte
/// from the Report Map characteristic.
pub fn report_map() -> &'static [u8] {
    &COMPOSITE.bytes[..COMPOSITE.len]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_map_matches_authoritative_byte_stream() {
        #[rustfmt::skip]
        let expected: &[u8] = &[
            0x05, 0x01, 0x09, 0x02, 0xA1, 0x01, 0x85, 0x01, 0x09, 0x01, 0xA1, 0x00,
            0x05, 0x09, 0x19, 0x01, 0x29, 0x03, 0x15, 0x00, 0x25, 0x01, 0x95, 0x03, 0x75, 0x01, 0x81, 0x02,
            0x95, 0x01, 0x75, 0x05, 0x81, 0x01,
            0x05, 0x01, 0x09, 0x30, 0x09, 0x31, 0x09, 0x38, 0x15, 0x81, 0x25, 0x7F, 0x75, 0x08, 0x95, 0x03, 0x81, 0x06,
            0xC0, 0xC0,
            0x05, 0x01, 0x09, 0x06, 0xA1, 0x01, 0x85, 0x02,
            0x05, 0x07, 0x19, 0xE0, 0x29, 0xE7, 0x15, 0x00, 0x25, 0x01, 0x75, 0x01, 0x95, 0x08, 0x81, 0x02,
            0x95, 0x01, 0x75, 0x08, 0x81, 0x01,
            0x95, 0x06, 0x75, 0x08, 0x15, 0x00, 0x25, 0x65, 0x05, 0x07, 0x19, 0x00, 0x29, 0x65, 0x81, 0x00,
            0xC0,
            0x05, 0x0C, 0x09, 0x01, 0xA1, 0x01, 0x85, 0x03,
            0x15, 0x00, 0x26, 0xFF, 0x03, 0x19, 0x00, 0x2A, 0xFF, 0x03, 0x75, 0x10, 0x95, 0x01, 0x81, 0x00,
            0xC0,
        ];
        assert_eq!(report_map(), expected);
    }

    #[test]
    fn composite_map_is_concatenation_of_fragments() {
        let mut expected = heapless::Vec::<u8, MAP_CAPACITY>::new();
        expected.extend_from_slice(MOUSE_REPORT_DESCRIPTOR).unwrap();
        expected
            .extend_from_slice(KEYBOARD_REPORT_DESCRIPTOR)
            .unwrap();
        expected
            .extend_from_slice(CONSUMER_REPORT_DESCRIPTOR)
            .unwrap();
        assert_eq!(report_map(), expected.as_slice());
    }
}
