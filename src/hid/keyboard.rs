//! Keyboard input report (C1) and the ASCII→HID-usage keymap used by
//! `type_text` (C4).
//!
//! Layout (8 bytes):
//! ```text
//! Byte 0: Modifier keys (bitfield)
//!         Bit 0 = Left Ctrl,  Bit 1 = Left Shift,
//!         Bit 2 = Left Alt,   Bit 3 = Left GUI,
//!         Bit 4 = Right Ctrl, Bit 5 = Right Shift,
//!         Bit 6 = Right Alt,  Bit 7 = Right GUI
//! Byte 1: Reserved (0x00)
//! Byte 2-7: Up to 6 simultaneous key codes (USB-HID Usage Page 0x07)
//! ```

use super::ReportError;

/// Report ID assigned to the keyboard application collection.
pub const REPORT_ID: u8 = 2;

/// Wire length.
pub const KEYBOARD_REPORT_SIZE: usize = 8;

/// Maximum simultaneously held keys.
pub const MAX_KEYS: usize = 6;

pub const MOD_LEFT_CTRL: u8 = 0x01;
pub const MOD_LEFT_SHIFT: u8 = 0x02;
pub const MOD_LEFT_ALT: u8 = 0x04;
pub const MOD_LEFT_GUI: u8 = 0x08;
pub const MOD_RIGHT_CTRL: u8 = 0x10;
pub const MOD_RIGHT_SHIFT: u8 = 0x20;
pub const MOD_RIGHT_ALT: u8 = 0x40;
pub const MOD_RIGHT_GUI: u8 = 0x80;

/// A single keyboard input report.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyboardReport {
    /// Modifier key bitfield.
    pub modifiers: u8,
    /// Up to 6 simultaneously pressed key codes; unused slots are 0.
    pub keys: [u8; MAX_KEYS],
}

impl KeyboardReport {
    /// All keys released, no modifiers.
    pub const fn empty() -> Self {
        Self {
            modifiers: 0,
            keys: [0; MAX_KEYS],
        }
    }

    /// A report with a single key held down.
    pub fn single(modifiers: u8, key: u8) -> Self {
        let mut keys = [0u8; MAX_KEYS];
        keys[0] = key;
        Self { modifiers, keys }
    }

    /// A report with up to `MAX_KEYS` keys held down simultaneously.
    pub fn multi(modifiers: u8, keys: &[u8]) -> Result<Self, ReportError> {
        if keys.len() > MAX_KEYS {
            return Err(ReportError::OutOfRange);
        }
        let mut slots = [0u8; MAX_KEYS];
        slots[..keys.len()].copy_from_slice(keys);
        Ok(Self {
            modifiers,
            keys: slots,
        })
    }

    pub const fn report_id(&self) -> u8 {
        REPORT_ID
    }

    /// Serialize the wire form: `[modifiers, 0, k0..k5]`, 8 bytes, no report ID.
    pub fn format(&self) -> [u8; KEYBOARD_REPORT_SIZE] {
        let mut out = [0u8; KEYBOARD_REPORT_SIZE];
        out[0] = self.modifiers;
        out[1] = 0;
        out[2..8].copy_from_slice(&self.keys);
        out
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers == 0 && self.keys.iter().all(|&k| k == 0)
    }
}

/// USB-HID report descriptor fragment for the keyboard application
/// collection (Report ID 2). Byte-exact per the composite report map.
pub const KEYBOARD_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x06, // Usage (Keyboard)
    0xA1, 0x01, // Collection (Application)
    0x85, 0x02, //   Report ID (2)
    0x05, 0x07, //   Usage Page (Keyboard/Keypad)
    0x19, 0xE0, //   Usage Minimum (Left Control)
    0x29, 0xE7, //   Usage Maximum (Right GUI)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x08, //   Report Count (8)
    0x81, 0x02, //   Input (Data, Variable, Absolute) - modifiers
    0x95, 0x01, //   Report Count (1)
    0x75, 0x08, //   Report Size (8)
    0x81, 0x01, //   Input (Constant) - reserved byte
    0x95, 0x06, //   Report Count (6)
    0x75, 0x08, //   Report Size (8)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x65, //   Logical Maximum (101)
    0x05, 0x07, //   Usage Page (Keyboard/Keypad)
    0x19, 0x00, //   Usage Minimum (0)
    0x29, 0x65, //   Usage Maximum (101)
    0x81, 0x00, //   Input (Data, Array) - key array
    0xC0, // End Collection
];

/// Maps an ASCII character to a `(modifier, keycode)` HID usage pair.
///
/// Covers letters, digits, whitespace, and the common shifted punctuation
/// a text-entry facility needs. Returns `None` for characters with no USB-HID
/// Usage Page 0x07 representation (non-ASCII, control characters other than
/// `\n`/`\t`).
pub fn ascii_to_hid(c: char) -> Option<(u8, u8)> {
    const NONE: u8 = 0;
    const SHIFT: u8 = MOD_LEFT_SHIFT;

    Some(match c {
        'a'..='z' => (NONE, 0x04 + (c as u8 - b'a')),
        'A'..='Z' => (SHIFT, 0x04 + (c as u8 - b'A')),
        '1'..='9' => (NONE, 0x1E + (c as u8 - b'1')),
        '0' => (NONE, 0x27),
        '\n' => (NONE, 0x28), // Enter
        '\t' => (NONE, 0x2B), // Tab
        ' ' => (NONE, 0x2C),
        '-' => (NONE, 0x2D),
        '_' => (SHIFT, 0x2D),
        '=' => (NONE, 0x2E),
        '+' => (SHIFT, 0x2E),
        '[' => (NONE, 0x2F),
        '{' => (SHIFT, 0x2F),
        ']' => (NONE, 0x30),
        '}' => (SHIFT, 0x30),
        '\\' => (NONE, 0x31),
        '|' => (SHIFT, 0x31),
        ';' => (NONE, 0x33),
        ':' => (SHIFT, 0x33),
        '\'' => (NONE, 0x34),
        '"' => (SHIFT, 0x34),
        '`' => (NONE, 0x35),
        '~' => (SHIFT, 0x35),
        ',' => (NONE, 0x36),
        '<' => (SHIFT, 0x36),
        '.' => (NONE, 0x37),
        '>' => (SHIFT, 0x37),
        '/' => (NONE, 0x38),
        '?' => (SHIFT, 0x38),
        '!' => (SHIFT, 0x1E),
        '@' => (SHIFT, 0x1F),
        '#' => (SHIFT, 0x20),
        '$' => (SHIFT, 0x21),
        '%' => (SHIFT, 0x22),
        '^' => (SHIFT, 0x23),
        '&' => (SHIFT, 0x24),
        '*' => (SHIFT, 0x25),
        '(' => (SHIFT, 0x26),
        ')' => (SHIFT, 0x27),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_all_zero() {
        let r = KeyboardReport::empty();
        assert!(r.is_empty());
        assert_eq!(r.format(), [0; 8]);
    }

    #[test]
    fn single_places_key_in_first_slot() {
        let r = KeyboardReport::single(MOD_LEFT_SHIFT, 0x0B);
        assert_eq!(r.format(), [0x02, 0x00, 0x0B, 0x00, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn multi_fills_remaining_slots_with_zero() {
        let r = KeyboardReport::multi(0, &[0x04, 0x05]).unwrap();
        assert_eq!(r.format(), [0x00, 0x00, 0x04, 0x05, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn multi_rejects_more_than_six_keys() {
        assert_eq!(
            KeyboardReport::multi(0, &[1, 2, 3, 4, 5, 6, 7]),
            Err(ReportError::OutOfRange)
        );
    }

    #[test]
    fn ascii_lowercase_and_uppercase() {
        assert_eq!(ascii_to_hid('a'), Some((0, 0x04)));
        assert_eq!(ascii_to_hid('A'), Some((MOD_LEFT_SHIFT, 0x04)));
        assert_eq!(ascii_to_hid('z'), Some((0, 0x1D)));
    }

    #[test]
    fn ascii_digits_and_zero() {
        assert_eq!(ascii_to_hid('1'), Some((0, 0x1E)));
        assert_eq!(ascii_to_hid('0'), Some((0, 0x27)));
    }

    #[test]
    fn ascii_unsupported_is_none() {
        assert_eq!(ascii_to_hid('\u{1}'), None);
    }
}
