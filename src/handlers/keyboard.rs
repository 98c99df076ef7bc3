//! Keyboard report handler (C4), including `type_text`.

use crate::hid::keyboard::{ascii_to_hid, KeyboardReport};
use crate::hid::ReportError;

pub struct KeyboardHandler {
    last: KeyboardReport,
}

impl KeyboardHandler {
    pub const fn new() -> Self {
        Self {
            last: KeyboardReport::empty(),
        }
    }

    pub const fn last_report(&self) -> KeyboardReport {
        self.last
    }

    pub fn send_key(&mut self, code: u8, modifiers: u8) -> KeyboardReport {
        let report = KeyboardReport::single(modifiers, code);
        self.last = report;
        report
    }

    pub fn send_keys(&mut self, codes: &[u8], modifiers: u8) -> Result<KeyboardReport, ReportError> {
        let report = KeyboardReport::multi(modifiers, codes)?;
        self.last = report;
        Ok(report)
    }

    pub fn release_keys(&mut self) -> KeyboardReport {
        self.last = KeyboardReport::empty();
        self.last
    }

    /// Expand a string into the press/release report sequence that
    /// `type_text` notifies in order, each character mapped via the
    /// USB-HID Usage Tables (unsupported characters are skipped).
    ///
    /// The empty string produces zero steps.
    pub fn type_text<'a>(&mut self, text: &'a str) -> TypeTextSteps<'a> {
        TypeTextSteps {
            chars: text.chars(),
        }
    }

    /// Apply one precomputed step to the handler's sticky state (keeps
    /// `last_report`/characteristic-read state consistent as the caller
    /// drives the sequence with its own delay scheduling).
    pub fn apply(&mut self, report: KeyboardReport) {
        self.last = report;
    }
}

impl Default for KeyboardHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy iterator over the press/release report pairs of a `type_text` call.
/// Characters with no HID mapping are silently skipped, matching the
/// handler's "best effort" ASCII text entry contract.
pub struct TypeTextSteps<'a> {
    chars: core::str::Chars<'a>,
}

impl Iterator for TypeTextSteps<'_> {
    type Item = (KeyboardReport, KeyboardReport);

    fn next(&mut self) -> Option<Self::Item> {
        for c in self.chars.by_ref() {
            if let Some((modifiers, code)) = ascii_to_hid(c) {
                return Some((
                    KeyboardReport::single(modifiers, code),
                    KeyboardReport::empty(),
                ));
            }
        }
        None
    }
}
