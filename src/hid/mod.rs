//! HID report model (C1) and composite report map (C2).
//!
//! This crate only ever produces reports - it impersonates a device, it
//! never parses one - so each report type knows how to construct and
//! serialize itself but has no "from bytes" direction.

pub mod consumer;
pub mod keyboard;
pub mod map;
pub mod mouse;

/// Errors raised while constructing or sending a report.
///
/// This is the report-model subset of the crate-wide `Error` taxonomy
/// (see `crate::error`); higher layers fold it into `Error::OutOfRange`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReportError {
    /// An argument fell outside the wire format's representable range.
    OutOfRange,
}

/// A single HID input report, tagged by which application collection it
/// belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Report {
    Mouse(mouse::MouseReport),
    Keyboard(keyboard::KeyboardReport),
    Consumer(consumer::ConsumerReport),
}

impl Report {
    /// The Report ID this report is sent under (matches the Report
    /// Reference descriptor of its GATT characteristic).
    pub const fn report_id(&self) -> u8 {
        match self {
            Report::Mouse(r) => r.report_id(),
            Report::Keyboard(r) => r.report_id(),
            Report::Consumer(r) => r.report_id(),
        }
    }

    /// True if the report represents the device's at-rest state (no
    /// buttons/keys/controls asserted). Used to detect whether a "zero
    /// report" needs to be synthesized on resubscription.
    pub fn is_idle(&self) -> bool {
        match self {
            Report::Mouse(r) => r.is_idle(),
            Report::Keyboard(r) => r.is_empty(),
            Report::Consumer(r) => r.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_id_matches_variant() {
        assert_eq!(Report::Mouse(mouse::MouseReport::empty()).report_id(), 1);
        assert_eq!(
            Report::Keyboard(keyboard::KeyboardReport::empty()).report_id(),
            2
        );
        assert_eq!(
            Report::Consumer(consumer::ConsumerReport::empty()).report_id(),
            3
        );
    }

    #[test]
    fn idle_reports_are_idle() {
        assert!(Report::Mouse(mouse::MouseReport::empty()).is_idle());
        assert!(Report::Keyboard(keyboard::KeyboardReport::empty()).is_idle());
        assert!(Report::Consumer(consumer::ConsumerReport::empty()).is_idle());
    }
}
