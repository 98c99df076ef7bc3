//! Report handlers (C4): per-report-ID state plus the common
//! connected/subscribed gating rules every handler operation obeys.

pub mod consumer;
pub mod keyboard;
pub mod mouse;

use crate::error::Error;
use crate::hid::Report;

/// Host protocol mode, mirrored from the Protocol Mode characteristic
/// (0x2A4E).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolMode {
    Boot,
    #[default]
    Report,
}

impl ProtocolMode {
    pub const fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(ProtocolMode::Boot),
            1 => Some(ProtocolMode::Report),
            _ => None,
        }
    }

    pub const fn as_byte(self) -> u8 {
        match self {
            ProtocolMode::Boot => 0,
            ProtocolMode::Report => 1,
        }
    }
}

/// The common "may I send this report" gate shared by every handler
/// operation (§4.4 "Common rules").
///
/// Returns `Ok(())` when a notify attempt should proceed, or the typed
/// error the caller short-circuits with.
pub fn gate(connected: bool, subscribed: bool) -> Result<(), Error> {
    if !connected {
        return Err(Error::NotConnected);
    }
    if !subscribed {
        return Err(Error::NotSubscribed);
    }
    Ok(())
}

/// A bundle of the three per-report-ID handlers, mirroring the sum-type
/// report model rather than a class hierarchy of handlers.
pub struct Handlers {
    pub mouse: mouse::MouseHandler,
    pub keyboard: keyboard::KeyboardHandler,
    pub consumer: consumer::ConsumerHandler,
}

impl Handlers {
    pub const fn new() -> Self {
        Self {
            mouse: mouse::MouseHandler::new(),
            keyboard: keyboard::KeyboardHandler::new(),
            consumer: consumer::ConsumerHandler::new(),
        }
    }

    /// The report last notified on report ID `id`, or `None` for an
    /// unrecognized ID. Used to answer reads on the Report characteristic.
    pub fn last_report(&self, report_id: u8) -> Option<Report> {
        match report_id {
            crate::hid::mouse::REPORT_ID => Some(Report::Mouse(self.mouse.last_report())),
            crate::hid::keyboard::REPORT_ID => Some(Report::Keyboard(self.keyboard.last_report())),
            crate::hid::consumer::REPORT_ID => Some(Report::Consumer(self.consumer.last_report())),
            _ => None,
        }
    }
}

impl Default for Handlers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_mode_round_trips_through_byte() {
        assert_eq!(ProtocolMode::from_byte(0), Some(ProtocolMode::Boot));
        assert_eq!(ProtocolMode::from_byte(1), Some(ProtocolMode::Report));
        assert_eq!(ProtocolMode::from_byte(2), None);
        assert_eq!(ProtocolMode::Report.as_byte(), 1);
    }

    #[test]
    fn gate_rejects_disconnected_before_unsubscribed() {
        assert_eq!(gate(false, false), Err(Error::NotConnected));
        assert_eq!(gate(false, true), Err(Error::NotConnected));
    }

    #[test]
    fn gate_rejects_unsubscribed_when_connected() {
        assert_eq!(gate(true, false), Err(Error::NotSubscribed));
    }

    #[test]
    fn gate_passes_when_connected_and_subscribed() {
        assert_eq!(gate(true, true), Ok(()));
    }

    #[test]
    fn last_report_dispatches_by_report_id() {
        let mut h = Handlers::new();
        h.mouse.move_by(1, 1).unwrap();
        assert!(matches!(h.last_report(1), Some(Report::Mouse(_))));
        assert!(matches!(h.last_report(2), Some(Report::Keyboard(_))));
        assert!(matches!(h.last_report(3), Some(Report::Consumer(_))));
        assert!(h.last_report(9).is_none());
    }
}
