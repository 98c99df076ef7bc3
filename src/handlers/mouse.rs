//! Mouse report handler (C4).
//!
//! Owns the mouse's sticky button state and the bytes of the last report
//! sent, so a read of the Report characteristic between notifications
//! returns the same bytes that went out over the air.

use crate::hid::mouse::MouseReport;
use crate::hid::ReportError;

pub struct MouseHandler {
    buttons: u8,
    last: MouseReport,
}

impl MouseHandler {
    pub const fn new() -> Self {
        Self {
            buttons: 0,
            last: MouseReport::empty(),
        }
    }

    pub const fn last_report(&self) -> MouseReport {
        self.last
    }

    /// Relative movement, keeping the current sticky button state.
    pub fn move_by(&mut self, dx: i8, dy: i8) -> Result<MouseReport, ReportError> {
        let report = MouseReport::new(self.buttons, dx, dy, 0)?;
        self.last = report;
        Ok(report)
    }

    /// Press additional buttons (OR'd into the sticky mask), no movement.
    pub fn press(&mut self, button_mask: u8) -> Result<MouseReport, ReportError> {
        self.buttons |= button_mask;
        let report = MouseReport::new(self.buttons, 0, 0, 0)?;
        self.last = report;
        Ok(report)
    }

    /// Release every held button.
    pub fn release_all(&mut self) -> MouseReport {
        self.buttons = 0;
        self.last = MouseReport::empty();
        self.last
    }

    /// Wheel-only report; leaves the sticky button state untouched.
    pub fn scroll(&mut self, wheel: i8) -> Result<MouseReport, ReportError> {
        let report = MouseReport::new(self.buttons, 0, 0, wheel)?;
        self.last = report;
        Ok(report)
    }

    /// The press half of `click`; pairs with `release_all` after the
    /// caller's hold delay.
    pub fn click_press(&mut self, button_mask: u8) -> Result<MouseReport, ReportError> {
        self.press(button_mask)
    }
}

impl Default for MouseHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hid::mouse::BUTTON_LEFT;

    #[test]
    fn move_by_keeps_sticky_buttons() {
        let mut h = MouseHandler::new();
        h.press(BUTTON_LEFT).unwrap();
        let report = h.move_by(5, -3).unwrap();
        assert_eq!(report.buttons, BUTTON_LEFT);
        assert_eq!(report.dx, 5);
        assert_eq!(report.dy, -3);
    }

    #[test]
    fn move_by_out_of_range_is_rejected() {
        let mut h = MouseHandler::new();
        assert_eq!(h.move_by(i8::MIN, 0), Err(ReportError::OutOfRange));
    }

    #[test]
    fn release_all_clears_buttons_and_movement() {
        let mut h = MouseHandler::new();
        h.press(BUTTON_LEFT).unwrap();
        let report = h.release_all();
        assert!(report.is_idle());
    }

    #[test]
    fn click_press_then_release_matches_scenario_bytes() {
        let mut h = MouseHandler::new();
        let pressed = h.click_press(BUTTON_LEFT).unwrap();
        assert_eq!(pressed.format(), [0x01, 0x00, 0x00, 0x00]);
        let released = h.release_all();
        assert_eq!(released.format(), [0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn scroll_does_not_affect_sticky_buttons() {
        let mut h = MouseHandler::new();
        h.press(BUTTON_LEFT).unwrap();
        let report = h.scroll(2).unwrap();
        assert_eq!(report.buttons, BUTTON_LEFT);
        assert_eq!(report.wheel, 2);
    }

    #[test]
    fn last_report_reflects_most_recent_operation() {
        let mut h = MouseHandler::new();
        h.move_by(5, -3).unwrap();
        assert_eq!(h.last_report().format(), [0x00, 0x05, 0xFD, 0x00]);
    }
}
