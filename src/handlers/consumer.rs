//! Consumer control report handler (C4).

use crate::hid::consumer::{self, ConsumerReport};
use crate::hid::ReportError;

pub struct ConsumerHandler {
    last: ConsumerReport,
}

impl ConsumerHandler {
    pub const fn new() -> Self {
        Self {
            last: ConsumerReport::empty(),
        }
    }

    pub const fn last_report(&self) -> ConsumerReport {
        self.last
    }

    /// Raw bitmask passthrough.
    pub fn control(&mut self, bits: u8) -> Result<ConsumerReport, ReportError> {
        let report = ConsumerReport::bits(bits)?;
        self.last = report;
        Ok(report)
    }

    pub fn release(&mut self) -> ConsumerReport {
        self.last = ConsumerReport::empty();
        self.last
    }

    pub fn play_pause(&mut self) -> ConsumerReport {
        self.control(consumer::PLAY_PAUSE).expect("constant in range")
    }

    pub fn next(&mut self) -> ConsumerReport {
        self.control(consumer::NEXT).expect("constant in range")
    }

    pub fn prev(&mut self) -> ConsumerReport {
        self.control(consumer::PREV).expect("constant in range")
    }

    pub fn vol_up(&mut self) -> ConsumerReport {
        self.control(consumer::VOL_UP).expect("constant in range")
    }

    pub fn vol_down(&mut self) -> ConsumerReport {
        self.control(consumer::VOL_DOWN).expect("constant in range")
    }

    pub fn mute(&mut self) -> ConsumerReport {
        self.control(consumer::MUTE).expect("constant in range")
    }
}

impl Default for ConsumerHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vol_up_then_release_matches_scenario_bytes() {
        let mut h = ConsumerHandler::new();
        let pressed = h.vol_up();
        assert_eq!(pressed.format(), [0x02, 0x00]);
        let released = h.release();
        assert_eq!(released.format(), [0x00, 0x00]);
    }

    #[test]
    fn control_rejects_undefined_bits() {
        let mut h = ConsumerHandler::new();
        assert_eq!(h.control(0x80), Err(ReportError::OutOfRange));
    }

    #[test]
    fn discrete_actions_each_set_a_single_bit() {
        let mut h = ConsumerHandler::new();
        assert_eq!(h.play_pause().bits, consumer::PLAY_PAUSE);
        assert_eq!(h.next().bits, consumer::NEXT);
        assert_eq!(h.prev().bits, consumer::PREV);
        assert_eq!(h.mute().bits, consumer::MUTE);
    }
}
