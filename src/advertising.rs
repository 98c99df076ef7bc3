//! Advertising controller (C8).
//!
//! Pure session bookkeeping - mode, TX power, and the single-session
//! invariant - host-testable without a SoftDevice. The embedded glue that
//! actually calls `nrf_softdevice::ble::peripheral::advertise_pairable`
//! lives in `main.rs`, following the donor firmware's split between
//! pure policy and the embassy task that executes it.

use crate::error::{AdvertisingFailReason, Error};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdvertisingMode {
    LowPower,
    #[default]
    Balanced,
    LowLatency,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxPower {
    UltraLow,
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AdvertisingConfig {
    pub mode: AdvertisingMode,
    pub tx_power: TxPower,
    pub include_name: bool,
    pub include_tx_power: bool,
    /// 0 = advertise indefinitely.
    pub timeout_ms: u32,
}

#[derive(Debug, Default)]
pub struct AdvertisingController {
    advertising: bool,
    last_error: Option<AdvertisingFailReason>,
}

impl AdvertisingController {
    pub const fn new() -> Self {
        Self {
            advertising: false,
            last_error: None,
        }
    }

    pub const fn is_advertising(&self) -> bool {
        self.advertising
    }

    pub const fn last_error(&self) -> Option<AdvertisingFailReason> {
        self.last_error
    }

    /// Request to start advertising. Never starts while a peer is
    /// connected. Calling while already advertising is a no-op success -
    /// only one session exists at a time.
    pub fn request_start(&mut self, peer_connected: bool) -> Result<(), Error> {
        if peer_connected {
            self.last_error = Some(AdvertisingFailReason::Internal);
            return Err(Error::AdvertisingFailed(AdvertisingFailReason::Internal));
        }
        if self.advertising {
            return Ok(());
        }
        self.advertising = true;
        self.last_error = None;
        Ok(())
    }

    /// The platform primitive failed to start a session.
    pub fn on_start_failed(&mut self, reason: AdvertisingFailReason) -> Error {
        self.advertising = false;
        self.last_error = Some(reason);
        Error::AdvertisingFailed(reason)
    }

    pub fn request_stop(&mut self) {
        self.advertising = false;
    }

    /// The platform reported the configured timeout elapsed.
    pub fn on_timed_out(&mut self) {
        self.advertising = false;
    }

    /// A peer connected; advertising always stops on connect (§4.3/§4.7).
    pub fn on_peer_connected(&mut self) {
        self.advertising = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_while_connected_is_rejected() {
        let mut c = AdvertisingController::new();
        assert_eq!(
            c.request_start(true),
            Err(Error::AdvertisingFailed(AdvertisingFailReason::Internal))
        );
        assert!(!c.is_advertising());
    }

    #[test]
    fn start_twice_is_idempotent_success() {
        let mut c = AdvertisingController::new();
        assert_eq!(c.request_start(false), Ok(()));
        assert_eq!(c.request_start(false), Ok(()));
        assert!(c.is_advertising());
    }

    #[test]
    fn start_failure_clears_advertising_flag_and_records_reason() {
        let mut c = AdvertisingController::new();
        c.request_start(false).unwrap();
        let err = c.on_start_failed(AdvertisingFailReason::DataTooLarge);
        assert_eq!(err, Error::AdvertisingFailed(AdvertisingFailReason::DataTooLarge));
        assert!(!c.is_advertising());
        assert_eq!(c.last_error(), Some(AdvertisingFailReason::DataTooLarge));
    }

    #[test]
    fn connect_stops_advertising() {
        let mut c = AdvertisingController::new();
        c.request_start(false).unwrap();
        c.on_peer_connected();
        assert!(!c.is_advertising());
    }
}
