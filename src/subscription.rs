//! Notification subscription tracker (C5).
//!
//! Holds the per-device, per-characteristic CCCD state. Pure and
//! host-testable: it knows nothing about the SoftDevice, only about the
//! `(DeviceId, CharId)` → subscription mapping and the CCCD wire format.

use heapless::FnvIndexMap;

use crate::config::MAX_BONDED_DEVICES;

/// Opaque peer identifier. In the embedded build this is derived from the
/// connection's BLE address; tests use arbitrary small integers.
pub type DeviceId = u64;

/// Which HID characteristic a CCCD entry belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CharId {
    MouseReport,
    KeyboardReport,
    ConsumerReport,
    BootMouseInput,
}

/// CCCD value: off, notify, or indicate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Subscription {
    #[default]
    Off,
    Notify,
    Indicate,
}

impl Subscription {
    /// Parse the 2-byte CCCD wire value. Returns `None` for malformed
    /// values (anything other than `00 00`, `01 00`, `02 00`).
    pub fn from_cccd_bytes(value: &[u8]) -> Option<Self> {
        match value {
            [0x00, 0x00] => Some(Subscription::Off),
            [0x01, 0x00] => Some(Subscription::Notify),
            [0x02, 0x00] => Some(Subscription::Indicate),
            _ => None,
        }
    }

    pub const fn is_subscribed(&self) -> bool {
        !matches!(self, Subscription::Off)
    }
}

const TABLE_CAPACITY: usize = 16;

/// `(DeviceId, CharId)` → subscription state.
///
/// Capacity is `MAX_BONDED_DEVICES` peers times the four trackable
/// characteristics, rounded up to the next power of two that
/// `heapless::FnvIndexMap` requires.
pub struct SubscriptionTracker {
    table: FnvIndexMap<(DeviceId, CharId), Subscription, TABLE_CAPACITY>,
}

impl SubscriptionTracker {
    pub fn new() -> Self {
        let _ = MAX_BONDED_DEVICES;
        Self {
            table: FnvIndexMap::new(),
        }
    }

    /// Current subscription state; unseen entries default to `Off` (the
    /// initial state on every new connection).
    pub fn get(&self, device: DeviceId, char_id: CharId) -> Subscription {
        self.table
            .get(&(device, char_id))
            .copied()
            .unwrap_or_default()
    }

    pub fn is_subscribed(&self, device: DeviceId, char_id: CharId) -> bool {
        self.get(device, char_id).is_subscribed()
    }

    /// Apply a raw CCCD write. Returns `true` if `value` was a valid CCCD
    /// encoding and the transition from Unsubscribed→Subscribed occurred
    /// (the caller should then emit the "zero report").
    ///
    /// Invalid encodings leave the table unchanged.
    pub fn write_cccd(&mut self, device: DeviceId, char_id: CharId, value: &[u8]) -> Option<bool> {
        let new_state = Subscription::from_cccd_bytes(value)?;
        let was_subscribed = self.is_subscribed(device, char_id);
        let _ = self.table.insert((device, char_id), new_state);
        Some(!was_subscribed && new_state.is_subscribed())
    }

    /// Force a characteristic to `Off` (peer disconnect, protocol mode
    /// flip). Never triggers the "just subscribed" transition.
    pub fn unsubscribe(&mut self, device: DeviceId, char_id: CharId) {
        let _ = self.table.insert((device, char_id), Subscription::Off);
    }

    /// Clear every characteristic for one device (e.g. protocol mode flip
    /// resets all report streams at once).
    pub fn unsubscribe_all(&mut self, device: DeviceId) {
        for char_id in [
            CharId::MouseReport,
            CharId::KeyboardReport,
            CharId::ConsumerReport,
            CharId::BootMouseInput,
        ] {
            self.unsubscribe(device, char_id);
        }
    }
}

impl Default for SubscriptionTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEV: DeviceId = 1;

    #[test]
    fn unseen_entry_defaults_to_off() {
        let t = SubscriptionTracker::new();
        assert_eq!(t.get(DEV, CharId::MouseReport), Subscription::Off);
        assert!(!t.is_subscribed(DEV, CharId::MouseReport));
    }

    #[test]
    fn write_cccd_rejects_malformed_values() {
        let mut t = SubscriptionTracker::new();
        assert_eq!(t.write_cccd(DEV, CharId::MouseReport, &[0x01]), None);
        assert_eq!(t.write_cccd(DEV, CharId::MouseReport, &[0x03, 0x00]), None);
        assert_eq!(t.get(DEV, CharId::MouseReport), Subscription::Off);
    }

    #[test]
    fn enable_reports_fresh_subscription_transition() {
        let mut t = SubscriptionTracker::new();
        let just_subscribed = t.write_cccd(DEV, CharId::MouseReport, &[0x01, 0x00]).unwrap();
        assert!(just_subscribed);
        assert!(t.is_subscribed(DEV, CharId::MouseReport));

        let again = t.write_cccd(DEV, CharId::MouseReport, &[0x01, 0x00]).unwrap();
        assert!(!again, "re-enabling an already-subscribed char is not a fresh transition");
    }

    #[test]
    fn disable_then_enable_is_a_fresh_transition() {
        let mut t = SubscriptionTracker::new();
        t.write_cccd(DEV, CharId::MouseReport, &[0x01, 0x00]);
        t.write_cccd(DEV, CharId::MouseReport, &[0x00, 0x00]);
        assert!(!t.is_subscribed(DEV, CharId::MouseReport));

        let fresh = t.write_cccd(DEV, CharId::MouseReport, &[0x01, 0x00]).unwrap();
        assert!(fresh);
    }

    #[test]
    fn unsubscribe_all_clears_every_characteristic() {
        let mut t = SubscriptionTracker::new();
        t.write_cccd(DEV, CharId::MouseReport, &[0x01, 0x00]);
        t.write_cccd(DEV, CharId::KeyboardReport, &[0x01, 0x00]);
        t.unsubscribe_all(DEV);
        assert!(!t.is_subscribed(DEV, CharId::MouseReport));
        assert!(!t.is_subscribed(DEV, CharId::KeyboardReport));
    }

    #[test]
    fn devices_are_independent() {
        let mut t = SubscriptionTracker::new();
        t.write_cccd(1, CharId::MouseReport, &[0x01, 0x00]);
        assert!(t.is_subscribed(1, CharId::MouseReport));
        assert!(!t.is_subscribed(2, CharId::MouseReport));
    }
}
