//! HID facade (C9): the public API aggregator.
//!
//! The type here is the pure decision core - gating, report composition,
//! connection/subscription/pairing/advertising bookkeeping - and is fully
//! host-testable. It never touches the SoftDevice directly; it returns the
//! bytes to notify (or the typed error) and lets the embedded-only caller
//! in `main.rs` perform the actual `notify_value` call and any inter-report
//! delay, following the donor firmware's split between `ble::hid_client`
//! (decisions) and the embassy task that drives the radio.

use crate::advertising::{AdvertisingConfig, AdvertisingController};
use crate::connection::{ConnectEffects, ConnectionManager, DisconnectEffects, PeerInfo};
use crate::error::Error;
use crate::handlers::consumer::ConsumerHandler;
use crate::handlers::keyboard::{KeyboardHandler, TypeTextSteps};
use crate::handlers::mouse::MouseHandler;
use crate::handlers::{self, Handlers, ProtocolMode};
use crate::hid::consumer::ConsumerReport;
use crate::hid::keyboard::KeyboardReport;
use crate::hid::mouse::MouseReport;
use crate::identity::AddressBytes;
use crate::pairing::{BondDirectory, PairingStateMachine};
use crate::subscription::{CharId, DeviceId, SubscriptionTracker};

/// The two reports of a press-then-release action (`click_mouse`, each
/// consumer action). The caller sends `.0`, waits `CLICK_HOLD_MS`, then
/// sends `.1`.
pub type PressRelease<R> = (R, R);

/// Effects the caller must carry out after `remove_bond` (§4.6: a
/// removal that targets the connected peer tears the link down once the
/// embedded bond table has actually dropped the entry).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemoveBondEffects {
    pub was_bonded: bool,
    pub disconnect: bool,
}

/// The `DeviceId` a peer at `addr` would be assigned, derived the same
/// way `router::device_id` derives one from a live connection (low 6
/// address bytes, zero-padded) so a `remove_bond(addr)` call can tell
/// whether it targets the peer currently connected.
fn device_id_from_address(addr: AddressBytes) -> DeviceId {
    u64::from_le_bytes([addr[1], addr[2], addr[3], addr[4], addr[5], addr[6], 0, 0])
}

pub struct Facade {
    initialized: bool,
    handlers: Handlers,
    subscriptions: SubscriptionTracker,
    connection: ConnectionManager,
    pairing: PairingStateMachine,
    advertising: AdvertisingController,
    advertising_config: AdvertisingConfig,
    protocol_mode: ProtocolMode,
    current_device: Option<DeviceId>,
    bonds: BondDirectory,
}

impl Facade {
    pub fn new(require_bonding: bool, auto_advertise: bool) -> Self {
        Self {
            initialized: false,
            handlers: Handlers::new(),
            subscriptions: SubscriptionTracker::new(),
            connection: ConnectionManager::new(require_bonding, auto_advertise),
            pairing: PairingStateMachine::new(),
            advertising: AdvertisingController::new(),
            advertising_config: AdvertisingConfig::default(),
            protocol_mode: ProtocolMode::default(),
            current_device: None,
            bonds: BondDirectory::new(),
        }
    }

    pub fn initialize(&mut self) -> Result<(), Error> {
        self.initialized = true;
        Ok(())
    }

    fn require_initialized(&self) -> Result<(), Error> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    // --- Advertising -----------------------------------------------------

    pub fn start_advertising(&mut self) -> Result<(), Error> {
        self.require_initialized()?;
        self.advertising.request_start(self.connection.is_connected())
    }

    pub fn stop_advertising(&mut self) {
        self.advertising.request_stop();
    }

    pub fn is_advertising(&self) -> bool {
        self.advertising.is_advertising()
    }

    pub fn advertising_config(&self) -> AdvertisingConfig {
        self.advertising_config
    }

    pub fn set_advertising_config(&mut self, config: AdvertisingConfig) {
        self.advertising_config = config;
    }

    // --- Connection --------------------------------------------------------

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn connected_peer(&self) -> Option<PeerInfo> {
        self.connection.peer()
    }

    pub fn disconnect(&self) -> Result<(), Error> {
        if !self.connection.is_connected() {
            return Err(Error::NotConnected);
        }
        Ok(())
    }

    /// Record a link-layer connect event for `device`.
    pub fn on_connect(&mut self, device: DeviceId, bonded: bool) -> ConnectEffects {
        self.current_device = Some(device);
        self.advertising.on_peer_connected();
        self.connection.on_connect(bonded)
    }

    /// Record a link-layer disconnect event. A disconnect always drops
    /// every characteristic to Unsubscribed (§4.4), even when the peer
    /// reference itself is retained for a bonded reconnect — the next
    /// send must see a fresh CCCD enable (§8 scenario 5).
    pub fn on_disconnect(&mut self) -> DisconnectEffects {
        let effects = self.connection.on_disconnect(self.pairing.state());
        if let Some(device) = self.current_device {
            self.subscriptions.unsubscribe_all(device);
        }
        if !effects.retain_peer {
            self.current_device = None;
        }
        effects
    }

    pub fn mark_bonded(&mut self) {
        self.connection.mark_bonded();
    }

    // --- Subscriptions / protocol mode --------------------------------------

    /// Apply a raw CCCD write from the GATT router (C10). Returns
    /// `Some(true)` when this was a fresh Unsubscribed→Subscribed
    /// transition, signalling the caller to emit the "zero report".
    pub fn write_cccd(&mut self, char_id: CharId, value: &[u8]) -> Option<bool> {
        let device = self.current_device?;
        self.subscriptions.write_cccd(device, char_id, value)
    }

    pub fn is_subscribed(&self, char_id: CharId) -> bool {
        self.current_device
            .map(|d| self.subscriptions.is_subscribed(d, char_id))
            .unwrap_or(false)
    }

    pub fn protocol_mode(&self) -> ProtocolMode {
        self.protocol_mode
    }

    /// Switch Boot/Report mode. Resets every subscription for the current
    /// peer so the next operation re-verifies CCCD state (§4.4).
    pub fn set_protocol_mode(&mut self, mode: ProtocolMode) {
        self.protocol_mode = mode;
        if let Some(device) = self.current_device {
            self.subscriptions.unsubscribe_all(device);
        }
    }

    fn gate(&self, char_id: CharId) -> Result<(), Error> {
        self.require_initialized()?;
        handlers::gate(self.connection.is_connected(), self.is_subscribed(char_id))
    }

    // --- Mouse ---------------------------------------------------------------

    pub fn move_mouse(&mut self, dx: i8, dy: i8) -> Result<MouseReport, Error> {
        self.gate(CharId::MouseReport)?;
        Ok(self.handlers.mouse.move_by(dx, dy)?)
    }

    pub fn press_mouse(&mut self, buttons: u8) -> Result<MouseReport, Error> {
        self.gate(CharId::MouseReport)?;
        Ok(self.handlers.mouse.press(buttons)?)
    }

    pub fn release_mouse_buttons(&mut self) -> Result<MouseReport, Error> {
        self.gate(CharId::MouseReport)?;
        Ok(self.handlers.mouse.release_all())
    }

    /// The press/release pair for a synthesized click; the caller holds
    /// `CLICK_HOLD_MS` between sending `.0` and `.1`.
    pub fn click_mouse(&mut self, buttons: u8) -> Result<PressRelease<MouseReport>, Error> {
        self.gate(CharId::MouseReport)?;
        let pressed = self.handlers.mouse.click_press(buttons)?;
        let released = self.handlers.mouse.release_all();
        Ok((pressed, released))
    }

    pub fn scroll(&mut self, wheel: i8) -> Result<MouseReport, Error> {
        self.gate(CharId::MouseReport)?;
        Ok(self.handlers.mouse.scroll(wheel)?)
    }

    pub fn mouse_handler(&self) -> &MouseHandler {
        &self.handlers.mouse
    }

    // --- Keyboard --------------------------------------------------------

    pub fn send_key(&mut self, code: u8, mods: u8) -> Result<KeyboardReport, Error> {
        self.gate(CharId::KeyboardReport)?;
        Ok(self.handlers.keyboard.send_key(code, mods))
    }

    pub fn send_keys(&mut self, codes: &[u8], mods: u8) -> Result<KeyboardReport, Error> {
        self.gate(CharId::KeyboardReport)?;
        Ok(self.handlers.keyboard.send_keys(codes, mods)?)
    }

    pub fn release_keys(&mut self) -> Result<KeyboardReport, Error> {
        self.gate(CharId::KeyboardReport)?;
        Ok(self.handlers.keyboard.release_keys())
    }

    /// Gate once, then hand back the press/release step sequence; the
    /// caller notifies each pair in order with `TYPE_TEXT_DELAY_MS` between
    /// characters. The empty string yields zero steps and still succeeds.
    pub fn type_text<'a>(&mut self, text: &'a str) -> Result<TypeTextSteps<'a>, Error> {
        self.gate(CharId::KeyboardReport)?;
        Ok(self.handlers.keyboard.type_text(text))
    }

    /// Feed one step's report back into the keyboard handler's `last`
    /// state as the caller drives the `type_text` sequence.
    pub fn apply_keyboard_report(&mut self, report: KeyboardReport) {
        self.handlers.keyboard.apply(report);
    }

    pub fn keyboard_handler(&self) -> &KeyboardHandler {
        &self.handlers.keyboard
    }

    // --- Consumer ----------------------------------------------------------

    pub fn send_consumer(&mut self, bits: u8) -> Result<PressRelease<ConsumerReport>, Error> {
        self.gate(CharId::ConsumerReport)?;
        let pressed = self.handlers.consumer.control(bits)?;
        let released = self.handlers.consumer.release();
        Ok((pressed, released))
    }

    pub fn play_pause(&mut self) -> Result<PressRelease<ConsumerReport>, Error> {
        self.gate(CharId::ConsumerReport)?;
        Ok((self.handlers.consumer.play_pause(), self.handlers.consumer.release()))
    }

    pub fn next_track(&mut self) -> Result<PressRelease<ConsumerReport>, Error> {
        self.gate(CharId::ConsumerReport)?;
        Ok((self.handlers.consumer.next(), self.handlers.consumer.release()))
    }

    pub fn prev_track(&mut self) -> Result<PressRelease<ConsumerReport>, Error> {
        self.gate(CharId::ConsumerReport)?;
        Ok((self.handlers.consumer.prev(), self.handlers.consumer.release()))
    }

    pub fn vol_up(&mut self) -> Result<PressRelease<ConsumerReport>, Error> {
        self.gate(CharId::ConsumerReport)?;
        Ok((self.handlers.consumer.vol_up(), self.handlers.consumer.release()))
    }

    pub fn vol_down(&mut self) -> Result<PressRelease<ConsumerReport>, Error> {
        self.gate(CharId::ConsumerReport)?;
        Ok((self.handlers.consumer.vol_down(), self.handlers.consumer.release()))
    }

    pub fn mute(&mut self) -> Result<PressRelease<ConsumerReport>, Error> {
        self.gate(CharId::ConsumerReport)?;
        Ok((self.handlers.consumer.mute(), self.handlers.consumer.release()))
    }

    pub fn consumer_handler(&self) -> &ConsumerHandler {
        &self.handlers.consumer
    }

    // --- Pairing -------------------------------------------------------------

    pub fn start_pair(&mut self) -> Option<crate::pairing::PairingEvent> {
        self.pairing.start_pair()
    }

    pub fn cancel_pair(&mut self) {
        self.pairing.cancel_pair();
    }

    pub fn is_bonded(&self) -> bool {
        self.pairing.is_bonded()
    }

    pub fn bond_state(&self) -> u8 {
        self.pairing.state() as u8
    }

    pub fn set_auto_confirm(&mut self, enabled: bool) {
        self.pairing.set_auto_confirm(enabled);
    }

    pub fn auto_confirm(&self) -> bool {
        self.pairing.auto_confirm()
    }

    /// `bonded_devices() -> [Info]` (§4.6, §6): every address the
    /// embedded bond table has accepted.
    pub fn bonded_devices(&self) -> &[AddressBytes] {
        self.bonds.devices()
    }

    pub fn is_bonded_addr(&self, addr: AddressBytes) -> bool {
        self.bonds.is_bonded(addr)
    }

    /// Mirror a bond the embedded `Bonder` has just accepted (or already
    /// holds, on reconnect) into the pure directory.
    pub fn record_bond(&mut self, addr: AddressBytes) {
        self.bonds.record(addr);
    }

    /// `remove_bond(addr)` (§4.6): drop `addr` from the bond directory.
    /// If it is the peer currently connected, the pairing state settles
    /// back to `Idle` and the caller must tear down the link once the
    /// embedded bond table removal has also completed.
    pub fn remove_bond(&mut self, addr: AddressBytes) -> RemoveBondEffects {
        let was_bonded = self.bonds.forget(addr);
        let is_current = self.current_device == Some(device_id_from_address(addr));
        if is_current {
            self.pairing.unpaired();
        }
        RemoveBondEffects {
            was_bonded,
            disconnect: was_bonded && is_current && self.connection.is_connected(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hid::mouse::BUTTON_LEFT;

    fn connected_subscribed(f: &mut Facade) {
        f.initialize().unwrap();
        f.on_connect(1, true);
        f.write_cccd(CharId::MouseReport, &[0x01, 0x00]);
        f.write_cccd(CharId::KeyboardReport, &[0x01, 0x00]);
        f.write_cccd(CharId::ConsumerReport, &[0x01, 0x00]);
    }

    #[test]
    fn uninitialized_facade_rejects_every_operation() {
        let mut f = Facade::new(false, true);
        assert_eq!(f.move_mouse(1, 1), Err(Error::NotInitialized));
    }

    #[test]
    fn move_mouse_requires_connection_then_subscription() {
        let mut f = Facade::new(false, true);
        f.initialize().unwrap();
        assert_eq!(f.move_mouse(1, 1), Err(Error::NotConnected));

        f.on_connect(1, true);
        assert_eq!(f.move_mouse(1, 1), Err(Error::NotSubscribed));

        f.write_cccd(CharId::MouseReport, &[0x01, 0x00]);
        assert_eq!(f.move_mouse(5, -3).unwrap().format(), [0x00, 0x05, 0xFD, 0x00]);
    }

    #[test]
    fn move_mouse_out_of_range_is_rejected() {
        let mut f = Facade::new(false, true);
        connected_subscribed(&mut f);
        assert_eq!(f.move_mouse(i8::MIN, 0), Err(Error::OutOfRange));
    }

    #[test]
    fn click_mouse_matches_scenario_bytes() {
        let mut f = Facade::new(false, true);
        connected_subscribed(&mut f);
        let (pressed, released) = f.click_mouse(BUTTON_LEFT).unwrap();
        assert_eq!(pressed.format(), [0x01, 0x00, 0x00, 0x00]);
        assert_eq!(released.format(), [0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn type_text_empty_string_succeeds_with_no_steps() {
        let mut f = Facade::new(false, true);
        connected_subscribed(&mut f);
        assert_eq!(f.type_text("").unwrap().count(), 0);
    }

    #[test]
    fn vol_up_matches_scenario_bytes() {
        let mut f = Facade::new(false, true);
        connected_subscribed(&mut f);
        let (pressed, released) = f.vol_up().unwrap();
        assert_eq!(pressed.format(), [0x02, 0x00]);
        assert_eq!(released.format(), [0x00, 0x00]);
    }

    #[test]
    fn reconnect_gap_returns_not_connected_until_resubscribed() {
        let mut f = Facade::new(false, true);
        connected_subscribed(&mut f);
        f.move_mouse(1, 1).unwrap();

        let effects = f.on_disconnect();
        assert!(effects.retain_peer);
        assert_eq!(f.move_mouse(1, 1), Err(Error::NotConnected));

        f.on_connect(1, true);
        assert_eq!(f.move_mouse(1, 1), Err(Error::NotSubscribed));

        f.write_cccd(CharId::MouseReport, &[0x01, 0x00]);
        assert!(f.move_mouse(1, 1).is_ok());
    }

    #[test]
    fn protocol_mode_flip_resets_subscriptions() {
        let mut f = Facade::new(false, true);
        connected_subscribed(&mut f);
        f.set_protocol_mode(ProtocolMode::Boot);
        assert_eq!(f.move_mouse(1, 1), Err(Error::NotSubscribed));
    }

    const ADDR: AddressBytes = [1, 1, 2, 3, 4, 5, 6];

    #[test]
    fn bonded_devices_reflects_recorded_bonds() {
        let mut f = Facade::new(false, true);
        f.initialize().unwrap();
        assert!(f.bonded_devices().is_empty());
        f.record_bond(ADDR);
        assert_eq!(f.bonded_devices(), &[ADDR]);
        assert!(f.is_bonded_addr(ADDR));
    }

    #[test]
    fn remove_bond_of_unconnected_peer_does_not_disconnect() {
        let mut f = Facade::new(false, true);
        f.initialize().unwrap();
        f.record_bond(ADDR);
        let effects = f.remove_bond(ADDR);
        assert!(effects.was_bonded);
        assert!(!effects.disconnect);
        assert!(!f.is_bonded_addr(ADDR));
    }

    #[test]
    fn remove_bond_of_connected_peer_requests_disconnect() {
        let mut f = Facade::new(false, true);
        f.initialize().unwrap();
        f.record_bond(ADDR);
        f.on_connect(device_id_from_address(ADDR), true);
        let effects = f.remove_bond(ADDR);
        assert!(effects.was_bonded);
        assert!(effects.disconnect);
    }

    #[test]
    fn remove_bond_of_unknown_address_is_a_no_op() {
        let mut f = Facade::new(false, true);
        f.initialize().unwrap();
        let effects = f.remove_bond(ADDR);
        assert!(!effects.was_bonded);
        assert!(!effects.disconnect);
    }
}
