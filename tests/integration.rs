//! End-to-end scenarios against the host-testable facade.

use ble_hid_peripheral::error::Error;
use ble_hid_peripheral::facade::Facade;
use ble_hid_peripheral::subscription::CharId;

const PEER: u64 = 42;

fn bring_up() -> Facade {
    let mut f = Facade::new(false, true);
    f.initialize().unwrap();
    f
}

#[test]
fn mouse_nudge_scenario() {
    let mut f = bring_up();
    assert!(f.start_advertising().is_ok());
    assert!(f.is_advertising());

    f.on_connect(PEER, true);
    assert!(!f.is_advertising(), "connect always stops advertising");

    f.write_cccd(CharId::MouseReport, &[0x01, 0x00]);
    let report = f.move_mouse(5, -3).unwrap();
    assert_eq!(report.format(), [0x00, 0x05, 0xFD, 0x00]);
}

#[test]
fn click_scenario() {
    let mut f = bring_up();
    f.on_connect(PEER, true);
    f.write_cccd(CharId::MouseReport, &[0x01, 0x00]);

    let (pressed, released) = f.click_mouse(ble_hid_peripheral::hid::mouse::BUTTON_LEFT).unwrap();
    assert_eq!(pressed.format(), [0x01, 0x00, 0x00, 0x00]);
    assert_eq!(released.format(), [0x00, 0x00, 0x00, 0x00]);
}

#[test]
fn type_hi_scenario() {
    let mut f = bring_up();
    f.on_connect(PEER, true);
    f.write_cccd(CharId::KeyboardReport, &[0x01, 0x00]);

    let steps: heapless::Vec<_, 4> = f.type_text("Hi").unwrap().collect();
    assert_eq!(steps.len(), 2);

    let (press_h, release_h) = steps[0];
    assert_eq!(press_h.format(), [0x02, 0x00, 0x0B, 0x00, 0x00, 0x00, 0x00, 0x00]);
    assert_eq!(release_h.format(), [0; 8]);

    let (press_i, release_i) = steps[1];
    assert_eq!(press_i.format(), [0x00, 0x00, 0x0C, 0x00, 0x00, 0x00, 0x00, 0x00]);
    assert_eq!(release_i.format(), [0; 8]);
}

#[test]
fn volume_up_scenario() {
    let mut f = bring_up();
    f.on_connect(PEER, true);
    f.write_cccd(CharId::ConsumerReport, &[0x01, 0x00]);

    let (pressed, released) = f.vol_up().unwrap();
    assert_eq!(pressed.format(), [0x02, 0x00]);
    assert_eq!(released.format(), [0x00, 0x00]);
}

#[test]
fn reconnect_flush_scenario() {
    let mut f = bring_up();
    f.on_connect(PEER, true);
    f.write_cccd(CharId::MouseReport, &[0x01, 0x00]);
    assert!(f.move_mouse(1, 0).is_ok());

    let effects = f.on_disconnect();
    assert!(effects.retain_peer, "bonded peer reference survives the gap");
    assert_eq!(f.move_mouse(1, 0), Err(Error::NotConnected));

    f.on_connect(PEER, true);
    assert_eq!(
        f.move_mouse(1, 0),
        Err(Error::NotSubscribed),
        "reconnect alone does not restore the CCCD state"
    );

    f.write_cccd(CharId::MouseReport, &[0x01, 0x00]);
    assert!(f.move_mouse(1, 0).is_ok());
}

#[test]
fn pairing_cancel_scenario() {
    let mut f = bring_up();
    assert_eq!(
        f.start_pair(),
        Some(ble_hid_peripheral::pairing::PairingEvent::PairingRequested)
    );
    f.cancel_pair();
    assert!(!f.is_bonded());
}

/// Out-of-range arguments fail fast rather than wrapping or clamping.
#[test]
fn out_of_range_mouse_move_is_rejected() {
    let mut f = bring_up();
    f.on_connect(PEER, true);
    f.write_cccd(CharId::MouseReport, &[0x01, 0x00]);
    assert_eq!(f.move_mouse(i8::MIN, 0), Err(Error::OutOfRange));
}

/// `type_text` with the empty string succeeds and sends nothing.
#[test]
fn type_text_empty_string_is_a_success_with_no_steps() {
    let mut f = bring_up();
    f.on_connect(PEER, true);
    f.write_cccd(CharId::KeyboardReport, &[0x01, 0x00]);
    assert_eq!(f.type_text("").unwrap().count(), 0);
}

/// Removing the bond of the peer currently connected must tear the link
/// down; removing any other address must not touch it.
#[test]
fn remove_bond_scenario() {
    let addr: [u8; 7] = [1, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];
    let other: [u8; 7] = [1, 1, 2, 3, 4, 5, 6];

    let mut f = bring_up();
    f.record_bond(addr);
    f.record_bond(other);
    assert_eq!(f.bonded_devices().len(), 2);

    let removed_other = f.remove_bond(other);
    assert!(removed_other.was_bonded);
    assert!(!removed_other.disconnect, "no peer connected yet");

    f.on_connect(
        u64::from_le_bytes([addr[1], addr[2], addr[3], addr[4], addr[5], addr[6], 0, 0]),
        true,
    );
    let removed_current = f.remove_bond(addr);
    assert!(removed_current.was_bonded);
    assert!(removed_current.disconnect, "removing the connected peer's bond must disconnect");
    assert!(!f.is_bonded_addr(addr));
}
