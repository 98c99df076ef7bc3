//! Pairing state machine (C6).
//!
//! The state machine itself is pure and host-testable; the embedded-only
//! `Bonder` below drives it from SoftDevice `SecurityHandler` callbacks and
//! owns the bonded-peer list, following the donor firmware's
//! `ble::multi_conn::Bonder` shape.

use crate::config::MAX_BONDED_DEVICES;
use crate::error::{Error, PairingFailReason};
use crate::identity::AddressBytes;

/// Pure mirror of the embedded `Bonder`'s bond table, so `Facade` can
/// answer `bonded_devices`/`is_bonded(addr)`/`remove_bond(addr)` (§4.6,
/// §6) without depending on `nrf_softdevice` types. The embedded glue in
/// `main.rs` keeps it synchronized with the real bond table.
#[derive(Debug, Default)]
pub struct BondDirectory {
    entries: heapless::Vec<AddressBytes, MAX_BONDED_DEVICES>,
}

impl BondDirectory {
    pub fn new() -> Self {
        Self { entries: heapless::Vec::new() }
    }

    pub fn devices(&self) -> &[AddressBytes] {
        &self.entries
    }

    pub fn is_bonded(&self, addr: AddressBytes) -> bool {
        self.entries.contains(&addr)
    }

    /// Record a bonded peer, evicting the oldest entry if full - mirrors
    /// `Bonder::on_bonded`'s own eviction policy.
    pub fn record(&mut self, addr: AddressBytes) {
        if self.entries.contains(&addr) {
            return;
        }
        if self.entries.is_full() {
            self.entries.remove(0);
        }
        let _ = self.entries.push(addr);
    }

    /// Remove a bonded peer. Returns `true` if it was present.
    pub fn forget(&mut self, addr: AddressBytes) -> bool {
        match self.entries.iter().position(|a| *a == addr) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }
}

/// Bond/pairing lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PairingState {
    #[default]
    Idle,
    PairingRequested,
    PairingStarted,
    WaitingForBond,
    Bonded,
    PairingFailed,
    Unpairing,
}

/// Outbound events a listener can subscribe to, replacing a
/// callback-registered-into-a-static-singleton design.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PairingEvent {
    /// The platform is asking whether to accept pairing with the current
    /// peer ("Just Works" confirmation or a numeric-comparison variant).
    PairingRequested,
    /// Pairing reached a terminal outcome.
    PairingComplete { ok: bool },
}

/// Pure pairing state machine. One instance tracks the pairing attempt
/// currently in flight against whichever peer is connected; the persisted
/// bond list lives separately (`Bonder`/`crate::identity`).
#[derive(Debug)]
pub struct PairingStateMachine {
    state: PairingState,
    /// When `true`, `on_pairing_requested` immediately confirms instead of
    /// waiting for an application decision (spec default: maximize host
    /// compatibility).
    auto_confirm: bool,
}

impl PairingStateMachine {
    pub const fn new() -> Self {
        Self {
            state: PairingState::Idle,
            auto_confirm: true,
        }
    }

    pub const fn state(&self) -> PairingState {
        self.state
    }

    pub fn set_auto_confirm(&mut self, enabled: bool) {
        self.auto_confirm = enabled;
    }

    pub const fn auto_confirm(&self) -> bool {
        self.auto_confirm
    }

    /// `start_pair(device)`: begin a pairing attempt. Valid from `Idle` or
    /// after a previous failure.
    pub fn start_pair(&mut self) -> Option<PairingEvent> {
        match self.state {
            PairingState::Idle | PairingState::PairingFailed | PairingState::Bonded => {
                self.state = PairingState::PairingRequested;
                Some(PairingEvent::PairingRequested)
            }
            _ => None,
        }
    }

    /// The platform has begun the pairing procedure after our request (or
    /// the peer's).
    pub fn pairing_started(&mut self) {
        if matches!(
            self.state,
            PairingState::PairingRequested | PairingState::Idle
        ) {
            self.state = PairingState::PairingStarted;
        }
    }

    /// Platform bond-state broadcast: `None → Bonding`.
    pub fn bonding_started(&mut self) {
        self.state = PairingState::WaitingForBond;
    }

    /// Platform bond-state broadcast: `Bonding → Bonded`.
    pub fn bonded(&mut self) -> PairingEvent {
        self.state = PairingState::Bonded;
        PairingEvent::PairingComplete { ok: true }
    }

    /// Platform bond-state broadcast: `Bonding → None`, or an explicit
    /// rejection/timeout/cancellation.
    pub fn failed(&mut self) -> PairingEvent {
        self.state = PairingState::PairingFailed;
        PairingEvent::PairingComplete { ok: false }
    }

    /// `cancel_pair()`: abandon an in-flight attempt.
    pub fn cancel_pair(&mut self) {
        if !matches!(self.state, PairingState::Idle | PairingState::Bonded) {
            self.state = PairingState::Unpairing;
        }
    }

    /// `remove_bond()` completed: settle back to `Idle`.
    pub fn unpaired(&mut self) {
        self.state = PairingState::Idle;
    }

    pub const fn is_bonded(&self) -> bool {
        matches!(self.state, PairingState::Bonded)
    }
}

impl Default for PairingStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a terminal pairing outcome onto the crate-wide error taxonomy; used
/// when a caller's `pair()` call observes `PairingFailed`.
pub fn pairing_error(reason: PairingFailReason) -> Error {
    Error::PairingFailed(reason)
}

#[cfg(feature = "embedded")]
mod bonder {
    use core::cell::{Cell, RefCell};

    use defmt::{debug, info, warn, Debug2Format};
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::signal::Signal;
    use heapless::Vec;
    use nrf_softdevice::ble::gatt_server::{get_sys_attrs, set_sys_attrs};
    use nrf_softdevice::ble::security::{IoCapabilities, SecurityHandler};
    use nrf_softdevice::ble::{Connection, EncryptionInfo, IdentityKey, MasterId, SecurityMode};

    use crate::config::MAX_BONDED_DEVICES;
    use crate::identity::{from_softdevice_address, AddressBytes};

    struct PeerBond {
        master_id: MasterId,
        key: EncryptionInfo,
        peer_id: IdentityKey,
    }

    /// Signalled with a peer's address each time `on_bonded` accepts a
    /// new or updated bond. `Bonder` lives on the SoftDevice event path
    /// and has no reference to `Facade`; `bluetooth_task` awaits this to
    /// mirror the bond into `Facade`'s pure `BondDirectory`.
    pub static BONDED: Signal<CriticalSectionRawMutex, AddressBytes> = Signal::new();

    /// `SecurityHandler` implementor: owns the bonded-peer list and the
    /// one GATT system-attributes blob carried across a reconnect.
    ///
    /// Persisting bonds across a power cycle is not required by this
    /// engine (see DESIGN.md); the list lives in RAM for the device's
    /// uptime.
    pub struct Bonder {
        peers: RefCell<Vec<PeerBond, MAX_BONDED_DEVICES>>,
        sys_attrs: RefCell<Vec<u8, 62>>,
        /// Mirrors `PairingStateMachine::auto_confirm` (§4.6): when
        /// `false`, bonding requests are rejected outright, since this
        /// peripheral has no display/keypad to drive an explicit
        /// numeric-comparison confirmation (`IoCapabilities::None`).
        auto_confirm: Cell<bool>,
    }

    impl Bonder {
        pub fn new() -> Self {
            Self {
                peers: RefCell::new(Vec::new()),
                sys_attrs: RefCell::new(Vec::new()),
                auto_confirm: Cell::new(true),
            }
        }

        pub fn is_bonded(&self, peer_id: &IdentityKey) -> bool {
            self.peers
                .borrow()
                .iter()
                .any(|p| p.peer_id.is_match(peer_id.addr))
        }

        /// Look up by the connection's link-layer address directly, for
        /// callers that have not yet resolved an `IdentityKey`.
        pub fn is_bonded_addr(&self, addr: nrf_softdevice::ble::Address) -> bool {
            self.peers.borrow().iter().any(|p| p.peer_id.is_match(addr))
        }

        pub fn bonded_count(&self) -> usize {
            self.peers.borrow().len()
        }

        pub fn remove_all_bonds(&self) {
            self.peers.borrow_mut().clear();
            self.sys_attrs.borrow_mut().clear();
        }

        /// Remove a single bonded peer by address (`remove_bond`, §4.6).
        /// Returns `true` if it was present.
        pub fn remove_bond(&self, addr: nrf_softdevice::ble::Address) -> bool {
            let mut peers = self.peers.borrow_mut();
            match peers.iter().position(|p| p.peer_id.is_match(addr)) {
                Some(idx) => {
                    peers.remove(idx);
                    true
                }
                None => false,
            }
        }

        pub fn set_auto_confirm(&self, enabled: bool) {
            self.auto_confirm.set(enabled);
        }
    }

    impl Default for Bonder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl SecurityHandler for Bonder {
        fn io_capabilities(&self) -> IoCapabilities {
            IoCapabilities::None
        }

        fn can_bond(&self, _conn: &Connection) -> bool {
            self.auto_confirm.get()
        }

        fn on_bonded(
            &self,
            _conn: &Connection,
            master_id: MasterId,
            key: EncryptionInfo,
            peer_id: IdentityKey,
        ) {
            info!("bonded: {}", master_id);
            self.sys_attrs.borrow_mut().clear();

            let mut peers = self.peers.borrow_mut();
            if let Some(existing) = peers.iter_mut().find(|p| p.master_id == master_id) {
                existing.key = key;
                existing.peer_id = peer_id;
            } else {
                if peers.is_full() {
                    warn!("bonded peer table full, evicting oldest");
                    peers.remove(0);
                }
                let _ = peers.push(PeerBond {
                    master_id,
                    key,
                    peer_id,
                });
            }
            drop(peers);
            BONDED.signal(from_softdevice_address(peer_id.addr));
        }

        fn get_key(&self, _conn: &Connection, master_id: MasterId) -> Option<EncryptionInfo> {
            self.peers
                .borrow()
                .iter()
                .find_map(|p| (p.master_id == master_id).then_some(p.key))
        }

        fn get_peripheral_key(&self, conn: &Connection) -> Option<(MasterId, EncryptionInfo)> {
            self.peers.borrow().iter().find_map(|p| {
                p.peer_id
                    .is_match(conn.peer_address())
                    .then_some((p.master_id, p.key))
            })
        }

        fn on_security_update(&self, _conn: &Connection, mode: SecurityMode) {
            debug!("security mode updated: {:?}", Debug2Format(&mode));
        }

        fn save_sys_attrs(&self, conn: &Connection) {
            if self
                .peers
                .borrow()
                .iter()
                .any(|p| p.peer_id.is_match(conn.peer_address()))
            {
                let mut sys_attrs = self.sys_attrs.borrow_mut();
                let capacity = sys_attrs.capacity();
                sys_attrs.resize(capacity, 0).unwrap();
                if let Ok(len) = get_sys_attrs(conn, &mut sys_attrs) {
                    sys_attrs.truncate(len);
                }
            }
        }

        fn load_sys_attrs(&self, conn: &Connection) {
            let attrs = self.sys_attrs.borrow();
            let attrs = if self
                .peers
                .borrow()
                .iter()
                .any(|p| p.peer_id.is_match(conn.peer_address()))
                && !attrs.is_empty()
            {
                Some(attrs.as_slice())
            } else {
                None
            };
            if let Err(err) = set_sys_attrs(conn, attrs) {
                warn!("failed to set sys attrs: {:?}", Debug2Format(&err));
            }
        }
    }
}

#[cfg(feature = "embedded")]
pub use bonder::{Bonder, BONDED};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_pair_from_idle_emits_pairing_requested() {
        let mut m = PairingStateMachine::new();
        assert_eq!(m.start_pair(), Some(PairingEvent::PairingRequested));
        assert_eq!(m.state(), PairingState::PairingRequested);
    }

    #[test]
    fn full_happy_path_reaches_bonded() {
        let mut m = PairingStateMachine::new();
        m.start_pair();
        m.pairing_started();
        assert_eq!(m.state(), PairingState::PairingStarted);
        m.bonding_started();
        assert_eq!(m.state(), PairingState::WaitingForBond);
        assert_eq!(m.bonded(), PairingEvent::PairingComplete { ok: true });
        assert!(m.is_bonded());
    }

    #[test]
    fn failed_pairing_allows_retry() {
        let mut m = PairingStateMachine::new();
        m.start_pair();
        m.pairing_started();
        m.bonding_started();
        assert_eq!(m.failed(), PairingEvent::PairingComplete { ok: false });
        assert_eq!(m.state(), PairingState::PairingFailed);

        assert_eq!(m.start_pair(), Some(PairingEvent::PairingRequested));
    }

    #[test]
    fn remove_bond_settles_to_idle() {
        let mut m = PairingStateMachine::new();
        m.start_pair();
        m.pairing_started();
        m.bonding_started();
        m.bonded();
        m.cancel_pair();
        assert_eq!(m.state(), PairingState::Unpairing);
        m.unpaired();
        assert_eq!(m.state(), PairingState::Idle);
    }

    #[test]
    fn start_pair_rejected_mid_attempt() {
        let mut m = PairingStateMachine::new();
        m.start_pair();
        m.pairing_started();
        assert_eq!(m.start_pair(), None);
    }

    #[test]
    fn bond_directory_records_and_lists_devices() {
        let mut dir = BondDirectory::new();
        let addr = [1, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF];
        dir.record(addr);
        assert!(dir.is_bonded(addr));
        assert_eq!(dir.devices(), &[addr]);
    }

    #[test]
    fn bond_directory_record_is_idempotent() {
        let mut dir = BondDirectory::new();
        let addr = [1, 0, 0, 0, 0, 0, 1];
        dir.record(addr);
        dir.record(addr);
        assert_eq!(dir.devices().len(), 1);
    }

    #[test]
    fn bond_directory_forget_removes_entry() {
        let mut dir = BondDirectory::new();
        let addr = [1, 0, 0, 0, 0, 0, 2];
        dir.record(addr);
        assert!(dir.forget(addr));
        assert!(!dir.is_bonded(addr));
        assert!(!dir.forget(addr), "already removed");
    }
}
