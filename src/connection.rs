//! Connection manager (C7).
//!
//! Enforces the single-peer invariant and the retain-after-disconnect
//! rule. Pure and host-testable: it only ever reasons about whether a peer
//! is present, bonded, and what the in-flight pairing state is - the
//! actual `nrf_softdevice::ble::Connection` handle is carried by the
//! embedded GATT task, not by this type.

use crate::pairing::PairingState;

/// Effects the caller must carry out after a connect event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectEffects {
    pub stop_advertising: bool,
    pub initiate_bonding: bool,
}

/// Effects the caller must carry out after a disconnect event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisconnectEffects {
    /// Keep the peer reference so pending state can flush once the link
    /// re-establishes.
    pub retain_peer: bool,
    pub restart_advertising: bool,
}

/// Minimal peer record the manager needs: whether this peer already holds
/// a bond, independent of the in-flight `PairingStateMachine` (which tracks
/// the *current* pairing attempt, if any).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeerInfo {
    pub bonded: bool,
}

pub struct ConnectionManager {
    /// Set while the link layer reports a connected peer.
    link_connected: bool,
    /// The peer reference, possibly retained across a disconnect per the
    /// rule in §4.7 even when `link_connected` is false.
    peer: Option<PeerInfo>,
    /// Require a bond before accepting HID traffic; new connections that
    /// are not yet bonded trigger pairing.
    require_bonding: bool,
    /// Restart advertising automatically once no peer remains.
    auto_advertise: bool,
}

impl ConnectionManager {
    pub const fn new(require_bonding: bool, auto_advertise: bool) -> Self {
        Self {
            link_connected: false,
            peer: None,
            require_bonding,
            auto_advertise,
        }
    }

    /// Whether a peer is connected *right now*; `false` during a gap even
    /// if a bonded peer's reference is retained for when the link returns.
    pub const fn is_connected(&self) -> bool {
        self.link_connected
    }

    pub const fn peer(&self) -> Option<PeerInfo> {
        self.peer
    }

    /// A link-layer connect event arrived for a peer already bonded (or
    /// not). Exactly one peer is ever tracked; a second connect attempt
    /// never reaches this call because advertising is stopped while
    /// connected (§4.7).
    pub fn on_connect(&mut self, bonded: bool) -> ConnectEffects {
        self.link_connected = true;
        self.peer = Some(PeerInfo { bonded });
        ConnectEffects {
            stop_advertising: true,
            initiate_bonding: self.require_bonding && !bonded,
        }
    }

    /// A link-layer disconnect event arrived. `pairing_state` is the
    /// current state of the in-flight pairing attempt (if any) for the
    /// peer that just disconnected.
    pub fn on_disconnect(&mut self, pairing_state: PairingState) -> DisconnectEffects {
        self.link_connected = false;
        let was_bonded = self.peer.map(|p| p.bonded).unwrap_or(false);
        let retain = was_bonded
            && matches!(pairing_state, PairingState::Idle | PairingState::Bonded);

        if !retain {
            self.peer = None;
        }

        DisconnectEffects {
            retain_peer: retain,
            restart_advertising: self.auto_advertise && self.peer.is_none(),
        }
    }

    /// Mark the retained peer as bonded once pairing completes post-reconnect.
    pub fn mark_bonded(&mut self) {
        if let Some(peer) = self.peer.as_mut() {
            peer.bonded = true;
        }
    }
}
