//! Application-wide constants and compile-time configuration.
//!
//! All protocol timing and storage parameters live here so they can be
//! tuned in one place, the way the firmware this is adapted from keeps its
//! own `config.rs`.

// BLE connection & advertising

/// BLE connection interval range (in 1.25 ms units).
/// 6 = 7.5 ms (lowest latency for HID).
pub const BLE_CONN_INTERVAL_MIN: u16 = 6;
pub const BLE_CONN_INTERVAL_MAX: u16 = 12;

/// BLE slave latency (number of connection events the peripheral can skip).
pub const BLE_SLAVE_LATENCY: u16 = 0;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

/// Default advertising interval (in 0.625 ms units) for the Balanced mode.
pub const ADV_INTERVAL_BALANCED: u32 = 100;
/// Default advertising interval for LowPower mode.
pub const ADV_INTERVAL_LOW_POWER: u32 = 1000;
/// Default advertising interval for LowLatency mode.
pub const ADV_INTERVAL_LOW_LATENCY: u32 = 20;

/// Default advertising timeout (seconds); 0 = advertise indefinitely.
pub const ADV_TIMEOUT_SECS: u16 = 180;

/// GAP appearance value advertised for a generic HID device (0x03C0 = HID).
pub const GAP_APPEARANCE_HID: u16 = 0x03C0;

// Report handler timing (C4)

/// Maximum notification send attempts before surfacing `NotifyFailed`.
pub const NOTIFY_RETRY_COUNT: u8 = 2;

/// Backoff between notification retry attempts.
pub const NOTIFY_RETRY_BACKOFF_MS: u64 = 10;

/// Minimum delay a synthesized press/release pair (`click`) holds the
/// button down before releasing.
pub const CLICK_HOLD_MS: u64 = 10;

/// Minimum delay `type_text` waits between successive keystrokes.
pub const TYPE_TEXT_DELAY_MS: u64 = 50;

// Identity / bond storage (C11)

/// Maximum number of bonded devices tracked in storage.
pub const MAX_BONDED_DEVICES: usize = 4;

/// Flash page index where identity/bond storage starts (4 KB per page on
/// nRF52840).
pub const STORAGE_FLASH_PAGE_START: u32 = 240;

/// Number of flash pages reserved for identity/bond storage.
pub const STORAGE_FLASH_PAGE_COUNT: u32 = 4;

/// Default device name used the first time an identity is generated.
pub const DEFAULT_DEVICE_NAME: &str = "BLE HID Device";

/// Seed used to generate `identity_uuid` the first time no persisted
/// identity is found. Fixed rather than random: this build has no TRNG
/// wiring, so "generated once" means "derived from this constant once,
/// then persisted" rather than cryptographically random.
pub const DEFAULT_IDENTITY_SEED: u128 = 0x4249_4431_3248_4944_0000_0000_0000_0001;

/// Bluetooth SIG company identifier for Nordic Semiconductor ASA, used in
/// the manufacturer-specific-data AD structure that advertises the
/// identity UUID (§4.11).
pub const NORDIC_COMPANY_ID: u16 = 0x0059;
