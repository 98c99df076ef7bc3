//! Identity store (C11).
//!
//! Persists `{identity_uuid, device_name, last_paired}` across restarts.
//! The record layout and (de)serialization are pure and host-testable; the
//! embedded `IdentityStore` persists it to internal flash through
//! `sequential-storage`, following the donor firmware's
//! `storage::DeviceStore` pattern.

const NAME_CAPACITY: usize = 32;

/// A BLE address, address-type byte first then the 6 address bytes -
/// kept as raw bytes here so this module stays usable on the host without
/// `nrf-softdevice`.
pub type AddressBytes = [u8; 7];

/// The persisted peripheral identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub identity_uuid: u128,
    pub device_name: heapless::String<NAME_CAPACITY>,
    pub last_paired: Option<AddressBytes>,
}

impl Identity {
    pub fn new(identity_uuid: u128, device_name: &str) -> Self {
        let mut name = heapless::String::new();
        for c in device_name.chars().take(NAME_CAPACITY - 1) {
            let _ = name.push(c);
        }
        Self {
            identity_uuid,
            device_name: name,
            last_paired: None,
        }
    }

    /// Serialized layout: `[uuid:16][name_len:1][name:name_len][has_addr:1][addr:7]`.
    pub fn serialize(&self, buf: &mut [u8]) -> Option<usize> {
        let name_bytes = self.device_name.as_bytes();
        let total = 16 + 1 + name_bytes.len() + 1 + 7;
        if buf.len() < total {
            return None;
        }
        buf[0..16].copy_from_slice(&self.identity_uuid.to_le_bytes());
        buf[16] = name_bytes.len() as u8;
        let mut off = 17;
        buf[off..off + name_bytes.len()].copy_from_slice(name_bytes);
        off += name_bytes.len();
        match self.last_paired {
            Some(addr) => {
                buf[off] = 1;
                buf[off + 1..off + 8].copy_from_slice(&addr);
            }
            None => {
                buf[off] = 0;
                buf[off + 1..off + 8].copy_from_slice(&[0u8; 7]);
            }
        }
        Some(total)
    }

    pub fn deserialize(data: &[u8]) -> Option<Self> {
        if data.len() < 17 {
            return None;
        }
        let mut uuid_bytes = [0u8; 16];
        uuid_bytes.copy_from_slice(&data[0..16]);
        let identity_uuid = u128::from_le_bytes(uuid_bytes);

        let name_len = data[16] as usize;
        if data.len() < 17 + name_len + 8 {
            return None;
        }
        let name_slice = &data[17..17 + name_len];
        let mut device_name = heapless::String::new();
        let s = core::str::from_utf8(name_slice).ok()?;
        for c in s.chars().take(NAME_CAPACITY - 1) {
            let _ = device_name.push(c);
        }

        let off = 17 + name_len;
        let has_addr = data[off];
        let last_paired = if has_addr == 1 {
            let mut addr = [0u8; 7];
            addr.copy_from_slice(&data[off + 1..off + 8]);
            Some(addr)
        } else {
            None
        };

        Some(Self {
            identity_uuid,
            device_name,
            last_paired,
        })
    }

    pub fn set_identity(&mut self, identity_uuid: u128, device_name: &str) {
        self.identity_uuid = identity_uuid;
        self.device_name.clear();
        for c in device_name.chars().take(NAME_CAPACITY - 1) {
            let _ = self.device_name.push(c);
        }
    }
}

/// Convert a SoftDevice link-layer address into the 7-byte form the pure
/// pairing/identity layer uses (type byte first), following the donor
/// firmware's `storage::PairedDevice` address encoding.
#[cfg(feature = "embedded")]
pub fn from_softdevice_address(addr: nrf_softdevice::ble::Address) -> AddressBytes {
    use nrf_softdevice::ble::AddressType;
    let ty = match addr.address_type() {
        AddressType::Public => 0u8,
        AddressType::RandomStatic => 1u8,
        AddressType::RandomPrivateResolvable => 2u8,
        AddressType::RandomPrivateNonResolvable => 3u8,
        AddressType::Anonymous => 4u8,
    };
    let b = addr.bytes;
    [ty, b[0], b[1], b[2], b[3], b[4], b[5]]
}

/// Inverse of [`from_softdevice_address`].
#[cfg(feature = "embedded")]
pub fn to_softdevice_address(addr: AddressBytes) -> nrf_softdevice::ble::Address {
    use nrf_softdevice::ble::{Address, AddressType};
    let ty = match addr[0] {
        0 => AddressType::Public,
        1 => AddressType::RandomStatic,
        2 => AddressType::RandomPrivateResolvable,
        3 => AddressType::RandomPrivateNonResolvable,
        4 => AddressType::Anonymous,
        _ => AddressType::RandomStatic,
    };
    Address::new(ty, [addr[1], addr[2], addr[3], addr[4], addr[5], addr[6]])
}

#[cfg(feature = "embedded")]
mod flash_store {
    use super::Identity;
    use crate::config::{STORAGE_FLASH_PAGE_COUNT, STORAGE_FLASH_PAGE_START};
    use defmt::{error, info};

    const FLASH_PAGE_SIZE: u32 = 4096;
    const STORAGE_START: u32 = STORAGE_FLASH_PAGE_START * FLASH_PAGE_SIZE;
    const STORAGE_END: u32 = (STORAGE_FLASH_PAGE_START + STORAGE_FLASH_PAGE_COUNT) * FLASH_PAGE_SIZE;
    const KEY_IDENTITY: u8 = 0x01;
    const MAX_RECORD_SIZE: usize = 64;

    /// Flash-backed home for the single `Identity` record.
    pub struct IdentityStore {
        current: Option<Identity>,
    }

    impl IdentityStore {
        pub const fn new() -> Self {
            Self { current: None }
        }

        pub fn get(&self) -> Option<&Identity> {
            self.current.as_ref()
        }

        /// Load the persisted identity, or generate and persist a fresh
        /// one if absent.
        pub async fn load_or_create(
            &mut self,
            flash: &mut impl embedded_storage_async::nor_flash::NorFlash,
            default_uuid: u128,
            default_name: &str,
        ) {
            let flash_range = STORAGE_START..STORAGE_END;
            let mut buf = [0u8; MAX_RECORD_SIZE];

            let loaded = sequential_storage::map::fetch_item::<u8, &[u8], _>(
                flash,
                flash_range.clone(),
                &mut sequential_storage::cache::NoCache::new(),
                &mut buf,
                &KEY_IDENTITY,
            )
            .await
            .ok()
            .flatten()
            .and_then(Identity::deserialize);

            match loaded {
                Some(identity) => {
                    info!("loaded persisted identity");
                    self.current = Some(identity);
                }
                None => {
                    info!("no persisted identity, generating one");
                    let identity = Identity::new(default_uuid, default_name);
                    self.current = Some(identity.clone());
                    self.persist(flash, &identity).await;
                }
            }
        }

        pub async fn set_identity(
            &mut self,
            flash: &mut impl embedded_storage_async::nor_flash::NorFlash,
            identity_uuid: u128,
            device_name: &str,
        ) {
            let mut identity = self.current.clone().unwrap_or_else(|| {
                Identity::new(identity_uuid, device_name)
            });
            identity.set_identity(identity_uuid, device_name);
            self.persist(flash, &identity).await;
            self.current = Some(identity);
        }

        async fn persist(
            &self,
            flash: &mut impl embedded_storage_async::nor_flash::NorFlash,
            identity: &Identity,
        ) {
            let flash_range = STORAGE_START..STORAGE_END;
            let mut buf = [0u8; MAX_RECORD_SIZE];
            let mut data_buf = [0u8; MAX_RECORD_SIZE];
            let Some(len) = identity.serialize(&mut data_buf) else {
                error!("identity record too large to serialize");
                return;
            };

            if let Err(e) = sequential_storage::map::store_item::<u8, &[u8], _>(
                flash,
                flash_range,
                &mut sequential_storage::cache::NoCache::new(),
                &mut buf,
                &KEY_IDENTITY,
                &&data_buf[..len],
            )
            .await
            {
                error!("identity flash write failed: {:?}", defmt::Debug2Format(&e));
            }
        }
    }

    impl Default for IdentityStore {
        fn default() -> Self {
            Self::new()
        }
    }
}

#[cfg(feature = "embedded")]
pub use flash_store::IdentityStore;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_identity_has_no_last_paired() {
        let id = Identity::new(0x1234_5678, "My Device");
        assert_eq!(id.last_paired, None);
        assert_eq!(id.device_name.as_str(), "My Device");
    }

    #[test]
    fn serialize_deserialize_round_trips() {
        let mut id = Identity::new(0xAABB_CCDD, "Wireless Mouse");
        id.last_paired = Some([1, 0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01]);

        let mut buf = [0u8; 64];
        let len = id.serialize(&mut buf).unwrap();
        let parsed = Identity::deserialize(&buf[..len]).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn deserialize_rejects_truncated_data() {
        assert!(Identity::deserialize(&[0u8; 5]).is_none());
    }

    #[test]
    fn set_identity_replaces_uuid_and_name() {
        let mut id = Identity::new(1, "Old");
        id.set_identity(2, "New Name");
        assert_eq!(id.identity_uuid, 2);
        assert_eq!(id.device_name.as_str(), "New Name");
    }

    #[test]
    fn name_longer_than_capacity_is_truncated() {
        let long = "x".repeat(64);
        let id = Identity::new(1, &long);
        assert!(id.device_name.len() < 64);
        assert!(id.device_name.len() <= 31);
    }
}
