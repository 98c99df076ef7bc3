//! # ble-hid-peripheral firmware
//!
//! Firmware for the **nRF52840** that presents itself as a BLE HID-over-GATT
//! peripheral (mouse + keyboard + consumer control) to a single paired
//! host, driven entirely by the application tasks that enqueue commands on
//! the bluetooth task's serialized work queue.
//!
//! ## Async tasks (Embassy)
//!
//! | Task              | Responsibility                                    |
//! |-------------------|----------------------------------------------------|
//! | `softdevice_task` | Runs the Nordic SoftDevice event loop              |
//! | `bluetooth_task`  | Advertises, accepts the peer, runs the GATT server, drains `BLE_CMD_CHANNEL` |

#![no_std]
#![no_main]

mod advertising;
mod config;
mod connection;
mod error;
mod facade;
mod gatt;
mod handlers;
mod hid;
mod identity;
mod pairing;
mod router;
mod subscription;

use core::cell::RefCell;

use defmt::{info, unwrap, warn};
use defmt_rtt as _;
use panic_probe as _;

use embassy_executor::Spawner;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use heapless::{String, Vec};
use nrf_softdevice::ble::advertisement_builder::{
    AdvertisementDataType, Flag, LegacyAdvertisementBuilder, LegacyAdvertisementPayload, ServiceList,
    ServiceUuid16,
};
use nrf_softdevice::ble::peripheral::{advertise_pairable, ConnectableAdvertisement};
use nrf_softdevice::ble::{gatt_server, Connection};
use static_cell::StaticCell;

use crate::error::Error;
use crate::facade::Facade;
use crate::gatt::HidService;
use crate::identity::{AddressBytes, Identity, IdentityStore};
use crate::pairing::{Bonder, BONDED};
use crate::router::{device_id, notify_with_retry};

/// One operation an application task wants the bluetooth task to perform.
/// Mirrors the public facade surface (§6): every command the facade
/// exposes has exactly one variant here.
pub enum BleCommand {
    MoveMouse { dx: i8, dy: i8 },
    PressMouse(u8),
    ReleaseMouseButtons,
    ClickMouse(u8),
    Scroll(i8),
    SendKey { code: u8, mods: u8 },
    SendKeys { codes: Vec<u8, 6>, mods: u8 },
    ReleaseKeys,
    TypeText(String<64>),
    SendConsumer(u8),
    PlayPause,
    NextTrack,
    PrevTrack,
    VolUp,
    VolDown,
    Mute,
    StartAdvertising,
    StopAdvertising,
    Disconnect,
    RemoveBond(AddressBytes),
    SetAutoConfirm(bool),
}

/// Application → bluetooth task commands.
static BLE_CMD_CHANNEL: Channel<CriticalSectionRawMutex, BleCommand, 8> = Channel::new();

/// Bluetooth task → caller outcome of the command most recently dequeued.
/// A single slot is sufficient: commands are processed one at a time and
/// callers await the result synchronously before issuing another (§5).
static BLE_RESULT: Signal<CriticalSectionRawMutex, Result<(), Error>> = Signal::new();

/// Enqueue a command and wait for the bluetooth task's outcome.
pub async fn dispatch(cmd: BleCommand) -> Result<(), Error> {
    BLE_CMD_CHANNEL.send(cmd).await;
    BLE_RESULT.wait().await
}

fn softdevice_config() -> nrf_softdevice::Config {
    nrf_softdevice::Config {
        clock: Some(nrf_softdevice::raw::nrf_clock_lf_cfg_t {
            source: nrf_softdevice::raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: nrf_softdevice::raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(nrf_softdevice::raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(nrf_softdevice::raw::ble_gatt_conn_cfg_t { att_mtu: 64 }),
        gap_role_count: Some(nrf_softdevice::raw::ble_gap_cfg_role_count_t {
            adv_set_count: 1,
            periph_role_count: 1,
            central_role_count: 0,
            central_sec_count: 0,
            _bitfield_1: nrf_softdevice::raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        // The SoftDevice only accepts a GAP device name at `enable()`
        // time, before flash (and so the persisted identity) can be
        // read - this stays the compiled-in fallback. The name hosts
        // actually display comes from the "Complete Local Name" AD
        // structure in `scan_data`, built from the loaded identity
        // (see `build_scan_data`, DESIGN.md).
        gap_device_name: Some(nrf_softdevice::raw::ble_gap_cfg_device_name_t {
            p_value: config::DEFAULT_DEVICE_NAME.as_ptr() as *mut u8,
            current_len: config::DEFAULT_DEVICE_NAME.len() as u16,
            max_len: config::DEFAULT_DEVICE_NAME.len() as u16,
            write_perm: unsafe { core::mem::zeroed() },
            _bitfield_1: nrf_softdevice::raw::ble_gap_cfg_device_name_t::new_bitfield_1(
                nrf_softdevice::raw::BLE_GATTS_VLOC_STACK as u8,
            ),
        }),
        ..Default::default()
    }
}

#[nrf_softdevice::gatt_server]
struct Server {
    hid: HidService,
}

#[embassy_executor::task]
async fn softdevice_task(sd: &'static nrf_softdevice::Softdevice) -> ! {
    sd.run().await
}

/// Build the primary advertising-data AD structures: flags, the HID
/// service UUID, generic-HID appearance, and a manufacturer-specific-data
/// structure carrying the low 64 bits of the persisted identity UUID
/// (§4.11). The full 128-bit UUID does not fit a 31-byte advertising PDU
/// alongside the structures above; see DESIGN.md.
fn build_adv_data(identity_uuid: u128) -> LegacyAdvertisementPayload {
    let id_bytes = (identity_uuid as u64).to_le_bytes();
    let company = config::NORDIC_COMPANY_ID.to_le_bytes();
    let mut mfg_data: heapless::Vec<u8, 10> = heapless::Vec::new();
    let _ = mfg_data.extend_from_slice(&company);
    let _ = mfg_data.extend_from_slice(&id_bytes);

    LegacyAdvertisementBuilder::new()
        .flags(&[Flag::GeneralDiscovery, Flag::LE_Only])
        .services_16(ServiceList::Incomplete, &[ServiceUuid16::HUMAN_INTERFACE_DEVICE])
        .raw(AdvertisementDataType::APPEARANCE, &config::GAP_APPEARANCE_HID.to_le_bytes())
        .raw(AdvertisementDataType::MANUFACTURER_SPECIFIC_DATA, &mfg_data)
        .build()
}

/// Build the scan-response AD structure: the persisted device name as a
/// Complete Local Name. Falls back to an empty payload if the stored
/// name doesn't fit the scan-response PDU (identity names can be up to
/// 31 bytes; the 31-byte PDU also carries the AD-structure overhead).
fn build_scan_data(device_name: &str) -> LegacyAdvertisementPayload {
    LegacyAdvertisementBuilder::new()
        .full_name(device_name)
        .try_build()
        .unwrap_or_else(|_| LegacyAdvertisementBuilder::new().build())
}

#[embassy_executor::task]
async fn bluetooth_task(sd: &'static nrf_softdevice::Softdevice, server: Server) -> ! {
    static BONDER: StaticCell<Bonder> = StaticCell::new();
    let bonder = BONDER.init(Bonder::new());

    let facade = RefCell::new(Facade::new(false, true));
    unwrap!(facade.borrow_mut().initialize());

    let mut flash = nrf_softdevice::Flash::take(sd);
    let mut identity_store = IdentityStore::new();
    identity_store
        .load_or_create(&mut flash, config::DEFAULT_IDENTITY_SEED, config::DEFAULT_DEVICE_NAME)
        .await;
    let identity: Identity = identity_store
        .get()
        .cloned()
        .unwrap_or_else(|| Identity::new(config::DEFAULT_IDENTITY_SEED, config::DEFAULT_DEVICE_NAME));

    let adv_data = build_adv_data(identity.identity_uuid);
    let scan_data = build_scan_data(identity.device_name.as_str());

    loop {
        let advertisement = ConnectableAdvertisement::ScannableUndirected {
            adv_data: &adv_data,
            scan_data: &scan_data,
        };

        facade.borrow_mut().start_advertising().ok();
        let connection = match advertise_pairable(sd, advertisement, &Default::default(), bonder).await {
            Ok(connection) => {
                info!("peer connected");
                connection
            }
            Err(e) => {
                warn!("advertising failed: {:?}", defmt::Debug2Format(&e));
                continue;
            }
        };

        let device = device_id(&connection);
        let addr_bytes = identity::from_softdevice_address(connection.peer_address());
        let bonded = bonder.is_bonded_addr(connection.peer_address());
        {
            let mut f = facade.borrow_mut();
            if bonded {
                f.record_bond(addr_bytes);
            }
            f.on_connect(device, bonded);
        }

        let router_fut = gatt_server_run(&connection, &server, &facade);
        let command_fut = drain_commands(&connection, &server, &facade, bonder);
        let bond_sync_fut = sync_bonds(&facade);

        embassy_futures::select::select3(router_fut, command_fut, bond_sync_fut).await;

        facade.borrow_mut().on_disconnect();
        info!("peer disconnected");
    }
}

/// Mirrors newly accepted bonds (signalled by `Bonder::on_bonded`, which
/// runs on the SoftDevice event path and has no reference to `Facade`)
/// into the facade's pure bond directory and marks the live peer bonded.
async fn sync_bonds(facade: &RefCell<Facade>) -> ! {
    loop {
        let addr = BONDED.wait().await;
        let mut f = facade.borrow_mut();
        f.record_bond(addr);
        f.mark_bonded();
    }
}

async fn gatt_server_run(connection: &Connection, server: &Server, facade: &RefCell<Facade>) {
    let _ = gatt_server::run(connection, server, |event| {
        let ServerEvent::Hid(hid_event) = event;
        router::handle_event(&mut facade.borrow_mut(), &server.hid, connection, hid_event);
    })
    .await;
}

async fn drain_commands(connection: &Connection, server: &Server, facade: &RefCell<Facade>, bonder: &Bonder) {
    loop {
        let cmd = BLE_CMD_CHANNEL.receive().await;
        let result = process_command(cmd, connection, server, facade, bonder).await;
        BLE_RESULT.signal(result);
    }
}

async fn process_command(
    cmd: BleCommand,
    connection: &Connection,
    server: &Server,
    facade: &RefCell<Facade>,
    bonder: &Bonder,
) -> Result<(), Error> {
    use embassy_time::{Duration, Timer};

    match cmd {
        BleCommand::MoveMouse { dx, dy } => {
            let report = facade.borrow_mut().move_mouse(dx, dy);
            notify_mouse(report, connection, server).await
        }
        BleCommand::PressMouse(mask) => {
            let report = facade.borrow_mut().press_mouse(mask);
            notify_mouse(report, connection, server).await
        }
        BleCommand::ReleaseMouseButtons => {
            let report = facade.borrow_mut().release_mouse_buttons();
            notify_mouse(report, connection, server).await
        }
        BleCommand::Scroll(wheel) => {
            let report = facade.borrow_mut().scroll(wheel);
            notify_mouse(report, connection, server).await
        }
        BleCommand::ClickMouse(mask) => {
            let pair = facade.borrow_mut().click_mouse(mask);
            let (pressed, released) = pair?;
            send_report(connection, server.hid.mouse.value, &pressed.format()).await?;
            Timer::after(Duration::from_millis(config::CLICK_HOLD_MS)).await;
            send_report(connection, server.hid.mouse.value, &released.format()).await
        }
        BleCommand::SendKey { code, mods } => {
            let report = facade.borrow_mut().send_key(code, mods)?;
            send_report(connection, server.hid.keyboard.value, &report.format()).await
        }
        BleCommand::SendKeys { codes, mods } => {
            let report = facade.borrow_mut().send_keys(&codes, mods)?;
            send_report(connection, server.hid.keyboard.value, &report.format()).await
        }
        BleCommand::ReleaseKeys => {
            let report = facade.borrow_mut().release_keys()?;
            send_report(connection, server.hid.keyboard.value, &report.format()).await
        }
        BleCommand::TypeText(text) => {
            let steps = facade.borrow_mut().type_text(text.as_str())?;
            for (press, release) in steps {
                facade.borrow_mut().apply_keyboard_report(press);
                send_report(connection, server.hid.keyboard.value, &press.format()).await?;
                facade.borrow_mut().apply_keyboard_report(release);
                send_report(connection, server.hid.keyboard.value, &release.format()).await?;
                Timer::after(Duration::from_millis(config::TYPE_TEXT_DELAY_MS)).await;
            }
            Ok(())
        }
        BleCommand::SendConsumer(bits) => {
            let pair = facade.borrow_mut().send_consumer(bits);
            let (pressed, released) = pair?;
            send_report(connection, server.hid.consumer.value, &pressed.format()).await?;
            Timer::after(Duration::from_millis(config::CLICK_HOLD_MS)).await;
            send_report(connection, server.hid.consumer.value, &released.format()).await
        }
        BleCommand::PlayPause => {
            let pair = facade.borrow_mut().play_pause();
            notify_consumer_pair(pair, connection, server).await
        }
        BleCommand::NextTrack => {
            let pair = facade.borrow_mut().next_track();
            notify_consumer_pair(pair, connection, server).await
        }
        BleCommand::PrevTrack => {
            let pair = facade.borrow_mut().prev_track();
            notify_consumer_pair(pair, connection, server).await
        }
        BleCommand::VolUp => {
            let pair = facade.borrow_mut().vol_up();
            notify_consumer_pair(pair, connection, server).await
        }
        BleCommand::VolDown => {
            let pair = facade.borrow_mut().vol_down();
            notify_consumer_pair(pair, connection, server).await
        }
        BleCommand::Mute => {
            let pair = facade.borrow_mut().mute();
            notify_consumer_pair(pair, connection, server).await
        }
        BleCommand::StartAdvertising => facade.borrow_mut().start_advertising(),
        BleCommand::StopAdvertising => {
            facade.borrow_mut().stop_advertising();
            Ok(())
        }
        BleCommand::Disconnect => {
            facade.borrow_mut().disconnect()?;
            let _ = connection.disconnect();
            Ok(())
        }
        BleCommand::RemoveBond(addr) => {
            let effects = facade.borrow_mut().remove_bond(addr);
            bonder.remove_bond(identity::to_softdevice_address(addr));
            if effects.disconnect {
                let _ = connection.disconnect();
            }
            Ok(())
        }
        BleCommand::SetAutoConfirm(enabled) => {
            facade.borrow_mut().set_auto_confirm(enabled);
            bonder.set_auto_confirm(enabled);
            Ok(())
        }
    }
}

async fn notify_mouse(
    report: Result<hid::mouse::MouseReport, Error>,
    connection: &Connection,
    server: &Server,
) -> Result<(), Error> {
    let report = report?;
    send_report(connection, server.hid.mouse.value, &report.format()).await
}

async fn notify_consumer_pair(
    pair: Result<(hid::consumer::ConsumerReport, hid::consumer::ConsumerReport), Error>,
    connection: &Connection,
    server: &Server,
) -> Result<(), Error> {
    use embassy_time::{Duration, Timer};
    let (pressed, released) = pair?;
    send_report(connection, server.hid.consumer.value, &pressed.format()).await?;
    Timer::after(Duration::from_millis(config::CLICK_HOLD_MS)).await;
    send_report(connection, server.hid.consumer.value, &released.format()).await
}

async fn send_report(connection: &Connection, handle: u16, bytes: &[u8]) -> Result<(), Error> {
    notify_with_retry(connection, handle, bytes).await
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("ble-hid-peripheral firmware starting");

    let mut nrf_config = embassy_nrf::config::Config::default();
    nrf_config.gpiote_interrupt_priority = embassy_nrf::interrupt::Priority::P2;
    nrf_config.time_interrupt_priority = embassy_nrf::interrupt::Priority::P2;
    let _p = embassy_nrf::init(nrf_config);

    let sd = nrf_softdevice::Softdevice::enable(&softdevice_config());
    unwrap!(spawner.spawn(softdevice_task(sd)));
    info!("SoftDevice started");

    let server = unwrap!(Server::new(sd));
    info!("GATT service database built");

    unwrap!(spawner.spawn(bluetooth_task(sd, server)));
    info!("bluetooth task started");
}
