//! Advertising radio adapter.
//!
//! Implements [`AdvertiserPort`] and [`IdentityPort`].
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid extended-advertising API with a
//!   single legacy, non-connectable, non-scannable set. A burst ends with
//!   `ESP_GAP_BLE_ADV_TERMINATED_EVT`, which is forwarded to
//!   [`BeaconHandle::notify_sent`].
//! - **all other targets**: [`SimAdvertiser`], an in-memory recorder for
//!   host-side tests.

use crate::app::ports::{AdvertiseParams, AdvertiserPort, IdentityPort};
use crate::app::service::BeaconHandle;
use crate::error::RadioError;

// ── Completion hook ───────────────────────────────────────────
//
// The GAP callback is a plain C function and cannot capture the handle,
// so it is parked in a static once at startup.

static COMPLETION: std::sync::OnceLock<BeaconHandle> = std::sync::OnceLock::new();

/// Route transport completions to `handle`. Only the first call wins.
pub fn install_completion_hook(handle: BeaconHandle) -> bool {
    COMPLETION.set(handle).is_ok()
}

/// Deliver a completion to the installed handle, if any.
fn forward_completion() {
    match COMPLETION.get() {
        Some(handle) => handle.notify_sent(),
        None => log::warn!("Advertising completed before a handle was installed"),
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF (Bluedroid)
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
mod esp {
    use esp_idf_svc::bt::{Ble, BtDriver};
    use esp_idf_svc::hal::modem::BluetoothModemPeripheral;
    use esp_idf_svc::hal::peripheral::Peripheral;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::sys::*;
    use log::{error, info};

    use super::*;
    use crate::adapters::identity;

    const ADV_INSTANCE: u8 = 0;
    /// Legacy PDU, non-connectable, non-scannable, undirected.
    const ADV_PROP_LEGACY_NONCONN: u16 = 0x0010;
    /// 100 ms in 0.625 ms units.
    const ADV_INTERVAL: u32 = 160;

    unsafe extern "C" fn gap_event_handler(
        event: esp_gap_ble_cb_event_t,
        _param: *mut esp_ble_gap_cb_param_t,
    ) {
        match event {
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_TERMINATED_EVT => forward_completion(),
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_EXT_ADV_START_COMPLETE_EVT => {
                log::debug!("BLE GAP: advertising burst started");
            }
            _ => {}
        }
    }

    fn check(ret: esp_err_t) -> Result<(), i32> {
        if ret == ESP_OK as i32 { Ok(()) } else { Err(ret) }
    }

    /// Bring up the controller and Bluedroid in BLE-only mode and register
    /// the GAP callback. The returned driver must outlive every advertiser.
    pub fn start_bluetooth(
        modem: impl Peripheral<P = impl BluetoothModemPeripheral> + 'static,
        nvs: Option<EspDefaultNvsPartition>,
    ) -> Result<BtDriver<'static, Ble>, RadioError> {
        let driver = BtDriver::<Ble>::new(modem, nvs).map_err(|e| {
            error!("BLE: controller init failed ({})", e);
            RadioError::CreateFailed(e.code())
        })?;
        // SAFETY: Bluedroid is enabled by the driver above; the handler is
        // a plain function with 'static lifetime.
        check(unsafe { esp_ble_gap_register_callback(Some(gap_event_handler)) })
            .map_err(RadioError::CreateFailed)?;
        info!("BLE: Bluedroid enabled");
        Ok(driver)
    }

    /// Extended-advertising set driven through Bluedroid.
    #[derive(Debug, Default)]
    pub struct EspAdvertiser {
        created: bool,
    }

    impl EspAdvertiser {
        pub fn new() -> Self {
            Self { created: false }
        }

        pub fn is_created(&self) -> bool {
            self.created
        }
    }

    impl AdvertiserPort for EspAdvertiser {
        fn is_ready(&self) -> bool {
            // SAFETY: status query with no arguments.
            unsafe { esp_bluedroid_get_status() == esp_bluedroid_status_t_ESP_BLUEDROID_STATUS_ENABLED }
        }

        fn create_advertiser(&mut self) -> Result<(), RadioError> {
            if !self.is_ready() {
                return Err(RadioError::NotReady);
            }
            // SAFETY: an all-zero parameter block is valid; every field the
            // controller reads is set below.
            let mut params: esp_ble_gap_ext_adv_params_t = unsafe { core::mem::zeroed() };
            params.type_ = ADV_PROP_LEGACY_NONCONN;
            params.interval_min = ADV_INTERVAL;
            params.interval_max = ADV_INTERVAL;
            params.channel_map = adv_channel_t_ADV_CHNL_ALL;
            params.own_addr_type = esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC;
            params.filter_policy = esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY;
            params.tx_power = 0x7F;
            params.primary_phy = ESP_BLE_GAP_PHY_1M as _;
            params.secondary_phy = ESP_BLE_GAP_PHY_1M as _;

            // SAFETY: `params` outlives the call; Bluedroid copies it.
            let ret = unsafe { esp_ble_gap_ext_adv_set_params(ADV_INSTANCE, &params) };
            check(ret).map_err(|rc| {
                error!("BLE: ext_adv_set_params failed ({})", rc);
                RadioError::CreateFailed(rc)
            })?;
            self.created = true;
            Ok(())
        }

        fn set_data(&mut self, data: &[u8]) -> Result<(), RadioError> {
            // SAFETY: Bluedroid copies `data` before returning.
            let ret = unsafe {
                esp_ble_gap_config_ext_adv_data_raw(ADV_INSTANCE, data.len() as u16, data.as_ptr())
            };
            check(ret).map_err(RadioError::SetDataFailed)
        }

        fn start(&mut self, params: AdvertiseParams) -> Result<(), RadioError> {
            let burst = esp_ble_gap_ext_adv_t {
                instance: ADV_INSTANCE,
                duration: params.timeout_10ms as _,
                max_events: params.max_events as _,
            };
            // SAFETY: one-element array, copied by Bluedroid.
            let ret = unsafe { esp_ble_gap_ext_adv_start(1, &burst) };
            check(ret).map_err(RadioError::StartFailed)
        }
    }

    impl IdentityPort for EspAdvertiser {
        fn device_address(&self) -> Option<[u8; 6]> {
            identity::read_bt_mac().map(|mac| identity::controller_order(&mac))
        }
    }
}

#[cfg(target_os = "espidf")]
pub use esp::{EspAdvertiser, start_bluetooth};

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

/// In-memory advertiser for host builds. Every knob is public so tests
/// can inject failures between cycles.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone)]
pub struct SimAdvertiser {
    /// Reported by [`AdvertiserPort::is_ready`].
    pub ready: bool,
    /// Identity address in controller order; `None` = unresolved.
    pub address: Option<[u8; 6]>,
    pub fail_set_data: Option<i32>,
    pub fail_start: Option<i32>,
    created: bool,
    data: Vec<Vec<u8>>,
    starts: Vec<AdvertiseParams>,
}

#[cfg(not(target_os = "espidf"))]
impl Default for SimAdvertiser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl SimAdvertiser {
    pub fn new() -> Self {
        Self {
            ready: true,
            address: crate::adapters::identity::read_bt_mac()
                .map(|mac| crate::adapters::identity::controller_order(&mac)),
            fail_set_data: None,
            fail_start: None,
            created: false,
            data: Vec::new(),
            starts: Vec::new(),
        }
    }

    /// Simulated controller with identity `address` (controller order).
    pub fn with_address(address: Option<[u8; 6]>) -> Self {
        Self {
            address,
            ..Self::new()
        }
    }

    /// Simulated controller whose Bluetooth stack has not come up yet.
    pub fn not_ready() -> Self {
        Self {
            ready: false,
            ..Self::new()
        }
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Every advertising data block handed to [`AdvertiserPort::set_data`].
    pub fn data_history(&self) -> &[Vec<u8>] {
        &self.data
    }

    /// Advertising data of the most recent `set_data`.
    pub fn last_data(&self) -> Option<&[u8]> {
        self.data.last().map(|d| d.as_slice())
    }

    /// Parameters of every successful `start`.
    pub fn starts(&self) -> &[AdvertiseParams] {
        &self.starts
    }

    /// Simulate the controller ending the current burst.
    pub fn complete_burst(&self) {
        forward_completion();
    }
}

#[cfg(not(target_os = "espidf"))]
impl AdvertiserPort for SimAdvertiser {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn create_advertiser(&mut self) -> Result<(), RadioError> {
        if !self.ready {
            return Err(RadioError::NotReady);
        }
        self.created = true;
        log::info!("BLE(sim): advertiser created");
        Ok(())
    }

    fn set_data(&mut self, data: &[u8]) -> Result<(), RadioError> {
        if let Some(rc) = self.fail_set_data {
            return Err(RadioError::SetDataFailed(rc));
        }
        self.data.push(data.to_vec());
        Ok(())
    }

    fn start(&mut self, params: AdvertiseParams) -> Result<(), RadioError> {
        if let Some(rc) = self.fail_start {
            return Err(RadioError::StartFailed(rc));
        }
        self.starts.push(params);
        log::info!(
            "BLE(sim): burst started ({} bytes, {}0 ms / {} events)",
            self.data.last().map_or(0, |d| d.len()),
            params.timeout_10ms,
            params.max_events
        );
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
impl IdentityPort for SimAdvertiser {
    fn device_address(&self) -> Option<[u8; 6]> {
        self.address
    }
}
