//! Device identity derived from the ESP32 Bluetooth MAC address.
//!
//! The BT MAC is the controller's public identity address. `esp_read_mac`
//! returns it most significant byte first; the controller (and the BTHome
//! nonce builder) take it least significant byte first.

use core::fmt::Write;

/// 6-byte MAC address, most significant byte first.
pub type MacAddress = [u8; 6];

/// Read the factory Bluetooth MAC from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_bt_mac() -> Option<MacAddress> {
    use esp_idf_svc::sys::*;

    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: the buffer is 6 bytes, as esp_read_mac requires.
    let ret = unsafe { esp_read_mac(mac.as_mut_ptr(), esp_mac_type_t_ESP_MAC_BT) };
    (ret == ESP_OK as i32).then_some(mac)
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_bt_mac() -> Option<MacAddress> {
    Some([0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE])
}

/// Convert a printed (MSB-first) MAC into controller byte order.
pub fn controller_order(mac: &MacAddress) -> [u8; 6] {
    let mut addr = *mac;
    addr.reverse();
    addr
}

/// Default advertised name from the last 3 MAC bytes.
/// Format: `BTHome-XXYYZZ`.
pub fn default_name(mac: &MacAddress) -> heapless::String<24> {
    let mut name = heapless::String::<24>::new();
    let _ = write!(name, "BTHome-{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5]);
    name
}
