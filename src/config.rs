//! Beacon configuration.
//!
//! Everything here is fixed once per device image: which objects the
//! payload carries, the advertised name, the bind key and the burst
//! limits. Values come from the build environment (see
//! [`BeaconConfig::from_build_env`]) and are validated before any
//! advertising state is built.

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::app::ports::AdvertiseParams;
use crate::bthome::VoltageResolution;
use crate::bthome::cipher::{EncryptionKey, KEY_HEX_LEN};
use crate::bthome::payload::{MAX_BUTTONS, PayloadLayout};
use crate::error::{Error, Result};

pub const MAX_NAME_LEN: usize = 24;

/// Core beacon configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconConfig {
    // --- Advertisement ---
    /// Complete local name; empty = no name record
    pub device_name: String<MAX_NAME_LEN>,

    // --- Objects ---
    /// Number of logical buttons (0..=MAX_BUTTONS)
    pub button_count: u8,
    /// Report battery state of charge (object 0x01)
    pub battery_level: bool,
    /// Report battery voltage, at the given resolution
    pub battery_voltage: Option<VoltageResolution>,

    // --- Encryption ---
    /// 32-char hex bind key; `Some` enables encryption
    pub encryption_key: Option<String<KEY_HEX_LEN>>,

    // --- Burst ---
    /// Advertising duration per event, 10 ms units (0 = unbounded)
    pub adv_timeout_10ms: u16,
    /// Advertising events per burst (0 = unbounded)
    pub adv_max_events: u8,
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            device_name: String::new(),
            button_count: 0,
            battery_level: true,
            battery_voltage: None,
            encryption_key: None,
            adv_timeout_10ms: 100, // 1 s
            adv_max_events: 10,
        }
    }
}

impl BeaconConfig {
    /// Resolve the `BTHOME_*` variables captured at compile time.
    ///
    /// Unset variables keep their [`Default`] value. The result is
    /// validated.
    pub fn from_build_env() -> Result<Self> {
        Self::from_vars(|var| match var {
            "BTHOME_DEVICE_NAME" => option_env!("BTHOME_DEVICE_NAME"),
            "BTHOME_BUTTON_COUNT" => option_env!("BTHOME_BUTTON_COUNT"),
            "BTHOME_ENCRYPTION_KEY" => option_env!("BTHOME_ENCRYPTION_KEY"),
            "BTHOME_BATTERY_LEVEL" => option_env!("BTHOME_BATTERY_LEVEL"),
            "BTHOME_BATTERY_VOLTAGE" => option_env!("BTHOME_BATTERY_VOLTAGE"),
            "BTHOME_ADV_TIMEOUT" => option_env!("BTHOME_ADV_TIMEOUT"),
            "BTHOME_ADV_PACKETS" => option_env!("BTHOME_ADV_PACKETS"),
            _ => None,
        })
    }

    fn from_vars<'a>(var: impl Fn(&str) -> Option<&'a str>) -> Result<Self> {
        let mut cfg = Self::default();
        if let Some(name) = var("BTHOME_DEVICE_NAME") {
            cfg.device_name = String::try_from(name)
                .map_err(|()| Error::Config("device name longer than 24 bytes"))?;
        }
        if let Some(buttons) = var("BTHOME_BUTTON_COUNT") {
            cfg.button_count = buttons
                .trim()
                .parse()
                .map_err(|_| Error::Config("BTHOME_BUTTON_COUNT is not a number"))?;
        }
        if let Some(key) = var("BTHOME_ENCRYPTION_KEY").filter(|k| !k.is_empty()) {
            cfg.encryption_key = Some(
                String::try_from(key)
                    .map_err(|()| Error::Config("encryption key must be 32 hex characters"))?,
            );
        }
        if let Some(level) = var("BTHOME_BATTERY_LEVEL") {
            cfg.battery_level = parse_flag(level)
                .ok_or(Error::Config("BTHOME_BATTERY_LEVEL must be y or n"))?;
        }
        if let Some(voltage) = var("BTHOME_BATTERY_VOLTAGE") {
            cfg.battery_voltage = parse_voltage(voltage)?;
        }
        if let Some(timeout) = var("BTHOME_ADV_TIMEOUT") {
            cfg.adv_timeout_10ms = timeout
                .trim()
                .parse()
                .map_err(|_| Error::Config("BTHOME_ADV_TIMEOUT is not a number of 10 ms units"))?;
        }
        if let Some(packets) = var("BTHOME_ADV_PACKETS") {
            cfg.adv_max_events = packets
                .trim()
                .parse()
                .map_err(|_| Error::Config("BTHOME_ADV_PACKETS is not a number (0..=255)"))?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check every construction-time invariant.
    pub fn validate(&self) -> Result<()> {
        if self.button_count as usize > MAX_BUTTONS {
            return Err(Error::Config("button count exceeds MAX_BUTTONS"));
        }
        if self.adv_timeout_10ms == 0 && self.adv_max_events == 0 {
            return Err(Error::Config("advertising burst must be bounded"));
        }
        if let Some(key) = &self.encryption_key {
            EncryptionKey::from_hex(key)?;
        }
        self.layout().map(|_| ())
    }

    pub fn encrypted(&self) -> bool {
        self.encryption_key.is_some()
    }

    /// Payload layout for this image, checked against the advertising
    /// budget together with the name record.
    pub fn layout(&self) -> Result<PayloadLayout> {
        PayloadLayout::new(
            self.battery_level,
            self.battery_voltage,
            self.button_count,
            self.encrypted(),
            self.device_name.len(),
        )
    }

    /// Decoded bind key, if encryption is enabled.
    pub fn key(&self) -> Result<Option<EncryptionKey>> {
        self.encryption_key
            .as_deref()
            .map(EncryptionKey::from_hex)
            .transpose()
    }

    pub fn advertise_params(&self) -> AdvertiseParams {
        AdvertiseParams {
            timeout_10ms: self.adv_timeout_10ms,
            max_events: self.adv_max_events,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim() {
        "y" | "yes" | "1" | "true" | "on" => Some(true),
        "n" | "no" | "0" | "false" | "off" => Some(false),
        _ => None,
    }
}

fn parse_voltage(raw: &str) -> Result<Option<VoltageResolution>> {
    match raw.trim() {
        "" | "none" | "off" => Ok(None),
        "mv" | "thousandth" | "0.001" => Ok(Some(VoltageResolution::Thousandth)),
        "tenth" | "0.1" => Ok(Some(VoltageResolution::Tenth)),
        _ => Err(Error::Config("BTHOME_BATTERY_VOLTAGE must be none, mv or tenth")),
    }
}
