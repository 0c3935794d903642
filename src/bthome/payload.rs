//! Payload codec: packs the beacon state into BTHome service data.
//!
//! The set of objects present is fixed once per device image by
//! [`PayloadLayout`]; the layout is validated against the 26-byte
//! advertising budget when it is built, so `encode()` never fails.
//!
//! ```text
//!  [packet id] [battery %]? [voltage]? [button]*N
//!   0x00 u8     0x01 u8     0x0C/0x4A   0x3A u8
//!                           u16 LE
//! ```

use heapless::Vec;

use super::{
    ADV_PAYLOAD_BUDGET, ButtonCode, COUNTER_LEN, HEADER_LEN, MIC_LEN, ObjectId, SERVICE_UUID,
    VoltageResolution, device_info, device_info_version,
};
use crate::error::{DecodeError, Error, Result};

/// Upper bound on configurable buttons: a plaintext payload carrying every
/// optional object plus 8 buttons is exactly 26 bytes.
pub const MAX_BUTTONS: usize = 8;

/// Largest possible object region (everything after the header).
pub const MAX_CONTENT_LEN: usize = ADV_PAYLOAD_BUDGET - HEADER_LEN;

/// Legacy advertising PDU data limit.
pub const MAX_ADV_DATA_LEN: usize = 31;

/// Encoded service data (`[uuid][device info][objects | ciphertext ctr mic]`).
pub type ServiceData = Vec<u8, ADV_PAYLOAD_BUDGET>;

/// Complete advertising data handed to the radio.
pub type AdvData = Vec<u8, MAX_ADV_DATA_LEN>;

const AD_TYPE_FLAGS: u8 = 0x01;
const AD_TYPE_COMPLETE_NAME: u8 = 0x09;
const AD_TYPE_SERVICE_DATA16: u8 = 0x16;
/// LE General Discoverable | BR/EDR Not Supported.
const AD_FLAGS: u8 = 0x06;
const FLAGS_RECORD_LEN: usize = 3;
const AD_RECORD_HEADER_LEN: usize = 2;

/// Bytes the advertised-name AD record occupies (0 when unnamed).
pub const fn name_record_len(name_len: usize) -> usize {
    if name_len == 0 { 0 } else { AD_RECORD_HEADER_LEN + name_len }
}

// ───────────────────────────────────────────────────────────────
// Layout
// ───────────────────────────────────────────────────────────────

/// Which objects this device image carries. Immutable after construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadLayout {
    battery_level: bool,
    battery_voltage: Option<VoltageResolution>,
    button_count: u8,
    encrypted: bool,
}

impl PayloadLayout {
    /// Build a layout and check it against the advertising budget.
    ///
    /// `name_len` is the length of the advertised device name (0 = none).
    pub fn new(
        battery_level: bool,
        battery_voltage: Option<VoltageResolution>,
        button_count: u8,
        encrypted: bool,
        name_len: usize,
    ) -> Result<Self> {
        if button_count as usize > MAX_BUTTONS {
            return Err(Error::Config("button count exceeds MAX_BUTTONS"));
        }
        let layout = Self {
            battery_level,
            battery_voltage,
            button_count,
            encrypted,
        };
        if !layout.fits_with_name(name_len) {
            return Err(Error::Config("payload + name exceed 26-byte advertising budget"));
        }
        Ok(layout)
    }

    pub const fn battery_level(&self) -> bool {
        self.battery_level
    }

    pub const fn battery_voltage(&self) -> Option<VoltageResolution> {
        self.battery_voltage
    }

    pub const fn button_count(&self) -> u8 {
        self.button_count
    }

    pub const fn encrypted(&self) -> bool {
        self.encrypted
    }

    pub const fn device_info(&self) -> u8 {
        device_info(self.encrypted)
    }

    /// Size of the object region (what gets encrypted).
    pub const fn content_len(&self) -> usize {
        let mut len = 1 + ObjectId::PacketId.value_len();
        if self.battery_level {
            len += 1 + ObjectId::Battery.value_len();
        }
        if let Some(res) = self.battery_voltage {
            len += 1 + res.object_id().value_len();
        }
        len + self.button_count as usize * (1 + ObjectId::Button.value_len())
    }

    /// Size of the active (plaintext or encrypted) service data.
    pub const fn encoded_len(&self) -> usize {
        let base = HEADER_LEN + self.content_len();
        if self.encrypted { base + COUNTER_LEN + MIC_LEN } else { base }
    }

    /// Whether the active payload plus a name record fit the budget.
    pub const fn fits_with_name(&self, name_len: usize) -> bool {
        self.encoded_len() + name_record_len(name_len) <= ADV_PAYLOAD_BUDGET
    }
}

// ───────────────────────────────────────────────────────────────
// Plaintext payload
// ───────────────────────────────────────────────────────────────

/// In-memory beacon state, encoded on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    layout: PayloadLayout,
    packet_id: u8,
    battery_level: u8,
    battery_voltage_mv: u16,
    buttons: [ButtonCode; MAX_BUTTONS],
}

impl Payload {
    pub fn new(layout: PayloadLayout) -> Self {
        Self {
            layout,
            packet_id: 0,
            battery_level: 0,
            battery_voltage_mv: 0,
            buttons: [ButtonCode::None; MAX_BUTTONS],
        }
    }

    pub fn layout(&self) -> &PayloadLayout {
        &self.layout
    }

    pub fn packet_id(&self) -> u8 {
        self.packet_id
    }

    /// Configured button slots, in index order.
    pub fn buttons(&self) -> &[ButtonCode] {
        &self.buttons[..self.layout.button_count as usize]
    }

    pub fn battery_level(&self) -> Option<u8> {
        self.layout.battery_level.then_some(self.battery_level)
    }

    pub fn battery_voltage_mv(&self) -> Option<u16> {
        self.layout.battery_voltage.map(|_| self.battery_voltage_mv)
    }

    /// Reset every button slot to `None`.
    pub fn clear_buttons(&mut self) {
        self.buttons.fill(ButtonCode::None);
    }

    /// Report `code` on slot `index`. `None` is a no-op for any index.
    ///
    /// Callers clear the other slots first: at most one button is reported
    /// per advertisement.
    pub fn apply_button(&mut self, index: u8, code: ButtonCode) -> Result<()> {
        if code.is_none() {
            return Ok(());
        }
        if index >= self.layout.button_count {
            return Err(Error::InvalidArgument("button index out of range"));
        }
        self.buttons[index as usize] = code;
        Ok(())
    }

    /// Set the state of charge (clamped to 100).
    pub fn apply_battery_level(&mut self, pct: u8) {
        self.battery_level = pct.min(100);
    }

    pub fn apply_battery_voltage(&mut self, mv: u16) {
        self.battery_voltage_mv = mv;
    }

    /// Advance the packet id. Called once per transmitted advertisement.
    pub fn bump_packet_id(&mut self) {
        self.packet_id = self.packet_id.wrapping_add(1);
    }

    /// The object region only: the plaintext fed to the cipher.
    pub fn content(&self) -> Vec<u8, MAX_CONTENT_LEN> {
        let mut out = Vec::new();
        self.write_content(&mut out);
        out
    }

    /// Full plaintext service data.
    pub fn encode(&self) -> ServiceData {
        let mut out = ServiceData::new();
        write_header(&mut out, self.layout.device_info());
        self.write_content(&mut out);
        out
    }

    fn write_content<const N: usize>(&self, out: &mut Vec<u8, N>) {
        put(out, &[ObjectId::PacketId as u8, self.packet_id]);
        if self.layout.battery_level {
            put(out, &[ObjectId::Battery as u8, self.battery_level]);
        }
        if let Some(res) = self.layout.battery_voltage {
            let raw = res.encode_mv(self.battery_voltage_mv).to_le_bytes();
            put(out, &[res.object_id() as u8, raw[0], raw[1]]);
        }
        for code in self.buttons() {
            put(out, &[ObjectId::Button as u8, code.as_u8()]);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Encrypted payload
// ───────────────────────────────────────────────────────────────

/// Sealed form of [`Payload`]: ciphertext of the object region, the replay
/// counter used in the nonce, and the 4-byte MIC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    ciphertext: Vec<u8, MAX_CONTENT_LEN>,
    counter: u32,
    mic: [u8; MIC_LEN],
}

impl EncryptedPayload {
    /// Zeroed frame sized for `layout`'s object region.
    pub fn new(layout: &PayloadLayout) -> Self {
        let mut ciphertext = Vec::new();
        let sized = ciphertext.resize(layout.content_len(), 0);
        debug_assert!(sized.is_ok(), "payload layout exceeded buffer");
        Self {
            ciphertext,
            counter: 0,
            mic: [0; MIC_LEN],
        }
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    pub fn mic(&self) -> [u8; MIC_LEN] {
        self.mic
    }

    /// Store the result of one encryption.
    ///
    /// `ciphertext` must be exactly as long as the layout's object region.
    pub fn seal(&mut self, ciphertext: &[u8], counter: u32, mic: [u8; MIC_LEN]) -> Result<()> {
        if ciphertext.len() != self.ciphertext.len() {
            return Err(Error::InvalidArgument("ciphertext length does not match layout"));
        }
        self.ciphertext.copy_from_slice(ciphertext);
        self.counter = counter;
        self.mic = mic;
        Ok(())
    }

    pub fn encode(&self) -> ServiceData {
        let mut out = ServiceData::new();
        write_header(&mut out, device_info(true));
        put(&mut out, &self.ciphertext);
        put(&mut out, &self.counter.to_le_bytes());
        put(&mut out, &self.mic);
        out
    }
}

fn write_header<const N: usize>(out: &mut Vec<u8, N>, info: u8) {
    put(out, &SERVICE_UUID.to_le_bytes());
    put(out, &[info]);
}

/// Append bytes that the layout has already been sized for.
fn put<const N: usize>(out: &mut Vec<u8, N>, bytes: &[u8]) {
    let pushed = out.extend_from_slice(bytes);
    debug_assert!(pushed.is_ok(), "payload layout exceeded buffer");
}

// ───────────────────────────────────────────────────────────────
// Advertising data
// ───────────────────────────────────────────────────────────────

/// Wrap service data into legacy advertising data:
/// flags record, service-data record, optional complete-name record.
pub fn advertising_data(service_data: &[u8], name: &str) -> Result<AdvData> {
    let total = FLAGS_RECORD_LEN
        + AD_RECORD_HEADER_LEN
        + service_data.len()
        + name_record_len(name.len());
    if total > MAX_ADV_DATA_LEN {
        return Err(Error::Config("advertising data exceeds 31 bytes"));
    }

    let mut ad = AdvData::new();
    put(&mut ad, &[2, AD_TYPE_FLAGS, AD_FLAGS]);
    put(&mut ad, &[(service_data.len() + 1) as u8, AD_TYPE_SERVICE_DATA16]);
    put(&mut ad, service_data);
    if !name.is_empty() {
        put(&mut ad, &[(name.len() + 1) as u8, AD_TYPE_COMPLETE_NAME]);
        put(&mut ad, name.as_bytes());
    }
    Ok(ad)
}

// ───────────────────────────────────────────────────────────────
// Decoder (listener side)
// ───────────────────────────────────────────────────────────────

/// Objects recovered from a plaintext object region.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedObjects {
    pub packet_id: Option<u8>,
    pub battery_level: Option<u8>,
    /// Millivolts, whichever voltage object was present.
    pub battery_voltage_mv: Option<u16>,
    pub buttons: Vec<ButtonCode, MAX_BUTTONS>,
}

/// A parsed BTHome service-data frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedFrame {
    Plain {
        device_info: u8,
        objects: DecodedObjects,
    },
    Encrypted {
        device_info: u8,
        ciphertext: Vec<u8, MAX_CONTENT_LEN>,
        counter: u32,
        mic: [u8; MIC_LEN],
    },
}

/// Parse service data (starting at the UUID).
pub fn decode(frame: &[u8]) -> core::result::Result<DecodedFrame, DecodeError> {
    if frame.len() < HEADER_LEN {
        return Err(DecodeError::Truncated);
    }
    if u16::from_le_bytes([frame[0], frame[1]]) != SERVICE_UUID {
        return Err(DecodeError::WrongUuid);
    }
    let info = frame[2];
    if device_info_version(info) != 2 {
        return Err(DecodeError::UnsupportedVersion);
    }
    let body = &frame[HEADER_LEN..];

    if info & super::DEVICE_INFO_ENCRYPTED == 0 {
        return Ok(DecodedFrame::Plain {
            device_info: info,
            objects: decode_objects(body)?,
        });
    }

    if body.len() < COUNTER_LEN + MIC_LEN {
        return Err(DecodeError::Truncated);
    }
    let (ct, tail) = body.split_at(body.len() - COUNTER_LEN - MIC_LEN);
    let ciphertext = Vec::from_slice(ct).map_err(|()| DecodeError::TooManyObjects)?;
    let counter = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    let mic = [tail[4], tail[5], tail[6], tail[7]];
    Ok(DecodedFrame::Encrypted {
        device_info: info,
        ciphertext,
        counter,
        mic,
    })
}

/// Parse a plaintext object region (e.g. after decryption).
pub fn decode_objects(mut body: &[u8]) -> core::result::Result<DecodedObjects, DecodeError> {
    let mut objects = DecodedObjects::default();

    while let Some((&raw_id, rest)) = body.split_first() {
        let id = ObjectId::try_from(raw_id).map_err(DecodeError::UnknownObject)?;
        let len = id.value_len();
        if rest.len() < len {
            return Err(DecodeError::Truncated);
        }
        let (value, rest) = rest.split_at(len);

        match id {
            ObjectId::PacketId => objects.packet_id = Some(value[0]),
            ObjectId::Battery => objects.battery_level = Some(value[0]),
            ObjectId::VoltageThousandth | ObjectId::VoltageTenth => {
                let res = if id == ObjectId::VoltageTenth {
                    VoltageResolution::Tenth
                } else {
                    VoltageResolution::Thousandth
                };
                let raw = u16::from_le_bytes([value[0], value[1]]);
                objects.battery_voltage_mv = Some(res.decode_mv(raw));
            }
            ObjectId::Button => {
                let code =
                    ButtonCode::try_from(value[0]).map_err(|_| DecodeError::InvalidValue(raw_id))?;
                objects
                    .buttons
                    .push(code)
                    .map_err(|_| DecodeError::TooManyObjects)?;
            }
        }
        body = rest;
    }

    Ok(objects)
}
