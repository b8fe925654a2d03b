//! Bluetooth SIG UUIDs used by the Heart Rate profile.
//!
//! Assigned numbers are 16-bit values placed into the Bluetooth base UUID
//! `0000xxxx-0000-1000-8000-00805f9b34fb`. [`parse`] accepts the short forms
//! as well as the full 128-bit form, in any letter case.

use uuid::Uuid;

use crate::error::{ParseError, ParseResult};

/// The Bluetooth base UUID (`00000000-0000-1000-8000-00805f9b34fb`).
pub const BLUETOOTH_BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

const SHORT_MASK: u128 = 0xFFFF_FFFF << 96;

/// Expand a 16-bit assigned number into a full UUID.
pub const fn from_short(short: u16) -> Uuid {
    from_short32(short as u32)
}

/// Expand a 32-bit assigned number into a full UUID.
pub const fn from_short32(short: u32) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

// --- Heart Rate service ---

/// Heart Rate service (`180D`).
pub const HEART_RATE_SERVICE: Uuid = from_short(0x180D);

/// Heart Rate Measurement characteristic (`2A37`), notify only.
pub const HEART_RATE_MEASUREMENT: Uuid = from_short(0x2A37);

/// Body Sensor Location characteristic (`2A38`), read only.
pub const BODY_SENSOR_LOCATION: Uuid = from_short(0x2A38);

// --- Battery service ---

/// Battery service (`180F`).
pub const BATTERY_SERVICE: Uuid = from_short(0x180F);

/// Battery Level characteristic (`2A19`).
pub const BATTERY_LEVEL: Uuid = from_short(0x2A19);

/// Return the 16-bit assigned number if `uuid` lives in the Bluetooth base range.
pub fn short_form(uuid: &Uuid) -> Option<u16> {
    let value = uuid.as_u128();
    if value & !SHORT_MASK != BLUETOOTH_BASE_UUID {
        return None;
    }
    u16::try_from(value >> 96).ok()
}

/// Parse a UUID written as `2a37`, `0x2A37`, `00002a37` or in full form.
///
/// # Examples
///
/// ```
/// use hrm_types::uuid::{parse, HEART_RATE_MEASUREMENT};
///
/// assert_eq!(parse("2a37").unwrap(), HEART_RATE_MEASUREMENT);
/// assert_eq!(parse("0x2A37").unwrap(), HEART_RATE_MEASUREMENT);
/// assert_eq!(
///     parse("00002A37-0000-1000-8000-00805F9B34FB").unwrap(),
///     HEART_RATE_MEASUREMENT
/// );
/// ```
pub fn parse(input: &str) -> ParseResult<Uuid> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let invalid = || ParseError::InvalidUuid(input.to_string());

    match digits.len() {
        4 => u16::from_str_radix(digits, 16)
            .map(from_short)
            .map_err(|_| invalid()),
        8 => u32::from_str_radix(digits, 16)
            .map(from_short32)
            .map_err(|_| invalid()),
        _ => Uuid::parse_str(digits).map_err(|_| invalid()),
    }
}
