//! Heart Rate Measurement (`2A37`) payload decoding.
//!
//! Byte 0 is a flags field. Bit 0 selects the value format: clear means the
//! heart rate is a single byte at offset 1, set means a little-endian `u16`
//! at offsets 1-2. Only the 8-bit format is decoded; 16-bit samples are
//! reported as `None` and dropped by callers rather than mis-decoded.

/// Bit 0: heart rate value is a `u16`.
pub const VALUE_FORMAT_U16: u8 = 0x01;
/// Bit 1: sensor contact detected (only meaningful if bit 2 is set).
pub const SENSOR_CONTACT_DETECTED: u8 = 0x02;
/// Bit 2: sensor contact feature supported.
pub const SENSOR_CONTACT_SUPPORTED: u8 = 0x04;
/// Bit 3: energy expended field present.
pub const ENERGY_EXPENDED_PRESENT: u8 = 0x08;
/// Bit 4: one or more RR intervals present.
pub const RR_INTERVALS_PRESENT: u8 = 0x10;

/// The flags byte of a Heart Rate Measurement payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementFlags(pub u8);

impl MeasurementFlags {
    /// Whether the heart rate value uses the 16-bit format.
    pub fn is_u16_format(&self) -> bool {
        self.0 & VALUE_FORMAT_U16 != 0
    }

    /// Skin contact status, or `None` if the sensor does not report it.
    pub fn sensor_contact(&self) -> Option<bool> {
        (self.0 & SENSOR_CONTACT_SUPPORTED != 0).then_some(self.0 & SENSOR_CONTACT_DETECTED != 0)
    }

    pub fn has_energy_expended(&self) -> bool {
        self.0 & ENERGY_EXPENDED_PRESENT != 0
    }

    pub fn has_rr_intervals(&self) -> bool {
        self.0 & RR_INTERVALS_PRESENT != 0
    }
}

/// Read the flags byte, if any.
pub fn flags(payload: &[u8]) -> Option<MeasurementFlags> {
    payload.first().copied().map(MeasurementFlags)
}

/// Decode the heart rate in beats per minute.
///
/// Returns `None` for the unsupported 16-bit format and for payloads shorter
/// than two bytes. Never reads past the end of `payload`.
///
/// ```
/// use hrm_types::measurement::decode_heart_rate;
///
/// assert_eq!(decode_heart_rate(&[0x00, 0x48]), Some(72));
/// assert_eq!(decode_heart_rate(&[0x01, 0x48, 0x00]), None);
/// ```
pub fn decode_heart_rate(payload: &[u8]) -> Option<u8> {
    let (&flags, rest) = payload.split_first()?;
    if MeasurementFlags(flags).is_u16_format() {
        return None;
    }
    rest.first().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_8bit() {
        assert_eq!(decode_heart_rate(&[0x00, 0x48]), Some(72));
        assert_eq!(decode_heart_rate(&[0x00, 0xFF]), Some(255));
    }

    #[test]
    fn test_decode_8bit_with_trailing_fields() {
        // Contact supported + detected, RR intervals follow.
        let payload = [0x16, 0x3C, 0x00, 0x04];
        assert_eq!(decode_heart_rate(&payload), Some(60));
    }

    #[test]
    fn test_decode_16bit_is_dropped() {
        assert_eq!(decode_heart_rate(&[0x01, 0x48, 0x00]), None);
        assert_eq!(decode_heart_rate(&[0x01]), None);
    }

    #[test]
    fn test_decode_short_payloads() {
        assert_eq!(decode_heart_rate(&[]), None);
        assert_eq!(decode_heart_rate(&[0x00]), None);
    }

    #[test]
    fn test_flags() {
        let f = flags(&[0x06, 0x40]).unwrap();
        assert!(!f.is_u16_format());
        assert_eq!(f.sensor_contact(), Some(true));
        assert!(!f.has_energy_expended());

        assert_eq!(MeasurementFlags(0x02).sensor_contact(), None);
        assert!(MeasurementFlags(0x18).has_rr_intervals());
        assert!(MeasurementFlags(0x18).has_energy_expended());
        assert!(flags(&[]).is_none());
    }
}
