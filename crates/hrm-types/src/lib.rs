//! Platform-agnostic types for Bluetooth heart rate monitors.
//!
//! This crate holds the pieces of the Heart Rate profile that do not need a
//! Bluetooth stack, so they can be shared by native and test code alike.
//!
//! # Features
//!
//! - Bluetooth SIG UUID constants and a short-form UUID parser
//! - Heart Rate Measurement payload decoding
//! - Body Sensor Location and capability types
//! - Error types for data parsing
//!
//! # Example
//!
//! ```
//! use hrm_types::{decode_heart_rate, BodyLocation};
//!
//! assert_eq!(decode_heart_rate(&[0x00, 72]), Some(72));
//! assert_eq!(BodyLocation::from_code(1).to_string(), "Chest");
//! ```

pub mod error;
pub mod measurement;
pub mod types;
pub mod uuid;

pub use error::{ParseError, ParseResult};
pub use measurement::{MeasurementFlags, decode_heart_rate};
pub use types::{BodyLocation, Capability};
pub use crate::uuid as uuids;

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// 8-bit payloads always decode to byte 1.
        #[test]
        fn decode_8bit_returns_second_byte(
            flags in any::<u8>().prop_map(|f| f & !measurement::VALUE_FORMAT_U16),
            rest in proptest::collection::vec(any::<u8>(), 1..16),
        ) {
            let mut payload = vec![flags];
            payload.extend_from_slice(&rest);
            prop_assert_eq!(decode_heart_rate(&payload), Some(rest[0]));
        }

        /// 16-bit payloads are always dropped, whatever follows the flags.
        #[test]
        fn decode_16bit_is_always_none(
            flags in any::<u8>().prop_map(|f| f | measurement::VALUE_FORMAT_U16),
            rest in proptest::collection::vec(any::<u8>(), 0..16),
        ) {
            let mut payload = vec![flags];
            payload.extend_from_slice(&rest);
            prop_assert_eq!(decode_heart_rate(&payload), None);
        }

        /// Arbitrary input never panics.
        #[test]
        fn decode_never_panics(data: Vec<u8>) {
            let _ = decode_heart_rate(&data);
        }

        /// Out-of-range location codes clamp to Other.
        #[test]
        fn body_location_clamps(code in 7u8..=255) {
            prop_assert_eq!(BodyLocation::from_code(code), BodyLocation::Other);
        }

        /// Short-form parsing ignores letter case.
        #[test]
        fn uuid_parse_ignores_case(short: u16) {
            let lower = format!("{:04x}", short);
            let upper = format!("{:04X}", short);
            prop_assert_eq!(uuids::parse(&lower).unwrap(), uuids::parse(&upper).unwrap());
            prop_assert_eq!(uuids::short_form(&uuids::parse(&lower).unwrap()), Some(short));
        }
    }
}
