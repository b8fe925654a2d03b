//! UUID-keyed lookup over discovered services and characteristics.
//!
//! Selection is by UUID only. The position of an attribute in the discovered
//! list depends on the adapter and is never used as a fallback.

use uuid::Uuid;

use crate::radio::GattAttribute;

/// Return the first attribute whose UUID equals `wanted`.
///
/// UUIDs are compared as 128-bit values, so the letter case of whatever
/// string they were parsed from does not matter.
pub fn resolve<T: GattAttribute>(attributes: &[T], wanted: Uuid) -> Option<&T> {
    attributes.iter().find(|attribute| attribute.uuid() == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrm_types::uuids::{self, BODY_SENSOR_LOCATION, HEART_RATE_MEASUREMENT};

    #[derive(Debug, PartialEq)]
    struct Attr {
        uuid: Uuid,
        tag: usize,
    }

    impl GattAttribute for Attr {
        fn uuid(&self) -> Uuid {
            self.uuid
        }
    }

    fn attr(uuid: &str, tag: usize) -> Attr {
        Attr {
            uuid: uuids::parse(uuid).unwrap(),
            tag,
        }
    }

    #[test]
    fn test_resolve_ignores_case_and_position() {
        let attrs = vec![attr("2a37", 0), attr("2A38", 1)];
        let found = resolve(&attrs, uuids::parse("2a38").unwrap()).unwrap();
        assert_eq!(found.tag, 1);

        let reversed = vec![attr("2A38", 0), attr("2a37", 1)];
        assert_eq!(resolve(&reversed, HEART_RATE_MEASUREMENT).unwrap().tag, 1);
    }

    #[test]
    fn test_resolve_first_match_wins() {
        let attrs = vec![attr("2a38", 0), attr("2a38", 1)];
        assert_eq!(resolve(&attrs, BODY_SENSOR_LOCATION).unwrap().tag, 0);
    }

    #[test]
    fn test_resolve_no_positional_fallback() {
        let attrs = vec![attr("2a00", 0), attr("2a01", 1), attr("2a02", 2), attr("2a03", 3)];
        assert!(resolve(&attrs, HEART_RATE_MEASUREMENT).is_none());
    }

    #[test]
    fn test_resolve_empty() {
        let attrs: Vec<Attr> = Vec::new();
        assert!(resolve(&attrs, HEART_RATE_MEASUREMENT).is_none());
    }
}
