//! Utility functions for hrm-core.

use btleplug::platform::PeripheralId;

/// Format a btleplug peripheral ID as a string.
///
/// On macOS, peripheral IDs are UUIDs. On other platforms, they may be
/// MAC addresses or other formats. This function extracts the useful
/// identifier string.
pub fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// Whether the address is the all-zero placeholder macOS reports.
pub fn is_placeholder_address(address: &str) -> bool {
    address == "00:00:00:00:00:00"
}

fn normalize(identifier: &str) -> String {
    identifier
        .trim()
        .chars()
        .filter(|c| !matches!(c, ':' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Compare two peripheral identifiers, ignoring case and `:`/`-` separators.
///
/// ```
/// use hrm_core::util::identifiers_match;
///
/// assert!(identifiers_match("AA:BB:CC", "aabbcc"));
/// assert!(!identifiers_match("AA:BB", "AA:BC"));
/// ```
pub fn identifiers_match(a: &str, b: &str) -> bool {
    let a = normalize(a);
    !a.is_empty() && a == normalize(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_match_mac_forms() {
        assert!(identifiers_match("AA:BB:CC:DD:EE:FF", "aabbccddeeff"));
        assert!(identifiers_match("aa-bb-cc-dd-ee-ff", "AA:BB:CC:DD:EE:FF"));
        assert!(identifiers_match(" AA:BB ", "aa:bb"));
    }

    #[test]
    fn test_identifiers_match_uuid_forms() {
        assert!(identifiers_match(
            "6E400001-B5A3-F393-E0A9-E50E24DCCA9E",
            "6e400001b5a3f393e0a9e50e24dcca9e"
        ));
    }

    #[test]
    fn test_identifiers_mismatch() {
        assert!(!identifiers_match("AA:BB", "AA:BB:CC"));
        assert!(!identifiers_match("", ""));
        assert!(!identifiers_match(":", "-"));
    }

    #[test]
    fn test_placeholder_address() {
        assert!(is_placeholder_address("00:00:00:00:00:00"));
        assert!(!is_placeholder_address("AA:BB:CC:DD:EE:FF"));
    }
}
