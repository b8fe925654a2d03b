//! Core types for heart rate monitor data.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::uuid::{
    BATTERY_LEVEL, BATTERY_SERVICE, BODY_SENSOR_LOCATION, HEART_RATE_MEASUREMENT,
    HEART_RATE_SERVICE,
};

/// Where the sensor is worn, as reported by the Body Sensor Location characteristic.
///
/// Codes outside the assigned range map to [`BodyLocation::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum BodyLocation {
    #[default]
    Other = 0,
    Chest = 1,
    Wrist = 2,
    Finger = 3,
    Hand = 4,
    EarLobe = 5,
    Foot = 6,
}

impl BodyLocation {
    /// All locations in code order.
    pub const ALL: [BodyLocation; 7] = [
        BodyLocation::Other,
        BodyLocation::Chest,
        BodyLocation::Wrist,
        BodyLocation::Finger,
        BodyLocation::Hand,
        BodyLocation::EarLobe,
        BodyLocation::Foot,
    ];

    /// Map a location code to a location, clamping unknown codes to `Other`.
    ///
    /// ```
    /// use hrm_types::BodyLocation;
    ///
    /// assert_eq!(BodyLocation::from_code(1), BodyLocation::Chest);
    /// assert_eq!(BodyLocation::from_code(42), BodyLocation::Other);
    /// ```
    #[must_use]
    pub fn from_code(code: u8) -> Self {
        Self::ALL
            .get(usize::from(code))
            .copied()
            .unwrap_or(BodyLocation::Other)
    }

    /// Decode the value read from the Body Sensor Location characteristic.
    ///
    /// An empty read maps to `Other`.
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Self {
        data.first().copied().map_or(BodyLocation::Other, Self::from_code)
    }

    /// Human-readable name of the location.
    pub fn as_str(&self) -> &'static str {
        match self {
            BodyLocation::Other => "Other",
            BodyLocation::Chest => "Chest",
            BodyLocation::Wrist => "Wrist",
            BodyLocation::Finger => "Finger",
            BodyLocation::Hand => "Hand",
            BodyLocation::EarLobe => "Ear Lobe",
            BodyLocation::Foot => "Foot",
        }
    }
}

impl fmt::Display for BodyLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<u8> for BodyLocation {
    fn from(code: u8) -> Self {
        Self::from_code(code)
    }
}

/// A GATT capability the monitor resolves and memoizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Capability {
    /// Heart Rate Measurement notifications.
    HeartRate,
    /// Body Sensor Location reads.
    BodySensorLocation,
    /// Battery Level reads.
    Battery,
}

impl Capability {
    /// Name used in log lines and "not found" errors.
    pub fn name(&self) -> &'static str {
        match self {
            Capability::HeartRate => "Heart Rate",
            Capability::BodySensorLocation => "Body Sensor Location",
            Capability::Battery => "Battery Level",
        }
    }

    /// Name of the service that hosts this capability.
    pub fn service_name(&self) -> &'static str {
        match self {
            Capability::HeartRate | Capability::BodySensorLocation => "Heart Rate",
            Capability::Battery => "Battery",
        }
    }

    /// UUID of the service that hosts this capability.
    pub fn service_uuid(&self) -> Uuid {
        match self {
            Capability::HeartRate | Capability::BodySensorLocation => HEART_RATE_SERVICE,
            Capability::Battery => BATTERY_SERVICE,
        }
    }

    /// UUID of the characteristic backing this capability.
    pub fn characteristic_uuid(&self) -> Uuid {
        match self {
            Capability::HeartRate => HEART_RATE_MEASUREMENT,
            Capability::BodySensorLocation => BODY_SENSOR_LOCATION,
            Capability::Battery => BATTERY_LEVEL,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
