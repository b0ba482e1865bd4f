#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identification block returned by the sensor's GET_INFO command.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceInfo {
    pub model: u8,
    pub firmware_major_version: u8,
    pub firmware_minor_version: u8,
    pub hardware_version: u8,
    pub serial_number: [u8; 16],
}

impl DeviceInfo {
    /// Serial number as the uppercase hex string printed on the device label.
    pub fn serial_number_hex(&self) -> String {
        self.serial_number
            .iter()
            .map(|b| format!("{:02X}", b))
            .collect()
    }
}

/// Health state reported by the sensor's GET_HEALTH command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HealthStatus {
    Good,
    Warning(u16),
    Error(u16),
}

impl HealthStatus {
    pub fn from_raw(status: u8, error_code: u16) -> HealthStatus {
        match status {
            0 => HealthStatus::Good,
            1 => HealthStatus::Warning(error_code),
            _ => HealthStatus::Error(error_code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_number_hex() {
        let info = DeviceInfo {
            model: 0x18,
            firmware_major_version: 1,
            firmware_minor_version: 29,
            hardware_version: 7,
            serial_number: [
                0xA0, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C,
                0x0D, 0x0E, 0xFF,
            ],
        };
        assert_eq!(info.serial_number_hex(), "A00102030405060708090A0B0C0D0EFF");
    }

    #[test]
    fn test_health_from_raw() {
        assert_eq!(HealthStatus::from_raw(0, 0), HealthStatus::Good);
        assert_eq!(HealthStatus::from_raw(1, 3), HealthStatus::Warning(3));
        assert_eq!(HealthStatus::from_raw(2, 0x8001), HealthStatus::Error(0x8001));
    }
}
