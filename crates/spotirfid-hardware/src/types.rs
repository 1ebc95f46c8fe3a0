//! Common types shared across reader implementations.

use serde::{Deserialize, Serialize};

/// Reader chip information.
///
/// Contains reader-specific metadata such as supported protocols and the
/// chip's firmware version register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderInfo {
    /// Reader name (e.g., "MFRC522").
    pub name: String,

    /// List of supported protocols (e.g., ["ISO14443A"]).
    pub protocols: Vec<String>,

    /// Chip version register value, if the chip reports one.
    pub firmware_version: Option<u8>,
}

impl ReaderInfo {
    /// Create a new ReaderInfo.
    pub fn new(name: impl Into<String>, protocols: Vec<String>) -> Self {
        Self {
            name: name.into(),
            protocols,
            firmware_version: None,
        }
    }

    /// Set the firmware version.
    pub fn with_firmware_version(mut self, version: u8) -> Self {
        self.firmware_version = Some(version);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_info() {
        let info =
            ReaderInfo::new("MFRC522", vec!["ISO14443A".to_string()]).with_firmware_version(0x92);

        assert_eq!(info.name, "MFRC522");
        assert_eq!(info.protocols, vec!["ISO14443A"]);
        assert_eq!(info.firmware_version, Some(0x92));
    }

    #[test]
    fn test_reader_info_serialization() {
        let info = ReaderInfo::new("MFRC522", vec![]);
        let json = serde_json::to_string(&info).unwrap();
        let deserialized: ReaderInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info, deserialized);
    }
}
