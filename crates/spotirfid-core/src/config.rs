//! Device configuration.
//!
//! The reader is configured once at startup from a JSON document using the
//! same keys as the firmware's `config.json`:
//!
//! ```json
//! {
//!   "wifi": { "ssid": "home", "password": "secret" },
//!   "worker": { "url": "https://worker.example/api/scan", "readerId": "reader-1" },
//!   "masterTagId": "MASTER01",
//!   "ledPin": 2,
//!   "rfid": { "rst": 9, "ss": 10, "sck": 8, "mosi": 7, "miso": 6 }
//! }
//! ```
//!
//! An optional `timing` object overrides the settle and poll windows.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_IDLE_POLL_MS, DEFAULT_RELEASE_SETTLE_MS, DEFAULT_REMOVAL_POLL_MS,
    DEFAULT_REMOVAL_TIMEOUT_MS, DEFAULT_WRITE_SETTLE_MS,
};
use crate::{Error, MasterMarker, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    pub wifi: WifiConfig,
    pub worker: WorkerConfig,
    pub master_tag_id: String,
    pub led_pin: u8,
    pub rfid: RfidPins,
    #[serde(default)]
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiConfig {
    pub ssid: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConfig {
    pub url: String,
    pub reader_id: String,
}

/// SPI and reset lines wiring the reader chip to the microcontroller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfidPins {
    pub rst: u8,
    pub ss: u8,
    pub sck: u8,
    pub mosi: u8,
    pub miso: u8,
}

impl RfidPins {
    fn all(&self) -> [u8; 5] {
        [self.rst, self.ss, self.sck, self.mosi, self.miso]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingConfig {
    #[serde(default = "TimingConfig::default_release_settle_ms")]
    pub release_settle_ms: u64,
    #[serde(default = "TimingConfig::default_write_settle_ms")]
    pub write_settle_ms: u64,
    #[serde(default = "TimingConfig::default_removal_timeout_ms")]
    pub removal_timeout_ms: u64,
    #[serde(default = "TimingConfig::default_removal_poll_ms")]
    pub removal_poll_ms: u64,
    #[serde(default = "TimingConfig::default_idle_poll_ms")]
    pub idle_poll_ms: u64,
}

impl TimingConfig {
    fn default_release_settle_ms() -> u64 {
        DEFAULT_RELEASE_SETTLE_MS
    }
    fn default_write_settle_ms() -> u64 {
        DEFAULT_WRITE_SETTLE_MS
    }
    fn default_removal_timeout_ms() -> u64 {
        DEFAULT_REMOVAL_TIMEOUT_MS
    }
    fn default_removal_poll_ms() -> u64 {
        DEFAULT_REMOVAL_POLL_MS
    }
    fn default_idle_poll_ms() -> u64 {
        DEFAULT_IDLE_POLL_MS
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            release_settle_ms: Self::default_release_settle_ms(),
            write_settle_ms: Self::default_write_settle_ms(),
            removal_timeout_ms: Self::default_removal_timeout_ms(),
            removal_poll_ms: Self::default_removal_poll_ms(),
            idle_poll_ms: Self::default_idle_poll_ms(),
        }
    }
}

/// Timing windows used by a card session, as durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    pub release_settle: Duration,
    pub write_settle: Duration,
    pub removal_timeout: Duration,
    pub removal_poll: Duration,
    pub idle_poll: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        TimingConfig::default().into()
    }
}

impl From<TimingConfig> for SessionTiming {
    fn from(timing: TimingConfig) -> Self {
        Self {
            release_settle: Duration::from_millis(timing.release_settle_ms),
            write_settle: Duration::from_millis(timing.write_settle_ms),
            removal_timeout: Duration::from_millis(timing.removal_timeout_ms),
            removal_poll: Duration::from_millis(timing.removal_poll_ms),
            idle_poll: Duration::from_millis(timing.idle_poll_ms),
        }
    }
}

impl AppConfig {
    /// Parse and validate a configuration document.
    ///
    /// # Errors
    /// Returns `Error::Json` for malformed documents and `Error::Config` or
    /// `Error::MissingConfig` when validation fails.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: AppConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate the configuration file at `path`.
    ///
    /// # Errors
    /// Returns `Error::Io` if the file cannot be read, otherwise the same
    /// errors as [`AppConfig::from_json_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Check the invariants the reader relies on.
    ///
    /// # Errors
    /// Returns an error if the master marker is not a storable payload,
    /// the worker settings are blank, the RFID pins collide, or a poll
    /// interval is zero.
    pub fn validate(&self) -> Result<()> {
        self.master_marker()?;

        if self.worker.url.trim().is_empty() {
            return Err(Error::MissingConfig("worker.url".to_string()));
        }
        if self.worker.reader_id.trim().is_empty() {
            return Err(Error::MissingConfig("worker.readerId".to_string()));
        }

        let pins = self.rfid.all();
        for (i, pin) in pins.iter().enumerate() {
            if pins[i + 1..].contains(pin) {
                return Err(Error::Config(format!("RFID pin {pin} is assigned twice")));
            }
        }
        if pins.contains(&self.led_pin) {
            return Err(Error::Config(format!(
                "LED pin {} collides with an RFID pin",
                self.led_pin
            )));
        }

        if self.timing.removal_poll_ms == 0 || self.timing.idle_poll_ms == 0 {
            return Err(Error::Config("poll intervals must be non-zero".to_string()));
        }

        Ok(())
    }

    /// The configured master marker.
    ///
    /// # Errors
    /// Returns an error if `masterTagId` is empty or not storable on a tag.
    pub fn master_marker(&self) -> Result<MasterMarker> {
        MasterMarker::new(self.master_tag_id.clone())
            .map_err(|e| Error::Config(format!("masterTagId: {e}")))
    }

    #[must_use]
    pub fn session_timing(&self) -> SessionTiming {
        self.timing.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "wifi": { "ssid": "home", "password": "secret" },
        "worker": { "url": "https://worker.example/api/scan", "readerId": "reader-1" },
        "masterTagId": "MASTER01",
        "ledPin": 2,
        "rfid": { "rst": 9, "ss": 10, "sck": 8, "mosi": 7, "miso": 6 }
    }"#;

    #[test]
    fn test_parse_sample_with_default_timing() {
        let config = AppConfig::from_json_str(SAMPLE).unwrap();

        assert_eq!(config.worker.reader_id, "reader-1");
        assert_eq!(config.master_tag_id, "MASTER01");
        assert_eq!(config.rfid.ss, 10);
        assert_eq!(config.timing, TimingConfig::default());

        let timing = config.session_timing();
        assert_eq!(timing.release_settle, Duration::from_millis(50));
        assert_eq!(timing.write_settle, Duration::from_millis(200));
        assert_eq!(timing.removal_timeout, Duration::from_millis(5000));
        assert_eq!(timing.removal_poll, Duration::from_millis(100));
    }

    #[test]
    fn test_partial_timing_override() {
        let json = SAMPLE.replacen(
            "\"ledPin\": 2,",
            "\"ledPin\": 2, \"timing\": { \"removalTimeoutMs\": 2000 },",
            1,
        );
        let config = AppConfig::from_json_str(&json).unwrap();

        assert_eq!(config.timing.removal_timeout_ms, 2000);
        assert_eq!(config.timing.release_settle_ms, DEFAULT_RELEASE_SETTLE_MS);
    }

    #[test]
    fn test_master_marker_from_config() {
        let config = AppConfig::from_json_str(SAMPLE).unwrap();
        let marker = config.master_marker().unwrap();
        assert_eq!(marker.payload().as_str(), "MASTER01");
    }

    #[test]
    fn test_rejects_empty_master_marker() {
        let json = SAMPLE.replace("MASTER01", "");
        assert!(matches!(
            AppConfig::from_json_str(&json),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_rejects_oversized_master_marker() {
        let json = SAMPLE.replace("MASTER01", &"M".repeat(49));
        assert!(AppConfig::from_json_str(&json).is_err());
    }

    #[test]
    fn test_rejects_duplicate_pins() {
        let json = SAMPLE.replace("\"miso\": 6", "\"miso\": 10");
        assert!(matches!(
            AppConfig::from_json_str(&json),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_rejects_led_on_rfid_pin() {
        let json = SAMPLE.replace("\"ledPin\": 2", "\"ledPin\": 9");
        assert!(AppConfig::from_json_str(&json).is_err());
    }

    #[test]
    fn test_rejects_blank_reader_id() {
        let json = SAMPLE.replace("reader-1", " ");
        assert!(matches!(
            AppConfig::from_json_str(&json),
            Err(Error::MissingConfig(_))
        ));
    }

    #[test]
    fn test_missing_section_is_json_error() {
        let json = r#"{ "masterTagId": "MASTER01" }"#;
        assert!(matches!(AppConfig::from_json_str(json), Err(Error::Json(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.led_pin, 2);
    }

    #[test]
    fn test_load_missing_file() {
        let result = AppConfig::load("/nonexistent/spotirfid/config.json");
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
