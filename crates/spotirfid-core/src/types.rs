use crate::{
    Result,
    constants::{
        AUTH_KEY_LENGTH, DEFAULT_AUTH_KEY, MAX_UID_LENGTH, MIN_UID_LENGTH, PAYLOAD_CAPACITY,
        PAYLOAD_TERMINATOR, PRINTABLE_MAX, PRINTABLE_MIN,
    },
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

/// Tag UID as read during anti-collision (4-10 bytes).
///
/// Valid only while the tag stays powered in the reader's field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CardIdentity(Vec<u8>);

impl CardIdentity {
    /// Create a new identity with length validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidIdentity` if the UID is not 4-10 bytes long.
    pub fn new(uid: impl Into<Vec<u8>>) -> Result<Self> {
        let uid = uid.into();
        if !(MIN_UID_LENGTH..=MAX_UID_LENGTH).contains(&uid.len()) {
            return Err(Error::InvalidIdentity(format!(
                "UID must be {MIN_UID_LENGTH}-{MAX_UID_LENGTH} bytes, got {}",
                uid.len()
            )));
        }
        Ok(Self(uid))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Uppercase hexadecimal rendering with no separators.
    ///
    /// ```
    /// use spotirfid_core::CardIdentity;
    ///
    /// let id = CardIdentity::new(vec![0x04, 0xA1, 0xB2, 0xC3]).unwrap();
    /// assert_eq!(id.to_hex(), "04A1B2C3");
    /// ```
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02X}")).collect()
    }
}

impl fmt::Display for CardIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Storage protocol family of a tag, fixed once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardFamily {
    /// Sequential 4-byte pages, no authentication (Ultralight / NTAG).
    Lightweight,
    /// Sector/block memory behind a key handshake (Classic).
    Authenticated,
    /// Anything else. Reads yield nothing, writes are refused.
    Unsupported,
}

impl CardFamily {
    #[must_use]
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }

    #[must_use]
    pub fn requires_authentication(&self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

impl fmt::Display for CardFamily {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            CardFamily::Lightweight => "Lightweight",
            CardFamily::Authenticated => "Authenticated",
            CardFamily::Unsupported => "Unsupported",
        };
        write!(f, "{name}")
    }
}

/// Key-A secret used for Authenticated-family blocks.
///
/// # Security
/// Equality is constant-time.
#[derive(Clone, Copy)]
pub struct AuthKey([u8; AUTH_KEY_LENGTH]);

impl AuthKey {
    /// Factory default key (all bytes 0xFF).
    pub const DEFAULT: AuthKey = AuthKey(DEFAULT_AUTH_KEY);

    #[must_use]
    pub const fn new(bytes: [u8; AUTH_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; AUTH_KEY_LENGTH] {
        &self.0
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }
}

impl Default for AuthKey {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl PartialEq for AuthKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for AuthKey {}

impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_default() {
            write!(f, "AuthKey(default)")
        } else {
            write!(f, "AuthKey(custom)")
        }
    }
}

/// Text stored on a tag: at most 48 printable ASCII bytes.
///
/// On the tag the payload is zero-padded to [`PAYLOAD_CAPACITY`]; the first
/// zero byte (or the end of capacity) marks its logical end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagPayload(String);

impl TagPayload {
    /// Create a payload, rejecting text that could not round-trip through a tag.
    ///
    /// # Errors
    /// Returns `Error::PayloadTooLong` above 48 bytes and
    /// `Error::PayloadNotPrintable` for any byte outside 32-126.
    ///
    /// ```
    /// use spotirfid_core::TagPayload;
    ///
    /// let payload = TagPayload::new("spotify:album:123").unwrap();
    /// assert_eq!(payload.len(), 17);
    ///
    /// assert!(TagPayload::new("x".repeat(49)).is_err());
    /// assert!(TagPayload::new("tab\there").is_err());
    /// ```
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.len() > PAYLOAD_CAPACITY {
            return Err(Error::PayloadTooLong {
                len: text.len(),
                max: PAYLOAD_CAPACITY,
            });
        }
        if let Some((position, &byte)) = text
            .as_bytes()
            .iter()
            .enumerate()
            .find(|(_, b)| !is_printable(**b))
        {
            return Err(Error::PayloadNotPrintable { position, byte });
        }
        Ok(Self(text))
    }

    #[must_use]
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// Decode stored bytes using the tag termination convention.
    ///
    /// Scanning stops at the first zero byte or after 48 bytes. Bytes outside
    /// the printable range are skipped rather than ending the scan.
    ///
    /// ```
    /// use spotirfid_core::TagPayload;
    ///
    /// let payload = TagPayload::from_stored_bytes(b"AB\x01C\0junk");
    /// assert_eq!(payload.as_str(), "ABC");
    /// ```
    #[must_use]
    pub fn from_stored_bytes(bytes: &[u8]) -> Self {
        let text = bytes
            .iter()
            .take(PAYLOAD_CAPACITY)
            .take_while(|b| **b != PAYLOAD_TERMINATOR)
            .filter(|b| is_printable(**b))
            .map(|b| *b as char)
            .collect();
        Self(text)
    }

    /// Zero-pad the payload to the full storage capacity.
    #[must_use]
    pub fn to_padded(&self) -> [u8; PAYLOAD_CAPACITY] {
        let mut buffer = [PAYLOAD_TERMINATOR; PAYLOAD_CAPACITY];
        buffer[..self.0.len()].copy_from_slice(self.0.as_bytes());
        buffer
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TagPayload {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for TagPayload {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        TagPayload::new(value)
    }
}

impl From<TagPayload> for String {
    fn from(value: TagPayload) -> Self {
        value.0
    }
}

impl std::str::FromStr for TagPayload {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TagPayload::new(s)
    }
}

fn is_printable(byte: u8) -> bool {
    (PRINTABLE_MIN..=PRINTABLE_MAX).contains(&byte)
}

/// Payload value that toggles write mode when read from a tag.
///
/// # Security
/// Comparison against scanned payloads is constant-time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterMarker(TagPayload);

impl MasterMarker {
    /// Create a master marker.
    ///
    /// # Errors
    /// Returns an error if the marker is empty or not a valid [`TagPayload`].
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let payload = TagPayload::new(text)?;
        if payload.is_empty() {
            return Err(Error::Config("master marker cannot be empty".to_string()));
        }
        Ok(Self(payload))
    }

    /// Check whether a scanned payload is the master marker.
    #[must_use]
    pub fn matches(&self, payload: &TagPayload) -> bool {
        self.0.as_bytes().ct_eq(payload.as_bytes()).into()
    }

    #[must_use]
    pub fn payload(&self) -> &TagPayload {
        &self.0
    }
}

impl fmt::Display for MasterMarker {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process-wide workflow mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowMode {
    /// Scans are reported to the remote service.
    #[default]
    Normal,
    /// The next non-master scan receives the pending value.
    Write,
}

impl WorkflowMode {
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Write)
    }
}

impl fmt::Display for WorkflowMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WorkflowMode::Normal => write!(f, "Normal"),
            WorkflowMode::Write => write!(f, "Write"),
        }
    }
}
