//! Remote sync interface.
//!
//! The reader talks to one remote service: it reports every scanned tag and,
//! in write mode, asks for the value to store on the next tag. Scan reports
//! use the worker's JSON body:
//!
//! ```json
//! { "readerId": "reader-1", "tagId": "04A1B2C3", "isWriteMode": false }
//! ```

#![allow(async_fn_in_trait)]

use std::fmt;

use serde::{Deserialize, Serialize};

/// HTTP-style status returned by a scan report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const OK: Self = Self(200);

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Body of a scan report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub reader_id: String,
    pub tag_id: String,
    pub is_write_mode: bool,
}

impl ScanRequest {
    pub fn new(
        reader_id: impl Into<String>,
        tag_id: impl Into<String>,
        is_write_mode: bool,
    ) -> Self {
        Self {
            reader_id: reader_id.into(),
            tag_id: tag_id.into(),
            is_write_mode,
        }
    }

    /// # Errors
    /// Returns `RemoteError::Json` if serialization fails.
    pub fn to_json(&self) -> Result<String, RemoteError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// What the remote service did with a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanAction {
    /// Started playback for a mapped tag.
    Play,
    /// Mapped the tag to the currently playing item.
    Mapped,
    Error,
}

/// Body of a scan report response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResponse {
    pub success: bool,
    pub action: ScanAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ScanResponse {
    /// # Errors
    /// Returns `RemoteError::Json` for malformed bodies and
    /// `RemoteError::InvalidResponse` when `success` contradicts `action`.
    pub fn from_json(body: &str) -> Result<Self, RemoteError> {
        let response: Self = serde_json::from_str(body)?;
        if response.success == (response.action == ScanAction::Error) {
            return Err(RemoteError::InvalidResponse(format!(
                "success={} with action {:?}",
                response.success, response.action
            )));
        }
        Ok(response)
    }
}

/// Errors from the remote service.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The service could not be reached.
    #[error("Remote unavailable: {0}")]
    Unavailable(String),

    /// The service answered with an unexpected status.
    #[error("Remote returned status {0}")]
    Status(StatusCode),

    /// The service answered with an unusable body.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Collaborator that receives scan reports and supplies values to write.
///
/// Not object-safe; use generic type parameters.
pub trait RemoteSync {
    /// Report a scanned tag. Failures are logged by the caller, never retried.
    async fn report_scan(
        &mut self,
        identity: &str,
        write_mode: bool,
    ) -> Result<StatusCode, RemoteError>;

    /// Value to write to the next tag, if one is pending.
    ///
    /// # Errors
    /// [`RemoteError::Status`] when the service answers with a non-success status.
    async fn fetch_pending_value(&mut self) -> Result<Option<String>, RemoteError>;
}
