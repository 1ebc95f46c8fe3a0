//! Mock remote service.

use tracing::debug;

use crate::remote::{RemoteError, RemoteSync, ScanAction, ScanRequest, ScanResponse, StatusCode};

/// In-memory [`RemoteSync`] that records what the reader would POST.
///
/// Responses follow the worker: a successful report in write mode maps the
/// tag, otherwise it plays it.
#[derive(Debug)]
pub struct MockRemote {
    reader_id: String,
    status: StatusCode,
    pending_value: Option<String>,
    unavailable: Option<String>,
    requests: Vec<ScanRequest>,
    responses: Vec<ScanResponse>,
    fetch_count: usize,
}

impl MockRemote {
    pub fn new(reader_id: impl Into<String>) -> Self {
        Self {
            reader_id: reader_id.into(),
            status: StatusCode::OK,
            pending_value: None,
            unavailable: None,
            requests: Vec::new(),
            responses: Vec::new(),
            fetch_count: 0,
        }
    }

    /// Status returned by subsequent reports. A non-success status also
    /// fails fetches.
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.set_status(status);
        self
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn with_pending_value(mut self, value: impl Into<String>) -> Self {
        self.set_pending_value(Some(value.into()));
        self
    }

    /// Value handed out by the next fetch. A fetch consumes it.
    pub fn set_pending_value(&mut self, value: Option<String>) {
        self.pending_value = value;
    }

    /// Make every call fail as unreachable.
    pub fn set_unavailable(&mut self, reason: Option<String>) {
        self.unavailable = reason;
    }

    pub fn requests(&self) -> &[ScanRequest] {
        &self.requests
    }

    pub fn responses(&self) -> &[ScanResponse] {
        &self.responses
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count
    }

    fn check_available(&self) -> Result<(), RemoteError> {
        match &self.unavailable {
            Some(reason) => Err(RemoteError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    fn respond(&self, request: &ScanRequest) -> ScanResponse {
        if !self.status.is_success() {
            return ScanResponse {
                success: false,
                action: ScanAction::Error,
                message: Some(format!("status {}", self.status)),
            };
        }
        if request.is_write_mode {
            ScanResponse {
                success: true,
                action: ScanAction::Mapped,
                message: Some(format!("Mapped tag {}", request.tag_id)),
            }
        } else {
            ScanResponse {
                success: true,
                action: ScanAction::Play,
                message: None,
            }
        }
    }
}

impl RemoteSync for MockRemote {
    async fn report_scan(
        &mut self,
        identity: &str,
        write_mode: bool,
    ) -> Result<StatusCode, RemoteError> {
        self.check_available()?;

        let request = ScanRequest::new(self.reader_id.clone(), identity, write_mode);
        debug!(body = %request.to_json()?, "POST");

        let response = self.respond(&request);
        self.requests.push(request);
        self.responses.push(response);
        Ok(self.status)
    }

    async fn fetch_pending_value(&mut self) -> Result<Option<String>, RemoteError> {
        self.fetch_count += 1;
        self.check_available()?;
        if !self.status.is_success() {
            return Err(RemoteError::Status(self.status));
        }
        Ok(self.pending_value.take())
    }
}
