//! Workflow layer for the SpotiRFID reader.
//!
//! Ties card sessions to the reader's two-mode workflow:
//!
//! - [`WorkflowState`] holds the mode and master marker and decides what a
//!   scanned payload means.
//! - [`RemoteSync`] is the remote service that receives scan reports and
//!   supplies values to write; [`MockRemote`] records calls in memory.
//! - [`ScanLoop`] runs one detection-to-release iteration at a time.

pub mod mock;
pub mod remote;
pub mod scan_loop;
pub mod state_machine;

pub use mock::MockRemote;
pub use remote::{RemoteError, RemoteSync, ScanAction, ScanRequest, ScanResponse, StatusCode};
pub use scan_loop::{ScanLoop, ScanOutcome};
pub use state_machine::{
    Decision, ModeTransition, ModeTrigger, WorkflowState, WorkflowStateBuilder,
};
