//! Mock device implementations for testing and development.
//!
//! This module provides a simulated reader chip and status indicator that can
//! be controlled programmatically without requiring physical hardware.

pub mod indicator;
pub mod picc;

pub use indicator::{IndicatorEvent, MockIndicator};
pub use picc::{Fault, FaultOp, MockPicc, MockPiccHandle, SimulatedTag, TransportOp};
