//! Mock status indicator.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::trace;

use crate::traits::StatusIndicator;

/// Something the indicator was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorEvent {
    Set(bool),
    Flash { times: u8, period: Duration },
}

#[derive(Debug, Default)]
struct IndicatorLog {
    on: bool,
    events: Vec<IndicatorEvent>,
}

/// Indicator that records every request instead of driving a pin.
///
/// Clones share the same log, so a test can keep one clone and hand the
/// other to the code under test.
#[derive(Debug, Clone, Default)]
pub struct MockIndicator {
    log: Arc<Mutex<IndicatorLog>>,
}

impl MockIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> MutexGuard<'_, IndicatorLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the indicator is currently lit.
    ///
    /// A flash sequence leaves the steady state unchanged.
    pub fn is_on(&self) -> bool {
        self.log().on
    }

    pub fn events(&self) -> Vec<IndicatorEvent> {
        self.log().events.clone()
    }

    /// Number of flash sequences requested so far.
    pub fn flash_count(&self) -> usize {
        self.log()
            .events
            .iter()
            .filter(|e| matches!(e, IndicatorEvent::Flash { .. }))
            .count()
    }
}

impl StatusIndicator for MockIndicator {
    async fn set(&mut self, on: bool) {
        trace!(on, "Mock indicator set");
        let mut log = self.log();
        log.on = on;
        log.events.push(IndicatorEvent::Set(on));
    }

    async fn flash(&mut self, times: u8, period: Duration) {
        trace!(times, ?period, "Mock indicator flash");
        self.log()
            .events
            .push(IndicatorEvent::Flash { times, period });
    }
}
