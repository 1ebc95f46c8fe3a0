//! Reader workflow state machine.
//!
//! The reader runs in one of two modes. Scanning the master tag in normal
//! mode arms write mode; the next non-master tag receives the value fetched
//! from the remote service and the reader drops back to normal mode.
//!
//! # Transitions
//!
//! | Mode   | Scanned payload | Decision                | Next mode |
//! |--------|-----------------|-------------------------|-----------|
//! | Normal | master marker   | [`Decision::EnterWriteMode`] | Write |
//! | Normal | anything else   | [`Decision::Report`]     | Normal    |
//! | Write  | master marker   | [`Decision::GuardMaster`] | Normal   |
//! | Write  | anything else   | [`Decision::WriteCycle`] | Normal    |
//!
//! A write cycle whose tag write fails leaves the mode at Write so the
//! operator can present the tag again.
//!
//! # Examples
//!
//! ```
//! use spotirfid_core::{MasterMarker, TagPayload, WorkflowMode};
//! use spotirfid_workflow::{Decision, ModeTrigger, WorkflowState};
//!
//! let marker = MasterMarker::new("MASTER01").unwrap();
//! let mut state = WorkflowState::new(marker);
//!
//! let scanned = TagPayload::new("MASTER01").unwrap();
//! assert_eq!(state.decide(&scanned), Decision::EnterWriteMode);
//!
//! state.transition_to(WorkflowMode::Write, ModeTrigger::MasterDetected);
//! assert_eq!(state.decide(&scanned), Decision::GuardMaster);
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use tracing::info;

use spotirfid_core::{MasterMarker, TagPayload, WorkflowMode};

/// Maximum number of mode transitions to keep in history.
const MAX_HISTORY_SIZE: usize = 100;

/// What the reader should do with a scanned tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The master tag was scanned in normal mode.
    EnterWriteMode,
    /// Report the scan to the remote service.
    Report { write_mode: bool },
    /// The master tag was scanned in write mode; never write to it.
    GuardMaster,
    /// Fetch the pending value and write it to the tag.
    WriteCycle,
}

/// Why the mode changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModeTrigger {
    MasterDetected,
    MasterGuarded,
    WriteCompleted,
    NothingToWrite,
    RemoteUnavailable,
}

impl fmt::Display for ModeTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let trigger = match self {
            ModeTrigger::MasterDetected => "master tag detected",
            ModeTrigger::MasterGuarded => "master tag guarded",
            ModeTrigger::WriteCompleted => "write completed",
            ModeTrigger::NothingToWrite => "nothing to write",
            ModeTrigger::RemoteUnavailable => "remote unavailable",
        };
        f.write_str(trigger)
    }
}

/// A recorded mode change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModeTransition {
    pub from: WorkflowMode,
    pub to: WorkflowMode,
    pub trigger: ModeTrigger,
    pub timestamp: Instant,
}

impl ModeTransition {
    pub fn elapsed(&self) -> Duration {
        self.timestamp.elapsed()
    }
}

/// Workflow state threaded through the scan loop.
///
/// Owned by the control loop and mutated only between card sessions.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    mode: WorkflowMode,
    master_marker: MasterMarker,
    mode_entered_at: Instant,
    history: VecDeque<ModeTransition>,
}

impl WorkflowState {
    /// Create a state in normal mode.
    pub fn new(master_marker: MasterMarker) -> Self {
        Self::builder(master_marker).build()
    }

    /// Create a builder for restoring a state with a specific mode.
    ///
    /// ```
    /// use spotirfid_core::{MasterMarker, WorkflowMode};
    /// use spotirfid_workflow::WorkflowState;
    ///
    /// let state = WorkflowState::builder(MasterMarker::new("MASTER01").unwrap())
    ///     .with_mode(WorkflowMode::Write)
    ///     .build();
    ///
    /// assert_eq!(state.mode(), WorkflowMode::Write);
    /// ```
    pub fn builder(master_marker: MasterMarker) -> WorkflowStateBuilder {
        WorkflowStateBuilder {
            mode: WorkflowMode::default(),
            master_marker,
        }
    }

    pub fn mode(&self) -> WorkflowMode {
        self.mode
    }

    pub fn master_marker(&self) -> &MasterMarker {
        &self.master_marker
    }

    /// Decide what to do with a scanned payload. Does not change the mode.
    pub fn decide(&self, payload: &TagPayload) -> Decision {
        let is_master = self.master_marker.matches(payload);
        match (self.mode, is_master) {
            (WorkflowMode::Normal, true) => Decision::EnterWriteMode,
            (WorkflowMode::Normal, false) => Decision::Report { write_mode: false },
            (WorkflowMode::Write, true) => Decision::GuardMaster,
            (WorkflowMode::Write, false) => Decision::WriteCycle,
        }
    }

    /// Change mode and record the transition.
    ///
    /// Returns `false` without recording anything if already in `target`.
    pub fn transition_to(&mut self, target: WorkflowMode, trigger: ModeTrigger) -> bool {
        if self.mode == target {
            return false;
        }

        info!(from = %self.mode, to = %target, %trigger, "Mode changed");
        let transition = ModeTransition {
            from: self.mode,
            to: target,
            trigger,
            timestamp: Instant::now(),
        };

        if self.history.len() >= MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(transition);

        self.mode = target;
        self.mode_entered_at = Instant::now();
        true
    }

    /// Return to normal mode.
    pub fn reset(&mut self, trigger: ModeTrigger) -> bool {
        self.transition_to(WorkflowMode::Normal, trigger)
    }

    /// Time spent in the current mode.
    pub fn time_in_mode(&self) -> Duration {
        self.mode_entered_at.elapsed()
    }

    /// Recorded transitions, oldest first.
    pub fn history(&self) -> &VecDeque<ModeTransition> {
        &self.history
    }

    pub fn last_transition(&self) -> Option<&ModeTransition> {
        self.history.back()
    }
}

/// Builder for [`WorkflowState`].
#[derive(Debug)]
pub struct WorkflowStateBuilder {
    mode: WorkflowMode,
    master_marker: MasterMarker,
}

impl WorkflowStateBuilder {
    pub fn with_mode(mut self, mode: WorkflowMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn build(self) -> WorkflowState {
        WorkflowState {
            mode: self.mode,
            master_marker: self.master_marker,
            mode_entered_at: Instant::now(),
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn marker() -> MasterMarker {
        MasterMarker::new("MASTER01").unwrap()
    }

    fn payload(text: &str) -> TagPayload {
        TagPayload::new(text).unwrap()
    }

    #[rstest]
    #[case(WorkflowMode::Normal, "MASTER01", Decision::EnterWriteMode)]
    #[case(WorkflowMode::Normal, "", Decision::Report { write_mode: false })]
    #[case(WorkflowMode::Normal, "spotify:album:123", Decision::Report { write_mode: false })]
    #[case(WorkflowMode::Normal, "MASTER0", Decision::Report { write_mode: false })]
    #[case(WorkflowMode::Write, "MASTER01", Decision::GuardMaster)]
    #[case(WorkflowMode::Write, "spotify:album:123", Decision::WriteCycle)]
    #[case(WorkflowMode::Write, "", Decision::WriteCycle)]
    fn test_decide(#[case] mode: WorkflowMode, #[case] scanned: &str, #[case] expected: Decision) {
        let state = WorkflowState::builder(marker()).with_mode(mode).build();
        assert_eq!(state.decide(&payload(scanned)), expected);
        assert_eq!(state.mode(), mode);
    }

    #[test]
    fn test_new_starts_normal() {
        let state = WorkflowState::new(marker());
        assert_eq!(state.mode(), WorkflowMode::Normal);
        assert!(state.history().is_empty());
    }

    #[test]
    fn test_transition_records_history() {
        let mut state = WorkflowState::new(marker());

        assert!(state.transition_to(WorkflowMode::Write, ModeTrigger::MasterDetected));
        assert!(state.reset(ModeTrigger::WriteCompleted));

        assert_eq!(state.history().len(), 2);
        let last = state.last_transition().unwrap();
        assert_eq!(last.from, WorkflowMode::Write);
        assert_eq!(last.to, WorkflowMode::Normal);
        assert_eq!(last.trigger, ModeTrigger::WriteCompleted);
    }

    #[test]
    fn test_same_mode_is_not_recorded() {
        let mut state = WorkflowState::new(marker());
        assert!(!state.reset(ModeTrigger::NothingToWrite));
        assert!(state.history().is_empty());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut state = WorkflowState::new(marker());
        for _ in 0..MAX_HISTORY_SIZE {
            state.transition_to(WorkflowMode::Write, ModeTrigger::MasterDetected);
            state.reset(ModeTrigger::WriteCompleted);
        }
        assert_eq!(state.history().len(), MAX_HISTORY_SIZE);
        assert_eq!(state.history()[0].trigger, ModeTrigger::MasterDetected);
    }

    #[test]
    fn test_trigger_display() {
        assert_eq!(ModeTrigger::MasterGuarded.to_string(), "master tag guarded");
    }
}
