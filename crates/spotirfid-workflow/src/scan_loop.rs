//! The reader's control loop.
//!
//! One [`ScanLoop::run_iteration`] call handles at most one card
//! presentation from detection to release. Nothing in an iteration is
//! fatal: every failure degrades to an outcome the caller can log before
//! polling again.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use spotirfid_core::constants::{REPORT_ACK_FLASH_MS, REPORT_ACK_FLASHES};
use spotirfid_core::{TagPayload, WorkflowMode};
use spotirfid_hardware::{PiccTransport, StatusIndicator};
use spotirfid_rfid::{ActiveCard, CardSession, RemovalOutcome, StorageCodec, WriteFailure};

use crate::remote::{RemoteSync, StatusCode};
use crate::state_machine::{Decision, ModeTrigger, WorkflowState};

/// What one iteration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// No new card in the field.
    NoCard,
    /// The master tag armed write mode.
    EnteredWriteMode,
    /// The scan was reported; the status may still be an error status.
    Reported(StatusCode),
    /// The report could not be delivered.
    ReportFailed,
    /// The master tag was scanned in write mode and left untouched.
    MasterGuarded,
    /// The pending value was written to the tag.
    Written {
        payload: TagPayload,
        removal: RemovalOutcome,
    },
    /// Writing to the tag failed; write mode stays armed.
    WriteFailed(WriteFailure),
    /// The remote service had no value to write.
    NothingToWrite,
    /// The pending value could not be fetched or is not storable.
    FetchFailed,
}

/// Drives card sessions through the workflow.
#[derive(Debug)]
pub struct ScanLoop<T, R, I>
where
    T: PiccTransport,
    R: RemoteSync,
    I: StatusIndicator,
{
    session: CardSession<T>,
    codec: StorageCodec,
    remote: R,
    indicator: I,
}

impl<T, R, I> ScanLoop<T, R, I>
where
    T: PiccTransport,
    R: RemoteSync,
    I: StatusIndicator,
{
    pub fn new(session: CardSession<T>, codec: StorageCodec, remote: R, indicator: I) -> Self {
        Self {
            session,
            codec,
            remote,
            indicator,
        }
    }

    /// Handle at most one card presentation.
    ///
    /// When no card is present this waits for the idle poll interval so
    /// the caller can loop without spinning.
    pub async fn run_iteration(&mut self, state: &mut WorkflowState) -> ScanOutcome {
        let Some(card) = self.session.detect_and_select().await else {
            sleep(self.session.timing().idle_poll).await;
            return ScanOutcome::NoCard;
        };

        let payload = self.codec.read(&mut self.session, card.family).await;
        if !payload.is_empty() {
            info!(uid = %card.identity, text = %payload, "Tag text");
        }

        match state.decide(&payload) {
            Decision::EnterWriteMode => {
                self.session.release(false).await;
                state.transition_to(WorkflowMode::Write, ModeTrigger::MasterDetected);
                self.indicator.set(true).await;
                ScanOutcome::EnteredWriteMode
            }
            Decision::Report { write_mode } => {
                self.session.release(false).await;
                self.report(&card, write_mode).await
            }
            Decision::GuardMaster => {
                warn!(uid = %card.identity, "Master tag scanned in write mode, not writing");
                self.session.release(false).await;
                state.reset(ModeTrigger::MasterGuarded);
                self.indicator.set(false).await;
                ScanOutcome::MasterGuarded
            }
            Decision::WriteCycle => self.write_cycle(&card, state).await,
        }
    }

    async fn report(&mut self, card: &ActiveCard, write_mode: bool) -> ScanOutcome {
        let identity = card.identity.to_hex();
        match self.remote.report_scan(&identity, write_mode).await {
            Ok(status) => {
                info!(uid = %identity, %status, "Scan reported");
                if status == StatusCode::OK {
                    self.indicator
                        .flash(
                            REPORT_ACK_FLASHES,
                            Duration::from_millis(REPORT_ACK_FLASH_MS),
                        )
                        .await;
                } else {
                    warn!(uid = %identity, %status, "Scan report not accepted");
                }
                ScanOutcome::Reported(status)
            }
            Err(e) => {
                warn!(uid = %identity, error = %e, "Scan report failed");
                ScanOutcome::ReportFailed
            }
        }
    }

    async fn write_cycle(&mut self, card: &ActiveCard, state: &mut WorkflowState) -> ScanOutcome {
        let fetched = match self.remote.fetch_pending_value().await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Could not fetch value to write");
                return self
                    .abort_write_cycle(
                        state,
                        ModeTrigger::RemoteUnavailable,
                        ScanOutcome::FetchFailed,
                    )
                    .await;
            }
        };

        let value = match fetched.filter(|v| !v.is_empty()) {
            Some(value) => value,
            None => {
                info!("No pending value, leaving tag untouched");
                return self
                    .abort_write_cycle(
                        state,
                        ModeTrigger::NothingToWrite,
                        ScanOutcome::NothingToWrite,
                    )
                    .await;
            }
        };

        let payload = match TagPayload::new(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Pending value cannot be stored on a tag");
                return self
                    .abort_write_cycle(
                        state,
                        ModeTrigger::RemoteUnavailable,
                        ScanOutcome::FetchFailed,
                    )
                    .await;
            }
        };

        info!(uid = %card.identity, text = %payload, "Writing tag");
        match self.codec.write(&mut self.session, card.family, &payload).await {
            Ok(()) => {
                self.session.release(true).await;
                self.session.settle_after_write(card.family).await;
                let timeout = self.session.timing().removal_timeout;
                let removal = self.session.wait_for_removal(timeout).await;

                state.reset(ModeTrigger::WriteCompleted);
                self.indicator.set(false).await;
                ScanOutcome::Written { payload, removal }
            }
            Err(failure) => {
                warn!(
                    uid = %card.identity,
                    error = %failure,
                    "Tag write failed, write mode stays armed"
                );
                self.session.release(false).await;
                ScanOutcome::WriteFailed(failure)
            }
        }
    }

    async fn abort_write_cycle(
        &mut self,
        state: &mut WorkflowState,
        trigger: ModeTrigger,
        outcome: ScanOutcome,
    ) -> ScanOutcome {
        self.session.release(false).await;
        state.reset(trigger);
        self.indicator.set(false).await;
        outcome
    }

    pub fn session(&self) -> &CardSession<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut CardSession<T> {
        &mut self.session
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn remote_mut(&mut self) -> &mut R {
        &mut self.remote
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }
}
