//! Card session management.
//!
//! A [`CardSession`] owns the reader transport and tracks the card currently
//! selected in the field. It detects and classifies new cards, releases them
//! with the halt sequence, and waits for them to leave the field.
//!
//! # Examples
//!
//! ```
//! use spotirfid_core::{CardFamily, SessionTiming};
//! use spotirfid_hardware::mock::{MockPicc, SimulatedTag};
//! use spotirfid_rfid::CardSession;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let (chip, handle) = MockPicc::new();
//!     let mut session = CardSession::new(chip, SessionTiming::default());
//!     session.init().await.unwrap();
//!
//!     handle.present(SimulatedTag::ultralight(vec![0x04, 0xA1, 0xB2, 0xC3]));
//!
//!     let card = session.detect_and_select().await.unwrap();
//!     assert_eq!(card.identity.to_hex(), "04A1B2C3");
//!     assert_eq!(card.family, CardFamily::Lightweight);
//! }
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use spotirfid_core::{CardFamily, CardIdentity, SessionTiming};
use spotirfid_hardware::{PiccTransport, PiccType, RequestMode, TransportError};

/// A card selected in the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveCard {
    pub identity: CardIdentity,
    pub picc_type: PiccType,
    pub family: CardFamily,
    pub detected_at: DateTime<Utc>,
}

/// Result of waiting for a card to leave the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// The card stopped answering.
    Removed,
    /// The card was still present when the timeout elapsed.
    TimedOut,
}

/// Exclusive session over one reader transport.
#[derive(Debug)]
pub struct CardSession<T: PiccTransport> {
    transport: T,
    timing: SessionTiming,
    active: Option<ActiveCard>,
}

impl<T: PiccTransport> CardSession<T> {
    pub fn new(transport: T, timing: SessionTiming) -> Self {
        Self {
            transport,
            timing,
            active: None,
        }
    }

    /// Initialize the reader chip.
    ///
    /// # Errors
    /// Returns the transport error if the chip does not come up.
    pub async fn init(&mut self) -> Result<(), TransportError> {
        self.transport.init().await?;
        let reader = self.transport.reader_info().await?;
        info!(
            name = %reader.name,
            firmware = ?reader.firmware_version,
            "Reader initialized"
        );
        Ok(())
    }

    /// Look for a new card and select it.
    ///
    /// Returns `None` when no card answers or selection fails; neither is an
    /// error. Halted cards do not answer, so a card that was released and
    /// left in the field is not detected again until it is re-presented.
    ///
    /// A request the chip itself fails is followed by a chip reset.
    pub async fn detect_and_select(&mut self) -> Option<ActiveCard> {
        match self.transport.request(RequestMode::Idle).await {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                warn!(error = %e, "Request failed, resetting reader");
                if let Err(e) = self.transport.reset().await {
                    warn!(error = %e, "Reader reset failed");
                }
                return None;
            }
        }

        let selection = match self.transport.select().await {
            Ok(selection) => selection,
            Err(e) => {
                debug!(error = %e, "Select failed");
                return None;
            }
        };

        let identity = match CardIdentity::new(selection.uid) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(error = %e, "Ignoring card with malformed UID");
                return None;
            }
        };

        let picc_type = PiccType::from_sak(selection.sak);
        let card = ActiveCard {
            identity,
            picc_type,
            family: picc_type.family(),
            detected_at: Utc::now(),
        };
        info!(
            uid = %card.identity,
            card_type = picc_type.name(),
            family = %card.family,
            "Card detected"
        );

        self.active = Some(card.clone());
        Some(card)
    }

    /// The card selected by the last successful detection, if still held.
    pub fn active_card(&self) -> Option<&ActiveCard> {
        self.active.as_ref()
    }

    /// Family of the active card.
    ///
    /// Classification happens once at selection, so repeated calls within
    /// a session always agree.
    pub fn classify(&self) -> Option<CardFamily> {
        self.active.as_ref().map(|card| card.family)
    }

    /// Halt the card, leave the authenticated state, and wait for it to settle.
    ///
    /// With `keep_in_field` the session keeps the card's identity for a
    /// following [`wait_for_removal`](Self::wait_for_removal); otherwise the
    /// card is forgotten and the next detection may start immediately.
    pub async fn release(&mut self, keep_in_field: bool) {
        if let Err(e) = self.transport.halt().await {
            debug!(error = %e, "Halt failed");
        }
        if let Err(e) = self.transport.stop_crypto().await {
            debug!(error = %e, "Stop crypto failed");
        }
        sleep(self.timing.release_settle).await;

        if !keep_in_field {
            self.active = None;
        }
    }

    /// Give a freshly written Lightweight tag time to settle before it is read again.
    pub async fn settle_after_write(&self, family: CardFamily) {
        if family == CardFamily::Lightweight {
            sleep(self.timing.write_settle).await;
        }
    }

    /// Poll until no card answers a wake-up request, or `timeout` elapses.
    ///
    /// Every answering card is selected and halted again before the next
    /// poll: a card left in READY ignores the following wake-up and would
    /// look removed.
    ///
    /// A timeout is not an error. The card stays halted so it is not picked
    /// up as a new presentation, and the session carries on.
    pub async fn wait_for_removal(&mut self, timeout: Duration) -> RemovalOutcome {
        let deadline = Instant::now() + timeout;

        loop {
            let present = matches!(self.transport.request(RequestMode::Wake).await, Ok(true));
            if !present {
                info!("Card removal detected");
                self.active = None;
                return RemovalOutcome::Removed;
            }
            self.quiesce().await;

            if Instant::now() >= deadline {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Card still present after removal timeout, continuing"
                );
                self.active = None;
                return RemovalOutcome::TimedOut;
            }

            sleep(self.timing.removal_poll).await;
        }
    }

    /// Return a woken card to HALT.
    async fn quiesce(&mut self) {
        match self.transport.select().await {
            Ok(_) => {
                if let Err(e) = self.transport.halt().await {
                    debug!(error = %e, "Halt failed");
                }
            }
            Err(e) => debug!(error = %e, "Select before halt failed"),
        }
        if let Err(e) = self.transport.stop_crypto().await {
            debug!(error = %e, "Stop crypto failed");
        }
    }

    pub fn timing(&self) -> &SessionTiming {
        &self.timing
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Direct access to the transport for storage transfers.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spotirfid_hardware::mock::{MockPicc, MockPiccHandle, SimulatedTag, TransportOp};

    const UID: [u8; 4] = [0x04, 0xA1, 0xB2, 0xC3];

    async fn session() -> (CardSession<MockPicc>, MockPiccHandle) {
        let (chip, handle) = MockPicc::new();
        let mut session = CardSession::new(chip, SessionTiming::default());
        session.init().await.unwrap();
        (session, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_card_is_not_an_error() {
        let (mut session, _handle) = session().await;
        assert!(session.detect_and_select().await.is_none());
        assert!(session.active_card().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_detects_and_classifies() {
        let (mut session, handle) = session().await;
        handle.present(SimulatedTag::classic_1k(UID.to_vec()));

        let card = session.detect_and_select().await.unwrap();
        assert_eq!(card.identity.to_hex(), "04A1B2C3");
        assert_eq!(card.picc_type, PiccType::MifareClassic1K);
        assert_eq!(card.family, CardFamily::Authenticated);
        assert_eq!(session.classify(), Some(CardFamily::Authenticated));
        assert_eq!(session.classify(), session.classify());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_card_is_detected() {
        let (mut session, handle) = session().await;
        handle.present(SimulatedTag::ultralight(UID.to_vec()).with_sak(0x20));

        let card = session.detect_and_select().await.unwrap();
        assert_eq!(card.family, CardFamily::Unsupported);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_request_resets_reader() {
        let (chip, handle) = MockPicc::new();
        let mut session = CardSession::new(chip, SessionTiming::default());
        handle.present(SimulatedTag::ultralight(UID.to_vec()));

        // Uninitialized chip: the request itself fails.
        assert!(session.detect_and_select().await.is_none());
        assert_eq!(
            handle.operations(),
            vec![TransportOp::Request(RequestMode::Idle), TransportOp::Reset]
        );

        // The reset brought the reader back.
        let card = session.detect_and_select().await.unwrap();
        assert_eq!(card.identity.to_hex(), "04A1B2C3");
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_uid_is_ignored() {
        let (mut session, handle) = session().await;
        handle.present(SimulatedTag::ultralight(vec![0x04, 0xA1]));

        assert!(session.detect_and_select().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_halts_and_settles() {
        let (mut session, handle) = session().await;
        handle.present(SimulatedTag::ultralight(UID.to_vec()));
        session.detect_and_select().await.unwrap();
        handle.clear_operations();

        let start = Instant::now();
        session.release(false).await;

        assert_eq!(start.elapsed(), Duration::from_millis(50));
        assert_eq!(
            handle.operations(),
            vec![TransportOp::Halt, TransportOp::StopCrypto]
        );
        assert!(handle.is_halted());
        assert!(session.active_card().is_none());

        // A halted card left in the field is not a new card.
        assert!(session.detect_and_select().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_keep_in_field_retains_card() {
        let (mut session, handle) = session().await;
        handle.present(SimulatedTag::ultralight(UID.to_vec()));
        session.detect_and_select().await.unwrap();

        session.release(true).await;
        assert!(session.active_card().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_after_write_only_for_lightweight() {
        let (session, _handle) = session().await;

        let start = Instant::now();
        session.settle_after_write(CardFamily::Authenticated).await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        session.settle_after_write(CardFamily::Lightweight).await;
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_removal_detects_removal() {
        let (mut session, handle) = session().await;
        handle.present(SimulatedTag::ultralight(UID.to_vec()));
        session.detect_and_select().await.unwrap();
        session.release(true).await;

        let remover = handle.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(350)).await;
            remover.remove();
        });

        let start = Instant::now();
        let outcome = session.wait_for_removal(Duration::from_secs(5)).await;

        assert_eq!(outcome, RemovalOutcome::Removed);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(session.active_card().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_removal_times_out() {
        let (mut session, handle) = session().await;
        handle.present(SimulatedTag::ultralight(UID.to_vec()));
        session.detect_and_select().await.unwrap();
        session.release(true).await;
        handle.clear_operations();

        let start = Instant::now();
        let outcome = session.wait_for_removal(Duration::from_secs(5)).await;

        // The card stays on the reader for the whole timeout and is never
        // mistaken for a removed one.
        assert_eq!(outcome, RemovalOutcome::TimedOut);
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_millis(5200));

        let ops = handle.operations();
        let polls = ops
            .iter()
            .filter(|op| **op == TransportOp::Request(RequestMode::Wake))
            .count();
        assert!(polls >= 50);
        for poll in ops.chunks(4) {
            assert_eq!(
                poll,
                &[
                    TransportOp::Request(RequestMode::Wake),
                    TransportOp::Select,
                    TransportOp::Halt,
                    TransportOp::StopCrypto,
                ]
            );
        }

        // The stuck card is halted again rather than re-detected.
        assert!(handle.is_halted());
        assert!(session.detect_and_select().await.is_none());
    }
}
