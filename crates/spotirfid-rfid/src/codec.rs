//! Payload storage codec.
//!
//! Encodes a [`TagPayload`] into the fixed-size stored image and moves that
//! image to and from a card through its family's [`StorageLayout`].
//!
//! Reads are best-effort: a failure at unit `k` yields the payload decoded
//! from units `0..k`. Writes stop at the first failing unit and report it;
//! units already written are not rolled back.

use tracing::{debug, warn};

use spotirfid_core::constants::{BLOCK_SIZE, PAGE_SIZE, PAYLOAD_CAPACITY};
use spotirfid_core::{AuthKey, CardFamily, TagPayload};
use spotirfid_hardware::PiccTransport;

use crate::error::{StorageFailure, WriteFailure};
use crate::layout::{PhysicalUnit, StorageLayout};
use crate::session::CardSession;

/// Stored image of `payload`: its bytes followed by zero padding.
pub fn encode(payload: &TagPayload) -> [u8; PAYLOAD_CAPACITY] {
    payload.to_padded()
}

/// Payload held in a stored image.
///
/// Decoding stops at the first zero byte or after [`PAYLOAD_CAPACITY`]
/// bytes; other non-printable bytes are skipped.
pub fn decode(bytes: &[u8]) -> TagPayload {
    TagPayload::from_stored_bytes(bytes)
}

/// Bytes fetched by a read, and where it stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRead {
    /// Concatenated unit contents, in unit order.
    pub bytes: Vec<u8>,
    /// Units read successfully.
    pub units_read: usize,
    /// Why the read stopped early, if it did.
    pub failure: Option<StorageFailure>,
}

impl RawRead {
    fn failed(failure: StorageFailure) -> Self {
        Self {
            bytes: Vec::new(),
            units_read: 0,
            failure: Some(failure),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    pub fn payload(&self) -> TagPayload {
        decode(&self.bytes)
    }
}

/// Reads and writes payloads using one authentication key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageCodec {
    key: AuthKey,
}

impl StorageCodec {
    pub fn new(key: AuthKey) -> Self {
        Self { key }
    }

    pub fn key(&self) -> &AuthKey {
        &self.key
    }

    /// Read the payload stored on the active card.
    ///
    /// Never fails: unsupported cards and failed transfers yield whatever
    /// was decodable before the failure, possibly the empty payload.
    pub async fn read<T: PiccTransport>(
        &self,
        session: &mut CardSession<T>,
        family: CardFamily,
    ) -> TagPayload {
        let raw = self.read_raw(session, family).await;
        if let Some(failure) = &raw.failure {
            warn!(
                family = %family,
                units_read = raw.units_read,
                error = %failure,
                "Partial read"
            );
        }
        raw.payload()
    }

    /// Read every payload unit of the active card without decoding.
    pub async fn read_raw<T: PiccTransport>(
        &self,
        session: &mut CardSession<T>,
        family: CardFamily,
    ) -> RawRead {
        let Some(layout) = StorageLayout::for_family(family) else {
            return RawRead::failed(StorageFailure::UnsupportedFamily);
        };
        let uid = match session.active_card() {
            Some(card) => card.identity.as_bytes().to_vec(),
            None => return RawRead::failed(StorageFailure::NoActiveCard),
        };

        let units = layout.read_units();
        let mut bytes = Vec::with_capacity(layout.capacity());

        for unit in &units {
            if layout.requires_authentication() {
                if let Err(failure) = self.authenticate(session, unit, &uid).await {
                    return RawRead {
                        bytes,
                        units_read: unit.index,
                        failure: Some(failure),
                    };
                }
            }

            match session.transport_mut().read_block(unit.address).await {
                Ok(data) => {
                    debug!(unit = unit.index, address = unit.address, "Read unit");
                    bytes.extend_from_slice(&data[..unit.len]);
                }
                Err(cause) => {
                    return RawRead {
                        bytes,
                        units_read: unit.index,
                        failure: Some(StorageFailure::TransferFailed {
                            at_unit: unit.index,
                            address: unit.address,
                            cause,
                        }),
                    };
                }
            }
        }

        RawRead {
            bytes,
            units_read: units.len(),
            failure: None,
        }
    }

    /// Write `payload`, zero-padded to full capacity, to the active card.
    ///
    /// # Errors
    /// Returns the first failing unit. Earlier units remain written.
    pub async fn write<T: PiccTransport>(
        &self,
        session: &mut CardSession<T>,
        family: CardFamily,
        payload: &TagPayload,
    ) -> Result<(), WriteFailure> {
        let layout = StorageLayout::for_family(family).ok_or(StorageFailure::UnsupportedFamily)?;
        let uid = session
            .active_card()
            .map(|card| card.identity.as_bytes().to_vec())
            .ok_or(StorageFailure::NoActiveCard)?;

        let image = encode(payload);
        debug!(family = %family, len = payload.len(), "Writing payload");

        for unit in layout.write_units() {
            let data = &image[unit.range()];
            let result = match layout {
                StorageLayout::Lightweight => {
                    let mut page = [0u8; PAGE_SIZE];
                    page.copy_from_slice(data);
                    session.transport_mut().write_page(unit.address, &page).await
                }
                StorageLayout::Authenticated => {
                    self.authenticate(session, &unit, &uid)
                        .await
                        .inspect_err(|failure| warn!(error = %failure, "Write aborted"))?;
                    let mut block = [0u8; BLOCK_SIZE];
                    block.copy_from_slice(data);
                    session.transport_mut().write_block(unit.address, &block).await
                }
            };

            if let Err(cause) = result {
                let failure = StorageFailure::TransferFailed {
                    at_unit: unit.index,
                    address: unit.address,
                    cause,
                };
                warn!(error = %failure, "Write aborted");
                return Err(failure);
            }
            debug!(unit = unit.index, address = unit.address, "Wrote unit");
        }

        Ok(())
    }

    /// Zero-fill every payload unit of the active card.
    ///
    /// # Errors
    /// Same as [`write`](Self::write).
    pub async fn wipe<T: PiccTransport>(
        &self,
        session: &mut CardSession<T>,
        family: CardFamily,
    ) -> Result<(), WriteFailure> {
        self.write(session, family, &TagPayload::empty()).await
    }

    async fn authenticate<T: PiccTransport>(
        &self,
        session: &mut CardSession<T>,
        unit: &PhysicalUnit,
        uid: &[u8],
    ) -> Result<(), StorageFailure> {
        session
            .transport_mut()
            .authenticate(unit.address, &self.key, uid)
            .await
            .map_err(|cause| StorageFailure::AuthenticationFailed {
                at_unit: unit.index,
                block: unit.address,
                cause,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use spotirfid_core::SessionTiming;
    use spotirfid_hardware::TransportError;
    use spotirfid_hardware::mock::{Fault, MockPicc, MockPiccHandle, SimulatedTag, TransportOp};

    const UID: [u8; 4] = [0x04, 0xA1, 0xB2, 0xC3];

    async fn selected(tag: SimulatedTag) -> (CardSession<MockPicc>, MockPiccHandle, CardFamily) {
        let (chip, handle) = MockPicc::new();
        let mut session = CardSession::new(chip, SessionTiming::default());
        session.init().await.unwrap();
        handle.present(tag);
        let card = session.detect_and_select().await.unwrap();
        handle.clear_operations();
        (session, handle, card.family)
    }

    fn payload(text: &str) -> TagPayload {
        TagPayload::new(text).unwrap()
    }

    #[rstest]
    #[case(b"spotify:album:123\0junk".as_slice(), "spotify:album:123")]
    #[case(b"ab\x01\x7Fcd\0".as_slice(), "abcd")]
    #[case(b"\0spotify".as_slice(), "")]
    fn test_decode(#[case] bytes: &[u8], #[case] expected: &str) {
        assert_eq!(decode(bytes).as_str(), expected);
    }

    #[test]
    fn test_decode_stops_at_capacity() {
        let decoded = decode(&[b'x'; 60]);
        assert_eq!(decoded.len(), PAYLOAD_CAPACITY);
    }

    #[test]
    fn test_encode_pads_with_zeros() {
        let image = encode(&payload("abc"));
        assert_eq!(&image[..3], b"abc");
        assert!(image[3..].iter().all(|b| *b == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lightweight_read() {
        let tag = SimulatedTag::ultralight(UID.to_vec()).with_user_data(b"spotify:track:42");
        let (mut session, handle, family) = selected(tag).await;

        let value = StorageCodec::default().read(&mut session, family).await;

        assert_eq!(value.as_str(), "spotify:track:42");
        assert_eq!(
            handle.operations(),
            vec![
                TransportOp::Read { address: 4 },
                TransportOp::Read { address: 8 },
                TransportOp::Read { address: 12 },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_lightweight_write_is_twelve_pages() {
        let (mut session, handle, family) = selected(SimulatedTag::ultralight(UID.to_vec())).await;

        StorageCodec::default()
            .write(&mut session, family, &payload("spotify:album:999"))
            .await
            .unwrap();

        let pages: Vec<TransportOp> = (4..16).map(|page| TransportOp::WritePage { page }).collect();
        assert_eq!(handle.operations(), pages);

        let tag = handle.tag().unwrap();
        assert_eq!(&tag.user_data()[..17], b"spotify:album:999");
        assert!(tag.user_data()[17..48].iter().all(|b| *b == 0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_authenticated_write_authenticates_each_block() {
        let (mut session, handle, family) = selected(SimulatedTag::classic_1k(UID.to_vec())).await;

        StorageCodec::default()
            .write(&mut session, family, &payload("spotify:album:999"))
            .await
            .unwrap();

        assert_eq!(
            handle.operations(),
            vec![
                TransportOp::Authenticate { block: 4 },
                TransportOp::WriteBlock { address: 4 },
                TransportOp::Authenticate { block: 5 },
                TransportOp::WriteBlock { address: 5 },
                TransportOp::Authenticate { block: 6 },
                TransportOp::WriteBlock { address: 6 },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_key() {
        let tag = SimulatedTag::classic_1k(UID.to_vec())
            .with_key(AuthKey::new([0x11; 6]))
            .with_user_data(b"secret");
        let (mut session, handle, family) = selected(tag).await;
        let codec = StorageCodec::default();

        let raw = codec.read_raw(&mut session, family).await;
        assert!(raw.bytes.is_empty());
        assert!(matches!(
            raw.failure,
            Some(StorageFailure::AuthenticationFailed { at_unit: 0, block: 4, .. })
        ));
        assert!(raw.payload().is_empty());

        let result = codec.write(&mut session, family, &payload("new")).await;
        assert!(matches!(
            result,
            Err(StorageFailure::AuthenticationFailed { at_unit: 0, .. })
        ));
        assert_eq!(handle.write_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_write_keeps_earlier_units() {
        let (mut session, handle, family) = selected(SimulatedTag::ultralight(UID.to_vec())).await;
        handle.inject_fault(Fault::write(7));

        let result = StorageCodec::default()
            .write(&mut session, family, &payload("0123456789abcdefghij"))
            .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.at_unit(), Some(3));
        assert!(matches!(
            failure,
            StorageFailure::TransferFailed { address: 7, cause: TransportError::Nack { .. }, .. }
        ));

        let tag = handle.tag().unwrap();
        assert_eq!(&tag.user_data()[..12], b"0123456789ab");
        assert!(tag.user_data()[12..16].iter().all(|b| *b == 0));
        assert_eq!(handle.write_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_read_returns_prefix() {
        let text = "0123456789abcdef0123456789ABCDEFtail";
        let tag = SimulatedTag::ultralight(UID.to_vec()).with_user_data(text.as_bytes());
        let (mut session, handle, family) = selected(tag).await;
        handle.inject_fault(Fault::read(12));

        let raw = StorageCodec::default().read_raw(&mut session, family).await;
        assert_eq!(raw.units_read, 2);
        assert_eq!(raw.payload().as_str(), &text[..32]);
        assert!(!raw.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_failure_mid_read_returns_prefix() {
        let text = "0123456789abcdefGHIJKLMNOPQRSTUVtail";
        let tag = SimulatedTag::classic_1k(UID.to_vec()).with_user_data(text.as_bytes());
        let (mut session, handle, family) = selected(tag).await;
        handle.inject_fault(Fault::authenticate(5));

        let raw = StorageCodec::default().read_raw(&mut session, family).await;

        assert_eq!(raw.units_read, 1);
        assert_eq!(raw.payload().as_str(), "0123456789abcdef");
        assert!(matches!(
            raw.failure,
            Some(StorageFailure::AuthenticationFailed { at_unit: 1, block: 5, .. })
        ));
        assert_eq!(
            handle.operations(),
            vec![
                TransportOp::Authenticate { block: 4 },
                TransportOp::Read { address: 4 },
                TransportOp::Authenticate { block: 5 },
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_failure_mid_write_keeps_earlier_blocks() {
        let text = "0123456789abcdefGHIJKLMNOPQRSTUVtail";
        let tag = SimulatedTag::classic_1k(UID.to_vec()).with_user_data(text.as_bytes());
        let (mut session, handle, family) = selected(tag).await;
        handle.inject_fault(Fault::authenticate(5));

        let result = StorageCodec::default()
            .write(&mut session, family, &payload("spotify:album:999"))
            .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.at_unit(), Some(1));
        assert!(failure.is_authentication());
        assert_eq!(handle.write_count(), 1);

        let tag = handle.tag().unwrap();
        assert_eq!(&tag.user_data()[..16], b"spotify:album:99");
        assert_eq!(&tag.user_data()[16..36], b"GHIJKLMNOPQRSTUVtail");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sector_key_outside_payload_is_ignored() {
        let tag = SimulatedTag::classic_1k(UID.to_vec())
            .with_sector_key(2, AuthKey::new([0x11; 6]))
            .with_user_data(b"spotify:track:42");
        let (mut session, _handle, family) = selected(tag).await;

        let value = StorageCodec::default().read(&mut session, family).await;
        assert_eq!(value.as_str(), "spotify:track:42");
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_family() {
        let tag = SimulatedTag::ultralight(UID.to_vec()).with_sak(0x20);
        let (mut session, handle, family) = selected(tag).await;
        assert_eq!(family, CardFamily::Unsupported);
        let codec = StorageCodec::default();

        assert!(codec.read(&mut session, family).await.is_empty());
        assert_eq!(
            codec.write(&mut session, family, &payload("x")).await,
            Err(StorageFailure::UnsupportedFamily)
        );
        assert!(handle.operations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_active_card() {
        let (chip, _handle) = MockPicc::new();
        let mut session = CardSession::new(chip, SessionTiming::default());

        let result = StorageCodec::default()
            .write(&mut session, CardFamily::Lightweight, &payload("x"))
            .await;
        assert_eq!(result, Err(StorageFailure::NoActiveCard));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wipe_zero_fills() {
        let tag = SimulatedTag::classic_1k(UID.to_vec()).with_user_data(&[b'z'; 48]);
        let (mut session, handle, family) = selected(tag).await;

        StorageCodec::default().wipe(&mut session, family).await.unwrap();

        assert!(handle.tag().unwrap().user_data()[..48].iter().all(|b| *b == 0));
        // Sector trailer untouched.
        assert_eq!(&handle.tag().unwrap().user_data()[48..54], &[0xFF; 6]);
    }
}
