//! Reader-chip trait definitions.
//!
//! This module defines the boundary between the tag-protocol engine and the
//! platform-specific binding of the reader chip (SPI lines, chip-select,
//! reset). Everything above this boundary speaks in ISO 14443A primitives:
//! request, select, authenticate, read, write, halt.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use std::time::Duration;

use spotirfid_core::constants::{
    BLOCK_SIZE, PAGE_SIZE, SAK_CLASSIC_1K, SAK_CLASSIC_4K, SAK_CLASSIC_MINI, SAK_ULTRALIGHT,
};
use spotirfid_core::{AuthKey, CardFamily};

use crate::error::Result;
use crate::types::ReaderInfo;

/// Tag type as classified from the SAK byte of the select response.
///
/// Follows the classification used by common reader-chip libraries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PiccType {
    /// Mifare Ultralight / NTAG.
    MifareUltralight,

    /// Mifare Classic Mini (320 bytes).
    MifareMini,

    /// Mifare Classic 1K (1024 bytes).
    MifareClassic1K,

    /// Mifare Classic 4K (4096 bytes).
    MifareClassic4K,

    /// Mifare Plus (SL2).
    MifarePlus,

    /// Mifare TNP3xxx.
    Tnp3xxx,

    /// ISO/IEC 14443-4 compliant card.
    Iso14443_4,

    /// ISO/IEC 18092 (NFC-DEP) target.
    Iso18092,

    /// SAK indicates the UID was not complete.
    IncompleteUid,

    /// Unknown SAK value.
    Unknown(u8),
}

impl PiccType {
    /// Classify a tag from its SAK byte.
    ///
    /// Bit 8 of the SAK is ignored.
    ///
    /// ```
    /// use spotirfid_hardware::PiccType;
    ///
    /// assert_eq!(PiccType::from_sak(0x00), PiccType::MifareUltralight);
    /// assert_eq!(PiccType::from_sak(0x88), PiccType::MifareClassic1K);
    /// assert_eq!(PiccType::from_sak(0x33), PiccType::Unknown(0x33));
    /// ```
    pub fn from_sak(sak: u8) -> Self {
        match sak & 0x7F {
            0x04 => Self::IncompleteUid,
            SAK_CLASSIC_MINI => Self::MifareMini,
            SAK_CLASSIC_1K => Self::MifareClassic1K,
            SAK_CLASSIC_4K => Self::MifareClassic4K,
            SAK_ULTRALIGHT => Self::MifareUltralight,
            0x10 | 0x11 => Self::MifarePlus,
            0x01 => Self::Tnp3xxx,
            0x20 => Self::Iso14443_4,
            0x40 => Self::Iso18092,
            other => Self::Unknown(other),
        }
    }

    /// Get a human-readable name for the tag type.
    pub fn name(&self) -> &str {
        match self {
            Self::MifareUltralight => "MIFARE Ultralight or Ultralight C",
            Self::MifareMini => "MIFARE Mini, 320 bytes",
            Self::MifareClassic1K => "MIFARE 1KB",
            Self::MifareClassic4K => "MIFARE 4KB",
            Self::MifarePlus => "MIFARE Plus",
            Self::Tnp3xxx => "MIFARE TNP3XXX",
            Self::Iso14443_4 => "PICC compliant with ISO/IEC 14443-4",
            Self::Iso18092 => "PICC compliant with ISO/IEC 18092 (NFC)",
            Self::IncompleteUid => "SAK indicates UID is not complete",
            Self::Unknown(_) => "Unknown type",
        }
    }

    /// Storage family this tag type belongs to.
    pub fn family(&self) -> CardFamily {
        match self {
            Self::MifareUltralight => CardFamily::Lightweight,
            Self::MifareMini | Self::MifareClassic1K | Self::MifareClassic4K => {
                CardFamily::Authenticated
            }
            _ => CardFamily::Unsupported,
        }
    }
}

impl From<PiccType> for CardFamily {
    fn from(picc_type: PiccType) -> Self {
        picc_type.family()
    }
}

/// Request command used to poll the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// REQA: only cards in the IDLE state answer.
    Idle,
    /// WUPA: halted cards answer as well.
    Wake,
}

/// Result of anti-collision and selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// UID bytes (4, 7 or 10).
    pub uid: Vec<u8>,

    /// Select acknowledge byte.
    pub sak: u8,
}

/// Reader chip abstraction.
///
/// One implementation owns the physical link to the chip; the engine above
/// holds it exclusively for the whole session. Every call is one bounded
/// exchange with the chip and the tag.
///
/// # Object Safety
///
/// **NOTE**: This trait is NOT object-safe because `async fn` methods return
/// `impl Future`. Use generic type parameters:
///
/// ```no_run
/// use spotirfid_hardware::{PiccTransport, RequestMode, Result};
///
/// async fn card_waiting<T: PiccTransport>(chip: &mut T) -> Result<bool> {
///     chip.request(RequestMode::Idle).await
/// }
/// ```
pub trait PiccTransport {
    /// Initialize the chip (timers, antenna, modulation).
    async fn init(&mut self) -> Result<()>;

    /// Soft-reset the chip and bring it back to its initialized configuration.
    async fn reset(&mut self) -> Result<()>;

    /// Report chip information.
    async fn reader_info(&self) -> Result<ReaderInfo>;

    /// Probe the field with REQA or WUPA.
    ///
    /// Returns `Ok(false)` when no card answered.
    async fn request(&mut self, mode: RequestMode) -> Result<bool>;

    /// Run anti-collision and select the answering card.
    async fn select(&mut self) -> Result<Selection>;

    /// Key-A authentication for a single block of the selected card.
    async fn authenticate(&mut self, block: u8, key: &AuthKey, uid: &[u8]) -> Result<()>;

    /// Read 16 bytes starting at `address` (a block, or four pages).
    async fn read_block(&mut self, address: u8) -> Result<[u8; BLOCK_SIZE]>;

    /// Write one 16-byte block.
    async fn write_block(&mut self, address: u8, data: &[u8; BLOCK_SIZE]) -> Result<()>;

    /// Write one 4-byte page.
    async fn write_page(&mut self, page: u8, data: &[u8; PAGE_SIZE]) -> Result<()>;

    /// Send HLTA to the selected card.
    async fn halt(&mut self) -> Result<()>;

    /// Leave the authenticated (encrypted) state.
    async fn stop_crypto(&mut self) -> Result<()>;
}

/// Status indicator (a single LED on the reader board).
pub trait StatusIndicator {
    /// Switch the indicator on or off.
    async fn set(&mut self, on: bool);

    /// Blink `times` times with `period` on and `period` off.
    async fn flash(&mut self, times: u8, period: Duration);
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0x00, PiccType::MifareUltralight, CardFamily::Lightweight)]
    #[case(0x08, PiccType::MifareClassic1K, CardFamily::Authenticated)]
    #[case(0x09, PiccType::MifareMini, CardFamily::Authenticated)]
    #[case(0x18, PiccType::MifareClassic4K, CardFamily::Authenticated)]
    #[case(0x88, PiccType::MifareClassic1K, CardFamily::Authenticated)]
    #[case(0x10, PiccType::MifarePlus, CardFamily::Unsupported)]
    #[case(0x11, PiccType::MifarePlus, CardFamily::Unsupported)]
    #[case(0x01, PiccType::Tnp3xxx, CardFamily::Unsupported)]
    #[case(0x20, PiccType::Iso14443_4, CardFamily::Unsupported)]
    #[case(0x40, PiccType::Iso18092, CardFamily::Unsupported)]
    #[case(0x04, PiccType::IncompleteUid, CardFamily::Unsupported)]
    #[case(0x33, PiccType::Unknown(0x33), CardFamily::Unsupported)]
    fn test_classification(
        #[case] sak: u8,
        #[case] picc_type: PiccType,
        #[case] family: CardFamily,
    ) {
        assert_eq!(PiccType::from_sak(sak), picc_type);
        assert_eq!(CardFamily::from(PiccType::from_sak(sak)), family);
    }

    #[test]
    fn test_classification_is_stable() {
        let first = PiccType::from_sak(0x08).family();
        let second = PiccType::from_sak(0x08).family();
        assert_eq!(first, second);
    }

    #[test]
    fn test_picc_type_name() {
        assert_eq!(PiccType::MifareClassic1K.name(), "MIFARE 1KB");
        assert_eq!(PiccType::Unknown(0x7F).name(), "Unknown type");
    }
}
