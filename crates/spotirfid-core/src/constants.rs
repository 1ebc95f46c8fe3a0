//! Core constants for tag storage layout and reader timing.
//!
//! This module centralizes every fixed number the tag-protocol engine relies
//! on: where the payload lives on each card family, how large it may grow,
//! the key used for authenticated storage, and the settle/poll windows that
//! make repeated scans reliable.
//!
//! # Storage Layout
//!
//! ```text
//! Lightweight (Ultralight / NTAG)          Authenticated (Classic 1K/4K/Mini)
//! page  4 ┐                                block 4  ┐
//! page  5 │ read unit 0 (16 bytes)         block 5  │ one 16-byte unit each,
//! page  6 │                                block 6  ┘ key-A handshake per block
//! page  7 ┘                                block 7    sector trailer (never touched)
//! page  8 ┐ read unit 1
//!  ...    │
//! page 15 ┘ read unit 2
//! ```
//!
//! Both layouts carry exactly [`PAYLOAD_CAPACITY`] bytes.
//!
//! # Usage
//!
//! ```
//! use spotirfid_core::constants::*;
//!
//! assert_eq!(LIGHTWEIGHT_PAGE_COUNT * PAGE_SIZE, PAYLOAD_CAPACITY);
//! assert_eq!(AUTHENTICATED_BLOCK_COUNT * BLOCK_SIZE, PAYLOAD_CAPACITY);
//! ```

// ============================================================================
// Payload
// ============================================================================

/// Maximum payload length in bytes.
///
/// A payload shorter than this is terminated by the first zero byte; a
/// payload of exactly this length carries no terminator.
pub const PAYLOAD_CAPACITY: usize = 48;

/// Lowest byte value accepted as payload text (space).
pub const PRINTABLE_MIN: u8 = 32;

/// Highest byte value accepted as payload text (`~`).
pub const PRINTABLE_MAX: u8 = 126;

/// Byte that marks the logical end of a payload.
pub const PAYLOAD_TERMINATOR: u8 = 0x00;

// ============================================================================
// Physical Units
// ============================================================================

/// Size of one Lightweight-family page in bytes.
pub const PAGE_SIZE: usize = 4;

/// Size of one Authenticated-family block in bytes.
///
/// Also the size of every read transfer, for both families: a Lightweight
/// read returns four consecutive pages.
pub const BLOCK_SIZE: usize = 16;

/// First user-memory page on Lightweight tags.
///
/// Pages 0-3 hold the UID, lock bytes and capability container.
pub const LIGHTWEIGHT_BASE_PAGE: u8 = 4;

/// Number of pages holding the payload on Lightweight tags.
pub const LIGHTWEIGHT_PAGE_COUNT: usize = 12;

/// Pages returned by a single Lightweight read transfer.
pub const PAGES_PER_READ: usize = BLOCK_SIZE / PAGE_SIZE;

/// First data block of sector 1 on Authenticated tags.
pub const AUTHENTICATED_BASE_BLOCK: u8 = 4;

/// Number of blocks holding the payload on Authenticated tags.
pub const AUTHENTICATED_BLOCK_COUNT: usize = 3;

/// Blocks per sector in the small-sector region of Classic cards.
///
/// The last block of every sector is the sector trailer (keys and access bits).
pub const BLOCKS_PER_SECTOR: u8 = 4;

// ============================================================================
// Authentication
// ============================================================================

/// Length of a key-A/key-B secret in bytes.
pub const AUTH_KEY_LENGTH: usize = 6;

/// Factory default key for Classic-family cards.
pub const DEFAULT_AUTH_KEY: [u8; AUTH_KEY_LENGTH] = [0xFF; AUTH_KEY_LENGTH];

// ============================================================================
// Card Identity
// ============================================================================

/// Minimum UID length in bytes (single-size UID, ISO 14443-3).
pub const MIN_UID_LENGTH: usize = 4;

/// Maximum UID length in bytes (triple-size UID, ISO 14443-3).
pub const MAX_UID_LENGTH: usize = 10;

// ============================================================================
// SAK Type Codes
// ============================================================================

/// SAK reported by Ultralight / NTAG tags.
pub const SAK_ULTRALIGHT: u8 = 0x00;

/// SAK reported by Classic Mini tags.
pub const SAK_CLASSIC_MINI: u8 = 0x09;

/// SAK reported by Classic 1K tags.
pub const SAK_CLASSIC_1K: u8 = 0x08;

/// SAK reported by Classic 4K tags.
pub const SAK_CLASSIC_4K: u8 = 0x18;

// ============================================================================
// Timing (milliseconds)
// ============================================================================

/// Settle delay after halting a card, before the field is considered clean.
pub const DEFAULT_RELEASE_SETTLE_MS: u64 = 50;

/// Extra settle delay after a Lightweight write before the tag is re-read.
pub const DEFAULT_WRITE_SETTLE_MS: u64 = 200;

/// How long to wait for a card to leave the field.
pub const DEFAULT_REMOVAL_TIMEOUT_MS: u64 = 5000;

/// Presence poll interval while waiting for removal.
pub const DEFAULT_REMOVAL_POLL_MS: u64 = 100;

/// Delay between detection attempts when no card is present.
pub const DEFAULT_IDLE_POLL_MS: u64 = 50;

/// Number of indicator flashes acknowledging a successful report.
pub const REPORT_ACK_FLASHES: u8 = 2;

/// Half-period of an acknowledgement flash.
pub const REPORT_ACK_FLASH_MS: u64 = 100;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts_share_capacity() {
        assert_eq!(LIGHTWEIGHT_PAGE_COUNT * PAGE_SIZE, PAYLOAD_CAPACITY);
        assert_eq!(AUTHENTICATED_BLOCK_COUNT * BLOCK_SIZE, PAYLOAD_CAPACITY);
    }

    #[test]
    fn test_authenticated_payload_stays_inside_one_sector() {
        let first = AUTHENTICATED_BASE_BLOCK;
        let last = first + AUTHENTICATED_BLOCK_COUNT as u8 - 1;
        let trailer = (first / BLOCKS_PER_SECTOR) * BLOCKS_PER_SECTOR + BLOCKS_PER_SECTOR - 1;

        assert_eq!(first / BLOCKS_PER_SECTOR, last / BLOCKS_PER_SECTOR);
        assert!(last < trailer);
    }

    #[test]
    fn test_lightweight_reads_cover_whole_pages() {
        assert_eq!(LIGHTWEIGHT_PAGE_COUNT % PAGES_PER_READ, 0);
    }
}
