//! Logical payload to physical unit mapping.
//!
//! A payload is a flat buffer of [`PAYLOAD_CAPACITY`] bytes. Each card family
//! stores that buffer in a fixed run of physical units, and this module is
//! the only place that knows the addressing arithmetic:
//!
//! | Family        | Read units                 | Write units               |
//! |---------------|----------------------------|---------------------------|
//! | Lightweight   | pages 4, 8, 12 (16 bytes)  | pages 4..=15 (4 bytes)    |
//! | Authenticated | blocks 4, 5, 6 (16 bytes)  | blocks 4, 5, 6 (16 bytes) |
//!
//! Authenticated units each need their own key-A handshake.

use std::ops::Range;

use spotirfid_core::CardFamily;
use spotirfid_core::constants::{
    AUTHENTICATED_BASE_BLOCK, AUTHENTICATED_BLOCK_COUNT, BLOCK_SIZE, LIGHTWEIGHT_BASE_PAGE,
    LIGHTWEIGHT_PAGE_COUNT, PAGE_SIZE, PAGES_PER_READ, PAYLOAD_CAPACITY,
};

/// One physical transfer covering a slice of the logical payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalUnit {
    /// Position in the transfer sequence.
    pub index: usize,
    /// Page or block address on the tag.
    pub address: u8,
    /// Offset of the first payload byte carried by this unit.
    pub offset: usize,
    /// Bytes carried by this unit.
    pub len: usize,
}

impl PhysicalUnit {
    /// Payload byte range carried by this unit.
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Physical storage layout of a supported card family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageLayout {
    /// Sequential pages, no authentication.
    Lightweight,
    /// Sector blocks, one key-A handshake per block.
    Authenticated,
}

impl StorageLayout {
    /// Layout for `family`, or `None` if the family has no payload storage.
    pub fn for_family(family: CardFamily) -> Option<Self> {
        match family {
            CardFamily::Lightweight => Some(Self::Lightweight),
            CardFamily::Authenticated => Some(Self::Authenticated),
            CardFamily::Unsupported => None,
        }
    }

    pub fn family(&self) -> CardFamily {
        match self {
            Self::Lightweight => CardFamily::Lightweight,
            Self::Authenticated => CardFamily::Authenticated,
        }
    }

    pub fn requires_authentication(&self) -> bool {
        matches!(self, Self::Authenticated)
    }

    /// Total payload bytes this layout stores.
    pub const fn capacity(&self) -> usize {
        PAYLOAD_CAPACITY
    }

    /// Units visited by a read, in increasing address order.
    pub fn read_units(&self) -> Vec<PhysicalUnit> {
        match self {
            Self::Lightweight => units(
                LIGHTWEIGHT_BASE_PAGE,
                PAGES_PER_READ,
                LIGHTWEIGHT_PAGE_COUNT / PAGES_PER_READ,
                BLOCK_SIZE,
            ),
            Self::Authenticated => units(
                AUTHENTICATED_BASE_BLOCK,
                1,
                AUTHENTICATED_BLOCK_COUNT,
                BLOCK_SIZE,
            ),
        }
    }

    /// Units visited by a write, in increasing address order.
    pub fn write_units(&self) -> Vec<PhysicalUnit> {
        match self {
            Self::Lightweight => units(LIGHTWEIGHT_BASE_PAGE, 1, LIGHTWEIGHT_PAGE_COUNT, PAGE_SIZE),
            Self::Authenticated => self.read_units(),
        }
    }
}

fn units(base: u8, stride: usize, count: usize, len: usize) -> Vec<PhysicalUnit> {
    (0..count)
        .map(|index| PhysicalUnit {
            index,
            address: base + (index * stride) as u8,
            offset: index * len,
            len,
        })
        .collect()
}
