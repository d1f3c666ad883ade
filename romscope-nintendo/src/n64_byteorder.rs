//! N64 byte-order detection and normalization.
//!
//! N64 ROMs exist in three byte orderings, told apart by the first word
//! (0x80371240 in native big-endian order).

use romscope_core::bytes::{swap16_in_place, swap32_in_place};

/// N64 ROM byte order. The discriminant doubles as the detection id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ByteOrder {
    /// .z64: big-endian (canonical), no swap needed
    Z64 = 0,
    /// .v64: byte-swapped pairs
    V64 = 1,
    /// .n64: little-endian, reversed 4-byte groups
    N64 = 2,
}

pub(crate) const MAGIC_Z64: [u8; 4] = [0x80, 0x37, 0x12, 0x40];
pub(crate) const MAGIC_V64: [u8; 4] = [0x37, 0x80, 0x40, 0x12];
pub(crate) const MAGIC_N64: [u8; 4] = [0x40, 0x12, 0x37, 0x80];

impl ByteOrder {
    /// Byte order from the first 4 bytes of a ROM.
    pub(crate) fn from_magic(magic: &[u8]) -> Option<Self> {
        match magic.get(..4)? {
            m if m == MAGIC_Z64 => Some(Self::Z64),
            m if m == MAGIC_V64 => Some(Self::V64),
            m if m == MAGIC_N64 => Some(Self::N64),
            _ => None,
        }
    }

    pub(crate) fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::Z64),
            1 => Some(Self::V64),
            2 => Some(Self::N64),
            _ => None,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Z64 => "z64 (big-endian)",
            Self::V64 => "v64 (byte-swapped)",
            Self::N64 => "n64 (little-endian)",
        }
    }

    /// Convert a buffer read at a 4-byte-aligned offset to big-endian.
    pub(crate) fn normalize(self, data: &mut [u8]) {
        match self {
            Self::Z64 => {}
            Self::V64 => swap16_in_place(data),
            Self::N64 => swap32_in_place(data),
        }
    }
}

#[cfg(test)]
#[path = "tests/n64_byteorder_tests.rs"]
mod tests;
