//! NCSD: the header of a CCI game card image.
//!
//! The NCSD header holds a table of up to eight NCCH partitions (partition
//! 0 is the game itself); the card info header that follows records the
//! filled size, title version and card revision.

use romscope_core::bytes::{read_u16_le, read_u32_le, read_u64_le};
use romscope_core::util::format_bytes;
use romscope_core::{FieldList, RomError};

use super::common::{MEDIA_UNIT, format_version, media_type_name, platform_name};

pub(crate) const NCSD_MAGIC: &[u8; 4] = b"NCSD";
/// NCSD header plus card info header.
pub(crate) const NCSD_HEADER_LEN: usize = 0x400;

const OFF_MAGIC: usize = 0x100;
const OFF_IMAGE_SIZE: usize = 0x104;
const OFF_MEDIA_ID: usize = 0x108;
const OFF_PARTITIONS: usize = 0x120;
const OFF_FLAGS: usize = 0x188;
const OFF_WRITABLE_ADDRESS: usize = 0x200;
const OFF_FILLED_SIZE: usize = 0x300;
const OFF_TITLE_VERSION: usize = 0x310;
const OFF_CARD_REVISION: usize = 0x312;

const PARTITION_COUNT: usize = 8;

const PARTITION_NAMES: [&str; PARTITION_COUNT] = [
    "Game",
    "Manual",
    "Download Play",
    "Partition 3",
    "Partition 4",
    "Partition 5",
    "New 3DS update",
    "Update",
];

/// Parsed NCSD and card info headers. Offsets and sizes are in bytes.
#[derive(Debug, Clone)]
pub(crate) struct NcsdHeader {
    pub(crate) image_size: u64,
    pub(crate) media_id: u64,
    pub(crate) partitions: [(u64, u64); PARTITION_COUNT],
    pub(crate) platform: u8,
    pub(crate) media_type: u8,
    /// Card2 save area, in media units.
    pub(crate) writable_address: u32,
    /// Bytes actually used on the card, in bytes.
    pub(crate) filled_size: u64,
    pub(crate) title_version: u16,
    pub(crate) card_revision: u16,
}

impl NcsdHeader {
    pub(crate) fn parse(buf: &[u8]) -> Result<Self, RomError> {
        if buf.len() < NCSD_HEADER_LEN {
            return Err(RomError::truncated(NCSD_HEADER_LEN as u64, buf.len() as u64));
        }
        if &buf[OFF_MAGIC..OFF_MAGIC + 4] != NCSD_MAGIC {
            return Err(RomError::invalid_format("missing NCSD magic"));
        }
        let mut partitions = [(0u64, 0u64); PARTITION_COUNT];
        for (i, p) in partitions.iter_mut().enumerate() {
            let off = OFF_PARTITIONS + i * 8;
            *p = (
                read_u32_le(buf, off) as u64 * MEDIA_UNIT,
                read_u32_le(buf, off + 4) as u64 * MEDIA_UNIT,
            );
        }
        if partitions[0].1 == 0 {
            return Err(RomError::corrupted_header("NCSD partition 0 is empty"));
        }
        Ok(Self {
            image_size: read_u32_le(buf, OFF_IMAGE_SIZE) as u64 * MEDIA_UNIT,
            media_id: read_u64_le(buf, OFF_MEDIA_ID),
            partitions,
            platform: buf[OFF_FLAGS + 4],
            media_type: buf[OFF_FLAGS + 5],
            writable_address: read_u32_le(buf, OFF_WRITABLE_ADDRESS),
            filled_size: read_u32_le(buf, OFF_FILLED_SIZE) as u64,
            title_version: read_u16_le(buf, OFF_TITLE_VERSION),
            card_revision: read_u16_le(buf, OFF_CARD_REVISION),
        })
    }

    /// Offset of the game partition's NCCH.
    pub(crate) fn game_partition_offset(&self) -> u64 {
        self.partitions[0].0
    }

    /// Dumps are often trimmed down to the filled size; anything between
    /// that and the card capacity is a complete dump.
    pub(crate) fn dump_status(&self, file_size: u64) -> &'static str {
        let (used, full) = (self.filled_size, self.image_size);
        if used == 0 || full == 0 {
            "Unknown"
        } else if file_size < used {
            "Truncated"
        } else if file_size == used {
            "Trimmed"
        } else if file_size == full {
            "Untrimmed"
        } else if file_size < full {
            "Partially trimmed"
        } else {
            "Oversized"
        }
    }

    pub(crate) fn add_fields(&self, file_size: u64, fields: &mut FieldList) {
        fields.add_string("Media type", media_type_name(self.media_type));
        if self.platform != 0 {
            fields.add_string("Platform", platform_name(self.platform));
        }
        if self.media_type == 2 && !matches!(self.writable_address, 0 | 0xFFFF_FFFF) {
            fields.add_hex(
                "Save offset",
                self.writable_address as u64 * MEDIA_UNIT,
                8,
            );
        }
        fields.add_hex("Media ID", self.media_id, 16);
        fields.add_string("Card version", format_version(self.title_version));
        if self.card_revision != 0 {
            fields.add_numeric("Card revision", self.card_revision as i64);
        }
        fields.add_string("Image size", format_bytes(self.image_size));
        fields.add_string("Dump status", self.dump_status(file_size));

        let rows = self
            .partitions
            .iter()
            .enumerate()
            .filter(|(_, (_, size))| *size > 0)
            .map(|(i, &(offset, size))| {
                vec![
                    i.to_string(),
                    PARTITION_NAMES[i].to_string(),
                    format!("0x{offset:X}"),
                    format_bytes(size),
                ]
            })
            .collect();
        fields.add_table("Partitions", &["#", "Name", "Offset", "Size"], rows);
    }
}

#[cfg(test)]
#[path = "tests/ncsd_tests.rs"]
pub(crate) mod tests;
