//! Game Boy Advance ROMs.
//!
//! Supports:
//! - GBA ROMs (.gba, .agb)
//! - Multiboot images (.mb)
//!
//! The 192-byte header holds an ARM branch, the compressed Nintendo logo
//! (shared with the DS), and a complement check over 0xA0-0xBC.

use romscope_core::util::{format_bytes, read_ascii_fixed};
use romscope_core::{
    ByteStream, DetectInfo, FieldList, FileType, ParseContext, Region, RomError, RomFormat,
    SystemNameVariant, checksum_text,
};

use crate::licensee::publisher;

/// Compressed Nintendo logo, at 0x04 in GBA ROMs and 0xC0 in DS ROMs.
pub(crate) const NINTENDO_LOGO: [u8; 156] = [
    0x24, 0xFF, 0xAE, 0x51, 0x69, 0x9A, 0xA2, 0x21, 0x3D, 0x84, 0x82, 0x0A, 0x84, 0xE4, 0x09, 0xAD,
    0x11, 0x24, 0x8B, 0x98, 0xC0, 0x81, 0x7F, 0x21, 0xA3, 0x52, 0xBE, 0x19, 0x93, 0x09, 0xCE, 0x20,
    0x10, 0x46, 0x4A, 0x4A, 0xF8, 0x27, 0x31, 0xEC, 0x58, 0xC7, 0xE8, 0x33, 0x82, 0xE3, 0xCE, 0xBF,
    0x85, 0xF4, 0xDF, 0x94, 0xCE, 0x4B, 0x09, 0xC1, 0x94, 0x56, 0x8A, 0xC0, 0x13, 0x72, 0xA7, 0xFC,
    0x9F, 0x84, 0x4D, 0x73, 0xA3, 0xCA, 0x9A, 0x61, 0x58, 0x97, 0xA3, 0x27, 0xFC, 0x03, 0x98, 0x76,
    0x23, 0x1D, 0xC7, 0x61, 0x03, 0x04, 0xAE, 0x56, 0xBF, 0x38, 0x84, 0x00, 0x40, 0xA7, 0x0E, 0xFD,
    0xFF, 0x52, 0xFE, 0x03, 0x6F, 0x95, 0x30, 0xF1, 0x97, 0xFB, 0xC0, 0x85, 0x60, 0xD6, 0x80, 0x25,
    0xA9, 0x63, 0xBE, 0x03, 0x01, 0x4E, 0x38, 0xE2, 0xF9, 0xA2, 0x34, 0xFF, 0xBB, 0x3E, 0x03, 0x44,
    0x78, 0x00, 0x90, 0xCB, 0x88, 0x11, 0x3A, 0x94, 0x65, 0xC0, 0x7C, 0x63, 0x87, 0xF0, 0x3C, 0xAF,
    0xD6, 0x25, 0xE4, 0x8B, 0x38, 0x0A, 0xAC, 0x72, 0x21, 0xD4, 0xF8, 0x07,
];

const HEADER_LEN: usize = 0xC0;

const OFF_ENTRY: usize = 0x00;
const OFF_LOGO: usize = 0x04;
const OFF_TITLE: usize = 0xA0;
const OFF_GAME_CODE: usize = 0xAC;
const OFF_MAKER: usize = 0xB0;
const OFF_FIXED: usize = 0xB2;
const OFF_UNIT: usize = 0xB3;
const OFF_DEVICE: usize = 0xB4;
const OFF_VERSION: usize = 0xBC;
const OFF_COMPLEMENT: usize = 0xBD;

const FIXED_VALUE: u8 = 0x96;

/// Complement check: `-(sum of 0xA0..=0xBC) - 0x19`.
pub(crate) fn header_complement(header: &[u8]) -> u8 {
    header[OFF_TITLE..=OFF_VERSION]
        .iter()
        .fold(0u8, |acc, &b| acc.wrapping_sub(b))
        .wrapping_sub(0x19)
}

/// Branch target of the ARM `B` instruction at the entry point.
fn entry_target(word: u32) -> Option<u32> {
    if word >> 24 != 0xEA {
        return None;
    }
    let imm = ((word & 0x00FF_FFFF) << 8) as i32 >> 6;
    Some((8 + imm) as u32)
}

/// Game Boy Advance ROM.
pub struct GameBoyAdvance {
    stream: Option<Box<dyn ByteStream>>,
    header: Box<[u8; HEADER_LEN]>,
}

impl RomFormat for GameBoyAdvance {
    const NAME: &'static str = "Game Boy Advance";
    const EXTENSIONS: &'static [&'static str] = &["gba", "agb", "mb"];
    const HEADER_SIZE: usize = HEADER_LEN;

    fn detect(info: &DetectInfo<'_>) -> Option<u32> {
        if !info.has(HEADER_LEN) {
            return None;
        }
        let h = info.header;
        (h[OFF_LOGO..OFF_LOGO + NINTENDO_LOGO.len()] == NINTENDO_LOGO
            && h[OFF_FIXED] == FIXED_VALUE)
            .then_some(0)
    }

    fn open(
        mut stream: Box<dyn ByteStream>,
        system_id: u32,
        _ctx: &ParseContext,
    ) -> Result<Self, RomError> {
        if system_id != 0 {
            return Err(RomError::invalid_format(format!(
                "unknown GBA sub-type {system_id}"
            )));
        }
        let mut header = Box::new([0u8; HEADER_LEN]);
        stream.read_exact_at(0, header.as_mut_slice())?;
        Ok(Self {
            stream: Some(stream),
            header,
        })
    }

    fn file_type(&self) -> FileType {
        FileType::RomImage
    }

    fn system_name(&self, variant: SystemNameVariant) -> Option<&'static str> {
        romscope_core::system::lookup(
            &[["Nintendo Game Boy Advance", "Game Boy Advance", "GBA"]],
            0,
            variant,
        )
    }

    fn load_fields(&mut self, _ctx: &ParseContext, fields: &mut FieldList) -> Result<(), RomError> {
        let stream = self.stream.as_ref().ok_or(RomError::NotOpen)?;
        let h = &self.header;

        fields.add_string("Title", read_ascii_fixed(&h[OFF_TITLE..OFF_GAME_CODE]));
        let game_code = read_ascii_fixed(&h[OFF_GAME_CODE..OFF_MAKER]);
        fields.add_string("Game ID", format!("AGB-{game_code}"));
        fields.add_string(
            "Publisher",
            publisher(&read_ascii_fixed(&h[OFF_MAKER..OFF_FIXED])),
        );
        let region = game_code
            .chars()
            .nth(3)
            .map(Region::from_game_id_char)
            .unwrap_or(Region::Unknown);
        fields.add_string("Region", region.name());
        fields.add_numeric("Revision", h[OFF_VERSION] as i64);
        fields.add_hex("Unit code", h[OFF_UNIT] as u64, 2);
        fields.add_hex("Device type", h[OFF_DEVICE] as u64, 2);

        let entry = u32::from_le_bytes([
            h[OFF_ENTRY],
            h[OFF_ENTRY + 1],
            h[OFF_ENTRY + 2],
            h[OFF_ENTRY + 3],
        ]);
        match entry_target(entry) {
            Some(target) => fields.add_hex("Entry point", target as u64, 8),
            None => fields.add_string("Entry point", format!("Unknown (0x{entry:08X})")),
        }

        fields.add_string("ROM size", format_bytes(stream.size()));
        fields.add_string(
            "Checksum",
            checksum_text(h[OFF_COMPLEMENT] as u64, header_complement(&h[..]) as u64, 2),
        );
        Ok(())
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

#[cfg(test)]
#[path = "tests/gba_tests.rs"]
mod tests;
