//! Game Boy / Game Boy Color cartridge ROMs.
//!
//! Supports:
//! - Game Boy ROMs (.gb)
//! - Game Boy Color ROMs (.gbc), both dual-mode and CGB-only
//! - Super Game Boy enhancements
//!
//! The cartridge header spans 0x100-0x14F. Detection requires the Nintendo
//! logo at 0x104; the header checksum at 0x14D and the global checksum at
//! 0x14E are verified and reported.

use romscope_core::system::lookup;
use romscope_core::util::{format_bytes, read_ascii_fixed};
use romscope_core::{
    ByteStream, DetectInfo, FieldList, FileType, ParseContext, RomError, RomFormat,
    SystemNameRow, SystemNameVariant, checksum_text,
};

use crate::licensee::{old_licensee_name, publisher};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const HEADER_END: usize = 0x150;

const OFF_LOGO: usize = 0x104;
const OFF_TITLE: usize = 0x134;
const OFF_MANUFACTURER: usize = 0x13F;
const OFF_CGB_FLAG: usize = 0x143;
const OFF_NEW_LICENSEE: usize = 0x144;
const OFF_SGB_FLAG: usize = 0x146;
const OFF_CART_TYPE: usize = 0x147;
const OFF_ROM_SIZE: usize = 0x148;
const OFF_RAM_SIZE: usize = 0x149;
const OFF_DESTINATION: usize = 0x14A;
const OFF_OLD_LICENSEE: usize = 0x14B;
const OFF_VERSION: usize = 0x14C;
const OFF_HEADER_CHECKSUM: usize = 0x14D;
const OFF_GLOBAL_CHECKSUM: usize = 0x14E;

const NINTENDO_LOGO: [u8; 48] = [
    0xCE, 0xED, 0x66, 0x66, 0xCC, 0x0D, 0x00, 0x0B, 0x03, 0x73, 0x00, 0x83, 0x00, 0x0C, 0x00, 0x0D,
    0x00, 0x08, 0x11, 0x1F, 0x88, 0x89, 0x00, 0x0E, 0xDC, 0xCC, 0x6E, 0xE6, 0xDD, 0xDD, 0xD9, 0x99,
    0xBB, 0xBB, 0x67, 0x63, 0x6E, 0x0E, 0xEC, 0xCC, 0xDD, 0xDC, 0x99, 0x9F, 0xBB, 0xB9, 0x33, 0x3E,
];

const CHUNK: usize = 0x10000;

// ---------------------------------------------------------------------------
// Sub-types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GbKind {
    Dmg = 0,
    /// Runs on both; enhanced on CGB
    CgbDual = 1,
    CgbOnly = 2,
}

impl GbKind {
    fn from_cgb_flag(flag: u8) -> Self {
        match flag {
            0xC0 => Self::CgbOnly,
            0x80 => Self::CgbDual,
            _ => Self::Dmg,
        }
    }

    fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::Dmg),
            1 => Some(Self::CgbDual),
            2 => Some(Self::CgbOnly),
            _ => None,
        }
    }
}

const SYSTEM_NAMES: [SystemNameRow; 2] = [
    ["Nintendo Game Boy", "Game Boy", "GB"],
    ["Nintendo Game Boy Color", "Game Boy Color", "GBC"],
];

const FEATURE_NAMES: [Option<&str>; 5] = [
    Some("RAM"),
    Some("Battery"),
    Some("Timer"),
    Some("Rumble"),
    Some("Super Game Boy"),
];

const FEAT_RAM: u32 = 1 << 0;
const FEAT_BATTERY: u32 = 1 << 1;
const FEAT_TIMER: u32 = 1 << 2;
const FEAT_RUMBLE: u32 = 1 << 3;
const FEAT_SGB: u32 = 1 << 4;

/// Mapper name and feature bits for a cartridge type byte.
fn cart_type(ty: u8) -> Option<(&'static str, u32)> {
    let r = FEAT_RAM;
    let b = FEAT_BATTERY;
    Some(match ty {
        0x00 => ("ROM only", 0),
        0x01 => ("MBC1", 0),
        0x02 => ("MBC1", r),
        0x03 => ("MBC1", r | b),
        0x05 => ("MBC2", 0),
        0x06 => ("MBC2", b),
        0x08 => ("ROM", r),
        0x09 => ("ROM", r | b),
        0x0B => ("MMM01", 0),
        0x0C => ("MMM01", r),
        0x0D => ("MMM01", r | b),
        0x0F => ("MBC3", FEAT_TIMER | b),
        0x10 => ("MBC3", FEAT_TIMER | r | b),
        0x11 => ("MBC3", 0),
        0x12 => ("MBC3", r),
        0x13 => ("MBC3", r | b),
        0x19 => ("MBC5", 0),
        0x1A => ("MBC5", r),
        0x1B => ("MBC5", r | b),
        0x1C => ("MBC5", FEAT_RUMBLE),
        0x1D => ("MBC5", FEAT_RUMBLE | r),
        0x1E => ("MBC5", FEAT_RUMBLE | r | b),
        0x20 => ("MBC6", 0),
        0x22 => ("MBC7", FEAT_RUMBLE | r | b),
        0xFC => ("Pocket Camera", 0),
        0xFD => ("Bandai TAMA5", 0),
        0xFE => ("HuC3", 0),
        0xFF => ("HuC1", r | b),
        _ => return None,
    })
}

fn ram_size(code: u8) -> Option<u64> {
    Some(match code {
        0 => 0,
        1 => 2 * 1024,
        2 => 8 * 1024,
        3 => 32 * 1024,
        4 => 128 * 1024,
        5 => 64 * 1024,
        _ => return None,
    })
}

/// Header checksum over 0x134..=0x14C: `x = x - byte - 1`.
pub(crate) fn header_checksum(header: &[u8]) -> u8 {
    header[OFF_TITLE..=OFF_VERSION]
        .iter()
        .fold(0u8, |x, &b| x.wrapping_sub(b).wrapping_sub(1))
}

/// Sum of every byte in the ROM except the two global checksum bytes.
fn global_checksum(stream: &mut dyn ByteStream) -> Result<u16, RomError> {
    let size = stream.size();
    let mut sum = 0u16;
    let mut pos = 0u64;
    while pos < size {
        let want = ((size - pos) as usize).min(CHUNK);
        let buf = stream.read_vec_at(pos, want)?;
        for (i, &b) in buf.iter().enumerate() {
            let abs = pos as usize + i;
            if abs != OFF_GLOBAL_CHECKSUM && abs != OFF_GLOBAL_CHECKSUM + 1 {
                sum = sum.wrapping_add(b as u16);
            }
        }
        pos += want as u64;
    }
    Ok(sum)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Game Boy or Game Boy Color ROM.
pub struct GameBoy {
    stream: Option<Box<dyn ByteStream>>,
    kind: GbKind,
    header: Box<[u8; HEADER_END]>,
}

impl GameBoy {
    fn title(&self) -> String {
        // CGB titles are 15 bytes (11 with a manufacturer code); the flag
        // byte would otherwise print as garbage.
        let end = if self.kind == GbKind::Dmg {
            OFF_NEW_LICENSEE
        } else if self.header[OFF_MANUFACTURER..OFF_CGB_FLAG]
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        {
            OFF_MANUFACTURER
        } else {
            OFF_CGB_FLAG
        };
        read_ascii_fixed(&self.header[OFF_TITLE..end])
    }

    fn publisher(&self) -> String {
        let old = self.header[OFF_OLD_LICENSEE];
        if old == 0x33 {
            publisher(&read_ascii_fixed(
                &self.header[OFF_NEW_LICENSEE..OFF_NEW_LICENSEE + 2],
            ))
        } else {
            old_licensee_name(old)
                .map(str::to_string)
                .unwrap_or_else(|| format!("0x{old:02X}"))
        }
    }
}

impl RomFormat for GameBoy {
    const NAME: &'static str = "Game Boy";
    const EXTENSIONS: &'static [&'static str] = &["gb", "gbc", "sgb"];
    const HEADER_SIZE: usize = HEADER_END;

    fn detect(info: &DetectInfo<'_>) -> Option<u32> {
        if !info.has(HEADER_END) || info.header[OFF_LOGO..OFF_LOGO + 48] != NINTENDO_LOGO {
            return None;
        }
        Some(GbKind::from_cgb_flag(info.header[OFF_CGB_FLAG]) as u32)
    }

    fn open(
        mut stream: Box<dyn ByteStream>,
        system_id: u32,
        _ctx: &ParseContext,
    ) -> Result<Self, RomError> {
        let kind = GbKind::from_id(system_id)
            .ok_or_else(|| RomError::invalid_format(format!("unknown GB sub-type {system_id}")))?;
        let mut header = Box::new([0u8; HEADER_END]);
        stream.read_exact_at(0, header.as_mut_slice())?;
        Ok(Self {
            stream: Some(stream),
            kind,
            header,
        })
    }

    fn file_type(&self) -> FileType {
        FileType::RomImage
    }

    fn system_name(&self, variant: SystemNameVariant) -> Option<&'static str> {
        lookup(&SYSTEM_NAMES, (self.kind != GbKind::Dmg) as usize, variant)
    }

    fn load_fields(&mut self, _ctx: &ParseContext, fields: &mut FieldList) -> Result<(), RomError> {
        if self.stream.is_none() {
            return Err(RomError::NotOpen);
        }
        let h = &self.header;

        fields.add_string("Title", self.title());
        if self.kind != GbKind::Dmg {
            let code = read_ascii_fixed(&h[OFF_MANUFACTURER..OFF_CGB_FLAG]);
            if code.len() == 4 {
                fields.add_string("Game ID", code);
            }
        }
        fields.add_string(
            "System",
            match self.kind {
                GbKind::Dmg => "Game Boy",
                GbKind::CgbDual => "Game Boy, Game Boy Color",
                GbKind::CgbOnly => "Game Boy Color",
            },
        );
        fields.add_string("Publisher", self.publisher());

        let ty = h[OFF_CART_TYPE];
        let (mapper, mut feats) = cart_type(ty).unwrap_or(("Unknown", 0));
        if h[OFF_SGB_FLAG] == 0x03 {
            feats |= FEAT_SGB;
        }
        fields.add_string("Mapper", format!("{mapper} (0x{ty:02X})"));
        fields.add_bitfield("Features", feats, &FEATURE_NAMES);

        let rom_code = h[OFF_ROM_SIZE];
        fields.add_string(
            "ROM size",
            if rom_code <= 8 {
                format_bytes((32 * 1024) << rom_code)
            } else {
                format!("Unknown (0x{rom_code:02X})")
            },
        );
        let ram_code = h[OFF_RAM_SIZE];
        fields.add_string(
            "RAM size",
            match ram_size(ram_code) {
                Some(0) => "None".to_string(),
                Some(n) => format_bytes(n),
                None => format!("Unknown (0x{ram_code:02X})"),
            },
        );
        fields.add_string(
            "Region",
            if h[OFF_DESTINATION] == 0 { "Japan" } else { "Non-Japan" },
        );
        fields.add_numeric("Revision", h[OFF_VERSION] as i64);

        let computed = header_checksum(&h[..]);
        fields.add_string(
            "Header checksum",
            checksum_text(h[OFF_HEADER_CHECKSUM] as u64, computed as u64, 2),
        );

        let expected =
            u16::from_be_bytes([h[OFF_GLOBAL_CHECKSUM], h[OFF_GLOBAL_CHECKSUM + 1]]);
        let stream = self.stream.as_mut().ok_or(RomError::NotOpen)?;
        let global = global_checksum(stream.as_mut())?;
        fields.add_string(
            "Global checksum",
            checksum_text(expected as u64, global as u64, 4),
        );
        Ok(())
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

#[cfg(test)]
#[path = "tests/gameboy_tests.rs"]
mod tests;
