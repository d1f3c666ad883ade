//! NES / Famicom cartridge and Famicom Disk System images.
//!
//! Supports:
//! - iNES (`NES\x1A`) and NES 2.0 headers (.nes)
//! - FDS images with the fwNES header (`FDS\x1A`) or headerless (.fds)
//!
//! NES 2.0 is signalled by bits 2-3 of byte 7 being `10`. Sizes in NES 2.0
//! may use the exponent-multiplier form when the MSB nibble is 0xF.

use chrono::NaiveDate;

use romscope_core::bytes::bcd_to_u8;
use romscope_core::system::lookup;
use romscope_core::util::{format_bytes, read_ascii_fixed};
use romscope_core::{
    ByteStream, DetectInfo, FieldKind, FieldList, FileType, ParseContext, RomError, RomFormat,
    SystemNameRow, SystemNameVariant,
};

use crate::licensee::old_licensee_name;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const INES_MAGIC: &[u8; 4] = b"NES\x1A";
const FWNES_MAGIC: &[u8; 4] = b"FDS\x1A";
const FDS_VERIFY: &[u8; 14] = b"*NINTENDO-HVC*";

const INES_HEADER_SIZE: usize = 16;
/// Disk info block: block code, verification string, metadata up to 0x38.
const FDS_INFO_SIZE: usize = 0x38;

const PRG_UNIT: u64 = 16 * 1024;
const CHR_UNIT: u64 = 8 * 1024;

// ---------------------------------------------------------------------------
// Sub-types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NesKind {
    Ines = 0,
    Nes2 = 1,
    FdsFwnes = 2,
    FdsRaw = 3,
}

impl NesKind {
    fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::Ines),
            1 => Some(Self::Nes2),
            2 => Some(Self::FdsFwnes),
            3 => Some(Self::FdsRaw),
            _ => None,
        }
    }

    fn is_fds(self) -> bool {
        matches!(self, Self::FdsFwnes | Self::FdsRaw)
    }
}

const SYSTEM_NAMES: [SystemNameRow; 2] = [
    ["Nintendo Entertainment System", "NES", "NES"],
    ["Nintendo Famicom Disk System", "Famicom Disk System", "FDS"],
];

const SYSTEM_NAMES_JP: [SystemNameRow; 2] = [
    ["Nintendo Family Computer", "Famicom", "FC"],
    ["Nintendo Famicom Disk System", "Famicom Disk System", "FDS"],
];

// ---------------------------------------------------------------------------
// Header decoding
// ---------------------------------------------------------------------------

/// Decoded iNES / NES 2.0 header.
#[derive(Debug, Clone, PartialEq, Eq)]
struct InesHeader {
    nes2: bool,
    prg_rom: u64,
    chr_rom: u64,
    mapper: u16,
    submapper: Option<u8>,
    flags6: u8,
    console_type: u8,
    tv_system: u8,
    prg_ram: Option<u64>,
    prg_nvram: Option<u64>,
}

/// NES 2.0 ROM size: `lsb` units of `unit`, or `2^E * (M*2+1)` when the
/// MSB nibble is 0xF.
fn nes2_rom_size(lsb: u8, msb: u8, unit: u64) -> u64 {
    if msb == 0x0F {
        let exp = (lsb >> 2) as u32;
        let mul = (lsb & 3) as u64 * 2 + 1;
        1u64.checked_shl(exp).unwrap_or(0).saturating_mul(mul)
    } else {
        (((msb as u64) << 8) | lsb as u64) * unit
    }
}

/// NES 2.0 RAM shift count: 0 means none, otherwise `64 << n`.
fn nes2_ram_size(shift: u8) -> u64 {
    if shift == 0 { 0 } else { 64u64 << shift }
}

fn parse_ines(h: &[u8; INES_HEADER_SIZE]) -> InesHeader {
    let nes2 = h[7] & 0x0C == 0x08;
    let mut mapper = ((h[6] >> 4) | (h[7] & 0xF0)) as u16;
    if nes2 {
        mapper |= ((h[8] & 0x0F) as u16) << 8;
        InesHeader {
            nes2,
            prg_rom: nes2_rom_size(h[4], h[9] & 0x0F, PRG_UNIT),
            chr_rom: nes2_rom_size(h[5], h[9] >> 4, CHR_UNIT),
            mapper,
            submapper: Some(h[8] >> 4),
            flags6: h[6],
            console_type: h[7] & 3,
            tv_system: h[12] & 3,
            prg_ram: Some(nes2_ram_size(h[10] & 0x0F)),
            prg_nvram: Some(nes2_ram_size(h[10] >> 4)),
        }
    } else {
        InesHeader {
            nes2,
            prg_rom: h[4] as u64 * PRG_UNIT,
            chr_rom: h[5] as u64 * CHR_UNIT,
            mapper,
            submapper: None,
            flags6: h[6],
            console_type: h[7] & 3,
            tv_system: h[9] & 1,
            prg_ram: None,
            prg_nvram: None,
        }
    }
}

fn mapper_name(mapper: u16) -> Option<&'static str> {
    Some(match mapper {
        0 => "NROM",
        1 => "Nintendo MMC1",
        2 => "UxROM",
        3 => "CNROM",
        4 => "Nintendo MMC3",
        5 => "Nintendo MMC5",
        7 => "AxROM",
        9 => "Nintendo MMC2",
        10 => "Nintendo MMC4",
        11 => "Color Dreams",
        13 => "CPROM",
        16 => "Bandai FCG",
        18 => "Jaleco SS88006",
        19 => "Namco 163",
        21 | 23 | 25 => "Konami VRC4",
        22 => "Konami VRC2",
        24 | 26 => "Konami VRC6",
        34 => "BNROM / NINA-001",
        66 => "GxROM",
        69 => "Sunsoft FME-7",
        71 => "Camerica BF9093",
        85 => "Konami VRC7",
        _ => return None,
    })
}

fn console_type_name(ty: u8) -> &'static str {
    match ty {
        0 => "NES / Famicom",
        1 => "Nintendo Vs. System",
        2 => "Nintendo PlayChoice-10",
        _ => "Extended",
    }
}

fn tv_system_name(nes2: bool, tv: u8) -> &'static str {
    match (nes2, tv) {
        (_, 0) => "NTSC",
        (_, 1) => "PAL",
        (true, 2) => "Multiple-region",
        (true, 3) => "Dendy",
        _ => "Unknown",
    }
}

fn mirroring_name(flags6: u8) -> &'static str {
    if flags6 & 0x08 != 0 {
        "Four-screen"
    } else if flags6 & 0x01 != 0 {
        "Vertical"
    } else {
        "Horizontal"
    }
}

const FEATURE_NAMES: [Option<&str>; 3] = [Some("Battery"), Some("Trainer"), Some("Four-screen")];

fn features(flags6: u8) -> u32 {
    ((flags6 >> 1) & 1) as u32 | (((flags6 >> 2) & 1) as u32) << 1 | (((flags6 >> 3) & 1) as u32) << 2
}

// ---------------------------------------------------------------------------
// FDS disk info block
// ---------------------------------------------------------------------------

/// Decoded FDS disk info block (block 1).
#[derive(Debug, Clone, PartialEq, Eq)]
struct FdsInfo {
    licensee: u8,
    game_id: String,
    game_type: u8,
    revision: u8,
    side: u8,
    disk_number: u8,
    manufactured: Option<NaiveDate>,
}

fn is_fds_info(buf: &[u8]) -> bool {
    buf.len() >= 15 && buf[0] == 0x01 && &buf[1..15] == FDS_VERIFY
}

/// BCD date in the Japanese era used by FDS disks: years 58 and up are
/// Showa, smaller values Heisei.
fn fds_date(b: &[u8]) -> Option<NaiveDate> {
    let y = bcd_to_u8(b[0])? as i32;
    let m = bcd_to_u8(b[1])? as u32;
    let d = bcd_to_u8(b[2])? as u32;
    let year = if y >= 58 { 1925 + y } else { 1988 + y };
    NaiveDate::from_ymd_opt(year, m, d)
}

fn parse_fds_info(b: &[u8]) -> FdsInfo {
    FdsInfo {
        licensee: b[0x0F],
        game_id: read_ascii_fixed(&b[0x10..0x13]),
        game_type: b[0x13],
        revision: b[0x14],
        side: b[0x15],
        disk_number: b[0x16],
        manufactured: fds_date(&b[0x1F..0x22]),
    }
}

fn fds_game_type(ty: u8) -> &'static str {
    match ty {
        b' ' => "Normal",
        b'E' => "Event",
        b'R' => "Reduction in price",
        _ => "Unknown",
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// NES cartridge or FDS disk image.
pub struct Nes {
    stream: Option<Box<dyn ByteStream>>,
    kind: NesKind,
    ines: Option<InesHeader>,
    fds: Option<FdsInfo>,
    fds_sides: Option<u8>,
}

impl RomFormat for Nes {
    const NAME: &'static str = "NES";
    const EXTENSIONS: &'static [&'static str] = &["nes", "fds", "qd"];
    const HEADER_SIZE: usize = INES_HEADER_SIZE + FDS_INFO_SIZE;

    fn detect(info: &DetectInfo<'_>) -> Option<u32> {
        let h = info.header;
        if info.has(INES_HEADER_SIZE) && &h[..4] == INES_MAGIC {
            let kind = if h[7] & 0x0C == 0x08 {
                NesKind::Nes2
            } else {
                NesKind::Ines
            };
            return Some(kind as u32);
        }
        if info.has(INES_HEADER_SIZE + FDS_INFO_SIZE)
            && &h[..4] == FWNES_MAGIC
            && is_fds_info(&h[INES_HEADER_SIZE..])
        {
            return Some(NesKind::FdsFwnes as u32);
        }
        if info.has(FDS_INFO_SIZE) && is_fds_info(h) {
            return Some(NesKind::FdsRaw as u32);
        }
        None
    }

    fn open(
        mut stream: Box<dyn ByteStream>,
        system_id: u32,
        _ctx: &ParseContext,
    ) -> Result<Self, RomError> {
        let kind = NesKind::from_id(system_id)
            .ok_or_else(|| RomError::invalid_format(format!("unknown NES sub-type {system_id}")))?;

        let (ines, fds, fds_sides) = if kind.is_fds() {
            let (base, sides) = if kind == NesKind::FdsFwnes {
                let mut h = [0u8; INES_HEADER_SIZE];
                stream.read_exact_at(0, &mut h)?;
                (INES_HEADER_SIZE as u64, Some(h[4]))
            } else {
                (0, None)
            };
            let mut b = [0u8; FDS_INFO_SIZE];
            stream.read_exact_at(base, &mut b)?;
            if !is_fds_info(&b) {
                return Err(RomError::invalid_format("missing FDS disk info block"));
            }
            (None, Some(parse_fds_info(&b)), sides)
        } else {
            let mut h = [0u8; INES_HEADER_SIZE];
            stream.read_exact_at(0, &mut h)?;
            if &h[..4] != INES_MAGIC {
                return Err(RomError::invalid_format("missing iNES magic"));
            }
            (Some(parse_ines(&h)), None, None)
        };

        Ok(Self {
            stream: Some(stream),
            kind,
            ines,
            fds,
            fds_sides,
        })
    }

    fn file_type(&self) -> FileType {
        if self.kind.is_fds() {
            FileType::DiscImage
        } else {
            FileType::RomImage
        }
    }

    fn system_name(&self, variant: SystemNameVariant) -> Option<&'static str> {
        let idx = self.kind.is_fds() as usize;
        // NES cartridges carry no region; the Famicom names are used only
        // for disk images, which were Japan-only.
        let table = match variant.region {
            romscope_core::NameRegion::RomLocal if self.kind.is_fds() => &SYSTEM_NAMES_JP,
            _ => &SYSTEM_NAMES,
        };
        lookup(table, idx, variant)
    }

    fn load_fields(&mut self, _ctx: &ParseContext, fields: &mut FieldList) -> Result<(), RomError> {
        if self.stream.is_none() {
            return Err(RomError::NotOpen);
        }

        if let Some(h) = &self.ines {
            fields.add_string("Format", if h.nes2 { "NES 2.0" } else { "iNES" });
            fields.add_string("PRG ROM size", format_bytes(h.prg_rom));
            if h.chr_rom == 0 {
                fields.add_string("CHR ROM size", "None (CHR RAM)");
            } else {
                fields.add_string("CHR ROM size", format_bytes(h.chr_rom));
            }
            let mapper = match mapper_name(h.mapper) {
                Some(name) => format!("{} - {}", h.mapper, name),
                None => h.mapper.to_string(),
            };
            fields.add_string("Mapper", mapper);
            if let Some(sub) = h.submapper {
                fields.add_numeric("Submapper", sub as i64);
            }
            fields.add_string("Mirroring", mirroring_name(h.flags6));
            fields.add_bitfield("Features", features(h.flags6), &FEATURE_NAMES);
            fields.add_string("Console type", console_type_name(h.console_type));
            fields.add_string("TV system", tv_system_name(h.nes2, h.tv_system));
            if let Some(ram) = h.prg_ram {
                fields.add_string("PRG RAM size", format_bytes(ram));
            }
            if let Some(nvram) = h.prg_nvram {
                fields.add_string("PRG NVRAM size", format_bytes(nvram));
            }
        }

        if let Some(f) = &self.fds {
            fields.add_string("Format", if self.fds_sides.is_some() { "fwNES" } else { "Raw" });
            fields.add_string("Game ID", &f.game_id);
            fields.add_string(
                "Publisher",
                old_licensee_name(f.licensee)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("0x{:02X}", f.licensee)),
            );
            fields.add_string("Game type", fds_game_type(f.game_type));
            fields.add_numeric("Revision", f.revision as i64);
            fields.add_string(
                "Disk",
                format!(
                    "{}, side {}",
                    f.disk_number + 1,
                    if f.side == 0 { 'A' } else { 'B' }
                ),
            );
            if let Some(sides) = self.fds_sides {
                fields.add_numeric("Disk sides", sides as i64);
            }
            match f.manufactured.and_then(|d| d.and_hms_opt(0, 0, 0)) {
                Some(dt) => fields.add_datetime("Manufacturing date", dt),
                None => fields.add_unknown("Manufacturing date", FieldKind::DateTime),
            }
        }

        Ok(())
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

#[cfg(test)]
#[path = "tests/nes_tests.rs"]
mod tests;
