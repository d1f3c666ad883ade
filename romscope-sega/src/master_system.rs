//! Sega Master System / Game Gear cartridge ROMs.
//!
//! Supports:
//! - Master System / Mark III ROMs (.sms)
//! - Game Gear ROMs (.gg)
//! - The SDSC homebrew header, when present
//!
//! The 16-byte `TMR SEGA` header sits at 0x7FF0 (or 0x3FF0 / 0x1FF0 on
//! small ROMs). It carries a BCD product code, a region/size nibble pair,
//! and a byte-sum checksum whose range depends on the declared ROM size.

use romscope_core::bytes::{bcd_to_u8, get_u16_le, read_u16_le};
use romscope_core::system::lookup;
use romscope_core::util::{format_bytes, read_ascii};
use romscope_core::{
    ByteStream, DetectInfo, FieldKind, FieldList, FileType, NameRegion, ParseContext, RomError,
    RomFormat, SystemNameRow, SystemNameVariant, checksum_text,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const TMR_MAGIC: &[u8; 8] = b"TMR SEGA";
const HEADER_LEN: usize = 0x10;
const HEADER_BASES: [usize; 3] = [0x7FF0, 0x3FF0, 0x1FF0];
const SCAN_LEN: usize = 0x8000;

const OFF_CHECKSUM: usize = 0x0A;
const OFF_PRODUCT: usize = 0x0C;
const OFF_VERSION: usize = 0x0E;
const OFF_REGION_SIZE: usize = 0x0F;

/// The SDSC header sits right before the TMR header.
const SDSC_MAGIC: &[u8; 4] = b"SDSC";
const SDSC_STRING_MAX: usize = 0x100;

/// The checksum never covers the bank-2 area at 0x7FF0-0x7FFF.
const FIRST_RANGE_END: u64 = 0x7FF0;
const SECOND_RANGE_START: u64 = 0x8000;

const CHUNK: usize = 0x10000;

// ---------------------------------------------------------------------------
// Sub-types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SmsKind {
    MasterSystem = 0,
    GameGear = 1,
}

impl SmsKind {
    fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::MasterSystem),
            1 => Some(Self::GameGear),
            _ => None,
        }
    }
}

const SYSTEM_NAMES: [SystemNameRow; 3] = [
    ["Sega Master System", "Master System", "SMS"],
    ["Sega Game Gear", "Game Gear", "GG"],
    ["Sega Mark III", "Mark III", "MK3"],
];
const ROW_MARK_III: usize = 2;

/// Region nibble: `(name, is_game_gear, is_japan)`.
fn region_code(nibble: u8) -> Option<(&'static str, bool, bool)> {
    Some(match nibble {
        3 => ("Japan", false, true),
        4 => ("Export", false, false),
        5 => ("Japan", true, true),
        6 => ("Export", true, false),
        7 => ("Region-Free", true, false),
        _ => return None,
    })
}

/// ROM size declared by the low nibble.
fn rom_size(nibble: u8) -> Option<u64> {
    Some(match nibble {
        0xA => 8 * 1024,
        0xB => 16 * 1024,
        0xC => 32 * 1024,
        0xD => 48 * 1024,
        0xE => 64 * 1024,
        0xF => 128 * 1024,
        0x0 => 256 * 1024,
        0x1 => 512 * 1024,
        0x2 => 1024 * 1024,
        _ => return None,
    })
}

fn find_header(buf: &[u8]) -> Option<usize> {
    HEADER_BASES
        .iter()
        .copied()
        .find(|&base| buf.get(base..base + TMR_MAGIC.len()) == Some(&TMR_MAGIC[..]))
}

// ---------------------------------------------------------------------------
// TMR SEGA header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct TmrHeader {
    base: usize,
    checksum: u16,
    product_code: u32,
    version: u8,
    region: u8,
    size_code: u8,
}

impl TmrHeader {
    fn parse(buf: &[u8], base: usize) -> Option<Self> {
        let h = buf.get(base..base + HEADER_LEN)?;
        // Two BCD bytes, least significant first, plus an extra leading
        // digit in the high nibble of the version byte.
        let lo = bcd_to_u8(h[OFF_PRODUCT]).unwrap_or(0) as u32;
        let mid = bcd_to_u8(h[OFF_PRODUCT + 1]).unwrap_or(0) as u32;
        let hi = (h[OFF_VERSION] >> 4) as u32;
        Some(Self {
            base,
            checksum: read_u16_le(h, OFF_CHECKSUM),
            product_code: hi * 10000 + mid * 100 + lo,
            version: h[OFF_VERSION] & 0x0F,
            region: h[OFF_REGION_SIZE] >> 4,
            size_code: h[OFF_REGION_SIZE] & 0x0F,
        })
    }
}

/// Byte sum over `0..min(end, 0x7FF0)` and `0x8000..end`.
fn compute_checksum(stream: &mut dyn ByteStream, end: u64) -> Result<u16, RomError> {
    let mut sum = 0u16;
    let mut add_range = |stream: &mut dyn ByteStream, start: u64, end: u64| {
        let mut pos = start;
        while pos < end {
            let want = ((end - pos) as usize).min(CHUNK);
            let buf = stream.read_vec_at(pos, want)?;
            sum = buf.iter().fold(sum, |s, &b| s.wrapping_add(b as u16));
            pos += want as u64;
        }
        Ok::<(), RomError>(())
    };
    add_range(stream, 0, end.min(FIRST_RANGE_END))?;
    if end > SECOND_RANGE_START {
        add_range(stream, SECOND_RANGE_START, end)?;
    }
    Ok(sum)
}

// ---------------------------------------------------------------------------
// SDSC header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct SdscHeader {
    version: (u8, u8),
    date: Option<String>,
    author: Option<String>,
    name: Option<String>,
    description: Option<String>,
}

impl SdscHeader {
    fn parse(buf: &[u8], tmr_base: usize) -> Option<Self> {
        let base = tmr_base.checked_sub(HEADER_LEN)?;
        let h = buf.get(base..tmr_base)?;
        if &h[..4] != SDSC_MAGIC {
            return None;
        }
        let string_at = |off: usize| {
            let ptr = get_u16_le(h, off)? as usize;
            if ptr == 0 || ptr == 0xFFFF {
                return None;
            }
            let raw = buf.get(ptr..)?;
            let s = read_ascii(&raw[..raw.len().min(SDSC_STRING_MAX)]);
            (!s.is_empty()).then_some(s)
        };
        let date = match (
            bcd_to_u8(h[6]),
            bcd_to_u8(h[7]),
            bcd_to_u8(h[8]),
            bcd_to_u8(h[9]),
        ) {
            (Some(day), Some(month), Some(yl), Some(yh)) if day > 0 && month > 0 => {
                Some(format!("{:04}-{month:02}-{day:02}", yh as u32 * 100 + yl as u32))
            }
            _ => None,
        };
        Some(Self {
            version: (bcd_to_u8(h[4]).unwrap_or(0), bcd_to_u8(h[5]).unwrap_or(0)),
            date,
            author: string_at(0x0A),
            name: string_at(0x0C),
            description: string_at(0x0E),
        })
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Master System or Game Gear cartridge.
pub struct MasterSystem {
    stream: Option<Box<dyn ByteStream>>,
    kind: SmsKind,
    header: TmrHeader,
    sdsc: Option<SdscHeader>,
}

impl RomFormat for MasterSystem {
    const NAME: &'static str = "Master System";
    const EXTENSIONS: &'static [&'static str] = &["sms", "gg", "sg"];
    const HEADER_SIZE: usize = SCAN_LEN;

    fn detect(info: &DetectInfo<'_>) -> Option<u32> {
        let base = find_header(info.header)?;
        if info.size < (base + HEADER_LEN) as u64 {
            return None;
        }
        let header = TmrHeader::parse(info.header, base)?;
        let gg = match region_code(header.region) {
            Some((_, gg, _)) => gg,
            None => info.ext_is(&["gg"]),
        };
        let kind = if gg { SmsKind::GameGear } else { SmsKind::MasterSystem };
        Some(kind as u32)
    }

    fn open(
        mut stream: Box<dyn ByteStream>,
        system_id: u32,
        _ctx: &ParseContext,
    ) -> Result<Self, RomError> {
        let kind = SmsKind::from_id(system_id)
            .ok_or_else(|| RomError::invalid_format(format!("unknown SMS sub-type {system_id}")))?;
        let buf = stream.read_up_to(0, SCAN_LEN)?;
        let header = find_header(&buf)
            .and_then(|base| TmrHeader::parse(&buf, base))
            .ok_or_else(|| RomError::invalid_format("missing TMR SEGA header"))?;
        let sdsc = SdscHeader::parse(&buf, header.base);
        Ok(Self {
            stream: Some(stream),
            kind,
            header,
            sdsc,
        })
    }

    fn file_type(&self) -> FileType {
        FileType::RomImage
    }

    fn system_name(&self, variant: SystemNameVariant) -> Option<&'static str> {
        let japan = region_code(self.header.region).is_some_and(|(_, _, jp)| jp);
        let row = match self.kind {
            SmsKind::GameGear => SmsKind::GameGear as usize,
            SmsKind::MasterSystem if japan && variant.region == NameRegion::RomLocal => {
                ROW_MARK_III
            }
            SmsKind::MasterSystem => SmsKind::MasterSystem as usize,
        };
        lookup(&SYSTEM_NAMES, row, variant)
    }

    fn load_fields(&mut self, _ctx: &ParseContext, fields: &mut FieldList) -> Result<(), RomError> {
        let stream = self.stream.as_deref_mut().ok_or(RomError::NotOpen)?;
        let h = &self.header;

        fields.add_string("Header location", format!("0x{:04X}", h.base));
        fields.add_string("Product code", format!("{:05}", h.product_code));
        fields.add_numeric("Version", h.version as i64);
        fields.add_string(
            "Region",
            match region_code(h.region) {
                Some((name, _, _)) => name.to_string(),
                None => format!("Unknown ({:X})", h.region),
            },
        );

        let declared = rom_size(h.size_code);
        fields.add_string(
            "ROM size",
            match declared {
                Some(size) => format_bytes(size),
                None => format!("Unknown ({:X})", h.size_code),
            },
        );

        match declared {
            Some(end) if end <= stream.size() => {
                let computed = compute_checksum(stream, end)?;
                fields.add_string(
                    "Checksum",
                    checksum_text(h.checksum as u64, computed as u64, 4),
                );
            }
            _ => fields.add_unknown("Checksum", FieldKind::String),
        }

        if let Some(sdsc) = &self.sdsc {
            fields.add_string(
                "SDSC version",
                format!("{}.{:02}", sdsc.version.0, sdsc.version.1),
            );
            if let Some(date) = &sdsc.date {
                fields.add_string("SDSC date", date.clone());
            }
            for (label, value) in [
                ("Title", &sdsc.name),
                ("Author", &sdsc.author),
                ("Description", &sdsc.description),
            ] {
                if let Some(value) = value {
                    fields.add_string(label, value.clone());
                }
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

#[cfg(test)]
#[path = "tests/master_system_tests.rs"]
mod tests;
