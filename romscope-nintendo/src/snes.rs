//! SNES (Super Famicom) cartridge ROMs.
//!
//! Supports:
//! - Headered ROMs (.smc, .swc) with a 512-byte copier header
//! - Headerless ROMs (.sfc)
//! - LoROM, HiROM, ExHiROM, and SA-1 mappings
//!
//! The internal header sits at 0x7FC0 (LoROM) or 0xFFC0 (HiROM). Detection
//! scores both candidates on the checksum/complement pair, the map mode byte
//! and the title.

use romscope_core::system::lookup;
use romscope_core::util::{format_bytes, read_ascii_fixed, read_shift_jis};
use romscope_core::{
    ByteStream, DetectInfo, FieldList, FileType, NameRegion, ParseContext, RomError, RomFormat,
    SystemNameRow, SystemNameVariant, checksum_text,
};

use crate::licensee::{maker_code_name, old_licensee_name};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const LOROM_HEADER_BASE: u64 = 0x7FC0;
const HIROM_HEADER_BASE: u64 = 0xFFC0;
const COPIER_HEADER_SIZE: u64 = 0x200;
/// Header bytes read: extended header (0x10) + header (0x40).
const HEADER_SPAN: usize = 0x50;

// Offsets relative to the header base
const OFF_TITLE: usize = 0x00;
const OFF_MAP_MODE: usize = 0x15;
const OFF_ROM_TYPE: usize = 0x16;
const OFF_ROM_SIZE: usize = 0x17;
const OFF_RAM_SIZE: usize = 0x18;
const OFF_COUNTRY: usize = 0x19;
const OFF_DEVELOPER_ID: usize = 0x1A;
const OFF_VERSION: usize = 0x1B;
const OFF_COMPLEMENT: usize = 0x1C;
const OFF_CHECKSUM: usize = 0x1E;

/// Developer ID meaning "see the extended header".
const EXTENDED_DEVELOPER_ID: u8 = 0x33;

const CHUNK: usize = 0x10000;

// ---------------------------------------------------------------------------
// Sub-types
// ---------------------------------------------------------------------------

const ID_HIROM: u32 = 1;
const ID_COPIER: u32 = 2;

const SYSTEM_NAMES: [SystemNameRow; 1] = [["Super Nintendo Entertainment System", "Super NES", "SNES"]];
const SYSTEM_NAMES_JP: [SystemNameRow; 1] = [["Nintendo Super Famicom", "Super Famicom", "SFC"]];
const SYSTEM_NAMES_KR: [SystemNameRow; 1] = [["Hyundai Super Comboy", "Super Comboy", "SCB"]];

// ---------------------------------------------------------------------------
// Header decoding
// ---------------------------------------------------------------------------

/// Header window starting 0x10 bytes before the base so the extended
/// header is included.
struct SnesHeader {
    raw: [u8; HEADER_SPAN],
}

impl SnesHeader {
    fn h(&self, off: usize) -> u8 {
        self.raw[0x10 + off]
    }

    fn h16(&self, off: usize) -> u16 {
        u16::from_le_bytes([self.raw[0x10 + off], self.raw[0x11 + off]])
    }

    fn title(&self) -> String {
        let t = &self.raw[0x10 + OFF_TITLE..0x10 + OFF_TITLE + 21];
        // Japanese titles use half-width katakana
        if t.iter().any(|&b| (0xA1..=0xDF).contains(&b)) {
            read_shift_jis(t).trim_end().to_string()
        } else {
            read_ascii_fixed(t)
        }
    }

    fn checksum(&self) -> u16 {
        self.h16(OFF_CHECKSUM)
    }

    fn complement(&self) -> u16 {
        self.h16(OFF_COMPLEMENT)
    }

    fn has_extended(&self) -> bool {
        self.h(OFF_DEVELOPER_ID) == EXTENDED_DEVELOPER_ID
    }

    fn maker_code(&self) -> String {
        read_ascii_fixed(&self.raw[0..2])
    }

    fn game_code(&self) -> String {
        read_ascii_fixed(&self.raw[2..6])
    }
}

fn header_at(buf: &[u8], base: usize) -> Option<SnesHeader> {
    let start = base.checked_sub(0x10)?;
    let raw = buf.get(start..start + HEADER_SPAN)?;
    let mut h = [0u8; HEADER_SPAN];
    h.copy_from_slice(raw);
    Some(SnesHeader { raw: h })
}

/// Plausibility score of a header candidate. Zero means "not a header".
fn score(h: &SnesHeader, hirom: bool) -> u32 {
    let mut score = 0;
    if h.checksum() ^ h.complement() == 0xFFFF {
        score += 4;
    }
    let mode = h.h(OFF_MAP_MODE);
    let layout_ok = if hirom {
        matches!(mode & 0x0F, 0x1 | 0x5)
    } else {
        matches!(mode & 0x0F, 0x0 | 0x2 | 0x3)
    };
    if layout_ok && mode & 0xE0 == 0x20 {
        score += 2;
    }
    let first = h.h(OFF_TITLE);
    if (0x21..0x7F).contains(&first) || (0xA1..=0xDF).contains(&first) {
        score += 1;
    }
    score
}

fn map_mode_name(mode: u8) -> &'static str {
    match mode & 0x0F {
        0x0 => "LoROM",
        0x1 => "HiROM",
        0x2 => "LoROM + S-DD1",
        0x3 => "LoROM + SA-1",
        0x5 => "ExHiROM",
        0xA => "HiROM + SPC7110",
        _ => "Unknown",
    }
}

fn cart_type_name(rom_type: u8) -> String {
    let base = match rom_type & 0x0F {
        0x0 => "ROM",
        0x1 => "ROM + RAM",
        0x2 => "ROM + RAM + Battery",
        0x3 => "ROM + coprocessor",
        0x4 => "ROM + coprocessor + RAM",
        0x5 => "ROM + coprocessor + RAM + Battery",
        0x6 => "ROM + coprocessor + Battery",
        _ => return format!("Unknown (0x{rom_type:02X})"),
    };
    if rom_type & 0x0F < 3 {
        return base.to_string();
    }
    let coproc = match rom_type >> 4 {
        0x0 => "DSP",
        0x1 => "Super FX",
        0x2 => "OBC1",
        0x3 => "SA-1",
        0x4 => "S-DD1",
        0x5 => "S-RTC",
        0xE => "Other",
        0xF => "Custom",
        _ => "Unknown",
    };
    base.replace("coprocessor", coproc)
}

fn destination_name(code: u8) -> &'static str {
    match code {
        0x00 => "Japan",
        0x01 => "North America",
        0x02 => "Europe",
        0x03 => "Scandinavia",
        0x04 => "Finland",
        0x05 => "Denmark",
        0x06 => "France",
        0x07 => "Netherlands",
        0x08 => "Spain",
        0x09 => "Germany",
        0x0A => "Italy",
        0x0B => "China",
        0x0C => "Indonesia",
        0x0D => "South Korea",
        0x0E => "Region-Free",
        0x0F => "Canada",
        0x10 => "Brazil",
        0x11 => "Australia",
        _ => "Unknown",
    }
}

/// 16-bit sum of every ROM byte, mirroring a non-power-of-two tail up to
/// the next power of two.
fn compute_checksum(stream: &mut dyn ByteStream, start: u64) -> Result<u16, RomError> {
    let len = stream.size().saturating_sub(start);
    if len == 0 {
        return Ok(0);
    }
    let main = if len.is_power_of_two() {
        len
    } else {
        1u64 << (63 - len.leading_zeros())
    };

    let mut sum_range = |from: u64, to: u64| -> Result<u16, RomError> {
        let mut sum = 0u16;
        let mut pos = from;
        while pos < to {
            let want = ((to - pos) as usize).min(CHUNK);
            let buf = stream.read_vec_at(start + pos, want)?;
            sum = buf.iter().fold(sum, |s, &b| s.wrapping_add(b as u16));
            pos += want as u64;
        }
        Ok(sum)
    };

    let mut sum = sum_range(0, main)?;
    let tail = len - main;
    if tail > 0 {
        let tail_sum = sum_range(main, len)?;
        let repeats = (main / tail) as u16;
        sum = sum.wrapping_add(tail_sum.wrapping_mul(repeats));
    }
    Ok(sum)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// SNES / Super Famicom ROM.
pub struct Snes {
    stream: Option<Box<dyn ByteStream>>,
    header: SnesHeader,
    copier: bool,
    hirom: bool,
}

impl Snes {
    fn rom_start(&self) -> u64 {
        if self.copier { COPIER_HEADER_SIZE } else { 0 }
    }
}

impl RomFormat for Snes {
    const NAME: &'static str = "Super NES";
    const EXTENSIONS: &'static [&'static str] = &["sfc", "smc", "swc", "fig"];
    const HEADER_SIZE: usize = (HIROM_HEADER_BASE + COPIER_HEADER_SIZE) as usize + 0x40;

    fn detect(info: &DetectInfo<'_>) -> Option<u32> {
        let copier = info.size % 1024 == COPIER_HEADER_SIZE;
        let off = if copier { COPIER_HEADER_SIZE as usize } else { 0 };

        let mut best: Option<(u32, u32)> = None;
        for (hirom, base) in [(false, LOROM_HEADER_BASE), (true, HIROM_HEADER_BASE)] {
            let Some(h) = header_at(info.header, off + base as usize) else {
                continue;
            };
            let s = score(&h, hirom);
            if s >= 3 && best.is_none_or(|(b, _)| s > b) {
                let id = (if hirom { ID_HIROM } else { 0 }) | (if copier { ID_COPIER } else { 0 });
                best = Some((s, id));
            }
        }
        best.map(|(_, id)| id)
    }

    fn open(
        mut stream: Box<dyn ByteStream>,
        system_id: u32,
        _ctx: &ParseContext,
    ) -> Result<Self, RomError> {
        if system_id > (ID_HIROM | ID_COPIER) {
            return Err(RomError::invalid_format(format!("unknown SNES sub-type {system_id}")));
        }
        let hirom = system_id & ID_HIROM != 0;
        let copier = system_id & ID_COPIER != 0;
        let base = if hirom { HIROM_HEADER_BASE } else { LOROM_HEADER_BASE };
        let start = base - 0x10 + if copier { COPIER_HEADER_SIZE } else { 0 };

        let mut raw = [0u8; HEADER_SPAN];
        stream.read_exact_at(start, &mut raw)?;
        Ok(Self {
            stream: Some(stream),
            header: SnesHeader { raw },
            copier,
            hirom,
        })
    }

    fn file_type(&self) -> FileType {
        FileType::RomImage
    }

    fn system_name(&self, variant: SystemNameVariant) -> Option<&'static str> {
        let table = match (variant.region, self.header.h(OFF_COUNTRY)) {
            (NameRegion::RomLocal, 0x00) => &SYSTEM_NAMES_JP,
            (NameRegion::RomLocal, 0x0D) => &SYSTEM_NAMES_KR,
            _ => &SYSTEM_NAMES,
        };
        lookup(table, 0, variant)
    }

    fn load_fields(&mut self, _ctx: &ParseContext, fields: &mut FieldList) -> Result<(), RomError> {
        let start = self.rom_start();
        let stream = self.stream.as_mut().ok_or(RomError::NotOpen)?;
        let h = &self.header;

        fields.add_string("Title", h.title());
        if h.has_extended() {
            let code = h.game_code();
            if !code.is_empty() {
                fields.add_string("Game ID", code);
            }
            let maker = h.maker_code();
            fields.add_string(
                "Publisher",
                maker_code_name(&maker).map(str::to_string).unwrap_or(maker),
            );
        } else {
            let id = h.h(OFF_DEVELOPER_ID);
            fields.add_string(
                "Publisher",
                old_licensee_name(id)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("0x{id:02X}")),
            );
        }

        let mode = h.h(OFF_MAP_MODE);
        fields.add_string("ROM mapping", map_mode_name(mode));
        fields.add_string("ROM speed", if mode & 0x10 != 0 { "FastROM" } else { "SlowROM" });
        fields.add_string("Cartridge type", cart_type_name(h.h(OFF_ROM_TYPE)));

        let rom_size = h.h(OFF_ROM_SIZE);
        fields.add_string(
            "ROM size",
            if rom_size < 16 {
                format_bytes(1024u64 << rom_size)
            } else {
                format!("Unknown (0x{rom_size:02X})")
            },
        );
        let ram_size = h.h(OFF_RAM_SIZE);
        fields.add_string(
            "SRAM size",
            match ram_size {
                0 => "None".to_string(),
                1..=15 => format_bytes(1024u64 << ram_size),
                _ => format!("Unknown (0x{ram_size:02X})"),
            },
        );
        fields.add_string("Region", destination_name(h.h(OFF_COUNTRY)));
        fields.add_numeric("Revision", h.h(OFF_VERSION) as i64);

        let computed = compute_checksum(stream.as_mut(), start)?;
        fields.add_string(
            "Checksum",
            checksum_text(h.checksum() as u64, computed as u64, 4),
        );
        fields.add_string(
            "Checksum complement",
            checksum_text(h.complement() as u64, (computed ^ 0xFFFF) as u64, 4),
        );
        fields.add_string("Copier header", if self.copier { "Yes" } else { "No" });
        log::debug!(
            "SNES header at 0x{:X} ({})",
            if self.hirom { HIROM_HEADER_BASE } else { LOROM_HEADER_BASE },
            map_mode_name(mode)
        );
        Ok(())
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

#[cfg(test)]
#[path = "tests/snes_tests.rs"]
mod tests;
