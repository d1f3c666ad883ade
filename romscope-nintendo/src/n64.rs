//! Nintendo 64 ROMs.
//!
//! Supports:
//! - Big-endian ROMs (.z64)
//! - Byte-swapped ROMs (.v64)
//! - Little-endian ROMs (.n64)
//!
//! Detects CIC variant from boot code and uses the correct checksum algorithm
//! for CIC-6101/6102, 6103, 6105, and 6106.

use romscope_core::bytes::read_u32_be;
use romscope_core::system::lookup;
use romscope_core::util::{format_bytes, read_ascii_fixed};
use romscope_core::{
    ByteStream, DetectInfo, FieldList, FileType, ParseContext, Region, RomError, RomFormat,
    SystemNameRow, SystemNameVariant, checksum_text,
};

use crate::n64_byteorder::ByteOrder;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const HEADER_LEN: usize = 0x40;
const BOOT_CODE_START: usize = 0x40;
const BOOT_CODE_END: usize = 0x1000;

const CRC_START: u64 = 0x1000;
const CRC_LEN: usize = 0x100000;

const SYSTEM_NAMES: [SystemNameRow; 1] = [["Nintendo 64", "Nintendo 64", "N64"]];

// ---------------------------------------------------------------------------
// CIC variant detection and seeds
// ---------------------------------------------------------------------------

/// CIC lockout chip variants. Each has a different seed and potentially
/// different checksum algorithm behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CicVariant {
    Cic6101,
    Cic6102,
    Cic6103,
    Cic6105,
    Cic6106,
    Unknown,
}

impl CicVariant {
    fn seed(self) -> u32 {
        match self {
            CicVariant::Cic6101 | CicVariant::Cic6102 => 0xF8CA4DDC,
            CicVariant::Cic6103 => 0xA3886759,
            CicVariant::Cic6105 => 0xDF26F436,
            CicVariant::Cic6106 => 0x1FEA617A,
            // Most retail carts are 6102
            CicVariant::Unknown => 0xF8CA4DDC,
        }
    }

    fn name(self) -> &'static str {
        match self {
            CicVariant::Cic6101 => "6101",
            CicVariant::Cic6102 => "6102",
            CicVariant::Cic6103 => "6103",
            CicVariant::Cic6105 => "6105",
            CicVariant::Cic6106 => "6106",
            CicVariant::Unknown => "Unknown",
        }
    }
}

/// Detect the CIC variant by computing CRC32-IEEE of the IPL3 boot code
/// (bytes 0x40-0x1000) and matching against known values.
/// Boot code must already be normalized to big-endian.
fn detect_cic(boot_code: &[u8]) -> CicVariant {
    match crc32fast::hash(boot_code) {
        0x6170A4A1 => CicVariant::Cic6101,
        0x90BB6CB5 => CicVariant::Cic6102,
        0x0B050EE0 => CicVariant::Cic6103,
        0x98BC2C86 => CicVariant::Cic6105,
        0xACC8580A => CicVariant::Cic6106,
        _ => CicVariant::Unknown,
    }
}

/// Compute the CRC1/CRC2 pair over the first megabyte after the boot code.
/// `boot_code` is bytes 0x40-0x1000 and `data` is 0x1000-0x101000, both
/// big-endian.
fn compute_crc(boot_code: &[u8], data: &[u8], cic: CicVariant) -> (u32, u32) {
    let seed = cic.seed();
    let (mut t1, mut t2, mut t3, mut t4, mut t5, mut t6) = (seed, seed, seed, seed, seed, seed);

    for (i, chunk) in data.chunks_exact(4).enumerate() {
        let d = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);

        // t6 += d, with overflow counter in t4
        let k1 = t6.wrapping_add(d);
        if k1 < t6 {
            t4 = t4.wrapping_add(1);
        }
        t6 = k1;

        t3 ^= d;

        let r = d.rotate_left(d & 0x1F);
        t5 = t5.wrapping_add(r);

        if d < t2 {
            t2 ^= r;
        } else {
            t2 ^= t6 ^ d;
        }

        // CIC-6105 mixes in a 256-byte window of the boot code
        if cic == CicVariant::Cic6105 {
            let b = read_u32_be(boot_code, 0x0710 + ((i * 4) & 0xFF));
            t1 = t1.wrapping_add(b ^ d);
        } else {
            t1 = t1.wrapping_add(d ^ t5);
        }
    }

    match cic {
        CicVariant::Cic6103 => ((t6 ^ t4).wrapping_add(t3), (t5 ^ t2).wrapping_add(t1)),
        CicVariant::Cic6106 => (
            t6.wrapping_mul(t4).wrapping_add(t3),
            t5.wrapping_mul(t2).wrapping_add(t1),
        ),
        _ => (t6 ^ t4 ^ t3, t5 ^ t2 ^ t1),
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

struct N64Header {
    clock_rate: u32,
    boot_address: u32,
    libultra_version: u32,
    crc1: u32,
    crc2: u32,
    title: String,
    category_code: u8,
    game_id: [u8; 2],
    destination_code: u8,
    rom_version: u8,
}

fn parse_header(buf: &[u8]) -> N64Header {
    N64Header {
        clock_rate: read_u32_be(buf, 0x04),
        boot_address: read_u32_be(buf, 0x08),
        libultra_version: read_u32_be(buf, 0x0C),
        crc1: read_u32_be(buf, 0x10),
        crc2: read_u32_be(buf, 0x14),
        title: read_ascii_fixed(&buf[0x20..0x34]),
        category_code: buf[0x3B],
        game_id: [buf[0x3C], buf[0x3D]],
        destination_code: buf[0x3E],
        rom_version: buf[0x3F],
    }
}

fn region_from_destination(code: u8) -> Region {
    match code {
        b'B' => Region::Brazil,
        // 'W' is Scandinavia on N64, not Taiwan
        b'W' => Region::Europe,
        c => Region::from_game_id_char(c as char),
    }
}

fn category_name(code: u8) -> Option<&'static str> {
    Some(match code {
        b'N' => "Game Pak",
        b'D' => "64DD disk",
        b'C' => "Expandable Game Pak",
        b'E' => "64DD expansion",
        b'Z' => "Aleck64",
        _ => return None,
    })
}

/// Libultra version word: `0x0000_14_4B` is "2.0K".
fn libultra_name(word: u32) -> Option<String> {
    let rev = (word & 0xFF) as u8;
    let ver = ((word >> 8) & 0xFF) as u8;
    if ver == 0 || !rev.is_ascii_uppercase() {
        return None;
    }
    Some(format!("{}.{}{}", ver / 10, ver % 10, rev as char))
}

fn is_printable(b: u8) -> bool {
    (0x20..0x7F).contains(&b)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Nintendo 64 cartridge ROM in any of its three byte orders.
pub struct N64 {
    stream: Option<Box<dyn ByteStream>>,
    order: ByteOrder,
    header: N64Header,
    /// Big-endian IPL3 boot code, if the file is long enough.
    boot_code: Option<Vec<u8>>,
}

impl N64 {
    /// Computed CRC pair, or `None` when the file is shorter than the
    /// checksummed range.
    fn computed_crc(&mut self, cic: CicVariant) -> Result<Option<(u32, u32)>, RomError> {
        let Some(boot_code) = self.boot_code.as_ref() else {
            return Ok(None);
        };
        let stream = self.stream.as_mut().ok_or(RomError::NotOpen)?;
        if stream.size() < CRC_START + CRC_LEN as u64 {
            return Ok(None);
        }
        let mut data = stream.read_vec_at(CRC_START, CRC_LEN)?;
        self.order.normalize(&mut data);
        Ok(Some(compute_crc(boot_code, &data, cic)))
    }

    fn game_id(&self) -> Option<String> {
        let h = &self.header;
        let code = [h.category_code, h.game_id[0], h.game_id[1], h.destination_code];
        code.iter()
            .all(|&b| is_printable(b))
            .then(|| code.iter().map(|&b| b as char).collect())
    }
}

impl RomFormat for N64 {
    const NAME: &'static str = "Nintendo 64";
    const EXTENSIONS: &'static [&'static str] = &["z64", "n64", "v64"];
    const HEADER_SIZE: usize = HEADER_LEN;

    fn detect(info: &DetectInfo<'_>) -> Option<u32> {
        if !info.has(HEADER_LEN) {
            return None;
        }
        ByteOrder::from_magic(info.header).map(|o| o as u32)
    }

    fn open(
        mut stream: Box<dyn ByteStream>,
        system_id: u32,
        _ctx: &ParseContext,
    ) -> Result<Self, RomError> {
        let order = ByteOrder::from_id(system_id)
            .ok_or_else(|| RomError::invalid_format(format!("unknown N64 sub-type {system_id}")))?;

        let mut buf = stream.read_up_to(0, BOOT_CODE_END)?;
        if buf.len() < HEADER_LEN {
            return Err(RomError::truncated(HEADER_LEN as u64, buf.len() as u64));
        }
        let has_boot = buf.len() == BOOT_CODE_END;
        buf.truncate(buf.len() & !3);
        order.normalize(&mut buf);
        let header = parse_header(&buf);
        let boot_code = has_boot.then(|| buf[BOOT_CODE_START..BOOT_CODE_END].to_vec());

        Ok(Self {
            stream: Some(stream),
            order,
            header,
            boot_code,
        })
    }

    fn file_type(&self) -> FileType {
        FileType::RomImage
    }

    fn system_name(&self, variant: SystemNameVariant) -> Option<&'static str> {
        lookup(&SYSTEM_NAMES, 0, variant)
    }

    fn load_fields(&mut self, _ctx: &ParseContext, fields: &mut FieldList) -> Result<(), RomError> {
        let file_size = self.stream.as_ref().ok_or(RomError::NotOpen)?.size();
        let cic = self
            .boot_code
            .as_deref()
            .map(detect_cic)
            .unwrap_or(CicVariant::Unknown);
        let computed = self.computed_crc(cic)?;
        let h = &self.header;

        fields.add_string("Title", h.title.clone());
        fields.add_string_or_unknown("Game ID", self.game_id());
        let cat = h.category_code;
        fields.add_string(
            "Category",
            match category_name(cat) {
                Some(name) => name.to_string(),
                None => format!("Unknown (0x{cat:02X})"),
            },
        );
        fields.add_string(
            "Region",
            region_from_destination(h.destination_code).name(),
        );
        fields.add_numeric("Revision", h.rom_version as i64);
        fields.add_string("Byte order", self.order.name());
        fields.add_string("ROM size", format_bytes(file_size));
        fields.add_hex("Clock rate", h.clock_rate as u64, 8);
        fields.add_hex("Entry point", h.boot_address as u64, 8);
        fields.add_string_or_unknown("OS version", libultra_name(h.libultra_version));
        fields.add_string("CIC", cic.name());

        match computed {
            Some((c1, c2)) => {
                fields.add_string("CRC1", checksum_text(h.crc1 as u64, c1 as u64, 8));
                fields.add_string("CRC2", checksum_text(h.crc2 as u64, c2 as u64, 8));
            }
            None => {
                // Too short to checksum; show the stored values only.
                fields.add_hex("CRC1", h.crc1 as u64, 8);
                fields.add_hex("CRC2", h.crc2 as u64, 8);
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

#[cfg(test)]
#[path = "tests/n64_tests.rs"]
mod tests;
