//! Sega Mega Drive / Genesis cartridge ROMs.
//!
//! Supports:
//! - Mega Drive / Genesis ROMs (.md, .gen, .bin)
//! - Interleaved Super Magic Drive dumps (.smd)
//! - 32X and Pico cartridges, which share the header layout
//!
//! The header occupies 0x100-0x1FF and starts with `SEGA`. The stored
//! checksum is the 16-bit big-endian word sum from 0x200 to the end of the
//! ROM as declared by the header.

use romscope_core::bytes::read_u32_be;
use romscope_core::region::{RegionBit, describe_region_bits};
use romscope_core::system::lookup;
use romscope_core::util::{format_bytes, read_ascii_fixed, read_shift_jis};
use romscope_core::{
    ByteStream, DetectInfo, FieldList, FileType, NameRegion, ParseContext, RomError, RomFormat,
    SystemNameRow, SystemNameVariant, checksum_text,
};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const HEADER_END: usize = 0x200;

const OFF_SYSTEM: usize = 0x100;
const OFF_COPYRIGHT: usize = 0x110;
const OFF_TITLE_DOMESTIC: usize = 0x120;
const OFF_TITLE_OVERSEAS: usize = 0x150;
const OFF_SERIAL: usize = 0x180;
const OFF_CHECKSUM: usize = 0x18E;
const OFF_IO_SUPPORT: usize = 0x190;
const OFF_ROM_START: usize = 0x1A0;
const OFF_ROM_END: usize = 0x1A4;
const OFF_RAM_START: usize = 0x1A8;
const OFF_RAM_END: usize = 0x1AC;
const OFF_SRAM_MAGIC: usize = 0x1B0;
const OFF_SRAM_TYPE: usize = 0x1B2;
const OFF_SRAM_START: usize = 0x1B4;
const OFF_SRAM_END: usize = 0x1B8;
const OFF_NOTES: usize = 0x1C8;
const OFF_REGION: usize = 0x1F0;

const TITLE_LEN: usize = 48;

/// SMD copier header, then 16 KB blocks with odd bytes in the first half.
const SMD_HEADER_LEN: u64 = 0x200;
const SMD_BLOCK: usize = 0x4000;
const SMD_ID: u32 = 0x100;

const CHUNK: usize = 0x10000;

// ---------------------------------------------------------------------------
// Sub-types and names
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MdKind {
    MegaDrive = 0,
    Sega32x = 1,
    Pico = 2,
}

impl MdKind {
    fn from_system(system: &[u8]) -> Self {
        let text = read_ascii_fixed(system).to_ascii_uppercase();
        if text.contains("32X") {
            Self::Sega32x
        } else if text.contains("PICO") {
            Self::Pico
        } else {
            Self::MegaDrive
        }
    }

    fn from_id(id: u32) -> Option<Self> {
        match id & 0xFF {
            0 => Some(Self::MegaDrive),
            1 => Some(Self::Sega32x),
            2 => Some(Self::Pico),
            _ => None,
        }
    }
}

const ROW_MEGA_DRIVE: usize = 0;
const ROW_GENESIS: usize = 1;
const ROW_32X: usize = 2;
const ROW_GENESIS_32X: usize = 3;
const ROW_SUPER_32X: usize = 4;
const ROW_MEGA_DRIVE_32X: usize = 5;
const ROW_PICO: usize = 6;

const SYSTEM_NAMES: [SystemNameRow; 7] = [
    ["Sega Mega Drive", "Mega Drive", "MD"],
    ["Sega Genesis", "Genesis", "GEN"],
    ["Sega 32X", "32X", "32X"],
    ["Sega Genesis 32X", "Genesis 32X", "G32X"],
    ["Sega Super 32X", "Super 32X", "S32X"],
    ["Sega Mega Drive 32X", "Mega Drive 32X", "MD32X"],
    ["Sega Pico", "Pico", "Pico"],
];

const REGION_JAPAN: u32 = 1 << 0;
const REGION_ASIA: u32 = 1 << 1;
const REGION_USA: u32 = 1 << 2;
const REGION_EUROPE: u32 = 1 << 3;

const REGION_BITS: [RegionBit; 4] = [
    (REGION_JAPAN, "Japan"),
    (REGION_ASIA, "Asia"),
    (REGION_USA, "USA"),
    (REGION_EUROPE, "Europe"),
];

/// I/O support characters, in bitfield order.
const IO_DEVICES: [(u8, &str); 17] = [
    (b'J', "3-button pad"),
    (b'6', "6-button pad"),
    (b'0', "Master System pad"),
    (b'A', "Analog joystick"),
    (b'4', "Team Player"),
    (b'G', "Light gun"),
    (b'L', "Activator"),
    (b'M', "Mouse"),
    (b'B', "Trackball"),
    (b'T', "Tablet"),
    (b'V', "Paddle"),
    (b'K', "Keyboard"),
    (b'R', "Serial (RS-232)"),
    (b'P', "Printer"),
    (b'C', "CD-ROM"),
    (b'F', "Floppy drive"),
    (b'D', "Download"),
];

const IO_NAMES: [Option<&str>; 17] = {
    let mut names = [None; 17];
    let mut i = 0;
    while i < IO_DEVICES.len() {
        names[i] = Some(IO_DEVICES[i].1);
        i += 1;
    }
    names
};

/// Company codes from the copyright line that aren't third-party `T-` codes.
const COMPANIES: [(&str, &str); 4] = [
    ("SEGA", "Sega"),
    ("ACLD", "Ballistic"),
    ("ACCL", "Accolade"),
    ("ASCI", "ASCII"),
];

// ---------------------------------------------------------------------------
// Header helpers
// ---------------------------------------------------------------------------

fn has_sega_magic(header: &[u8]) -> bool {
    header.len() >= HEADER_END
        && (&header[OFF_SYSTEM..OFF_SYSTEM + 4] == b"SEGA"
            || &header[OFF_SYSTEM + 1..OFF_SYSTEM + 5] == b"SEGA")
}

/// Undo SMD interleaving of one block.
pub(crate) fn deinterleave(block: &[u8]) -> Vec<u8> {
    let half = block.len() / 2;
    let mut out = vec![0u8; half * 2];
    for i in 0..half {
        out[i * 2] = block[half + i];
        out[i * 2 + 1] = block[i];
    }
    out
}

fn looks_like_smd(info: &DetectInfo<'_>) -> bool {
    info.size > SMD_HEADER_LEN
        && (info.size - SMD_HEADER_LEN) % SMD_BLOCK as u64 == 0
        && info.has(SMD_HEADER_LEN as usize + SMD_BLOCK)
        && info.header[8] == 0xAA
        && info.header[9] == 0xBB
}

/// Squeeze runs of padding spaces in a title.
fn collapse_spaces(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Region bits from the region field. Old-style headers list `J`, `U` and
/// `E`; newer ones hold a single hex digit of region bits.
fn region_bits(field: &[u8]) -> u32 {
    let chars: Vec<u8> = field
        .iter()
        .copied()
        .take_while(|&c| c != 0)
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if chars.is_empty() {
        return 0;
    }
    if chars.iter().all(|c| matches!(c, b'J' | b'U' | b'E')) {
        return chars.iter().fold(0, |bits, c| {
            bits | match c {
                b'J' => REGION_JAPAN,
                b'U' => REGION_USA,
                _ => REGION_EUROPE,
            }
        });
    }
    (chars[0] as char).to_digit(16).unwrap_or(0)
}

fn io_support(field: &[u8]) -> u32 {
    IO_DEVICES
        .iter()
        .enumerate()
        .filter(|(_, (c, _))| field.contains(c))
        .fold(0, |bits, (i, _)| bits | (1 << i))
}

fn software_type(code: &str) -> &'static str {
    match code {
        "GM" => "Game",
        "AI" => "Educational",
        "OS" => "Boot ROM (TMSS)",
        "BR" => "Boot ROM (Mega CD)",
        "SP" => "Special",
        _ => "Unknown",
    }
}

fn publisher(company: &str) -> String {
    if let Some((_, name)) = COMPANIES.iter().find(|(code, _)| *code == company) {
        return name.to_string();
    }
    if company.starts_with("T-") {
        return format!("Third party ({company})");
    }
    format!("Unknown ({company})")
}

fn sram_kind(ty: u8) -> &'static str {
    let battery = ty & 0x40 != 0;
    match ((ty >> 3) & 3, battery) {
        (0, false) => "16-bit",
        (0, true) => "16-bit, battery-backed",
        (2, false) => "8-bit (even addresses)",
        (2, true) => "8-bit (even addresses), battery-backed",
        (3, false) => "8-bit (odd addresses)",
        (3, true) => "8-bit (odd addresses), battery-backed",
        _ => "Unknown",
    }
}

// ---------------------------------------------------------------------------
// Checksum
// ---------------------------------------------------------------------------

/// Feed the logical ROM bytes in `start..end` to `f`, undoing SMD
/// interleaving if needed. Every slice starts at an even address.
fn for_each_rom_chunk(
    stream: &mut dyn ByteStream,
    smd: bool,
    start: u64,
    end: u64,
    mut f: impl FnMut(&[u8]),
) -> Result<(), RomError> {
    if !smd {
        let mut pos = start;
        while pos < end {
            let want = ((end - pos) as usize).min(CHUNK);
            f(&stream.read_vec_at(pos, want)?);
            pos += want as u64;
        }
        return Ok(());
    }
    let block_len = SMD_BLOCK as u64;
    let mut block = start / block_len;
    while block * block_len < end {
        let raw = stream.read_vec_at(SMD_HEADER_LEN + block * block_len, SMD_BLOCK)?;
        let data = deinterleave(&raw);
        let base = block * block_len;
        let lo = start.max(base) - base;
        let hi = end.min(base + block_len) - base;
        f(&data[lo as usize..hi as usize]);
        block += 1;
    }
    Ok(())
}

/// Word sum from 0x200 to `end`.
fn compute_checksum(stream: &mut dyn ByteStream, smd: bool, end: u64) -> Result<u16, RomError> {
    let mut sum = 0u16;
    for_each_rom_chunk(stream, smd, HEADER_END as u64, end, |chunk| {
        for word in chunk.chunks_exact(2) {
            sum = sum.wrapping_add(u16::from_be_bytes([word[0], word[1]]));
        }
    })?;
    Ok(sum)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Mega Drive, 32X or Pico cartridge.
pub struct MegaDrive {
    stream: Option<Box<dyn ByteStream>>,
    kind: MdKind,
    smd: bool,
    header: Box<[u8; HEADER_END]>,
}

impl MegaDrive {
    fn rom_size(&self, stream: &dyn ByteStream) -> u64 {
        if self.smd {
            stream.size().saturating_sub(SMD_HEADER_LEN)
        } else {
            stream.size()
        }
    }

    fn region_bits(&self) -> u32 {
        region_bits(&self.header[OFF_REGION..OFF_REGION + 3])
    }

    /// Where the checksum stops: the declared ROM end, unless it lies
    /// outside the data actually present.
    fn checksum_end(&self, rom_size: u64) -> u64 {
        let declared = read_u32_be(&self.header[..], OFF_ROM_END) as u64 + 1;
        if declared > HEADER_END as u64 && declared <= rom_size {
            declared
        } else {
            rom_size
        }
    }

    fn system_row(&self, local: bool) -> usize {
        let bits = self.region_bits();
        match self.kind {
            MdKind::Pico => ROW_PICO,
            MdKind::MegaDrive if local && bits == REGION_USA => ROW_GENESIS,
            MdKind::MegaDrive => ROW_MEGA_DRIVE,
            MdKind::Sega32x if !local => ROW_32X,
            MdKind::Sega32x => match bits {
                REGION_USA => ROW_GENESIS_32X,
                REGION_JAPAN => ROW_SUPER_32X,
                REGION_EUROPE => ROW_MEGA_DRIVE_32X,
                _ => ROW_32X,
            },
        }
    }
}

impl RomFormat for MegaDrive {
    const NAME: &'static str = "Mega Drive";
    const EXTENSIONS: &'static [&'static str] = &["md", "gen", "bin", "smd", "32x", "pco"];
    const HEADER_SIZE: usize = SMD_HEADER_LEN as usize + SMD_BLOCK;

    fn detect(info: &DetectInfo<'_>) -> Option<u32> {
        if has_sega_magic(info.header) {
            return Some(MdKind::from_system(&info.header[OFF_SYSTEM..OFF_COPYRIGHT]) as u32);
        }
        if looks_like_smd(info) {
            let start = SMD_HEADER_LEN as usize;
            let data = deinterleave(&info.header[start..start + SMD_BLOCK]);
            if has_sega_magic(&data) {
                let kind = MdKind::from_system(&data[OFF_SYSTEM..OFF_COPYRIGHT]);
                return Some(kind as u32 | SMD_ID);
            }
        }
        None
    }

    fn open(
        mut stream: Box<dyn ByteStream>,
        system_id: u32,
        _ctx: &ParseContext,
    ) -> Result<Self, RomError> {
        let kind = MdKind::from_id(system_id)
            .ok_or_else(|| RomError::invalid_format(format!("unknown MD sub-type {system_id}")))?;
        let smd = system_id & SMD_ID != 0;
        let mut header = Box::new([0u8; HEADER_END]);
        if smd {
            let raw = stream.read_vec_at(SMD_HEADER_LEN, SMD_BLOCK)?;
            header.copy_from_slice(&deinterleave(&raw)[..HEADER_END]);
        } else {
            stream.read_exact_at(0, header.as_mut_slice())?;
        }
        if !has_sega_magic(&header[..]) {
            return Err(RomError::invalid_format("missing SEGA signature"));
        }
        Ok(Self {
            stream: Some(stream),
            kind,
            smd,
            header,
        })
    }

    fn file_type(&self) -> FileType {
        FileType::RomImage
    }

    fn system_name(&self, variant: SystemNameVariant) -> Option<&'static str> {
        let local = variant.region == NameRegion::RomLocal;
        lookup(&SYSTEM_NAMES, self.system_row(local), variant)
    }

    fn load_fields(&mut self, _ctx: &ParseContext, fields: &mut FieldList) -> Result<(), RomError> {
        let Some(stream) = self.stream.as_deref() else {
            return Err(RomError::NotOpen);
        };
        let rom_size = self.rom_size(stream);
        let h = &self.header;

        fields.add_string("System", read_ascii_fixed(&h[OFF_SYSTEM..OFF_COPYRIGHT]));
        if self.smd {
            fields.add_string("Format", "SMD (interleaved)");
        }

        let copyright = read_ascii_fixed(&h[OFF_COPYRIGHT..OFF_TITLE_DOMESTIC]);
        fields.add_string("Copyright", copyright.clone());
        // "(C)SEGA 1991.JAN": company code, then the build date
        if let Some(rest) = copyright.strip_prefix("(C)") {
            let company = rest.get(..4).unwrap_or(rest).trim().to_string();
            let company = if company.starts_with("T-") {
                rest.split_whitespace().next().unwrap_or_default().to_string()
            } else {
                company
            };
            if !company.is_empty() {
                fields.add_string("Publisher", publisher(&company));
            }
            let date = rest.get(4..).unwrap_or_default().trim();
            if let Some(date) = date.split_whitespace().last()
                && date.contains('.')
            {
                fields.add_string("Build date", date);
            }
        }

        let domestic = read_shift_jis(&h[OFF_TITLE_DOMESTIC..OFF_TITLE_DOMESTIC + TITLE_LEN]);
        let overseas = read_ascii_fixed(&h[OFF_TITLE_OVERSEAS..OFF_TITLE_OVERSEAS + TITLE_LEN]);
        fields.add_string("Domestic title", collapse_spaces(&domestic));
        fields.add_string("Overseas title", collapse_spaces(&overseas));

        let serial = read_ascii_fixed(&h[OFF_SERIAL..OFF_CHECKSUM]);
        let type_code = serial.get(..2).unwrap_or_default();
        fields.add_string("Serial number", serial.clone());
        fields.add_string(
            "Software type",
            match software_type(type_code) {
                "Unknown" => format!("Unknown ({type_code})"),
                known => known.to_string(),
            },
        );
        if let Some((_, rev)) = serial.rsplit_once('-')
            && let Ok(rev) = rev.trim().parse::<i64>()
        {
            fields.add_numeric("Revision", rev);
        }

        let io = io_support(&h[OFF_IO_SUPPORT..OFF_ROM_START]);
        fields.add_bitfield("I/O support", io, &IO_NAMES);

        let range = |start: usize, end: usize| {
            format!(
                "0x{:08X}-0x{:08X}",
                read_u32_be(&h[..], start),
                read_u32_be(&h[..], end)
            )
        };
        fields.add_string("ROM range", range(OFF_ROM_START, OFF_ROM_END));
        fields.add_string("RAM range", range(OFF_RAM_START, OFF_RAM_END));
        if &h[OFF_SRAM_MAGIC..OFF_SRAM_MAGIC + 2] == b"RA" {
            fields.add_string("Save RAM", range(OFF_SRAM_START, OFF_SRAM_END));
            fields.add_string("Save RAM type", sram_kind(h[OFF_SRAM_TYPE]));
        }
        let notes = read_ascii_fixed(&h[OFF_NOTES..OFF_REGION]);
        if !notes.is_empty() {
            fields.add_string("Notes", notes);
        }

        fields.add_string(
            "Region",
            describe_region_bits(self.region_bits(), &REGION_BITS, 0xF, "Unknown"),
        );
        fields.add_string("ROM size", format_bytes(rom_size));

        let expected = u16::from_be_bytes([h[OFF_CHECKSUM], h[OFF_CHECKSUM + 1]]);
        let end = self.checksum_end(rom_size);
        let smd = self.smd;
        let stream = self.stream.as_deref_mut().ok_or(RomError::NotOpen)?;
        let computed = compute_checksum(stream, smd, end)?;
        fields.add_string(
            "Checksum",
            checksum_text(expected as u64, computed as u64, 4),
        );
        Ok(())
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

#[cfg(test)]
#[path = "tests/mega_drive_tests.rs"]
mod tests;
