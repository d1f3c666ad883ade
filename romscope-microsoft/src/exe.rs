//! DOS and Windows executables.
//!
//! Supports:
//! - MZ (MS-DOS), including stubs of NE/LE/LX executables
//! - PE32 and PE32+ (Windows, Xbox, EFI)
//!
//! PE images also report their resource types and version resource.

use chrono::{DateTime, NaiveDateTime};
use romscope_core::bytes::{read_u16_le, read_u32_le, read_u64_le};
use romscope_core::system::lookup;
use romscope_core::util::{format_bytes, read_ascii};
use romscope_core::{
    ByteStream, DetectInfo, FieldKind, FieldList, FileType, ParseContext, RomError, RomFormat,
    SystemNameRow, SystemNameVariant,
};

use crate::pe_resource::{PeResourceReader, RT_VERSION};
use crate::version::{FILE_FLAG_NAMES, VersionInfo, version_string};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const DOS_MAGIC: &[u8; 2] = b"MZ";
const PE_MAGIC: &[u8; 4] = b"PE\0\0";

const DOS_HEADER_LEN: usize = 0x40;
const DOS_OFF_LFANEW: usize = 0x3C;
const DOS_PAGE_LEN: u64 = 512;
const PARAGRAPH: u64 = 16;

const COFF_LEN: usize = 20;
const SECTION_LEN: usize = 40;
const MAX_SECTIONS: usize = 96;
const MAX_OPT_HEADER_LEN: usize = 0x1000;
const MAX_DATA_DIRS: usize = 16;

const OPT_MAGIC_PE32: u16 = 0x10B;
const OPT_MAGIC_PE64: u16 = 0x20B;
/// Offset of the data directories in the optional header
const PE32_OFF_DATA_DIRS: usize = 96;
const PE64_OFF_DATA_DIRS: usize = 112;
const DIR_RESOURCE: usize = 2;

const IMAGE_FILE_DLL: u16 = 0x2000;

const SUBSYSTEM_XBOX: u16 = 14;

const SYSTEM_NAMES: [SystemNameRow; 4] = [
    ["Microsoft MS-DOS", "MS-DOS", "DOS"],
    ["Microsoft Windows", "Windows", "Win"],
    ["Microsoft Xbox", "Xbox", "Xbox"],
    ["Unified Extensible Firmware Interface", "UEFI", "EFI"],
];

const CHARACTERISTICS_NAMES: [Option<&str>; 16] = [
    Some("Relocations stripped"),
    Some("Executable"),
    Some("Line numbers stripped"),
    Some("Local symbols stripped"),
    Some("Aggressive WS trim"),
    Some("Large address aware"),
    None,
    Some("Bytes reversed (low)"),
    Some("32-bit machine"),
    Some("Debug info stripped"),
    Some("Removable run from swap"),
    Some("Network run from swap"),
    Some("System file"),
    Some("DLL"),
    Some("Uniprocessor only"),
    Some("Bytes reversed (high)"),
];

const DLL_CHARACTERISTICS_NAMES: [Option<&str>; 16] = [
    None,
    None,
    None,
    None,
    None,
    Some("High entropy VA"),
    Some("Dynamic base"),
    Some("Force integrity"),
    Some("NX compatible"),
    Some("No isolation"),
    Some("No SEH"),
    Some("No bind"),
    Some("AppContainer"),
    Some("WDM driver"),
    Some("Control Flow Guard"),
    Some("Terminal Server aware"),
];

fn machine_name(machine: u16) -> Option<&'static str> {
    Some(match machine {
        0x014C => "Intel i386",
        0x0162 => "MIPS R3000",
        0x0166 => "MIPS R4000",
        0x0168 => "MIPS R10000",
        0x0184 => "DEC Alpha AXP",
        0x01A2 => "Hitachi SH3",
        0x01A6 => "Hitachi SH4",
        0x01C0 => "ARM",
        0x01C2 => "ARM Thumb",
        0x01C4 => "ARM Thumb-2",
        0x01F0 => "PowerPC",
        0x01F1 => "PowerPC with FPU",
        0x01F2 => "PowerPC (big-endian)",
        0x0200 => "Intel Itanium",
        0x0266 => "MIPS16",
        0x0284 => "DEC Alpha AXP 64-bit",
        0x0EBC => "EFI Byte Code",
        0x5032 => "RISC-V 32-bit",
        0x5064 => "RISC-V 64-bit",
        0x6232 => "LoongArch 32-bit",
        0x6264 => "LoongArch 64-bit",
        0x8664 => "AMD64",
        0xAA64 => "ARM64",
        _ => return None,
    })
}

fn subsystem_name(subsystem: u16) -> Option<&'static str> {
    Some(match subsystem {
        1 => "Native",
        2 => "Windows GUI",
        3 => "Windows console",
        5 => "OS/2 console",
        7 => "POSIX console",
        8 => "Native Win9x driver",
        9 => "Windows CE GUI",
        10 => "EFI application",
        11 => "EFI boot service driver",
        12 => "EFI runtime driver",
        13 => "EFI ROM",
        SUBSYSTEM_XBOX => "Xbox",
        16 => "Windows boot application",
        _ => return None,
    })
}

// ---------------------------------------------------------------------------
// Formats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExeKind {
    Dos = 0,
    Pe32 = 1,
    Pe64 = 2,
}

impl ExeKind {
    fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::Dos),
            1 => Some(Self::Pe32),
            2 => Some(Self::Pe64),
            _ => None,
        }
    }

    fn from_opt_magic(magic: u16) -> Option<Self> {
        match magic {
            OPT_MAGIC_PE32 => Some(Self::Pe32),
            OPT_MAGIC_PE64 => Some(Self::Pe64),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Dos => "MS-DOS (MZ)",
            Self::Pe32 => "PE32",
            Self::Pe64 => "PE32+",
        }
    }
}

/// Classify an MZ image from its first bytes.
fn classify(buf: &[u8]) -> Option<ExeKind> {
    if buf.len() < DOS_HEADER_LEN || &buf[..2] != DOS_MAGIC {
        return None;
    }
    let lfanew = read_u32_le(buf, DOS_OFF_LFANEW) as usize;
    if lfanew < DOS_HEADER_LEN {
        return Some(ExeKind::Dos);
    }
    let pe = buf.get(lfanew..lfanew + 4 + COFF_LEN + 2);
    match pe {
        Some(pe) if &pe[..4] == PE_MAGIC => {
            Some(ExeKind::from_opt_magic(read_u16_le(pe, 4 + COFF_LEN)).unwrap_or(ExeKind::Dos))
        }
        _ => Some(ExeKind::Dos),
    }
}

// ---------------------------------------------------------------------------
// Headers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct DosHeader {
    last_page_bytes: u16,
    pages: u16,
    relocations: u16,
    header_paragraphs: u16,
    min_alloc: u16,
    max_alloc: u16,
    ss: u16,
    sp: u16,
    ip: u16,
    cs: u16,
    lfanew: u32,
}

impl DosHeader {
    fn parse(buf: &[u8]) -> Self {
        Self {
            last_page_bytes: read_u16_le(buf, 0x02),
            pages: read_u16_le(buf, 0x04),
            relocations: read_u16_le(buf, 0x06),
            header_paragraphs: read_u16_le(buf, 0x08),
            min_alloc: read_u16_le(buf, 0x0A),
            max_alloc: read_u16_le(buf, 0x0C),
            ss: read_u16_le(buf, 0x0E),
            sp: read_u16_le(buf, 0x10),
            ip: read_u16_le(buf, 0x14),
            cs: read_u16_le(buf, 0x16),
            lfanew: read_u32_le(buf, DOS_OFF_LFANEW),
        }
    }

    /// Bytes of the file the DOS loader reads.
    fn image_size(&self) -> u64 {
        let pages = self.pages as u64 * DOS_PAGE_LEN;
        match self.last_page_bytes {
            0 => pages,
            n => pages.saturating_sub(DOS_PAGE_LEN) + n as u64,
        }
    }
}

/// A section table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub raw_size: u32,
    pub raw_offset: u32,
    pub characteristics: u32,
}

impl Section {
    fn parse(buf: &[u8]) -> Self {
        Self {
            name: read_ascii(&buf[..8]),
            virtual_size: read_u32_le(buf, 8),
            virtual_address: read_u32_le(buf, 12),
            raw_size: read_u32_le(buf, 16),
            raw_offset: read_u32_le(buf, 20),
            characteristics: read_u32_le(buf, 36),
        }
    }

    pub fn contains_rva(&self, rva: u32) -> bool {
        let len = self.virtual_size.max(self.raw_size);
        rva >= self.virtual_address && rva - self.virtual_address < len
    }

    /// `R`, `W` and `X` access flags.
    pub fn access(&self) -> String {
        [(0x4000_0000, 'R'), (0x8000_0000, 'W'), (0x2000_0000, 'X')]
            .iter()
            .map(|&(bit, c)| if self.characteristics & bit != 0 { c } else { '-' })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct PeHeader {
    machine: u16,
    timestamp: u32,
    characteristics: u16,
    linker_version: (u8, u8),
    os_version: (u16, u16),
    image_version: (u16, u16),
    subsystem_version: (u16, u16),
    subsystem: u16,
    dll_characteristics: u16,
    entry_point: u32,
    image_base: u64,
    /// `(rva, size)` pairs
    data_dirs: Vec<(u32, u32)>,
    sections: Vec<Section>,
}

impl PeHeader {
    fn read(stream: &mut dyn ByteStream, kind: ExeKind, lfanew: u64) -> Result<Self, RomError> {
        let mut coff = [0u8; COFF_LEN];
        stream.read_exact_at(lfanew + 4, &mut coff)?;
        let section_count = read_u16_le(&coff, 2) as usize;
        let opt_len = read_u16_le(&coff, 16) as usize;

        let dirs_off = match kind {
            ExeKind::Pe64 => PE64_OFF_DATA_DIRS,
            _ => PE32_OFF_DATA_DIRS,
        };
        if !(dirs_off..=MAX_OPT_HEADER_LEN).contains(&opt_len) {
            return Err(RomError::corrupted_header(format!(
                "{opt_len}-byte optional header"
            )));
        }
        let opt_start = lfanew + 4 + COFF_LEN as u64;
        let opt = stream.read_vec_at(opt_start, opt_len)?;

        let dir_count = (read_u32_le(&opt, dirs_off - 4) as usize)
            .min(MAX_DATA_DIRS)
            .min((opt_len - dirs_off) / 8);
        let data_dirs = (0..dir_count)
            .map(|i| {
                let off = dirs_off + i * 8;
                (read_u32_le(&opt, off), read_u32_le(&opt, off + 4))
            })
            .collect();

        if section_count > MAX_SECTIONS {
            log::warn!("PE header declares {section_count} sections; reading {MAX_SECTIONS}");
        }
        let section_count = section_count.min(MAX_SECTIONS);
        let table = stream.read_up_to(opt_start + opt_len as u64, section_count * SECTION_LEN)?;
        if table.len() < section_count * SECTION_LEN {
            log::warn!("Section table truncated at {} bytes", table.len());
        }
        let sections = table.chunks_exact(SECTION_LEN).map(Section::parse).collect();

        let version = |off: usize| (read_u16_le(&opt, off), read_u16_le(&opt, off + 2));
        Ok(Self {
            machine: read_u16_le(&coff, 0),
            timestamp: read_u32_le(&coff, 4),
            characteristics: read_u16_le(&coff, 18),
            linker_version: (opt[2], opt[3]),
            os_version: version(40),
            image_version: version(44),
            subsystem_version: version(48),
            subsystem: read_u16_le(&opt, 68),
            dll_characteristics: read_u16_le(&opt, 70),
            entry_point: read_u32_le(&opt, 16),
            image_base: match kind {
                ExeKind::Pe64 => read_u64_le(&opt, 24),
                _ => read_u32_le(&opt, 28) as u64,
            },
            data_dirs,
            sections,
        })
    }

    fn resource_dir(&self) -> Option<(u32, u32)> {
        self.data_dirs
            .get(DIR_RESOURCE)
            .copied()
            .filter(|&(rva, size)| rva != 0 && size != 0)
    }
}

fn timestamp(secs: u32) -> Option<NaiveDateTime> {
    if secs == 0 {
        return None;
    }
    DateTime::from_timestamp(secs as i64, 0).map(|dt| dt.naive_utc())
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// An MZ or PE executable.
pub struct Executable {
    stream: Option<Box<dyn ByteStream>>,
    kind: ExeKind,
    dos: DosHeader,
    /// Signature found at `e_lfanew` of a plain MZ image
    stub_of: Option<&'static str>,
    pe: Option<PeHeader>,
}

impl Executable {
    fn stream(&self) -> Result<&dyn ByteStream, RomError> {
        self.stream.as_deref().ok_or(RomError::NotOpen)
    }

    /// Reader for the resource section, if the image has one.
    pub fn resources(&self) -> Result<Option<PeResourceReader>, RomError> {
        let stream = self.stream()?;
        let Some(pe) = &self.pe else {
            return Ok(None);
        };
        let Some((rva, _)) = pe.resource_dir() else {
            return Ok(None);
        };
        let Some(section) = pe.sections.iter().find(|s| s.contains_rva(rva)) else {
            log::warn!("Resource directory 0x{rva:08X} is not in any section");
            return Ok(None);
        };
        PeResourceReader::new(stream.dup()?, section, rva).map(Some)
    }

    /// The first `RT_VERSION` resource.
    pub fn version_info(&self) -> Result<Option<VersionInfo>, RomError> {
        let Some(mut rsrc) = self.resources()? else {
            return Ok(None);
        };
        let Some(data) = rsrc.find(RT_VERSION, None, None)? else {
            return Ok(None);
        };
        Ok(VersionInfo::parse(&rsrc.read_data(&data)?))
    }

    fn load_dos_fields(&self, fields: &mut FieldList) {
        let d = &self.dos;
        if let Some(stub) = self.stub_of {
            fields.add_string("Extended header", stub);
        }
        fields.add_string("Image size", format_bytes(d.image_size()));
        fields.add_string(
            "Header size",
            format_bytes(d.header_paragraphs as u64 * PARAGRAPH),
        );
        fields.add_numeric("Relocations", d.relocations as i64);
        fields.add_string("Initial CS:IP", format!("{:04X}:{:04X}", d.cs, d.ip));
        fields.add_string("Initial SS:SP", format!("{:04X}:{:04X}", d.ss, d.sp));
        fields.add_string(
            "Minimum extra memory",
            format_bytes(d.min_alloc as u64 * PARAGRAPH),
        );
        let max = match d.max_alloc {
            0xFFFF => "All available".to_string(),
            n => format_bytes(n as u64 * PARAGRAPH),
        };
        fields.add_string("Maximum extra memory", max);
    }

    fn load_pe_fields(&self, pe: &PeHeader, fields: &mut FieldList) {
        fields.add_string(
            "Machine",
            machine_name(pe.machine)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Unknown (0x{:04X})", pe.machine)),
        );
        match timestamp(pe.timestamp) {
            Some(ts) => fields.add_datetime("Timestamp", ts),
            None => fields.add_unknown("Timestamp", FieldKind::DateTime),
        }
        fields.add_bitfield(
            "Characteristics",
            pe.characteristics as u32,
            &CHARACTERISTICS_NAMES,
        );
        let (major, minor) = pe.linker_version;
        fields.add_string("Linker version", format!("{major}.{minor}"));
        for (label, (major, minor)) in [
            ("OS version", pe.os_version),
            ("Image version", pe.image_version),
            ("Subsystem version", pe.subsystem_version),
        ] {
            fields.add_string(label, format!("{major}.{minor}"));
        }
        fields.add_string(
            "Subsystem",
            subsystem_name(pe.subsystem)
                .map(str::to_string)
                .unwrap_or_else(|| format!("Unknown ({})", pe.subsystem)),
        );
        fields.add_bitfield(
            "DLL characteristics",
            pe.dll_characteristics as u32,
            &DLL_CHARACTERISTICS_NAMES,
        );
        fields.add_hex("Entry point", pe.entry_point as u64, 8);
        let base_digits = if self.kind == ExeKind::Pe64 { 16 } else { 8 };
        fields.add_hex("Image base", pe.image_base, base_digits);

        let rows = pe
            .sections
            .iter()
            .map(|s| {
                vec![
                    s.name.clone(),
                    format!("0x{:08X}", s.virtual_address),
                    format!("0x{:08X}", s.virtual_size),
                    format!("0x{:08X}", s.raw_offset),
                    format!("0x{:08X}", s.raw_size),
                    s.access(),
                ]
            })
            .collect();
        fields.add_table(
            "Sections",
            &["Name", "Virtual address", "Virtual size", "File offset", "File size", "Access"],
            rows,
        );
    }

    /// Resource types and the version resource. Damaged resources are
    /// logged and skipped.
    fn load_resource_fields(&self, ctx: &ParseContext, fields: &mut FieldList) {
        let types = self.resources().and_then(|r| match r {
            Some(mut r) => r.types().map(Some),
            None => Ok(None),
        });
        match types {
            Ok(Some(types)) if !types.is_empty() => {
                let labels: Vec<String> = types.iter().map(|t| t.type_label()).collect();
                fields.add_string("Resources", labels.join(", "));
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("Unreadable resource directory: {e}");
                return;
            }
        }

        let info = match self.version_info() {
            Ok(Some(info)) => info,
            Ok(None) => return,
            Err(e) => {
                log::warn!("Unreadable version resource: {e}");
                return;
            }
        };
        if let Some(fixed) = &info.fixed {
            fields.add_string("File version", version_string(fixed.file_version));
            fields.add_string("Product version", version_string(fixed.product_version));
            fields.add_bitfield("File flags", fixed.effective_flags(), &FILE_FLAG_NAMES);
            fields.add_string("File OS", fixed.os_name());
            fields.add_string("File type", fixed.file_type_name());
        }
        if let Some(table) = info.best_string_table(&ctx.language) {
            let rows = table
                .entries
                .iter()
                .map(|(k, v)| vec![k.clone(), v.clone()])
                .collect();
            fields.add_table(
                format!("Version strings ({:08X})", table.lang_cp),
                &["Key", "Value"],
                rows,
            );
        }
    }
}

impl RomFormat for Executable {
    const NAME: &'static str = "Executable";
    const EXTENSIONS: &'static [&'static str] =
        &["exe", "dll", "sys", "ocx", "cpl", "scr", "drv", "efi"];
    const HEADER_SIZE: usize = 0x400;

    fn detect(info: &DetectInfo<'_>) -> Option<u32> {
        classify(info.header).map(|k| k as u32)
    }

    fn open(
        mut stream: Box<dyn ByteStream>,
        system_id: u32,
        _ctx: &ParseContext,
    ) -> Result<Self, RomError> {
        let kind = ExeKind::from_id(system_id)
            .ok_or_else(|| RomError::invalid_format(format!("unknown executable type {system_id}")))?;
        let head = stream.read_up_to(0, Self::HEADER_SIZE)?;
        if classify(&head) != Some(kind) {
            return Err(RomError::invalid_format(format!(
                "not a {} executable",
                kind.name()
            )));
        }
        let dos = DosHeader::parse(&head);

        let (pe, stub_of) = match kind {
            ExeKind::Dos => {
                let sig = head
                    .get(dos.lfanew as usize..dos.lfanew as usize + 2)
                    .filter(|_| dos.lfanew as usize >= DOS_HEADER_LEN);
                let stub_of = match sig {
                    Some(b"NE") => Some("NE (16-bit Windows, OS/2)"),
                    Some(b"LE") => Some("LE (Windows VxD)"),
                    Some(b"LX") => Some("LX (32-bit OS/2)"),
                    _ => None,
                };
                (None, stub_of)
            }
            _ => (
                Some(PeHeader::read(stream.as_mut(), kind, dos.lfanew as u64)?),
                None,
            ),
        };
        Ok(Self {
            stream: Some(stream),
            kind,
            dos,
            stub_of,
            pe,
        })
    }

    fn file_type(&self) -> FileType {
        match &self.pe {
            Some(pe) if pe.characteristics & IMAGE_FILE_DLL != 0 => FileType::Dll,
            _ => FileType::Executable,
        }
    }

    fn system_name(&self, variant: SystemNameVariant) -> Option<&'static str> {
        let idx = match &self.pe {
            None => 0,
            Some(pe) => match pe.subsystem {
                SUBSYSTEM_XBOX => 2,
                10..=13 => 3,
                _ => 1,
            },
        };
        lookup(&SYSTEM_NAMES, idx, variant)
    }

    fn load_fields(&mut self, ctx: &ParseContext, fields: &mut FieldList) -> Result<(), RomError> {
        if self.stream.is_none() {
            return Err(RomError::NotOpen);
        }
        fields.add_string("Executable format", self.kind.name());
        match &self.pe {
            None => self.load_dos_fields(fields),
            Some(pe) => {
                self.load_pe_fields(pe, fields);
                self.load_resource_fields(ctx, fields);
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

#[cfg(test)]
#[path = "tests/exe_tests.rs"]
pub(crate) mod tests;
