//! PE resource section reader.
//!
//! The `.rsrc` section is exposed as a [`ByteStream`] window over the
//! executable. Resources are found through the three-level directory tree
//! (type, name, language) rooted at the resource data directory.

use romscope_core::bytes::{read_u16_le, read_u32_le};
use romscope_core::util::read_utf16le;
use romscope_core::{ByteStream, PartitionStream, RomError, WindowStream};

use crate::exe::Section;

const DIR_HEADER_LEN: usize = 16;
const DIR_ENTRY_LEN: usize = 8;
const DATA_ENTRY_LEN: usize = 16;
const HIGH_BIT: u32 = 0x8000_0000;
/// Entries read from a single directory.
const MAX_ENTRIES: usize = 4096;
/// Largest resource [`PeResourceReader::read_data`] will load.
const MAX_DATA_LEN: u32 = 16 * 1024 * 1024;

pub const RT_ICON: u16 = 3;
pub const RT_GROUP_ICON: u16 = 14;
pub const RT_VERSION: u16 = 16;
pub const RT_MANIFEST: u16 = 24;

/// Display name of a standard resource type.
pub fn resource_type_name(id: u16) -> Option<&'static str> {
    Some(match id {
        1 => "Cursor",
        2 => "Bitmap",
        RT_ICON => "Icon",
        4 => "Menu",
        5 => "Dialog",
        6 => "String table",
        7 => "Font directory",
        8 => "Font",
        9 => "Accelerators",
        10 => "RC data",
        11 => "Message table",
        12 => "Group cursor",
        RT_GROUP_ICON => "Group icon",
        RT_VERSION => "Version",
        17 => "Dialog include",
        19 => "Plug and Play",
        20 => "VxD",
        21 => "Animated cursor",
        22 => "Animated icon",
        23 => "HTML",
        RT_MANIFEST => "Manifest",
        _ => return None,
    })
}

/// Name of a directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceName {
    Id(u16),
    Name(String),
}

impl ResourceName {
    /// Display form for a top-level (type) entry.
    pub fn type_label(&self) -> String {
        match self {
            Self::Id(id) => resource_type_name(*id)
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{id}")),
            Self::Name(name) => name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Directory(u32),
    Data(u32),
}

#[derive(Debug, Clone)]
struct DirEntry {
    name: ResourceName,
    target: Target,
}

/// A resource leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceData {
    /// Image-relative address of the data
    pub rva: u32,
    pub size: u32,
    pub code_page: u32,
    pub language: u16,
}

/// Resource section of a PE image.
pub struct PeResourceReader {
    stream: WindowStream,
    /// Virtual address of the section start
    section_va: u32,
    /// Offset of the root directory within the section
    root: u32,
}

impl PeResourceReader {
    /// Open the resource tree rooted at `dir_rva`, which must lie inside
    /// `section`.
    pub fn new(
        parent: Box<dyn ByteStream>,
        section: &Section,
        dir_rva: u32,
    ) -> Result<Self, RomError> {
        if !section.contains_rva(dir_rva) {
            return Err(RomError::invalid_format(format!(
                "resource directory 0x{dir_rva:08X} is outside section {}",
                section.name
            )));
        }
        let stream = WindowStream::new(parent, section.raw_offset as u64, section.raw_size as u64)?;
        let mut reader = Self {
            stream,
            section_va: section.virtual_address,
            root: dir_rva - section.virtual_address,
        };
        // The root directory must at least be readable.
        reader.entries(reader.root)?;
        Ok(reader)
    }

    fn read_dir_header(&mut self, off: u32) -> Result<usize, RomError> {
        let mut head = [0u8; DIR_HEADER_LEN];
        self.stream.read_exact_at(off as u64, &mut head)?;
        let named = read_u16_le(&head, 12) as usize;
        let ids = read_u16_le(&head, 14) as usize;
        Ok((named + ids).min(MAX_ENTRIES))
    }

    /// Entries of the directory at `off` (relative to the section start).
    fn entries(&mut self, off: u32) -> Result<Vec<DirEntry>, RomError> {
        let count = self.read_dir_header(off)?;
        let raw = self
            .stream
            .read_vec_at(off as u64 + DIR_HEADER_LEN as u64, count * DIR_ENTRY_LEN)?;
        raw.chunks_exact(DIR_ENTRY_LEN)
            .map(|e| -> Result<DirEntry, RomError> {
                let name = read_u32_le(e, 0);
                let target = read_u32_le(e, 4);
                let name = if name & HIGH_BIT != 0 {
                    let off = self.root.saturating_add(name & !HIGH_BIT);
                    ResourceName::Name(self.read_name(off)?)
                } else {
                    ResourceName::Id(name as u16)
                };
                let target = if target & HIGH_BIT != 0 {
                    Target::Directory(self.root.saturating_add(target & !HIGH_BIT))
                } else {
                    Target::Data(self.root.saturating_add(target))
                };
                Ok(DirEntry { name, target })
            })
            .collect()
    }

    /// `IMAGE_RESOURCE_DIR_STRING_U`: a length in characters, then UTF-16LE.
    fn read_name(&mut self, off: u32) -> Result<String, RomError> {
        let mut len = [0u8; 2];
        self.stream.read_exact_at(off as u64, &mut len)?;
        let chars = u16::from_le_bytes(len) as usize;
        let raw = self.stream.read_vec_at(off as u64 + 2, chars * 2)?;
        Ok(read_utf16le(&raw))
    }

    fn read_data_entry(&mut self, off: u32, language: u16) -> Result<ResourceData, RomError> {
        let mut e = [0u8; DATA_ENTRY_LEN];
        self.stream.read_exact_at(off as u64, &mut e)?;
        Ok(ResourceData {
            rva: read_u32_le(&e, 0),
            size: read_u32_le(&e, 4),
            code_page: read_u32_le(&e, 8),
            language,
        })
    }

    /// Top-level resource types, in directory order.
    pub fn types(&mut self) -> Result<Vec<ResourceName>, RomError> {
        Ok(self
            .entries(self.root)?
            .into_iter()
            .filter(|e| matches!(e.target, Target::Directory(_)))
            .map(|e| e.name)
            .collect())
    }

    /// Number of resources of type `rtype`.
    pub fn count(&mut self, rtype: u16) -> Result<usize, RomError> {
        match self.subdir(self.root, Some(rtype))? {
            Some(dir) => Ok(self.entries(dir)?.len()),
            None => Ok(0),
        }
    }

    fn subdir(&mut self, dir: u32, id: Option<u16>) -> Result<Option<u32>, RomError> {
        Ok(self
            .entries(dir)?
            .into_iter()
            .filter(|e| id.is_none_or(|id| e.name == ResourceName::Id(id)))
            .find_map(|e| match e.target {
                Target::Directory(off) => Some(off),
                Target::Data(_) => None,
            }))
    }

    /// Find a resource by type, and optionally by ID and language. `None`
    /// picks the first entry at that level.
    pub fn find(
        &mut self,
        rtype: u16,
        id: Option<u16>,
        language: Option<u16>,
    ) -> Result<Option<ResourceData>, RomError> {
        let Some(type_dir) = self.subdir(self.root, Some(rtype))? else {
            return Ok(None);
        };
        let Some(name_dir) = self.subdir(type_dir, id)? else {
            return Ok(None);
        };
        let leaves = self.entries(name_dir)?;
        let leaf = leaves
            .iter()
            .find(|e| language.is_none_or(|l| e.name == ResourceName::Id(l)))
            .or_else(|| leaves.first());
        match leaf {
            Some(DirEntry {
                name,
                target: Target::Data(off),
            }) => {
                let language = match name {
                    ResourceName::Id(l) => *l,
                    ResourceName::Name(_) => 0,
                };
                self.read_data_entry(*off, language).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Load a resource's bytes.
    pub fn read_data(&mut self, data: &ResourceData) -> Result<Vec<u8>, RomError> {
        if data.size > MAX_DATA_LEN {
            return Err(RomError::unsupported(format!(
                "{}-byte resource",
                data.size
            )));
        }
        let off = data
            .rva
            .checked_sub(self.section_va)
            .ok_or_else(|| RomError::corrupted_header("resource data before its section"))?;
        self.stream.read_vec_at(off as u64, data.size as usize)
    }
}

impl ByteStream for PeResourceReader {
    fn is_open(&self) -> bool {
        self.stream.is_open()
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, RomError> {
        self.stream.read(buf)
    }

    fn seek(&mut self, pos: u64) -> Result<(), RomError> {
        self.stream.seek(pos)
    }

    fn tell(&self) -> u64 {
        self.stream.tell()
    }

    fn size(&self) -> u64 {
        self.stream.size()
    }

    fn close(&mut self) {
        self.stream.close();
    }

    fn dup(&self) -> Result<Box<dyn ByteStream>, RomError> {
        self.stream.dup()
    }
}

impl PartitionStream for PeResourceReader {
    fn region_size(&self) -> u64 {
        self.stream.region_size()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::exe::tests::section;
    use romscope_core::MemStream;

    /// Serialized resource section. Layout, relative to the section:
    /// root dir at 0, one ID dir and one language dir per resource, the data
    /// entries, the type name string, then the payloads.
    pub(crate) struct RsrcBuilder {
        /// `(type, id, lang, payload)`
        pub(crate) items: Vec<(u16, u16, u16, Vec<u8>)>,
        /// A named type with one resource.
        pub(crate) named_type: Option<String>,
    }

    impl RsrcBuilder {
        pub(crate) fn new() -> Self {
            Self {
                items: Vec::new(),
                named_type: None,
            }
        }

        pub(crate) fn add(mut self, rtype: u16, id: u16, lang: u16, payload: &[u8]) -> Self {
            self.items.push((rtype, id, lang, payload.to_vec()));
            self
        }

        /// Build for a section mapped at `section_va`.
        pub(crate) fn build(&self, section_va: u32) -> Vec<u8> {
            fn dir(entries: &[(u32, u32)]) -> Vec<u8> {
                let mut d = vec![0u8; DIR_HEADER_LEN];
                d[14..16].copy_from_slice(&(entries.len() as u16).to_le_bytes());
                for (name, target) in entries {
                    d.extend(name.to_le_bytes());
                    d.extend(target.to_le_bytes());
                }
                d
            }
            let dir_len = |n: usize| (DIR_HEADER_LEN + n * DIR_ENTRY_LEN) as u32;

            let n = self.items.len() as u32 + self.named_type.is_some() as u32;
            let root_len = dir_len(n as usize);
            let id_dirs = root_len;
            let lang_dirs = id_dirs + n * dir_len(1);
            let data_entries = lang_dirs + n * dir_len(1);
            let string_base = data_entries + n * DATA_ENTRY_LEN as u32;
            let mut strings = Vec::new();
            let mut named_off = 0;
            if let Some(name) = &self.named_type {
                named_off = string_base;
                let units: Vec<u16> = name.encode_utf16().collect();
                strings.extend((units.len() as u16).to_le_bytes());
                strings.extend(units.iter().flat_map(|u| u.to_le_bytes()));
                strings.resize(strings.len().next_multiple_of(4), 0);
            }
            let payload_base = string_base + strings.len() as u32;

            let mut types: Vec<(u32, u32, u32, Vec<u8>)> = self
                .items
                .iter()
                .map(|(t, id, lang, p)| (*t as u32, *id as u32, *lang as u32, p.clone()))
                .collect();
            if self.named_type.is_some() {
                types.push((HIGH_BIT | named_off, 1, 0, b"named".to_vec()));
            }

            let root: Vec<(u32, u32)> = (0..n)
                .map(|i| (types[i as usize].0, HIGH_BIT | (id_dirs + i * dir_len(1))))
                .collect();
            let mut out = dir(&root);
            for (i, t) in types.iter().enumerate() {
                out.extend(dir(&[(t.1, HIGH_BIT | (lang_dirs + i as u32 * dir_len(1)))]));
            }
            for (i, t) in types.iter().enumerate() {
                out.extend(dir(&[(t.2, data_entries + i as u32 * DATA_ENTRY_LEN as u32)]));
            }
            let mut payloads = Vec::new();
            for t in &types {
                let rva = section_va + payload_base + payloads.len() as u32;
                out.extend(rva.to_le_bytes());
                out.extend((t.3.len() as u32).to_le_bytes());
                out.extend(1252u32.to_le_bytes());
                out.extend(0u32.to_le_bytes());
                payloads.extend_from_slice(&t.3);
                payloads.resize(payloads.len().next_multiple_of(4), 0);
            }
            out.extend(strings);
            out.extend(payloads);
            out
        }
    }

    fn reader(rsrc: &RsrcBuilder) -> PeResourceReader {
        let data = rsrc.build(0x3000);
        let sec = section(".rsrc", 0x3000, data.len() as u32, 0, data.len() as u32);
        PeResourceReader::new(Box::new(MemStream::new(data)), &sec, 0x3000).unwrap()
    }

    #[test]
    fn test_find_and_read() {
        let rsrc = RsrcBuilder::new()
            .add(RT_VERSION, 1, 0x0409, b"version-data")
            .add(RT_MANIFEST, 1, 0x0409, b"<assembly/>");
        let mut r = reader(&rsrc);
        let found = r.find(RT_MANIFEST, None, None).unwrap().unwrap();
        assert_eq!(found.language, 0x0409);
        assert_eq!(found.code_page, 1252);
        assert_eq!(r.read_data(&found).unwrap(), b"<assembly/>");
        let found = r.find(RT_VERSION, Some(1), Some(0x0409)).unwrap().unwrap();
        assert_eq!(r.read_data(&found).unwrap(), b"version-data");
        assert!(r.find(RT_ICON, None, None).unwrap().is_none());
        assert!(r.find(RT_VERSION, Some(2), None).unwrap().is_none());
    }

    #[test]
    fn test_language_falls_back_to_first() {
        let rsrc = RsrcBuilder::new().add(RT_VERSION, 1, 0x0411, b"ja");
        let mut r = reader(&rsrc);
        let found = r.find(RT_VERSION, None, Some(0x0409)).unwrap().unwrap();
        assert_eq!(found.language, 0x0411);
    }

    #[test]
    fn test_types_and_count() {
        let mut rsrc = RsrcBuilder::new()
            .add(RT_GROUP_ICON, 1, 0, b"g")
            .add(RT_VERSION, 1, 0, b"v");
        rsrc.named_type = Some("TYPELIB".to_string());
        let mut r = reader(&rsrc);
        let labels: Vec<String> = r.types().unwrap().iter().map(|t| t.type_label()).collect();
        assert_eq!(labels, ["Group icon", "Version", "TYPELIB"]);
        assert_eq!(r.count(RT_VERSION).unwrap(), 1);
        assert_eq!(r.count(RT_ICON).unwrap(), 0);
        assert_eq!(ResourceName::Id(99).type_label(), "#99");
    }

    #[test]
    fn test_section_is_a_stream() {
        let rsrc = RsrcBuilder::new().add(RT_VERSION, 1, 0, b"abcd");
        let data = rsrc.build(0x3000);
        let mut file = vec![0xEEu8; 0x200];
        file.extend_from_slice(&data);
        let sec = section(".rsrc", 0x3000, data.len() as u32, 0x200, data.len() as u32);
        let mut r = PeResourceReader::new(Box::new(MemStream::new(file)), &sec, 0x3000).unwrap();
        assert_eq!(r.size(), data.len() as u64);
        assert_eq!(r.region_size(), data.len() as u64);
        assert_eq!(r.read_vec_at(0, 4).unwrap(), &data[..4]);
        r.close();
        assert!(!r.is_open());
    }

    #[test]
    fn test_rejects_bad_directory() {
        let sec = section(".rsrc", 0x3000, 0x100, 0, 0x100);
        // Directory RVA outside the section
        let opened = PeResourceReader::new(Box::new(MemStream::new(vec![0; 0x100])), &sec, 0x5000);
        assert!(opened.is_err());
        // Root directory claims more entries than the section holds
        let mut data = vec![0u8; 0x20];
        data[14] = 0x10;
        let sec = section(".rsrc", 0x3000, 0x20, 0, 0x20);
        let opened = PeResourceReader::new(Box::new(MemStream::new(data)), &sec, 0x3000);
        assert!(opened.is_err());
    }

    #[test]
    fn test_oversized_and_misplaced_data() {
        let rsrc = RsrcBuilder::new().add(RT_VERSION, 1, 0, b"abcd");
        let mut r = reader(&rsrc);
        let mut data = r.find(RT_VERSION, None, None).unwrap().unwrap();
        data.rva = 0x100;
        assert!(r.read_data(&data).is_err());
        data.size = MAX_DATA_LEN + 1;
        assert!(r.read_data(&data).is_err());
    }
}
