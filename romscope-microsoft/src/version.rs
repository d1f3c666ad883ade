//! `VS_VERSIONINFO` resources.
//!
//! The resource is a tree of blocks. Each block is
//! `{ wLength, wValueLength, wType, szKey, pad, Value, pad, Children }`,
//! with every field after the key aligned to 4 bytes from the start of the
//! resource. The root carries a `VS_FIXEDFILEINFO`; its children are a
//! `StringFileInfo` (one string table per language/code page) and a
//! `VarFileInfo` listing the translations.

use romscope_core::bytes::{read_u16_le, read_u32_le};
use romscope_core::util::read_utf16le;

const BLOCK_HEADER_LEN: usize = 6;
const FIXED_SIGNATURE: u32 = 0xFEEF_04BD;
const FIXED_LEN: usize = 52;
const MAX_STRINGS: usize = 256;

const ROOT_KEY: &str = "VS_VERSION_INFO";
const STRING_FILE_INFO: &str = "StringFileInfo";
const VAR_FILE_INFO: &str = "VarFileInfo";
const TRANSLATION: &str = "Translation";

/// Names of the `dwFileFlags` bits.
pub const FILE_FLAG_NAMES: [Option<&str>; 6] = [
    Some("Debug"),
    Some("Prerelease"),
    Some("Patched"),
    Some("Private build"),
    Some("Info inferred"),
    Some("Special build"),
];

fn align4(off: usize) -> usize {
    (off + 3) & !3
}

// ---------------------------------------------------------------------------
// Blocks
// ---------------------------------------------------------------------------

struct Block<'a> {
    key: String,
    value: &'a [u8],
    is_text: bool,
    /// Absolute offsets of the children area within the resource
    children: (usize, usize),
}

/// Parse the block at `off`. Returns the block and the offset of its next
/// sibling.
fn parse_block(buf: &[u8], off: usize, end: usize) -> Option<(Block<'_>, usize)> {
    let head = buf.get(off..off + BLOCK_HEADER_LEN)?;
    let len = read_u16_le(head, 0) as usize;
    if len < BLOCK_HEADER_LEN || off + len > end {
        return None;
    }
    let block_end = off + len;
    let value_len = read_u16_le(head, 2) as usize;
    let is_text = read_u16_le(head, 4) == 1;

    let key_start = off + BLOCK_HEADER_LEN;
    let key_units = buf[key_start..block_end]
        .chunks_exact(2)
        .position(|c| c == [0, 0])?;
    let key = read_utf16le(&buf[key_start..key_start + key_units * 2]);

    let value_start = align4(key_start + (key_units + 1) * 2).min(block_end);
    let value_bytes = if is_text { value_len * 2 } else { value_len };
    let value_end = (value_start + value_bytes).min(block_end);
    let children_start = align4(value_end).min(block_end);

    let block = Block {
        key,
        value: &buf[value_start..value_end],
        is_text,
        children: (children_start, block_end),
    };
    Some((block, align4(block_end)))
}

/// Iterate over the children of a block.
fn children<'a>(buf: &'a [u8], (start, end): (usize, usize)) -> impl Iterator<Item = Block<'a>> {
    let mut off = start;
    std::iter::from_fn(move || {
        if off >= end {
            return None;
        }
        let (block, next) = parse_block(buf, off, end)?;
        off = next;
        Some(block)
    })
}

// ---------------------------------------------------------------------------
// Parsed resource
// ---------------------------------------------------------------------------

/// `VS_FIXEDFILEINFO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedFileInfo {
    pub file_version: [u16; 4],
    pub product_version: [u16; 4],
    pub flags_mask: u32,
    pub flags: u32,
    pub os: u32,
    pub file_type: u32,
    pub file_subtype: u32,
}

impl FixedFileInfo {
    fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < FIXED_LEN || read_u32_le(buf, 0) != FIXED_SIGNATURE {
            return None;
        }
        let version = |off: usize| {
            let ms = read_u32_le(buf, off);
            let ls = read_u32_le(buf, off + 4);
            [(ms >> 16) as u16, ms as u16, (ls >> 16) as u16, ls as u16]
        };
        Some(Self {
            file_version: version(8),
            product_version: version(16),
            flags_mask: read_u32_le(buf, 24),
            flags: read_u32_le(buf, 28),
            os: read_u32_le(buf, 32),
            file_type: read_u32_le(buf, 36),
            file_subtype: read_u32_le(buf, 40),
        })
    }

    /// Flags that are both set and declared valid by the mask.
    pub fn effective_flags(&self) -> u32 {
        self.flags & self.flags_mask
    }

    pub fn os_name(&self) -> String {
        let name = match self.os {
            0x0000_0001 => "16-bit Windows",
            0x0000_0004 => "32-bit Windows",
            0x0001_0000 => "MS-DOS",
            0x0001_0001 => "MS-DOS, 16-bit Windows",
            0x0001_0004 => "MS-DOS, 32-bit Windows",
            0x0002_0000 | 0x0003_0000 => "OS/2",
            0x0004_0000 | 0x0004_0004 => "Windows NT",
            _ => return format!("Unknown (0x{:08X})", self.os),
        };
        name.to_string()
    }

    pub fn file_type_name(&self) -> String {
        let name = match self.file_type {
            1 => "Application",
            2 => "DLL",
            3 => "Device driver",
            4 => "Font",
            5 => "Virtual device",
            7 => "Static library",
            _ => return format!("Unknown ({})", self.file_type),
        };
        name.to_string()
    }
}

/// Dotted form of a four-part version.
pub fn version_string(v: [u16; 4]) -> String {
    format!("{}.{}.{}.{}", v[0], v[1], v[2], v[3])
}

/// One `StringFileInfo` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringTable {
    /// Language ID in the high 16 bits, code page in the low 16 bits
    pub lang_cp: u32,
    pub entries: Vec<(String, String)>,
}

impl StringTable {
    pub fn language(&self) -> u16 {
        (self.lang_cp >> 16) as u16
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A parsed version resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionInfo {
    pub fixed: Option<FixedFileInfo>,
    pub string_tables: Vec<StringTable>,
    /// `(language, code page)` pairs from `VarFileInfo`
    pub translations: Vec<(u16, u16)>,
}

impl VersionInfo {
    /// Parse a `VS_VERSIONINFO` resource. Returns `None` if the root block is
    /// missing or malformed. Each list of children ends at its first damaged
    /// block.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        let (root, _) = parse_block(buf, 0, buf.len())?;
        if root.key != ROOT_KEY {
            return None;
        }
        let mut info = Self {
            fixed: FixedFileInfo::parse(root.value),
            ..Self::default()
        };
        for child in children(buf, root.children) {
            match child.key.as_str() {
                STRING_FILE_INFO => {
                    for table in children(buf, child.children) {
                        if let Some(table) = parse_string_table(buf, &table) {
                            info.string_tables.push(table);
                        }
                    }
                }
                VAR_FILE_INFO => {
                    for var in children(buf, child.children).filter(|v| v.key == TRANSLATION) {
                        info.translations.extend(
                            var.value
                                .chunks_exact(4)
                                .map(|c| (read_u16_le(c, 0), read_u16_le(c, 2))),
                        );
                    }
                }
                other => log::debug!("Skipping version block {other:?}"),
            }
        }
        Some(info)
    }

    /// The string table best matching `language` (an ISO 639-1 code), then
    /// US English, then the first table.
    pub fn best_string_table(&self, language: &str) -> Option<&StringTable> {
        let primary = primary_lang_id(language);
        self.string_tables
            .iter()
            .find(|t| primary.is_some_and(|p| t.language() & 0x3FF == p))
            .or_else(|| self.string_tables.iter().find(|t| t.language() == 0x0409))
            .or_else(|| self.string_tables.first())
    }
}

fn parse_string_table(buf: &[u8], table: &Block<'_>) -> Option<StringTable> {
    let lang_cp = u32::from_str_radix(&table.key, 16).ok()?;
    let entries = children(buf, table.children)
        .take(MAX_STRINGS)
        .map(|s| {
            let value = if s.is_text || s.value.len() % 2 == 0 {
                read_utf16le(s.value)
            } else {
                String::new()
            };
            (s.key, value)
        })
        .collect();
    Some(StringTable { lang_cp, entries })
}

/// Windows primary language ID for an ISO 639-1 code.
fn primary_lang_id(language: &str) -> Option<u16> {
    Some(match language {
        "zh" => 0x04,
        "de" => 0x07,
        "en" => 0x09,
        "es" => 0x0A,
        "fr" => 0x0C,
        "it" => 0x10,
        "ja" => 0x11,
        "ko" => 0x12,
        "nl" => 0x13,
        "pt" => 0x16,
        "ru" => 0x19,
        _ => return None,
    })
}
