//! GameCube / Wii file system table (FST).
//!
//! The FST is a flat array of 12-byte entries followed by a string table.
//! Entry 0 is the root directory; a directory entry's "next" field is the
//! index one past its last descendant, so siblings can be skipped without
//! recursion.

use romscope_core::RomError;
use romscope_core::bytes::read_u32_be;
use romscope_core::util::read_latin1;

const ENTRY_LEN: usize = 12;

/// A file located through the FST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FstFile {
    /// Byte offset within the disc (or partition data area).
    pub offset: u64,
    pub size: u32,
}

#[derive(Debug, Clone, Copy)]
struct RawEntry {
    is_dir: bool,
    name_offset: u32,
    /// File: data offset (pre-shift). Directory: parent index.
    offset_or_parent: u32,
    /// File: size. Directory: index one past the last child.
    size_or_next: u32,
}

/// A parsed file system table.
#[derive(Debug, Clone)]
pub struct Fst {
    data: Vec<u8>,
    count: usize,
    /// Wii stores file offsets divided by 4.
    offset_shift: u32,
}

impl Fst {
    /// Parse a raw FST. `offset_shift` is 0 for GameCube and 2 for Wii.
    pub fn parse(data: Vec<u8>, offset_shift: u32) -> Result<Self, RomError> {
        if data.len() < ENTRY_LEN {
            return Err(RomError::truncated(ENTRY_LEN as u64, data.len() as u64));
        }
        if data[0] != 1 {
            return Err(RomError::invalid_format("FST root is not a directory"));
        }
        let count = read_u32_be(&data, 8) as usize;
        if count == 0 || count.saturating_mul(ENTRY_LEN) > data.len() {
            return Err(RomError::corrupted_header(format!(
                "FST entry count {count} does not fit in {} bytes",
                data.len()
            )));
        }
        Ok(Self {
            data,
            count,
            offset_shift,
        })
    }

    /// Number of entries, including the root.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count <= 1
    }

    /// Number of file (non-directory) entries.
    pub fn file_count(&self) -> usize {
        (1..self.count).filter(|&i| !self.entry(i).is_dir).count()
    }

    fn entry(&self, idx: usize) -> RawEntry {
        let base = idx * ENTRY_LEN;
        let word0 = read_u32_be(&self.data, base);
        RawEntry {
            is_dir: word0 >> 24 != 0,
            name_offset: word0 & 0x00FF_FFFF,
            offset_or_parent: read_u32_be(&self.data, base + 4),
            size_or_next: read_u32_be(&self.data, base + 8),
        }
    }

    fn name(&self, entry: &RawEntry) -> Option<String> {
        let start = self.count * ENTRY_LEN + entry.name_offset as usize;
        self.data.get(start..).map(read_latin1)
    }

    /// Look up a file by `/`-separated path, case-insensitively.
    pub fn find(&self, path: &str) -> Option<FstFile> {
        let mut parts = path.split('/').filter(|p| !p.is_empty()).peekable();
        let mut idx = 1;
        let mut end = self.count;

        while let Some(part) = parts.next() {
            let last = parts.peek().is_none();
            let mut found = false;
            while idx < end {
                let entry = self.entry(idx);
                let next = if entry.is_dir {
                    // Guard against loops in corrupted tables
                    (entry.size_or_next as usize).clamp(idx + 1, end)
                } else {
                    idx + 1
                };
                let matches = self
                    .name(&entry)
                    .is_some_and(|n| n.eq_ignore_ascii_case(part));
                if matches {
                    if last && !entry.is_dir {
                        return Some(FstFile {
                            offset: (entry.offset_or_parent as u64) << self.offset_shift,
                            size: entry.size_or_next,
                        });
                    }
                    if !last && entry.is_dir {
                        end = next;
                        idx += 1;
                        found = true;
                        break;
                    }
                }
                idx = next;
            }
            if !found {
                return None;
            }
        }
        None
    }
}
