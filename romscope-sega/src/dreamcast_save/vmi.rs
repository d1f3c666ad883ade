//! Directory metadata that travels alongside or in front of VMU files:
//! the standalone VMI descriptor, and the 32-byte directory entry that
//! heads a DCI (Nexus) dump.

use chrono::{NaiveDate, NaiveDateTime};
use romscope_core::bytes::{bcd_to_u8, read_u16_le, read_u32_le};
use romscope_core::util::{read_ascii_fixed, read_shift_jis};

pub(crate) const VMI_LEN: usize = 0x6C;
pub(crate) const DIRENT_LEN: usize = 0x20;
pub(crate) const BLOCK_LEN: usize = 512;

// ---------------------------------------------------------------------------
// VMI
// ---------------------------------------------------------------------------

pub(crate) const VMI_OFF_CHECKSUM: usize = 0x00;
pub(crate) const VMI_OFF_DESCRIPTION: usize = 0x04;
pub(crate) const VMI_OFF_COPYRIGHT: usize = 0x24;
pub(crate) const VMI_OFF_CTIME: usize = 0x44;
pub(crate) const VMI_OFF_VERSION: usize = 0x4C;
pub(crate) const VMI_OFF_FILE_NUMBER: usize = 0x4E;
pub(crate) const VMI_OFF_RESOURCE: usize = 0x50;
pub(crate) const VMI_OFF_FILENAME: usize = 0x58;
pub(crate) const VMI_OFF_MODE: usize = 0x64;
pub(crate) const VMI_OFF_FILESIZE: usize = 0x68;

pub(crate) const VMI_MODE_GAME: u16 = 0x02;
pub(crate) const VMI_MODE_PROTECT: u16 = 0x01;

#[derive(Debug, Clone)]
pub(crate) struct Vmi {
    pub(crate) description: String,
    pub(crate) copyright: String,
    pub(crate) ctime: Option<NaiveDateTime>,
    pub(crate) version: u16,
    pub(crate) file_number: u16,
    pub(crate) resource: String,
    pub(crate) filename: String,
    pub(crate) game: bool,
    pub(crate) protected: bool,
    pub(crate) filesize: u32,
}

/// The first four bytes of the resource name ANDed with "SEGA".
pub(crate) fn vmi_checksum(resource: &[u8]) -> [u8; 4] {
    let mut out = [0u8; 4];
    for (i, (r, s)) in resource.iter().zip(b"SEGA").enumerate().take(4) {
        out[i] = r & s;
    }
    out
}

impl Vmi {
    /// Parse a descriptor, accepting it only if the checksum matches.
    pub(crate) fn parse(buf: &[u8]) -> Option<Self> {
        let v = buf.get(..VMI_LEN)?;
        let resource = &v[VMI_OFF_RESOURCE..VMI_OFF_FILENAME];
        if v[VMI_OFF_CHECKSUM..VMI_OFF_CHECKSUM + 4] != vmi_checksum(resource) {
            return None;
        }
        let c = &v[VMI_OFF_CTIME..VMI_OFF_CTIME + 8];
        let ctime = NaiveDate::from_ymd_opt(read_u16_le(c, 0) as i32, c[2] as u32, c[3] as u32)
            .and_then(|d| d.and_hms_opt(c[4] as u32, c[5] as u32, c[6] as u32));
        let mode = read_u16_le(v, VMI_OFF_MODE);
        Some(Self {
            description: read_shift_jis(&v[VMI_OFF_DESCRIPTION..VMI_OFF_COPYRIGHT])
                .trim()
                .to_string(),
            copyright: read_shift_jis(&v[VMI_OFF_COPYRIGHT..VMI_OFF_CTIME])
                .trim()
                .to_string(),
            ctime,
            version: read_u16_le(v, VMI_OFF_VERSION),
            file_number: read_u16_le(v, VMI_OFF_FILE_NUMBER),
            resource: read_ascii_fixed(resource),
            filename: read_ascii_fixed(&v[VMI_OFF_FILENAME..VMI_OFF_MODE]),
            game: mode & VMI_MODE_GAME != 0,
            protected: mode & VMI_MODE_PROTECT != 0,
            filesize: read_u32_le(v, VMI_OFF_FILESIZE),
        })
    }
}

// ---------------------------------------------------------------------------
// VMU directory entry (DCI)
// ---------------------------------------------------------------------------

pub(crate) const DIR_OFF_TYPE: usize = 0x00;
pub(crate) const DIR_OFF_PROTECT: usize = 0x01;
pub(crate) const DIR_OFF_FIRST_BLOCK: usize = 0x02;
pub(crate) const DIR_OFF_FILENAME: usize = 0x04;
pub(crate) const DIR_OFF_CTIME: usize = 0x10;
pub(crate) const DIR_OFF_BLOCKS: usize = 0x18;
pub(crate) const DIR_OFF_HEADER: usize = 0x1A;

pub(crate) const FILETYPE_DATA: u8 = 0x33;
pub(crate) const FILETYPE_GAME: u8 = 0xCC;

#[derive(Debug, Clone)]
pub(crate) struct DirEntry {
    pub(crate) game: bool,
    pub(crate) protected: bool,
    pub(crate) first_block: u16,
    pub(crate) filename: String,
    pub(crate) ctime: Option<NaiveDateTime>,
    pub(crate) blocks: u16,
    /// Offset of the VMS header within the file, in blocks.
    pub(crate) header_block: u16,
}

/// The VMU stores timestamps as BCD: century, year, month, day, hour,
/// minute, second, weekday.
fn bcd_datetime(raw: &[u8]) -> Option<NaiveDateTime> {
    let d: Vec<u8> = raw
        .iter()
        .take(7)
        .map(|&b| bcd_to_u8(b))
        .collect::<Option<_>>()?;
    let year = d[0] as i32 * 100 + d[1] as i32;
    NaiveDate::from_ymd_opt(year, d[2] as u32, d[3] as u32)?.and_hms_opt(
        d[4] as u32,
        d[5] as u32,
        d[6] as u32,
    )
}

impl DirEntry {
    /// Parse an entry, accepting it only if the type and protect bytes
    /// hold one of their two legal values.
    pub(crate) fn parse(buf: &[u8]) -> Option<Self> {
        let d = buf.get(..DIRENT_LEN)?;
        let game = match d[DIR_OFF_TYPE] {
            FILETYPE_DATA => false,
            FILETYPE_GAME => true,
            _ => return None,
        };
        let protected = match d[DIR_OFF_PROTECT] {
            0x00 => false,
            0xFF => true,
            _ => return None,
        };
        Some(Self {
            game,
            protected,
            first_block: read_u16_le(d, DIR_OFF_FIRST_BLOCK),
            filename: read_ascii_fixed(&d[DIR_OFF_FILENAME..DIR_OFF_CTIME]),
            ctime: bcd_datetime(&d[DIR_OFF_CTIME..DIR_OFF_BLOCKS]),
            blocks: read_u16_le(d, DIR_OFF_BLOCKS),
            header_block: read_u16_le(d, DIR_OFF_HEADER),
        })
    }

    /// File size this entry implies for a DCI dump.
    pub(crate) fn dci_size(&self) -> u64 {
        DIRENT_LEN as u64 + self.blocks as u64 * BLOCK_LEN as u64
    }
}
