//! NCCH partitions and their decrypting reader.
//!
//! An NCCH is a 0x200-byte header followed by the ExHeader, an optional
//! plain region and logo, the ExeFS and the RomFS. Unless the NoCrypto flag
//! is set, the ExHeader, ExeFS and RomFS are AES-128-CTR encrypted:
//!
//! - the ExHeader, the ExeFS header and every ExeFS file except `.code`
//!   use the primary key (slot 0x2C);
//! - `.code` and the RomFS use the secondary key, whose slot depends on the
//!   crypto method byte.
//!
//! Both normal keys come from the slot's KeyX and a KeyY taken from the
//! first 16 bytes of the header signature. The counter is derived from the
//! partition ID and the section.

use romscope_core::bytes::{align_up, read_u16_le, read_u32_le, read_u64_le};
use romscope_core::stream::clamp_read;
use romscope_core::util::read_ascii;
use romscope_core::{ByteStream, EncryptionStatus, KeyStore, PartitionStream, RomError};
use romscope_crypto::{AesCipher, BLOCK_SIZE, ChainingMode, CryptoError, KeySpec};
use sha2::{Digest, Sha256};

use super::common::{MEDIA_UNIT, crypto_method_name, is_system_title, scramble_key};

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

pub(crate) const NCCH_MAGIC: &[u8; 4] = b"NCCH";
pub(crate) const NCCH_HEADER_LEN: usize = 0x200;

const OFF_MAGIC: usize = 0x100;
const OFF_CONTENT_SIZE: usize = 0x104;
const OFF_PARTITION_ID: usize = 0x108;
const OFF_MAKER: usize = 0x110;
const OFF_VERSION: usize = 0x112;
const OFF_PROGRAM_ID: usize = 0x118;
const OFF_PRODUCT_CODE: usize = 0x150;
const OFF_EXHEADER_HASH: usize = 0x160;
const OFF_EXHEADER_SIZE: usize = 0x180;
const OFF_FLAGS: usize = 0x188;
const OFF_EXEFS: usize = 0x1A0;
const OFF_ROMFS: usize = 0x1B0;

pub(crate) const EXHEADER_OFFSET: u64 = 0x200;
/// ExHeader plus access descriptor.
pub(crate) const EXHEADER_LEN: u64 = 0x800;

pub(crate) const EXEFS_HEADER_LEN: usize = 0x200;
const EXEFS_ENTRY_LEN: usize = 0x10;
const EXEFS_FILE_COUNT: usize = 10;

pub(crate) const FLAG_FIXED_KEY: u8 = 0x01;
pub(crate) const FLAG_NO_CRYPTO: u8 = 0x04;
pub(crate) const FLAG_SEED: u8 = 0x20;

const KEY_SCRAMBLER: KeySpec = KeySpec::new("ctr-scrambler");
const KEY_X_2C: KeySpec = KeySpec::new("ctr-Slot0x2CKeyX");
const KEY_X_25: KeySpec = KeySpec::new("ctr-Slot0x25KeyX");
const KEY_X_18: KeySpec = KeySpec::new("ctr-Slot0x18KeyX");
const KEY_X_1B: KeySpec = KeySpec::new("ctr-Slot0x1BKeyX");
const KEY_FIXED_SYSTEM: KeySpec = KeySpec::new("ctr-FixedSystemKey");

/// Parsed NCCH header. Offsets and sizes are in bytes.
#[derive(Debug, Clone)]
pub(crate) struct NcchHeader {
    pub(crate) key_y: [u8; 16],
    pub(crate) content_size: u64,
    pub(crate) partition_id: u64,
    pub(crate) maker_code: String,
    pub(crate) version: u16,
    pub(crate) program_id: u64,
    pub(crate) product_code: String,
    pub(crate) exheader_hash: [u8; 32],
    pub(crate) exheader_size: u32,
    pub(crate) crypto_method: u8,
    pub(crate) platform: u8,
    pub(crate) content_type: u8,
    pub(crate) flags: u8,
    pub(crate) exefs: (u64, u64),
    pub(crate) romfs: (u64, u64),
}

impl NcchHeader {
    pub(crate) fn parse(buf: &[u8]) -> Result<Self, RomError> {
        if buf.len() < NCCH_HEADER_LEN {
            return Err(RomError::truncated(NCCH_HEADER_LEN as u64, buf.len() as u64));
        }
        if &buf[OFF_MAGIC..OFF_MAGIC + 4] != NCCH_MAGIC {
            return Err(RomError::invalid_format("missing NCCH magic"));
        }
        let region = |off: usize| {
            (
                read_u32_le(buf, off) as u64 * MEDIA_UNIT,
                read_u32_le(buf, off + 4) as u64 * MEDIA_UNIT,
            )
        };
        let mut key_y = [0u8; 16];
        key_y.copy_from_slice(&buf[..16]);
        let mut exheader_hash = [0u8; 32];
        exheader_hash.copy_from_slice(&buf[OFF_EXHEADER_HASH..OFF_EXHEADER_HASH + 32]);
        let flags = &buf[OFF_FLAGS..OFF_FLAGS + 8];
        Ok(Self {
            key_y,
            content_size: read_u32_le(buf, OFF_CONTENT_SIZE) as u64 * MEDIA_UNIT,
            partition_id: read_u64_le(buf, OFF_PARTITION_ID),
            maker_code: read_ascii(&buf[OFF_MAKER..OFF_MAKER + 2]),
            version: read_u16_le(buf, OFF_VERSION),
            program_id: read_u64_le(buf, OFF_PROGRAM_ID),
            product_code: read_ascii(&buf[OFF_PRODUCT_CODE..OFF_PRODUCT_CODE + 0x10]),
            exheader_hash,
            exheader_size: read_u32_le(buf, OFF_EXHEADER_SIZE),
            crypto_method: flags[3],
            platform: flags[4],
            content_type: flags[5],
            flags: flags[7],
            exefs: region(OFF_EXEFS),
            romfs: region(OFF_ROMFS),
        })
    }

    pub(crate) fn no_crypto(&self) -> bool {
        self.flags & FLAG_NO_CRYPTO != 0
    }

    /// CXIs carry code and an ExHeader; CFAs are data only.
    pub(crate) fn is_cxi(&self) -> bool {
        self.content_type & 0x02 != 0
    }

    /// How the partition is encrypted, independent of key availability.
    pub(crate) fn encryption_desc(&self) -> String {
        if self.no_crypto() {
            "None (NoCrypto)".to_string()
        } else if self.flags & FLAG_FIXED_KEY != 0 {
            "Fixed key".to_string()
        } else if self.flags & FLAG_SEED != 0 {
            format!("{} + seed", crypto_method_name(self.crypto_method))
        } else {
            crypto_method_name(self.crypto_method).to_string()
        }
    }
}

// ---------------------------------------------------------------------------
// Keys and counters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Section {
    ExHeader = 1,
    ExeFs = 2,
    RomFs = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeySlot {
    Primary,
    Secondary,
}

/// Initial counter for a section starting `section_offset` bytes into the
/// NCCH.
pub(crate) fn section_counter(h: &NcchHeader, section: Section, section_offset: u64) -> [u8; 16] {
    let mut ctr = [0u8; BLOCK_SIZE];
    if h.version == 1 {
        ctr[..8].copy_from_slice(&h.partition_id.to_le_bytes());
        ctr[12..].copy_from_slice(&(section_offset as u32).to_be_bytes());
    } else {
        ctr[..8].copy_from_slice(&h.partition_id.to_be_bytes());
        ctr[8] = section as u8;
    }
    ctr
}

fn secondary_key_x(crypto_method: u8) -> Option<KeySpec> {
    match crypto_method {
        0x00 => Some(KEY_X_2C),
        0x01 => Some(KEY_X_25),
        0x0A => Some(KEY_X_18),
        0x0B => Some(KEY_X_1B),
        _ => None,
    }
}

type KeyResult = Result<[u8; 16], EncryptionStatus>;

/// Normal keys for the primary and secondary slots.
fn derive_keys(h: &NcchHeader, keys: &KeyStore) -> (KeyResult, KeyResult) {
    let get = |spec: &KeySpec| keys.get_128(spec).map_err(|e| EncryptionStatus::from(&e));

    if h.flags & FLAG_FIXED_KEY != 0 {
        let fixed = if is_system_title(h.program_id) {
            get(&KEY_FIXED_SYSTEM)
        } else {
            Ok([0u8; 16])
        };
        return (fixed, fixed);
    }

    let scrambler = get(&KEY_SCRAMBLER);
    let normal = |spec: &KeySpec| -> KeyResult {
        let c = scrambler?;
        Ok(scramble_key(&get(spec)?, &h.key_y, &c))
    };
    let primary = normal(&KEY_X_2C);
    let secondary = if h.flags & FLAG_SEED != 0 {
        // Seeded titles need the seed database
        Err(EncryptionStatus::KeyMissing)
    } else if h.crypto_method == 0 {
        primary
    } else {
        match secondary_key_x(h.crypto_method) {
            Some(spec) => normal(&spec),
            None => Err(EncryptionStatus::UnknownKeyIndex),
        }
    };
    (primary, secondary)
}

/// An encrypted span: `(start, length, key slot, counter base)`, with the
/// counter base given as the section and its start.
#[derive(Debug, Clone, Copy)]
struct CryptRegion {
    start: u64,
    len: u64,
    slot: KeySlot,
    section: Section,
    section_start: u64,
}

impl CryptRegion {
    fn end(&self) -> u64 {
        self.start + self.len
    }
}

/// One ExeFS header entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ExeFsEntry {
    pub(crate) name: String,
    /// Offset past the ExeFS header.
    pub(crate) offset: u32,
    pub(crate) size: u32,
}

pub(crate) fn parse_exefs_header(raw: &[u8]) -> Vec<ExeFsEntry> {
    raw.chunks_exact(EXEFS_ENTRY_LEN)
        .take(EXEFS_FILE_COUNT)
        .filter_map(|e| {
            let name = read_ascii(&e[..8]);
            let size = read_u32_le(e, 12);
            (!name.is_empty() && size > 0).then(|| ExeFsEntry {
                name,
                offset: read_u32_le(e, 8),
                size,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Decrypted view of one NCCH. Position 0 is the NCCH header.
///
/// Bytes outside the encrypted sections are passed through. A read that
/// reaches a section whose key is unavailable stops there, so the header
/// and any section with a usable key stay readable.
pub struct NcchReader {
    parent: Option<Box<dyn ByteStream>>,
    base: u64,
    header: NcchHeader,
    len: u64,
    regions: Vec<CryptRegion>,
    primary: Option<[u8; 16]>,
    secondary: Option<[u8; 16]>,
    status: EncryptionStatus,
    pos: u64,
}

impl NcchReader {
    /// Open the NCCH at absolute offset `base` of `parent`.
    pub fn open(
        mut parent: Box<dyn ByteStream>,
        base: u64,
        keys: &KeyStore,
    ) -> Result<Self, RomError> {
        if !parent.is_open() {
            return Err(RomError::NotOpen);
        }
        let raw = parent.read_vec_at(base, NCCH_HEADER_LEN)?;
        let header = NcchHeader::parse(&raw)?;
        let len = if header.content_size > 0 {
            header.content_size
        } else {
            parent.size().saturating_sub(base)
        };

        let (mut primary, mut secondary, mut status) = (None, None, EncryptionStatus::Ok);
        let mut regions = Vec::new();
        if !header.no_crypto() {
            let (p, s) = derive_keys(&header, keys);
            for result in [&p, &s] {
                if let Err(e) = result
                    && status.is_ok()
                {
                    status = *e;
                }
            }
            primary = p.ok();
            secondary = s.ok();
            if !status.is_ok() {
                log::debug!("NCCH {} at 0x{base:X}: {status}", header.product_code);
            }

            if header.exheader_size > 0 {
                regions.push(CryptRegion {
                    start: EXHEADER_OFFSET,
                    len: EXHEADER_LEN,
                    slot: KeySlot::Primary,
                    section: Section::ExHeader,
                    section_start: EXHEADER_OFFSET,
                });
            }
            let (romfs_off, romfs_len) = header.romfs;
            if romfs_len > 0 {
                regions.push(CryptRegion {
                    start: romfs_off,
                    len: romfs_len,
                    slot: KeySlot::Secondary,
                    section: Section::RomFs,
                    section_start: romfs_off,
                });
            }
        }

        let mut reader = Self {
            parent: Some(parent),
            base,
            header,
            len,
            regions,
            primary,
            secondary,
            status,
            pos: 0,
        };
        if !reader.header.no_crypto() {
            reader.add_exefs_regions()?;
        }
        reader.regions.sort_by_key(|r| r.start);
        Ok(reader)
    }

    /// Map the ExeFS: `.code` uses the secondary key, everything else the
    /// primary one.
    fn add_exefs_regions(&mut self) -> Result<(), RomError> {
        let (exefs_off, exefs_len) = self.header.exefs;
        if exefs_len == 0 {
            return Ok(());
        }
        let whole = CryptRegion {
            start: exefs_off,
            len: exefs_len,
            slot: KeySlot::Primary,
            section: Section::ExeFs,
            section_start: exefs_off,
        };
        if self.header.crypto_method == 0 || self.primary.is_none() {
            self.regions.push(whole);
            return Ok(());
        }

        self.regions.push(whole);
        let mut raw = vec![0u8; EXEFS_HEADER_LEN];
        let got = self.seek_and_read(exefs_off, &mut raw)?;
        self.regions.pop();
        let code = parse_exefs_header(&raw[..got])
            .into_iter()
            .find(|e| e.name == ".code");

        let Some(code) = code else {
            self.regions.push(whole);
            return Ok(());
        };
        let code_start = exefs_off + EXEFS_HEADER_LEN as u64 + code.offset as u64;
        let code_end = align_up(code.size as u64, MEDIA_UNIT)
            .map_or(whole.end(), |len| code_start.saturating_add(len).min(whole.end()));
        if code_start >= code_end {
            self.regions.push(whole);
            return Ok(());
        }
        self.regions.push(CryptRegion {
            len: code_start - exefs_off,
            ..whole
        });
        self.regions.push(CryptRegion {
            start: code_start,
            len: code_end - code_start,
            slot: KeySlot::Secondary,
            ..whole
        });
        if code_end < whole.end() {
            self.regions.push(CryptRegion {
                start: code_end,
                len: whole.end() - code_end,
                ..whole
            });
        }
        Ok(())
    }

    pub(crate) fn header(&self) -> &NcchHeader {
        &self.header
    }

    /// The decrypted ExHeader (without the access descriptor), or `None`
    /// if the NCCH has none or it can't be decrypted.
    pub(crate) fn exheader(&mut self) -> Result<Option<Vec<u8>>, RomError> {
        let size = self.header.exheader_size as usize;
        if size == 0 || size as u64 > EXHEADER_LEN {
            return Ok(None);
        }
        let data = self.read_up_to(EXHEADER_OFFSET, size)?;
        Ok((data.len() == size).then_some(data))
    }

    /// Compare the ExHeader against the SHA-256 in the NCCH header.
    /// `None` when the ExHeader can't be read.
    pub(crate) fn verify_exheader(&mut self) -> Result<Option<bool>, RomError> {
        let expected = self.header.exheader_hash;
        Ok(self
            .exheader()?
            .map(|data| Sha256::digest(&data).as_slice() == expected.as_slice()))
    }

    /// Contents of a file in the ExeFS.
    pub(crate) fn exefs_file(&mut self, name: &str) -> Result<Option<Vec<u8>>, RomError> {
        let (exefs_off, exefs_len) = self.header.exefs;
        if exefs_len < EXEFS_HEADER_LEN as u64 {
            return Ok(None);
        }
        let raw = self.read_up_to(exefs_off, EXEFS_HEADER_LEN)?;
        let Some(entry) = parse_exefs_header(&raw).into_iter().find(|e| e.name == name) else {
            return Ok(None);
        };
        let start = exefs_off + EXEFS_HEADER_LEN as u64 + entry.offset as u64;
        let data = self.read_up_to(start, entry.size as usize)?;
        Ok((data.len() == entry.size as usize).then_some(data))
    }

    fn key_for(&self, slot: KeySlot) -> Option<&[u8; 16]> {
        match slot {
            KeySlot::Primary => self.primary.as_ref(),
            KeySlot::Secondary => self.secondary.as_ref(),
        }
    }

    /// Read `buf.len()` bytes at NCCH offset `pos`, which all lie in one
    /// region (or in plain space when `region` is `None`).
    fn read_span(
        &mut self,
        pos: u64,
        region: Option<CryptRegion>,
        buf: &mut [u8],
    ) -> Result<usize, RomError> {
        let key = match region {
            Some(r) => match self.key_for(r.slot) {
                Some(k) => Some((*k, r)),
                None => return Ok(0),
            },
            None => None,
        };
        let parent = self.parent.as_mut().ok_or(RomError::NotOpen)?;
        let got = parent.read_up_to(self.base + pos, buf.len())?;
        buf[..got.len()].copy_from_slice(&got);

        if let Some((key, r)) = key {
            let crypt_err = |e: CryptoError| RomError::Encryption(EncryptionStatus::from(&e));
            let ctr = section_counter(&self.header, r.section, r.section_start);
            AesCipher::new(&key)
                .map_err(crypt_err)?
                .with_mode(ChainingMode::Ctr)
                .with_iv(ctr)
                .ctr_apply_at(pos - r.section_start, &mut buf[..got.len()])
                .map_err(crypt_err)?;
        }
        Ok(got.len())
    }
}

impl ByteStream for NcchReader {
    fn is_open(&self) -> bool {
        self.parent.as_ref().is_some_and(|p| p.is_open())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, RomError> {
        if self.parent.is_none() {
            return Err(RomError::NotOpen);
        }
        let want = clamp_read(self.pos, buf.len(), self.len);
        let mut done = 0;
        while done < want {
            let pos = self.pos;
            let region = self
                .regions
                .iter()
                .find(|r| r.start <= pos && pos < r.end())
                .copied();
            let span_end = match region {
                Some(r) => r.end(),
                None => self
                    .regions
                    .iter()
                    .map(|r| r.start)
                    .filter(|&s| s > pos)
                    .min()
                    .unwrap_or(u64::MAX),
            };
            let n = ((span_end - pos).min((want - done) as u64)) as usize;
            let got = self.read_span(pos, region, &mut buf[done..done + n])?;
            done += got;
            self.pos += got as u64;
            if got < n {
                break;
            }
        }
        Ok(done)
    }

    fn seek(&mut self, pos: u64) -> Result<(), RomError> {
        if self.parent.is_none() {
            return Err(RomError::NotOpen);
        }
        self.pos = pos;
        Ok(())
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> u64 {
        self.len
    }

    fn close(&mut self) {
        self.parent = None;
    }

    fn dup(&self) -> Result<Box<dyn ByteStream>, RomError> {
        let parent = self.parent.as_ref().ok_or(RomError::NotOpen)?.dup()?;
        Ok(Box::new(Self {
            parent: Some(parent),
            base: self.base,
            header: self.header.clone(),
            len: self.len,
            regions: self.regions.clone(),
            primary: self.primary,
            secondary: self.secondary,
            status: self.status,
            pos: 0,
        }))
    }
}

impl PartitionStream for NcchReader {
    fn region_size(&self) -> u64 {
        self.len
    }

    fn used_region_size(&self) -> u64 {
        let available = self
            .parent
            .as_ref()
            .map_or(0, |p| p.size().saturating_sub(self.base));
        available.min(self.len)
    }

    fn encryption_status(&self) -> EncryptionStatus {
        self.status
    }
}

#[cfg(test)]
#[path = "tests/ncch_tests.rs"]
pub(crate) mod tests;
