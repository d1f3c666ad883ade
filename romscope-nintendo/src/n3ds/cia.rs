//! CIA: installable 3DS title archives.
//!
//! A 0x2020-byte header (section sizes plus a content index bitmap) is
//! followed by the certificate chain, ticket, TMD, contents and an optional
//! meta block, each section aligned to 64 bytes. Contents flagged as
//! encrypted in the TMD are AES-128-CBC encrypted with the title key; the
//! title key is itself CBC-encrypted in the ticket under one of six common
//! keys.

use romscope_core::bytes::{
    align_up, read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le,
};
use romscope_core::stream::clamp_read;
use romscope_core::util::format_bytes;
use romscope_core::{
    ByteStream, EncryptionStatus, FieldList, KeyStore, PartitionStream, RomError,
};
use romscope_crypto::{AesCipher, BLOCK_SIZE, ChainingMode, CryptoError, KeySpec};

use super::common::{format_title_id, format_version, signature_block_size};
use super::smdh::{SMDH_LEN, Smdh};

pub(crate) const CIA_HEADER_LEN: usize = 0x2020;
const OFF_CONTENT_INDEX: usize = 0x20;
const SECTION_ALIGN: u64 = 64;

/// The meta block starts with dependency and version data; the SMDH follows.
const META_SMDH_OFFSET: u64 = 0x400;

const TICKET_TITLE_KEY: usize = 0x7F;
const TICKET_TITLE_ID: usize = 0x9C;
const TICKET_KEY_INDEX: usize = 0xB1;

const TMD_TITLE_ID: usize = 0x4C;
const TMD_VERSION: usize = 0x9C;
const TMD_CONTENT_COUNT: usize = 0x9E;
const TMD_CHUNKS: usize = 0x9C4;
const CHUNK_LEN: usize = 0x30;

const CONTENT_ENCRYPTED: u16 = 0x0001;
const CONTENT_OPTIONAL: u16 = 0x4000;

const COMMON_KEYS: [KeySpec; 6] = [
    KeySpec::new("ctr-Slot0x3DKeyNormal-0"),
    KeySpec::new("ctr-Slot0x3DKeyNormal-1"),
    KeySpec::new("ctr-Slot0x3DKeyNormal-2"),
    KeySpec::new("ctr-Slot0x3DKeyNormal-3"),
    KeySpec::new("ctr-Slot0x3DKeyNormal-4"),
    KeySpec::new("ctr-Slot0x3DKeyNormal-5"),
];

/// Section sizes stored as `u32` always align without overflow.
fn align64(value: u32) -> u64 {
    (value as u64).next_multiple_of(SECTION_ALIGN)
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub(crate) struct CiaHeader {
    pub(crate) cert_chain_size: u32,
    pub(crate) ticket_size: u32,
    pub(crate) tmd_size: u32,
    pub(crate) meta_size: u32,
    pub(crate) content_size: u64,
    content_index: Vec<u8>,
}

/// Cheap check on the first 0x20 bytes.
pub(crate) fn looks_like_cia(header: &[u8]) -> bool {
    header.len() >= OFF_CONTENT_INDEX
        && read_u32_le(header, 0) == CIA_HEADER_LEN as u32
        && read_u16_le(header, 4) == 0
        && read_u32_le(header, 0x08) != 0
        && read_u32_le(header, 0x0C) != 0
        && read_u32_le(header, 0x10) != 0
}

impl CiaHeader {
    pub(crate) fn parse(buf: &[u8]) -> Result<Self, RomError> {
        if buf.len() < CIA_HEADER_LEN {
            return Err(RomError::truncated(CIA_HEADER_LEN as u64, buf.len() as u64));
        }
        let header_size = read_u32_le(buf, 0);
        if header_size as usize != CIA_HEADER_LEN {
            return Err(RomError::invalid_format(format!(
                "unexpected CIA header size 0x{header_size:X}"
            )));
        }
        Ok(Self {
            cert_chain_size: read_u32_le(buf, 0x08),
            ticket_size: read_u32_le(buf, 0x0C),
            tmd_size: read_u32_le(buf, 0x10),
            meta_size: read_u32_le(buf, 0x14),
            content_size: read_u64_le(buf, 0x18),
            content_index: buf[OFF_CONTENT_INDEX..CIA_HEADER_LEN].to_vec(),
        })
    }

    pub(crate) fn ticket_offset(&self) -> u64 {
        align64(CIA_HEADER_LEN as u32) + align64(self.cert_chain_size)
    }

    pub(crate) fn tmd_offset(&self) -> u64 {
        self.ticket_offset() + align64(self.ticket_size)
    }

    pub(crate) fn content_offset(&self) -> u64 {
        self.tmd_offset() + align64(self.tmd_size)
    }

    /// `None` when the header's content size pushes the meta block past
    /// the addressable range.
    pub(crate) fn meta_offset(&self) -> Option<u64> {
        self.content_offset()
            .checked_add(align_up(self.content_size, SECTION_ALIGN)?)
    }

    /// Whether content `index` is included, per the header bitmap.
    pub(crate) fn has_content(&self, index: u16) -> bool {
        let i = index as usize;
        self.content_index
            .get(i / 8)
            .is_some_and(|b| b & (0x80 >> (i % 8)) != 0)
    }
}

// ---------------------------------------------------------------------------
// Ticket and TMD
// ---------------------------------------------------------------------------

/// Ticket body behind the largest signature block, with room for the
/// certificate chain some dumps append.
const MAX_TICKET_LEN: u32 = 0x240 + 0x210 + 0x1000;
/// Largest signature block plus a TMD with the maximum 0x10000 chunks.
const MAX_TMD_LEN: u32 = 0x240 + TMD_CHUNKS as u32 + CHUNK_LEN as u32 * 0x10000;

/// A ticket or TMD size from the header, checked before anything is
/// allocated for it.
fn checked_section_len(
    what: &str,
    len: u32,
    max: u32,
    stream_size: u64,
) -> Result<usize, RomError> {
    if len > max || len as u64 > stream_size {
        return Err(RomError::corrupted_header(format!(
            "CIA {what} size 0x{len:X} is out of range"
        )));
    }
    Ok(len as usize)
}

/// Offset of the body that follows a ticket's or TMD's signature block.
fn signed_body(raw: &[u8], what: &str) -> Result<usize, RomError> {
    if raw.len() < 4 {
        return Err(RomError::truncated(4, raw.len() as u64));
    }
    let sig_type = read_u32_be(raw, 0);
    signature_block_size(sig_type).ok_or_else(|| {
        RomError::invalid_format(format!("unknown {what} signature type 0x{sig_type:08X}"))
    })
}

#[derive(Debug, Clone)]
pub(crate) struct Ticket {
    pub(crate) encrypted_title_key: [u8; 16],
    pub(crate) title_id: u64,
    pub(crate) common_key_index: u8,
}

impl Ticket {
    pub(crate) fn parse(raw: &[u8]) -> Result<Self, RomError> {
        let body = signed_body(raw, "ticket")?;
        let need = body + TICKET_KEY_INDEX + 1;
        if raw.len() < need {
            return Err(RomError::truncated(need as u64, raw.len() as u64));
        }
        let mut encrypted_title_key = [0u8; 16];
        encrypted_title_key
            .copy_from_slice(&raw[body + TICKET_TITLE_KEY..body + TICKET_TITLE_KEY + 16]);
        Ok(Self {
            encrypted_title_key,
            title_id: read_u64_be(raw, body + TICKET_TITLE_ID),
            common_key_index: raw[body + TICKET_KEY_INDEX],
        })
    }

    pub(crate) fn common_key_name(&self) -> String {
        match self.common_key_index {
            0 => "eShop".to_string(),
            1 => "System".to_string(),
            n => format!("Unknown ({n})"),
        }
    }

    /// Decrypt the title key with the common key. The IV is the title ID
    /// followed by zeros.
    pub(crate) fn title_key(&self, keys: &KeyStore) -> Result<[u8; 16], EncryptionStatus> {
        let spec = COMMON_KEYS
            .get(self.common_key_index as usize)
            .ok_or(EncryptionStatus::UnknownKeyIndex)?;
        let common = keys.get_128(spec).map_err(|e| EncryptionStatus::from(&e))?;
        let mut iv = [0u8; BLOCK_SIZE];
        iv[..8].copy_from_slice(&self.title_id.to_be_bytes());
        let mut key = self.encrypted_title_key;
        AesCipher::new(&common)
            .map_err(|e| EncryptionStatus::from(&e))?
            .with_mode(ChainingMode::Cbc)
            .with_iv(iv)
            .decrypt(&mut key)
            .map_err(|e| EncryptionStatus::from(&e))?;
        Ok(key)
    }
}

/// One TMD content chunk record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ContentChunk {
    pub(crate) id: u32,
    pub(crate) index: u16,
    pub(crate) kind: u16,
    pub(crate) size: u64,
}

impl ContentChunk {
    pub(crate) fn is_encrypted(&self) -> bool {
        self.kind & CONTENT_ENCRYPTED != 0
    }

    fn describe(&self) -> &'static str {
        match (self.is_encrypted(), self.kind & CONTENT_OPTIONAL != 0) {
            (true, true) => "Encrypted, optional",
            (true, false) => "Encrypted",
            (false, true) => "Optional",
            (false, false) => "Plain",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Tmd {
    pub(crate) title_id: u64,
    pub(crate) version: u16,
    pub(crate) chunks: Vec<ContentChunk>,
}

impl Tmd {
    pub(crate) fn parse(raw: &[u8]) -> Result<Self, RomError> {
        let body = signed_body(raw, "TMD")?;
        if raw.len() < body + TMD_CHUNKS {
            return Err(RomError::truncated((body + TMD_CHUNKS) as u64, raw.len() as u64));
        }
        let count = read_u16_be(raw, body + TMD_CONTENT_COUNT) as usize;
        let chunks: Vec<ContentChunk> = raw[body + TMD_CHUNKS..]
            .chunks_exact(CHUNK_LEN)
            .take(count)
            .map(|c| ContentChunk {
                id: read_u32_be(c, 0),
                index: read_u16_be(c, 4),
                kind: read_u16_be(c, 6),
                size: read_u64_be(c, 8),
            })
            .collect();
        if chunks.len() < count {
            log::debug!("TMD lists {count} contents but holds {}", chunks.len());
        }
        Ok(Self {
            title_id: read_u64_be(raw, body + TMD_TITLE_ID),
            version: read_u16_be(raw, body + TMD_VERSION),
            chunks,
        })
    }
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

/// A CIA's metadata sections, plus the title key if it could be obtained.
#[derive(Debug, Clone)]
pub(crate) struct Cia {
    pub(crate) header: CiaHeader,
    pub(crate) ticket: Ticket,
    pub(crate) tmd: Tmd,
    title_key: Result<[u8; 16], EncryptionStatus>,
}

impl Cia {
    pub(crate) fn read(stream: &mut dyn ByteStream, keys: &KeyStore) -> Result<Self, RomError> {
        let raw = stream.read_vec_at(0, CIA_HEADER_LEN)?;
        let header = CiaHeader::parse(&raw)?;
        let size = stream.size();
        let ticket_len =
            checked_section_len("ticket", header.ticket_size, MAX_TICKET_LEN, size)?;
        let raw = stream.read_vec_at(header.ticket_offset(), ticket_len)?;
        let ticket = Ticket::parse(&raw)?;
        let tmd_len = checked_section_len("TMD", header.tmd_size, MAX_TMD_LEN, size)?;
        let raw = stream.read_vec_at(header.tmd_offset(), tmd_len)?;
        let tmd = Tmd::parse(&raw)?;

        let needs_key = tmd.chunks.iter().any(ContentChunk::is_encrypted);
        let title_key = if needs_key {
            ticket.title_key(keys)
        } else {
            Ok([0u8; 16])
        };
        if let Err(status) = &title_key {
            log::debug!(
                "CIA {}: {status} ({} common key)",
                format_title_id(tmd.title_id),
                ticket.common_key_name()
            );
        }
        Ok(Self {
            header,
            ticket,
            tmd,
            title_key,
        })
    }

    /// Present contents with their absolute offsets, in TMD order.
    pub(crate) fn contents(&self) -> Vec<(u64, &ContentChunk)> {
        let mut offset = self.header.content_offset();
        let mut out = Vec::new();
        for chunk in &self.tmd.chunks {
            if !self.header.has_content(chunk.index) {
                continue;
            }
            let Some(next) = offset.checked_add(chunk.size) else {
                log::warn!("CIA content {} size 0x{:X} overflows", chunk.index, chunk.size);
                break;
            };
            out.push((offset, chunk));
            offset = next;
        }
        out
    }

    pub(crate) fn encryption_status(&self) -> EncryptionStatus {
        match &self.title_key {
            Ok(_) => EncryptionStatus::Ok,
            Err(status) => *status,
        }
    }

    /// A reader over the `n`th present content.
    pub(crate) fn open_content(
        &self,
        parent: Box<dyn ByteStream>,
        n: usize,
    ) -> Result<CiaContentReader, RomError> {
        let contents = self.contents();
        let &(offset, chunk) = contents
            .get(n)
            .ok_or_else(|| RomError::other(format!("CIA has no content #{n}")))?;
        let (cipher, status) = if !chunk.is_encrypted() {
            (None, EncryptionStatus::Ok)
        } else {
            match &self.title_key {
                Ok(key) => {
                    let cipher = AesCipher::new(key)
                        .map_err(|e| RomError::Encryption(EncryptionStatus::from(&e)))?
                        .with_mode(ChainingMode::Cbc);
                    (Some(cipher), EncryptionStatus::Ok)
                }
                Err(status) => (None, *status),
            }
        };
        Ok(CiaContentReader {
            parent: Some(parent),
            base: offset,
            len: chunk.size,
            index: chunk.index,
            encrypted: chunk.is_encrypted(),
            cipher,
            status,
            pos: 0,
        })
    }

    /// The SMDH inside the meta block, if the CIA has one.
    pub(crate) fn meta_smdh(&self, stream: &mut dyn ByteStream) -> Result<Option<Smdh>, RomError> {
        if (self.header.meta_size as u64) < META_SMDH_OFFSET + SMDH_LEN as u64 {
            return Ok(None);
        }
        let Some(pos) = self
            .header
            .meta_offset()
            .and_then(|off| off.checked_add(META_SMDH_OFFSET))
        else {
            return Ok(None);
        };
        let raw = stream.read_up_to(pos, SMDH_LEN)?;
        Ok(Smdh::parse(raw).ok())
    }

    pub(crate) fn add_fields(&self, fields: &mut FieldList) {
        fields.add_string("Title ID", format_title_id(self.tmd.title_id));
        fields.add_string("Title version", format_version(self.tmd.version));
        if self.ticket.title_id != self.tmd.title_id && self.ticket.title_id != 0 {
            fields.add_string("Ticket title ID", format_title_id(self.ticket.title_id));
        }
        fields.add_string("Common key", self.ticket.common_key_name());
        fields.add_string("Content size", format_bytes(self.header.content_size));
        let rows = self
            .contents()
            .into_iter()
            .map(|(_, c)| {
                vec![
                    c.index.to_string(),
                    format!("{:08X}", c.id),
                    c.describe().to_string(),
                    format_bytes(c.size),
                ]
            })
            .collect();
        fields.add_table("Contents", &["#", "ID", "Type", "Size"], rows);
    }
}

// ---------------------------------------------------------------------------
// Content reader
// ---------------------------------------------------------------------------

/// Decrypted view of one CIA content.
///
/// CBC decryption of any block only needs the preceding ciphertext block as
/// IV, so reads can start anywhere. The first block's IV is the content
/// index followed by zeros.
pub struct CiaContentReader {
    parent: Option<Box<dyn ByteStream>>,
    base: u64,
    len: u64,
    index: u16,
    encrypted: bool,
    cipher: Option<AesCipher>,
    status: EncryptionStatus,
    pos: u64,
}

impl CiaContentReader {
    fn iv_at(&mut self, block_start: u64) -> Result<Option<[u8; BLOCK_SIZE]>, RomError> {
        let mut iv = [0u8; BLOCK_SIZE];
        if block_start == 0 {
            iv[..2].copy_from_slice(&self.index.to_be_bytes());
            return Ok(Some(iv));
        }
        let parent = self.parent.as_mut().ok_or(RomError::NotOpen)?;
        let prev = parent.read_up_to(self.base + block_start - BLOCK_SIZE as u64, BLOCK_SIZE)?;
        if prev.len() < BLOCK_SIZE {
            return Ok(None);
        }
        iv.copy_from_slice(&prev);
        Ok(Some(iv))
    }
}

impl ByteStream for CiaContentReader {
    fn is_open(&self) -> bool {
        self.parent.as_ref().is_some_and(|p| p.is_open())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, RomError> {
        let want = clamp_read(self.pos, buf.len(), self.len);
        let parent = self.parent.as_mut().ok_or(RomError::NotOpen)?;
        if want == 0 {
            return Ok(0);
        }
        if !self.encrypted {
            let got = parent.read_up_to(self.base + self.pos, want)?;
            buf[..got.len()].copy_from_slice(&got);
            self.pos += got.len() as u64;
            return Ok(got.len());
        }
        let Some(cipher) = self.cipher.clone() else {
            return Ok(0);
        };

        let block_start = self.pos & !(BLOCK_SIZE as u64 - 1);
        let Some(block_end) = align_up(self.pos + want as u64, BLOCK_SIZE as u64) else {
            return Ok(0);
        };
        let Some(iv) = self.iv_at(block_start)? else {
            return Ok(0);
        };
        let parent = self.parent.as_mut().ok_or(RomError::NotOpen)?;
        let mut data =
            parent.read_up_to(self.base + block_start, (block_end - block_start) as usize)?;
        data.truncate(data.len() / BLOCK_SIZE * BLOCK_SIZE);
        let crypt_err = |e: CryptoError| RomError::Encryption(EncryptionStatus::from(&e));
        cipher.with_iv(iv).decrypt(&mut data).map_err(crypt_err)?;

        let skip = (self.pos - block_start) as usize;
        let n = data.len().saturating_sub(skip).min(want);
        buf[..n].copy_from_slice(&data[skip..skip + n]);
        self.pos += n as u64;
        Ok(n)
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
            len: self.len,
            index: self.index,
            encrypted: self.encrypted,
            cipher: self.cipher.clone(),
            status: self.status,
            pos: 0,
        }))
    }
}

impl PartitionStream for CiaContentReader {
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
#[path = "tests/cia_tests.rs"]
pub(crate) mod tests;
