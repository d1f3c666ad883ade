//! Encrypted Wii disc partitions.
//!
//! A partition starts with a ticket, the TMD and certificate chain, then a
//! data area of 0x8000-byte clusters. Each cluster holds a 0x400-byte hash
//! block and 0x7C00 bytes of AES-128-CBC encrypted data; the IV for the
//! data is stored (still encrypted) at 0x3D0 in the hash block, so any
//! cluster can be decrypted on its own.
//!
//! The title key in the ticket is itself encrypted with one of the common
//! keys, using the title ID as IV.

use romscope_core::bytes::read_u32_be;
use romscope_core::stream::clamp_read;
use romscope_core::util::read_ascii;
use romscope_core::{ByteStream, EncryptionStatus, KeyStore, PartitionStream, RomError};
use romscope_crypto::{AesCipher, BLOCK_SIZE, ChainingMode, CryptoError, KeySpec};

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

pub(crate) const CLUSTER_LEN: u64 = 0x8000;
pub(crate) const CLUSTER_HASH_LEN: usize = 0x400;
pub(crate) const CLUSTER_DATA_LEN: u64 = 0x7C00;
const OFF_CLUSTER_IV: usize = 0x3D0;

/// RSA-2048 signature type, the only one used for Wii tickets.
pub(crate) const SIG_RSA2048: u32 = 0x0001_0001;

const OFF_TICKET_ISSUER: usize = 0x140;
pub(crate) const OFF_TICKET_TITLE_KEY: usize = 0x1BF;
pub(crate) const OFF_TICKET_TITLE_ID: usize = 0x1DC;
pub(crate) const OFF_TICKET_KEY_INDEX: usize = 0x1F1;
const OFF_TMD_SIZE: usize = 0x2A4;
pub(crate) const OFF_DATA_OFFSET: usize = 0x2B8;
pub(crate) const OFF_DATA_SIZE: usize = 0x2BC;
pub(crate) const PARTITION_HEADER_LEN: usize = 0x2C0;

/// Tickets signed by this CA come from development hardware.
const DEBUG_ISSUER: &str = "Root-CA00000002";

const KEY_RETAIL: KeySpec = KeySpec::new("rvl-common");
const KEY_KOREAN: KeySpec = KeySpec::new("rvl-korean");
const KEY_VWII: KeySpec = KeySpec::new("wup-vwii-common");
const KEY_DEBUG: KeySpec = KeySpec::new("rvt-debug");

// ---------------------------------------------------------------------------
// Common key selection
// ---------------------------------------------------------------------------

/// Which common key encrypts a partition's title key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommonKey {
    Retail,
    Korean,
    VWii,
    Debug,
    Unknown(u8),
}

impl CommonKey {
    fn from_ticket(index: u8, issuer: &str) -> Self {
        match index {
            0 if issuer.starts_with(DEBUG_ISSUER) => Self::Debug,
            0 => Self::Retail,
            1 => Self::Korean,
            2 => Self::VWii,
            n => Self::Unknown(n),
        }
    }

    fn spec(self) -> Option<KeySpec> {
        match self {
            Self::Retail => Some(KEY_RETAIL),
            Self::Korean => Some(KEY_KOREAN),
            Self::VWii => Some(KEY_VWII),
            Self::Debug => Some(KEY_DEBUG),
            Self::Unknown(_) => None,
        }
    }

    pub fn name(self) -> String {
        match self {
            Self::Retail => "Retail".to_string(),
            Self::Korean => "Korean".to_string(),
            Self::VWii => "vWii".to_string(),
            Self::Debug => "Debug".to_string(),
            Self::Unknown(n) => format!("Unknown ({n})"),
        }
    }
}

/// Decrypt the ticket's title key and build the data cipher.
fn title_cipher(
    keys: &KeyStore,
    common_key: CommonKey,
    encrypted_key: &[u8],
    title_id: &[u8; 8],
) -> Result<AesCipher, EncryptionStatus> {
    let spec = common_key.spec().ok_or(EncryptionStatus::UnknownKeyIndex)?;
    let common = keys.get_128(&spec).map_err(|e| EncryptionStatus::from(&e))?;

    let mut iv = [0u8; BLOCK_SIZE];
    iv[..8].copy_from_slice(title_id);
    let mut title_key = [0u8; BLOCK_SIZE];
    title_key.copy_from_slice(encrypted_key);
    AesCipher::new(&common)
        .map_err(|e| EncryptionStatus::from(&e))?
        .with_mode(ChainingMode::Cbc)
        .with_iv(iv)
        .decrypt(&mut title_key)
        .map_err(|e| EncryptionStatus::from(&e))?;

    AesCipher::new(&title_key)
        .map(|c| c.with_mode(ChainingMode::Cbc))
        .map_err(|e| EncryptionStatus::from(&e))
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Decrypted view of one Wii partition's data area. Position 0 is the
/// partition's copy of the disc header.
pub struct WiiPartition {
    parent: Option<Box<dyn ByteStream>>,
    /// Absolute offset of the first data cluster.
    data_start: u64,
    /// Encrypted size of the data area.
    data_size: u64,
    title_id: [u8; 8],
    common_key: CommonKey,
    tmd_size: u32,
    status: EncryptionStatus,
    cipher: Option<AesCipher>,
    pos: u64,
    /// Most recently decrypted cluster.
    cached: Option<(u64, Vec<u8>)>,
}

impl WiiPartition {
    /// Open the partition at absolute offset `base` of `parent`.
    ///
    /// A malformed partition header is an error. A missing or bad key is
    /// not: the reader opens, reports it through
    /// [`encryption_status`](PartitionStream::encryption_status), and
    /// every read returns 0 bytes.
    pub fn open(
        mut parent: Box<dyn ByteStream>,
        base: u64,
        keys: &KeyStore,
    ) -> Result<Self, RomError> {
        if !parent.is_open() {
            return Err(RomError::NotOpen);
        }
        let mut hdr = [0u8; PARTITION_HEADER_LEN];
        parent.read_exact_at(base, &mut hdr)?;

        let sig_type = read_u32_be(&hdr, 0);
        if sig_type != SIG_RSA2048 {
            return Err(RomError::invalid_format(format!(
                "unexpected ticket signature type 0x{sig_type:08X}"
            )));
        }
        let data_offset = (read_u32_be(&hdr, OFF_DATA_OFFSET) as u64) << 2;
        let data_size = (read_u32_be(&hdr, OFF_DATA_SIZE) as u64) << 2;
        if data_offset < PARTITION_HEADER_LEN as u64 {
            return Err(RomError::corrupted_header(format!(
                "partition data offset 0x{data_offset:X} overlaps the header"
            )));
        }

        let mut title_id = [0u8; 8];
        title_id.copy_from_slice(&hdr[OFF_TICKET_TITLE_ID..OFF_TICKET_TITLE_ID + 8]);
        let issuer = read_ascii(&hdr[OFF_TICKET_ISSUER..OFF_TICKET_ISSUER + 0x40]);
        let common_key = CommonKey::from_ticket(hdr[OFF_TICKET_KEY_INDEX], &issuer);

        let encrypted_key = &hdr[OFF_TICKET_TITLE_KEY..OFF_TICKET_TITLE_KEY + BLOCK_SIZE];
        let (status, cipher) = match title_cipher(keys, common_key, encrypted_key, &title_id) {
            Ok(cipher) => (EncryptionStatus::Ok, Some(cipher)),
            Err(status) => {
                log::debug!(
                    "Wii partition at 0x{base:X}: {} ({} key)",
                    status,
                    common_key.name()
                );
                (status, None)
            }
        };

        Ok(Self {
            parent: Some(parent),
            data_start: base + data_offset,
            data_size,
            title_id,
            common_key,
            tmd_size: read_u32_be(&hdr, OFF_TMD_SIZE),
            status,
            cipher,
            pos: 0,
            cached: None,
        })
    }

    pub fn title_id(&self) -> [u8; 8] {
        self.title_id
    }

    pub fn common_key(&self) -> CommonKey {
        self.common_key
    }

    pub fn tmd_size(&self) -> u32 {
        self.tmd_size
    }

    /// Decrypted cluster `idx`, or `None` if the parent ends before it.
    fn cluster(&mut self, idx: u64) -> Result<Option<&[u8]>, RomError> {
        if !matches!(&self.cached, Some((i, _)) if *i == idx) {
            let parent = self.parent.as_mut().ok_or(RomError::NotOpen)?;
            let cipher = self
                .cipher
                .as_mut()
                .ok_or(RomError::Encryption(self.status))?;
            let raw = parent.read_up_to(self.data_start + idx * CLUSTER_LEN, CLUSTER_LEN as usize)?;
            if raw.len() < CLUSTER_LEN as usize {
                return Ok(None);
            }
            let crypt_err = |e: CryptoError| RomError::Encryption(EncryptionStatus::from(&e));
            cipher
                .set_iv(&raw[OFF_CLUSTER_IV..OFF_CLUSTER_IV + BLOCK_SIZE])
                .map_err(crypt_err)?;
            let mut data = raw[CLUSTER_HASH_LEN..].to_vec();
            cipher.decrypt(&mut data).map_err(crypt_err)?;
            self.cached = Some((idx, data));
        }
        Ok(self.cached.as_ref().map(|(_, d)| d.as_slice()))
    }
}

impl ByteStream for WiiPartition {
    fn is_open(&self) -> bool {
        self.parent.as_ref().is_some_and(|p| p.is_open())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, RomError> {
        if self.parent.is_none() {
            return Err(RomError::NotOpen);
        }
        if self.cipher.is_none() {
            return Ok(0);
        }
        let want = clamp_read(self.pos, buf.len(), self.size());
        let mut done = 0;
        while done < want {
            let idx = self.pos / CLUSTER_DATA_LEN;
            let within = (self.pos % CLUSTER_DATA_LEN) as usize;
            let Some(data) = self.cluster(idx)? else {
                break;
            };
            let n = (want - done).min(data.len() - within);
            buf[done..done + n].copy_from_slice(&data[within..within + n]);
            done += n;
            self.pos += n as u64;
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
        self.data_size / CLUSTER_LEN * CLUSTER_DATA_LEN
    }

    fn close(&mut self) {
        self.parent = None;
        self.cached = None;
    }

    fn dup(&self) -> Result<Box<dyn ByteStream>, RomError> {
        let parent = self.parent.as_ref().ok_or(RomError::NotOpen)?.dup()?;
        Ok(Box::new(Self {
            parent: Some(parent),
            data_start: self.data_start,
            data_size: self.data_size,
            title_id: self.title_id,
            common_key: self.common_key,
            tmd_size: self.tmd_size,
            status: self.status,
            cipher: self.cipher.clone(),
            pos: 0,
            cached: None,
        }))
    }
}

impl PartitionStream for WiiPartition {
    fn region_size(&self) -> u64 {
        self.data_size
    }

    /// Encrypted bytes of the data area actually present in the image.
    fn used_region_size(&self) -> u64 {
        let available = self
            .parent
            .as_ref()
            .map_or(0, |p| p.size().saturating_sub(self.data_start));
        available.min(self.data_size)
    }

    fn encryption_status(&self) -> EncryptionStatus {
        self.status
    }
}

#[cfg(test)]
#[path = "tests/wii_partition_tests.rs"]
pub(crate) mod tests;
