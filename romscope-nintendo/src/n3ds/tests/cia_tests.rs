use super::*;
use crate::n3ds::ncch::NcchReader;
use crate::n3ds::ncch::tests::{Crypto, NCCH_LEN, PROGRAM_ID, build_ncch_pair};
use crate::n3ds::smdh::tests::build_smdh;
use romscope_core::MemStream;

const COMMON_KEY: [u8; 16] = [0x3D; 16];
const TITLE_KEY: [u8; 16] = [0x77; 16];
const CERT_CHAIN_LEN: usize = 0xA00;
const SIG_BLOCK: usize = 0x140;
const TICKET_LEN: usize = 0x350;
const MANUAL_LEN: usize = 0x400;

pub(crate) fn test_keys() -> KeyStore {
    KeyStore::from_config_text(
        "[Keys]\nctr-Slot0x3DKeyNormal-0=3D3D3D3D3D3D3D3D3D3D3D3D3D3D3D3D\n",
    )
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct CiaSpec {
    pub(crate) encrypted: bool,
    pub(crate) meta: bool,
    pub(crate) key_index: u8,
}

impl Default for CiaSpec {
    fn default() -> Self {
        Self {
            encrypted: true,
            meta: true,
            key_index: 0,
        }
    }
}

fn pad64(buf: &mut Vec<u8>) {
    buf.resize(buf.len().next_multiple_of(64), 0);
}

fn cbc_encrypt(key: &[u8; 16], iv: [u8; 16], buf: &mut [u8]) {
    AesCipher::new(key)
        .unwrap()
        .with_mode(ChainingMode::Cbc)
        .with_iv(iv)
        .encrypt(buf)
        .unwrap();
}

/// A CIA holding a NoCrypto NCCH as content 0 and a plain optional
/// content 1, with version v1.2.3 and an SMDH in the meta block.
pub(crate) fn build_cia(spec: CiaSpec) -> Vec<u8> {
    let ncch = build_ncch_pair(Crypto::None).1;
    let manual: Vec<u8> = (0..MANUAL_LEN).map(|i| (i % 7) as u8).collect();
    let tmd_len = SIG_BLOCK + TMD_CHUNKS + 2 * CHUNK_LEN;
    let meta_len = if spec.meta { 0x400 + SMDH_LEN } else { 0 };

    let mut cia = vec![0u8; CIA_HEADER_LEN];
    cia[..4].copy_from_slice(&(CIA_HEADER_LEN as u32).to_le_bytes());
    cia[0x08..0x0C].copy_from_slice(&(CERT_CHAIN_LEN as u32).to_le_bytes());
    cia[0x0C..0x10].copy_from_slice(&(TICKET_LEN as u32).to_le_bytes());
    cia[0x10..0x14].copy_from_slice(&(tmd_len as u32).to_le_bytes());
    cia[0x14..0x18].copy_from_slice(&(meta_len as u32).to_le_bytes());
    cia[0x18..0x20].copy_from_slice(&((NCCH_LEN + MANUAL_LEN) as u64).to_le_bytes());
    cia[OFF_CONTENT_INDEX] = 0xC0;
    pad64(&mut cia);

    cia.resize(cia.len() + CERT_CHAIN_LEN, 0xCC);
    pad64(&mut cia);

    let mut ticket = vec![0u8; TICKET_LEN];
    ticket[..4].copy_from_slice(&0x0001_0004u32.to_be_bytes());
    let mut title_key = TITLE_KEY;
    let mut iv = [0u8; 16];
    iv[..8].copy_from_slice(&PROGRAM_ID.to_be_bytes());
    cbc_encrypt(&COMMON_KEY, iv, &mut title_key);
    let t = SIG_BLOCK;
    ticket[t + TICKET_TITLE_KEY..t + TICKET_TITLE_KEY + 16].copy_from_slice(&title_key);
    ticket[t + TICKET_TITLE_ID..t + TICKET_TITLE_ID + 8].copy_from_slice(&PROGRAM_ID.to_be_bytes());
    ticket[t + TICKET_KEY_INDEX] = spec.key_index;
    cia.extend_from_slice(&ticket);
    pad64(&mut cia);

    let mut tmd = vec![0u8; tmd_len];
    tmd[..4].copy_from_slice(&0x0001_0004u32.to_be_bytes());
    let b = SIG_BLOCK;
    tmd[b + TMD_TITLE_ID..b + TMD_TITLE_ID + 8].copy_from_slice(&PROGRAM_ID.to_be_bytes());
    let version: u16 = (1 << 10) | (2 << 4) | 3;
    tmd[b + TMD_VERSION..b + TMD_VERSION + 2].copy_from_slice(&version.to_be_bytes());
    tmd[b + TMD_CONTENT_COUNT..b + TMD_CONTENT_COUNT + 2].copy_from_slice(&2u16.to_be_bytes());
    let chunks = [
        (0u32, 0u16, if spec.encrypted { CONTENT_ENCRYPTED } else { 0 }, NCCH_LEN),
        (1, 1, CONTENT_OPTIONAL, MANUAL_LEN),
    ];
    for (i, &(id, index, kind, size)) in chunks.iter().enumerate() {
        let c = b + TMD_CHUNKS + i * CHUNK_LEN;
        tmd[c..c + 4].copy_from_slice(&id.to_be_bytes());
        tmd[c + 4..c + 6].copy_from_slice(&index.to_be_bytes());
        tmd[c + 6..c + 8].copy_from_slice(&kind.to_be_bytes());
        tmd[c + 8..c + 16].copy_from_slice(&(size as u64).to_be_bytes());
    }
    cia.extend_from_slice(&tmd);
    pad64(&mut cia);

    let mut content = ncch;
    if spec.encrypted {
        cbc_encrypt(&TITLE_KEY, [0u8; 16], &mut content);
    }
    cia.extend_from_slice(&content);
    cia.extend_from_slice(&manual);
    pad64(&mut cia);

    if spec.meta {
        let mut meta = vec![0u8; 0x400];
        meta.extend_from_slice(&build_smdh(&[(1, "Zelda", "Ocarina of Time 3D", "Nintendo")]));
        cia.extend_from_slice(&meta);
    }
    cia
}

fn stream(data: Vec<u8>) -> Box<dyn ByteStream> {
    Box::new(MemStream::new(data))
}

fn read_cia(spec: CiaSpec, keys: &KeyStore) -> (Cia, Box<dyn ByteStream>) {
    let mut s = stream(build_cia(spec));
    let cia = Cia::read(s.as_mut(), keys).unwrap();
    (cia, s)
}

#[test]
fn test_detection() {
    let raw = build_cia(CiaSpec::default());
    assert!(looks_like_cia(&raw[..0x20]));
    assert!(!looks_like_cia(&build_ncch_pair(Crypto::None).1[..0x20]));
    assert!(!looks_like_cia(&[0u8; 0x10]));
}

#[test]
fn test_section_offsets() {
    let (cia, _) = read_cia(CiaSpec::default(), &test_keys());
    assert_eq!(cia.header.ticket_offset(), 0x2A40);
    assert_eq!(cia.header.tmd_offset(), 0x2DC0);
    assert_eq!(cia.header.content_offset(), 0x3940);
    assert_eq!(cia.header.meta_offset(), Some(0x3940 + 0x5000));
    assert!(cia.header.has_content(0));
    assert!(cia.header.has_content(1));
    assert!(!cia.header.has_content(2));
}

#[test]
fn test_ticket_and_tmd() {
    let (cia, _) = read_cia(CiaSpec::default(), &test_keys());
    assert_eq!(cia.ticket.title_id, PROGRAM_ID);
    assert_eq!(cia.ticket.common_key_name(), "eShop");
    assert_eq!(cia.tmd.title_id, PROGRAM_ID);
    assert_eq!(cia.tmd.chunks.len(), 2);
    assert!(cia.tmd.chunks[0].is_encrypted());
    assert!(!cia.tmd.chunks[1].is_encrypted());

    let contents = cia.contents();
    assert_eq!(contents[0].0, 0x3940);
    assert_eq!(contents[1].0, 0x3940 + NCCH_LEN as u64);
    assert_eq!(cia.encryption_status(), EncryptionStatus::Ok);
}

#[test]
fn test_rejects_bad_sections() {
    let mut raw = build_cia(CiaSpec::default());
    raw[0] = 0x40;
    assert!(Cia::read(stream(raw).as_mut(), &test_keys()).is_err());

    let mut raw = build_cia(CiaSpec::default());
    raw[0x2A40..0x2A44].copy_from_slice(&0x0001_0009u32.to_be_bytes());
    assert!(Cia::read(stream(raw).as_mut(), &test_keys()).is_err());

    let raw = build_cia(CiaSpec::default())[..0x2B00].to_vec();
    assert!(Cia::read(stream(raw).as_mut(), &test_keys()).is_err());
}

#[test]
fn test_section_sizes_checked_before_reading() {
    let mut raw = build_cia(CiaSpec::default());
    raw[0x0C..0x10].copy_from_slice(&u32::MAX.to_le_bytes());
    assert!(matches!(
        Cia::read(stream(raw).as_mut(), &test_keys()),
        Err(RomError::CorruptedHeader(_))
    ));

    // Under the TMD cap but larger than the file
    let mut raw = build_cia(CiaSpec::default());
    let too_big = raw.len() as u32 + 0x40;
    raw[0x10..0x14].copy_from_slice(&too_big.to_le_bytes());
    assert!(matches!(
        Cia::read(stream(raw).as_mut(), &test_keys()),
        Err(RomError::CorruptedHeader(_))
    ));
}

#[test]
fn test_huge_content_size_has_no_meta() {
    let mut raw = build_cia(CiaSpec::default());
    raw[0x18..0x20].copy_from_slice(&u64::MAX.to_le_bytes());
    let mut s = stream(raw);
    let cia = Cia::read(s.as_mut(), &test_keys()).unwrap();
    assert_eq!(cia.header.meta_offset(), None);
    assert!(cia.meta_smdh(s.as_mut()).unwrap().is_none());

    let mut fields = FieldList::new();
    cia.add_fields(&mut fields);
    assert!(fields.get("Contents").is_some());
}

#[test]
fn test_huge_chunk_size_stops_content_list() {
    let mut raw = build_cia(CiaSpec::default());
    let size_at = 0x2DC0 + SIG_BLOCK + TMD_CHUNKS + 8;
    raw[size_at..size_at + 8].copy_from_slice(&u64::MAX.to_be_bytes());
    let cia = Cia::read(stream(raw).as_mut(), &test_keys()).unwrap();
    assert!(cia.contents().is_empty());
}

#[test]
fn test_content_decryption() {
    let plain = build_ncch_pair(Crypto::None).0;
    let (cia, s) = read_cia(CiaSpec::default(), &test_keys());
    let mut content = cia.open_content(s, 0).unwrap();
    assert_eq!(content.size(), NCCH_LEN as u64);
    assert_eq!(content.encryption_status(), EncryptionStatus::Ok);
    assert_eq!(content.read_up_to(0, NCCH_LEN).unwrap(), plain);

    // Unaligned random access
    assert_eq!(content.read_up_to(0x1234, 0x55).unwrap(), plain[0x1234..0x1289]);
    assert_eq!(content.read_up_to(0x10, 0x10).unwrap(), plain[0x10..0x20]);
    assert_eq!(
        content.read_up_to(NCCH_LEN as u64 - 3, 0x10).unwrap(),
        plain[NCCH_LEN - 3..]
    );
}

#[test]
fn test_ncch_inside_content() {
    let (cia, s) = read_cia(CiaSpec::default(), &test_keys());
    let content = cia.open_content(s, 0).unwrap();
    let mut ncch = NcchReader::open(Box::new(content), 0, &KeyStore::empty()).unwrap();
    assert_eq!(ncch.header().product_code, "CTR-P-AQEE");
    assert_eq!(ncch.verify_exheader().unwrap(), Some(true));
}

#[test]
fn test_plain_contents() {
    let plain = build_ncch_pair(Crypto::None).0;
    let (cia, s) = read_cia(
        CiaSpec {
            encrypted: false,
            ..CiaSpec::default()
        },
        &KeyStore::empty(),
    );
    assert_eq!(cia.encryption_status(), EncryptionStatus::Ok);
    let mut content = cia.open_content(s.dup().unwrap(), 0).unwrap();
    assert_eq!(content.read_up_to(0x100, 4).unwrap(), plain[0x100..0x104]);
    let mut manual = cia.open_content(s, 1).unwrap();
    assert_eq!(manual.read_up_to(0, 8).unwrap(), [0, 1, 2, 3, 4, 5, 6, 0]);
}

#[test]
fn test_missing_common_key() {
    let (cia, s) = read_cia(CiaSpec::default(), &KeyStore::empty());
    assert_eq!(cia.encryption_status(), EncryptionStatus::KeyMissing);
    let mut content = cia.open_content(s.dup().unwrap(), 0).unwrap();
    assert_eq!(content.encryption_status(), EncryptionStatus::KeyMissing);
    assert!(content.read_up_to(0, 0x200).unwrap().is_empty());

    // The plain content stays readable
    let mut manual = cia.open_content(s, 1).unwrap();
    assert_eq!(manual.read_up_to(0, MANUAL_LEN).unwrap().len(), MANUAL_LEN);
}

#[test]
fn test_unknown_common_key_index() {
    let spec = CiaSpec {
        key_index: 7,
        ..CiaSpec::default()
    };
    let (cia, _) = read_cia(spec, &test_keys());
    assert_eq!(cia.encryption_status(), EncryptionStatus::UnknownKeyIndex);
    assert_eq!(cia.ticket.common_key_name(), "Unknown (7)");
}

#[test]
fn test_meta_smdh() {
    let (cia, mut s) = read_cia(CiaSpec::default(), &test_keys());
    let smdh = cia.meta_smdh(s.as_mut()).unwrap().unwrap();
    assert_eq!(smdh.title("en").unwrap().long, "Ocarina of Time 3D");

    let spec = CiaSpec {
        meta: false,
        ..CiaSpec::default()
    };
    let (cia, mut s) = read_cia(spec, &test_keys());
    assert!(cia.meta_smdh(s.as_mut()).unwrap().is_none());
}

#[test]
fn test_fields() {
    let (cia, _) = read_cia(CiaSpec::default(), &test_keys());
    let mut fields = FieldList::new();
    cia.add_fields(&mut fields);
    let text = |label: &str| fields.get(label).unwrap().display_value();
    assert_eq!(text("Title ID"), "00040000-00033500");
    assert_eq!(text("Title version"), "v1.2.3");
    assert_eq!(text("Common key"), "eShop");
    assert_eq!(text("Content size"), "20 KB");
    assert_eq!(
        text("Contents"),
        "0 | 00000000 | Encrypted | 19 KB; 1 | 00000001 | Optional | 1 KB"
    );
    assert!(fields.get("Ticket title ID").is_none());
}

#[test]
fn test_missing_content_and_close() {
    let (cia, s) = read_cia(CiaSpec::default(), &test_keys());
    assert!(cia.open_content(s.dup().unwrap(), 2).is_err());

    let mut content = cia.open_content(s, 0).unwrap();
    let mut copy = content.dup().unwrap();
    content.close();
    assert!(!content.is_open());
    let mut buf = [0u8; 4];
    assert!(matches!(content.read(&mut buf), Err(RomError::NotOpen)));
    assert_eq!(copy.read_up_to(0x100, 4).unwrap(), b"NCCH");
}
