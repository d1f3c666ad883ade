use super::*;
use crate::n3ds::ncch::tests::{Crypto, NCCH_LEN, build_ncch};

pub(crate) const GAME_OFFSET: usize = 0x4000;
const MANUAL_OFFSET: usize = GAME_OFFSET + NCCH_LEN;
const MANUAL_LEN: usize = 0x400;
pub(crate) const IMAGE_SIZE: usize = 0x10000;
pub(crate) const FILLED_SIZE: usize = MANUAL_OFFSET + MANUAL_LEN;

/// A trimmed Card1 image: the game NCCH at 0x4000 followed by a manual
/// partition.
pub(crate) fn build_cci(crypto: Crypto) -> Vec<u8> {
    let mut cci = vec![0u8; GAME_OFFSET];
    cci[OFF_MAGIC..OFF_MAGIC + 4].copy_from_slice(NCSD_MAGIC);
    let mu = |bytes: usize| ((bytes as u64 / MEDIA_UNIT) as u32).to_le_bytes();
    cci[OFF_IMAGE_SIZE..OFF_IMAGE_SIZE + 4].copy_from_slice(&mu(IMAGE_SIZE));
    cci[OFF_MEDIA_ID..OFF_MEDIA_ID + 8].copy_from_slice(&0x0004_0000_0003_3500u64.to_le_bytes());
    let table = [(GAME_OFFSET, NCCH_LEN), (MANUAL_OFFSET, MANUAL_LEN)];
    for (i, &(offset, len)) in table.iter().enumerate() {
        let at = OFF_PARTITIONS + i * 8;
        cci[at..at + 4].copy_from_slice(&mu(offset));
        cci[at + 4..at + 8].copy_from_slice(&mu(len));
    }
    cci[OFF_FLAGS + 4] = 1;
    cci[OFF_FLAGS + 5] = 1;
    cci[OFF_FILLED_SIZE..OFF_FILLED_SIZE + 4].copy_from_slice(&(FILLED_SIZE as u32).to_le_bytes());
    cci[OFF_TITLE_VERSION..OFF_TITLE_VERSION + 2].copy_from_slice(&(1u16 << 10).to_le_bytes());
    cci.extend_from_slice(&build_ncch(crypto));
    cci.resize(FILLED_SIZE, 0xFF);
    cci
}

fn header() -> NcsdHeader {
    NcsdHeader::parse(&build_cci(Crypto::None)[..NCSD_HEADER_LEN]).unwrap()
}

#[test]
fn test_parse() {
    let h = header();
    assert_eq!(h.image_size, IMAGE_SIZE as u64);
    assert_eq!(h.game_partition_offset(), GAME_OFFSET as u64);
    assert_eq!(h.partitions[1], (MANUAL_OFFSET as u64, MANUAL_LEN as u64));
    assert_eq!(h.partitions[2], (0, 0));
    assert_eq!(h.media_type, 1);
    assert_eq!(h.filled_size, FILLED_SIZE as u64);
}

#[test]
fn test_rejects_bad_headers() {
    let mut raw = build_cci(Crypto::None);
    raw[OFF_MAGIC] = b'X';
    assert!(NcsdHeader::parse(&raw[..NCSD_HEADER_LEN]).is_err());

    let mut raw = build_cci(Crypto::None);
    raw[OFF_PARTITIONS + 4..OFF_PARTITIONS + 8].fill(0);
    assert!(matches!(
        NcsdHeader::parse(&raw[..NCSD_HEADER_LEN]),
        Err(RomError::CorruptedHeader(_))
    ));

    assert!(NcsdHeader::parse(&raw[..0x200]).unwrap_err().is_truncation());
}

#[test]
fn test_dump_status() {
    let h = header();
    assert_eq!(h.dump_status(FILLED_SIZE as u64), "Trimmed");
    assert_eq!(h.dump_status(IMAGE_SIZE as u64), "Untrimmed");
    assert_eq!(h.dump_status(FILLED_SIZE as u64 + 0x200), "Partially trimmed");
    assert_eq!(h.dump_status(0x1000), "Truncated");
    assert_eq!(h.dump_status(IMAGE_SIZE as u64 * 2), "Oversized");

    let mut raw = build_cci(Crypto::None);
    raw[OFF_FILLED_SIZE..OFF_FILLED_SIZE + 4].fill(0);
    let h = NcsdHeader::parse(&raw[..NCSD_HEADER_LEN]).unwrap();
    assert_eq!(h.dump_status(FILLED_SIZE as u64), "Unknown");
}

#[test]
fn test_fields() {
    let mut fields = FieldList::new();
    header().add_fields(FILLED_SIZE as u64, &mut fields);
    let text = |label: &str| fields.get(label).unwrap().display_value();
    assert_eq!(text("Media type"), "Card1");
    assert_eq!(text("Platform"), "CTR (3DS)");
    assert_eq!(text("Card version"), "v1.0.0");
    assert_eq!(text("Image size"), "64 KB");
    assert_eq!(text("Dump status"), "Trimmed");
    assert_eq!(
        text("Partitions"),
        "0 | Game | 0x4000 | 19 KB; 1 | Manual | 0x8C00 | 1 KB"
    );
    assert!(fields.get("Save offset").is_none());
    assert!(fields.get("Card revision").is_none());
}

#[test]
fn test_card2_save_offset() {
    let mut raw = build_cci(Crypto::None);
    raw[OFF_FLAGS + 5] = 2;
    raw[OFF_WRITABLE_ADDRESS..OFF_WRITABLE_ADDRESS + 4].copy_from_slice(&0x40u32.to_le_bytes());
    let h = NcsdHeader::parse(&raw[..NCSD_HEADER_LEN]).unwrap();
    let mut fields = FieldList::new();
    h.add_fields(raw.len() as u64, &mut fields);
    assert_eq!(fields.get("Media type").unwrap().display_value(), "Card2");
    assert_eq!(fields.get("Save offset").unwrap().display_value(), "0x00008000");
}
