use super::*;
use romscope_core::MemStream;

pub(crate) const TEST_COMMON_KEY: [u8; 16] = [0x11; 16];
const TEST_TITLE_KEY: [u8; 16] = [
    0x2B, 0x7E, 0x15, 0x16, 0x28, 0xAE, 0xD2, 0xA6, 0xAB, 0xF7, 0x15, 0x88, 0x09, 0xCF, 0x4F, 0x3C,
];
const TITLE_ID: [u8; 8] = [0x00, 0x01, 0x00, 0x00, b'R', b'M', b'G', b'E'];
const DATA_OFFSET: usize = 0x20000;

pub(crate) fn test_keys() -> KeyStore {
    KeyStore::from_config_text("[Keys]\nrvl-common=11111111111111111111111111111111\n")
}

/// Plaintext partition data with a recognizable pattern that differs
/// between clusters.
pub(crate) fn pattern(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| ((i * 7) ^ (i / CLUSTER_DATA_LEN as usize * 0x55)) as u8)
        .collect()
}

/// Encrypt `plain` into a partition image (ticket + data clusters),
/// starting at offset 0 of the returned buffer.
pub(crate) fn build_partition(plain: &[u8], key_index: u8) -> Vec<u8> {
    let clusters = plain.len().div_ceil(CLUSTER_DATA_LEN as usize);
    let mut out = vec![0u8; DATA_OFFSET + clusters * CLUSTER_LEN as usize];

    out[0..4].copy_from_slice(&SIG_RSA2048.to_be_bytes());
    let mut iv = [0u8; 16];
    iv[..8].copy_from_slice(&TITLE_ID);
    let mut enc_key = TEST_TITLE_KEY;
    AesCipher::new(&TEST_COMMON_KEY)
        .unwrap()
        .with_mode(ChainingMode::Cbc)
        .with_iv(iv)
        .encrypt(&mut enc_key)
        .unwrap();
    out[OFF_TICKET_TITLE_KEY..OFF_TICKET_TITLE_KEY + 16].copy_from_slice(&enc_key);
    out[OFF_TICKET_TITLE_ID..OFF_TICKET_TITLE_ID + 8].copy_from_slice(&TITLE_ID);
    out[OFF_TICKET_KEY_INDEX] = key_index;
    out[OFF_DATA_OFFSET..OFF_DATA_OFFSET + 4]
        .copy_from_slice(&((DATA_OFFSET as u32) >> 2).to_be_bytes());
    let data_size = (clusters as u64 * CLUSTER_LEN) as u32;
    out[OFF_DATA_SIZE..OFF_DATA_SIZE + 4].copy_from_slice(&(data_size >> 2).to_be_bytes());

    for (c, chunk) in plain.chunks(CLUSTER_DATA_LEN as usize).enumerate() {
        let start = DATA_OFFSET + c * CLUSTER_LEN as usize;
        let raw = &mut out[start..start + CLUSTER_LEN as usize];
        for (i, b) in raw[..CLUSTER_HASH_LEN].iter_mut().enumerate() {
            *b = (i * 31 + c * 17 + 5) as u8;
        }
        let mut cluster_iv = [0u8; 16];
        cluster_iv.copy_from_slice(&raw[OFF_CLUSTER_IV..OFF_CLUSTER_IV + 16]);
        let mut data = chunk.to_vec();
        data.resize(CLUSTER_DATA_LEN as usize, 0);
        AesCipher::new(&TEST_TITLE_KEY)
            .unwrap()
            .with_mode(ChainingMode::Cbc)
            .with_iv(cluster_iv)
            .encrypt(&mut data)
            .unwrap();
        raw[CLUSTER_HASH_LEN..].copy_from_slice(&data);
    }
    out
}

fn open_at(disc: Vec<u8>, base: u64, keys: &KeyStore) -> WiiPartition {
    WiiPartition::open(Box::new(MemStream::new(disc)), base, keys).unwrap()
}

#[test]
fn test_sequential_read_decrypts() {
    let plain = pattern(3 * CLUSTER_DATA_LEN as usize);
    let mut part = open_at(build_partition(&plain, 0), 0, &test_keys());

    assert_eq!(part.encryption_status(), EncryptionStatus::Ok);
    assert_eq!(part.common_key(), CommonKey::Retail);
    assert_eq!(part.title_id(), TITLE_ID);
    assert_eq!(part.size(), 3 * CLUSTER_DATA_LEN);
    assert_eq!(part.region_size(), 3 * CLUSTER_LEN);
    assert_eq!(part.read_vec_at(0, plain.len()).unwrap(), plain);
}

#[test]
fn test_random_access_matches_sequential() {
    let plain = pattern(3 * CLUSTER_DATA_LEN as usize);
    let disc = build_partition(&plain, 0);
    let keys = test_keys();

    let mut seq = open_at(disc.clone(), 0, &keys);
    let full = seq.read_vec_at(0, plain.len()).unwrap();

    let mut rnd = open_at(disc, 0, &keys);
    let cluster = CLUSTER_DATA_LEN as usize;
    let reads = [
        (2 * cluster + 3, 100),
        (cluster - 0x10, 0x40),
        (0x10, 5),
        (cluster, 1),
        (2 * cluster - 1, 2),
        (0, 16),
    ];
    for (pos, len) in reads {
        let got = rnd.read_vec_at(pos as u64, len).unwrap();
        assert_eq!(got, full[pos..pos + len], "mismatch at 0x{pos:X}");
    }

    // Reassemble the whole region from backwards 0x1000-byte reads
    let mut assembled = vec![0u8; full.len()];
    for start in (0..full.len()).step_by(0x1000).rev() {
        let end = (start + 0x1000).min(full.len());
        rnd.read_exact_at(start as u64, &mut assembled[start..end]).unwrap();
    }
    assert_eq!(assembled, full);
}

#[test]
fn test_partition_at_offset() {
    let plain = pattern(CLUSTER_DATA_LEN as usize);
    let base = 0x50000usize;
    let mut disc = vec![0xAAu8; base];
    disc.extend_from_slice(&build_partition(&plain, 0));

    let mut part = open_at(disc, base as u64, &test_keys());
    assert_eq!(part.read_vec_at(0x100, 0x20).unwrap(), plain[0x100..0x120]);
}

#[test]
fn test_reads_past_end_are_short() {
    let plain = pattern(CLUSTER_DATA_LEN as usize);
    let mut part = open_at(build_partition(&plain, 0), 0, &test_keys());
    let mut buf = [0u8; 32];
    assert_eq!(part.seek_and_read(CLUSTER_DATA_LEN - 8, &mut buf).unwrap(), 8);
    assert_eq!(part.seek_and_read(CLUSTER_DATA_LEN + 100, &mut buf).unwrap(), 0);
}

#[test]
fn test_key_missing_yields_no_data() {
    let plain = pattern(CLUSTER_DATA_LEN as usize);
    let parent = MemStream::new(build_partition(&plain, 0));
    let mut sibling = parent.dup().unwrap();

    let mut part = WiiPartition::open(Box::new(parent), 0, &KeyStore::empty()).unwrap();
    assert_eq!(part.encryption_status(), EncryptionStatus::KeyMissing);
    let mut buf = [0u8; 64];
    assert_eq!(part.seek_and_read(0, &mut buf).unwrap(), 0);
    assert!(part.read_vec_at(0, 16).unwrap_err().is_truncation());

    // The parent is still fully readable
    assert_eq!(
        sibling.read_vec_at(0, 4).unwrap(),
        SIG_RSA2048.to_be_bytes()
    );
}

#[test]
fn test_key_problems() {
    let plain = pattern(CLUSTER_DATA_LEN as usize);

    let part = open_at(build_partition(&plain, 7), 0, &test_keys());
    assert_eq!(part.encryption_status(), EncryptionStatus::UnknownKeyIndex);
    assert_eq!(part.common_key().name(), "Unknown (7)");

    let bad = KeyStore::from_config_text("[Keys]\nrvl-common=123\n");
    let part = open_at(build_partition(&plain, 0), 0, &bad);
    assert_eq!(part.encryption_status(), EncryptionStatus::KeyInvalid);

    let part = open_at(build_partition(&plain, 1), 0, &test_keys());
    assert_eq!(part.common_key(), CommonKey::Korean);
    assert_eq!(part.encryption_status(), EncryptionStatus::KeyMissing);
}

#[test]
fn test_wrong_key_decrypts_garbage() {
    let plain = pattern(CLUSTER_DATA_LEN as usize);
    let keys = KeyStore::from_config_text("[Keys]\nrvl-common=22222222222222222222222222222222\n");
    let mut part = open_at(build_partition(&plain, 0), 0, &keys);
    assert_eq!(part.encryption_status(), EncryptionStatus::Ok);
    assert_ne!(part.read_vec_at(0, 64).unwrap(), plain[..64]);
}

#[test]
fn test_rejects_bad_headers() {
    let plain = pattern(CLUSTER_DATA_LEN as usize);
    let mut disc = build_partition(&plain, 0);
    disc[0..4].copy_from_slice(&[0, 0, 0, 0]);
    assert!(WiiPartition::open(Box::new(MemStream::new(disc)), 0, &test_keys()).is_err());

    let mut disc = build_partition(&plain, 0);
    disc[OFF_DATA_OFFSET..OFF_DATA_OFFSET + 4].copy_from_slice(&4u32.to_be_bytes());
    assert!(WiiPartition::open(Box::new(MemStream::new(disc)), 0, &test_keys()).is_err());

    let err = WiiPartition::open(Box::new(MemStream::new(vec![0u8; 0x100])), 0, &test_keys())
        .err()
        .unwrap();
    assert!(err.is_truncation());
}

#[test]
fn test_truncated_image() {
    let plain = pattern(2 * CLUSTER_DATA_LEN as usize);
    let mut disc = build_partition(&plain, 0);
    disc.truncate(disc.len() - 0x100);

    let mut part = open_at(disc, 0, &test_keys());
    assert_eq!(part.size(), 2 * CLUSTER_DATA_LEN);
    assert_eq!(part.used_region_size(), 2 * CLUSTER_LEN - 0x100);
    let got = part.read_up_to(0, plain.len()).unwrap();
    assert_eq!(got, plain[..CLUSTER_DATA_LEN as usize]);
}

#[test]
fn test_dup_and_close() {
    let plain = pattern(CLUSTER_DATA_LEN as usize);
    let mut part = open_at(build_partition(&plain, 0), 0, &test_keys());
    let mut copy = part.dup().unwrap();
    part.close();
    assert!(!part.is_open());
    assert!(matches!(part.read(&mut [0u8; 4]), Err(RomError::NotOpen)));
    assert_eq!(copy.read_vec_at(0, 8).unwrap(), plain[..8]);
}

#[test]
fn test_debug_issuer() {
    assert_eq!(
        CommonKey::from_ticket(0, "Root-CA00000002-XS00000006"),
        CommonKey::Debug
    );
    assert_eq!(
        CommonKey::from_ticket(0, "Root-CA00000001-XS00000003"),
        CommonKey::Retail
    );
    assert_eq!(CommonKey::from_ticket(2, ""), CommonKey::VWii);
}
