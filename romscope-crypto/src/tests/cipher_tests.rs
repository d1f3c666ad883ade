use super::*;

fn unhex<const N: usize>(s: &str) -> [u8; N] {
    let v = hex::decode(s).unwrap();
    v.try_into().unwrap()
}

const SP800_KEY: &str = "2b7e151628aed2a6abf7158809cf4f3c";
const SP800_PLAIN: &str = "6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51";

#[test]
fn test_ecb_fips197_vector() {
    let key: [u8; 16] = unhex("000102030405060708090a0b0c0d0e0f");
    let mut block: [u8; 16] = unhex("00112233445566778899aabbccddeeff");
    let cipher = AesCipher::new(&key).unwrap();
    cipher.encrypt(&mut block).unwrap();
    assert_eq!(hex::encode(block), "69c4e0d86a7b0430d8cdb78070b4c55a");
    cipher.decrypt(&mut block).unwrap();
    assert_eq!(hex::encode(block), "00112233445566778899aabbccddeeff");
}

#[test]
fn test_cbc_sp800_38a_vector() {
    let key: [u8; 16] = unhex(SP800_KEY);
    let iv: [u8; 16] = unhex("000102030405060708090a0b0c0d0e0f");
    let mut buf: [u8; 32] = unhex(SP800_PLAIN);
    let cipher = AesCipher::new(&key)
        .unwrap()
        .with_mode(ChainingMode::Cbc)
        .with_iv(iv);
    cipher.encrypt(&mut buf).unwrap();
    assert_eq!(
        hex::encode(&buf[..16]),
        "7649abac8119b246cee98e9b12e9197d"
    );
    cipher.decrypt(&mut buf).unwrap();
    assert_eq!(hex::encode(buf), SP800_PLAIN);
}

#[test]
fn test_cbc_block_decrypts_with_previous_ciphertext_as_iv() {
    let key: [u8; 16] = unhex(SP800_KEY);
    let iv = [0x11u8; 16];
    let plain = [0x5Au8; 64];
    let mut enc = plain;
    let cipher = AesCipher::new(&key)
        .unwrap()
        .with_mode(ChainingMode::Cbc)
        .with_iv(iv);
    cipher.encrypt(&mut enc).unwrap();

    // Decrypt only the third block, deriving its IV from the second block.
    let mut third = [0u8; 16];
    third.copy_from_slice(&enc[32..48]);
    let mut prev = [0u8; 16];
    prev.copy_from_slice(&enc[16..32]);
    let mid = AesCipher::new(&key)
        .unwrap()
        .with_mode(ChainingMode::Cbc)
        .with_iv(prev);
    mid.decrypt(&mut third).unwrap();
    assert_eq!(third, [0x5Au8; 16]);
}

#[test]
fn test_ctr_sp800_38a_vector() {
    let key: [u8; 16] = unhex(SP800_KEY);
    let iv: [u8; 16] = unhex("f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff");
    let mut buf: [u8; 16] = unhex("6bc1bee22e409f96e93d7e117393172a");
    let cipher = AesCipher::new(&key)
        .unwrap()
        .with_mode(ChainingMode::Ctr)
        .with_iv(iv);
    cipher.encrypt(&mut buf).unwrap();
    assert_eq!(hex::encode(buf), "874d6191b620e3261bef6864990db6ce");
}

#[test]
fn test_ctr_offsets_match_sequential_keystream() {
    let key = [0x42u8; 16];
    let cipher = AesCipher::new(&key)
        .unwrap()
        .with_mode(ChainingMode::Ctr)
        .with_iv([0x01; 16]);

    let mut whole = vec![0u8; 100];
    cipher.ctr_apply_at(0, &mut whole).unwrap();

    // Uneven pieces, applied out of order.
    for (start, end) in [(70usize, 100usize), (3, 17), (0, 3), (17, 70)] {
        let mut piece = vec![0u8; end - start];
        cipher.ctr_apply_at(start as u64, &mut piece).unwrap();
        assert_eq!(piece, whole[start..end], "range {start}..{end}");
    }
}

#[test]
fn test_rejects_bad_key_and_alignment() {
    assert_eq!(
        AesCipher::new(&[0u8; 15]).unwrap_err(),
        CryptoError::InvalidKeyLength(15)
    );
    assert!(AesCipher::new(&[0u8; 24]).is_ok());
    assert!(AesCipher::new(&[0u8; 32]).is_ok());

    let cipher = AesCipher::new(&[0u8; 16]).unwrap();
    let mut buf = [0u8; 20];
    assert_eq!(cipher.decrypt(&mut buf), Err(CryptoError::Unaligned(20)));

    let mut c = cipher.clone();
    assert_eq!(c.set_iv(&[0u8; 8]), Err(CryptoError::InvalidIvLength(8)));
}

#[test]
fn test_counter_add_carries() {
    let mut ctr = [0u8; 16];
    ctr[15] = 0xFF;
    let next = counter_add(&ctr, 1);
    assert_eq!(next[14], 0x01);
    assert_eq!(next[15], 0x00);
}
