use super::*;
use crate::AesCipher;
use std::fs;
use std::time::{Duration, SystemTime};

const KEY_A: &str = "000102030405060708090a0b0c0d0e0f";

fn write_conf(dir: &tempfile::TempDir, text: &str) -> PathBuf {
    let path = dir.path().join("keys.conf");
    fs::write(&path, text).unwrap();
    path
}

fn verify_block_for(key: &[u8]) -> [u8; 16] {
    let mut block = *VERIFY_PLAINTEXT;
    AesCipher::new(key).unwrap().encrypt(&mut block).unwrap();
    block
}

#[test]
fn test_missing_file_reports_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = KeyStore::new(dir.path().join("nope.conf"));
    assert!(!store.is_loaded());
    assert_eq!(
        store.get("rvl-common"),
        Err(KeyError::NotFound("rvl-common".into()))
    );
}

#[test]
fn test_empty_store() {
    let store = KeyStore::empty();
    assert!(!store.is_loaded());
    assert!(matches!(store.get("x"), Err(KeyError::NotFound(_))));
}

#[test]
fn test_reads_keys_section_only() {
    let text = format!(
        "; header comment\n\
         [Other]\n\
         stray={KEY_A}\n\
         [Keys]\n\
         # inline comment line\n\
         rvl-common = {KEY_A}\n\
         \n\
         aes256={}\n",
        "11".repeat(32)
    );
    let store = KeyStore::from_config_text(&text);
    assert!(store.is_loaded());
    assert_eq!(store.get("rvl-common").unwrap(), hex::decode(KEY_A).unwrap());
    assert_eq!(store.get("aes256").unwrap().len(), 32);
    assert!(matches!(store.get("stray"), Err(KeyError::NotFound(_))));
}

#[test]
fn test_odd_hex_is_invalid_not_missing() {
    let store = KeyStore::from_config_text("[Keys]\nbroken=0123456789abcdef0123456789abcde\n");
    match store.get("broken") {
        Err(KeyError::Invalid { name, .. }) => assert_eq!(name, "broken"),
        other => panic!("expected Invalid, got {other:?}"),
    }
}

#[test]
fn test_bad_characters_and_lengths_are_invalid() {
    let store = KeyStore::from_config_text(
        "[Keys]\nchars=zz0102030405060708090a0b0c0d0e0f\nshort=00112233\n",
    );
    assert!(matches!(store.get("chars"), Err(KeyError::Invalid { .. })));
    assert!(matches!(store.get("short"), Err(KeyError::Invalid { .. })));
}

#[test]
fn test_get_and_verify() {
    let key = hex::decode(KEY_A).unwrap();
    let good = verify_block_for(&key);
    let wrong = verify_block_for(&[0x55; 16]);
    let store = KeyStore::from_config_text(&format!("[Keys]\nk={KEY_A}\n"));

    assert_eq!(store.get_and_verify("k", &good).unwrap(), key);
    assert_eq!(
        store.get_and_verify("k", &wrong),
        Err(KeyError::WrongKey("k".into()))
    );
    assert!(matches!(
        store.get_and_verify("missing", &good),
        Err(KeyError::NotFound(_))
    ));
}

#[test]
fn test_get_spec_and_get_128() {
    let key = hex::decode(KEY_A).unwrap();
    let store = KeyStore::from_config_text(&format!("[Keys]\nk={KEY_A}\nbig={}\n", "22".repeat(24)));

    let plain = KeySpec::new("k");
    assert_eq!(store.get_128(&plain).unwrap().as_slice(), key.as_slice());

    let verified = KeySpec::verified("k", verify_block_for(&[0x01; 16]));
    assert!(matches!(store.get_spec(&verified), Err(KeyError::WrongKey(_))));

    assert!(matches!(
        store.get_128(&KeySpec::new("big")),
        Err(KeyError::Invalid { .. })
    ));
}

#[test]
fn test_file_cached_until_mtime_changes() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_conf(&dir, &format!("[Keys]\nk={KEY_A}\n"));
    let base = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(base)
        .unwrap();

    let store = KeyStore::new(&path);
    assert!(store.is_loaded());
    assert!(store.get("k").is_ok());

    // Rewrite but restore the old mtime: the cached copy stays in use.
    fs::write(&path, "[Keys]\nother=00112233445566778899aabbccddeeff\n").unwrap();
    fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(base)
        .unwrap();
    assert!(store.get("k").is_ok());
    assert!(store.get("other").is_err());

    // A new mtime triggers a reload.
    fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(base + Duration::from_secs(60))
        .unwrap();
    assert!(matches!(store.get("k"), Err(KeyError::NotFound(_))));
    assert!(store.get("other").is_ok());
}

#[test]
fn test_deleted_file_unloads() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_conf(&dir, &format!("[Keys]\nk={KEY_A}\n"));
    let store = KeyStore::new(&path);
    assert!(store.get("k").is_ok());

    fs::remove_file(&path).unwrap();
    assert!(!store.is_loaded());
    assert!(matches!(store.get("k"), Err(KeyError::NotFound(_))));
}

#[test]
fn test_status_from_key_error() {
    use crate::EncryptionStatus;
    assert_eq!(
        EncryptionStatus::from(&KeyError::NotFound("a".into())),
        EncryptionStatus::KeyMissing
    );
    assert_eq!(
        EncryptionStatus::from(&KeyError::WrongKey("a".into())),
        EncryptionStatus::KeyInvalid
    );
    assert_eq!(
        EncryptionStatus::from(&KeyError::invalid("a", "bad")),
        EncryptionStatus::KeyInvalid
    );
    assert!(EncryptionStatus::Ok.is_ok());
}
