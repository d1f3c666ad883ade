use super::*;
use crate::test_util::{ctx, detect, detect_ext, field_text, load_fields, open};
use romscope_core::{FieldList, MemStream};

/// A ROM of `size` bytes with a TMR SEGA header at `base`.
fn make_rom(size: usize, base: usize, region_size: u8) -> Vec<u8> {
    let mut rom: Vec<u8> = (0..size).map(|i| (i * 7 % 251) as u8).collect();
    rom[base..base + HEADER_LEN].fill(0);
    rom[base..base + 8].copy_from_slice(TMR_MAGIC);
    // Product code 12345: BCD 45, 23, then 1 in the version high nibble
    rom[base + OFF_PRODUCT] = 0x45;
    rom[base + OFF_PRODUCT + 1] = 0x23;
    rom[base + OFF_VERSION] = 0x12;
    rom[base + OFF_REGION_SIZE] = region_size;
    rom
}

fn fix_checksum(rom: &mut [u8], base: usize, end: usize) {
    let mut sum = 0u16;
    for (i, &b) in rom[..end].iter().enumerate() {
        if i < 0x7FF0 || i >= 0x8000 {
            sum = sum.wrapping_add(b as u16);
        }
    }
    rom[base + OFF_CHECKSUM..base + OFF_CHECKSUM + 2].copy_from_slice(&sum.to_le_bytes());
}

/// 32 KB export Master System ROM with a valid checksum.
fn sms_rom() -> Vec<u8> {
    let mut rom = make_rom(0x8000, 0x7FF0, 0x4C);
    fix_checksum(&mut rom, 0x7FF0, 0x8000);
    rom
}

#[test]
fn test_detect() {
    assert_eq!(detect::<MasterSystem>(&sms_rom()), Some(0));
    let gg = make_rom(0x8000, 0x7FF0, 0x6C);
    assert_eq!(detect::<MasterSystem>(&gg), Some(1));
    // Small ROM with the header at 0x1FF0
    let small = make_rom(0x2000, 0x1FF0, 0x4A);
    assert_eq!(detect::<MasterSystem>(&small), Some(0));
    // An unknown region nibble falls back to the extension
    let odd = make_rom(0x8000, 0x7FF0, 0x0C);
    assert_eq!(detect::<MasterSystem>(&odd), Some(0));
    assert_eq!(detect_ext::<MasterSystem>(&odd, Some("gg")), Some(1));

    assert_eq!(detect::<MasterSystem>(&[0u8; 0x8000]), None);
    assert_eq!(detect::<MasterSystem>(&[]), None);
    assert_eq!(detect::<MasterSystem>(&sms_rom()[..0x7FF4]), None);
}

#[test]
fn test_fields() {
    let fields = load_fields::<MasterSystem>(sms_rom());
    assert_eq!(field_text(&fields, "Header location"), "0x7FF0");
    assert_eq!(field_text(&fields, "Product code"), "12345");
    assert_eq!(field_text(&fields, "Version"), "2");
    assert_eq!(field_text(&fields, "Region"), "Export");
    assert_eq!(field_text(&fields, "ROM size"), "32 KB");
    assert!(field_text(&fields, "Checksum").ends_with("(valid)"));
    assert!(fields.get("SDSC version").is_none());
}

#[test]
fn test_bad_checksum() {
    let mut rom = sms_rom();
    rom[0x100] ^= 0xFF;
    let fields = load_fields::<MasterSystem>(rom);
    assert!(field_text(&fields, "Checksum").contains("INVALID"));
}

#[test]
fn test_checksum_skips_header_bank() {
    // 64 KB: the sum covers 0-0x7FEF and 0x8000-0xFFFF
    let mut rom = make_rom(0x10000, 0x7FF0, 0x4E);
    fix_checksum(&mut rom, 0x7FF0, 0x10000);
    let fields = load_fields::<MasterSystem>(rom.clone());
    assert!(field_text(&fields, "Checksum").ends_with("(valid)"));

    // Changing a byte past 0x8000 breaks it
    rom[0xC000] ^= 0x01;
    let fields = load_fields::<MasterSystem>(rom);
    assert!(field_text(&fields, "Checksum").contains("INVALID"));
}

#[test]
fn test_checksum_unknown_when_short() {
    // Declares 128 KB but only 32 KB are present
    let rom = make_rom(0x8000, 0x7FF0, 0x4F);
    let fields = load_fields::<MasterSystem>(rom);
    assert_eq!(field_text(&fields, "ROM size"), "128 KB");
    assert_eq!(field_text(&fields, "Checksum"), "Unknown");

    let rom = make_rom(0x8000, 0x7FF0, 0x47);
    let fields = load_fields::<MasterSystem>(rom);
    assert_eq!(field_text(&fields, "ROM size"), "Unknown (7)");
    assert_eq!(field_text(&fields, "Checksum"), "Unknown");
}

#[test]
fn test_sdsc_header() {
    let mut rom = sms_rom();
    let sdsc = 0x7FE0;
    rom[sdsc..sdsc + 4].copy_from_slice(SDSC_MAGIC);
    rom[sdsc + 4] = 0x01;
    rom[sdsc + 5] = 0x02;
    rom[sdsc + 6] = 0x31;
    rom[sdsc + 7] = 0x12;
    rom[sdsc + 8] = 0x05;
    rom[sdsc + 9] = 0x20;
    rom[sdsc + 0x0A..sdsc + 0x0C].copy_from_slice(&0x7F00u16.to_le_bytes());
    rom[sdsc + 0x0C..sdsc + 0x0E].copy_from_slice(&0x7F40u16.to_le_bytes());
    rom[sdsc + 0x0E..sdsc + 0x10].copy_from_slice(&0xFFFFu16.to_le_bytes());
    rom[0x7F00..0x7F07].copy_from_slice(b"Someone");
    rom[0x7F07] = 0;
    rom[0x7F40..0x7F48].copy_from_slice(b"Homebrew");
    rom[0x7F48] = 0;

    let fields = load_fields::<MasterSystem>(rom);
    assert_eq!(field_text(&fields, "SDSC version"), "1.02");
    assert_eq!(field_text(&fields, "SDSC date"), "2005-12-31");
    assert_eq!(field_text(&fields, "Title"), "Homebrew");
    assert_eq!(field_text(&fields, "Author"), "Someone");
    assert!(fields.get("Description").is_none());
}

#[test]
fn test_system_names() {
    let rom = open::<MasterSystem>(sms_rom());
    assert_eq!(rom.system_name(SystemNameVariant::ABBREVIATION), Some("SMS"));

    let japan = make_rom(0x8000, 0x7FF0, 0x3C);
    let rom = open::<MasterSystem>(japan);
    assert_eq!(rom.system_name(SystemNameVariant::SHORT), Some("Master System"));
    assert_eq!(
        rom.system_name(SystemNameVariant::SHORT.rom_local()),
        Some("Mark III")
    );

    let rom = open::<MasterSystem>(make_rom(0x8000, 0x7FF0, 0x5C));
    assert_eq!(rom.system_name(SystemNameVariant::LONG), Some("Sega Game Gear"));
    assert_eq!(rom.file_type(), FileType::RomImage);
}

#[test]
fn test_open_and_close() {
    let opened = MasterSystem::open(Box::new(MemStream::new(vec![0u8; 0x100])), 0, &ctx());
    assert!(opened.is_err());

    let mut rom = open::<MasterSystem>(sms_rom());
    rom.close();
    let mut fields = FieldList::new();
    assert!(matches!(
        rom.load_fields(&ctx(), &mut fields),
        Err(RomError::NotOpen)
    ));
}
