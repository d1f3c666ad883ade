use super::*;
use crate::test_util::{detect, field_text, load_fields, open};

/// Fix up both checksums after editing the header.
fn fix_checksums(rom: &mut [u8]) {
    rom[OFF_HEADER_CHECKSUM] = header_checksum(rom);
    rom[OFF_GLOBAL_CHECKSUM] = 0;
    rom[OFF_GLOBAL_CHECKSUM + 1] = 0;
    let sum = rom.iter().fold(0u16, |s, &b| s.wrapping_add(b as u16));
    rom[OFF_GLOBAL_CHECKSUM..OFF_GLOBAL_CHECKSUM + 2].copy_from_slice(&sum.to_be_bytes());
}

/// Build a minimal synthetic GB ROM with a valid Nintendo logo.
/// Returns a 0x8000-byte (32 KB) buffer - the minimum ROM size (code 0x00).
fn make_gb_rom() -> Vec<u8> {
    let mut rom = vec![0u8; 0x8000];

    // Entry point: NOP + JP 0x0150
    rom[0x0100..0x0104].copy_from_slice(&[0x00, 0xC3, 0x50, 0x01]);
    rom[OFF_LOGO..OFF_LOGO + 48].copy_from_slice(&NINTENDO_LOGO);
    rom[OFF_TITLE..OFF_TITLE + 8].copy_from_slice(b"TESTGAME");
    rom[OFF_CART_TYPE] = 0x03; // MBC1+RAM+BATTERY
    rom[OFF_RAM_SIZE] = 0x02; // 8 KB
    rom[OFF_DESTINATION] = 0x01;
    rom[OFF_OLD_LICENSEE] = 0x01; // Nintendo

    fix_checksums(&mut rom);
    rom
}

#[test]
fn test_detect_dmg_and_cgb() {
    let mut rom = make_gb_rom();
    assert_eq!(detect::<GameBoy>(&rom), Some(GbKind::Dmg as u32));
    rom[OFF_CGB_FLAG] = 0x80;
    assert_eq!(detect::<GameBoy>(&rom), Some(GbKind::CgbDual as u32));
    rom[OFF_CGB_FLAG] = 0xC0;
    assert_eq!(detect::<GameBoy>(&rom), Some(GbKind::CgbOnly as u32));
}

#[test]
fn test_detect_requires_logo() {
    let mut rom = make_gb_rom();
    rom[OFF_LOGO] ^= 0xFF;
    assert_eq!(detect::<GameBoy>(&rom), None);
    assert_eq!(detect::<GameBoy>(&make_gb_rom()[..0x140]), None);
}

#[test]
fn test_fields() {
    let fields = load_fields::<GameBoy>(make_gb_rom());
    assert_eq!(field_text(&fields, "Title"), "TESTGAME");
    assert_eq!(field_text(&fields, "System"), "Game Boy");
    assert_eq!(field_text(&fields, "Publisher"), "Nintendo");
    assert_eq!(field_text(&fields, "Mapper"), "MBC1 (0x03)");
    assert_eq!(field_text(&fields, "Features"), "RAM, Battery");
    assert_eq!(field_text(&fields, "ROM size"), "32 KB");
    assert_eq!(field_text(&fields, "RAM size"), "8 KB");
    assert_eq!(field_text(&fields, "Region"), "Non-Japan");
    assert!(field_text(&fields, "Header checksum").ends_with("(valid)"));
    assert!(field_text(&fields, "Global checksum").ends_with("(valid)"));
}

#[test]
fn test_wrong_header_checksum_is_reported() {
    let mut rom = make_gb_rom();
    let good = rom[OFF_HEADER_CHECKSUM];
    rom[OFF_HEADER_CHECKSUM] = good.wrapping_add(1);
    let fields = load_fields::<GameBoy>(rom);
    let text = field_text(&fields, "Header checksum");
    assert_eq!(
        text,
        format!("0x{:02X} (INVALID; computed 0x{:02X})", good.wrapping_add(1), good)
    );
}

#[test]
fn test_cgb_title_and_game_id() {
    let mut rom = make_gb_rom();
    rom[OFF_TITLE..OFF_CGB_FLAG].copy_from_slice(b"POKEMON\0\0\0\0AAUE");
    rom[OFF_CGB_FLAG] = 0x80;
    rom[OFF_SGB_FLAG] = 0x03;
    rom[OFF_OLD_LICENSEE] = 0x33;
    rom[OFF_NEW_LICENSEE..OFF_NEW_LICENSEE + 2].copy_from_slice(b"01");
    fix_checksums(&mut rom);

    let fields = load_fields::<GameBoy>(rom.clone());
    assert_eq!(field_text(&fields, "Title"), "POKEMON");
    assert_eq!(field_text(&fields, "Game ID"), "AAUE");
    assert_eq!(field_text(&fields, "Publisher"), "Nintendo R&D1");
    assert_eq!(field_text(&fields, "Features"), "RAM, Battery, Super Game Boy");

    let gb = open::<GameBoy>(rom);
    assert_eq!(gb.system_name(SystemNameVariant::SHORT), Some("Game Boy Color"));
}
