use super::*;
use crate::test_util::{detect, field_text, load_fields, open};

/// Write the checksum pair for a ROM whose size is a power of two.
fn recompute_snes_checksums(rom: &mut [u8], base: usize) {
    rom[base + OFF_COMPLEMENT..base + OFF_COMPLEMENT + 4].copy_from_slice(&[0xFF, 0xFF, 0, 0]);
    let sum = rom.iter().fold(0u16, |s, &b| s.wrapping_add(b as u16));
    rom[base + OFF_CHECKSUM..base + OFF_CHECKSUM + 2].copy_from_slice(&sum.to_le_bytes());
    rom[base + OFF_COMPLEMENT..base + OFF_COMPLEMENT + 2]
        .copy_from_slice(&(sum ^ 0xFFFF).to_le_bytes());
}

/// Build a synthetic 256 KB LoROM with a valid header and checksums.
fn make_snes_rom() -> Vec<u8> {
    let mut rom = vec![0u8; 256 * 1024];
    let base = LOROM_HEADER_BASE as usize;

    rom[base + OFF_TITLE..base + OFF_TITLE + 21].copy_from_slice(b"TEST ROM             ");
    rom[base + OFF_MAP_MODE] = 0x20; // LoROM, SlowROM
    rom[base + OFF_ROM_TYPE] = 0x02; // ROM + RAM + Battery
    rom[base + OFF_ROM_SIZE] = 0x08; // 256 KB
    rom[base + OFF_RAM_SIZE] = 0x03; // 8 KB
    rom[base + OFF_COUNTRY] = 0x01; // North America
    rom[base + OFF_DEVELOPER_ID] = 0x01;
    rom[base + OFF_VERSION] = 0x01;
    // Some code so the sum isn't trivial
    rom[0..4].copy_from_slice(&[0x78, 0x18, 0xFB, 0x5C]);

    recompute_snes_checksums(&mut rom, base);
    rom
}

/// Build a synthetic 1 MB HiROM FastROM with an extended header.
fn make_snes_hirom() -> Vec<u8> {
    let mut rom = vec![0u8; 1024 * 1024];
    let base = HIROM_HEADER_BASE as usize;

    rom[base + OFF_TITLE..base + OFF_TITLE + 21].copy_from_slice(b"HIROM GAME           ");
    rom[base + OFF_MAP_MODE] = 0x31; // HiROM, FastROM
    rom[base + OFF_ROM_TYPE] = 0x35; // ROM + SA-1 + RAM + Battery
    rom[base + OFF_ROM_SIZE] = 0x0A;
    rom[base + OFF_COUNTRY] = 0x00;
    rom[base + OFF_DEVELOPER_ID] = EXTENDED_DEVELOPER_ID;
    rom[base - 0x10..base - 0x0A].copy_from_slice(b"01ABCJ");

    recompute_snes_checksums(&mut rom, base);
    rom
}

#[test]
fn test_detect_lorom() {
    assert_eq!(detect::<Snes>(&make_snes_rom()), Some(0));
}

#[test]
fn test_detect_hirom() {
    assert_eq!(detect::<Snes>(&make_snes_hirom()), Some(ID_HIROM));
}

#[test]
fn test_detect_copier_header() {
    let mut rom = vec![0u8; 512];
    rom.extend_from_slice(&make_snes_rom());
    assert_eq!(detect::<Snes>(&rom), Some(ID_COPIER));
}

#[test]
fn test_detect_rejects_blank() {
    assert_eq!(detect::<Snes>(&vec![0u8; 256 * 1024]), None);
    assert_eq!(detect::<Snes>(&[]), None);
    assert_eq!(detect::<Snes>(&vec![0u8; 0x100]), None);
}

#[test]
fn test_lorom_fields() {
    let fields = load_fields::<Snes>(make_snes_rom());
    assert_eq!(field_text(&fields, "Title"), "TEST ROM");
    assert_eq!(field_text(&fields, "ROM mapping"), "LoROM");
    assert_eq!(field_text(&fields, "ROM speed"), "SlowROM");
    assert_eq!(field_text(&fields, "Cartridge type"), "ROM + RAM + Battery");
    assert_eq!(field_text(&fields, "ROM size"), "256 KB");
    assert_eq!(field_text(&fields, "SRAM size"), "8 KB");
    assert_eq!(field_text(&fields, "Region"), "North America");
    assert_eq!(field_text(&fields, "Publisher"), "Nintendo");
    assert_eq!(field_text(&fields, "Revision"), "1");
    assert!(field_text(&fields, "Checksum").ends_with("(valid)"));
    assert!(field_text(&fields, "Checksum complement").ends_with("(valid)"));
    assert_eq!(field_text(&fields, "Copier header"), "No");
}

#[test]
fn test_hirom_extended_header() {
    let fields = load_fields::<Snes>(make_snes_hirom());
    assert_eq!(field_text(&fields, "Title"), "HIROM GAME");
    assert_eq!(field_text(&fields, "Game ID"), "ABCJ");
    assert_eq!(field_text(&fields, "ROM mapping"), "HiROM");
    assert_eq!(field_text(&fields, "ROM speed"), "FastROM");
    assert_eq!(field_text(&fields, "Cartridge type"), "ROM + SA-1 + RAM + Battery");
    assert_eq!(field_text(&fields, "Region"), "Japan");
}

#[test]
fn test_bad_checksum_reports_invalid() {
    let mut rom = make_snes_rom();
    rom[0x100] ^= 0x01;
    let fields = load_fields::<Snes>(rom);
    let text = field_text(&fields, "Checksum");
    assert!(text.contains("INVALID"), "{text}");
    assert!(text.contains("computed 0x"), "{text}");
}

#[test]
fn test_checksum_mirrors_tail() {
    // 3 MB: 2 MB main + 1 MB tail counted twice
    let mut rom = vec![0u8; 3 * 1024 * 1024];
    rom[0] = 1;
    rom[2 * 1024 * 1024] = 1;
    let mut stream = romscope_core::MemStream::new(rom);
    assert_eq!(compute_checksum(&mut stream, 0).unwrap(), 3);
}

#[test]
fn test_system_name_local() {
    let snes = open::<Snes>(make_snes_hirom());
    assert_eq!(snes.system_name(SystemNameVariant::SHORT), Some("Super NES"));
    assert_eq!(
        snes.system_name(SystemNameVariant::SHORT.rom_local()),
        Some("Super Famicom")
    );
}
