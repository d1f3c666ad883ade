use std::sync::Arc;

use super::*;
use crate::n3ds::cia::tests::{CiaSpec, build_cia};
use crate::n3ds::ncch::tests::{Crypto, build_ncch, test_keys};
use crate::n3ds::ncsd::tests::build_cci;
use crate::n3ds::smdh::tests::build_smdh;
use crate::test_util::{ctx, detect, detect_ext, field_text, load_fields, open};
use romscope_core::MemStream;

fn sample_smdh() -> Vec<u8> {
    build_smdh(&[(1, "Zelda", "Ocarina of Time 3D", "Nintendo")])
}

/// A 3DSX with an extended header pointing at an SMDH after the code.
fn make_3dsx(with_smdh: bool) -> Vec<u8> {
    let mut raw = vec![0u8; 0x200];
    raw[..4].copy_from_slice(THREEDSX_MAGIC);
    let header_len = if with_smdh { THREEDSX_EXT_HEADER_LEN } else { THREEDSX_HEADER_LEN };
    raw[4..6].copy_from_slice(&(header_len as u16).to_le_bytes());
    raw[6..8].copy_from_slice(&0x0Cu16.to_le_bytes());
    raw[0x10..0x14].copy_from_slice(&0x1000u32.to_le_bytes());
    raw[0x14..0x18].copy_from_slice(&0x400u32.to_le_bytes());
    raw[0x18..0x1C].copy_from_slice(&0x200u32.to_le_bytes());
    raw[0x1C..0x20].copy_from_slice(&0x80u32.to_le_bytes());
    if with_smdh {
        raw[0x20..0x24].copy_from_slice(&0x200u32.to_le_bytes());
        raw[0x24..0x28].copy_from_slice(&(SMDH_LEN as u32).to_le_bytes());
        raw.extend_from_slice(&sample_smdh());
    }
    raw
}

fn keyed_ctx() -> ParseContext {
    ParseContext::new(Arc::new(test_keys())).with_language("en")
}

fn open_with(data: Vec<u8>, ctx: &ParseContext) -> Nintendo3ds {
    let id = detect::<Nintendo3ds>(&data).unwrap();
    Nintendo3ds::open(Box::new(MemStream::new(data)), id, ctx).unwrap()
}

#[test]
fn test_detect() {
    assert_eq!(detect::<Nintendo3ds>(&sample_smdh()), Some(N3dsKind::Smdh as u32));
    assert_eq!(detect::<Nintendo3ds>(&make_3dsx(true)), Some(N3dsKind::Threedsx as u32));
    assert_eq!(detect::<Nintendo3ds>(&build_cci(Crypto::None)), Some(N3dsKind::Cci as u32));
    assert_eq!(detect::<Nintendo3ds>(&build_ncch(Crypto::None)), Some(N3dsKind::Ncch as u32));
    let cia = build_cia(CiaSpec::default());
    assert_eq!(detect::<Nintendo3ds>(&cia), Some(N3dsKind::Cia as u32));
    assert_eq!(
        detect_ext::<Nintendo3ds>(&cia[..0x20], Some("cia")),
        Some(N3dsKind::Cia as u32)
    );
    assert_eq!(detect::<Nintendo3ds>(&cia[..0x20]), None);
    assert_eq!(detect::<Nintendo3ds>(&[0u8; 0x400]), None);
    // Magic alone is not enough for an SMDH
    assert_eq!(detect::<Nintendo3ds>(&sample_smdh()[..0x100]), None);
}

#[test]
fn test_smdh_file() {
    let fields = load_fields::<Nintendo3ds>(sample_smdh());
    assert_eq!(field_text(&fields, "Format"), "SMDH");
    assert_eq!(field_text(&fields, "Title"), "Zelda");
    assert_eq!(field_text(&fields, "Region"), "USA");
    assert!(fields.get("Product code").is_none());

    let mut rom = open::<Nintendo3ds>(sample_smdh());
    assert_eq!(rom.file_type(), FileType::IconFile);
    let icon = rom.load_image(ImageKind::IntIcon).unwrap().unwrap();
    assert_eq!((icon.width(), icon.height()), (48, 48));
    assert!(rom.load_image(ImageKind::IntBanner).unwrap().is_none());
    assert!(rom.ext_urls(ImageKind::ExtCover, &ctx()).is_empty());
}

#[test]
fn test_3dsx() {
    let fields = load_fields::<Nintendo3ds>(make_3dsx(true));
    assert_eq!(field_text(&fields, "Format"), "3DSX");
    assert_eq!(field_text(&fields, "Title"), "Zelda");
    assert_eq!(field_text(&fields, "Code size"), "4 KB");
    assert_eq!(field_text(&fields, "BSS size"), "128 bytes");

    let mut rom = open::<Nintendo3ds>(make_3dsx(false));
    assert_eq!(rom.file_type(), FileType::Executable);
    assert!(rom.load_image(ImageKind::IntIcon).unwrap().is_none());
    let mut fields = FieldList::new();
    rom.load_fields(&ctx(), &mut fields).unwrap();
    assert!(fields.get("Title").is_none());
}

#[test]
fn test_cci_plain() {
    let fields = load_fields::<Nintendo3ds>(build_cci(Crypto::None));
    assert_eq!(field_text(&fields, "Format"), "CCI");
    assert_eq!(field_text(&fields, "Title"), "Zelda");
    assert_eq!(field_text(&fields, "Publisher"), "Nintendo");
    assert_eq!(field_text(&fields, "Product code"), "CTR-P-AQEE");
    assert_eq!(field_text(&fields, "Maker"), "Nintendo R&D1");
    assert_eq!(field_text(&fields, "Program ID"), "00040000-00033500");
    assert_eq!(field_text(&fields, "Title type"), "Application");
    assert_eq!(field_text(&fields, "Content type"), "Executable");
    assert_eq!(field_text(&fields, "Encryption"), "None (NoCrypto)");
    assert_eq!(field_text(&fields, "ExHeader SHA-256"), "OK");
    assert_eq!(field_text(&fields, "Dump status"), "Trimmed");
    assert_eq!(field_text(&fields, "Platform"), "CTR (3DS)");
}

#[test]
fn test_cci_encrypted_without_keys() {
    let fields = load_fields::<Nintendo3ds>(build_cci(Crypto::Method7x));
    assert_eq!(field_text(&fields, "Product code"), "CTR-P-AQEE");
    assert_eq!(field_text(&fields, "Encryption"), "7.0.0+ (Required key is missing)");
    assert_eq!(field_text(&fields, "ExHeader SHA-256"), "Unknown");
    // No SMDH: region comes from the product code
    assert_eq!(field_text(&fields, "Region"), "USA");
    assert!(fields.get("Title").is_none());

    let mut rom = open::<Nintendo3ds>(build_cci(Crypto::Method7x));
    assert!(rom.load_image(ImageKind::IntIcon).unwrap().is_none());
}

#[test]
fn test_cci_encrypted_with_keys() {
    let ctx = keyed_ctx();
    let mut rom = open_with(build_cci(Crypto::Method7x), &ctx);
    let mut fields = FieldList::new();
    rom.load_fields(&ctx, &mut fields).unwrap();
    assert_eq!(field_text(&fields, "Title"), "Zelda");
    assert_eq!(field_text(&fields, "Encryption"), "7.0.0+");
    assert_eq!(field_text(&fields, "ExHeader SHA-256"), "OK");
    let icon = rom.load_image(ImageKind::IntIcon).unwrap().unwrap();
    assert_eq!(icon.argb_at(0, 0), Some(0xFFFF0000));
}

#[test]
fn test_cia() {
    let fields = load_fields::<Nintendo3ds>(build_cia(CiaSpec::default()));
    assert_eq!(field_text(&fields, "Format"), "CIA");
    // Meta SMDH works without keys; the encrypted content doesn't
    assert_eq!(field_text(&fields, "Title"), "Zelda");
    assert_eq!(field_text(&fields, "Title ID"), "00040000-00033500");
    assert_eq!(field_text(&fields, "Title version"), "v1.2.3");
    assert_eq!(field_text(&fields, "Product code"), "Unknown");

    let ctx = crate::n3ds::cia::tests::test_keys();
    let ctx = ParseContext::new(Arc::new(ctx)).with_language("en");
    let mut rom = open_with(build_cia(CiaSpec::default()), &ctx);
    let mut fields = FieldList::new();
    rom.load_fields(&ctx, &mut fields).unwrap();
    assert_eq!(field_text(&fields, "Product code"), "CTR-P-AQEE");
    assert_eq!(field_text(&fields, "ExHeader SHA-256"), "OK");
    assert_eq!(rom.file_type(), FileType::ContainerFile);
}

#[test]
fn test_cia_icon_from_content() {
    let spec = CiaSpec {
        encrypted: false,
        meta: false,
        ..CiaSpec::default()
    };
    let mut rom = open::<Nintendo3ds>(build_cia(spec));
    let icon = rom.load_image(ImageKind::IntIcon).unwrap().unwrap();
    assert_eq!(icon.width(), 48);
}

#[test]
fn test_standalone_ncch() {
    let fields = load_fields::<Nintendo3ds>(build_ncch(Crypto::None));
    assert_eq!(field_text(&fields, "Format"), "NCCH (CXI)");
    assert_eq!(field_text(&fields, "Platform"), "CTR (3DS)");
    assert_eq!(field_text(&fields, "RomFS size"), "1 KB");
    assert!(fields.get("Dump status").is_none());

    let mut raw = build_ncch(Crypto::None);
    raw[0x188 + 5] = 0x01;
    let fields = load_fields::<Nintendo3ds>(raw);
    assert_eq!(field_text(&fields, "Format"), "NCCH (CFA)");
    assert!(fields.get("ExHeader SHA-256").is_none());
}

#[test]
fn test_system_name() {
    let rom = open::<Nintendo3ds>(build_cci(Crypto::None));
    assert_eq!(rom.system_name(SystemNameVariant::ABBREVIATION), Some("3DS"));

    let mut raw = build_ncch(Crypto::None);
    raw[0x188 + 4] = PLATFORM_NEW_3DS;
    let rom = open::<Nintendo3ds>(raw);
    assert_eq!(rom.system_name(SystemNameVariant::ABBREVIATION), Some("N3DS"));
}

#[test]
fn test_ext_urls() {
    let rom = open::<Nintendo3ds>(build_cci(Crypto::None));
    assert!(rom.supported_image_kinds().has(ImageKind::ExtCover));
    let urls = rom.ext_urls(ImageKind::ExtCover, &ctx());
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0].cache_key, "3ds/cover/US/AQEE.jpg");
    assert!(rom.ext_urls(ImageKind::IntIcon, &ctx()).is_empty());
}

#[test]
fn test_broken_containers() {
    // A CCI whose game partition isn't an NCCH still opens
    let mut raw = build_cci(Crypto::None);
    raw[0x4100] = b'X';
    let fields = load_fields::<Nintendo3ds>(raw);
    assert_eq!(field_text(&fields, "Product code"), "Unknown");
    assert_eq!(field_text(&fields, "Dump status"), "Trimmed");

    // A standalone NCCH must have a valid header
    let raw = build_ncch(Crypto::None)[..0x180].to_vec();
    let opened = Nintendo3ds::open(Box::new(MemStream::new(raw)), N3dsKind::Ncch as u32, &ctx());
    assert!(opened.is_err());
}

#[test]
fn test_close() {
    let mut rom = open::<Nintendo3ds>(build_cci(Crypto::None));
    rom.close();
    let mut fields = FieldList::new();
    assert!(matches!(
        rom.load_fields(&ctx(), &mut fields),
        Err(RomError::NotOpen)
    ));
}
