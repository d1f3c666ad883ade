use super::*;
use crate::test_util::{ctx, detect, field_text, load_fields, open};
use romscope_core::{FieldList, MemStream, SaveVariantPrecedence};

/// Opaque red in PlayStation BGR555.
const RED: u16 = 0x001F;
/// Opaque blue in PlayStation BGR555.
const BLUE: u16 = 0x7C00;

/// One block of save data: the SC frame, `frames` icon frames (frame `i`
/// filled with palette index `i + 1`), then filler.
fn make_blocks(frames: u8, blocks: u8) -> Vec<u8> {
    let mut buf = vec![0u8; FRAME_LEN];
    buf[..2].copy_from_slice(SC_MAGIC);
    buf[SC_OFF_ICON_FLAG] = 0x10 + frames;
    buf[SC_OFF_BLOCKS] = blocks;
    // "ＲＩＤＧＥ" in full-width Shift-JIS, then an ASCII suffix
    let title = [0x82, 0x71, 0x82, 0x68, 0x82, 0x63, 0x82, 0x66, 0x82, 0x64, b' ', b'R'];
    buf[SC_OFF_TITLE..SC_OFF_TITLE + title.len()].copy_from_slice(&title);
    for (i, color) in [0u16, RED, BLUE, RED].iter().enumerate() {
        let off = SC_OFF_PALETTE + i * 2;
        buf[off..off + 2].copy_from_slice(&color.to_le_bytes());
    }
    for i in 0..frames {
        let n = i + 1;
        let mut frame = vec![(n << 4) | n; ICON_LEN];
        frame.resize(FRAME_LEN, 0);
        buf.extend(frame);
    }
    buf.resize(blocks as usize * BLOCK_LEN as usize, 0x5A);
    buf
}

fn make_mcs(payload: &[u8], name: &str) -> Vec<u8> {
    let mut frame = vec![0u8; FRAME_LEN];
    frame[MCS_OFF_STATE..MCS_OFF_STATE + 4].copy_from_slice(&MCS_STATE_FIRST.to_le_bytes());
    frame[MCS_OFF_SIZE..MCS_OFF_SIZE + 4].copy_from_slice(&(payload.len() as u32).to_le_bytes());
    frame[MCS_OFF_NEXT..MCS_OFF_NEXT + 2].copy_from_slice(&0xFFFFu16.to_le_bytes());
    frame[MCS_OFF_FILENAME..MCS_OFF_FILENAME + name.len()].copy_from_slice(name.as_bytes());
    frame[MCS_OFF_CHECKSUM] = frame_checksum(&frame);
    frame.extend_from_slice(payload);
    frame
}

fn make_psv(payload: &[u8], name: &str) -> Vec<u8> {
    let mut h = vec![0u8; PSV_HEADER_LEN];
    h[..4].copy_from_slice(PSV_MAGIC);
    h[0x38..0x3C].copy_from_slice(&0x14u32.to_le_bytes());
    h[PSV_OFF_TYPE..PSV_OFF_TYPE + 4].copy_from_slice(&PSV_TYPE_PS1.to_le_bytes());
    h[PSV_OFF_SAVE_SIZE..PSV_OFF_SAVE_SIZE + 4]
        .copy_from_slice(&(payload.len() as u32).to_le_bytes());
    h[PSV_OFF_DATA..PSV_OFF_DATA + 4].copy_from_slice(&(PSV_HEADER_LEN as u32).to_le_bytes());
    h[PSV_OFF_FILENAME..PSV_OFF_FILENAME + name.len()].copy_from_slice(name.as_bytes());
    h.extend_from_slice(payload);
    h
}

#[test]
fn test_detect_variants() {
    let raw = make_blocks(1, 1);
    assert_eq!(detect::<PlayStationSave>(&raw), Some(SaveKind::Raw as u32));
    let mcs = make_mcs(&raw, "BASLUS-00594RIDGE");
    assert_eq!(detect::<PlayStationSave>(&mcs), Some(SaveKind::Mcs as u32));
    let psv = make_psv(&raw, "BESLES-01234SAVE");
    assert_eq!(detect::<PlayStationSave>(&psv), Some(SaveKind::Psv as u32));
}

#[test]
fn test_detect_rejects() {
    assert_eq!(detect::<PlayStationSave>(&[]), None);
    assert_eq!(detect::<PlayStationSave>(&vec![0u8; 0x2000]), None);
    // Not a whole number of blocks
    let mut raw = make_blocks(1, 1);
    raw.push(0);
    assert_eq!(detect::<PlayStationSave>(&raw), None);
    // Bad icon flag
    let mut raw = make_blocks(1, 1);
    raw[SC_OFF_ICON_FLAG] = 0x14;
    assert_eq!(detect::<PlayStationSave>(&raw), None);
    // MCS frame not marked as the start of a file
    let mut mcs = make_mcs(&make_blocks(1, 1), "BASLUS-00594RIDGE");
    mcs[MCS_OFF_STATE] = 0xA0;
    assert_eq!(detect::<PlayStationSave>(&mcs), None);
}

#[test]
fn test_detect_follows_precedence() {
    let raw = make_blocks(1, 1);
    let precedence = SaveVariantPrecedence::new(vec![SaveVariant::Ps1Mcs]);
    let info = DetectInfo {
        header: &raw[..PlayStationSave::HEADER_SIZE],
        size: raw.len() as u64,
        ext: None,
        save_precedence: &precedence,
    };
    // MCS is tried first but fails its checks; raw still matches.
    assert_eq!(PlayStationSave::detect(&info), Some(SaveKind::Raw as u32));
}

#[test]
fn test_raw_fields() {
    let fields = load_fields::<PlayStationSave>(make_blocks(2, 1));
    assert_eq!(field_text(&fields, "Save format"), "Raw save blocks");
    assert_eq!(field_text(&fields, "Title"), "RIDGE R");
    assert_eq!(field_text(&fields, "Blocks"), "1");
    assert_eq!(field_text(&fields, "Icon frames"), "2");
    assert!(fields.get("File name").is_none());
    assert!(fields.get("PocketStation icon frames").is_none());
}

#[test]
fn test_mcs_fields() {
    let mcs = make_mcs(&make_blocks(1, 2), "BASLUS-00594RIDGE");
    let fields = load_fields::<PlayStationSave>(mcs.clone());
    assert_eq!(field_text(&fields, "Save format"), "MCS (single save)");
    assert_eq!(field_text(&fields, "File name"), "BASLUS-00594RIDGE");
    assert_eq!(field_text(&fields, "Product code"), "SLUS-00594");
    assert_eq!(field_text(&fields, "Region"), "USA");
    assert_eq!(field_text(&fields, "Save name"), "RIDGE");
    assert_eq!(field_text(&fields, "Blocks"), "2");
    assert_eq!(field_text(&fields, "Declared size"), "16384");
    assert!(field_text(&fields, "Directory checksum").ends_with("(valid)"));

    let mut bad = mcs;
    bad[MCS_OFF_CHECKSUM] ^= 0xFF;
    let fields = load_fields::<PlayStationSave>(bad);
    assert!(field_text(&fields, "Directory checksum").contains("INVALID"));
}

#[test]
fn test_psv_fields() {
    let psv = make_psv(&make_blocks(3, 1), "BISLPS-01234GAME");
    let fields = load_fields::<PlayStationSave>(psv);
    assert_eq!(field_text(&fields, "Save format"), "PSV (PS3 export)");
    assert_eq!(field_text(&fields, "Product code"), "SLPS-01234");
    assert_eq!(field_text(&fields, "Region"), "Japan");
    assert_eq!(field_text(&fields, "Declared size"), "8192");
}

#[test]
fn test_unparsed_filename_and_pocketstation() {
    let mut raw = make_blocks(1, 1);
    raw[SC_OFF_MCX_FRAMES] = 2;
    let fields = load_fields::<PlayStationSave>(make_mcs(&raw, "MYSAVE"));
    assert_eq!(field_text(&fields, "File name"), "MYSAVE");
    assert!(fields.get("Product code").is_none());
    assert_eq!(field_text(&fields, "PocketStation icon frames"), "2");
}

#[test]
fn test_parse_filename() {
    let parsed = parse_filename("BESCES-00344TEKKEN").unwrap();
    assert_eq!(parsed.region, "Europe");
    assert_eq!(parsed.product, "SCES-00344");
    assert_eq!(parsed.suffix, "TEKKEN");
    assert!(parse_filename("BXSLUS-00594").is_none());
    assert!(parse_filename("BASLUS").is_none());
}

#[test]
fn test_icon() {
    let mut save = open::<PlayStationSave>(make_blocks(1, 1));
    assert!(save.supported_image_kinds().has(ImageKind::IntIcon));
    let icon = save.load_image(ImageKind::IntIcon).unwrap().unwrap();
    assert_eq!((icon.width(), icon.height()), (16, 16));
    assert_eq!(icon.argb_at(0, 0), Some(0xFFFF_0000));
    assert!(save.load_image(ImageKind::IntBanner).unwrap().is_none());
    assert!(save.animated_icon().unwrap().is_none());
}

#[test]
fn test_animated_icon() {
    let psv = make_psv(&make_blocks(3, 1), "BISLPS-01234GAME");
    let mut save = open::<PlayStationSave>(psv);
    let anim = save.animated_icon().unwrap().unwrap();
    assert_eq!(anim.frames().len(), 3);
    assert_eq!(anim.sequence()[0].delay_ms, 183);
    assert_eq!(anim.frames()[1].argb_at(15, 15), Some(0xFF00_00FF));

    let mut save = open::<PlayStationSave>(make_blocks(2, 1));
    let anim = save.animated_icon().unwrap().unwrap();
    assert_eq!(anim.sequence()[1].delay_ms, 266);
}

#[test]
fn test_transparent_palette_entry() {
    assert_eq!(ps1_to_argb32(0), 0);
    let mut raw = make_blocks(1, 1);
    let first_icon = FRAME_LEN;
    raw[first_icon] = 0x10;
    let mut save = open::<PlayStationSave>(raw);
    let icon = save.load_image(ImageKind::IntIcon).unwrap().unwrap();
    // Low nibble is the left pixel
    assert_eq!(icon.argb_at(0, 0), Some(0));
    assert_eq!(icon.argb_at(1, 0), Some(0xFFFF_0000));
}

#[test]
fn test_system_name_and_close() {
    let mut save = open::<PlayStationSave>(make_blocks(1, 1));
    assert_eq!(save.system_name(SystemNameVariant::ABBREVIATION), Some("PS1"));
    assert_eq!(save.file_type(), FileType::SaveFile);
    save.close();
    let mut fields = FieldList::new();
    assert!(matches!(save.load_fields(&ctx(), &mut fields), Err(RomError::NotOpen)));
    assert!(matches!(save.load_image(ImageKind::IntIcon), Err(RomError::NotOpen)));

    assert!(PlayStationSave::open(Box::new(MemStream::new(vec![0u8; 0x100])), 2, &ctx()).is_err());
}
