use super::*;
use crate::test_util::{ctx, detect, field_text, load_fields, open};
use romscope_core::MemStream;

fn pvr(pixel: u8, data_type: u8, w: u16, h: u16, data: &[u8], gbix: Option<u32>) -> Vec<u8> {
    let mut out = Vec::new();
    if let Some(index) = gbix {
        out.extend_from_slice(GBIX_MAGIC);
        out.extend_from_slice(&8u32.to_le_bytes());
        out.extend_from_slice(&index.to_le_bytes());
        out.extend_from_slice(&[0; 4]);
    }
    out.extend_from_slice(PVRT_MAGIC);
    out.extend_from_slice(&(data.len() as u32 + 8).to_le_bytes());
    out.extend_from_slice(&[pixel, data_type, 0, 0]);
    out.extend_from_slice(&w.to_le_bytes());
    out.extend_from_slice(&h.to_le_bytes());
    out.extend_from_slice(data);
    out
}

fn gvr(flags: u8, format: u8, w: u16, h: u16, data: &[u8], gcix: Option<u32>) -> Vec<u8> {
    let mut out = Vec::new();
    if let Some(index) = gcix {
        out.extend_from_slice(GCIX_MAGIC);
        out.extend_from_slice(&8u32.to_le_bytes());
        out.extend_from_slice(&index.to_be_bytes());
        out.extend_from_slice(&[0; 4]);
    }
    out.extend_from_slice(GVRT_MAGIC);
    out.extend_from_slice(&(data.len() as u32 + 8).to_le_bytes());
    out.extend_from_slice(&[0, 0, flags, format]);
    out.extend_from_slice(&w.to_be_bytes());
    out.extend_from_slice(&h.to_be_bytes());
    out.extend_from_slice(data);
    out
}

fn fill16_le(count: usize, px: u16) -> Vec<u8> {
    std::iter::repeat_n(px.to_le_bytes(), count).flatten().collect()
}

fn decode(data: Vec<u8>) -> Bitmap {
    let mut tex = open::<SegaPvr>(data);
    tex.load_image(ImageKind::IntImage).unwrap().unwrap()
}

#[test]
fn test_detect() {
    let data = pvr(1, 1, 4, 4, &fill16_le(16, 0), None);
    assert_eq!(detect::<SegaPvr>(&data), Some(TexKind::Pvr as u32));
    let data = pvr(1, 1, 4, 4, &fill16_le(16, 0), Some(7));
    assert_eq!(detect::<SegaPvr>(&data), Some(TexKind::Pvr as u32));
    let data = gvr(0, 5, 4, 4, &[0; 32], Some(7));
    assert_eq!(detect::<SegaPvr>(&data), Some(TexKind::Gvr as u32));
}

#[test]
fn test_detect_rejects() {
    assert_eq!(detect::<SegaPvr>(&[]), None);
    assert_eq!(detect::<SegaPvr>(&[0u8; 0x40]), None);
    // Zero width
    assert_eq!(detect::<SegaPvr>(&pvr(1, 1, 0, 4, &[], None)), None);
    // Unknown data type and pixel format
    assert_eq!(detect::<SegaPvr>(&pvr(1, 0x42, 4, 4, &[], None)), None);
    assert_eq!(detect::<SegaPvr>(&pvr(9, 1, 4, 4, &[], None)), None);
    assert_eq!(detect::<SegaPvr>(&gvr(0, 7, 4, 4, &[], None)), None);
    // Oversized global index chunk
    let mut data = pvr(1, 1, 4, 4, &[], Some(1));
    data[4..8].copy_from_slice(&0x100u32.to_le_bytes());
    assert_eq!(detect::<SegaPvr>(&data), None);
}

#[test]
fn test_twiddled() {
    // Storage index 1 is pixel (0, 1)
    let mut data = fill16_le(16, 0x0000);
    data[2..4].copy_from_slice(&0xF800u16.to_le_bytes());
    let bmp = decode(pvr(1, 0x01, 4, 4, &data, None));
    assert_eq!((bmp.width(), bmp.height()), (4, 4));
    assert_eq!(bmp.argb_at(0, 1), Some(0xFFFF_0000));
    assert_eq!(bmp.argb_at(1, 0), Some(0xFF00_0000));
}

#[test]
fn test_twiddled_mipmapped_skips_small_levels() {
    assert_eq!(twiddled_mip_skip(4), 16);
    let mut data = fill16_le(8, 0x001F);
    data.extend(fill16_le(16, 0xF800));
    let bmp = decode(pvr(1, 0x02, 4, 4, &data, None));
    assert_eq!(bmp.argb_at(0, 0), Some(0xFFFF_0000));
    assert_eq!(bmp.argb_at(3, 3), Some(0xFFFF_0000));
}

#[test]
fn test_twiddled_rectangle() {
    let bmp = decode(pvr(2, 0x0D, 8, 4, &fill16_le(32, 0xF0F0), None));
    assert_eq!((bmp.width(), bmp.height()), (8, 4));
    assert_eq!(bmp.argb_at(7, 3), Some(0xFF00_FF00));
}

#[test]
fn test_vq() {
    let mut data = vec![0u8; VQ_ENTRIES * VQ_ENTRY_LEN];
    data[..8].copy_from_slice(&fill16_le(4, 0x07E0));
    data.extend_from_slice(&[0; 4]);
    let bmp = decode(pvr(1, 0x03, 4, 4, &data, None));
    assert_eq!(bmp.argb_at(2, 3), Some(0xFF00_FF00));
}

#[test]
fn test_vq_mipmapped() {
    assert_eq!(vq_mip_skip(4), 2);
    assert_eq!(vq_mip_skip(8), 6);
    let mut data = vec![0u8; VQ_ENTRIES * VQ_ENTRY_LEN];
    data[8..16].copy_from_slice(&fill16_le(4, 0x07E0));
    // Two index bytes of small levels pointing at entry 0, then the
    // full-size level pointing at entry 1.
    data.extend_from_slice(&[0, 0, 1, 1, 1, 1]);
    let bmp = decode(pvr(1, 0x04, 4, 4, &data, None));
    assert_eq!(bmp.argb_at(0, 0), Some(0xFF00_FF00));
}

#[test]
fn test_small_vq() {
    let entries = small_vq_codebook_entries(8, false);
    assert_eq!(entries, 16);
    let mut data = vec![0u8; entries * VQ_ENTRY_LEN];
    data[8..16].copy_from_slice(&fill16_le(4, 0x001F));
    data.extend_from_slice(&[1; 16]);
    let bmp = decode(pvr(1, 0x10, 8, 8, &data, None));
    assert_eq!(bmp.argb_at(7, 7), Some(0xFF00_00FF));
}

#[test]
fn test_rectangle() {
    let bmp = decode(pvr(0, 0x09, 8, 4, &fill16_le(32, 0xFC00), None));
    assert_eq!((bmp.width(), bmp.height()), (8, 4));
    assert_eq!(bmp.argb_at(7, 3), Some(0xFFFF_0000));
}

#[test]
fn test_pvr_fields() {
    let fields = load_fields::<SegaPvr>(pvr(1, 0x02, 4, 4, &[0; 48], Some(42)));
    assert_eq!(field_text(&fields, "Texture format"), "PVR");
    assert_eq!(field_text(&fields, "Global index"), "42");
    assert_eq!(field_text(&fields, "Pixel format"), "RGB565");
    assert_eq!(field_text(&fields, "Data type"), "Twiddled");
    assert_eq!(field_text(&fields, "Dimensions"), "4x4");
    assert_eq!(field_text(&fields, "Mipmapped"), "Yes");

    let fields = load_fields::<SegaPvr>(pvr(0, 0x09, 8, 4, &[0; 64], None));
    assert!(fields.get("Global index").is_none());
    assert_eq!(field_text(&fields, "Mipmapped"), "No");
}

#[test]
fn test_paletted_pvr_not_decoded() {
    let data = pvr(6, 0x07, 8, 8, &[0; 64], None);
    let fields = load_fields::<SegaPvr>(data.clone());
    assert_eq!(field_text(&fields, "Pixel format"), "8-bit paletted");
    assert_eq!(field_text(&fields, "Data type"), "CI8");

    let mut tex = open::<SegaPvr>(data);
    assert!(tex.supported_image_kinds().is_empty());
    assert!(tex.load_image(ImageKind::IntImage).unwrap().is_none());
}

#[test]
fn test_truncated_data_is_an_error() {
    let mut tex = open::<SegaPvr>(pvr(1, 0x01, 8, 8, &fill16_le(16, 0), None));
    assert!(tex.supported_image_kinds().has(ImageKind::IntImage));
    assert!(tex.load_image(ImageKind::IntImage).is_err());
}

#[test]
fn test_gvr_rgb5a3() {
    let data: Vec<u8> = std::iter::repeat_n([0x80u8, 0x1F], 16).flatten().collect();
    let bmp = decode(gvr(0, 5, 4, 4, &data, None));
    assert_eq!(bmp.argb_at(3, 3), Some(0xFF00_00FF));
}

#[test]
fn test_gvr_ci8_internal_palette() {
    let mut data = vec![0u8; 512];
    data[10..12].copy_from_slice(&0xF800u16.to_be_bytes());
    data.extend_from_slice(&[5; 32]);
    let tex = gvr(0x18, 9, 8, 4, &data, Some(3));
    let fields = load_fields::<SegaPvr>(tex.clone());
    assert_eq!(field_text(&fields, "Texture format"), "GVR");
    assert_eq!(field_text(&fields, "Global index"), "3");
    assert_eq!(field_text(&fields, "Pixel format"), "CI8");
    assert_eq!(field_text(&fields, "Palette"), "Internal (RGB565)");

    let bmp = decode(tex);
    assert_eq!(bmp.argb_at(7, 3), Some(0xFFFF_0000));
}

#[test]
fn test_gvr_external_palette() {
    let tex = gvr(GVR_FLAG_EXT_PALETTE, 8, 8, 8, &[0; 32], None);
    let fields = load_fields::<SegaPvr>(tex.clone());
    assert_eq!(field_text(&fields, "Palette"), "External");
    let mut tex = open::<SegaPvr>(tex);
    assert!(tex.supported_image_kinds().is_empty());
    assert!(tex.load_image(ImageKind::IntImage).unwrap().is_none());
}

#[test]
fn test_gvr_cmpr() {
    let block = [0xFF, 0xFF, 0x00, 0x00, 0, 0, 0, 0];
    let data: Vec<u8> = std::iter::repeat_n(block, 4).flatten().collect();
    let tex = gvr(GVR_FLAG_MIPMAPS, 0xE, 8, 8, &data, None);
    let fields = load_fields::<SegaPvr>(tex.clone());
    assert_eq!(field_text(&fields, "Pixel format"), "CMPR");
    assert_eq!(field_text(&fields, "Mipmapped"), "Yes");
    assert!(fields.get("Palette").is_none());
    let bmp = decode(tex);
    assert_eq!(bmp.argb_at(5, 6), Some(0xFFFF_FFFF));
}

#[test]
fn test_system_names() {
    let tex = open::<SegaPvr>(pvr(1, 1, 4, 4, &[0; 32], None));
    assert_eq!(tex.system_name(SystemNameVariant::SHORT), Some("Dreamcast"));
    assert_eq!(tex.file_type(), FileType::TextureFile);
    let tex = open::<SegaPvr>(gvr(0, 5, 4, 4, &[0; 32], None));
    assert_eq!(tex.system_name(SystemNameVariant::SHORT), Some("GameCube"));
}

#[test]
fn test_open_wrong_kind_and_close() {
    let data = pvr(1, 1, 4, 4, &[0; 32], None);
    let opened = SegaPvr::open(Box::new(MemStream::new(data.clone())), TexKind::Gvr as u32, &ctx());
    assert!(opened.is_err());

    let mut tex = open::<SegaPvr>(data);
    tex.close();
    let mut fields = FieldList::new();
    assert!(matches!(tex.load_fields(&ctx(), &mut fields), Err(RomError::NotOpen)));
    assert!(matches!(tex.load_image(ImageKind::IntImage), Err(RomError::NotOpen)));
}
