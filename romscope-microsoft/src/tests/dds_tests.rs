use super::*;
use crate::test_util::{ctx, detect, field_text, load_fields, open};
use romscope_core::MemStream;

fn header(width: u32, height: u32) -> Vec<u8> {
    let mut h = vec![0u8; DATA_OFFSET as usize];
    h[..4].copy_from_slice(DDS_MAGIC);
    h[OFF_SIZE..OFF_SIZE + 4].copy_from_slice(&DDS_HEADER_LEN.to_le_bytes());
    h[OFF_FLAGS..OFF_FLAGS + 4].copy_from_slice(&0x1007u32.to_le_bytes());
    h[OFF_HEIGHT..OFF_HEIGHT + 4].copy_from_slice(&height.to_le_bytes());
    h[OFF_WIDTH..OFF_WIDTH + 4].copy_from_slice(&width.to_le_bytes());
    h[0x4C..0x50].copy_from_slice(&32u32.to_le_bytes());
    h
}

fn set_u32(buf: &mut [u8], off: usize, value: u32) {
    buf[off..off + 4].copy_from_slice(&value.to_le_bytes());
}

fn fourcc(width: u32, height: u32, code: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut h = header(width, height);
    set_u32(&mut h, OFF_PF_FLAGS, DDPF_FOURCC);
    h[OFF_PF_FOURCC..OFF_PF_FOURCC + 4].copy_from_slice(code);
    h.extend_from_slice(data);
    h
}

fn rgb(width: u32, height: u32, bits: u32, masks: [u32; 4], alpha: bool, data: &[u8]) -> Vec<u8> {
    let mut h = header(width, height);
    let flags = DDPF_RGB | if alpha { DDPF_ALPHAPIXELS } else { 0 };
    set_u32(&mut h, OFF_PF_FLAGS, flags);
    set_u32(&mut h, OFF_PF_BITS, bits);
    for (i, m) in masks.iter().enumerate() {
        set_u32(&mut h, OFF_PF_MASKS + i * 4, *m);
    }
    h.extend_from_slice(data);
    h
}

fn dx10(width: u32, height: u32, dxgi: u32, data: &[u8]) -> Vec<u8> {
    let mut h = fourcc(width, height, b"DX10", &[]);
    let mut ext = vec![0u8; DX10_HEADER_LEN];
    set_u32(&mut ext, 0, dxgi);
    set_u32(&mut ext, 4, 3);
    set_u32(&mut ext, 12, 1);
    h.extend(ext);
    h.extend_from_slice(data);
    h
}

/// A DXT1 block of solid red.
const RED_DXT1: [u8; 8] = [0x00, 0xF8, 0x00, 0xF8, 0, 0, 0, 0];

fn decode(data: Vec<u8>) -> Bitmap {
    let mut tex = open::<DirectDrawSurface>(data);
    tex.load_image(ImageKind::IntImage).unwrap().unwrap()
}

#[test]
fn test_detect() {
    assert_eq!(detect::<DirectDrawSurface>(&fourcc(4, 4, b"DXT1", &RED_DXT1)), Some(0));
    assert_eq!(detect::<DirectDrawSurface>(&dx10(4, 4, 71, &RED_DXT1)), Some(0));
}

#[test]
fn test_detect_rejects() {
    assert_eq!(detect::<DirectDrawSurface>(&[]), None);
    let mut bad_size = fourcc(4, 4, b"DXT1", &RED_DXT1);
    set_u32(&mut bad_size, OFF_SIZE, 100);
    assert_eq!(detect::<DirectDrawSurface>(&bad_size), None);
    assert_eq!(detect::<DirectDrawSurface>(&fourcc(0, 4, b"DXT1", &[])), None);
    // DX10 header cut off
    let mut short = dx10(4, 4, 71, &[]);
    short.truncate(DATA_OFFSET as usize + 8);
    assert_eq!(detect::<DirectDrawSurface>(&short), None);
}

#[test]
fn test_dxt1() {
    let bmp = decode(fourcc(4, 4, b"DXT1", &RED_DXT1));
    assert_eq!((bmp.width(), bmp.height()), (4, 4));
    assert_eq!(bmp.argb_at(3, 3), Some(0xFFFF_0000));
}

#[test]
fn test_dxt1_odd_size_is_cropped() {
    let data: Vec<u8> = std::iter::repeat_n(RED_DXT1, 4).flatten().collect();
    let bmp = decode(fourcc(6, 5, b"DXT1", &data));
    assert_eq!((bmp.width(), bmp.height()), (6, 5));
    assert_eq!(bmp.argb_at(5, 4), Some(0xFFFF_0000));
}

#[test]
fn test_dxt3_and_dxt5() {
    let mut block = vec![0xFFu8; 8];
    block.extend_from_slice(&RED_DXT1);
    let bmp = decode(fourcc(4, 4, b"DXT3", &block));
    assert_eq!(bmp.argb_at(0, 0), Some(0xFFFF_0000));

    // Alpha endpoints 0x80/0x80 with all indices 0
    let mut block = vec![0x80, 0x80, 0, 0, 0, 0, 0, 0];
    block.extend_from_slice(&RED_DXT1);
    let bmp = decode(fourcc(4, 4, b"DXT5", &block));
    assert_eq!(bmp.argb_at(2, 2), Some(0x80FF_0000));
}

#[test]
fn test_uncompressed_argb8888() {
    let masks = [0xFF_0000, 0xFF00, 0xFF, 0xFF00_0000];
    let px = 0x8012_3456u32.to_le_bytes();
    let data: Vec<u8> = std::iter::repeat_n(px, 4).flatten().collect();
    let tex = rgb(2, 2, 32, masks, true, &data);
    let fields = load_fields::<DirectDrawSurface>(tex.clone());
    assert_eq!(field_text(&fields, "Texture format"), "ARGB8888");
    assert_eq!(decode(tex).argb_at(1, 1), Some(0x8012_3456));
}

#[test]
fn test_alpha_mask_ignored_without_flag() {
    let masks = [0xFF_0000, 0xFF00, 0xFF, 0xFF00_0000];
    let data: Vec<u8> = std::iter::repeat_n(0x0012_3456u32.to_le_bytes(), 4).flatten().collect();
    let tex = rgb(2, 2, 32, masks, false, &data);
    let fields = load_fields::<DirectDrawSurface>(tex.clone());
    assert_eq!(field_text(&fields, "Texture format"), "xRGB8888");
    assert_eq!(decode(tex).argb_at(0, 0), Some(0xFF12_3456));
}

#[test]
fn test_uncompressed_with_pitch() {
    // RGB565, 2x2, rows padded to 8 bytes
    let mut data = vec![0u8; 8 * 2];
    data[0..2].copy_from_slice(&0xF800u16.to_le_bytes());
    data[10..12].copy_from_slice(&0x001Fu16.to_le_bytes());
    let mut tex = rgb(2, 2, 16, [0xF800, 0x07E0, 0x001F, 0], false, &data);
    set_u32(&mut tex, OFF_FLAGS, 0x100F);
    set_u32(&mut tex, OFF_PITCH, 8);
    let bmp = decode(tex);
    assert_eq!(bmp.argb_at(0, 0), Some(0xFFFF_0000));
    assert_eq!(bmp.argb_at(1, 1), Some(0xFF00_00FF));
}

#[test]
fn test_dx10() {
    let tex = dx10(4, 4, 71, &RED_DXT1);
    let fields = load_fields::<DirectDrawSurface>(tex.clone());
    assert_eq!(field_text(&fields, "Texture format"), "DXGI BC1_UNORM");
    assert_eq!(decode(tex).argb_at(0, 0), Some(0xFFFF_0000));

    let mut tex = open::<DirectDrawSurface>(dx10(4, 4, 98, &[0; 16]));
    let mut fields = FieldList::new();
    tex.load_fields(&ctx(), &mut fields).unwrap();
    assert_eq!(field_text(&fields, "Texture format"), "DXGI format 98");
    assert!(tex.supported_image_kinds().is_empty());
    assert!(tex.load_image(ImageKind::IntImage).unwrap().is_none());
}

#[test]
fn test_fields() {
    let mut tex = fourcc(8, 4, b"DXT5", &[0; 32]);
    set_u32(&mut tex, OFF_FLAGS, 0x1007 | DDSD_MIPMAPCOUNT);
    set_u32(&mut tex, OFF_MIP_COUNT, 4);
    set_u32(&mut tex, OFF_CAPS2, DDSCAPS2_CUBEMAP);
    let fields = load_fields::<DirectDrawSurface>(tex);
    assert_eq!(field_text(&fields, "Texture format"), "DXT5");
    assert_eq!(field_text(&fields, "Dimensions"), "8x4");
    assert_eq!(field_text(&fields, "Mipmap levels"), "4");
    assert_eq!(field_text(&fields, "Cube map"), "Yes");
    assert!(fields.get("Depth").is_none());
}

#[test]
fn test_unsupported_formats() {
    let mut tex = header(4, 4);
    set_u32(&mut tex, OFF_PF_FLAGS, DDPF_LUMINANCE);
    set_u32(&mut tex, OFF_PF_BITS, 8);
    tex.extend_from_slice(&[0; 16]);
    let fields = load_fields::<DirectDrawSurface>(tex.clone());
    assert_eq!(field_text(&fields, "Texture format"), "8-bit luminance");
    assert!(open::<DirectDrawSurface>(tex).supported_image_kinds().is_empty());

    let fields = load_fields::<DirectDrawSurface>(fourcc(4, 4, b"ATI2", &[0; 16]));
    assert_eq!(field_text(&fields, "Texture format"), "ATI2");
}

#[test]
fn test_truncated_surface() {
    let mut tex = open::<DirectDrawSurface>(fourcc(8, 8, b"DXT1", &RED_DXT1));
    assert!(tex.supported_image_kinds().has(ImageKind::IntImage));
    assert!(tex.load_image(ImageKind::IntImage).is_err());
}

#[test]
fn test_system_name_and_close() {
    let mut tex = open::<DirectDrawSurface>(fourcc(4, 4, b"DXT1", &RED_DXT1));
    assert_eq!(tex.system_name(SystemNameVariant::SHORT), Some("DirectX"));
    assert_eq!(tex.file_type(), FileType::TextureFile);
    assert!(tex.load_image(ImageKind::IntIcon).unwrap().is_none());
    tex.close();
    let mut fields = FieldList::new();
    assert!(matches!(tex.load_fields(&ctx(), &mut fields), Err(RomError::NotOpen)));
    assert!(matches!(tex.load_image(ImageKind::IntImage), Err(RomError::NotOpen)));

    let opened =
        DirectDrawSurface::open(Box::new(MemStream::new(vec![0u8; 0x100])), 0, &ctx());
    assert!(opened.is_err());
}
