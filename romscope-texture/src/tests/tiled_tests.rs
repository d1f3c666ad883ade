use super::*;

#[test]
fn test_gcn16_tile_order() {
    // 8x4 image = two 4x4 tiles. Mark the first pixel of the second tile.
    let mut buf = vec![0x80, 0x00].repeat(32);
    buf[32] = 0xFC; // pixel 16 = tile 1, (0,0) -> image (4,0)
    buf[33] = 0x00;
    let bmp = from_gcn16(Pixel16::Rgb5a3, 8, 4, &buf).unwrap();
    assert_eq!(bmp.argb_at(4, 0), Some(0xFFFF_0000));
    assert_eq!(bmp.argb_at(0, 0), Some(0xFF00_0000));
    assert_eq!(bmp.argb_at(3, 3), Some(0xFF00_0000));
}

#[test]
fn test_gcn16_size_checks() {
    let buf = vec![0u8; 64];
    assert!(from_gcn16(Pixel16::Rgb565, 8, 4, &buf).is_ok());
    assert!(matches!(
        from_gcn16(Pixel16::Rgb565, 8, 4, &buf[..63]),
        Err(DecodeError::BufferTooSmall { .. })
    ));
    assert!(matches!(
        from_gcn16(Pixel16::Rgb565, 6, 4, &buf),
        Err(DecodeError::InvalidDimensions { .. })
    ));
}

#[test]
fn test_gcn_ci8_tile_order() {
    let mut pal = vec![0u32; 256];
    pal[7] = 0xFF07_0707;
    // 16x4 image = two 8x4 tiles; index 32 = tile 1 pixel (0,0) -> (8,0)
    let mut buf = vec![0u8; 64];
    buf[32] = 7;
    buf[9] = 7; // tile 0 row 1 col 1
    let bmp = from_gcn_ci8(16, 4, &buf, &pal).unwrap();
    assert_eq!(bmp.argb_at(8, 0), Some(0xFF07_0707));
    assert_eq!(bmp.argb_at(1, 1), Some(0xFF07_0707));
    assert_eq!(bmp.argb_at(0, 0), Some(0));
    assert!(bmp.validate().is_ok());
}

#[test]
fn test_gcn_argb8888_split_planes() {
    let mut buf = vec![0u8; 64];
    buf[0] = 0x80; // A
    buf[1] = 0x11; // R
    buf[32] = 0x22; // G
    buf[33] = 0x33; // B
    let bmp = from_gcn_argb8888(4, 4, &buf).unwrap();
    assert_eq!(bmp.argb_at(0, 0), Some(0x8011_2233));
    assert!(from_gcn_argb8888(4, 4, &buf[..63]).is_err());
}

#[test]
fn test_gcn_intensity() {
    let bmp = from_gcn_i8(8, 4, &[0x40; 32]).unwrap();
    assert_eq!(bmp.argb_at(7, 3), Some(0xFF40_4040));
    let bmp = from_gcn_i4(8, 8, &[0xF0; 32]).unwrap();
    assert_eq!(bmp.argb_at(0, 0), Some(0xFFFF_FFFF));
    assert_eq!(bmp.argb_at(1, 0), Some(0xFF00_0000));
    let bmp = from_gcn_ia4(8, 4, &[0x0F; 32]).unwrap();
    assert_eq!(bmp.argb_at(2, 2), Some(0x00FF_FFFF));
}

#[test]
fn test_nds_ci4_low_nibble_first_and_transparent_zero() {
    let mut pal = vec![0u32; 16];
    pal[0] = 0xFFFF_FFFF;
    pal[3] = 0xFF33_3333;
    let mut buf = vec![0u8; 32];
    buf[0] = 0x30; // pixel 0 = 0, pixel 1 = 3
    let bmp = from_nds_ci4(8, 8, &buf, &pal).unwrap();
    assert_eq!(bmp.argb_at(0, 0), Some(0));
    assert_eq!(bmp.argb_at(1, 0), Some(0xFF33_3333));
    assert_eq!(bmp.tr_idx(), Some(0));
    assert!(from_nds_ci4(8, 8, &buf[..31], &pal).is_err());
}

#[test]
fn test_morton_positions() {
    assert_eq!(morton_xy(0), (0, 0));
    assert_eq!(morton_xy(1), (1, 0));
    assert_eq!(morton_xy(2), (0, 1));
    assert_eq!(morton_xy(3), (1, 1));
    assert_eq!(morton_xy(4), (2, 0));
    assert_eq!(morton_xy(63), (7, 7));
}

#[test]
fn test_n3ds_rgb565() {
    let mut buf = vec![0u8; 8 * 8 * 2];
    // Pixel 2 in Z-order is (0, 1).
    buf[4] = 0x00;
    buf[5] = 0xF8;
    let bmp = from_n3ds_rgb565(8, 8, &buf).unwrap();
    assert_eq!(bmp.argb_at(0, 1), Some(0xFFFF_0000));
    assert_eq!(bmp.argb_at(1, 0), Some(0xFF00_0000));
    assert!(from_n3ds_rgb565(8, 8, &buf[..127]).is_err());
    assert!(from_n3ds_rgb565(12, 8, &buf).is_err());
}

#[test]
fn test_tiled_size_boundaries() {
    use crate::test_util::{Decoder, assert_size_boundary, grey_palette};

    let cases: [(&str, usize, Decoder); 8] = [
        ("gcn i8", 64, |b| from_gcn_i8(8, 8, b)),
        ("gcn ia4", 64, |b| from_gcn_ia4(8, 8, b)),
        ("gcn i4", 32, |b| from_gcn_i4(8, 8, b)),
        ("gcn ci8", 64, |b| from_gcn_ci8(8, 8, b, &grey_palette(256))),
        ("gcn ci4", 32, |b| from_gcn_ci4(8, 8, b, &grey_palette(16))),
        ("gcn argb8888", 256, |b| from_gcn_argb8888(8, 8, b)),
        ("nds ci4", 32, |b| from_nds_ci4(8, 8, b, &grey_palette(16))),
        ("3ds rgb565", 128, |b| from_n3ds_rgb565(8, 8, b)),
    ];
    for (name, min_len, decode) in cases {
        assert_size_boundary(name, min_len, decode);
    }
}
