//! Tiled layouts: GameCube/Wii, Nintendo DS and Nintendo 3DS.
//!
//! Tiles are stored row-major across the image; pixels within a tile are
//! row-major except on the 3DS, which uses Z-order (Morton) within each
//! 8x8 tile.

use romscope_core::Bitmap;

use crate::pixel::{Pixel16, argb, i4_to_argb32, i8_to_argb32, ia4_to_argb32};
use crate::{
    DecodeError, Endian, check_dims, check_len, check_palette, new_paletted, required_bytes,
};

/// Visit every pixel of a tiled image as `(x, y, index_within_image)`,
/// where the index counts pixels in storage order.
fn for_each_tiled(width: u32, height: u32, tw: u32, th: u32, mut f: impl FnMut(u32, u32, usize)) {
    let mut i = 0usize;
    for ty in (0..height).step_by(th as usize) {
        for tx in (0..width).step_by(tw as usize) {
            for py in 0..th {
                for px in 0..tw {
                    f(tx + px, ty + py, i);
                    i += 1;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// GameCube / Wii
// ---------------------------------------------------------------------------

/// GameCube 16-bit formats (RGB565, RGB5A3, IA8) in 4x4 tiles, big-endian.
pub fn from_gcn16(
    format: Pixel16,
    width: u32,
    height: u32,
    buf: &[u8],
) -> Result<Bitmap, DecodeError> {
    check_dims(width, height, 4, 4)?;
    check_len(buf, required_bytes(width, height, 16))?;

    let mut bmp = Bitmap::new_argb32(width, height);
    for_each_tiled(width, height, 4, 4, |x, y, i| {
        let px = Endian::Big.u16(&buf[i * 2..i * 2 + 2]);
        bmp.set_argb(x, y, format.to_argb32(px));
    });
    Ok(bmp)
}

/// GameCube I8: 8x4 tiles.
pub fn from_gcn_i8(width: u32, height: u32, buf: &[u8]) -> Result<Bitmap, DecodeError> {
    check_dims(width, height, 8, 4)?;
    check_len(buf, required_bytes(width, height, 8))?;

    let mut bmp = Bitmap::new_argb32(width, height);
    for_each_tiled(width, height, 8, 4, |x, y, i| {
        bmp.set_argb(x, y, i8_to_argb32(buf[i]));
    });
    Ok(bmp)
}

/// GameCube IA4: 8x4 tiles, alpha in the high nibble.
pub fn from_gcn_ia4(width: u32, height: u32, buf: &[u8]) -> Result<Bitmap, DecodeError> {
    check_dims(width, height, 8, 4)?;
    check_len(buf, required_bytes(width, height, 8))?;

    let mut bmp = Bitmap::new_argb32(width, height);
    for_each_tiled(width, height, 8, 4, |x, y, i| {
        bmp.set_argb(x, y, ia4_to_argb32(buf[i]));
    });
    Ok(bmp)
}

/// GameCube I4: 8x8 tiles, high nibble first.
pub fn from_gcn_i4(width: u32, height: u32, buf: &[u8]) -> Result<Bitmap, DecodeError> {
    check_dims(width, height, 8, 8)?;
    check_len(buf, required_bytes(width, height, 4))?;

    let mut bmp = Bitmap::new_argb32(width, height);
    for_each_tiled(width, height, 8, 8, |x, y, i| {
        let byte = buf[i / 2];
        let v = if i % 2 == 0 { byte >> 4 } else { byte & 0xF };
        bmp.set_argb(x, y, i4_to_argb32(v));
    });
    Ok(bmp)
}

/// GameCube CI8: 8x4 tiles. The palette must have 256 entries.
pub fn from_gcn_ci8(
    width: u32,
    height: u32,
    buf: &[u8],
    palette: &[u32],
) -> Result<Bitmap, DecodeError> {
    check_dims(width, height, 8, 4)?;
    check_len(buf, required_bytes(width, height, 8))?;
    check_palette(palette, 256)?;

    let mut bmp = new_paletted(width, height, palette, 256);
    for_each_tiled(width, height, 8, 4, |x, y, i| {
        bmp.set_index(x, y, buf[i]);
    });
    Ok(bmp)
}

/// GameCube CI4: 8x8 tiles, high nibble first. The palette must have 16
/// entries.
pub fn from_gcn_ci4(
    width: u32,
    height: u32,
    buf: &[u8],
    palette: &[u32],
) -> Result<Bitmap, DecodeError> {
    check_dims(width, height, 8, 8)?;
    check_len(buf, required_bytes(width, height, 4))?;
    check_palette(palette, 16)?;

    let mut bmp = new_paletted(width, height, palette, 16);
    for_each_tiled(width, height, 8, 8, |x, y, i| {
        let byte = buf[i / 2];
        bmp.set_index(x, y, if i % 2 == 0 { byte >> 4 } else { byte & 0xF });
    });
    Ok(bmp)
}

/// GameCube RGBA8: 4x4 tiles of 64 bytes; 16 AR pairs then 16 GB pairs.
pub fn from_gcn_argb8888(width: u32, height: u32, buf: &[u8]) -> Result<Bitmap, DecodeError> {
    check_dims(width, height, 4, 4)?;
    check_len(buf, required_bytes(width, height, 32))?;

    let mut bmp = Bitmap::new_argb32(width, height);
    for_each_tiled(width, height, 4, 4, |x, y, i| {
        let tile = (i / 16) * 64;
        let p = i % 16;
        let ar = &buf[tile + p * 2..tile + p * 2 + 2];
        let gb = &buf[tile + 32 + p * 2..tile + 32 + p * 2 + 2];
        bmp.set_argb(
            x,
            y,
            argb(ar[0] as u32, ar[1] as u32, gb[0] as u32, gb[1] as u32),
        );
    });
    Ok(bmp)
}

// ---------------------------------------------------------------------------
// Nintendo DS
// ---------------------------------------------------------------------------

/// Nintendo DS 4bpp: 8x8 tiles, low nibble first. Index 0 is transparent.
pub fn from_nds_ci4(
    width: u32,
    height: u32,
    buf: &[u8],
    palette: &[u32],
) -> Result<Bitmap, DecodeError> {
    check_dims(width, height, 8, 8)?;
    check_len(buf, required_bytes(width, height, 4))?;
    check_palette(palette, 16)?;

    let mut bmp = new_paletted(width, height, palette, 16);
    for_each_tiled(width, height, 8, 8, |x, y, i| {
        let byte = buf[i / 2];
        bmp.set_index(x, y, if i % 2 == 0 { byte & 0xF } else { byte >> 4 });
    });
    bmp.set_tr_idx(Some(0));
    Ok(bmp)
}

// ---------------------------------------------------------------------------
// Nintendo 3DS
// ---------------------------------------------------------------------------

/// Position of the `i`th pixel of an 8x8 Z-order tile.
fn morton_xy(i: usize) -> (u32, u32) {
    let x = (i & 1) | ((i >> 1) & 2) | ((i >> 2) & 4);
    let y = ((i >> 1) & 1) | ((i >> 2) & 2) | ((i >> 3) & 4);
    (x as u32, y as u32)
}

/// Nintendo 3DS RGB565: 8x8 tiles, Z-order within each tile, little-endian.
pub fn from_n3ds_rgb565(width: u32, height: u32, buf: &[u8]) -> Result<Bitmap, DecodeError> {
    check_dims(width, height, 8, 8)?;
    check_len(buf, required_bytes(width, height, 16))?;

    let mut bmp = Bitmap::new_argb32(width, height);
    let mut i = 0usize;
    for ty in (0..height).step_by(8) {
        for tx in (0..width).step_by(8) {
            for p in 0..64 {
                let (mx, my) = morton_xy(p);
                let px = Endian::Little.u16(&buf[i * 2..i * 2 + 2]);
                bmp.set_argb(tx + mx, ty + my, Pixel16::Rgb565.to_argb32(px));
                i += 1;
            }
        }
    }
    Ok(bmp)
}

#[cfg(test)]
#[path = "tests/tiled_tests.rs"]
mod tests;
