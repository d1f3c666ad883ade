//! Row-major (untiled) pixel layouts.

use romscope_core::Bitmap;

use crate::pixel::{Pixel16, argb};
use crate::{
    DecodeError, Endian, check_dims, check_len, check_palette, new_paletted, required_bytes,
};

/// Nibble order for 4bpp data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NibbleOrder {
    /// Left pixel in the high nibble (Dreamcast)
    HighFirst,
    /// Left pixel in the low nibble (DS, PlayStation)
    LowFirst,
}

/// Resolve a row stride: 0 means tightly packed.
fn row_stride(width: u32, bits: usize, stride: usize) -> Result<usize, DecodeError> {
    let packed = (width as usize * bits).div_ceil(8);
    match stride {
        0 => Ok(packed),
        s if s >= packed => Ok(s),
        _ => Err(DecodeError::InvalidDimensions { width, height: 0 }),
    }
}

fn needed(stride: usize, packed_row: usize, height: u32) -> usize {
    stride * (height as usize - 1) + packed_row
}

/// 16-bit direct colour. `stride` is the source row pitch in bytes
/// (0 = `width * 2`).
pub fn from_linear16(
    format: Pixel16,
    width: u32,
    height: u32,
    buf: &[u8],
    endian: Endian,
    stride: usize,
) -> Result<Bitmap, DecodeError> {
    check_dims(width, height, 1, 1)?;
    let stride = row_stride(width, 16, stride)?;
    check_len(buf, needed(stride, width as usize * 2, height))?;

    let mut bmp = Bitmap::new_argb32(width, height);
    for y in 0..height {
        let row = &buf[y as usize * stride..];
        for x in 0..width {
            let off = x as usize * 2;
            bmp.set_argb(x, y, format.to_argb32(endian.u16(&row[off..off + 2])));
        }
    }
    Ok(bmp)
}

/// 24-bit colour stored as B, G, R bytes.
pub fn from_linear24_bgr(
    width: u32,
    height: u32,
    buf: &[u8],
    stride: usize,
) -> Result<Bitmap, DecodeError> {
    check_dims(width, height, 1, 1)?;
    let stride = row_stride(width, 24, stride)?;
    check_len(buf, needed(stride, width as usize * 3, height))?;

    let mut bmp = Bitmap::new_argb32(width, height);
    for y in 0..height {
        let row = &buf[y as usize * stride..];
        for x in 0..width {
            let p = &row[x as usize * 3..x as usize * 3 + 3];
            bmp.set_argb(x, y, argb(0xFF, p[2] as u32, p[1] as u32, p[0] as u32));
        }
    }
    Ok(bmp)
}

/// 32-bit little-endian `0xAARRGGBB`. With `has_alpha == false` the alpha
/// byte is ignored and pixels are opaque.
pub fn from_linear32_argb(
    width: u32,
    height: u32,
    buf: &[u8],
    stride: usize,
    has_alpha: bool,
) -> Result<Bitmap, DecodeError> {
    check_dims(width, height, 1, 1)?;
    let stride = row_stride(width, 32, stride)?;
    check_len(buf, needed(stride, width as usize * 4, height))?;

    let mut bmp = Bitmap::new_argb32(width, height);
    for y in 0..height {
        let row = &buf[y as usize * stride..];
        for x in 0..width {
            let o = x as usize * 4;
            let mut px = u32::from_le_bytes([row[o], row[o + 1], row[o + 2], row[o + 3]]);
            if !has_alpha {
                px |= 0xFF00_0000;
            }
            bmp.set_argb(x, y, px);
        }
    }
    Ok(bmp)
}

/// Channel bit masks for arbitrary little-endian RGB(A) layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMasks {
    pub r: u32,
    pub g: u32,
    pub b: u32,
    /// 0 for opaque formats
    pub a: u32,
}

fn extract(px: u32, mask: u32) -> u32 {
    if mask == 0 {
        return 0;
    }
    let shift = mask.trailing_zeros();
    let bits = (mask >> shift).count_ones();
    let value = (px & mask) >> shift;
    if bits >= 8 {
        value >> (bits - 8)
    } else {
        // Scale to 0..=255 with rounding.
        let max = (1u32 << bits) - 1;
        (value * 255 + max / 2) / max
    }
}

/// Little-endian pixels of 16, 24 or 32 bits described by channel masks.
pub fn from_linear_masked(
    width: u32,
    height: u32,
    buf: &[u8],
    bits: usize,
    masks: ChannelMasks,
    stride: usize,
) -> Result<Bitmap, DecodeError> {
    if !matches!(bits, 16 | 24 | 32) {
        return Err(DecodeError::Unsupported(format!("{bits}-bit masked pixels")));
    }
    check_dims(width, height, 1, 1)?;
    let bpp = bits / 8;
    let stride = row_stride(width, bits, stride)?;
    check_len(buf, needed(stride, width as usize * bpp, height))?;

    let mut bmp = Bitmap::new_argb32(width, height);
    for y in 0..height {
        let row = &buf[y as usize * stride..];
        for x in 0..width {
            let o = x as usize * bpp;
            let mut raw = [0u8; 4];
            raw[..bpp].copy_from_slice(&row[o..o + bpp]);
            let px = u32::from_le_bytes(raw);
            let a = if masks.a == 0 {
                0xFF
            } else {
                extract(px, masks.a)
            };
            bmp.set_argb(
                x,
                y,
                argb(a, extract(px, masks.r), extract(px, masks.g), extract(px, masks.b)),
            );
        }
    }
    Ok(bmp)
}

/// 4bpp paletted. The palette must have at least 16 entries.
pub fn from_linear_ci4(
    width: u32,
    height: u32,
    buf: &[u8],
    palette: &[u32],
    order: NibbleOrder,
) -> Result<Bitmap, DecodeError> {
    check_dims(width, height, 2, 1)?;
    check_len(buf, required_bytes(width, height, 4))?;
    check_palette(palette, 16)?;

    let mut bmp = new_paletted(width, height, palette, 16);
    for y in 0..height {
        for x in (0..width).step_by(2) {
            let byte = buf[(y as usize * width as usize + x as usize) / 2];
            let (left, right) = match order {
                NibbleOrder::HighFirst => (byte >> 4, byte & 0xF),
                NibbleOrder::LowFirst => (byte & 0xF, byte >> 4),
            };
            bmp.set_index(x, y, left);
            bmp.set_index(x + 1, y, right);
        }
    }
    Ok(bmp)
}

/// 8bpp paletted. The palette must have at least 256 entries.
pub fn from_linear_ci8(
    width: u32,
    height: u32,
    buf: &[u8],
    palette: &[u32],
) -> Result<Bitmap, DecodeError> {
    check_dims(width, height, 1, 1)?;
    check_len(buf, required_bytes(width, height, 8))?;
    check_palette(palette, 256)?;

    let mut bmp = new_paletted(width, height, palette, 256);
    for y in 0..height {
        for x in 0..width {
            bmp.set_index(x, y, buf[y as usize * width as usize + x as usize]);
        }
    }
    Ok(bmp)
}

/// 1bpp monochrome, most significant bit leftmost. Set bits are
/// `foreground`, clear bits `background`.
pub fn from_linear_mono(
    width: u32,
    height: u32,
    buf: &[u8],
    foreground: u32,
    background: u32,
) -> Result<Bitmap, DecodeError> {
    check_dims(width, height, 8, 1)?;
    check_len(buf, required_bytes(width, height, 1))?;

    let mut bmp = new_paletted(width, height, &[background, foreground], 16);
    for y in 0..height {
        for x in 0..width {
            let bit = y as usize * width as usize + x as usize;
            let on = buf[bit / 8] & (0x80 >> (bit % 8)) != 0;
            bmp.set_index(x, y, on as u8);
        }
    }
    Ok(bmp)
}

#[cfg(test)]
#[path = "tests/linear_tests.rs"]
mod tests;
