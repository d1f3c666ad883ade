//! Dreamcast PowerVR layouts: twiddled and vector-quantized.
//!
//! Twiddled data is stored in Z-order with the y bit lowest, so the first
//! four pixels are (0,0), (0,1), (1,0), (1,1). Rectangular textures are a
//! row of square twiddled blocks whose side is the smaller dimension.

use romscope_core::Bitmap;

use crate::pixel::Pixel16;
use crate::{DecodeError, Endian, check_len};

/// Interleave the bits of `x` and `y` with `y` in bit 0.
pub fn twiddle(x: u32, y: u32) -> u32 {
    fn spread(mut v: u32) -> u32 {
        v &= 0xFFFF;
        v = (v | (v << 8)) & 0x00FF_00FF;
        v = (v | (v << 4)) & 0x0F0F_0F0F;
        v = (v | (v << 2)) & 0x3333_3333;
        v = (v | (v << 1)) & 0x5555_5555;
        v
    }
    spread(y) | (spread(x) << 1)
}

fn check_pow2(width: u32, height: u32) -> Result<(), DecodeError> {
    if width == 0 || height == 0 || !width.is_power_of_two() || !height.is_power_of_two() {
        return Err(DecodeError::InvalidDimensions { width, height });
    }
    Ok(())
}

/// Storage index of pixel (x, y) in a (possibly rectangular) twiddled
/// texture.
fn twiddled_index(x: u32, y: u32, width: u32, height: u32) -> usize {
    let side = width.min(height);
    let block = if width >= height { x / side } else { y / side };
    let in_block = twiddle(x % side, y % side);
    block as usize * (side as usize * side as usize) + in_block as usize
}

/// Twiddled 16-bit texture, little-endian.
pub fn from_twiddled16(
    format: Pixel16,
    width: u32,
    height: u32,
    buf: &[u8],
) -> Result<Bitmap, DecodeError> {
    check_pow2(width, height)?;
    check_len(buf, width as usize * height as usize * 2)?;

    let mut bmp = Bitmap::new_argb32(width, height);
    for y in 0..height {
        for x in 0..width {
            let i = twiddled_index(x, y, width, height) * 2;
            bmp.set_argb(x, y, format.to_argb32(Endian::Little.u16(&buf[i..i + 2])));
        }
    }
    Ok(bmp)
}

/// Number of codebook entries of a "small VQ" texture of this width.
pub fn small_vq_codebook_entries(width: u32, mipmapped: bool) -> usize {
    match (width, mipmapped) {
        (..=16, _) => 16,
        (32, true) => 64,
        (32, false) => 32,
        (64, true) => 256,
        (64, false) => 128,
        _ => 256,
    }
}

/// Vector-quantized texture: a codebook of `entries` 2x2 blocks of 16-bit
/// pixels, followed by one twiddled index byte per 2x2 block.
pub fn from_vq(
    format: Pixel16,
    width: u32,
    height: u32,
    buf: &[u8],
    entries: usize,
) -> Result<Bitmap, DecodeError> {
    check_pow2(width, height)?;
    if width < 2 || height < 2 || entries == 0 || entries > 256 {
        return Err(DecodeError::InvalidDimensions { width, height });
    }
    let codebook_len = entries * 4 * 2;
    let (bw, bh) = (width / 2, height / 2);
    check_len(buf, codebook_len + bw as usize * bh as usize)?;

    let codebook: Vec<[u32; 4]> = buf[..codebook_len]
        .chunks_exact(8)
        .map(|c| {
            let mut block = [0u32; 4];
            for (k, px) in block.iter_mut().enumerate() {
                *px = format.to_argb32(Endian::Little.u16(&c[k * 2..k * 2 + 2]));
            }
            block
        })
        .collect();
    let indices = &buf[codebook_len..];

    let mut bmp = Bitmap::new_argb32(width, height);
    for by in 0..bh {
        for bx in 0..bw {
            let idx = indices[twiddled_index(bx, by, bw, bh)] as usize;
            // Out-of-range entries in small codebooks render transparent.
            let block = codebook.get(idx).copied().unwrap_or([0; 4]);
            // Codebook blocks are twiddled too: (0,0) (0,1) (1,0) (1,1).
            bmp.set_argb(bx * 2, by * 2, block[0]);
            bmp.set_argb(bx * 2, by * 2 + 1, block[1]);
            bmp.set_argb(bx * 2 + 1, by * 2, block[2]);
            bmp.set_argb(bx * 2 + 1, by * 2 + 1, block[3]);
        }
    }
    Ok(bmp)
}

#[cfg(test)]
#[path = "tests/dreamcast_tests.rs"]
mod tests;
