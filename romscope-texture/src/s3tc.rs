//! S3TC block compression (DXT1/DXT3/DXT5) and GameCube CMPR.
//!
//! Every 4x4 block carries two RGB565 reference colours. Palette entries 2
//! and 3 are derived per channel on the 8-bit expanded values:
//!
//! - `c0 > c1`: `c2 = (2*c0 + c1) / 3`, `c3 = (c0 + 2*c1) / 3`
//! - otherwise: `c2 = (c0 + c1) / 2`, `c3` black or transparent
//!
//! Divisions truncate.

use romscope_core::Bitmap;

use crate::pixel::{Pixel16, argb, channels};
use crate::{DecodeError, check_dims, check_len};

/// What palette entry 3 means in three-colour DXT1 blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color3 {
    /// Opaque black
    Black,
    /// Fully transparent (DXT1 with 1-bit alpha)
    Transparent,
}

/// How the colour block interprets `c0 <= c1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColorMode {
    /// DXT1/CMPR: `c0 <= c1` selects three colours plus colour 3
    Dxt1(Color3),
    /// DXT3/DXT5: always four colours
    FourColor,
}

fn mix(a: u32, b: u32, wa: u32, wb: u32, div: u32) -> u32 {
    let [_, ar, ag, ab] = channels(a);
    let [_, br, bg, bb] = channels(b);
    argb(
        0xFF,
        (ar * wa + br * wb) / div,
        (ag * wa + bg * wb) / div,
        (ab * wa + bb * wb) / div,
    )
}

/// The four-entry palette of one colour block.
fn color_palette(c0_raw: u16, c1_raw: u16, mode: ColorMode) -> [u32; 4] {
    let c0 = Pixel16::Rgb565.to_argb32(c0_raw);
    let c1 = Pixel16::Rgb565.to_argb32(c1_raw);
    match mode {
        ColorMode::Dxt1(color3) if c0_raw <= c1_raw => {
            let c3 = match color3 {
                Color3::Black => 0xFF00_0000,
                Color3::Transparent => 0x0000_0000,
            };
            [c0, c1, mix(c0, c1, 1, 1, 2), c3]
        }
        _ => [c0, c1, mix(c0, c1, 2, 1, 3), mix(c0, c1, 1, 2, 3)],
    }
}

/// Decode one little-endian 8-byte colour block to 16 ARGB32 pixels.
fn decode_color_block(block: &[u8], mode: ColorMode) -> [u32; 16] {
    let c0 = u16::from_le_bytes([block[0], block[1]]);
    let c1 = u16::from_le_bytes([block[2], block[3]]);
    let palette = color_palette(c0, c1, mode);
    let indices = u32::from_le_bytes([block[4], block[5], block[6], block[7]]);
    let mut out = [0u32; 16];
    for (i, px) in out.iter_mut().enumerate() {
        *px = palette[((indices >> (i * 2)) & 3) as usize];
    }
    out
}

/// Replace the alpha byte of every pixel.
fn with_alpha(px: &mut [u32; 16], alpha: impl Fn(usize) -> u32) {
    for (i, p) in px.iter_mut().enumerate() {
        *p = (*p & 0x00FF_FFFF) | (alpha(i) << 24);
    }
}

/// The eight-entry alpha palette of a DXT5 block.
fn dxt5_alpha_palette(a0: u32, a1: u32) -> [u32; 8] {
    let mut pal = [0u32; 8];
    pal[0] = a0;
    pal[1] = a1;
    if a0 > a1 {
        for i in 2..8 {
            pal[i] = ((8 - i as u32) * a0 + (i as u32 - 1) * a1) / 7;
        }
    } else {
        for i in 2..6 {
            pal[i] = ((6 - i as u32) * a0 + (i as u32 - 1) * a1) / 5;
        }
        pal[6] = 0;
        pal[7] = 0xFF;
    }
    pal
}

/// Walk 4x4 blocks of `block_size` bytes in row-major order.
fn decode_blocks(
    width: u32,
    height: u32,
    buf: &[u8],
    block_size: usize,
    decode: impl Fn(&[u8]) -> [u32; 16],
) -> Result<Bitmap, DecodeError> {
    check_dims(width, height, 4, 4)?;
    let blocks = (width as usize / 4) * (height as usize / 4);
    check_len(buf, blocks * block_size)?;

    let mut bmp = Bitmap::new_argb32(width, height);
    for (n, block) in buf.chunks_exact(block_size).take(blocks).enumerate() {
        let bx = (n % (width as usize / 4)) as u32 * 4;
        let by = (n / (width as usize / 4)) as u32 * 4;
        for (i, px) in decode(block).iter().enumerate() {
            bmp.set_argb(bx + (i % 4) as u32, by + (i / 4) as u32, *px);
        }
    }
    Ok(bmp)
}

/// DXT1 (BC1).
pub fn from_dxt1(
    width: u32,
    height: u32,
    buf: &[u8],
    color3: Color3,
) -> Result<Bitmap, DecodeError> {
    decode_blocks(width, height, buf, 8, |b| {
        decode_color_block(b, ColorMode::Dxt1(color3))
    })
}

/// DXT2/DXT3 (BC2): explicit 4-bit alpha then a colour block.
pub fn from_dxt3(width: u32, height: u32, buf: &[u8]) -> Result<Bitmap, DecodeError> {
    decode_blocks(width, height, buf, 16, |b| {
        let mut px = decode_color_block(&b[8..16], ColorMode::FourColor);
        let mut alpha = [0u8; 8];
        alpha.copy_from_slice(&b[..8]);
        let bits = u64::from_le_bytes(alpha);
        with_alpha(&mut px, |i| (((bits >> (i * 4)) & 0xF) as u32) * 0x11);
        px
    })
}

/// DXT4/DXT5 (BC3): interpolated 3-bit alpha then a colour block.
pub fn from_dxt5(width: u32, height: u32, buf: &[u8]) -> Result<Bitmap, DecodeError> {
    decode_blocks(width, height, buf, 16, |b| {
        let pal = dxt5_alpha_palette(b[0] as u32, b[1] as u32);
        let mut idx = [0u8; 8];
        idx[..6].copy_from_slice(&b[2..8]);
        let bits = u64::from_le_bytes(idx);
        let mut px = decode_color_block(&b[8..16], ColorMode::FourColor);
        with_alpha(&mut px, |i| pal[((bits >> (i * 3)) & 7) as usize]);
        px
    })
}

/// GameCube CMPR: 8x8 tiles of four 4x4 DXT1 sub-blocks with big-endian
/// colours and MSB-first 2-bit indices. Colour 3 is transparent.
pub fn from_gcn_cmpr(width: u32, height: u32, buf: &[u8]) -> Result<Bitmap, DecodeError> {
    check_dims(width, height, 8, 8)?;
    check_len(buf, width as usize * height as usize / 2)?;

    let mut bmp = Bitmap::new_argb32(width, height);
    let mut off = 0;
    for ty in (0..height).step_by(8) {
        for tx in (0..width).step_by(8) {
            for sub in 0..4u32 {
                let b = &buf[off..off + 8];
                off += 8;
                let c0 = u16::from_be_bytes([b[0], b[1]]);
                let c1 = u16::from_be_bytes([b[2], b[3]]);
                let palette = color_palette(c0, c1, ColorMode::Dxt1(Color3::Transparent));
                let sx = tx + (sub % 2) * 4;
                let sy = ty + (sub / 2) * 4;
                for row in 0..4u32 {
                    let bits = b[4 + row as usize];
                    for col in 0..4u32 {
                        let idx = (bits >> (6 - col * 2)) & 3;
                        bmp.set_argb(sx + col, sy + row, palette[idx as usize]);
                    }
                }
            }
        }
    }
    Ok(bmp)
}

#[cfg(test)]
#[path = "tests/s3tc_tests.rs"]
mod tests;
