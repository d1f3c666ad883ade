//! Pixel-format decoders.
//!
//! Every decoder takes the image dimensions and a raw buffer (plus a
//! palette where relevant), checks the buffer against the minimum size the
//! format needs for those dimensions, and returns a normalized
//! [`Bitmap`]. Insufficient input is a hard failure, never a partial image.
//!
//! - [`linear`]: row-major 16/24/32-bit, masked, CI4/CI8 and 1bpp.
//! - [`tiled`]: GameCube 4x4/8x4/8x8 tiles, Nintendo DS 8x8 CI4 tiles,
//!   Nintendo 3DS 8x8 Z-order tiles.
//! - [`dreamcast`]: twiddled and vector-quantized PowerVR textures.
//! - [`s3tc`]: DXT1/DXT3/DXT5 and GameCube CMPR.

use romscope_core::{Bitmap, RomError};
use thiserror::Error;

pub mod dreamcast;
pub mod linear;
pub mod pixel;
pub mod s3tc;
pub mod tiled;

pub use pixel::Pixel16;

/// Why a decoder refused its input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("image data too small: need {expected} bytes, got {actual}")]
    BufferTooSmall { expected: usize, actual: usize },

    #[error("palette too small: need {expected} entries, got {actual}")]
    PaletteTooSmall { expected: usize, actual: usize },

    #[error("unsupported pixel format: {0}")]
    Unsupported(String),
}

impl From<DecodeError> for RomError {
    fn from(err: DecodeError) -> Self {
        RomError::other(format!("image decode failed: {err}"))
    }
}

/// Byte order of multi-byte pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

impl Endian {
    #[inline]
    pub(crate) fn u16(self, b: &[u8]) -> u16 {
        match self {
            Self::Little => u16::from_le_bytes([b[0], b[1]]),
            Self::Big => u16::from_be_bytes([b[0], b[1]]),
        }
    }
}

/// Reject zero dimensions and dimensions that aren't whole tiles.
pub(crate) fn check_dims(
    width: u32,
    height: u32,
    tile_w: u32,
    tile_h: u32,
) -> Result<(), DecodeError> {
    if width == 0 || height == 0 || width % tile_w != 0 || height % tile_h != 0 {
        return Err(DecodeError::InvalidDimensions { width, height });
    }
    Ok(())
}

/// Required byte count for `width * height` pixels at `bits` per pixel.
pub(crate) fn required_bytes(width: u32, height: u32, bits: usize) -> usize {
    (width as usize * height as usize * bits).div_ceil(8)
}

pub(crate) fn check_len(buf: &[u8], expected: usize) -> Result<(), DecodeError> {
    if buf.len() < expected {
        return Err(DecodeError::BufferTooSmall {
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

pub(crate) fn check_palette(palette: &[u32], expected: usize) -> Result<(), DecodeError> {
    if palette.len() < expected {
        return Err(DecodeError::PaletteTooSmall {
            expected,
            actual: palette.len(),
        });
    }
    Ok(())
}

/// Build a CI8 bitmap with room for `entries` colours (16 or 256) and a
/// copy of `palette`; unused entries stay zero.
pub(crate) fn new_paletted(width: u32, height: u32, palette: &[u32], entries: usize) -> Bitmap {
    let mut bmp = Bitmap::new_ci8(width, height, entries);
    let dst = bmp.palette_mut();
    let n = palette.len().min(dst.len());
    dst[..n].copy_from_slice(&palette[..n]);
    bmp
}

/// Decode a run of 16-bit palette entries.
pub fn decode_palette16(format: Pixel16, raw: &[u8], endian: Endian) -> Vec<u32> {
    raw.chunks_exact(2)
        .map(|c| format.to_argb32(endian.u16(c)))
        .collect()
}

/// Convert to an [`image::RgbaImage`] for saving or further processing.
pub fn to_rgba_image(bmp: &Bitmap) -> Option<image::RgbaImage> {
    image::RgbaImage::from_raw(bmp.width(), bmp.height(), bmp.to_rgba8())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_bytes_rounds_up() {
        assert_eq!(required_bytes(3, 1, 4), 2);
        assert_eq!(required_bytes(32, 32, 4), 512);
        assert_eq!(required_bytes(8, 8, 1), 8);
    }

    #[test]
    fn test_check_dims() {
        assert!(check_dims(8, 4, 4, 4).is_ok());
        assert!(check_dims(0, 4, 1, 1).is_err());
        assert!(check_dims(6, 4, 4, 4).is_err());
    }

    #[test]
    fn test_to_rgba_image() {
        let mut bmp = Bitmap::new_argb32(1, 1);
        bmp.set_argb(0, 0, 0x8011_2233);
        let img = to_rgba_image(&bmp).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [0x11, 0x22, 0x33, 0x80]);
    }

    #[test]
    fn test_palette16() {
        let pal = decode_palette16(Pixel16::Rgb565, &[0xF8, 0x00, 0x00, 0x1F], Endian::Big);
        assert_eq!(pal, vec![0xFFFF_0000, 0xFF00_00FF]);
    }
}
