//! Normalized in-memory bitmaps.
//!
//! Every pixel decoder produces a [`Bitmap`] in one of two layouts:
//!
//! - [`PixelLayout::Argb32`]: one little-endian `0xAARRGGBB` word per pixel.
//! - [`PixelLayout::Ci8`]: one palette index byte per pixel, with a palette
//!   of 16 or 256 ARGB32 entries (unused entries are zero).

use serde::Serialize;

/// Pixel storage layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PixelLayout {
    Argb32,
    Ci8,
}

impl PixelLayout {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Argb32 => 4,
            Self::Ci8 => 1,
        }
    }
}

/// Why a bitmap failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BitmapError {
    #[error("stride {stride} x height {height} exceeds buffer of {len} bytes")]
    BufferTooSmall {
        stride: usize,
        height: u32,
        len: usize,
    },
    #[error("stride {0} is smaller than one row")]
    StrideTooSmall(usize),
    #[error("palette has {0} entries; 16 or 256 are required")]
    PaletteSize(usize),
    #[error("pixel index {index} at ({x}, {y}) is outside the palette")]
    IndexOutOfRange { x: u32, y: u32, index: u8 },
}

/// A decoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    layout: PixelLayout,
    stride: usize,
    data: Vec<u8>,
    palette: Vec<u32>,
    tr_idx: Option<u8>,
}

impl Bitmap {
    /// A fully transparent ARGB32 bitmap.
    pub fn new_argb32(width: u32, height: u32) -> Self {
        let stride = width as usize * 4;
        Self {
            width,
            height,
            layout: PixelLayout::Argb32,
            stride,
            data: vec![0; stride * height as usize],
            palette: Vec::new(),
            tr_idx: None,
        }
    }

    /// A CI8 bitmap with a zero-filled palette of 16 or 256 entries.
    pub fn new_ci8(width: u32, height: u32, palette_len: usize) -> Self {
        let palette_len = if palette_len <= 16 { 16 } else { 256 };
        let stride = width as usize;
        Self {
            width,
            height,
            layout: PixelLayout::Ci8,
            stride,
            data: vec![0; stride * height as usize],
            palette: vec![0; palette_len],
            tr_idx: None,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PixelLayout {
        self.layout
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn palette(&self) -> &[u32] {
        &self.palette
    }

    pub fn palette_mut(&mut self) -> &mut [u32] {
        &mut self.palette
    }

    /// Palette index rendered as fully transparent, if any.
    pub fn tr_idx(&self) -> Option<u8> {
        self.tr_idx
    }

    pub fn set_tr_idx(&mut self, idx: Option<u8>) {
        self.tr_idx = idx;
    }

    /// Write one ARGB32 pixel. Out-of-range coordinates are ignored.
    pub fn set_argb(&mut self, x: u32, y: u32, argb: u32) {
        if x >= self.width || y >= self.height || self.layout != PixelLayout::Argb32 {
            return;
        }
        let off = y as usize * self.stride + x as usize * 4;
        self.data[off..off + 4].copy_from_slice(&argb.to_le_bytes());
    }

    /// Write one palette index. Out-of-range coordinates are ignored.
    pub fn set_index(&mut self, x: u32, y: u32, index: u8) {
        if x >= self.width || y >= self.height || self.layout != PixelLayout::Ci8 {
            return;
        }
        self.data[y as usize * self.stride + x as usize] = index;
    }

    /// The colour of a pixel as ARGB32, resolving palette indices.
    pub fn argb_at(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        match self.layout {
            PixelLayout::Argb32 => {
                let off = y as usize * self.stride + x as usize * 4;
                let b = self.data.get(off..off + 4)?;
                Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            }
            PixelLayout::Ci8 => {
                let idx = *self.data.get(y as usize * self.stride + x as usize)?;
                if self.tr_idx == Some(idx) {
                    return Some(0);
                }
                self.palette.get(idx as usize).copied()
            }
        }
    }

    /// Row-major ARGB32 pixels, palette resolved.
    pub fn to_argb_pixels(&self) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                out.push(self.argb_at(x, y).unwrap_or(0));
            }
        }
        out
    }

    /// Row-major RGBA8 bytes, palette resolved.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.to_argb_pixels()
            .into_iter()
            .flat_map(|argb| {
                let [b, g, r, a] = argb.to_le_bytes();
                [r, g, b, a]
            })
            .collect()
    }

    /// A copy mirrored horizontally and/or vertically.
    pub fn flipped(&self, horizontal: bool, vertical: bool) -> Self {
        let mut out = self.clone();
        let bpp = self.layout.bytes_per_pixel();
        for y in 0..self.height as usize {
            let src_y = if vertical {
                self.height as usize - 1 - y
            } else {
                y
            };
            for x in 0..self.width as usize {
                let src_x = if horizontal {
                    self.width as usize - 1 - x
                } else {
                    x
                };
                let src = src_y * self.stride + src_x * bpp;
                let dst = y * self.stride + x * bpp;
                out.data[dst..dst + bpp].copy_from_slice(&self.data[src..src + bpp]);
            }
        }
        out
    }

    /// Check the layout invariants.
    pub fn validate(&self) -> Result<(), BitmapError> {
        let row = self.width as usize * self.layout.bytes_per_pixel();
        if self.stride < row {
            return Err(BitmapError::StrideTooSmall(self.stride));
        }
        if self.stride * self.height as usize > self.data.len() {
            return Err(BitmapError::BufferTooSmall {
                stride: self.stride,
                height: self.height,
                len: self.data.len(),
            });
        }
        if self.layout == PixelLayout::Ci8 {
            let len = self.palette.len();
            if len != 16 && len != 256 {
                return Err(BitmapError::PaletteSize(len));
            }
            for y in 0..self.height {
                for x in 0..self.width {
                    let index = self.data[y as usize * self.stride + x as usize];
                    if index as usize >= len {
                        return Err(BitmapError::IndexOutOfRange { x, y, index });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/bitmap_tests.rs"]
mod tests;
