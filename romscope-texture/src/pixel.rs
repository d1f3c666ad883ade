//! Single-pixel conversions to ARGB32 (`0xAARRGGBB`).
//!
//! Channel expansion replicates the high bits into the low bits, so that
//! full-intensity inputs map to 0xFF and zero maps to 0x00.

#[inline]
fn expand5(c: u32) -> u32 {
    (c << 3) | (c >> 2)
}

#[inline]
fn expand6(c: u32) -> u32 {
    (c << 2) | (c >> 4)
}

#[inline]
fn expand4(c: u32) -> u32 {
    c * 0x11
}

#[inline]
fn expand3(c: u32) -> u32 {
    (c << 5) | (c << 2) | (c >> 1)
}

#[inline]
pub fn argb(a: u32, r: u32, g: u32, b: u32) -> u32 {
    (a << 24) | (r << 16) | (g << 8) | b
}

/// 16-bit pixel encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pixel16 {
    /// `RRRRRGGG GGGBBBBB`
    Rgb565,
    /// `ARRRRRGG GGGBBBBB`
    Argb1555,
    /// `xRRRRRGG GGGBBBBB`, always opaque
    Rgb555,
    /// `xBBBBBGG GGGRRRRR` (DS, PlayStation), always opaque
    Bgr555,
    /// `AAAARRRR GGGGBBBB`
    Argb4444,
    /// `RRRRGGGG BBBBAAAA`
    Rgba4444,
    /// GameCube: opaque RGB555 if the top bit is set, else ARGB3444
    Rgb5a3,
    /// Intensity in the high byte, alpha in the low byte
    Ia8,
}

impl Pixel16 {
    pub fn to_argb32(self, px: u16) -> u32 {
        let px = px as u32;
        match self {
            Self::Rgb565 => argb(
                0xFF,
                expand5((px >> 11) & 0x1F),
                expand6((px >> 5) & 0x3F),
                expand5(px & 0x1F),
            ),
            Self::Argb1555 => argb(
                if px & 0x8000 != 0 { 0xFF } else { 0 },
                expand5((px >> 10) & 0x1F),
                expand5((px >> 5) & 0x1F),
                expand5(px & 0x1F),
            ),
            Self::Rgb555 => argb(
                0xFF,
                expand5((px >> 10) & 0x1F),
                expand5((px >> 5) & 0x1F),
                expand5(px & 0x1F),
            ),
            Self::Bgr555 => argb(
                0xFF,
                expand5(px & 0x1F),
                expand5((px >> 5) & 0x1F),
                expand5((px >> 10) & 0x1F),
            ),
            Self::Argb4444 => argb(
                expand4((px >> 12) & 0xF),
                expand4((px >> 8) & 0xF),
                expand4((px >> 4) & 0xF),
                expand4(px & 0xF),
            ),
            Self::Rgba4444 => argb(
                expand4(px & 0xF),
                expand4((px >> 12) & 0xF),
                expand4((px >> 8) & 0xF),
                expand4((px >> 4) & 0xF),
            ),
            Self::Rgb5a3 => {
                if px & 0x8000 != 0 {
                    argb(
                        0xFF,
                        expand5((px >> 10) & 0x1F),
                        expand5((px >> 5) & 0x1F),
                        expand5(px & 0x1F),
                    )
                } else {
                    argb(
                        expand3((px >> 12) & 0x7),
                        expand4((px >> 8) & 0xF),
                        expand4((px >> 4) & 0xF),
                        expand4(px & 0xF),
                    )
                }
            }
            Self::Ia8 => {
                let i = px >> 8;
                argb(px & 0xFF, i, i, i)
            }
        }
    }
}

/// PlayStation 15-bit colour: BGR555, where 0x0000 is fully transparent.
pub fn ps1_to_argb32(px: u16) -> u32 {
    if px == 0 {
        0
    } else {
        Pixel16::Bgr555.to_argb32(px)
    }
}

/// 8-bit intensity.
pub fn i8_to_argb32(i: u8) -> u32 {
    let i = i as u32;
    argb(0xFF, i, i, i)
}

/// 4-bit intensity.
pub fn i4_to_argb32(i: u8) -> u32 {
    let i = expand4((i & 0xF) as u32);
    argb(0xFF, i, i, i)
}

/// 4-bit intensity in the low nibble, 4-bit alpha in the high nibble.
pub fn ia4_to_argb32(px: u8) -> u32 {
    let a = expand4((px >> 4) as u32);
    let i = expand4((px & 0xF) as u32);
    argb(a, i, i, i)
}

/// Split ARGB32 into `[a, r, g, b]`.
pub fn channels(argb32: u32) -> [u32; 4] {
    [
        argb32 >> 24,
        (argb32 >> 16) & 0xFF,
        (argb32 >> 8) & 0xFF,
        argb32 & 0xFF,
    ]
}

#[cfg(test)]
#[path = "tests/pixel_tests.rs"]
mod tests;
