//! `ICONDATA_VMS`: the file that sets the VMU's own icon in the Dreamcast
//! file manager. It carries a monochrome icon for the VMU screen and an
//! optional 16-colour icon for the BIOS menu.

use romscope_core::bytes::read_u32_le;
use romscope_core::util::read_shift_jis;
use romscope_core::{Bitmap, RomError};
use romscope_texture::linear::{NibbleOrder, from_linear_ci4, from_linear_mono};
use romscope_texture::{Endian, Pixel16, decode_palette16};

pub(crate) const OFF_DESCRIPTION: usize = 0x00;
pub(crate) const OFF_MONO: usize = 0x10;
pub(crate) const OFF_COLOR: usize = 0x14;
pub(crate) const OFF_RESERVED: usize = 0x18;
const FIXED_LEN: usize = 0x20;

pub(crate) const MONO_LEN: usize = 32 * 32 / 8;
pub(crate) const COLOR_LEN: usize = 16 * 2 + 32 * 32 / 2;

const BLACK: u32 = 0xFF00_0000;
const WHITE: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone)]
pub(crate) struct IconData {
    pub(crate) description: String,
    mono_addr: usize,
    color_addr: Option<usize>,
}

impl IconData {
    /// Parse from the start of the file. `len` is the length of the file
    /// body the icon addresses point into.
    pub(crate) fn parse(buf: &[u8], len: usize) -> Option<Self> {
        let h = buf.get(..FIXED_LEN)?;
        if h[OFF_RESERVED..FIXED_LEN].iter().any(|&b| b != 0)
            || h[OFF_DESCRIPTION..OFF_MONO].iter().any(|&b| b != 0 && b < 0x20)
        {
            return None;
        }
        let mono_addr = read_u32_le(h, OFF_MONO) as usize;
        if mono_addr < FIXED_LEN || mono_addr + MONO_LEN > len {
            return None;
        }
        let color_addr = match read_u32_le(h, OFF_COLOR) as usize {
            0 => None,
            addr if addr >= FIXED_LEN && addr + COLOR_LEN <= len => Some(addr),
            _ => return None,
        };
        Some(Self {
            description: read_shift_jis(&h[OFF_DESCRIPTION..OFF_MONO]).trim().to_string(),
            mono_addr,
            color_addr,
        })
    }

    pub(crate) fn has_color(&self) -> bool {
        self.color_addr.is_some()
    }

    /// Set bits are black on a white background, as on the VMU LCD.
    pub(crate) fn mono_icon(&self, body: &[u8]) -> Result<Bitmap, RomError> {
        let data = body
            .get(self.mono_addr..self.mono_addr + MONO_LEN)
            .unwrap_or_default();
        Ok(from_linear_mono(32, 32, data, BLACK, WHITE)?)
    }

    pub(crate) fn color_icon(&self, body: &[u8]) -> Result<Option<Bitmap>, RomError> {
        let Some(addr) = self.color_addr else {
            return Ok(None);
        };
        let data = body.get(addr..addr + COLOR_LEN).unwrap_or_default();
        if data.len() < COLOR_LEN {
            return Ok(None);
        }
        let palette = decode_palette16(Pixel16::Argb4444, &data[..32], Endian::Little);
        let bmp = from_linear_ci4(32, 32, &data[32..], &palette, NibbleOrder::HighFirst)?;
        Ok(Some(bmp))
    }
}
