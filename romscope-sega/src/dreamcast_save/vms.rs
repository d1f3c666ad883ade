//! The VMS file header shared by save data and mini-games: descriptions,
//! icon palette, icon frames and the optional eyecatch picture.

use romscope_core::bytes::{read_u16_le, read_u32_le};
use romscope_core::util::{read_ascii_fixed, read_shift_jis};
use romscope_core::{AnimFrame, Bitmap, RomError};
use romscope_texture::linear::{NibbleOrder, from_linear_ci4, from_linear_ci8, from_linear16};
use romscope_texture::{Endian, Pixel16, decode_palette16};

pub(crate) const VMS_HEADER_LEN: usize = 0x80;

pub(crate) const OFF_VMS_DESC: usize = 0x00;
pub(crate) const OFF_DC_DESC: usize = 0x10;
pub(crate) const OFF_APPLICATION: usize = 0x30;
pub(crate) const OFF_ICON_COUNT: usize = 0x40;
pub(crate) const OFF_ANIM_SPEED: usize = 0x42;
pub(crate) const OFF_EYECATCH: usize = 0x44;
pub(crate) const OFF_CRC: usize = 0x46;
pub(crate) const OFF_DATA_SIZE: usize = 0x48;
pub(crate) const OFF_PALETTE: usize = 0x60;

pub(crate) const ICON_DIM: u32 = 32;
pub(crate) const ICON_LEN: usize = 0x200;
const MAX_ICONS: u16 = 3;

pub(crate) const EYECATCH_W: u32 = 72;
pub(crate) const EYECATCH_H: u32 = 56;

/// Animation speed is counted in 1/30 s.
const ANIM_TICK_MS: u32 = 1000 / 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Eyecatch {
    None,
    /// 16-bit ARGB4444 pixels
    Direct,
    /// 256-entry palette, 8 bits per pixel
    Ci8,
    /// 16-entry palette, 4 bits per pixel
    Ci4,
}

impl Eyecatch {
    fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::None),
            1 => Some(Self::Direct),
            2 => Some(Self::Ci8),
            3 => Some(Self::Ci4),
            _ => None,
        }
    }

    pub(crate) fn len(self) -> usize {
        let px = (EYECATCH_W * EYECATCH_H) as usize;
        match self {
            Self::None => 0,
            Self::Direct => px * 2,
            Self::Ci8 => 256 * 2 + px,
            Self::Ci4 => 16 * 2 + px / 2,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Direct => "ARGB4444",
            Self::Ci8 => "256 colours",
            Self::Ci4 => "16 colours",
        }
    }
}

/// A description field is text padded with NULs or spaces; control bytes
/// mean this isn't a VMS header.
fn is_text(raw: &[u8]) -> bool {
    raw.iter().all(|&b| b == 0 || (b >= 0x20 && b != 0x7F))
}

#[derive(Debug, Clone)]
pub(crate) struct VmsHeader {
    pub(crate) vms_description: String,
    pub(crate) dc_description: String,
    pub(crate) application: String,
    pub(crate) icon_count: u16,
    pub(crate) anim_speed: u16,
    pub(crate) eyecatch: Eyecatch,
    pub(crate) crc: u16,
    pub(crate) data_size: u32,
    palette: [u8; 32],
}

impl VmsHeader {
    /// Parse and sanity-check a header. `None` if the bytes can't be one.
    pub(crate) fn parse(buf: &[u8]) -> Option<Self> {
        let h = buf.get(..VMS_HEADER_LEN)?;
        let icon_count = read_u16_le(h, OFF_ICON_COUNT);
        let eyecatch = Eyecatch::from_raw(read_u16_le(h, OFF_EYECATCH))?;
        if !(1..=MAX_ICONS).contains(&icon_count)
            || !is_text(&h[OFF_VMS_DESC..OFF_DC_DESC])
            || !is_text(&h[OFF_DC_DESC..OFF_APPLICATION])
            || h[OFF_VMS_DESC] == 0
        {
            return None;
        }
        let mut palette = [0u8; 32];
        palette.copy_from_slice(&h[OFF_PALETTE..OFF_PALETTE + 32]);
        Some(Self {
            vms_description: read_shift_jis(&h[OFF_VMS_DESC..OFF_DC_DESC]).trim().to_string(),
            dc_description: read_shift_jis(&h[OFF_DC_DESC..OFF_APPLICATION])
                .trim()
                .to_string(),
            application: read_ascii_fixed(&h[OFF_APPLICATION..OFF_ICON_COUNT]),
            icon_count,
            anim_speed: read_u16_le(h, OFF_ANIM_SPEED),
            eyecatch,
            crc: read_u16_le(h, OFF_CRC),
            data_size: read_u32_le(h, OFF_DATA_SIZE),
            palette,
        })
    }

    /// Header, icons and eyecatch.
    pub(crate) fn graphics_len(&self) -> usize {
        VMS_HEADER_LEN + self.icon_count as usize * ICON_LEN + self.eyecatch.len()
    }

    pub(crate) fn eyecatch_offset(&self) -> usize {
        VMS_HEADER_LEN + self.icon_count as usize * ICON_LEN
    }

    fn palette(&self) -> Vec<u32> {
        decode_palette16(Pixel16::Argb4444, &self.palette, Endian::Little)
    }

    /// Decode every icon frame from `raw`, which starts at the header.
    pub(crate) fn icons(&self, raw: &[u8]) -> Result<Vec<Bitmap>, RomError> {
        let palette = self.palette();
        (0..self.icon_count as usize)
            .map(|i| {
                let off = VMS_HEADER_LEN + i * ICON_LEN;
                let data = raw.get(off..off + ICON_LEN).unwrap_or_default();
                Ok(from_linear_ci4(ICON_DIM, ICON_DIM, data, &palette, NibbleOrder::HighFirst)?)
            })
            .collect()
    }

    /// One step per icon, each shown for the header's animation speed.
    pub(crate) fn sequence(&self) -> Vec<AnimFrame> {
        let delay_ms = self.anim_speed.max(1) as u32 * ANIM_TICK_MS;
        (0..self.icon_count as usize)
            .map(|frame| AnimFrame { frame, delay_ms })
            .collect()
    }

    /// Decode the eyecatch from `raw`, which starts at the header.
    pub(crate) fn eyecatch(&self, raw: &[u8]) -> Result<Option<Bitmap>, RomError> {
        let off = self.eyecatch_offset();
        let Some(data) = raw.get(off..off + self.eyecatch.len()) else {
            return Ok(None);
        };
        let (w, h) = (EYECATCH_W, EYECATCH_H);
        let bmp = match self.eyecatch {
            Eyecatch::None => return Ok(None),
            Eyecatch::Direct => from_linear16(Pixel16::Argb4444, w, h, data, Endian::Little, 0)?,
            Eyecatch::Ci8 => {
                let palette = decode_palette16(Pixel16::Argb4444, &data[..512], Endian::Little);
                from_linear_ci8(w, h, &data[512..], &palette)?
            }
            Eyecatch::Ci4 => {
                let palette = decode_palette16(Pixel16::Argb4444, &data[..32], Endian::Little);
                from_linear_ci4(w, h, &data[32..], &palette, NibbleOrder::HighFirst)?
            }
        };
        Ok(Some(bmp))
    }
}

/// CRC over header, graphics and data with the CRC field read as zero.
pub(crate) fn vms_crc(raw: &[u8]) -> u16 {
    let mut buf = raw.to_vec();
    if buf.len() >= OFF_CRC + 2 {
        buf[OFF_CRC..OFF_CRC + 2].fill(0);
    }
    romscope_core::checksum::crc16_xmodem(&buf)
}

#[cfg(test)]
#[path = "tests/vms_tests.rs"]
pub(crate) mod tests;
