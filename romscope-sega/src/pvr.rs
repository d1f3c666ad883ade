//! Sega PowerVR textures.
//!
//! Supports:
//! - PVR (Dreamcast): twiddled, VQ, small VQ, rectangle and twiddled
//!   rectangle layouts in ARGB1555, RGB565 or ARGB4444
//! - GVR (GameCube): I4, I8, IA4, IA8, RGB565, RGB5A3, ARGB8888, CMPR, and
//!   CI4/CI8 with an embedded palette
//!
//! Either may be preceded by a `GBIX`/`GCIX` global index chunk. Paletted
//! PVRs keep their palette in a separate `.pvp` file and are reported but
//! not decoded.

use romscope_core::bytes::{read_u16_be, read_u16_le, read_u32_be, read_u32_le};
use romscope_core::system::lookup;
use romscope_core::{
    Bitmap, ByteStream, DetectInfo, FieldList, FileType, ImageKind, ImageKinds, ParseContext,
    RomError, RomFormat, SystemNameRow, SystemNameVariant,
};
use romscope_texture::dreamcast::{from_twiddled16, from_vq, small_vq_codebook_entries};
use romscope_texture::linear::from_linear16;
use romscope_texture::s3tc::from_gcn_cmpr;
use romscope_texture::tiled::{
    from_gcn_argb8888, from_gcn_ci4, from_gcn_ci8, from_gcn_i4, from_gcn_i8, from_gcn_ia4,
    from_gcn16,
};
use romscope_texture::{Endian, Pixel16, decode_palette16};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const GBIX_MAGIC: &[u8; 4] = b"GBIX";
const GCIX_MAGIC: &[u8; 4] = b"GCIX";
const PVRT_MAGIC: &[u8; 4] = b"PVRT";
const GVRT_MAGIC: &[u8; 4] = b"GVRT";

const CHUNK_HEADER_LEN: usize = 8;
const MAX_GBIX_LEN: usize = 0x20;
const TEX_HEADER_LEN: usize = 0x10;

const MAX_DIMENSION: u16 = 4096;
const MAX_DATA_LEN: u64 = 32 * 1024 * 1024;

const PVR_OFF_PIXEL: usize = 0x08;
const PVR_OFF_DATA: usize = 0x09;
const PVR_OFF_WIDTH: usize = 0x0C;
const PVR_OFF_HEIGHT: usize = 0x0E;

const GVR_OFF_FLAGS: usize = 0x0A;
const GVR_OFF_DATA: usize = 0x0B;
const GVR_OFF_WIDTH: usize = 0x0C;
const GVR_OFF_HEIGHT: usize = 0x0E;

const GVR_FLAG_MIPMAPS: u8 = 0x1;
const GVR_FLAG_EXT_PALETTE: u8 = 0x2;
const GVR_FLAG_INT_PALETTE: u8 = 0x8;

/// Bytes before the 1x1 level of a mipmapped 16-bit twiddled texture.
const TWIDDLED_MIP_PAD: usize = 6;
/// Index bytes before the 2x2 level of a mipmapped VQ texture.
const VQ_MIP_PAD: usize = 1;
const VQ_ENTRIES: usize = 256;
const VQ_ENTRY_LEN: usize = 8;

const SYSTEM_NAMES: [SystemNameRow; 2] = [
    ["Sega Dreamcast", "Dreamcast", "DC"],
    ["Nintendo GameCube", "GameCube", "GCN"],
];

// ---------------------------------------------------------------------------
// Formats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TexKind {
    Pvr = 0,
    Gvr = 1,
}

impl TexKind {
    fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::Pvr),
            1 => Some(Self::Gvr),
            _ => None,
        }
    }

    fn from_magic(magic: &[u8]) -> Option<Self> {
        match magic {
            m if m == PVRT_MAGIC => Some(Self::Pvr),
            m if m == GVRT_MAGIC => Some(Self::Gvr),
            _ => None,
        }
    }
}

fn pvr_pixel_name(px: u8) -> Option<&'static str> {
    Some(match px {
        0 => "ARGB1555",
        1 => "RGB565",
        2 => "ARGB4444",
        3 => "YUV422",
        4 => "Bump map",
        5 => "4-bit paletted",
        6 => "8-bit paletted",
        _ => return None,
    })
}

fn pvr_pixel16(px: u8) -> Option<Pixel16> {
    match px {
        0 => Some(Pixel16::Argb1555),
        1 => Some(Pixel16::Rgb565),
        2 => Some(Pixel16::Argb4444),
        _ => None,
    }
}

/// `(name, mipmapped)`
fn pvr_data_type(dt: u8) -> Option<(&'static str, bool)> {
    Some(match dt {
        0x01 => ("Twiddled", false),
        0x02 => ("Twiddled", true),
        0x03 => ("VQ", false),
        0x04 => ("VQ", true),
        0x05 => ("CI4", false),
        0x06 => ("CI4", true),
        0x07 => ("CI8", false),
        0x08 => ("CI8", true),
        0x09 => ("Rectangle", false),
        0x0B => ("Rectangle (stride)", false),
        0x0D => ("Twiddled rectangle", false),
        0x10 => ("Small VQ", false),
        0x11 => ("Small VQ", true),
        0x12 => ("Twiddled (alternate mipmaps)", true),
        _ => return None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GvrFormat {
    I4 = 0,
    I8 = 1,
    Ia4 = 2,
    Ia8 = 3,
    Rgb565 = 4,
    Rgb5a3 = 5,
    Argb8888 = 6,
    Ci4 = 8,
    Ci8 = 9,
    Cmpr = 0xE,
}

impl GvrFormat {
    fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::I4,
            1 => Self::I8,
            2 => Self::Ia4,
            3 => Self::Ia8,
            4 => Self::Rgb565,
            5 => Self::Rgb5a3,
            6 => Self::Argb8888,
            8 => Self::Ci4,
            9 => Self::Ci8,
            0xE => Self::Cmpr,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            Self::I4 => "I4",
            Self::I8 => "I8",
            Self::Ia4 => "IA4",
            Self::Ia8 => "IA8",
            Self::Rgb565 => "RGB565",
            Self::Rgb5a3 => "RGB5A3",
            Self::Argb8888 => "ARGB8888",
            Self::Ci4 => "CI4",
            Self::Ci8 => "CI8",
            Self::Cmpr => "CMPR",
        }
    }

    fn palette_entries(self) -> Option<usize> {
        match self {
            Self::Ci4 => Some(16),
            Self::Ci8 => Some(256),
            _ => None,
        }
    }
}

/// GVR palette entry format, from the high nibble of the flags byte.
fn gvr_palette_format(raw: u8) -> Option<(Pixel16, &'static str)> {
    match raw {
        0 => Some((Pixel16::Ia8, "IA8")),
        1 => Some((Pixel16::Rgb565, "RGB565")),
        2 => Some((Pixel16::Rgb5a3, "RGB5A3")),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct TexHeader {
    kind: TexKind,
    global_index: Option<u32>,
    /// Start of the texel data (after the texture header)
    data_offset: u64,
    width: u16,
    height: u16,
    /// PVR pixel format, or GVR palette format and flags
    format: u8,
    /// PVR data type or GVR data format
    data_type: u8,
}

impl TexHeader {
    fn parse(buf: &[u8]) -> Option<Self> {
        let mut off = 0;
        let mut gbix = None;
        let magic = buf.get(..4)?;
        if magic == GBIX_MAGIC || magic == GCIX_MAGIC {
            let len = read_u32_le(buf.get(..CHUNK_HEADER_LEN)?, 4) as usize;
            if !(4..=MAX_GBIX_LEN).contains(&len) {
                return None;
            }
            gbix = Some(buf.get(CHUNK_HEADER_LEN..CHUNK_HEADER_LEN + 4)?);
            off = CHUNK_HEADER_LEN + len;
        }
        let h = buf.get(off..off + TEX_HEADER_LEN)?;
        let kind = TexKind::from_magic(&h[..4])?;
        let header = match kind {
            TexKind::Pvr => Self {
                kind,
                global_index: gbix.map(|g| read_u32_le(g, 0)),
                data_offset: (off + TEX_HEADER_LEN) as u64,
                width: read_u16_le(h, PVR_OFF_WIDTH),
                height: read_u16_le(h, PVR_OFF_HEIGHT),
                format: h[PVR_OFF_PIXEL],
                data_type: h[PVR_OFF_DATA],
            },
            TexKind::Gvr => Self {
                kind,
                global_index: gbix.map(|g| read_u32_be(g, 0)),
                data_offset: (off + TEX_HEADER_LEN) as u64,
                width: read_u16_be(h, GVR_OFF_WIDTH),
                height: read_u16_be(h, GVR_OFF_HEIGHT),
                format: h[GVR_OFF_FLAGS],
                data_type: h[GVR_OFF_DATA],
            },
        };
        header.is_plausible().then_some(header)
    }

    fn is_plausible(&self) -> bool {
        let dims_ok = (1..=MAX_DIMENSION).contains(&self.width)
            && (1..=MAX_DIMENSION).contains(&self.height);
        dims_ok
            && match self.kind {
                TexKind::Pvr => {
                    pvr_pixel_name(self.format).is_some() && pvr_data_type(self.data_type).is_some()
                }
                TexKind::Gvr => GvrFormat::from_raw(self.data_type).is_some(),
            }
    }

    fn mipmapped(&self) -> bool {
        match self.kind {
            TexKind::Pvr => pvr_data_type(self.data_type).is_some_and(|(_, mm)| mm),
            TexKind::Gvr => self.format & GVR_FLAG_MIPMAPS != 0,
        }
    }

    fn gvr_palette(&self) -> Option<(Pixel16, &'static str)> {
        gvr_palette_format(self.format >> 4)
    }

    /// Whether [`decode`](Self::decode) can handle this texture.
    fn is_decodable(&self) -> bool {
        match self.kind {
            TexKind::Pvr => {
                pvr_pixel16(self.format).is_some()
                    && matches!(self.data_type, 0x01..=0x04 | 0x09 | 0x0B | 0x0D | 0x10 | 0x11)
            }
            TexKind::Gvr => match GvrFormat::from_raw(self.data_type) {
                Some(f) if f.palette_entries().is_some() => {
                    self.format & GVR_FLAG_INT_PALETTE != 0 && self.gvr_palette().is_some()
                }
                Some(_) => true,
                None => false,
            },
        }
    }

    fn decode(&self, data: &[u8]) -> Result<Bitmap, RomError> {
        match self.kind {
            TexKind::Pvr => self.decode_pvr(data),
            TexKind::Gvr => self.decode_gvr(data),
        }
    }

    fn decode_pvr(&self, data: &[u8]) -> Result<Bitmap, RomError> {
        let (w, h) = (self.width as u32, self.height as u32);
        let pixel = pvr_pixel16(self.format).ok_or_else(|| {
            RomError::unsupported(format!("PVR pixel format {}", self.format))
        })?;
        let mm = self.mipmapped();
        let bmp = match self.data_type {
            0x01 | 0x02 | 0x0D => {
                let skip = if mm { twiddled_mip_skip(w) } else { 0 };
                from_twiddled16(pixel, w, h, data.get(skip..).unwrap_or_default())?
            }
            0x03 | 0x04 | 0x10 | 0x11 => {
                let entries = if self.data_type <= 0x04 {
                    VQ_ENTRIES
                } else {
                    small_vq_codebook_entries(w, mm)
                };
                let codebook_len = entries * VQ_ENTRY_LEN;
                let skip = if mm { vq_mip_skip(w) } else { 0 };
                let Some(indices) = data.get(codebook_len + skip..) else {
                    return Err(RomError::truncated(
                        (codebook_len + skip) as u64,
                        data.len() as u64,
                    ));
                };
                let mut joined = data[..codebook_len].to_vec();
                joined.extend_from_slice(indices);
                from_vq(pixel, w, h, &joined, entries)?
            }
            0x09 | 0x0B => from_linear16(pixel, w, h, data, Endian::Little, 0)?,
            other => {
                return Err(RomError::unsupported(format!("PVR data type 0x{other:02X}")));
            }
        };
        Ok(bmp)
    }

    fn decode_gvr(&self, data: &[u8]) -> Result<Bitmap, RomError> {
        let (w, h) = (self.width as u32, self.height as u32);
        let format = GvrFormat::from_raw(self.data_type).ok_or_else(|| {
            RomError::unsupported(format!("GVR data format {}", self.data_type))
        })?;
        let bmp = match format {
            GvrFormat::I4 => from_gcn_i4(w, h, data)?,
            GvrFormat::I8 => from_gcn_i8(w, h, data)?,
            GvrFormat::Ia4 => from_gcn_ia4(w, h, data)?,
            GvrFormat::Ia8 => from_gcn16(Pixel16::Ia8, w, h, data)?,
            GvrFormat::Rgb565 => from_gcn16(Pixel16::Rgb565, w, h, data)?,
            GvrFormat::Rgb5a3 => from_gcn16(Pixel16::Rgb5a3, w, h, data)?,
            GvrFormat::Argb8888 => from_gcn_argb8888(w, h, data)?,
            GvrFormat::Cmpr => from_gcn_cmpr(w, h, data)?,
            GvrFormat::Ci4 | GvrFormat::Ci8 => {
                let (pixel, _) = self
                    .gvr_palette()
                    .filter(|_| self.format & GVR_FLAG_INT_PALETTE != 0)
                    .ok_or_else(|| RomError::unsupported("GVR with an external palette"))?;
                let entries = format.palette_entries().unwrap_or(16);
                let pal_len = entries * 2;
                if data.len() < pal_len {
                    return Err(RomError::truncated(pal_len as u64, data.len() as u64));
                }
                let palette = decode_palette16(pixel, &data[..pal_len], Endian::Big);
                let texels = &data[pal_len..];
                if format == GvrFormat::Ci4 {
                    from_gcn_ci4(w, h, texels, &palette)?
                } else {
                    from_gcn_ci8(w, h, texels, &palette)?
                }
            }
        };
        Ok(bmp)
    }
}

/// Sizes of the mip levels stored before the full-size level, smallest
/// first: 1, 2, 4, ... up to half the width.
fn mip_sizes(width: u32) -> impl Iterator<Item = usize> {
    std::iter::successors(Some(1usize), |s| Some(s * 2)).take_while(move |&s| s < width as usize)
}

fn twiddled_mip_skip(width: u32) -> usize {
    TWIDDLED_MIP_PAD + mip_sizes(width).map(|s| s * s * 2).sum::<usize>()
}

fn vq_mip_skip(width: u32) -> usize {
    VQ_MIP_PAD
        + mip_sizes(width)
            .filter(|&s| s >= 2)
            .map(|s| (s / 2) * (s / 2))
            .sum::<usize>()
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// A PVR or GVR texture file.
pub struct SegaPvr {
    stream: Option<Box<dyn ByteStream>>,
    header: TexHeader,
}

impl RomFormat for SegaPvr {
    const NAME: &'static str = "Sega PVR";
    const EXTENSIONS: &'static [&'static str] = &["pvr", "gvr"];
    const HEADER_SIZE: usize = CHUNK_HEADER_LEN + MAX_GBIX_LEN + TEX_HEADER_LEN;

    fn detect(info: &DetectInfo<'_>) -> Option<u32> {
        let header = TexHeader::parse(info.header)?;
        (info.size >= header.data_offset).then_some(header.kind as u32)
    }

    fn open(
        mut stream: Box<dyn ByteStream>,
        system_id: u32,
        _ctx: &ParseContext,
    ) -> Result<Self, RomError> {
        let kind = TexKind::from_id(system_id)
            .ok_or_else(|| RomError::invalid_format(format!("unknown texture sub-type {system_id}")))?;
        let buf = stream.read_up_to(0, Self::HEADER_SIZE)?;
        let header = TexHeader::parse(&buf)
            .filter(|h| h.kind == kind)
            .ok_or_else(|| RomError::invalid_format("missing PVRT/GVRT header"))?;
        Ok(Self {
            stream: Some(stream),
            header,
        })
    }

    fn file_type(&self) -> FileType {
        FileType::TextureFile
    }

    fn system_name(&self, variant: SystemNameVariant) -> Option<&'static str> {
        lookup(&SYSTEM_NAMES, self.header.kind as usize, variant)
    }

    fn load_fields(&mut self, _ctx: &ParseContext, fields: &mut FieldList) -> Result<(), RomError> {
        if self.stream.is_none() {
            return Err(RomError::NotOpen);
        }
        let h = &self.header;
        fields.add_string(
            "Texture format",
            match h.kind {
                TexKind::Pvr => "PVR",
                TexKind::Gvr => "GVR",
            },
        );
        if let Some(index) = h.global_index {
            fields.add_numeric("Global index", index as i64);
        }
        match h.kind {
            TexKind::Pvr => {
                let pixel = pvr_pixel_name(h.format).unwrap_or("Unknown");
                let (data_type, _) = pvr_data_type(h.data_type).unwrap_or(("Unknown", false));
                fields.add_string("Pixel format", pixel);
                fields.add_string("Data type", data_type);
            }
            TexKind::Gvr => {
                let format = GvrFormat::from_raw(h.data_type);
                fields.add_string("Pixel format", format.map_or("Unknown", GvrFormat::name));
                if format.is_some_and(|f| f.palette_entries().is_some()) {
                    let internal = h.format & GVR_FLAG_INT_PALETTE != 0;
                    let external = h.format & GVR_FLAG_EXT_PALETTE != 0;
                    let palette = match (internal, external) {
                        (false, false) => "None".to_string(),
                        (false, true) => "External".to_string(),
                        (true, _) => format!(
                            "Internal ({})",
                            h.gvr_palette().map_or("Unknown", |(_, name)| name)
                        ),
                    };
                    fields.add_string("Palette", palette);
                }
            }
        }
        fields.add_string("Dimensions", format!("{}x{}", h.width, h.height));
        fields.add_string("Mipmapped", if h.mipmapped() { "Yes" } else { "No" });
        Ok(())
    }

    fn supported_image_kinds(&self) -> ImageKinds {
        if self.header.is_decodable() {
            ImageKinds::INT_IMAGE
        } else {
            ImageKinds::empty()
        }
    }

    fn load_image(&mut self, kind: ImageKind) -> Result<Option<Bitmap>, RomError> {
        let stream = self.stream.as_deref_mut().ok_or(RomError::NotOpen)?;
        if kind != ImageKind::IntImage || !self.header.is_decodable() {
            return Ok(None);
        }
        let len = stream.size().saturating_sub(self.header.data_offset);
        if len > MAX_DATA_LEN {
            return Err(RomError::unsupported(format!("{len} bytes of texture data")));
        }
        let data = stream.read_up_to(self.header.data_offset, len as usize)?;
        self.header.decode(&data).map(Some)
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

#[cfg(test)]
#[path = "tests/pvr_tests.rs"]
mod tests;
