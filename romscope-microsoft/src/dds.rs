//! DirectDraw Surface textures.
//!
//! Supports:
//! - DXT1 through DXT5 (FourCC), and BC1/BC2/BC3 through the DX10 extension
//! - Uncompressed 16, 24 and 32-bit RGB(A) described by channel masks
//!
//! Only the top-level surface is decoded. DXT2 and DXT4 are decoded as
//! DXT3 and DXT5; their premultiplied alpha is left as stored.

use romscope_core::bytes::read_u32_le;
use romscope_core::system::lookup;
use romscope_core::{
    Bitmap, ByteStream, DetectInfo, FieldList, FileType, ImageKind, ImageKinds, ParseContext,
    RomError, RomFormat, SystemNameRow, SystemNameVariant,
};
use romscope_texture::linear::{ChannelMasks, from_linear_masked};
use romscope_texture::s3tc::{Color3, from_dxt1, from_dxt3, from_dxt5};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const DDS_MAGIC: &[u8; 4] = b"DDS ";
const DDS_HEADER_LEN: u32 = 124;
const DX10_HEADER_LEN: usize = 20;
const DATA_OFFSET: u64 = 4 + DDS_HEADER_LEN as u64;

const OFF_SIZE: usize = 0x04;
const OFF_FLAGS: usize = 0x08;
const OFF_HEIGHT: usize = 0x0C;
const OFF_WIDTH: usize = 0x10;
const OFF_PITCH: usize = 0x14;
const OFF_DEPTH: usize = 0x18;
const OFF_MIP_COUNT: usize = 0x1C;
const OFF_PF_FLAGS: usize = 0x50;
const OFF_PF_FOURCC: usize = 0x54;
const OFF_PF_BITS: usize = 0x58;
const OFF_PF_MASKS: usize = 0x5C;
const OFF_CAPS2: usize = 0x70;

const DDSD_PITCH: u32 = 0x8;
const DDSD_MIPMAPCOUNT: u32 = 0x2_0000;
const DDSD_DEPTH: u32 = 0x80_0000;

const DDPF_ALPHAPIXELS: u32 = 0x1;
const DDPF_FOURCC: u32 = 0x4;
const DDPF_RGB: u32 = 0x40;
const DDPF_LUMINANCE: u32 = 0x2_0000;

const DDSCAPS2_CUBEMAP: u32 = 0x200;
const DDSCAPS2_VOLUME: u32 = 0x20_0000;

const MAX_DIMENSION: u32 = 16384;
const MAX_DATA_LEN: usize = 64 * 1024 * 1024;

const SYSTEM_NAMES: [SystemNameRow; 1] = [["Microsoft DirectX", "DirectX", "DX"]];

// ---------------------------------------------------------------------------
// Pixel formats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Dxt1,
    Dxt3,
    Dxt5,
}

impl Block {
    fn block_len(self) -> usize {
        match self {
            Self::Dxt1 => 8,
            Self::Dxt3 | Self::Dxt5 => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelFormat {
    Compressed(Block),
    Masked { bits: usize, masks: ChannelMasks },
}

/// A DXGI format this parser can decode.
fn dxgi_format(format: u32) -> Option<(&'static str, PixelFormat)> {
    let masked = |bits, r, g, b, a| PixelFormat::Masked {
        bits,
        masks: ChannelMasks { r, g, b, a },
    };
    Some(match format {
        28 => ("R8G8B8A8_UNORM", masked(32, 0xFF, 0xFF00, 0xFF_0000, 0xFF00_0000)),
        29 => ("R8G8B8A8_UNORM_SRGB", masked(32, 0xFF, 0xFF00, 0xFF_0000, 0xFF00_0000)),
        71 => ("BC1_UNORM", PixelFormat::Compressed(Block::Dxt1)),
        72 => ("BC1_UNORM_SRGB", PixelFormat::Compressed(Block::Dxt1)),
        74 => ("BC2_UNORM", PixelFormat::Compressed(Block::Dxt3)),
        75 => ("BC2_UNORM_SRGB", PixelFormat::Compressed(Block::Dxt3)),
        77 => ("BC3_UNORM", PixelFormat::Compressed(Block::Dxt5)),
        78 => ("BC3_UNORM_SRGB", PixelFormat::Compressed(Block::Dxt5)),
        85 => ("B5G6R5_UNORM", masked(16, 0xF800, 0x07E0, 0x001F, 0)),
        86 => ("B5G5R5A1_UNORM", masked(16, 0x7C00, 0x03E0, 0x001F, 0x8000)),
        87 => ("B8G8R8A8_UNORM", masked(32, 0xFF_0000, 0xFF00, 0xFF, 0xFF00_0000)),
        88 => ("B8G8R8X8_UNORM", masked(32, 0xFF_0000, 0xFF00, 0xFF, 0)),
        91 => ("B8G8R8A8_UNORM_SRGB", masked(32, 0xFF_0000, 0xFF00, 0xFF, 0xFF00_0000)),
        93 => ("B8G8R8X8_UNORM_SRGB", masked(32, 0xFF_0000, 0xFF00, 0xFF, 0)),
        115 => ("B4G4R4A4_UNORM", masked(16, 0x0F00, 0x00F0, 0x000F, 0xF000)),
        _ => return None,
    })
}

/// Conventional name for a masked layout.
fn masked_name(bits: usize, m: &ChannelMasks) -> String {
    let name = match (bits, m.r, m.g, m.b, m.a) {
        (32, 0xFF_0000, 0xFF00, 0xFF, 0xFF00_0000) => "ARGB8888",
        (32, 0xFF_0000, 0xFF00, 0xFF, 0) => "xRGB8888",
        (32, 0xFF, 0xFF00, 0xFF_0000, 0xFF00_0000) => "ABGR8888",
        (32, 0xFF, 0xFF00, 0xFF_0000, 0) => "xBGR8888",
        (24, 0xFF_0000, 0xFF00, 0xFF, 0) => "RGB888",
        (16, 0xF800, 0x07E0, 0x001F, 0) => "RGB565",
        (16, 0x7C00, 0x03E0, 0x001F, 0x8000) => "ARGB1555",
        (16, 0x7C00, 0x03E0, 0x001F, 0) => "xRGB1555",
        (16, 0x0F00, 0x00F0, 0x000F, 0xF000) => "ARGB4444",
        (16, 0x0F00, 0x00F0, 0x000F, 0) => "xRGB4444",
        _ => {
            return format!(
                "{bits}-bit RGB (R 0x{:08X}, G 0x{:08X}, B 0x{:08X}, A 0x{:08X})",
                m.r, m.g, m.b, m.a
            );
        }
    };
    name.to_string()
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct DdsHeader {
    flags: u32,
    width: u32,
    height: u32,
    pitch: u32,
    depth: u32,
    mip_count: u32,
    pf_flags: u32,
    fourcc: [u8; 4],
    bits: u32,
    masks: ChannelMasks,
    caps2: u32,
    /// DXGI format from the DX10 extension header
    dxgi: Option<u32>,
}

impl DdsHeader {
    fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < DATA_OFFSET as usize || &buf[..4] != DDS_MAGIC {
            return None;
        }
        if read_u32_le(buf, OFF_SIZE) != DDS_HEADER_LEN {
            return None;
        }
        let mut fourcc = [0u8; 4];
        fourcc.copy_from_slice(&buf[OFF_PF_FOURCC..OFF_PF_FOURCC + 4]);
        let pf_flags = read_u32_le(buf, OFF_PF_FLAGS);
        let dxgi = if pf_flags & DDPF_FOURCC != 0 && &fourcc == b"DX10" {
            let ext = DATA_OFFSET as usize;
            Some(read_u32_le(buf.get(ext..ext + DX10_HEADER_LEN)?, 0))
        } else {
            None
        };
        let header = Self {
            flags: read_u32_le(buf, OFF_FLAGS),
            width: read_u32_le(buf, OFF_WIDTH),
            height: read_u32_le(buf, OFF_HEIGHT),
            pitch: read_u32_le(buf, OFF_PITCH),
            depth: read_u32_le(buf, OFF_DEPTH),
            mip_count: read_u32_le(buf, OFF_MIP_COUNT),
            pf_flags,
            fourcc,
            bits: read_u32_le(buf, OFF_PF_BITS),
            masks: ChannelMasks {
                r: read_u32_le(buf, OFF_PF_MASKS),
                g: read_u32_le(buf, OFF_PF_MASKS + 4),
                b: read_u32_le(buf, OFF_PF_MASKS + 8),
                a: read_u32_le(buf, OFF_PF_MASKS + 12),
            },
            caps2: read_u32_le(buf, OFF_CAPS2),
            dxgi,
        };
        let dims_ok = (1..=MAX_DIMENSION).contains(&header.width)
            && (1..=MAX_DIMENSION).contains(&header.height);
        dims_ok.then_some(header)
    }

    fn data_offset(&self) -> u64 {
        match self.dxgi {
            Some(_) => DATA_OFFSET + DX10_HEADER_LEN as u64,
            None => DATA_OFFSET,
        }
    }

    /// Decodable layout of the top-level surface.
    fn pixel_format(&self) -> Option<PixelFormat> {
        if let Some(format) = self.dxgi {
            return dxgi_format(format).map(|(_, pf)| pf);
        }
        if self.pf_flags & DDPF_FOURCC != 0 {
            return match &self.fourcc {
                b"DXT1" => Some(PixelFormat::Compressed(Block::Dxt1)),
                b"DXT2" | b"DXT3" => Some(PixelFormat::Compressed(Block::Dxt3)),
                b"DXT4" | b"DXT5" => Some(PixelFormat::Compressed(Block::Dxt5)),
                _ => None,
            };
        }
        let bits = self.bits as usize;
        if self.pf_flags & DDPF_RGB != 0 && matches!(bits, 16 | 24 | 32) {
            let mut masks = self.masks;
            if self.pf_flags & DDPF_ALPHAPIXELS == 0 {
                masks.a = 0;
            }
            return Some(PixelFormat::Masked { bits, masks });
        }
        None
    }

    fn format_name(&self) -> String {
        if let Some(format) = self.dxgi {
            return match dxgi_format(format) {
                Some((name, _)) => format!("DXGI {name}"),
                None => format!("DXGI format {format}"),
            };
        }
        if self.pf_flags & DDPF_FOURCC != 0 {
            return String::from_utf8_lossy(&self.fourcc).trim_end().to_string();
        }
        if self.pf_flags & DDPF_LUMINANCE != 0 {
            return format!("{}-bit luminance", self.bits);
        }
        match self.pixel_format() {
            Some(PixelFormat::Masked { bits, masks }) => masked_name(bits, &masks),
            _ => "Unknown".to_string(),
        }
    }

    /// Bytes in the top-level surface, and the source row pitch for
    /// uncompressed data.
    fn surface_len(&self, format: PixelFormat) -> (usize, usize) {
        let (w, h) = (self.width as usize, self.height as usize);
        match format {
            PixelFormat::Compressed(block) => (w.div_ceil(4) * h.div_ceil(4) * block.block_len(), 0),
            PixelFormat::Masked { bits, .. } => {
                let packed = w * bits / 8;
                let pitch = self.pitch as usize;
                let stride = if self.flags & DDSD_PITCH != 0 && pitch >= packed {
                    pitch
                } else {
                    packed
                };
                (stride * (h - 1) + packed, stride)
            }
        }
    }

    fn decode(&self, format: PixelFormat, data: &[u8]) -> Result<Bitmap, RomError> {
        let (_, stride) = self.surface_len(format);
        let bmp = match format {
            PixelFormat::Compressed(block) => {
                let padded_w = self.width.next_multiple_of(4);
                let padded_h = self.height.next_multiple_of(4);
                let full = match block {
                    Block::Dxt1 => from_dxt1(padded_w, padded_h, data, Color3::Transparent)?,
                    Block::Dxt3 => from_dxt3(padded_w, padded_h, data)?,
                    Block::Dxt5 => from_dxt5(padded_w, padded_h, data)?,
                };
                crop(full, self.width, self.height)
            }
            PixelFormat::Masked { bits, masks } => {
                from_linear_masked(self.width, self.height, data, bits, masks, stride)?
            }
        };
        Ok(bmp)
    }
}

/// Top-left `width` x `height` of `bmp`.
fn crop(bmp: Bitmap, width: u32, height: u32) -> Bitmap {
    if bmp.width() == width && bmp.height() == height {
        return bmp;
    }
    let mut out = Bitmap::new_argb32(width, height);
    for y in 0..height {
        for x in 0..width {
            out.set_argb(x, y, bmp.argb_at(x, y).unwrap_or(0));
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// A DirectDraw Surface texture.
pub struct DirectDrawSurface {
    stream: Option<Box<dyn ByteStream>>,
    header: DdsHeader,
}

impl RomFormat for DirectDrawSurface {
    const NAME: &'static str = "DirectDraw Surface";
    const EXTENSIONS: &'static [&'static str] = &["dds"];
    const HEADER_SIZE: usize = DATA_OFFSET as usize + DX10_HEADER_LEN;

    fn detect(info: &DetectInfo<'_>) -> Option<u32> {
        let header = DdsHeader::parse(info.header)?;
        (info.size >= header.data_offset()).then_some(0)
    }

    fn open(
        mut stream: Box<dyn ByteStream>,
        system_id: u32,
        _ctx: &ParseContext,
    ) -> Result<Self, RomError> {
        if system_id != 0 {
            return Err(RomError::invalid_format(format!(
                "unknown DDS sub-type {system_id}"
            )));
        }
        let buf = stream.read_up_to(0, Self::HEADER_SIZE)?;
        let header =
            DdsHeader::parse(&buf).ok_or_else(|| RomError::invalid_format("missing DDS header"))?;
        Ok(Self {
            stream: Some(stream),
            header,
        })
    }

    fn file_type(&self) -> FileType {
        FileType::TextureFile
    }

    fn system_name(&self, variant: SystemNameVariant) -> Option<&'static str> {
        lookup(&SYSTEM_NAMES, 0, variant)
    }

    fn load_fields(&mut self, _ctx: &ParseContext, fields: &mut FieldList) -> Result<(), RomError> {
        if self.stream.is_none() {
            return Err(RomError::NotOpen);
        }
        let h = &self.header;
        fields.add_string("Texture format", h.format_name());
        fields.add_string("Dimensions", format!("{}x{}", h.width, h.height));
        if h.caps2 & DDSCAPS2_VOLUME != 0 && h.flags & DDSD_DEPTH != 0 {
            fields.add_numeric("Depth", h.depth as i64);
        }
        let mips = if h.flags & DDSD_MIPMAPCOUNT != 0 {
            h.mip_count.max(1)
        } else {
            1
        };
        fields.add_numeric("Mipmap levels", mips as i64);
        fields.add_string(
            "Cube map",
            if h.caps2 & DDSCAPS2_CUBEMAP != 0 { "Yes" } else { "No" },
        );
        Ok(())
    }

    fn supported_image_kinds(&self) -> ImageKinds {
        if self.header.pixel_format().is_some() {
            ImageKinds::INT_IMAGE
        } else {
            ImageKinds::empty()
        }
    }

    fn load_image(&mut self, kind: ImageKind) -> Result<Option<Bitmap>, RomError> {
        let stream = self.stream.as_deref_mut().ok_or(RomError::NotOpen)?;
        let Some(format) = self.header.pixel_format().filter(|_| kind == ImageKind::IntImage)
        else {
            return Ok(None);
        };
        let (len, _) = self.header.surface_len(format);
        if len > MAX_DATA_LEN {
            return Err(RomError::unsupported(format!("{len}-byte surface")));
        }
        let data = stream.read_vec_at(self.header.data_offset(), len)?;
        self.header.decode(format, &data).map(Some)
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

#[cfg(test)]
#[path = "tests/dds_tests.rs"]
mod tests;
