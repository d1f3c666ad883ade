//! GameCube memory card save files.
//!
//! Supports:
//! - GCI: 0x40-byte directory entry followed by the save blocks
//! - GCS (GameShark): 0x110-byte header ending with the directory entry
//! - SAV (MaxDrive): 0x80-byte header; the directory entry at 0x40 is
//!   stored with every 16-bit word byte-swapped
//!
//! The variant is picked from the file size (header plus a whole number of
//! 0x2000-byte blocks) and accepted only if the directory entry passes
//! validation. Banner and icon graphics live in the save data at the
//! entry's image offset.

use chrono::{DateTime, NaiveDateTime};
use romscope_core::bytes::{read_u16_be, read_u32_be, swap16_in_place};
use romscope_core::system::lookup;
use romscope_core::util::{read_ascii_fixed, read_latin1, read_shift_jis};
use romscope_core::{
    AnimFrame, AnimatedIcon, Bitmap, ByteStream, DetectInfo, FieldKind, FieldList, FileType,
    ImageKind, ImageKinds, ParseContext, RomError, RomFormat, SaveVariant, SystemNameRow,
    SystemNameVariant,
};
use romscope_texture::tiled::{from_gcn_ci8, from_gcn16};
use romscope_texture::{Endian, Pixel16, decode_palette16};

use crate::licensee::publisher;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const BLOCK_LEN: u64 = 0x2000;
const DENTRY_LEN: usize = 0x40;
const HEADER_LEN: usize = 0x110;

const OFF_PAD: usize = 0x06;
const OFF_BANNER_FLAGS: usize = 0x07;
const OFF_FILENAME: usize = 0x08;
const OFF_MTIME: usize = 0x28;
const OFF_IMAGE: usize = 0x2C;
const OFF_ICON_FORMATS: usize = 0x30;
const OFF_ICON_SPEEDS: usize = 0x32;
const OFF_PERMISSIONS: usize = 0x34;
const OFF_COPY_COUNT: usize = 0x35;
const OFF_BLOCK_COUNT: usize = 0x38;
const OFF_PAD2: usize = 0x3A;
const OFF_COMMENT: usize = 0x3C;

const COMMENT_LEN: usize = 0x40;
const NO_IMAGE: u32 = 0xFFFF_FFFF;

/// Banner animation flag: play icons forward then backward.
const ANIM_PING_PONG: u8 = 0x04;

const BANNER_W: u32 = 96;
const BANNER_H: u32 = 32;
const ICON_SIZE: u32 = 32;
const MAX_ICONS: usize = 8;
const CI8_PALETTE_LEN: usize = 0x200;

/// Seconds between the Unix epoch and 2000-01-01 00:00:00.
const GCN_EPOCH: i64 = 946_684_800;

const SYSTEM_NAMES: [SystemNameRow; 1] = [["Nintendo GameCube", "GameCube", "GCN"]];

const PERMISSION_NAMES: [Option<&str>; 5] =
    [None, None, Some("Public"), Some("No Copy"), Some("No Move")];

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveKind {
    Gci = 0,
    Gcs = 1,
    Sav = 2,
}

impl SaveKind {
    fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::Gci),
            1 => Some(Self::Gcs),
            2 => Some(Self::Sav),
            _ => None,
        }
    }

    fn from_variant(v: SaveVariant) -> Option<Self> {
        match v {
            SaveVariant::GcnGci => Some(Self::Gci),
            SaveVariant::GcnGcs => Some(Self::Gcs),
            SaveVariant::GcnSav => Some(Self::Sav),
            _ => None,
        }
    }

    fn data_offset(self) -> u64 {
        match self {
            Self::Gci => 0x40,
            Self::Gcs => 0x110,
            Self::Sav => 0x80,
        }
    }

    /// The directory entry sits right before the data, except in SAV files.
    fn dentry_offset(self) -> usize {
        match self {
            Self::Gci => 0,
            Self::Gcs => 0xD0,
            Self::Sav => 0x40,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Gci => "GCI",
            Self::Gcs => "GCS (GameShark)",
            Self::Sav => "SAV (MaxDrive)",
        }
    }

    /// The directory entry in big-endian order, or `None` if `header` is
    /// too short.
    fn dentry(self, header: &[u8]) -> Option<[u8; DENTRY_LEN]> {
        let off = self.dentry_offset();
        let mut d: [u8; DENTRY_LEN] = header.get(off..off + DENTRY_LEN)?.try_into().ok()?;
        if self == Self::Sav {
            swap16_in_place(&mut d);
        }
        Some(d)
    }
}

// ---------------------------------------------------------------------------
// Directory entry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct DirEntry {
    game_code: String,
    company: String,
    pad: u8,
    banner_flags: u8,
    filename: String,
    mtime: u32,
    image_offset: u32,
    icon_formats: u16,
    icon_speeds: u16,
    permissions: u8,
    copy_count: u8,
    block_count: u16,
    pad2: u16,
    comment_offset: u32,
    raw_code: [u8; 4],
}

fn parse_dentry(d: &[u8; DENTRY_LEN]) -> DirEntry {
    DirEntry {
        game_code: read_ascii_fixed(&d[0..4]),
        company: read_ascii_fixed(&d[4..6]),
        pad: d[OFF_PAD],
        banner_flags: d[OFF_BANNER_FLAGS],
        filename: read_latin1(&d[OFF_FILENAME..OFF_MTIME]),
        mtime: read_u32_be(d, OFF_MTIME),
        image_offset: read_u32_be(d, OFF_IMAGE),
        icon_formats: read_u16_be(d, OFF_ICON_FORMATS),
        icon_speeds: read_u16_be(d, OFF_ICON_SPEEDS),
        permissions: d[OFF_PERMISSIONS],
        copy_count: d[OFF_COPY_COUNT],
        block_count: read_u16_be(d, OFF_BLOCK_COUNT),
        pad2: read_u16_be(d, OFF_PAD2),
        comment_offset: read_u32_be(d, OFF_COMMENT),
        raw_code: [d[0], d[1], d[2], d[3]],
    }
}

/// Cross-check a directory entry against the save data size.
fn is_valid_dentry(d: &DirEntry, data_len: u64) -> bool {
    d.pad == 0xFF
        && d.pad2 == 0xFFFF
        && d.raw_code.iter().all(|b| b.is_ascii_alphanumeric())
        && d.block_count as u64 * BLOCK_LEN == data_len
        && (d.comment_offset as u64 + COMMENT_LEN as u64) <= data_len
        && (d.image_offset == NO_IMAGE || (d.image_offset as u64) < data_len)
}

// ---------------------------------------------------------------------------
// Graphics layout
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IconFormat {
    /// 8-bit indexed, palette shared by all icons after the last icon
    Ci8Shared,
    Rgb5a3,
    /// 8-bit indexed with its own palette right after the pixels
    Ci8Unique,
}

impl IconFormat {
    fn from_bits(bits: u16) -> Option<Self> {
        match bits & 3 {
            1 => Some(Self::Ci8Shared),
            2 => Some(Self::Rgb5a3),
            3 => Some(Self::Ci8Unique),
            _ => None,
        }
    }

    fn len(self) -> usize {
        let px = (ICON_SIZE * ICON_SIZE) as usize;
        match self {
            Self::Ci8Shared => px,
            Self::Rgb5a3 => px * 2,
            Self::Ci8Unique => px + CI8_PALETTE_LEN,
        }
    }
}

/// Where each image lives, relative to the image offset.
#[derive(Debug, Default)]
struct GraphicsLayout {
    /// `(is_ci8, offset)`
    banner: Option<(bool, usize)>,
    icons: [Option<(IconFormat, usize)>; MAX_ICONS],
    shared_palette: Option<usize>,
    len: usize,
}

fn graphics_layout(d: &DirEntry) -> GraphicsLayout {
    let mut layout = GraphicsLayout::default();
    let mut off = 0;
    let banner_px = (BANNER_W * BANNER_H) as usize;
    match d.banner_flags & 3 {
        1 => {
            layout.banner = Some((true, off));
            off += banner_px + CI8_PALETTE_LEN;
        }
        2 => {
            layout.banner = Some((false, off));
            off += banner_px * 2;
        }
        _ => {}
    }
    let mut shared = false;
    for (i, slot) in layout.icons.iter_mut().enumerate() {
        if let Some(fmt) = IconFormat::from_bits(d.icon_formats >> (i * 2)) {
            *slot = Some((fmt, off));
            off += fmt.len();
            shared |= fmt == IconFormat::Ci8Shared;
        }
    }
    if shared {
        layout.shared_palette = Some(off);
        off += CI8_PALETTE_LEN;
    }
    layout.len = off;
    layout
}

fn palette_at(raw: &[u8], off: usize) -> Vec<u32> {
    decode_palette16(
        Pixel16::Rgb5a3,
        &raw[off..off + CI8_PALETTE_LEN],
        Endian::Big,
    )
}

/// Icon display time in milliseconds for a 2-bit speed value.
fn icon_delay_ms(speed: u16) -> u32 {
    // Each step is four 60 Hz frames
    speed as u32 * 4 * 1000 / 60
}

/// Decoded banner and icon frames.
struct Graphics {
    banner: Option<Bitmap>,
    frames: Vec<Bitmap>,
    sequence: Vec<AnimFrame>,
}

fn decode_graphics(
    d: &DirEntry,
    layout: &GraphicsLayout,
    raw: &[u8],
) -> Result<Graphics, RomError> {
    let shared = layout.shared_palette.map(|off| palette_at(raw, off));

    let banner = match layout.banner {
        Some((true, off)) => {
            let px = (BANNER_W * BANNER_H) as usize;
            let palette = palette_at(raw, off + px);
            Some(from_gcn_ci8(BANNER_W, BANNER_H, &raw[off..off + px], &palette)?)
        }
        Some((false, off)) => Some(from_gcn16(Pixel16::Rgb5a3, BANNER_W, BANNER_H, &raw[off..])?),
        None => None,
    };

    let mut frames: Vec<Bitmap> = Vec::new();
    let mut forward = Vec::new();
    for (i, slot) in layout.icons.iter().enumerate() {
        let speed = (d.icon_speeds >> (i * 2)) & 3;
        if speed == 0 {
            break;
        }
        let frame = match *slot {
            Some((fmt, off)) => {
                let px = (ICON_SIZE * ICON_SIZE) as usize;
                let bmp = match fmt {
                    IconFormat::Rgb5a3 => {
                        from_gcn16(Pixel16::Rgb5a3, ICON_SIZE, ICON_SIZE, &raw[off..])?
                    }
                    IconFormat::Ci8Unique => {
                        let palette = palette_at(raw, off + px);
                        from_gcn_ci8(ICON_SIZE, ICON_SIZE, &raw[off..off + px], &palette)?
                    }
                    IconFormat::Ci8Shared => {
                        let palette = shared.as_deref().unwrap_or(&[]);
                        from_gcn_ci8(ICON_SIZE, ICON_SIZE, &raw[off..off + px], palette)?
                    }
                };
                frames.push(bmp);
                frames.len() - 1
            }
            // A blank slot keeps showing the previous icon
            None => match frames.len() {
                0 => break,
                n => n - 1,
            },
        };
        forward.push(AnimFrame {
            frame,
            delay_ms: icon_delay_ms(speed),
        });
    }

    let mut sequence = forward.clone();
    if d.banner_flags & ANIM_PING_PONG != 0 && forward.len() > 2 {
        sequence.extend(forward[1..forward.len() - 1].iter().rev().copied());
    }
    Ok(Graphics {
        banner,
        frames,
        sequence,
    })
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// GameCube memory card save in GCI, GCS or SAV form.
pub struct GameCubeSave {
    stream: Option<Box<dyn ByteStream>>,
    kind: SaveKind,
    dentry: DirEntry,
}

impl GameCubeSave {
    fn stream(&mut self) -> Result<&mut dyn ByteStream, RomError> {
        match self.stream.as_mut() {
            Some(s) => Ok(s.as_mut()),
            None => Err(RomError::NotOpen),
        }
    }

    fn is_japanese(&self) -> bool {
        self.dentry.raw_code[3] == b'J'
    }

    fn comment(&mut self) -> Result<Option<(String, String)>, RomError> {
        let pos = self.kind.data_offset() + self.dentry.comment_offset as u64;
        let raw = self.stream()?.read_up_to(pos, COMMENT_LEN)?;
        if raw.len() < COMMENT_LEN {
            return Ok(None);
        }
        let text = |b: &[u8]| {
            let s = if self.is_japanese() {
                read_shift_jis(b)
            } else {
                read_latin1(b)
            };
            s.trim().to_string()
        };
        Ok(Some((text(&raw[..0x20]), text(&raw[0x20..]))))
    }

    fn graphics(&mut self) -> Result<Option<Graphics>, RomError> {
        if self.dentry.image_offset == NO_IMAGE {
            return Ok(None);
        }
        let layout = graphics_layout(&self.dentry);
        if layout.len == 0 {
            return Ok(None);
        }
        let pos = self.kind.data_offset() + self.dentry.image_offset as u64;
        let raw = self.stream()?.read_up_to(pos, layout.len)?;
        if raw.len() < layout.len {
            log::debug!(
                "{}: graphics need 0x{:X} bytes, only 0x{:X} present",
                self.dentry.filename,
                layout.len,
                raw.len()
            );
            return Ok(None);
        }
        decode_graphics(&self.dentry, &layout, &raw).map(Some)
    }

    fn modified(&self) -> Option<NaiveDateTime> {
        DateTime::from_timestamp(GCN_EPOCH + self.dentry.mtime as i64, 0).map(|dt| dt.naive_utc())
    }
}

impl RomFormat for GameCubeSave {
    const NAME: &'static str = "GameCube Save";
    const EXTENSIONS: &'static [&'static str] = &["gci", "gcs", "sav"];
    const HEADER_SIZE: usize = HEADER_LEN;

    fn detect(info: &DetectInfo<'_>) -> Option<u32> {
        let candidates = [SaveVariant::GcnGci, SaveVariant::GcnGcs, SaveVariant::GcnSav];
        for variant in info.save_precedence.order(&candidates) {
            let Some(kind) = SaveKind::from_variant(variant) else {
                continue;
            };
            let data_off = kind.data_offset();
            if info.size < data_off + BLOCK_LEN || (info.size - data_off) % BLOCK_LEN != 0 {
                continue;
            }
            let Some(raw) = kind.dentry(info.header) else {
                continue;
            };
            if is_valid_dentry(&parse_dentry(&raw), info.size - data_off) {
                return Some(kind as u32);
            }
        }
        None
    }

    fn open(
        mut stream: Box<dyn ByteStream>,
        system_id: u32,
        _ctx: &ParseContext,
    ) -> Result<Self, RomError> {
        let kind = SaveKind::from_id(system_id)
            .ok_or_else(|| RomError::invalid_format(format!("unknown save sub-type {system_id}")))?;
        let header = stream.read_vec_at(0, kind.data_offset() as usize)?;
        let raw = kind
            .dentry(&header)
            .ok_or_else(|| RomError::truncated(HEADER_LEN as u64, header.len() as u64))?;
        Ok(Self {
            stream: Some(stream),
            kind,
            dentry: parse_dentry(&raw),
        })
    }

    fn file_type(&self) -> FileType {
        FileType::SaveFile
    }

    fn system_name(&self, variant: SystemNameVariant) -> Option<&'static str> {
        lookup(&SYSTEM_NAMES, 0, variant)
    }

    fn load_fields(&mut self, _ctx: &ParseContext, fields: &mut FieldList) -> Result<(), RomError> {
        let comment = self.comment()?;
        let d = &self.dentry;

        fields.add_string("Game ID", format!("{}{}", d.game_code, d.company));
        fields.add_string("Publisher", publisher(&d.company));
        fields.add_string("File name", d.filename.clone());
        fields.add_string("Save format", self.kind.name());
        match comment {
            Some((name, description)) => {
                fields.add_string("Game name", name);
                fields.add_string("Description", description);
            }
            None => {
                fields.add_unknown("Game name", FieldKind::String);
                fields.add_unknown("Description", FieldKind::String);
            }
        }
        match self.modified() {
            Some(dt) => fields.add_datetime("Last modified", dt),
            None => fields.add_unknown("Last modified", FieldKind::DateTime),
        }
        let d = &self.dentry;
        fields.add_bitfield("Permissions", d.permissions as u32, &PERMISSION_NAMES);
        fields.add_numeric("Copy count", d.copy_count as i64);
        fields.add_numeric("Blocks", d.block_count as i64);
        Ok(())
    }

    fn supported_image_kinds(&self) -> ImageKinds {
        let mut kinds = ImageKinds::empty();
        if self.dentry.image_offset == NO_IMAGE {
            return kinds;
        }
        if self.dentry.banner_flags & 3 != 0 {
            kinds |= ImageKinds::INT_BANNER;
        }
        if IconFormat::from_bits(self.dentry.icon_formats).is_some() {
            kinds |= ImageKinds::INT_ICON;
        }
        kinds
    }

    fn load_image(&mut self, kind: ImageKind) -> Result<Option<Bitmap>, RomError> {
        let Some(mut gfx) = self.graphics()? else {
            return Ok(None);
        };
        Ok(match kind {
            ImageKind::IntBanner => gfx.banner,
            ImageKind::IntIcon if !gfx.frames.is_empty() => Some(gfx.frames.swap_remove(0)),
            _ => None,
        })
    }

    fn animated_icon(&mut self) -> Result<Option<AnimatedIcon>, RomError> {
        let Some(gfx) = self.graphics()? else {
            return Ok(None);
        };
        if gfx.sequence.len() < 2 {
            return Ok(None);
        }
        Ok(AnimatedIcon::new(gfx.frames, gfx.sequence))
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

#[cfg(test)]
#[path = "tests/gcn_save_tests.rs"]
mod tests;
