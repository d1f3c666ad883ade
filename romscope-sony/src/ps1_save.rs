//! PlayStation memory card saves.
//!
//! Supports:
//! - PSV: PS3 export, a 0x84-byte header in front of the save blocks
//! - MCS: a single 0x80-byte directory frame followed by the blocks
//! - Raw: the save blocks alone
//!
//! Every variant wraps the same payload: 0x2000-byte blocks, the first of
//! which opens with the `SC` header frame (title, icon palette, and up to
//! three 16x16 icon frames).

use romscope_core::bytes::{read_u16_le, read_u32_le};
use romscope_core::system::lookup;
use romscope_core::util::{read_ascii_fixed, read_shift_jis};
use romscope_core::{
    AnimFrame, AnimatedIcon, Bitmap, ByteStream, DetectInfo, FieldKind, FieldList, FileType,
    ImageKind, ImageKinds, ParseContext, RomError, RomFormat, SaveVariant, SystemNameRow,
    SystemNameVariant, checksum_text,
};
use romscope_texture::linear::{NibbleOrder, from_linear_ci4};
use romscope_texture::pixel::ps1_to_argb32;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const BLOCK_LEN: u64 = 0x2000;
const FRAME_LEN: usize = 0x80;
const MAX_BLOCKS: u64 = 15;

const SC_MAGIC: &[u8; 2] = b"SC";
const SC_OFF_ICON_FLAG: usize = 0x02;
const SC_OFF_BLOCKS: usize = 0x03;
const SC_OFF_TITLE: usize = 0x04;
const SC_TITLE_LEN: usize = 0x40;
const SC_OFF_MCX_FRAMES: usize = 0x50;
const SC_OFF_PALETTE: usize = 0x60;
/// Icon frames follow the header frame.
const ICON_FRAMES_OFFSET: usize = FRAME_LEN;
const ICON_DIM: u32 = 16;
const ICON_LEN: usize = (ICON_DIM * ICON_DIM / 2) as usize;

const PSV_MAGIC: &[u8; 4] = b"\0VSP";
const PSV_HEADER_LEN: usize = 0x84;
const PSV_OFF_TYPE: usize = 0x3C;
const PSV_TYPE_PS1: u32 = 1;
const PSV_OFF_SAVE_SIZE: usize = 0x40;
const PSV_OFF_DATA: usize = 0x44;
const PSV_OFF_FILENAME: usize = 0x64;

const MCS_OFF_STATE: usize = 0x00;
const MCS_OFF_SIZE: usize = 0x04;
const MCS_OFF_NEXT: usize = 0x08;
const MCS_OFF_FILENAME: usize = 0x0A;
const MCS_OFF_CHECKSUM: usize = 0x7F;
/// Directory state of a block that starts a file.
const MCS_STATE_FIRST: u32 = 0x51;

const FILENAME_LEN: usize = 20;

/// Vertical blanks per icon frame, by frame count, at 60 Hz.
const ICON_VBLANKS_2: u32 = 16;
const ICON_VBLANKS_3: u32 = 11;

const SYSTEM_NAMES: [SystemNameRow; 1] = [["Sony PlayStation", "PlayStation", "PS1"]];

// ---------------------------------------------------------------------------
// Sub-types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveKind {
    Psv = 0,
    Mcs = 1,
    Raw = 2,
}

impl SaveKind {
    fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::Psv),
            1 => Some(Self::Mcs),
            2 => Some(Self::Raw),
            _ => None,
        }
    }

    fn from_variant(v: SaveVariant) -> Option<Self> {
        match v {
            SaveVariant::Ps1Psv => Some(Self::Psv),
            SaveVariant::Ps1Mcs => Some(Self::Mcs),
            SaveVariant::Ps1Raw => Some(Self::Raw),
            _ => None,
        }
    }

    fn header_len(self) -> usize {
        match self {
            Self::Psv => PSV_HEADER_LEN,
            Self::Mcs => FRAME_LEN,
            Self::Raw => 0,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Psv => "PSV (PS3 export)",
            Self::Mcs => "MCS (single save)",
            Self::Raw => "Raw save blocks",
        }
    }

    /// Size formula plus the structural checks of the wrapper and the
    /// `SC` frame behind it.
    fn matches(self, header: &[u8], size: u64) -> bool {
        let data_off = self.header_len();
        let Some(payload) = size.checked_sub(data_off as u64) else {
            return false;
        };
        if payload == 0 || payload % BLOCK_LEN != 0 || payload / BLOCK_LEN > MAX_BLOCKS {
            return false;
        }
        let wrapper_ok = match self {
            Self::Psv => header.get(..PSV_HEADER_LEN).is_some_and(|h| {
                &h[..4] == PSV_MAGIC
                    && read_u32_le(h, PSV_OFF_TYPE) == PSV_TYPE_PS1
                    && read_u32_le(h, PSV_OFF_DATA) as usize == PSV_HEADER_LEN
            }),
            Self::Mcs => header.get(..FRAME_LEN).is_some_and(|h| {
                read_u32_le(h, MCS_OFF_STATE) == MCS_STATE_FIRST && h[MCS_OFF_FILENAME] != 0
            }),
            Self::Raw => true,
        };
        wrapper_ok
            && header
                .get(data_off..)
                .and_then(ScHeader::parse)
                .is_some()
    }
}

// ---------------------------------------------------------------------------
// SC header frame
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct ScHeader {
    icon_frames: usize,
    blocks: u8,
    title: String,
    mcx_frames: u16,
    palette: Vec<u32>,
}

impl ScHeader {
    fn parse(buf: &[u8]) -> Option<Self> {
        let h = buf.get(..FRAME_LEN)?;
        if &h[..2] != SC_MAGIC {
            return None;
        }
        let icon_frames = match h[SC_OFF_ICON_FLAG] {
            0x11 => 1,
            0x12 => 2,
            0x13 => 3,
            _ => return None,
        };
        let blocks = h[SC_OFF_BLOCKS];
        if !(1..=MAX_BLOCKS as u8).contains(&blocks) {
            return None;
        }
        let palette = h[SC_OFF_PALETTE..FRAME_LEN]
            .chunks_exact(2)
            .map(|c| ps1_to_argb32(u16::from_le_bytes([c[0], c[1]])))
            .collect();
        Some(Self {
            icon_frames,
            blocks,
            title: read_shift_jis(&h[SC_OFF_TITLE..SC_OFF_TITLE + SC_TITLE_LEN])
                .trim()
                .to_string(),
            mcx_frames: read_u16_le(h, SC_OFF_MCX_FRAMES),
            palette,
        })
    }

    fn frame_delay_ms(&self) -> u32 {
        let vblanks = if self.icon_frames == 2 { ICON_VBLANKS_2 } else { ICON_VBLANKS_3 };
        vblanks * 1000 / 60
    }
}

/// The memory card file name, e.g. `BASLUS-00594SAVE01`: a region prefix,
/// the product code, then a per-game suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SaveFilename {
    region: &'static str,
    product: String,
    suffix: String,
}

fn parse_filename(name: &str) -> Option<SaveFilename> {
    let bytes = name.as_bytes();
    if bytes.len() < 12 || bytes[0] != b'B' || !name.is_ascii() {
        return None;
    }
    let region = match bytes[1] {
        b'A' => "USA",
        b'E' => "Europe",
        b'I' => "Japan",
        _ => return None,
    };
    Some(SaveFilename {
        region,
        product: name[2..12].to_string(),
        suffix: name[12..].to_string(),
    })
}

/// XOR of the first 127 bytes of a directory frame.
fn frame_checksum(frame: &[u8]) -> u8 {
    frame[..MCS_OFF_CHECKSUM].iter().fold(0, |acc, &b| acc ^ b)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// A PlayStation memory card save in one of its file wrappers.
pub struct PlayStationSave {
    stream: Option<Box<dyn ByteStream>>,
    kind: SaveKind,
    /// The PSV header or MCS directory frame.
    wrapper: Vec<u8>,
    sc: ScHeader,
}

impl PlayStationSave {
    fn stream(&mut self) -> Result<&mut dyn ByteStream, RomError> {
        match self.stream.as_mut() {
            Some(s) => Ok(s.as_mut()),
            None => Err(RomError::NotOpen),
        }
    }

    fn filename(&self) -> Option<String> {
        let off = match self.kind {
            SaveKind::Psv => PSV_OFF_FILENAME,
            SaveKind::Mcs => MCS_OFF_FILENAME,
            SaveKind::Raw => return None,
        };
        let name = read_ascii_fixed(self.wrapper.get(off..off + FILENAME_LEN)?);
        (!name.is_empty()).then_some(name)
    }

    fn icons(&mut self) -> Result<Vec<Bitmap>, RomError> {
        let pos = (self.kind.header_len() + ICON_FRAMES_OFFSET) as u64;
        let count = self.sc.icon_frames;
        let raw = self.stream()?.read_vec_at(pos, count * FRAME_LEN)?;
        raw.chunks_exact(FRAME_LEN)
            .map(|frame| {
                Ok(from_linear_ci4(
                    ICON_DIM,
                    ICON_DIM,
                    &frame[..ICON_LEN],
                    &self.sc.palette,
                    NibbleOrder::LowFirst,
                )?)
            })
            .collect()
    }
}

impl RomFormat for PlayStationSave {
    const NAME: &'static str = "PlayStation Save";
    const EXTENSIONS: &'static [&'static str] = &["psv", "mcs", "mcb", "mcx", "pda", "psx", "ps1"];
    const HEADER_SIZE: usize = PSV_HEADER_LEN + FRAME_LEN;

    fn detect(info: &DetectInfo<'_>) -> Option<u32> {
        let candidates = [SaveVariant::Ps1Psv, SaveVariant::Ps1Mcs, SaveVariant::Ps1Raw];
        info.save_precedence
            .order(&candidates)
            .into_iter()
            .filter_map(SaveKind::from_variant)
            .find(|kind| kind.matches(info.header, info.size))
            .map(|kind| kind as u32)
    }

    fn open(
        mut stream: Box<dyn ByteStream>,
        system_id: u32,
        _ctx: &ParseContext,
    ) -> Result<Self, RomError> {
        let kind = SaveKind::from_id(system_id)
            .ok_or_else(|| RomError::invalid_format(format!("unknown save sub-type {system_id}")))?;
        let header = stream.read_vec_at(0, kind.header_len() + FRAME_LEN)?;
        let (wrapper, frame) = header.split_at(kind.header_len());
        let sc = ScHeader::parse(frame)
            .ok_or_else(|| RomError::corrupted_header("missing SC header frame"))?;
        Ok(Self {
            stream: Some(stream),
            kind,
            wrapper: wrapper.to_vec(),
            sc,
        })
    }

    fn file_type(&self) -> FileType {
        FileType::SaveFile
    }

    fn system_name(&self, variant: SystemNameVariant) -> Option<&'static str> {
        lookup(&SYSTEM_NAMES, 0, variant)
    }

    fn load_fields(&mut self, _ctx: &ParseContext, fields: &mut FieldList) -> Result<(), RomError> {
        let size = self.stream()?.size();
        fields.add_string("Save format", self.kind.name());

        let filename = self.filename();
        if let Some(name) = &filename {
            fields.add_string("File name", name.clone());
            match parse_filename(name) {
                Some(parsed) => {
                    fields.add_string("Product code", parsed.product);
                    fields.add_string("Region", parsed.region);
                    if !parsed.suffix.is_empty() {
                        fields.add_string("Save name", parsed.suffix);
                    }
                }
                None => log::debug!("save file name {name:?} has no product code"),
            }
        }

        if self.sc.title.is_empty() {
            fields.add_unknown("Title", FieldKind::String);
        } else {
            fields.add_string("Title", self.sc.title.clone());
        }
        fields.add_numeric("Blocks", self.sc.blocks as i64);
        fields.add_numeric("Icon frames", self.sc.icon_frames as i64);
        if self.sc.mcx_frames != 0 {
            fields.add_numeric("PocketStation icon frames", self.sc.mcx_frames as i64);
        }

        let payload_blocks = (size - self.kind.header_len() as u64) / BLOCK_LEN;
        if payload_blocks != self.sc.blocks as u64 {
            log::debug!(
                "SC header claims {} blocks, file holds {payload_blocks}",
                self.sc.blocks
            );
        }

        match self.kind {
            SaveKind::Mcs => {
                let frame = &self.wrapper;
                let stored = frame[MCS_OFF_CHECKSUM];
                fields.add_string(
                    "Directory checksum",
                    checksum_text(stored as u64, frame_checksum(frame) as u64, 2),
                );
                fields.add_numeric("Declared size", read_u32_le(frame, MCS_OFF_SIZE) as i64);
                let next = read_u16_le(frame, MCS_OFF_NEXT);
                if next != 0xFFFF {
                    log::debug!("MCS frame links to block {next}; single-file dumps end here");
                }
            }
            SaveKind::Psv => {
                fields.add_numeric(
                    "Declared size",
                    read_u32_le(&self.wrapper, PSV_OFF_SAVE_SIZE) as i64,
                );
            }
            SaveKind::Raw => {}
        }
        Ok(())
    }

    fn supported_image_kinds(&self) -> ImageKinds {
        ImageKinds::INT_ICON
    }

    fn load_image(&mut self, kind: ImageKind) -> Result<Option<Bitmap>, RomError> {
        if kind != ImageKind::IntIcon {
            self.stream()?;
            return Ok(None);
        }
        let mut icons = self.icons()?;
        Ok((!icons.is_empty()).then(|| icons.swap_remove(0)))
    }

    fn animated_icon(&mut self) -> Result<Option<AnimatedIcon>, RomError> {
        if self.sc.icon_frames < 2 {
            self.stream()?;
            return Ok(None);
        }
        let frames = self.icons()?;
        let delay_ms = self.sc.frame_delay_ms();
        let sequence = (0..frames.len())
            .map(|frame| AnimFrame { frame, delay_ms })
            .collect();
        Ok(AnimatedIcon::new(frames, sequence))
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

#[cfg(test)]
#[path = "tests/ps1_save_tests.rs"]
mod tests;
