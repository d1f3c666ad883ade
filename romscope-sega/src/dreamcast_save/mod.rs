//! Dreamcast VMU save files.
//!
//! Supports:
//! - VMS save data: VMS header at offset 0
//! - VMS mini-games: VMS header at 0x200, after the boot block
//! - ICONDATA_VMS: the VMU's own icon
//! - VMI: the 108-byte descriptor distributed alongside a VMS file
//! - DCI (Nexus): a 32-byte VMU directory entry followed by the file's
//!   blocks, every 32-bit word byte-swapped
//!
//! The same bytes can sometimes pass for more than one variant, so
//! detection tries them in the caller's save precedence order.

mod icondata;
mod vmi;
mod vms;

use romscope_core::bytes::swap32_in_place;
use romscope_core::system::lookup;
use romscope_core::util::format_bytes;
use romscope_core::{
    AnimatedIcon, Bitmap, ByteStream, DetectInfo, FieldKind, FieldList, FileType, ImageKind,
    ImageKinds, ParseContext, RomError, RomFormat, SaveVariant, SystemNameRow, SystemNameVariant,
    checksum_text,
};

use icondata::IconData;
use vmi::{BLOCK_LEN, DIRENT_LEN, DirEntry, VMI_LEN, Vmi};
use vms::{Eyecatch, VMS_HEADER_LEN, VmsHeader, vms_crc};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// A VMU has 256 blocks in total.
const MAX_BLOCKS: u64 = 256;
const MAX_FILE_LEN: u64 = MAX_BLOCKS * BLOCK_LEN as u64;

/// Mini-games start with a boot block; the VMS header follows it.
const GAME_HEADER_OFFSET: usize = 0x200;

const ICONDATA_NAME: &str = "ICONDATA_VMS";

const SYSTEM_NAMES: [SystemNameRow; 1] = [["Sega Dreamcast", "Dreamcast", "DC"]];

// ---------------------------------------------------------------------------
// Sub-types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DcSaveKind {
    VmsData = 0,
    VmsGame = 1,
    IconData = 2,
    Vmi = 3,
    Dci = 4,
}

impl DcSaveKind {
    fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::VmsData),
            1 => Some(Self::VmsGame),
            2 => Some(Self::IconData),
            3 => Some(Self::Vmi),
            4 => Some(Self::Dci),
            _ => None,
        }
    }

    fn from_variant(v: SaveVariant) -> Option<Self> {
        match v {
            SaveVariant::DcVmsData => Some(Self::VmsData),
            SaveVariant::DcVmsGame => Some(Self::VmsGame),
            SaveVariant::DcIconData => Some(Self::IconData),
            SaveVariant::DcVmi => Some(Self::Vmi),
            SaveVariant::DcDci => Some(Self::Dci),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::VmsData => "VMS save data",
            Self::VmsGame => "VMS mini-game",
            Self::IconData => "ICONDATA_VMS",
            Self::Vmi => "VMI descriptor",
            Self::Dci => "DCI (Nexus)",
        }
    }

    /// Structural check against the leading bytes and the file size.
    fn matches(self, header: &[u8], size: u64) -> bool {
        if self == Self::Vmi {
            return size == VMI_LEN as u64 && Vmi::parse(header).is_some();
        }
        if size == 0 || size > MAX_FILE_LEN + DIRENT_LEN as u64 {
            return false;
        }
        match self {
            Self::Dci => {
                DirEntry::parse(header).is_some_and(|d| d.blocks > 0 && d.dci_size() == size)
            }
            _ if size % BLOCK_LEN as u64 != 0 => false,
            Self::IconData => IconData::parse(header, size as usize).is_some(),
            Self::VmsData => VmsHeader::parse(header)
                .is_some_and(|h| (h.graphics_len() + h.data_size as usize) as u64 <= size),
            Self::VmsGame => header
                .get(GAME_HEADER_OFFSET..)
                .and_then(VmsHeader::parse)
                .is_some_and(|h| (GAME_HEADER_OFFSET + h.graphics_len()) as u64 <= size),
            Self::Vmi => false,
        }
    }
}

/// What the file body holds once any DCI wrapping is removed.
#[derive(Debug, Clone)]
enum Content {
    Vms { offset: usize, header: VmsHeader },
    IconData(IconData),
    /// A VMI, or a DCI whose payload couldn't be identified
    None,
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// A Dreamcast VMU file in any of its distribution wrappers.
pub struct DreamcastSave {
    stream: Option<Box<dyn ByteStream>>,
    kind: DcSaveKind,
    vmi: Option<Vmi>,
    dirent: Option<DirEntry>,
    /// File contents without the DCI directory entry, un-swapped.
    body: Vec<u8>,
    content: Content,
}

impl DreamcastSave {
    fn check_open(&self) -> Result<(), RomError> {
        match self.stream {
            Some(_) => Ok(()),
            None => Err(RomError::NotOpen),
        }
    }

    fn is_game(&self) -> bool {
        match self.kind {
            DcSaveKind::VmsGame => true,
            DcSaveKind::Dci => self.dirent.as_ref().is_some_and(|d| d.game),
            _ => false,
        }
    }

    fn vms(&self) -> Option<(usize, &VmsHeader)> {
        match &self.content {
            Content::Vms { offset, header } => Some((*offset, header)),
            _ => None,
        }
    }

    /// Bytes from the VMS header onwards.
    fn vms_bytes(&self, offset: usize) -> &[u8] {
        self.body.get(offset..).unwrap_or_default()
    }

    fn add_vms_fields(&self, fields: &mut FieldList, offset: usize, h: &VmsHeader) {
        fields.add_string("VMS description", h.vms_description.clone());
        fields.add_string("DC description", h.dc_description.clone());
        fields.add_string("Application", h.application.clone());
        fields.add_numeric("Icons", h.icon_count as i64);
        fields.add_string("Eyecatch", h.eyecatch.name());
        if self.is_game() {
            return;
        }
        fields.add_string("Data size", format_bytes(h.data_size as u64));
        let crc_end = h.graphics_len() + h.data_size as usize;
        match self.vms_bytes(offset).get(..crc_end) {
            Some(covered) => {
                fields.add_string("CRC", checksum_text(h.crc as u64, vms_crc(covered) as u64, 4))
            }
            None => fields.add_unknown("CRC", FieldKind::String),
        }
    }

    fn add_dirent_fields(fields: &mut FieldList, d: &DirEntry) {
        fields.add_string("VMU file name", d.filename.clone());
        fields.add_string("File type", if d.game { "Game" } else { "Data" });
        fields.add_string("Copy protected", yes_no(d.protected));
        match d.ctime {
            Some(dt) => fields.add_datetime("Created", dt),
            None => fields.add_unknown("Created", FieldKind::DateTime),
        }
        fields.add_numeric("Blocks", d.blocks as i64);
        fields.add_numeric("First block", d.first_block as i64);
    }

    fn add_vmi_fields(fields: &mut FieldList, v: &Vmi) {
        fields.add_string("Description", v.description.clone());
        fields.add_string("Copyright", v.copyright.clone());
        match v.ctime {
            Some(dt) => fields.add_datetime("Created", dt),
            None => fields.add_unknown("Created", FieldKind::DateTime),
        }
        fields.add_numeric("VMI version", v.version as i64);
        fields.add_numeric("File number", v.file_number as i64);
        fields.add_string("VMS resource", format!("{}.VMS", v.resource));
        fields.add_string("VMU file name", v.filename.clone());
        fields.add_string("File type", if v.game { "Game" } else { "Data" });
        fields.add_string("Copy protected", yes_no(v.protected));
        fields.add_string("File size", format_bytes(v.filesize as u64));
    }
}

fn yes_no(b: bool) -> &'static str {
    if b { "Yes" } else { "No" }
}

/// Identify what a DCI payload holds. Mini-game headers sit after the
/// boot block even though the entry's header offset may say otherwise.
fn dci_content(dirent: &DirEntry, body: &[u8]) -> Content {
    if dirent.filename == ICONDATA_NAME {
        return match IconData::parse(body, body.len()) {
            Some(icon) => Content::IconData(icon),
            None => Content::None,
        };
    }
    let mut offsets = vec![dirent.header_block as usize * BLOCK_LEN];
    if dirent.game {
        offsets.push(GAME_HEADER_OFFSET);
    }
    offsets
        .into_iter()
        .find_map(|offset| {
            let header = VmsHeader::parse(body.get(offset..)?)?;
            Some(Content::Vms { offset, header })
        })
        .unwrap_or(Content::None)
}

impl RomFormat for DreamcastSave {
    const NAME: &'static str = "Dreamcast Save";
    const EXTENSIONS: &'static [&'static str] = &["vms", "vmi", "dci", "bin"];
    const HEADER_SIZE: usize = GAME_HEADER_OFFSET + VMS_HEADER_LEN;

    fn detect(info: &DetectInfo<'_>) -> Option<u32> {
        let candidates = [
            SaveVariant::DcVmi,
            SaveVariant::DcDci,
            SaveVariant::DcIconData,
            SaveVariant::DcVmsData,
            SaveVariant::DcVmsGame,
        ];
        info.save_precedence
            .order(&candidates)
            .into_iter()
            .filter_map(DcSaveKind::from_variant)
            .find(|kind| kind.matches(info.header, info.size))
            .map(|kind| kind as u32)
    }

    fn open(
        mut stream: Box<dyn ByteStream>,
        system_id: u32,
        _ctx: &ParseContext,
    ) -> Result<Self, RomError> {
        let kind = DcSaveKind::from_id(system_id).ok_or_else(|| {
            RomError::invalid_format(format!("unknown Dreamcast save sub-type {system_id}"))
        })?;
        let size = stream.size();
        if size > MAX_FILE_LEN + DIRENT_LEN as u64 {
            return Err(RomError::invalid_format(format!(
                "{size} bytes is too large for a VMU file"
            )));
        }

        let mut vmi = None;
        let mut dirent = None;
        let mut body = Vec::new();
        let content = match kind {
            DcSaveKind::Vmi => {
                let raw = stream.read_vec_at(0, VMI_LEN)?;
                vmi = Some(
                    Vmi::parse(&raw).ok_or_else(|| RomError::corrupted_header("bad VMI checksum"))?,
                );
                Content::None
            }
            DcSaveKind::Dci => {
                let raw = stream.read_vec_at(0, DIRENT_LEN)?;
                let d = DirEntry::parse(&raw)
                    .ok_or_else(|| RomError::corrupted_header("bad DCI directory entry"))?;
                // Whole words only; a trailing partial word can't be unswapped.
                let len = ((size - DIRENT_LEN as u64) & !3) as usize;
                body = stream.read_vec_at(DIRENT_LEN as u64, len)?;
                swap32_in_place(&mut body);
                let content = dci_content(&d, &body);
                if matches!(content, Content::None) {
                    log::debug!("DCI {}: payload not recognized", d.filename);
                }
                dirent = Some(d);
                content
            }
            DcSaveKind::IconData => {
                body = stream.read_vec_at(0, size as usize)?;
                let icon = IconData::parse(&body, body.len())
                    .ok_or_else(|| RomError::corrupted_header("bad ICONDATA_VMS header"))?;
                Content::IconData(icon)
            }
            DcSaveKind::VmsData | DcSaveKind::VmsGame => {
                body = stream.read_vec_at(0, size as usize)?;
                let offset = if kind == DcSaveKind::VmsGame { GAME_HEADER_OFFSET } else { 0 };
                let header = body
                    .get(offset..)
                    .and_then(VmsHeader::parse)
                    .ok_or_else(|| RomError::corrupted_header("bad VMS header"))?;
                Content::Vms { offset, header }
            }
        };

        Ok(Self {
            stream: Some(stream),
            kind,
            vmi,
            dirent,
            body,
            content,
        })
    }

    fn file_type(&self) -> FileType {
        FileType::SaveFile
    }

    fn system_name(&self, variant: SystemNameVariant) -> Option<&'static str> {
        lookup(&SYSTEM_NAMES, 0, variant)
    }

    fn load_fields(&mut self, _ctx: &ParseContext, fields: &mut FieldList) -> Result<(), RomError> {
        self.check_open()?;
        fields.add_string("Save format", self.kind.name());
        if let Some(v) = &self.vmi {
            Self::add_vmi_fields(fields, v);
        }
        if let Some(d) = &self.dirent {
            Self::add_dirent_fields(fields, d);
        }
        match &self.content {
            Content::Vms { offset, header } => self.add_vms_fields(fields, *offset, header),
            Content::IconData(icon) => {
                fields.add_string("Description", icon.description.clone());
                fields.add_string(
                    "Icons",
                    if icon.has_color() { "Monochrome, Colour" } else { "Monochrome" },
                );
            }
            Content::None => {}
        }
        Ok(())
    }

    fn supported_image_kinds(&self) -> ImageKinds {
        match &self.content {
            Content::Vms { header, .. } if header.eyecatch != Eyecatch::None => {
                ImageKinds::INT_ICON | ImageKinds::INT_BANNER
            }
            Content::Vms { .. } | Content::IconData(_) => ImageKinds::INT_ICON,
            Content::None => ImageKinds::empty(),
        }
    }

    fn load_image(&mut self, kind: ImageKind) -> Result<Option<Bitmap>, RomError> {
        self.check_open()?;
        match (&self.content, kind) {
            (Content::Vms { offset, header }, ImageKind::IntIcon) => {
                let mut icons = header.icons(self.vms_bytes(*offset))?;
                Ok((!icons.is_empty()).then(|| icons.swap_remove(0)))
            }
            (Content::Vms { offset, header }, ImageKind::IntBanner) => {
                header.eyecatch(self.vms_bytes(*offset))
            }
            (Content::IconData(icon), ImageKind::IntIcon) => match icon.color_icon(&self.body)? {
                Some(bmp) => Ok(Some(bmp)),
                None => icon.mono_icon(&self.body).map(Some),
            },
            _ => Ok(None),
        }
    }

    fn animated_icon(&mut self) -> Result<Option<AnimatedIcon>, RomError> {
        self.check_open()?;
        let Some((offset, header)) = self.vms() else {
            return Ok(None);
        };
        if header.icon_count < 2 {
            return Ok(None);
        }
        let frames = header.icons(self.vms_bytes(offset))?;
        Ok(AnimatedIcon::new(frames, header.sequence()))
    }

    fn close(&mut self) {
        self.stream = None;
        self.body = Vec::new();
    }
}

#[cfg(test)]
#[path = "tests/dreamcast_save_tests.rs"]
mod tests;
