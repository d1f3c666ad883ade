//! Nintendo 3DS.
//!
//! Supports:
//! - SMDH icon files (.smdh, .icn)
//! - 3DSX homebrew (.3dsx), with its optional embedded SMDH
//! - CCI game card images (.3ds, .cci)
//! - CIA installable archives (.cia)
//! - Standalone NCCH partitions (.cxi, .cfa, .app)
//!
//! Title, publisher, ratings and the icon come from the SMDH: standalone,
//! embedded in a 3DSX, in a CIA's meta block, or the `icon` file of the
//! game NCCH's ExeFS. The NCCH header supplies the product code, program ID
//! and encryption details. Encrypted NCCH sections are decrypted on the fly
//! when the key store holds the required keys.

pub(crate) mod cia;
pub(crate) mod common;
pub mod ncch;
pub(crate) mod ncsd;
pub(crate) mod smdh;

pub use cia::CiaContentReader;
pub use ncch::NcchReader;

use romscope_core::bytes::{read_u16_le, read_u32_le};
use romscope_core::system::lookup;
use romscope_core::util::format_bytes;
use romscope_core::{
    Bitmap, ByteStream, DetectInfo, ExtUrl, FieldKind, FieldList, FileType, ImageKind, ImageKinds,
    KeyStore, ParseContext, PartitionStream, RomError, RomFormat, SystemNameRow,
    SystemNameVariant,
};

use crate::gametdb;
use crate::licensee::publisher;
use cia::Cia;
use common::{
    content_type_description, format_title_id, game_id, platform_name, region_from_product_code,
    title_type_from_id,
};
use ncch::{NCCH_HEADER_LEN, NCCH_MAGIC};
use ncsd::{NCSD_HEADER_LEN, NCSD_MAGIC, NcsdHeader};
use smdh::{IconSize, SMDH_LEN, SMDH_MAGIC, Smdh};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const DETECT_LEN: usize = 0x200;

const THREEDSX_MAGIC: &[u8; 4] = b"3DSX";
const THREEDSX_HEADER_LEN: usize = 0x20;
/// Header size when the extended header (SMDH and RomFS offsets) follows.
const THREEDSX_EXT_HEADER_LEN: usize = 0x2C;

const PLATFORM_NEW_3DS: u8 = 2;

const SYSTEM_NAMES: [SystemNameRow; 2] = [
    ["Nintendo 3DS", "Nintendo 3DS", "3DS"],
    ["New Nintendo 3DS", "New 3DS", "N3DS"],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
enum N3dsKind {
    Smdh = 0,
    Threedsx = 1,
    Cci = 2,
    Cia = 3,
    Ncch = 4,
}

impl N3dsKind {
    fn from_id(id: u32) -> Option<Self> {
        Some(match id {
            0 => Self::Smdh,
            1 => Self::Threedsx,
            2 => Self::Cci,
            3 => Self::Cia,
            4 => Self::Ncch,
            _ => return None,
        })
    }

    fn format_name(self) -> &'static str {
        match self {
            Self::Smdh => "SMDH",
            Self::Threedsx => "3DSX",
            Self::Cci => "CCI",
            Self::Cia => "CIA",
            Self::Ncch => "NCCH",
        }
    }
}

// ---------------------------------------------------------------------------
// 3DSX
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct ThreedsxHeader {
    code_size: u32,
    rodata_size: u32,
    data_size: u32,
    bss_size: u32,
    /// `(offset, size)` of the embedded SMDH.
    smdh: Option<(u64, u32)>,
}

impl ThreedsxHeader {
    fn parse(buf: &[u8]) -> Result<Self, RomError> {
        if buf.len() < THREEDSX_HEADER_LEN {
            return Err(RomError::truncated(THREEDSX_HEADER_LEN as u64, buf.len() as u64));
        }
        if &buf[..4] != THREEDSX_MAGIC {
            return Err(RomError::invalid_format("missing 3DSX magic"));
        }
        let header_size = read_u16_le(buf, 4) as usize;
        let smdh = (header_size >= THREEDSX_EXT_HEADER_LEN && buf.len() >= THREEDSX_EXT_HEADER_LEN)
            .then(|| (read_u32_le(buf, 0x20) as u64, read_u32_le(buf, 0x24)))
            .filter(|&(_, size)| size as usize >= SMDH_LEN);
        Ok(Self {
            code_size: read_u32_le(buf, 0x10),
            rodata_size: read_u32_le(buf, 0x14),
            data_size: read_u32_le(buf, 0x18),
            bss_size: read_u32_le(buf, 0x1C),
            smdh,
        })
    }
}

// ---------------------------------------------------------------------------
// Format
// ---------------------------------------------------------------------------

pub struct Nintendo3ds {
    stream: Option<Box<dyn ByteStream>>,
    kind: N3dsKind,
    threedsx: Option<ThreedsxHeader>,
    ncsd: Option<NcsdHeader>,
    cia: Option<Cia>,
    /// The game NCCH: CCI partition 0, CIA content 0, or the file itself.
    ncch: Option<NcchReader>,
    /// Loaded on first use.
    smdh: Option<Option<Smdh>>,
}

impl Nintendo3ds {
    fn stream(&mut self) -> Result<&mut dyn ByteStream, RomError> {
        match self.stream.as_deref_mut() {
            Some(s) => Ok(s),
            None => Err(RomError::NotOpen),
        }
    }

    /// NCCH inside a container. A partition that won't open only costs
    /// the fields it would have provided.
    fn open_nested(
        parent: Result<Box<dyn ByteStream>, RomError>,
        base: u64,
        keys: &KeyStore,
    ) -> Option<NcchReader> {
        match parent.and_then(|p| NcchReader::open(p, base, keys)) {
            Ok(reader) => Some(reader),
            Err(e) => {
                log::debug!("3DS: game NCCH unavailable: {e}");
                None
            }
        }
    }

    fn load_smdh(&mut self) -> Result<Option<&Smdh>, RomError> {
        if self.smdh.is_none() {
            let found = self.find_smdh()?;
            self.smdh = Some(found);
        }
        Ok(self.smdh.as_ref().and_then(Option::as_ref))
    }

    fn find_smdh(&mut self) -> Result<Option<Smdh>, RomError> {
        let raw = match self.kind {
            N3dsKind::Smdh => Some(self.stream()?.read_up_to(0, SMDH_LEN)?),
            N3dsKind::Threedsx => match self.threedsx.as_ref().and_then(|h| h.smdh) {
                Some((offset, _)) => Some(self.stream()?.read_up_to(offset, SMDH_LEN)?),
                None => None,
            },
            N3dsKind::Cia => {
                let meta = match (self.cia.as_ref(), self.stream.as_deref_mut()) {
                    (Some(cia), Some(stream)) => cia.meta_smdh(stream)?,
                    _ => None,
                };
                if meta.is_some() {
                    return Ok(meta);
                }
                self.ncch_icon()?
            }
            N3dsKind::Cci | N3dsKind::Ncch => self.ncch_icon()?,
        };
        Ok(raw.and_then(|data| Smdh::parse(data).ok()))
    }

    fn ncch_icon(&mut self) -> Result<Option<Vec<u8>>, RomError> {
        match self.ncch.as_mut() {
            Some(ncch) => ncch.exefs_file("icon"),
            None => Ok(None),
        }
    }

    fn product_code(&self) -> Option<&str> {
        self.ncch
            .as_ref()
            .map(|n| n.header().product_code.as_str())
            .filter(|code| !code.is_empty())
    }

    fn add_ncch_fields(&mut self, has_smdh: bool, fields: &mut FieldList) -> Result<(), RomError> {
        let in_card = self.ncsd.is_some();
        let Some(ncch) = self.ncch.as_mut() else {
            if self.kind != N3dsKind::Smdh && self.kind != N3dsKind::Threedsx {
                fields.add_unknown("Product code", FieldKind::String);
            }
            return Ok(());
        };
        let h = ncch.header().clone();

        fields.add_string("Product code", h.product_code.clone());
        fields.add_string("Maker", publisher(&h.maker_code));
        if !has_smdh {
            fields.add_string("Region", region_from_product_code(&h.product_code).name());
        }
        fields.add_string("Program ID", format_title_id(h.program_id));
        fields.add_string("Title type", title_type_from_id(h.program_id));
        fields.add_string("Content type", content_type_description(h.content_type));
        if !in_card && h.platform != 0 {
            fields.add_string("Platform", platform_name(h.platform));
        }

        let status = ncch.encryption_status();
        if status.is_ok() {
            fields.add_string("Encryption", h.encryption_desc());
        } else {
            fields.add_string("Encryption", format!("{} ({status})", h.encryption_desc()));
        }
        if h.is_cxi() {
            match ncch.verify_exheader()? {
                Some(true) => fields.add_string("ExHeader SHA-256", "OK"),
                Some(false) => fields.add_string("ExHeader SHA-256", "Mismatch"),
                None => fields.add_unknown("ExHeader SHA-256", FieldKind::String),
            }
        }
        if h.exefs.1 > 0 {
            fields.add_string("ExeFS size", format_bytes(h.exefs.1));
        }
        if h.romfs.1 > 0 {
            fields.add_string("RomFS size", format_bytes(h.romfs.1));
        }
        Ok(())
    }
}

impl RomFormat for Nintendo3ds {
    const NAME: &'static str = "Nintendo 3DS";
    const EXTENSIONS: &'static [&'static str] =
        &["smdh", "icn", "3dsx", "3ds", "cci", "cia", "cxi", "cfa", "app"];
    const HEADER_SIZE: usize = DETECT_LEN;

    fn detect(info: &DetectInfo<'_>) -> Option<u32> {
        let h = info.header;
        if info.has(4) && &h[..4] == SMDH_MAGIC && info.size >= SMDH_LEN as u64 {
            return Some(N3dsKind::Smdh as u32);
        }
        if info.has(THREEDSX_HEADER_LEN) && &h[..4] == THREEDSX_MAGIC {
            return Some(N3dsKind::Threedsx as u32);
        }
        if info.has(0x104) {
            if &h[0x100..0x104] == NCSD_MAGIC && info.size >= NCSD_HEADER_LEN as u64 {
                return Some(N3dsKind::Cci as u32);
            }
            if &h[0x100..0x104] == NCCH_MAGIC && info.size >= NCCH_HEADER_LEN as u64 {
                return Some(N3dsKind::Ncch as u32);
            }
        }
        if cia::looks_like_cia(h) && (info.ext_is(&["cia"]) || info.size > cia::CIA_HEADER_LEN as u64)
        {
            return Some(N3dsKind::Cia as u32);
        }
        None
    }

    fn open(
        mut stream: Box<dyn ByteStream>,
        system_id: u32,
        ctx: &ParseContext,
    ) -> Result<Self, RomError> {
        let kind = N3dsKind::from_id(system_id)
            .ok_or_else(|| RomError::invalid_format(format!("unknown 3DS sub-type {system_id}")))?;
        let keys = ctx.keys.as_ref();
        let (mut threedsx, mut ncsd, mut cia, mut ncch, mut smdh) = (None, None, None, None, None);
        match kind {
            N3dsKind::Smdh => {
                let raw = stream.read_vec_at(0, SMDH_LEN)?;
                smdh = Some(Some(Smdh::parse(raw)?));
            }
            N3dsKind::Threedsx => {
                let raw = stream.read_up_to(0, THREEDSX_EXT_HEADER_LEN)?;
                threedsx = Some(ThreedsxHeader::parse(&raw)?);
            }
            N3dsKind::Cci => {
                let raw = stream.read_vec_at(0, NCSD_HEADER_LEN)?;
                let header = NcsdHeader::parse(&raw)?;
                ncch = Self::open_nested(stream.dup(), header.game_partition_offset(), keys);
                ncsd = Some(header);
            }
            N3dsKind::Cia => {
                let archive = Cia::read(stream.as_mut(), keys)?;
                if !archive.contents().is_empty() {
                    let content = stream
                        .dup()
                        .and_then(|p| archive.open_content(p, 0))
                        .map(|c| Box::new(c) as Box<dyn ByteStream>);
                    ncch = Self::open_nested(content, 0, keys);
                }
                cia = Some(archive);
            }
            N3dsKind::Ncch => {
                ncch = Some(NcchReader::open(stream.dup()?, 0, keys)?);
            }
        }
        Ok(Self {
            stream: Some(stream),
            kind,
            threedsx,
            ncsd,
            cia,
            ncch,
            smdh,
        })
    }

    fn file_type(&self) -> FileType {
        match self.kind {
            N3dsKind::Smdh => FileType::IconFile,
            N3dsKind::Threedsx => FileType::Executable,
            N3dsKind::Cci | N3dsKind::Ncch => FileType::RomImage,
            N3dsKind::Cia => FileType::ContainerFile,
        }
    }

    fn system_name(&self, variant: SystemNameVariant) -> Option<&'static str> {
        let new_3ds = self
            .ncch
            .as_ref()
            .is_some_and(|n| n.header().platform == PLATFORM_NEW_3DS)
            || self
                .ncsd
                .as_ref()
                .is_some_and(|h| h.platform == PLATFORM_NEW_3DS);
        lookup(&SYSTEM_NAMES, new_3ds as usize, variant)
    }

    fn load_fields(&mut self, ctx: &ParseContext, fields: &mut FieldList) -> Result<(), RomError> {
        let file_size = self.stream()?.size();
        let format = match (self.kind, self.ncch.as_ref()) {
            (N3dsKind::Ncch, Some(n)) if n.header().is_cxi() => "NCCH (CXI)".to_string(),
            (N3dsKind::Ncch, _) => "NCCH (CFA)".to_string(),
            (kind, _) => kind.format_name().to_string(),
        };
        fields.add_string("Format", format);

        let has_smdh = match self.load_smdh()? {
            Some(smdh) => {
                smdh.add_fields(&ctx.language, fields);
                true
            }
            None => false,
        };

        if let Some(h) = &self.threedsx {
            fields.add_string("Code size", format_bytes(h.code_size as u64));
            fields.add_string("Read-only data size", format_bytes(h.rodata_size as u64));
            fields.add_string("Data size", format_bytes(h.data_size as u64));
            fields.add_string("BSS size", format_bytes(h.bss_size as u64));
        }
        if let Some(cia) = &self.cia {
            cia.add_fields(fields);
        }
        self.add_ncch_fields(has_smdh, fields)?;
        if let Some(ncsd) = &self.ncsd {
            ncsd.add_fields(file_size, fields);
        }
        Ok(())
    }

    fn supported_image_kinds(&self) -> ImageKinds {
        let mut kinds = ImageKinds::INT_ICON;
        if self.product_code().and_then(game_id).is_some() {
            kinds |= ImageKinds::EXT_COVER | ImageKinds::EXT_COVER_FULL | ImageKinds::EXT_BOX;
        }
        kinds
    }

    fn load_image(&mut self, kind: ImageKind) -> Result<Option<Bitmap>, RomError> {
        if kind != ImageKind::IntIcon {
            return Ok(None);
        }
        match self.load_smdh()? {
            Some(smdh) => Ok(Some(smdh.icon(IconSize::Large)?)),
            None => Ok(None),
        }
    }

    fn ext_urls(&self, kind: ImageKind, ctx: &ParseContext) -> Vec<ExtUrl> {
        if kind.is_internal() || !self.supported_image_kinds().has(kind) {
            return Vec::new();
        }
        match self.product_code().and_then(game_id) {
            Some(id) => gametdb::urls(ctx, "3ds", kind, id),
            None => Vec::new(),
        }
    }

    fn close(&mut self) {
        if let Some(ncch) = self.ncch.as_mut() {
            ncch.close();
        }
        self.stream = None;
    }
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
