//! Nintendo GameCube and Wii disc images.
//!
//! Supports:
//! - Plain GameCube discs (.iso, .gcm)
//! - Plain Wii discs (.iso), with the encrypted game partition opened
//!   through [`WiiPartition`]
//!
//! GameCube discs carry their banner in `opening.bnr`, found through the
//! file system table. Wii discs expose the region setting, age ratings and
//! partition table from the unencrypted area before the first partition.

use romscope_core::bytes::read_u32_be;
use romscope_core::system::lookup;
use romscope_core::util::read_ascii_fixed;
use romscope_core::{
    Bitmap, ByteStream, DetectInfo, ExtUrl, FieldKind, FieldList, FileType, ImageKind,
    ImageKinds, ParseContext, PartitionStream, Region, RomError, RomFormat, SystemNameRow,
    SystemNameVariant,
};

use crate::gametdb;
use crate::gcn_banner::{BNR2_LEN, GcnBanner};
use crate::gcn_fst::Fst;
use crate::licensee::publisher;
use crate::wii_partition::WiiPartition;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const HEADER_LEN: usize = 0x440;

const OFF_DISC_NUMBER: usize = 0x06;
const OFF_VERSION: usize = 0x07;
const OFF_AUDIO_STREAMING: usize = 0x08;
const OFF_STREAM_BUF_SIZE: usize = 0x09;
const OFF_WII_MAGIC: usize = 0x18;
const OFF_GCN_MAGIC: usize = 0x1C;
const OFF_TITLE: usize = 0x20;
const TITLE_LEN: usize = 0x40;
const OFF_DOL: usize = 0x420;
const OFF_FST: usize = 0x424;
const OFF_FST_SIZE: usize = 0x428;

pub(crate) const GCN_MAGIC: u32 = 0xC233_9F3D;
pub(crate) const WII_MAGIC: u32 = 0x5D1C_9EA3;

/// Region code in bi2.bin.
const BI2_REGION: u64 = 0x458;

const WII_PARTITION_TABLES: u64 = 0x40000;
const WII_REGION: u64 = 0x4E000;
const WII_AGE_RATINGS: u64 = 0x4E010;

/// Sanity limits for values read from untrusted headers.
const MAX_FST_LEN: u32 = 0x0100_0000;
const MAX_PARTITIONS: u32 = 64;

const SYSTEM_NAMES: [SystemNameRow; 2] = [
    ["Nintendo GameCube", "GameCube", "GCN"],
    ["Nintendo Wii", "Wii", "Wii"],
];

/// Rating boards by index in the Wii age-rating block.
const RATING_BOARDS: [(usize, &str); 9] = [
    (0, "CERO"),
    (1, "ESRB"),
    (3, "USK"),
    (4, "PEGI"),
    (5, "MEKU"),
    (6, "PEGI (Portugal)"),
    (7, "BBFC"),
    (8, "ACB"),
    (9, "GRB"),
];

// ---------------------------------------------------------------------------
// Disc kind and header
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiscKind {
    GameCube = 0,
    Wii = 1,
}

impl DiscKind {
    fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::GameCube),
            1 => Some(Self::Wii),
            _ => None,
        }
    }
}

struct DiscHeader {
    game_id: String,
    disc_number: u8,
    version: u8,
    audio_streaming: bool,
    stream_buf_size: u8,
    title: String,
    dol_offset: u32,
    fst_offset: u32,
    fst_size: u32,
}

fn parse_header(buf: &[u8]) -> DiscHeader {
    DiscHeader {
        game_id: read_ascii_fixed(&buf[..6]),
        disc_number: buf[OFF_DISC_NUMBER],
        version: buf[OFF_VERSION],
        audio_streaming: buf[OFF_AUDIO_STREAMING] != 0,
        stream_buf_size: buf[OFF_STREAM_BUF_SIZE],
        title: read_ascii_fixed(&buf[OFF_TITLE..OFF_TITLE + TITLE_LEN]),
        dol_offset: read_u32_be(buf, OFF_DOL),
        fst_offset: read_u32_be(buf, OFF_FST),
        fst_size: read_u32_be(buf, OFF_FST_SIZE),
    }
}

/// Region name for a bi2.bin / Wii region-setting code.
fn region_name(code: u32) -> &'static str {
    match code {
        0 => Region::Japan.name(),
        1 => Region::Usa.name(),
        2 => Region::Europe.name(),
        3 => Region::World.name(),
        4 => Region::Korea.name(),
        5 => Region::China.name(),
        6 => Region::Taiwan.name(),
        _ => Region::Unknown.name(),
    }
}

/// "CERO: 12, ESRB: 10". Bit 7 marks a board as unused.
fn describe_ratings(block: &[u8]) -> String {
    let rated: Vec<String> = RATING_BOARDS
        .iter()
        .filter_map(|&(idx, board)| {
            let b = *block.get(idx)?;
            (b & 0x80 == 0).then(|| format!("{board}: {}", b & 0x1F))
        })
        .collect();
    if rated.is_empty() {
        "None".to_string()
    } else {
        rated.join(", ")
    }
}

fn partition_type_name(kind: u32) -> String {
    match kind {
        0 => "Game".to_string(),
        1 => "Update".to_string(),
        2 => "Channel".to_string(),
        _ => {
            let bytes = kind.to_be_bytes();
            if bytes.iter().all(|b| b.is_ascii_alphanumeric()) {
                bytes.iter().map(|&b| b as char).collect()
            } else {
                format!("0x{kind:08X}")
            }
        }
    }
}

/// One entry of the Wii partition tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PartitionEntry {
    table: usize,
    offset: u64,
    kind: u32,
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// GameCube or Wii disc image.
pub struct GameCubeDisc {
    stream: Option<Box<dyn ByteStream>>,
    kind: DiscKind,
    header: DiscHeader,
}

impl GameCubeDisc {
    fn stream(&mut self) -> Result<&mut dyn ByteStream, RomError> {
        match self.stream.as_mut() {
            Some(s) => Ok(s.as_mut()),
            None => Err(RomError::NotOpen),
        }
    }

    fn is_japanese(&self) -> bool {
        self.header.game_id.chars().nth(3) == Some('J')
    }

    /// Read and parse an FST at `offset` of `stream`.
    fn read_fst(
        stream: &mut dyn ByteStream,
        offset: u64,
        size: u32,
        shift: u32,
    ) -> Result<Option<Fst>, RomError> {
        if size == 0 || size > MAX_FST_LEN {
            log::debug!("FST size 0x{size:X} out of range");
            return Ok(None);
        }
        match stream.read_vec_at(offset, size as usize) {
            Ok(raw) => Ok(Fst::parse(raw, shift).ok()),
            Err(e) if e.is_truncation() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn gcn_fst(&mut self) -> Result<Option<Fst>, RomError> {
        let (offset, size) = (self.header.fst_offset as u64, self.header.fst_size);
        Self::read_fst(self.stream()?, offset, size, 0)
    }

    /// `opening.bnr` of a GameCube disc, if it can be found and parsed.
    fn load_banner(&mut self) -> Result<Option<GcnBanner>, RomError> {
        if self.kind != DiscKind::GameCube {
            return Ok(None);
        }
        let Some(fst) = self.gcn_fst()? else {
            return Ok(None);
        };
        let Some(file) = fst.find("opening.bnr") else {
            log::debug!("{}: no opening.bnr", self.header.game_id);
            return Ok(None);
        };
        let len = (file.size as usize).min(BNR2_LEN);
        let raw = self.stream()?.read_up_to(file.offset, len)?;
        match GcnBanner::parse(&raw, self.is_japanese()) {
            Ok(banner) => Ok(Some(banner)),
            Err(e) => {
                log::debug!("{}: bad opening.bnr: {e}", self.header.game_id);
                Ok(None)
            }
        }
    }

    fn read_u32_opt(&mut self, offset: u64) -> Result<Option<u32>, RomError> {
        let raw = self.stream()?.read_up_to(offset, 4)?;
        Ok((raw.len() == 4).then(|| read_u32_be(&raw, 0)))
    }

    /// All entries of the four Wii partition tables.
    fn wii_partitions(&mut self) -> Result<Vec<PartitionEntry>, RomError> {
        let stream = self.stream()?;
        let tables = stream.read_up_to(WII_PARTITION_TABLES, 32)?;
        if tables.len() < 32 {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for (table, info) in tables.chunks_exact(8).enumerate() {
            let count = read_u32_be(info, 0).min(MAX_PARTITIONS);
            let offset = (read_u32_be(info, 4) as u64) << 2;
            if count == 0 {
                continue;
            }
            let raw = stream.read_up_to(offset, count as usize * 8)?;
            out.extend(raw.chunks_exact(8).map(|e| PartitionEntry {
                table,
                offset: (read_u32_be(e, 0) as u64) << 2,
                kind: read_u32_be(e, 4),
            }));
        }
        Ok(out)
    }

    fn open_partition(
        &mut self,
        entry: &PartitionEntry,
        ctx: &ParseContext,
    ) -> Result<WiiPartition, RomError> {
        let parent = self.stream()?.dup()?;
        WiiPartition::open(parent, entry.offset, &ctx.keys)
    }

    fn add_gamecube_fields(
        &mut self,
        ctx: &ParseContext,
        fields: &mut FieldList,
    ) -> Result<(), RomError> {
        match self.read_u32_opt(BI2_REGION)? {
            Some(code) => fields.add_string("Region", region_name(code)),
            None => fields.add_unknown("Region", FieldKind::String),
        }
        let h = &self.header;
        fields.add_string(
            "Audio streaming",
            if h.audio_streaming {
                format!("Yes (buffer size {})", h.stream_buf_size)
            } else {
                "No".to_string()
            },
        );
        fields.add_hex("DOL offset", h.dol_offset as u64, 8);

        match self.gcn_fst()? {
            Some(fst) => fields.add_numeric("Files", fst.file_count() as i64),
            None => fields.add_unknown("Files", FieldKind::Numeric),
        }

        let banner = self.load_banner()?;
        let comment = banner.as_ref().and_then(|b| b.comment(&ctx.language));
        fields.add_string_or_unknown("Banner title", comment.map(|c| c.title().to_string()));
        fields.add_string_or_unknown(
            "Banner publisher",
            comment.map(|c| c.publisher().to_string()),
        );
        fields.add_string_or_unknown("Description", comment.map(|c| c.description.clone()));
        Ok(())
    }

    fn add_wii_fields(&mut self, ctx: &ParseContext, fields: &mut FieldList) -> Result<(), RomError> {
        match self.read_u32_opt(WII_REGION)? {
            Some(code) => fields.add_string("Region", region_name(code)),
            None => fields.add_unknown("Region", FieldKind::String),
        }
        let ratings = self.stream()?.read_up_to(WII_AGE_RATINGS, 16)?;
        if ratings.len() == 16 {
            fields.add_string("Age ratings", describe_ratings(&ratings));
        } else {
            fields.add_unknown("Age ratings", FieldKind::String);
        }

        let partitions = self.wii_partitions()?;
        let mut rows = Vec::with_capacity(partitions.len());
        let mut game: Option<WiiPartition> = None;
        for (i, entry) in partitions.iter().enumerate() {
            let (key, status) = match self.open_partition(entry, ctx) {
                Ok(part) => {
                    let row = (part.common_key().name(), part.encryption_status().to_string());
                    if entry.kind == 0 && game.is_none() {
                        game = Some(part);
                    }
                    row
                }
                Err(e) => {
                    log::warn!("Wii partition {i} at 0x{:X}: {e}", entry.offset);
                    ("-".to_string(), "Invalid".to_string())
                }
            };
            rows.push(vec![
                i.to_string(),
                entry.table.to_string(),
                partition_type_name(entry.kind),
                format!("0x{:X}", entry.offset),
                key,
                status,
            ]);
        }
        fields.add_table(
            "Partitions",
            &["#", "Table", "Type", "Offset", "Key", "Status"],
            rows,
        );

        match game.as_mut() {
            Some(part) => {
                fields.add_string("Encryption", part.encryption_status().to_string());
                fields.add_string("Encryption key", part.common_key().name());
                let files = if part.encryption_status().is_ok() {
                    Self::partition_files(part)?
                } else {
                    None
                };
                match files {
                    Some(n) => fields.add_numeric("Files", n as i64),
                    None => fields.add_unknown("Files", FieldKind::Numeric),
                }
            }
            None => {
                fields.add_unknown("Encryption", FieldKind::String);
                fields.add_unknown("Encryption key", FieldKind::String);
                fields.add_unknown("Files", FieldKind::Numeric);
            }
        }
        Ok(())
    }

    /// File count from the game partition's own FST.
    fn partition_files(part: &mut WiiPartition) -> Result<Option<usize>, RomError> {
        let raw = part.read_up_to(0, HEADER_LEN)?;
        if raw.len() < HEADER_LEN {
            return Ok(None);
        }
        let inner = parse_header(&raw);
        let fst = Self::read_fst(part, (inner.fst_offset as u64) << 2, inner.fst_size << 2, 2)?;
        Ok(fst.map(|f| f.file_count()))
    }
}

impl RomFormat for GameCubeDisc {
    const NAME: &'static str = "Nintendo GameCube / Wii";
    const EXTENSIONS: &'static [&'static str] = &["iso", "gcm"];
    const HEADER_SIZE: usize = HEADER_LEN;

    fn detect(info: &DetectInfo<'_>) -> Option<u32> {
        if !info.has(HEADER_LEN) {
            return None;
        }
        if read_u32_be(info.header, OFF_GCN_MAGIC) == GCN_MAGIC {
            Some(DiscKind::GameCube as u32)
        } else if read_u32_be(info.header, OFF_WII_MAGIC) == WII_MAGIC {
            Some(DiscKind::Wii as u32)
        } else {
            None
        }
    }

    fn open(
        mut stream: Box<dyn ByteStream>,
        system_id: u32,
        _ctx: &ParseContext,
    ) -> Result<Self, RomError> {
        let kind = DiscKind::from_id(system_id)
            .ok_or_else(|| RomError::invalid_format(format!("unknown disc sub-type {system_id}")))?;
        let buf = stream.read_vec_at(0, HEADER_LEN)?;
        Ok(Self {
            stream: Some(stream),
            kind,
            header: parse_header(&buf),
        })
    }

    fn file_type(&self) -> FileType {
        FileType::DiscImage
    }

    fn system_name(&self, variant: SystemNameVariant) -> Option<&'static str> {
        lookup(&SYSTEM_NAMES, self.kind as usize, variant)
    }

    fn load_fields(&mut self, ctx: &ParseContext, fields: &mut FieldList) -> Result<(), RomError> {
        self.stream()?;
        let h = &self.header;
        fields.add_string("Title", h.title.clone());
        fields.add_string("Game ID", h.game_id.clone());
        let maker = h.game_id.get(4..6).unwrap_or("");
        fields.add_string("Publisher", publisher(maker));
        fields.add_numeric("Disc number", h.disc_number as i64 + 1);
        fields.add_numeric("Revision", h.version as i64);

        match self.kind {
            DiscKind::GameCube => self.add_gamecube_fields(ctx, fields),
            DiscKind::Wii => self.add_wii_fields(ctx, fields),
        }
    }

    fn supported_image_kinds(&self) -> ImageKinds {
        let mut kinds = ImageKinds::EXT_MEDIA
            | ImageKinds::EXT_COVER
            | ImageKinds::EXT_COVER_3D
            | ImageKinds::EXT_COVER_FULL;
        if self.kind == DiscKind::GameCube {
            kinds |= ImageKinds::INT_BANNER;
        }
        kinds
    }

    fn load_image(&mut self, kind: ImageKind) -> Result<Option<Bitmap>, RomError> {
        if kind != ImageKind::IntBanner {
            return Ok(None);
        }
        match self.load_banner()? {
            Some(banner) => Ok(Some(banner.image()?)),
            None => Ok(None),
        }
    }

    fn ext_urls(&self, kind: ImageKind, ctx: &ParseContext) -> Vec<ExtUrl> {
        if kind.is_internal() || !self.supported_image_kinds().has(kind) {
            return Vec::new();
        }
        let id = &self.header.game_id;
        if id.len() != 6 {
            return Vec::new();
        }
        // GameTDB files GameCube artwork under the Wii tree
        gametdb::urls(ctx, "wii", kind, id)
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

#[cfg(test)]
#[path = "tests/gamecube_tests.rs"]
mod tests;
