//! Nintendo DS / DSi ROMs.
//!
//! Supports:
//! - DS ROMs (.nds)
//! - DSi-enhanced and DSi-exclusive ROMs (.dsi)
//! - DSiWare (.srl)
//!
//! The NDS cartridge header occupies bytes 0x000-0x1FF (512 bytes). Detection
//! uses the 156-byte Nintendo logo at 0xC0 (identical to GBA) and the logo
//! checksum 0xCF56 at 0x15C. The header CRC-16 covers bytes 0x000-0x15D.
//!
//! The icon/title banner (offset at 0x68) carries localized titles, a 32x32
//! 4bpp icon, and on DSi titles an animated icon sequence.

use romscope_core::bytes::{read_u16_le, read_u32_le};
use romscope_core::checksum::crc16_reflected;
use romscope_core::locale::select_localized;
use romscope_core::region::{RegionBit, describe_region_bits};
use romscope_core::system::lookup;
use romscope_core::util::{format_bytes, read_ascii_fixed, read_utf16le};
use romscope_core::{
    AnimFrame, AnimatedIcon, Bitmap, ByteStream, DetectInfo, ExtUrl, FieldKind, FieldList,
    FileType, ImageKind, ImageKinds, ParseContext, Region, RomError, RomFormat, SystemNameRow,
    SystemNameVariant, checksum_text,
};
use romscope_texture::tiled::from_nds_ci4;
use romscope_texture::{Endian, Pixel16, decode_palette16};

use crate::gametdb;
use crate::gba::NINTENDO_LOGO;
use crate::licensee::publisher;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

const HEADER_LEN: usize = 0x200;

const OFF_LOGO: usize = 0xC0;
const OFF_LOGO_CRC: usize = 0x15C;
const OFF_HEADER_CRC: usize = 0x15E;
const OFF_DSI_REGION: usize = 0x1B0;

/// Expected logo checksum value at 0x15C.
const EXPECTED_LOGO_CHECKSUM: u16 = 0xCF56;

const SECURE_AREA: u64 = 0x4000;
const SECURE_AREA_LEN: usize = 0x4000;

/// Magic bytes at 0x4000 that indicate a decrypted secure area dump.
/// The BIOS overwrites the "encryObj" ID with 0xE7FFDEFF (an undefined ARM
/// instruction) repeated twice. Stored little-endian in the file.
const DECRYPTED_SECURE_AREA_MAGIC: [u8; 8] = [0xFF, 0xDE, 0xFF, 0xE7, 0xFF, 0xDE, 0xFF, 0xE7];

// Banner layout
const BANNER_ICON: usize = 0x20;
const BANNER_PALETTE: usize = 0x220;
const BANNER_TITLES: usize = 0x240;
const BANNER_TITLE_LEN: usize = 0x100;
const BANNER_DSI_BITMAPS: usize = 0x1240;
const BANNER_DSI_PALETTES: usize = 0x2240;
const BANNER_DSI_SEQUENCE: usize = 0x2340;
const DSI_SEQUENCE_LEN: usize = 64;

const BANNER_V1: u16 = 0x0001;
const BANNER_V2: u16 = 0x0002;
const BANNER_V3: u16 = 0x0003;
const BANNER_DSI: u16 = 0x0103;

/// Title slots in banner order.
const TITLE_LANGS: [&str; 8] = ["ja", "en", "fr", "de", "it", "es", "zh", "ko"];

const DSI_REGIONS: [RegionBit; 6] = [
    (1 << 0, "Japan"),
    (1 << 1, "USA"),
    (1 << 2, "Europe"),
    (1 << 3, "Australia"),
    (1 << 4, "China"),
    (1 << 5, "Korea"),
];

const SYSTEM_NAMES: [SystemNameRow; 2] = [
    ["Nintendo DS", "Nintendo DS", "NDS"],
    ["Nintendo DSi", "Nintendo DSi", "DSi"],
];

/// Compute CRC-16 used by the NDS header (polynomial 0x8005, reflected, init 0xFFFF).
fn crc16(data: &[u8]) -> u16 {
    crc16_reflected(data, 0xFFFF)
}

// ---------------------------------------------------------------------------
// Header struct
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DsKind {
    Nds = 0,
    DsiEnhanced = 1,
    DsiExclusive = 2,
}

impl DsKind {
    fn from_unit_code(unit_code: u8) -> Self {
        match unit_code {
            0x02 => Self::DsiEnhanced,
            0x03 => Self::DsiExclusive,
            _ => Self::Nds,
        }
    }

    fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(Self::Nds),
            1 => Some(Self::DsiEnhanced),
            2 => Some(Self::DsiExclusive),
            _ => None,
        }
    }

    fn is_dsi(self) -> bool {
        self != Self::Nds
    }
}

/// Parsed NDS cartridge header (0x000-0x1FF).
struct NdsHeader {
    title: String,
    game_code: String,
    maker_code: String,
    device_capacity: u8,
    nds_region: u8,
    rom_version: u8,
    arm9_rom_offset: u32,
    arm9_size: u32,
    arm7_rom_offset: u32,
    arm7_size: u32,
    icon_title_offset: u32,
    secure_area_checksum: u16,
    total_used_rom_size: u32,
    logo_checksum: u16,
    header_checksum: u16,
    dsi_region: u32,
}

fn parse_header(buf: &[u8; HEADER_LEN]) -> NdsHeader {
    NdsHeader {
        title: read_ascii_fixed(&buf[0x000..0x00C]),
        game_code: read_ascii_fixed(&buf[0x00C..0x010]),
        maker_code: read_ascii_fixed(&buf[0x010..0x012]),
        device_capacity: buf[0x014],
        nds_region: buf[0x01D],
        rom_version: buf[0x01E],
        arm9_rom_offset: read_u32_le(buf, 0x020),
        arm9_size: read_u32_le(buf, 0x02C),
        arm7_rom_offset: read_u32_le(buf, 0x030),
        arm7_size: read_u32_le(buf, 0x03C),
        icon_title_offset: read_u32_le(buf, 0x068),
        secure_area_checksum: read_u16_le(buf, 0x06C),
        total_used_rom_size: read_u32_le(buf, 0x080),
        logo_checksum: read_u16_le(buf, OFF_LOGO_CRC),
        header_checksum: read_u16_le(buf, OFF_HEADER_CRC),
        dsi_region: read_u32_le(buf, OFF_DSI_REGION),
    }
}

/// Secure area state detected from magic bytes at 0x4000.
enum SecureArea {
    /// Decrypted dump: the stored CRC is over the encrypted form and can't
    /// be checked.
    Decrypted,
    /// Original encrypted form; CRC can be verified.
    Encrypted { computed_crc: u16 },
    /// No secure area (homebrew: arm9_rom_offset < 0x4000).
    Homebrew,
}

fn detect_secure_area(
    stream: &mut dyn ByteStream,
    arm9_rom_offset: u32,
) -> Result<SecureArea, RomError> {
    if (arm9_rom_offset as u64) < SECURE_AREA {
        return Ok(SecureArea::Homebrew);
    }
    let buf = stream.read_vec_at(SECURE_AREA, SECURE_AREA_LEN)?;
    if buf[..8] == DECRYPTED_SECURE_AREA_MAGIC {
        return Ok(SecureArea::Decrypted);
    }
    Ok(SecureArea::Encrypted {
        computed_crc: crc16(&buf),
    })
}

// ---------------------------------------------------------------------------
// Banner
// ---------------------------------------------------------------------------

fn banner_len(version: u16) -> Option<usize> {
    Some(match version {
        BANNER_V1 => 0x840,
        BANNER_V2 => 0x940,
        BANNER_V3 => 0xA40,
        BANNER_DSI => 0x23C0,
        _ => return None,
    })
}

/// Number of title slots present for a banner version.
fn title_count(version: u16) -> usize {
    match version {
        BANNER_V1 => 6,
        BANNER_V2 => 7,
        _ => 8,
    }
}

struct NdsBanner {
    version: u16,
    data: Vec<u8>,
}

impl NdsBanner {
    fn titles(&self) -> Vec<String> {
        (0..title_count(self.version))
            .map(|i| {
                let start = BANNER_TITLES + i * BANNER_TITLE_LEN;
                read_utf16le(&self.data[start..start + BANNER_TITLE_LEN])
                    .trim()
                    .to_string()
            })
            .collect()
    }

    fn icon(&self) -> Result<Bitmap, RomError> {
        let palette = decode_palette16(
            Pixel16::Bgr555,
            &self.data[BANNER_PALETTE..BANNER_PALETTE + 0x20],
            Endian::Little,
        );
        Ok(from_nds_ci4(
            32,
            32,
            &self.data[BANNER_ICON..BANNER_ICON + 0x200],
            &palette,
        )?)
    }

    /// DSi icon animation. Each sequence token holds a delay in 60 Hz ticks
    /// (bits 0-7), the bitmap (8-10) and palette (11-13) indices, and
    /// horizontal/vertical flips (14, 15). A zero token ends the sequence.
    fn animation(&self) -> Result<Option<AnimatedIcon>, RomError> {
        if self.version != BANNER_DSI {
            return Ok(None);
        }
        let mut keys: Vec<(usize, usize, bool, bool)> = Vec::new();
        let mut frames = Vec::new();
        let mut sequence = Vec::new();
        for i in 0..DSI_SEQUENCE_LEN {
            let token = read_u16_le(&self.data, BANNER_DSI_SEQUENCE + i * 2);
            if token == 0 {
                break;
            }
            let key = (
                ((token >> 8) & 7) as usize,
                ((token >> 11) & 7) as usize,
                token & 0x4000 != 0,
                token & 0x8000 != 0,
            );
            let frame = match keys.iter().position(|k| *k == key) {
                Some(idx) => idx,
                None => {
                    let (bmp_idx, pal_idx, hflip, vflip) = key;
                    let pal_off = BANNER_DSI_PALETTES + pal_idx * 0x20;
                    let palette = decode_palette16(
                        Pixel16::Bgr555,
                        &self.data[pal_off..pal_off + 0x20],
                        Endian::Little,
                    );
                    let bmp_off = BANNER_DSI_BITMAPS + bmp_idx * 0x200;
                    let bmp = from_nds_ci4(32, 32, &self.data[bmp_off..bmp_off + 0x200], &palette)?;
                    frames.push(if hflip || vflip {
                        bmp.flipped(hflip, vflip)
                    } else {
                        bmp
                    });
                    keys.push(key);
                    keys.len() - 1
                }
            };
            sequence.push(AnimFrame {
                frame,
                delay_ms: (token & 0xFF) as u32 * 1000 / 60,
            });
        }
        Ok(AnimatedIcon::new(frames, sequence))
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Nintendo DS or DSi ROM.
pub struct NintendoDs {
    stream: Option<Box<dyn ByteStream>>,
    kind: DsKind,
    raw_header: Box<[u8; HEADER_LEN]>,
    header: NdsHeader,
}

impl NintendoDs {
    fn stream(&mut self) -> Result<&mut dyn ByteStream, RomError> {
        Ok(self.stream.as_mut().ok_or(RomError::NotOpen)?.as_mut())
    }

    /// Read the icon/title banner. `Ok(None)` when the ROM has none or it
    /// lies past the end of the file.
    fn load_banner(&mut self) -> Result<Option<NdsBanner>, RomError> {
        let offset = self.header.icon_title_offset as u64;
        if offset == 0 {
            return Ok(None);
        }
        let stream = self.stream()?;
        let head = match stream.read_vec_at(offset, 2) {
            Ok(v) => v,
            Err(e) if e.is_truncation() => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut version = read_u16_le(&head, 0);
        let Some(mut len) = banner_len(version) else {
            log::debug!("unknown DS banner version 0x{version:04X}");
            return Ok(None);
        };
        let data = match stream.read_vec_at(offset, len) {
            Ok(v) => v,
            Err(e) if e.is_truncation() && version > BANNER_V1 => {
                // Some dumps truncate the banner to the v1 size.
                version = BANNER_V1;
                len = 0x840;
                match stream.read_vec_at(offset, len) {
                    Ok(v) => v,
                    Err(e) if e.is_truncation() => return Ok(None),
                    Err(e) => return Err(e),
                }
            }
            Err(e) if e.is_truncation() => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(Some(NdsBanner { version, data }))
    }

    fn hardware(&self) -> &'static str {
        match self.kind {
            DsKind::Nds => "Nintendo DS",
            DsKind::DsiEnhanced => "Nintendo DS, Nintendo DSi",
            DsKind::DsiExclusive => "Nintendo DSi",
        }
    }
}

impl RomFormat for NintendoDs {
    const NAME: &'static str = "Nintendo DS";
    const EXTENSIONS: &'static [&'static str] = &["nds", "dsi", "srl", "ids"];
    const HEADER_SIZE: usize = HEADER_LEN;

    fn detect(info: &DetectInfo<'_>) -> Option<u32> {
        if !info.has(HEADER_LEN) {
            return None;
        }
        let h = info.header;
        if h[OFF_LOGO..OFF_LOGO + NINTENDO_LOGO.len()] != NINTENDO_LOGO
            || read_u16_le(h, OFF_LOGO_CRC) != EXPECTED_LOGO_CHECKSUM
        {
            return None;
        }
        Some(DsKind::from_unit_code(h[0x012]) as u32)
    }

    fn open(
        mut stream: Box<dyn ByteStream>,
        system_id: u32,
        _ctx: &ParseContext,
    ) -> Result<Self, RomError> {
        let kind = DsKind::from_id(system_id)
            .ok_or_else(|| RomError::invalid_format(format!("unknown DS sub-type {system_id}")))?;
        let mut raw_header = Box::new([0u8; HEADER_LEN]);
        stream.read_exact_at(0, raw_header.as_mut_slice())?;
        let header = parse_header(&raw_header);
        Ok(Self {
            stream: Some(stream),
            kind,
            raw_header,
            header,
        })
    }

    fn file_type(&self) -> FileType {
        FileType::RomImage
    }

    fn system_name(&self, variant: SystemNameVariant) -> Option<&'static str> {
        lookup(
            &SYSTEM_NAMES,
            (self.kind == DsKind::DsiExclusive) as usize,
            variant,
        )
    }

    fn load_fields(&mut self, ctx: &ParseContext, fields: &mut FieldList) -> Result<(), RomError> {
        let file_size = self.stream()?.size();
        let banner = self.load_banner()?;
        let h = &self.header;

        fields.add_string("Title", h.title.clone());
        if h.icon_title_offset != 0 {
            let full = banner.as_ref().and_then(|b| {
                let titles = b.titles();
                select_localized(&titles, &TITLE_LANGS, &ctx.language).map(str::to_string)
            });
            fields.add_string_or_unknown("Full title", full);
        }
        let prefix = if self.kind.is_dsi() { "TWL" } else { "NTR" };
        fields.add_string("Game ID", format!("{prefix}-{}", h.game_code));
        fields.add_string("Publisher", publisher(&h.maker_code));
        fields.add_string("Hardware", self.hardware());

        let region = h
            .game_code
            .chars()
            .nth(3)
            .map(Region::from_game_id_char)
            .unwrap_or(Region::Unknown);
        fields.add_string("Region", region.name());
        if self.kind.is_dsi() {
            fields.add_string(
                "DSi region",
                describe_region_bits(h.dsi_region, &DSI_REGIONS, 0x3F, "Unknown"),
            );
        } else if h.nds_region != 0 {
            fields.add_string(
                "Region lock",
                match h.nds_region {
                    0x40 => "Korea",
                    0x80 => "China",
                    _ => "Unknown",
                },
            );
        }
        fields.add_numeric("Revision", h.rom_version as i64);

        if h.device_capacity <= 12 {
            fields.add_string(
                "Cartridge capacity",
                format_bytes((128 * 1024) << h.device_capacity),
            );
        } else {
            fields.add_unknown("Cartridge capacity", FieldKind::String);
        }
        if h.total_used_rom_size > 0 {
            let used = h.total_used_rom_size as u64;
            let status = if file_size < used {
                "Truncated"
            } else if file_size == used {
                "Trimmed"
            } else {
                "Untrimmed"
            };
            fields.add_string(
                "Used ROM size",
                format!("{} ({status})", format_bytes(used)),
            );
        }
        fields.add_string(
            "ARM9",
            format!("offset 0x{:08X}, {}", h.arm9_rom_offset, format_bytes(h.arm9_size as u64)),
        );
        fields.add_string(
            "ARM7",
            format!("offset 0x{:08X}, {}", h.arm7_rom_offset, format_bytes(h.arm7_size as u64)),
        );

        let arm9 = h.arm9_rom_offset;
        let stored_secure_crc = h.secure_area_checksum;
        let logo_crc = h.logo_checksum;
        let header_crc = h.header_checksum;
        match detect_secure_area(self.stream()?, arm9) {
            Ok(SecureArea::Homebrew) => fields.add_string("Secure area", "None (homebrew)"),
            Ok(SecureArea::Decrypted) => fields.add_string("Secure area", "Decrypted"),
            Ok(SecureArea::Encrypted { computed_crc }) => {
                fields.add_string("Secure area", "Encrypted");
                fields.add_string(
                    "Secure area checksum",
                    checksum_text(stored_secure_crc as u64, computed_crc as u64, 4),
                );
            }
            Err(e) if e.is_truncation() => fields.add_unknown("Secure area", FieldKind::String),
            Err(e) => return Err(e),
        }

        let raw = &self.raw_header;
        fields.add_string(
            "Logo checksum",
            checksum_text(
                logo_crc as u64,
                crc16(&raw[OFF_LOGO..OFF_LOGO_CRC]) as u64,
                4,
            ),
        );
        fields.add_string(
            "Header checksum",
            checksum_text(header_crc as u64, crc16(&raw[..OFF_HEADER_CRC]) as u64, 4),
        );
        Ok(())
    }

    fn supported_image_kinds(&self) -> ImageKinds {
        let mut kinds = ImageKinds::EXT_COVER
            | ImageKinds::EXT_COVER_3D
            | ImageKinds::EXT_COVER_FULL
            | ImageKinds::EXT_BOX;
        if self.header.icon_title_offset != 0 {
            kinds |= ImageKinds::INT_ICON;
        }
        kinds
    }

    fn load_image(&mut self, kind: ImageKind) -> Result<Option<Bitmap>, RomError> {
        if kind != ImageKind::IntIcon {
            return Ok(None);
        }
        match self.load_banner()? {
            Some(banner) => Ok(Some(banner.icon()?)),
            None => Ok(None),
        }
    }

    fn animated_icon(&mut self) -> Result<Option<AnimatedIcon>, RomError> {
        match self.load_banner()? {
            Some(banner) => banner.animation(),
            None => Ok(None),
        }
    }

    fn ext_urls(&self, kind: ImageKind, ctx: &ParseContext) -> Vec<ExtUrl> {
        if kind.is_internal() || !self.supported_image_kinds().has(kind) {
            return Vec::new();
        }
        let code = &self.header.game_code;
        if code.len() != 4 {
            return Vec::new();
        }
        gametdb::urls(ctx, "ds", kind, code)
    }

    fn close(&mut self) {
        self.stream = None;
    }
}

#[cfg(test)]
#[path = "tests/ds_tests.rs"]
mod tests;
