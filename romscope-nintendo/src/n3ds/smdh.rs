//! SMDH: the 3DS icon and title block.
//!
//! Found standalone (`.smdh`, `.icn`), embedded in 3DSX homebrew, in a
//! CIA's meta section, or as the `icon` file of an NCCH's ExeFS.

use romscope_core::bytes::{read_u16_le, read_u32_le};
use romscope_core::locale::select_localized;
use romscope_core::region::{RegionBit, describe_region_bits};
use romscope_core::util::read_utf16le;
use romscope_core::{Bitmap, FieldList, RomError};
use romscope_texture::tiled::from_n3ds_rgb565;

pub(crate) const SMDH_MAGIC: &[u8; 4] = b"SMDH";
pub(crate) const SMDH_LEN: usize = 0x36C0;

const OFF_TITLES: usize = 0x08;
const TITLE_LEN: usize = 0x200;
const SHORT_LEN: usize = 0x80;
const LONG_LEN: usize = 0x100;
const OFF_RATINGS: usize = 0x2008;
const OFF_REGION: usize = 0x2018;
const OFF_FLAGS: usize = 0x2028;
const OFF_EULA: usize = 0x202C;
const OFF_ICON_SMALL: usize = 0x2040;
const OFF_ICON_LARGE: usize = 0x24C0;

/// Title slots in table order. Slots 12-15 are unused.
const TITLE_LANGS: [&str; 12] = [
    "ja", "en", "fr", "de", "it", "es", "zh", "ko", "nl", "pt", "ru", "zh_TW",
];

const REGIONS: [RegionBit; 7] = [
    (1 << 0, "Japan"),
    (1 << 1, "USA"),
    (1 << 2, "Europe"),
    (1 << 3, "Australia"),
    (1 << 4, "China"),
    (1 << 5, "Korea"),
    (1 << 6, "Taiwan"),
];
const ALL_REGIONS: u32 = 0x7F;

const RATING_BOARDS: [(usize, &str); 9] = [
    (0, "CERO"),
    (1, "ESRB"),
    (3, "USK"),
    (4, "PEGI"),
    (6, "PEGI (PRT)"),
    (7, "BBFC"),
    (8, "COB"),
    (9, "GRB"),
    (10, "CGSRR"),
];

const FLAG_NAMES: [Option<&str>; 13] = [
    Some("Visible"),
    Some("Auto-boot"),
    Some("Uses 3D"),
    Some("Requires EULA"),
    Some("Auto-save"),
    Some("Extended banner"),
    Some("Rating required"),
    Some("Uses save data"),
    Some("Records usage"),
    None,
    Some("No save backups"),
    None,
    Some("New 3DS only"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IconSize {
    /// 24x24
    Small,
    /// 48x48
    Large,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SmdhTitle {
    pub(crate) short: String,
    pub(crate) long: String,
    pub(crate) publisher: String,
}

/// A validated SMDH block.
#[derive(Debug, Clone)]
pub(crate) struct Smdh {
    data: Vec<u8>,
}

impl Smdh {
    pub(crate) fn parse(mut data: Vec<u8>) -> Result<Self, RomError> {
        if data.len() < SMDH_LEN {
            return Err(RomError::truncated(SMDH_LEN as u64, data.len() as u64));
        }
        if &data[..4] != SMDH_MAGIC {
            return Err(RomError::invalid_format("missing SMDH magic"));
        }
        data.truncate(SMDH_LEN);
        Ok(Self { data })
    }

    pub(crate) fn titles(&self) -> Vec<SmdhTitle> {
        (0..TITLE_LANGS.len())
            .map(|i| {
                let base = OFF_TITLES + i * TITLE_LEN;
                let text = |off: usize, len: usize| {
                    read_utf16le(&self.data[base + off..base + off + len])
                        .trim()
                        .to_string()
                };
                SmdhTitle {
                    short: text(0, SHORT_LEN),
                    long: text(SHORT_LEN, LONG_LEN),
                    publisher: text(SHORT_LEN + LONG_LEN, SHORT_LEN),
                }
            })
            .collect()
    }

    /// The title for `language`, falling back to English and then the first
    /// slot with a short title.
    pub(crate) fn title(&self, language: &str) -> Option<SmdhTitle> {
        let titles = self.titles();
        let shorts: Vec<String> = titles.iter().map(|t| t.short.clone()).collect();
        let chosen = select_localized(&shorts, &TITLE_LANGS, language)?;
        let idx = shorts
            .iter()
            .position(|s| std::ptr::eq(s.as_str(), chosen))?;
        titles.into_iter().nth(idx)
    }

    pub(crate) fn region_lockout(&self) -> u32 {
        read_u32_le(&self.data, OFF_REGION)
    }

    pub(crate) fn flags(&self) -> u32 {
        read_u32_le(&self.data, OFF_FLAGS)
    }

    pub(crate) fn icon(&self, size: IconSize) -> Result<Bitmap, RomError> {
        let (dim, raw) = match size {
            IconSize::Small => (24, &self.data[OFF_ICON_SMALL..OFF_ICON_LARGE]),
            IconSize::Large => (48, &self.data[OFF_ICON_LARGE..]),
        };
        Ok(from_n3ds_rgb565(dim, dim, raw)?)
    }

    /// Title, publisher, region and rating fields.
    pub(crate) fn add_fields(&self, language: &str, fields: &mut FieldList) {
        let title = self.title(language);
        fields.add_string_or_unknown("Title", title.as_ref().map(|t| t.short.clone()));
        fields.add_string_or_unknown(
            "Full title",
            title
                .as_ref()
                .map(|t| t.long.replace('\n', " "))
                .filter(|s| !s.is_empty()),
        );
        fields.add_string_or_unknown(
            "Publisher",
            title.map(|t| t.publisher).filter(|s| !s.is_empty()),
        );
        fields.add_string(
            "Region",
            describe_region_bits(self.region_lockout(), &REGIONS, ALL_REGIONS, "Unknown"),
        );
        fields.add_string(
            "Age ratings",
            describe_ratings(&self.data[OFF_RATINGS..OFF_RATINGS + 16]),
        );
        fields.add_bitfield("Flags", self.flags(), &FLAG_NAMES);
        let eula = read_u16_le(&self.data, OFF_EULA);
        if eula != 0 {
            fields.add_string("EULA version", format!("{}.{}", eula >> 8, eula & 0xFF));
        }
    }
}

/// "CERO: 12, ESRB: 10". Bit 7 marks a board as active, bit 6 a pending
/// rating, bit 5 no age restriction.
fn describe_ratings(block: &[u8]) -> String {
    let rated: Vec<String> = RATING_BOARDS
        .iter()
        .filter_map(|&(idx, board)| {
            let b = *block.get(idx)?;
            if b & 0x80 == 0 {
                return None;
            }
            Some(if b & 0x40 != 0 {
                format!("{board}: RP")
            } else if b & 0x20 != 0 {
                format!("{board}: All ages")
            } else {
                format!("{board}: {}", b & 0x1F)
            })
        })
        .collect();
    if rated.is_empty() {
        "None".to_string()
    } else {
        rated.join(", ")
    }
}

#[cfg(test)]
#[path = "tests/smdh_tests.rs"]
pub(crate) mod tests;
