//! GameCube `opening.bnr` banners.
//!
//! A BNR1 banner has one comment block in the disc's own language (Shift-JIS
//! on Japanese discs, Latin-1 elsewhere); BNR2 is the PAL variant with six
//! blocks: English, German, French, Spanish, Italian, Dutch.

use romscope_core::util::{read_latin1, read_shift_jis};
use romscope_core::{Bitmap, RomError};
use romscope_texture::Pixel16;
use romscope_texture::tiled::from_gcn16;

pub(crate) const MAGIC_BNR1: &[u8; 4] = b"BNR1";
pub(crate) const MAGIC_BNR2: &[u8; 4] = b"BNR2";

const OFF_IMAGE: usize = 0x20;
const IMAGE_W: u32 = 96;
const IMAGE_H: u32 = 32;
const IMAGE_LEN: usize = 0x1800;
const OFF_COMMENTS: usize = 0x1820;
const COMMENT_LEN: usize = 0x140;

pub(crate) const BNR1_LEN: usize = OFF_COMMENTS + COMMENT_LEN;
pub(crate) const BNR2_LEN: usize = OFF_COMMENTS + COMMENT_LEN * 6;

const BNR2_LANGS: [&str; 6] = ["en", "de", "fr", "es", "it", "nl"];

/// One localized comment block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BannerComment {
    pub game_name: String,
    pub company: String,
    pub full_game_name: String,
    pub full_company: String,
    pub description: String,
}

impl BannerComment {
    fn parse(buf: &[u8], shift_jis: bool) -> Self {
        let text = |range: std::ops::Range<usize>| {
            let s = if shift_jis {
                read_shift_jis(&buf[range])
            } else {
                read_latin1(&buf[range])
            };
            s.trim().to_string()
        };
        Self {
            game_name: text(0x00..0x20),
            company: text(0x20..0x40),
            full_game_name: text(0x40..0x80),
            full_company: text(0x80..0xC0),
            description: text(0xC0..0x140),
        }
    }

    /// The longer title if present, else the short one.
    pub fn title(&self) -> &str {
        if self.full_game_name.is_empty() {
            &self.game_name
        } else {
            &self.full_game_name
        }
    }

    pub fn publisher(&self) -> &str {
        if self.full_company.is_empty() {
            &self.company
        } else {
            &self.full_company
        }
    }

    fn is_empty(&self) -> bool {
        self.game_name.is_empty() && self.full_game_name.is_empty()
    }
}

/// A parsed `opening.bnr`.
#[derive(Debug, Clone)]
pub struct GcnBanner {
    is_bnr2: bool,
    image: Vec<u8>,
    comments: Vec<BannerComment>,
}

impl GcnBanner {
    /// Parse a banner. `shift_jis` selects the text encoding for BNR1.
    pub fn parse(buf: &[u8], shift_jis: bool) -> Result<Self, RomError> {
        let magic = buf.get(..4).ok_or_else(|| RomError::truncated(4, buf.len() as u64))?;
        let (is_bnr2, len) = match magic {
            m if m == MAGIC_BNR1 => (false, BNR1_LEN),
            m if m == MAGIC_BNR2 => (true, BNR2_LEN),
            _ => return Err(RomError::invalid_format("not a BNR1/BNR2 banner")),
        };
        if buf.len() < len {
            return Err(RomError::truncated(len as u64, buf.len() as u64));
        }
        let comments = buf[OFF_COMMENTS..len]
            .chunks_exact(COMMENT_LEN)
            .map(|c| BannerComment::parse(c, shift_jis && !is_bnr2))
            .collect();
        Ok(Self {
            is_bnr2,
            image: buf[OFF_IMAGE..OFF_IMAGE + IMAGE_LEN].to_vec(),
            comments,
        })
    }

    pub fn is_bnr2(&self) -> bool {
        self.is_bnr2
    }

    /// Comment block for `language`, falling back to English and then to
    /// the first non-empty block.
    pub fn comment(&self, language: &str) -> Option<&BannerComment> {
        if !self.is_bnr2 {
            return self.comments.first();
        }
        let find = |lang: &str| {
            BNR2_LANGS
                .iter()
                .position(|l| l.eq_ignore_ascii_case(lang))
                .and_then(|i| self.comments.get(i))
                .filter(|c| !c.is_empty())
        };
        find(language)
            .or_else(|| find("en"))
            .or_else(|| self.comments.iter().find(|c| !c.is_empty()))
    }

    /// The 96x32 RGB5A3 banner image.
    pub fn image(&self) -> Result<Bitmap, RomError> {
        Ok(from_gcn16(Pixel16::Rgb5a3, IMAGE_W, IMAGE_H, &self.image)?)
    }
}
