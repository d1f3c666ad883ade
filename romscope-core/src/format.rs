//! The contract every format parser implements, plus the context passed to
//! parsers.

use std::sync::Arc;

use romscope_crypto::KeyStore;

use crate::{
    AnimatedIcon, Bitmap, ByteStream, ExtUrl, FieldList, ImageKind, ImageKinds, RomError,
    SystemNameVariant, locale,
};

/// Broad category of a detected file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    RomImage,
    DiscImage,
    SaveFile,
    Executable,
    Dll,
    ContainerFile,
    IconFile,
    TextureFile,
    Unknown,
}

impl FileType {
    pub fn name(self) -> &'static str {
        match self {
            Self::RomImage => "ROM Image",
            Self::DiscImage => "Disc Image",
            Self::SaveFile => "Save File",
            Self::Executable => "Executable",
            Self::Dll => "Dynamic Link Library",
            Self::ContainerFile => "Container File",
            Self::IconFile => "Icon File",
            Self::TextureFile => "Texture File",
            Self::Unknown => "Unknown",
        }
    }
}

/// On-disk save-file variants whose detection relies on file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveVariant {
    /// GameCube `.gci`: 0x40-byte directory entry + blocks
    GcnGci,
    /// GameCube `.gcs` (GameShark): 0x110-byte header + blocks
    GcnGcs,
    /// GameCube `.sav` (MaxDrive): 0x80-byte header + byteswapped entry + blocks
    GcnSav,
    /// Dreamcast VMS holding game data (header at block 1)
    DcVmsGame,
    /// Dreamcast VMS holding save data (header at block 0)
    DcVmsData,
    /// Dreamcast `ICONDATA_VMS` icon file
    DcIconData,
    /// Dreamcast `.vmi` directory entry on its own
    DcVmi,
    /// Dreamcast Nexus `.dci`: directory entry + byteswapped blocks
    DcDci,
    /// PlayStation `.psv` (PS3 export)
    Ps1Psv,
    /// PlayStation `.mcs` / `.mcb`: 0x80-byte directory frame + blocks
    Ps1Mcs,
    /// PlayStation raw save blocks starting with the `SC` header
    Ps1Raw,
}

/// Order in which ambiguous save variants are tried. The first variant
/// whose size formula and structural checks both pass is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveVariantPrecedence(Vec<SaveVariant>);

impl SaveVariantPrecedence {
    pub fn new(order: Vec<SaveVariant>) -> Self {
        Self(order)
    }

    /// The variants from `candidates`, ordered by this precedence. Variants
    /// missing from the list keep their relative order after the listed ones.
    pub fn order(&self, candidates: &[SaveVariant]) -> Vec<SaveVariant> {
        let mut ordered: Vec<SaveVariant> = self
            .0
            .iter()
            .copied()
            .filter(|v| candidates.contains(v))
            .collect();
        for v in candidates {
            if !ordered.contains(v) {
                ordered.push(*v);
            }
        }
        ordered
    }
}

impl Default for SaveVariantPrecedence {
    fn default() -> Self {
        use SaveVariant::*;
        Self(vec![
            GcnGci, GcnGcs, GcnSav, DcVmi, DcDci, DcIconData, DcVmsData, DcVmsGame, Ps1Psv,
            Ps1Mcs, Ps1Raw,
        ])
    }
}

/// Settings shared by every parser of a session.
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// Two-letter display language code.
    pub language: String,
    pub keys: Arc<KeyStore>,
    pub save_precedence: SaveVariantPrecedence,
    /// Host used to build external image URLs.
    pub image_host: String,
}

impl ParseContext {
    pub fn new(keys: Arc<KeyStore>) -> Self {
        Self {
            language: locale::host_language(),
            keys,
            save_precedence: SaveVariantPrecedence::default(),
            image_host: "art.gametdb.com".to_string(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_save_precedence(mut self, precedence: SaveVariantPrecedence) -> Self {
        self.save_precedence = precedence;
        self
    }

    pub fn with_image_host(mut self, host: impl Into<String>) -> Self {
        self.image_host = host.into();
        self
    }
}

impl Default for ParseContext {
    fn default() -> Self {
        Self::new(Arc::new(KeyStore::empty()))
    }
}

/// What a detection function gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct DetectInfo<'a> {
    /// Leading bytes of the file (may be shorter than requested).
    pub header: &'a [u8],
    /// Total file size.
    pub size: u64,
    /// Lower-case extension without the dot, if known.
    pub ext: Option<&'a str>,
    pub save_precedence: &'a SaveVariantPrecedence,
}

impl<'a> DetectInfo<'a> {
    /// `header` must hold at least `len` bytes for any magic check to run.
    pub fn has(&self, len: usize) -> bool {
        self.header.len() >= len && self.size >= len as u64
    }

    pub fn ext_is(&self, candidates: &[&str]) -> bool {
        self.ext
            .is_some_and(|e| candidates.iter().any(|c| c.eq_ignore_ascii_case(e)))
    }
}

/// One format parser.
///
/// `detect` is static and cheap; `open` takes ownership of a stream and
/// parses whatever is needed to answer `system_name`. Everything else is
/// computed on demand; caching is the caller's job.
pub trait RomFormat: Sized + Send {
    /// Display name of the format family.
    const NAME: &'static str;
    /// Extensions (without dot) this format is usually found with.
    const EXTENSIONS: &'static [&'static str];
    /// Bytes of leading header `detect` wants to see.
    const HEADER_SIZE: usize;

    /// Sub-type id if the data is this format.
    fn detect(info: &DetectInfo<'_>) -> Option<u32>;

    /// Open a stream that `detect` accepted with id `system_id`.
    fn open(
        stream: Box<dyn ByteStream>,
        system_id: u32,
        ctx: &ParseContext,
    ) -> Result<Self, RomError>;

    fn file_type(&self) -> FileType;

    fn system_name(&self, variant: SystemNameVariant) -> Option<&'static str>;

    /// Append every field to `fields`. Called at most once per instance by
    /// the handle. Trailing-structure failures become unknown fields.
    fn load_fields(&mut self, ctx: &ParseContext, fields: &mut FieldList) -> Result<(), RomError>;

    fn supported_image_kinds(&self) -> ImageKinds {
        ImageKinds::empty()
    }

    /// Decode an internal image. `Ok(None)` means not available.
    fn load_image(&mut self, _kind: ImageKind) -> Result<Option<Bitmap>, RomError> {
        Ok(None)
    }

    fn animated_icon(&mut self) -> Result<Option<AnimatedIcon>, RomError> {
        Ok(None)
    }

    /// External image URLs for `kind`, most specific first.
    fn ext_urls(&self, _kind: ImageKind, _ctx: &ParseContext) -> Vec<ExtUrl> {
        Vec::new()
    }

    /// Release the stream and any nested readers.
    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use SaveVariant::*;

    #[test]
    fn test_precedence_order() {
        let p = SaveVariantPrecedence::new(vec![DcVmsGame, DcVmsData]);
        assert_eq!(
            p.order(&[DcVmsData, DcIconData, DcVmsGame]),
            vec![DcVmsGame, DcVmsData, DcIconData]
        );
        let d = SaveVariantPrecedence::default();
        assert_eq!(d.order(&[DcVmsGame, DcVmsData]), vec![DcVmsData, DcVmsGame]);
    }

    #[test]
    fn test_detect_info_bounds() {
        let p = SaveVariantPrecedence::default();
        let info = DetectInfo {
            header: &[0; 4],
            size: 100,
            ext: Some("GCI"),
            save_precedence: &p,
        };
        assert!(info.has(4));
        assert!(!info.has(5));
        assert!(info.ext_is(&["gci", "gcs"]));
    }
}
