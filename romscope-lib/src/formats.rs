//! The closed set of supported formats.
//!
//! [`FormatKind`] is the tag and [`RomData`] the tagged value carrying each
//! parser's own state. Both are generated from one table so that adding a
//! parser is a single line, and every `match` over them stays exhaustive.
//!
//! The table order is the detection priority: formats with a strong magic
//! number first, loose heuristics (save files sized by block count, SNES
//! header scoring) last.

use romscope_core::{
    AnimatedIcon, Bitmap, ByteStream, DetectInfo, ExtUrl, FieldList, FileType, ImageKind,
    ImageKinds, ParseContext, RomError, RomFormat, SystemNameVariant,
};
use romscope_microsoft::{DirectDrawSurface, Executable};
use romscope_nintendo::{
    GameBoy, GameBoyAdvance, GameCubeDisc, GameCubeSave, N64, Nes, Nintendo3ds, NintendoDs, Snes,
};
use romscope_sega::{DreamcastSave, MasterSystem, MegaDrive, SegaPvr};
use romscope_sony::PlayStationSave;

macro_rules! formats {
    ($($variant:ident => $ty:ty,)+) => {
        /// Tag naming one parser.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
        pub enum FormatKind {
            $($variant,)+
        }

        impl FormatKind {
            /// Every format, in detection priority order.
            pub const ALL: &'static [FormatKind] = &[$(FormatKind::$variant,)+];

            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => <$ty as RomFormat>::NAME,)+
                }
            }

            pub fn extensions(self) -> &'static [&'static str] {
                match self {
                    $(Self::$variant => <$ty as RomFormat>::EXTENSIONS,)+
                }
            }

            /// Leading bytes this format's detector wants.
            pub fn header_size(self) -> usize {
                match self {
                    $(Self::$variant => <$ty as RomFormat>::HEADER_SIZE,)+
                }
            }

            pub fn detect(self, info: &DetectInfo<'_>) -> Option<u32> {
                match self {
                    $(Self::$variant => <$ty as RomFormat>::detect(info),)+
                }
            }

            /// Open `stream` with the parser for this format.
            pub fn open(
                self,
                stream: Box<dyn ByteStream>,
                system_id: u32,
                ctx: &ParseContext,
            ) -> Result<RomData, RomError> {
                match self {
                    $(Self::$variant => {
                        <$ty as RomFormat>::open(stream, system_id, ctx).map(RomData::$variant)
                    })+
                }
            }
        }

        /// An opened file, holding the state of whichever parser accepted it.
        pub enum RomData {
            $($variant($ty),)+
        }

        impl RomData {
            pub fn kind(&self) -> FormatKind {
                match self {
                    $(Self::$variant(_) => FormatKind::$variant,)+
                }
            }

            pub fn file_type(&self) -> FileType {
                match self {
                    $(Self::$variant(r) => r.file_type(),)+
                }
            }

            pub fn system_name(&self, variant: SystemNameVariant) -> Option<&'static str> {
                match self {
                    $(Self::$variant(r) => r.system_name(variant),)+
                }
            }

            pub fn load_fields(
                &mut self,
                ctx: &ParseContext,
                fields: &mut FieldList,
            ) -> Result<(), RomError> {
                match self {
                    $(Self::$variant(r) => r.load_fields(ctx, fields),)+
                }
            }

            pub fn supported_image_kinds(&self) -> ImageKinds {
                match self {
                    $(Self::$variant(r) => r.supported_image_kinds(),)+
                }
            }

            pub fn load_image(&mut self, kind: ImageKind) -> Result<Option<Bitmap>, RomError> {
                match self {
                    $(Self::$variant(r) => r.load_image(kind),)+
                }
            }

            pub fn animated_icon(&mut self) -> Result<Option<AnimatedIcon>, RomError> {
                match self {
                    $(Self::$variant(r) => r.animated_icon(),)+
                }
            }

            pub fn ext_urls(&self, kind: ImageKind, ctx: &ParseContext) -> Vec<ExtUrl> {
                match self {
                    $(Self::$variant(r) => r.ext_urls(kind, ctx),)+
                }
            }

            pub fn close(&mut self) {
                match self {
                    $(Self::$variant(r) => r.close(),)+
                }
            }
        }
    };
}

formats! {
    Nintendo3ds => Nintendo3ds,
    NintendoDs => NintendoDs,
    GameCubeDisc => GameCubeDisc,
    DirectDrawSurface => DirectDrawSurface,
    SegaPvr => SegaPvr,
    MegaDrive => MegaDrive,
    GameBoy => GameBoy,
    GameBoyAdvance => GameBoyAdvance,
    Nes => Nes,
    N64 => N64,
    MasterSystem => MasterSystem,
    Executable => Executable,
    GameCubeSave => GameCubeSave,
    DreamcastSave => DreamcastSave,
    PlayStationSave => PlayStationSave,
    Snes => Snes,
}

impl FormatKind {
    /// Whether `ext` (without the dot, any case) is one this format is
    /// usually stored with.
    pub fn claims_extension(self, ext: &str) -> bool {
        self.extensions()
            .iter()
            .any(|e| e.eq_ignore_ascii_case(ext))
    }

    /// The largest header any detector asks for.
    pub fn max_header_size() -> usize {
        Self::ALL
            .iter()
            .map(|k| k.header_size())
            .max()
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for RomData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RomData").field(&self.kind()).finish()
    }
}
