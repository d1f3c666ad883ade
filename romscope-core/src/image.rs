//! Image kinds a parser can provide, and external image URLs.

use serde::Serialize;

/// A single kind of image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ImageKind {
    /// Icon stored in the file
    IntIcon,
    /// Banner stored in the file
    IntBanner,
    /// Media scan stored in the file
    IntMedia,
    /// The file is itself an image (textures)
    IntImage,
    ExtMedia,
    ExtCover,
    ExtCover3D,
    ExtCoverFull,
    ExtBox,
    ExtTitleScreen,
}

impl ImageKind {
    pub const ALL: [ImageKind; 10] = [
        Self::IntIcon,
        Self::IntBanner,
        Self::IntMedia,
        Self::IntImage,
        Self::ExtMedia,
        Self::ExtCover,
        Self::ExtCover3D,
        Self::ExtCoverFull,
        Self::ExtBox,
        Self::ExtTitleScreen,
    ];

    pub fn is_internal(self) -> bool {
        matches!(
            self,
            Self::IntIcon | Self::IntBanner | Self::IntMedia | Self::IntImage
        )
    }

    pub fn flag(self) -> ImageKinds {
        match self {
            Self::IntIcon => ImageKinds::INT_ICON,
            Self::IntBanner => ImageKinds::INT_BANNER,
            Self::IntMedia => ImageKinds::INT_MEDIA,
            Self::IntImage => ImageKinds::INT_IMAGE,
            Self::ExtMedia => ImageKinds::EXT_MEDIA,
            Self::ExtCover => ImageKinds::EXT_COVER,
            Self::ExtCover3D => ImageKinds::EXT_COVER_3D,
            Self::ExtCoverFull => ImageKinds::EXT_COVER_FULL,
            Self::ExtBox => ImageKinds::EXT_BOX,
            Self::ExtTitleScreen => ImageKinds::EXT_TITLE_SCREEN,
        }
    }

    /// Name used in file names and external URLs.
    pub fn name(self) -> &'static str {
        match self {
            Self::IntIcon => "icon",
            Self::IntBanner => "banner",
            Self::IntMedia => "media",
            Self::IntImage => "image",
            Self::ExtMedia => "disc",
            Self::ExtCover => "cover",
            Self::ExtCover3D => "cover3D",
            Self::ExtCoverFull => "coverfull",
            Self::ExtBox => "box",
            Self::ExtTitleScreen => "title",
        }
    }
}

bitflags::bitflags! {
    /// A set of [`ImageKind`]s.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ImageKinds: u32 {
        const INT_ICON = 1 << 0;
        const INT_BANNER = 1 << 1;
        const INT_MEDIA = 1 << 2;
        const INT_IMAGE = 1 << 3;
        const EXT_MEDIA = 1 << 4;
        const EXT_COVER = 1 << 5;
        const EXT_COVER_3D = 1 << 6;
        const EXT_COVER_FULL = 1 << 7;
        const EXT_BOX = 1 << 8;
        const EXT_TITLE_SCREEN = 1 << 9;
    }
}

impl ImageKinds {
    pub fn has(self, kind: ImageKind) -> bool {
        self.contains(kind.flag())
    }

    /// The individual kinds in this set, in [`ImageKind::ALL`] order.
    pub fn kinds(self) -> impl Iterator<Item = ImageKind> {
        ImageKind::ALL.into_iter().filter(move |k| self.has(*k))
    }
}

/// An externally hosted image. The URL is built here; fetching it is the
/// caller's business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtUrl {
    pub url: String,
    pub cache_key: String,
}

impl ExtUrl {
    /// `http://<host>/<system>/<image_type>/<region>/<game_id><ext>`, cached
    /// under the same path minus the scheme and host.
    pub fn new(
        host: &str,
        system: &str,
        image_type: &str,
        region: &str,
        game_id: &str,
        ext: &str,
    ) -> Self {
        let cache_key = format!("{system}/{image_type}/{region}/{game_id}{ext}");
        Self {
            url: format!("http://{host}/{cache_key}"),
            cache_key,
        }
    }
}
