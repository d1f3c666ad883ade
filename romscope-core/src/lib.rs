//! Shared types for romscope format parsers.
//!
//! Parsers read through a [`ByteStream`], describe what they find in a
//! [`FieldList`], and decode images into [`Bitmap`]s. The [`RomFormat`]
//! trait is the per-format contract the dispatcher in `romscope-lib` drives.

pub mod animated;
pub mod bitmap;
pub mod bytes;
pub mod checksum;
pub mod error;
pub mod fields;
pub mod format;
pub mod image;
pub mod locale;
pub mod region;
pub mod stream;
pub mod system;
pub mod util;

pub use animated::{AnimFrame, AnimatedIcon};
pub use bitmap::{Bitmap, BitmapError, PixelLayout};
pub use checksum::checksum_text;
pub use error::RomError;
pub use fields::{Bitfield, Field, FieldKind, FieldList, FieldValue, NumberFormat, Table};
pub use format::{
    DetectInfo, FileType, ParseContext, RomFormat, SaveVariant, SaveVariantPrecedence,
};
pub use image::{ExtUrl, ImageKind, ImageKinds};
pub use region::Region;
pub use stream::{ByteStream, FileStream, MemStream, PartitionStream, WindowStream};
pub use system::{NameForm, NameRegion, SystemNameRow, SystemNameVariant};

pub use romscope_crypto::{EncryptionStatus, KeyStore};
