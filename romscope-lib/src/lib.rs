//! Format registry and dispatch for romscope.
//!
//! Hand a stream (or a path) to [`RomHandle`]; it runs every detector in
//! priority order, opens the matching parser, and then serves fields,
//! images and external URLs on demand.
//!
//! ```no_run
//! use romscope_lib::{RomHandle, SessionOptions};
//!
//! let ctx = SessionOptions::default().parse_context();
//! let mut handle = RomHandle::open_path("game.nes", ctx)?;
//! if handle.is_valid() {
//!     for field in handle.fields()?.iter() {
//!         println!("{}: {}", field.label, field.display_value());
//!     }
//! }
//! # Ok::<(), romscope_lib::RomError>(())
//! ```

pub mod dispatch;
pub mod formats;
pub mod handle;
pub mod report;
pub mod settings;

pub use dispatch::{Detection, detect_format, detect_header};
pub use formats::{FormatKind, RomData};
pub use handle::{HandleState, RomHandle};
pub use report::{ExtImage, RomReport};
pub use settings::{SessionOptions, resolve_keys_path};

pub use romscope_core::{
    AnimatedIcon, Bitmap, ByteStream, ExtUrl, Field, FieldKind, FieldList, FieldValue, FileStream,
    FileType, ImageKind, ImageKinds, KeyStore, MemStream, ParseContext, RomError,
    SystemNameVariant, Table,
};
