//! The per-file handle callers hold on to.
//!
//! A [`RomHandle`] owns its own duplicate of the caller's stream and the
//! parser state for it. Fields, images and the animated icon are computed
//! on first request and cached for the life of the handle.

use std::collections::HashMap;
use std::path::Path;

use romscope_core::{
    AnimatedIcon, Bitmap, ByteStream, ExtUrl, FieldList, FileStream, FileType, ImageKind,
    ImageKinds, ParseContext, RomError, SystemNameVariant,
};

use crate::dispatch::{Detection, detect_format};
use crate::formats::{FormatKind, RomData};

/// Where a handle is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Nothing has been read yet.
    Unopened,
    /// Detection ran; `valid` says whether a parser accepted the file.
    Probed { valid: bool },
    /// The field list has been built.
    FieldsLoaded,
    Closed,
}

pub struct RomHandle {
    ctx: ParseContext,
    state: HandleState,
    rom: Option<RomData>,
    detection: Option<Detection>,
    fields: Option<FieldList>,
    images: HashMap<ImageKind, Option<Bitmap>>,
    icon: Option<Option<AnimatedIcon>>,
}

impl RomHandle {
    /// Detect and open `stream`. The handle works on a duplicate, so the
    /// caller's cursor is never moved.
    ///
    /// A stream that can't be duplicated gives an invalid handle without
    /// any I/O. So does a file no parser accepts, or one whose mandatory
    /// header fails to parse.
    pub fn new(stream: &dyn ByteStream, ext: Option<&str>, ctx: ParseContext) -> Self {
        let mut handle = Self {
            ctx,
            state: HandleState::Unopened,
            rom: None,
            detection: None,
            fields: None,
            images: HashMap::new(),
            icon: None,
        };
        let dup = match stream.dup() {
            Ok(dup) => dup,
            Err(e) => {
                log::debug!("Couldn't duplicate stream: {e}");
                handle.state = HandleState::Probed { valid: false };
                return handle;
            }
        };
        handle.probe(dup, ext);
        handle
    }

    /// Open a file by path, using its extension as the detection hint.
    pub fn open_path(path: impl AsRef<Path>, ctx: ParseContext) -> Result<Self, RomError> {
        let path = path.as_ref();
        let stream = FileStream::open(path)?;
        let ext = path.extension().and_then(|e| e.to_str());
        Ok(Self::new(&stream, ext, ctx))
    }

    fn probe(&mut self, mut stream: Box<dyn ByteStream>, ext: Option<&str>) {
        let detection = match detect_format(stream.as_mut(), ext, &self.ctx) {
            Ok(Some(d)) => d,
            Ok(None) => {
                self.state = HandleState::Probed { valid: false };
                return;
            }
            Err(e) => {
                log::debug!("Couldn't read header for detection: {e}");
                self.state = HandleState::Probed { valid: false };
                return;
            }
        };
        match detection.kind.open(stream, detection.system_id, &self.ctx) {
            Ok(rom) => {
                log::debug!(
                    "Opened as {} (sub-type {})",
                    detection.kind.name(),
                    detection.system_id
                );
                self.rom = Some(rom);
                self.detection = Some(detection);
                self.state = HandleState::Probed { valid: true };
            }
            Err(e) => {
                log::debug!("{} detected but failed to open: {e}", detection.kind.name());
                self.detection = Some(detection);
                self.state = HandleState::Probed { valid: false };
            }
        }
    }

    pub fn state(&self) -> HandleState {
        self.state
    }

    /// Whether a parser accepted the file. Never does I/O.
    pub fn is_valid(&self) -> bool {
        self.rom.is_some()
    }

    /// The accepted format, or the detected one if opening it failed.
    pub fn kind(&self) -> Option<FormatKind> {
        self.detection.map(|d| d.kind)
    }

    pub fn system_id(&self) -> Option<u32> {
        self.detection.map(|d| d.system_id)
    }

    pub fn context(&self) -> &ParseContext {
        &self.ctx
    }

    pub fn system_name(&self, variant: SystemNameVariant) -> Option<&'static str> {
        self.rom.as_ref()?.system_name(variant)
    }

    pub fn file_type(&self) -> FileType {
        self.rom
            .as_ref()
            .map_or(FileType::Unknown, RomData::file_type)
    }

    fn open_rom(&mut self) -> Result<&mut RomData, RomError> {
        if self.state == HandleState::Closed {
            return Err(RomError::NotOpen);
        }
        self.rom.as_mut().ok_or(RomError::NotOpen)
    }

    /// The field list, built on the first call. Later calls return the same
    /// list without touching the stream.
    pub fn fields(&mut self) -> Result<&FieldList, RomError> {
        if self.state == HandleState::Closed {
            return Err(RomError::NotOpen);
        }
        if self.fields.is_none() {
            let rom = self.rom.as_mut().ok_or(RomError::NotOpen)?;
            let mut fields = FieldList::new();
            rom.load_fields(&self.ctx, &mut fields)?;
            self.fields = Some(fields);
            self.state = HandleState::FieldsLoaded;
        }
        self.fields.as_ref().ok_or(RomError::NotOpen)
    }

    pub fn supported_image_kinds(&self) -> ImageKinds {
        match (&self.rom, self.state) {
            (_, HandleState::Closed) | (None, _) => ImageKinds::empty(),
            (Some(rom), _) => rom.supported_image_kinds(),
        }
    }

    /// An internal image, decoded on first request. Kinds the parser
    /// doesn't advertise give `None` without any I/O.
    pub fn image(&mut self, kind: ImageKind) -> Result<Option<&Bitmap>, RomError> {
        let supported = self.open_rom()?.supported_image_kinds();
        if !supported.has(kind) {
            return Ok(None);
        }
        if !self.images.contains_key(&kind) {
            let bitmap = self.open_rom()?.load_image(kind)?;
            self.images.insert(kind, bitmap);
        }
        Ok(self.images.get(&kind).and_then(Option::as_ref))
    }

    pub fn animated_icon(&mut self) -> Result<Option<&AnimatedIcon>, RomError> {
        if self.icon.is_none() {
            let icon = self.open_rom()?.animated_icon()?;
            self.icon = Some(icon);
        }
        Ok(self.icon.as_ref().and_then(Option::as_ref))
    }

    /// External image URLs for `kind`, most specific first. No I/O.
    pub fn ext_urls(&self, kind: ImageKind) -> Vec<ExtUrl> {
        match &self.rom {
            Some(rom) if !kind.is_internal() => rom.ext_urls(kind, &self.ctx),
            _ => Vec::new(),
        }
    }

    /// Release the stream. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(rom) = self.rom.as_mut() {
            rom.close();
        }
        self.images.clear();
        self.icon = None;
        self.fields = None;
        self.state = HandleState::Closed;
    }
}

impl std::fmt::Debug for RomHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RomHandle")
            .field("state", &self.state)
            .field("detection", &self.detection)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "tests/handle_tests.rs"]
mod tests;
