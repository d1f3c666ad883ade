//! A serializable summary of one handle, shared by every front end.

use romscope_core::{ExtUrl, FieldList, ImageKind, RomError, SystemNameVariant};
use serde::Serialize;

use crate::formats::FormatKind;
use crate::handle::RomHandle;

/// External image URLs of one kind.
#[derive(Debug, Clone, Serialize)]
pub struct ExtImage {
    pub kind: ImageKind,
    pub urls: Vec<ExtUrl>,
}

/// Everything known about one file, ready to print or serialize.
#[derive(Debug, Clone, Serialize)]
pub struct RomReport {
    pub format: FormatKind,
    pub system: Option<&'static str>,
    pub system_short: Option<&'static str>,
    pub file_type: &'static str,
    pub fields: FieldList,
    /// Internal images the parser can decode.
    pub images: Vec<ImageKind>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ext_images: Vec<ExtImage>,
}

impl RomReport {
    /// Build a report from a valid handle, loading its fields if needed.
    /// External URLs are included only when `with_urls` is set.
    pub fn build(handle: &mut RomHandle, with_urls: bool) -> Result<Self, RomError> {
        let format = handle
            .kind()
            .filter(|_| handle.is_valid())
            .ok_or_else(|| RomError::invalid_format("unsupported file"))?;
        let fields = handle.fields()?.clone();
        let ext_images = if with_urls {
            ImageKind::ALL
                .into_iter()
                .filter(|k| !k.is_internal())
                .map(|kind| ExtImage {
                    kind,
                    urls: handle.ext_urls(kind),
                })
                .filter(|e| !e.urls.is_empty())
                .collect()
        } else {
            Vec::new()
        };
        Ok(Self {
            format,
            system: handle.system_name(SystemNameVariant::LONG),
            system_short: handle.system_name(SystemNameVariant::SHORT),
            file_type: handle.file_type().name(),
            fields,
            images: handle.supported_image_kinds().kinds().collect(),
            ext_images,
        })
    }
}
