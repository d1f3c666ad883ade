//! Format detection over every registered parser.

use romscope_core::{ByteStream, DetectInfo, ParseContext, RomError};

use crate::formats::FormatKind;

/// A detector's verdict: which parser, and the sub-type id it reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub kind: FormatKind,
    pub system_id: u32,
}

/// Run every detector over `header` in priority order.
///
/// Without an extension hint the first match wins. With one, every detector
/// runs and the first match that usually carries that extension wins; if
/// none does, the first match is used anyway.
pub fn detect_header(
    header: &[u8],
    size: u64,
    ext: Option<&str>,
    ctx: &ParseContext,
) -> Option<Detection> {
    let ext = ext.map(|e| e.trim_start_matches('.').to_ascii_lowercase());
    let mut matches = FormatKind::ALL.iter().filter_map(|&kind| {
        let info = DetectInfo {
            header: &header[..header.len().min(kind.header_size())],
            size,
            ext: ext.as_deref(),
            save_precedence: &ctx.save_precedence,
        };
        kind.detect(&info)
            .map(|system_id| Detection { kind, system_id })
    });

    let Some(ext) = ext.as_deref() else {
        return matches.next();
    };
    let first = matches.next()?;
    if first.kind.claims_extension(ext) {
        return Some(first);
    }
    let preferred = matches.find(|d| d.kind.claims_extension(ext));
    if let Some(d) = preferred {
        log::debug!(
            "'{}' and '{}' both match; .{} picks '{}'",
            first.kind.name(),
            d.kind.name(),
            ext,
            d.kind.name()
        );
    }
    Some(preferred.unwrap_or(first))
}

/// Read the leading bytes of `stream` and detect its format.
pub fn detect_format(
    stream: &mut dyn ByteStream,
    ext: Option<&str>,
    ctx: &ParseContext,
) -> Result<Option<Detection>, RomError> {
    let size = stream.size();
    let header = stream.read_up_to(0, FormatKind::max_header_size())?;
    Ok(detect_header(&header, size, ext, ctx))
}

#[cfg(test)]
#[path = "tests/dispatch_tests.rs"]
pub(crate) mod tests;
