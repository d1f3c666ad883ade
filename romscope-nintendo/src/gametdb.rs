//! GameTDB artwork URLs shared by the DS, 3DS, GameCube and Wii parsers.

use romscope_core::{ExtUrl, ImageKind, ParseContext, Region};

/// Region directories to try for a game ID region character, most specific
/// first. European releases try the display language before English.
pub(crate) fn regions(id_char: char, language: &str) -> Vec<&'static str> {
    let region = Region::from_game_id_char(id_char);
    let primary = region.gametdb_code(id_char);
    let mut out = Vec::with_capacity(3);
    if region == Region::Europe
        && primary == "EN"
        && let Some(lang) = european_language(language)
    {
        out.push(lang);
    }
    if !out.contains(&primary) {
        out.push(primary);
    }
    if matches!(region, Region::Europe | Region::Australia) && !out.contains(&"EN") {
        out.push("EN");
    }
    out
}

fn european_language(language: &str) -> Option<&'static str> {
    Some(match language.to_ascii_lowercase().as_str() {
        "de" => "DE",
        "fr" => "FR",
        "es" => "ES",
        "it" => "IT",
        "nl" => "NL",
        "pt" => "PT",
        _ => return None,
    })
}

/// Image file extension GameTDB uses for each artwork kind.
pub(crate) fn file_ext(kind: ImageKind) -> &'static str {
    match kind {
        ImageKind::ExtCover | ImageKind::ExtCoverFull => ".jpg",
        _ => ".png",
    }
}

/// One URL per candidate region for `game_id`.
pub(crate) fn urls(
    ctx: &ParseContext,
    system: &str,
    kind: ImageKind,
    game_id: &str,
) -> Vec<ExtUrl> {
    let Some(id_char) = game_id.chars().nth(3) else {
        return Vec::new();
    };
    regions(id_char, &ctx.language)
        .into_iter()
        .map(|region| {
            ExtUrl::new(
                &ctx.image_host,
                system,
                kind.name(),
                region,
                game_id,
                file_ext(kind),
            )
        })
        .collect()
}
