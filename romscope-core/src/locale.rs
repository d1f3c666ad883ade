//! Display-language selection for multi-language title tables.

/// Language used when the preferred one has no entry.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Two-letter language code of the host, from `LC_ALL`, `LC_MESSAGES` or
/// `LANG` (first non-empty wins). `C`/`POSIX` and unset map to English.
pub fn host_language() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.is_empty())
        .map(|v| language_from_locale(&v))
        .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string())
}

/// `ja_JP.UTF-8` → `ja`, `pt-BR` → `pt`, `C` → `en`.
pub fn language_from_locale(locale: &str) -> String {
    let lang: String = locale
        .split(['_', '-', '.', '@'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if lang.len() < 2 || lang == "c" || lang == "posix" {
        DEFAULT_LANGUAGE.to_string()
    } else {
        lang
    }
}

/// Pick a title from a per-language table.
///
/// `langs[i]` is the language code of `slots[i]`. Selection order: the
/// preferred language, then English, then the first non-empty slot.
pub fn select_localized<'a>(
    slots: &'a [String],
    langs: &[&str],
    preferred: &str,
) -> Option<&'a str> {
    let find = |lang: &str| {
        langs
            .iter()
            .position(|l| l.eq_ignore_ascii_case(lang))
            .and_then(|i| slots.get(i))
            .filter(|s| !s.trim().is_empty())
            .map(String::as_str)
    };
    find(preferred)
        .or_else(|| find(DEFAULT_LANGUAGE))
        .or_else(|| {
            slots
                .iter()
                .find(|s| !s.trim().is_empty())
                .map(String::as_str)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANGS: [&str; 4] = ["ja", "en", "fr", "de"];

    fn slots(v: [&str; 4]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_locale_parsing() {
        assert_eq!(language_from_locale("ja_JP.UTF-8"), "ja");
        assert_eq!(language_from_locale("pt-BR"), "pt");
        assert_eq!(language_from_locale("C"), "en");
        assert_eq!(language_from_locale("POSIX"), "en");
        assert_eq!(language_from_locale(""), "en");
    }

    #[test]
    fn test_preferred_then_english_then_first() {
        let s = slots(["Nihongo", "English", "Francais", ""]);
        assert_eq!(select_localized(&s, &LANGS, "fr"), Some("Francais"));
        assert_eq!(select_localized(&s, &LANGS, "de"), Some("English"));
        assert_eq!(select_localized(&s, &LANGS, "xx"), Some("English"));

        let s = slots(["", "", "", "Deutsch"]);
        assert_eq!(select_localized(&s, &LANGS, "ja"), Some("Deutsch"));

        let s = slots(["", " ", "", ""]);
        assert_eq!(select_localized(&s, &LANGS, "en"), None);
    }
}
