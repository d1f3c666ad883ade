/// Format a byte count as a human-readable size string (e.g., "4 KB", "2 MB").
///
/// Uses exact integer division: values that aren't clean multiples of KB/MB
/// are shown in bytes.
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= 1024 * 1024 && bytes.is_multiple_of(1024 * 1024) {
        format!("{} MB", bytes / (1024 * 1024))
    } else if bytes >= 1024 && bytes.is_multiple_of(1024) {
        format!("{} KB", bytes / 1024)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Read a null-terminated ASCII string from a byte slice.
///
/// Stops at the first null byte and filters out non-printable characters.
/// No trimming is performed.
pub fn read_ascii(buf: &[u8]) -> String {
    buf.iter()
        .take_while(|&&b| b != 0)
        .filter(|&&b| (0x20..0x7F).contains(&b))
        .map(|&b| b as char)
        .collect()
}

/// Read a fixed-length ASCII string from a byte slice.
///
/// Non-printable bytes are replaced with spaces, then the result is trimmed.
/// Does not stop at null bytes, for headers padded with 0x00 or 0xFF.
pub fn read_ascii_fixed(buf: &[u8]) -> String {
    let s: String = buf
        .iter()
        .map(|&b| {
            if (0x20..0x7F).contains(&b) {
                b as char
            } else {
                ' '
            }
        })
        .collect();
    s.trim().to_string()
}

/// Decode null-terminated UTF-16LE text. Unpaired surrogates become U+FFFD.
pub fn read_utf16le(buf: &[u8]) -> String {
    let units: Vec<u16> = buf
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

/// Decode null-terminated UTF-16BE text. Unpaired surrogates become U+FFFD.
pub fn read_utf16be(buf: &[u8]) -> String {
    let units: Vec<u16> = buf
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

/// Decode null-terminated Latin-1 (ISO-8859-1) text.
pub fn read_latin1(buf: &[u8]) -> String {
    buf.iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect()
}

/// Decode null-terminated Shift-JIS text.
///
/// Covers ASCII, half-width katakana, kana, full-width alphanumerics and
/// the common punctuation used in save titles. Full-width ASCII is folded
/// to plain ASCII. Kanji and other unmapped characters become U+FFFD.
pub fn read_shift_jis(buf: &[u8]) -> String {
    let mut out = String::new();
    let mut i = 0;
    while i < buf.len() {
        let b = buf[i];
        match b {
            0x00 => break,
            0x20..=0x7E => {
                out.push(b as char);
                i += 1;
            }
            0xA1..=0xDF => {
                out.push(char::from_u32(0xFF61 + (b - 0xA1) as u32).unwrap_or('\u{FFFD}'));
                i += 1;
            }
            0x81..=0x9F | 0xE0..=0xEF => {
                let Some(&trail) = buf.get(i + 1) else {
                    out.push('\u{FFFD}');
                    break;
                };
                out.push(sjis_double(u16::from_be_bytes([b, trail])));
                i += 2;
            }
            _ => {
                out.push('\u{FFFD}');
                i += 1;
            }
        }
    }
    out
}

fn sjis_double(code: u16) -> char {
    let mapped = match code {
        0x8140 => Some(' ' as u32),
        0x8141 => Some(0x3001),
        0x8142 => Some(0x3002),
        0x8143 => Some(',' as u32),
        0x8144 => Some('.' as u32),
        0x8146 => Some(':' as u32),
        0x8147 => Some(';' as u32),
        0x8148 => Some('?' as u32),
        0x8149 => Some('!' as u32),
        0x815B => Some(0x30FC),
        0x815C | 0x815D => Some('-' as u32),
        0x815E => Some('/' as u32),
        0x8160 => Some('~' as u32),
        0x8165 | 0x8166 => Some('\'' as u32),
        0x8167 | 0x8168 => Some('"' as u32),
        0x8169 => Some('(' as u32),
        0x816A => Some(')' as u32),
        0x816D => Some('[' as u32),
        0x816E => Some(']' as u32),
        0x8175 => Some(0x300C),
        0x8176 => Some(0x300D),
        0x817B => Some('+' as u32),
        0x817C => Some('-' as u32),
        0x817E => Some(0x00D7),
        0x8181 => Some('=' as u32),
        0x8183 => Some('<' as u32),
        0x8184 => Some('>' as u32),
        0x818F => Some('\\' as u32),
        0x8190 => Some('$' as u32),
        0x8193 => Some('%' as u32),
        0x8194 => Some('#' as u32),
        0x8195 => Some('&' as u32),
        0x8196 => Some('*' as u32),
        0x8197 => Some('@' as u32),
        0x824F..=0x8258 => Some('0' as u32 + (code - 0x824F) as u32),
        0x8260..=0x8279 => Some('A' as u32 + (code - 0x8260) as u32),
        0x8281..=0x829A => Some('a' as u32 + (code - 0x8281) as u32),
        0x829F..=0x82F1 => Some(0x3041 + (code - 0x829F) as u32),
        0x8340..=0x837E => Some(0x30A1 + (code - 0x8340) as u32),
        0x8380..=0x8396 => Some(0x30E0 + (code - 0x8380) as u32),
        _ => None,
    };
    mapped.and_then(char::from_u32).unwrap_or('\u{FFFD}')
}
