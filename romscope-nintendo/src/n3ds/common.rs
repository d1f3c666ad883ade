//! Shared helpers for the 3DS containers: title IDs and versions, media
//! and content type names, signature block sizes and the hardware key
//! scrambler.

use romscope_core::Region;
use romscope_core::bytes::rol128;

/// 1 media unit = 0x200 bytes.
pub(crate) const MEDIA_UNIT: u64 = 0x200;

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

/// Size of the signature block (type, signature, padding) that precedes a
/// ticket or TMD body.
pub(crate) fn signature_block_size(sig_type: u32) -> Option<usize> {
    match sig_type {
        0x0001_0003 => Some(4 + 0x200 + 0x3C), // RSA-4096
        0x0001_0004 => Some(4 + 0x100 + 0x3C), // RSA-2048
        0x0001_0005 => Some(4 + 0x3C + 0x40),  // ECDSA
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Title IDs and versions
// ---------------------------------------------------------------------------

pub(crate) fn format_title_id(tid: u64) -> String {
    format!("{:08X}-{:08X}", (tid >> 32) as u32, tid as u32)
}

pub(crate) fn title_type_from_id(tid: u64) -> &'static str {
    match (tid >> 32) as u32 {
        0x0004_0000 => "Application",
        0x0004_0001 => "Download Play child",
        0x0004_0002 => "Demo",
        0x0004_000E => "Update",
        0x0004_008C => "DLC",
        0x0004_0010 | 0x0004_0030 => "System Application",
        0x0004_001B | 0x0004_009B | 0x0004_00DB => "System Data Archive",
        0x0004_0130 => "System Module",
        0x0004_0138 => "System Firmware",
        0x0004_8004 | 0x0004_8005 | 0x0004_800F => "TWL Title",
        _ => "Unknown",
    }
}

/// System titles have bit 4 of the title ID's category set.
pub(crate) fn is_system_title(tid: u64) -> bool {
    (tid >> 32) & 0x10 != 0
}

/// "v1.2.3" from a packed 6/6/4-bit title version.
pub(crate) fn format_version(version: u16) -> String {
    format!(
        "v{}.{}.{}",
        version >> 10,
        (version >> 4) & 0x3F,
        version & 0xF
    )
}

/// Region implied by the last character of a product code like
/// "CTR-P-AREE".
pub(crate) fn region_from_product_code(product_code: &str) -> Region {
    game_id(product_code)
        .and_then(|id| id.chars().nth(3))
        .map_or(Region::Unknown, Region::from_game_id_char)
}

/// The four-character game ID at the end of a product code.
pub(crate) fn game_id(product_code: &str) -> Option<&str> {
    let code = product_code.trim();
    let id = code.rsplit('-').next()?;
    (id.len() == 4 && id.chars().all(|c| c.is_ascii_alphanumeric())).then_some(id)
}

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

pub(crate) fn media_type_name(media_type: u8) -> &'static str {
    match media_type {
        0 => "Inner Device",
        1 => "Card1",
        2 => "Card2",
        3 => "Extended Device",
        _ => "Unknown",
    }
}

pub(crate) fn content_type_description(flags: u8) -> &'static str {
    let form_type = flags & 0x03;
    match (form_type, flags >> 2) {
        (1, 0) => "Simple content",
        (2, 0) => "Executable (no RomFS)",
        (3, 0) => "Executable",
        (_, 1) => "System update",
        (_, 2) => "Manual",
        (_, 3) => "Download Play child",
        (_, 4) => "Trial",
        _ => "Unknown",
    }
}

pub(crate) fn platform_name(platform: u8) -> &'static str {
    match platform {
        1 => "CTR (3DS)",
        2 => "SNAKE (New 3DS)",
        _ => "Unknown",
    }
}

pub(crate) fn crypto_method_name(method: u8) -> &'static str {
    match method {
        0x00 => "Original",
        0x01 => "7.0.0+",
        0x0A => "9.3.0+ (New 3DS)",
        0x0B => "9.6.0+ (New 3DS)",
        _ => "Unknown",
    }
}

// ---------------------------------------------------------------------------
// Key scrambler
// ---------------------------------------------------------------------------

/// Derive an AES normal key from a KeyX/KeyY pair the way the console's
/// key slots do: `ROL((ROL(KeyX, 2) ^ KeyY) + C, 87)`.
pub(crate) fn scramble_key(key_x: &[u8; 16], key_y: &[u8; 16], constant: &[u8; 16]) -> [u8; 16] {
    let x = u128::from_be_bytes(*key_x);
    let y = u128::from_be_bytes(*key_y);
    let c = u128::from_be_bytes(*constant);
    rol128((rol128(x, 2) ^ y).wrapping_add(c), 87).to_be_bytes()
}

#[cfg(test)]
#[path = "tests/common_tests.rs"]
mod tests;
