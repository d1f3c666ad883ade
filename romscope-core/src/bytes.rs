//! Endian decoding, byte swapping and small bit-packing helpers.
//!
//! The `*_le`/`*_be` readers index directly and are meant for fixed-size
//! header arrays whose length the caller has already established. The
//! `get_*` variants are bounds-checked and return `None` past the end.

// ---------------------------------------------------------------------------
// Fixed-offset readers
// ---------------------------------------------------------------------------

pub fn read_u16_le(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

pub fn read_u16_be(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

pub fn read_u32_le(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

pub fn read_u32_be(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

pub fn read_u64_le(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

pub fn read_u64_be(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_be_bytes(bytes)
}

// ---------------------------------------------------------------------------
// Bounds-checked readers
// ---------------------------------------------------------------------------

pub fn get_u8(buf: &[u8], offset: usize) -> Option<u8> {
    buf.get(offset).copied()
}

pub fn get_u16_le(buf: &[u8], offset: usize) -> Option<u16> {
    let b = buf.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([b[0], b[1]]))
}

pub fn get_u16_be(buf: &[u8], offset: usize) -> Option<u16> {
    let b = buf.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_be_bytes([b[0], b[1]]))
}

pub fn get_u32_le(buf: &[u8], offset: usize) -> Option<u32> {
    let b = buf.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub fn get_u32_be(buf: &[u8], offset: usize) -> Option<u32> {
    let b = buf.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

/// Copy `N` bytes at `offset` into an array, if in range.
pub fn get_array<const N: usize>(buf: &[u8], offset: usize) -> Option<[u8; N]> {
    buf.get(offset..offset.checked_add(N)?)?.try_into().ok()
}

// ---------------------------------------------------------------------------
// Byte swapping
// ---------------------------------------------------------------------------

/// Swap every pair of bytes in place. A trailing odd byte is left alone.
pub fn swap16_in_place(buf: &mut [u8]) {
    for pair in buf.chunks_exact_mut(2) {
        pair.swap(0, 1);
    }
}

/// Reverse every group of four bytes in place. Trailing bytes are left alone.
pub fn swap32_in_place(buf: &mut [u8]) {
    for quad in buf.chunks_exact_mut(4) {
        quad.reverse();
    }
}

// ---------------------------------------------------------------------------
// Bits and BCD
// ---------------------------------------------------------------------------

/// Decode one packed BCD byte. Returns `None` if either nibble exceeds 9.
pub fn bcd_to_u8(value: u8) -> Option<u8> {
    let hi = value >> 4;
    let lo = value & 0x0F;
    if hi > 9 || lo > 9 {
        None
    } else {
        Some(hi * 10 + lo)
    }
}

/// Rotate a 128-bit value left by `bits`.
pub fn rol128(value: u128, bits: u32) -> u128 {
    value.rotate_left(bits % 128)
}

/// Round `value` up to the next multiple of `align` (a power of two).
/// `None` if the result does not fit in a `u64`.
pub fn align_up(value: u64, align: u64) -> Option<u64> {
    debug_assert!(align.is_power_of_two());
    Some(value.checked_add(align - 1)? & !(align - 1))
}

#[cfg(test)]
#[path = "tests/bytes_tests.rs"]
mod tests;
