//! Small checksum algorithms used by cartridge and save headers, and the
//! common rendering of a checked value.

/// CRC-16 with the reflected 0x8005 polynomial (0xA001) and the given
/// initial value. Nintendo DS headers and banners use init 0xFFFF.
pub fn crc16_reflected(data: &[u8], init: u16) -> u16 {
    let mut crc = init;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// CRC-16/XMODEM: polynomial 0x1021, MSB first, init 0. Used by Dreamcast
/// VMS files.
pub fn crc16_xmodem(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Render a stored checksum and whether it matches the computed one:
/// `0xEXPECTED (valid)` or `0xEXPECTED (INVALID; computed 0xCOMPUTED)`.
pub fn checksum_text(expected: u64, computed: u64, digits: usize) -> String {
    if expected == computed {
        format!("0x{expected:0digits$X} (valid)")
    } else {
        format!("0x{expected:0digits$X} (INVALID; computed 0x{computed:0digits$X})")
    }
}
