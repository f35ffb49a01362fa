//! Boot driver checksum used by the Macintosh ROM to validate driver code
//! loaded from an `Apple_Driver*` partition.

/// Add each byte to a 16-bit accumulator, rotating it left by one bit after
/// every byte. Zero is reserved for "no checksum", so a zero result is
/// reported as `0xFFFF`.
pub fn checksum16(bytes: &[u8]) -> u16 {
    let sum = bytes
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(b as u16).rotate_left(1));

    if sum == 0 { 0xFFFF } else { sum }
}

/// Compare a computed checksum against the 32-bit `pmBootCksum` field. Only
/// the low 16 bits of the stored value take part.
pub fn matches_stored(computed: u16, stored: u32) -> bool {
    computed == (stored & 0xFFFF) as u16
}
