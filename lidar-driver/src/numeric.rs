pub(crate) fn to_u16(a: u8, b: u8) -> u16 {
    ((a as u16) << 8) + (b as u16)
}

/// Angle in degrees from the two angle bytes of a standard node. The lowest
/// bit of `bit1` is the check bit and carries no angle information.
pub(crate) fn to_angle(bit1: u8, bit2: u8) -> f32 {
    let q6 = ((bit1 as u16) >> 1) + ((bit2 as u16) << 7);
    (q6 as f32) / 64.
}

/// Distance in millimeters from a Q14.2 little-endian pair.
pub(crate) fn to_distance(b1: u8, b2: u8) -> f32 {
    (to_u16(b2, b1) as f32) / 4.
}

/// The node carries six quality bits; keep the four most significant so the
/// value fits `0..=15`.
pub(crate) fn to_quality(b0: u8) -> u8 {
    b0 >> 4
}

pub(crate) fn xor_checksum(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, b| acc ^ b)
}

pub(crate) fn to_string(data: &[u8]) -> String {
    data.iter()
        .map(|e| format!("{:02X}", e))
        .collect::<Vec<_>>()
        .join(" ")
}
