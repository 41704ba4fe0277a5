//! Wire encoding for characteristic payloads.
//!
//! Every float is sent as the 4 bytes of its IEEE-754 bit pattern in
//! little-endian order, independent of the byte order of the MCU. A 3-axis
//! reading is three such fields back to back (x, y, z).

pub const F32_LEN: usize = 4;
pub const VEC3_LEN: usize = 3 * F32_LEN;

#[inline]
pub fn encode_f32(value: f32) -> [u8; F32_LEN] {
    value.to_bits().to_le_bytes()
}

#[inline]
pub fn decode_f32(bytes: [u8; F32_LEN]) -> f32 {
    f32::from_bits(u32::from_le_bytes(bytes))
}

pub fn encode_vec3(v: [f32; 3]) -> [u8; VEC3_LEN] {
    let mut out = [0u8; VEC3_LEN];
    for (chunk, value) in out.chunks_exact_mut(F32_LEN).zip(v) {
        chunk.copy_from_slice(&encode_f32(value));
    }
    out
}

/// Decodes a 12-byte 3-axis payload. Returns `None` if `bytes` has the wrong length.
pub fn decode_vec3(bytes: &[u8]) -> Option<[f32; 3]> {
    if bytes.len() != VEC3_LEN {
        return None;
    }
    let mut out = [0f32; 3];
    for (value, chunk) in out.iter_mut().zip(bytes.chunks_exact(F32_LEN)) {
        *value = decode_f32([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    Some(out)
}

/// Decodes a single 4-byte float payload.
pub fn decode_scalar(bytes: &[u8]) -> Option<f32> {
    match bytes {
        [a, b, c, d] => Some(decode_f32([*a, *b, *c, *d])),
        _ => None,
    }
}
