//! Packed depth codec.
//!
//! Shadow maps store depth in an RGBA8 texture as base-255 fixed point: each
//! channel holds the next digit, normalized to `[0, 1]` by the texture unit.

use glam::Vec4;

/// Channel weights applied by [`decode_depth`].
///
/// The last weight is `1 / 160581375`, not `1 / 255^3`; shadow maps written by
/// other producers rely on it, so it is kept as is.
pub const DEPTH_DECODE_WEIGHTS: [f32; 4] = [1.0, 1.0 / 255.0, 1.0 / 65025.0, 1.0 / 160581375.0];

/// Decodes a depth value from normalized RGBA channels.
#[inline]
pub fn decode_depth(rgba: Vec4) -> f32 {
    rgba.dot(Vec4::from_array(DEPTH_DECODE_WEIGHTS))
}

/// Decodes a depth value from raw texel bytes, normalizing them the way an
/// `Rgba8Unorm` texture fetch does.
#[inline]
pub fn decode_depth_bytes(bytes: [u8; 4]) -> f32 {
    decode_depth(Vec4::from_array(bytes.map(|b| b as f32 / 255.0)))
}

/// Encodes `depth` (clamped to `[0, 1]`) as texel bytes.
///
/// Three base-255 digits resolve depth to about `6e-8`, far below the shadow
/// bias; the fourth channel is left at zero.
pub fn encode_depth_bytes(depth: f32) -> [u8; 4] {
    let mut rest = depth.clamp(0.0, 1.0) as f64;
    let mut out = [0u8; 4];
    for digit in out.iter_mut().take(3) {
        let scaled = rest * 255.0;
        let d = scaled.floor().min(255.0);
        *digit = d as u8;
        rest = scaled - d;
    }
    out
}

/// Encodes `depth` as normalized RGBA channels.
#[inline]
pub fn encode_depth(depth: f32) -> Vec4 {
    Vec4::from_array(encode_depth_bytes(depth).map(|b| b as f32 / 255.0))
}
