//! Shadow-map sampling: single binary test and 5×5 percentage-closer filter.

use glam::{Vec2, Vec4};

use super::depth::{decode_depth, encode_depth_bytes};

/// Bias added to the stored depth before comparing, against self-shadowing acne.
pub const SHADOW_BIAS: f32 = 0.00001;

/// PCF kernel half-width in texels; the kernel spans `-2..=2` on each axis.
pub const PCF_RADIUS: i32 = 2;

/// Number of taps in the PCF kernel.
pub const PCF_SAMPLES: usize = ((2 * PCF_RADIUS + 1) * (2 * PCF_RADIUS + 1)) as usize;

/// Anything that can be fetched like the shadow-map texture.
///
/// `sample` returns normalized RGBA channels holding a packed depth.
pub trait ShadowMapSampler {
    fn sample(&self, uv: Vec2) -> Vec4;
}

/// Returns `1.0` when the point at `compare` depth is lit, `0.0` when occluded.
#[inline]
pub fn sample_shadow<S: ShadowMapSampler + ?Sized>(map: &S, uv: Vec2, compare: f32) -> f32 {
    let depth = decode_depth(map.sample(uv)) + SHADOW_BIAS;
    // step(compare, depth)
    if depth >= compare { 1.0 } else { 0.0 }
}

/// Averages [`sample_shadow`] over the PCF kernel centered on `uv`.
///
/// `texel_size` is `1 / shadow_map_size`; it must match the bound map.
pub fn sample_shadow_pcf<S: ShadowMapSampler + ?Sized>(
    map: &S,
    uv: Vec2,
    texel_size: f32,
    compare: f32,
) -> f32 {
    let mut result = 0.0;
    for x in -PCF_RADIUS..=PCF_RADIUS {
        for y in -PCF_RADIUS..=PCF_RADIUS {
            let offset = Vec2::new(x as f32, y as f32) * texel_size;
            result += sample_shadow(map, uv + offset, compare);
        }
    }
    result / PCF_SAMPLES as f32
}

/// CPU-side packed depth map.
///
/// Texels are stored row-major, top row first, exactly as uploaded to an
/// `Rgba8Unorm` texture. Sampling is nearest-texel with clamp-to-edge, which is
/// how the wgpu backend configures its shadow sampler.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedDepthMap {
    width: u32,
    height: u32,
    texels: Vec<[u8; 4]>,
}

impl PackedDepthMap {
    /// Creates a map cleared to the far plane (depth `1.0`, everything lit).
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, 1.0)
    }

    /// Creates a map where every texel stores `depth`.
    pub fn filled(width: u32, height: u32, depth: f32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            texels: vec![encode_depth_bytes(depth); width as usize * height as usize],
        }
    }

    /// Creates a map from a per-texel depth function `f(x, y)`.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> f32) -> Self {
        let mut map = Self::new(width, height);
        for y in 0..map.height {
            for x in 0..map.width {
                map.set_depth(x, y, f(x, y));
            }
        }
        map
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Texel offset for one step of the PCF kernel (`1 / width`).
    #[inline]
    pub fn texel_size(&self) -> f32 {
        1.0 / self.width as f32
    }

    /// Stores `depth` at texel `(x, y)`. Out-of-range coordinates are ignored.
    pub fn set_depth(&mut self, x: u32, y: u32, depth: f32) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.texels[i] = encode_depth_bytes(depth);
        }
    }

    /// Raw texel bytes at `(x, y)`, clamped to the edge.
    pub fn texel(&self, x: i64, y: i64) -> [u8; 4] {
        let x = x.clamp(0, self.width as i64 - 1) as u32;
        let y = y.clamp(0, self.height as i64 - 1) as u32;
        self.texels[self.index(x, y)]
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        texel_index(self.width, x, y)
    }

    /// Texel data ready for a texture upload.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.texels)
    }
}

/// Row-major texel index, computed in `usize` so large maps do not wrap.
#[inline]
fn texel_index(width: u32, x: u32, y: u32) -> usize {
    y as usize * width as usize + x as usize
}

impl ShadowMapSampler for PackedDepthMap {
    fn sample(&self, uv: Vec2) -> Vec4 {
        let x = (uv.x * self.width as f32).floor() as i64;
        let y = (uv.y * self.height as f32).floor() as i64;
        Vec4::from_array(self.texel(x, y).map(|b| b as f32 / 255.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shading::depth::decode_depth_bytes;

    /// Sampler returning the same texel everywhere.
    struct Uniform([u8; 4]);

    impl ShadowMapSampler for Uniform {
        fn sample(&self, _uv: Vec2) -> Vec4 {
            Vec4::from_array(self.0.map(|b| b as f32 / 255.0))
        }
    }

    // ── single sample ─────────────────────────────────────────────────────

    #[test]
    fn compare_at_or_below_stored_depth_is_lit() {
        let map = Uniform([128, 0, 0, 0]);
        let stored = decode_depth_bytes([128, 0, 0, 0]);
        assert_eq!(sample_shadow(&map, Vec2::splat(0.5), stored), 1.0);
        assert_eq!(sample_shadow(&map, Vec2::splat(0.5), stored - 0.1), 1.0);
    }

    #[test]
    fn bias_absorbs_tiny_overshoot() {
        let map = Uniform([128, 0, 0, 0]);
        let stored = decode_depth_bytes([128, 0, 0, 0]);
        assert_eq!(sample_shadow(&map, Vec2::ZERO, stored + 0.000_005), 1.0);
    }

    #[test]
    fn compare_beyond_bias_is_occluded() {
        let map = Uniform([128, 0, 0, 0]);
        let stored = decode_depth_bytes([128, 0, 0, 0]);
        assert_eq!(sample_shadow(&map, Vec2::ZERO, stored + 0.001), 0.0);
    }

    // ── pcf ───────────────────────────────────────────────────────────────

    #[test]
    fn pcf_on_uniform_map_matches_single_sample() {
        let map = PackedDepthMap::filled(64, 64, 0.4);
        let uv = Vec2::new(0.3, 0.7);
        for compare in [0.1, 0.39, 0.4, 0.41, 0.9] {
            let single = sample_shadow(&map, uv, compare);
            let pcf = sample_shadow_pcf(&map, uv, map.texel_size(), compare);
            assert_eq!(pcf, single, "compare {compare}");
        }
    }

    #[test]
    fn pcf_kernel_has_25_taps() {
        assert_eq!(PCF_SAMPLES, 25);
    }

    #[test]
    fn pcf_softens_a_shadow_edge() {
        // Left half occluded at depth 0.2, right half open.
        let map = PackedDepthMap::from_fn(16, 16, |x, _| if x < 8 { 0.2 } else { 1.0 });
        let texel = map.texel_size();

        // Center of texel 8: kernel columns 6, 7 fall in the occluded half.
        let uv = Vec2::new(8.5 * texel, 0.5);
        let s = sample_shadow_pcf(&map, uv, texel, 0.5);
        assert!((s - 15.0 / 25.0).abs() < 1e-6, "got {s}");
    }

    // ── packed map ────────────────────────────────────────────────────────

    #[test]
    fn sampling_clamps_to_edge() {
        let map = PackedDepthMap::from_fn(4, 4, |x, y| if (x, y) == (0, 0) { 0.25 } else { 1.0 });
        let inside = map.sample(Vec2::new(0.1, 0.1));
        let outside = map.sample(Vec2::new(-3.0, -3.0));
        assert_eq!(inside, outside);
    }

    #[test]
    fn texel_index_does_not_wrap_at_u32() {
        let i = texel_index(100_000, 7, 100_000);
        assert_eq!(i as u64, 100_000u64 * 100_000 + 7);
    }

    #[test]
    fn texels_are_row_major() {
        let mut map = PackedDepthMap::filled(3, 2, 1.0);
        map.set_depth(2, 1, 0.25);
        assert_eq!(map.as_bytes().len(), 3 * 2 * 4);
        assert_eq!(map.texel(2, 1), encode_depth_bytes(0.25));
        assert_eq!(&map.as_bytes()[20..24], &encode_depth_bytes(0.25));
    }

    #[test]
    fn zero_sized_map_is_promoted_to_one_texel() {
        let map = PackedDepthMap::new(0, 0);
        assert_eq!((map.width(), map.height()), (1, 1));
        assert_eq!(map.as_bytes(), &[255, 0, 0, 0]);
    }
}
