//! Per-fragment shading model: ambient, diffuse and Phong-like specular terms,
//! modulated by the PCF shadow factor, with an emissive floor.

use glam::{Mat4, Vec2, Vec3, Vec4};

use super::shadow::{sample_shadow_pcf, ShadowMapSampler};

/// Fragment-stage lighting parameters (the fragment uniform block).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Lighting {
    pub ambient: Vec3,
    /// World-space direction from surfaces towards the light.
    pub light_direction: Vec3,
    pub light_color: Vec3,
    pub eye_pos: Vec3,
    /// Shadow-map resolution in texels; must match the bound map.
    pub shadow_map_size: f32,
}

/// Interpolated vertex outputs reaching the fragment stage.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Fragment {
    /// World-space position.
    pub position: Vec4,
    /// Clip-space position as seen from the light.
    pub light_position: Vec4,
    /// World-space normal, not normalized.
    pub normal: Vec3,
    pub color: Vec4,
    /// `(specular_power, shininess, emissive)`.
    pub material: Vec3,
}

/// Vertex stage: returns the camera clip position and the fragment inputs.
pub fn transform_vertex(
    mat_vp: Mat4,
    light_vp: Mat4,
    model: Mat4,
    position: Vec3,
    normal: Vec3,
    color: Vec4,
    material: Vec3,
) -> (Vec4, Fragment) {
    let p = position.extend(1.0);
    let world = model * p;
    let clip = mat_vp * world;
    let fragment = Fragment {
        position: world,
        light_position: light_vp * world,
        normal: (model * normal.extend(0.0)).truncate(),
        color,
        material,
    };
    (clip, fragment)
}

/// `emissive + clamp(1 - emissive, 0, 1)`.
///
/// Evaluates to exactly `1.0` for `emissive` in `[0, 1]` and to `emissive`
/// above that.
#[inline]
pub fn emissive_floor(emissive: f32) -> f32 {
    emissive + (1.0 - emissive).clamp(0.0, 1.0)
}

/// Shadow-map coordinate and compare depth for a light clip-space position.
///
/// The texture origin is the top-left corner, so NDC `+y` maps to `v = 0`.
/// The compare depth is the light-space `z` before the perspective divide,
/// which equals the divided depth for the orthographic light projection.
#[inline]
pub fn shadow_coords(light_position: Vec4) -> (Vec2, f32) {
    let ndc = light_position.truncate() / light_position.w;
    let uv = Vec2::new(ndc.x + 1.0, 1.0 - ndc.y) * 0.5;
    (uv, light_position.z)
}

#[inline]
fn reflect(incident: Vec3, normal: Vec3) -> Vec3 {
    incident - 2.0 * normal.dot(incident) * normal
}

/// Fragment stage: final color of one fragment.
pub fn shade_fragment<S: ShadowMapSampler + ?Sized>(
    fragment: &Fragment,
    lighting: &Lighting,
    shadow_map: &S,
) -> Vec4 {
    let specular_power = fragment.material.x;
    let shininess = fragment.material.y.max(1.0);
    let emissive = fragment.material.z;

    let ambient = lighting.ambient.extend(0.0);
    let l = lighting.light_direction.normalize();
    let n = fragment.normal.normalize();
    let n_dot_l = n.dot(l);

    if n_dot_l >= 0.0 {
        let v = (lighting.eye_pos - fragment.position.truncate()).normalize();
        let r = reflect(-l, n);

        let (uv, depth) = shadow_coords(fragment.light_position);
        let texel_size = 1.0 / lighting.shadow_map_size;
        let s = sample_shadow_pcf(shadow_map, uv, texel_size, depth);

        let r_dot_v = r.dot(v).max(0.0);
        let shiny = (r_dot_v * n_dot_l).powf(shininess);
        let specular = (specular_power * shiny * lighting.light_color).extend(0.0);
        let diffuse = lighting.light_color.extend(0.0) * n_dot_l;
        let light = emissive_floor(emissive) * (ambient + s * diffuse);

        light * fragment.color + s * specular
    } else {
        let light = Vec4::splat(emissive) + (1.0 - emissive).clamp(0.0, 1.0) * ambient;
        light * fragment.color
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shading::shadow::PackedDepthMap;

    fn lighting() -> Lighting {
        Lighting {
            ambient: Vec3::splat(0.1),
            light_direction: Vec3::Y,
            light_color: Vec3::ONE,
            eye_pos: Vec3::new(0.0, 5.0, 5.0),
            shadow_map_size: 32.0,
        }
    }

    fn fragment(normal: Vec3, material: Vec3) -> Fragment {
        Fragment {
            position: Vec4::new(0.0, 0.0, 0.0, 1.0),
            light_position: Vec4::new(0.0, 0.0, 0.5, 1.0),
            normal,
            color: Vec4::new(1.0, 0.5, 0.25, 1.0),
            material,
        }
    }

    fn approx(a: Vec4, b: Vec4) -> bool {
        (a - b).abs().max_element() < 1e-5
    }

    // ── emissive floor ────────────────────────────────────────────────────

    #[test]
    fn emissive_floor_is_one_inside_unit_range() {
        for e in [0.0, 0.25, 0.5, 1.0] {
            assert_eq!(emissive_floor(e), 1.0);
        }
    }

    #[test]
    fn emissive_floor_passes_through_above_one() {
        assert_eq!(emissive_floor(3.0), 3.0);
    }

    // ── facing away ───────────────────────────────────────────────────────

    #[test]
    fn back_facing_ignores_shadow_map_and_specular() {
        let lit = PackedDepthMap::filled(32, 32, 1.0);
        let occluded = PackedDepthMap::filled(32, 32, 0.0);
        let f = fragment(-Vec3::Y, Vec3::new(50.0, 8.0, 0.0));

        let a = shade_fragment(&f, &lighting(), &lit);
        let b = shade_fragment(&f, &lighting(), &occluded);
        assert_eq!(a, b);

        // Ambient only: 0.1 * color, alpha 0 * color.a + emissive 0.
        assert!(approx(a, Vec4::new(0.1, 0.05, 0.025, 0.0)));
    }

    #[test]
    fn back_facing_emissive_adds_to_ambient() {
        let map = PackedDepthMap::new(8, 8);
        let f = fragment(-Vec3::Y, Vec3::new(0.0, 1.0, 1.0));
        let c = shade_fragment(&f, &lighting(), &map);
        // emissive 1 + clamp(0) * ambient = 1 on every channel.
        assert!(approx(c, f.color));
    }

    // ── facing the light ──────────────────────────────────────────────────

    #[test]
    fn lit_surface_gets_ambient_plus_diffuse() {
        let map = PackedDepthMap::new(32, 32);
        let f = fragment(Vec3::Y, Vec3::ZERO);
        let c = shade_fragment(&f, &lighting(), &map);
        // n_dot_l = 1, s = 1: light = 0.1 + 1.0 on rgb, 0 on alpha.
        assert!(approx(c, Vec4::new(1.1, 0.55, 0.275, 0.0)), "got {c}");
    }

    #[test]
    fn occluded_surface_keeps_only_ambient() {
        let map = PackedDepthMap::filled(32, 32, 0.1);
        let f = fragment(Vec3::Y, Vec3::new(4.0, 2.0, 0.0));
        let c = shade_fragment(&f, &lighting(), &map);
        assert!(approx(c, Vec4::new(0.1, 0.05, 0.025, 0.0)), "got {c}");
    }

    #[test]
    fn specular_peaks_along_the_reflection() {
        let map = PackedDepthMap::new(32, 32);
        let mut l = lighting();
        l.eye_pos = Vec3::new(0.0, 10.0, 0.0); // looking straight down the normal
        let plain = shade_fragment(&fragment(Vec3::Y, Vec3::new(0.0, 1.0, 0.0)), &l, &map);
        let shiny = shade_fragment(&fragment(Vec3::Y, Vec3::new(2.0, 1.0, 0.0)), &l, &map);
        // r·v = 1, n·l = 1 → specular = power * light_color on rgb.
        assert!(approx(shiny - plain, Vec4::new(2.0, 2.0, 2.0, 0.0)), "got {}", shiny - plain);
    }

    // ── vertex stage ──────────────────────────────────────────────────────

    #[test]
    fn vertex_stage_applies_model_then_view_projection() {
        let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let vp = Mat4::from_scale(Vec3::splat(2.0));
        let (clip, f) = transform_vertex(
            vp,
            Mat4::IDENTITY,
            model,
            Vec3::ZERO,
            Vec3::X,
            Vec4::ONE,
            Vec3::ZERO,
        );
        assert_eq!(f.position, Vec4::new(1.0, 2.0, 3.0, 1.0));
        assert_eq!(clip, Vec4::new(2.0, 4.0, 6.0, 1.0));
        // Normals ignore translation.
        assert_eq!(f.normal, Vec3::X);
    }

    #[test]
    fn shadow_coords_flip_v() {
        let (uv, depth) = shadow_coords(Vec4::new(1.0, 1.0, 0.25, 1.0));
        assert_eq!(uv, Vec2::new(1.0, 0.0));
        assert_eq!(depth, 0.25);
    }
}
