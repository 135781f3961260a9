use glam::{Mat4, Quat, Vec3, Vec4};
use umbra_engine::color::Rgb;
use umbra_engine::scene::{Camera, DirectionalLight, FrameUniforms, Instance, Material};
use umbra_engine::shading::{decode_depth_bytes, PackedDepthMap};

/// Bounding sphere the light's shadow map covers.
const SCENE_CENTER: Vec3 = Vec3::ZERO;
const SCENE_RADIUS: f32 = 6.0;

/// A ring of spinning cubes on a floor slab, with one glowing cube at the
/// center.
pub struct DemoScene {
    pub camera: Camera,
    pub light: DirectionalLight,
    ring: usize,
}

impl DemoScene {
    pub fn new(aspect: f32, ring: usize) -> Self {
        Self {
            camera: Camera::looking_at(Vec3::new(0.0, 4.5, 9.0), Vec3::ZERO, aspect),
            light: DirectionalLight {
                direction: Vec3::new(0.4, 1.0, 0.3),
                color: Rgb::new(1.0, 0.95, 0.85),
                ambient: Rgb::new(0.08, 0.09, 0.12),
            },
            ring,
        }
    }

    /// Solid instances at time `t` (seconds): floor slab first, then the ring.
    pub fn solid_instances(&self, t: f32) -> Vec<Instance> {
        let floor = Instance {
            color: Vec4::new(0.55, 0.55, 0.6, 1.0),
            material: Material::matte(),
            transform: Mat4::from_scale_rotation_translation(
                Vec3::new(10.0, 0.2, 10.0),
                Quat::IDENTITY,
                Vec3::new(0.0, -0.6, 0.0),
            ),
        };

        let step = std::f32::consts::TAU / self.ring.max(1) as f32;
        let ring = (0..self.ring).map(|i| {
            let angle = i as f32 * step + t * 0.5;
            let hue = i as f32 / self.ring.max(1) as f32;
            Instance {
                color: Vec4::new(0.4 + 0.6 * hue, 0.5, 1.0 - 0.6 * hue, 1.0),
                material: Material::new(0.8, 24.0, 0.0),
                transform: Mat4::from_rotation_translation(
                    Quat::from_rotation_y(angle * 2.0),
                    Vec3::new(3.0 * angle.cos(), 0.0, 3.0 * angle.sin()),
                ),
            }
        });

        std::iter::once(floor).chain(ring).collect()
    }

    pub fn emissive_instances(&self, t: f32) -> Vec<Instance> {
        let pulse = 1.5 + 0.5 * (t * 2.0).sin();
        vec![Instance {
            color: Vec4::new(1.0, 0.6, 0.2, 1.0),
            material: Material::new(0.0, 1.0, pulse),
            transform: Mat4::from_scale_rotation_translation(
                Vec3::splat(0.6),
                Quat::from_rotation_y(t),
                Vec3::new(0.0, 0.5, 0.0),
            ),
        }]
    }

    pub fn uniforms(&self, shadow_map_size: u32) -> FrameUniforms {
        FrameUniforms::new(
            &self.camera,
            &self.light,
            SCENE_CENTER,
            SCENE_RADIUS,
            shadow_map_size,
        )
    }

    /// Rasterizes the casters' light-space bounding boxes into a packed depth
    /// map. Coarse, but enough to exercise the shadow lookup.
    pub fn bake_shadow_map(&self, size: u32, casters: &[Instance]) -> PackedDepthMap {
        let light_vp = self.light.view_projection(SCENE_CENTER, SCENE_RADIUS);
        let mut map = PackedDepthMap::new(size, size);
        let extent = size as f32;

        for caster in casters {
            let corners = cube_corners().map(|c| {
                let p = light_vp * caster.transform * c.extend(1.0);
                p.truncate() / p.w
            });
            let min = corners.iter().copied().reduce(Vec3::min).unwrap_or_default();
            let max = corners.iter().copied().reduce(Vec3::max).unwrap_or_default();

            // NDC y up, texel rows down.
            let x0 = ((min.x + 1.0) * 0.5 * extent).floor().max(0.0) as u32;
            let x1 = ((max.x + 1.0) * 0.5 * extent).ceil().min(extent) as u32;
            let y0 = ((1.0 - max.y) * 0.5 * extent).floor().max(0.0) as u32;
            let y1 = ((1.0 - min.y) * 0.5 * extent).ceil().min(extent) as u32;

            for y in y0..y1 {
                for x in x0..x1 {
                    let stored = decode_depth_bytes(map.texel(x as i64, y as i64));
                    if min.z < stored {
                        map.set_depth(x, y, min.z);
                    }
                }
            }
        }
        map
    }
}

fn cube_corners() -> [Vec3; 8] {
    let mut out = [Vec3::ZERO; 8];
    for (i, c) in out.iter_mut().enumerate() {
        let pick = |bit: usize| if i & bit != 0 { 0.5 } else { -0.5 };
        *c = Vec3::new(pick(1), pick(2), pick(4));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_follows_the_floor() {
        let scene = DemoScene::new(1.5, 6);
        let solid = scene.solid_instances(0.0);
        assert_eq!(solid.len(), 7);
        assert_eq!(solid[0].material, Material::matte());
        assert_eq!(scene.emissive_instances(0.0).len(), 1);
    }

    #[test]
    fn emissive_cube_stays_above_one() {
        let scene = DemoScene::new(1.5, 6);
        for frame in 0..32 {
            let e = scene.emissive_instances(frame as f32 * 0.1)[0].material.emissive;
            assert!(e >= 1.0, "frame {frame}: {e}");
        }
    }

    #[test]
    fn baked_map_is_nearer_under_a_caster() {
        let scene = DemoScene::new(1.5, 0);
        let caster = Instance {
            color: Vec4::ONE,
            material: Material::matte(),
            transform: Mat4::IDENTITY,
        };
        let map = scene.bake_shadow_map(64, &[caster]);

        let light_vp = scene.light.view_projection(SCENE_CENTER, SCENE_RADIUS);
        let c = light_vp * Vec3::ZERO.extend(1.0);
        let x = ((c.x + 1.0) * 0.5 * 64.0) as i64;
        let y = ((1.0 - c.y) * 0.5 * 64.0) as i64;

        assert!(decode_depth_bytes(map.texel(x, y)) < c.z);
        assert!(decode_depth_bytes(map.texel(0, 0)) > 0.99, "corners stay clear");
    }
}
