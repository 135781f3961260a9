use glam::{Mat4, Vec3};

use super::{Camera, DirectionalLight};
use crate::shading::Lighting;

/// Per-frame uniform inputs of the scene pass.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameUniforms {
    pub mat_vp: Mat4,
    pub light_mat_vp: Mat4,
    pub light_ambient: Vec3,
    /// From surfaces towards the light.
    pub light_direction: Vec3,
    pub light_color: Vec3,
    pub eye_pos: Vec3,
    /// Resolution of the bound shadow map, in texels.
    pub shadow_map_size: f32,
}

impl FrameUniforms {
    /// Builds the frame inputs from a camera and a light whose shadow map
    /// covers a sphere of `scene_radius` around `scene_center`.
    pub fn new(
        camera: &Camera,
        light: &DirectionalLight,
        scene_center: Vec3,
        scene_radius: f32,
        shadow_map_size: u32,
    ) -> Self {
        Self {
            mat_vp: camera.view_projection(),
            light_mat_vp: light.view_projection(scene_center, scene_radius),
            light_ambient: light.ambient.to_vec3(),
            light_direction: light.direction,
            light_color: light.color.to_vec3(),
            eye_pos: camera.eye,
            shadow_map_size: shadow_map_size as f32,
        }
    }

    /// Fragment-stage subset.
    pub fn lighting(&self) -> Lighting {
        Lighting {
            ambient: self.light_ambient,
            light_direction: self.light_direction,
            light_color: self.light_color,
            eye_pos: self.eye_pos,
            shadow_map_size: self.shadow_map_size,
        }
    }
}

/// Everything the scene pass reads in one frame.
///
/// `Img` is the backend's image handle; `Q` yields the geometry to draw.
#[derive(Debug)]
pub struct RenderState<'a, Img, Q: ?Sized> {
    pub uniforms: FrameUniforms,
    pub shadow_map: &'a Img,
    pub query: &'a Q,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;

    #[test]
    fn frame_uniforms_carry_camera_and_light() {
        let camera = Camera::looking_at(Vec3::new(0.0, 3.0, 6.0), Vec3::ZERO, 1.5);
        let light = DirectionalLight {
            direction: Vec3::new(0.3, 1.0, 0.2),
            color: Rgb::new(1.0, 0.9, 0.8),
            ambient: Rgb::new(0.1, 0.1, 0.2),
        };
        let u = FrameUniforms::new(&camera, &light, Vec3::ZERO, 5.0, 1024);

        assert_eq!(u.mat_vp, camera.view_projection());
        assert_eq!(u.light_mat_vp, light.view_projection(Vec3::ZERO, 5.0));
        assert_eq!(u.eye_pos, camera.eye);
        assert_eq!(u.shadow_map_size, 1024.0);

        let l = u.lighting();
        assert_eq!(l.light_color, Vec3::new(1.0, 0.9, 0.8));
        assert_eq!(l.ambient, Vec3::new(0.1, 0.1, 0.2));
    }
}
