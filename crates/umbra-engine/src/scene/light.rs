use glam::{Mat4, Vec3};

use crate::color::Rgb;

/// Directional light with an ambient term.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DirectionalLight {
    /// Direction from the scene towards the light.
    pub direction: Vec3,
    pub color: Rgb,
    pub ambient: Rgb,
}

impl DirectionalLight {
    /// Orthographic light view-projection covering a sphere of `radius`
    /// around `center`.
    ///
    /// The light sits `2 * radius` from `center`, so the sphere spans light
    /// depths `[radius, 3 * radius]`, mapped to `[0, 1]`.
    pub fn view_projection(&self, center: Vec3, radius: f32) -> Mat4 {
        let dir = self.direction.normalize_or(Vec3::Y);
        let radius = radius.max(f32::EPSILON);
        let up = if dir.y.abs() > 0.99 { Vec3::Z } else { Vec3::Y };

        let eye = center + dir * (2.0 * radius);
        let view = Mat4::look_at_rh(eye, center, up);
        let proj = Mat4::orthographic_rh(-radius, radius, -radius, radius, radius, 3.0 * radius);
        proj * view
    }
}
