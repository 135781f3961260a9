use glam::{Mat4, Vec3};

/// Perspective camera.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Camera {
    /// Camera at `eye` looking at `target`, Y up, 60° field of view.
    pub fn looking_at(eye: Vec3, target: Vec3, aspect: f32) -> Self {
        Self {
            eye,
            target,
            up: Vec3::Y,
            fov_y: 60f32.to_radians(),
            aspect,
            z_near: 0.1,
            z_far: 100.0,
        }
    }

    /// Projection × view, depth mapped to `[0, 1]`.
    pub fn view_projection(&self) -> Mat4 {
        let view = Mat4::look_at_rh(self.eye, self.target, self.up);
        let aspect = self.aspect.max(f32::EPSILON);
        let proj = Mat4::perspective_rh(self.fov_y, aspect, self.z_near, self.z_far);
        proj * view
    }
}
