use bytemuck::{Pod, Zeroable};

use crate::scene::FrameUniforms;
use crate::shading::Lighting;

/// Vertex uniform block (`VsUniforms` in `scene.wgsl`).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SceneVsUniforms {
    pub mat_vp: [[f32; 4]; 4],
    pub light_vp: [[f32; 4]; 4],
}

/// Fragment uniform block (`FsUniforms` in `scene.wgsl`).
///
/// WGSL aligns `vec3<f32>` to 16 bytes; the trailing scalar fills the last
/// vec3's padding.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SceneFsUniforms {
    pub light_ambient: [f32; 3],
    pub _pad0: f32,
    pub light_direction: [f32; 3],
    pub _pad1: f32,
    pub light_color: [f32; 3],
    pub _pad2: f32,
    pub eye_pos: [f32; 3],
    pub shadow_map_size: f32,
}

impl From<&FrameUniforms> for SceneVsUniforms {
    fn from(u: &FrameUniforms) -> Self {
        Self {
            mat_vp: u.mat_vp.to_cols_array_2d(),
            light_vp: u.light_mat_vp.to_cols_array_2d(),
        }
    }
}

impl From<&FrameUniforms> for SceneFsUniforms {
    fn from(u: &FrameUniforms) -> Self {
        Self::from(&u.lighting())
    }
}

impl From<&Lighting> for SceneFsUniforms {
    fn from(l: &Lighting) -> Self {
        Self {
            light_ambient: l.ambient.to_array(),
            _pad0: 0.0,
            light_direction: l.light_direction.to_array(),
            _pad1: 0.0,
            light_color: l.light_color.to_array(),
            _pad2: 0.0,
            eye_pos: l.eye_pos.to_array(),
            shadow_map_size: l.shadow_map_size,
        }
    }
}
