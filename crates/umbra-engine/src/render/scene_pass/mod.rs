//! Shadow-lit scene pass.
//!
//! Draws every geometry record's solid and emissive instance groups into an
//! offscreen `Rgba16Float` color target, depth-testing read-only against a
//! depth buffer populated by an earlier pass and shading with a directional
//! light plus a PCF-filtered packed-depth shadow map.

mod pass;
mod pipeline;
mod uniforms;

pub use pass::{ScenePass, ScenePassConfig};
pub use pipeline::{scene_pipeline_desc, SCENE_SHADER_SOURCE};
pub use uniforms::{SceneFsUniforms, SceneVsUniforms};
